use serde::{Deserialize, Serialize};

/// Axis-aligned 2D rectangle in map space. `top` is the smaller y value.
///
/// Extents must not be negative; zero-sized boxes are allowed and behave as
/// points or segments under the predicates below.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Aabb2 {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

/// One of the four regions around an origin point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quadrant {
    NorthWest,
    NorthEast,
    SouthEast,
    SouthWest,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::NorthWest,
        Quadrant::NorthEast,
        Quadrant::SouthEast,
        Quadrant::SouthWest,
    ];

    /// Position in [`Quadrant::ALL`].
    pub fn index(self) -> usize {
        match self {
            Quadrant::NorthWest => 0,
            Quadrant::NorthEast => 1,
            Quadrant::SouthEast => 2,
            Quadrant::SouthWest => 3,
        }
    }
}

impl Aabb2 {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Build a box from two corners.
    pub fn from_corners(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self::new(left, top, right - left, bottom - top)
    }

    /// `left + width`.
    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    /// `top + height`.
    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    pub fn center_x(&self) -> f32 {
        self.left + self.width * 0.5
    }

    pub fn center_y(&self) -> f32 {
        self.top + self.height * 0.5
    }

    /// Half-open point test: left/top inclusive, right/bottom exclusive.
    pub fn is_inside(&self, x: f32, y: f32) -> bool {
        x >= self.left && x < self.right() && y >= self.top && y < self.bottom()
    }

    /// True unless the boxes are disjoint on either axis. Touching edges do
    /// not count as intersecting.
    pub fn is_intersecting(&self, other: &Aabb2) -> bool {
        !(self.right() <= other.left
            || other.right() <= self.left
            || self.bottom() <= other.top
            || other.bottom() <= self.top)
    }

    /// Full containment of `self` within `other`, edges inclusive.
    pub fn is_inside_aabb(&self, other: &Aabb2) -> bool {
        self.left >= other.left
            && self.top >= other.top
            && self.right() <= other.right()
            && self.bottom() <= other.bottom()
    }

    /// Grow in place to cover `other` as well.
    pub fn extend(&mut self, other: &Aabb2) -> &mut Self {
        let left = self.left.min(other.left);
        let top = self.top.min(other.top);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        *self = Self::from_corners(left, top, right, bottom);
        self
    }

    // Quadrant predicates. Around an origin (x, y) the west half-plane is
    // `px < x` and the east half-plane is `px >= x`; north is `py < y` and
    // south is `py >= y`. A box reaches a half-plane when any of its points
    // (half-open, plus the corner itself for zero extents) falls in it, so a
    // box sitting exactly on the origin line belongs to the east / south side.

    fn reaches_west(&self, x: f32) -> bool {
        self.left < x
    }

    fn reaches_east(&self, x: f32) -> bool {
        self.right() > x || self.left >= x
    }

    fn reaches_north(&self, y: f32) -> bool {
        self.top < y
    }

    fn reaches_south(&self, y: f32) -> bool {
        self.bottom() > y || self.top >= y
    }

    /// Reaches the west and north half-planes around `(x, y)`.
    pub fn is_north_west(&self, x: f32, y: f32) -> bool {
        self.reaches_west(x) && self.reaches_north(y)
    }

    /// Reaches the east and north half-planes around `(x, y)`.
    pub fn is_north_east(&self, x: f32, y: f32) -> bool {
        self.reaches_east(x) && self.reaches_north(y)
    }

    /// Reaches the east and south half-planes around `(x, y)`.
    pub fn is_south_east(&self, x: f32, y: f32) -> bool {
        self.reaches_east(x) && self.reaches_south(y)
    }

    /// Reaches the west and south half-planes around `(x, y)`.
    pub fn is_south_west(&self, x: f32, y: f32) -> bool {
        self.reaches_west(x) && self.reaches_south(y)
    }

    /// Whether any part of the box lies in `quadrant` around `(x, y)`.
    pub fn reaches_quadrant(&self, quadrant: Quadrant, x: f32, y: f32) -> bool {
        match quadrant {
            Quadrant::NorthWest => self.is_north_west(x, y),
            Quadrant::NorthEast => self.is_north_east(x, y),
            Quadrant::SouthEast => self.is_south_east(x, y),
            Quadrant::SouthWest => self.is_south_west(x, y),
        }
    }

    /// The single quadrant this box lies in, or `None` when it straddles an
    /// origin line.
    pub fn quadrant(&self, x: f32, y: f32) -> Option<Quadrant> {
        let mut found = None;
        for q in Quadrant::ALL {
            if self.reaches_quadrant(q, x, y) {
                if found.is_some() {
                    return None;
                }
                found = Some(q);
            }
        }
        found
    }
}
