use std::fmt;

use serde::{Deserialize, Serialize};

use crate::aabb::Aabb2;
use crate::coords::TileCoordsMapper;

/// Identity of a grid cell.
///
/// Displays as signed hex (`"-1f;a"`), so negative columns and rows never
/// collide with positive ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileKey {
    pub x: i32,
    pub y: i32,
}

impl TileKey {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The orthogonal and diagonal neighbours, eight except at the `i32`
    /// limits where keys past the edge are skipped.
    pub fn neighbours(self) -> impl Iterator<Item = TileKey> {
        const RING: [(i32, i32); 8] = [
            (-1, -1),
            (0, -1),
            (1, -1),
            (-1, 0),
            (1, 0),
            (-1, 1),
            (0, 1),
            (1, 1),
        ];
        RING.into_iter().filter_map(move |(dx, dy)| {
            Some(TileKey::new(
                self.x.checked_add(dx)?,
                self.y.checked_add(dy)?,
            ))
        })
    }
}

fn write_signed_hex(f: &mut fmt::Formatter<'_>, v: i32) -> fmt::Result {
    if v < 0 {
        write!(f, "-{:x}", v.unsigned_abs())
    } else {
        write!(f, "{v:x}")
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_signed_hex(f, self.x)?;
        f.write_str(";")?;
        write_signed_hex(f, self.y)
    }
}

/// A visible grid cell and its map-space rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub x: i32,
    pub y: i32,
    pub view: Aabb2,
}

impl Tile {
    pub fn new(x: i32, y: i32, view: Aabb2) -> Self {
        Self { x, y, view }
    }

    /// Tile for cell `(x, y)` using the mapper's geometry.
    pub fn from_mapper(mapper: &TileCoordsMapper, x: i32, y: i32) -> Self {
        Self::new(x, y, mapper.tile_view(x, y))
    }

    /// Grid coordinates as a hashable key.
    pub fn key(&self) -> TileKey {
        TileKey::new(self.x, self.y)
    }

    /// Signed hex id, e.g. `-2;3`.
    pub fn id(&self) -> String {
        self.key().to_string()
    }
}
