use std::collections::HashSet;

use glam::Vec2;
use tessera_common::{SceneNode, Tile, TileCoordsMapper, TileKey};

use super::{VisibilityResult, VisibilityStrategy};
use crate::MapError;

/// Fixed `width x height` window centred on the layer center.
#[derive(Debug, Clone, PartialEq)]
pub struct RectangularVisibility {
    width: f32,
    height: f32,
    dirty: bool,
}

impl RectangularVisibility {
    /// View rectangle of `width` x `height` around the layer center.
    pub fn new(width: f32, height: f32) -> Result<Self, MapError> {
        validate_view(width, height)?;
        Ok(Self {
            width,
            height,
            dirty: true,
        })
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    /// Resize the view rectangle.
    pub fn set_size(&mut self, width: f32, height: f32) -> Result<(), MapError> {
        validate_view(width, height)?;
        if width != self.width || height != self.height {
            self.width = width;
            self.height = height;
            self.dirty = true;
        }
        Ok(())
    }
}

fn validate_view(width: f32, height: f32) -> Result<(), MapError> {
    if !(width.is_finite() && width > 0.0 && height.is_finite() && height > 0.0) {
        return Err(MapError::InvalidViewSize { width, height });
    }
    Ok(())
}

impl VisibilityStrategy for RectangularVisibility {
    fn compute_visible_tiles(
        &mut self,
        previous: &[Tile],
        center: Vec2,
        mapper: &TileCoordsMapper,
        _node: Option<&dyn SceneNode>,
    ) -> Option<VisibilityResult> {
        let within = mapper.compute_tiles_within_coords(
            center.x - self.width * 0.5,
            center.y - self.height * 0.5,
            self.width,
            self.height,
        );
        let full_view = within.view();

        // Overlap rather than containment keeps edge tiles alive.
        let mut reuse = Vec::new();
        let mut remove = Vec::new();
        for tile in previous {
            if tile.view.is_intersecting(&full_view) && tile.view == mapper.tile_view(tile.x, tile.y) {
                reuse.push(*tile);
            } else {
                remove.push(*tile);
            }
        }

        let covered: HashSet<TileKey> = reuse.iter().map(Tile::key).collect();
        let create: Vec<Tile> = within
            .cells()
            .filter(|&(x, y)| !covered.contains(&TileKey::new(x, y)))
            .map(|(x, y)| Tile::from_mapper(mapper, x, y))
            .collect();

        let mut tiles = Vec::with_capacity(reuse.len() + create.len());
        tiles.extend_from_slice(&reuse);
        tiles.extend_from_slice(&create);
        self.dirty = false;

        tracing::trace!(
            created = create.len(),
            reused = reuse.len(),
            removed = remove.len(),
            "rectangular visibility"
        );

        Some(VisibilityResult {
            tiles,
            create,
            reuse,
            remove,
            offset: Vec2::ZERO,
        })
    }

    fn needs_update(&self) -> bool {
        self.dirty
    }
}
