//! Shared geometry for the tessera toolkit: rectangles, the tile grid,
//! transforms, cameras and frustum tests.
//!
//! # Invariants
//! - Tile sizes are strictly positive and finite; constructors reject anything else.
//! - `Aabb2` extents are never negative.

mod aabb;
mod camera;
mod coords;
mod frustum;
mod tile;
mod types;

pub use aabb::{Aabb2, Quadrant};
pub use camera::{Camera, Projection};
pub use coords::{TileCoordsMapper, TilesWithinCoords};
pub use frustum::{Frustum, Plane};
pub use tile::{Tile, TileKey};
pub use types::{SceneNode, Transform};

/// Errors from constructing shared geometry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommonError {
    #[error("tile size must be positive and finite, got {width}x{height}")]
    InvalidTileSize { width: f32, height: f32 },
    #[error("{0} must be finite")]
    NonFinite(&'static str),
}

pub fn crate_info() -> &'static str {
    "tessera-common v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("common"));
    }
}
