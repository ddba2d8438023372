//! Spatial indices for renderables that do not sit on the tile grid.
//!
//! # Invariants
//! - `find_within` never misses an indexed box that intersects the query.
//! - Indexed boxes have finite, non-negative extents.

mod grid;
mod quadtree;

pub use grid::SpatialHashGrid;
pub use quadtree::{QuadTree, QuadTreeOptions};

use tessera_common::{Aabb2, CommonError};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpatialError {
    #[error(transparent)]
    Geometry(#[from] CommonError),
    #[error("bounds must be finite with non-negative extents, got {0:?}")]
    InvalidBounds(Aabb2),
}

pub(crate) fn validate_bounds(aabb: &Aabb2) -> Result<(), SpatialError> {
    let finite = [aabb.left, aabb.top, aabb.width, aabb.height]
        .iter()
        .all(|v| v.is_finite());
    if !finite || aabb.width < 0.0 || aabb.height < 0.0 {
        return Err(SpatialError::InvalidBounds(*aabb));
    }
    Ok(())
}

pub fn crate_info() -> &'static str {
    "tessera-spatial v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("spatial"));
    }

    #[test]
    fn bounds_validation() {
        assert!(validate_bounds(&Aabb2::new(0.0, 0.0, 0.0, 0.0)).is_ok());
        assert!(validate_bounds(&Aabb2::new(0.0, 0.0, -1.0, 1.0)).is_err());
        assert!(validate_bounds(&Aabb2::new(f32::NAN, 0.0, 1.0, 1.0)).is_err());
    }
}
