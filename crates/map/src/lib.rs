//! Map layers: which grid cells are visible, and telling renderers about it.
//!
//! A [`MapLayer`] owns the pan center and tile geometry, asks its
//! [`VisibilityStrategy`] for the visible set whenever something moved, and
//! forwards the create/reuse/remove diff to every attached [`TileRenderer`].
//!
//! # Invariants
//! - Within one update every renderer sees removals, then additions, then reuses.
//! - A strategy that cannot answer leaves the layer dirty and its tiles untouched.
//! - `create`, `reuse` and `remove` are disjoint; `tiles == reuse + create` as sets.

mod config;
mod layer;
mod provider;
mod renderer;
pub mod visibility;

pub use config::{LayerConfig, RepeatingPatternConfig, VisibilityConfig};
pub use layer::{LayerUpdate, MapLayer};
pub use provider::{PatternOrientation, RepeatMode, RepeatingTilesProvider, TileDataProvider};
pub use renderer::{SharedRenderer, TileRenderer};
pub use visibility::{
    CameraVisibility, CameraVisibilityOptions, RectangularVisibility, VisibilityResult,
    VisibilityStrategy,
};

use tessera_common::CommonError;

/// Errors raised while configuring a map layer.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error(transparent)]
    Geometry(#[from] CommonError),
    #[error("visible area must be positive and finite, got {width}x{height}")]
    InvalidViewSize { width: f32, height: f32 },
    #[error("tile pattern is empty")]
    EmptyPattern,
    #[error("pattern line {line} has {actual} entries, expected {expected}")]
    RaggedPattern {
        line: usize,
        expected: usize,
        actual: usize,
    },
    #[error("invalid option {name}: {value}")]
    InvalidOption { name: &'static str, value: f32 },
    #[error("camera visibility requires a camera")]
    MissingCamera,
    #[error("config: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn crate_info() -> &'static str {
    "tessera-map v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("map"));
    }
}
