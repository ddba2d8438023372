//! Visibility strategies: which grid cells are visible right now.

mod camera;
mod rectangular;

pub use camera::{CameraVisibility, CameraVisibilityOptions};
pub use rectangular::RectangularVisibility;

use std::collections::HashMap;

use glam::Vec2;
use tessera_common::{SceneNode, Tile, TileCoordsMapper, TileKey};

/// Visible tiles and their diff against the previous set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisibilityResult {
    /// The new visible set.
    pub tiles: Vec<Tile>,
    pub create: Vec<Tile>,
    pub reuse: Vec<Tile>,
    pub remove: Vec<Tile>,
    /// Map coordinates minus layer-local plane coordinates.
    pub offset: Vec2,
}

impl VisibilityResult {
    /// Classify `tiles` against `previous` by cell key. A cell whose
    /// rectangle changed (new tile geometry) is removed and created again.
    pub fn diff(previous: &[Tile], tiles: Vec<Tile>, offset: Vec2) -> Self {
        let mut old: HashMap<TileKey, &Tile> = previous.iter().map(|t| (t.key(), t)).collect();
        let mut create = Vec::new();
        let mut reuse = Vec::new();
        for t in &tiles {
            match old.remove(&t.key()) {
                Some(prev) if prev.view == t.view => reuse.push(*t),
                Some(prev) => {
                    old.insert(prev.key(), prev);
                    create.push(*t);
                }
                None => create.push(*t),
            }
        }
        let remove = previous
            .iter()
            .filter(|t| old.contains_key(&t.key()))
            .copied()
            .collect();
        Self {
            tiles,
            create,
            reuse,
            remove,
            offset,
        }
    }

    /// Nothing changed: every tile persists.
    pub fn all_reuse(tiles: Vec<Tile>, offset: Vec2) -> Self {
        Self {
            reuse: tiles.clone(),
            tiles,
            create: Vec::new(),
            remove: Vec::new(),
            offset,
        }
    }

    /// Nothing is visible any more.
    pub fn removal_only(previous: &[Tile], offset: Vec2) -> Self {
        Self {
            tiles: Vec::new(),
            create: Vec::new(),
            reuse: Vec::new(),
            remove: previous.to_vec(),
            offset,
        }
    }

    /// Nothing to create or remove.
    pub fn is_unchanged(&self) -> bool {
        self.create.is_empty() && self.remove.is_empty()
    }
}

/// Pluggable answer to "which cells are visible now".
pub trait VisibilityStrategy {
    /// `None` means the strategy cannot answer this frame (for example the
    /// camera does not see the ground plane); the caller keeps its tiles.
    fn compute_visible_tiles(
        &mut self,
        previous: &[Tile],
        center: Vec2,
        mapper: &TileCoordsMapper,
        node: Option<&dyn SceneNode>,
    ) -> Option<VisibilityResult>;

    /// The strategy's own inputs changed since the last computation.
    fn needs_update(&self) -> bool {
        false
    }
}
