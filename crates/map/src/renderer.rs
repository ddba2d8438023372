use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec2;
use tessera_common::Tile;

/// Receives visible-set changes from a [`MapLayer`](crate::MapLayer).
///
/// Within one update the layer always calls, in order: `begin_update`, every
/// `remove_tile`, every `add_tile`, every `reuse_tile`, then `end_update`.
pub trait TileRenderer {
    /// `offset` is map coordinates minus layer-local plane coordinates for
    /// the tiles that follow.
    fn begin_update(&mut self, _offset: Vec2) {}

    fn add_tile(&mut self, tile: &Tile);

    fn reuse_tile(&mut self, tile: &Tile);

    fn remove_tile(&mut self, tile: &Tile);

    fn end_update(&mut self) {}

    /// Release everything the renderer holds.
    fn dispose(&mut self) {}
}

/// Renderers are shared with, and owned by, the host.
pub type SharedRenderer = Rc<RefCell<dyn TileRenderer>>;
