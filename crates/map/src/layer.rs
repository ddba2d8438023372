use std::rc::Rc;

use glam::{Vec2, Vec3};
use tessera_common::{SceneNode, Tile, TileCoordsMapper, Transform};

use crate::renderer::SharedRenderer;
use crate::visibility::{VisibilityResult, VisibilityStrategy};
use crate::MapError;

/// What one call to [`MapLayer::update`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerUpdate {
    /// Nothing to do: clean, no renderers, or no strategy.
    Idle,
    /// The strategy had no answer; the layer stays dirty and retries.
    Deferred,
    Applied {
        created: usize,
        reused: usize,
        removed: usize,
    },
}

/// A pannable, effectively infinite tile plane.
pub struct MapLayer {
    center: Vec2,
    mapper: TileCoordsMapper,
    tiles: Vec<Tile>,
    renderers: Vec<SharedRenderer>,
    visibilitor: Option<Box<dyn VisibilityStrategy>>,
    node: Transform,
    offset: Vec2,
    needs_update: bool,
}

impl std::fmt::Debug for MapLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapLayer")
            .field("center", &self.center)
            .field("mapper", &self.mapper)
            .field("tiles", &self.tiles.len())
            .field("renderers", &self.renderers.len())
            .field("has_visibility", &self.visibilitor.is_some())
            .field("needs_update", &self.needs_update)
            .finish()
    }
}

impl MapLayer {
    /// Layer over a `tile_width` x `tile_height` grid, no strategy attached.
    pub fn new(tile_width: f32, tile_height: f32) -> Result<Self, MapError> {
        Ok(Self::with_mapper(TileCoordsMapper::new(tile_width, tile_height)?))
    }

    pub fn with_mapper(mapper: TileCoordsMapper) -> Self {
        Self {
            center: Vec2::ZERO,
            mapper,
            tiles: Vec::new(),
            renderers: Vec::new(),
            visibilitor: None,
            node: Transform::default(),
            offset: Vec2::ZERO,
            needs_update: true,
        }
    }

    pub fn center(&self) -> Vec2 {
        self.center
    }

    /// Move the view center; marks the layer dirty.
    pub fn set_center(&mut self, center: Vec2) {
        if center != self.center {
            self.center = center;
            self.needs_update = true;
        }
    }

    pub fn mapper(&self) -> &TileCoordsMapper {
        &self.mapper
    }

    /// Change the grid; every tile is rebuilt on the next update.
    pub fn set_tile_size(&mut self, width: f32, height: f32) -> Result<(), MapError> {
        let mapper = TileCoordsMapper::with_offset(
            width,
            height,
            self.mapper.x_offset(),
            self.mapper.y_offset(),
        )?;
        self.set_mapper(mapper);
        Ok(())
    }

    /// Shift the grid; every tile is rebuilt on the next update.
    pub fn set_tile_offset(&mut self, x_offset: f32, y_offset: f32) -> Result<(), MapError> {
        let mapper = TileCoordsMapper::with_offset(
            self.mapper.tile_width(),
            self.mapper.tile_height(),
            x_offset,
            y_offset,
        )?;
        self.set_mapper(mapper);
        Ok(())
    }

    fn set_mapper(&mut self, mapper: TileCoordsMapper) {
        if mapper != self.mapper {
            self.mapper = mapper;
            self.needs_update = true;
        }
    }

    /// World placement of the tile plane (its local Y=0).
    pub fn node(&self) -> &Transform {
        &self.node
    }

    /// Place the layer in the scene; marks it dirty.
    pub fn set_node(&mut self, node: Transform) {
        if node != self.node {
            self.node = node;
            self.needs_update = true;
        }
    }

    /// Replace the strategy and mark the layer dirty.
    pub fn set_visibility(&mut self, strategy: Box<dyn VisibilityStrategy>) {
        self.visibilitor = Some(strategy);
        self.needs_update = true;
    }

    pub fn has_visibility(&self) -> bool {
        self.visibilitor.is_some()
    }

    /// Tiles from the last applied update.
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Offset reported with the last applied update.
    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    /// Node translation that places local tiles at their map position.
    pub fn plane_translation(&self) -> Vec3 {
        Vec3::new(-self.offset.x, 0.0, -self.offset.y)
    }

    /// Whether the next [`update`](Self::update) will run the strategy.
    pub fn needs_update(&self) -> bool {
        self.needs_update || self.visibilitor.as_ref().is_some_and(|v| v.needs_update())
    }

    pub fn renderer_count(&self) -> usize {
        self.renderers.len()
    }

    /// Attach a renderer and replay the visible tiles to it. Returns `false`
    /// if it was already attached.
    pub fn add_renderer(&mut self, renderer: SharedRenderer) -> bool {
        if self.renderers.iter().any(|r| Rc::ptr_eq(r, &renderer)) {
            return false;
        }
        {
            let mut r = renderer.borrow_mut();
            r.begin_update(self.offset);
            for tile in &self.tiles {
                r.add_tile(tile);
            }
            r.end_update();
        }
        self.renderers.push(renderer);
        true
    }

    /// Detach a renderer, removing the visible tiles from it first.
    pub fn remove_renderer(&mut self, renderer: &SharedRenderer) -> bool {
        let Some(index) = self.renderers.iter().position(|r| Rc::ptr_eq(r, renderer)) else {
            return false;
        };
        let removed = self.renderers.remove(index);
        let mut r = removed.borrow_mut();
        r.begin_update(self.offset);
        for tile in &self.tiles {
            r.remove_tile(tile);
        }
        r.end_update();
        true
    }

    /// Run the strategy and dispatch its diff to every renderer.
    ///
    /// Clean layers, layers without renderers or strategy, and a strategy
    /// returning no result leave the renderers untouched.
    pub fn update(&mut self) -> LayerUpdate {
        let _span = tracing::info_span!("map_layer_update").entered();
        if self.renderers.is_empty() {
            return LayerUpdate::Idle;
        }
        let dirty = self.needs_update();
        let Some(strategy) = self.visibilitor.as_mut() else {
            return LayerUpdate::Idle;
        };
        if !dirty {
            return LayerUpdate::Idle;
        }

        let node: &dyn SceneNode = &self.node;
        let Some(result) =
            strategy.compute_visible_tiles(&self.tiles, self.center, &self.mapper, Some(node))
        else {
            tracing::debug!("visibility unresolved, keeping previous tiles");
            self.needs_update = true;
            return LayerUpdate::Deferred;
        };

        self.needs_update = false;
        self.apply(result)
    }

    fn apply(&mut self, result: VisibilityResult) -> LayerUpdate {
        let VisibilityResult {
            tiles,
            create,
            reuse,
            remove,
            offset,
        } = result;

        for renderer in &self.renderers {
            let mut r = renderer.borrow_mut();
            r.begin_update(offset);
            for tile in &remove {
                r.remove_tile(tile);
            }
            for tile in &create {
                r.add_tile(tile);
            }
            for tile in &reuse {
                r.reuse_tile(tile);
            }
            r.end_update();
        }

        tracing::debug!(
            created = create.len(),
            reused = reuse.len(),
            removed = remove.len(),
            renderers = self.renderers.len(),
            "map layer updated"
        );
        self.tiles = tiles;
        self.offset = offset;
        LayerUpdate::Applied {
            created: create.len(),
            reused: reuse.len(),
            removed: remove.len(),
        }
    }

    /// Remove every tile from every renderer and detach them all.
    pub fn clear(&mut self) {
        let renderers = std::mem::take(&mut self.renderers);
        for renderer in &renderers {
            let mut r = renderer.borrow_mut();
            r.begin_update(self.offset);
            for tile in &self.tiles {
                r.remove_tile(tile);
            }
            r.end_update();
        }
        self.tiles.clear();
        self.needs_update = true;
    }
}
