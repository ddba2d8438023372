use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use glam::{Vec2, Vec3};
use tessera_common::{Tile, TileKey};
use tessera_map::{TileDataProvider, TileRenderer};
use tessera_vertex::{
    Attr, AttributeSpec, UsageType, VertexError, VertexObjectDescriptor, VertexObjectPool,
    VoHandle,
};

use crate::atlas::TileSet;
use crate::geometry::{InstancedGeometry, Touch};
use crate::RenderError;

const QUAD: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

const SPRITE_ATTRIBUTES: [Touch<'static>; 3] = [
    Touch::Attribute("offset"),
    Touch::Attribute("size"),
    Touch::Attribute("texCoords"),
];

/// Unit quad, corners `(0,0)..(1,1)`, two triangles.
pub fn sprite_base_descriptor() -> Result<VertexObjectDescriptor, VertexError> {
    VertexObjectDescriptor::builder()
        .vertex_count(4)
        .indices([0, 1, 2, 0, 2, 3])
        .attribute("position", AttributeSpec::named(&["x", "y"]))
        .build()
}

/// Per-sprite placement, size and atlas rectangle.
pub fn sprite_instance_descriptor() -> Result<VertexObjectDescriptor, VertexError> {
    VertexObjectDescriptor::builder()
        .mesh_count(1)
        .attribute(
            "offset",
            AttributeSpec::named(&["x", "y", "z"]).usage(UsageType::Dynamic),
        )
        .attribute(
            "size",
            AttributeSpec::named(&["width", "height"]).usage(UsageType::Dynamic),
        )
        .attribute(
            "texCoords",
            AttributeSpec::named(&["s", "t", "u", "v"]).usage(UsageType::Dynamic),
        )
        .build()
}

/// Base quad plus an instance pool of `capacity` sprites.
pub fn sprite_geometry(capacity: usize) -> Result<InstancedGeometry, RenderError> {
    let mut base = VertexObjectPool::new(sprite_base_descriptor()?, 1);
    let position = base.attr::<f32>("position")?;
    if let Some(quad) = base.create_vo() {
        for (vertex, corner) in QUAD.iter().enumerate() {
            base.set_vertex(quad, &position, vertex, corner)?;
        }
    }
    let instances = VertexObjectPool::new(sprite_instance_descriptor()?, capacity);
    Ok(InstancedGeometry::new(instances).with_base(base))
}

#[derive(Debug, Clone, Copy)]
struct SpriteAttrs {
    offset: Attr<f32>,
    size: Attr<f32>,
    tex_coords: Attr<f32>,
}

impl SpriteAttrs {
    fn resolve(pool: &VertexObjectPool) -> Result<Self, VertexError> {
        Ok(Self {
            offset: pool.attr("offset")?,
            size: pool.attr("size")?,
            tex_coords: pool.attr("texCoords")?,
        })
    }
}

/// Draws visible tiles as instanced atlas sprites.
///
/// Needs geometry, a tile data provider and a tile set. Tiles arriving
/// before all three are bound wait in a deferred set and are flushed, with
/// a single touch, once the last one arrives.
#[derive(Default)]
pub struct TileSpriteRenderer {
    geometry: Option<Rc<RefCell<InstancedGeometry>>>,
    attrs: Option<SpriteAttrs>,
    provider: Option<Rc<dyn TileDataProvider>>,
    tile_set: Option<Rc<TileSet>>,
    /// Every tile the layer currently shows here, drawn or not.
    shown: BTreeMap<TileKey, Tile>,
    sprites: HashMap<TileKey, (VoHandle, Tile)>,
    deferred: BTreeMap<TileKey, Tile>,
    offset: Vec2,
    changed: bool,
}

impl std::fmt::Debug for TileSpriteRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileSpriteRenderer")
            .field("ready", &self.is_ready())
            .field("shown", &self.shown.len())
            .field("sprites", &self.sprites.len())
            .field("deferred", &self.deferred.len())
            .field("offset", &self.offset)
            .finish()
    }
}

impl TileSpriteRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the target geometry; its instance pool must carry the sprite
    /// attributes. Shown tiles are re-queued.
    pub fn set_geometry(
        &mut self,
        geometry: Rc<RefCell<InstancedGeometry>>,
    ) -> Result<(), RenderError> {
        let attrs = SpriteAttrs::resolve(geometry.borrow().instances())?;
        self.release_sprites();
        self.geometry = Some(geometry);
        self.attrs = Some(attrs);
        self.flush_deferred();
        Ok(())
    }

    /// Swap the tile data; every shown tile is resolved again.
    pub fn set_provider(&mut self, provider: Rc<dyn TileDataProvider>) {
        self.release_sprites();
        self.provider = Some(provider);
        self.flush_deferred();
    }

    /// Swap the atlas mapping; every shown tile is resolved again.
    pub fn set_tile_set(&mut self, tile_set: Rc<TileSet>) {
        self.release_sprites();
        self.tile_set = Some(tile_set);
        self.flush_deferred();
    }

    pub fn geometry(&self) -> Option<&Rc<RefCell<InstancedGeometry>>> {
        self.geometry.as_ref()
    }

    /// Geometry, provider and tile set are all bound.
    pub fn is_ready(&self) -> bool {
        self.attrs.is_some() && self.provider.is_some() && self.tile_set.is_some()
    }

    /// Sprites currently holding a pool slot.
    pub fn tile_count(&self) -> usize {
        self.sprites.len()
    }

    /// Tiles waiting for the renderer to become ready.
    pub fn deferred_count(&self) -> usize {
        self.deferred.len()
    }

    /// Offset from the last `begin_update`.
    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    /// Translation for the sprite node, relative to the layer node.
    pub fn node_translation(&self) -> Vec3 {
        Vec3::new(-self.offset.x, 0.0, -self.offset.y)
    }

    /// Tiles the layer has dispatched here and not removed, including
    /// empty cells and tiles still waiting for readiness.
    pub fn shown_count(&self) -> usize {
        self.shown.len()
    }

    /// Free every slot and queue every shown tile again, so a provider,
    /// tile set or geometry swap re-resolves empty cells too.
    fn release_sprites(&mut self) {
        if !self.sprites.is_empty() {
            if let Some(geometry) = &self.geometry {
                let mut geometry = geometry.borrow_mut();
                for (handle, _) in self.sprites.values() {
                    geometry.instances_mut().free_vo(*handle);
                }
                geometry.touch(&SPRITE_ATTRIBUTES);
            }
            self.sprites.clear();
        }
        self.deferred
            .extend(self.shown.iter().map(|(key, tile)| (*key, *tile)));
    }

    fn flush_deferred(&mut self) {
        if !self.is_ready() || self.deferred.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut self.deferred);
        tracing::debug!(tiles = pending.len(), "flushing deferred sprites");
        for tile in pending.values() {
            self.add_sprite(tile);
        }
        self.touch();
    }

    fn touch(&mut self) {
        if let Some(geometry) = &self.geometry {
            geometry.borrow_mut().touch(&SPRITE_ATTRIBUTES);
        }
        self.changed = false;
    }

    fn add_sprite(&mut self, tile: &Tile) {
        let key = tile.key();
        let (Some(geometry), Some(attrs), Some(provider), Some(tile_set)) =
            (&self.geometry, &self.attrs, &self.provider, &self.tile_set)
        else {
            self.deferred.insert(key, *tile);
            return;
        };
        if self.sprites.contains_key(&key) {
            return;
        }
        let id = provider.tile_id_at(tile.x, tile.y);
        if id == 0 {
            return;
        }
        let Some(frame) = tile_set.frame(id) else {
            tracing::debug!(id, "tile id has no atlas frame");
            return;
        };

        let mut geometry = geometry.borrow_mut();
        let pool = geometry.instances_mut();
        let Some(handle) = pool.create_vo() else {
            tracing::warn!(
                capacity = pool.capacity(),
                tile = %tile.id(),
                "sprite pool exhausted, tile skipped"
            );
            return;
        };
        let written = pool.vo_mut(handle).map(|mut vo| {
            vo.set(&attrs.offset, &[tile.view.left, 0.0, tile.view.top])?
                .set(&attrs.size, &[tile.view.width, tile.view.height])?
                .set(&attrs.tex_coords, &frame.coords.as_array())
                .map(|_| ())
        });
        if let Some(Err(err)) = written {
            tracing::warn!(%err, tile = %tile.id(), "sprite write failed, tile skipped");
            pool.free_vo(handle);
            return;
        }
        drop(geometry);
        self.sprites.insert(key, (handle, *tile));
        self.changed = true;
    }
}

impl TileRenderer for TileSpriteRenderer {
    fn begin_update(&mut self, offset: Vec2) {
        self.offset = offset;
    }

    fn add_tile(&mut self, tile: &Tile) {
        self.shown.insert(tile.key(), *tile);
        if self.is_ready() {
            self.add_sprite(tile);
        } else {
            self.deferred.insert(tile.key(), *tile);
        }
    }

    fn reuse_tile(&mut self, tile: &Tile) {
        if !self.sprites.contains_key(&tile.key()) {
            self.add_tile(tile);
        }
    }

    fn remove_tile(&mut self, tile: &Tile) {
        let key = tile.key();
        self.shown.remove(&key);
        if self.deferred.remove(&key).is_some() {
            return;
        }
        if let Some((handle, _)) = self.sprites.remove(&key) {
            if let Some(geometry) = &self.geometry {
                geometry.borrow_mut().instances_mut().free_vo(handle);
            }
            self.changed = true;
        }
    }

    fn end_update(&mut self) {
        if self.changed {
            self.touch();
        }
    }

    fn dispose(&mut self) {
        self.shown.clear();
        self.deferred.clear();
        if self.sprites.is_empty() {
            return;
        }
        if let Some(geometry) = &self.geometry {
            let mut geometry = geometry.borrow_mut();
            for (handle, _) in self.sprites.values() {
                geometry.instances_mut().free_vo(*handle);
            }
        }
        self.sprites.clear();
        self.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::{AtlasGridConfig, TextureAtlas};
    use tessera_common::TileCoordsMapper;
    use tessera_map::RepeatingTilesProvider;

    fn grid() -> TileCoordsMapper {
        TileCoordsMapper::new(2.0, 2.0).unwrap()
    }

    fn tile(x: i32, y: i32) -> Tile {
        Tile::from_mapper(&grid(), x, y)
    }

    fn tile_set() -> Rc<TileSet> {
        let atlas = TextureAtlas::from_grid(&AtlasGridConfig {
            image_width: 64,
            image_height: 16,
            frame_width: 16,
            frame_height: 16,
            columns: 4,
            rows: 1,
            padding: 0,
        })
        .unwrap();
        Rc::new(TileSet::new(atlas).unwrap())
    }

    fn provider(pattern: Vec<Vec<u32>>) -> Rc<dyn TileDataProvider> {
        Rc::new(RepeatingTilesProvider::new(pattern).unwrap())
    }

    fn ready(capacity: usize) -> (TileSpriteRenderer, Rc<RefCell<InstancedGeometry>>) {
        let geometry = Rc::new(RefCell::new(sprite_geometry(capacity).unwrap()));
        let mut r = TileSpriteRenderer::new();
        r.set_geometry(geometry.clone()).unwrap();
        r.set_provider(provider(vec![vec![1, 2], vec![3, 4]]));
        r.set_tile_set(tile_set());
        (r, geometry)
    }

    fn tex_coords_of_first(geometry: &Rc<RefCell<InstancedGeometry>>) -> Vec<f32> {
        let g = geometry.borrow();
        let pool = g.instances();
        let attr = pool.attr::<f32>("texCoords").unwrap();
        let handle = pool.handles().next().unwrap();
        pool.get(handle, &attr).unwrap().to_vec()
    }

    #[test]
    fn base_quad_is_written() {
        let g = sprite_geometry(4).unwrap();
        let base = g.base().unwrap();
        let position = base.attr::<f32>("position").unwrap();
        let quad = base.handles().next().unwrap();
        assert_eq!(base.get_vertex(quad, &position, 2), Some(&[1.0, 1.0][..]));
        assert_eq!(base.descriptor().indices(), Some(&[0, 1, 2, 0, 2, 3][..]));
    }

    #[test]
    fn tiles_wait_until_ready() {
        let geometry = Rc::new(RefCell::new(sprite_geometry(8).unwrap()));
        let mut r = TileSpriteRenderer::new();
        r.set_geometry(geometry.clone()).unwrap();
        r.add_tile(&tile(0, 0));
        r.add_tile(&tile(1, 0));
        r.add_tile(&tile(1, 1));
        r.remove_tile(&tile(1, 0));
        assert_eq!(r.deferred_count(), 2);
        assert_eq!(r.tile_count(), 0);
        assert_eq!(geometry.borrow().instances().used_count(), 0);

        r.set_provider(provider(vec![vec![1, 2], vec![3, 4]]));
        assert!(!r.is_ready());
        r.set_tile_set(tile_set());
        assert!(r.is_ready());
        assert_eq!(r.deferred_count(), 0);
        assert_eq!(r.tile_count(), 2);
        assert_eq!(geometry.borrow().instances().used_count(), 2);
    }

    #[test]
    fn sprites_carry_tile_geometry_and_frame() {
        let (mut r, geometry) = ready(8);
        // id 4 -> frame 3, the last column
        r.add_tile(&tile(1, 1));
        let g = geometry.borrow();
        let pool = g.instances();
        let h = pool.handles().next().unwrap();
        assert_eq!(
            pool.get(h, &pool.attr::<f32>("offset").unwrap()),
            Some(&[2.0, 0.0, 2.0][..])
        );
        assert_eq!(
            pool.get(h, &pool.attr::<f32>("size").unwrap()),
            Some(&[2.0, 2.0][..])
        );
        drop(g);
        assert_eq!(tex_coords_of_first(&geometry), vec![0.75, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn empty_cells_take_no_slot() {
        let (mut r, geometry) = ready(8);
        r.set_provider(provider(vec![vec![0, 1]]));
        r.add_tile(&tile(0, 0));
        r.add_tile(&tile(1, 0));
        assert_eq!(r.tile_count(), 1);
        assert_eq!(geometry.borrow().instances().used_count(), 1);
    }

    #[test]
    fn capacity_exhaustion_skips_tiles() {
        let (mut r, geometry) = ready(2);
        for x in 0..4 {
            r.add_tile(&tile(x, 0));
        }
        assert_eq!(r.tile_count(), 2);
        assert!(geometry.borrow().instances().is_full());

        r.remove_tile(&tile(0, 0));
        r.reuse_tile(&tile(3, 0));
        assert_eq!(r.tile_count(), 2);
    }

    #[test]
    fn remove_frees_the_slot() {
        let (mut r, geometry) = ready(8);
        r.add_tile(&tile(0, 0));
        r.add_tile(&tile(1, 0));
        r.remove_tile(&tile(0, 0));
        r.remove_tile(&tile(0, 0));
        assert_eq!(r.tile_count(), 1);
        assert_eq!(geometry.borrow().instances().used_count(), 1);
        // the survivor moved into slot 0 and kept its frame
        assert_eq!(tex_coords_of_first(&geometry), vec![0.25, 0.0, 0.5, 1.0]);
    }

    #[test]
    fn reuse_adds_untracked_tiles_only() {
        let (mut r, geometry) = ready(8);
        r.add_tile(&tile(0, 0));
        r.reuse_tile(&tile(0, 0));
        assert_eq!(geometry.borrow().instances().used_count(), 1);
        r.reuse_tile(&tile(1, 0));
        assert_eq!(geometry.borrow().instances().used_count(), 2);
    }

    #[test]
    fn end_update_touches_after_changes() {
        let (mut r, geometry) = ready(8);
        let serial = || geometry.borrow().instances().buffers()[0].serial();

        r.begin_update(Vec2::ZERO);
        r.end_update();
        let idle = serial();
        r.begin_update(Vec2::ZERO);
        r.end_update();
        assert_eq!(serial(), idle);

        r.begin_update(Vec2::ZERO);
        r.add_tile(&tile(0, 0));
        let written = serial();
        r.end_update();
        assert!(serial() > written);
    }

    #[test]
    fn provider_swap_rewrites_frames() {
        let (mut r, geometry) = ready(8);
        r.add_tile(&tile(0, 0));
        assert_eq!(tex_coords_of_first(&geometry), vec![0.0, 0.0, 0.25, 1.0]);
        r.set_provider(provider(vec![vec![3]]));
        assert_eq!(r.tile_count(), 1);
        assert_eq!(tex_coords_of_first(&geometry), vec![0.5, 0.0, 0.75, 1.0]);
    }

    #[test]
    fn provider_swap_revisits_empty_cells() {
        let (mut r, geometry) = ready(8);
        r.set_provider(provider(vec![vec![1, 0]]));
        for x in 0..4 {
            r.add_tile(&tile(x, 0));
        }
        assert_eq!(r.tile_count(), 2);
        assert_eq!(r.shown_count(), 4);

        r.set_provider(provider(vec![vec![2]]));
        assert_eq!(r.tile_count(), 4);
        assert_eq!(r.deferred_count(), 0);
        assert_eq!(geometry.borrow().instances().used_count(), 4);

        r.remove_tile(&tile(1, 0));
        r.set_provider(provider(vec![vec![0, 3]]));
        assert_eq!(r.shown_count(), 3);
        assert_eq!(r.tile_count(), 1);
    }

    #[test]
    fn offset_becomes_node_translation() {
        let (mut r, _geometry) = ready(8);
        r.begin_update(Vec2::new(3.0, -4.0));
        assert_eq!(r.offset(), Vec2::new(3.0, -4.0));
        assert_eq!(r.node_translation(), Vec3::new(-3.0, 0.0, 4.0));
    }

    #[test]
    fn dispose_releases_everything() {
        let (mut r, geometry) = ready(8);
        r.add_tile(&tile(0, 0));
        r.add_tile(&tile(1, 0));
        r.dispose();
        assert_eq!(r.tile_count(), 0);
        assert_eq!(geometry.borrow().instances().used_count(), 0);
    }
}
