use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::{Rc, Weak};

use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};
use tessera_common::{Aabb2, Camera, Frustum, Plane, SceneNode, Tile, TileCoordsMapper, TileKey};

use super::{VisibilityResult, VisibilityStrategy};
use crate::MapError;

/// Tuning for [`CameraVisibility`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraVisibilityOptions {
    /// Multiplier on the camera far distance for the ground ray.
    pub depth_scale: f32,
    /// Inflation of each cell's box before the frustum test, hides seams.
    pub box_scale: f32,
    /// Height of each cell's box along the plane normal.
    pub tile_thickness: f32,
    /// Pan so the ray hit is the layer center instead of adding to it.
    pub look_at_center: bool,
    /// On a ground miss return a removal-only result instead of nothing.
    pub clear_on_miss: bool,
    /// Upper bound on cells collected by one walk.
    pub max_tiles: usize,
}

impl Default for CameraVisibilityOptions {
    fn default() -> Self {
        Self {
            depth_scale: 1.0,
            box_scale: 1.01,
            tile_thickness: 0.0,
            look_at_center: false,
            clear_on_miss: false,
            max_tiles: 65_536,
        }
    }
}

impl CameraVisibilityOptions {
    /// Reject non-positive scales and out-of-range limits.
    pub fn validate(&self) -> Result<(), MapError> {
        let positive = |name, v: f32| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(MapError::InvalidOption { name, value: v })
            }
        };
        positive("depth_scale", self.depth_scale)?;
        positive("box_scale", self.box_scale)?;
        if !(self.tile_thickness.is_finite() && self.tile_thickness >= 0.0) {
            return Err(MapError::InvalidOption {
                name: "tile_thickness",
                value: self.tile_thickness,
            });
        }
        if self.max_tiles == 0 {
            return Err(MapError::InvalidOption {
                name: "max_tiles",
                value: 0.0,
            });
        }
        Ok(())
    }
}

/// Everything the walk reads. Equal inputs give an equal visible set.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Dependencies {
    depth: f32,
    options: CameraVisibilityOptions,
    center: Vec2,
    mapper: TileCoordsMapper,
    node: Mat4,
    view: Mat4,
    projection: Mat4,
}

/// Frustum-driven visibility: flood-fills outward from the cell the camera
/// looks at until cells fall outside the frustum.
///
/// The walk only reaches cells connected to the seed through visible
/// cells. For a convex frustum over a flat plane that is every visible
/// cell; extreme near-plane poses that split the visible region into two
/// lobes only see the lobe containing the seed.
#[derive(Debug)]
pub struct CameraVisibility {
    camera: Weak<RefCell<Camera>>,
    options: CameraVisibilityOptions,
    cache: Option<Dependencies>,
    last_tiles: Vec<TileKey>,
    last_offset: Vec2,
    walks: u64,
}

impl CameraVisibility {
    /// Strategy following `camera`, validated `options`.
    pub fn new(
        camera: &Rc<RefCell<Camera>>,
        options: CameraVisibilityOptions,
    ) -> Result<Self, MapError> {
        options.validate()?;
        Ok(Self {
            camera: Rc::downgrade(camera),
            options,
            cache: None,
            last_tiles: Vec::new(),
            last_offset: Vec2::ZERO,
            walks: 0,
        })
    }

    pub fn options(&self) -> &CameraVisibilityOptions {
        &self.options
    }

    /// Replace the options after validating them.
    pub fn set_options(&mut self, options: CameraVisibilityOptions) -> Result<(), MapError> {
        options.validate()?;
        self.options = options;
        Ok(())
    }

    /// Follow another camera.
    pub fn set_camera(&mut self, camera: &Rc<RefCell<Camera>>) {
        self.camera = Rc::downgrade(camera);
        self.cache = None;
    }

    /// Number of full walks performed, short-circuited calls excluded.
    pub fn walk_count(&self) -> u64 {
        self.walks
    }

    fn cached(&self, deps: &Dependencies, previous: &[Tile]) -> bool {
        self.cache.as_ref() == Some(deps)
            && previous.len() == self.last_tiles.len()
            && previous
                .iter()
                .zip(&self.last_tiles)
                .all(|(t, k)| t.key() == *k)
    }

    /// World-space bounds of a cell, inflated by `box_scale`.
    fn cell_world_box(&self, view: &Aabb2, offset: Vec2, node: &Mat4) -> (Vec3, Vec3) {
        let cx = view.center_x() - offset.x;
        let cz = view.center_y() - offset.y;
        let hx = view.width * 0.5 * self.options.box_scale;
        let hz = view.height * 0.5 * self.options.box_scale;
        let hy = self.options.tile_thickness * 0.5;
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for dx in [-hx, hx] {
            for dy in [-hy, hy] {
                for dz in [-hz, hz] {
                    let p = node.transform_point3(Vec3::new(cx + dx, dy, cz + dz));
                    min = min.min(p);
                    max = max.max(p);
                }
            }
        }
        (min, max)
    }

    fn cell_visible(
        &self,
        key: TileKey,
        offset: Vec2,
        mapper: &TileCoordsMapper,
        node: &Mat4,
        frustum: &Frustum,
    ) -> bool {
        let (min, max) = self.cell_world_box(&mapper.tile_view(key.x, key.y), offset, node);
        frustum.intersects_box(min, max)
    }

    /// Ground hit of the camera's forward ray, in layer-local plane
    /// coordinates.
    fn ground_point(camera: &Camera, depth: f32, node: &Mat4) -> Option<Vec2> {
        let origin = node.transform_point3(Vec3::ZERO);
        let normal = node.inverse().transpose().transform_vector3(Vec3::Y);
        let plane = Plane::from_point_normal(origin, normal);
        let start = camera.position;
        let end = start + camera.forward() * depth;
        let hit = plane.intersect_segment(start, end)?;
        let local = node.inverse().transform_point3(hit);
        Some(Vec2::new(local.x, local.z))
    }

    fn miss(&mut self, previous: &[Tile]) -> Option<VisibilityResult> {
        self.cache = None;
        if self.options.clear_on_miss {
            self.last_tiles.clear();
            Some(VisibilityResult::removal_only(previous, self.last_offset))
        } else {
            None
        }
    }
}

impl VisibilityStrategy for CameraVisibility {
    fn compute_visible_tiles(
        &mut self,
        previous: &[Tile],
        center: Vec2,
        mapper: &TileCoordsMapper,
        node: Option<&dyn SceneNode>,
    ) -> Option<VisibilityResult> {
        let camera = *self.camera.upgrade()?.borrow();
        let node_matrix = node.map_or(Mat4::IDENTITY, |n| n.world_matrix());
        let deps = Dependencies {
            depth: camera.far() * self.options.depth_scale,
            options: self.options,
            center,
            mapper: *mapper,
            node: node_matrix,
            view: camera.view_matrix(),
            projection: camera.projection_matrix(),
        };

        if self.cached(&deps, previous) {
            tracing::trace!(tiles = previous.len(), "camera visibility unchanged");
            return Some(VisibilityResult::all_reuse(previous.to_vec(), self.last_offset));
        }

        let Some(local) = Self::ground_point(&camera, deps.depth, &node_matrix) else {
            tracing::trace!("camera ray misses the ground plane");
            return self.miss(previous);
        };
        let (offset, seed_point) = if self.options.look_at_center {
            (center - local, center)
        } else {
            (center, center + local)
        };

        let _span = tracing::trace_span!("frustum_walk").entered();
        self.walks += 1;
        let frustum = Frustum::from_view_projection(deps.projection * deps.view);
        let (sx, sy) = mapper.tile_at(seed_point.x, seed_point.y);
        let seed = TileKey::new(sx, sy);

        let mut old: HashMap<TileKey, &Tile> = previous
            .iter()
            .filter(|t| t.view == mapper.tile_view(t.x, t.y))
            .map(|t| (t.key(), t))
            .collect();
        let mut queue = VecDeque::from([seed]);
        let mut visited = HashSet::from([seed]);
        let mut sorted: Vec<(f32, Tile)> = Vec::new();
        let mut create = Vec::new();
        let mut reuse = Vec::new();

        while let Some(key) = queue.pop_front() {
            if !self.cell_visible(key, offset, mapper, &node_matrix, &frustum) {
                continue;
            }
            let tile = Tile::from_mapper(mapper, key.x, key.y);
            let world_center = node_matrix.transform_point3(Vec3::new(
                tile.view.center_x() - offset.x,
                0.0,
                tile.view.center_y() - offset.y,
            ));
            let distance = world_center.distance(camera.position);
            let at = sorted.partition_point(|(d, _)| *d <= distance);
            sorted.insert(at, (distance, tile));

            if old.remove(&key).is_some() {
                reuse.push(tile);
            } else {
                create.push(tile);
            }

            if sorted.len() >= self.options.max_tiles {
                tracing::warn!(
                    max_tiles = self.options.max_tiles,
                    "frustum walk truncated"
                );
                break;
            }
            for n in key.neighbours() {
                if visited.insert(n) {
                    queue.push_back(n);
                }
            }
        }

        let kept: HashSet<TileKey> = reuse.iter().map(Tile::key).collect();
        let remove: Vec<Tile> = previous
            .iter()
            .filter(|t| !kept.contains(&t.key()))
            .copied()
            .collect();
        let tiles: Vec<Tile> = sorted.into_iter().map(|(_, t)| t).collect();

        tracing::trace!(
            visible = tiles.len(),
            created = create.len(),
            reused = reuse.len(),
            removed = remove.len(),
            "camera visibility"
        );

        self.cache = Some(deps);
        self.last_tiles = tiles.iter().map(Tile::key).collect();
        self.last_offset = offset;
        Some(VisibilityResult {
            tiles,
            create,
            reuse,
            remove,
            offset,
        })
    }

    /// The camera can move without the layer knowing; the dependency cache
    /// makes the unchanged case cheap.
    fn needs_update(&self) -> bool {
        true
    }
}
