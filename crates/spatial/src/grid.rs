use std::collections::{BTreeSet, HashMap, HashSet};
use std::hash::Hash;

use tessera_common::{Aabb2, TileCoordsMapper, TileKey};

use crate::{validate_bounds, SpatialError};

/// Buckets boxes into fixed-size cells keyed by cell coordinate.
///
/// A box is listed in every cell it overlaps, so queries only look at the
/// cells covering the query rectangle.
#[derive(Debug, Clone)]
pub struct SpatialHashGrid<K> {
    mapper: TileCoordsMapper,
    cells: HashMap<TileKey, HashSet<K>>,
    bounds: HashMap<K, Aabb2>,
}

impl<K: Copy + Eq + Hash + Ord> SpatialHashGrid<K> {
    /// Grid with cells of `cell_width` x `cell_height`.
    pub fn new(cell_width: f32, cell_height: f32) -> Result<Self, SpatialError> {
        Ok(Self {
            mapper: TileCoordsMapper::new(cell_width, cell_height)?,
            cells: HashMap::new(),
            bounds: HashMap::new(),
        })
    }

    pub fn mapper(&self) -> &TileCoordsMapper {
        &self.mapper
    }

    /// Cells overlapped by `aabb`; degenerate boxes still occupy one cell.
    fn cells_of(&self, aabb: &Aabb2) -> impl Iterator<Item = TileKey> + use<K> {
        let [left, top, columns, rows] =
            self.mapper
                .get_tile_coords(aabb.left, aabb.top, aabb.width, aabb.height);
        let (columns, rows) = (columns.max(1), rows.max(1));
        (top..top + rows).flat_map(move |y| (left..left + columns).map(move |x| TileKey::new(x, y)))
    }

    /// Index `id` under `aabb`, replacing any previous entry for it.
    pub fn add(&mut self, id: K, aabb: Aabb2) -> Result<(), SpatialError> {
        validate_bounds(&aabb)?;
        self.remove(id);
        for key in self.cells_of(&aabb) {
            self.cells.entry(key).or_default().insert(id);
        }
        self.bounds.insert(id, aabb);
        Ok(())
    }

    /// Drop `id` from every cell it covered.
    pub fn remove(&mut self, id: K) -> bool {
        let Some(aabb) = self.bounds.remove(&id) else {
            return false;
        };
        for key in self.cells_of(&aabb) {
            if let Some(bucket) = self.cells.get_mut(&key) {
                bucket.remove(&id);
                if bucket.is_empty() {
                    self.cells.remove(&key);
                }
            }
        }
        true
    }

    /// Bounds stored for `id`.
    pub fn get(&self, id: K) -> Option<&Aabb2> {
        self.bounds.get(&id)
    }

    /// Everything bucketed in the cells the query covers. May include boxes
    /// that share a cell with the query without touching it.
    pub fn candidates_within(&self, query: &Aabb2) -> BTreeSet<K> {
        let mut found = BTreeSet::new();
        for key in self.cells_of(query) {
            if let Some(bucket) = self.cells.get(&key) {
                found.extend(bucket.iter().copied());
            }
        }
        found
    }

    /// Boxes intersecting `query`.
    pub fn find_within(&self, query: &Aabb2) -> BTreeSet<K> {
        let mut found = self.candidates_within(query);
        found.retain(|id| {
            self.bounds
                .get(id)
                .is_some_and(|b| overlaps(b, query))
        });
        found
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    /// Number of non-empty cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.bounds.clear();
    }
}

/// Intersection that also accepts degenerate boxes lying inside the other.
pub(crate) fn overlaps(a: &Aabb2, b: &Aabb2) -> bool {
    let degenerate = |x: &Aabb2| x.width == 0.0 || x.height == 0.0;
    a.is_intersecting(b)
        || (degenerate(a) && a.is_inside_aabb(b))
        || (degenerate(b) && b.is_inside_aabb(a))
}
