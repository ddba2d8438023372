use std::collections::{BTreeMap, BTreeSet};

use glam::Vec2;
use tessera_common::{Aabb2, Quadrant};

use crate::grid::overlaps;
use crate::{validate_bounds, SpatialError};

/// Weight of an item cut by a split line, relative to one item of imbalance.
const STRADDLE_PENALTY: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadTreeOptions {
    /// Nodes holding at most this many items are not split.
    pub leaf_size: usize,
    pub max_depth: usize,
}

impl Default for QuadTreeOptions {
    fn default() -> Self {
        Self {
            leaf_size: 4,
            max_depth: 8,
        }
    }
}

#[derive(Debug, Clone)]
struct Node<K> {
    origin: Vec2,
    /// Items that straddle the origin lines, or every item of a leaf.
    items: Vec<(K, Aabb2)>,
    children: Option<Box<[Node<K>; 4]>>,
    /// Item count a leaf must reach before another split attempt, doubled
    /// after each attempt that finds no useful line.
    retry_at: usize,
}

#[derive(Debug, Clone, Copy)]
enum Axis {
    X,
    Y,
}

impl Axis {
    /// `(start, end)` of a box along this axis.
    fn span(self, b: &Aabb2) -> (f32, f32) {
        match self {
            Axis::X => (b.left, b.right()),
            Axis::Y => (b.top, b.bottom()),
        }
    }
}

/// Best split line along `axis`: the item edge that balances the two sides
/// while cutting few items. `None` when no line beats leaving the node whole.
fn best_split<K>(items: &[(K, Aabb2)], axis: Axis) -> Option<f32> {
    let n = items.len() as f32;
    let mut best: Option<(f32, f32)> = None;
    for (_, candidate) in items {
        let c = axis.span(candidate).0;
        let (mut before, mut after) = (0usize, 0usize);
        for (_, b) in items {
            let (start, end) = axis.span(b);
            if start >= c {
                after += 1;
            } else if end <= c {
                before += 1;
            }
        }
        if before == 0 || after == 0 {
            continue;
        }
        let straddle = items.len() - before - after;
        let score =
            ((before as f32 - after as f32).abs() + STRADDLE_PENALTY * straddle as f32) / n;
        if score < 1.0 && best.is_none_or(|(s, _)| score < s) {
            best = Some((score, c));
        }
    }
    best.map(|(_, c)| c)
}

/// Inclusive variant of the quadrant test, so a query whose edge lies on an
/// origin line still visits the side that owns boxes on that line.
fn query_reaches(query: &Aabb2, quadrant: Quadrant, origin: Vec2) -> bool {
    let west = query.left <= origin.x;
    let east = query.right() >= origin.x;
    let north = query.top <= origin.y;
    let south = query.bottom() >= origin.y;
    match quadrant {
        Quadrant::NorthWest => west && north,
        Quadrant::NorthEast => east && north,
        Quadrant::SouthEast => east && south,
        Quadrant::SouthWest => west && south,
    }
}

impl<K: Copy + Ord> Node<K> {
    fn leaf() -> Self {
        Self {
            origin: Vec2::ZERO,
            items: Vec::new(),
            children: None,
            retry_at: 0,
        }
    }

    fn split(&mut self, depth: usize, options: &QuadTreeOptions) {
        if self.items.len() <= options.leaf_size
            || self.items.len() < self.retry_at
            || depth >= options.max_depth
        {
            return;
        }
        let x = best_split(&self.items, Axis::X);
        let y = best_split(&self.items, Axis::Y);
        if x.is_none() && y.is_none() {
            self.retry_at = self.items.len() * 2;
            return;
        }
        // An unsplit axis sends everything east / south.
        self.origin = Vec2::new(x.unwrap_or(f32::NEG_INFINITY), y.unwrap_or(f32::NEG_INFINITY));

        let mut children: Box<[Node<K>; 4]> = Box::new(std::array::from_fn(|_| Node::leaf()));
        let items = std::mem::take(&mut self.items);
        for (id, b) in items {
            match b.quadrant(self.origin.x, self.origin.y) {
                Some(q) => children[q.index()].items.push((id, b)),
                None => self.items.push((id, b)),
            }
        }
        for child in children.iter_mut() {
            child.split(depth + 1, options);
        }
        self.children = Some(children);
    }

    fn insert(&mut self, id: K, b: Aabb2, depth: usize, options: &QuadTreeOptions) {
        match &mut self.children {
            Some(children) => match b.quadrant(self.origin.x, self.origin.y) {
                Some(q) => children[q.index()].insert(id, b, depth + 1, options),
                None => self.items.push((id, b)),
            },
            None => {
                self.items.push((id, b));
                self.split(depth, options);
            }
        }
    }

    fn remove(&mut self, id: K, b: &Aabb2) -> bool {
        if let Some(i) = self.items.iter().position(|(k, _)| *k == id) {
            self.items.swap_remove(i);
            return true;
        }
        match (&mut self.children, b.quadrant(self.origin.x, self.origin.y)) {
            (Some(children), Some(q)) => children[q.index()].remove(id, b),
            _ => false,
        }
    }

    fn query(&self, query: &Aabb2, out: &mut BTreeSet<K>) {
        out.extend(
            self.items
                .iter()
                .filter(|(_, b)| overlaps(b, query))
                .map(|(k, _)| *k),
        );
        if let Some(children) = &self.children {
            for q in Quadrant::ALL {
                if query_reaches(query, q, self.origin) {
                    children[q.index()].query(query, out);
                }
            }
        }
    }

    fn depth(&self) -> usize {
        self.children
            .as_ref()
            .map_or(0, |c| 1 + c.iter().map(Node::depth).max().unwrap_or(0))
    }

    fn node_count(&self) -> usize {
        1 + self
            .children
            .as_ref()
            .map_or(0, |c| c.iter().map(Node::node_count).sum())
    }
}

/// Quadtree whose split points adapt to the data rather than halving space.
#[derive(Debug, Clone)]
pub struct QuadTree<K> {
    root: Node<K>,
    bounds: BTreeMap<K, Aabb2>,
    options: QuadTreeOptions,
}

impl<K: Copy + Ord> QuadTree<K> {
    /// Empty tree; splits happen as items arrive.
    pub fn new(options: QuadTreeOptions) -> Self {
        Self {
            root: Node::leaf(),
            bounds: BTreeMap::new(),
            options,
        }
    }

    /// Build in one pass, choosing every split with all items known.
    pub fn build(
        items: impl IntoIterator<Item = (K, Aabb2)>,
        options: QuadTreeOptions,
    ) -> Result<Self, SpatialError> {
        let mut bounds = BTreeMap::new();
        for (id, b) in items {
            validate_bounds(&b)?;
            bounds.insert(id, b);
        }
        let mut root = Node::leaf();
        root.items = bounds.iter().map(|(k, b)| (*k, *b)).collect();
        root.split(0, &options);
        tracing::debug!(
            items = bounds.len(),
            depth = root.depth(),
            nodes = root.node_count(),
            "quadtree built"
        );
        Ok(Self {
            root,
            bounds,
            options,
        })
    }

    /// Index `id`, replacing any previous entry.
    pub fn insert(&mut self, id: K, b: Aabb2) -> Result<(), SpatialError> {
        validate_bounds(&b)?;
        self.remove(id);
        self.root.insert(id, b, 0, &self.options);
        self.bounds.insert(id, b);
        Ok(())
    }

    /// `false` if `id` was not indexed.
    pub fn remove(&mut self, id: K) -> bool {
        match self.bounds.remove(&id) {
            Some(b) => self.root.remove(id, &b),
            None => false,
        }
    }

    /// Ids whose bounds overlap `query`.
    pub fn find_within(&self, query: &Aabb2) -> BTreeSet<K> {
        let mut out = BTreeSet::new();
        self.root.query(query, &mut out);
        out
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    /// Levels below the root.
    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    pub fn node_count(&self) -> usize {
        self.root.node_count()
    }
}
