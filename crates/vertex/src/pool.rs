use std::marker::PhantomData;
use std::ops::Range;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::VertexError;
use crate::buffer::{BufferData, Component, VertexObjectBuffer};
use crate::descriptor::{UsageType, VertexObjectDescriptor};

static NEXT_POOL_ID: AtomicU32 = AtomicU32::new(1);

fn next_pool_id() -> u32 {
    NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed)
}

/// Handle to a live vertex object.
///
/// Stays valid across swap-with-last compaction; becomes stale once freed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoHandle {
    pool: u32,
    entry: u32,
    generation: u32,
}

#[derive(Debug, Clone, Copy)]
struct HandleEntry {
    slot: u32,
    generation: u32,
    live: bool,
}

/// Resolved, typed accessor for one attribute (or one component of it).
///
/// Built once per pool with [`VertexObjectPool::attr`]; every read and write
/// through it is plain index arithmetic.
#[derive(Debug)]
pub struct Attr<T> {
    buffer: usize,
    offset: usize,
    size: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Attr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Attr<T> {}

impl<T> Attr<T> {
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn buffer(&self) -> usize {
        self.buffer
    }
}

/// Fixed-capacity structure-of-arrays object pool.
///
/// Slots `[0, used_count)` are always the live objects with no gaps.
/// Freeing a slot moves the last live object into it.
#[derive(Debug)]
pub struct VertexObjectPool {
    id: u32,
    descriptor: VertexObjectDescriptor,
    capacity: usize,
    used: usize,
    buffers: Vec<VertexObjectBuffer>,
    entries: Vec<HandleEntry>,
    free_entries: Vec<u32>,
    /// slot -> entry index
    slot_entries: Vec<u32>,
}

impl Clone for VertexObjectPool {
    /// Independent copy with its own identity; handles of `self` do not
    /// address the copy.
    fn clone(&self) -> Self {
        Self {
            id: next_pool_id(),
            descriptor: self.descriptor.clone(),
            capacity: self.capacity,
            used: self.used,
            buffers: self.buffers.clone(),
            entries: self.entries.clone(),
            free_entries: self.free_entries.clone(),
            slot_entries: self.slot_entries.clone(),
        }
    }
}

impl VertexObjectPool {
    /// Pool of `capacity` objects, all arrays allocated up front.
    pub fn new(descriptor: VertexObjectDescriptor, capacity: usize) -> Self {
        let buffers = descriptor
            .buffers()
            .iter()
            .map(|layout| {
                let len = capacity * descriptor.vertex_count() * layout.item_size;
                VertexObjectBuffer::new(layout.clone(), len)
            })
            .collect();
        Self {
            id: next_pool_id(),
            descriptor,
            capacity,
            used: 0,
            buffers,
            entries: Vec::with_capacity(capacity),
            free_entries: Vec::with_capacity(capacity),
            slot_entries: vec![0; capacity],
        }
    }

    pub fn descriptor(&self) -> &VertexObjectDescriptor {
        &self.descriptor
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Live objects, packed into slots `0..used_count`.
    pub fn used_count(&self) -> usize {
        self.used
    }

    pub fn is_full(&self) -> bool {
        self.used == self.capacity
    }

    pub fn buffers(&self) -> &[VertexObjectBuffer] {
        &self.buffers
    }

    pub fn buffer(&self, index: usize) -> Option<&VertexObjectBuffer> {
        self.buffers.get(index)
    }

    pub fn buffer_mut(&mut self, index: usize) -> Option<&mut VertexObjectBuffer> {
        self.buffers.get_mut(index)
    }

    /// Elements one object occupies in buffer `index`.
    fn stride(&self, buffer: usize) -> usize {
        self.descriptor.vertex_count() * self.buffers[buffer].item_size()
    }

    /// Resolve a typed accessor for `name`.
    pub fn attr<T: Component>(&self, name: &str) -> Result<Attr<T>, VertexError> {
        let layout = self
            .descriptor
            .attribute(name)
            .ok_or_else(|| VertexError::UnknownAttribute(name.to_owned()))?;
        if layout.data_type != T::DATA_TYPE {
            return Err(VertexError::DataTypeMismatch {
                attribute: name.to_owned(),
                declared: layout.data_type,
                requested: T::DATA_TYPE,
            });
        }
        Ok(Attr {
            buffer: layout.buffer,
            offset: layout.offset,
            size: layout.size,
            _marker: PhantomData,
        })
    }

    /// Resolve a single named component, e.g. `("offset", "y")`.
    pub fn component<T: Component>(
        &self,
        name: &str,
        component: &str,
    ) -> Result<Attr<T>, VertexError> {
        let attr = self.attr::<T>(name)?;
        let index = self
            .descriptor
            .attribute(name)
            .and_then(|l| l.component_index(component))
            .ok_or_else(|| VertexError::UnknownComponent {
                attribute: name.to_owned(),
                component: component.to_owned(),
            })?;
        Ok(Attr {
            offset: attr.offset + index,
            size: 1,
            ..attr
        })
    }

    /// Allocate the next slot. `None` when the pool is full.
    pub fn create_vo(&mut self) -> Option<VoHandle> {
        if self.used == self.capacity {
            return None;
        }
        let slot = self.used;
        let entry = match self.free_entries.pop() {
            Some(e) => e,
            None => {
                self.entries.push(HandleEntry {
                    slot: 0,
                    generation: 0,
                    live: false,
                });
                (self.entries.len() - 1) as u32
            }
        };
        let e = &mut self.entries[entry as usize];
        e.slot = slot as u32;
        e.live = true;
        let generation = e.generation;
        self.slot_entries[slot] = entry;
        self.used += 1;
        self.initialise_slot(slot);

        Some(VoHandle {
            pool: self.id,
            entry,
            generation,
        })
    }

    fn initialise_slot(&mut self, slot: usize) {
        for b in 0..self.buffers.len() {
            let stride = self.stride(b);
            let range = slot * stride..(slot + 1) * stride;
            self.buffers[b].data_mut().fill_zero(range.clone());
            self.buffers[b].bump(range);
        }
        let vertex_count = self.descriptor.vertex_count();
        for layout in self.descriptor.attributes() {
            let Some(defaults) = &layout.defaults else {
                continue;
            };
            let buffer = &mut self.buffers[layout.buffer];
            let item_size = buffer.item_size();
            for vertex in 0..vertex_count {
                let start = (slot * vertex_count + vertex) * item_size + layout.offset;
                buffer.data_mut().fill_from_f64(start, defaults);
            }
        }
    }

    /// Release `handle`, moving the last live object into its slot.
    ///
    /// Returns `false` (and does nothing) for foreign or stale handles.
    pub fn free_vo(&mut self, handle: VoHandle) -> bool {
        let Some(slot) = self.slot_of(handle) else {
            return false;
        };
        let last = self.used - 1;
        if slot != last {
            for b in 0..self.buffers.len() {
                let stride = self.stride(b);
                let buffer = &mut self.buffers[b];
                buffer
                    .data_mut()
                    .copy_within(last * stride..(last + 1) * stride, slot * stride);
                buffer.bump(slot * stride..(slot + 1) * stride);
            }
            let moved = self.slot_entries[last];
            self.entries[moved as usize].slot = slot as u32;
            self.slot_entries[slot] = moved;
        } else {
            for buffer in &mut self.buffers {
                let stride = self.descriptor.vertex_count() * buffer.item_size();
                buffer.bump(last * stride..(last + 1) * stride);
            }
        }

        let e = &mut self.entries[handle.entry as usize];
        e.live = false;
        e.generation = e.generation.wrapping_add(1);
        self.free_entries.push(handle.entry);
        self.used -= 1;
        true
    }

    /// Current slot of a live handle.
    pub fn slot_of(&self, handle: VoHandle) -> Option<usize> {
        if handle.pool != self.id {
            return None;
        }
        let e = self.entries.get(handle.entry as usize)?;
        (e.live && e.generation == handle.generation).then_some(e.slot as usize)
    }

    /// Whether `handle` still refers to a live object of this pool.
    pub fn contains(&self, handle: VoHandle) -> bool {
        self.slot_of(handle).is_some()
    }

    /// Live handles in slot order.
    pub fn handles(&self) -> impl Iterator<Item = VoHandle> + '_ {
        self.slot_entries[..self.used].iter().map(move |&entry| VoHandle {
            pool: self.id,
            entry,
            generation: self.entries[entry as usize].generation,
        })
    }

    /// Free every object. Outstanding handles become stale.
    pub fn clear(&mut self) {
        for slot in 0..self.used {
            let entry = self.slot_entries[slot];
            let e = &mut self.entries[entry as usize];
            e.live = false;
            e.generation = e.generation.wrapping_add(1);
            self.free_entries.push(entry);
        }
        if self.used > 0 {
            for b in 0..self.buffers.len() {
                let end = self.used * self.stride(b);
                self.buffers[b].bump(0..end);
            }
        }
        self.used = 0;
    }

    /// Grow (or shrink down to `used_count`) and reallocate every array.
    pub fn resize(&mut self, capacity: usize) -> Result<(), VertexError> {
        if capacity < self.used {
            return Err(VertexError::CapacityBelowUsage {
                requested: capacity,
                used: self.used,
            });
        }
        if capacity == self.capacity {
            return Ok(());
        }
        for b in 0..self.buffers.len() {
            let len = capacity * self.stride(b);
            self.buffers[b].reallocate(len);
        }
        self.slot_entries.resize(capacity, 0);
        self.entries.reserve(capacity.saturating_sub(self.entries.len()));
        self.free_entries
            .reserve(capacity.saturating_sub(self.free_entries.len()));
        tracing::debug!(from = self.capacity, to = capacity, "vertex object pool resized");
        self.capacity = capacity;
        Ok(())
    }

    /// Mark whole buffers of the given usage as dirty, e.g. after writing
    /// static attributes that are not tracked automatically.
    pub fn touch_usage(&mut self, usage: UsageType) {
        for b in 0..self.buffers.len() {
            if self.buffers[b].usage() == usage {
                let end = self.used * self.stride(b);
                self.buffers[b].bump(0..end);
            }
        }
    }

    /// Mark the live range of buffer `index` dirty.
    pub fn touch_buffer(&mut self, index: usize) {
        if index < self.buffers.len() {
            let end = self.used * self.stride(index);
            self.buffers[index].bump(0..end);
        }
    }

    fn element_range<T>(&self, slot: usize, attr: &Attr<T>, vertex: usize) -> Range<usize> {
        let vertex_count = self.descriptor.vertex_count();
        debug_assert!(vertex < vertex_count, "vertex {vertex} out of {vertex_count}");
        let item_size = self.buffers[attr.buffer].item_size();
        let start = (slot * vertex_count + vertex) * item_size + attr.offset;
        start..start + attr.size
    }

    /// Values of the first vertex.
    pub fn get<T: Component>(&self, handle: VoHandle, attr: &Attr<T>) -> Option<&[T]> {
        self.get_vertex(handle, attr, 0)
    }

    /// Values of one vertex, `None` for a stale handle.
    pub fn get_vertex<T: Component>(
        &self,
        handle: VoHandle,
        attr: &Attr<T>,
        vertex: usize,
    ) -> Option<&[T]> {
        let slot = self.slot_of(handle)?;
        let range = self.element_range(slot, attr, vertex);
        T::slice(self.buffers[attr.buffer].data()).map(|s| &s[range])
    }

    /// Write every vertex of the object. `Ok(false)` for a stale or foreign
    /// handle; `values` must hold exactly one entry per component.
    pub fn set<T: Component>(
        &mut self,
        handle: VoHandle,
        attr: &Attr<T>,
        values: &[T],
    ) -> Result<bool, VertexError> {
        check_len(attr, values)?;
        let Some(slot) = self.slot_of(handle) else {
            return Ok(false);
        };
        for vertex in 0..self.descriptor.vertex_count() {
            self.write(slot, attr, vertex, values);
        }
        Ok(true)
    }

    /// Write a single vertex of the object.
    pub fn set_vertex<T: Component>(
        &mut self,
        handle: VoHandle,
        attr: &Attr<T>,
        vertex: usize,
        values: &[T],
    ) -> Result<bool, VertexError> {
        check_len(attr, values)?;
        let vertex_count = self.descriptor.vertex_count();
        if vertex >= vertex_count {
            return Err(VertexError::VertexOutOfRange {
                vertex,
                vertex_count,
            });
        }
        let Some(slot) = self.slot_of(handle) else {
            return Ok(false);
        };
        self.write(slot, attr, vertex, values);
        Ok(true)
    }

    /// Callers have checked `values.len()` and `vertex`.
    fn write<T: Component>(&mut self, slot: usize, attr: &Attr<T>, vertex: usize, values: &[T]) {
        let range = self.element_range(slot, attr, vertex);
        let buffer = &mut self.buffers[attr.buffer];
        if let Some(s) = T::slice_mut(buffer.data_mut()) {
            s[range.clone()].copy_from_slice(values);
            buffer.record_write(range);
        }
    }

    /// Scoped view on one object.
    pub fn vo_mut(&mut self, handle: VoHandle) -> Option<VoMut<'_>> {
        self.slot_of(handle)?;
        Some(VoMut { pool: self, handle })
    }

    /// Raw typed data of buffer `index`.
    pub fn buffer_data(&self, index: usize) -> Option<&BufferData> {
        self.buffers.get(index).map(|b| b.data())
    }
}

fn check_len<T>(attr: &Attr<T>, values: &[T]) -> Result<(), VertexError> {
    if values.len() == attr.size {
        Ok(())
    } else {
        Err(VertexError::ValueCountMismatch {
            expected: attr.size,
            actual: values.len(),
        })
    }
}

/// Mutable view on a live object, for chained writes.
pub struct VoMut<'a> {
    pool: &'a mut VertexObjectPool,
    handle: VoHandle,
}

impl VoMut<'_> {
    pub fn handle(&self) -> VoHandle {
        self.handle
    }

    pub fn set<T: Component>(
        &mut self,
        attr: &Attr<T>,
        values: &[T],
    ) -> Result<&mut Self, VertexError> {
        self.pool.set(self.handle, attr, values)?;
        Ok(self)
    }

    pub fn set_vertex<T: Component>(
        &mut self,
        attr: &Attr<T>,
        vertex: usize,
        values: &[T],
    ) -> Result<&mut Self, VertexError> {
        self.pool.set_vertex(self.handle, attr, vertex, values)?;
        Ok(self)
    }

    pub fn get<T: Component>(&self, attr: &Attr<T>) -> Option<&[T]> {
        self.pool.get(self.handle, attr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{AttributeSpec, DataType};
    use std::collections::HashSet;

    fn instance_pool(capacity: usize) -> VertexObjectPool {
        let d = VertexObjectDescriptor::builder()
            .mesh_count(1)
            .attribute(
                "offset",
                AttributeSpec::named(&["x", "y", "z"]).usage(UsageType::Dynamic),
            )
            .attribute(
                "size",
                AttributeSpec::new(2)
                    .usage(UsageType::Dynamic)
                    .defaults(&[1.0, 1.0]),
            )
            .attribute("frame", AttributeSpec::new(1).data_type(DataType::Uint32))
            .build()
            .unwrap();
        VertexObjectPool::new(d, capacity)
    }

    fn assert_compact(pool: &VertexObjectPool, live: &[VoHandle]) {
        assert!(pool.used_count() <= pool.capacity());
        assert_eq!(pool.used_count(), live.len());
        let slots: HashSet<usize> = live.iter().map(|h| pool.slot_of(*h).unwrap()).collect();
        assert_eq!(slots.len(), live.len());
        assert!(slots.iter().all(|&s| s < pool.used_count()));
    }

    #[test]
    fn create_fails_at_capacity() {
        let mut pool = instance_pool(2);
        assert!(pool.create_vo().is_some());
        assert!(pool.create_vo().is_some());
        assert!(pool.is_full());
        assert!(pool.create_vo().is_none());
        assert_eq!(pool.used_count(), 2);
    }

    #[test]
    fn buffer_lengths_follow_layout() {
        let pool = instance_pool(8);
        let dynamic = pool.descriptor().buffer_index(UsageType::Dynamic, DataType::Float32);
        assert_eq!(pool.buffer_data(dynamic.unwrap()).unwrap().len(), 8 * 5);
        let frames = pool.descriptor().buffer_index(UsageType::Static, DataType::Uint32);
        assert_eq!(pool.buffer_data(frames.unwrap()).unwrap().len(), 8);
    }

    #[test]
    fn defaults_are_written_on_create() {
        let mut pool = instance_pool(4);
        let size = pool.attr::<f32>("size").unwrap();
        let h = pool.create_vo().unwrap();
        assert_eq!(pool.get(h, &size), Some(&[1.0, 1.0][..]));
    }

    #[test]
    fn wrong_value_count_is_an_error() {
        let mut pool = instance_pool(4);
        let offset = pool.attr::<f32>("offset").unwrap();
        let h = pool.create_vo().unwrap();
        assert_eq!(
            pool.set(h, &offset, &[1.0, 2.0]),
            Err(VertexError::ValueCountMismatch {
                expected: 3,
                actual: 2
            })
        );
        assert!(pool.vo_mut(h).unwrap().set(&offset, &[1.0; 4]).is_err());
        assert!(matches!(
            pool.set_vertex(h, &offset, 7, &[1.0, 2.0, 3.0]),
            Err(VertexError::VertexOutOfRange { vertex: 7, .. })
        ));
        assert_eq!(pool.get(h, &offset), Some(&[0.0, 0.0, 0.0][..]));

        assert!(pool.free_vo(h));
        assert_eq!(pool.set(h, &offset, &[1.0, 2.0, 3.0]), Ok(false));
    }

    #[test]
    fn free_swaps_last_into_hole() {
        let mut pool = instance_pool(4);
        let offset = pool.attr::<f32>("offset").unwrap();
        let a = pool.create_vo().unwrap();
        let b = pool.create_vo().unwrap();
        let c = pool.create_vo().unwrap();
        pool.set(a, &offset, &[1.0, 1.0, 1.0]).unwrap();
        pool.set(b, &offset, &[2.0, 2.0, 2.0]).unwrap();
        pool.set(c, &offset, &[3.0, 3.0, 3.0]).unwrap();

        assert!(pool.free_vo(a));
        assert_eq!(pool.used_count(), 2);
        assert_eq!(pool.slot_of(c), Some(0));
        assert_eq!(pool.get(c, &offset), Some(&[3.0, 3.0, 3.0][..]));
        assert_eq!(pool.get(b, &offset), Some(&[2.0, 2.0, 2.0][..]));
        assert_eq!(pool.get(a, &offset), None);
    }

    #[test]
    fn freeing_last_slot_copies_nothing() {
        let mut pool = instance_pool(4);
        let _a = pool.create_vo().unwrap();
        let b = pool.create_vo().unwrap();
        assert!(pool.free_vo(b));
        assert_eq!(pool.used_count(), 1);
    }

    #[test]
    fn stale_and_foreign_handles_are_ignored() {
        let mut pool = instance_pool(4);
        let mut other = instance_pool(4);
        let a = pool.create_vo().unwrap();
        let foreign = other.create_vo().unwrap();

        assert!(!pool.free_vo(foreign));
        assert!(pool.free_vo(a));
        assert!(!pool.free_vo(a));
        assert_eq!(pool.used_count(), 0);

        // the entry is recycled with a new generation
        let a2 = pool.create_vo().unwrap();
        assert_ne!(a, a2);
        assert!(!pool.contains(a));
        assert!(pool.contains(a2));
    }

    #[test]
    fn compaction_invariant_under_churn() {
        let mut pool = instance_pool(16);
        let mut live = Vec::new();
        // deterministic pseudo-random create/free sequence
        let mut state = 0x2545_f491_u32;
        for _ in 0..500 {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            if state % 3 != 0 || live.is_empty() {
                if let Some(h) = pool.create_vo() {
                    live.push(h);
                } else {
                    assert_eq!(pool.used_count(), pool.capacity());
                }
            } else {
                let i = (state as usize / 3) % live.len();
                let h = live.swap_remove(i);
                assert!(pool.free_vo(h));
            }
            assert_compact(&pool, &live);
        }
    }

    #[test]
    fn freed_slots_are_refilled_exactly() {
        let mut pool = instance_pool(8);
        let mut live: Vec<_> = (0..8).map(|_| pool.create_vo().unwrap()).collect();
        for h in live.drain(..3) {
            assert!(pool.free_vo(h));
        }
        let refill: Vec<_> = (0..3).map(|_| pool.create_vo().unwrap()).collect();
        live.extend(refill);
        assert!(pool.create_vo().is_none());
        assert_compact(&pool, &live);
    }

    #[test]
    fn values_follow_moved_objects() {
        let mut pool = instance_pool(8);
        let frame = pool.attr::<u32>("frame").unwrap();
        let handles: Vec<_> = (0..8).map(|_| pool.create_vo().unwrap()).collect();
        for (i, h) in handles.iter().enumerate() {
            pool.set(*h, &frame, &[i as u32]).unwrap();
        }
        for h in handles.iter().step_by(2) {
            pool.free_vo(*h);
        }
        for (i, h) in handles.iter().enumerate().skip(1).step_by(2) {
            assert_eq!(pool.get(*h, &frame), Some(&[i as u32][..]));
        }
    }

    #[test]
    fn named_component_access() {
        let mut pool = instance_pool(2);
        let y = pool.component::<f32>("offset", "y").unwrap();
        let offset = pool.attr::<f32>("offset").unwrap();
        let h = pool.create_vo().unwrap();
        pool.vo_mut(h).unwrap().set(&y, &[4.0]).unwrap();
        assert_eq!(pool.get(h, &offset), Some(&[0.0, 4.0, 0.0][..]));
        assert!(matches!(
            pool.component::<f32>("offset", "w"),
            Err(VertexError::UnknownComponent { .. })
        ));
    }

    #[test]
    fn attr_checks_name_and_type() {
        let pool = instance_pool(1);
        assert!(matches!(
            pool.attr::<f32>("missing"),
            Err(VertexError::UnknownAttribute(_))
        ));
        assert!(matches!(
            pool.attr::<f32>("frame"),
            Err(VertexError::DataTypeMismatch { .. })
        ));
    }

    #[test]
    fn dynamic_writes_mark_buffer_dirty() {
        let mut pool = instance_pool(4);
        let offset = pool.attr::<f32>("offset").unwrap();
        let h = pool.create_vo().unwrap();
        let buf = offset.buffer();
        pool.buffer_mut(buf).unwrap().clear_dirty();
        let serial = pool.buffer(buf).unwrap().serial();

        pool.set(h, &offset, &[1.0, 2.0, 3.0]).unwrap();
        let b = pool.buffer(buf).unwrap();
        assert!(b.serial() > serial);
        assert_eq!(b.dirty_range(), Some(0..3));
    }

    #[test]
    fn free_marks_every_buffer() {
        let mut pool = instance_pool(4);
        let a = pool.create_vo().unwrap();
        let _b = pool.create_vo().unwrap();
        let before: Vec<u64> = pool.buffers().iter().map(|b| b.serial()).collect();
        pool.free_vo(a);
        for (b, s) in pool.buffers().iter().zip(before) {
            assert!(b.serial() > s, "{} not bumped", b.name());
        }
    }

    #[test]
    fn resize_keeps_live_objects() {
        let mut pool = instance_pool(2);
        let offset = pool.attr::<f32>("offset").unwrap();
        let h = pool.create_vo().unwrap();
        pool.set(h, &offset, &[5.0, 6.0, 7.0]).unwrap();
        pool.create_vo().unwrap();

        assert!(pool.resize(1).is_err());
        pool.resize(4).unwrap();
        assert_eq!(pool.capacity(), 4);
        assert!(pool.buffers().iter().all(|b| b.array_version() == 1));
        assert_eq!(pool.get(h, &offset), Some(&[5.0, 6.0, 7.0][..]));
        assert!(pool.create_vo().is_some());
    }

    #[test]
    fn clear_invalidates_handles() {
        let mut pool = instance_pool(3);
        let hs: Vec<_> = (0..3).map(|_| pool.create_vo().unwrap()).collect();
        pool.clear();
        assert_eq!(pool.used_count(), 0);
        assert!(hs.iter().all(|h| !pool.contains(*h)));
        assert_eq!(pool.handles().count(), 0);
        assert_eq!((0..3).filter_map(|_| pool.create_vo()).count(), 3);
    }

    #[test]
    fn clone_is_independent() {
        let mut pool = instance_pool(2);
        let offset = pool.attr::<f32>("offset").unwrap();
        let h = pool.create_vo().unwrap();
        let mut copy = pool.clone();
        pool.set(h, &offset, &[9.0, 9.0, 9.0]).unwrap();

        let copied = copy.handles().next().unwrap();
        assert_eq!(copy.get(copied, &offset), Some(&[0.0, 0.0, 0.0][..]));
        assert!(!copy.contains(h));
        assert!(copy.free_vo(copied));
        assert_eq!(pool.used_count(), 1);
    }

    #[test]
    fn multi_vertex_objects_address_each_vertex() {
        let d = VertexObjectDescriptor::builder()
            .vertex_count(4)
            .indices([0, 1, 2, 0, 2, 3])
            .attribute("position", AttributeSpec::new(2))
            .build()
            .unwrap();
        let mut pool = VertexObjectPool::new(d, 2);
        let pos = pool.attr::<f32>("position").unwrap();
        let _a = pool.create_vo().unwrap();
        let b = pool.create_vo().unwrap();
        pool.set_vertex(b, &pos, 3, &[1.5, 2.5]).unwrap();
        let data = <f32 as Component>::slice(pool.buffer_data(0).unwrap()).unwrap();
        // slot 1, vertex 3, item size 2
        assert_eq!(&data[14..16], &[1.5, 2.5]);
        assert_eq!(pool.get_vertex(b, &pos, 3), Some(&[1.5, 2.5][..]));
    }
}
