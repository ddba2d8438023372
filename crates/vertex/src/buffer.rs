use std::ops::Range;

use bytemuck::Pod;

use crate::descriptor::{BufferLayout, DataType, UsageType};

/// Typed backing array of one shared buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum BufferData {
    Float32(Vec<f32>),
    Int32(Vec<i32>),
    Uint32(Vec<u32>),
    Int16(Vec<i16>),
    Uint16(Vec<u16>),
    Int8(Vec<i8>),
    Uint8(Vec<u8>),
}

macro_rules! each_variant {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            BufferData::Float32($v) => $body,
            BufferData::Int32($v) => $body,
            BufferData::Uint32($v) => $body,
            BufferData::Int16($v) => $body,
            BufferData::Uint16($v) => $body,
            BufferData::Int8($v) => $body,
            BufferData::Uint8($v) => $body,
        }
    };
}

impl BufferData {
    /// `len` zeroed elements of `data_type`.
    pub fn zeroed(data_type: DataType, len: usize) -> Self {
        match data_type {
            DataType::Float32 => BufferData::Float32(vec![0.0; len]),
            DataType::Int32 => BufferData::Int32(vec![0; len]),
            DataType::Uint32 => BufferData::Uint32(vec![0; len]),
            DataType::Int16 => BufferData::Int16(vec![0; len]),
            DataType::Uint16 => BufferData::Uint16(vec![0; len]),
            DataType::Int8 => BufferData::Int8(vec![0; len]),
            DataType::Uint8 => BufferData::Uint8(vec![0; len]),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            BufferData::Float32(_) => DataType::Float32,
            BufferData::Int32(_) => DataType::Int32,
            BufferData::Uint32(_) => DataType::Uint32,
            BufferData::Int16(_) => DataType::Int16,
            BufferData::Uint16(_) => DataType::Uint16,
            BufferData::Int8(_) => DataType::Int8,
            BufferData::Uint8(_) => DataType::Uint8,
        }
    }

    pub fn len(&self) -> usize {
        each_variant!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw bytes, for upload.
    pub fn as_bytes(&self) -> &[u8] {
        each_variant!(self, v => bytemuck::cast_slice(v.as_slice()))
    }

    /// Raw bytes of an element range, for partial uploads.
    pub fn bytes_of_range(&self, range: Range<usize>) -> &[u8] {
        let size = self.data_type().byte_size();
        &self.as_bytes()[range.start * size..range.end * size]
    }

    pub(crate) fn copy_within(&mut self, src: Range<usize>, dest: usize) {
        each_variant!(self, v => v.copy_within(src, dest))
    }

    pub(crate) fn resize(&mut self, len: usize) {
        each_variant!(self, v => v.resize(len, Default::default()))
    }

    pub(crate) fn fill_from_f64(&mut self, start: usize, values: &[f64]) {
        each_variant!(self, v => {
            for (dst, &src) in v[start..start + values.len()].iter_mut().zip(values) {
                *dst = Component::from_f64(src);
            }
        })
    }

    pub(crate) fn fill_zero(&mut self, range: Range<usize>) {
        each_variant!(self, v => v[range].fill(Default::default()))
    }
}

/// Element type stored in a [`BufferData`] variant.
pub trait Component: Pod + Default + PartialEq + std::fmt::Debug {
    const DATA_TYPE: DataType;

    fn slice(data: &BufferData) -> Option<&[Self]>;
    fn slice_mut(data: &mut BufferData) -> Option<&mut [Self]>;
    fn from_f64(v: f64) -> Self;
}

macro_rules! impl_component {
    ($ty:ty, $variant:ident) => {
        impl Component for $ty {
            const DATA_TYPE: DataType = DataType::$variant;

            fn slice(data: &BufferData) -> Option<&[Self]> {
                match data {
                    BufferData::$variant(v) => Some(v.as_slice()),
                    _ => None,
                }
            }

            fn slice_mut(data: &mut BufferData) -> Option<&mut [Self]> {
                match data {
                    BufferData::$variant(v) => Some(v.as_mut_slice()),
                    _ => None,
                }
            }

            fn from_f64(v: f64) -> Self {
                v as $ty
            }
        }
    };
}

impl_component!(f32, Float32);
impl_component!(i32, Int32);
impl_component!(u32, Uint32);
impl_component!(i16, Int16);
impl_component!(u16, Uint16);
impl_component!(i8, Int8);
impl_component!(u8, Uint8);

/// Storage for one `(usage, data type)` group of a pool plus its change
/// tracking.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexObjectBuffer {
    layout: BufferLayout,
    data: BufferData,
    /// Bumped whenever tracked data changes.
    serial: u64,
    /// Bumped whenever `data` is reallocated.
    array_version: u64,
    dirty: Option<Range<usize>>,
}

impl VertexObjectBuffer {
    pub(crate) fn new(layout: BufferLayout, len: usize) -> Self {
        let data = BufferData::zeroed(layout.data_type, len);
        Self {
            layout,
            data,
            serial: 0,
            array_version: 0,
            dirty: None,
        }
    }

    pub fn layout(&self) -> &BufferLayout {
        &self.layout
    }

    pub fn name(&self) -> &str {
        &self.layout.name
    }

    pub fn usage(&self) -> UsageType {
        self.layout.usage
    }

    /// Elements per vertex.
    pub fn item_size(&self) -> usize {
        self.layout.item_size
    }

    pub fn data(&self) -> &BufferData {
        &self.data
    }

    /// Bumped on every write or touch.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Bumped when the backing array is reallocated.
    pub fn array_version(&self) -> u64 {
        self.array_version
    }

    /// Element range written since the last [`clear_dirty`](Self::clear_dirty).
    pub fn dirty_range(&self) -> Option<Range<usize>> {
        self.dirty.clone()
    }

    /// Forget the dirty range after an upload.
    pub fn clear_dirty(&mut self) {
        self.dirty = None;
    }

    pub(crate) fn data_mut(&mut self) -> &mut BufferData {
        &mut self.data
    }

    /// Record a write to `range`. Static buffers only widen the dirty range;
    /// their serial moves on structural changes (see [`bump`](Self::bump)).
    pub(crate) fn record_write(&mut self, range: Range<usize>) {
        self.extend_dirty(range);
        if self.layout.usage.tracks_writes() {
            self.serial += 1;
        }
    }

    /// Record a structural change (slot moved or initialised) in `range`.
    pub(crate) fn bump(&mut self, range: Range<usize>) {
        self.extend_dirty(range);
        self.serial += 1;
    }

    pub(crate) fn reallocate(&mut self, len: usize) {
        self.data.resize(len);
        self.array_version += 1;
        self.serial += 1;
        self.dirty = Some(0..len);
    }

    fn extend_dirty(&mut self, range: Range<usize>) {
        self.dirty = Some(match self.dirty.take() {
            Some(d) => d.start.min(range.start)..d.end.max(range.end),
            None => range,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(usage: UsageType) -> BufferLayout {
        BufferLayout {
            name: format!("{}_float32", usage.name()),
            usage,
            data_type: DataType::Float32,
            item_size: 2,
            attributes: vec![0],
        }
    }

    #[test]
    fn bytes_match_typed_array() {
        let data = BufferData::Uint16(vec![1, 2, 3]);
        assert_eq!(data.as_bytes().len(), 6);
        assert_eq!(data.bytes_of_range(1..2), &2u16.to_ne_bytes());
    }

    #[test]
    fn dirty_range_merges() {
        let mut b = VertexObjectBuffer::new(layout(UsageType::Dynamic), 16);
        b.record_write(4..6);
        b.record_write(10..12);
        assert_eq!(b.dirty_range(), Some(4..12));
        assert_eq!(b.serial(), 2);
        b.clear_dirty();
        assert_eq!(b.dirty_range(), None);
    }

    #[test]
    fn static_writes_do_not_move_serial() {
        let mut b = VertexObjectBuffer::new(layout(UsageType::Static), 16);
        b.record_write(0..2);
        assert_eq!(b.serial(), 0);
        assert_eq!(b.dirty_range(), Some(0..2));
        b.bump(2..4);
        assert_eq!(b.serial(), 1);
    }

    #[test]
    fn reallocation_bumps_array_version() {
        let mut b = VertexObjectBuffer::new(layout(UsageType::Dynamic), 4);
        b.reallocate(8);
        assert_eq!(b.array_version(), 1);
        assert_eq!(b.data().len(), 8);
        assert_eq!(b.dirty_range(), Some(0..8));
    }

    #[test]
    fn component_slices_are_type_checked() {
        let mut data = BufferData::zeroed(DataType::Float32, 3);
        assert!(<u32 as Component>::slice(&data).is_none());
        <f32 as Component>::slice_mut(&mut data).unwrap()[1] = 2.5;
        assert_eq!(<f32 as Component>::slice(&data).unwrap(), &[0.0, 2.5, 0.0]);
        data.fill_from_f64(0, &[7.0]);
        assert_eq!(<f32 as Component>::slice(&data).unwrap()[0], 7.0);
    }
}
