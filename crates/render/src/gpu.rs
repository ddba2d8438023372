use std::ops::Range;

use tessera_vertex::{DataType, UsageType, VertexObjectBuffer, VertexObjectDescriptor};

/// One logical attribute inside a [`GpuBuffer`].
#[derive(Debug, Clone, PartialEq)]
pub struct GpuAttribute {
    pub name: String,
    /// Element offset inside one buffer item.
    pub offset: usize,
    pub size: usize,
}

/// Backend view of one pool buffer: what to bind and what to upload.
#[derive(Debug, Clone, PartialEq)]
pub struct GpuBuffer {
    pub name: String,
    pub usage: UsageType,
    pub data_type: DataType,
    /// Elements per vertex, the stride in elements.
    pub item_size: usize,
    pub attributes: Vec<GpuAttribute>,
    /// Advance per instance rather than per vertex.
    pub instanced: bool,
    needs_update: bool,
    update_range: Option<Range<usize>>,
    array_version: u64,
    serial_seen: u64,
    reallocated: bool,
}

impl GpuBuffer {
    pub(crate) fn new(
        descriptor: &VertexObjectDescriptor,
        buffer: &VertexObjectBuffer,
        instanced: bool,
    ) -> Self {
        let layout = buffer.layout();
        let attributes = layout
            .attributes
            .iter()
            .filter_map(|&i| descriptor.attributes().get(i))
            .map(|a| GpuAttribute {
                name: a.name.clone(),
                offset: a.offset,
                size: a.size,
            })
            .collect();
        Self {
            name: layout.name.clone(),
            usage: layout.usage,
            data_type: layout.data_type,
            item_size: layout.item_size,
            attributes,
            instanced,
            needs_update: false,
            update_range: None,
            array_version: buffer.array_version(),
            serial_seen: buffer.serial(),
            reallocated: true,
        }
    }

    /// Several attributes share this buffer at different offsets.
    pub fn is_interleaved(&self) -> bool {
        self.attributes.len() > 1
    }

    /// Attribute view by name.
    pub fn attribute(&self, name: &str) -> Option<&GpuAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Bytes per item.
    pub fn stride_bytes(&self) -> usize {
        self.item_size * self.data_type.byte_size()
    }

    /// Set when the source buffer changed since the last upload.
    pub fn needs_update(&self) -> bool {
        self.needs_update
    }

    /// Element range to upload, `None` when clean.
    pub fn update_range(&self) -> Option<Range<usize>> {
        self.update_range.clone()
    }

    /// Source array generation this view points at.
    pub fn array_version(&self) -> u64 {
        self.array_version
    }

    pub fn serial_seen(&self) -> u64 {
        self.serial_seen
    }

    /// The backing array was replaced; backends must recreate the buffer.
    pub fn is_reallocated(&self) -> bool {
        self.reallocated
    }

    /// Pick up changes from the pool buffer. Returns `true` if anything moved.
    pub(crate) fn sync(&mut self, buffer: &VertexObjectBuffer) -> bool {
        let mut changed = false;
        if buffer.array_version() != self.array_version {
            self.array_version = buffer.array_version();
            self.reallocated = true;
            self.needs_update = true;
            self.update_range = Some(0..buffer.data().len());
            changed = true;
        }
        if buffer.serial() != self.serial_seen {
            self.serial_seen = buffer.serial();
            self.needs_update = true;
            if let Some(range) = buffer.dirty_range() {
                self.extend_range(range);
            }
            changed = true;
        }
        changed
    }

    fn extend_range(&mut self, range: Range<usize>) {
        self.update_range = Some(match self.update_range.take() {
            Some(r) => r.start.min(range.start)..r.end.max(range.end),
            None => range,
        });
    }

    pub(crate) fn mark_uploaded(&mut self) {
        self.needs_update = false;
        self.update_range = None;
        self.reallocated = false;
    }
}
