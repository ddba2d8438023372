use std::collections::BTreeMap;

use tessera_render::InstancedGeometry;
use wgpu::util::DeviceExt;

use crate::layout::aligned_byte_range;

/// What one [`GeometryUploader::upload`] call sent to the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadStats {
    pub created: usize,
    pub written: usize,
    pub bytes: u64,
}

struct DeviceBuffer {
    buffer: wgpu::Buffer,
    size: u64,
}

/// Device-side mirror of an [`InstancedGeometry`], keyed by pool and buffer name.
#[derive(Default)]
pub struct GeometryUploader {
    buffers: BTreeMap<(String, String), DeviceBuffer>,
    index: Option<(wgpu::Buffer, u32)>,
}

impl std::fmt::Debug for GeometryUploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeometryUploader")
            .field("buffers", &self.buffers.keys().collect::<Vec<_>>())
            .field("index_count", &self.index_count())
            .finish()
    }
}

impl GeometryUploader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Device buffer mirroring `buffer` of pool `pool`, once uploaded.
    pub fn buffer(&self, pool: &str, buffer: &str) -> Option<&wgpu::Buffer> {
        self.buffers
            .get(&(pool.to_string(), buffer.to_string()))
            .map(|b| &b.buffer)
    }

    /// Shared quad index buffer, built on the first upload.
    pub fn index_buffer(&self) -> Option<&wgpu::Buffer> {
        self.index.as_ref().map(|(b, _)| b)
    }

    /// Indices per instance, 0 before the first upload.
    pub fn index_count(&self) -> u32 {
        self.index.as_ref().map_or(0, |(_, n)| *n)
    }

    /// Push every flagged buffer to the device, then clear the flags.
    pub fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        geometry: &mut InstancedGeometry,
    ) -> UploadStats {
        let _span = tracing::debug_span!("geometry_upload").entered();
        let mut stats = UploadStats::default();

        if self.index.is_none() {
            let shape = geometry.base().unwrap_or(geometry.instances()).descriptor();
            if let Some(indices) = shape.indices() {
                let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("geometry_indices"),
                    contents: bytemuck::cast_slice(indices),
                    usage: wgpu::BufferUsages::INDEX,
                });
                self.index = Some((buffer, indices.len() as u32));
                stats.created += 1;
            }
        }

        for binding in geometry.bindings() {
            for (i, gpu) in binding.buffers.iter().enumerate() {
                let Some(source) = binding.pool.buffer(i) else {
                    continue;
                };
                let bytes = source.data().as_bytes();
                let key = (binding.name.to_string(), gpu.name.clone());
                let size = bytes.len() as u64;
                let stale = self
                    .buffers
                    .get(&key)
                    .is_none_or(|b| b.size != size || gpu.is_reallocated());

                // unalignable ranges fall back to a full recreate
                let patch = match (stale, gpu.update_range()) {
                    (false, Some(range)) => aligned_byte_range(range, gpu.data_type, bytes.len()),
                    (false, None) => continue,
                    (true, _) => None,
                };

                if let (Some(range), Some(existing)) = (patch, self.buffers.get(&key)) {
                    if range.is_empty() {
                        continue;
                    }
                    let slice = &bytes[range.start as usize..range.end as usize];
                    queue.write_buffer(&existing.buffer, range.start, slice);
                    stats.written += 1;
                    stats.bytes += slice.len() as u64;
                    continue;
                }

                let label = format!("{}_{}", binding.name, gpu.name);
                let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&label),
                    contents: bytes,
                    usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                });
                tracing::debug!(buffer = %label, size, "device buffer created");
                self.buffers.insert(key, DeviceBuffer { buffer, size });
                stats.created += 1;
                stats.bytes += size;
            }
        }

        geometry.mark_uploaded();
        tracing::trace!(?stats, "upload done");
        stats
    }
}
