use std::ops::Range;

use tessera_render::InstancedGeometry;
use tessera_vertex::DataType;

use crate::BackendError;

/// The vertex format of an attribute with `size` components of `data_type`.
///
/// Integer types narrower than 32 bits only exist in pairs and quads.
pub fn vertex_format(data_type: DataType, size: usize) -> Option<wgpu::VertexFormat> {
    use wgpu::VertexFormat as F;
    let format = match (data_type, size) {
        (DataType::Float32, 1) => F::Float32,
        (DataType::Float32, 2) => F::Float32x2,
        (DataType::Float32, 3) => F::Float32x3,
        (DataType::Float32, 4) => F::Float32x4,
        (DataType::Int32, 1) => F::Sint32,
        (DataType::Int32, 2) => F::Sint32x2,
        (DataType::Int32, 3) => F::Sint32x3,
        (DataType::Int32, 4) => F::Sint32x4,
        (DataType::Uint32, 1) => F::Uint32,
        (DataType::Uint32, 2) => F::Uint32x2,
        (DataType::Uint32, 3) => F::Uint32x3,
        (DataType::Uint32, 4) => F::Uint32x4,
        (DataType::Int16, 2) => F::Sint16x2,
        (DataType::Int16, 4) => F::Sint16x4,
        (DataType::Uint16, 2) => F::Uint16x2,
        (DataType::Uint16, 4) => F::Uint16x4,
        (DataType::Int8, 2) => F::Sint8x2,
        (DataType::Int8, 4) => F::Sint8x4,
        (DataType::Uint8, 2) => F::Uint8x2,
        (DataType::Uint8, 4) => F::Uint8x4,
        _ => return None,
    };
    Some(format)
}

/// Byte range to write for a flagged element range, widened to
/// [`wgpu::COPY_BUFFER_ALIGNMENT`]. `None` when the widened range cannot be
/// aligned inside a buffer of `total_bytes`.
pub fn aligned_byte_range(
    range: Range<usize>,
    data_type: DataType,
    total_bytes: usize,
) -> Option<Range<u64>> {
    let align = wgpu::COPY_BUFFER_ALIGNMENT as usize;
    let size = data_type.byte_size();
    let start = (range.start * size) / align * align;
    let end = (range.end * size).div_ceil(align) * align;
    let end = end.min(total_bytes);
    if start > end || (end - start) % align != 0 {
        return None;
    }
    Some(start as u64..end as u64)
}

/// One bound vertex buffer: which pool buffer feeds it and how it is read.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexSlot {
    pub pool: String,
    pub buffer: String,
    pub stride: u64,
    pub step_mode: wgpu::VertexStepMode,
    pub attributes: Vec<wgpu::VertexAttribute>,
}

impl VertexSlot {
    /// wgpu layout borrowing this slot's attributes.
    pub fn layout(&self) -> wgpu::VertexBufferLayout<'_> {
        wgpu::VertexBufferLayout {
            array_stride: self.stride,
            step_mode: self.step_mode,
            attributes: &self.attributes,
        }
    }
}

/// Vertex buffer layouts for `geometry`, in bind order.
///
/// `locations` maps attribute names to shader locations. Buffers carrying no
/// located attribute are left unbound.
pub fn vertex_layouts(
    geometry: &InstancedGeometry,
    locations: &[(&'static str, u32)],
) -> Result<Vec<VertexSlot>, BackendError> {
    let mut slots = Vec::new();
    let mut found = vec![false; locations.len()];
    for binding in geometry.bindings() {
        for gpu in binding.buffers {
            let mut attributes = Vec::new();
            for attr in &gpu.attributes {
                let Some(i) = locations.iter().position(|(n, _)| *n == attr.name) else {
                    continue;
                };
                let format = vertex_format(gpu.data_type, attr.size).ok_or_else(|| {
                    BackendError::UnsupportedFormat {
                        attribute: attr.name.clone(),
                        data_type: gpu.data_type,
                        size: attr.size,
                    }
                })?;
                found[i] = true;
                attributes.push(wgpu::VertexAttribute {
                    format,
                    offset: (attr.offset * gpu.data_type.byte_size()) as u64,
                    shader_location: locations[i].1,
                });
            }
            if attributes.is_empty() {
                continue;
            }
            slots.push(VertexSlot {
                pool: binding.name.to_string(),
                buffer: gpu.name.clone(),
                stride: gpu.stride_bytes() as u64,
                step_mode: if gpu.instanced {
                    wgpu::VertexStepMode::Instance
                } else {
                    wgpu::VertexStepMode::Vertex
                },
                attributes,
            });
        }
    }
    if let Some(i) = found.iter().position(|f| !f) {
        return Err(BackendError::MissingAttribute(locations[i].0));
    }
    Ok(slots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_render::sprite_geometry;
    use tessera_vertex::{AttributeSpec, VertexObjectDescriptor, VertexObjectPool};

    #[test]
    fn formats_cover_supported_shapes() {
        assert_eq!(vertex_format(DataType::Float32, 3), Some(wgpu::VertexFormat::Float32x3));
        assert_eq!(vertex_format(DataType::Uint8, 4), Some(wgpu::VertexFormat::Uint8x4));
        assert_eq!(vertex_format(DataType::Int32, 1), Some(wgpu::VertexFormat::Sint32));
        assert_eq!(vertex_format(DataType::Uint8, 3), None);
        assert_eq!(vertex_format(DataType::Float32, 5), None);
    }

    #[test]
    fn sprite_geometry_binds_two_slots() {
        let geometry = sprite_geometry(16).unwrap();
        let slots = vertex_layouts(
            &geometry,
            &[("position", 0), ("offset", 1), ("size", 2), ("texCoords", 3)],
        )
        .unwrap();
        assert_eq!(slots.len(), 2);

        let base = &slots[0];
        assert_eq!((base.pool.as_str(), base.buffer.as_str()), ("base", "static_float32"));
        assert_eq!(base.stride, 8);
        assert_eq!(base.step_mode, wgpu::VertexStepMode::Vertex);

        let inst = &slots[1];
        assert_eq!(inst.buffer, "dynamic_float32");
        assert_eq!(inst.stride, 36);
        assert_eq!(inst.step_mode, wgpu::VertexStepMode::Instance);
        let placed: Vec<(u32, u64)> = inst
            .attributes
            .iter()
            .map(|a| (a.shader_location, a.offset))
            .collect();
        assert_eq!(placed, vec![(1, 0), (2, 12), (3, 20)]);
        assert_eq!(inst.layout().attributes.len(), 3);
    }

    #[test]
    fn unknown_locations_and_formats_are_errors() {
        let geometry = sprite_geometry(4).unwrap();
        assert_eq!(
            vertex_layouts(&geometry, &[("color", 4)]),
            Err(BackendError::MissingAttribute("color"))
        );

        let desc = VertexObjectDescriptor::builder()
            .mesh_count(1)
            .attribute("rgb", AttributeSpec::new(3).data_type(DataType::Uint8))
            .build()
            .unwrap();
        let odd = InstancedGeometry::new(VertexObjectPool::new(desc, 2));
        assert!(matches!(
            vertex_layouts(&odd, &[("rgb", 0)]),
            Err(BackendError::UnsupportedFormat { size: 3, .. })
        ));
    }

    #[test]
    fn byte_ranges_widen_to_copy_alignment() {
        assert_eq!(aligned_byte_range(3..5, DataType::Float32, 64), Some(12..20));
        assert_eq!(aligned_byte_range(1..3, DataType::Uint8, 8), Some(0..4));
        assert_eq!(aligned_byte_range(5..7, DataType::Uint16, 16), Some(8..16));
        // tail of a buffer whose length is not a multiple of four
        assert_eq!(aligned_byte_range(4..6, DataType::Uint8, 6), None);
    }
}
