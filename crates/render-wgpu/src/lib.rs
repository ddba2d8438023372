//! wgpu backend for tessera geometry.
//!
//! Mirrors [`InstancedGeometry`](tessera_render::InstancedGeometry) pools into
//! device buffers and draws tile sprites with a single instanced pipeline.
//!
//! # Invariants
//! - The backend never writes to pools; it only reads buffers flagged for upload.
//! - A reallocated pool buffer is recreated on the device, never patched.
//! - Partial writes cover the whole flagged range, widened to copy alignment.

mod layout;
mod shaders;
mod sprite;
mod upload;

pub use layout::{aligned_byte_range, vertex_format, vertex_layouts, VertexSlot};
pub use shaders::SPRITE_SHADER;
pub use sprite::{SpritePipeline, SPRITE_LOCATIONS};
pub use upload::{GeometryUploader, UploadStats};

use tessera_vertex::DataType;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    #[error("attribute {attribute:?}: no vertex format for {size} x {data_type}")]
    UnsupportedFormat {
        attribute: String,
        data_type: DataType,
        size: usize,
    },
    #[error("geometry has no attribute {0:?}")]
    MissingAttribute(&'static str),
    #[error("atlas image {width}x{height} needs {expected} bytes, got {actual}")]
    AtlasImage {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

pub fn crate_info() -> &'static str {
    "tessera-render-wgpu v0.1.0"
}
