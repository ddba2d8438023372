//! Rendering adapter: vertex object pools as GPU-ready instanced geometry,
//! and a tile renderer drawing map tiles as atlas sprites.
//!
//! # Invariants
//! - Only [`InstancedGeometry`] creates or mutates [`GpuBuffer`] views.
//! - A GPU view is flagged for upload whenever its pool buffer's serial moves.
//! - Sprites are written in map coordinates; the layer offset lives in the
//!   renderer's node translation.
//!
//! # Workaround
//! [`GpuBuffer`] is a backend-neutral description of an uploaded buffer.
//! The wgpu backend mirrors it into real device buffers.

mod atlas;
mod geometry;
mod gpu;
mod sprite;

pub use atlas::{AtlasFrame, AtlasGridConfig, TexCoords, TextureAtlas, TileSet, TileSetConfig};
pub use geometry::{GeometryBinding, InstancedGeometry, Touch};
pub use gpu::{GpuAttribute, GpuBuffer};
pub use sprite::{
    sprite_base_descriptor, sprite_geometry, sprite_instance_descriptor, TileSpriteRenderer,
};

use tessera_vertex::VertexError;

/// Errors from assembling geometry, atlases and sprite renderers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Vertex(#[from] VertexError),
    #[error("atlas size must be non-zero, got {width}x{height}")]
    EmptyAtlas { width: u32, height: u32 },
    #[error("frame {x},{y} {width}x{height} does not fit the atlas")]
    FrameOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
    #[error("tile set frame range {first}..{end} exceeds {available} atlas frames")]
    FrameRange {
        first: usize,
        end: usize,
        available: usize,
    },
    #[error("extra pool {0:?} already attached")]
    DuplicatePool(String),
}

pub fn crate_info() -> &'static str {
    "tessera-render v0.1.0"
}
