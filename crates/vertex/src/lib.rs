//! Vertex objects: typed structure-of-arrays pools backing GPU buffers.
//!
//! A [`VertexObjectDescriptor`] fixes the attribute schema. Attributes sharing a
//! `(usage, data type)` pair are packed into one [`VertexObjectBuffer`]; a
//! [`VertexObjectPool`] hands out [`VoHandle`]s to fixed-size slots of those
//! buffers.
//!
//! # Invariants
//! - Layout depends only on the attribute set, never on declaration order.
//! - Slots `[0, used_count)` hold exactly the live objects.
//! - Creating and freeing objects never allocates once the pool is built.
//! - Data moves (create/free/resize) bump every affected buffer's serial.

mod buffer;
mod descriptor;
mod pool;

pub use buffer::{BufferData, Component, VertexObjectBuffer};
pub use descriptor::{
    AttributeLayout, AttributeSpec, BufferLayout, DataType, DescriptorBuilder, UsageType,
    VertexObjectDescriptor,
};
pub use pool::{Attr, VertexObjectPool, VoHandle, VoMut};

/// Errors from building descriptors and resolving attributes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VertexError {
    #[error("descriptor declares no attributes")]
    NoAttributes,
    #[error("vertex count must be at least 1")]
    ZeroVertexCount,
    #[error("attribute {0:?} has zero components")]
    ZeroSize(String),
    #[error("attribute {0:?} declared twice")]
    DuplicateAttribute(String),
    #[error("attribute {attribute:?} expects {expected} components, got {actual}")]
    ComponentMismatch {
        attribute: String,
        expected: usize,
        actual: usize,
    },
    #[error("index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: u32, vertex_count: usize },
    #[error("unknown attribute {0:?}")]
    UnknownAttribute(String),
    #[error("attribute {attribute:?} has no component {component:?}")]
    UnknownComponent { attribute: String, component: String },
    #[error("attribute {attribute:?} is {declared}, requested as {requested}")]
    DataTypeMismatch {
        attribute: String,
        declared: DataType,
        requested: DataType,
    },
    #[error("expected {expected} values, got {actual}")]
    ValueCountMismatch { expected: usize, actual: usize },
    #[error("vertex {vertex} out of range for {vertex_count} vertices")]
    VertexOutOfRange { vertex: usize, vertex_count: usize },
    #[error("cannot shrink capacity to {requested} while {used} objects are live")]
    CapacityBelowUsage { requested: usize, used: usize },
}

pub fn crate_info() -> &'static str {
    "tessera-vertex v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("vertex"));
    }
}
