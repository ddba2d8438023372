use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::VertexError;

/// How often a buffer is expected to change, mirrored onto the GPU usage hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageType {
    #[default]
    Static,
    Dynamic,
    Stream,
}

impl UsageType {
    pub const ALL: [UsageType; 3] = [UsageType::Static, UsageType::Dynamic, UsageType::Stream];

    pub fn name(self) -> &'static str {
        match self {
            UsageType::Static => "static",
            UsageType::Dynamic => "dynamic",
            UsageType::Stream => "stream",
        }
    }

    /// Writes to dynamic and stream buffers are tracked automatically.
    pub fn tracks_writes(self) -> bool {
        !matches!(self, UsageType::Static)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[default]
    Float32,
    Int32,
    Uint32,
    Int16,
    Uint16,
    Int8,
    Uint8,
}

impl DataType {
    pub fn name(self) -> &'static str {
        match self {
            DataType::Float32 => "float32",
            DataType::Int32 => "int32",
            DataType::Uint32 => "uint32",
            DataType::Int16 => "int16",
            DataType::Uint16 => "uint16",
            DataType::Int8 => "int8",
            DataType::Uint8 => "uint8",
        }
    }

    /// Bytes per element.
    pub fn byte_size(self) -> usize {
        match self {
            DataType::Float32 | DataType::Int32 | DataType::Uint32 => 4,
            DataType::Int16 | DataType::Uint16 => 2,
            DataType::Int8 | DataType::Uint8 => 1,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Declaration of one named attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSpec {
    /// Component names; empty when the attribute was declared by size only.
    #[serde(default)]
    pub components: Vec<String>,
    pub size: usize,
    #[serde(default)]
    pub data_type: DataType,
    #[serde(default)]
    pub usage: UsageType,
    /// Re-upload every frame regardless of tracked writes.
    #[serde(default)]
    pub auto_touch: bool,
    /// Initial component values written on `create_vo`; zeros when absent.
    #[serde(default)]
    pub defaults: Option<Vec<f64>>,
}

impl AttributeSpec {
    /// `size` components, float32, static.
    pub fn new(size: usize) -> Self {
        Self {
            components: Vec::new(),
            size,
            data_type: DataType::default(),
            usage: UsageType::default(),
            auto_touch: false,
            defaults: None,
        }
    }

    /// Attribute with one named component per entry, e.g. `["x", "y", "z"]`.
    pub fn named<S: AsRef<str>>(components: &[S]) -> Self {
        Self {
            components: components.iter().map(|c| c.as_ref().to_owned()).collect(),
            ..Self::new(components.len())
        }
    }

    pub fn data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    pub fn usage(mut self, usage: UsageType) -> Self {
        self.usage = usage;
        self
    }

    /// Mark the buffer dirty on every geometry update.
    pub fn auto_touch(mut self) -> Self {
        self.auto_touch = true;
        self
    }

    /// Component values written into every new object.
    pub fn defaults(mut self, values: &[f64]) -> Self {
        self.defaults = Some(values.to_vec());
        self
    }
}

/// Placement of one attribute inside its shared buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeLayout {
    pub name: String,
    pub buffer: usize,
    /// Element offset inside one buffer item.
    pub offset: usize,
    pub size: usize,
    pub components: Vec<String>,
    pub data_type: DataType,
    pub usage: UsageType,
    pub auto_touch: bool,
    pub defaults: Option<Vec<f64>>,
}

impl AttributeLayout {
    /// Index of a named component.
    pub fn component_index(&self, component: &str) -> Option<usize> {
        self.components.iter().position(|c| c == component)
    }
}

/// One shared buffer: every attribute with the same `(usage, data type)`.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferLayout {
    /// `"{usage}_{data type}"`, e.g. `dynamic_float32`.
    pub name: String,
    pub usage: UsageType,
    pub data_type: DataType,
    /// Elements per vertex across all attributes in this buffer.
    pub item_size: usize,
    /// Indices into the descriptor's attribute list, in offset order.
    pub attributes: Vec<usize>,
}

impl BufferLayout {
    /// More than one attribute shares this buffer.
    pub fn is_interleaved(&self) -> bool {
        self.attributes.len() > 1
    }
}

/// Fixed schema of a vertex object pool.
///
/// Layout is computed once, iterating attributes sorted by name, so two
/// descriptors declaring the same attributes in any order are identical.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexObjectDescriptor {
    vertex_count: usize,
    indices: Option<Vec<u32>>,
    attributes: Vec<AttributeLayout>,
    buffers: Vec<BufferLayout>,
}

impl VertexObjectDescriptor {
    pub fn builder() -> DescriptorBuilder {
        DescriptorBuilder::default()
    }

    /// Sub-elements per object: vertices for base shapes, mesh instances
    /// for instanced pools.
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Index list of the base shape, if any.
    pub fn indices(&self) -> Option<&[u32]> {
        self.indices.as_deref()
    }

    pub fn attributes(&self) -> &[AttributeLayout] {
        &self.attributes
    }

    pub fn buffers(&self) -> &[BufferLayout] {
        &self.buffers
    }

    pub fn attribute_index(&self, name: &str) -> Option<usize> {
        self.attributes
            .binary_search_by(|a| a.name.as_str().cmp(name))
            .ok()
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeLayout> {
        self.attribute_index(name).map(|i| &self.attributes[i])
    }

    /// Buffer holding attributes of this usage and data type.
    pub fn buffer_index(&self, usage: UsageType, data_type: DataType) -> Option<usize> {
        self.buffers
            .iter()
            .position(|b| b.usage == usage && b.data_type == data_type)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DescriptorBuilder {
    vertex_count: usize,
    indices: Option<Vec<u32>>,
    attributes: BTreeMap<String, AttributeSpec>,
    duplicate: Option<String>,
}

impl DescriptorBuilder {
    pub fn vertex_count(mut self, count: usize) -> Self {
        self.vertex_count = count;
        self
    }

    /// Alias of [`vertex_count`](Self::vertex_count) for instanced pools.
    pub fn mesh_count(self, count: usize) -> Self {
        self.vertex_count(count)
    }

    pub fn indices<I: IntoIterator<Item = u32>>(mut self, indices: I) -> Self {
        self.indices = Some(indices.into_iter().collect());
        self
    }

    pub fn attribute(mut self, name: impl Into<String>, spec: AttributeSpec) -> Self {
        let name = name.into();
        if self.attributes.contains_key(&name) && self.duplicate.is_none() {
            self.duplicate = Some(name.clone());
        }
        self.attributes.insert(name, spec);
        self
    }

    /// Lay out attributes by name into one buffer per usage and data type.
    pub fn build(self) -> Result<VertexObjectDescriptor, VertexError> {
        if let Some(name) = self.duplicate {
            return Err(VertexError::DuplicateAttribute(name));
        }
        if self.vertex_count == 0 {
            return Err(VertexError::ZeroVertexCount);
        }
        if self.attributes.is_empty() {
            return Err(VertexError::NoAttributes);
        }
        if let Some(indices) = &self.indices {
            if let Some(&bad) = indices.iter().find(|&&i| i as usize >= self.vertex_count) {
                return Err(VertexError::IndexOutOfRange {
                    index: bad,
                    vertex_count: self.vertex_count,
                });
            }
        }

        // BTreeMap iteration is sorted by attribute name, and buffers are
        // keyed by (usage, data type), so the layout is canonical.
        let mut grouped: BTreeMap<(UsageType, DataType), Vec<usize>> = BTreeMap::new();
        let mut attributes = Vec::with_capacity(self.attributes.len());
        for (name, spec) in self.attributes {
            if spec.size == 0 {
                return Err(VertexError::ZeroSize(name));
            }
            if !spec.components.is_empty() && spec.components.len() != spec.size {
                return Err(VertexError::ComponentMismatch {
                    attribute: name,
                    expected: spec.size,
                    actual: spec.components.len(),
                });
            }
            if let Some(defaults) = &spec.defaults {
                if defaults.len() != spec.size {
                    return Err(VertexError::ComponentMismatch {
                        attribute: name,
                        expected: spec.size,
                        actual: defaults.len(),
                    });
                }
            }
            grouped
                .entry((spec.usage, spec.data_type))
                .or_default()
                .push(attributes.len());
            attributes.push(AttributeLayout {
                name,
                buffer: 0,
                offset: 0,
                size: spec.size,
                components: spec.components,
                data_type: spec.data_type,
                usage: spec.usage,
                auto_touch: spec.auto_touch,
                defaults: spec.defaults,
            });
        }

        let mut buffers = Vec::with_capacity(grouped.len());
        for ((usage, data_type), members) in grouped {
            let buffer = buffers.len();
            let mut item_size = 0;
            for &i in &members {
                attributes[i].buffer = buffer;
                attributes[i].offset = item_size;
                item_size += attributes[i].size;
            }
            buffers.push(BufferLayout {
                name: format!("{}_{}", usage.name(), data_type.name()),
                usage,
                data_type,
                item_size,
                attributes: members,
            });
        }

        Ok(VertexObjectDescriptor {
            vertex_count: self.vertex_count,
            indices: self.indices,
            attributes,
            buffers,
        })
    }
}
