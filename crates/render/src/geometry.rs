use std::collections::{BTreeMap, BTreeSet};

use tessera_vertex::{UsageType, VertexObjectPool};

use crate::gpu::GpuBuffer;
use crate::RenderError;

/// Target of an explicit [`InstancedGeometry::touch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Touch<'a> {
    Attribute(&'a str),
    Usage(UsageType),
}

#[derive(Debug, Clone)]
struct PoolBinding {
    pool: VertexObjectPool,
    gpu: Vec<GpuBuffer>,
    instanced: bool,
}

impl PoolBinding {
    fn new(pool: VertexObjectPool, instanced: bool) -> Self {
        let gpu = pool
            .buffers()
            .iter()
            .map(|b| GpuBuffer::new(pool.descriptor(), b, instanced))
            .collect();
        Self {
            pool,
            gpu,
            instanced,
        }
    }

    fn touch_auto(&mut self) {
        let buffers: BTreeSet<usize> = self
            .pool
            .descriptor()
            .attributes()
            .iter()
            .filter(|a| a.auto_touch)
            .map(|a| a.buffer)
            .collect();
        for b in buffers {
            self.pool.touch_buffer(b);
        }
    }

    fn touch(&mut self, target: Touch<'_>) -> usize {
        match target {
            Touch::Attribute(name) => match self.pool.descriptor().attribute(name) {
                Some(layout) => {
                    let buffer = layout.buffer;
                    self.pool.touch_buffer(buffer);
                    1
                }
                None => 0,
            },
            Touch::Usage(usage) => {
                let n = self.pool.buffers().iter().filter(|b| b.usage() == usage).count();
                self.pool.touch_usage(usage);
                n
            }
        }
    }

    fn sync(&mut self) -> usize {
        let mut changed = 0;
        for (index, gpu) in self.gpu.iter_mut().enumerate() {
            let Some(buffer) = self.pool.buffer_mut(index) else {
                continue;
            };
            if gpu.sync(buffer) {
                changed += 1;
            }
            buffer.clear_dirty();
        }
        changed
    }
}

/// One pool and its GPU views, as handed to a backend.
#[derive(Debug, Clone, Copy)]
pub struct GeometryBinding<'a> {
    pub name: &'a str,
    pub pool: &'a VertexObjectPool,
    pub buffers: &'a [GpuBuffer],
    pub instanced: bool,
}

/// Instanced draw over vertex object pools: an optional per-vertex base
/// shape, a per-instance pool, and named extra per-instance pools.
#[derive(Debug, Clone)]
pub struct InstancedGeometry {
    base: Option<PoolBinding>,
    instances: PoolBinding,
    extras: BTreeMap<String, PoolBinding>,
    instance_count: usize,
    draw_count: usize,
    statics_sent: bool,
}

impl InstancedGeometry {
    /// Adapter over `instances`, with no base shape.
    pub fn new(instances: VertexObjectPool) -> Self {
        Self {
            base: None,
            instances: PoolBinding::new(instances, true),
            extras: BTreeMap::new(),
            instance_count: 0,
            draw_count: 0,
            statics_sent: false,
        }
    }

    /// Attach the per-vertex base shape, sent to the GPU once.
    pub fn with_base(mut self, base: VertexObjectPool) -> Self {
        self.base = Some(PoolBinding::new(base, false));
        self
    }

    /// Bind another instanced pool under `name`.
    pub fn add_extra(
        &mut self,
        name: impl Into<String>,
        pool: VertexObjectPool,
    ) -> Result<(), RenderError> {
        let name = name.into();
        if self.extras.contains_key(&name) {
            return Err(RenderError::DuplicatePool(name));
        }
        self.extras.insert(name, PoolBinding::new(pool, true));
        Ok(())
    }

    pub fn base(&self) -> Option<&VertexObjectPool> {
        self.base.as_ref().map(|b| &b.pool)
    }

    pub fn base_mut(&mut self) -> Option<&mut VertexObjectPool> {
        self.base.as_mut().map(|b| &mut b.pool)
    }

    pub fn instances(&self) -> &VertexObjectPool {
        &self.instances.pool
    }

    pub fn instances_mut(&mut self) -> &mut VertexObjectPool {
        &mut self.instances.pool
    }

    pub fn extra(&self, name: &str) -> Option<&VertexObjectPool> {
        self.extras.get(name).map(|b| &b.pool)
    }

    pub fn extra_mut(&mut self, name: &str) -> Option<&mut VertexObjectPool> {
        self.extras.get_mut(name).map(|b| &mut b.pool)
    }

    /// Live instances as of the last [`update`](Self::update).
    pub fn instance_count(&self) -> usize {
        self.instance_count
    }

    /// Index (or vertex) count to draw, across all instances.
    pub fn draw_count(&self) -> usize {
        self.draw_count
    }

    fn bindings_mut(&mut self) -> impl Iterator<Item = &mut PoolBinding> {
        self.base
            .iter_mut()
            .chain(std::iter::once(&mut self.instances))
            .chain(self.extras.values_mut())
    }

    /// Pools and GPU views in bind order: base, instances, extras by name.
    pub fn bindings(&self) -> impl Iterator<Item = GeometryBinding<'_>> {
        let base = self.base.iter().map(|b| ("base", b));
        let instances = std::iter::once(("instances", &self.instances));
        let extras = self.extras.iter().map(|(n, b)| (n.as_str(), b));
        base.chain(instances)
            .chain(extras)
            .map(|(name, b)| GeometryBinding {
                name,
                pool: &b.pool,
                buffers: &b.gpu,
                instanced: b.instanced,
            })
    }

    /// Per-frame sync of counts and dirty state. Returns the number of GPU
    /// views that picked up changes.
    pub fn update(&mut self) -> usize {
        let _span = tracing::trace_span!("instanced_geometry_update").entered();
        let used = self.instances.pool.used_count();
        self.instance_count = used;
        let shape = self
            .base
            .as_ref()
            .map_or(self.instances.pool.descriptor(), |b| b.pool.descriptor());
        self.draw_count = match shape.indices() {
            Some(indices) => used * indices.len(),
            None => used * shape.vertex_count(),
        };

        if used > 0 && !self.statics_sent {
            for binding in self.bindings_mut() {
                binding.pool.touch_usage(UsageType::Static);
            }
            self.statics_sent = true;
            tracing::debug!("initial static upload scheduled");
        }

        let mut changed = 0;
        for binding in self.bindings_mut() {
            binding.touch_auto();
            changed += binding.sync();
        }
        changed
    }

    /// Mark buffers for upload by attribute name or usage class, across
    /// every pool. Returns how many buffers were touched.
    pub fn touch(&mut self, targets: &[Touch<'_>]) -> usize {
        let mut touched = 0;
        for binding in self.bindings_mut() {
            for &target in targets {
                touched += binding.touch(target);
            }
        }
        if touched == 0 {
            tracing::debug!(?targets, "touch matched no buffers");
        }
        touched
    }

    /// The backend consumed every pending upload.
    pub fn mark_uploaded(&mut self) {
        for binding in self.bindings_mut() {
            for gpu in &mut binding.gpu {
                gpu.mark_uploaded();
            }
        }
    }

    /// Any GPU view still waiting for upload.
    pub fn needs_upload(&self) -> bool {
        self.bindings()
            .any(|b| b.buffers.iter().any(GpuBuffer::needs_update))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_vertex::{AttributeSpec, VertexObjectDescriptor};

    fn quad() -> VertexObjectPool {
        let desc = VertexObjectDescriptor::builder()
            .vertex_count(4)
            .indices([0, 1, 2, 0, 2, 3])
            .attribute("position", AttributeSpec::new(2))
            .build()
            .unwrap();
        VertexObjectPool::new(desc, 1)
    }

    fn instances(capacity: usize) -> VertexObjectPool {
        let desc = VertexObjectDescriptor::builder()
            .mesh_count(1)
            .attribute("offset", AttributeSpec::new(3).usage(UsageType::Dynamic))
            .attribute("color", AttributeSpec::new(4).data_type(tessera_vertex::DataType::Uint8))
            .attribute(
                "time",
                AttributeSpec::new(1).usage(UsageType::Stream).auto_touch(),
            )
            .build()
            .unwrap();
        VertexObjectPool::new(desc, capacity)
    }

    fn geometry() -> InstancedGeometry {
        let mut g = InstancedGeometry::new(instances(8)).with_base(quad());
        g.base_mut().unwrap().create_vo();
        g.update();
        g.mark_uploaded();
        g
    }

    fn view<'a>(g: &'a InstancedGeometry, pool: &str, buffer: &str) -> &'a GpuBuffer {
        g.bindings()
            .find(|b| b.name == pool)
            .and_then(|b| b.buffers.iter().find(|v| v.name == buffer))
            .unwrap()
    }

    #[test]
    fn draw_range_follows_used_count() {
        let mut g = geometry();
        assert_eq!(g.instance_count(), 0);
        assert_eq!(g.draw_count(), 0);
        for _ in 0..3 {
            g.instances_mut().create_vo();
        }
        g.update();
        assert_eq!(g.instance_count(), 3);
        assert_eq!(g.draw_count(), 18);

        let mut flat = InstancedGeometry::new(instances(4));
        flat.instances_mut().create_vo();
        flat.update();
        assert_eq!(flat.draw_count(), 1);
    }

    #[test]
    fn statics_upload_once_on_first_instance() {
        let mut g = geometry();
        g.update();
        assert!(!view(&g, "base", "static_float32").needs_update());

        g.instances_mut().create_vo();
        g.update();
        assert!(view(&g, "base", "static_float32").needs_update());
        assert!(view(&g, "instances", "static_uint8").needs_update());
        g.mark_uploaded();

        g.instances_mut().create_vo();
        g.update();
        assert!(!view(&g, "base", "static_float32").needs_update());
    }

    #[test]
    fn auto_touch_buffers_upload_every_frame() {
        let mut g = geometry();
        g.instances_mut().create_vo();
        g.update();
        g.mark_uploaded();
        g.update();
        assert!(view(&g, "instances", "stream_float32").needs_update());
        assert!(!view(&g, "instances", "dynamic_float32").needs_update());
    }

    #[test]
    fn free_vo_propagates_to_gpu_views() {
        let mut g = geometry();
        let a = g.instances_mut().create_vo().unwrap();
        g.instances_mut().create_vo().unwrap();
        g.update();
        g.mark_uploaded();

        g.instances_mut().free_vo(a);
        g.update();
        let v = view(&g, "instances", "dynamic_float32");
        assert!(v.needs_update());
        assert_eq!(v.update_range(), Some(0..3));
    }

    #[test]
    fn growth_repoints_views() {
        let mut g = geometry();
        g.instances_mut().create_vo();
        g.update();
        g.mark_uploaded();
        let before = view(&g, "instances", "dynamic_float32").array_version();

        g.instances_mut().resize(32).unwrap();
        g.update();
        let v = view(&g, "instances", "dynamic_float32");
        assert!(v.is_reallocated());
        assert!(v.array_version() > before);
        assert_eq!(v.update_range(), Some(0..96));
    }

    #[test]
    fn touch_by_name_and_usage() {
        let mut g = geometry();
        g.instances_mut().create_vo();
        g.update();
        g.mark_uploaded();

        assert_eq!(g.touch(&[Touch::Attribute("color")]), 1);
        assert_eq!(g.touch(&[Touch::Attribute("nope")]), 0);
        g.update();
        assert!(view(&g, "instances", "static_uint8").needs_update());
        assert!(!view(&g, "base", "static_float32").needs_update());
        g.mark_uploaded();

        assert_eq!(g.touch(&[Touch::Usage(UsageType::Static)]), 2);
        g.update();
        assert!(view(&g, "base", "static_float32").needs_update());
        assert!(g.needs_upload());
    }

    #[test]
    fn extras_are_bound_after_instances() {
        let mut g = geometry();
        g.add_extra("outline", instances(2)).unwrap();
        assert!(matches!(
            g.add_extra("outline", instances(2)),
            Err(RenderError::DuplicatePool(_))
        ));
        let names: Vec<&str> = g.bindings().map(|b| b.name).collect();
        assert_eq!(names, vec!["base", "instances", "outline"]);
        assert!(g.extra("outline").is_some());
        g.extra_mut("outline").unwrap().create_vo();
        g.update();
        assert!(view(&g, "outline", "dynamic_float32").needs_update());
    }
}
