use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use tessera_common::Camera;
use tessera_render::InstancedGeometry;
use wgpu::util::DeviceExt;

use crate::layout::{vertex_layouts, VertexSlot};
use crate::shaders;
use crate::upload::GeometryUploader;
use crate::BackendError;

/// Shader locations of the sprite attributes.
pub const SPRITE_LOCATIONS: [(&str, u32); 4] = [
    ("position", 0),
    ("offset", 1),
    ("size", 2),
    ("texCoords", 3),
];

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Uniforms {
    view_proj: [[f32; 4]; 4],
    node_translation: [f32; 4],
}

impl Uniforms {
    fn new(view_proj: Mat4, translation: Vec3) -> Self {
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            node_translation: translation.extend(0.0).to_array(),
        }
    }
}

/// Instanced pipeline drawing a sprite geometry with one atlas texture.
pub struct SpritePipeline {
    pipeline: wgpu::RenderPipeline,
    slots: Vec<VertexSlot>,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    texture_layout: wgpu::BindGroupLayout,
    texture_bind_group: wgpu::BindGroup,
    sampler: wgpu::Sampler,
    depth_texture: wgpu::TextureView,
    surface_format: wgpu::TextureFormat,
}

impl SpritePipeline {
    /// Build the pipeline for `geometry` with a 1x1 white atlas and a depth
    /// buffer of `width` x `height`.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        geometry: &InstancedGeometry,
        width: u32,
        height: u32,
    ) -> Result<Self, BackendError> {
        let slots = vertex_layouts(geometry, &SPRITE_LOCATIONS)?;

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("sprite_uniforms"),
            contents: bytemuck::bytes_of(&Uniforms::new(Mat4::IDENTITY, Vec3::ZERO)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sprite_uniform_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sprite_uniform_bind_group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sprite_atlas_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("sprite_atlas_sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        // white until an atlas image is set
        let placeholder = Self::atlas_view(device, queue, 1, 1, &[255; 4]);
        let texture_bind_group =
            Self::texture_bind_group(device, &texture_layout, &placeholder, &sampler);

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sprite_pipeline_layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("sprite_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::SPRITE_SHADER.into()),
        });
        let buffers: Vec<wgpu::VertexBufferLayout<'_>> =
            slots.iter().map(VertexSlot::layout).collect();
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("sprite_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_sprite"),
                compilation_options: Default::default(),
                buffers: &buffers,
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_sprite"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: wgpu::TextureFormat::Depth32Float,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: Default::default(),
            multiview: None,
            cache: None,
        });

        tracing::debug!(slots = slots.len(), "sprite pipeline created");
        Ok(Self {
            pipeline,
            slots,
            uniform_buffer,
            uniform_bind_group,
            texture_layout,
            texture_bind_group,
            sampler,
            depth_texture: Self::create_depth_texture(device, width, height),
            surface_format,
        })
    }

    /// Color format the pipeline renders into.
    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.surface_format
    }

    /// Vertex buffer slots in bind order.
    pub fn slots(&self) -> &[VertexSlot] {
        &self.slots
    }

    /// Recreate the depth buffer for a new surface size.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.depth_texture = Self::create_depth_texture(device, width, height);
    }

    /// Replace the atlas with an RGBA8 image.
    pub fn set_atlas_image(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<(), BackendError> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || rgba.len() != expected {
            return Err(BackendError::AtlasImage {
                width,
                height,
                expected,
                actual: rgba.len(),
            });
        }
        let view = Self::atlas_view(device, queue, width, height, rgba);
        self.texture_bind_group =
            Self::texture_bind_group(device, &self.texture_layout, &view, &self.sampler);
        Ok(())
    }

    /// Camera matrices plus the renderer's node translation.
    pub fn set_camera(&self, queue: &wgpu::Queue, camera: &Camera, node_translation: Vec3) {
        queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&Uniforms::new(camera.view_projection(), node_translation)),
        );
    }

    /// Upload pending geometry changes and draw one frame into `view`.
    pub fn render(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        view: &wgpu::TextureView,
        uploader: &mut GeometryUploader,
        geometry: &mut InstancedGeometry,
    ) {
        uploader.upload(device, queue, geometry);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("sprite_encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("sprite_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.1,
                            g: 0.1,
                            b: 0.15,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });
            self.draw(&mut pass, uploader, geometry);
        }
        queue.submit(std::iter::once(encoder.finish()));
    }

    /// Record the sprite draw into an open pass. Skips when nothing is
    /// visible or a slot has not been uploaded yet.
    pub fn draw(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        uploader: &GeometryUploader,
        geometry: &InstancedGeometry,
    ) {
        let instances = geometry.instance_count() as u32;
        if instances == 0 {
            return;
        }
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.uniform_bind_group, &[]);
        pass.set_bind_group(1, &self.texture_bind_group, &[]);
        for (slot, layout) in self.slots.iter().enumerate() {
            let Some(buffer) = uploader.buffer(&layout.pool, &layout.buffer) else {
                tracing::warn!(pool = %layout.pool, buffer = %layout.buffer, "vertex slot not uploaded");
                return;
            };
            pass.set_vertex_buffer(slot as u32, buffer.slice(..));
        }
        match uploader.index_buffer() {
            Some(index) => {
                pass.set_index_buffer(index.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..uploader.index_count(), 0, 0..instances);
            }
            None => {
                let shape = geometry.base().unwrap_or(geometry.instances()).descriptor();
                pass.draw(0..shape.vertex_count() as u32, 0..instances);
            }
        }
    }

    fn atlas_view(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> wgpu::TextureView {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("sprite_atlas"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );
        texture.create_view(&Default::default())
    }

    fn texture_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        view: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sprite_atlas_bind_group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }

    fn create_depth_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("sprite_depth"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Depth32Float,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        texture.create_view(&Default::default())
    }
}
