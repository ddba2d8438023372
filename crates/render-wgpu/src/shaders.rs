/// WGSL shader for instanced tile sprites on the ground plane.
///
/// Base position is a unit-quad corner; each instance places, scales and
/// textures one quad. Sprites lie on `y = offset.y`, map `y` running along `z`.
pub const SPRITE_SHADER: &str = r#"
struct Uniforms {
    view_proj: mat4x4<f32>,
    node_translation: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;

@group(1) @binding(0)
var atlas_texture: texture_2d<f32>;
@group(1) @binding(1)
var atlas_sampler: sampler;

struct VertexInput {
    @location(0) position: vec2<f32>,
};

struct InstanceInput {
    @location(1) offset: vec3<f32>,
    @location(2) size: vec2<f32>,
    @location(3) tex_coords: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_sprite(vertex: VertexInput, instance: InstanceInput) -> VertexOutput {
    let local = vertex.position * instance.size;
    let world = vec3<f32>(
        instance.offset.x + local.x,
        instance.offset.y,
        instance.offset.z + local.y,
    ) + uniforms.node_translation.xyz;

    var out: VertexOutput;
    out.clip_position = uniforms.view_proj * vec4<f32>(world, 1.0);
    out.uv = mix(instance.tex_coords.xy, instance.tex_coords.zw, vertex.position);
    return out;
}

@fragment
fn fs_sprite(in: VertexOutput) -> @location(0) vec4<f32> {
    let color = textureSample(atlas_texture, atlas_sampler, in.uv);
    if (color.a < 0.01) {
        discard;
    }
    return color;
}
"#;
