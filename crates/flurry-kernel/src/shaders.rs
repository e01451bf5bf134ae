//! WGSL sources and the uniform layout they share.
//!
//! Every pass binds the same [`FrameUniforms`] block at group 0 and one
//! texture/sampler pair at group 1.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::backend::BackendProfile;
use crate::camera::PerspectiveCamera;
use crate::scene::SceneGraph;

/// Per-frame uniform block (must match `Frame` in [`COMMON_WGSL`]).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    /// World-to-clip
    pub view_proj: [[f32; 4]; 4],
    /// Clip-to-world, used to build sky rays
    pub inv_view_proj: [[f32; 4]; 4],
    /// Camera right vector (w unused)
    pub camera_right: [f32; 4],
    /// Camera up vector (w unused)
    pub camera_up: [f32; 4],
    /// Camera position (w unused)
    pub camera_position: [f32; 4],
    /// Direction towards each light, intensity in w
    pub light_dirs: [[f32; 4]; 2],
    /// Shared light colour (w unused)
    pub light_color: [f32; 4],
    /// Ground tint in rgb, ground half extent in w
    pub ground_tint: [f32; 4],
    /// x: sky installed, y: tone mapping, z: ground textured, w: sprite textured
    pub flags: [u32; 4],
}

impl FrameUniforms {
    /// Builds the block for one frame.
    #[must_use]
    pub fn new(scene: &SceneGraph, camera: &PerspectiveCamera, profile: &BackendProfile) -> Self {
        let view_proj = camera.view_projection();
        let lights = scene.lights();
        let light_dir = |i: usize| lights[i].direction().extend(lights[i].intensity).to_array();
        let ground = scene.ground();

        Self {
            view_proj: view_proj.to_cols_array_2d(),
            inv_view_proj: view_proj.inverse().to_cols_array_2d(),
            camera_right: camera.right().extend(0.0).to_array(),
            camera_up: camera.up().extend(0.0).to_array(),
            camera_position: camera.position.extend(1.0).to_array(),
            light_dirs: [light_dir(0), light_dir(1)],
            light_color: lights[0].color.extend(1.0).to_array(),
            ground_tint: ground.tint_rgb().extend(ground.size * 0.5).to_array(),
            flags: [
                u32::from(scene.skybox().has_background()),
                u32::from(profile.tone_mapping),
                u32::from(ground.is_textured()),
                u32::from(scene.has_sprite_texture()),
            ],
        }
    }

    /// World-to-clip matrix.
    #[must_use]
    pub fn view_projection(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.view_proj)
    }

    /// Direction towards light `i`.
    #[must_use]
    pub fn light_direction(&self, i: usize) -> Vec3 {
        let [x, y, z, _] = self.light_dirs[i];
        Vec3::new(x, y, z)
    }
}

/// One billboard instance (must match the sprite vertex inputs).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SpriteInstance {
    /// World position
    pub position: [f32; 3],
    /// Uniform scale
    pub scale: f32,
}

/// Bindings and helpers shared by every pass.
pub const COMMON_WGSL: &str = r"
struct Frame {
    view_proj: mat4x4<f32>,
    inv_view_proj: mat4x4<f32>,
    camera_right: vec4<f32>,
    camera_up: vec4<f32>,
    camera_position: vec4<f32>,
    light_dirs: array<vec4<f32>, 2>,
    light_color: vec4<f32>,
    ground_tint: vec4<f32>,
    flags: vec4<u32>,
}

@group(0) @binding(0) var<uniform> frame: Frame;
@group(1) @binding(0) var t_color: texture_2d<f32>;
@group(1) @binding(1) var s_color: sampler;

fn finish(color: vec3<f32>) -> vec3<f32> {
    if (frame.flags.y == 1u) {
        // Reinhard
        return color / (vec3<f32>(1.0) + color);
    }
    return color;
}
";

/// Full-screen equirectangular sky.
pub const SKY_WGSL: &str = r"
const PI: f32 = 3.14159265;

struct SkyOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) ndc: vec2<f32>,
}

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> SkyOut {
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    let ndc = uv * 2.0 - vec2<f32>(1.0);
    var out: SkyOut;
    out.clip = vec4<f32>(ndc, 1.0, 1.0);
    out.ndc = ndc;
    return out;
}

@fragment
fn fs_main(in: SkyOut) -> @location(0) vec4<f32> {
    let far = frame.inv_view_proj * vec4<f32>(in.ndc, 1.0, 1.0);
    let dir = normalize(far.xyz / far.w - frame.camera_position.xyz);
    let u = atan2(dir.z, dir.x) / (2.0 * PI) + 0.5;
    let v = acos(clamp(dir.y, -1.0, 1.0)) / PI;
    let color = textureSample(t_color, s_color, vec2<f32>(u, v)).rgb;
    return vec4<f32>(finish(color), 1.0);
}
";

/// Lit, optionally textured ground plane.
pub const GROUND_WGSL: &str = r"
const UV_REPEAT: f32 = 25.0;

struct GroundOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> GroundOut {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0), vec2<f32>(1.0, -1.0), vec2<f32>(1.0, 1.0),
        vec2<f32>(-1.0, -1.0), vec2<f32>(1.0, 1.0), vec2<f32>(-1.0, 1.0),
    );
    let c = corners[index];
    let half_extent = frame.ground_tint.w;
    var out: GroundOut;
    out.clip = frame.view_proj * vec4<f32>(c.x * half_extent, 0.0, c.y * half_extent, 1.0);
    out.uv = (c * 0.5 + vec2<f32>(0.5)) * UV_REPEAT;
    return out;
}

@fragment
fn fs_main(in: GroundOut) -> @location(0) vec4<f32> {
    let normal = vec3<f32>(0.0, 1.0, 0.0);
    var light = 0.0;
    for (var i = 0u; i < 2u; i = i + 1u) {
        let l = frame.light_dirs[i];
        light = light + max(dot(normal, l.xyz), 0.0) * l.w;
    }

    var albedo = frame.ground_tint.rgb;
    if (frame.flags.z == 1u) {
        albedo = albedo * textureSample(t_color, s_color, in.uv).rgb;
    }
    return vec4<f32>(finish(albedo * frame.light_color.rgb * light), 1.0);
}
";

/// Camera-facing snowflake billboards.
pub const SPRITE_WGSL: &str = r"
struct SpriteIn {
    @location(0) position: vec3<f32>,
    @location(1) scale: f32,
}

struct SpriteOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(@builtin(vertex_index) index: u32, sprite: SpriteIn) -> SpriteOut {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(-0.5, -0.5), vec2<f32>(0.5, -0.5), vec2<f32>(0.5, 0.5),
        vec2<f32>(-0.5, -0.5), vec2<f32>(0.5, 0.5), vec2<f32>(-0.5, 0.5),
    );
    let c = corners[index];
    let world = sprite.position
        + frame.camera_right.xyz * c.x * sprite.scale
        + frame.camera_up.xyz * c.y * sprite.scale;
    var out: SpriteOut;
    out.clip = frame.view_proj * vec4<f32>(world, 1.0);
    out.uv = vec2<f32>(c.x + 0.5, 0.5 - c.y);
    return out;
}

@fragment
fn fs_main(in: SpriteOut) -> @location(0) vec4<f32> {
    var color = vec4<f32>(1.0);
    if (frame.flags.w == 1u) {
        color = textureSample(t_color, s_color, in.uv);
    } else {
        let d = length(in.uv - vec2<f32>(0.5));
        color.a = 1.0 - smoothstep(0.35, 0.5, d);
    }
    if (color.a < 0.01) {
        discard;
    }
    return vec4<f32>(finish(color.rgb), color.a);
}
";

/// Prepends the shared bindings to a pass body.
#[must_use]
pub fn compose(body: &str) -> String {
    format!("{COMMON_WGSL}{body}")
}
