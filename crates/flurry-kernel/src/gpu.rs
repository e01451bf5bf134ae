//! wgpu renderer backend.
//!
//! Both backend kinds are wgpu devices; they differ in which native APIs they
//! may use:
//! - GPU compute: Vulkan, Metal, DX12 or browser WebGPU, and the adapter must
//!   support compute shaders.
//! - Legacy: the GL backend restricted to WebGL2-level limits.
//!
//! A frame is three passes into one colour target over a shared depth
//! buffer: equirectangular sky, lit ground, then instanced snowflake billboards.

use std::collections::HashMap;

use bytemuck::Zeroable;
use flurry_common::{BackendError, BackendKind};
use tracing::{debug, info, warn};
use wgpu::util::DeviceExt;

use crate::asset::{DecodedImage, TextureSlot};
use crate::backend::{BackendProfile, BackendProvider, RendererBackend};
use crate::camera::CameraRig;
use crate::resource::{GpuResource, ResourceKind, ResourceTracker};
use crate::scene::SceneGraph;
use crate::shaders::{self, FrameUniforms, SpriteInstance};

/// Depth buffer format.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

/// Minimum sprite instance capacity.
const MIN_INSTANCE_CAPACITY: usize = 64;

/// Background colour while the sky texture is loading.
const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.02,
    g: 0.02,
    b: 0.05,
    a: 1.0,
};

/// Native APIs a backend kind may run on.
#[must_use]
pub const fn backends_for(kind: BackendKind) -> wgpu::Backends {
    match kind {
        BackendKind::GpuCompute => wgpu::Backends::PRIMARY,
        BackendKind::Legacy => wgpu::Backends::GL,
    }
}

fn adapter_supports(kind: BackendKind, adapter: &wgpu::Adapter) -> bool {
    match kind {
        BackendKind::GpuCompute => adapter
            .get_downlevel_capabilities()
            .flags
            .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS),
        BackendKind::Legacy => true,
    }
}

fn limits_for(kind: BackendKind, adapter: &wgpu::Adapter) -> wgpu::Limits {
    let base = match kind {
        BackendKind::GpuCompute => wgpu::Limits::downlevel_defaults(),
        BackendKind::Legacy => wgpu::Limits::downlevel_webgl2_defaults(),
    };
    base.using_resolution(adapter.limits())
}

/// Creates wgpu backends presenting to a window.
pub struct WgpuProvider<W> {
    window: W,
    vsync: bool,
    validation: bool,
    probe: wgpu::Instance,
}

impl<W> WgpuProvider<W>
where
    W: wgpu::WindowHandle + Clone + 'static,
{
    /// Creates a provider for `window`.
    pub fn new(window: W, vsync: bool, validation: bool) -> Self {
        let probe = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        Self {
            window,
            vsync,
            validation,
            probe,
        }
    }

    fn instance_flags(&self) -> wgpu::InstanceFlags {
        if self.validation {
            wgpu::InstanceFlags::debugging()
        } else {
            wgpu::InstanceFlags::default()
        }
    }
}

impl<W> BackendProvider for WgpuProvider<W>
where
    W: wgpu::WindowHandle + Clone + 'static,
{
    type Backend = WgpuBackend;

    fn available(&self, kind: BackendKind) -> bool {
        self.probe
            .enumerate_adapters(backends_for(kind))
            .iter()
            .any(|adapter| adapter_supports(kind, adapter))
    }

    fn initialize(
        &mut self,
        kind: BackendKind,
        width: u32,
        height: u32,
        tracker: &ResourceTracker,
    ) -> Result<WgpuBackend, BackendError> {
        if !self.available(kind) {
            return Err(BackendError::Unsupported { kind });
        }

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: backends_for(kind),
            flags: self.instance_flags(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(self.window.clone())
            .map_err(|e| BackendError::Surface(e.to_string()))?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .filter(|adapter| adapter_supports(kind, adapter))
        .ok_or(BackendError::Unsupported { kind })?;

        let adapter_info = adapter.get_info();
        info!(
            "Using GPU adapter: {} ({:?})",
            adapter_info.name, adapter_info.backend
        );

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Flurry Device"),
                required_features: wgpu::Features::empty(),
                required_limits: limits_for(kind, &adapter),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        ))
        .map_err(|e| BackendError::InitFailed(e.to_string()))?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first())
            .copied()
            .ok_or_else(|| BackendError::Surface("surface reports no formats".into()))?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: if self.vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let backend = WgpuBackend::new(kind, surface, device, queue, config, tracker.clone());
        info!("{kind} renderer created");
        Ok(backend)
    }
}

struct PassDesc<'a> {
    label: &'a str,
    body: &'a str,
    buffers: &'a [wgpu::VertexBufferLayout<'a>],
    depth_compare: wgpu::CompareFunction,
    depth_write: bool,
    blend: Option<wgpu::BlendState>,
}

fn create_pass(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    format: wgpu::TextureFormat,
    desc: &PassDesc<'_>,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(desc.label),
        source: wgpu::ShaderSource::Wgsl(shaders::compose(desc.body).into()),
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(desc.label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: desc.buffers,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: desc.blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: desc.depth_write,
            depth_compare: desc.depth_compare,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

fn create_depth_view(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
) -> wgpu::TextureView {
    device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some("depth_texture"),
            size: wgpu::Extent3d {
                width: config.width,
                height: config.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default())
}

/// Renderer presenting to a window surface.
#[derive(Debug)]
pub struct WgpuBackend {
    kind: BackendKind,
    profile: BackendProfile,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth_view: wgpu::TextureView,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    fallback_texture: wgpu::BindGroup,
    textures: HashMap<TextureSlot, wgpu::BindGroup>,
    sky_pipeline: wgpu::RenderPipeline,
    ground_pipeline: wgpu::RenderPipeline,
    sprite_pipeline: wgpu::RenderPipeline,
    instance_buffer: wgpu::Buffer,
    instance_capacity: usize,
    instances: Vec<SpriteInstance>,
    tracker: ResourceTracker,
    frame_count: u64,
}

impl WgpuBackend {
    fn new(
        kind: BackendKind,
        surface: wgpu::Surface<'static>,
        device: wgpu::Device,
        queue: wgpu::Queue,
        config: wgpu::SurfaceConfiguration,
        tracker: ResourceTracker,
    ) -> Self {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("frame_uniform_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("texture_layout"),
            entries: &[
                // 0: Colour texture
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
                // 1: Sampler
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("frame_uniforms"),
            contents: bytemuck::bytes_of(&FrameUniforms::zeroed()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frame_uniform_bind_group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("texture_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("scene_pipeline_layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let format = config.format;
        let sky_pipeline = create_pass(
            &device,
            &pipeline_layout,
            format,
            &PassDesc {
                label: "sky_pass",
                body: shaders::SKY_WGSL,
                buffers: &[],
                depth_compare: wgpu::CompareFunction::Always,
                depth_write: false,
                blend: None,
            },
        );
        let ground_pipeline = create_pass(
            &device,
            &pipeline_layout,
            format,
            &PassDesc {
                label: "ground_pass",
                body: shaders::GROUND_WGSL,
                buffers: &[],
                depth_compare: wgpu::CompareFunction::Less,
                depth_write: true,
                blend: None,
            },
        );
        let sprite_attributes = wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32];
        let sprite_pipeline = create_pass(
            &device,
            &pipeline_layout,
            format,
            &PassDesc {
                label: "sprite_pass",
                body: shaders::SPRITE_WGSL,
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<SpriteInstance>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Instance,
                    attributes: &sprite_attributes,
                }],
                depth_compare: wgpu::CompareFunction::Less,
                depth_write: false,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
            },
        );

        let instance_buffer = create_instance_buffer(&device, MIN_INSTANCE_CAPACITY);
        let depth_view = create_depth_view(&device, &config);
        let fallback_texture = TextureTarget {
            device: &device,
            queue: &queue,
            layout: &texture_layout,
            sampler: &sampler,
        }
        .create_bind_group("fallback_texture", &DecodedImage::solid(1, 1, [255; 4]));

        Self {
            kind,
            profile: BackendProfile::for_kind(kind),
            surface,
            fallback_texture,
            device,
            queue,
            config,
            depth_view,
            uniform_buffer,
            uniform_bind_group,
            texture_layout,
            sampler,
            textures: HashMap::new(),
            sky_pipeline,
            ground_pipeline,
            sprite_pipeline,
            instance_buffer,
            instance_capacity: MIN_INSTANCE_CAPACITY,
            instances: Vec::new(),
            tracker,
            frame_count: 0,
        }
    }

    fn texture_target(&self) -> TextureTarget<'_> {
        TextureTarget {
            device: &self.device,
            queue: &self.queue,
            layout: &self.texture_layout,
            sampler: &self.sampler,
        }
    }

    fn texture_for(&self, slot: TextureSlot) -> &wgpu::BindGroup {
        self.textures.get(&slot).unwrap_or(&self.fallback_texture)
    }

    fn reconfigure(&self) {
        self.surface.configure(&self.device, &self.config);
    }

    fn write_instances(&mut self, scene: &SceneGraph) {
        self.instances.clear();
        self.instances
            .extend(scene.particles().iter().map(|p| SpriteInstance {
                position: p.position.to_array(),
                scale: p.scale.x,
            }));

        if self.instances.len() > self.instance_capacity {
            self.instance_capacity = self.instances.len().next_power_of_two();
            self.instance_buffer = create_instance_buffer(&self.device, self.instance_capacity);
            debug!("Sprite instance buffer grown to {}", self.instance_capacity);
        }
        if !self.instances.is_empty() {
            self.queue
                .write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&self.instances));
        }
    }

    /// Frames presented so far.
    #[must_use]
    pub const fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

struct TextureTarget<'a> {
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
    layout: &'a wgpu::BindGroupLayout,
    sampler: &'a wgpu::Sampler,
}

impl TextureTarget<'_> {
    fn create_bind_group(&self, label: &str, image: &DecodedImage) -> wgpu::BindGroup {
        let size = wgpu::Extent3d {
            width: image.width,
            height: image.height,
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &image.rgba,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * image.width),
                rows_per_image: Some(image.height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(self.sampler),
                },
            ],
        })
    }
}

fn create_instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("sprite_instances"),
        size: (capacity * std::mem::size_of::<SpriteInstance>()) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// Shrinks an image so neither side exceeds `max_dimension`, keeping aspect.
#[must_use]
pub fn fit_to_limit(image: &DecodedImage, max_dimension: u32) -> Option<DecodedImage> {
    let largest = image.width.max(image.height);
    if largest <= max_dimension {
        return None;
    }

    let scale = max_dimension as f32 / largest as f32;
    let width = ((image.width as f32 * scale) as u32).clamp(1, max_dimension);
    let height = ((image.height as f32 * scale) as u32).clamp(1, max_dimension);
    let source = image::RgbaImage::from_raw(image.width, image.height, image.rgba.clone())?;
    let resized =
        image::imageops::resize(&source, width, height, image::imageops::FilterType::Triangle);

    Some(DecodedImage {
        width,
        height,
        rgba: resized.into_raw(),
    })
}

impl RendererBackend for WgpuBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn profile(&self) -> &BackendProfile {
        &self.profile
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.reconfigure();
        self.depth_view = create_depth_view(&self.device, &self.config);
    }

    fn upload_texture(
        &mut self,
        slot: TextureSlot,
        image: &DecodedImage,
    ) -> Result<GpuResource, BackendError> {
        let expected = image.width as usize * image.height as usize * 4;
        if expected == 0 || image.rgba.len() != expected {
            return Err(BackendError::Upload(format!(
                "{} texture has {} bytes for {}x{}",
                slot.display_name(),
                image.rgba.len(),
                image.width,
                image.height
            )));
        }

        let max_dimension = self.device.limits().max_texture_dimension_2d;
        let resized = fit_to_limit(image, max_dimension);
        if let Some(resized) = &resized {
            warn!(
                "{} texture downscaled from {}x{} to {}x{}",
                slot.display_name(),
                image.width,
                image.height,
                resized.width,
                resized.height
            );
        }
        let image = resized.as_ref().unwrap_or(image);

        let bind_group = self.texture_target().create_bind_group(slot.display_name(), image);
        self.textures.insert(slot, bind_group);
        Ok(self.tracker.acquire(ResourceKind::Texture))
    }

    fn submit(&mut self, scene: &SceneGraph, rig: &CameraRig) -> Result<(), BackendError> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                debug!("Surface lost or outdated, reconfiguring");
                self.reconfigure();
                return Ok(());
            },
            Err(wgpu::SurfaceError::Timeout) => {
                warn!("Surface timeout, skipping frame");
                return Ok(());
            },
            Err(e) => return Err(BackendError::Surface(e.to_string())),
        };

        let uniforms = FrameUniforms::new(scene, &rig.camera, &self.profile);
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
        self.write_instances(scene);

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_bind_group(0, &self.uniform_bind_group, &[]);

            if scene.skybox().has_background() {
                pass.set_pipeline(&self.sky_pipeline);
                pass.set_bind_group(1, self.texture_for(TextureSlot::Skybox), &[]);
                pass.draw(0..3, 0..1);
            }

            pass.set_pipeline(&self.ground_pipeline);
            pass.set_bind_group(1, self.texture_for(TextureSlot::Ground), &[]);
            pass.draw(0..6, 0..1);

            if !self.instances.is_empty() {
                pass.set_pipeline(&self.sprite_pipeline);
                pass.set_bind_group(1, self.texture_for(TextureSlot::Snowflake), &[]);
                pass.set_vertex_buffer(0, self.instance_buffer.slice(..));
                pass.draw(0..6, 0..self.instances.len() as u32);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        self.frame_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_mapping() {
        assert_eq!(backends_for(BackendKind::GpuCompute), wgpu::Backends::PRIMARY);
        assert_eq!(backends_for(BackendKind::Legacy), wgpu::Backends::GL);
    }

    #[test]
    fn test_fit_to_limit_keeps_small_images() {
        let image = DecodedImage::solid(16, 8, [1, 1, 1, 1]);
        assert!(fit_to_limit(&image, 2048).is_none());
    }

    #[test]
    fn test_fit_to_limit_preserves_aspect() {
        let image = DecodedImage::solid(400, 100, [9, 9, 9, 255]);
        let fitted = fit_to_limit(&image, 200).expect("should shrink");
        assert_eq!((fitted.width, fitted.height), (200, 50));
        assert_eq!(fitted.rgba.len(), 200 * 50 * 4);
        assert_eq!(&fitted.rgba[..4], &[9, 9, 9, 255]);
    }
}
