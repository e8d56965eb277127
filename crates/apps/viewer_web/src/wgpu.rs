//! WebGPU/WebGL2 drawing of a [`RenderFrame`].
//!
//! Every command is a unit sphere scaled in the vertex shader. Per-draw data
//! lives in one uniform buffer addressed by dynamic offset; the pipeline is
//! picked from the material kind and the rasterized side.

use std::cell::OnceCell;
use std::thread::LocalKey;

use gpu::{RenderCommand, RenderFrame};
use scene::components::{Material, Side};

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GlobalsUniform {
    pub view_proj: [[f32; 4]; 4],
    pub camera_position: [f32; 4],
    /// xyz position, w range.
    pub light_position: [f32; 4],
    /// rgb color, a intensity.
    pub light_color: [f32; 4],
    pub ambient: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawUniform {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
    /// x radius, y texture loaded, z lit (textured) or glow intensity, w glow power.
    pub params: [f32; 4],
}

pub const PIPELINE_COUNT: usize = 6;

/// Fragment entry point, blend and depth writes per material kind.
#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
const MATERIAL_KINDS: [(&str, Blend, bool); 3] = [
    ("fs_textured", Blend::Replace, true),
    ("fs_glow", Blend::Additive, false),
    ("fs_unlit", Blend::Alpha, true),
];

#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Blend {
    Replace,
    Additive,
    Alpha,
}

/// Index into the pipeline table: material kind major, side minor.
pub fn pipeline_index(material: &Material, side: Side) -> usize {
    let kind = match material {
        Material::Textured { .. } => 0,
        Material::Glow { .. } => 1,
        Material::Unlit { .. } => 2,
    };
    kind * 2
        + match side {
            Side::Front => 0,
            Side::Back => 1,
        }
}

pub fn globals_for(frame: &RenderFrame) -> GlobalsUniform {
    let key = frame.lights.key;
    let ambient = frame.lights.ambient;
    let [cx, cy, cz] = frame.camera_position.as_f32();
    let [lx, ly, lz] = key.position.as_f32();
    GlobalsUniform {
        view_proj: frame.view_proj,
        camera_position: [cx, cy, cz, 1.0],
        light_position: [lx, ly, lz, key.range as f32],
        light_color: [key.color[0], key.color[1], key.color[2], key.intensity],
        ambient: [
            ambient.color[0],
            ambient.color[1],
            ambient.color[2],
            ambient.intensity,
        ],
    }
}

/// `texture_loaded` only matters for textured materials; until then the
/// fallback color is drawn.
pub fn draw_uniform_for(command: &RenderCommand, texture_loaded: bool) -> DrawUniform {
    let RenderCommand::Sphere {
        model,
        radius,
        material,
        side,
        ..
    } = command;
    let radius = *radius as f32;
    let (color, params) = match *material {
        Material::Textured { fallback_color, .. } => {
            let lit = if *side == Side::Front { 1.0 } else { 0.0 };
            let loaded = if texture_loaded { 1.0 } else { 0.0 };
            (fallback_color, [radius, loaded, lit, 0.0])
        }
        Material::Glow {
            color,
            intensity,
            power,
        } => ([color[0], color[1], color[2], 1.0], [radius, 0.0, intensity, power]),
        Material::Unlit { color } => (color, [radius, 0.0, 0.0, 0.0]),
    };
    DrawUniform {
        model: *model,
        color,
        params,
    }
}

/// Smallest multiple of `alignment` that holds one [`DrawUniform`].
pub fn draw_stride(alignment: u32) -> u64 {
    let size = std::mem::size_of::<DrawUniform>() as u64;
    let alignment = u64::from(alignment.max(1));
    size.div_ceil(alignment) * alignment
}

/// Leak `init()` once per thread and hand out the same `'static` value after.
#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
fn leak_once<T: 'static>(
    slot: &'static LocalKey<OnceCell<&'static T>>,
    init: impl FnOnce() -> T,
) -> &'static T {
    slot.with(|cell| *cell.get_or_init(|| Box::leak(Box::new(init()))))
}

#[cfg(target_arch = "wasm32")]
mod imp {
    use ::wgpu::util::DeviceExt;
    use std::borrow::Cow;
    use std::collections::HashMap;
    use wasm_bindgen::prelude::*;

    use gpu::mesh::generate_sphere_mesh;
    use gpu::{RenderCommand, RenderFrame};
    use scene::components::{Material, Side, TextureSlot};
    use tracing::{debug, warn};

    use super::{
        Blend, DrawUniform, GlobalsUniform, MATERIAL_KINDS, PIPELINE_COUNT, draw_stride,
        draw_uniform_for, globals_for, leak_once, pipeline_index,
    };

    thread_local! {
        static INSTANCE: std::cell::OnceCell<&'static ::wgpu::Instance> =
            const { std::cell::OnceCell::new() };
    }
    use crate::assets::DecodedImage;

    const SPHERE_SHADER: &str = r#"
struct Globals {
    view_proj: mat4x4<f32>,
    camera_position: vec4<f32>,
    light_position: vec4<f32>,
    light_color: vec4<f32>,
    ambient: vec4<f32>,
};

struct Draw {
    model: mat4x4<f32>,
    color: vec4<f32>,
    params: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> globals: Globals;

@group(1) @binding(0)
var<uniform> draw: Draw;

@group(2) @binding(0)
var surface_texture: texture_2d<f32>;
@group(2) @binding(1)
var surface_sampler: sampler;

struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

@vertex
fn vs_main(
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
) -> VsOut {
    let world = draw.model * vec4<f32>(position * draw.params.x, 1.0);
    let n = normalize((draw.model * vec4<f32>(normal, 0.0)).xyz);
    return VsOut(globals.view_proj * world, world.xyz, n, uv);
}

fn key_light(world_position: vec3<f32>, n: vec3<f32>) -> vec3<f32> {
    let to_light = globals.light_position.xyz - world_position;
    let dist = max(length(to_light), 1e-6);
    let range = globals.light_position.w;
    var falloff = 1.0;
    if (range > 0.0) {
        falloff = clamp(1.0 - dist / range, 0.0, 1.0);
    }
    let ndotl = max(dot(n, to_light / dist), 0.0);
    return globals.light_color.rgb * globals.light_color.a * ndotl * falloff;
}

@fragment
fn fs_textured(fs_in: VsOut) -> @location(0) vec4<f32> {
    let sampled = textureSample(surface_texture, surface_sampler, fs_in.uv);
    let base = mix(draw.color, sampled, draw.params.y);
    let n = normalize(fs_in.normal);
    let lit = globals.ambient.rgb * globals.ambient.a + key_light(fs_in.world_position, n);
    let shade = mix(vec3<f32>(1.0, 1.0, 1.0), lit, draw.params.z);
    return vec4<f32>(base.rgb * shade, base.a);
}

@fragment
fn fs_glow(fs_in: VsOut) -> @location(0) vec4<f32> {
    let n = normalize(fs_in.normal);
    let to_camera = normalize(globals.camera_position.xyz - fs_in.world_position);
    let to_light = normalize(globals.light_position.xyz - fs_in.world_position);
    let dot_nl = clamp(dot(to_light, n), 0.0, 1.0);
    let rim = pow(max(draw.params.z - dot(n, to_camera), 0.0), draw.params.w);
    return vec4<f32>(draw.color.rgb * rim * dot_nl, 1.0);
}

@fragment
fn fs_unlit(fs_in: VsOut) -> @location(0) vec4<f32> {
    return draw.color;
}
"#;

    #[repr(C)]
    #[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
    struct Vertex {
        position: [f32; 3],
        normal: [f32; 3],
        uv: [f32; 2],
    }

    struct GpuMesh {
        vertex_buffer: ::wgpu::Buffer,
        index_buffer: ::wgpu::Buffer,
        index_count: u32,
    }

    struct SlotTexture {
        slot: TextureSlot,
        bind_group: ::wgpu::BindGroup,
        loaded: bool,
    }

    pub struct WgpuContext {
        _instance: &'static ::wgpu::Instance,
        surface: ::wgpu::Surface<'static>,
        device: ::wgpu::Device,
        queue: ::wgpu::Queue,
        config: ::wgpu::SurfaceConfiguration,
        depth_view: ::wgpu::TextureView,
        pipelines: Vec<::wgpu::RenderPipeline>,
        globals_buffer: ::wgpu::Buffer,
        globals_bind_group: ::wgpu::BindGroup,
        draw_layout: ::wgpu::BindGroupLayout,
        draw_buffer: ::wgpu::Buffer,
        draw_bind_group: ::wgpu::BindGroup,
        draw_capacity: usize,
        draw_stride: u64,
        texture_layout: ::wgpu::BindGroupLayout,
        sampler: ::wgpu::Sampler,
        textures: Vec<SlotTexture>,
        meshes: HashMap<u32, GpuMesh>,
    }

    impl std::fmt::Debug for WgpuContext {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("WgpuContext")
                .field("width", &self.config.width)
                .field("height", &self.config.height)
                .field("meshes", &self.meshes.len())
                .field("draw_capacity", &self.draw_capacity)
                .finish()
        }
    }

    fn create_depth_view(
        device: &::wgpu::Device,
        config: &::wgpu::SurfaceConfiguration,
    ) -> ::wgpu::TextureView {
        let tex = device.create_texture(&::wgpu::TextureDescriptor {
            label: Some("globe-depth"),
            size: ::wgpu::Extent3d {
                width: config.width.max(1),
                height: config.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: ::wgpu::TextureDimension::D2,
            format: ::wgpu::TextureFormat::Depth24Plus,
            usage: ::wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        tex.create_view(&::wgpu::TextureViewDescriptor::default())
    }

    fn create_rgba_texture(
        device: &::wgpu::Device,
        queue: &::wgpu::Queue,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> ::wgpu::TextureView {
        let size = ::wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&::wgpu::TextureDescriptor {
            label: Some("globe-surface-texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: ::wgpu::TextureDimension::D2,
            format: ::wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: ::wgpu::TextureUsages::TEXTURE_BINDING | ::wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            ::wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: ::wgpu::Origin3d::ZERO,
                aspect: ::wgpu::TextureAspect::All,
            },
            rgba,
            ::wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );
        texture.create_view(&::wgpu::TextureViewDescriptor::default())
    }

    fn create_texture_bind_group(
        device: &::wgpu::Device,
        layout: &::wgpu::BindGroupLayout,
        view: &::wgpu::TextureView,
        sampler: &::wgpu::Sampler,
    ) -> ::wgpu::BindGroup {
        device.create_bind_group(&::wgpu::BindGroupDescriptor {
            label: Some("globe-texture-bg"),
            layout,
            entries: &[
                ::wgpu::BindGroupEntry {
                    binding: 0,
                    resource: ::wgpu::BindingResource::TextureView(view),
                },
                ::wgpu::BindGroupEntry {
                    binding: 1,
                    resource: ::wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }

    fn create_draw_buffer(
        device: &::wgpu::Device,
        layout: &::wgpu::BindGroupLayout,
        stride: u64,
        capacity: usize,
    ) -> (::wgpu::Buffer, ::wgpu::BindGroup) {
        let buffer = device.create_buffer(&::wgpu::BufferDescriptor {
            label: Some("globe-draws"),
            size: stride * capacity.max(1) as u64,
            usage: ::wgpu::BufferUsages::UNIFORM | ::wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&::wgpu::BindGroupDescriptor {
            label: Some("globe-draws-bg"),
            layout,
            entries: &[::wgpu::BindGroupEntry {
                binding: 0,
                resource: ::wgpu::BindingResource::Buffer(::wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: ::wgpu::BufferSize::new(std::mem::size_of::<DrawUniform>() as u64),
                }),
            }],
        });
        (buffer, bind_group)
    }

    fn create_sphere_pipeline(
        device: &::wgpu::Device,
        layout: &::wgpu::PipelineLayout,
        shader: &::wgpu::ShaderModule,
        format: ::wgpu::TextureFormat,
        fs_entry: &str,
        blend: Blend,
        depth_write: bool,
        side: Side,
    ) -> ::wgpu::RenderPipeline {
        let blend = match blend {
            Blend::Replace => ::wgpu::BlendState::REPLACE,
            Blend::Alpha => ::wgpu::BlendState::ALPHA_BLENDING,
            Blend::Additive => ::wgpu::BlendState {
                color: ::wgpu::BlendComponent {
                    src_factor: ::wgpu::BlendFactor::One,
                    dst_factor: ::wgpu::BlendFactor::One,
                    operation: ::wgpu::BlendOperation::Add,
                },
                alpha: ::wgpu::BlendComponent::OVER,
            },
        };
        // Sphere indices wind counter-clockwise seen from outside.
        let cull_mode = match side {
            Side::Front => Some(::wgpu::Face::Back),
            Side::Back => Some(::wgpu::Face::Front),
        };

        device.create_render_pipeline(&::wgpu::RenderPipelineDescriptor {
            label: Some("globe-sphere-pipeline"),
            layout: Some(layout),
            vertex: ::wgpu::VertexState {
                module: shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[::wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<Vertex>() as ::wgpu::BufferAddress,
                    step_mode: ::wgpu::VertexStepMode::Vertex,
                    attributes: &[
                        ::wgpu::VertexAttribute {
                            format: ::wgpu::VertexFormat::Float32x3,
                            offset: 0,
                            shader_location: 0,
                        },
                        ::wgpu::VertexAttribute {
                            format: ::wgpu::VertexFormat::Float32x3,
                            offset: 12,
                            shader_location: 1,
                        },
                        ::wgpu::VertexAttribute {
                            format: ::wgpu::VertexFormat::Float32x2,
                            offset: 24,
                            shader_location: 2,
                        },
                    ],
                }],
            },
            fragment: Some(::wgpu::FragmentState {
                module: shader,
                entry_point: Some(fs_entry),
                compilation_options: Default::default(),
                targets: &[Some(::wgpu::ColorTargetState {
                    format,
                    blend: Some(blend),
                    write_mask: ::wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: ::wgpu::PrimitiveState {
                topology: ::wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: ::wgpu::FrontFace::Ccw,
                cull_mode,
                polygon_mode: ::wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(::wgpu::DepthStencilState {
                format: ::wgpu::TextureFormat::Depth24Plus,
                depth_write_enabled: depth_write,
                depth_compare: if depth_write {
                    ::wgpu::CompareFunction::Less
                } else {
                    ::wgpu::CompareFunction::LessEqual
                },
                stencil: ::wgpu::StencilState::default(),
                bias: ::wgpu::DepthBiasState::default(),
            }),
            multisample: ::wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        })
    }

    pub async fn init_wgpu(canvas: web_sys::HtmlCanvasElement) -> Result<WgpuContext, JsValue> {
        let width = canvas.width().max(1);
        let height = canvas.height().max(1);

        // `wgpu::Surface` must not outlive its `wgpu::Instance`. One instance is
        // leaked for the page and shared by every mount.
        let instance: &'static ::wgpu::Instance = leak_once(&INSTANCE, || {
            ::wgpu::Instance::new(&::wgpu::InstanceDescriptor {
                backends: ::wgpu::Backends::BROWSER_WEBGPU | ::wgpu::Backends::GL,
                ..Default::default()
            })
        });

        let surface = instance
            .create_surface(::wgpu::SurfaceTarget::Canvas(canvas))
            .map_err(|e| JsValue::from_str(&format!("surface error: {e}")))?;

        let adapter = instance
            .request_adapter(&::wgpu::RequestAdapterOptions {
                power_preference: ::wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| JsValue::from_str(&format!("adapter error: {e}")))?;

        let (device, queue) = adapter
            .request_device(&::wgpu::DeviceDescriptor {
                label: Some("globe-wgpu-device"),
                required_features: ::wgpu::Features::empty(),
                required_limits: ::wgpu::Limits::downlevel_webgl2_defaults(),
                ..Default::default()
            })
            .await
            .map_err(|e| JsValue::from_str(&format!("device error: {e}")))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| JsValue::from_str("surface has no formats"))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(::wgpu::CompositeAlphaMode::Auto);

        let config = ::wgpu::SurfaceConfiguration {
            usage: ::wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            desired_maximum_frame_latency: 2,
            present_mode: ::wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&device, &config);
        let depth_view = create_depth_view(&device, &config);

        let shader = device.create_shader_module(::wgpu::ShaderModuleDescriptor {
            label: Some("globe-sphere-shader"),
            source: ::wgpu::ShaderSource::Wgsl(Cow::Borrowed(SPHERE_SHADER)),
        });

        let globals_layout = device.create_bind_group_layout(&::wgpu::BindGroupLayoutDescriptor {
            label: Some("globe-globals-bgl"),
            entries: &[::wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: ::wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: ::wgpu::BindingType::Buffer {
                    ty: ::wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let draw_layout = device.create_bind_group_layout(&::wgpu::BindGroupLayoutDescriptor {
            label: Some("globe-draws-bgl"),
            entries: &[::wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: ::wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: ::wgpu::BindingType::Buffer {
                    ty: ::wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: ::wgpu::BufferSize::new(
                        std::mem::size_of::<DrawUniform>() as u64,
                    ),
                },
                count: None,
            }],
        });
        let texture_layout = device.create_bind_group_layout(&::wgpu::BindGroupLayoutDescriptor {
            label: Some("globe-texture-bgl"),
            entries: &[
                ::wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ::wgpu::ShaderStages::FRAGMENT,
                    ty: ::wgpu::BindingType::Texture {
                        sample_type: ::wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: ::wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                ::wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ::wgpu::ShaderStages::FRAGMENT,
                    ty: ::wgpu::BindingType::Sampler(::wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let globals_buffer = device.create_buffer(&::wgpu::BufferDescriptor {
            label: Some("globe-globals"),
            size: std::mem::size_of::<GlobalsUniform>() as u64,
            usage: ::wgpu::BufferUsages::UNIFORM | ::wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let globals_bind_group = device.create_bind_group(&::wgpu::BindGroupDescriptor {
            label: Some("globe-globals-bg"),
            layout: &globals_layout,
            entries: &[::wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buffer.as_entire_binding(),
            }],
        });
        // Initialize uniforms so the first render doesn't read uninitialized memory.
        queue.write_buffer(
            &globals_buffer,
            0,
            bytemuck::bytes_of(&<GlobalsUniform as bytemuck::Zeroable>::zeroed()),
        );

        let stride = draw_stride(device.limits().min_uniform_buffer_offset_alignment);
        let draw_capacity = 16;
        let (draw_buffer, draw_bind_group) =
            create_draw_buffer(&device, &draw_layout, stride, draw_capacity);

        let pipeline_layout = device.create_pipeline_layout(&::wgpu::PipelineLayoutDescriptor {
            label: Some("globe-sphere-pipeline-layout"),
            bind_group_layouts: &[&globals_layout, &draw_layout, &texture_layout],
            immediate_size: 0,
        });

        let mut pipelines = Vec::with_capacity(PIPELINE_COUNT);
        for (fs_entry, blend, depth_write) in MATERIAL_KINDS {
            for side in [Side::Front, Side::Back] {
                pipelines.push(create_sphere_pipeline(
                    &device,
                    &pipeline_layout,
                    &shader,
                    config.format,
                    fs_entry,
                    blend,
                    depth_write,
                    side,
                ));
            }
        }

        let sampler = device.create_sampler(&::wgpu::SamplerDescriptor {
            label: Some("globe-sampler"),
            address_mode_u: ::wgpu::AddressMode::Repeat,
            address_mode_v: ::wgpu::AddressMode::ClampToEdge,
            mag_filter: ::wgpu::FilterMode::Linear,
            min_filter: ::wgpu::FilterMode::Linear,
            ..Default::default()
        });

        // 1x1 placeholders keep the texture binding valid until the images arrive.
        let textures = [TextureSlot::GlobeSurface, TextureSlot::Starfield]
            .into_iter()
            .map(|slot| {
                let view = create_rgba_texture(&device, &queue, 1, 1, &[255, 255, 255, 255]);
                SlotTexture {
                    slot,
                    bind_group: create_texture_bind_group(&device, &texture_layout, &view, &sampler),
                    loaded: false,
                }
            })
            .collect();

        Ok(WgpuContext {
            _instance: instance,
            surface,
            device,
            queue,
            config,
            depth_view,
            pipelines,
            globals_buffer,
            globals_bind_group,
            draw_layout,
            draw_buffer,
            draw_bind_group,
            draw_capacity,
            draw_stride: stride,
            texture_layout,
            sampler,
            textures,
            meshes: HashMap::new(),
        })
    }

    pub fn resize_wgpu(ctx: &mut WgpuContext, width: u32, height: u32) {
        let width = width.max(1);
        let height = height.max(1);
        if ctx.config.width == width && ctx.config.height == height {
            return;
        }
        ctx.config.width = width;
        ctx.config.height = height;
        ctx.surface.configure(&ctx.device, &ctx.config);
        ctx.depth_view = create_depth_view(&ctx.device, &ctx.config);
    }

    pub fn upload_texture(ctx: &mut WgpuContext, slot: TextureSlot, image: &DecodedImage) {
        let expected = image.width as usize * image.height as usize * 4;
        if image.width == 0 || image.height == 0 || image.rgba.len() != expected {
            warn!(?slot, width = image.width, height = image.height, "texture size mismatch");
            return;
        }
        let view = create_rgba_texture(&ctx.device, &ctx.queue, image.width, image.height, &image.rgba);
        let bind_group =
            create_texture_bind_group(&ctx.device, &ctx.texture_layout, &view, &ctx.sampler);
        match ctx.textures.iter_mut().find(|t| t.slot == slot) {
            Some(texture) => {
                texture.bind_group = bind_group;
                texture.loaded = true;
            }
            None => ctx.textures.push(SlotTexture {
                slot,
                bind_group,
                loaded: true,
            }),
        }
        debug!(?slot, width = image.width, height = image.height, "texture uploaded");
    }

    fn ensure_mesh(ctx: &mut WgpuContext, segments: u32) {
        if ctx.meshes.contains_key(&segments) {
            return;
        }
        let mesh = generate_sphere_mesh(segments, segments);
        let vertices: Vec<Vertex> = mesh
            .vertices
            .iter()
            .map(|v| Vertex {
                position: v.position,
                normal: v.normal,
                uv: v.uv,
            })
            .collect();
        let vertex_buffer = ctx
            .device
            .create_buffer_init(&::wgpu::util::BufferInitDescriptor {
                label: Some("globe-sphere-vertices"),
                contents: bytemuck::cast_slice(&vertices),
                usage: ::wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = ctx
            .device
            .create_buffer_init(&::wgpu::util::BufferInitDescriptor {
                label: Some("globe-sphere-indices"),
                contents: bytemuck::cast_slice(&mesh.indices),
                usage: ::wgpu::BufferUsages::INDEX,
            });
        ctx.meshes.insert(
            segments,
            GpuMesh {
                vertex_buffer,
                index_buffer,
                index_count: mesh.indices.len() as u32,
            },
        );
    }

    fn ensure_draw_capacity(ctx: &mut WgpuContext, draws: usize) {
        if draws <= ctx.draw_capacity {
            return;
        }
        let capacity = draws.next_power_of_two();
        let (buffer, bind_group) =
            create_draw_buffer(&ctx.device, &ctx.draw_layout, ctx.draw_stride, capacity);
        ctx.draw_buffer = buffer;
        ctx.draw_bind_group = bind_group;
        ctx.draw_capacity = capacity;
    }

    fn texture_for<'a>(ctx: &'a WgpuContext, material: &Material) -> Option<&'a SlotTexture> {
        match material {
            Material::Textured { slot, .. } => ctx.textures.iter().find(|t| t.slot == *slot),
            _ => ctx.textures.first(),
        }
    }

    pub fn render_frame(ctx: &mut WgpuContext, frame: &RenderFrame) -> Result<(), JsValue> {
        for command in &frame.commands {
            let RenderCommand::Sphere { segments, .. } = command;
            ensure_mesh(ctx, *segments);
        }
        ensure_draw_capacity(ctx, frame.commands.len());

        ctx.queue.write_buffer(
            &ctx.globals_buffer,
            0,
            bytemuck::bytes_of(&globals_for(frame)),
        );
        let stride = ctx.draw_stride as usize;
        let mut draws = vec![0u8; stride * frame.commands.len().max(1)];
        for (i, command) in frame.commands.iter().enumerate() {
            let RenderCommand::Sphere { material, .. } = command;
            let loaded = matches!(material, Material::Textured { .. })
                && texture_for(ctx, material).is_some_and(|t| t.loaded);
            let uniform = draw_uniform_for(command, loaded);
            let start = i * stride;
            draws[start..start + std::mem::size_of::<DrawUniform>()]
                .copy_from_slice(bytemuck::bytes_of(&uniform));
        }
        ctx.queue.write_buffer(&ctx.draw_buffer, 0, &draws);

        let surface_frame = ctx
            .surface
            .get_current_texture()
            .map_err(|e| JsValue::from_str(&format!("surface acquire failed: {e}")))?;
        let view = surface_frame
            .texture
            .create_view(&::wgpu::TextureViewDescriptor::default());

        let mut encoder = ctx
            .device
            .create_command_encoder(&::wgpu::CommandEncoderDescriptor {
                label: Some("globe-frame-encoder"),
            });

        {
            let mut rpass = encoder.begin_render_pass(&::wgpu::RenderPassDescriptor {
                label: Some("globe-scene-pass"),
                color_attachments: &[Some(::wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: ::wgpu::Operations {
                        load: ::wgpu::LoadOp::Clear(::wgpu::Color {
                            r: 0.004,
                            g: 0.008,
                            b: 0.016,
                            a: 1.0,
                        }),
                        store: ::wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(::wgpu::RenderPassDepthStencilAttachment {
                    view: &ctx.depth_view,
                    depth_ops: Some(::wgpu::Operations {
                        load: ::wgpu::LoadOp::Clear(1.0),
                        store: ::wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });

            rpass.set_bind_group(0, &ctx.globals_bind_group, &[]);
            for (i, command) in frame.commands.iter().enumerate() {
                let RenderCommand::Sphere {
                    segments,
                    material,
                    side,
                    ..
                } = command;
                let (Some(mesh), Some(texture)) =
                    (ctx.meshes.get(segments), texture_for(ctx, material))
                else {
                    continue;
                };
                let Some(pipeline) = ctx.pipelines.get(pipeline_index(material, *side)) else {
                    continue;
                };
                rpass.set_pipeline(pipeline);
                rpass.set_bind_group(1, &ctx.draw_bind_group, &[(i * stride) as u32]);
                rpass.set_bind_group(2, &texture.bind_group, &[]);
                rpass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                rpass.set_index_buffer(mesh.index_buffer.slice(..), ::wgpu::IndexFormat::Uint32);
                rpass.draw_indexed(0..mesh.index_count, 0, 0..1);
            }
        }

        ctx.queue.submit(std::iter::once(encoder.finish()));
        surface_frame.present();
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod imp {
    use gpu::RenderFrame;
    use scene::components::TextureSlot;
    use wasm_bindgen::prelude::JsValue;

    use crate::assets::DecodedImage;

    #[derive(Debug, Default)]
    pub struct WgpuContext;

    pub async fn init_wgpu(_canvas: web_sys::HtmlCanvasElement) -> Result<WgpuContext, JsValue> {
        Err(JsValue::from_str(
            "wgpu initialization is only available on wasm32 targets",
        ))
    }

    pub fn resize_wgpu(_ctx: &mut WgpuContext, _width: u32, _height: u32) {}

    pub fn upload_texture(_ctx: &mut WgpuContext, _slot: TextureSlot, _image: &DecodedImage) {}

    pub fn render_frame(_ctx: &mut WgpuContext, _frame: &RenderFrame) -> Result<(), JsValue> {
        Err(JsValue::from_str(
            "wgpu rendering is only available on wasm32 targets",
        ))
    }
}

pub use imp::{WgpuContext, init_wgpu, render_frame, resize_wgpu, upload_texture};

#[cfg(test)]
mod tests {
    use super::{draw_stride, draw_uniform_for, globals_for, leak_once, pipeline_index};
    use std::cell::{Cell, OnceCell};
    use foundation::math::{MAT4_IDENTITY, Vec3};
    use gpu::{RenderCommand, RenderFrame};
    use pretty_assertions::assert_eq;
    use scene::components::{LightRig, Material, Side, TextureSlot};
    use scene::entity::NodeId;

    fn sphere(material: Material, side: Side) -> RenderCommand {
        RenderCommand::Sphere {
            node: NodeId(0),
            model: MAT4_IDENTITY,
            radius: 3.0,
            segments: 64,
            material,
            side,
        }
    }

    #[test]
    fn pipelines_are_distinct_per_material_and_side() {
        let materials = [
            Material::Textured {
                slot: TextureSlot::GlobeSurface,
                fallback_color: [0.0; 4],
            },
            Material::Glow {
                color: [1.0; 3],
                intensity: 0.8,
                power: 12.0,
            },
            Material::Unlit { color: [1.0; 4] },
        ];
        let mut seen = Vec::new();
        for material in &materials {
            for side in [Side::Front, Side::Back] {
                let index = pipeline_index(material, side);
                assert!(index < super::PIPELINE_COUNT);
                assert!(!seen.contains(&index));
                seen.push(index);
            }
        }
    }

    #[test]
    fn textured_uniform_tracks_loading_and_side() {
        let globe = sphere(
            Material::Textured {
                slot: TextureSlot::GlobeSurface,
                fallback_color: [0.1, 0.5, 0.8, 1.0],
            },
            Side::Front,
        );
        let pending = draw_uniform_for(&globe, false);
        assert_eq!(pending.color, [0.1, 0.5, 0.8, 1.0]);
        assert_eq!(pending.params, [3.0, 0.0, 1.0, 0.0]);
        assert_eq!(draw_uniform_for(&globe, true).params[1], 1.0);

        let stars = sphere(
            Material::Textured {
                slot: TextureSlot::Starfield,
                fallback_color: [0.0, 0.0, 0.0, 1.0],
            },
            Side::Back,
        );
        assert_eq!(draw_uniform_for(&stars, true).params[2], 0.0);
    }

    #[test]
    fn glow_uniform_carries_rim_parameters() {
        let glow = sphere(
            Material::Glow {
                color: [0.64, 0.85, 0.85],
                intensity: 0.8,
                power: 12.0,
            },
            Side::Back,
        );
        let uniform = draw_uniform_for(&glow, true);
        assert_eq!(uniform.color, [0.64, 0.85, 0.85, 1.0]);
        assert_eq!(uniform.params, [3.0, 0.0, 0.8, 12.0]);
    }

    #[test]
    fn globals_pack_camera_and_lights() {
        let frame = RenderFrame {
            view_proj: MAT4_IDENTITY,
            camera_position: Vec3::new(0.0, 1.0, 10.0),
            lights: LightRig::default(),
            commands: Vec::new(),
        };
        let globals = globals_for(&frame);
        assert_eq!(globals.camera_position, [0.0, 1.0, 10.0, 1.0]);
        assert_eq!(globals.light_position, [-10.0, 6.0, 16.0, 100.0]);
        assert_eq!(globals.light_color[3], 1.8);
        assert_eq!(globals.ambient, [1.0, 1.0, 1.0, 0.1]);
    }

    #[test]
    fn draw_stride_respects_offset_alignment() {
        assert_eq!(draw_stride(256), 256);
        assert_eq!(draw_stride(32), 96);
        assert_eq!(draw_stride(0), 96);
    }

    #[test]
    fn leaked_instance_is_shared_across_mounts() {
        thread_local! {
            static SHARED: OnceCell<&'static String> = const { OnceCell::new() };
        }
        let inits = Cell::new(0);
        let mut make = || {
            inits.set(inits.get() + 1);
            String::from("instance")
        };

        let first = leak_once(&SHARED, &mut make);
        let second = leak_once(&SHARED, &mut make);
        assert!(std::ptr::eq(first, second));
        assert_eq!(inits.get(), 1);
    }
}
