//! # WgpuGl — A GL State Machine on Top of wgpu
//!
//! The batch speaks WebGL: bind a buffer, point attributes into it, set a
//! divisor, draw. wgpu has none of that mutable state. It wants an immutable
//! [`wgpu::RenderPipeline`] that already knows every vertex buffer layout, and
//! it wants all draws recorded into a render pass that targets this frame's
//! surface texture. `WgpuGl` bridges the two by *tracking* GL state and
//! *snapshotting* it at each draw:
//!
//! ```text
//!  GL calls (any order)            draw_arrays_instanced()         present()
//! ┌────────────────────┐        ┌─────────────────────────┐    ┌──────────────────┐
//! │ bind_buffer        │        │ group enabled attribs   │    │ upload frame     │
//! │ buffer_data ──► frame arena │   by (buffer, stride,   │    │   arena + camera │
//! │ attrib_pointer     │──────► │   divisor) → layouts    │───►│ one render pass  │
//! │ attrib_divisor     │        │ camera matrix → dynamic │    │   replaying every│
//! │ bind_texture       │        │   uniform slot          │    │   PendingDraw    │
//! │ uniform_matrix4    │        │ push PendingDraw        │    │ submit + present │
//! └────────────────────┘        └─────────────────────────┘    └──────────────────┘
//! ```
//!
//! ## Buffers
//!
//! `Static` uploads become resident GPU buffers. `Dynamic` uploads (the
//! per-flush instance window) are appended to a per-frame byte arena, so
//! several flushes of the same GL buffer in one frame each keep their own
//! data. The arena becomes one vertex buffer at `present()`, and each draw
//! binds its slice of it.
//!
//! ## Pipelines
//!
//! A pipeline is keyed by program plus the derived vertex layouts. The sprite
//! batch produces the same key every flush, so after the first frame every
//! draw hits the cache.
//!
//! ## Uniforms
//!
//! The projection matrix lives in a dynamic-offset uniform buffer: each draw
//! gets its own 256-byte aligned slot, mirroring GL's "uniform value at draw
//! time" semantics even when the matrix changes between flushes.
//!
//! ## Reflection
//!
//! GL hands out attribute and uniform locations by name; WGSL fixes them in
//! the source. `create_program` parses the WGSL with naga and reads
//! `vs_main`'s `@location` inputs plus the module's uniform and texture
//! globals, so comments and declaration order in the source don't matter.
//!
//! ## Errors
//!
//! A validation error scope is kept open for the lifetime of the context.
//! [`get_error`](GlContext::get_error) pops it, reports what wgpu caught, and
//! pushes a fresh one. Misuse the GL model would flag (drawing without a
//! program, an enabled attribute with no buffer) is queued as
//! `InvalidOperation` directly.
//!
//! ## Comparison
//!
//! - **ANGLE / Dawn's GL frontends**: The same idea at full scale, a complete
//!   GL state tracker lowered onto a modern API.
//! - **wgpu directly**: Build the pipeline and layouts up front, record draws
//!   into a pass. Faster to write for one renderer, but the batch could no
//!   longer be tested against a recorded GL call log.

use std::collections::{HashMap, VecDeque};
use std::num::NonZeroU64;
use std::ops::Range;

use image::imageops::{self, FilterType};
use image::RgbaImage;
use wgpu::naga;
use wgpu::util::DeviceExt;

use super::GpuContext;
use crate::gl::{
    BufferId, BufferUsage, FilterMode, GlContext, GlError, ProgramId, ShaderDialect, ShaderSource,
    TextureDesc, TextureId, UniformLocation, WrapMode,
};
use crate::math::{Color, Mat4};

const MAX_ATTRIBS: usize = 16;
/// Alignment of slices within the frame arena.
const ARENA_ALIGN: usize = 16;
/// Dynamic uniform offsets must be multiples of this on every backend.
const UNIFORM_ALIGN: usize = 256;
const MATRIX_SIZE: u64 = 64;
const INITIAL_UNIFORM_CAPACITY: u64 = 64 * UNIFORM_ALIGN as u64;

#[derive(Debug, Clone, Copy, Default)]
struct AttribState {
    enabled: bool,
    buffer: Option<BufferId>,
    components: u32,
    stride: u32,
    offset: u32,
    divisor: u32,
}

enum BufferStore {
    Empty,
    Resident(wgpu::Buffer),
    Frame { offset: u64, len: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UniformKind {
    Matrix,
    Sampler,
}

struct Program {
    module: wgpu::ShaderModule,
    attribs: HashMap<String, u32>,
    uniforms: HashMap<String, (UniformLocation, UniformKind)>,
    proj_view: Mat4,
    sampler_unit: i32,
}

struct GpuTexture {
    _texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LayoutKey {
    stride: u32,
    per_instance: bool,
    /// `(shader location, components, byte offset)`
    attributes: Vec<(u32, u32, u32)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: ProgramId,
    layouts: Vec<LayoutKey>,
}

#[derive(Debug, Clone, Copy)]
enum SliceSource {
    Resident(BufferId),
    Frame { offset: u64, len: u64 },
}

struct PendingDraw {
    key: PipelineKey,
    slices: Vec<SliceSource>,
    texture: TextureId,
    uniform_offset: u32,
    vertices: Range<u32>,
    instances: u32,
    viewport: Option<[u32; 4]>,
}

/// [`GlContext`] implemented on wgpu. See the module docs.
pub struct WgpuGl {
    gpu: GpuContext,
    next_id: u32,
    buffers: HashMap<BufferId, BufferStore>,
    bound_buffer: Option<BufferId>,
    programs: HashMap<ProgramId, Program>,
    current_program: Option<ProgramId>,
    attribs: [AttribState; MAX_ATTRIBS],
    textures: HashMap<TextureId, GpuTexture>,
    texture_units: HashMap<u32, TextureId>,
    clear_color: Color,
    clear_requested: Option<Color>,
    viewport: Option<[u32; 4]>,
    camera_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    camera_buffer: wgpu::Buffer,
    camera_capacity: u64,
    camera_bind_group: wgpu::BindGroup,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    frame_vertices: Vec<u8>,
    frame_uniforms: Vec<u8>,
    draws: Vec<PendingDraw>,
    errors: VecDeque<GlError>,
}

impl WgpuGl {
    pub fn new(gpu: GpuContext) -> Self {
        let device = &gpu.device;

        // Group 0: projection matrix, one dynamic slot per draw.
        let camera_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("spritegl camera layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(MATRIX_SIZE),
                },
                count: None,
            }],
        });

        // Group 1: texture + sampler (unit 0).
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("spritegl texture layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
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

        let (camera_buffer, camera_bind_group) =
            camera_resources(device, &camera_layout, INITIAL_UNIFORM_CAPACITY);

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        Self {
            next_id: 1,
            buffers: HashMap::new(),
            bound_buffer: None,
            programs: HashMap::new(),
            current_program: None,
            attribs: [AttribState::default(); MAX_ATTRIBS],
            textures: HashMap::new(),
            texture_units: HashMap::new(),
            clear_color: Color::BLACK,
            clear_requested: None,
            viewport: None,
            camera_layout,
            texture_layout,
            camera_buffer,
            camera_capacity: INITIAL_UNIFORM_CAPACITY,
            camera_bind_group,
            pipelines: HashMap::new(),
            frame_vertices: Vec::new(),
            frame_uniforms: Vec::new(),
            draws: Vec::new(),
            errors: VecDeque::new(),
            gpu,
        }
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    pub fn surface_size(&self) -> (u32, u32) {
        self.gpu.surface_size()
    }

    /// Reconfigure the swapchain (call on window resize).
    pub fn resize_surface(&mut self, width: u32, height: u32) {
        self.gpu.resize(width, height);
    }

    /// Replay every draw recorded since the last present into one render pass,
    /// submit it, and present the surface.
    pub fn present(&mut self) -> Result<(), GlError> {
        let output = match self.gpu.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let (w, h) = self.gpu.surface_size();
                self.gpu.resize(w, h);
                self.reset_frame();
                return Ok(());
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                self.reset_frame();
                return Err(GlError::OutOfMemory);
            }
            Err(e) => {
                log::warn!("surface error: {e:?}");
                self.reset_frame();
                return Ok(());
            }
        };

        let draws = std::mem::take(&mut self.draws);
        for draw in &draws {
            self.ensure_pipeline(&draw.key);
        }
        self.upload_uniforms();

        let frame_buffer = (!self.frame_vertices.is_empty()).then(|| {
            self.gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("spritegl frame vertices"),
                contents: &self.frame_vertices,
                usage: wgpu::BufferUsages::VERTEX,
            })
        });

        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self.gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("spritegl frame encoder"),
        });

        let load = match self.clear_requested.take() {
            Some(c) => wgpu::LoadOp::Clear(wgpu::Color {
                r: c.r as f64,
                g: c.g as f64,
                b: c.b as f64,
                a: c.a as f64,
            }),
            None => wgpu::LoadOp::Load,
        };

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("spritegl pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let (surface_w, surface_h) = self.gpu.surface_size();
            for draw in &draws {
                let (Some(pipeline), Some(texture)) =
                    (self.pipelines.get(&draw.key), self.textures.get(&draw.texture))
                else {
                    continue;
                };

                pass.set_pipeline(pipeline);
                if let Some([x, y, w, h]) = draw.viewport {
                    let x = x.min(surface_w);
                    let y = y.min(surface_h);
                    let w = w.min(surface_w - x);
                    let h = h.min(surface_h - y);
                    if w == 0 || h == 0 {
                        continue;
                    }
                    pass.set_viewport(x as f32, y as f32, w as f32, h as f32, 0.0, 1.0);
                }
                pass.set_bind_group(0, &self.camera_bind_group, &[draw.uniform_offset]);
                pass.set_bind_group(1, &texture.bind_group, &[]);

                for (slot, source) in draw.slices.iter().enumerate() {
                    match *source {
                        SliceSource::Resident(id) => {
                            if let Some(BufferStore::Resident(buffer)) = self.buffers.get(&id) {
                                pass.set_vertex_buffer(slot as u32, buffer.slice(..));
                            }
                        }
                        SliceSource::Frame { offset, len } => {
                            if let Some(buffer) = &frame_buffer {
                                pass.set_vertex_buffer(slot as u32, buffer.slice(offset..offset + len));
                            }
                        }
                    }
                }

                pass.draw(draw.vertices.clone(), 0..draw.instances);
            }
        }

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        self.reset_frame();
        Ok(())
    }

    fn reset_frame(&mut self) {
        self.frame_vertices.clear();
        self.frame_uniforms.clear();
        self.draws.clear();
        self.clear_requested = None;
        for store in self.buffers.values_mut() {
            if matches!(store, BufferStore::Frame { .. }) {
                *store = BufferStore::Empty;
            }
        }
    }

    fn upload_uniforms(&mut self) {
        if self.frame_uniforms.is_empty() {
            return;
        }
        let needed = self.frame_uniforms.len() as u64;
        if needed > self.camera_capacity {
            let capacity = needed.next_power_of_two();
            let (buffer, bind_group) = camera_resources(&self.gpu.device, &self.camera_layout, capacity);
            self.camera_buffer = buffer;
            self.camera_bind_group = bind_group;
            self.camera_capacity = capacity;
            log::debug!("camera uniform buffer grown to {capacity} bytes");
        }
        self.gpu.queue.write_buffer(&self.camera_buffer, 0, &self.frame_uniforms);
    }

    fn push_uniform(&mut self, matrix: &Mat4) -> u32 {
        let offset = self.frame_uniforms.len().next_multiple_of(UNIFORM_ALIGN);
        self.frame_uniforms.resize(offset, 0);
        self.frame_uniforms.extend_from_slice(bytemuck::cast_slice(&matrix.to_cols_array()));
        offset as u32
    }

    fn ensure_pipeline(&mut self, key: &PipelineKey) {
        if self.pipelines.contains_key(key) {
            return;
        }
        let Some(program) = self.programs.get(&key.program) else {
            return;
        };

        let attributes: Vec<Vec<wgpu::VertexAttribute>> = key
            .layouts
            .iter()
            .map(|layout| {
                layout
                    .attributes
                    .iter()
                    .map(|&(location, components, offset)| wgpu::VertexAttribute {
                        format: vertex_format(components),
                        offset: offset as wgpu::BufferAddress,
                        shader_location: location,
                    })
                    .collect()
            })
            .collect();
        let buffers: Vec<wgpu::VertexBufferLayout<'_>> = key
            .layouts
            .iter()
            .zip(&attributes)
            .map(|(layout, attrs)| wgpu::VertexBufferLayout {
                array_stride: layout.stride as wgpu::BufferAddress,
                step_mode: if layout.per_instance {
                    wgpu::VertexStepMode::Instance
                } else {
                    wgpu::VertexStepMode::Vertex
                },
                attributes: attrs,
            })
            .collect();

        let device = &self.gpu.device;
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("spritegl pipeline layout"),
            bind_group_layouts: &[&self.camera_layout, &self.texture_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("spritegl pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &program.module,
                entry_point: Some("vs_main"),
                buffers: &buffers,
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &program.module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.gpu.surface_format(),
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None, // sprites may be mirrored by negative size
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        log::debug!("pipeline created for {} vertex buffer(s)", key.layouts.len());
        self.pipelines.insert(key.clone(), pipeline);
    }

    fn alloc_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

fn camera_resources(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    capacity: u64,
) -> (wgpu::Buffer, wgpu::BindGroup) {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("spritegl camera uniforms"),
        size: capacity,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("spritegl camera bind group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &buffer,
                offset: 0,
                size: NonZeroU64::new(MATRIX_SIZE),
            }),
        }],
    });
    (buffer, bind_group)
}

fn vertex_format(components: u32) -> wgpu::VertexFormat {
    match components {
        1 => wgpu::VertexFormat::Float32,
        2 => wgpu::VertexFormat::Float32x2,
        3 => wgpu::VertexFormat::Float32x3,
        _ => wgpu::VertexFormat::Float32x4,
    }
}

fn address_mode(wrap: WrapMode) -> wgpu::AddressMode {
    match wrap {
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
        WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
    }
}

fn filter_mode(filter: FilterMode) -> wgpu::FilterMode {
    match filter {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

impl GlContext for WgpuGl {
    fn dialect(&self) -> ShaderDialect {
        ShaderDialect::Wgsl
    }

    fn create_buffer(&mut self) -> Result<BufferId, GlError> {
        let id = BufferId(self.alloc_id());
        self.buffers.insert(id, BufferStore::Empty);
        Ok(id)
    }

    fn bind_buffer(&mut self, buffer: Option<BufferId>) {
        if let Some(id) = buffer {
            if !self.buffers.contains_key(&id) {
                self.errors.push_back(GlError::InvalidOperation);
                return;
            }
        }
        self.bound_buffer = buffer;
    }

    fn buffer_data(&mut self, data: &[u8], usage: BufferUsage) {
        let Some(id) = self.bound_buffer else {
            self.errors.push_back(GlError::InvalidOperation);
            return;
        };
        let store = if data.is_empty() {
            BufferStore::Empty
        } else {
            match usage {
                BufferUsage::Static => BufferStore::Resident(self.gpu.device.create_buffer_init(
                    &wgpu::util::BufferInitDescriptor {
                        label: Some("spritegl static buffer"),
                        contents: data,
                        usage: wgpu::BufferUsages::VERTEX,
                    },
                )),
                BufferUsage::Dynamic => {
                    let offset = self.frame_vertices.len().next_multiple_of(ARENA_ALIGN);
                    self.frame_vertices.resize(offset, 0);
                    self.frame_vertices.extend_from_slice(data);
                    BufferStore::Frame { offset: offset as u64, len: data.len() as u64 }
                }
            }
        };
        self.buffers.insert(id, store);
    }

    fn create_program(&mut self, source: &ShaderSource<'_>) -> Result<ProgramId, GlError> {
        let ShaderSource::Wgsl(wgsl) = *source else {
            return Err(GlError::ShaderCompile("this backend compiles WGSL only".into()));
        };
        let Reflection { attribs, uniforms } = reflect(wgsl)?;

        self.gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self.gpu.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("spritegl shader"),
            source: wgpu::ShaderSource::Wgsl(wgsl.into()),
        });
        if let Some(err) = pollster::block_on(self.gpu.device.pop_error_scope()) {
            return Err(GlError::ShaderCompile(err.to_string()));
        }

        let id = ProgramId(self.alloc_id());
        self.programs.insert(
            id,
            Program {
                module,
                attribs,
                uniforms,
                proj_view: Mat4::IDENTITY,
                sampler_unit: 0,
            },
        );
        Ok(id)
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        if let Some(id) = program {
            if !self.programs.contains_key(&id) {
                self.errors.push_back(GlError::InvalidOperation);
                return;
            }
        }
        self.current_program = program;
    }

    fn attrib_location(&mut self, program: ProgramId, name: &str) -> Option<u32> {
        self.programs.get(&program)?.attribs.get(name).copied()
    }

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        self.programs.get(&program)?.uniforms.get(name).map(|(loc, _)| *loc)
    }

    fn enable_vertex_attrib(&mut self, location: u32) {
        match self.attribs.get_mut(location as usize) {
            Some(attrib) => attrib.enabled = true,
            None => self.errors.push_back(GlError::InvalidValue),
        }
    }

    fn disable_vertex_attrib(&mut self, location: u32) {
        match self.attribs.get_mut(location as usize) {
            Some(attrib) => attrib.enabled = false,
            None => self.errors.push_back(GlError::InvalidValue),
        }
    }

    fn vertex_attrib_pointer(&mut self, location: u32, components: u32, stride: u32, offset: u32) {
        let bound = self.bound_buffer;
        match self.attribs.get_mut(location as usize) {
            Some(attrib) if (1..=4).contains(&components) => {
                attrib.buffer = bound;
                attrib.components = components;
                attrib.stride = stride;
                attrib.offset = offset;
            }
            _ => self.errors.push_back(GlError::InvalidValue),
        }
    }

    fn vertex_attrib_divisor(&mut self, location: u32, divisor: u32) {
        match self.attribs.get_mut(location as usize) {
            Some(attrib) => attrib.divisor = divisor,
            None => self.errors.push_back(GlError::InvalidValue),
        }
    }

    fn create_texture(&mut self, desc: &TextureDesc, pixels: &[u8]) -> Result<TextureId, GlError> {
        if desc.width == 0 || desc.height == 0 || pixels.len() != desc.byte_len() {
            return Err(GlError::InvalidValue);
        }
        let levels = desc.mip_level_count();
        let size = wgpu::Extent3d {
            width: desc.width,
            height: desc.height,
            depth_or_array_layers: 1,
        };
        let texture = self.gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("spritegl texture"),
            size,
            mip_level_count: levels,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let base = RgbaImage::from_raw(desc.width, desc.height, pixels.to_vec()).ok_or(GlError::InvalidValue)?;
        for level in 0..levels {
            let width = (desc.width >> level).max(1);
            let height = (desc.height >> level).max(1);
            let scaled;
            let data = if level == 0 {
                &base
            } else {
                scaled = imageops::resize(&base, width, height, FilterType::Triangle);
                &scaled
            };
            self.gpu.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: level,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                data.as_raw(),
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * width),
                    rows_per_image: Some(height),
                },
                wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
            );
        }

        let sampler = self.gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("spritegl sampler"),
            address_mode_u: address_mode(desc.wrap),
            address_mode_v: address_mode(desc.wrap),
            mag_filter: filter_mode(desc.filter),
            min_filter: filter_mode(desc.filter),
            ..Default::default()
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("spritegl texture bind group"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        let id = TextureId(self.alloc_id());
        self.textures.insert(id, GpuTexture { _texture: texture, bind_group });
        Ok(id)
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>) {
        match texture {
            Some(id) if !self.textures.contains_key(&id) => self.errors.push_back(GlError::InvalidOperation),
            Some(id) => {
                self.texture_units.insert(unit, id);
            }
            None => {
                self.texture_units.remove(&unit);
            }
        }
    }

    fn uniform_matrix4(&mut self, location: UniformLocation, matrix: &Mat4) {
        match self.current_uniform(location, UniformKind::Matrix) {
            Some(program) => program.proj_view = *matrix,
            None => self.errors.push_back(GlError::InvalidOperation),
        }
    }

    fn uniform_sampler(&mut self, location: UniformLocation, unit: i32) {
        match self.current_uniform(location, UniformKind::Sampler) {
            Some(program) => program.sampler_unit = unit,
            None => self.errors.push_back(GlError::InvalidOperation),
        }
    }

    fn clear_color(&mut self, color: Color) {
        self.clear_color = color;
    }

    fn clear(&mut self) {
        // Draws recorded before a clear would be painted over; drop them.
        self.draws.clear();
        self.clear_requested = Some(self.clear_color);
    }

    fn viewport(&mut self, x: u32, y: u32, width: u32, height: u32) {
        self.viewport = Some([x, y, width, height]);
    }

    fn draw_arrays_instanced(&mut self, first: u32, count: u32, instances: u32) {
        if count == 0 || instances == 0 {
            return;
        }
        let Some(program_id) = self.current_program else {
            self.errors.push_back(GlError::InvalidOperation);
            return;
        };
        let Some(program) = self.programs.get(&program_id) else {
            self.errors.push_back(GlError::InvalidOperation);
            return;
        };
        let unit = program.sampler_unit.max(0) as u32;
        let proj_view = program.proj_view;
        let Some(&texture) = self.texture_units.get(&unit) else {
            self.errors.push_back(GlError::InvalidOperation);
            return;
        };

        let mut groups: Vec<(BufferId, u32, bool)> = Vec::new();
        let mut layouts: Vec<LayoutKey> = Vec::new();
        let mut slices: Vec<SliceSource> = Vec::new();

        for (location, attrib) in self.attribs.iter().enumerate().filter(|(_, a)| a.enabled) {
            let Some(buffer) = attrib.buffer else {
                self.errors.push_back(GlError::InvalidOperation);
                return;
            };
            let stride = if attrib.stride == 0 { attrib.components * 4 } else { attrib.stride };
            let group = (buffer, stride, attrib.divisor > 0);
            let index = match groups.iter().position(|g| *g == group) {
                Some(index) => index,
                None => {
                    let source = match self.buffers.get(&buffer) {
                        Some(BufferStore::Resident(_)) => SliceSource::Resident(buffer),
                        Some(BufferStore::Frame { offset, len }) => SliceSource::Frame { offset: *offset, len: *len },
                        _ => {
                            self.errors.push_back(GlError::InvalidOperation);
                            return;
                        }
                    };
                    groups.push(group);
                    slices.push(source);
                    layouts.push(LayoutKey { stride, per_instance: group.2, attributes: Vec::new() });
                    groups.len() - 1
                }
            };
            layouts[index]
                .attributes
                .push((location as u32, attrib.components, attrib.offset));
        }

        let uniform_offset = self.push_uniform(&proj_view);
        self.draws.push(PendingDraw {
            key: PipelineKey { program: program_id, layouts },
            slices,
            texture,
            uniform_offset,
            vertices: first..first + count,
            instances,
            viewport: self.viewport,
        });
    }

    fn draw_arrays(&mut self, first: u32, count: u32) {
        // Every enabled attribute has divisor 0, so a single instance covers it.
        self.draw_arrays_instanced(first, count, 1);
    }

    fn get_error(&mut self) -> Option<GlError> {
        if let Some(err) = self.errors.pop_front() {
            return Some(err);
        }
        let caught = pollster::block_on(self.gpu.device.pop_error_scope());
        self.gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);
        caught.map(|err| match err {
            wgpu::Error::OutOfMemory { .. } => GlError::OutOfMemory,
            other => GlError::Other(other.to_string()),
        })
    }
}

impl WgpuGl {
    fn current_uniform(&mut self, location: UniformLocation, kind: UniformKind) -> Option<&mut Program> {
        let id = self.current_program?;
        let program = self.programs.get_mut(&id)?;
        program
            .uniforms
            .values()
            .any(|&(loc, k)| loc == location && k == kind)
            .then_some(program)
    }
}

// ── WGSL reflection ─────────────────────────────────────────────────────

/// Attribute and uniform names recovered from a parsed WGSL module.
struct Reflection {
    attribs: HashMap<String, u32>,
    uniforms: HashMap<String, (UniformLocation, UniformKind)>,
}

fn reflect(source: &str) -> Result<Reflection, GlError> {
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|err| GlError::ShaderCompile(err.emit_to_string(source)))?;
    Ok(Reflection {
        attribs: vertex_inputs(&module)?,
        uniforms: uniforms(&module),
    })
}

/// Map `vs_main`'s `@location` inputs to their names. Inputs may be loose
/// arguments or members of a struct argument.
fn vertex_inputs(module: &naga::Module) -> Result<HashMap<String, u32>, GlError> {
    let entry = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == naga::ShaderStage::Vertex && ep.name == "vs_main")
        .ok_or_else(|| GlError::ShaderCompile("cannot reflect vertex inputs: no vs_main entry point".into()))?;

    let mut inputs = HashMap::new();
    for argument in &entry.function.arguments {
        match (&argument.binding, &module.types[argument.ty].inner) {
            (Some(naga::Binding::Location { location, .. }), _) => {
                if let Some(name) = &argument.name {
                    inputs.insert(name.clone(), *location);
                }
            }
            (None, naga::TypeInner::Struct { members, .. }) => {
                for member in members {
                    if let (Some(name), Some(naga::Binding::Location { location, .. })) = (&member.name, &member.binding) {
                        inputs.insert(name.clone(), *location);
                    }
                }
            }
            _ => {}
        }
    }
    Ok(inputs)
}

/// Uniform names in declaration order: `var<uniform>` blocks are matrices,
/// sampled textures are GL-style samplers. Samplers themselves get no location.
fn uniforms(module: &naga::Module) -> HashMap<String, (UniformLocation, UniformKind)> {
    let mut uniforms = HashMap::new();
    for (_, global) in module.global_variables.iter() {
        let kind = match (global.space, &module.types[global.ty].inner) {
            (naga::AddressSpace::Uniform, _) => UniformKind::Matrix,
            (naga::AddressSpace::Handle, naga::TypeInner::Image { .. }) => UniformKind::Sampler,
            _ => continue,
        };
        if let Some(name) = &global.name {
            let location = UniformLocation(uniforms.len() as u32);
            uniforms.insert(name.clone(), (location, kind));
        }
    }
    uniforms
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPRITE_WGSL: &str = include_str!("../shaders/sprite_batch.wgsl");

    #[test]
    fn reflects_vertex_input_locations() {
        let inputs = reflect(SPRITE_WGSL).unwrap().attribs;
        assert_eq!(inputs.len(), 7);
        assert_eq!(inputs["index"], 0);
        assert_eq!(inputs["position"], 1);
        assert_eq!(inputs["effect"], 6);
    }

    #[test]
    fn output_struct_fields_are_not_inputs() {
        let inputs = reflect(SPRITE_WGSL).unwrap().attribs;
        assert!(!inputs.contains_key("tex_coord"));
        assert!(!inputs.contains_key("clip_position"));
    }

    #[test]
    fn reflects_uniforms_by_kind() {
        let uniforms = reflect(SPRITE_WGSL).unwrap().uniforms;
        assert_eq!(uniforms["u_projView"], (UniformLocation(0), UniformKind::Matrix));
        assert_eq!(uniforms["u_texture"], (UniformLocation(1), UniformKind::Sampler));
        assert!(!uniforms.contains_key("u_sampler"));
    }

    #[test]
    fn missing_entry_point_is_compile_error() {
        let source = "@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }";
        assert!(matches!(reflect(source), Err(GlError::ShaderCompile(_))));
    }

    #[test]
    fn syntax_error_is_compile_error() {
        assert!(matches!(reflect("fn vs_main( {"), Err(GlError::ShaderCompile(_))));
    }

    #[test]
    fn commented_out_entry_point_and_reordered_struct_are_ignored() {
        let source = r#"
// fn vs_main(old: OldInput) -> @builtin(position) vec4<f32>
struct Decoy {
    @location(9) index: f32,
};

struct Input {
    @location(2) size: vec2<f32>,
    /* @location(7) hidden: f32, */
    @location(0) index: f32,
};

@vertex
fn vs_main(in: Input, @location(1) tint: vec4<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(in.size * in.index, 0.0, 1.0) * tint;
}
"#;
        let inputs = reflect(source).unwrap().attribs;
        assert_eq!(inputs.len(), 3);
        assert_eq!(inputs["index"], 0);
        assert_eq!(inputs["tint"], 1);
        assert_eq!(inputs["size"], 2);
        assert!(!inputs.contains_key("hidden"));
    }

    #[test]
    fn uniform_in_a_comment_is_not_reflected() {
        let source = r#"
// @group(0) @binding(0) var<uniform> u_old: mat4x4<f32>;
@group(0) @binding(0) var<uniform> u_projView: mat4x4<f32>;

@vertex
fn vs_main(@location(0) index: f32) -> @builtin(position) vec4<f32> {
    return u_projView * vec4<f32>(index, 0.0, 0.0, 1.0);
}
"#;
        let reflection = reflect(source).unwrap();
        assert_eq!(reflection.uniforms.len(), 1);
        assert_eq!(reflection.uniforms["u_projView"].0, UniformLocation(0));
        assert_eq!(reflection.attribs["index"], 0);
    }
}
