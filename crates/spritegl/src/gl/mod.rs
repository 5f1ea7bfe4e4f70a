//! # GL — The Drawing Surface Seam
//!
//! Everything above this module (batch, material, textures, demo) speaks to the
//! GPU through one trait, [`GlContext`]. Its shape follows the WebGL 1 API plus
//! the `ANGLE_instanced_arrays` extension: a bind-then-operate state machine
//! where buffers, programs and textures are referred to by opaque ids and most
//! calls mutate "currently bound" state.
//!
//! ```text
//!   SpriteBatch ─┐
//!   Material  ───┼──► &mut impl GlContext ──► RecordingGl  (headless / tests)
//!   Texture   ───┘                        └─► WgpuGl       (feature "window")
//! ```
//!
//! ## Why a GL-shaped trait
//!
//! Instanced sprite batching is defined in terms of vertex attributes,
//! divisors and a single `drawArraysInstanced` call. Keeping those concepts in
//! the trait means the batch reads like the protocol it implements, and a
//! recording backend can assert on the exact call sequence. Backends that are
//! not GL (wgpu) translate the tracked state into their own objects at draw
//! time.
//!
//! ## Errors
//!
//! GL reports most failures lazily through `glGetError`. [`GlContext::get_error`]
//! mirrors that: operations that can fail synchronously (program compile,
//! texture creation) return `Result`, everything else records an error that a
//! later `get_error` call drains.
//!
//! ## Comparison
//!
//! - **glow**: Exposes the full GL API as an unsafe trait over raw GL. We keep
//!   only the subset sprite batching needs, with typed ids and safe methods.
//! - **miniquad**: A small GL-like context with its own buffer/pipeline ids;
//!   closer in spirit, but pipeline-centric rather than attribute-centric.

mod recording;

use std::fmt;

use crate::math::{Color, Mat4};

pub use recording::{DrawRecord, GlCall, RecordingGl};

// ── Ids ─────────────────────────────────────────────────────────────────

/// Handle to a GPU buffer created by [`GlContext::create_buffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub(crate) u32);

/// Handle to a linked shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub(crate) u32);

/// Handle to a GPU texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub(crate) u32);

/// Location of a uniform within a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub(crate) u32);

// ── Parameters ──────────────────────────────────────────────────────────

/// Upload hint for [`GlContext::buffer_data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Written once, drawn many times (`STATIC_DRAW`).
    Static,
    /// Rewritten every frame (`DYNAMIC_DRAW`).
    Dynamic,
}

/// Which shading language a backend compiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderDialect {
    /// GLSL ES 1.00 vertex + fragment pair.
    Glsl,
    /// A single WGSL module with `vs_main` / `fs_main` entry points.
    Wgsl,
}

/// Shader source handed to [`GlContext::create_program`].
#[derive(Debug, Clone, Copy)]
pub enum ShaderSource<'a> {
    Glsl { vertex: &'a str, fragment: &'a str },
    Wgsl(&'a str),
}

impl ShaderSource<'_> {
    pub fn dialect(&self) -> ShaderDialect {
        match self {
            ShaderSource::Glsl { .. } => ShaderDialect::Glsl,
            ShaderSource::Wgsl(_) => ShaderDialect::Wgsl,
        }
    }
}

/// Texture coordinate wrapping outside `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapMode {
    Repeat,
    ClampToEdge,
}

/// Sampling filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
}

/// Parameters for [`GlContext::create_texture`]. Pixels are always RGBA8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub wrap: WrapMode,
    pub filter: FilterMode,
    pub mipmaps: bool,
}

impl TextureDesc {
    /// WebGL 1 rules: power-of-two textures may repeat and get a mip chain,
    /// anything else must clamp and stay single-level. Filtering is nearest.
    pub fn for_size(width: u32, height: u32) -> Self {
        let pow2 = width.is_power_of_two() && height.is_power_of_two();
        Self {
            width,
            height,
            wrap: if pow2 { WrapMode::Repeat } else { WrapMode::ClampToEdge },
            filter: FilterMode::Nearest,
            mipmaps: pow2,
        }
    }

    /// Number of mip levels down to 1x1 (1 when mipmaps are off).
    pub fn mip_level_count(&self) -> u32 {
        if self.mipmaps {
            32 - self.width.max(self.height).max(1).leading_zeros()
        } else {
            1
        }
    }

    /// Byte length of the base level.
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

// ── Errors ──────────────────────────────────────────────────────────────

/// Errors reported by a [`GlContext`].
#[derive(Debug, Clone, PartialEq)]
pub enum GlError {
    InvalidEnum,
    InvalidValue,
    InvalidOperation,
    OutOfMemory,
    /// Backend-specific error text (e.g. a wgpu validation message).
    Other(String),
    /// Shader compilation or program link failed.
    ShaderCompile(String),
    /// The program has no active attribute with this name.
    MissingAttribute(String),
    /// The program has no active uniform with this name.
    MissingUniform(String),
}

impl fmt::Display for GlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlError::InvalidEnum => write!(f, "GL_INVALID_ENUM"),
            GlError::InvalidValue => write!(f, "GL_INVALID_VALUE"),
            GlError::InvalidOperation => write!(f, "GL_INVALID_OPERATION"),
            GlError::OutOfMemory => write!(f, "GL_OUT_OF_MEMORY"),
            GlError::Other(e) => write!(f, "GPU error: {e}"),
            GlError::ShaderCompile(e) => write!(f, "shader compile failed: {e}"),
            GlError::MissingAttribute(name) => write!(f, "attribute '{name}' not found in program"),
            GlError::MissingUniform(name) => write!(f, "uniform '{name}' not found in program"),
        }
    }
}

impl std::error::Error for GlError {}

// ── GlContext ───────────────────────────────────────────────────────────

/// A WebGL-style drawing surface with instanced arrays.
///
/// All methods take `&mut self`: the context is a state machine and callers
/// own it exclusively for the duration of a frame.
pub trait GlContext {
    /// Shader language this backend compiles.
    fn dialect(&self) -> ShaderDialect;

    fn create_buffer(&mut self) -> Result<BufferId, GlError>;
    /// Bind `buffer` as the current `ARRAY_BUFFER` (`None` unbinds).
    fn bind_buffer(&mut self, buffer: Option<BufferId>);
    /// Replace the contents of the bound buffer.
    fn buffer_data(&mut self, data: &[u8], usage: BufferUsage);

    fn create_program(&mut self, source: &ShaderSource<'_>) -> Result<ProgramId, GlError>;
    fn use_program(&mut self, program: Option<ProgramId>);
    fn attrib_location(&mut self, program: ProgramId, name: &str) -> Option<u32>;
    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation>;

    fn enable_vertex_attrib(&mut self, location: u32);
    fn disable_vertex_attrib(&mut self, location: u32);
    /// Point `location` at `components` floats in the bound buffer, starting at
    /// byte `offset` and advancing `stride` bytes per element.
    fn vertex_attrib_pointer(&mut self, location: u32, components: u32, stride: u32, offset: u32);
    /// 0 = advance per vertex, 1 = advance per instance.
    fn vertex_attrib_divisor(&mut self, location: u32, divisor: u32);

    /// Create and fill an RGBA8 texture. `pixels.len()` must equal `desc.byte_len()`.
    fn create_texture(&mut self, desc: &TextureDesc, pixels: &[u8]) -> Result<TextureId, GlError>;
    /// `activeTexture(TEXTURE0 + unit)` followed by `bindTexture`.
    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>);

    fn uniform_matrix4(&mut self, location: UniformLocation, matrix: &Mat4);
    fn uniform_sampler(&mut self, location: UniformLocation, unit: i32);

    fn clear_color(&mut self, color: Color);
    fn clear(&mut self);
    fn viewport(&mut self, x: u32, y: u32, width: u32, height: u32);

    /// Draw `count` vertices starting at `first`, `instances` times.
    fn draw_arrays_instanced(&mut self, first: u32, count: u32, instances: u32);

    /// Plain (non-instanced) draw of `count` vertices starting at `first`.
    fn draw_arrays(&mut self, first: u32, count: u32);

    /// Drain the oldest pending error, `None` when the context is clean.
    fn get_error(&mut self) -> Option<GlError>;
}
