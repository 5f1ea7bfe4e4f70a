//! wgpu backend: device setup and the [`WgpuGl`] translation layer.

pub mod gpu;
mod wgpu_gl;

pub use gpu::GpuContext;
pub use wgpu_gl::WgpuGl;
