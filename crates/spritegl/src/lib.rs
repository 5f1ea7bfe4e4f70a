//! # spritegl — Instanced Sprite Batching
//!
//! A small 2D renderer built around one idea: thousands of textured
//! rectangles should cost a handful of draw calls, not thousands. Sprites are
//! pushed into a [`SpriteBatch`](batch::SpriteBatch), which packs one
//! 60-byte instance record per sprite and emits a single instanced draw per
//! texture run or capacity window.
//!
//! The batch talks to the GPU only through the WebGL-shaped
//! [`GlContext`](gl::GlContext) trait. Two backends ship with the crate:
//! [`RecordingGl`](gl::RecordingGl) (headless, records every call) and
//! `WgpuGl` (feature `window`, maps the GL state machine onto wgpu).
//!
//! Start with `use spritegl::prelude::*` and a [`BounceDemo`](demo::BounceDemo).

pub mod arena;
pub mod batch;
pub mod config;
pub mod demo;
pub mod gl;
pub mod input;
pub mod material;
pub mod math;
pub mod prelude;
pub mod sprite;
pub mod texture;
pub mod time;

#[cfg(feature = "window")]
pub mod render;
#[cfg(feature = "window")]
pub mod window;

#[cfg(feature = "diagnostics")]
pub mod diag;
