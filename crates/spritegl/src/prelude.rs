//! Convenience re-exports: `use spritegl::prelude::*`.

pub use crate::arena::{Arena, SlotId, SpriteArena};
pub use crate::batch::{BatchError, BatchStats, SpriteBatch};
pub use crate::config::{BatchConfig, ConfigError, DemoConfig, PhysicsConfig, TimeStep};
pub use crate::demo::{BounceDemo, DemoError, FrameStats};
pub use crate::gl::{GlContext, GlError, RecordingGl, TextureId};
pub use crate::input::PointerState;
pub use crate::material::Material;
pub use crate::math::{Color, Mat4, Region, Vec2, Vec3};
pub use crate::sprite::{Bounds, Sprite, SpriteError};
pub use crate::texture::{LoadError, LoadReport, Texture, TextureLoader};
pub use crate::time::FrameTimer;

#[cfg(feature = "window")]
pub use crate::render::{GpuContext, WgpuGl};
#[cfg(feature = "window")]
pub use crate::window::{run, RunError};

#[cfg(feature = "diagnostics")]
pub use crate::diag::DiagSender;
