//! Sprites: textured rectangles with bounce physics.
//!
//! A [`Sprite`] is plain data owned by the caller (usually a
//! [`SpriteArena`](crate::arena::SpriteArena)). The batch only reads it during
//! [`SpriteBatch::draw_sprite`](crate::batch::SpriteBatch::draw_sprite).
//!
//! ## Bounce Update
//!
//! ```text
//!   y = 0   ┌───────────────────────────┐   ceiling: clamp, invert vy
//!           │                           │
//!   walls:  │  vy += gravity            │   walls: clamp, invert vx
//!   clamp,  │  pos += v                 │
//!   invert  │                           │
//!   y = H-h └───────────────────────────┘   floor: reflect, relaunch with
//!                                                  random vy in [-max, 0)
//! ```
//!
//! Each term is multiplied by the [`TimeStep`](crate::config::TimeStep) scale,
//! which is 1 for fixed-step updates.

use std::f32::consts::TAU;
use std::fmt;

use rand::Rng;

use crate::config::PhysicsConfig;
use crate::gl::TextureId;
use crate::math::{Color, Region, Vec2};

// ── Errors ──────────────────────────────────────────────────────────────

/// A sprite value outside its allowed range.
#[derive(Debug, Clone, PartialEq)]
pub enum SpriteError {
    NonPositiveSize { width: f32, height: f32 },
    RegionOutOfRange(Region),
    ColorOutOfRange(Color),
}

impl fmt::Display for SpriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpriteError::NonPositiveSize { width, height } => {
                write!(f, "sprite size must be positive, got {width}x{height}")
            }
            SpriteError::RegionOutOfRange(r) => write!(f, "atlas region {r:?} is outside [0, 1]"),
            SpriteError::ColorOutOfRange(c) => write!(f, "color {c:?} is outside [0, 1]"),
        }
    }
}

impl std::error::Error for SpriteError {}

// ── Bounds ──────────────────────────────────────────────────────────────

/// The surface sprites bounce inside, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

// ── Sprite ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    /// Top-left corner in pixels.
    pub position: Vec2,
    pub size: Vec2,
    /// Draw-order value written as instance `z`. Not depth-tested.
    pub depth: f32,
    /// Rotation in radians about the sprite's center.
    pub angle: f32,
    pub velocity: Vec2,
    pub region: Region,
    pub color: Color,
    pub texture: TextureId,
}

impl Sprite {
    /// A stationary, untinted sprite covering the whole texture.
    pub fn new(texture: TextureId, x: f32, y: f32, width: f32, height: f32) -> Result<Self, SpriteError> {
        if !(width > 0.0 && height > 0.0) {
            return Err(SpriteError::NonPositiveSize { width, height });
        }
        Ok(Self {
            position: Vec2::new(x, y),
            size: Vec2::new(width, height),
            depth: 0.0,
            angle: 0.0,
            velocity: Vec2::ZERO,
            region: Region::FULL,
            color: Color::WHITE,
            texture,
        })
    }

    pub fn with_region(mut self, region: Region) -> Result<Self, SpriteError> {
        if !region.is_normalized() {
            return Err(SpriteError::RegionOutOfRange(region));
        }
        self.region = region;
        Ok(self)
    }

    pub fn with_color(mut self, color: Color) -> Result<Self, SpriteError> {
        if !color.is_normalized() {
            return Err(SpriteError::ColorOutOfRange(color));
        }
        self.color = color;
        Ok(self)
    }

    pub fn with_depth(mut self, depth: f32) -> Self {
        self.depth = depth;
        self
    }

    /// Re-check the invariants after mutating public fields directly.
    pub fn validate(&self) -> Result<(), SpriteError> {
        if !(self.size.x > 0.0 && self.size.y > 0.0) {
            return Err(SpriteError::NonPositiveSize { width: self.size.x, height: self.size.y });
        }
        if !self.region.is_normalized() {
            return Err(SpriteError::RegionOutOfRange(self.region));
        }
        if !self.color.is_normalized() {
            return Err(SpriteError::ColorOutOfRange(self.color));
        }
        Ok(())
    }

    /// Give the sprite a random direction at speed 4..6.
    pub fn launch<R: Rng>(&mut self, rng: &mut R) {
        let angle = rng.random::<f32>() * TAU;
        let speed = rng.random::<f32>() * 2.0 + 4.0;
        self.velocity = Vec2::new(angle.sin() * speed, angle.cos() * speed);
    }

    /// Advance one frame of bounce physics.
    pub fn update<R: Rng>(&mut self, bounds: Bounds, physics: &PhysicsConfig, dt_ms: f32, rng: &mut R) {
        let step = physics.time_step.scale(dt_ms);

        self.velocity.y += physics.gravity * step;
        self.position += self.velocity * step;

        let max_x = bounds.width - self.size.x;
        let floor = bounds.height - self.size.y;

        if self.position.x < 0.0 {
            self.position.x = 0.0;
            self.velocity.x = -self.velocity.x;
        }
        if self.position.x > max_x {
            self.position.x = max_x;
            self.velocity.x = -self.velocity.x;
        }
        if self.position.y < 0.0 {
            self.position.y = 0.0;
            self.velocity.y = -self.velocity.y;
        }
        if self.position.y > floor {
            self.position.y = floor - (self.position.y - floor);
            // A non-positive ceiling has no relaunch range; the sprite comes to rest.
            self.velocity.y = if physics.relaunch_max > 0.0 {
                rng.random_range(-physics.relaunch_max..0.0)
            } else {
                0.0
            };
        }
    }
}
