//! Math types and glam re-exports.
//!
//! [`Region`] and [`Color`] are the two per-instance values a sprite carries
//! besides its rectangle. Both are plain `Copy` data and serialize with serde so
//! they can appear in a [`DemoConfig`](crate::config::DemoConfig).

use serde::{Deserialize, Serialize};

pub use glam::{Mat4, Vec2, Vec3, Vec4};

/// A normalized sub-rectangle of a texture: origin `(u0, v0)` plus extent
/// `(du, dv)`, all in UV space where `(0,0)` is the top-left texel.
///
/// ```text
/// (0,0) ┌──────────────┬──────────────┐
///       │ Region       │ Region       │
///       │ (0,0,.5,1)   │ (.5,0,.5,1)  │
///       └──────────────┴──────────────┘ (1,1)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub u0: f32,
    pub v0: f32,
    pub du: f32,
    pub dv: f32,
}

impl Region {
    /// The whole texture.
    pub const FULL: Self = Self { u0: 0.0, v0: 0.0, du: 1.0, dv: 1.0 };

    pub const fn new(u0: f32, v0: f32, du: f32, dv: f32) -> Self {
        Self { u0, v0, du, dv }
    }

    /// True when every component lies in `[0, 1]`.
    pub fn is_normalized(&self) -> bool {
        self.to_array().iter().all(|c| (0.0..=1.0).contains(c))
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.u0, self.v0, self.du, self.dv]
    }
}

impl Default for Region {
    fn default() -> Self {
        Self::FULL
    }
}

/// Linear RGBA tint, each channel in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Self = Self { r: 1.0, g: 1.0, b: 1.0, a: 1.0 };
    pub const BLACK: Self = Self { r: 0.0, g: 0.0, b: 0.0, a: 1.0 };
    pub const RED: Self = Self { r: 1.0, g: 0.0, b: 0.0, a: 1.0 };

    /// Create a color from RGB (alpha = 1).
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Create a color from RGBA.
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// True when every channel lies in `[0, 1]`.
    pub fn is_normalized(&self) -> bool {
        self.to_array().iter().all(|c| (0.0..=1.0).contains(c))
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Orthographic projection for a `width` x `height` surface with the origin at
/// the top-left corner and y growing downward.
pub fn ortho_projection(width: f32, height: f32) -> Mat4 {
    Mat4::orthographic_rh_gl(0.0, width, height, 0.0, 0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_region_is_unit_square() {
        assert_eq!(Region::FULL.to_array(), [0.0, 0.0, 1.0, 1.0]);
        assert_eq!(Region::default(), Region::FULL);
    }

    #[test]
    fn region_normalization() {
        assert!(Region::new(0.5, 0.0, 0.5, 1.0).is_normalized());
        assert!(!Region::new(-0.1, 0.0, 0.5, 1.0).is_normalized());
        assert!(!Region::new(0.0, 0.0, 1.5, 1.0).is_normalized());
    }

    #[test]
    fn color_normalization() {
        assert!(Color::WHITE.is_normalized());
        assert!(!Color::rgba(1.2, 0.0, 0.0, 1.0).is_normalized());
        assert!(!Color::rgba(0.0, 0.0, 0.0, -1.0).is_normalized());
    }

    #[test]
    fn ortho_maps_corners_to_clip_space() {
        let proj = ortho_projection(800.0, 600.0);
        let top_left = proj.project_point3(Vec3::new(0.0, 0.0, 0.0));
        let bottom_right = proj.project_point3(Vec3::new(800.0, 600.0, 0.0));
        assert!((top_left.x + 1.0).abs() < 1e-6 && (top_left.y - 1.0).abs() < 1e-6);
        assert!((bottom_right.x - 1.0).abs() < 1e-6 && (bottom_right.y + 1.0).abs() < 1e-6);
    }

    #[test]
    fn ortho_is_deterministic() {
        assert_eq!(ortho_projection(1280.0, 720.0), ortho_projection(1280.0, 720.0));
    }
}
