//! Pointer state for the demo's spawn-on-hold interaction.
//!
//! The window loop feeds raw events in; the demo reads [`PointerState`] once
//! per frame and calls [`clear_just`](PointerState::clear_just) afterwards.

use crate::math::Vec2;

/// Primary-button state and cursor position in window pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerState {
    held: bool,
    just_pressed: bool,
    just_released: bool,
    position: Vec2,
}

impl PointerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Button is currently down.
    pub fn held(&self) -> bool {
        self.held
    }

    /// Button went down this frame.
    pub fn just_pressed(&self) -> bool {
        self.just_pressed
    }

    pub fn just_released(&self) -> bool {
        self.just_released
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn press(&mut self) {
        if !self.held {
            self.held = true;
            self.just_pressed = true;
        }
    }

    pub fn release(&mut self) {
        if self.held {
            self.held = false;
            self.just_released = true;
        }
    }

    pub fn move_to(&mut self, x: f32, y: f32) {
        self.position = Vec2::new(x, y);
    }

    /// Clear per-frame edges. Call at the end of each frame.
    pub fn clear_just(&mut self) {
        self.just_pressed = false;
        self.just_released = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_sets_edge_once() {
        let mut p = PointerState::new();
        p.press();
        p.press();
        assert!(p.held() && p.just_pressed());
        p.clear_just();
        assert!(p.held() && !p.just_pressed());
    }

    #[test]
    fn release_without_press_is_ignored() {
        let mut p = PointerState::new();
        p.release();
        assert!(!p.just_released());
        p.press();
        p.release();
        assert!(!p.held() && p.just_released());
    }

    #[test]
    fn move_tracks_position() {
        let mut p = PointerState::new();
        p.move_to(3.0, 4.0);
        assert_eq!(p.position(), Vec2::new(3.0, 4.0));
    }
}
