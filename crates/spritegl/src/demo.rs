//! The bouncing-sprites demo, independent of any window.
//!
//! [`BounceDemo`] owns the sprite arena, the batch and the atlas texture, and
//! runs one frame per [`tick`](BounceDemo::tick):
//!
//! ```text
//! pointer ─► spawn (while held) ─► update every sprite ─► resize projection
//!         ─► viewport + clear ─► begin ─► draw_sprite * N ─► end
//! ```
//!
//! The window loop drives it with `WgpuGl`; the headless example and the
//! tests drive it with `RecordingGl`.

use std::fmt;

use image::{Rgba, RgbaImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::arena::{SlotId, SpriteArena};
use crate::batch::{BatchError, SpriteBatch};
use crate::config::{ConfigError, DemoConfig};
use crate::gl::{GlContext, GlError};
use crate::input::PointerState;
use crate::math::{Color, Region};
use crate::sprite::{Bounds, Sprite, SpriteError};
use crate::texture::{LoadError, Texture};

/// Side length of the generated atlas. Two square cells side by side.
const ATLAS_CELL: u32 = 32;

// ── Errors ──────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum DemoError {
    Config(ConfigError),
    Batch(BatchError),
    Atlas(LoadError),
    Gpu(GlError),
    Sprite(SpriteError),
}

impl fmt::Display for DemoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DemoError::Config(e) => write!(f, "{e}"),
            DemoError::Batch(e) => write!(f, "{e}"),
            DemoError::Atlas(e) => write!(f, "atlas: {e}"),
            DemoError::Gpu(e) => write!(f, "{e}"),
            DemoError::Sprite(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for DemoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DemoError::Config(e) => Some(e),
            DemoError::Batch(e) => Some(e),
            DemoError::Atlas(e) => Some(e),
            DemoError::Gpu(e) => Some(e),
            DemoError::Sprite(e) => Some(e),
        }
    }
}

impl From<ConfigError> for DemoError {
    fn from(e: ConfigError) -> Self {
        DemoError::Config(e)
    }
}

impl From<BatchError> for DemoError {
    fn from(e: BatchError) -> Self {
        DemoError::Batch(e)
    }
}

impl From<SpriteError> for DemoError {
    fn from(e: SpriteError) -> Self {
        DemoError::Sprite(e)
    }
}

// ── BounceDemo ──────────────────────────────────────────────────────────

/// What one frame did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub sprites: usize,
    pub draw_calls: u32,
    pub instances: u32,
}

pub struct BounceDemo {
    config: DemoConfig,
    batch: SpriteBatch,
    atlas: Texture,
    sprites: SpriteArena,
    rng: StdRng,
    spawn_color: Color,
    surface: (u32, u32),
}

impl BounceDemo {
    /// Validate `config`, then build the batch and atlas. Sprites are added
    /// by [`populate`](Self::populate).
    pub fn new<G: GlContext>(gl: &mut G, config: DemoConfig) -> Result<Self, DemoError> {
        config.validate()?;
        let mut batch = SpriteBatch::new(gl, config.batch)?;

        let atlas = match &config.atlas_path {
            Some(path) => Texture::load(gl, path).map_err(DemoError::Atlas)?,
            None => {
                let image = checker_atlas();
                Texture::from_rgba(gl, image.width(), image.height(), image.as_raw()).map_err(DemoError::Gpu)?
            }
        };

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let surface = (config.window_width, config.window_height);
        batch.resize(surface.0 as f32, surface.1 as f32);

        Ok(Self {
            sprites: SpriteArena::with_capacity(config.initial_sprites),
            config,
            batch,
            atlas,
            rng,
            spawn_color: Color::WHITE,
            surface,
        })
    }

    /// Scatter `initial_sprites` pastel sprites over the top-left 1000x1000 px.
    pub fn populate(&mut self) -> Result<(), DemoError> {
        for _ in 0..self.config.initial_sprites {
            let x = self.rng.random::<f32>() * 1000.0;
            let y = self.rng.random::<f32>() * 1000.0;
            let color = Color::rgb(
                self.rng.random::<f32>() * 0.5 + 0.5,
                self.rng.random::<f32>() * 0.5 + 0.5,
                self.rng.random::<f32>() * 0.5 + 0.5,
            );
            self.spawn(x, y, color)?;
        }
        log::info!("populated {} sprites", self.sprites.len());
        Ok(())
    }

    /// Add one sprite centered on `(x, y)` with a random atlas cell and launch
    /// velocity.
    pub fn spawn(&mut self, x: f32, y: f32, color: Color) -> Result<SlotId, DemoError> {
        let size = self.config.sprite_size;
        let region = self.random_region();
        let mut sprite = Sprite::new(self.atlas.id, x - size / 2.0, y - size / 2.0, size, size)?
            .with_region(region)?
            .with_color(color)?;
        sprite.launch(&mut self.rng);
        Ok(self.sprites.insert(sprite))
    }

    fn random_region(&mut self) -> Region {
        let regions = &self.config.regions;
        match regions.len() {
            0 => Region::FULL,
            n => regions[self.rng.random_range(0..n)],
        }
    }

    fn next_spawn_color(&mut self) {
        self.spawn_color = Color::rgb(
            self.rng.random::<f32>() * 0.75 + 0.25,
            self.rng.random::<f32>() * 0.75 + 0.25,
            self.rng.random::<f32>() * 0.75 + 0.25,
        );
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.surface = (width.max(1), height.max(1));
    }

    /// Run one frame: spawn, update, draw.
    pub fn tick<G: GlContext>(&mut self, gl: &mut G, pointer: &PointerState, dt_ms: f32) -> Result<FrameStats, DemoError> {
        if pointer.just_pressed() {
            self.next_spawn_color();
        }
        if pointer.held() {
            let at = pointer.position();
            for _ in 0..self.config.spawn_per_frame {
                if self.sprites.len() % self.config.color_every == 0 {
                    self.next_spawn_color();
                }
                self.spawn(at.x, at.y, self.spawn_color)?;
            }
        }

        let (width, height) = self.surface;
        let bounds = Bounds::new(width as f32, height as f32);
        let physics = self.config.physics;
        for (_, sprite) in self.sprites.iter_mut() {
            sprite.update(bounds, &physics, dt_ms, &mut self.rng);
        }

        self.batch.resize(width as f32, height as f32);
        gl.viewport(0, 0, width, height);
        gl.clear_color(self.config.clear_color);
        gl.clear();

        self.batch.begin(gl)?;
        for (_, sprite) in self.sprites.iter() {
            self.batch.draw_sprite(gl, sprite)?;
        }
        self.batch.end(gl)?;

        let stats = self.batch.stats();
        Ok(FrameStats {
            sprites: self.sprites.len(),
            draw_calls: stats.draw_calls,
            instances: stats.instances,
        })
    }

    pub fn sprites(&self) -> &SpriteArena {
        &self.sprites
    }

    pub fn sprites_mut(&mut self) -> &mut SpriteArena {
        &mut self.sprites
    }

    pub fn batch(&self) -> &SpriteBatch {
        &self.batch
    }

    pub fn atlas(&self) -> Texture {
        self.atlas
    }

    pub fn spawn_color(&self) -> Color {
        self.spawn_color
    }

    pub fn config(&self) -> &DemoConfig {
        &self.config
    }

    pub fn surface_size(&self) -> (u32, u32) {
        self.surface
    }
}

/// Two-cell atlas: a light checker on the left, a dark ring on the right.
fn checker_atlas() -> RgbaImage {
    RgbaImage::from_fn(ATLAS_CELL * 2, ATLAS_CELL, |x, y| {
        if x < ATLAS_CELL {
            let on = ((x / 4) + (y / 4)) % 2 == 0;
            if on { Rgba([255, 255, 255, 255]) } else { Rgba([200, 200, 200, 255]) }
        } else {
            let cx = (x - ATLAS_CELL) as f32 - ATLAS_CELL as f32 / 2.0 + 0.5;
            let cy = y as f32 - ATLAS_CELL as f32 / 2.0 + 0.5;
            let d = (cx * cx + cy * cy).sqrt();
            if d < ATLAS_CELL as f32 / 2.0 - 1.0 && d > ATLAS_CELL as f32 / 4.0 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::{GlCall, RecordingGl};

    fn config(initial: usize) -> DemoConfig {
        DemoConfig {
            initial_sprites: initial,
            seed: Some(42),
            ..DemoConfig::default()
        }
    }

    #[test]
    fn invalid_config_is_rejected_before_any_gl_call() {
        let mut gl = RecordingGl::new();
        let bad = DemoConfig { color_every: 0, ..config(0) };
        let err = BounceDemo::new(&mut gl, bad).err().unwrap();
        assert!(matches!(err, DemoError::Config(ConfigError::Invalid(_))), "got {err}");
        assert!(gl.calls().is_empty());

        let mut bad = config(0);
        bad.physics.relaunch_max = -1.0;
        assert!(matches!(BounceDemo::new(&mut gl, bad), Err(DemoError::Config(_))));
    }

    #[test]
    fn populate_spawns_configured_count_with_pastel_colors() {
        let mut gl = RecordingGl::new();
        let mut demo = BounceDemo::new(&mut gl, config(50)).unwrap();
        demo.populate().unwrap();
        assert_eq!(demo.sprites().len(), 50);
        for (_, s) in demo.sprites().iter() {
            assert!(s.color.r >= 0.5 && s.color.g >= 0.5 && s.color.b >= 0.5);
            assert_eq!(s.size.x, 100.0);
        }
    }

    #[test]
    fn spawn_centers_sprite_on_point() {
        let mut gl = RecordingGl::new();
        let mut demo = BounceDemo::new(&mut gl, config(0)).unwrap();
        let id = demo.spawn(300.0, 200.0, Color::WHITE).unwrap();
        let sprite = demo.sprites().get(id).unwrap();
        assert_eq!(sprite.position.x, 250.0);
        assert_eq!(sprite.position.y, 150.0);
        assert!(demo.config().regions.contains(&sprite.region));
    }

    #[test]
    fn four_thousand_sprites_draw_in_four_calls() {
        let mut gl = RecordingGl::new();
        let mut demo = BounceDemo::new(&mut gl, config(4000)).unwrap();
        demo.populate().unwrap();
        let stats = demo.tick(&mut gl, &PointerState::new(), 16.0).unwrap();
        assert_eq!(stats.sprites, 4000);
        assert_eq!(stats.draw_calls, 4);
        assert_eq!(stats.instances, 4000);
    }

    #[test]
    fn holding_pointer_spawns_each_frame() {
        let mut gl = RecordingGl::new();
        let mut demo = BounceDemo::new(&mut gl, config(0)).unwrap();
        let mut pointer = PointerState::new();
        pointer.move_to(640.0, 360.0);
        pointer.press();

        demo.tick(&mut gl, &pointer, 16.0).unwrap();
        pointer.clear_just();
        demo.tick(&mut gl, &pointer, 16.0).unwrap();
        assert_eq!(demo.sprites().len(), 200);

        pointer.release();
        demo.tick(&mut gl, &pointer, 16.0).unwrap();
        assert_eq!(demo.sprites().len(), 200);
    }

    #[test]
    fn spawn_colors_are_saturated_range() {
        let mut gl = RecordingGl::new();
        let mut demo = BounceDemo::new(&mut gl, config(0)).unwrap();
        let mut pointer = PointerState::new();
        pointer.press();
        demo.tick(&mut gl, &pointer, 16.0).unwrap();
        let c = demo.spawn_color();
        assert!(c.r >= 0.25 && c.g >= 0.25 && c.b >= 0.25);
        assert_ne!(c, Color::WHITE);
    }

    #[test]
    fn frame_clears_before_drawing() {
        let mut gl = RecordingGl::new();
        let mut demo = BounceDemo::new(&mut gl, config(3)).unwrap();
        demo.populate().unwrap();
        gl.take_calls();
        demo.tick(&mut gl, &PointerState::new(), 16.0).unwrap();

        let calls = gl.calls();
        let clear = calls.iter().position(|c| *c == GlCall::Clear).unwrap();
        let draw = calls
            .iter()
            .position(|c| matches!(c, GlCall::DrawArraysInstanced(_)))
            .unwrap();
        assert!(clear < draw);
        assert!(calls.contains(&GlCall::ClearColor(Color::RED)));
        assert!(calls.contains(&GlCall::Viewport { x: 0, y: 0, width: 1280, height: 720 }));
    }

    #[test]
    fn sprites_stay_inside_after_many_frames() {
        let mut gl = RecordingGl::new();
        let mut demo = BounceDemo::new(&mut gl, config(200)).unwrap();
        demo.populate().unwrap();
        for _ in 0..120 {
            demo.tick(&mut gl, &PointerState::new(), 16.0).unwrap();
            gl.take_calls();
        }
        for (_, s) in demo.sprites().iter() {
            assert!(s.position.x >= 0.0 && s.position.x <= 1280.0 - s.size.x);
            assert!(s.position.y <= 720.0 - s.size.y);
        }
    }

    #[test]
    fn generated_atlas_is_power_of_two() {
        let atlas = checker_atlas();
        assert!(atlas.width().is_power_of_two() && atlas.height().is_power_of_two());
    }
}
