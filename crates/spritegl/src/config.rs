//! Demo configuration, loaded from an optional JSON file.
//!
//! Every field has a default, so `{}` is a complete config and a file only
//! needs the values it changes:
//!
//! ```json
//! { "initial_sprites": 10000, "physics": { "time_step": { "Scaled": { "divisor": 20.0 } } } }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::math::{Color, Region};

// ── Errors ──────────────────────────────────────────────────────────────

/// Errors from loading or validating a [`DemoConfig`].
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_json::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => write!(f, "failed to read '{}': {source}", path.display()),
            ConfigError::Parse(e) => write!(f, "invalid config JSON: {e}"),
            ConfigError::Invalid(e) => write!(f, "invalid config: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

// ── Physics ─────────────────────────────────────────────────────────────

/// How a frame's elapsed time scales the physics step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum TimeStep {
    /// One unit per frame regardless of frame time.
    #[default]
    Fixed,
    /// `dt_ms / divisor` units per frame.
    Scaled { divisor: f32 },
}

impl TimeStep {
    /// Step scale for a frame that took `dt_ms` milliseconds.
    pub fn scale(self, dt_ms: f32) -> f32 {
        match self {
            TimeStep::Fixed => 1.0,
            TimeStep::Scaled { divisor } => dt_ms / divisor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Downward acceleration per step.
    pub gravity: f32,
    /// Upper bound of the upward speed a sprite gets when it hits the floor.
    pub relaunch_max: f32,
    pub time_step: TimeStep,
}

impl PhysicsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.gravity.is_finite() {
            return Err(ConfigError::Invalid("physics.gravity must be finite".into()));
        }
        if !(self.relaunch_max > 0.0) {
            return Err(ConfigError::Invalid("physics.relaunch_max must be > 0".into()));
        }
        if let TimeStep::Scaled { divisor } = self.time_step {
            if !(divisor > 0.0) {
                return Err(ConfigError::Invalid("time_step divisor must be > 0".into()));
            }
        }
        Ok(())
    }
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: 0.1,
            relaunch_max: 14.0,
            time_step: TimeStep::Fixed,
        }
    }
}

// ── Batch ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum sprites per draw call.
    pub capacity: usize,
    /// When off, each flush expands sprites into six vertices and issues a
    /// plain `draw_arrays` instead of an instanced draw.
    pub instancing: bool,
    /// When off, every instance samples the full texture.
    pub atlas_regions: bool,
    /// When off, every instance is drawn untinted (white).
    pub tint: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            instancing: true,
            atlas_regions: true,
            tint: true,
        }
    }
}

impl BatchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::Invalid("batch.capacity must be > 0".into()));
        }
        Ok(())
    }
}

// ── Demo ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub window_width: u32,
    pub window_height: u32,
    pub initial_sprites: usize,
    pub sprite_size: f32,
    /// Sprites spawned per frame while the pointer is held.
    pub spawn_per_frame: usize,
    /// Pick a new spawn color after this many sprites.
    pub color_every: usize,
    pub clear_color: Color,
    /// Atlas cells sprites pick from at random.
    pub regions: Vec<Region>,
    /// Image to use as the atlas. `None` generates a two-cell checker atlas.
    pub atlas_path: Option<PathBuf>,
    /// RNG seed. `None` seeds from the OS.
    pub seed: Option<u64>,
    pub physics: PhysicsConfig,
    pub batch: BatchConfig,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            window_width: 1280,
            window_height: 720,
            initial_sprites: 4000,
            sprite_size: 100.0,
            spawn_per_frame: 100,
            color_every: 1000,
            clear_color: Color::RED,
            regions: vec![Region::new(0.0, 0.0, 0.5, 1.0), Region::new(0.5, 0.0, 0.5, 1.0)],
            atlas_path: None,
            seed: None,
            physics: PhysicsConfig::default(),
            batch: BatchConfig::default(),
        }
    }
}

impl DemoConfig {
    /// Read and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&text)?;
        log::info!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.batch.validate()?;
        self.physics.validate()?;
        if !(self.sprite_size > 0.0) {
            return Err(ConfigError::Invalid("sprite_size must be > 0".into()));
        }
        if self.color_every == 0 {
            return Err(ConfigError::Invalid("color_every must be > 0".into()));
        }
        if self.regions.is_empty() {
            return Err(ConfigError::Invalid("regions must not be empty".into()));
        }
        if let Some(bad) = self.regions.iter().find(|r| !r.is_normalized()) {
            return Err(ConfigError::Invalid(format!("region {bad:?} is outside [0, 1]")));
        }
        if !self.clear_color.is_normalized() {
            return Err(ConfigError::Invalid("clear_color is outside [0, 1]".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_default() {
        let config = DemoConfig::from_json_str("{}").unwrap();
        assert_eq!(config, DemoConfig::default());
        assert_eq!(config.batch.capacity, 1024);
        assert_eq!(config.physics.time_step, TimeStep::Fixed);
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let config = DemoConfig::from_json_str(
            r#"{ "initial_sprites": 10, "physics": { "time_step": { "Scaled": { "divisor": 20.0 } } } }"#,
        )
        .unwrap();
        assert_eq!(config.initial_sprites, 10);
        assert_eq!(config.physics.gravity, 0.1);
        assert_eq!(config.physics.time_step, TimeStep::Scaled { divisor: 20.0 });
    }

    #[test]
    fn zero_capacity_rejected() {
        let err = DemoConfig::from_json_str(r#"{ "batch": { "capacity": 0 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "got {err}");
    }

    #[test]
    fn malformed_json_is_parse_error() {
        assert!(matches!(DemoConfig::from_json_str("{"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let path = std::env::temp_dir().join("spritegl-config-does-not-exist.json");
        assert!(matches!(DemoConfig::load(&path), Err(ConfigError::Io { .. })));
    }

    #[test]
    fn load_round_trips_through_file() {
        let path = std::env::temp_dir().join(format!("spritegl-config-{}.json", std::process::id()));
        let mut config = DemoConfig::default();
        config.spawn_per_frame = 7;
        std::fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();
        let loaded = DemoConfig::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded.spawn_per_frame, 7);
    }

    #[test]
    fn non_positive_relaunch_and_divisor_rejected() {
        let physics = PhysicsConfig { relaunch_max: 0.0, ..PhysicsConfig::default() };
        assert!(matches!(physics.validate(), Err(ConfigError::Invalid(_))));

        let physics = PhysicsConfig {
            time_step: TimeStep::Scaled { divisor: 0.0 },
            ..PhysicsConfig::default()
        };
        assert!(matches!(physics.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn zero_color_every_rejected() {
        let config = DemoConfig { color_every: 0, ..DemoConfig::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn instancing_can_be_turned_off_from_json() {
        let config = DemoConfig::from_json_str(r#"{ "batch": { "instancing": false } }"#).unwrap();
        assert!(!config.batch.instancing);
        assert_eq!(config.batch.capacity, 1024);
    }

    #[test]
    fn scaled_step_divides_frame_time() {
        assert_eq!(TimeStep::Fixed.scale(33.0), 1.0);
        assert_eq!(TimeStep::Scaled { divisor: 20.0 }.scale(40.0), 2.0);
    }
}
