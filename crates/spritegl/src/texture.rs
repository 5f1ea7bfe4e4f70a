//! # Texture — Image Data on the GPU
//!
//! A [`Texture`] is a GPU texture id plus its pixel size. Pixels always arrive
//! as RGBA8; the sampling parameters follow from the size
//! ([`TextureDesc::for_size`]): power-of-two images get a mip chain and repeat
//! wrapping, anything else clamps to edge. Filtering is nearest so pixel art
//! stays crisp.
//!
//! ## Loading Many Images
//!
//! [`TextureLoader`] collects named requests and loads them together:
//!
//! ```text
//!   add("atlas.png", "atlas") ─┐
//!   add("hero.png",  "hero")  ─┼─► load(gl, on_complete)
//!                              │     ├─ one decode worker per request
//!                              │     │    (retries a failed decode)
//!                              │     ├─ uploads on the calling thread
//!                              │     └─ on_complete(LoadReport) exactly once
//! ```
//!
//! Decoding is CPU work and runs on scoped worker threads. Uploading touches
//! the GL context, which is single-threaded, so it happens on the caller's
//! thread as results arrive. A request that still fails after its retries is
//! reported in [`LoadReport::failures`] instead of blocking the others.
//!
//! Names are unique. Adding a second request under a name already taken keeps
//! the first one; the duplicate is never decoded and shows up in the report as
//! [`LoadError::DuplicateName`].
//!
//! ## Comparison
//!
//! - **Bevy** (`AssetServer`): Async loading with per-asset handles that
//!   resolve later. More general, far more machinery.
//! - **Macroquad**: `load_texture(path).await`, one image at a time.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

use image::{DynamicImage, RgbaImage};

use crate::gl::{GlContext, GlError, TextureDesc, TextureId};

/// Retries after the first failed decode.
pub const DEFAULT_RETRIES: u32 = 2;

// ── Errors ──────────────────────────────────────────────────────────────

/// Why a texture could not be loaded.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadError {
    /// Reading or decoding the file failed on every attempt.
    Decode { path: PathBuf, attempts: u32, message: String },
    /// The GPU rejected the decoded pixels.
    Upload { path: PathBuf, source: GlError },
    /// Another request already registered this name.
    DuplicateName { path: PathBuf, name: String },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Decode { path, attempts, message } => {
                write!(f, "failed to decode '{}' after {attempts} attempt(s): {message}", path.display())
            }
            LoadError::Upload { path, source } => {
                write!(f, "failed to upload '{}': {source}", path.display())
            }
            LoadError::DuplicateName { path, name } => {
                write!(f, "'{}' skipped: name '{name}' is already registered", path.display())
            }
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Upload { source, .. } => Some(source),
            LoadError::Decode { .. } | LoadError::DuplicateName { .. } => None,
        }
    }
}

// ── Texture ─────────────────────────────────────────────────────────────

/// A texture resident on the GPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Texture {
    pub id: TextureId,
    pub width: u32,
    pub height: u32,
}

impl Texture {
    /// Upload tightly packed RGBA8 pixels.
    pub fn from_rgba<G: GlContext>(gl: &mut G, width: u32, height: u32, pixels: &[u8]) -> Result<Self, GlError> {
        let desc = TextureDesc::for_size(width, height);
        let id = gl.create_texture(&desc, pixels)?;
        log::debug!("texture {width}x{height} uploaded (mipmaps: {})", desc.mipmaps);
        Ok(Self { id, width, height })
    }

    pub fn from_image<G: GlContext>(gl: &mut G, image: &DynamicImage) -> Result<Self, GlError> {
        let rgba = image.to_rgba8();
        Self::from_rgba(gl, rgba.width(), rgba.height(), rgba.as_raw())
    }

    /// Decode and upload a PNG or JPEG file on the calling thread.
    pub fn load<G: GlContext>(gl: &mut G, path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let rgba = decode(path).map_err(|message| LoadError::Decode {
            path: path.to_path_buf(),
            attempts: 1,
            message,
        })?;
        Self::from_rgba(gl, rgba.width(), rgba.height(), rgba.as_raw()).map_err(|source| LoadError::Upload {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn decode(path: &Path) -> Result<RgbaImage, String> {
    image::open(path).map(|img| img.to_rgba8()).map_err(|e| e.to_string())
}

// ── TextureLoader ───────────────────────────────────────────────────────

/// Result of a [`TextureLoader::load`]: every request appears in exactly one
/// of the two collections.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub textures: HashMap<String, Texture>,
    pub failures: Vec<(String, LoadError)>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Batch loader for named images. See the module docs.
pub struct TextureLoader {
    requests: Vec<(PathBuf, String)>,
    duplicates: Vec<(PathBuf, String)>,
    retries: u32,
}

impl TextureLoader {
    pub fn new() -> Self {
        Self {
            requests: Vec::new(),
            duplicates: Vec::new(),
            retries: DEFAULT_RETRIES,
        }
    }

    /// Number of extra decode attempts after a failure. Saturates at
    /// `u32::MAX` total attempts.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Register an image to load under `name`. A name that is already
    /// registered keeps its first request; see [`LoadError::DuplicateName`].
    pub fn add(&mut self, path: impl Into<PathBuf>, name: impl Into<String>) -> &mut Self {
        let (path, name) = (path.into(), name.into());
        if self.requests.iter().any(|(_, taken)| *taken == name) {
            log::warn!("texture '{name}' already registered, ignoring '{}'", path.display());
            self.duplicates.push((path, name));
        } else {
            self.requests.push((path, name));
        }
        self
    }

    /// Requests that will be decoded, duplicates excluded.
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty() && self.duplicates.is_empty()
    }

    /// Load every registered image and hand the outcome to `on_complete`.
    /// Requests are consumed.
    pub fn load<G, F>(&mut self, gl: &mut G, on_complete: F)
    where
        G: GlContext,
        F: FnOnce(LoadReport),
    {
        let requests = std::mem::take(&mut self.requests);
        let retries = self.retries;
        let failures = std::mem::take(&mut self.duplicates)
            .into_iter()
            .map(|(path, name)| (name.clone(), LoadError::DuplicateName { path, name }))
            .collect();
        let mut report = LoadReport { textures: HashMap::new(), failures };

        thread::scope(|scope| {
            let (tx, rx) = mpsc::channel();
            for (path, name) in &requests {
                let tx = tx.clone();
                scope.spawn(move || {
                    let result = decode_with_retries(path, retries);
                    // The receiver outlives every worker inside this scope.
                    let _ = tx.send((name, path, result));
                });
            }
            drop(tx);

            for (name, path, result) in rx {
                let outcome = result.and_then(|rgba| {
                    Texture::from_rgba(gl, rgba.width(), rgba.height(), rgba.as_raw())
                        .map_err(|source| LoadError::Upload { path: path.clone(), source })
                });
                match outcome {
                    Ok(texture) => {
                        report.textures.insert(name.clone(), texture);
                    }
                    Err(err) => {
                        log::warn!("texture '{name}': {err}");
                        report.failures.push((name.clone(), err));
                    }
                }
            }
        });

        log::info!(
            "texture loader finished: {} loaded, {} failed",
            report.textures.len(),
            report.failures.len()
        );
        on_complete(report);
    }
}

impl Default for TextureLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_with_retries(path: &Path, retries: u32) -> Result<RgbaImage, LoadError> {
    let attempts = retries.saturating_add(1);
    let mut last = String::new();
    for attempt in 1..=attempts {
        match decode(path) {
            Ok(rgba) => return Ok(rgba),
            Err(message) => {
                log::debug!("decode '{}' attempt {attempt}/{attempts} failed: {message}", path.display());
                last = message;
            }
        }
    }
    Err(LoadError::Decode { path: path.to_path_buf(), attempts, message: last })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::{RecordingGl, WrapMode};

    fn temp_png(name: &str, width: u32, height: u32) -> PathBuf {
        let path = std::env::temp_dir().join(format!("spritegl-{}-{name}.png", std::process::id()));
        RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn from_rgba_picks_wrap_by_size() {
        let mut gl = RecordingGl::new();
        let pow2 = Texture::from_rgba(&mut gl, 4, 4, &[0; 64]).unwrap();
        let npot = Texture::from_rgba(&mut gl, 3, 2, &[0; 24]).unwrap();
        assert_eq!(gl.texture_desc(pow2.id).unwrap().wrap, WrapMode::Repeat);
        assert_eq!(gl.texture_desc(npot.id).unwrap().wrap, WrapMode::ClampToEdge);
    }

    #[test]
    fn load_reads_png_from_disk() {
        let path = temp_png("single", 8, 4);
        let mut gl = RecordingGl::new();
        let texture = Texture::load(&mut gl, &path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!((texture.width, texture.height), (8, 4));
    }

    #[test]
    fn loader_reports_missing_file_and_still_completes() {
        let good = temp_png("good", 2, 2);
        let missing = std::env::temp_dir().join("spritegl-definitely-missing.png");

        let mut gl = RecordingGl::new();
        let mut loader = TextureLoader::new();
        loader.add(&good, "good").add(&missing, "missing");

        let mut calls = 0;
        let mut captured = None;
        loader.load(&mut gl, |report| {
            calls += 1;
            captured = Some(report);
        });
        let _ = std::fs::remove_file(&good);

        assert_eq!(calls, 1, "callback fires exactly once");
        let report = captured.unwrap();
        assert!(report.textures.contains_key("good"));
        assert_eq!(report.failures.len(), 1);
        let (name, err) = &report.failures[0];
        assert_eq!(name, "missing");
        assert!(matches!(err, LoadError::Decode { attempts: 3, .. }), "{err}");
        assert!(loader.is_empty(), "requests are consumed");
    }

    #[test]
    fn empty_loader_completes_immediately() {
        let mut gl = RecordingGl::new();
        let mut fired = false;
        TextureLoader::new().load(&mut gl, |report| {
            fired = true;
            assert!(report.is_complete());
            assert!(report.textures.is_empty());
        });
        assert!(fired);
    }

    #[test]
    fn duplicate_name_keeps_first_request_and_reports_the_second() {
        let first = temp_png("dup-first", 2, 2);
        let second = temp_png("dup-second", 4, 4);

        let mut gl = RecordingGl::new();
        let mut loader = TextureLoader::new();
        loader.add(&first, "hero").add(&second, "hero");
        assert_eq!(loader.len(), 1);

        let mut captured = None;
        loader.load(&mut gl, |report| captured = Some(report));
        let _ = std::fs::remove_file(&first);
        let _ = std::fs::remove_file(&second);

        let report = captured.unwrap();
        assert_eq!(report.textures.len(), 1);
        assert_eq!(report.textures["hero"].width, 2, "first registration wins");
        assert_eq!(report.failures.len(), 1);
        assert!(
            matches!(&report.failures[0], (name, LoadError::DuplicateName { path, .. }) if name == "hero" && *path == second)
        );
        assert!(loader.is_empty());
    }

    #[test]
    fn max_retries_does_not_overflow() {
        let path = temp_png("max-retries", 2, 2);
        let decoded = decode_with_retries(&path, u32::MAX);
        let _ = std::fs::remove_file(&path);
        assert_eq!(decoded.unwrap().dimensions(), (2, 2));
    }

    #[test]
    fn retries_are_configurable() {
        let missing = std::env::temp_dir().join("spritegl-also-missing.png");
        let mut gl = RecordingGl::new();
        let mut loader = TextureLoader::new().with_retries(0);
        loader.add(&missing, "x");
        loader.load(&mut gl, |report| {
            assert!(matches!(report.failures[0].1, LoadError::Decode { attempts: 1, .. }));
        });
    }
}
