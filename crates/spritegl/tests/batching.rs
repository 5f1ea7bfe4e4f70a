//! End-to-end frames through the public API, recorded by `RecordingGl`.

use std::path::PathBuf;

use image::{Rgba, RgbaImage};
use spritegl::gl::{GlCall, RecordingGl};
use spritegl::prelude::*;

fn texture(gl: &mut RecordingGl, size: u32) -> Texture {
    let pixels = vec![255u8; (size * size * 4) as usize];
    Texture::from_rgba(gl, size, size, &pixels).unwrap()
}

fn seeded_config(initial_sprites: usize) -> DemoConfig {
    DemoConfig {
        initial_sprites,
        seed: Some(42),
        ..Default::default()
    }
}

#[test]
fn interleaved_textures_flush_at_every_switch() {
    let mut gl = RecordingGl::new();
    let a = texture(&mut gl, 16);
    let b = texture(&mut gl, 32);
    let mut batch = SpriteBatch::new(&mut gl, BatchConfig::default()).unwrap();
    batch.resize(800.0, 600.0);

    batch.begin(&mut gl).unwrap();
    for tex in [a, a, b, b, a] {
        batch.draw(&mut gl, tex.id, 10.0, 10.0, 16.0, 16.0).unwrap();
    }
    batch.end(&mut gl).unwrap();

    let draws = gl.draw_calls();
    let textures: Vec<_> = draws.iter().map(|d| d.texture).collect();
    let instances: Vec<_> = draws.iter().map(|d| d.instances).collect();
    assert_eq!(textures, vec![Some(a.id), Some(b.id), Some(a.id)]);
    assert_eq!(instances, vec![2, 2, 1]);
    assert_eq!(batch.stats().instances, 5);
}

#[test]
fn demo_frame_draws_ceil_of_capacity() {
    let mut gl = RecordingGl::new();
    let mut config = seeded_config(1200);
    config.batch.capacity = 500;
    let mut demo = BounceDemo::new(&mut gl, config).unwrap();
    demo.populate().unwrap();
    gl.take_calls();

    let stats = demo.tick(&mut gl, &PointerState::new(), 16.0).unwrap();
    assert_eq!(stats.sprites, 1200);
    assert_eq!(stats.draw_calls, 3);
    let instances: Vec<_> = gl.draw_calls().iter().map(|d| d.instances).collect();
    assert_eq!(instances, vec![500, 500, 200]);
}

#[test]
fn every_frame_clears_then_draws() {
    let mut gl = RecordingGl::new();
    let mut demo = BounceDemo::new(&mut gl, seeded_config(10)).unwrap();
    demo.populate().unwrap();

    for _ in 0..3 {
        gl.take_calls();
        demo.tick(&mut gl, &PointerState::new(), 16.0).unwrap();
        let calls = gl.calls();
        let clear = calls.iter().position(|c| matches!(c, GlCall::Clear));
        let draw = calls.iter().position(|c| matches!(c, GlCall::DrawArraysInstanced(_)));
        assert!(clear.unwrap() < draw.unwrap());
    }
}

#[test]
fn gpu_error_aborts_frame_and_next_frame_recovers() {
    let mut gl = RecordingGl::new();
    let mut demo = BounceDemo::new(&mut gl, seeded_config(50)).unwrap();
    demo.populate().unwrap();

    gl.inject_error(GlError::OutOfMemory);
    let err = demo.tick(&mut gl, &PointerState::new(), 16.0).unwrap_err();
    assert!(matches!(err, DemoError::Batch(BatchError::Gpu(GlError::OutOfMemory))));
    assert!(!demo.batch().is_recording());

    gl.take_calls();
    let stats = demo.tick(&mut gl, &PointerState::new(), 16.0).unwrap();
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.instances, 50);
}

#[test]
fn pointer_hold_spawns_around_cursor() {
    let mut gl = RecordingGl::new();
    let mut config = seeded_config(0);
    config.spawn_per_frame = 10;
    let mut demo = BounceDemo::new(&mut gl, config).unwrap();

    let mut pointer = PointerState::new();
    pointer.move_to(400.0, 300.0);
    pointer.press();
    let stats = demo.tick(&mut gl, &pointer, 16.0).unwrap();
    assert_eq!(stats.sprites, 10);
    assert_eq!(stats.draw_calls, 1);
    pointer.clear_just();
    pointer.release();

    let stats = demo.tick(&mut gl, &pointer, 16.0).unwrap();
    assert_eq!(stats.sprites, 10);
}

#[test]
fn loader_reports_missing_file_and_uploads_the_rest() {
    let dir = std::env::temp_dir().join(format!("spritegl-batching-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let good = dir.join("atlas.png");
    RgbaImage::from_pixel(8, 8, Rgba([10, 20, 30, 255])).save(&good).unwrap();
    let missing: PathBuf = dir.join("nope.png");

    let mut gl = RecordingGl::new();
    let mut loader = TextureLoader::new().with_retries(1);
    loader.add(&good, "atlas").add(&missing, "missing");

    let mut report = None;
    loader.load(&mut gl, |r| report = Some(r));
    let report = report.unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.textures["atlas"].width, 8);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "missing");
    assert!(matches!(report.failures[0].1, LoadError::Decode { attempts: 2, .. }));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn demo_config_from_json_drives_physics() {
    let config = DemoConfig::from_json_str(
        r#"{ "initial_sprites": 5, "seed": 3, "physics": { "gravity": 0.0 } }"#,
    )
    .unwrap();
    assert_eq!(config.physics.relaunch_max, 14.0);

    let mut gl = RecordingGl::new();
    let mut demo = BounceDemo::new(&mut gl, config).unwrap();
    demo.populate().unwrap();
    let before: Vec<_> = demo.sprites().iter().map(|(_, s)| s.velocity).collect();
    demo.tick(&mut gl, &PointerState::new(), 16.0).unwrap();
    let after: Vec<_> = demo.sprites().iter().map(|(_, s)| s.velocity).collect();

    // Without gravity, speed only changes on a wall bounce (sign flip).
    for (b, a) in before.iter().zip(&after) {
        assert_eq!(b.x.abs(), a.x.abs());
    }
}

#[test]
fn demo_without_instancing_draws_the_same_windows() {
    let mut gl = RecordingGl::new();
    let mut config = seeded_config(1200);
    config.batch.capacity = 500;
    config.batch.instancing = false;
    let mut demo = BounceDemo::new(&mut gl, config).unwrap();
    demo.populate().unwrap();
    gl.take_calls();

    let stats = demo.tick(&mut gl, &PointerState::new(), 16.0).unwrap();
    assert_eq!(stats.draw_calls, 3);
    assert_eq!(stats.instances, 1200);
    let vertices: Vec<_> = gl.draw_calls().iter().map(|d| d.count).collect();
    assert_eq!(vertices, vec![3000, 3000, 1200]);
    assert!(gl.calls().iter().any(|c| matches!(c, GlCall::DrawArrays(_))));
    assert!(!gl.calls().iter().any(|c| matches!(c, GlCall::DrawArraysInstanced(_))));
}

#[test]
fn failed_draw_aborts_frame_without_counting_it() {
    let mut gl = RecordingGl::new();
    let mut demo = BounceDemo::new(&mut gl, seeded_config(20)).unwrap();
    demo.populate().unwrap();
    gl.take_calls();

    gl.fail_next_draw(GlError::OutOfMemory);
    let err = demo.tick(&mut gl, &PointerState::new(), 16.0).unwrap_err();
    assert!(matches!(err, DemoError::Batch(BatchError::Gpu(GlError::OutOfMemory))));
    assert!(!demo.batch().is_recording());
    assert_eq!(demo.batch().draw_calls(), 0);
    assert!(gl.draw_calls().is_empty());
    assert_eq!(gl.calls().iter().filter(|c| matches!(c, GlCall::DisableAttrib(_))).count(), 7);

    let stats = demo.tick(&mut gl, &PointerState::new(), 16.0).unwrap();
    assert_eq!(stats.draw_calls, 1);
}

#[test]
fn invalid_demo_config_is_a_config_error() {
    let mut gl = RecordingGl::new();
    assert!(DemoConfig::from_json_str(r#"{ "color_every": 0 }"#).is_err());

    let config = DemoConfig { color_every: 0, ..seeded_config(0) };
    let err = BounceDemo::new(&mut gl, config).err().unwrap();
    assert!(matches!(err, DemoError::Config(ConfigError::Invalid(_))), "{err}");
}

#[test]
fn loader_reports_duplicate_names() {
    let dir = std::env::temp_dir().join(format!("spritegl-duplicates-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let a = dir.join("a.png");
    let b = dir.join("b.png");
    RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255])).save(&a).unwrap();
    RgbaImage::from_pixel(8, 8, Rgba([1, 2, 3, 255])).save(&b).unwrap();

    let mut gl = RecordingGl::new();
    let mut loader = TextureLoader::new();
    loader.add(&a, "tile").add(&b, "tile");
    let mut report = None;
    loader.load(&mut gl, |r| report = Some(r));
    let report = report.unwrap();

    assert_eq!(report.textures["tile"].width, 4);
    assert!(matches!(&report.failures[..], [(name, LoadError::DuplicateName { .. })] if name == "tile"));

    std::fs::remove_dir_all(&dir).ok();
}
