//! Headless — run the bounce demo against the recording backend and log what
//! the batch submitted each frame. No window or GPU required.
//!
//! Usage: `headless [config.json] [frames]`

use spritegl::prelude::*;

fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let mut config = match args.next() {
        Some(path) if path != "-" => match DemoConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("{e}");
                std::process::exit(1);
            }
        },
        _ => DemoConfig::default(),
    };
    config.seed.get_or_insert(7);
    let frames: u32 = args.next().and_then(|n| n.parse().ok()).unwrap_or(60);

    let mut gl = RecordingGl::new();
    let mut demo = match BounceDemo::new(&mut gl, config) {
        Ok(demo) => demo,
        Err(e) => {
            log::error!("{e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = demo.populate() {
        log::error!("{e}");
        std::process::exit(1);
    }
    gl.take_calls();

    let (width, height) = demo.surface_size();
    let mut pointer = PointerState::new();
    pointer.move_to(width as f32 / 2.0, height as f32 / 2.0);
    let mut timer = FrameTimer::new();

    for frame in 0..frames {
        // Hold the pointer down for a stretch of frames in the middle.
        if frame == frames / 4 {
            pointer.press();
        } else if frame == frames / 2 {
            pointer.release();
        }

        timer.tick_with(1000.0 / 60.0);
        let stats = match demo.tick(&mut gl, &pointer, timer.delta_ms()) {
            Ok(stats) => stats,
            Err(e) => {
                log::error!("frame {frame}: {e}");
                std::process::exit(1);
            }
        };
        pointer.clear_just();

        let calls = gl.take_calls();
        log::info!(
            "frame {frame:>3}: {:>6} sprites, {} draw calls, {} GL calls",
            stats.sprites,
            stats.draw_calls,
            calls.len()
        );
    }

    println!(
        "{} frames, {} sprites, {} draw calls in the last frame",
        timer.frame_count(),
        demo.sprites().len(),
        demo.batch().draw_calls()
    );
}
