//! Bounce — thousands of bouncing sprites, drawn by one instanced batch.
//!
//! Hold the left mouse button to spawn more. Optional first argument: a JSON
//! config file (see `DemoConfig`).

use spritegl::prelude::*;

fn main() {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => match DemoConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("{e}");
                std::process::exit(1);
            }
        },
        None => DemoConfig::default(),
    };

    if let Err(e) = spritegl::window::run(config) {
        log::error!("{e}");
        std::process::exit(1);
    }
}
