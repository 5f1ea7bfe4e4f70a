//! Window management via winit.
//!
//! Implements [`winit::application::ApplicationHandler`] to drive the demo:
//! window creation, pointer forwarding, resize, and one [`BounceDemo::tick`]
//! plus one [`WgpuGl::present`] per redraw.

use std::fmt;
use std::sync::Arc;

use winit::application::ApplicationHandler;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::window::{Window, WindowId};

use crate::config::DemoConfig;
use crate::demo::{BounceDemo, DemoError};
use crate::gl::GlError;
use crate::input::PointerState;
use crate::render::{GpuContext, WgpuGl};
use crate::time::FrameTimer;

#[derive(Debug)]
pub enum RunError {
    EventLoop(winit::error::EventLoopError),
    Window(winit::error::OsError),
    Gpu(GlError),
    Demo(DemoError),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::EventLoop(e) => write!(f, "event loop: {e}"),
            RunError::Window(e) => write!(f, "create window: {e}"),
            RunError::Gpu(e) => write!(f, "gpu: {e}"),
            RunError::Demo(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for RunError {}

impl From<winit::error::EventLoopError> for RunError {
    fn from(e: winit::error::EventLoopError) -> Self {
        RunError::EventLoop(e)
    }
}

/// Open a window and run the bouncing-sprites demo until it is closed.
pub fn run(config: DemoConfig) -> Result<(), RunError> {
    let event_loop = EventLoop::new()?;
    let mut app = WinitApp::new(config);
    event_loop.run_app(&mut app)?;
    match app.error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Everything that exists only once the window does.
struct Running {
    window: Arc<Window>,
    gl: WgpuGl,
    demo: BounceDemo,
}

/// The application state that winit drives.
struct WinitApp {
    config: DemoConfig,
    running: Option<Running>,
    pointer: PointerState,
    timer: FrameTimer,
    error: Option<RunError>,
    #[cfg(feature = "diagnostics")]
    diag: Option<crate::diag::DiagSender>,
}

impl WinitApp {
    fn new(config: DemoConfig) -> Self {
        Self {
            config,
            running: None,
            pointer: PointerState::new(),
            timer: FrameTimer::new(),
            error: None,
            #[cfg(feature = "diagnostics")]
            diag: crate::diag::DiagSender::new(),
        }
    }

    fn start(&self, event_loop: &ActiveEventLoop) -> Result<Running, RunError> {
        let attrs = Window::default_attributes()
            .with_title("spritegl: bounce")
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window_width,
                self.config.window_height,
            ));
        let window = Arc::new(event_loop.create_window(attrs).map_err(RunError::Window)?);

        let gpu = GpuContext::new(window.clone()).map_err(RunError::Gpu)?;
        let mut gl = WgpuGl::new(gpu);

        let mut demo = BounceDemo::new(&mut gl, self.config.clone()).map_err(RunError::Demo)?;
        let size = window.inner_size();
        demo.resize(size.width, size.height);
        demo.populate().map_err(RunError::Demo)?;
        log::info!("{} sprites, batch capacity {}", demo.sprites().len(), demo.batch().capacity());

        Ok(Running { window, gl, demo })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: RunError) {
        log::error!("{err}");
        self.error = Some(err);
        event_loop.exit();
    }
}

impl ApplicationHandler for WinitApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.running.is_some() {
            return;
        }
        match self.start(event_loop) {
            Ok(running) => {
                running.window.request_redraw();
                self.running = Some(running);
            }
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Window close requested, exiting.");
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                if let Some(running) = &mut self.running {
                    running.gl.resize_surface(size.width, size.height);
                    running.demo.resize(size.width, size.height);
                }
            }

            WindowEvent::MouseInput {
                button: MouseButton::Left,
                state,
                ..
            } => match state {
                ElementState::Pressed => self.pointer.press(),
                ElementState::Released => self.pointer.release(),
            },

            WindowEvent::CursorMoved { position, .. } => {
                self.pointer.move_to(position.x as f32, position.y as f32);
            }

            WindowEvent::RedrawRequested => {
                let Some(running) = &mut self.running else {
                    return;
                };
                let dt_ms = self.timer.tick();

                let frame = running
                    .demo
                    .tick(&mut running.gl, &self.pointer, dt_ms)
                    .map_err(RunError::Demo)
                    .and_then(|stats| running.gl.present().map(|()| stats).map_err(RunError::Gpu));
                self.pointer.clear_just();

                match frame {
                    Ok(_stats) => {
                        #[cfg(feature = "diagnostics")]
                        {
                            if let Some(diag) = &mut self.diag {
                                diag.send(&self.timer, &_stats, running.demo.batch().capacity());
                            }
                        }
                        running.window.request_redraw();
                    }
                    Err(err) => self.fail(event_loop, err),
                }
            }

            _ => {}
        }
    }
}
