//! Application lifecycle management.
//!
//! Owns the window and the [`Session`], turns winit redraw requests into frame
//! callbacks, and routes input commands to the session.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use flurry_kernel::WgpuProvider;
use tracing::{error, info, warn};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use crate::config::EngineConfig;
use crate::input::{Command, InputHandler};
use crate::scheduler::{FrameHost, FrameRequest};
use crate::session::{Session, APP_TITLE};

/// Minimum time between window title refreshes.
const TITLE_INTERVAL: Duration = Duration::from_millis(500);

/// Frame host backed by winit redraw requests.
///
/// winit cannot withdraw a redraw request, so cancelling only forgets the
/// token and the next `RedrawRequested` is ignored.
#[derive(Debug, Default)]
struct WindowFrameHost {
    window: Option<Arc<Window>>,
    next_id: u64,
    pending: Option<FrameRequest>,
}

impl WindowFrameHost {
    /// Consumes the pending request when its redraw arrives.
    fn take_pending(&mut self) -> Option<FrameRequest> {
        self.pending.take()
    }
}

impl FrameHost for WindowFrameHost {
    fn request_frame(&mut self) -> FrameRequest {
        self.next_id += 1;
        let request = FrameRequest::new(self.next_id);
        self.pending = Some(request);
        if let Some(window) = &self.window {
            window.request_redraw();
        }
        request
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        if self.pending == Some(request) {
            self.pending = None;
        }
    }
}

type WindowSession = Session<WgpuProvider<Arc<Window>>>;

/// Application state machine.
struct FlurryApp {
    /// Configuration at startup
    config: EngineConfig,
    /// Window handle (created after resume)
    window: Option<Arc<Window>>,
    /// Engine session (created with the window)
    session: Option<WindowSession>,
    /// Redraw-driven frame host
    host: WindowFrameHost,
    /// Input handler
    input: InputHandler,
    /// Last window title refresh
    last_title: Instant,
}

impl FlurryApp {
    /// Creates a new application instance.
    fn new(config: EngineConfig) -> Self {
        Self {
            config,
            window: None,
            session: None,
            host: WindowFrameHost::default(),
            input: InputHandler::new(),
            last_title: Instant::now(),
        }
    }

    /// Runs the pending frame, if the redraw belongs to one.
    fn redraw(&mut self) {
        if self.host.take_pending().is_none() {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };

        if let Err(e) = session.tick(&mut self.host) {
            error!("Rendering stopped: {e}");
            self.refresh_title(true);
            return;
        }
        self.refresh_title(false);
    }

    fn apply(&mut self, command: Command, event_loop: &ActiveEventLoop) {
        let Some(session) = self.session.as_mut() else {
            if command == Command::Quit {
                event_loop.exit();
            }
            return;
        };

        match command {
            Command::Orbit { dx, dy } => session.orbit(dx, dy),
            Command::Dolly(steps) => session.dolly(steps),
            Command::SelectBackend(kind) => {
                if let Err(e) = session.bootstrap(kind, &mut self.host) {
                    warn!("Backend switch failed: {e}");
                }
                self.refresh_title(true);
            },
            Command::ToggleBackend => {
                let kind = session.config().backend.toggled();
                if let Err(e) = session.bootstrap(kind, &mut self.host) {
                    warn!("Backend switch failed: {e}");
                }
                self.refresh_title(true);
            },
            Command::NudgeParticleCount(steps) => {
                session.nudge_particle_count(steps);
                self.refresh_title(true);
            },
            Command::NudgeFallSpeed(steps) => {
                session.nudge_fall_speed(steps);
                self.refresh_title(true);
            },
            Command::Quit => {
                session.teardown(&mut self.host);
                event_loop.exit();
            },
        }
    }

    fn refresh_title(&mut self, force: bool) {
        if !force && self.last_title.elapsed() < TITLE_INTERVAL {
            return;
        }
        if let (Some(window), Some(session)) = (&self.window, &self.session) {
            window.set_title(&session.title());
            self.last_title = Instant::now();
        }
    }
}

impl ApplicationHandler for FlurryApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        info!("Application resumed, creating window...");

        let window_attrs = Window::default_attributes()
            .with_title(APP_TITLE)
            .with_inner_size(PhysicalSize::new(
                self.config.window_width,
                self.config.window_height,
            ));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                error!("Failed to create window: {e}");
                event_loop.exit();
                return;
            },
        };

        let size = window.inner_size();
        let mut config = self.config.clone();
        if size.width > 0 && size.height > 0 {
            config.window_width = size.width;
            config.window_height = size.height;
        }

        let provider =
            WgpuProvider::new(Arc::clone(&window), config.vsync, config.gpu_validation);
        let mut session = Session::new(provider, config.clone());
        self.host.window = Some(Arc::clone(&window));

        if let Err(e) = session.bootstrap(config.backend, &mut self.host) {
            // The window stays open with the fallback message in its title.
            error!("Renderer unavailable: {e}");
        }

        self.window = Some(window);
        self.session = Some(session);
        self.refresh_title(true);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(command) = self.input.handle_event(&event) {
            self.apply(command, event_loop);
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down...");
                if let Some(session) = self.session.as_mut() {
                    session.teardown(&mut self.host);
                }
                event_loop.exit();
            },
            WindowEvent::Resized(new_size) => {
                if let Some(session) = self.session.as_mut() {
                    session.resize(new_size.width, new_size.height);
                }
            },
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {},
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        // The session holds the surface; drop it before the window.
        self.session = None;
        self.host.window = None;
        self.window = None;
    }
}

/// Runs the windowed viewer until the window closes.
pub fn run(config: EngineConfig) -> Result<()> {
    info!("Configuration loaded:");
    info!("  Window: {}x{}", config.window_width, config.window_height);
    info!("  Backend: {}", config.backend.display_name());
    info!("  Variant: {:?}", config.variant);

    info!("Creating event loop...");
    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = FlurryApp::new(config);

    info!("Starting event loop...");
    event_loop
        .run_app(&mut app)
        .context("Event loop terminated with an error")?;

    Ok(())
}
