//! Engine lifecycle across backend switches.
//!
//! A [`Session`] owns the backend provider, the overlay host and at most one
//! [`Engine`]. Re-bootstrapping stops and drops the current engine, detaches
//! its overlays, then builds, attaches and starts the replacement.

use flurry_common::{BackendKind, FlurryError, FlurryResult};
use flurry_kernel::{BackendProvider, HeadlessProvider, ResourceTracker};
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::overlay::{Overlay, OverlayHost};
use crate::scheduler::{FrameHost, ManualFrameHost, TickReport};

/// Window title prefix.
pub const APP_TITLE: &str = "Flurry";

/// Owner of the active engine and its display elements.
#[derive(Debug)]
pub struct Session<P: BackendProvider> {
    provider: P,
    config: EngineConfig,
    tracker: ResourceTracker,
    overlays: OverlayHost,
    engine: Option<Engine<P::Backend>>,
    fallback: Option<String>,
    bootstraps: u32,
}

impl<P: BackendProvider> Session<P> {
    /// Creates a session with no engine.
    #[must_use]
    pub fn new(provider: P, config: EngineConfig) -> Self {
        Self {
            provider,
            config,
            tracker: ResourceTracker::new(),
            overlays: OverlayHost::new(),
            engine: None,
            fallback: None,
            bootstraps: 0,
        }
    }

    /// Tears down the current engine and builds one for `kind`.
    ///
    /// On failure no engine is active and [`Session::fallback_message`]
    /// describes why.
    pub fn bootstrap(&mut self, kind: BackendKind, host: &mut dyn FrameHost) -> FlurryResult<()> {
        self.teardown(host);
        self.config.backend = kind;
        self.bootstraps += 1;

        let built = Engine::bootstrap(&mut self.provider, &self.config, self.tracker.clone());
        let mut engine = match built {
            Ok(engine) => engine,
            Err(e) => {
                self.fallback = Some(fallback_text(kind, &e));
                return Err(e);
            },
        };

        let (stats, controls) = engine.overlays();
        self.overlays.attach(Overlay::Stats(stats));
        self.overlays.attach(Overlay::Gui(controls));
        engine.start(host);

        self.fallback = None;
        self.engine = Some(engine);
        info!("Session running on {} renderer", kind.display_name());
        Ok(())
    }

    /// Stops and drops the current engine and removes its overlays.
    pub fn teardown(&mut self, host: &mut dyn FrameHost) {
        if let Some(mut engine) = self.engine.take() {
            engine.stop(host);
            info!("Tearing down {} renderer", engine.kind().display_name());
        }
        self.overlays.clear();
    }

    /// Runs one frame on the active engine.
    pub fn tick(&mut self, host: &mut dyn FrameHost) -> FlurryResult<Option<TickReport>> {
        let Some(engine) = self.engine.as_mut() else {
            return Ok(None);
        };

        let report = engine.tick(host)?;
        if let Some(report) = &report {
            let particles = engine.scene().particles().len();
            if let Some(stats) = self.overlays.stats_mut() {
                stats.record(report, particles);
            }
        }
        Ok(report)
    }

    /// Writes the particle count on the active engine.
    pub fn set_particle_count(&mut self, count: u32) -> Option<u32> {
        let changed = self.engine.as_mut()?.set_particle_count(count);
        self.refresh_controls();
        changed
    }

    /// Nudges the particle count on the active engine.
    pub fn nudge_particle_count(&mut self, steps: i32) -> Option<u32> {
        let changed = self.engine.as_mut()?.nudge_particle_count(steps);
        self.refresh_controls();
        changed
    }

    /// Writes the fall speed on the active engine.
    pub fn set_fall_speed(&mut self, speed: f32) -> Option<f32> {
        let speed = self.engine.as_mut()?.set_fall_speed(speed);
        self.refresh_controls();
        Some(speed)
    }

    /// Nudges the fall speed on the active engine.
    pub fn nudge_fall_speed(&mut self, steps: i32) -> Option<f32> {
        let speed = self.engine.as_mut()?.nudge_fall_speed(steps);
        self.refresh_controls();
        Some(speed)
    }

    fn refresh_controls(&mut self) {
        let Some(engine) = self.engine.as_ref() else {
            return;
        };
        self.config.particle_count = engine.panel().particle_count();
        self.config.fall_speed = engine.panel().fall_speed();
        if let Some(controls) = self.overlays.controls_mut() {
            controls.refresh(engine.panel());
        }
    }

    /// Resizes the active engine. The size is kept for the next bootstrap.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.window_width = width;
        self.config.window_height = height;
        if let Some(engine) = self.engine.as_mut() {
            engine.resize(width, height);
        }
    }

    /// Queues an orbit rotation.
    pub fn orbit(&mut self, dx: f32, dy: f32) {
        if let Some(engine) = self.engine.as_mut() {
            engine.orbit(dx, dy);
        }
    }

    /// Queues a dolly.
    pub fn dolly(&mut self, steps: f32) {
        if let Some(engine) = self.engine.as_mut() {
            engine.dolly(steps);
        }
    }

    /// Window title for the current state.
    #[must_use]
    pub fn title(&self) -> String {
        match &self.fallback {
            Some(message) => format!("{APP_TITLE} | {message}"),
            None => self.overlays.compose_title(APP_TITLE),
        }
    }

    /// Active engine.
    #[must_use]
    pub const fn engine(&self) -> Option<&Engine<P::Backend>> {
        self.engine.as_ref()
    }

    /// Returns true while an engine is running its frame loop.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.engine.as_ref().is_some_and(|e| e.scheduler().is_running())
    }

    /// Message shown instead of the scene when the last bootstrap failed.
    #[must_use]
    pub fn fallback_message(&self) -> Option<&str> {
        self.fallback.as_deref()
    }

    /// Attached overlay elements.
    #[must_use]
    pub const fn overlays(&self) -> &OverlayHost {
        &self.overlays
    }

    /// Tracker shared by every engine in this session.
    #[must_use]
    pub const fn tracker(&self) -> &ResourceTracker {
        &self.tracker
    }

    /// Current configuration, including live parameter values.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Backend provider.
    #[must_use]
    pub const fn provider(&self) -> &P {
        &self.provider
    }

    /// Number of bootstrap attempts.
    #[must_use]
    pub const fn bootstraps(&self) -> u32 {
        self.bootstraps
    }
}

fn fallback_text(kind: BackendKind, error: &FlurryError) -> String {
    match error {
        FlurryError::Backend(e) if e.is_unsupported() => format!(
            "{} rendering is not supported on this device",
            kind.display_name()
        ),
        _ => format!("Failed to start {} renderer: {error}", kind.display_name()),
    }
}

/// Result of a headless run.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessSummary {
    /// Backend kind that ran
    pub backend: BackendKind,
    /// Frames completed
    pub frames: u64,
    /// Particles alive at the end
    pub particles: usize,
    /// Last reported window mean
    pub last_mean_ms: Option<f64>,
}

/// Runs `frames` ticks against the headless backend without opening a window.
pub fn run_headless(config: &EngineConfig, frames: u64) -> FlurryResult<HeadlessSummary> {
    let mut host = ManualFrameHost::new();
    let mut session = Session::new(HeadlessProvider::new(), config.clone());
    session.bootstrap(config.backend, &mut host)?;

    let mut completed = 0;
    while completed < frames && host.fire().is_some() {
        if session.tick(&mut host)?.is_some() {
            completed += 1;
        }
    }

    if completed < frames {
        warn!("Headless run ended early after {completed} of {frames} frames");
    }

    let (particles, last_mean_ms) = session.engine().map_or((0, None), |e| {
        (e.scene().particles().len(), e.scheduler().last_mean_ms())
    });
    session.teardown(&mut host);

    info!("Headless run complete: {completed} frames, {particles} particles");
    Ok(HeadlessSummary {
        backend: config.backend,
        frames: completed,
        particles,
        last_mean_ms,
    })
}
