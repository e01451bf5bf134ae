//! One engine instance: backend, scene, camera, parameters and frame loop.
//!
//! All state lives in the [`Engine`] value. Dropping it releases every tracked
//! resource, so a session can tear one down and bootstrap another with a
//! different backend kind.

use flurry_common::{BackendError, BackendKind, FlurryResult};
use flurry_kernel::{BackendProvider, CameraRig, RendererBackend, ResourceTracker, SceneGraph};
use tracing::{debug, error, info};

use crate::config::EngineConfig;
use crate::overlay::{ControlsPanel, StatsPanel};
use crate::panel::ParameterPanel;
use crate::scheduler::{FrameContext, FrameHost, FrameScheduler, TickReport};

/// A fully built snowfall scene bound to one renderer.
#[derive(Debug)]
pub struct Engine<B: RendererBackend> {
    backend: B,
    scene: SceneGraph,
    rig: CameraRig,
    panel: ParameterPanel,
    scheduler: FrameScheduler,
    tracker: ResourceTracker,
    width: u32,
    height: u32,
}

impl<B: RendererBackend> Engine<B> {
    /// Builds an engine for `config.backend`.
    ///
    /// Availability is checked before anything is allocated. An unavailable
    /// kind fails with [`BackendError::Unsupported`] and leaves `tracker`
    /// untouched.
    pub fn bootstrap<P>(
        provider: &mut P,
        config: &EngineConfig,
        tracker: ResourceTracker,
    ) -> FlurryResult<Self>
    where
        P: BackendProvider<Backend = B>,
    {
        let kind = config.backend;
        if !provider.available(kind) {
            error!("{} renderer is not available on this platform", kind.display_name());
            return Err(BackendError::Unsupported { kind }.into());
        }

        let (width, height) = (config.window_width, config.window_height);
        let backend = provider
            .initialize(kind, width, height, &tracker)
            .map_err(|e| {
                error!("Failed to create {} renderer: {e}", kind.display_name());
                e
            })?;
        info!("Created {} renderer ({width}x{height})", kind.display_name());

        let mut scene = SceneGraph::build(
            *backend.profile(),
            config.variant.field_profile(),
            config.seed,
            &tracker,
        );
        scene.load_assets(&config.assets.to_scene_assets());

        let rig = CameraRig::new(width, height, &tracker);
        let panel = ParameterPanel::new(config.variant, config.particle_count, config.fall_speed);
        scene.particles_mut().rebuild(panel.particle_count());

        Ok(Self {
            backend,
            scene,
            rig,
            panel,
            scheduler: FrameScheduler::new(config.timing_window),
            tracker,
            width,
            height,
        })
    }

    /// Starts the frame loop. Returns false if it was already running.
    pub fn start(&mut self, host: &mut dyn FrameHost) -> bool {
        self.scheduler.start(host)
    }

    /// Stops the frame loop. Returns false if it was already stopped.
    pub fn stop(&mut self, host: &mut dyn FrameHost) -> bool {
        self.scheduler.stop(host)
    }

    /// Runs one frame. Returns `None` while stopped.
    pub fn tick(&mut self, host: &mut dyn FrameHost) -> FlurryResult<Option<TickReport>> {
        let ctx = FrameContext {
            backend: &mut self.backend,
            scene: &mut self.scene,
            rig: &mut self.rig,
            fall_speed: self.panel.fall_speed(),
        };
        self.scheduler.tick(ctx, host)
    }

    /// Writes the particle count and rebuilds the field if it changed.
    pub fn set_particle_count(&mut self, count: u32) -> Option<u32> {
        let changed = self.panel.set_particle_count(count);
        if let Some(count) = changed {
            self.rebuild(count);
        }
        changed
    }

    /// Moves the particle count by control steps and rebuilds if it changed.
    pub fn nudge_particle_count(&mut self, steps: i32) -> Option<u32> {
        let changed = self.panel.nudge_particle_count(steps);
        if let Some(count) = changed {
            self.rebuild(count);
        }
        changed
    }

    /// Writes the fall speed read by the next tick.
    pub fn set_fall_speed(&mut self, speed: f32) -> f32 {
        self.panel.set_fall_speed(speed)
    }

    /// Moves the fall speed by control steps.
    pub fn nudge_fall_speed(&mut self, steps: i32) -> f32 {
        self.panel.nudge_fall_speed(steps)
    }

    fn rebuild(&mut self, count: u32) {
        self.scene.particles_mut().rebuild(count);
        debug!("Particle count changed to {count}");
    }

    /// Updates the camera aspect and the render target.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.width = width;
        self.height = height;
        self.rig.resize(width, height);
        self.backend.resize(width, height);
    }

    /// Queues an orbit rotation from a pointer drag.
    pub fn orbit(&mut self, dx: f32, dy: f32) {
        self.rig.controls.rotate(dx, dy, self.height);
    }

    /// Queues a dolly. Positive steps move towards the target.
    pub fn dolly(&mut self, steps: f32) {
        self.rig.controls.dolly(steps);
    }

    /// Overlay elements for this engine.
    #[must_use]
    pub fn overlays(&self) -> (StatsPanel, ControlsPanel) {
        (StatsPanel::new(self.kind()), ControlsPanel::new(&self.panel))
    }

    /// Backend kind.
    #[must_use]
    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Renderer.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Scene graph.
    #[must_use]
    pub const fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    /// Camera rig.
    #[must_use]
    pub const fn rig(&self) -> &CameraRig {
        &self.rig
    }

    /// Parameter panel.
    #[must_use]
    pub const fn panel(&self) -> &ParameterPanel {
        &self.panel
    }

    /// Frame scheduler.
    #[must_use]
    pub const fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    /// Resource tracker shared with the scene.
    #[must_use]
    pub const fn tracker(&self) -> &ResourceTracker {
        &self.tracker
    }

    /// Viewport size.
    #[must_use]
    pub const fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
