//! Frame scheduling and the per-tick pipeline.
//!
//! The scheduler never loops on its own. Each tick ends by asking the
//! [`FrameHost`] for the next display refresh, and the host calls back into
//! [`FrameScheduler::tick`] when it arrives. Stopping cancels the outstanding
//! request, so a discarded engine leaves no orphaned callback behind.

use std::time::Instant;

use flurry_common::FlurryResult;
use flurry_kernel::{CameraRig, RendererBackend, SceneGraph};
use tracing::{debug, error, info};

use crate::timing::FrameTimingBuffer;

/// Lifecycle of one engine's frame loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunningState {
    /// No frame is scheduled
    #[default]
    Stopped,
    /// A frame is scheduled or being processed
    Running,
}

/// Token for one pending "next refresh" callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRequest(u64);

impl FrameRequest {
    /// Creates a request token.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(&self) -> u64 {
        self.0
    }
}

/// Platform primitive that runs the frame callback on the next display refresh.
pub trait FrameHost {
    /// Registers interest in the next refresh.
    fn request_frame(&mut self) -> FrameRequest;

    /// Withdraws a previously registered request.
    fn cancel_frame(&mut self, request: FrameRequest);
}

/// Frame host driven by hand, for tests and headless runs.
#[derive(Debug, Default)]
pub struct ManualFrameHost {
    next_id: u64,
    pending: Option<FrameRequest>,
    registrations: u64,
    cancellations: u64,
}

impl ManualFrameHost {
    /// Creates an idle host.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates a display refresh. Returns the request being serviced, if any.
    pub fn fire(&mut self) -> Option<FrameRequest> {
        self.pending.take()
    }

    /// Returns true if a request is outstanding.
    #[must_use]
    pub const fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Total requests ever registered.
    #[must_use]
    pub const fn registrations(&self) -> u64 {
        self.registrations
    }

    /// Total requests cancelled.
    #[must_use]
    pub const fn cancellations(&self) -> u64 {
        self.cancellations
    }
}

impl FrameHost for ManualFrameHost {
    fn request_frame(&mut self) -> FrameRequest {
        self.next_id += 1;
        self.registrations += 1;
        let request = FrameRequest::new(self.next_id);
        self.pending = Some(request);
        request
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        if self.pending == Some(request) {
            self.pending = None;
            self.cancellations += 1;
        }
    }
}

/// Everything one tick reads and mutates.
#[derive(Debug)]
pub struct FrameContext<'a, B: ?Sized> {
    /// Renderer
    pub backend: &'a mut B,
    /// Scene to advance and submit
    pub scene: &'a mut SceneGraph,
    /// Camera and controls
    pub rig: &'a mut CameraRig,
    /// Current fall speed
    pub fall_speed: f32,
}

/// Outcome of one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    /// Zero-based index of this frame
    pub frame: u64,
    /// Wall-clock time of controls, simulation and submit
    pub elapsed_ms: f64,
    /// Time since the previous tick began; `None` on the first tick after start
    pub interval_ms: Option<f64>,
    /// Particles recycled to the ceiling
    pub recycled: usize,
    /// Textures installed this tick
    pub textures_installed: usize,
    /// Window mean, when this tick completed a window
    pub window_mean_ms: Option<f64>,
}

/// Owns the running state and the frame-time statistics.
#[derive(Debug)]
pub struct FrameScheduler {
    state: RunningState,
    pending: Option<FrameRequest>,
    timing: FrameTimingBuffer,
    frames: u64,
    last_mean_ms: Option<f64>,
    last_tick_at: Option<Instant>,
}

impl FrameScheduler {
    /// Creates a stopped scheduler averaging over `timing_window` frames.
    #[must_use]
    pub fn new(timing_window: usize) -> Self {
        Self {
            state: RunningState::Stopped,
            pending: None,
            timing: FrameTimingBuffer::new(timing_window),
            frames: 0,
            last_mean_ms: None,
            last_tick_at: None,
        }
    }

    /// Starts the loop. Returns false (and registers nothing) if already running.
    pub fn start(&mut self, host: &mut dyn FrameHost) -> bool {
        if self.state == RunningState::Running {
            debug!("Frame loop already running");
            return false;
        }
        self.state = RunningState::Running;
        self.last_tick_at = None;
        self.pending = Some(host.request_frame());
        info!("Frame loop started");
        true
    }

    /// Stops the loop and cancels the pending frame. Returns false if already stopped.
    pub fn stop(&mut self, host: &mut dyn FrameHost) -> bool {
        if self.state == RunningState::Stopped {
            return false;
        }
        self.state = RunningState::Stopped;
        if let Some(request) = self.pending.take() {
            host.cancel_frame(request);
        }
        info!("Frame loop stopped after {} frames", self.frames);
        true
    }

    /// Runs one frame if the loop is running.
    ///
    /// A submit failure stops the loop and is returned to the caller.
    pub fn tick<B>(
        &mut self,
        ctx: FrameContext<'_, B>,
        host: &mut dyn FrameHost,
    ) -> FlurryResult<Option<TickReport>>
    where
        B: RendererBackend + ?Sized,
    {
        if self.state != RunningState::Running {
            return Ok(None);
        }

        let frame = self.frames;
        let now = Instant::now();
        let interval_ms = self
            .last_tick_at
            .replace(now)
            .map(|previous| now.duration_since(previous).as_secs_f64() * 1000.0);
        let textures_installed = ctx.scene.poll_assets(&mut *ctx.backend, frame);

        let start = Instant::now();
        ctx.rig.update();
        let recycled = ctx.scene.particles_mut().tick(ctx.fall_speed);
        if let Err(e) = ctx.backend.submit(ctx.scene, ctx.rig) {
            error!("Frame {frame} failed, stopping: {e}");
            self.stop(host);
            return Err(e.into());
        }
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        let window_mean_ms = self.timing.record(elapsed_ms);
        if let Some(mean) = window_mean_ms {
            info!(
                "Average frame time over {} frames: {mean:.3} ms",
                self.timing.capacity()
            );
            self.last_mean_ms = Some(mean);
        }

        self.frames += 1;
        if self.state == RunningState::Running {
            self.pending = Some(host.request_frame());
        }

        Ok(Some(TickReport {
            frame,
            elapsed_ms,
            interval_ms,
            recycled,
            textures_installed,
            window_mean_ms,
        }))
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> RunningState {
        self.state
    }

    /// Returns true while running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == RunningState::Running
    }

    /// Frames completed.
    #[must_use]
    pub const fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Most recently reported window mean.
    #[must_use]
    pub const fn last_mean_ms(&self) -> Option<f64> {
        self.last_mean_ms
    }

    /// Frame-time statistics.
    #[must_use]
    pub const fn timing(&self) -> &FrameTimingBuffer {
        &self.timing
    }
}
