//! Headless renderer backend.
//!
//! Performs no GPU work. Every submission is recorded into a shared
//! [`SubmissionLog`] so tests and the `headless_frames` benchmark can inspect
//! what would have been drawn. Availability is configurable per kind to
//! exercise capability failures.

use std::sync::Arc;

use flurry_common::{BackendError, BackendKind};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::asset::{DecodedImage, TextureSlot};
use crate::backend::{BackendProfile, BackendProvider, RendererBackend};
use crate::camera::CameraRig;
use crate::resource::{GpuResource, ResourceKind, ResourceTracker};
use crate::scene::SceneGraph;

/// One texture upload as seen by the headless backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRecord {
    /// Target slot
    pub slot: TextureSlot,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// First RGBA pixel (top-left as uploaded)
    pub first_pixel: [u8; 4],
}

/// What a headless backend has been asked to draw.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionLog {
    /// Frames submitted
    pub frames: u64,
    /// Particles in the most recent frame
    pub particle_count: usize,
    /// Whether the sky background was present in the most recent frame
    pub background_installed: bool,
    /// Light intensity in the most recent frame
    pub light_intensity: f32,
    /// Camera position in the most recent frame
    pub camera_position: [f32; 3],
    /// Texture uploads in order
    pub uploads: Vec<UploadRecord>,
    /// Current render target size
    pub size: (u32, u32),
}

/// Shared handle to a submission log.
pub type SharedLog = Arc<Mutex<SubmissionLog>>;

/// Provider of headless backends.
#[derive(Debug, Default)]
pub struct HeadlessProvider {
    unavailable: Vec<BackendKind>,
    fail_submit_after: Option<u64>,
    initializations: u32,
}

impl HeadlessProvider {
    /// Provider with both kinds available.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a kind as unavailable.
    #[must_use]
    pub fn without(mut self, kind: BackendKind) -> Self {
        if !self.unavailable.contains(&kind) {
            self.unavailable.push(kind);
        }
        self
    }

    /// Backends created from now on fail every submission after `frames` successes.
    #[must_use]
    pub const fn failing_after(mut self, frames: u64) -> Self {
        self.fail_submit_after = Some(frames);
        self
    }

    /// Number of successful initializations.
    #[must_use]
    pub const fn initializations(&self) -> u32 {
        self.initializations
    }
}

impl BackendProvider for HeadlessProvider {
    type Backend = HeadlessBackend;

    fn available(&self, kind: BackendKind) -> bool {
        !self.unavailable.contains(&kind)
    }

    fn initialize(
        &mut self,
        kind: BackendKind,
        width: u32,
        height: u32,
        tracker: &ResourceTracker,
    ) -> Result<HeadlessBackend, BackendError> {
        if !self.available(kind) {
            return Err(BackendError::Unsupported { kind });
        }

        self.initializations += 1;
        info!("Headless {kind} backend initialized ({width}x{height})");

        let log = SubmissionLog {
            size: (width, height),
            ..SubmissionLog::default()
        };
        Ok(HeadlessBackend {
            kind,
            profile: BackendProfile::for_kind(kind),
            tracker: tracker.clone(),
            log: Arc::new(Mutex::new(log)),
            fail_submit_after: self.fail_submit_after,
        })
    }
}

/// Backend that records instead of rendering.
#[derive(Debug)]
pub struct HeadlessBackend {
    kind: BackendKind,
    profile: BackendProfile,
    tracker: ResourceTracker,
    log: SharedLog,
    fail_submit_after: Option<u64>,
}

impl HeadlessBackend {
    /// Shared handle to this backend's log.
    #[must_use]
    pub fn log(&self) -> SharedLog {
        Arc::clone(&self.log)
    }
}

impl RendererBackend for HeadlessBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn profile(&self) -> &BackendProfile {
        &self.profile
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.log.lock().size = (width, height);
    }

    fn upload_texture(
        &mut self,
        slot: TextureSlot,
        image: &DecodedImage,
    ) -> Result<GpuResource, BackendError> {
        let mut first_pixel = [0; 4];
        if let Some(pixel) = image.rgba.get(..4) {
            first_pixel.copy_from_slice(pixel);
        }

        self.log.lock().uploads.push(UploadRecord {
            slot,
            width: image.width,
            height: image.height,
            first_pixel,
        });
        debug!("Headless upload: {}", slot.display_name());
        Ok(self.tracker.acquire(ResourceKind::Texture))
    }

    fn submit(&mut self, scene: &SceneGraph, rig: &CameraRig) -> Result<(), BackendError> {
        let mut log = self.log.lock();

        if let Some(limit) = self.fail_submit_after {
            if log.frames >= limit {
                return Err(BackendError::Submit(format!(
                    "headless backend configured to fail after {limit} frames"
                )));
            }
        }

        log.frames += 1;
        log.particle_count = scene.particles().len();
        log.background_installed = scene.skybox().has_background();
        log.light_intensity = scene.lights()[0].intensity;
        log.camera_position = rig.camera.position.to_array();
        Ok(())
    }
}
