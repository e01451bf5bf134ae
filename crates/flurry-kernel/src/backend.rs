//! Renderer backend abstraction.
//!
//! A [`BackendProvider`] answers availability and constructs backends; a
//! [`RendererBackend`] owns the GPU side of one engine instance. The two backend
//! kinds run the same scene and differ only in the data carried by
//! [`BackendProfile`].

use flurry_common::{BackendError, BackendKind};

use crate::asset::{DecodedImage, TextureSlot};
use crate::camera::CameraRig;
use crate::resource::{GpuResource, ResourceTracker};
use crate::scene::SceneGraph;

/// Per-kind rendering policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackendProfile {
    /// Multiplier applied to directional light intensity.
    pub light_intensity_scale: f32,
    /// Upload the skybox with rows reversed.
    pub skybox_flip_y: bool,
    /// Apply tone mapping to the final colour.
    pub tone_mapping: bool,
}

impl BackendProfile {
    /// Profile for the GPU compute backend: brighter lights to compensate for
    /// tone mapping, unflipped sky.
    pub const GPU_COMPUTE: Self = Self {
        light_intensity_scale: 3.0,
        skybox_flip_y: false,
        tone_mapping: true,
    };

    /// Profile for the legacy backend: unit light intensity, flipped sky.
    pub const LEGACY: Self = Self {
        light_intensity_scale: 1.0,
        skybox_flip_y: true,
        tone_mapping: false,
    };

    /// Profile for a backend kind.
    #[must_use]
    pub const fn for_kind(kind: BackendKind) -> Self {
        match kind {
            BackendKind::GpuCompute => Self::GPU_COMPUTE,
            BackendKind::Legacy => Self::LEGACY,
        }
    }
}

/// One initialized renderer.
pub trait RendererBackend {
    /// Kind this backend was initialized as.
    fn kind(&self) -> BackendKind;

    /// Rendering policy for this backend.
    fn profile(&self) -> &BackendProfile;

    /// Resizes the render target.
    fn resize(&mut self, width: u32, height: u32);

    /// Uploads a texture for a scene slot, replacing any previous texture in
    /// that slot. The returned handle accounts for the upload.
    fn upload_texture(
        &mut self,
        slot: TextureSlot,
        image: &DecodedImage,
    ) -> Result<GpuResource, BackendError>;

    /// Renders one frame of the scene from the rig's camera.
    fn submit(&mut self, scene: &SceneGraph, rig: &CameraRig) -> Result<(), BackendError>;
}

/// Factory for renderer backends.
pub trait BackendProvider {
    /// Backend type produced by this provider.
    type Backend: RendererBackend;

    /// Returns true if `kind` can be initialized on this platform.
    fn available(&self, kind: BackendKind) -> bool;

    /// Initializes a backend of the given kind and size.
    ///
    /// Fails with [`BackendError::Unsupported`] without touching `tracker` if
    /// the kind is unavailable.
    fn initialize(
        &mut self,
        kind: BackendKind,
        width: u32,
        height: u32,
        tracker: &ResourceTracker,
    ) -> Result<Self::Backend, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lighting_ratio() {
        let gpu = BackendProfile::for_kind(BackendKind::GpuCompute);
        let legacy = BackendProfile::for_kind(BackendKind::Legacy);
        assert!((gpu.light_intensity_scale / legacy.light_intensity_scale - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_sky_orientation_policy() {
        assert!(!BackendProfile::for_kind(BackendKind::GpuCompute).skybox_flip_y);
        assert!(BackendProfile::for_kind(BackendKind::Legacy).skybox_flip_y);
    }

    #[test]
    fn test_tone_mapping_policy() {
        assert!(BackendProfile::GPU_COMPUTE.tone_mapping);
        assert!(!BackendProfile::LEGACY.tone_mapping);
    }
}
