//! Scene graph: lights, ground, skybox and the particle field.
//!
//! The scene is built once per engine instance against a backend profile.
//! Textures arrive asynchronously; [`SceneGraph::poll_assets`] installs each one
//! the first tick its load completes. Until then the scene renders without it.

use std::path::PathBuf;

use glam::Vec3;
use tracing::{debug, info, warn};

use crate::asset::{AssetPoll, PendingAsset, TextureSlot};
use crate::backend::{BackendProfile, RendererBackend};
use crate::particles::{FieldProfile, ParticleField};
use crate::resource::{GpuResource, ResourceKind, ResourceTracker};

/// Ground plane edge length.
pub const GROUND_SIZE: f32 = 2000.0;

/// Ground tint as 0xRRGGBB.
pub const GROUND_TINT: u32 = 0x0055_5555;

/// Positions of the two directional lights.
pub const LIGHT_POSITIONS: [Vec3; 2] = [
    Vec3::new(0.0, 100.0, 100.0),
    Vec3::new(0.0, 100.0, -100.0),
];

/// Directional light shining from its position towards the origin.
#[derive(Debug)]
pub struct DirectionalLight {
    /// Light position
    pub position: Vec3,
    /// Linear RGB colour
    pub color: Vec3,
    /// Intensity after the backend scale is applied
    pub intensity: f32,
    _uniforms: GpuResource,
}

impl DirectionalLight {
    /// Unit vector from the lit surface towards the light.
    #[must_use]
    pub fn direction(&self) -> Vec3 {
        self.position.normalize_or_zero()
    }
}

/// Flat ground square lying in the XZ plane.
#[derive(Debug)]
pub struct GroundPlane {
    /// Edge length
    pub size: f32,
    /// Rotation about X in radians (the plane is authored facing +Z)
    pub rotation_x: f32,
    /// Tint as 0xRRGGBB
    pub tint: u32,
    texture: Option<GpuResource>,
    _mesh: GpuResource,
}

impl GroundPlane {
    /// Tint as linear-ish RGB in `[0, 1]`.
    #[must_use]
    pub fn tint_rgb(&self) -> Vec3 {
        hex_to_rgb(self.tint)
    }

    /// Returns true once the ground texture is installed.
    #[must_use]
    pub const fn is_textured(&self) -> bool {
        self.texture.is_some()
    }
}

/// Sky background, installed at most once.
#[derive(Debug)]
pub struct Skybox {
    background: Option<GpuResource>,
    installed_at_frame: Option<u64>,
    _geometry: GpuResource,
}

impl Skybox {
    /// Returns true once the background is installed.
    #[must_use]
    pub const fn has_background(&self) -> bool {
        self.background.is_some()
    }

    /// Frame on which the background was installed.
    #[must_use]
    pub const fn installed_at_frame(&self) -> Option<u64> {
        self.installed_at_frame
    }

    fn install(&mut self, texture: GpuResource, frame: u64) -> bool {
        if self.background.is_some() {
            return false;
        }
        self.background = Some(texture);
        self.installed_at_frame = Some(frame);
        true
    }
}

/// Paths of the scene's image assets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SceneAssets {
    /// Ground texture
    pub ground: Option<PathBuf>,
    /// Equirectangular sky
    pub skybox: Option<PathBuf>,
    /// Snowflake sprite
    pub snowflake: Option<PathBuf>,
}

/// Everything submitted to the backend each frame.
#[derive(Debug)]
pub struct SceneGraph {
    lights: [DirectionalLight; 2],
    ground: GroundPlane,
    skybox: Skybox,
    particles: ParticleField,
    sprite_texture: Option<GpuResource>,
    profile: BackendProfile,
    pending: Vec<(TextureSlot, PendingAsset)>,
}

impl SceneGraph {
    /// Builds the static scene and an empty particle field.
    #[must_use]
    pub fn build(
        profile: BackendProfile,
        field: FieldProfile,
        seed: Option<u64>,
        tracker: &ResourceTracker,
    ) -> Self {
        let light = |position: Vec3| DirectionalLight {
            position,
            color: Vec3::ONE,
            intensity: profile.light_intensity_scale,
            _uniforms: tracker.acquire(ResourceKind::Light),
        };

        let scene = Self {
            lights: LIGHT_POSITIONS.map(light),
            ground: GroundPlane {
                size: GROUND_SIZE,
                rotation_x: -std::f32::consts::FRAC_PI_2,
                tint: GROUND_TINT,
                texture: None,
                _mesh: tracker.acquire(ResourceKind::Ground),
            },
            skybox: Skybox {
                background: None,
                installed_at_frame: None,
                _geometry: tracker.acquire(ResourceKind::Skybox),
            },
            particles: ParticleField::new(field, seed, tracker.clone()),
            sprite_texture: None,
            profile,
            pending: Vec::new(),
        };

        debug!(
            "Scene built: light intensity {}, skybox flip {}",
            profile.light_intensity_scale, profile.skybox_flip_y
        );
        scene
    }

    /// Starts background loads for every configured asset.
    pub fn load_assets(&mut self, assets: &SceneAssets) {
        let slots = [
            (TextureSlot::Ground, &assets.ground),
            (TextureSlot::Skybox, &assets.skybox),
            (TextureSlot::Snowflake, &assets.snowflake),
        ];
        for (slot, path) in slots {
            if let Some(path) = path {
                self.request_asset(slot, PendingAsset::spawn(path));
            }
        }
    }

    /// Queues a pending load for a slot.
    pub fn request_asset(&mut self, slot: TextureSlot, asset: PendingAsset) {
        self.pending.push((slot, asset));
    }

    /// Number of loads still outstanding.
    #[must_use]
    pub fn pending_assets(&self) -> usize {
        self.pending.len()
    }

    /// Installs every load that finished since the last poll.
    ///
    /// Failed loads are logged and dropped; the scene keeps rendering without
    /// them. Returns the number of textures installed.
    pub fn poll_assets<B>(&mut self, backend: &mut B, frame: u64) -> usize
    where
        B: RendererBackend + ?Sized,
    {
        let mut installed = 0;
        let mut still_pending = Vec::with_capacity(self.pending.len());

        for (slot, mut asset) in std::mem::take(&mut self.pending) {
            let image = match asset.poll() {
                AssetPoll::Pending => {
                    still_pending.push((slot, asset));
                    continue;
                },
                AssetPoll::Ready(Ok(image)) => image,
                AssetPoll::Ready(Err(e)) => {
                    warn!("Skipping {} texture: {e}", slot.display_name());
                    continue;
                },
            };

            if slot == TextureSlot::Skybox && self.skybox.has_background() {
                debug!("Background already installed, dropping {}", asset.path().display());
                continue;
            }

            let image = if slot == TextureSlot::Skybox && self.profile.skybox_flip_y {
                image.flipped_vertically()
            } else {
                image
            };

            match backend.upload_texture(slot, &image) {
                Ok(texture) => {
                    if self.install(slot, texture, frame) {
                        installed += 1;
                        info!(
                            "Installed {} texture ({}x{}) on frame {frame}",
                            slot.display_name(),
                            image.width,
                            image.height
                        );
                    }
                },
                Err(e) => warn!("Failed to upload {} texture: {e}", slot.display_name()),
            }
        }

        self.pending = still_pending;
        installed
    }

    fn install(&mut self, slot: TextureSlot, texture: GpuResource, frame: u64) -> bool {
        match slot {
            TextureSlot::Skybox => self.skybox.install(texture, frame),
            TextureSlot::Ground => self.ground.texture.replace(texture).is_none(),
            TextureSlot::Snowflake => self.sprite_texture.replace(texture).is_none(),
        }
    }

    /// The two directional lights.
    #[must_use]
    pub const fn lights(&self) -> &[DirectionalLight; 2] {
        &self.lights
    }

    /// Ground plane.
    #[must_use]
    pub const fn ground(&self) -> &GroundPlane {
        &self.ground
    }

    /// Skybox.
    #[must_use]
    pub const fn skybox(&self) -> &Skybox {
        &self.skybox
    }

    /// Particle field.
    #[must_use]
    pub const fn particles(&self) -> &ParticleField {
        &self.particles
    }

    /// Mutable particle field.
    pub fn particles_mut(&mut self) -> &mut ParticleField {
        &mut self.particles
    }

    /// Returns true once the snowflake texture is installed.
    #[must_use]
    pub const fn has_sprite_texture(&self) -> bool {
        self.sprite_texture.is_some()
    }

    /// Backend profile the scene was built for.
    #[must_use]
    pub const fn profile(&self) -> &BackendProfile {
        &self.profile
    }
}

/// Converts 0xRRGGBB to RGB in `[0, 1]`.
#[must_use]
pub fn hex_to_rgb(hex: u32) -> Vec3 {
    let channel = |shift: u32| ((hex >> shift) & 0xFF) as f32 / 255.0;
    Vec3::new(channel(16), channel(8), channel(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::DecodedImage;
    use crate::backend::BackendProvider;
    use crate::headless::{HeadlessProvider, UploadRecord};
    use flurry_common::{AssetError, BackendKind};

    fn scene(kind: BackendKind, tracker: &ResourceTracker) -> SceneGraph {
        SceneGraph::build(
            BackendProfile::for_kind(kind),
            FieldProfile::SPRITES,
            Some(1),
            tracker,
        )
    }

    #[test]
    fn test_build_allocates_static_resources() {
        let tracker = ResourceTracker::new();
        let scene = scene(BackendKind::Legacy, &tracker);

        assert_eq!(tracker.live(ResourceKind::Light), 2);
        assert_eq!(tracker.live(ResourceKind::Ground), 1);
        assert_eq!(tracker.live(ResourceKind::Skybox), 1);
        assert!(scene.particles().is_empty());
        assert!(!scene.skybox().has_background());

        drop(scene);
        assert_eq!(tracker.live_total(), 0);
    }

    #[test]
    fn test_light_layout_and_intensity() {
        let tracker = ResourceTracker::new();
        let gpu = scene(BackendKind::GpuCompute, &tracker);
        let legacy = scene(BackendKind::Legacy, &tracker);

        assert_eq!(gpu.lights()[0].position, Vec3::new(0.0, 100.0, 100.0));
        assert_eq!(gpu.lights()[1].position, Vec3::new(0.0, 100.0, -100.0));
        assert!((gpu.lights()[0].intensity - 3.0).abs() < 1e-6);
        assert!((legacy.lights()[1].intensity - 1.0).abs() < 1e-6);
        assert_eq!(legacy.lights()[0].color, Vec3::ONE);
    }

    #[test]
    fn test_ground_layout() {
        let tracker = ResourceTracker::new();
        let scene = scene(BackendKind::Legacy, &tracker);
        let ground = scene.ground();
        assert!((ground.size - 2000.0).abs() < f32::EPSILON);
        assert!((ground.rotation_x + std::f32::consts::FRAC_PI_2).abs() < 1e-6);
        assert!((ground.tint_rgb().x - 0x55 as f32 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_skybox_installs_exactly_once() {
        let tracker = ResourceTracker::new();
        let mut provider = HeadlessProvider::new();
        let mut backend = provider
            .initialize(BackendKind::GpuCompute, 64, 64, &tracker)
            .expect("headless init");
        let mut scene = scene(BackendKind::GpuCompute, &tracker);

        let sky = DecodedImage::solid(4, 2, [10, 20, 30, 255]);
        let first = PendingAsset::resolved("sky.jpg", Ok(sky.clone()));
        scene.request_asset(TextureSlot::Skybox, first);
        scene.request_asset(TextureSlot::Skybox, PendingAsset::resolved("sky2.jpg", Ok(sky)));

        assert_eq!(scene.poll_assets(&mut backend, 3), 1);
        assert!(scene.skybox().has_background());
        assert_eq!(scene.skybox().installed_at_frame(), Some(3));
        assert_eq!(scene.pending_assets(), 0);
        assert_eq!(scene.poll_assets(&mut backend, 4), 0);
        assert_eq!(tracker.live(ResourceKind::Texture), 1);
    }

    #[test]
    fn test_late_skybox_never_reaches_backend() {
        let tracker = ResourceTracker::new();
        let mut provider = HeadlessProvider::new();
        let mut backend = provider
            .initialize(BackendKind::GpuCompute, 64, 64, &tracker)
            .expect("headless init");
        let log = backend.log();
        let mut scene = scene(BackendKind::GpuCompute, &tracker);

        let first = DecodedImage::solid(1, 1, [1, 1, 1, 255]);
        scene.request_asset(TextureSlot::Skybox, PendingAsset::resolved("sky.jpg", Ok(first)));
        assert_eq!(scene.poll_assets(&mut backend, 0), 1);

        let second = DecodedImage::solid(1, 1, [2, 2, 2, 255]);
        scene.request_asset(TextureSlot::Skybox, PendingAsset::resolved("sky2.jpg", Ok(second)));
        assert_eq!(scene.poll_assets(&mut backend, 1), 0);

        let sky_uploads: Vec<[u8; 4]> = log
            .lock()
            .uploads
            .iter()
            .filter(|u| u.slot == TextureSlot::Skybox)
            .map(|u| u.first_pixel)
            .collect();
        assert_eq!(sky_uploads, vec![[1, 1, 1, 255]]);
        assert_eq!(scene.skybox().installed_at_frame(), Some(0));
        assert_eq!(tracker.live(ResourceKind::Texture), 1);
    }

    #[test]
    fn test_failed_asset_is_skipped() {
        let tracker = ResourceTracker::new();
        let mut provider = HeadlessProvider::new();
        let mut backend = provider
            .initialize(BackendKind::Legacy, 64, 64, &tracker)
            .expect("headless init");
        let mut scene = scene(BackendKind::Legacy, &tracker);

        scene.request_asset(
            TextureSlot::Ground,
            PendingAsset::resolved("grass.png", Err(AssetError::NotFound("grass.png".into()))),
        );
        assert_eq!(scene.poll_assets(&mut backend, 0), 0);
        assert!(!scene.ground().is_textured());
        assert_eq!(scene.pending_assets(), 0);
    }

    #[test]
    fn test_legacy_flips_skybox_on_upload() {
        let mut image = DecodedImage::solid(1, 2, [0, 0, 0, 255]);
        image.rgba[0] = 200;

        for (kind, expected_first) in [(BackendKind::Legacy, 0), (BackendKind::GpuCompute, 200)] {
            let tracker = ResourceTracker::new();
            let mut provider = HeadlessProvider::new();
            let mut backend = provider
                .initialize(kind, 64, 64, &tracker)
                .expect("headless init");
            let log = backend.log();
            let mut scene = scene(kind, &tracker);

            let sky = PendingAsset::resolved("sky", Ok(image.clone()));
            scene.request_asset(TextureSlot::Skybox, sky);
            scene.poll_assets(&mut backend, 0);

            let uploads = log.lock().uploads.clone();
            assert_eq!(
                uploads,
                vec![UploadRecord {
                    slot: TextureSlot::Skybox,
                    width: 1,
                    height: 2,
                    first_pixel: [expected_first, 0, 0, 255],
                }]
            );
        }
    }

    #[test]
    fn test_hex_to_rgb() {
        assert_eq!(hex_to_rgb(0xFF_0000), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(hex_to_rgb(0), Vec3::ZERO);
    }
}
