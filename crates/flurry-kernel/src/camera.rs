//! Perspective camera with orbit controls.
//!
//! The camera orbits a fixed target. User input is accumulated as pending
//! rotation and dolly deltas, which [`OrbitControls::update`] folds into the
//! spherical coordinates once per frame with the distance and polar-angle
//! clamps applied.

use std::f32::consts::{FRAC_PI_2, TAU};

use glam::{Mat4, Vec3};

use crate::resource::{GpuResource, ResourceKind, ResourceTracker};

/// Vertical field of view in degrees.
pub const FOV_DEGREES: f32 = 75.0;

/// Near clip distance.
pub const NEAR_CLIP: f32 = 1.0;

/// Far clip distance.
pub const FAR_CLIP: f32 = 2000.0;

/// Initial camera position.
pub const START_POSITION: Vec3 = Vec3::new(0.0, 100.0, 200.0);

/// Closest allowed orbit distance.
pub const MIN_DISTANCE: f32 = 75.0;

/// Farthest allowed orbit distance.
pub const MAX_DISTANCE: f32 = 1200.0;

/// Largest polar angle; keeps the camera at or above the horizon.
pub const MAX_POLAR_ANGLE: f32 = FRAC_PI_2;

/// Per-step dolly factor.
pub const DOLLY_SCALE: f32 = 0.95;

const POLAR_EPSILON: f32 = 1e-6;

/// Perspective projection camera.
#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveCamera {
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
    /// Width / height
    pub aspect: f32,
    /// Near clip distance
    pub near: f32,
    /// Far clip distance
    pub far: f32,
    /// Eye position
    pub position: Vec3,
    /// Look-at point
    pub target: Vec3,
}

impl PerspectiveCamera {
    /// Creates the scene camera for a viewport of the given size.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            fov_degrees: FOV_DEGREES,
            aspect: aspect_ratio(width, height),
            near: NEAR_CLIP,
            far: FAR_CLIP,
            position: START_POSITION,
            target: Vec3::ZERO,
        }
    }

    /// Updates the aspect ratio after a viewport resize.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.aspect = aspect_ratio(width, height);
    }

    /// World-to-view matrix.
    #[must_use]
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    /// View-to-clip matrix (depth range 0..1).
    #[must_use]
    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_degrees.to_radians(), self.aspect, self.near, self.far)
    }

    /// Combined world-to-clip matrix.
    #[must_use]
    pub fn view_projection(&self) -> Mat4 {
        self.projection() * self.view()
    }

    /// Unit vector from the eye towards the target.
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or_zero()
    }

    /// Camera right vector in world space.
    #[must_use]
    pub fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::Y).try_normalize().unwrap_or(Vec3::X)
    }

    /// Camera up vector in world space.
    #[must_use]
    pub fn up(&self) -> Vec3 {
        self.right().cross(self.forward()).try_normalize().unwrap_or(Vec3::Y)
    }
}

fn aspect_ratio(width: u32, height: u32) -> f32 {
    width.max(1) as f32 / height.max(1) as f32
}

/// Orbit-style controls around the camera target.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitControls {
    /// Distance from target
    pub radius: f32,
    /// Polar angle from +Y
    pub phi: f32,
    /// Azimuth around +Y, measured from +Z
    pub theta: f32,
    pending_theta: f32,
    pending_phi: f32,
    pending_scale: f32,
}

impl OrbitControls {
    /// Derives orbit state from a camera position relative to its target.
    #[must_use]
    pub fn from_camera(camera: &PerspectiveCamera) -> Self {
        let offset = camera.position - camera.target;
        let radius = offset.length().max(f32::EPSILON);
        Self {
            radius,
            phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
            theta: offset.x.atan2(offset.z),
            pending_theta: 0.0,
            pending_phi: 0.0,
            pending_scale: 1.0,
        }
    }

    /// Queues a rotation from a pointer drag of `(dx, dy)` pixels.
    ///
    /// A drag across the full viewport height turns one full revolution.
    pub fn rotate(&mut self, dx: f32, dy: f32, viewport_height: u32) {
        let height = viewport_height.max(1) as f32;
        self.pending_theta -= TAU * dx / height;
        self.pending_phi -= TAU * dy / height;
    }

    /// Queues a dolly. Positive steps move towards the target.
    pub fn dolly(&mut self, steps: f32) {
        self.pending_scale *= DOLLY_SCALE.powf(steps);
    }

    /// Applies pending input to the camera. Returns true if the camera moved.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) -> bool {
        let before = camera.position;

        self.theta += self.pending_theta;
        self.phi = (self.phi + self.pending_phi).clamp(POLAR_EPSILON, MAX_POLAR_ANGLE);
        self.radius = (self.radius * self.pending_scale).clamp(MIN_DISTANCE, MAX_DISTANCE);

        self.pending_theta = 0.0;
        self.pending_phi = 0.0;
        self.pending_scale = 1.0;

        let (sin_phi, cos_phi) = self.phi.sin_cos();
        let (sin_theta, cos_theta) = self.theta.sin_cos();
        let offset = Vec3::new(
            self.radius * sin_phi * sin_theta,
            self.radius * cos_phi,
            self.radius * sin_phi * cos_theta,
        );
        camera.position = camera.target + offset;

        camera.position.distance_squared(before) > 1e-6
    }
}

/// Camera plus its controls and tracked uniform block.
#[derive(Debug)]
pub struct CameraRig {
    /// Projection camera
    pub camera: PerspectiveCamera,
    /// Orbit controls
    pub controls: OrbitControls,
    _uniforms: GpuResource,
}

impl CameraRig {
    /// Creates the rig for a viewport of the given size.
    #[must_use]
    pub fn new(width: u32, height: u32, tracker: &ResourceTracker) -> Self {
        let camera = PerspectiveCamera::new(width, height);
        let controls = OrbitControls::from_camera(&camera);
        Self {
            camera,
            controls,
            _uniforms: tracker.acquire(ResourceKind::Camera),
        }
    }

    /// Advances the controls for this frame.
    pub fn update(&mut self) -> bool {
        self.controls.update(&mut self.camera)
    }

    /// Updates the projection after a viewport resize.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.camera.set_viewport(width, height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rig() -> CameraRig {
        CameraRig::new(1280, 720, &ResourceTracker::new())
    }

    #[test]
    fn test_initial_state() {
        let rig = rig();
        assert_eq!(rig.camera.position, START_POSITION);
        assert_eq!(rig.camera.target, Vec3::ZERO);
        assert!((rig.camera.aspect - 1280.0 / 720.0).abs() < 1e-6);
        assert!((rig.controls.radius - START_POSITION.length()).abs() < 1e-3);
    }

    #[test]
    fn test_update_without_input_keeps_position() {
        let mut rig = rig();
        let moved = rig.update();
        assert!(!moved);
        assert!(rig.camera.position.distance(START_POSITION) < 1e-3);
    }

    #[test]
    fn test_dolly_clamps_distance() {
        let mut rig = rig();
        rig.controls.dolly(500.0);
        rig.update();
        assert!((rig.controls.radius - MIN_DISTANCE).abs() < 1e-3);

        rig.controls.dolly(-500.0);
        rig.update();
        assert!((rig.controls.radius - MAX_DISTANCE).abs() < 1e-3);
        assert!((rig.camera.position.length() - MAX_DISTANCE).abs() < 1e-2);
    }

    #[test]
    fn test_rotate_clamps_polar_angle() {
        let mut rig = rig();
        rig.controls.rotate(0.0, -10_000.0, 720);
        rig.update();
        assert!((rig.controls.phi - MAX_POLAR_ANGLE).abs() < 1e-6);
        assert!(rig.camera.position.y >= -1e-3);

        rig.controls.rotate(0.0, 10_000.0, 720);
        rig.update();
        assert!(rig.controls.phi > 0.0);
        assert!(rig.camera.position.y > 0.0);
    }

    #[test]
    fn test_horizontal_drag_orbits_at_constant_distance() {
        let mut rig = rig();
        let radius = rig.controls.radius;
        rig.controls.rotate(180.0, 0.0, 720);
        assert!(rig.update());
        assert!((rig.camera.position.length() - radius).abs() < 1e-2);
        assert!((rig.camera.position.y - START_POSITION.y).abs() < 1e-2);
    }

    #[test]
    fn test_basis_vectors_are_orthonormal() {
        let camera = PerspectiveCamera::new(800, 600);
        let (f, r, u) = (camera.forward(), camera.right(), camera.up());
        assert!(f.dot(r).abs() < 1e-5);
        assert!(f.dot(u).abs() < 1e-5);
        assert!((r.length() - 1.0).abs() < 1e-5);
        assert!(u.y > 0.0);
    }

    #[test]
    fn test_target_projects_to_centre() {
        let camera = PerspectiveCamera::new(1280, 720);
        let clip = camera.view_projection() * Vec3::ZERO.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
        assert!((0.0..=1.0).contains(&ndc.z));
    }

    #[test]
    fn test_resize_updates_aspect() {
        let mut rig = rig();
        rig.resize(600, 600);
        assert!((rig.camera.aspect - 1.0).abs() < 1e-6);
        rig.resize(0, 0);
        assert!(rig.camera.aspect.is_finite());
    }

    #[test]
    fn test_rig_holds_camera_resource() {
        let tracker = ResourceTracker::new();
        let rig = CameraRig::new(1280, 720, &tracker);
        assert_eq!(tracker.live(ResourceKind::Camera), 1);
        drop(rig);
        assert_eq!(tracker.live(ResourceKind::Camera), 0);
    }
}
