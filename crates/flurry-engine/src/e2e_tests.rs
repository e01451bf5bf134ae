//! End-to-end tests for the snowfall engine.
//!
//! These drive a full session on the headless backend through a manual frame
//! host, the same way the viewer drives it through winit redraws.

#![cfg(test)]

use std::path::PathBuf;
use std::time::Duration;

use flurry_common::{BackendKind, FlurryError};
use flurry_kernel::{HeadlessProvider, ResourceKind, ResourceTracker, TextureSlot};

use crate::config::{AssetPaths, EngineConfig};
use crate::engine::Engine;
use crate::scheduler::{FrameHost, ManualFrameHost};
use crate::session::Session;

fn no_assets() -> AssetPaths {
    AssetPaths {
        ground: None,
        skybox: None,
        snowflake: None,
    }
}

fn legacy_config() -> EngineConfig {
    EngineConfig {
        backend: BackendKind::Legacy,
        window_width: 1280,
        window_height: 720,
        particle_count: 50,
        fall_speed: 5.0,
        seed: Some(20_231_224),
        assets: no_assets(),
        ..EngineConfig::default()
    }
}

/// Fires the host and ticks until `frames` frames have run.
fn run_frames(session: &mut Session<HeadlessProvider>, host: &mut ManualFrameHost, frames: u64) {
    for _ in 0..frames {
        assert!(host.fire().is_some(), "a frame should always be pending while running");
        session
            .tick(host)
            .expect("tick should succeed")
            .expect("session should be running");
    }
}

/// Test suite for the frame loop
mod frame_loop_tests {
    use super::*;

    #[test]
    fn e2e_legacy_thousand_frames() {
        let mut host = ManualFrameHost::new();
        let mut session = Session::new(HeadlessProvider::new(), legacy_config());
        session.bootstrap(BackendKind::Legacy, &mut host).expect("bootstrap");

        run_frames(&mut session, &mut host, 1000);

        let engine = session.engine().expect("engine");
        let particles = engine.scene().particles();
        assert_eq!(particles.len(), 50, "particle count must not drift");
        for p in particles.iter() {
            assert!(
                (0.0..750.0).contains(&p.position.y),
                "height {} out of range",
                p.position.y
            );
        }

        assert_eq!(engine.scheduler().frame_count(), 1000);
        assert_eq!(engine.scheduler().timing().completed_windows(), 1);
        assert_eq!(engine.scheduler().timing().cursor(), 1);
        assert!(engine.scheduler().last_mean_ms().is_some());
        assert_eq!(engine.backend().log().lock().frames, 1000);
        assert_eq!(session.tracker().live(ResourceKind::Sprite), 50);
    }

    #[test]
    fn e2e_start_twice_registers_one_callback() {
        let mut host = ManualFrameHost::new();
        let mut engine = Engine::bootstrap(
            &mut HeadlessProvider::new(),
            &legacy_config(),
            ResourceTracker::new(),
        )
        .expect("bootstrap");

        assert!(engine.start(&mut host));
        assert!(!engine.start(&mut host), "second start must be a no-op");
        assert_eq!(host.registrations(), 1);
    }

    #[test]
    fn e2e_stop_halts_frames() {
        let mut host = ManualFrameHost::new();
        let mut session = Session::new(HeadlessProvider::new(), legacy_config());
        session.bootstrap(BackendKind::Legacy, &mut host).expect("bootstrap");
        run_frames(&mut session, &mut host, 10);

        session.teardown(&mut host);

        assert!(host.fire().is_none(), "stopping must cancel the pending frame");
        assert!(session.tick(&mut host).expect("tick").is_none());
    }

    #[test]
    fn e2e_fall_speed_zero_still_falls() {
        let mut host = ManualFrameHost::new();
        let mut session = Session::new(HeadlessProvider::new(), legacy_config());
        session.bootstrap(BackendKind::Legacy, &mut host).expect("bootstrap");
        session.set_fall_speed(0.0);

        let before: Vec<f32> = session
            .engine()
            .expect("engine")
            .scene()
            .particles()
            .iter()
            .map(|p| p.position.y)
            .collect();
        run_frames(&mut session, &mut host, 1);

        let engine = session.engine().expect("engine");
        for (p, y) in engine.scene().particles().iter().zip(before) {
            // Constant 0.2 drift, or recycled to the ceiling.
            let fell = (y - p.position.y - 0.2).abs() < 1e-3;
            assert!(fell || (p.position.y - 500.0).abs() < 1e-3);
        }
    }

    #[test]
    fn e2e_submit_failure_stops_session() {
        let mut host = ManualFrameHost::new();
        let provider = HeadlessProvider::new().failing_after(3);
        let mut session = Session::new(provider, legacy_config());
        session.bootstrap(BackendKind::Legacy, &mut host).expect("bootstrap");

        run_frames(&mut session, &mut host, 3);
        host.fire();
        let err = session.tick(&mut host).expect_err("fourth frame fails");

        assert!(matches!(err, FlurryError::Backend(_)));
        assert!(!session.is_running());
        assert!(!host.has_pending());
    }
}

/// Test suite for the parameter controls
mod parameter_tests {
    use super::*;

    #[test]
    fn e2e_rebuild_200_then_50() {
        let mut host = ManualFrameHost::new();
        let mut session = Session::new(HeadlessProvider::new(), legacy_config());
        session.bootstrap(BackendKind::Legacy, &mut host).expect("bootstrap");

        session.set_particle_count(200);
        run_frames(&mut session, &mut host, 5);
        session.set_particle_count(50);

        let engine = session.engine().expect("engine");
        assert_eq!(engine.scene().particles().len(), 50);
        assert_eq!(session.tracker().live(ResourceKind::Sprite), 50);
    }

    #[test]
    fn e2e_out_of_range_input_is_clamped() {
        let mut host = ManualFrameHost::new();
        let mut session = Session::new(HeadlessProvider::new(), legacy_config());
        session.bootstrap(BackendKind::Legacy, &mut host).expect("bootstrap");

        assert_eq!(session.set_particle_count(0), Some(1));
        assert_eq!(session.set_particle_count(u32::MAX), Some(5000));
        assert_eq!(session.set_fall_speed(-1.0), Some(0.0));
        assert_eq!(session.tracker().live(ResourceKind::Sprite), 5000);
    }
}

/// Test suite for backend selection and teardown
mod backend_tests {
    use super::*;

    #[test]
    fn e2e_unavailable_backend_acquires_nothing() {
        let tracker = ResourceTracker::new();
        let mut provider = HeadlessProvider::new().without(BackendKind::GpuCompute);
        let config = EngineConfig {
            backend: BackendKind::GpuCompute,
            ..legacy_config()
        };

        let result = Engine::bootstrap(&mut provider, &config, tracker.clone());

        assert!(matches!(
            result,
            Err(FlurryError::Backend(ref e)) if e.is_unsupported()
        ));
        assert_eq!(tracker.total_acquired(), 0, "no resource may be acquired");
    }

    #[test]
    fn e2e_switch_backend_releases_previous_scene() {
        let mut host = ManualFrameHost::new();
        let mut session = Session::new(HeadlessProvider::new(), legacy_config());
        session.bootstrap(BackendKind::Legacy, &mut host).expect("bootstrap");
        let live_after_first = session.tracker().live_total();
        run_frames(&mut session, &mut host, 20);

        session.bootstrap(BackendKind::GpuCompute, &mut host).expect("bootstrap");

        assert_eq!(session.tracker().live_total(), live_after_first);
        assert_eq!(session.tracker().total_released(), live_after_first);
        assert_eq!(session.overlays().len(), 2, "old overlays must be removed first");
        assert_eq!(host.registrations(), 22);

        run_frames(&mut session, &mut host, 1);
        let engine = session.engine().expect("engine");
        let light = engine.backend().log().lock().light_intensity;
        assert!((light - 3.0).abs() < 1e-6, "GPU compute lights are three times brighter");
    }
}

/// Test suite for background asset loading
mod asset_tests {
    use super::*;
    use tempfile::TempDir;

    /// 2x2 image with a red top row and a blue bottom row.
    fn write_sky(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("sky.png");
        let image = image::RgbaImage::from_fn(2, 2, |_, y| {
            if y == 0 {
                image::Rgba([255, 0, 0, 255])
            } else {
                image::Rgba([0, 0, 255, 255])
            }
        });
        image.save(&path).expect("write png");
        path
    }

    /// Ticks until no loads are pending.
    fn settle(session: &mut Session<HeadlessProvider>, host: &mut ManualFrameHost) {
        for _ in 0..5000 {
            let pending = session.engine().expect("engine").scene().pending_assets();
            if pending == 0 {
                return;
            }
            run_frames(session, host, 1);
            std::thread::sleep(Duration::from_millis(1));
        }
        panic!("asset load never resolved");
    }

    fn sky_first_pixel(kind: BackendKind) -> [u8; 4] {
        let dir = TempDir::new().expect("temp dir");
        let config = EngineConfig {
            assets: AssetPaths {
                skybox: Some(write_sky(&dir)),
                ..no_assets()
            },
            ..legacy_config()
        };
        let mut host = ManualFrameHost::new();
        let mut session = Session::new(HeadlessProvider::new(), config);
        session.bootstrap(kind, &mut host).expect("bootstrap");

        settle(&mut session, &mut host);
        run_frames(&mut session, &mut host, 3);

        let engine = session.engine().expect("engine");
        assert!(engine.scene().skybox().has_background());
        let log = engine.backend().log();
        let log = log.lock();
        assert!(log.background_installed);
        let uploads: Vec<_> = log
            .uploads
            .iter()
            .filter(|u| u.slot == TextureSlot::Skybox)
            .collect();
        assert_eq!(uploads.len(), 1, "background installs exactly once");
        uploads[0].first_pixel
    }

    #[test]
    fn e2e_skybox_orientation_per_backend() {
        assert_eq!(sky_first_pixel(BackendKind::Legacy), [0, 0, 255, 255]);
        assert_eq!(sky_first_pixel(BackendKind::GpuCompute), [255, 0, 0, 255]);
    }

    #[test]
    fn e2e_missing_asset_keeps_rendering() {
        let config = EngineConfig {
            assets: AssetPaths {
                skybox: Some(PathBuf::from("/nonexistent/flurry/sky.jpg")),
                ..no_assets()
            },
            ..legacy_config()
        };
        let mut host = ManualFrameHost::new();
        let mut session = Session::new(HeadlessProvider::new(), config);
        session.bootstrap(BackendKind::Legacy, &mut host).expect("bootstrap");

        settle(&mut session, &mut host);
        run_frames(&mut session, &mut host, 10);

        let engine = session.engine().expect("engine");
        assert!(!engine.scene().skybox().has_background());
        assert!(engine.backend().log().lock().uploads.is_empty());
        assert!(session.is_running());
    }
}

#[test]
fn e2e_frame_host_trait_object() {
    let mut host = ManualFrameHost::new();
    let dyn_host: &mut dyn FrameHost = &mut host;
    let request = dyn_host.request_frame();
    dyn_host.cancel_frame(request);
    assert_eq!(host.cancellations(), 1);
}
