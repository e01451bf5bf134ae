//! # Flurry Engine
//!
//! Engine lifecycle for the snowfall scene.
//!
//! This crate ties the kernel together:
//! - [`engine::Engine`]: one backend, scene, camera and parameter panel
//! - [`scheduler::FrameScheduler`]: the start/stop state machine and the
//!   per-tick pipeline, driven by a [`scheduler::FrameHost`]
//! - [`timing::FrameTimingBuffer`]: the rolling frame-time average
//! - [`session::Session`]: teardown and re-bootstrap across backend switches,
//!   including the stats and controls overlays
//! - [`app`]: the winit viewer used by the `flurry` binary

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod app;
pub mod config;
pub mod engine;
pub mod input;
pub mod overlay;
pub mod panel;
pub mod scheduler;
pub mod session;
pub mod timing;

mod e2e_tests;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::*;
    pub use crate::engine::*;
    pub use crate::overlay::*;
    pub use crate::panel::*;
    pub use crate::scheduler::*;
    pub use crate::session::*;
    pub use crate::timing::*;
}

pub use prelude::*;
