//! # Flurry Kernel
//!
//! Rendering and simulation core for the snowfall scene.
//!
//! This crate provides:
//! - The renderer abstraction ([`RendererBackend`], [`BackendProvider`]) and
//!   per-kind [`BackendProfile`] policy data
//! - A wgpu backend that presents to a window and a headless backend that
//!   records submissions
//! - The scene graph: lights, ground, skybox and the falling-snow
//!   [`ParticleField`]
//! - The perspective camera with orbit controls
//! - Background image loading
//!
//! ## Resource accounting
//!
//! Every object with backend-side state holds a [`GpuResource`] handle from a
//! shared [`ResourceTracker`]. Handles release on drop, so rebuilding the
//! particle field or tearing down an engine never leaks, and tests can assert
//! exact live counts.
//!
//! ## Backend kinds
//!
//! Both kinds render the identical scene. Their differences are data, not
//! branches: light intensity scale, skybox orientation and tone mapping.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod asset;
pub mod backend;
pub mod camera;
pub mod gpu;
pub mod headless;
pub mod particles;
pub mod resource;
pub mod scene;
pub mod shaders;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::asset::*;
    pub use crate::backend::*;
    pub use crate::camera::*;
    pub use crate::gpu::*;
    pub use crate::headless::*;
    pub use crate::particles::*;
    pub use crate::resource::*;
    pub use crate::scene::*;
    pub use crate::shaders::{FrameUniforms, SpriteInstance};
}

pub use prelude::*;
