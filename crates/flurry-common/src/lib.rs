//! # Flurry Common
//!
//! Shared types for the Flurry workspace:
//! - The backend selector ([`BackendKind`])
//! - Error types for backend, asset and IO failures
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod backend;
pub mod error;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::backend::*;
    pub use crate::error::*;
}

pub use prelude::*;
