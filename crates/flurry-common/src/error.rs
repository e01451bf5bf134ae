//! Error types for Flurry.

use std::path::PathBuf;

use thiserror::Error;

use crate::backend::BackendKind;

/// Top-level error type for Flurry operations.
#[derive(Debug, Error)]
pub enum FlurryError {
    /// Rendering backend errors
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Rendering backend errors.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The selected backend is not available on this platform.
    ///
    /// Terminal: the caller is expected to show a fallback message and not render.
    #[error("{kind} backend is not supported on this platform")]
    Unsupported {
        /// Backend that was requested
        kind: BackendKind,
    },

    /// Backend initialization failed after the availability check passed
    #[error("Backend initialization failed: {0}")]
    InitFailed(String),

    /// Presentation surface could not be acquired or configured
    #[error("Surface error: {0}")]
    Surface(String),

    /// Texture upload was rejected
    #[error("Texture upload failed: {0}")]
    Upload(String),

    /// Frame submission failed
    #[error("Frame submission failed: {0}")]
    Submit(String),
}

impl BackendError {
    /// Returns true for capability failures (backend unavailable).
    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

/// Asset loading errors.
#[derive(Debug, Error)]
pub enum AssetError {
    /// File not found
    #[error("Asset not found: {}", .0.display())]
    NotFound(PathBuf),

    /// File could not be read
    #[error("Failed to read {}: {}", .path.display(), .message)]
    Read {
        /// Asset path
        path: PathBuf,
        /// Underlying error message
        message: String,
    },

    /// Image data could not be decoded
    #[error("Failed to decode {}: {}", .path.display(), .message)]
    Decode {
        /// Asset path
        path: PathBuf,
        /// Underlying error message
        message: String,
    },

    /// Loader went away before producing a result
    #[error("Asset load canceled")]
    Canceled,
}

/// Result type alias for Flurry operations.
pub type FlurryResult<T> = Result<T, FlurryError>;
