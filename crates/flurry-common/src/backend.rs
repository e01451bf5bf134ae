//! Backend selector shared by the kernel, the engine and configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which rendering backend an engine instance drives.
///
/// Fixed for the lifetime of one engine instance. Switching requires tearing the
/// engine down and bootstrapping a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Modern GPU API with compute support (Vulkan, Metal, DX12, WebGPU).
    GpuCompute,
    /// Legacy GL-class pipeline.
    #[default]
    Legacy,
}

impl BackendKind {
    /// Maps the caller's boolean selector onto a kind (`true` selects GPU compute).
    #[must_use]
    pub const fn from_flag(gpu_compute: bool) -> Self {
        if gpu_compute {
            Self::GpuCompute
        } else {
            Self::Legacy
        }
    }

    /// The other backend.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::GpuCompute => Self::Legacy,
            Self::Legacy => Self::GpuCompute,
        }
    }

    /// Get the display name for this backend.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::GpuCompute => "GPU compute",
            Self::Legacy => "Legacy",
        }
    }

    /// Get all backend kinds.
    #[must_use]
    pub const fn all() -> [Self; 2] {
        [Self::GpuCompute, Self::Legacy]
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
