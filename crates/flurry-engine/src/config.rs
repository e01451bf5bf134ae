//! Engine configuration.
//!
//! Window, backend, scene and instrumentation settings. Loaded from
//! `flurry.toml` in the platform config directory (or the file named by
//! `FLURRY_CONFIG`), falling back to defaults when the file is missing or
//! invalid.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use flurry_common::BackendKind;
use flurry_kernel::{FieldProfile, SceneAssets};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Configuration file name.
const CONFIG_FILE: &str = "flurry.toml";

/// Directory under the platform config directory.
const CONFIG_DIR: &str = "flurry";

/// Environment variable overriding the config path.
pub const CONFIG_ENV: &str = "FLURRY_CONFIG";

/// Environment variable holding the boolean backend selector.
pub const GPU_COMPUTE_ENV: &str = "FLURRY_GPU_COMPUTE";

/// Default frame-time averaging window.
pub const DEFAULT_TIMING_WINDOW: usize = 999;

/// Which snowfall scene to run.
///
/// Both variants share one engine and differ only in fall constants and the
/// particle count control range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SceneVariant {
    /// Gentle fall, up to 5000 sprites in steps of 100
    #[default]
    Sprites,
    /// Faster fall, up to 10000 particles in steps of 1
    Dense,
}

impl SceneVariant {
    /// Fall and recycle constants.
    #[must_use]
    pub const fn field_profile(self) -> FieldProfile {
        match self {
            Self::Sprites => FieldProfile::SPRITES,
            Self::Dense => FieldProfile::DENSE,
        }
    }

    /// Particle count control bounds as `(min, max, step)`.
    #[must_use]
    pub const fn count_range(self) -> (u32, u32, u32) {
        match self {
            Self::Sprites => (1, 5000, 100),
            Self::Dense => (1, 10_000, 1),
        }
    }
}

/// Image asset locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetPaths {
    /// Ground texture
    pub ground: Option<PathBuf>,
    /// Equirectangular sky
    pub skybox: Option<PathBuf>,
    /// Snowflake sprite
    pub snowflake: Option<PathBuf>,
}

impl Default for AssetPaths {
    fn default() -> Self {
        Self {
            ground: Some(PathBuf::from("assets/grass.png")),
            skybox: Some(PathBuf::from("assets/background.jpg")),
            snowflake: Some(PathBuf::from("assets/snowflake.png")),
        }
    }
}

impl AssetPaths {
    /// Converts to the kernel's asset request.
    #[must_use]
    pub fn to_scene_assets(&self) -> SceneAssets {
        SceneAssets {
            ground: self.ground.clone(),
            skybox: self.skybox.clone(),
            snowflake: self.snowflake.clone(),
        }
    }
}

/// Engine configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // === Window Settings ===
    /// Window width in pixels
    pub window_width: u32,
    /// Window height in pixels
    pub window_height: u32,
    /// Enable VSync
    pub vsync: bool,

    // === Renderer Settings ===
    /// Backend used at startup
    pub backend: BackendKind,
    /// Enable GPU validation layers
    pub gpu_validation: bool,

    // === Scene Settings ===
    /// Scene variant
    pub variant: SceneVariant,
    /// Initial particle count
    pub particle_count: u32,
    /// Initial fall speed (0-10)
    pub fall_speed: f32,
    /// RNG seed for particle placement (None = random)
    pub seed: Option<u64>,
    /// Image assets
    pub assets: AssetPaths,

    // === Instrumentation ===
    /// Frames per rolling frame-time average
    pub timing_window: usize,
    /// Run this many frames on the headless backend instead of opening a window
    pub headless_frames: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            // Window
            window_width: 1280,
            window_height: 720,
            vsync: true,

            // Renderer
            backend: BackendKind::Legacy,
            gpu_validation: cfg!(debug_assertions),

            // Scene
            variant: SceneVariant::Sprites,
            particle_count: 50,
            fall_speed: 5.0,
            seed: None,
            assets: AssetPaths::default(),

            // Instrumentation
            timing_window: DEFAULT_TIMING_WINDOW,
            headless_frames: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from `FLURRY_CONFIG` or the default file location,
    /// then apply the `FLURRY_GPU_COMPUTE` backend flag if set.
    /// Returns default config if the file doesn't exist.
    pub fn load() -> Self {
        let path = std::env::var_os(CONFIG_ENV).map_or_else(Self::config_path, PathBuf::from);
        let mut config = Self::load_from(path);
        if let Ok(flag) = std::env::var(GPU_COMPUTE_ENV) {
            config.apply_backend_flag(&flag);
        }
        config
    }

    /// Selects the backend from a boolean flag (`true`/`1` for GPU compute,
    /// `false`/`0` for legacy). Unrecognized values leave the backend unchanged.
    pub fn apply_backend_flag(&mut self, flag: &str) -> bool {
        let gpu_compute = match flag.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => true,
            "0" | "false" | "no" => false,
            other => {
                warn!("Ignoring {GPU_COMPUTE_ENV}={other}: expected a boolean");
                return false;
            },
        };
        self.backend = BackendKind::from_flag(gpu_compute);
        info!("Backend selected by flag: {}", self.backend);
        true
    }

    /// Load configuration from a specific path.
    /// Returns default config if the file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Failed to read config file: {e}");
                return Self::default();
            },
        };

        match toml::from_str::<Self>(&contents) {
            Ok(mut config) => {
                info!("Loaded config from {}", path.display());
                config.validate();
                config
            },
            Err(e) => {
                warn!("Failed to parse config file: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Default configuration file path: `<config dir>/flurry/flurry.toml`, or
    /// the working directory when the platform has no config directory.
    #[must_use]
    pub fn config_path() -> PathBuf {
        dirs::config_dir().map_or_else(
            || PathBuf::from(CONFIG_FILE),
            |dir| dir.join(CONFIG_DIR).join(CONFIG_FILE),
        )
    }

    /// Validate and clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        // Window size
        self.window_width = self.window_width.clamp(320, 7680);
        self.window_height = self.window_height.clamp(240, 4320);

        // Scene
        let (min, max, _) = self.variant.count_range();
        self.particle_count = self.particle_count.clamp(min, max);
        self.fall_speed = if self.fall_speed.is_finite() {
            self.fall_speed.clamp(0.0, 10.0)
        } else {
            5.0
        };

        // Instrumentation
        self.timing_window = self.timing_window.clamp(1, 100_000);
    }
}
