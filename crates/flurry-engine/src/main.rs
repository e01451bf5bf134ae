//! Flurry viewer entry point.

use anyhow::{Context, Result};
use flurry_engine::{app, session, EngineConfig};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Main entry point.
fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("flurry=info".parse()?))
        .init();

    info!("Flurry starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = EngineConfig::load();

    if let Some(frames) = config.headless_frames {
        let summary = session::run_headless(&config, frames)
            .with_context(|| format!("Headless run on {} failed", config.backend))?;
        info!(
            "Rendered {} frames with {} particles (last window mean: {:?} ms)",
            summary.frames, summary.particles, summary.last_mean_ms
        );
    } else {
        app::run(config)?;
    }

    info!("Flurry shutdown complete");
    Ok(())
}
