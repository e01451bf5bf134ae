//! Display overlays.
//!
//! Each engine brings two overlay elements: the stats panel and the controls
//! panel. They live in an [`OverlayHost`] keyed by [`OverlayId`], and attaching
//! an element removes any element already registered under the same id, so a
//! re-bootstrapped session never shows two stats panels.

use flurry_common::BackendKind;
use tracing::debug;

use crate::panel::{PanelBinding, ParameterPanel};
use crate::scheduler::TickReport;
use crate::timing::FrameRate;

/// Overlay slot identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayId {
    /// Frame statistics
    Stats,
    /// Parameter controls
    Gui,
}

impl OverlayId {
    /// Element id as shown in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stats => "stats",
            Self::Gui => "gui",
        }
    }
}

/// FPS, frame time and the last rolling mean.
#[derive(Debug)]
pub struct StatsPanel {
    backend: BackendKind,
    rate: FrameRate,
    particles: usize,
    last_frame_ms: f64,
    window_mean_ms: Option<f64>,
}

impl StatsPanel {
    /// Creates an empty panel for a backend.
    #[must_use]
    pub fn new(backend: BackendKind) -> Self {
        Self {
            backend,
            rate: FrameRate::new(),
            particles: 0,
            last_frame_ms: 0.0,
            window_mean_ms: None,
        }
    }

    /// Folds one tick into the statistics.
    pub fn record(&mut self, report: &TickReport, particles: usize) {
        if let Some(interval) = report.interval_ms {
            self.rate.push(interval);
        }
        self.particles = particles;
        self.last_frame_ms = report.elapsed_ms;
        if let Some(mean) = report.window_mean_ms {
            self.window_mean_ms = Some(mean);
        }
    }

    /// Backend the panel reports for.
    #[must_use]
    pub const fn backend(&self) -> BackendKind {
        self.backend
    }

    /// Smoothed frames per second.
    #[must_use]
    pub const fn fps(&self) -> f32 {
        self.rate.fps()
    }

    /// Most recent rolling mean.
    #[must_use]
    pub const fn window_mean_ms(&self) -> Option<f64> {
        self.window_mean_ms
    }

    /// Particles drawn in the last recorded frame.
    #[must_use]
    pub const fn particles(&self) -> usize {
        self.particles
    }

    /// One-line summary for the window title.
    #[must_use]
    pub fn format_line(&self) -> String {
        let mean = self
            .window_mean_ms
            .map_or_else(|| "-".to_string(), |m| format!("{m:.2}ms"));
        format!(
            "{} | FPS: {:.0} ({:.1}ms) | Work: {:.2}ms avg {} | Flakes: {}",
            self.backend.display_name(),
            self.rate.fps(),
            self.rate.interval_ms(),
            self.last_frame_ms,
            mean,
            self.particles
        )
    }
}

/// Current values of the parameter controls.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlsPanel {
    bindings: [PanelBinding; 2],
}

impl ControlsPanel {
    /// Snapshots a parameter panel.
    #[must_use]
    pub fn new(panel: &ParameterPanel) -> Self {
        Self {
            bindings: panel.bindings(),
        }
    }

    /// Updates the displayed values.
    pub fn refresh(&mut self, panel: &ParameterPanel) {
        self.bindings = panel.bindings();
    }

    /// Displayed controls.
    #[must_use]
    pub const fn bindings(&self) -> &[PanelBinding; 2] {
        &self.bindings
    }

    /// One-line summary for the window title.
    #[must_use]
    pub fn format_line(&self) -> String {
        self.bindings
            .iter()
            .map(|b| format!("{}: {}", b.name, b.value))
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

/// One attachable overlay element.
#[derive(Debug)]
pub enum Overlay {
    /// Stats panel
    Stats(StatsPanel),
    /// Controls panel
    Gui(ControlsPanel),
}

impl Overlay {
    /// Slot this element occupies.
    #[must_use]
    pub const fn id(&self) -> OverlayId {
        match self {
            Self::Stats(_) => OverlayId::Stats,
            Self::Gui(_) => OverlayId::Gui,
        }
    }

    /// One-line summary.
    #[must_use]
    pub fn format_line(&self) -> String {
        match self {
            Self::Stats(stats) => stats.format_line(),
            Self::Gui(controls) => controls.format_line(),
        }
    }
}

/// Container for attached overlay elements.
#[derive(Debug, Default)]
pub struct OverlayHost {
    elements: Vec<Overlay>,
    attached: u64,
    detached: u64,
}

impl OverlayHost {
    /// Creates an empty host.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches an element, first removing any element with the same id.
    /// Returns the removed element.
    pub fn attach(&mut self, overlay: Overlay) -> Option<Overlay> {
        let previous = self.detach(overlay.id());
        debug!("Attached overlay '{}'", overlay.id().as_str());
        self.elements.push(overlay);
        self.attached += 1;
        previous
    }

    /// Removes the element with `id`.
    pub fn detach(&mut self, id: OverlayId) -> Option<Overlay> {
        let index = self.elements.iter().position(|e| e.id() == id)?;
        self.detached += 1;
        debug!("Detached overlay '{}'", id.as_str());
        Some(self.elements.remove(index))
    }

    /// Removes every element.
    pub fn clear(&mut self) {
        for id in [OverlayId::Stats, OverlayId::Gui] {
            self.detach(id);
        }
    }

    /// Element with `id`.
    #[must_use]
    pub fn get(&self, id: OverlayId) -> Option<&Overlay> {
        self.elements.iter().find(|e| e.id() == id)
    }

    /// Attached stats panel.
    pub fn stats_mut(&mut self) -> Option<&mut StatsPanel> {
        self.elements.iter_mut().find_map(|e| match e {
            Overlay::Stats(stats) => Some(stats),
            Overlay::Gui(_) => None,
        })
    }

    /// Attached controls panel.
    pub fn controls_mut(&mut self) -> Option<&mut ControlsPanel> {
        self.elements.iter_mut().find_map(|e| match e {
            Overlay::Gui(controls) => Some(controls),
            Overlay::Stats(_) => None,
        })
    }

    /// Number of attached elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns true if nothing is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Total attach calls.
    #[must_use]
    pub const fn attach_count(&self) -> u64 {
        self.attached
    }

    /// Total elements removed.
    #[must_use]
    pub const fn detach_count(&self) -> u64 {
        self.detached
    }

    /// Window title: `base` followed by every element's summary.
    #[must_use]
    pub fn compose_title(&self, base: &str) -> String {
        let mut title = base.to_string();
        for element in &self.elements {
            title.push_str(" | ");
            title.push_str(&element.format_line());
        }
        title
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SceneVariant;

    fn report(elapsed_ms: f64, window_mean_ms: Option<f64>) -> TickReport {
        TickReport {
            frame: 0,
            elapsed_ms,
            interval_ms: Some(20.0),
            recycled: 0,
            textures_installed: 0,
            window_mean_ms,
        }
    }

    #[test]
    fn test_attach_replaces_same_id() {
        let mut host = OverlayHost::new();
        assert!(host
            .attach(Overlay::Stats(StatsPanel::new(BackendKind::Legacy)))
            .is_none());
        let previous = host.attach(Overlay::Stats(StatsPanel::new(BackendKind::GpuCompute)));

        assert!(matches!(previous, Some(Overlay::Stats(s)) if s.backend() == BackendKind::Legacy));
        assert_eq!(host.len(), 1);
        assert_eq!(host.detach_count(), 1);
    }

    #[test]
    fn test_clear_removes_all() {
        let panel = ParameterPanel::new(SceneVariant::Sprites, 50, 5.0);
        let mut host = OverlayHost::new();
        host.attach(Overlay::Stats(StatsPanel::new(BackendKind::Legacy)));
        host.attach(Overlay::Gui(ControlsPanel::new(&panel)));
        assert_eq!(host.len(), 2);

        host.clear();
        assert!(host.is_empty());
        assert!(host.get(OverlayId::Gui).is_none());
    }

    #[test]
    fn test_stats_keeps_last_mean() {
        let mut stats = StatsPanel::new(BackendKind::Legacy);
        stats.record(&report(1.0, Some(2.5)), 50);
        stats.record(&report(1.0, None), 50);
        assert_eq!(stats.window_mean_ms(), Some(2.5));
        assert_eq!(stats.particles(), 50);
        assert!(stats.format_line().starts_with("Legacy"));
    }

    #[test]
    fn test_stats_rate_follows_tick_intervals() {
        let mut stats = StatsPanel::new(BackendKind::GpuCompute);
        let first = TickReport {
            interval_ms: None,
            ..report(1.0, None)
        };
        stats.record(&first, 10);
        for _ in 0..25 {
            stats.record(&report(1.0, None), 10);
        }

        // 25 intervals of 20ms fill one 500ms period.
        assert!((stats.fps() - 50.0).abs() < 1e-3);
        assert!(stats.format_line().contains("FPS: 50 (20.0ms)"));
    }

    #[test]
    fn test_controls_refresh() {
        let mut panel = ParameterPanel::new(SceneVariant::Sprites, 50, 5.0);
        let mut controls = ControlsPanel::new(&panel);
        panel.set_particle_count(300);
        controls.refresh(&panel);
        assert_eq!(controls.format_line(), "particleCount: 300 | fallSpeed: 5");
    }

    #[test]
    fn test_compose_title() {
        let panel = ParameterPanel::new(SceneVariant::Sprites, 50, 5.0);
        let mut host = OverlayHost::new();
        assert_eq!(host.compose_title("Flurry"), "Flurry");
        host.attach(Overlay::Gui(ControlsPanel::new(&panel)));
        assert_eq!(host.compose_title("Flurry"), "Flurry | particleCount: 50 | fallSpeed: 5");
        assert!(host.controls_mut().is_some());
        assert!(host.stats_mut().is_none());
    }
}
