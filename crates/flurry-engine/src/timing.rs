//! Frame-time instrumentation.
//!
//! [`FrameTimingBuffer`] collects per-frame durations into a fixed window and
//! yields the mean each time the window fills. [`FrameRate`] turns the
//! intervals between ticks into the rate shown by the stats overlay.

/// Fixed-capacity window of frame durations in milliseconds.
///
/// Writes go to the slot under the cursor. When the cursor reaches capacity the
/// mean of the whole window is returned and the cursor resets to zero; old
/// samples are overwritten by the next window rather than cleared.
#[derive(Debug, Clone)]
pub struct FrameTimingBuffer {
    samples: Vec<f64>,
    cursor: usize,
    windows: u64,
}

impl FrameTimingBuffer {
    /// Creates a buffer that reports every `capacity` samples.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity.max(1)],
            cursor: 0,
            windows: 0,
        }
    }

    /// Records one sample. Returns the window mean when this sample fills it.
    pub fn record(&mut self, millis: f64) -> Option<f64> {
        self.samples[self.cursor] = millis;
        self.cursor += 1;

        if self.cursor < self.samples.len() {
            return None;
        }

        self.cursor = 0;
        self.windows += 1;
        Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
    }

    /// Mean of the samples written so far in the current window.
    ///
    /// Never reported automatically; exposed for overlays and tests.
    #[must_use]
    pub fn partial_mean(&self) -> Option<f64> {
        if self.cursor == 0 {
            return None;
        }
        let written = &self.samples[..self.cursor];
        Some(written.iter().sum::<f64>() / written.len() as f64)
    }

    /// Window size.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    /// Write position within the current window.
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Number of completed windows.
    #[must_use]
    pub const fn completed_windows(&self) -> u64 {
        self.windows
    }
}

impl Default for FrameTimingBuffer {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_TIMING_WINDOW)
    }
}

/// Frame rate derived from the intervals between ticks.
///
/// Intervals accumulate until at least [`FrameRate::PERIOD_MS`] of frames have
/// been seen; the displayed rate then jumps to the mean of that batch. Holding
/// the value for a period keeps the title readable.
#[derive(Debug, Clone, Default)]
pub struct FrameRate {
    batch_ms: f64,
    batch_frames: u32,
    fps: f32,
    interval_ms: f32,
}

impl FrameRate {
    /// Span of intervals folded into one displayed value.
    pub const PERIOD_MS: f64 = 500.0;

    /// Meter with nothing measured yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the interval since the previous frame. Returns true when the
    /// displayed rate was refreshed.
    pub fn push(&mut self, interval_ms: f64) -> bool {
        if !interval_ms.is_finite() || interval_ms <= 0.0 {
            return false;
        }
        self.batch_ms += interval_ms;
        self.batch_frames += 1;
        if self.batch_ms < Self::PERIOD_MS {
            return false;
        }

        let mean = self.batch_ms / f64::from(self.batch_frames);
        self.interval_ms = mean as f32;
        self.fps = (1000.0 / mean) as f32;
        self.batch_ms = 0.0;
        self.batch_frames = 0;
        true
    }

    /// Frames per second over the last completed batch.
    #[must_use]
    pub const fn fps(&self) -> f32 {
        self.fps
    }

    /// Mean frame interval over the last completed batch.
    #[must_use]
    pub const fn interval_ms(&self) -> f32 {
        self.interval_ms
    }
}
