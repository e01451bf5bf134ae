//! Live-tunable scene parameters.
//!
//! The panel owns the two values the UI can change, particle count and fall
//! speed, and clamps every write to its control bounds. It reports whether a
//! write changed anything so the engine can react (a count change rebuilds the
//! particle field synchronously).

use crate::config::SceneVariant;

/// Bounds and step of one numeric control.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliderSpec {
    /// Smallest value
    pub min: f32,
    /// Largest value
    pub max: f32,
    /// Increment used by keyboard nudges
    pub step: f32,
}

impl SliderSpec {
    /// Fall speed control: 0-10 in steps of 1.
    pub const FALL_SPEED: Self = Self {
        min: 0.0,
        max: 10.0,
        step: 1.0,
    };

    /// Particle count control for a scene variant.
    #[must_use]
    pub fn particle_count(variant: SceneVariant) -> Self {
        let (min, max, step) = variant.count_range();
        Self {
            min: min as f32,
            max: max as f32,
            step: step as f32,
        }
    }

    /// Clamps a value into range. NaN maps to the minimum.
    #[must_use]
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            return self.min;
        }
        value.clamp(self.min, self.max)
    }

    /// Moves `value` by whole steps and clamps.
    #[must_use]
    pub fn nudge(&self, value: f32, steps: i32) -> f32 {
        self.clamp(value + steps as f32 * self.step)
    }
}

/// One named control with its current value, for display.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelBinding {
    /// Control label
    pub name: &'static str,
    /// Current value
    pub value: f32,
    /// Control bounds
    pub spec: SliderSpec,
}

/// Particle count and fall speed, clamped to their controls.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterPanel {
    count_spec: SliderSpec,
    particle_count: u32,
    fall_speed: f32,
}

impl ParameterPanel {
    /// Creates the panel with initial values (clamped).
    #[must_use]
    pub fn new(variant: SceneVariant, particle_count: u32, fall_speed: f32) -> Self {
        let count_spec = SliderSpec::particle_count(variant);
        Self {
            count_spec,
            particle_count: count_spec.clamp(particle_count as f32) as u32,
            fall_speed: SliderSpec::FALL_SPEED.clamp(fall_speed),
        }
    }

    /// Current particle count.
    #[must_use]
    pub const fn particle_count(&self) -> u32 {
        self.particle_count
    }

    /// Current fall speed.
    #[must_use]
    pub const fn fall_speed(&self) -> f32 {
        self.fall_speed
    }

    /// Particle count control bounds.
    #[must_use]
    pub const fn count_spec(&self) -> &SliderSpec {
        &self.count_spec
    }

    /// Writes the particle count. Returns the new value if it changed.
    pub fn set_particle_count(&mut self, count: u32) -> Option<u32> {
        let count = self.count_spec.clamp(count as f32) as u32;
        if count == self.particle_count {
            return None;
        }
        self.particle_count = count;
        Some(count)
    }

    /// Writes the fall speed. Returns the stored (clamped) value.
    pub fn set_fall_speed(&mut self, speed: f32) -> f32 {
        self.fall_speed = SliderSpec::FALL_SPEED.clamp(speed);
        self.fall_speed
    }

    /// Moves the particle count by whole steps. Returns the new value if it changed.
    pub fn nudge_particle_count(&mut self, steps: i32) -> Option<u32> {
        let next = self.count_spec.nudge(self.particle_count as f32, steps);
        self.set_particle_count(next as u32)
    }

    /// Moves the fall speed by whole steps.
    pub fn nudge_fall_speed(&mut self, steps: i32) -> f32 {
        self.set_fall_speed(SliderSpec::FALL_SPEED.nudge(self.fall_speed, steps))
    }

    /// Both controls with their current values.
    #[must_use]
    pub fn bindings(&self) -> [PanelBinding; 2] {
        [
            PanelBinding {
                name: "particleCount",
                value: self.particle_count as f32,
                spec: self.count_spec,
            },
            PanelBinding {
                name: "fallSpeed",
                value: self.fall_speed,
                spec: SliderSpec::FALL_SPEED,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_values_are_clamped() {
        let panel = ParameterPanel::new(SceneVariant::Sprites, 0, 99.0);
        assert_eq!(panel.particle_count(), 1);
        assert!((panel.fall_speed() - 10.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_set_particle_count_reports_changes() {
        let mut panel = ParameterPanel::new(SceneVariant::Sprites, 50, 5.0);
        assert_eq!(panel.set_particle_count(200), Some(200));
        assert_eq!(panel.set_particle_count(200), None);
        assert_eq!(panel.set_particle_count(1_000_000), Some(5000));
    }

    #[test]
    fn test_dense_range() {
        let mut panel = ParameterPanel::new(SceneVariant::Dense, 50, 5.0);
        assert_eq!(panel.set_particle_count(10_000), Some(10_000));
        assert_eq!(panel.nudge_particle_count(-1), Some(9_999));
    }

    #[test]
    fn test_fall_speed_clamp() {
        let mut panel = ParameterPanel::new(SceneVariant::Sprites, 50, 5.0);
        assert!((panel.set_fall_speed(-3.0)).abs() < f32::EPSILON);
        assert!((panel.set_fall_speed(f32::NAN)).abs() < f32::EPSILON);
        assert!((panel.nudge_fall_speed(3) - 3.0).abs() < f32::EPSILON);
        assert!((panel.nudge_fall_speed(20) - 10.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_nudge_count_uses_step() {
        let mut panel = ParameterPanel::new(SceneVariant::Sprites, 50, 5.0);
        assert_eq!(panel.nudge_particle_count(1), Some(150));
        assert_eq!(panel.nudge_particle_count(-5), Some(1));
        assert_eq!(panel.nudge_particle_count(-1), None);
    }

    #[test]
    fn test_bindings() {
        let panel = ParameterPanel::new(SceneVariant::Sprites, 50, 5.0);
        let [count, speed] = panel.bindings();
        assert_eq!(count.name, "particleCount");
        assert!((count.spec.max - 5000.0).abs() < f32::EPSILON);
        assert_eq!(speed.name, "fallSpeed");
        assert!((speed.value - 5.0).abs() < f32::EPSILON);
    }
}
