//! Falling-snow particle field.
//!
//! Particles are independent billboard sprites. The field is rebuilt wholesale
//! whenever the particle count changes and advanced once per frame by
//! [`ParticleField::tick`]. Motion is a stateless fall-and-recycle policy, not a
//! physical simulation: a particle that drops below the ground is moved back to
//! the recycle ceiling with fresh horizontal coordinates.

use glam::Vec3;
use tracing::debug;

use crate::resource::{GpuResource, ResourceKind, ResourceTracker};

/// Half extent of the horizontal spawn square (x and z in `[-500, 500)`).
pub const SPAWN_HALF_EXTENT: f32 = 500.0;

/// Upper bound of the initial spawn height (y in `[0, 750)`).
pub const SPAWN_HEIGHT: f32 = 750.0;

/// Uniform sprite scale shared by every particle.
pub const SPRITE_SCALE: f32 = 5.0;

/// Constants that shape how a field falls and recycles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldProfile {
    /// Multiplier applied to `random * speed`.
    pub fall_factor: f32,
    /// Constant added to every fall step.
    pub fall_bias: f32,
    /// Height a particle is moved to when it drops below zero.
    pub recycle_height: f32,
}

impl FieldProfile {
    /// Sprite-scene profile: gentle fall, recycles at 500.
    pub const SPRITES: Self = Self {
        fall_factor: 0.1,
        fall_bias: 0.2,
        recycle_height: 500.0,
    };

    /// Dense-scene profile: faster fall, recycles at 400.
    pub const DENSE: Self = Self {
        fall_factor: 0.5,
        fall_bias: 0.2,
        recycle_height: 400.0,
    };

    /// Height drop for one step given a random factor in `[0, 1)`.
    #[must_use]
    pub fn fall_step(&self, random: f32, speed: f32) -> f32 {
        random * speed * self.fall_factor + self.fall_bias
    }
}

impl Default for FieldProfile {
    fn default() -> Self {
        Self::SPRITES
    }
}

/// One snowflake.
#[derive(Debug)]
pub struct Particle {
    /// World position.
    pub position: Vec3,
    /// Sprite scale (constant).
    pub scale: Vec3,
    /// Height drop applied by the most recent tick.
    pub fall_rate: f32,
    _sprite: GpuResource,
}

/// Rebuildable collection of snow particles.
#[derive(Debug)]
pub struct ParticleField {
    particles: Vec<Particle>,
    target_count: u32,
    profile: FieldProfile,
    rng: fastrand::Rng,
    tracker: ResourceTracker,
    rebuilds: u64,
}

impl ParticleField {
    /// Creates an empty field. Call [`ParticleField::rebuild`] to populate it.
    #[must_use]
    pub fn new(profile: FieldProfile, seed: Option<u64>, tracker: ResourceTracker) -> Self {
        let rng = seed.map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed);
        Self {
            particles: Vec::new(),
            target_count: 0,
            profile,
            rng,
            tracker,
            rebuilds: 0,
        }
    }

    /// Replaces every particle with `count` freshly placed ones.
    ///
    /// Previous particles are dropped first, releasing their sprite resources.
    pub fn rebuild(&mut self, count: u32) {
        self.particles.clear();
        self.particles.reserve(count as usize);

        for _ in 0..count {
            let position = Vec3::new(
                self.random_horizontal(),
                self.rng.f32() * SPAWN_HEIGHT,
                self.random_horizontal(),
            );
            self.particles.push(Particle {
                position,
                scale: Vec3::splat(SPRITE_SCALE),
                fall_rate: 0.0,
                _sprite: self.tracker.acquire(ResourceKind::Sprite),
            });
        }

        self.target_count = count;
        self.rebuilds += 1;
        debug!("Particle field rebuilt with {count} particles");
    }

    /// Advances every particle by one frame. Returns how many were recycled.
    pub fn tick(&mut self, speed: f32) -> usize {
        let mut recycled = 0;

        for i in 0..self.particles.len() {
            let step = self.profile.fall_step(self.rng.f32(), speed);
            let x = self.random_horizontal();
            let z = self.random_horizontal();

            let particle = &mut self.particles[i];
            particle.fall_rate = step;
            particle.position.y -= step;

            if particle.position.y < 0.0 {
                particle.position = Vec3::new(x, self.profile.recycle_height, z);
                recycled += 1;
            }
        }

        recycled
    }

    /// Number of particles currently in the field.
    #[must_use]
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    /// Returns true if the field holds no particles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Count requested by the most recent rebuild.
    #[must_use]
    pub const fn target_count(&self) -> u32 {
        self.target_count
    }

    /// Number of rebuilds performed so far.
    #[must_use]
    pub const fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }

    /// Fall/recycle constants.
    #[must_use]
    pub const fn profile(&self) -> &FieldProfile {
        &self.profile
    }

    /// Iterates over the particles in order.
    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter()
    }

    fn random_horizontal(&mut self) -> f32 {
        self.rng.f32() * SPAWN_HALF_EXTENT * 2.0 - SPAWN_HALF_EXTENT
    }
}
