//! Scoped GPU-visible resource accounting.
//!
//! Every scene object that owns backend-side state (camera and light uniform
//! blocks, the ground mesh, the skybox, each particle sprite, uploaded textures)
//! holds a [`GpuResource`] handle. Dropping the handle releases the resource, so
//! rebuilding the particle field or tearing down an engine can never leak.
//!
//! The tracker counts live handles per [`ResourceKind`] and the total number of
//! acquisitions ever made, which is what tests use to prove that a failed
//! bootstrap allocated nothing.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Category of a tracked resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum ResourceKind {
    /// Camera uniform block
    Camera = 0,
    /// Directional light uniform block
    Light = 1,
    /// Ground plane mesh
    Ground = 2,
    /// Skybox geometry
    Skybox = 3,
    /// One particle sprite instance
    Sprite = 4,
    /// Uploaded texture
    Texture = 5,
}

impl ResourceKind {
    const COUNT: usize = 6;

    /// Get all resource kinds.
    #[must_use]
    pub const fn all() -> [Self; Self::COUNT] {
        [
            Self::Camera,
            Self::Light,
            Self::Ground,
            Self::Skybox,
            Self::Sprite,
            Self::Texture,
        ]
    }
}

#[derive(Default)]
struct TrackerInner {
    live: [AtomicU64; ResourceKind::COUNT],
    acquired: AtomicU64,
    released: AtomicU64,
}

/// Shared counter of GPU-visible resources.
///
/// Cheap to clone; all clones observe the same counts.
#[derive(Clone, Default)]
pub struct ResourceTracker {
    inner: Arc<TrackerInner>,
}

impl ResourceTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires a resource of the given kind. Released when the handle drops.
    #[must_use]
    pub fn acquire(&self, kind: ResourceKind) -> GpuResource {
        self.inner.live[kind as usize].fetch_add(1, Ordering::Relaxed);
        self.inner.acquired.fetch_add(1, Ordering::Relaxed);
        GpuResource {
            kind,
            tracker: self.clone(),
        }
    }

    /// Number of live resources of one kind.
    #[must_use]
    pub fn live(&self, kind: ResourceKind) -> u64 {
        self.inner.live[kind as usize].load(Ordering::Relaxed)
    }

    /// Number of live resources across all kinds.
    #[must_use]
    pub fn live_total(&self) -> u64 {
        ResourceKind::all().iter().map(|&k| self.live(k)).sum()
    }

    /// Total acquisitions since the tracker was created.
    #[must_use]
    pub fn total_acquired(&self) -> u64 {
        self.inner.acquired.load(Ordering::Relaxed)
    }

    /// Total releases since the tracker was created.
    #[must_use]
    pub fn total_released(&self) -> u64 {
        self.inner.released.load(Ordering::Relaxed)
    }

    fn release(&self, kind: ResourceKind) {
        self.inner.live[kind as usize].fetch_sub(1, Ordering::Relaxed);
        self.inner.released.fetch_add(1, Ordering::Relaxed);
    }
}

impl fmt::Debug for ResourceTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceTracker")
            .field("live", &self.live_total())
            .field("acquired", &self.total_acquired())
            .field("released", &self.total_released())
            .finish()
    }
}

/// Handle to one tracked resource.
#[derive(Debug)]
pub struct GpuResource {
    kind: ResourceKind,
    tracker: ResourceTracker,
}

impl GpuResource {
    /// Kind of this resource.
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        self.kind
    }
}

impl Drop for GpuResource {
    fn drop(&mut self) {
        self.tracker.release(self.kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_release() {
        let tracker = ResourceTracker::new();
        let sprite = tracker.acquire(ResourceKind::Sprite);
        let light = tracker.acquire(ResourceKind::Light);

        assert_eq!(sprite.kind(), ResourceKind::Sprite);
        assert_eq!(tracker.live(ResourceKind::Sprite), 1);
        assert_eq!(tracker.live_total(), 2);

        drop(sprite);
        assert_eq!(tracker.live(ResourceKind::Sprite), 0);
        assert_eq!(tracker.live(ResourceKind::Light), 1);
        assert_eq!(tracker.total_acquired(), 2);
        assert_eq!(tracker.total_released(), 1);

        drop(light);
        assert_eq!(tracker.live_total(), 0);
    }

    #[test]
    fn test_clones_share_counts() {
        let tracker = ResourceTracker::new();
        let other = tracker.clone();
        let handles: Vec<_> = (0..10)
            .map(|_| other.acquire(ResourceKind::Sprite))
            .collect();

        assert_eq!(tracker.live(ResourceKind::Sprite), 10);
        drop(handles);
        assert_eq!(tracker.live(ResourceKind::Sprite), 0);
        assert_eq!(tracker.total_released(), 10);
    }
}
