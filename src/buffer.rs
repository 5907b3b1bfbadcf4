//! The one piece of state both threads touch.

use parking_lot::Mutex;
use pointclouds_core::PointCloud;
use pointclouds_viewer::CloudStyle;

/// What the render thread shows for the live cloud.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneSnapshot {
    pub cloud: PointCloud,
    pub style: CloudStyle,
    /// Bumped by every publish and every replace.
    pub generation: u64,
    /// Number of replaces (reset cycles) so far.
    pub resets: u64,
    pub fitness_score: f32,
}

impl SceneSnapshot {
    /// Copy in a refined cloud.
    pub fn publish(&mut self, cloud: &PointCloud, style: CloudStyle, fitness_score: f32) -> u64 {
        self.cloud.clone_from(cloud);
        self.style = style;
        self.fitness_score = fitness_score;
        self.generation += 1;
        self.generation
    }

    /// Swap in a fresh cloud and count it as a reset.
    pub fn replace(&mut self, cloud: &PointCloud, style: CloudStyle) -> u64 {
        self.cloud.clone_from(cloud);
        self.style = style;
        self.fitness_score = f32::INFINITY;
        self.resets += 1;
        self.generation += 1;
        self.generation
    }
}

/// A [`SceneSnapshot`] behind a single mutex.
///
/// Every access goes through a closure so the lock is held exactly for the
/// copy in or out, never across registration work.
#[derive(Debug)]
pub struct SharedSceneBuffer {
    inner: Mutex<SceneSnapshot>,
}

impl SharedSceneBuffer {
    pub fn new(initial: PointCloud, style: CloudStyle) -> Self {
        Self {
            inner: Mutex::new(SceneSnapshot {
                cloud: initial,
                style,
                generation: 0,
                resets: 0,
                fitness_score: f32::INFINITY,
            }),
        }
    }

    pub fn publish(&self, cloud: &PointCloud, style: CloudStyle, fitness_score: f32) -> u64 {
        self.inner.lock().publish(cloud, style, fitness_score)
    }

    pub fn replace(&self, cloud: &PointCloud, style: CloudStyle) -> u64 {
        self.inner.lock().replace(cloud, style)
    }

    /// Run `f` with the lock held and the snapshot writable.
    pub fn update<T>(&self, f: impl FnOnce(&mut SceneSnapshot) -> T) -> T {
        f(&mut *self.inner.lock())
    }

    /// Run `f` with the lock held on a consistent snapshot.
    pub fn with_snapshot<T>(&self, f: impl FnOnce(&SceneSnapshot) -> T) -> T {
        f(&*self.inner.lock())
    }

    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    pub fn resets(&self) -> u64 {
        self.inner.lock().resets
    }
}

#[cfg(test)]
mod tests {
    use super::SharedSceneBuffer;
    use pointclouds_core::PointCloud;
    use pointclouds_viewer::CloudStyle;

    fn one_point(v: f32) -> PointCloud {
        PointCloud::from_xyz(vec![v], vec![v], vec![v])
    }

    #[test]
    fn publish_bumps_generation_only() {
        let buffer = SharedSceneBuffer::new(one_point(0.0), CloudStyle::Native);
        assert_eq!(buffer.generation(), 0);
        assert_eq!(buffer.publish(&one_point(1.0), CloudStyle::Flat([1, 2, 3]), 0.5), 1);
        buffer.with_snapshot(|s| {
            assert_eq!(s.cloud, one_point(1.0));
            assert_eq!(s.style, CloudStyle::Flat([1, 2, 3]));
            assert_eq!(s.fitness_score, 0.5);
            assert_eq!(s.resets, 0);
        });
    }

    #[test]
    fn replace_counts_resets() {
        let buffer = SharedSceneBuffer::new(one_point(0.0), CloudStyle::Native);
        buffer.publish(&one_point(1.0), CloudStyle::Native, 0.1);
        assert_eq!(buffer.replace(&one_point(0.0), CloudStyle::Native), 2);
        assert_eq!(buffer.resets(), 1);
        buffer.with_snapshot(|s| {
            assert_eq!(s.cloud, one_point(0.0));
            assert!(s.fitness_score.is_infinite());
        });
    }

    #[test]
    fn update_returns_closure_value() {
        let buffer = SharedSceneBuffer::new(one_point(0.0), CloudStyle::Native);
        let len = buffer.update(|s| {
            s.cloud = PointCloud::from_xyz(vec![1.0, 2.0], vec![0.0; 2], vec![0.0; 2]);
            s.cloud.len()
        });
        assert_eq!(len, 2);
        assert_eq!(buffer.with_snapshot(|s| s.cloud.len()), 2);
    }
}
