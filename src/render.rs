use std::sync::Arc;
use std::thread;
use std::time::Duration;

use pointclouds_viewer::{Surface, ViewportId};
use tracing::{debug, info};

use crate::scene::MOVING_ID;
use crate::LiveContext;

/// Foreground loop that mirrors the shared buffer onto a surface.
///
/// Must run on the thread that owns the surface.
pub struct RenderLoop {
    context: Arc<LiveContext>,
    viewport: ViewportId,
    interval: Duration,
    shown_generation: Option<u64>,
    shown_resets: u64,
    frames: u64,
}

impl RenderLoop {
    pub fn new(context: Arc<LiveContext>, viewport: ViewportId, interval: Duration) -> Self {
        Self {
            context,
            viewport,
            interval,
            shown_generation: None,
            shown_resets: 0,
            frames: 0,
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Push the latest snapshot (if it changed) and service the surface once.
    ///
    /// Returns `false` once the surface is closed; the context is closed too so
    /// the compute thread winds down.
    pub fn cycle<S: Surface>(&mut self, surface: &mut S) -> bool {
        if surface.is_closed() || self.context.is_closed() {
            self.context.close();
            return false;
        }

        let shown = &mut self.shown_generation;
        let viewport = self.viewport;
        let resets = self.context.buffer.with_snapshot(|snapshot| {
            if *shown != Some(snapshot.generation) {
                surface.add_or_update_cloud(MOVING_ID, &snapshot.cloud, snapshot.style, viewport);
                *shown = Some(snapshot.generation);
            }
            snapshot.resets
        });
        if resets > self.shown_resets {
            info!(resets, "moving cloud shown back at misaligned pose");
            self.shown_resets = resets;
        }

        surface.poll_events(self.interval);
        self.frames += 1;
        true
    }

    /// Cycle until the surface closes, sleeping one frame interval between cycles.
    pub fn run<S: Surface>(&mut self, surface: &mut S) {
        while self.cycle(surface) {
            thread::sleep(self.interval);
        }
        debug!(frames = self.frames, "render loop finished");
    }
}

#[cfg(test)]
mod tests {
    use super::RenderLoop;
    use crate::scene::MOVING_ID;
    use crate::{LiveContext, SharedSceneBuffer};
    use pointclouds_core::PointCloud;
    use pointclouds_viewer::{CloudStyle, HeadlessSurface, Surface, ViewportRect};
    use std::sync::Arc;
    use std::time::Duration;

    fn point(v: f32) -> PointCloud {
        PointCloud::from_xyz(vec![v], vec![v], vec![v])
    }

    #[test]
    fn pushes_new_generations_only() {
        let context = Arc::new(LiveContext::new(SharedSceneBuffer::new(
            point(0.0),
            CloudStyle::Flat([1, 1, 1]),
        )));
        let mut surface = HeadlessSurface::new();
        let vp = surface.create_viewport(ViewportRect::FULL);
        let mut render = RenderLoop::new(Arc::clone(&context), vp, Duration::ZERO);

        assert!(render.cycle(&mut surface));
        assert!(render.cycle(&mut surface));
        assert_eq!(surface.display().updates(), 1);

        context.buffer.publish(&point(2.0), CloudStyle::Flat([1, 1, 1]), 0.0);
        assert!(render.cycle(&mut surface));
        assert_eq!(surface.display().updates(), 2);
        let shown = surface.display().viewport(vp).unwrap().cloud(MOVING_ID).unwrap();
        assert_eq!(shown.positions, vec![[2.0, 2.0, 2.0]]);
        assert_eq!(render.frames(), 3);
        assert_eq!(surface.polls(), 3);
    }

    #[test]
    fn closed_surface_closes_context() {
        let context = Arc::new(LiveContext::new(SharedSceneBuffer::new(
            point(0.0),
            CloudStyle::Native,
        )));
        let mut surface = HeadlessSurface::new().with_max_polls(2);
        let vp = surface.create_viewport(ViewportRect::FULL);
        let mut render = RenderLoop::new(Arc::clone(&context), vp, Duration::ZERO);
        render.run(&mut surface);
        assert_eq!(render.frames(), 2);
        assert!(context.is_closed());
    }
}
