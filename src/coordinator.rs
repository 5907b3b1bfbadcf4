//! The compute thread: refine, publish, and periodically rewind.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use pointclouds_core::PointCloud;
use tracing::{debug, error, info};

use crate::color::{ColorMode, MOVING_COLOR};
use crate::engine::{AlignmentEngine, AlignmentState};
use crate::{AlignError, LiveConfig, LiveContext, ResetCycle, Scene};

pub const COMPUTE_THREAD_NAME: &str = "icp-compute";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Running,
    Stopped,
}

/// What one turn of the compute loop did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tick {
    /// The pass did not converge; nothing was published.
    Retry,
    Published { generation: u64, fitness_score: f32 },
    /// A converged pass was published and the reset period was reached.
    Reset { resets: u64 },
    Stopped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub steps: u64,
    pub converged_steps: u64,
    pub resets: u64,
}

pub struct ConcurrencyCoordinator {
    context: Arc<LiveContext>,
    engine: AlignmentEngine,
    state: AlignmentState,
    misaligned: PointCloud,
    mode: ColorMode,
    cycle: ResetCycle,
    phase: CoordinatorState,
    summary: RunSummary,
}

impl ConcurrencyCoordinator {
    /// The moving cloud starts as a copy of the scene's misaligned cloud.
    pub fn new(context: Arc<LiveContext>, scene: &Scene, config: &LiveConfig) -> Self {
        Self {
            context,
            engine: AlignmentEngine::new(&scene.target, config.icp_params()),
            state: AlignmentState::new(Arc::clone(&scene.target), scene.misaligned.clone()),
            misaligned: scene.misaligned.clone(),
            mode: scene.moving_mode,
            cycle: ResetCycle::new(config.reset_period),
            phase: CoordinatorState::Running,
            summary: RunSummary::default(),
        }
    }

    pub fn state(&self) -> &AlignmentState {
        &self.state
    }

    pub fn cycle(&self) -> &ResetCycle {
        &self.cycle
    }

    pub fn phase(&self) -> CoordinatorState {
        self.phase
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    /// One turn of the compute loop.
    ///
    /// The registration pass runs without the buffer lock; only the publish
    /// and the reset take it.
    pub fn tick(&mut self) -> Result<Tick, AlignError> {
        if self.phase == CoordinatorState::Stopped {
            return Ok(Tick::Stopped);
        }
        if self.context.is_closed() {
            self.phase = CoordinatorState::Stopped;
            return Ok(Tick::Stopped);
        }

        let started = Instant::now();
        let outcome = self.engine.step(&mut self.state)?;
        let took = started.elapsed();
        self.summary.steps += 1;

        if !outcome.converged {
            return Ok(Tick::Retry);
        }
        self.summary.converged_steps += 1;
        debug!("Converged - Error: {}", outcome.fitness_score);

        let style = self.mode.style(MOVING_COLOR);
        let generation =
            self.context
                .buffer
                .publish(&self.state.moving, style, outcome.fitness_score);

        if !self.cycle.accumulate(took) {
            return Ok(Tick::Published {
                generation,
                fitness_score: outcome.fitness_score,
            });
        }
        Ok(Tick::Reset {
            resets: self.reset(),
        })
    }

    /// Put the moving cloud back at the misaligned pose. The buffer, the
    /// alignment state and the cycle counter all change under one lock.
    fn reset(&mut self) -> u64 {
        let style = self.mode.style(MOVING_COLOR);
        let Self {
            context,
            state,
            misaligned,
            cycle,
            ..
        } = self;

        let resets = context.buffer.update(|snapshot| {
            state.moving.clone_from(misaligned);
            state.has_converged = false;
            state.fitness_score = f32::INFINITY;
            cycle.reset();
            snapshot.replace(misaligned, style);
            snapshot.resets
        });

        self.summary.resets = resets;
        info!(resets, "reset moving cloud to misaligned pose");
        resets
    }

    /// Loop on [`tick`](Self::tick) until the context is closed.
    ///
    /// A failed step stops the loop and hands the error back.
    pub fn run(mut self) -> Result<RunSummary, AlignError> {
        info!(
            period_ms = self.cycle.period().as_millis() as u64,
            mode = ?self.mode,
            "alignment loop started"
        );
        loop {
            match self.tick() {
                Ok(Tick::Stopped) => break,
                Ok(_) => {}
                Err(err) => {
                    error!(%err, "alignment step failed, stopping compute loop");
                    self.phase = CoordinatorState::Stopped;
                    return Err(err);
                }
            }
        }
        info!(
            steps = self.summary.steps,
            converged = self.summary.converged_steps,
            resets = self.summary.resets,
            "alignment loop stopped"
        );
        Ok(self.summary)
    }

    pub fn spawn(self) -> io::Result<JoinHandle<Result<RunSummary, AlignError>>> {
        thread::Builder::new()
            .name(COMPUTE_THREAD_NAME.to_owned())
            .spawn(move || self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConcurrencyCoordinator, CoordinatorState, Tick};
    use crate::scene::test_misalignment;
    use crate::{LiveConfig, LiveContext, Scene, SharedSceneBuffer};
    use pointclouds_core::PointCloud;
    use pointclouds_registration::apply_transform;
    use pointclouds_viewer::CloudStyle;
    use std::sync::Arc;
    use std::time::Duration;

    fn ring(n: usize) -> PointCloud {
        let t: Vec<f32> = (0..n).map(|i| i as f32 * 0.13).collect();
        PointCloud::from_xyz(
            t.iter().map(|t| t.cos() * (1.0 + 0.1 * t)).collect(),
            t.iter().map(|t| t.sin()).collect(),
            t.iter().map(|t| (t * 0.5).sin() * 0.2).collect(),
        )
    }

    fn setup(period: Duration) -> (Arc<LiveContext>, ConcurrencyCoordinator, Scene) {
        let target = ring(80);
        let misaligned = apply_transform(&target, &test_misalignment());
        let scene = Scene::from_clouds(target, misaligned.clone());
        let context = Arc::new(LiveContext::new(SharedSceneBuffer::new(
            misaligned,
            CloudStyle::Native,
        )));
        let mut config = LiveConfig::new("unused.pcd");
        config.reset_period = period;
        let coordinator = ConcurrencyCoordinator::new(Arc::clone(&context), &scene, &config);
        (context, coordinator, scene)
    }

    #[test]
    fn converged_steps_publish() {
        let (context, mut coordinator, scene) = setup(Duration::from_secs(3600));
        let tick = coordinator.tick().unwrap();
        assert!(matches!(tick, Tick::Published { generation: 1, .. }));
        assert_eq!(context.buffer.generation(), 1);
        context.buffer.with_snapshot(|s| {
            assert_ne!(s.cloud, scene.misaligned);
            assert_eq!(s.cloud, coordinator.state().moving);
        });
        assert!(coordinator.cycle().elapsed() > Duration::ZERO);
    }

    #[test]
    fn zero_period_resets_every_converged_step() {
        let (context, mut coordinator, scene) = setup(Duration::ZERO);
        assert_eq!(coordinator.tick().unwrap(), Tick::Reset { resets: 1 });
        assert_eq!(coordinator.cycle().elapsed(), Duration::ZERO);
        assert_eq!(coordinator.state().moving, scene.misaligned);
        context.buffer.with_snapshot(|s| {
            assert_eq!(s.cloud, scene.misaligned);
            assert_eq!(s.resets, 1);
            assert_eq!(s.generation, 2);
        });
        assert_eq!(coordinator.tick().unwrap(), Tick::Reset { resets: 2 });
    }

    #[test]
    fn unconverged_steps_neither_publish_nor_accumulate() {
        let target = ring(40);
        let far = apply_transform(
            &target,
            &pointclouds_registration::RigidTransform::rotation_z(0.0, [50.0, 0.0, 0.0]),
        );
        let scene = Scene::from_clouds(target, far.clone());
        let context = Arc::new(LiveContext::new(SharedSceneBuffer::new(
            far,
            CloudStyle::Native,
        )));
        let mut config = LiveConfig::new("unused.pcd");
        config.reset_period = Duration::ZERO;
        config.max_correspondence_distance = 0.5;
        let mut coordinator = ConcurrencyCoordinator::new(Arc::clone(&context), &scene, &config);

        for _ in 0..5 {
            assert_eq!(coordinator.tick().unwrap(), Tick::Retry);
        }
        assert_eq!(context.buffer.generation(), 0);
        assert_eq!(coordinator.cycle().elapsed(), Duration::ZERO);
        assert_eq!(coordinator.summary().steps, 5);
        assert_eq!(coordinator.summary().converged_steps, 0);
    }

    #[test]
    fn closed_context_stops_for_good() {
        let (context, mut coordinator, _) = setup(Duration::from_secs(3600));
        context.close();
        assert_eq!(coordinator.tick().unwrap(), Tick::Stopped);
        assert_eq!(coordinator.phase(), CoordinatorState::Stopped);
        assert_eq!(coordinator.tick().unwrap(), Tick::Stopped);
        assert_eq!(coordinator.summary().steps, 0);
    }

    #[test]
    fn spawned_loop_joins_after_close() {
        let (context, coordinator, _) = setup(Duration::from_millis(1));
        let handle = coordinator.spawn().unwrap();
        while context.buffer.resets() == 0 {
            std::thread::yield_now();
        }
        context.close();
        let summary = handle.join().unwrap().unwrap();
        assert!(summary.resets >= 1);
        assert!(summary.converged_steps >= summary.resets);
    }
}
