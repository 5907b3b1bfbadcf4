use std::sync::Arc;
use std::thread::JoinHandle;

use thiserror::Error;
use tracing::info;

use crate::color::MOVING_COLOR;
use crate::coordinator::RunSummary;
use crate::scene::Viewports;
use crate::{
    AlignError, ConcurrencyCoordinator, LiveConfig, LiveContext, RenderLoop, Scene,
    SharedSceneBuffer,
};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to start compute thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error(transparent)]
    Align(#[from] AlignError),
    #[error("compute thread panicked")]
    ComputePanicked,
}

/// A running compute thread plus the context it shares with the renderer.
pub struct Session {
    context: Arc<LiveContext>,
    compute: JoinHandle<Result<RunSummary, AlignError>>,
}

impl Session {
    /// Seed the shared buffer with the misaligned cloud and start the compute thread.
    pub fn start(scene: &Scene, config: &LiveConfig) -> Result<Self, SessionError> {
        let buffer = SharedSceneBuffer::new(
            scene.misaligned.clone(),
            scene.moving_mode.style(MOVING_COLOR),
        );
        let context = Arc::new(LiveContext::new(buffer));
        let compute =
            ConcurrencyCoordinator::new(Arc::clone(&context), scene, config).spawn()?;
        Ok(Self { context, compute })
    }

    pub fn context(&self) -> &Arc<LiveContext> {
        &self.context
    }

    pub fn render_loop(&self, viewports: &Viewports, config: &LiveConfig) -> RenderLoop {
        RenderLoop::new(
            Arc::clone(&self.context),
            viewports.live,
            config.frame_interval,
        )
    }

    /// Close the context and wait for the compute thread.
    pub fn finish(self) -> Result<RunSummary, SessionError> {
        self.context.close();
        let summary = self
            .compute
            .join()
            .map_err(|_| SessionError::ComputePanicked)??;
        info!(
            steps = summary.steps,
            resets = summary.resets,
            "session finished"
        );
        Ok(summary)
    }
}
