use std::sync::atomic::{AtomicBool, Ordering};

use crate::SharedSceneBuffer;

/// State shared by the compute and render threads for one session.
#[derive(Debug)]
pub struct LiveContext {
    pub buffer: SharedSceneBuffer,
    closed: AtomicBool,
}

impl LiveContext {
    pub fn new(buffer: SharedSceneBuffer) -> Self {
        Self {
            buffer,
            closed: AtomicBool::new(false),
        }
    }

    /// Signal that the render surface is gone. Both loops stop at their next check.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
