use std::time::{Duration, Instant};

use pointclouds_core::PointCloud;
use tracing::trace;

use crate::{Camera, CloudStyle, DisplayList, Surface, ViewportId, ViewportRect};

/// Surface that keeps a [`DisplayList`] in memory and never opens a window.
///
/// It reports closed once its deadline passes or its poll budget runs out,
/// whichever comes first. With neither set it stays open.
#[derive(Debug)]
pub struct HeadlessSurface {
    display: DisplayList,
    closed: bool,
    deadline: Option<Instant>,
    max_polls: Option<u64>,
    polls: u64,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self {
            display: DisplayList::new(),
            closed: false,
            deadline: None,
            max_polls: None,
            polls: 0,
        }
    }

    /// Close automatically `lifetime` after this call.
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.deadline = Instant::now().checked_add(lifetime);
        self
    }

    /// Close automatically after `polls` calls to [`Surface::poll_events`].
    pub fn with_max_polls(mut self, polls: u64) -> Self {
        self.max_polls = Some(polls);
        self
    }

    pub fn display(&self) -> &DisplayList {
        &self.display
    }

    pub fn polls(&self) -> u64 {
        self.polls
    }
}

impl Default for HeadlessSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl Surface for HeadlessSurface {
    fn create_viewport(&mut self, rect: ViewportRect) -> ViewportId {
        self.display.create_viewport(rect)
    }

    fn set_background(&mut self, rgb: [f32; 3], viewport: ViewportId) {
        self.display.set_background(rgb, viewport);
    }

    fn add_or_update_cloud(
        &mut self,
        id: &str,
        cloud: &PointCloud,
        style: CloudStyle,
        viewport: ViewportId,
    ) {
        if !self.display.upsert(id, cloud, style, viewport) {
            trace!(id, viewport = viewport.0, "dropping cloud for unknown viewport");
        }
    }

    fn set_camera(&mut self, camera: Camera, viewport: ViewportId) {
        self.display.set_camera(camera, viewport);
    }

    fn poll_events(&mut self, _timeout: Duration) {
        self.polls += 1;
        if self.max_polls.is_some_and(|max| self.polls >= max) {
            self.closed = true;
        }
    }

    fn is_closed(&self) -> bool {
        self.closed || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}
