use std::time::Duration;

use pointclouds_core::PointCloud;

use crate::Camera;

/// Handle to a viewport created on a [`Surface`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewportId(pub usize);

/// Viewport placement in normalized window coordinates, origin bottom-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportRect {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl ViewportRect {
    pub const FULL: ViewportRect = ViewportRect::new(0.0, 0.0, 1.0, 1.0);
    pub const LEFT_HALF: ViewportRect = ViewportRect::new(0.0, 0.0, 0.5, 1.0);
    pub const RIGHT_HALF: ViewportRect = ViewportRect::new(0.5, 0.0, 1.0, 1.0);

    pub const fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    pub fn width(&self) -> f32 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f32 {
        self.y_max - self.y_min
    }
}

/// How a cloud's points are colored on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudStyle {
    /// Use the per-point colors the cloud carries.
    Native,
    /// Paint every point with one RGB color.
    Flat([u8; 3]),
}

/// A window (or stand-in) that can show point clouds in several viewports.
///
/// Implementations are driven from one thread only; nothing here is `Sync`.
pub trait Surface {
    fn create_viewport(&mut self, rect: ViewportRect) -> ViewportId;

    fn set_background(&mut self, rgb: [f32; 3], viewport: ViewportId);

    /// Insert a cloud under `id`, or replace the one already shown under it.
    fn add_or_update_cloud(
        &mut self,
        id: &str,
        cloud: &PointCloud,
        style: CloudStyle,
        viewport: ViewportId,
    );

    fn set_camera(&mut self, camera: Camera, viewport: ViewportId);

    /// Service pending input and redraw, waiting at most `timeout`.
    fn poll_events(&mut self, timeout: Duration);

    fn is_closed(&self) -> bool;
}
