//! Native window backend built on eframe.

use std::time::Duration;

use eframe::egui;
use pointclouds_core::PointCloud;

use crate::{Camera, CloudStyle, DisplayList, Surface, ViewportId, ViewportRect};

const ORBIT_SPEED: f32 = 0.01;
const ZOOM_SPEED: f32 = 0.002;

#[derive(Debug, Clone)]
pub struct WindowOptions {
    pub title: String,
    pub size: [f32; 2],
    /// How often the window repaints when no input arrives.
    pub repaint_interval: Duration,
    pub point_size: f32,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            title: "Point Cloud Viewer".to_owned(),
            size: [1280.0, 720.0],
            repaint_interval: Duration::from_millis(100),
            point_size: 2.0,
        }
    }
}

/// [`Surface`] backed by an egui window. Only lives inside [`run_window`].
pub struct WindowSurface {
    display: DisplayList,
    closed: bool,
    point_size: f32,
}

impl WindowSurface {
    pub fn display(&self) -> &DisplayList {
        &self.display
    }

    fn paint(&mut self, ui: &mut egui::Ui) {
        let full = ui.max_rect();
        for index in 0..self.display.viewports().len() {
            let id = ViewportId(index);
            let Some(viewport) = self.display.viewport_mut(id) else {
                continue;
            };
            let area = screen_rect(full, viewport.rect);
            let painter = ui.painter_at(area);
            painter.rect_filled(area, 0.0, to_color32(viewport.background));

            let response = ui.interact(area, ui.id().with(index), egui::Sense::drag());
            let Some(camera) = viewport.camera.as_mut() else {
                continue;
            };
            let drag = response.drag_delta();
            if drag != egui::Vec2::ZERO {
                camera.orbit(-drag.x * ORBIT_SPEED, -drag.y * ORBIT_SPEED);
            }
            if response.hovered() {
                let scroll = ui.input(|i| i.smooth_scroll_delta.y);
                if scroll != 0.0 {
                    camera.zoom((-scroll * ZOOM_SPEED).exp());
                }
            }

            let camera = *camera;
            let aspect = area.width() / area.height().max(1.0);
            let half = area.size() / 2.0;
            let center = area.center();
            let dot = egui::vec2(self.point_size, self.point_size);
            for cloud in &viewport.clouds {
                let projected = camera.project_all(cloud.positions.iter().copied(), aspect);
                for (ndc, rgb) in projected.zip(&cloud.colors) {
                    let Some([x, y]) = ndc else { continue };
                    let pos = egui::pos2(center.x + x * half.x, center.y - y * half.y);
                    painter.rect_filled(
                        egui::Rect::from_center_size(pos, dot),
                        0.0,
                        egui::Color32::from_rgb(rgb[0], rgb[1], rgb[2]),
                    );
                }
            }
        }
    }
}

impl Surface for WindowSurface {
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
        self.display.upsert(id, cloud, style, viewport);
    }

    fn set_camera(&mut self, camera: Camera, viewport: ViewportId) {
        self.display.set_camera(camera, viewport);
    }

    // egui services input and repaints between `update` calls.
    fn poll_events(&mut self, _timeout: Duration) {}

    fn is_closed(&self) -> bool {
        self.closed
    }
}

struct WindowApp<S, F> {
    surface: WindowSurface,
    frame: F,
    state: Option<S>,
    setup: Option<Box<dyn FnOnce(&mut WindowSurface) -> S>>,
    interval: Duration,
}

impl<S, F> eframe::App for WindowApp<S, F>
where
    F: FnMut(&mut S, &mut WindowSurface) -> bool,
{
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if ctx.input(|i| i.viewport().close_requested()) {
            self.surface.closed = true;
        }
        if let Some(setup) = self.setup.take() {
            self.state = Some(setup(&mut self.surface));
        }
        if let Some(state) = self.state.as_mut() {
            if !(self.frame)(state, &mut self.surface) {
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| self.surface.paint(ui));
        ctx.request_repaint_after(self.interval);
    }
}

/// Open a window and block until it closes.
///
/// `setup` runs once against the fresh surface; `frame` then runs before every
/// repaint and closes the window by returning `false`.
pub fn run_window<S, F>(
    options: WindowOptions,
    setup: impl FnOnce(&mut WindowSurface) -> S + 'static,
    frame: F,
) -> Result<(), eframe::Error>
where
    S: 'static,
    F: FnMut(&mut S, &mut WindowSurface) -> bool + 'static,
{
    let native = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(options.size)
            .with_title(options.title.clone()),
        ..Default::default()
    };
    let app = WindowApp {
        surface: WindowSurface {
            display: DisplayList::new(),
            closed: false,
            point_size: options.point_size,
        },
        frame,
        state: None,
        setup: Some(Box::new(setup)),
        interval: options.repaint_interval,
    };
    eframe::run_native(&options.title, native, Box::new(|_cc| Ok(Box::new(app))))
}

fn screen_rect(full: egui::Rect, rect: ViewportRect) -> egui::Rect {
    let w = full.width();
    let h = full.height();
    egui::Rect::from_min_max(
        egui::pos2(full.min.x + rect.x_min * w, full.max.y - rect.y_max * h),
        egui::pos2(full.min.x + rect.x_max * w, full.max.y - rect.y_min * h),
    )
}

fn to_color32(rgb: [f32; 3]) -> egui::Color32 {
    let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    egui::Color32::from_rgb(channel(rgb[0]), channel(rgb[1]), channel(rgb[2]))
}
