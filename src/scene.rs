//! One-time bootstrap: load clouds, build the misaligned copy, lay out the window.

use std::f32::consts::FRAC_PI_8;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use pointclouds_core::PointCloud;
use pointclouds_filters::remove_non_finite;
use pointclouds_registration::{apply_transform, RigidTransform};
use pointclouds_viewer::{Camera, Surface, ViewportId, ViewportRect};
use tracing::{info, warn};

use crate::color::{ColorMode, MISALIGNED_COLOR, MOVING_COLOR, TARGET_COLOR};
use crate::{LiveConfig, SetupError};

pub const TARGET_REFERENCE_ID: &str = "target_reference";
pub const MISALIGNED_ID: &str = "misaligned";
pub const TARGET_LIVE_ID: &str = "target_live";
pub const MOVING_ID: &str = "moving";

const BACKGROUND: [f32; 3] = [1.0, 1.0, 1.0];

/// Rotation of π/8 about Z followed by a 0.4 lift along Z.
pub fn test_misalignment() -> RigidTransform {
    RigidTransform::rotation_z(FRAC_PI_8, [0.0, 0.0, 0.4])
}

pub fn initial_camera() -> Camera {
    Camera::new([0.0, -4.0, 0.0], [0.0, 0.0, 0.0], [0.0, 0.0, 1.0])
}

/// The two viewports of the check window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewports {
    /// Target and misaligned clouds, never updated.
    pub reference: ViewportId,
    /// Target and the live moving cloud.
    pub live: ViewportId,
}

#[derive(Debug, Clone)]
pub struct Scene {
    pub target: Arc<PointCloud>,
    /// Pose the moving cloud starts from and returns to on every reset.
    pub misaligned: PointCloud,
    pub target_mode: ColorMode,
    pub moving_mode: ColorMode,
}

impl Scene {
    pub fn load(config: &LiveConfig) -> Result<Self, SetupError> {
        let target = load_cloud(&config.target_path)?;
        let aabb = target.aabb();
        info!(extent = ?aabb.extent(), center = ?aabb.center(), "target bounds");

        let misaligned = match &config.second_path {
            Some(path) => {
                let second = load_cloud(path)?;
                if config.perturb_second {
                    info!("Applying rigid transformation to: second -> misaligned");
                    apply_transform(&second, &test_misalignment())
                } else {
                    second
                }
            }
            None => {
                info!("Applying rigid transformation to: target -> misaligned");
                apply_transform(&target, &test_misalignment())
            }
        };

        Ok(Self::from_clouds(target, misaligned))
    }

    /// Color modes are decided here, once, from the clouds as loaded.
    pub fn from_clouds(target: PointCloud, misaligned: PointCloud) -> Self {
        let target_mode = ColorMode::decide(&target);
        let moving_mode = ColorMode::decide(&misaligned);
        Self {
            target: Arc::new(target),
            misaligned,
            target_mode,
            moving_mode,
        }
    }

    /// Create both viewports and add every cloud in its starting pose.
    pub fn configure<S: Surface>(&self, surface: &mut S) -> Viewports {
        let reference = surface.create_viewport(ViewportRect::LEFT_HALF);
        let live = surface.create_viewport(ViewportRect::RIGHT_HALF);
        for viewport in [reference, live] {
            surface.set_background(BACKGROUND, viewport);
            surface.set_camera(initial_camera(), viewport);
        }

        let target_style = self.target_mode.style(TARGET_COLOR);
        surface.add_or_update_cloud(TARGET_REFERENCE_ID, &self.target, target_style, reference);
        surface.add_or_update_cloud(
            MISALIGNED_ID,
            &self.misaligned,
            self.moving_mode.style(MISALIGNED_COLOR),
            reference,
        );
        surface.add_or_update_cloud(TARGET_LIVE_ID, &self.target, target_style, live);
        surface.add_or_update_cloud(
            MOVING_ID,
            &self.misaligned,
            self.moving_mode.style(MOVING_COLOR),
            live,
        );

        Viewports { reference, live }
    }
}

fn load_cloud(path: &Path) -> Result<PointCloud, SetupError> {
    let started = Instant::now();
    let raw = pointclouds_io::load(path).map_err(|source| SetupError::Load {
        path: path.to_path_buf(),
        source,
    })?;

    let cloud = remove_non_finite(&raw);
    let dropped = raw.len() - cloud.len();
    if dropped > 0 {
        warn!(path = %path.display(), dropped, "removed points with non-finite coordinates");
    }
    if cloud.is_empty() {
        return Err(SetupError::Empty {
            path: path.to_path_buf(),
        });
    }

    info!(
        "Loaded file {} ({} points) in {:.3} ms",
        path.display(),
        cloud.len(),
        started.elapsed().as_secs_f64() * 1e3
    );
    Ok(cloud)
}
