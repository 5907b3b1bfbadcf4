use std::path::PathBuf;
use std::time::Duration;

use pointclouds_registration::IcpParams;

pub const DEFAULT_RESET_PERIOD: Duration = Duration::from_secs(40);
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(100);
pub const WINDOW_TITLE: &str = "ICP Check";
pub const WINDOW_SIZE: [f32; 2] = [1280.0, 720.0];

/// Everything a session needs to know, resolved from the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveConfig {
    pub target_path: PathBuf,
    pub second_path: Option<PathBuf>,
    /// Apply the test misalignment to the second file as well.
    pub perturb_second: bool,
    /// Converged compute time between two rewinds of the moving cloud.
    pub reset_period: Duration,
    pub frame_interval: Duration,
    pub max_correspondence_distance: f32,
}

impl LiveConfig {
    pub fn new(target_path: impl Into<PathBuf>) -> Self {
        Self {
            target_path: target_path.into(),
            second_path: None,
            perturb_second: false,
            reset_period: DEFAULT_RESET_PERIOD,
            frame_interval: DEFAULT_FRAME_INTERVAL,
            max_correspondence_distance: f32::INFINITY,
        }
    }

    pub fn icp_params(&self) -> IcpParams {
        IcpParams {
            max_iterations: 1,
            max_correspondence_distance: self.max_correspondence_distance,
            ..IcpParams::default()
        }
    }
}
