//! Deciding how clouds are colored on screen.

use pointclouds_core::PointCloud;
use pointclouds_viewer::CloudStyle;

/// Color a point carries when it has no real color.
pub const NO_COLOR: [u8; 4] = [0, 0, 0, 255];

pub const TARGET_COLOR: [u8; 3] = [0, 0, 0];
pub const MISALIGNED_COLOR: [u8; 3] = [20, 180, 20];
pub const MOVING_COLOR: [u8; 3] = [180, 20, 20];

/// `true` as soon as one point's color differs from [`NO_COLOR`].
///
/// Empty clouds and clouds without a color channel have no real color.
pub fn has_real_color(cloud: &PointCloud) -> bool {
    if cloud.is_empty() {
        return false;
    }
    let Some(colors) = cloud.colors.as_ref() else {
        return false;
    };
    (0..colors.len()).any(|i| colors.rgba(i) != NO_COLOR)
}

/// Whether a cloud is drawn with its own colors or a flat highlight.
///
/// Decided once per cloud at startup and never re-evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    Native,
    Synthetic,
}

impl ColorMode {
    pub fn decide(cloud: &PointCloud) -> Self {
        if has_real_color(cloud) {
            ColorMode::Native
        } else {
            ColorMode::Synthetic
        }
    }

    pub fn style(self, highlight: [u8; 3]) -> CloudStyle {
        match self {
            ColorMode::Native => CloudStyle::Native,
            ColorMode::Synthetic => CloudStyle::Flat(highlight),
        }
    }
}
