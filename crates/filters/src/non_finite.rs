use pointclouds_core::PointCloud;

/// Drop every point with a NaN or infinite coordinate.
///
/// Surviving points keep their relative order and all optional attributes.
pub fn remove_non_finite(cloud: &PointCloud) -> PointCloud {
    if cloud.is_empty() {
        return PointCloud::new();
    }

    let keep: Vec<usize> = (0..cloud.len())
        .filter(|&i| cloud.x[i].is_finite() && cloud.y[i].is_finite() && cloud.z[i].is_finite())
        .collect();

    if keep.len() == cloud.len() {
        return cloud.clone();
    }
    cloud.select(&keep)
}
