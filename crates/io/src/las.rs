use pointclouds_core::{Colors, PointCloud};
use std::io;
use std::path::Path;

/// Keeps the high byte of a 16-bit LAS color channel.
fn to_u8_channel(value: u16) -> u8 {
    (value >> 8) as u8
}

/// Reads a LAS/LAZ file.
///
/// Colors are kept only when every point carries RGB, and come out opaque.
/// Intensity is kept only when at least one point has a non-zero value.
pub fn read_las(path: impl AsRef<Path>) -> io::Result<PointCloud> {
    let path = path.as_ref();
    let mut reader = las::Reader::from_path(path).map_err(|e| {
        io::Error::other(format!("failed to open LAS file {}: {}", path.display(), e))
    })?;

    let mut cloud = PointCloud::new();
    let mut intensity = Vec::new();
    let mut rgb: Option<(Vec<u8>, Vec<u8>, Vec<u8>)> = Some(Default::default());

    for point in reader.points() {
        let point = point.map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to read LAS point: {}", e),
            )
        })?;
        cloud.x.push(point.x as f32);
        cloud.y.push(point.y as f32);
        cloud.z.push(point.z as f32);
        intensity.push(f32::from(point.intensity));

        rgb = match (rgb, point.color) {
            (Some((mut r, mut g, mut b)), Some(color)) => {
                r.push(to_u8_channel(color.red));
                g.push(to_u8_channel(color.green));
                b.push(to_u8_channel(color.blue));
                Some((r, g, b))
            }
            _ => None,
        };
    }

    if intensity.iter().any(|&i| i != 0.0) {
        cloud.intensity = Some(intensity);
    }
    if let Some((r, g, b)) = rgb.filter(|(r, _, _)| !r.is_empty()) {
        cloud.colors = Some(Colors::from_rgb(r, g, b));
    }

    Ok(cloud)
}
