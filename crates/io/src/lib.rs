#![forbid(unsafe_code)]

pub mod las;
pub mod pcd;
pub mod ply;

pub use las::read_las;
pub use pcd::{read_pcd, write_pcd, write_pcd_binary};
pub use ply::read_ply;

use pointclouds_core::PointCloud;
use std::io;
use std::path::Path;

/// Load a point cloud, picking the reader from the file extension
/// (case-insensitive): `pcd`, `ply`, `las` or `laz`.
pub fn load(path: impl AsRef<Path>) -> io::Result<PointCloud> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("pcd") => read_pcd(path),
        Some("ply") => read_ply(path),
        Some("las") | Some("laz") => read_las(path),
        Some(other) => Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("unsupported point cloud extension: .{}", other),
        )),
        None => Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "point cloud path has no extension",
        )),
    }
}
