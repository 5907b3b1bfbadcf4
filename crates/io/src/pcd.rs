use pointclouds_core::{Colors, PointCloud};
use std::fs;
use std::io::{self, Read};
use std::path::Path;

/// Reads a PCD file (ASCII or binary format).
///
/// Positions come from the `x`, `y`, `z` fields. Color is taken from an
/// `rgba` field (packed `0xAARRGGBB`) or, failing that, an `rgb` field whose
/// alpha is forced opaque. Files without either leave `colors` unset.
pub fn read_pcd(path: impl AsRef<Path>) -> io::Result<PointCloud> {
    let raw = fs::read(path)?;

    let header_str = find_header(&raw)?;
    let data_format = parse_data_format(&header_str)?;
    let num_points = parse_points_count(&header_str)?;
    let layout = FieldLayout::parse(&header_str)?;

    match data_format {
        DataFormat::Ascii => read_pcd_ascii(&raw, &layout),
        DataFormat::Binary => read_pcd_binary(&raw, num_points, &layout),
    }
}

/// Writes a PCD file in ASCII format.
pub fn write_pcd(path: impl AsRef<Path>, cloud: &PointCloud) -> io::Result<()> {
    let mut out = header_for(cloud, "ascii");

    for i in 0..cloud.len() {
        out.push_str(&format!("{} {} {}", cloud.x[i], cloud.y[i], cloud.z[i]));
        if let Some(colors) = &cloud.colors {
            out.push_str(&format!(" {}", colors.packed(i)));
        }
        out.push('\n');
    }

    fs::write(path, out)
}

/// Writes a PCD file in binary format.
pub fn write_pcd_binary(path: impl AsRef<Path>, cloud: &PointCloud) -> io::Result<()> {
    let header = header_for(cloud, "binary");
    let header_bytes = header.as_bytes();
    let fields = if cloud.colors.is_some() { 4 } else { 3 };
    let mut buf = Vec::with_capacity(header_bytes.len() + cloud.len() * fields * 4);
    buf.extend_from_slice(header_bytes);

    for i in 0..cloud.len() {
        buf.extend_from_slice(&cloud.x[i].to_le_bytes());
        buf.extend_from_slice(&cloud.y[i].to_le_bytes());
        buf.extend_from_slice(&cloud.z[i].to_le_bytes());
        if let Some(colors) = &cloud.colors {
            buf.extend_from_slice(&colors.packed(i).to_le_bytes());
        }
    }

    fs::write(path, buf)
}

fn header_for(cloud: &PointCloud, data: &str) -> String {
    let (fields, size, ty, count) = if cloud.colors.is_some() {
        ("x y z rgba", "4 4 4 4", "F F F U", "1 1 1 1")
    } else {
        ("x y z", "4 4 4", "F F F", "1 1 1")
    };

    let mut header = String::new();
    header.push_str("# .PCD v0.7 - Point Cloud Data file format\n");
    header.push_str("VERSION 0.7\n");
    header.push_str(&format!("FIELDS {}\n", fields));
    header.push_str(&format!("SIZE {}\n", size));
    header.push_str(&format!("TYPE {}\n", ty));
    header.push_str(&format!("COUNT {}\n", count));
    header.push_str(&format!("WIDTH {}\n", cloud.len()));
    header.push_str("HEIGHT 1\n");
    header.push_str("VIEWPOINT 0 0 0 1 0 0 0\n");
    header.push_str(&format!("POINTS {}\n", cloud.len()));
    header.push_str(&format!("DATA {}\n", data));
    header
}

// --- Internal helpers ---

#[derive(Debug, PartialEq)]
enum DataFormat {
    Ascii,
    Binary,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ColorField {
    Rgb,
    Rgba,
}

/// Where each field we care about lives, both as an ASCII column and as a
/// byte offset inside a binary record.
#[derive(Debug)]
struct FieldLayout {
    columns: [usize; 3],
    offsets: [usize; 3],
    color: Option<(ColorField, usize, usize)>,
    num_columns: usize,
    record_size: usize,
}

impl FieldLayout {
    fn parse(header: &str) -> io::Result<Self> {
        let names = header_values(header, "FIELDS")
            .unwrap_or_else(|| vec!["x".to_string(), "y".to_string(), "z".to_string()]);
        let sizes = parse_numeric_line(header, "SIZE")?.unwrap_or_else(|| vec![4; names.len()]);
        let counts =
            parse_numeric_line(header, "COUNT")?.unwrap_or_else(|| vec![1; names.len()]);

        if sizes.len() != names.len() || counts.len() != names.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "PCD FIELDS, SIZE and COUNT lines disagree in length",
            ));
        }

        let mut column: usize = 0;
        let mut offset: usize = 0;
        let mut columns = Vec::with_capacity(names.len());
        let mut offsets = Vec::with_capacity(names.len());
        for i in 0..names.len() {
            columns.push(column);
            offsets.push(offset);
            let width = sizes[i].checked_mul(counts[i]);
            match (column.checked_add(counts[i]), width.and_then(|w| offset.checked_add(w))) {
                (Some(c), Some(o)) => {
                    column = c;
                    offset = o;
                }
                _ => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("PCD field {} is too large", names[i]),
                    ));
                }
            }
        }

        let find = |name: &str| names.iter().position(|n| n == name);
        let (ix, iy, iz) = match (find("x"), find("y"), find("z")) {
            (Some(ix), Some(iy), Some(iz)) => (ix, iy, iz),
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "PCD file missing x, y, z fields",
                ));
            }
        };
        for &i in &[ix, iy, iz] {
            if sizes[i] != 4 {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    format!("PCD field {} has size {}, expected 4", names[i], sizes[i]),
                ));
            }
        }

        let color = find("rgba")
            .map(|i| (ColorField::Rgba, i))
            .or_else(|| find("rgb").map(|i| (ColorField::Rgb, i)))
            .filter(|&(_, i)| sizes[i] == 4)
            .map(|(kind, i)| (kind, columns[i], offsets[i]));

        Ok(Self {
            columns: [columns[ix], columns[iy], columns[iz]],
            offsets: [offsets[ix], offsets[iy], offsets[iz]],
            color,
            num_columns: column,
            record_size: offset,
        })
    }
}

fn header_values(header: &str, key: &str) -> Option<Vec<String>> {
    header.lines().find_map(|line| {
        let mut parts = line.split_whitespace();
        (parts.next() == Some(key)).then(|| parts.map(|s| s.to_string()).collect())
    })
}

fn parse_numeric_line(header: &str, key: &str) -> io::Result<Option<Vec<usize>>> {
    let Some(values) = header_values(header, key) else {
        return Ok(None);
    };
    values
        .iter()
        .map(|v| {
            v.parse::<usize>().map_err(|e| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("invalid {} value {}: {}", key, v, e),
                )
            })
        })
        .collect::<io::Result<Vec<_>>>()
        .map(Some)
}

/// Extracts the header portion as a UTF-8 string (everything up to and including the DATA line).
fn find_header(raw: &[u8]) -> io::Result<String> {
    let end = find_data_line_end(raw).ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidData, "PCD file missing DATA line")
    })?;
    std::str::from_utf8(&raw[..end])
        .map(|s| s.to_string())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "PCD header is not valid UTF-8"))
}

/// Finds the byte offset just past the newline ending the DATA line.
fn find_data_line_end(raw: &[u8]) -> Option<usize> {
    let data_marker = b"DATA";
    for i in 0..raw.len().saturating_sub(data_marker.len() - 1) {
        if (i == 0 || raw[i - 1] == b'\n') && raw[i..].starts_with(data_marker) {
            if let Some(offset) = raw[i..].iter().position(|&b| b == b'\n') {
                return Some(i + offset + 1);
            }
            return Some(raw.len());
        }
    }
    None
}

fn parse_data_format(header: &str) -> io::Result<DataFormat> {
    match header_values(header, "DATA").as_deref() {
        Some([format, ..]) => match format.as_str() {
            "ascii" => Ok(DataFormat::Ascii),
            "binary" => Ok(DataFormat::Binary),
            other => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("unsupported PCD DATA format: {}", other),
            )),
        },
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "PCD file missing DATA line",
        )),
    }
}

fn parse_points_count(header: &str) -> io::Result<usize> {
    // POINTS wins; WIDTH is the fallback for old writers that omit it.
    let value = header_values(header, "POINTS")
        .or_else(|| header_values(header, "WIDTH"))
        .and_then(|v| v.into_iter().next())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                "PCD file missing POINTS/WIDTH header",
            )
        })?;

    value.parse::<usize>().map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("invalid POINTS value: {}", e),
        )
    })
}

fn parse_packed_color(token: &str, kind: ColorField) -> u32 {
    let bits = token
        .parse::<u32>()
        .ok()
        .or_else(|| token.parse::<f32>().ok().map(f32::to_bits))
        .unwrap_or(0);
    match kind {
        ColorField::Rgba => bits,
        ColorField::Rgb => bits | 0xFF00_0000,
    }
}

fn read_pcd_ascii(raw: &[u8], layout: &FieldLayout) -> io::Result<PointCloud> {
    let content = std::str::from_utf8(raw)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("invalid UTF-8: {}", e)))?;

    let mut x = Vec::new();
    let mut y = Vec::new();
    let mut z = Vec::new();
    let mut packed = Vec::new();

    let mut in_data = false;
    for line in content.lines() {
        if !in_data {
            in_data = line.trim_start().starts_with("DATA");
            continue;
        }
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < layout.num_columns {
            continue;
        }

        // Unparseable coordinates become NaN so the caller's finite filter drops them.
        let coord = |col: usize| parts[col].parse::<f32>().unwrap_or(f32::NAN);
        x.push(coord(layout.columns[0]));
        y.push(coord(layout.columns[1]));
        z.push(coord(layout.columns[2]));

        if let Some((kind, col, _)) = layout.color {
            packed.push(parse_packed_color(parts[col], kind));
        }
    }

    let mut cloud = PointCloud::from_xyz(x, y, z);
    if layout.color.is_some() {
        cloud = cloud.with_colors(Colors::from_packed(&packed));
    }
    Ok(cloud)
}

fn read_pcd_binary(raw: &[u8], num_points: usize, layout: &FieldLayout) -> io::Result<PointCloud> {
    let data_offset = find_data_line_end(raw).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            "cannot find DATA line in binary PCD",
        )
    })?;

    let data_slice = &raw[data_offset..];
    let expected_size = num_points.checked_mul(layout.record_size).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "binary PCD declares {} points of {} bytes, more than any file can hold",
                num_points, layout.record_size
            ),
        )
    })?;

    if data_slice.len() < expected_size {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "binary PCD data too short: have {} bytes, expected {} ({} points x {} bytes)",
                data_slice.len(),
                expected_size,
                num_points,
                layout.record_size
            ),
        ));
    }

    let mut x = Vec::with_capacity(num_points);
    let mut y = Vec::with_capacity(num_points);
    let mut z = Vec::with_capacity(num_points);
    let mut packed = Vec::with_capacity(if layout.color.is_some() { num_points } else { 0 });

    let mut cursor = io::Cursor::new(data_slice);
    let mut record = vec![0u8; layout.record_size];

    for _ in 0..num_points {
        cursor.read_exact(&mut record)?;

        let word_at = |off: usize| [record[off], record[off + 1], record[off + 2], record[off + 3]];

        x.push(f32::from_le_bytes(word_at(layout.offsets[0])));
        y.push(f32::from_le_bytes(word_at(layout.offsets[1])));
        z.push(f32::from_le_bytes(word_at(layout.offsets[2])));

        if let Some((kind, _, off)) = layout.color {
            let bits = u32::from_le_bytes(word_at(off));
            packed.push(match kind {
                ColorField::Rgba => bits,
                ColorField::Rgb => bits | 0xFF00_0000,
            });
        }
    }

    let mut cloud = PointCloud::from_xyz(x, y, z);
    if layout.color.is_some() {
        cloud = cloud.with_colors(Colors::from_packed(&packed));
    }
    Ok(cloud)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::NamedTempFile;

    #[test]
    fn pcd_roundtrip() {
        let cloud = PointCloud::from_xyz(
            vec![1.0, 2.0, 3.0],
            vec![4.0, 5.0, 6.0],
            vec![7.0, 8.0, 9.0],
        );
        let tmp = NamedTempFile::new().unwrap();
        write_pcd(tmp.path(), &cloud).unwrap();
        let loaded = read_pcd(tmp.path()).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.x, cloud.x);
        assert_eq!(loaded.y, cloud.y);
        assert_eq!(loaded.z, cloud.z);
        assert!(loaded.colors.is_none());
    }

    #[test]
    fn pcd_empty_cloud() {
        let cloud = PointCloud::new();
        let tmp = NamedTempFile::new().unwrap();
        write_pcd(tmp.path(), &cloud).unwrap();
        let loaded = read_pcd(tmp.path()).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn pcd_rgba_roundtrip_ascii_and_binary() {
        let cloud = PointCloud::from_xyz(vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0])
            .with_colors(Colors::from_packed(&[0xFF00_0000, 0x8010_20FF]));

        let ascii = NamedTempFile::new().unwrap();
        write_pcd(ascii.path(), &cloud).unwrap();
        let loaded = read_pcd(ascii.path()).unwrap();
        assert_eq!(loaded.colors, cloud.colors);

        let binary = NamedTempFile::new().unwrap();
        write_pcd_binary(binary.path(), &cloud).unwrap();
        let loaded = read_pcd(binary.path()).unwrap();
        assert_eq!(loaded.colors, cloud.colors);
    }

    #[test]
    fn pcd_rgb_float_field_is_opaque() {
        let packed = f32::from_bits(0x00FF_8000);
        let text = format!(
            "VERSION 0.7\nFIELDS x y z rgb\nSIZE 4 4 4 4\nTYPE F F F F\nCOUNT 1 1 1 1\n\
             WIDTH 1\nHEIGHT 1\nPOINTS 1\nDATA ascii\n0 1 2 {:e}\n",
            packed
        );
        let tmp = NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), text).unwrap();
        let loaded = read_pcd(tmp.path()).unwrap();
        assert_eq!(loaded.color(0), Some([0xFF, 0x80, 0x00, 0xFF]));
    }

    #[test]
    fn pcd_ascii_honours_count_columns() {
        let text = "VERSION 0.7\nFIELDS normal x y z\nSIZE 4 4 4 4\nTYPE F F F F\nCOUNT 3 1 1 1\n\
                    WIDTH 1\nHEIGHT 1\nPOINTS 1\nDATA ascii\n0 0 1 7 8 9\n";
        let tmp = NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), text).unwrap();
        let loaded = read_pcd(tmp.path()).unwrap();
        assert_eq!(loaded.point(0), [7.0, 8.0, 9.0]);
    }

    #[test]
    fn pcd_missing_data_line() {
        let tmp = NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "VERSION 0.7\nFIELDS x y z\n").unwrap();
        let err = read_pcd(tmp.path()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn pcd_compressed_is_unsupported() {
        let tmp = NamedTempFile::new().unwrap();
        std::fs::write(
            tmp.path(),
            "FIELDS x y z\nPOINTS 0\nDATA binary_compressed\n",
        )
        .unwrap();
        let err = read_pcd(tmp.path()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }

    #[test]
    fn pcd_binary_truncated() {
        let cloud = PointCloud::from_xyz(vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]);
        let tmp = NamedTempFile::new().unwrap();
        write_pcd_binary(tmp.path(), &cloud).unwrap();
        let mut bytes = std::fs::read(tmp.path()).unwrap();
        bytes.truncate(bytes.len() - 4);
        std::fs::write(tmp.path(), bytes).unwrap();
        assert!(read_pcd(tmp.path()).is_err());
    }

    #[test]
    fn pcd_binary_points_overflow_is_invalid_data() {
        let mut bytes = b"VERSION 0.7\nFIELDS x y z\nSIZE 4 4 4\nTYPE F F F\nCOUNT 1 1 1\n\
WIDTH 1\nHEIGHT 1\nPOINTS 3074457345618258603\nDATA binary\n"
            .to_vec();
        bytes.extend_from_slice(&[0u8; 12]);
        let tmp = NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), bytes).unwrap();
        let err = read_pcd(tmp.path()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn pcd_binary_points_beyond_body_is_invalid_data() {
        let mut bytes = b"FIELDS x y z\nPOINTS 1000000000\nDATA binary\n".to_vec();
        bytes.extend_from_slice(&[0u8; 24]);
        let tmp = NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), bytes).unwrap();
        let err = read_pcd(tmp.path()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn pcd_field_count_overflow_is_invalid_data() {
        let text = format!(
            "FIELDS x y z normal\nSIZE 4 4 4 4\nCOUNT 1 1 1 {}\nPOINTS 1\nDATA binary\n",
            usize::MAX
        );
        let tmp = NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), text).unwrap();
        let err = read_pcd(tmp.path()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    proptest! {
        #[test]
        fn pcd_binary_roundtrip_preserves_data(
            pts in prop::collection::vec(
                (-1000.0f32..1000.0f32, -1000.0f32..1000.0f32, -1000.0f32..1000.0f32),
                0..200
            )
        ) {
            let x: Vec<f32> = pts.iter().map(|p| p.0).collect();
            let y: Vec<f32> = pts.iter().map(|p| p.1).collect();
            let z: Vec<f32> = pts.iter().map(|p| p.2).collect();
            let cloud = PointCloud::from_xyz(x, y, z);

            let tmp = NamedTempFile::new().unwrap();
            write_pcd_binary(tmp.path(), &cloud).unwrap();
            let loaded = read_pcd(tmp.path()).unwrap();

            prop_assert_eq!(loaded.len(), cloud.len());
            for i in 0..cloud.len() {
                prop_assert_eq!(loaded.x[i], cloud.x[i]);
                prop_assert_eq!(loaded.y[i], cloud.y[i]);
                prop_assert_eq!(loaded.z[i], cloud.z[i]);
            }
        }
    }
}
