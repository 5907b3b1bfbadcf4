use pointclouds_core::{Colors, Normals, PointCloud};
use std::fs;
use std::io;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Ascii,
    BinaryLittleEndian,
}

/// Scalar type of a vertex property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scalar {
    F32,
    F64,
    U8,
}

impl Scalar {
    fn from_keyword(word: &str) -> io::Result<Self> {
        match word {
            "float" | "float32" => Ok(Scalar::F32),
            "double" | "float64" => Ok(Scalar::F64),
            "uchar" | "uint8" => Ok(Scalar::U8),
            other => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("unsupported property type: {}", other),
            )),
        }
    }

    fn width(self) -> usize {
        match self {
            Scalar::F32 => 4,
            Scalar::F64 => 8,
            Scalar::U8 => 1,
        }
    }

    /// Decodes one little-endian value; `bytes` holds at least `width()` bytes.
    fn decode(self, bytes: &[u8]) -> f32 {
        match self {
            Scalar::F32 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            Scalar::F64 => {
                let mut word = [0u8; 8];
                word.copy_from_slice(&bytes[..8]);
                f64::from_le_bytes(word) as f32
            }
            Scalar::U8 => f32::from(bytes[0]),
        }
    }
}

#[derive(Debug)]
struct Property {
    name: String,
    scalar: Scalar,
    /// Byte offset inside a binary vertex record.
    offset: usize,
}

/// The `vertex` element as declared by the header.
#[derive(Debug)]
struct VertexElement {
    encoding: Encoding,
    count: usize,
    properties: Vec<Property>,
    stride: usize,
    body_offset: usize,
}

impl VertexElement {
    fn column(&self, name: &str) -> Option<usize> {
        self.properties.iter().position(|p| p.name == name)
    }
}

fn invalid(message: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.into())
}

fn parse_header(data: &[u8]) -> io::Result<VertexElement> {
    // The body may be binary, so the terminator is searched for on raw bytes.
    let marker = b"end_header\n";
    let header_len = data
        .windows(marker.len())
        .position(|w| w == marker)
        .ok_or_else(|| invalid("missing end_header in PLY file"))?;
    let text = std::str::from_utf8(&data[..header_len])
        .map_err(|_| invalid("PLY header not valid UTF-8"))?;

    let mut lines = text.lines().map(str::trim);
    if lines.next() != Some("ply") {
        return Err(invalid("file does not start with 'ply'"));
    }

    let mut encoding = None;
    let mut count = 0usize;
    let mut properties = Vec::new();
    let mut stride = 0usize;
    let mut in_vertex = false;

    for line in lines {
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            ["format", kind, ..] => {
                encoding = Some(match *kind {
                    "ascii" => Encoding::Ascii,
                    "binary_little_endian" => Encoding::BinaryLittleEndian,
                    _ => {
                        return Err(io::Error::new(
                            io::ErrorKind::Unsupported,
                            format!("unsupported PLY format: {}", line),
                        ));
                    }
                });
            }
            ["element", "vertex", n, ..] => {
                in_vertex = true;
                count = n
                    .parse::<usize>()
                    .map_err(|e| invalid(format!("invalid vertex count: {}", e)))?;
            }
            ["element", ..] => in_vertex = false,
            ["property", kind, name, ..] if in_vertex => {
                let scalar = Scalar::from_keyword(kind)?;
                properties.push(Property {
                    name: name.to_string(),
                    scalar,
                    offset: stride,
                });
                stride += scalar.width();
            }
            _ => {}
        }
    }

    Ok(VertexElement {
        encoding: encoding.ok_or_else(|| invalid("PLY format line missing"))?,
        count,
        properties,
        stride,
        body_offset: header_len + marker.len(),
    })
}

/// Property columns the reader understands.
struct Columns {
    position: [usize; 3],
    normal: Option<[usize; 3]>,
    color: Option<[usize; 3]>,
    alpha: Option<usize>,
}

impl Columns {
    fn locate(element: &VertexElement) -> io::Result<Self> {
        let triple = |a: &str, b: &str, c: &str| {
            Some([element.column(a)?, element.column(b)?, element.column(c)?])
        };
        Ok(Self {
            position: triple("x", "y", "z")
                .ok_or_else(|| invalid("PLY file missing required x, y, z properties"))?,
            normal: triple("nx", "ny", "nz"),
            color: triple("red", "green", "blue"),
            alpha: element.column("alpha"),
        })
    }
}

/// Column-wise accumulator for decoded vertices.
struct Vertices {
    x: Vec<f32>,
    y: Vec<f32>,
    z: Vec<f32>,
    normals: Option<Normals>,
    colors: Option<Colors>,
}

impl Vertices {
    fn with_capacity(columns: &Columns, capacity: usize) -> Self {
        Self {
            x: Vec::with_capacity(capacity),
            y: Vec::with_capacity(capacity),
            z: Vec::with_capacity(capacity),
            normals: columns.normal.map(|_| Normals {
                nx: Vec::with_capacity(capacity),
                ny: Vec::with_capacity(capacity),
                nz: Vec::with_capacity(capacity),
            }),
            colors: columns.color.map(|_| Colors {
                r: Vec::with_capacity(capacity),
                g: Vec::with_capacity(capacity),
                b: Vec::with_capacity(capacity),
                a: Vec::with_capacity(capacity),
            }),
        }
    }

    /// Appends one vertex; `float` reads a property as f32, `byte` as u8.
    fn push(
        &mut self,
        columns: &Columns,
        float: impl Fn(usize) -> io::Result<f32>,
        byte: impl Fn(usize) -> io::Result<u8>,
    ) -> io::Result<()> {
        let [ix, iy, iz] = columns.position;
        self.x.push(float(ix)?);
        self.y.push(float(iy)?);
        self.z.push(float(iz)?);

        if let (Some(normals), Some([a, b, c])) = (&mut self.normals, columns.normal) {
            normals.nx.push(float(a)?);
            normals.ny.push(float(b)?);
            normals.nz.push(float(c)?);
        }
        if let (Some(colors), Some([r, g, b])) = (&mut self.colors, columns.color) {
            colors.r.push(byte(r)?);
            colors.g.push(byte(g)?);
            colors.b.push(byte(b)?);
            colors.a.push(match columns.alpha {
                Some(a) => byte(a)?,
                None => u8::MAX,
            });
        }
        Ok(())
    }

    fn into_cloud(self) -> PointCloud {
        let mut cloud = PointCloud::from_xyz(self.x, self.y, self.z);
        cloud.normals = self.normals;
        cloud.colors = self.colors;
        cloud
    }
}

/// Reads an ASCII or binary little-endian PLY file.
///
/// Only the `vertex` element is decoded. `x`, `y`, `z` are required;
/// `nx`/`ny`/`nz` and `red`/`green`/`blue` are picked up when all three are
/// present, and a missing `alpha` reads as opaque. The declared vertex count
/// must be backed by the file body.
pub fn read_ply(path: impl AsRef<Path>) -> io::Result<PointCloud> {
    let data = fs::read(&path)?;
    let element = parse_header(&data)?;
    let columns = Columns::locate(&element)?;
    let body = &data[element.body_offset..];

    match element.encoding {
        Encoding::Ascii => read_ascii_body(&element, &columns, body),
        Encoding::BinaryLittleEndian => read_binary_body(&element, &columns, body),
    }
}

fn read_ascii_body(
    element: &VertexElement,
    columns: &Columns,
    body: &[u8],
) -> io::Result<PointCloud> {
    let body = std::str::from_utf8(body).map_err(|_| invalid("PLY body not valid UTF-8"))?;
    let fields = element.properties.len();

    // Every ASCII value takes at least one digit and one separator.
    let capacity = element.count.min(body.len() / (2 * fields).max(1));
    let mut vertices = Vertices::with_capacity(columns, capacity);

    let mut rows = body.lines().map(str::trim).filter(|l| !l.is_empty());
    for _ in 0..element.count {
        let line = rows.next().ok_or_else(|| {
            invalid(format!(
                "PLY declares {} vertices but the body ends after {}",
                element.count,
                vertices.x.len()
            ))
        })?;
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < fields {
            return Err(invalid(format!(
                "vertex line has {} fields, expected {}",
                parts.len(),
                fields
            )));
        }
        vertices.push(
            columns,
            |i| {
                parts[i]
                    .parse::<f32>()
                    .map_err(|e| invalid(format!("failed to parse float: {}", e)))
            },
            |i| {
                parts[i]
                    .parse::<u8>()
                    .map_err(|e| invalid(format!("failed to parse color byte: {}", e)))
            },
        )?;
    }

    Ok(vertices.into_cloud())
}

fn read_binary_body(
    element: &VertexElement,
    columns: &Columns,
    body: &[u8],
) -> io::Result<PointCloud> {
    let needed = element.count.checked_mul(element.stride).ok_or_else(|| {
        invalid(format!(
            "PLY declares {} vertices of {} bytes, more than any file can hold",
            element.count, element.stride
        ))
    })?;
    if body.len() < needed {
        return Err(invalid(format!(
            "PLY binary body too short: need {} bytes, got {}",
            needed,
            body.len()
        )));
    }

    let mut vertices = Vertices::with_capacity(columns, element.count);
    for record in body[..needed].chunks_exact(element.stride.max(1)) {
        vertices.push(
            columns,
            |i| {
                let property = &element.properties[i];
                Ok(property.scalar.decode(&record[property.offset..]))
            },
            |i| Ok(record[element.properties[i].offset]),
        )?;
    }

    Ok(vertices.into_cloud())
}
