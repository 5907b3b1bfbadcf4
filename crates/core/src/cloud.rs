use crate::Aabb;

#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud {
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    pub z: Vec<f32>,
    pub normals: Option<Normals>,
    pub colors: Option<Colors>,
    pub intensity: Option<Vec<f32>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Normals {
    pub nx: Vec<f32>,
    pub ny: Vec<f32>,
    pub nz: Vec<f32>,
}

/// Per-point RGBA color channels.
///
/// Packed form is `0xAARRGGBB`, the layout PCD files use for the `rgba` field.
#[derive(Debug, Clone, PartialEq)]
pub struct Colors {
    pub r: Vec<u8>,
    pub g: Vec<u8>,
    pub b: Vec<u8>,
    pub a: Vec<u8>,
}

impl Colors {
    /// Opaque colors from separate r/g/b channels.
    pub fn from_rgb(r: Vec<u8>, g: Vec<u8>, b: Vec<u8>) -> Self {
        assert_eq!(r.len(), g.len(), "r and g must have same length");
        assert_eq!(r.len(), b.len(), "r and b must have same length");
        let a = vec![u8::MAX; r.len()];
        Self { r, g, b, a }
    }

    pub fn uniform(n: usize, rgba: [u8; 4]) -> Self {
        Self {
            r: vec![rgba[0]; n],
            g: vec![rgba[1]; n],
            b: vec![rgba[2]; n],
            a: vec![rgba[3]; n],
        }
    }

    pub fn from_packed(packed: &[u32]) -> Self {
        let mut colors = Self {
            r: Vec::with_capacity(packed.len()),
            g: Vec::with_capacity(packed.len()),
            b: Vec::with_capacity(packed.len()),
            a: Vec::with_capacity(packed.len()),
        };
        for &p in packed {
            let [a, r, g, b] = p.to_be_bytes();
            colors.r.push(r);
            colors.g.push(g);
            colors.b.push(b);
            colors.a.push(a);
        }
        colors
    }

    pub fn len(&self) -> usize {
        self.r.len()
    }

    pub fn is_empty(&self) -> bool {
        self.r.is_empty()
    }

    pub fn rgba(&self, i: usize) -> [u8; 4] {
        [self.r[i], self.g[i], self.b[i], self.a[i]]
    }

    pub fn packed(&self, i: usize) -> u32 {
        u32::from_be_bytes([self.a[i], self.r[i], self.g[i], self.b[i]])
    }

    fn select(&self, indices: &[usize]) -> Self {
        Self {
            r: indices.iter().map(|&idx| self.r[idx]).collect(),
            g: indices.iter().map(|&idx| self.g[idx]).collect(),
            b: indices.iter().map(|&idx| self.b[idx]).collect(),
            a: indices.iter().map(|&idx| self.a[idx]).collect(),
        }
    }
}

impl PointCloud {
    pub fn new() -> Self {
        Self {
            x: Vec::new(),
            y: Vec::new(),
            z: Vec::new(),
            normals: None,
            colors: None,
            intensity: None,
        }
    }

    pub fn from_xyz(x: Vec<f32>, y: Vec<f32>, z: Vec<f32>) -> Self {
        assert_eq!(x.len(), y.len(), "x and y must have same length");
        assert_eq!(x.len(), z.len(), "x and z must have same length");

        Self {
            x,
            y,
            z,
            normals: None,
            colors: None,
            intensity: None,
        }
    }

    /// Attach per-point colors. Panics if the channel length does not match.
    pub fn with_colors(mut self, colors: Colors) -> Self {
        assert_eq!(
            colors.len(),
            self.len(),
            "colors must have one entry per point"
        );
        self.colors = Some(colors);
        self
    }

    pub fn len(&self) -> usize {
        debug_assert_eq!(self.x.len(), self.y.len());
        debug_assert_eq!(self.x.len(), self.z.len());
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::from_xyz(&self.x, &self.y, &self.z)
    }

    pub fn point(&self, i: usize) -> [f32; 3] {
        [self.x[i], self.y[i], self.z[i]]
    }

    /// RGBA of point `i`, or `None` when the cloud carries no color channel.
    pub fn color(&self, i: usize) -> Option<[u8; 4]> {
        self.colors.as_ref().map(|c| c.rgba(i))
    }

    pub fn iter_points(&self) -> impl Iterator<Item = [f32; 3]> + '_ {
        self.x
            .iter()
            .zip(&self.y)
            .zip(&self.z)
            .map(|((x, y), z)| [*x, *y, *z])
    }

    /// Gather the points at `indices`, carrying every optional attribute along.
    pub fn select(&self, indices: &[usize]) -> Self {
        let mut x = Vec::with_capacity(indices.len());
        let mut y = Vec::with_capacity(indices.len());
        let mut z = Vec::with_capacity(indices.len());

        for &idx in indices {
            assert!(idx < self.len(), "index out of bounds in select");
            x.push(self.x[idx]);
            y.push(self.y[idx]);
            z.push(self.z[idx]);
        }

        let normals = self.normals.as_ref().map(|n| Normals {
            nx: indices.iter().map(|&idx| n.nx[idx]).collect(),
            ny: indices.iter().map(|&idx| n.ny[idx]).collect(),
            nz: indices.iter().map(|&idx| n.nz[idx]).collect(),
        });

        let colors = self.colors.as_ref().map(|c| c.select(indices));

        let intensity = self
            .intensity
            .as_ref()
            .map(|it| indices.iter().map(|&idx| it[idx]).collect());

        Self {
            x,
            y,
            z,
            normals,
            colors,
            intensity,
        }
    }
}

impl Default for PointCloud {
    fn default() -> Self {
        Self::new()
    }
}
