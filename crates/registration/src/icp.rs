use nalgebra::{Matrix3, Matrix4, Vector3, SVD};
use pointclouds_core::{Normals, PointCloud};
use pointclouds_spatial::KdTree;

use crate::correspondence::Matches;

/// Fewest correspondences that pin down a rigid transform.
pub const MIN_CORRESPONDENCES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    pub rotation: [[f32; 3]; 3],
    pub translation: [f32; 3],
}

impl RigidTransform {
    pub fn identity() -> Self {
        Self {
            rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            translation: [0.0, 0.0, 0.0],
        }
    }

    /// Rotation of `theta` radians about +Z followed by `translation`.
    pub fn rotation_z(theta: f32, translation: [f32; 3]) -> Self {
        let (sin_t, cos_t) = theta.sin_cos();
        Self {
            rotation: [[cos_t, -sin_t, 0.0], [sin_t, cos_t, 0.0], [0.0, 0.0, 1.0]],
            translation,
        }
    }

    pub fn is_identity(&self, eps: f32) -> bool {
        let id = Self::identity();
        for r in 0..3 {
            for c in 0..3 {
                if (self.rotation[r][c] - id.rotation[r][c]).abs() > eps {
                    return false;
                }
            }
        }
        self.translation.iter().all(|t| t.abs() <= eps)
    }

    /// Apply the rigid transform to a single point: R * p + t
    pub fn apply_to_point(&self, p: &[f32; 3]) -> [f32; 3] {
        let r = &self.rotation;
        let t = &self.translation;
        [
            r[0][0] * p[0] + r[0][1] * p[1] + r[0][2] * p[2] + t[0],
            r[1][0] * p[0] + r[1][1] * p[1] + r[1][2] * p[2] + t[1],
            r[2][0] * p[0] + r[2][1] * p[1] + r[2][2] * p[2] + t[2],
        ]
    }

    /// Rotate a direction (no translation): R * v
    pub fn apply_to_vector(&self, v: &[f32; 3]) -> [f32; 3] {
        let r = &self.rotation;
        [
            r[0][0] * v[0] + r[0][1] * v[1] + r[0][2] * v[2],
            r[1][0] * v[0] + r[1][1] * v[1] + r[1][2] * v[2],
            r[2][0] * v[0] + r[2][1] * v[1] + r[2][2] * v[2],
        ]
    }

    /// Compose two transforms: apply `self` first, then `other`.
    ///
    /// Result: R_new = other.R * self.R, t_new = other.R * self.t + other.t
    pub fn compose(&self, other: &RigidTransform) -> RigidTransform {
        let r_self = mat3_from_arrays(&self.rotation);
        let r_other = mat3_from_arrays(&other.rotation);
        let t_self = Vector3::from(self.translation);
        let t_other = Vector3::from(other.translation);

        let r_new = r_other * r_self;
        let t_new = r_other * t_self + t_other;

        RigidTransform {
            rotation: mat3_to_arrays(&r_new),
            translation: [t_new[0], t_new[1], t_new[2]],
        }
    }

    /// The inverse rigid motion: R^T, -R^T * t
    pub fn inverse(&self) -> RigidTransform {
        let r_t = mat3_from_arrays(&self.rotation).transpose();
        let t = -(r_t * Vector3::from(self.translation));
        RigidTransform {
            rotation: mat3_to_arrays(&r_t),
            translation: [t[0], t[1], t[2]],
        }
    }

    /// 4x4 homogeneous form.
    pub fn to_matrix4(&self) -> Matrix4<f32> {
        let r = &self.rotation;
        let t = &self.translation;
        Matrix4::new(
            r[0][0], r[0][1], r[0][2], t[0], //
            r[1][0], r[1][1], r[1][2], t[1], //
            r[2][0], r[2][1], r[2][2], t[2], //
            0.0, 0.0, 0.0, 1.0,
        )
    }

    /// Read the rotation and translation blocks of a homogeneous matrix.
    /// The bottom row is ignored.
    pub fn from_matrix4(m: &Matrix4<f32>) -> Self {
        Self {
            rotation: [
                [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
                [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
                [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
            ],
            translation: [m[(0, 3)], m[(1, 3)], m[(2, 3)]],
        }
    }
}

/// Apply a rigid transform to all points in a cloud, returning a new cloud.
///
/// Normals are rotated; colors and intensity are carried over untouched.
pub fn apply_transform(cloud: &PointCloud, transform: &RigidTransform) -> PointCloud {
    let n = cloud.len();
    let mut x = Vec::with_capacity(n);
    let mut y = Vec::with_capacity(n);
    let mut z = Vec::with_capacity(n);

    for p in cloud.iter_points() {
        let tp = transform.apply_to_point(&p);
        x.push(tp[0]);
        y.push(tp[1]);
        z.push(tp[2]);
    }

    let normals = cloud.normals.as_ref().map(|normals| {
        let mut out = Normals {
            nx: Vec::with_capacity(n),
            ny: Vec::with_capacity(n),
            nz: Vec::with_capacity(n),
        };
        for i in 0..n {
            let v = transform.apply_to_vector(&[normals.nx[i], normals.ny[i], normals.nz[i]]);
            out.nx.push(v[0]);
            out.ny.push(v[1]);
            out.nz.push(v[2]);
        }
        out
    });

    PointCloud {
        x,
        y,
        z,
        normals,
        colors: cloud.colors.clone(),
        intensity: cloud.intensity.clone(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IcpParams {
    pub max_iterations: usize,
    pub tolerance: f32,
    pub max_correspondence_distance: f32,
}

impl Default for IcpParams {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            tolerance: 1e-5,
            max_correspondence_distance: f32::INFINITY,
        }
    }
}

/// Why an ICP run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// RMSE change between two passes fell below `tolerance`.
    Tolerance,
    /// `max_iterations` passes were completed.
    MaxIterations,
    /// A pass found fewer than [`MIN_CORRESPONDENCES`] matches.
    NoCorrespondences,
    /// Source or target had no points.
    EmptyInput,
}

impl Termination {
    /// Tolerance and the iteration cap are both satisfied stopping criteria;
    /// running out of correspondences or input is a failure.
    pub fn is_converged(self) -> bool {
        matches!(self, Termination::Tolerance | Termination::MaxIterations)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IcpResult {
    pub transform: RigidTransform,
    /// Share of source points that found a correspondence in the last pass.
    pub fitness: f32,
    pub rmse: f32,
    /// Mean squared nearest-neighbour distance after applying `transform`
    /// (lower is better). Infinite when nothing matched.
    pub fitness_score: f32,
    pub converged: bool,
    pub termination: Termination,
    pub num_iterations: usize,
}

impl IcpResult {
    fn empty() -> Self {
        Self {
            transform: RigidTransform::identity(),
            fitness: 0.0,
            rmse: 0.0,
            fitness_score: f32::INFINITY,
            converged: false,
            termination: Termination::EmptyInput,
            num_iterations: 0,
        }
    }
}

/// Point-to-point ICP registration using SVD.
///
/// Aligns `source` to `target` by iteratively finding nearest-neighbor
/// correspondences and computing the optimal rigid transform via SVD
/// decomposition of the cross-covariance matrix.
pub fn icp_point_to_point(
    source: &PointCloud,
    target: &PointCloud,
    params: &IcpParams,
) -> IcpResult {
    if source.is_empty() || target.is_empty() {
        return IcpResult::empty();
    }
    let target_tree = KdTree::build(target);
    icp_point_to_point_with_tree(source, target, &target_tree, params)
}

/// [`icp_point_to_point`] against a prebuilt index of `target`.
///
/// Callers that align repeatedly against the same target should build the
/// tree once and reuse it here.
pub fn icp_point_to_point_with_tree(
    source: &PointCloud,
    target: &PointCloud,
    target_tree: &KdTree,
    params: &IcpParams,
) -> IcpResult {
    if source.is_empty() || target.is_empty() || target_tree.is_empty() {
        return IcpResult::empty();
    }

    let mut current = source.clone();
    let mut cumulative = RigidTransform::identity();

    let mut prev_rmse = f32::INFINITY;
    let mut termination = Termination::MaxIterations;
    let mut num_iterations = 0;
    let mut last_rmse = 0.0_f32;
    let mut last_fitness = 0.0_f32;

    for iter in 0..params.max_iterations {
        num_iterations = iter + 1;

        let matches = Matches::nearest(&current, target_tree, params.max_correspondence_distance);

        last_fitness = matches.inlier_ratio();
        if matches.len() < MIN_CORRESPONDENCES {
            termination = Termination::NoCorrespondences;
            break;
        }

        let rmse = matches.rmse();
        last_rmse = rmse;

        if (prev_rmse - rmse).abs() < params.tolerance {
            termination = Termination::Tolerance;
            break;
        }
        prev_rmse = rmse;

        let incremental = compute_rigid_transform_svd(&current, target, &matches);
        cumulative = cumulative.compose(&incremental);
        current = apply_transform(&current, &incremental);
    }

    let settled = Matches::nearest(&current, target_tree, params.max_correspondence_distance);

    IcpResult {
        transform: cumulative,
        fitness: last_fitness,
        rmse: last_rmse,
        fitness_score: settled.mean_squared_distance(),
        converged: termination.is_converged(),
        termination,
        num_iterations,
    }
}

/// Compute the optimal rigid transform (rotation + translation) that aligns
/// the corresponding source points to target points, using SVD.
fn compute_rigid_transform_svd(
    source: &PointCloud,
    target: &PointCloud,
    matches: &Matches,
) -> RigidTransform {
    let pairs = matches.pairs();
    let n = pairs.len();
    if n == 0 {
        return RigidTransform::identity();
    }

    let mut src_centroid = Vector3::new(0.0_f32, 0.0, 0.0);
    let mut tgt_centroid = Vector3::new(0.0_f32, 0.0, 0.0);

    for p in pairs {
        src_centroid += Vector3::from(source.point(p.source));
        tgt_centroid += Vector3::from(target.point(p.target));
    }

    let n_f = n as f32;
    src_centroid /= n_f;
    tgt_centroid /= n_f;

    // H = sum (src_i - src_centroid)(tgt_i - tgt_centroid)^T
    let mut h = Matrix3::<f32>::zeros();

    for p in pairs {
        let src_pt = Vector3::from(source.point(p.source)) - src_centroid;
        let tgt_pt = Vector3::from(target.point(p.target)) - tgt_centroid;
        h += src_pt * tgt_pt.transpose();
    }

    let svd = SVD::new(h, true, true);
    let (Some(u), Some(mut v_t)) = (svd.u, svd.v_t) else {
        return RigidTransform::identity();
    };

    // Reflection case: det(V * U^T) < 0, flip the last singular direction.
    let det = (v_t.transpose() * u.transpose()).determinant();
    if det < 0.0 {
        v_t[(2, 0)] = -v_t[(2, 0)];
        v_t[(2, 1)] = -v_t[(2, 1)];
        v_t[(2, 2)] = -v_t[(2, 2)];
    }

    let rotation = v_t.transpose() * u.transpose();
    let translation = tgt_centroid - rotation * src_centroid;

    RigidTransform {
        rotation: mat3_to_arrays(&rotation),
        translation: [translation[0], translation[1], translation[2]],
    }
}

/// Convert a nalgebra Matrix3 to a [[f32; 3]; 3] array (row-major).
fn mat3_to_arrays(m: &Matrix3<f32>) -> [[f32; 3]; 3] {
    [
        [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
        [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
        [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
    ]
}

/// Convert a [[f32; 3]; 3] array to a nalgebra Matrix3.
fn mat3_from_arrays(a: &[[f32; 3]; 3]) -> Matrix3<f32> {
    Matrix3::new(
        a[0][0], a[0][1], a[0][2], a[1][0], a[1][1], a[1][2], a[2][0], a[2][1], a[2][2],
    )
}
