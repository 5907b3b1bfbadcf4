use nalgebra::{Matrix4, Perspective3, Point3, Unit, UnitQuaternion, Vector3, Vector4};

const NEAR: f32 = 0.01;
const FAR: f32 = 1000.0;
/// Vertical field of view, in radians, used when none is given.
pub const DEFAULT_FOVY: f32 = 0.8575;

/// Pinhole camera looking from `position` toward `focus`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Point3<f32>,
    pub focus: Point3<f32>,
    pub up: Vector3<f32>,
    pub fovy: f32,
}

impl Camera {
    pub fn new(position: [f32; 3], focus: [f32; 3], up: [f32; 3]) -> Self {
        Self {
            position: Point3::from(position),
            focus: Point3::from(focus),
            up: Vector3::from(up),
            fovy: DEFAULT_FOVY,
        }
    }

    pub fn with_fovy(mut self, fovy: f32) -> Self {
        self.fovy = fovy;
        self
    }

    pub fn distance(&self) -> f32 {
        (self.position - self.focus).norm()
    }

    pub fn view_projection(&self, aspect: f32) -> Matrix4<f32> {
        let view = Matrix4::look_at_rh(&self.position, &self.focus, &self.up);
        let projection = Perspective3::new(aspect.max(f32::EPSILON), self.fovy, NEAR, FAR);
        projection.as_matrix() * view
    }

    /// Normalized device coordinates of `point`, both axes in `[-1, 1]` when on screen.
    ///
    /// Returns `None` for points behind the camera or outside the depth range.
    pub fn project(&self, point: [f32; 3], aspect: f32) -> Option<[f32; 2]> {
        let clip = self.view_projection(aspect) * Vector4::new(point[0], point[1], point[2], 1.0);
        project_clip(clip)
    }

    /// Project many points with one matrix; off-screen points come back as `None`.
    pub fn project_all<'a>(
        &self,
        points: impl Iterator<Item = [f32; 3]> + 'a,
        aspect: f32,
    ) -> impl Iterator<Item = Option<[f32; 2]>> + 'a {
        let vp = self.view_projection(aspect);
        points.map(move |p| project_clip(vp * Vector4::new(p[0], p[1], p[2], 1.0)))
    }

    /// Rotate the camera around its focus: `yaw` about `up`, then `pitch` about the
    /// camera's right axis. Distance to the focus is preserved.
    pub fn orbit(&mut self, yaw: f32, pitch: f32) {
        let Some(up) = Unit::try_new(self.up, f32::EPSILON) else {
            return;
        };
        let mut offset = UnitQuaternion::from_axis_angle(&up, yaw) * (self.position - self.focus);

        let right = offset.cross(&self.up);
        if let Some(right) = Unit::try_new(right, 1e-6) {
            offset = UnitQuaternion::from_axis_angle(&right, pitch) * offset;
        }
        self.position = self.focus + offset;
    }

    /// Move toward (`factor < 1`) or away from (`factor > 1`) the focus.
    pub fn zoom(&mut self, factor: f32) {
        if factor.is_finite() && factor > 0.0 {
            self.position = self.focus + (self.position - self.focus) * factor;
        }
    }
}

fn project_clip(clip: Vector4<f32>) -> Option<[f32; 2]> {
    if clip.w <= f32::EPSILON {
        return None;
    }
    let ndc = clip.xyz() / clip.w;
    if !(-1.0..=1.0).contains(&ndc.z) {
        return None;
    }
    Some([ndc.x, ndc.y])
}

#[cfg(test)]
mod tests {
    use super::Camera;
    use approx::assert_relative_eq;

    fn front_camera() -> Camera {
        Camera::new([0.0, -4.0, 0.0], [0.0, 0.0, 0.0], [0.0, 0.0, 1.0])
    }

    #[test]
    fn focus_projects_to_center() {
        let ndc = front_camera().project([0.0, 0.0, 0.0], 1.0).unwrap();
        assert_relative_eq!(ndc[0], 0.0, epsilon = 1e-6);
        assert_relative_eq!(ndc[1], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn up_is_up_and_x_is_right() {
        let cam = front_camera();
        let above = cam.project([0.0, 0.0, 1.0], 1.0).unwrap();
        let right = cam.project([1.0, 0.0, 0.0], 1.0).unwrap();
        assert!(above[1] > 0.0);
        assert_relative_eq!(above[0], 0.0, epsilon = 1e-6);
        assert!(right[0] > 0.0);
    }

    #[test]
    fn points_behind_camera_are_culled() {
        assert!(front_camera().project([0.0, -10.0, 0.0], 1.0).is_none());
    }

    #[test]
    fn project_all_matches_project() {
        let cam = front_camera();
        let pts = [[0.2, 0.0, 0.3], [-0.5, 1.0, 0.1], [0.0, -10.0, 0.0]];
        let batch: Vec<_> = cam.project_all(pts.iter().copied(), 1.5).collect();
        for (p, b) in pts.iter().zip(&batch) {
            assert_eq!(cam.project(*p, 1.5), *b);
        }
    }

    #[test]
    fn orbit_keeps_distance_to_focus() {
        let mut cam = front_camera();
        cam.orbit(0.7, -0.3);
        assert_relative_eq!(cam.distance(), 4.0, epsilon = 1e-4);
        assert!(cam.position.x.abs() > 0.1);
    }

    #[test]
    fn zoom_scales_distance() {
        let mut cam = front_camera();
        cam.zoom(0.5);
        assert_relative_eq!(cam.distance(), 2.0, epsilon = 1e-6);
        cam.zoom(-1.0);
        assert_relative_eq!(cam.distance(), 2.0, epsilon = 1e-6);
    }
}
