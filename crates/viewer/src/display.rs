use pointclouds_core::PointCloud;

use crate::{Camera, CloudStyle, ViewportId, ViewportRect};

/// Color used for points when a cloud is shown natively but has no color channel.
pub const UNCOLORED: [u8; 3] = [0, 0, 0];

/// A cloud resolved into what gets drawn: positions and one RGB per point.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayCloud {
    pub id: String,
    pub positions: Vec<[f32; 3]>,
    pub colors: Vec<[u8; 3]>,
    /// Bumped on every update of this id.
    pub revision: u64,
}

impl DisplayCloud {
    fn resolve(id: &str, cloud: &PointCloud, style: CloudStyle, revision: u64) -> Self {
        let positions: Vec<[f32; 3]> = cloud.iter_points().collect();
        let colors = match (style, cloud.colors.as_ref()) {
            (CloudStyle::Flat(rgb), _) => vec![rgb; positions.len()],
            (CloudStyle::Native, Some(c)) => (0..c.len())
                .map(|i| {
                    let [r, g, b, _] = c.rgba(i);
                    [r, g, b]
                })
                .collect(),
            (CloudStyle::Native, None) => vec![UNCOLORED; positions.len()],
        };
        Self {
            id: id.to_owned(),
            positions,
            colors,
            revision,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    pub rect: ViewportRect,
    pub background: [f32; 3],
    pub camera: Option<Camera>,
    pub clouds: Vec<DisplayCloud>,
}

impl Viewport {
    fn new(rect: ViewportRect) -> Self {
        Self {
            rect,
            background: [0.0, 0.0, 0.0],
            camera: None,
            clouds: Vec::new(),
        }
    }

    pub fn cloud(&self, id: &str) -> Option<&DisplayCloud> {
        self.clouds.iter().find(|c| c.id == id)
    }
}

/// Everything a surface shows, independent of how it gets painted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayList {
    viewports: Vec<Viewport>,
    updates: u64,
}

impl DisplayList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_viewport(&mut self, rect: ViewportRect) -> ViewportId {
        self.viewports.push(Viewport::new(rect));
        ViewportId(self.viewports.len() - 1)
    }

    pub fn viewports(&self) -> &[Viewport] {
        &self.viewports
    }

    pub fn viewport(&self, id: ViewportId) -> Option<&Viewport> {
        self.viewports.get(id.0)
    }

    pub fn viewport_mut(&mut self, id: ViewportId) -> Option<&mut Viewport> {
        self.viewports.get_mut(id.0)
    }

    /// Total number of cloud insertions and replacements so far.
    pub fn updates(&self) -> u64 {
        self.updates
    }

    pub fn set_background(&mut self, rgb: [f32; 3], viewport: ViewportId) {
        if let Some(vp) = self.viewport_mut(viewport) {
            vp.background = rgb;
        }
    }

    pub fn set_camera(&mut self, camera: Camera, viewport: ViewportId) {
        if let Some(vp) = self.viewport_mut(viewport) {
            vp.camera = Some(camera);
        }
    }

    /// Returns `false` if `viewport` does not exist.
    pub fn upsert(
        &mut self,
        id: &str,
        cloud: &PointCloud,
        style: CloudStyle,
        viewport: ViewportId,
    ) -> bool {
        let Some(vp) = self.viewports.get_mut(viewport.0) else {
            return false;
        };
        self.updates += 1;
        match vp.clouds.iter_mut().find(|c| c.id == id) {
            Some(existing) => {
                let revision = existing.revision + 1;
                *existing = DisplayCloud::resolve(id, cloud, style, revision);
            }
            None => vp.clouds.push(DisplayCloud::resolve(id, cloud, style, 0)),
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::{DisplayList, UNCOLORED};
    use crate::{CloudStyle, ViewportId, ViewportRect};
    use pointclouds_core::{Colors, PointCloud};

    fn two_points() -> PointCloud {
        PointCloud::from_xyz(vec![0.0, 1.0], vec![0.0, 1.0], vec![0.0, 1.0])
    }

    #[test]
    fn upsert_replaces_cloud_with_same_id() {
        let mut list = DisplayList::new();
        let vp = list.create_viewport(ViewportRect::FULL);
        assert!(list.upsert("a", &two_points(), CloudStyle::Flat([1, 2, 3]), vp));
        let moved = PointCloud::from_xyz(vec![5.0], vec![5.0], vec![5.0]);
        assert!(list.upsert("a", &moved, CloudStyle::Flat([1, 2, 3]), vp));

        let viewport = list.viewport(vp).unwrap();
        assert_eq!(viewport.clouds.len(), 1);
        let shown = viewport.cloud("a").unwrap();
        assert_eq!(shown.positions, vec![[5.0, 5.0, 5.0]]);
        assert_eq!(shown.revision, 1);
        assert_eq!(list.updates(), 2);
    }

    #[test]
    fn native_style_uses_point_colors() {
        let mut list = DisplayList::new();
        let vp = list.create_viewport(ViewportRect::FULL);
        let cloud = two_points().with_colors(Colors::from_rgb(vec![9, 8], vec![7, 6], vec![5, 4]));
        list.upsert("c", &cloud, CloudStyle::Native, vp);
        let shown = list.viewport(vp).unwrap().cloud("c").unwrap();
        assert_eq!(shown.colors, vec![[9, 7, 5], [8, 6, 4]]);
    }

    #[test]
    fn native_style_without_colors_falls_back() {
        let mut list = DisplayList::new();
        let vp = list.create_viewport(ViewportRect::FULL);
        list.upsert("c", &two_points(), CloudStyle::Native, vp);
        let shown = list.viewport(vp).unwrap().cloud("c").unwrap();
        assert_eq!(shown.colors, vec![UNCOLORED; 2]);
    }

    #[test]
    fn flat_style_overrides_point_colors() {
        let mut list = DisplayList::new();
        let vp = list.create_viewport(ViewportRect::FULL);
        let cloud = two_points().with_colors(Colors::uniform(2, [200, 100, 50, 255]));
        list.upsert("c", &cloud, CloudStyle::Flat([20, 180, 20]), vp);
        let shown = list.viewport(vp).unwrap().cloud("c").unwrap();
        assert_eq!(shown.colors, vec![[20, 180, 20]; 2]);
    }

    #[test]
    fn unknown_viewport_is_rejected() {
        let mut list = DisplayList::new();
        assert!(!list.upsert("a", &two_points(), CloudStyle::Native, ViewportId(3)));
        assert_eq!(list.updates(), 0);
    }
}
