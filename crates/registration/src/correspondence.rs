use pointclouds_core::PointCloud;
use pointclouds_spatial::KdTree;

/// A source point paired with its nearest target point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pair {
    pub source: usize,
    pub target: usize,
    pub distance: f32,
}

/// Nearest-neighbour pairs from one ICP pass, plus the statistics the pass
/// reports about them.
#[derive(Debug, Clone, Default)]
pub struct Matches {
    pairs: Vec<Pair>,
    queried: usize,
}

impl Matches {
    /// Pairs every point of `source` with its nearest neighbour in
    /// `target_tree`, dropping pairs farther apart than `max_distance`.
    ///
    /// Source points with a non-finite coordinate never match.
    pub fn nearest(source: &PointCloud, target_tree: &KdTree, max_distance: f32) -> Self {
        let pairs = source
            .iter_points()
            .enumerate()
            .filter_map(|(source, query)| {
                let (target, distance) = target_tree.nearest(&query)?;
                (distance <= max_distance).then_some(Pair {
                    source,
                    target,
                    distance,
                })
            })
            .collect();
        Self {
            pairs,
            queried: source.len(),
        }
    }

    pub fn pairs(&self) -> &[Pair] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Share of queried points that found a partner.
    pub fn inlier_ratio(&self) -> f32 {
        if self.queried == 0 {
            return 0.0;
        }
        self.pairs.len() as f32 / self.queried as f32
    }

    /// Root mean square pair distance; zero with no pairs.
    pub fn rmse(&self) -> f32 {
        if self.pairs.is_empty() {
            return 0.0;
        }
        self.mean_squared_distance().sqrt()
    }

    /// Mean squared pair distance, accumulated in f64; infinite with no pairs.
    pub fn mean_squared_distance(&self) -> f32 {
        if self.pairs.is_empty() {
            return f32::INFINITY;
        }
        let sum: f64 = self
            .pairs
            .iter()
            .map(|p| f64::from(p.distance).powi(2))
            .sum();
        (sum / self.pairs.len() as f64) as f32
    }
}
