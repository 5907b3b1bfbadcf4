use kiddo::float::distance::SquaredEuclidean;
use kiddo::immutable::float::kdtree::ImmutableKdTree;
use pointclouds_core::PointCloud;
use std::num::NonZero;

/// Nearest-neighbour index over the positions of a [`PointCloud`].
///
/// Wraps kiddo's `ImmutableKdTree`. The tree is built once and never
/// modified, so a registration target can be indexed a single time and
/// queried by every alignment pass that follows.
///
/// Items are `u32` indices back into the source cloud.
#[derive(Debug, Clone)]
pub struct KdTree {
    tree: ImmutableKdTree<f32, u32, 3, 32>,
    num_points: usize,
}

impl KdTree {
    pub fn build(cloud: &PointCloud) -> Self {
        let points: Vec<[f32; 3]> = cloud.iter_points().collect();
        Self {
            tree: ImmutableKdTree::new_from_slice(&points),
            num_points: points.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.num_points
    }

    pub fn is_empty(&self) -> bool {
        self.num_points == 0
    }

    /// Closest indexed point to `query` as `(index, euclidean_distance)`.
    ///
    /// `None` for an empty tree or a query with a non-finite coordinate.
    pub fn nearest(&self, query: &[f32; 3]) -> Option<(usize, f32)> {
        if self.is_empty() || !query.iter().all(|v| v.is_finite()) {
            return None;
        }
        let nn = self.tree.nearest_one::<SquaredEuclidean>(query);
        Some((nn.item as usize, nn.distance.sqrt()))
    }

    /// Find the `k` nearest neighbours to `query`.
    ///
    /// Returns `(indices, distances)` with Euclidean distances in ascending
    /// order. Empty if `k == 0`, the tree is empty, or the query is not finite.
    pub fn knn(&self, query: &[f32; 3], k: usize) -> (Vec<usize>, Vec<f32>) {
        let Some(nz_k) = NonZero::new(k) else {
            return (Vec::new(), Vec::new());
        };
        if self.is_empty() || !query.iter().all(|v| v.is_finite()) {
            return (Vec::new(), Vec::new());
        }

        let results = self.tree.nearest_n::<SquaredEuclidean>(query, nz_k);

        let mut indices = Vec::with_capacity(results.len());
        let mut distances = Vec::with_capacity(results.len());
        for nn in results {
            indices.push(nn.item as usize);
            distances.push(nn.distance.sqrt());
        }

        (indices, distances)
    }
}
