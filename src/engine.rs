//! Single-pass ICP refinement of the moving cloud.

use std::sync::Arc;

use pointclouds_core::PointCloud;
use pointclouds_registration::{apply_transform, icp_point_to_point_with_tree, IcpParams};
use pointclouds_spatial::KdTree;

use crate::AlignError;

/// The registration problem being worked on: a fixed target and the cloud
/// being pulled onto it.
#[derive(Debug, Clone)]
pub struct AlignmentState {
    pub target: Arc<PointCloud>,
    pub moving: PointCloud,
    pub has_converged: bool,
    /// Mean squared residual of the last pass. Infinite before the first one.
    pub fitness_score: f32,
}

impl AlignmentState {
    pub fn new(target: Arc<PointCloud>, moving: PointCloud) -> Self {
        Self {
            target,
            moving,
            has_converged: false,
            fitness_score: f32::INFINITY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    pub converged: bool,
    pub fitness_score: f32,
}

/// Runs exactly one ICP pass per [`step`](AlignmentEngine::step).
///
/// The target's k-d tree is built once and reused while the state keeps
/// pointing at the same target.
pub struct AlignmentEngine {
    params: IcpParams,
    target: Arc<PointCloud>,
    tree: KdTree,
}

impl AlignmentEngine {
    /// `params.max_iterations` is forced to 1.
    pub fn new(target: &Arc<PointCloud>, params: IcpParams) -> Self {
        Self {
            params: IcpParams {
                max_iterations: 1,
                ..params
            },
            target: Arc::clone(target),
            tree: KdTree::build(target),
        }
    }

    pub fn params(&self) -> &IcpParams {
        &self.params
    }

    /// Refine `state.moving` in place by one pass and record the outcome.
    ///
    /// The moving cloud takes the pass's transform even when the pass did not
    /// converge; callers decide what to do with an unconverged result.
    pub fn step(&mut self, state: &mut AlignmentState) -> Result<StepOutcome, AlignError> {
        if state.target.is_empty() {
            return Err(AlignError::EmptyTarget);
        }
        if state.moving.is_empty() {
            return Err(AlignError::EmptyMoving);
        }
        if !Arc::ptr_eq(&self.target, &state.target) {
            self.target = Arc::clone(&state.target);
            self.tree = KdTree::build(&self.target);
        }

        let result =
            icp_point_to_point_with_tree(&state.moving, &state.target, &self.tree, &self.params);
        if !result.transform.is_identity(0.0) {
            state.moving = apply_transform(&state.moving, &result.transform);
        }
        state.has_converged = result.converged;
        state.fitness_score = result.fitness_score;

        Ok(StepOutcome {
            converged: result.converged,
            fitness_score: result.fitness_score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{AlignmentEngine, AlignmentState};
    use crate::AlignError;
    use pointclouds_core::PointCloud;
    use pointclouds_registration::{apply_transform, IcpParams, RigidTransform};
    use std::sync::Arc;

    fn helix(n: usize) -> PointCloud {
        let t: Vec<f32> = (0..n).map(|i| i as f32 * 0.1).collect();
        PointCloud::from_xyz(
            t.iter().map(|t| t.cos()).collect(),
            t.iter().map(|t| t.sin()).collect(),
            t.iter().map(|t| t * 0.05).collect(),
        )
    }

    #[test]
    fn forces_single_iteration() {
        let target = Arc::new(helix(50));
        let params = IcpParams {
            max_iterations: 40,
            ..IcpParams::default()
        };
        assert_eq!(AlignmentEngine::new(&target, params).params().max_iterations, 1);
    }

    #[test]
    fn steps_reduce_fitness_score() {
        let target = Arc::new(helix(120));
        let moving = apply_transform(&target, &RigidTransform::rotation_z(0.1, [0.05, 0.0, 0.02]));
        let mut engine = AlignmentEngine::new(&target, IcpParams::default());
        let mut state = AlignmentState::new(Arc::clone(&target), moving);

        let first = engine.step(&mut state).unwrap();
        assert!(first.converged);
        assert!(state.has_converged);
        let mut last = first.fitness_score;
        for _ in 0..20 {
            let outcome = engine.step(&mut state).unwrap();
            assert!(outcome.fitness_score <= last + 1e-5);
            last = outcome.fitness_score;
        }
        assert!(last < first.fitness_score);
    }

    #[test]
    fn empty_inputs_are_reported() {
        let target = Arc::new(helix(10));
        let mut engine = AlignmentEngine::new(&target, IcpParams::default());

        let mut state = AlignmentState::new(Arc::clone(&target), PointCloud::new());
        assert_eq!(engine.step(&mut state), Err(AlignError::EmptyMoving));

        let mut state = AlignmentState::new(Arc::new(PointCloud::new()), helix(10));
        assert_eq!(engine.step(&mut state), Err(AlignError::EmptyTarget));
    }

    #[test]
    fn out_of_range_pass_does_not_converge() {
        let target = Arc::new(helix(30));
        let far = apply_transform(&target, &RigidTransform::rotation_z(0.0, [100.0, 0.0, 0.0]));
        let params = IcpParams {
            max_correspondence_distance: 0.5,
            ..IcpParams::default()
        };
        let mut engine = AlignmentEngine::new(&target, params);
        let mut state = AlignmentState::new(Arc::clone(&target), far.clone());
        let outcome = engine.step(&mut state).unwrap();
        assert!(!outcome.converged);
        assert!(!state.has_converged);
        assert_eq!(state.moving, far);
    }

    #[test]
    fn follows_a_new_target() {
        let first = Arc::new(helix(40));
        let mut engine = AlignmentEngine::new(&first, IcpParams::default());
        let second = Arc::new(apply_transform(
            &helix(40),
            &RigidTransform::rotation_z(0.0, [0.0, 0.0, 3.0]),
        ));
        let mut state = AlignmentState::new(Arc::clone(&second), (*second).clone());
        let outcome = engine.step(&mut state).unwrap();
        assert!(outcome.fitness_score < 1e-6);
    }
}
