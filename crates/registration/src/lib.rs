#![forbid(unsafe_code)]

pub mod correspondence;
pub mod icp;

pub use correspondence::{Matches, Pair};
pub use icp::{
    apply_transform, icp_point_to_point, icp_point_to_point_with_tree, IcpParams, IcpResult,
    RigidTransform, Termination, MIN_CORRESPONDENCES,
};
