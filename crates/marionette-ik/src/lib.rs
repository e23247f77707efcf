//! IK solvers for marionette joint chains.
//!
//! # Architecture
//!
//! ```text
//! BoneGraph ──► JointChain ──► Solver::solve ──► local rotations in RigPose
//! ```
//!
//! A [`JointChain`] is validated once against the host bone graph (length
//! bounds, joint resolution, strict ancestor ordering) and caches the
//! per-joint bone handles. The [`Solver`] then operates on that chain,
//! taking a world-space [`SolveTarget`] and a mutable [`RigPose`], and
//! leaves the solved local rotations in the pose.
//!
//! [`RigPose`]: marionette_core::RigPose

pub mod ccd;
pub mod chain;
pub mod limb;
pub mod lookat;
pub mod solver;

pub use ccd::CcdParams;
pub use chain::{ChainJoint, JointChain};
pub use limb::{direction_from_pose, LimbParams};
pub use lookat::LookAtParams;
pub use solver::{PoseScope, SolveTarget, Solver};
