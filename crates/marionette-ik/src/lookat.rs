//! Single-joint aim for 2-joint chains.

use marionette_core::math;
use marionette_core::pose::RigPose;

use crate::chain::JointChain;
use crate::solver::{self, SolveTarget};

/// Aim parameters. The solver is a single weighted shortest arc, so
/// there is nothing to tune yet; the struct keeps the call sites uniform.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LookAtParams;

pub(crate) fn solve(
    _params: &LookAtParams,
    chain: &JointChain,
    pose: &mut RigPose,
    target: &SolveTarget,
) {
    let joints = chain.joints();
    let tip = joints[0];
    let root = joints[1];

    let root_pos = pose.world_position(root.bone);
    let current = pose.world_position(tip.bone) - root_pos;
    let desired = target.position - root_pos;
    if current.norm_squared() >= math::DEGENERATE_LEN_SQ
        && desired.norm_squared() >= math::DEGENERATE_LEN_SQ
    {
        let arc = solver::shortest_arc(&current, &desired);
        let arc = math::scale_rotation(&arc, root.weight);
        pose.set_world_rotation(root.bone, arc * pose.world_rotation(root.bone));
    }

    solver::finish_solve(chain, pose, target);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
