//! Cyclic coordinate descent for chains of 2 to 16 joints.

use nalgebra::Unit;
use nalgebra::UnitQuaternion;

use marionette_core::math;
use marionette_core::pose::RigPose;
use marionette_core::IkSettings;

use crate::chain::JointChain;
use crate::solver::{self, SolveTarget};

/// |dot| above which a segment counts as colinear with the root-to-target
/// direction when checking for the straight-chain singularity.
const COLINEAR_DOT: f32 = 0.9999;

/// CCD parameters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CcdParams {
    /// Reset every chain joint to its reference local rotation before
    /// iterating. Without this the solve refines the current pose.
    pub reset_rotations: bool,
    /// Twist about the root-to-tip axis applied after convergence, in
    /// degrees. Only meaningful with `reset_rotations`; a refining solve
    /// already starts from a pose that carries its twist.
    pub swivel_deg: f32,
}

pub(crate) fn solve(
    params: &CcdParams,
    chain: &JointChain,
    pose: &mut RigPose,
    target: &SolveTarget,
    settings: &IkSettings,
) {
    if params.reset_rotations {
        for joint in chain.joints() {
            pose.set_local_rotation(joint.bone, pose.bind_local_rotation(joint.bone));
        }
    }

    avoid_singularity(chain, pose, target, settings);

    let tip = chain.tip();
    for _ in 0..settings.max_iterations {
        // Tip-adjacent joint first, root last.
        for joint in chain.joints().iter().skip(1) {
            let joint_pos = pose.world_position(joint.bone);
            let to_tip = pose.world_position(tip) - joint_pos;
            let to_goal = target.position - joint_pos;
            if to_tip.norm_squared() < math::DEGENERATE_LEN_SQ
                || to_goal.norm_squared() < math::DEGENERATE_LEN_SQ
            {
                continue;
            }
            let arc = solver::shortest_arc(&to_tip, &to_goal);
            let arc = math::scale_rotation(&arc, joint.weight);
            let world = pose.world_rotation(joint.bone);
            pose.set_world_rotation(joint.bone, arc * world);
        }
        if (pose.world_position(tip) - target.position).norm_squared() < settings.tolerance_sq {
            break;
        }
    }

    if params.reset_rotations && params.swivel_deg.abs() > f32::EPSILON {
        apply_swivel(chain, pose, params.swivel_deg);
    }

    solver::finish_solve(chain, pose, target);
}

/// Break the straight-chain singularity.
///
/// When the target is within reach and every segment is colinear with the
/// root-to-target direction, per-joint shortest arcs degenerate (pulling
/// a straight chain toward a closer point on its own axis produces no
/// bend). Pre-rotating the root by a small fixed angle about the chain's
/// bend reference gives the iteration a plane to fold in.
fn avoid_singularity(
    chain: &JointChain,
    pose: &mut RigPose,
    target: &SolveTarget,
    settings: &IkSettings,
) {
    let root_pos = pose.world_position(chain.root());
    let to_target = target.position - root_pos;
    let dist_sq = to_target.norm_squared();
    if dist_sq < math::DEGENERATE_LEN_SQ {
        return;
    }
    let dist = dist_sq.sqrt();
    if dist > chain.reach(pose) {
        // Out of reach: the chain stretches straight toward the target,
        // which the plain iteration handles.
        return;
    }
    let dir = to_target / dist;

    let joints = chain.joints();
    for pair in joints.windows(2) {
        let segment = pose.world_position(pair[0].bone) - pose.world_position(pair[1].bone);
        if segment.norm_squared() < math::DEGENERATE_LEN_SQ {
            continue;
        }
        if segment.normalize().dot(&dir).abs() < COLINEAR_DOT {
            // Already bent somewhere.
            return;
        }
    }

    tracing::debug!(
        level = chain.level(),
        "straight chain within reach, nudging root"
    );
    let axis = Unit::new_normalize(chain.basic_dir(pose));
    let nudge =
        UnitQuaternion::from_axis_angle(&axis, settings.singularity_nudge_deg.to_radians());
    let world = pose.world_rotation(chain.root());
    pose.set_world_rotation(chain.root(), nudge * world);
}

/// Twist the whole solved chain about its root-to-tip axis. The tip stays
/// put; the intermediate joints sweep around the axis.
fn apply_swivel(chain: &JointChain, pose: &mut RigPose, deg: f32) {
    let axis_vec = pose.world_position(chain.tip()) - pose.world_position(chain.root());
    if axis_vec.norm_squared() < math::DEGENERATE_LEN_SQ {
        return;
    }
    let axis = Unit::new_normalize(axis_vec);
    let twist = UnitQuaternion::from_axis_angle(&axis, deg.to_radians());
    let world = pose.world_rotation(chain.root());
    pose.set_world_rotation(chain.root(), twist * world);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
