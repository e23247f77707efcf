//! Closed-form two-bone solver for 3-joint chains.

use nalgebra::{Unit, UnitQuaternion, Vector3};

use marionette_core::math;
use marionette_core::pose::RigPose;
use marionette_core::types::BoneId;

use crate::chain::JointChain;
use crate::solver::{self, SolveTarget};

/// Margin keeping the target distance strictly inside the annulus the
/// elbow triangle is defined on.
const REACH_MARGIN: f32 = 1e-6;

/// Two-bone parameters. Both angles rotate the bend plane about the
/// root-to-target axis; `direction_deg` is the rig-authored elbow
/// direction, `swivel_deg` the animated twist on top of it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LimbParams {
    pub swivel_deg: f32,
    pub direction_deg: f32,
}

pub(crate) fn solve(
    params: &LimbParams,
    chain: &JointChain,
    pose: &mut RigPose,
    target: &SolveTarget,
) {
    let joints = chain.joints();
    if joints.len() != 3 {
        return;
    }
    let tip = joints[0].bone;
    let lower = joints[1].bone;
    let upper = joints[2].bone;

    // Closed form: always start from the reference rotations.
    for bone in [upper, lower, tip] {
        pose.set_local_rotation(bone, pose.bind_local_rotation(bone));
    }

    let upper_pos = pose.world_position(upper);
    let lower_pos = pose.world_position(lower);
    let tip_pos = pose.world_position(tip);
    let upper_len = (lower_pos - upper_pos).norm();
    let lower_len = (tip_pos - lower_pos).norm();

    if upper_len < REACH_MARGIN || lower_len < REACH_MARGIN {
        // A zero-length segment leaves no triangle to place; aim the
        // whole chain instead.
        aim(pose, upper, tip, target.position);
        solver::finish_solve(chain, pose, target);
        return;
    }

    let to_target = target.position - upper_pos;
    let forward_vec = if to_target.norm_squared() < math::DEGENERATE_LEN_SQ {
        tip_pos - upper_pos
    } else {
        to_target
    };
    if forward_vec.norm_squared() < math::DEGENERATE_LEN_SQ {
        solver::finish_solve(chain, pose, target);
        return;
    }
    let forward = forward_vec.normalize();

    let min_reach = (upper_len - lower_len).abs() + REACH_MARGIN;
    let max_reach = (upper_len + lower_len - REACH_MARGIN).max(min_reach);
    let dist = to_target.norm().clamp(min_reach, max_reach);

    // Law of cosines: distance of the elbow circle along the forward
    // axis, and its radius.
    let along = (upper_len * upper_len - lower_len * lower_len + dist * dist) / (2.0 * dist);
    let radius = (upper_len * upper_len - along * along).max(0.0).sqrt();

    let axis = Unit::new_normalize(forward);
    let reference = math::perpendicular(&forward);
    let bend = (params.direction_deg + params.swivel_deg).to_radians();
    let bend_dir = UnitQuaternion::from_axis_angle(&axis, bend) * reference;

    let elbow_goal = upper_pos + forward * along + bend_dir * radius;
    aim(pose, upper, lower, elbow_goal);

    // The lower joint then lands the tip exactly on the clamped target.
    let clamped_target = upper_pos + forward * dist;
    aim(pose, lower, tip, clamped_target);

    solver::finish_solve(chain, pose, target);
}

/// Rotate `joint` by the shortest arc taking its current direction toward
/// `end` onto the direction toward `goal`.
fn aim(pose: &mut RigPose, joint: BoneId, end: BoneId, goal: Vector3<f32>) {
    let joint_pos = pose.world_position(joint);
    let current = pose.world_position(end) - joint_pos;
    let desired = goal - joint_pos;
    if current.norm_squared() < math::DEGENERATE_LEN_SQ
        || desired.norm_squared() < math::DEGENERATE_LEN_SQ
    {
        return;
    }
    let arc = solver::shortest_arc(&current, &desired);
    pose.set_world_rotation(joint, arc * pose.world_rotation(joint));
}

/// Recover the bend-plane angle of a 3-joint chain's current pose, in
/// degrees.
///
/// Measures the signed angle, about the root-to-tip axis, from the
/// pose-independent bend reference to the elbow's perpendicular offset.
/// This is the angle a zero-swivel solve would need as `direction_deg`
/// to reproduce the current elbow placement, which is how the stored
/// direction is seeded when a chain switches to the two-bone solver.
pub fn direction_from_pose(chain: &JointChain, pose: &RigPose) -> f32 {
    if chain.level() != 3 {
        return 0.0;
    }
    let joints = chain.joints();
    let upper_pos = pose.world_position(joints[2].bone);
    let lower_pos = pose.world_position(joints[1].bone);
    let tip_pos = pose.world_position(joints[0].bone);

    let forward_vec = tip_pos - upper_pos;
    if forward_vec.norm_squared() < math::DEGENERATE_LEN_SQ {
        return 0.0;
    }
    let axis = Unit::new_normalize(forward_vec);
    let reference = math::perpendicular(&forward_vec);
    let offset = lower_pos - upper_pos;
    math::wrap_degrees(math::signed_angle_about(&axis, &reference, &offset).to_degrees())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::Solver;
    use approx::assert_relative_eq;
    use marionette_core::rig::PoseSampler;
    use marionette_core::types::Joint;
    use marionette_core::IkSettings;
    use marionette_test_utils::TestRig;

    fn limb_chain() -> (TestRig, JointChain) {
        let rig = TestRig::serial_chain(3, 1.0);
        let joints = vec![
            Joint::new(rig.bone("bone2").unwrap()),
            Joint::new(rig.bone("bone1").unwrap()),
            Joint::new(rig.bone("bone0").unwrap()),
        ];
        let chain = JointChain::new(&rig, &joints).unwrap();
        (rig, chain)
    }

    fn solve_limb(
        params: LimbParams,
        rig: &TestRig,
        chain: &JointChain,
        target: Vector3<f32>,
    ) -> RigPose {
        let mut pose = rig.make_pose();
        solve(&params, chain, &mut pose, &SolveTarget::position(target));
        pose
    }

    #[test]
    fn tip_lands_on_reachable_target() {
        let (rig, chain) = limb_chain();
        let target = Vector3::new(0.5, 0.2, 1.5);
        let pose = solve_limb(LimbParams::default(), &rig, &chain, target);
        assert_relative_eq!(
            (pose.world_position(chain.tip()) - target).norm(),
            0.0,
            epsilon = 1e-4
        );
    }

    #[test]
    fn elbow_satisfies_law_of_cosines() {
        let (rig, chain) = limb_chain();
        let target = Vector3::new(0.4, 0.0, 1.2);
        let pose = solve_limb(LimbParams::default(), &rig, &chain, target);

        let upper = pose.world_position(chain.root());
        let elbow = pose.world_position(chain.joints()[1].bone);
        let tip = pose.world_position(chain.tip());
        let u = (elbow - upper).norm();
        let l = (tip - elbow).norm();
        let d = (tip - upper).norm();

        // Interior elbow angle against the side lengths.
        let cos_elbow = (elbow - upper)
            .normalize()
            .dot(&(tip - elbow).normalize());
        let expected = (d * d - u * u - l * l) / (2.0 * u * l);
        assert_relative_eq!(cos_elbow, expected, epsilon = 1e-4);
        assert_relative_eq!(u, 1.0, epsilon = 1e-4);
        assert_relative_eq!(l, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn overreach_clamps_to_annulus() {
        let (rig, chain) = limb_chain();
        // Straight out along the chain axis, past full reach.
        let pose = solve_limb(
            LimbParams::default(),
            &rig,
            &chain,
            Vector3::new(0.0, 0.0, 2.5),
        );

        let tip = pose.world_position(chain.tip());
        assert!(tip.norm() <= 2.0 - 1e-7, "tip overextended to {}", tip.norm());
        assert_relative_eq!(tip.norm(), 2.0 - REACH_MARGIN, epsilon = 1e-4);
        // Still on the root-to-target ray.
        assert_relative_eq!(tip.normalize().z, 1.0, epsilon = 1e-3);
    }

    #[test]
    fn underreach_clamps_to_annulus() {
        // Unequal segments so the inner annulus boundary is nonzero.
        let mut rig = TestRig::new();
        let b0 = rig.add_bone("bone0", None, Vector3::zeros());
        let b1 = rig.add_bone("bone1", Some(b0), Vector3::new(0.0, 0.0, 1.5));
        let b2 = rig.add_bone("bone2", Some(b1), Vector3::new(0.0, 0.0, 0.5));
        let chain =
            JointChain::new(&rig, &[Joint::new(b2), Joint::new(b1), Joint::new(b0)]).unwrap();

        let pose = solve_limb(
            LimbParams::default(),
            &rig,
            &chain,
            Vector3::new(0.0, 0.0, 0.2),
        );
        let tip = pose.world_position(chain.tip());
        // |u - l| = 1.0 is the closest the tip can get to the root.
        assert_relative_eq!(tip.norm(), 1.0 + REACH_MARGIN, epsilon = 1e-4);
    }

    #[test]
    fn swivel_rotates_bend_plane_tip_fixed() {
        let (rig, chain) = limb_chain();
        let target = Vector3::new(0.0, 0.0, 1.4);

        let flat = solve_limb(LimbParams::default(), &rig, &chain, target);
        let turned = solve_limb(
            LimbParams {
                swivel_deg: 90.0,
                direction_deg: 0.0,
            },
            &rig,
            &chain,
            target,
        );

        let tip_flat = flat.world_position(chain.tip());
        let tip_turned = turned.world_position(chain.tip());
        assert_relative_eq!((tip_flat - tip_turned).norm(), 0.0, epsilon = 1e-4);

        let elbow = chain.joints()[1].bone;
        let moved = (flat.world_position(elbow) - turned.world_position(elbow)).norm();
        assert!(moved > 0.5, "elbow ignored the swivel (moved {moved})");
    }

    #[test]
    fn swivel_round_trips_through_measurement() {
        let (rig, chain) = limb_chain();
        let target = Vector3::new(0.3, 0.1, 1.5);
        let solver = Solver::Limb(LimbParams {
            swivel_deg: 40.0,
            direction_deg: 10.0,
        });

        let mut pose = rig.make_pose();
        solver.solve(
            &chain,
            &mut pose,
            &SolveTarget::position(target),
            &IkSettings::default(),
        );
        let measured = solver.get_swivel(&chain, &mut pose, &IkSettings::default());
        assert_relative_eq!(measured, 40.0, epsilon = 0.1);
    }

    #[test]
    fn direction_round_trips_from_pose() {
        let (rig, chain) = limb_chain();
        let params = LimbParams {
            swivel_deg: 0.0,
            direction_deg: 25.0,
        };
        let pose = solve_limb(params, &rig, &chain, Vector3::new(0.2, 0.0, 1.6));
        assert_relative_eq!(direction_from_pose(&chain, &pose), 25.0, epsilon = 0.1);
    }

    #[test]
    fn degenerate_target_at_root_stays_finite() {
        let (rig, chain) = limb_chain();
        // Target exactly on the upper joint.
        let pose = solve_limb(LimbParams::default(), &rig, &chain, Vector3::zeros());
        let tip = pose.world_position(chain.tip());
        assert!(tip.iter().all(|c| c.is_finite()));
        // Clamped to the inner annulus boundary (here ~0 for equal segments).
        assert!(tip.norm() <= 2.0);
    }
}
