//! Validated joint chains.

use nalgebra::Vector3;

use marionette_core::error::ChainError;
use marionette_core::math;
use marionette_core::pose::RigPose;
use marionette_core::rig::BoneGraph;
use marionette_core::types::{BoneId, Joint, MAX_LEVEL, MIN_LEVEL};

/// A resolved chain joint. Unlike [`Joint`], the bone reference is
/// guaranteed present.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainJoint {
    pub bone: BoneId,
    /// Solve weight, clamped to [0, 1] at build time.
    pub weight: f32,
}

/// An IK chain validated against the host bone graph.
///
/// Joints are ordered tip-first: `joints[0]` is the effector, the last
/// joint is the chain root, and every joint's bone is a strict ancestor
/// of the previous joint's bone. Construction enforces 2..=16 joints,
/// resolution of every bone reference, and the ancestor ordering; a
/// chain that exists is structurally sound.
#[derive(Debug, Clone, PartialEq)]
pub struct JointChain {
    joints: Vec<ChainJoint>,
}

impl JointChain {
    /// Validate `joints` against `bones` and build the chain.
    pub fn new(bones: &dyn BoneGraph, joints: &[Joint]) -> Result<Self, ChainError> {
        if joints.len() < MIN_LEVEL {
            return Err(ChainError::TooShort(joints.len()));
        }
        if joints.len() > MAX_LEVEL {
            return Err(ChainError::TooLong(joints.len()));
        }

        let mut resolved = Vec::with_capacity(joints.len());
        for (index, joint) in joints.iter().enumerate() {
            let bone = joint
                .bone
                .ok_or(ChainError::UnresolvedJoint { index })?;
            if let Some(previous) = resolved.last() {
                let &ChainJoint { bone: prev, .. } = previous;
                if !bones.is_ancestor(bone, prev) {
                    return Err(ChainError::AncestorOrder { index });
                }
            }
            resolved.push(ChainJoint {
                bone,
                weight: joint.weight.clamp(0.0, 1.0),
            });
        }
        Ok(Self { joints: resolved })
    }

    /// Number of joints.
    pub fn level(&self) -> usize {
        self.joints.len()
    }

    pub fn joints(&self) -> &[ChainJoint] {
        &self.joints
    }

    /// The effector bone.
    pub fn tip(&self) -> BoneId {
        self.joints[0].bone
    }

    /// The root joint's bone (the ancestor end of the chain).
    pub fn root(&self) -> BoneId {
        self.joints[self.joints.len() - 1].bone
    }

    /// Bones of the chain, tip-first.
    pub fn bones(&self) -> impl Iterator<Item = BoneId> + '_ {
        self.joints.iter().map(|j| j.bone)
    }

    pub fn contains(&self, bone: BoneId) -> bool {
        self.joints.iter().any(|j| j.bone == bone)
    }

    /// Total chain length in the given pose, summed over segments.
    ///
    /// Computed from world positions, so it accounts for any intermediate
    /// bones sitting between consecutive chain joints.
    pub fn reach(&self, pose: &RigPose) -> f32 {
        self.joints
            .windows(2)
            .map(|pair| (pose.world_position(pair[0].bone) - pose.world_position(pair[1].bone)).norm())
            .sum()
    }

    /// Pose-independent bend reference for this chain.
    ///
    /// A unit vector perpendicular to the root-to-tip axis, derived only
    /// from the axis direction. Used as the singularity-nudge axis and as
    /// the zero direction for swivel measurement, so repeated solves of
    /// the same chain agree on where "zero twist" is.
    pub fn basic_dir(&self, pose: &RigPose) -> Vector3<f32> {
        let root = pose.world_position(self.root());
        let mut axis = pose.world_position(self.tip()) - root;
        if axis.norm_squared() < math::DEGENERATE_LEN_SQ && self.level() > 2 {
            // Tip folded onto the root: fall back to the next joint out.
            axis = pose.world_position(self.joints[1].bone) - root;
        }
        math::perpendicular(&axis)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use marionette_core::rig::PoseSampler;
    use marionette_test_utils::TestRig;

    fn serial_joints(rig: &TestRig, names: &[&str]) -> Vec<Joint> {
        names
            .iter()
            .map(|n| Joint::new(rig.bone(n).unwrap()))
            .collect()
    }

    #[test]
    fn builds_valid_chain() {
        let rig = TestRig::serial_chain(4, 1.0);
        let joints = serial_joints(&rig, &["bone3", "bone2", "bone1"]);
        let chain = JointChain::new(&rig, &joints).unwrap();

        assert_eq!(chain.level(), 3);
        assert_eq!(chain.tip(), rig.bone("bone3").unwrap());
        assert_eq!(chain.root(), rig.bone("bone1").unwrap());
        assert!(chain.contains(rig.bone("bone2").unwrap()));
        assert!(!chain.contains(rig.bone("bone0").unwrap()));
    }

    #[test]
    fn rejects_short_and_long_chains() {
        let rig = TestRig::serial_chain(2, 1.0);
        let joints = serial_joints(&rig, &["bone1"]);
        assert_eq!(
            JointChain::new(&rig, &joints),
            Err(ChainError::TooShort(1))
        );

        let rig = TestRig::serial_chain(20, 1.0);
        let names: Vec<String> = (0..17).rev().map(|i| format!("bone{i}")).collect();
        let joints: Vec<Joint> = names
            .iter()
            .map(|n| Joint::new(rig.bone(n).unwrap()))
            .collect();
        assert_eq!(JointChain::new(&rig, &joints), Err(ChainError::TooLong(17)));
    }

    #[test]
    fn rejects_unresolved_joint() {
        let rig = TestRig::serial_chain(3, 1.0);
        let joints = vec![
            Joint::new(rig.bone("bone2").unwrap()),
            Joint::unresolved(),
        ];
        assert_eq!(
            JointChain::new(&rig, &joints),
            Err(ChainError::UnresolvedJoint { index: 1 })
        );
    }

    #[test]
    fn rejects_non_ancestor_order() {
        // bone1 and bone2 are siblings under bone0.
        let mut rig = TestRig::new();
        let root = rig.add_bone("bone0", None, Vector3::zeros());
        let a = rig.add_bone("bone1", Some(root), Vector3::new(0.0, 0.0, 1.0));
        let b = rig.add_bone("bone2", Some(root), Vector3::new(1.0, 0.0, 0.0));

        let joints = vec![Joint::new(a), Joint::new(b)];
        assert_eq!(
            JointChain::new(&rig, &joints),
            Err(ChainError::AncestorOrder { index: 1 })
        );

        // Reversed order (descendant after tip) is also rejected.
        let joints = vec![Joint::new(root), Joint::new(a)];
        assert_eq!(
            JointChain::new(&rig, &joints),
            Err(ChainError::AncestorOrder { index: 1 })
        );
    }

    #[test]
    fn clamps_weights() {
        let rig = TestRig::serial_chain(3, 1.0);
        let joints = vec![
            Joint::with_weight(rig.bone("bone2").unwrap(), 1.7),
            Joint::with_weight(rig.bone("bone1").unwrap(), -0.3),
        ];
        let chain = JointChain::new(&rig, &joints).unwrap();
        assert_relative_eq!(chain.joints()[0].weight, 1.0);
        assert_relative_eq!(chain.joints()[1].weight, 0.0);
    }

    #[test]
    fn reach_sums_segments() {
        let rig = TestRig::serial_chain(4, 1.5);
        let joints = serial_joints(&rig, &["bone3", "bone2", "bone1", "bone0"]);
        let chain = JointChain::new(&rig, &joints).unwrap();
        let pose = rig.make_pose();
        assert_relative_eq!(chain.reach(&pose), 4.5, epsilon = 1e-5);
    }

    #[test]
    fn reach_spans_skipped_bones() {
        // Chain joints bone3..bone0 skipping bone1 and bone2: one segment
        // covering the whole straight run.
        let rig = TestRig::serial_chain(4, 1.0);
        let joints = serial_joints(&rig, &["bone3", "bone0"]);
        let chain = JointChain::new(&rig, &joints).unwrap();
        let pose = rig.make_pose();
        assert_relative_eq!(chain.reach(&pose), 3.0, epsilon = 1e-5);
    }

    #[test]
    fn basic_dir_is_perpendicular_to_axis() {
        let rig = TestRig::serial_chain(3, 1.0);
        let joints = serial_joints(&rig, &["bone2", "bone1", "bone0"]);
        let chain = JointChain::new(&rig, &joints).unwrap();
        let pose = rig.make_pose();

        let axis = pose.world_position(chain.tip()) - pose.world_position(chain.root());
        let dir = chain.basic_dir(&pose);
        assert_relative_eq!(dir.norm(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(dir.dot(&axis.normalize()), 0.0, epsilon = 1e-6);
    }
}
