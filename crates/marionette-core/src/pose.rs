//! Skeleton pose model shared by the solvers and the target store.

use nalgebra::{Isometry3, UnitQuaternion, Vector3};

use crate::types::BoneId;

/// A full skeleton pose: per-bone local transforms plus the parent table.
///
/// The solvers mutate local rotations only. Translations are never
/// touched, so segment lengths are invariant across a solve (rotation-only
/// IK). The bind-pose locals are kept alongside as the continuity baseline
/// for reverse-rotation fixes and for reset-style solves.
#[derive(Debug, Clone)]
pub struct RigPose {
    parents: Vec<Option<usize>>,
    local: Vec<Isometry3<f32>>,
    bind_local: Vec<Isometry3<f32>>,
}

impl RigPose {
    /// Build a pose at bind.
    ///
    /// # Panics
    ///
    /// Panics if `parents` and `bind_local` have different lengths.
    pub fn new(parents: Vec<Option<usize>>, bind_local: Vec<Isometry3<f32>>) -> Self {
        assert_eq!(
            parents.len(),
            bind_local.len(),
            "parent table and bind pose must cover the same bones"
        );
        Self {
            parents,
            local: bind_local.clone(),
            bind_local,
        }
    }

    pub fn bone_count(&self) -> usize {
        self.local.len()
    }

    pub fn is_empty(&self) -> bool {
        self.local.is_empty()
    }

    pub fn parent(&self, bone: BoneId) -> Option<BoneId> {
        self.parents[bone.0].map(BoneId)
    }

    pub fn local(&self, bone: BoneId) -> &Isometry3<f32> {
        &self.local[bone.0]
    }

    pub fn set_local(&mut self, bone: BoneId, transform: Isometry3<f32>) {
        self.local[bone.0] = transform;
    }

    pub fn local_rotation(&self, bone: BoneId) -> UnitQuaternion<f32> {
        self.local[bone.0].rotation
    }

    pub fn set_local_rotation(&mut self, bone: BoneId, rotation: UnitQuaternion<f32>) {
        self.local[bone.0].rotation = rotation;
    }

    pub fn bind_local(&self, bone: BoneId) -> &Isometry3<f32> {
        &self.bind_local[bone.0]
    }

    pub fn bind_local_rotation(&self, bone: BoneId) -> UnitQuaternion<f32> {
        self.bind_local[bone.0].rotation
    }

    /// Reset one bone's local transform to its bind value.
    pub fn reset_to_bind(&mut self, bone: BoneId) {
        self.local[bone.0] = self.bind_local[bone.0];
    }

    /// Reset every bone to bind.
    pub fn reset_all_to_bind(&mut self) {
        self.local.copy_from_slice(&self.bind_local);
    }

    /// World transform of a bone, accumulated root-downward.
    pub fn world(&self, bone: BoneId) -> Isometry3<f32> {
        let mut transform = self.local[bone.0];
        let mut current = self.parents[bone.0];
        while let Some(index) = current {
            transform = self.local[index] * transform;
            current = self.parents[index];
        }
        transform
    }

    pub fn world_position(&self, bone: BoneId) -> Vector3<f32> {
        self.world(bone).translation.vector
    }

    pub fn world_rotation(&self, bone: BoneId) -> UnitQuaternion<f32> {
        self.world(bone).rotation
    }

    /// World rotation of a bone's parent; identity at the skeleton root.
    pub fn parent_world_rotation(&self, bone: BoneId) -> UnitQuaternion<f32> {
        match self.parent(bone) {
            Some(parent) => self.world_rotation(parent),
            None => UnitQuaternion::identity(),
        }
    }

    /// Set a bone's world rotation by rewriting its local rotation.
    pub fn set_world_rotation(&mut self, bone: BoneId, rotation: UnitQuaternion<f32>) {
        let parent_rotation = self.parent_world_rotation(bone);
        self.local[bone.0].rotation = parent_rotation.inverse() * rotation;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Translation3;

    fn chain_pose(segments: &[f32]) -> RigPose {
        // bone 0 at origin, each following bone offset along +Z of its parent
        let mut parents = vec![None];
        let mut bind = vec![Isometry3::identity()];
        for (i, &len) in segments.iter().enumerate() {
            parents.push(Some(i));
            bind.push(Isometry3::from_parts(
                Translation3::new(0.0, 0.0, len),
                UnitQuaternion::identity(),
            ));
        }
        RigPose::new(parents, bind)
    }

    #[test]
    fn world_accumulates_along_chain() {
        let pose = chain_pose(&[1.0, 2.0]);
        assert_relative_eq!(pose.world_position(BoneId(0)).z, 0.0);
        assert_relative_eq!(pose.world_position(BoneId(1)).z, 1.0);
        assert_relative_eq!(pose.world_position(BoneId(2)).z, 3.0);
    }

    #[test]
    fn local_rotation_moves_descendants() {
        let mut pose = chain_pose(&[1.0, 1.0]);
        // Rotate the root 90 degrees about X: +Z offsets become +Y.
        pose.set_local_rotation(
            BoneId(0),
            UnitQuaternion::from_axis_angle(&Vector3::x_axis(), std::f32::consts::FRAC_PI_2),
        );
        let tip = pose.world_position(BoneId(2));
        assert_relative_eq!(tip.y, -2.0, epsilon = 1e-5);
        assert_relative_eq!(tip.z, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn set_world_rotation_round_trip() {
        let mut pose = chain_pose(&[1.0, 1.0]);
        pose.set_local_rotation(
            BoneId(0),
            UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.4),
        );
        let goal = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 1.2);
        pose.set_world_rotation(BoneId(1), goal);
        assert_relative_eq!(pose.world_rotation(BoneId(1)).angle_to(&goal), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn reset_to_bind_restores() {
        let mut pose = chain_pose(&[1.0]);
        pose.set_local_rotation(
            BoneId(1),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 1.0),
        );
        pose.reset_to_bind(BoneId(1));
        assert_relative_eq!(pose.local_rotation(BoneId(1)).angle(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn segment_lengths_survive_rotation() {
        let mut pose = chain_pose(&[1.0, 1.5]);
        pose.set_local_rotation(
            BoneId(1),
            UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 0.9),
        );
        let a = pose.world_position(BoneId(1)) - pose.world_position(BoneId(0));
        let b = pose.world_position(BoneId(2)) - pose.world_position(BoneId(1));
        assert_relative_eq!(a.norm(), 1.0, epsilon = 1e-5);
        assert_relative_eq!(b.norm(), 1.5, epsilon = 1e-5);
    }
}
