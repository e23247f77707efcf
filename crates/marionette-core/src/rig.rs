//! Collaborator contracts consumed by the IK core.
//!
//! The host editor owns the skeleton hierarchy, the animation clips and
//! the keyframe curves; the IK core consumes them through these traits.
//! [`RigContext`] bundles the read-only collaborators so that every
//! solve/update call receives an explicit context instead of reaching
//! for host globals.

use nalgebra::{Isometry3, UnitQuaternion};

use crate::pose::RigPose;
use crate::types::{BoneId, CurveRepr};

// ---------------------------------------------------------------------------
// BoneGraph
// ---------------------------------------------------------------------------

/// Bone identity, parent links and ancestor queries.
pub trait BoneGraph {
    /// Number of bones in the skeleton.
    fn bone_count(&self) -> usize;

    /// Parent of `bone`; `None` for the skeleton root.
    fn parent(&self, bone: BoneId) -> Option<BoneId>;

    /// Resolve a hierarchy path string back to a bone.
    fn resolve_path(&self, path: &str) -> Option<BoneId>;

    /// Hierarchy path string for `bone`, used by the persisted record.
    fn bone_path(&self, bone: BoneId) -> String;

    /// Whether `ancestor` lies strictly on the parent path of `bone`.
    fn is_ancestor(&self, ancestor: BoneId, bone: BoneId) -> bool {
        let mut current = self.parent(bone);
        while let Some(b) = current {
            if b == ancestor {
                return true;
            }
            current = self.parent(b);
        }
        false
    }
}

// ---------------------------------------------------------------------------
// PoseSampler
// ---------------------------------------------------------------------------

/// Samples animation data onto a [`RigPose`].
pub trait PoseSampler {
    /// Sample the live scene pose at `time`. Includes every rotation key
    /// already written back by IK, which is what lets the second update
    /// pass resolve Parent-space targets against a settled pose.
    fn sample_scene(&self, time: f32, pose: &mut RigPose);

    /// Sample the raw baked animation (pre-IK) onto an isolated pose.
    fn sample_skeleton(&self, time: f32, pose: &mut RigPose);

    /// Reference (bind) local transform of a bone.
    fn bind_local(&self, bone: BoneId) -> Isometry3<f32>;

    /// Allocate a pose sized for this skeleton, at bind.
    fn make_pose(&self) -> RigPose;
}

// ---------------------------------------------------------------------------
// RotationCurveStore
// ---------------------------------------------------------------------------

/// Keyframed rotation curves, one per bone.
pub trait RotationCurveStore {
    /// Representation of the existing rotation curve for `bone`, if any.
    fn curve_repr(&self, bone: BoneId) -> Option<CurveRepr>;

    /// Insert-or-update a rotation key at `time` using `repr`. The store
    /// converts the quaternion to Euler angles itself when `repr` is
    /// [`CurveRepr::RawEuler`].
    fn write_key(
        &mut self,
        bone: BoneId,
        time: f32,
        rotation: UnitQuaternion<f32>,
        repr: CurveRepr,
    );
}

// ---------------------------------------------------------------------------
// RigContext
// ---------------------------------------------------------------------------

/// Explicit context passed into every solve/update call.
///
/// The curve store is passed separately where it is written, since it is
/// the only mutable collaborator.
pub struct RigContext<'a> {
    pub bones: &'a dyn BoneGraph,
    pub sampler: &'a dyn PoseSampler,
}

impl<'a> RigContext<'a> {
    pub fn new(bones: &'a dyn BoneGraph, sampler: &'a dyn PoseSampler) -> Self {
        Self { bones, sampler }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    struct FlatGraph {
        parents: Vec<Option<usize>>,
    }

    impl BoneGraph for FlatGraph {
        fn bone_count(&self) -> usize {
            self.parents.len()
        }
        fn parent(&self, bone: BoneId) -> Option<BoneId> {
            self.parents[bone.0].map(BoneId)
        }
        fn resolve_path(&self, _path: &str) -> Option<BoneId> {
            None
        }
        fn bone_path(&self, bone: BoneId) -> String {
            format!("bone{}", bone.0)
        }
    }

    #[test]
    fn is_ancestor_walks_parent_chain() {
        // 0 -> 1 -> 2, plus a sibling 3 under 0
        let graph = FlatGraph {
            parents: vec![None, Some(0), Some(1), Some(0)],
        };
        assert!(graph.is_ancestor(BoneId(0), BoneId(2)));
        assert!(graph.is_ancestor(BoneId(1), BoneId(2)));
        assert!(!graph.is_ancestor(BoneId(2), BoneId(0)));
        assert!(!graph.is_ancestor(BoneId(3), BoneId(2)));
        // strict: a bone is not its own ancestor
        assert!(!graph.is_ancestor(BoneId(1), BoneId(1)));
    }
}
