//! Space conversion for target goals.
//!
//! A target stores its position and rotation in one of three frames:
//! world ([`SpaceKind::Global`]), the chain root's parent
//! ([`SpaceKind::Local`]), or an explicit reference bone
//! ([`SpaceKind::Parent`]). The update loop only ever consumes world
//! values, so everything funnels through the frame lookup here. A
//! missing reference (rootless chain, unset or stale parent bone)
//! degrades to the identity frame rather than failing the solve.

use nalgebra::{Isometry3, Point3, UnitQuaternion, Vector3};

use marionette_core::pose::RigPose;
use marionette_core::types::{BoneId, SpaceKind};

use crate::target::IkTarget;

impl IkTarget {
    /// World transform of the frame the stored values live in.
    pub fn reference_frame(&self, pose: &RigPose) -> Isometry3<f32> {
        let frame_bone = match self.space {
            SpaceKind::Global => None,
            SpaceKind::Local => self.root_bone().and_then(|b| pose.parent(b)),
            SpaceKind::Parent => self.parent_ref,
        };
        match frame_bone {
            Some(bone) => pose.world(bone),
            None => Isometry3::identity(),
        }
    }

    /// Stored position mapped to world space.
    pub fn world_position(&self, pose: &RigPose) -> Vector3<f32> {
        self.reference_frame(pose)
            .transform_point(&Point3::from(self.position()))
            .coords
    }

    /// Stored rotation mapped to world space.
    pub fn world_rotation(&self, pose: &RigPose) -> UnitQuaternion<f32> {
        self.reference_frame(pose).rotation * self.rotation()
    }

    /// Store a world-space position, converting into this target's frame.
    pub fn set_world_position(&mut self, pose: &RigPose, world: Vector3<f32>) {
        let local = self
            .reference_frame(pose)
            .inverse_transform_point(&Point3::from(world));
        self.set_position(local.coords);
    }

    /// Store a world-space rotation, converting into this target's frame.
    pub fn set_world_rotation(&mut self, pose: &RigPose, world: UnitQuaternion<f32>) {
        let frame = self.reference_frame(pose).rotation;
        self.set_rotation(frame.inverse() * world);
    }

    /// Switch the storage space, re-expressing the stored values so the
    /// world-space goal does not move.
    pub fn change_space(&mut self, pose: &RigPose, space: SpaceKind, parent_ref: Option<BoneId>) {
        let world_pos = self.world_position(pose);
        let world_rot = self.world_rotation(pose);
        self.space = space;
        self.parent_ref = match space {
            SpaceKind::Parent => parent_ref,
            _ => None,
        };
        self.set_world_position(pose, world_pos);
        self.set_world_rotation(pose, world_rot);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
