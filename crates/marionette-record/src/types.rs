//! On-disk record shapes and their conversions.

use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use marionette_core::rig::BoneGraph;
use marionette_core::types::{Joint, SolverKind, SpaceKind, SyncSource, MAX_LEVEL};
use marionette_store::IkTarget;

/// One chain joint as persisted: a bone path plus its solve weight. The
/// path is `None` when the joint was already unresolved at save time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointRecord {
    #[serde(default)]
    pub bone_path: Option<String>,
    pub weight: f32,
}

/// One persisted IK target.
///
/// Rotations are stored as `[x, y, z, w]`. Fields added after the first
/// format version carry serde defaults so older files keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRecord {
    pub name: String,
    pub enable: bool,
    pub auto_rotation: bool,
    pub space: SpaceKind,
    #[serde(default)]
    pub parent_bone_path: Option<String>,
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    pub swivel: f32,
    #[serde(default)]
    pub default_sync: SyncSource,
    pub solver: SolverKind,
    #[serde(default)]
    pub reset_rotations: bool,
    pub level: usize,
    #[serde(default)]
    pub limb_direction: f32,
    pub joints: Vec<JointRecord>,
}

impl TargetRecord {
    /// Snapshot a live target, mapping bone handles to hierarchy paths.
    pub fn from_target(target: &IkTarget, bones: &dyn BoneGraph) -> Self {
        let rotation = target.rotation();
        Self {
            name: target.name.clone(),
            enable: target.enable,
            auto_rotation: target.auto_rotation,
            space: target.space,
            parent_bone_path: target.parent_ref.map(|b| bones.bone_path(b)),
            position: target.position().into(),
            rotation: [rotation.i, rotation.j, rotation.k, rotation.w],
            swivel: target.swivel_deg,
            default_sync: target.default_sync,
            solver: target.solver_kind,
            reset_rotations: target.reset_rotations,
            level: target.level(),
            limb_direction: target.limb_direction_deg,
            joints: target
                .joints()
                .iter()
                .map(|joint| JointRecord {
                    bone_path: joint.bone.map(|b| bones.bone_path(b)),
                    weight: joint.weight,
                })
                .collect(),
        }
    }

    /// Rebuild a target from this record.
    ///
    /// Paths that no longer resolve become unresolved joints; the caller
    /// decides what to do with the resulting invalid target. The chain is
    /// not validated here.
    pub fn to_target(&self, bones: &dyn BoneGraph) -> IkTarget {
        let count = self.level.min(self.joints.len()).min(MAX_LEVEL);
        let joints: Vec<Joint> = self.joints[..count]
            .iter()
            .map(|record| Joint {
                bone: record
                    .bone_path
                    .as_deref()
                    .and_then(|path| bones.resolve_path(path)),
                weight: record.weight.clamp(0.0, 1.0),
            })
            .collect();

        let mut target = IkTarget::new(self.name.clone(), joints);
        target.enable = self.enable;
        target.auto_rotation = self.auto_rotation;
        target.space = self.space;
        target.parent_ref = self
            .parent_bone_path
            .as_deref()
            .and_then(|path| bones.resolve_path(path));
        target.swivel_deg = self.swivel;
        target.default_sync = self.default_sync;
        target.solver_kind = self.solver;
        target.reset_rotations = self.reset_rotations;
        target.limb_direction_deg = self.limb_direction;
        target.set_position(Vector3::from(self.position));
        let [x, y, z, w] = self.rotation;
        target.set_rotation(UnitQuaternion::new_normalize(Quaternion::new(w, x, y, z)));
        target
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
