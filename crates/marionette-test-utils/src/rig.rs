//! Programmatic skeleton fixture.

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};

use marionette_core::pose::RigPose;
use marionette_core::rig::{BoneGraph, PoseSampler};
use marionette_core::types::BoneId;

use crate::curves::RecordingCurves;

/// A skeleton built in code, implementing [`BoneGraph`] and
/// [`PoseSampler`].
///
/// The "baked animation" of a fixture is its bind pose; the scene pose
/// additionally overlays any rotation keys found in the attached
/// [`RecordingCurves`], mirroring a host scene that plays back the curves
/// the update loop writes.
#[derive(Debug, Clone, Default)]
pub struct TestRig {
    names: Vec<String>,
    parents: Vec<Option<usize>>,
    bind_local: Vec<Isometry3<f32>>,
    scene_curves: Option<RecordingCurves>,
}

impl TestRig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a bone with a bind-local translation `offset` from its
    /// parent.
    pub fn add_bone(&mut self, name: &str, parent: Option<BoneId>, offset: Vector3<f32>) -> BoneId {
        let id = BoneId(self.names.len());
        self.names.push(name.to_owned());
        self.parents.push(parent.map(|b| b.0));
        self.bind_local.push(Isometry3::from_parts(
            Translation3::from(offset),
            UnitQuaternion::identity(),
        ));
        id
    }

    /// A serial chain `bone0 -> bone1 -> ...` with each bone offset
    /// `segment` along +Z from its parent. `bone0` sits at the origin.
    pub fn serial_chain(count: usize, segment: f32) -> Self {
        let mut rig = Self::new();
        let mut parent = None;
        for i in 0..count {
            let offset = if i == 0 {
                Vector3::zeros()
            } else {
                Vector3::new(0.0, 0.0, segment)
            };
            parent = Some(rig.add_bone(&format!("bone{i}"), parent, offset));
        }
        rig
    }

    /// Attach a curve store whose keys the scene sampler will overlay.
    #[must_use]
    pub fn with_scene_curves(mut self, curves: &RecordingCurves) -> Self {
        self.scene_curves = Some(curves.clone());
        self
    }

    /// Look a bone up by leaf name.
    pub fn bone(&self, name: &str) -> Option<BoneId> {
        self.names.iter().position(|n| n == name).map(BoneId)
    }
}

impl BoneGraph for TestRig {
    fn bone_count(&self) -> usize {
        self.names.len()
    }

    fn parent(&self, bone: BoneId) -> Option<BoneId> {
        self.parents[bone.0].map(BoneId)
    }

    fn resolve_path(&self, path: &str) -> Option<BoneId> {
        (0..self.names.len())
            .map(BoneId)
            .find(|&b| self.bone_path(b) == path)
    }

    fn bone_path(&self, bone: BoneId) -> String {
        let mut segments = vec![self.names[bone.0].as_str()];
        let mut current = self.parents[bone.0];
        while let Some(index) = current {
            segments.push(self.names[index].as_str());
            current = self.parents[index];
        }
        segments.reverse();
        segments.join("/")
    }
}

impl PoseSampler for TestRig {
    fn sample_scene(&self, time: f32, pose: &mut RigPose) {
        pose.reset_all_to_bind();
        if let Some(curves) = &self.scene_curves {
            for index in 0..pose.bone_count() {
                let bone = BoneId(index);
                if let Some(key) = curves.latest_at(bone, time) {
                    pose.set_local_rotation(bone, key.rotation);
                }
            }
        }
    }

    fn sample_skeleton(&self, _time: f32, pose: &mut RigPose) {
        pose.reset_all_to_bind();
    }

    fn bind_local(&self, bone: BoneId) -> Isometry3<f32> {
        self.bind_local[bone.0]
    }

    fn make_pose(&self) -> RigPose {
        RigPose::new(self.parents.clone(), self.bind_local.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_chain_layout() {
        let rig = TestRig::serial_chain(4, 1.0);
        assert_eq!(rig.bone_count(), 4);
        assert_eq!(rig.parent(BoneId(0)), None);
        assert_eq!(rig.parent(BoneId(3)), Some(BoneId(2)));

        let pose = rig.make_pose();
        assert!((pose.world_position(BoneId(3)).z - 3.0).abs() < 1e-6);
    }

    #[test]
    fn bone_paths_round_trip() {
        let rig = TestRig::serial_chain(3, 1.0);
        let path = rig.bone_path(BoneId(2));
        assert_eq!(path, "bone0/bone1/bone2");
        assert_eq!(rig.resolve_path(&path), Some(BoneId(2)));
        assert_eq!(rig.resolve_path("bone0/ghost"), None);
    }

    #[test]
    fn scene_sampler_overlays_curve_keys() {
        use marionette_core::types::CurveRepr;
        use marionette_core::RotationCurveStore;

        let mut curves = RecordingCurves::new();
        let rig = TestRig::serial_chain(2, 1.0).with_scene_curves(&curves);

        let turn = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 0.5);
        curves.write_key(BoneId(0), 1.0, turn, CurveRepr::RawQuaternion);

        let mut pose = rig.make_pose();
        rig.sample_scene(1.0, &mut pose);
        assert!((pose.local_rotation(BoneId(0)).angle_to(&turn)).abs() < 1e-6);

        // The skeleton sampler stays on the raw animation.
        rig.sample_skeleton(1.0, &mut pose);
        assert!(pose.local_rotation(BoneId(0)).angle() < 1e-6);
    }
}
