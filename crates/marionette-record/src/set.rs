//! Record sets: whole-store save and load.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use marionette_core::rig::{BoneGraph, RigContext};
use marionette_store::TargetStore;

use crate::types::TargetRecord;

/// Persistence errors.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// All IK targets of one rig, as persisted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecordSet {
    #[serde(default)]
    pub targets: Vec<TargetRecord>,
}

impl RecordSet {
    /// Snapshot every target in the store.
    pub fn from_store(store: &TargetStore, bones: &dyn BoneGraph) -> Self {
        Self {
            targets: store
                .iter()
                .map(|target| TargetRecord::from_target(target, bones))
                .collect(),
        }
    }

    /// Restore every record into `store`, best-effort. Returns the number
    /// of targets that came back valid.
    pub fn load_into(&self, store: &mut TargetStore, ctx: &RigContext) -> usize {
        let mut valid = 0;
        for record in &self.targets {
            let index = store.insert_loaded(ctx, record.to_target(ctx.bones));
            if store.get(index).is_some_and(|t| t.is_valid()) {
                valid += 1;
            }
        }
        info!(
            total = self.targets.len(),
            valid, "loaded IK target records"
        );
        valid
    }

    pub fn to_json(&self) -> Result<String, RecordError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, RecordError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn save_file(&self, path: impl AsRef<std::path::Path>) -> Result<(), RecordError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load_file(path: impl AsRef<std::path::Path>) -> Result<Self, RecordError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use marionette_test_utils::TestRig;
    use nalgebra::Vector3;

    fn populated_store(rig: &TestRig) -> TargetStore {
        let ctx = RigContext::new(rig, rig);
        let mut store = TargetStore::with_defaults();
        let a = store
            .add_target(&ctx, rig.bone("bone3").unwrap(), 3)
            .unwrap();
        store.set_target_position(&ctx, a, Vector3::new(0.5, 0.0, 2.0));
        store.set_enabled(a, false).unwrap();
        store
            .add_target(&ctx, rig.bone("bone3").unwrap(), 2)
            .unwrap();
        store
    }

    #[test]
    fn store_round_trips_through_json() {
        let rig = TestRig::serial_chain(4, 1.0);
        let store = populated_store(&rig);

        let json = RecordSet::from_store(&store, &rig).to_json().unwrap();
        let set = RecordSet::from_json(&json).unwrap();
        assert_eq!(set.targets.len(), 2);

        let ctx = RigContext::new(&rig, &rig);
        let mut restored = TargetStore::with_defaults();
        let valid = set.load_into(&mut restored, &ctx);
        assert_eq!(valid, 2);

        let first = restored.get(0).unwrap();
        assert!(!first.enable);
        assert_eq!(first.level(), 3);
        assert!((first.position() - Vector3::new(0.5, 0.0, 2.0)).norm() < 1e-6);
        let second = restored.get(1).unwrap();
        assert!(second.enable);
        assert_eq!(second.level(), 2);
    }

    #[test]
    fn lossy_load_keeps_the_rest_of_the_set() {
        let rig = TestRig::serial_chain(4, 1.0);
        let store = populated_store(&rig);
        let mut set = RecordSet::from_store(&store, &rig);
        // Break one record's joints.
        set.targets[0].joints[0].bone_path = Some("bone0/missing".into());

        let ctx = RigContext::new(&rig, &rig);
        let mut restored = TargetStore::with_defaults();
        let valid = set.load_into(&mut restored, &ctx);
        assert_eq!(restored.len(), 2);
        assert_eq!(valid, 1);
        assert!(!restored.get(0).unwrap().is_valid());
        assert!(restored.get(1).unwrap().is_valid());
    }

    #[test]
    fn conflicting_loaded_targets_come_back_disabled() {
        let rig = TestRig::serial_chain(4, 1.0);
        let ctx = RigContext::new(&rig, &rig);

        // Two enabled targets over the same bones, as a hand-edited file
        // might contain.
        let mut store = TargetStore::with_defaults();
        store
            .add_target(&ctx, rig.bone("bone3").unwrap(), 2)
            .unwrap();
        let mut set = RecordSet::from_store(&store, &rig);
        set.targets.push(set.targets[0].clone());
        set.targets[1].name = "IK2".into();

        let mut restored = TargetStore::with_defaults();
        set.load_into(&mut restored, &ctx);
        assert!(restored.get(0).unwrap().enable);
        assert!(!restored.get(1).unwrap().enable);
    }

    #[test]
    fn empty_json_object_loads_empty_set() {
        let set = RecordSet::from_json("{}").unwrap();
        assert!(set.targets.is_empty());
    }

    #[test]
    fn file_round_trip() {
        let rig = TestRig::serial_chain(4, 1.0);
        let store = populated_store(&rig);
        let set = RecordSet::from_store(&store, &rig);

        let dir = std::env::temp_dir().join("marionette-record-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("targets.json");
        set.save_file(&path).unwrap();
        let loaded = RecordSet::load_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(set, loaded);
    }
}
