//! In-memory rotation-curve store that records every write.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use nalgebra::UnitQuaternion;

use marionette_core::types::{BoneId, CurveRepr};
use marionette_core::RotationCurveStore;

/// One recorded rotation key.
#[derive(Debug, Clone, Copy)]
pub struct CurveKey {
    pub time: f32,
    pub rotation: UnitQuaternion<f32>,
    pub repr: CurveRepr,
}

#[derive(Debug, Default)]
struct CurveData {
    keys: BTreeMap<usize, Vec<CurveKey>>,
    reprs: BTreeMap<usize, CurveRepr>,
}

/// Recording curve store for tests.
///
/// Clones share the same underlying data. That lets a [`TestRig`] scene
/// sampler read back keys the update loop has written, which is exactly
/// the live-scene behavior the second update pass relies on.
///
/// [`TestRig`]: crate::rig::TestRig
#[derive(Debug, Clone, Default)]
pub struct RecordingCurves {
    data: Rc<RefCell<CurveData>>,
}

const TIME_EPS: f32 = 1e-6;

impl RecordingCurves {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend a curve with the given representation already exists for
    /// `bone`, without adding any key.
    pub fn seed_repr(&self, bone: BoneId, repr: CurveRepr) {
        self.data.borrow_mut().reprs.insert(bone.0, repr);
    }

    pub fn key_count(&self, bone: BoneId) -> usize {
        self.data
            .borrow()
            .keys
            .get(&bone.0)
            .map_or(0, Vec::len)
    }

    /// The key at exactly `time`, if one was written.
    pub fn key_at(&self, bone: BoneId, time: f32) -> Option<CurveKey> {
        self.data
            .borrow()
            .keys
            .get(&bone.0)?
            .iter()
            .find(|k| (k.time - time).abs() < TIME_EPS)
            .copied()
    }

    /// The most recent key at or before `time`.
    pub fn latest_at(&self, bone: BoneId, time: f32) -> Option<CurveKey> {
        self.data
            .borrow()
            .keys
            .get(&bone.0)?
            .iter()
            .filter(|k| k.time <= time + TIME_EPS)
            .last()
            .copied()
    }
}

impl RotationCurveStore for RecordingCurves {
    fn curve_repr(&self, bone: BoneId) -> Option<CurveRepr> {
        self.data.borrow().reprs.get(&bone.0).copied()
    }

    fn write_key(
        &mut self,
        bone: BoneId,
        time: f32,
        rotation: UnitQuaternion<f32>,
        repr: CurveRepr,
    ) {
        let mut data = self.data.borrow_mut();
        data.reprs.insert(bone.0, repr);
        let keys = data.keys.entry(bone.0).or_default();
        if let Some(existing) = keys.iter_mut().find(|k| (k.time - time).abs() < TIME_EPS) {
            existing.rotation = rotation;
            existing.repr = repr;
        } else {
            keys.push(CurveKey {
                time,
                rotation,
                repr,
            });
            keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
