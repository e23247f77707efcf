//! Solver dispatch, swivel measurement and shared finalization.

use nalgebra::{Isometry3, Unit, UnitQuaternion, Vector3};

use marionette_core::error::ChainError;
use marionette_core::math;
use marionette_core::pose::RigPose;
use marionette_core::types::{BoneId, SolverKind};
use marionette_core::IkSettings;

use crate::ccd::{self, CcdParams};
use crate::chain::JointChain;
use crate::limb::{self, LimbParams};
use crate::lookat::{self, LookAtParams};

// ---------------------------------------------------------------------------
// SolveTarget
// ---------------------------------------------------------------------------

/// World-space goal for one solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveTarget {
    pub position: Vector3<f32>,
    /// Desired world rotation of the effector. `None` keeps the effector
    /// on its reference local rotation (auto orientation).
    pub rotation: Option<UnitQuaternion<f32>>,
}

impl SolveTarget {
    pub fn position(position: Vector3<f32>) -> Self {
        Self {
            position,
            rotation: None,
        }
    }

    pub fn pose(position: Vector3<f32>, rotation: UnitQuaternion<f32>) -> Self {
        Self {
            position,
            rotation: Some(rotation),
        }
    }
}

// ---------------------------------------------------------------------------
// Solver
// ---------------------------------------------------------------------------

/// A configured solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Solver {
    Ccd(CcdParams),
    Limb(LimbParams),
    LookAt(LookAtParams),
}

impl Solver {
    pub fn kind(&self) -> SolverKind {
        match self {
            Self::Ccd(_) => SolverKind::Ccd,
            Self::Limb(_) => SolverKind::Limb,
            Self::LookAt(_) => SolverKind::LookAt,
        }
    }

    /// Check that a chain of `level` joints is usable with this solver.
    ///
    /// The chain bounds themselves are enforced at chain construction;
    /// this adds the per-solver exact-level requirements.
    pub fn check_level(&self, level: usize) -> Result<(), ChainError> {
        let required = match self {
            Self::Ccd(_) => return Ok(()),
            Self::Limb(_) => 3,
            Self::LookAt(_) => 2,
        };
        if level == required {
            Ok(())
        } else {
            Err(ChainError::LevelMismatch {
                kind: self.kind().label(),
                required,
                actual: level,
            })
        }
    }

    fn swivel_deg(&self) -> f32 {
        match self {
            Self::Ccd(params) => params.swivel_deg,
            Self::Limb(params) => params.swivel_deg,
            Self::LookAt(_) => 0.0,
        }
    }

    fn set_swivel_deg(&mut self, deg: f32) {
        match self {
            Self::Ccd(params) => params.swivel_deg = deg,
            Self::Limb(params) => params.swivel_deg = deg,
            Self::LookAt(_) => {}
        }
    }

    /// Solve `chain` toward `target`, leaving the result in `pose`.
    ///
    /// Only local rotations of the chain's bones are touched.
    pub fn solve(
        &self,
        chain: &JointChain,
        pose: &mut RigPose,
        target: &SolveTarget,
        settings: &IkSettings,
    ) {
        match self {
            Self::Ccd(params) => ccd::solve(params, chain, pose, target, settings),
            Self::Limb(params) => limb::solve(params, chain, pose, target),
            Self::LookAt(params) => lookat::solve(params, chain, pose, target),
        }
    }

    /// Measure the swivel angle of the chain's current pose, in degrees.
    ///
    /// Re-solves a zero-swivel copy of this solver toward the current tip
    /// position and returns the signed angle, about the root-to-tip axis,
    /// from the zero-swivel bend plane to the current one. The pose is
    /// restored before returning, including on early exits.
    pub fn get_swivel(
        &self,
        chain: &JointChain,
        pose: &mut RigPose,
        settings: &IkSettings,
    ) -> f32 {
        let measure_index = match self {
            Self::Ccd(_) => chain.level() / 2,
            Self::Limb(_) => 1,
            Self::LookAt(_) => return 0.0,
        };
        // Swivel needs a joint strictly between tip and root to measure.
        if chain.level() < 3 {
            return self.swivel_deg();
        }

        let mut scope = PoseScope::new(pose, chain.bones());
        let pose = scope.pose();

        let root_pos = pose.world_position(chain.root());
        let tip_pos = pose.world_position(chain.tip());
        let axis_vec = tip_pos - root_pos;
        if axis_vec.norm_squared() < math::DEGENERATE_LEN_SQ {
            return 0.0;
        }
        let axis = Unit::new_normalize(axis_vec);

        let measure_bone = chain.joints()[measure_index].bone;
        let current_offset = pose.world_position(measure_bone) - root_pos;

        let mut zeroed = *self;
        zeroed.set_swivel_deg(0.0);
        zeroed.solve(chain, pose, &SolveTarget::position(tip_pos), settings);
        let zero_offset = pose.world_position(measure_bone) - root_pos;

        math::wrap_degrees(
            math::signed_angle_about(&axis, &zero_offset, &current_offset).to_degrees(),
        )
    }
}

// ---------------------------------------------------------------------------
// Shared finalization
// ---------------------------------------------------------------------------

/// Common tail of every solve: continuity-fix each chain joint against
/// its reference rotation, then orient the effector.
pub(crate) fn finish_solve(chain: &JointChain, pose: &mut RigPose, target: &SolveTarget) {
    for joint in chain.joints() {
        let fixed = math::fix_reverse_rotation(
            pose.local_rotation(joint.bone),
            &pose.bind_local_rotation(joint.bone),
        );
        pose.set_local_rotation(joint.bone, fixed);
    }
    let tip = chain.tip();
    match target.rotation {
        Some(rotation) => pose.set_world_rotation(tip, rotation),
        None => pose.set_local_rotation(tip, pose.bind_local_rotation(tip)),
    }
}

/// Shortest arc taking `from` onto `to`, with a deterministic half-turn
/// axis for the antiparallel case.
pub(crate) fn shortest_arc(from: &Vector3<f32>, to: &Vector3<f32>) -> UnitQuaternion<f32> {
    UnitQuaternion::rotation_between(from, to).unwrap_or_else(|| {
        UnitQuaternion::from_axis_angle(
            &Unit::new_normalize(math::perpendicular(from)),
            std::f32::consts::PI,
        )
    })
}

// ---------------------------------------------------------------------------
// PoseScope
// ---------------------------------------------------------------------------

/// Snapshot-restore guard over a set of bones.
///
/// Saves the local transforms of the given bones at construction and
/// writes them back on drop, so scratch solves (swivel measurement, sync
/// derivation) can run on the live pose without leaking their result.
pub struct PoseScope<'p> {
    pose: &'p mut RigPose,
    saved: Vec<(BoneId, Isometry3<f32>)>,
}

impl<'p> PoseScope<'p> {
    pub fn new(pose: &'p mut RigPose, bones: impl IntoIterator<Item = BoneId>) -> Self {
        let saved = bones
            .into_iter()
            .map(|bone| (bone, *pose.local(bone)))
            .collect();
        Self { pose, saved }
    }

    pub fn pose(&mut self) -> &mut RigPose {
        self.pose
    }
}

impl Drop for PoseScope<'_> {
    fn drop(&mut self) {
        for (bone, transform) in &self.saved {
            self.pose.set_local(*bone, *transform);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
