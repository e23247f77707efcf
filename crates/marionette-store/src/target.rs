//! A single editable IK target.

use nalgebra::{UnitQuaternion, Vector3};

use marionette_core::error::ChainError;
use marionette_core::math;
use marionette_core::rig::BoneGraph;
use marionette_core::types::{BoneId, Joint, SolverKind, SpaceKind, SyncSource};
use marionette_ik::{CcdParams, JointChain, LimbParams, LookAtParams, Solver};

// ---------------------------------------------------------------------------
// DirtyState
// ---------------------------------------------------------------------------

/// Where a target sits in the resolve/sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirtyState {
    /// Nothing pending.
    #[default]
    Clean,
    /// The stored goal changed; the chain must be re-solved and its keys
    /// rewritten.
    NeedsResolve,
    /// The skeleton moved under the target; the stored position/rotation
    /// must be re-derived from the resolved pose, without solving.
    NeedsSync,
}

// ---------------------------------------------------------------------------
// IkTarget
// ---------------------------------------------------------------------------

/// One IK chain with its goal, space and solver configuration.
///
/// The stored position and rotation are expressed in the target's
/// [`SpaceKind`]; conversion to and from world space goes through the
/// methods in [`crate::space`]. The cached [`JointChain`] is rebuilt
/// whenever the joints or the host skeleton change; a target without a
/// chain is invalid and skipped by the update loop.
#[derive(Debug, Clone)]
pub struct IkTarget {
    pub name: String,
    pub enable: bool,
    /// When set, the effector keeps its reference orientation and the
    /// stored rotation is ignored.
    pub auto_rotation: bool,
    pub space: SpaceKind,
    /// Reference bone for [`SpaceKind::Parent`].
    pub parent_ref: Option<BoneId>,
    pub swivel_deg: f32,
    pub default_sync: SyncSource,
    pub solver_kind: SolverKind,
    /// CCD only: solve from the reference pose instead of refining.
    pub reset_rotations: bool,
    /// Limb only: rig-authored elbow direction, degrees.
    pub limb_direction_deg: f32,

    position: Vector3<f32>,
    rotation: UnitQuaternion<f32>,
    joints: Vec<Joint>,
    state: DirtyState,
    chain: Option<JointChain>,
}

impl IkTarget {
    /// A fresh enabled target over `joints`, tip-first, at the origin of
    /// its (Global) space.
    pub fn new(name: impl Into<String>, joints: Vec<Joint>) -> Self {
        Self {
            name: name.into(),
            enable: true,
            auto_rotation: true,
            space: SpaceKind::default(),
            parent_ref: None,
            swivel_deg: 0.0,
            default_sync: SyncSource::default(),
            solver_kind: SolverKind::default(),
            reset_rotations: false,
            limb_direction_deg: 0.0,
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            joints,
            state: DirtyState::Clean,
            chain: None,
        }
    }

    // -- joints and chain ---------------------------------------------------

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    /// Replace the joint list. Invalidates the chain until the next
    /// [`rebuild`](Self::rebuild).
    pub fn set_joints(&mut self, joints: Vec<Joint>) {
        self.joints = joints;
        self.chain = None;
    }

    pub(crate) fn joints_mut(&mut self) -> &mut Vec<Joint> {
        self.chain = None;
        &mut self.joints
    }

    pub fn level(&self) -> usize {
        self.joints.len()
    }

    pub fn is_valid(&self) -> bool {
        self.chain.is_some()
    }

    pub fn chain(&self) -> Option<&JointChain> {
        self.chain.as_ref()
    }

    pub fn effector_bone(&self) -> Option<BoneId> {
        self.joints.first().and_then(|j| j.bone)
    }

    pub fn root_bone(&self) -> Option<BoneId> {
        self.joints.last().and_then(|j| j.bone)
    }

    /// Re-validate the joints against the bone graph and cache the chain.
    ///
    /// On failure the target is left invalid (no chain); the error says
    /// why.
    pub fn rebuild(&mut self, bones: &dyn BoneGraph) -> Result<(), ChainError> {
        self.chain = None;
        let chain = JointChain::new(bones, &self.joints)?;
        self.solver().check_level(chain.level())?;
        self.chain = Some(chain);
        Ok(())
    }

    // -- stored goal --------------------------------------------------------

    /// Stored position, in this target's space.
    pub fn position(&self) -> Vector3<f32> {
        self.position
    }

    pub fn set_position(&mut self, position: Vector3<f32>) {
        self.position = position;
    }

    /// Stored rotation, in this target's space.
    pub fn rotation(&self) -> UnitQuaternion<f32> {
        self.rotation
    }

    /// Store a rotation. Always re-normalized through angle-axis form so
    /// downstream curve conversion never sees a near-antipodal scalar.
    pub fn set_rotation(&mut self, rotation: UnitQuaternion<f32>) {
        self.rotation = math::normalize_angle_axis(rotation);
    }

    // -- state --------------------------------------------------------------

    pub fn state(&self) -> DirtyState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: DirtyState) {
        self.state = state;
    }

    /// Flag for re-solve. Disabled targets stay clean.
    pub(crate) fn mark_resolve(&mut self) {
        if self.enable {
            self.state = DirtyState::NeedsResolve;
        }
    }

    /// Flag for sync, unless a full resolve is already pending.
    pub(crate) fn mark_sync(&mut self) {
        if self.enable && self.state == DirtyState::Clean {
            self.state = DirtyState::NeedsSync;
        }
    }

    // -- solver -------------------------------------------------------------

    /// The configured solver for this target.
    pub fn solver(&self) -> Solver {
        match self.solver_kind {
            SolverKind::Ccd => Solver::Ccd(CcdParams {
                reset_rotations: self.reset_rotations,
                swivel_deg: self.swivel_deg,
            }),
            SolverKind::Limb => Solver::Limb(LimbParams {
                swivel_deg: self.swivel_deg,
                direction_deg: self.limb_direction_deg,
            }),
            SolverKind::LookAt => Solver::LookAt(LookAtParams),
        }
    }

    /// Whether the stored swivel angle actually feeds the solver.
    pub fn uses_swivel(&self) -> bool {
        match self.solver_kind {
            SolverKind::Ccd => self.reset_rotations,
            SolverKind::Limb => true,
            SolverKind::LookAt => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
