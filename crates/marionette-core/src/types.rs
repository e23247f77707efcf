use serde::{Deserialize, Serialize};

/// Minimum number of joints in an IK chain.
pub const MIN_LEVEL: usize = 2;
/// Maximum number of joints in an IK chain.
pub const MAX_LEVEL: usize = 16;

// ---------------------------------------------------------------------------
// BoneId
// ---------------------------------------------------------------------------

/// Handle to a bone in the host skeleton.
///
/// Identity only; the host bone graph owns the hierarchy. All bone
/// references held by the IK core are weak (lookup by identity, never
/// ownership).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct BoneId(pub usize);

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Frame in which a target's stored position/rotation are expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SpaceKind {
    /// Stored values are world-space.
    #[default]
    Global,
    /// Stored values are relative to the chain root's parent.
    Local,
    /// Stored values are relative to an explicit reference bone.
    Parent,
}

/// Which solver drives a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SolverKind {
    /// Iterative cyclic coordinate descent, 2–16 joints.
    #[default]
    Ccd,
    /// Closed-form two-bone analytic solve, exactly 3 joints.
    Limb,
    /// Single-joint aim, exactly 2 joints.
    LookAt,
}

impl SolverKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ccd => "CCD",
            Self::Limb => "Limb",
            Self::LookAt => "LookAt",
        }
    }
}

/// Source pose used when re-deriving a target's stored values.
///
/// Two sources exist so that targets tracking raw animation data never
/// read back their own solved output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SyncSource {
    /// The pre-IK baked animation pose on an isolated skeleton.
    #[default]
    Skeleton,
    /// The live, fully resolved scene pose (reflects applied IK).
    SceneObject,
}

/// Representation a rotation curve stores its keys in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CurveRepr {
    #[default]
    RawQuaternion,
    RawEuler,
}

// ---------------------------------------------------------------------------
// Joint
// ---------------------------------------------------------------------------

/// One joint of an IK chain: a weak bone reference plus a solve weight.
///
/// `bone` is `None` when the reference failed to resolve (for example a
/// saved bone path that no longer exists); the owning chain is invalid
/// until the joint is repaired.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Joint {
    pub bone: Option<BoneId>,
    /// Solve weight in [0, 1].
    pub weight: f32,
}

impl Joint {
    pub const fn new(bone: BoneId) -> Self {
        Self {
            bone: Some(bone),
            weight: 1.0,
        }
    }

    pub const fn unresolved() -> Self {
        Self {
            bone: None,
            weight: 1.0,
        }
    }

    pub const fn with_weight(bone: BoneId, weight: f32) -> Self {
        Self {
            bone: Some(bone),
            weight,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
