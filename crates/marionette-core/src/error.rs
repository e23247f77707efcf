use thiserror::Error;

use crate::types::BoneId;

/// Top-level error type for the marionette workspace.
///
/// Invalidity is data, not control flow: a failed chain build marks the
/// target invalid and the per-frame update skips it. Errors surface only
/// at the operation that caused them, never across targets.
#[derive(Debug, Error)]
pub enum RigError {
    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("Conflict error: {0}")]
    Conflict(#[from] ConflictError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Chain topology errors. Recoverable by re-specifying the joints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("chain too short: {0} joints (minimum 2)")]
    TooShort(usize),

    #[error("chain too long: {0} joints (maximum 16)")]
    TooLong(usize),

    #[error("joint {index} has no resolvable bone")]
    UnresolvedJoint { index: usize },

    #[error("joint {index} is not an ancestor of the previous joint")]
    AncestorOrder { index: usize },

    #[error("{kind} solver requires exactly {required} joints, chain has {actual}")]
    LevelMismatch {
        kind: &'static str,
        required: usize,
        actual: usize,
    },

    #[error("chain root has no ancestor to grow toward")]
    NoAncestor,
}

/// Chain membership conflicts. A rejected operation mutates no state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConflictError {
    #[error("bone {bone:?} already belongs to enabled target '{other}'")]
    BoneClaimed { bone: BoneId, other: String },

    #[error("bone {bone:?} is reserved by the host")]
    BoneReserved { bone: BoneId },
}

/// Settings errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid max_iterations: {0} (must be > 0)")]
    InvalidIterations(u32),

    #[error("Invalid tolerance_sq: {0} (must be > 0)")]
    InvalidTolerance(f32),

    #[error("Invalid max_update_passes: {0} (must be 1 or 2)")]
    InvalidPassCap(u32),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rig_error_from_chain_error() {
        let err = ChainError::TooShort(1);
        let rig: RigError = err.into();
        assert!(matches!(rig, RigError::Chain(_)));
        assert!(rig.to_string().contains("minimum 2"));
    }

    #[test]
    fn rig_error_from_conflict_error() {
        let err = ConflictError::BoneClaimed {
            bone: BoneId(4),
            other: "IK1".into(),
        };
        let rig: RigError = err.into();
        assert!(matches!(rig, RigError::Conflict(_)));
        assert!(rig.to_string().contains("IK1"));
    }

    #[test]
    fn rig_error_from_config_error() {
        let err = ConfigError::InvalidIterations(0);
        let rig: RigError = err.into();
        assert!(matches!(rig, RigError::Config(_)));
    }

    #[test]
    fn chain_error_display_messages() {
        assert_eq!(
            ChainError::TooShort(1).to_string(),
            "chain too short: 1 joints (minimum 2)"
        );
        assert_eq!(
            ChainError::TooLong(17).to_string(),
            "chain too long: 17 joints (maximum 16)"
        );
        assert_eq!(
            ChainError::UnresolvedJoint { index: 2 }.to_string(),
            "joint 2 has no resolvable bone"
        );
        assert_eq!(
            ChainError::AncestorOrder { index: 1 }.to_string(),
            "joint 1 is not an ancestor of the previous joint"
        );
        assert_eq!(
            ChainError::LevelMismatch {
                kind: "Limb",
                required: 3,
                actual: 4
            }
            .to_string(),
            "Limb solver requires exactly 3 joints, chain has 4"
        );
        assert_eq!(
            ChainError::NoAncestor.to_string(),
            "chain root has no ancestor to grow toward"
        );
    }

    #[test]
    fn conflict_error_display_messages() {
        let msg = ConflictError::BoneReserved { bone: BoneId(7) }.to_string();
        assert!(msg.contains("reserved"));
    }

    #[test]
    fn config_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: ConfigError = io.into();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn errors_are_send_sync() {
        assert_send_sync::<RigError>();
        assert_send_sync::<ChainError>();
        assert_send_sync::<ConflictError>();
    }
}
