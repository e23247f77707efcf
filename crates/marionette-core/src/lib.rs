//! Types, traits, pose model, math, config and errors shared by the
//! marionette IK crates.

pub mod config;
pub mod error;
pub mod math;
pub mod pose;
pub mod rig;
pub mod types;

pub use config::IkSettings;
pub use error::RigError;
pub use pose::RigPose;
pub use rig::{BoneGraph, PoseSampler, RigContext, RotationCurveStore};
pub use types::{BoneId, CurveRepr, Joint, SolverKind, SpaceKind, SyncSource};
