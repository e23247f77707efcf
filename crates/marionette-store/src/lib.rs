//! IK target bookkeeping and the per-frame update loop.
//!
//! # Architecture
//!
//! ```text
//! TargetStore ──► IkTarget (dirty state, space, chain) ──► Solver
//!      │                                                     │
//!      └── update_ik: sample pose, solve dirty targets, ─────┘
//!          write rotation keys, re-derive sync'd targets
//! ```
//!
//! An [`IkTarget`] owns the editable description of one chain (joints,
//! stored position/rotation in some space, solver choice) plus its
//! [`DirtyState`]. The [`TargetStore`] enforces the cross-target rules:
//! one enabled chain per bone, dependency propagation between
//! Parent-space targets, and the 1–2 pass update.

pub mod space;
pub mod store;
pub mod target;

pub use store::TargetStore;
pub use target::{DirtyState, IkTarget};
