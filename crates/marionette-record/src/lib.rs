//! Persistence for IK targets.
//!
//! Targets are saved as JSON records keyed by bone hierarchy paths, not
//! bone indices, so a record survives skeleton edits that keep the bone
//! names. Loading is lossy by design: a path that no longer resolves
//! becomes an unresolved joint and the target comes back invalid instead
//! of failing the whole set.

pub mod set;
pub mod types;

pub use set::{RecordError, RecordSet};
pub use types::{JointRecord, TargetRecord};
