//! Shared test fixtures and utilities for marionette crates.
//!
//! Provides a programmatic skeleton implementing the collaborator traits
//! and an in-memory recording curve store, so solver and store tests can
//! run without a host editor.

pub mod curves;
pub mod rig;

// ---------------------------------------------------------------------------
// Re-exports for convenience
// ---------------------------------------------------------------------------

pub use curves::{CurveKey, RecordingCurves};
pub use rig::TestRig;
