//! Battle state and turn resolution.
//!
//! `state` holds the per-battle records, `engine` is the deterministic turn
//! transform over them, and `effects`/`validator` are the pluggable seams
//! the engine calls at fixed points.

pub mod effects;
pub mod engine;
pub mod id;
pub mod state;
pub mod validator;
