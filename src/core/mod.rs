//! Deterministic primitives: hashing, PRNG, bit packing.
//!
//! Everything in this module is a pure function of its inputs. The battle
//! engine's determinism rests on these primitives behaving identically on
//! every platform.

pub mod hash;
pub mod pack;
pub mod rng;
