//! # Mon Arena Battle Engine
//!
//! Deterministic two-player turn-based battle simulation with a commit/reveal
//! move-submission protocol.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       MON ARENA                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── hash.rs     - Domain-separated SHA-256 hashing          │
//! │  ├── rng.rs      - Xorshift128+ PRNG, turn seed derivation   │
//! │  └── pack.rs     - Packed per-mon battle word                │
//! │                                                              │
//! │  battle/         - Battle state and turn resolution          │
//! │  ├── id.rs       - Battle identifier derivation              │
//! │  ├── state.rs    - Battle records, rosters, decisions        │
//! │  ├── effects.rs  - Move/effect hook registry and arenas      │
//! │  ├── validator.rs- Decision legality and timeout checks      │
//! │  └── engine.rs   - Deterministic turn resolution             │
//! │                                                              │
//! │  protocol/       - Move-submission protocol                  │
//! │  ├── commit.rs   - Commit → reveal state machine             │
//! │  └── signed.rs   - ed25519 signed-commitment fast path       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! The `core/` and `battle/` modules are **100% deterministic**:
//! - No floating-point arithmetic
//! - No HashMap (BTreeMap only, for sorted iteration)
//! - No system time reads; timestamps are caller-supplied
//! - All randomness from the seeded Xorshift128+ PRNG
//!
//! Given identical battle state, decisions and salts, turn resolution
//! produces identical results on any platform.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod battle;
pub mod core;
pub mod protocol;

// Re-export commonly used types
pub use crate::core::hash::{compute_move_commitment, Hash32};
pub use crate::core::pack::PackedMon;
pub use crate::core::rng::{derive_turn_seed, DeterministicRng};
pub use battle::effects::{HookRegistry, MoveId};
pub use battle::id::{derive_battle_id, BattleId};
pub use battle::state::{
    MonSpec, PlayerDecision, PlayerId, Side, Winner, MOVE_NONE, MOVE_SWITCH,
};
pub use protocol::{sign_commitment, Arena, ProtocolError, SignedCommitment};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum mons per team
pub const TEAM_CAPACITY: usize = 6;

/// Move slots per mon
pub const MOVES_PER_MON: usize = 4;

/// Effect slots per arena (one arena per side plus one global)
pub const EFFECT_CAPACITY: usize = 8;

/// Seconds a side may sit on the current turn before the opponent can
/// claim a timeout win
pub const TURN_DEADLINE_SECS: u64 = 300;
