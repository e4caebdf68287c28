//! Protocol Errors
//!
//! Only *structural* failures surface as errors: missing battle, wrong
//! caller, out-of-order calls, bad signatures. A well-formed but illegal
//! decision is not an error — it degrades to a no-op inside the engine and
//! is observable only through post-call state.

use crate::battle::state::RosterError;

/// Structural protocol failure. Aborts the call; no partial mutation
/// survives.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// No battle stored under this id
    #[error("battle not found")]
    BattleNotFound,

    /// The winner indicator is set; no further calls accepted
    #[error("battle already concluded")]
    BattleConcluded,

    /// Caller is not one of the two registered participants
    #[error("caller is not a participant")]
    NotAParticipant,

    /// Caller is not this turn's designated committer
    #[error("caller is not this turn's committer")]
    NotCommitter,

    /// Caller is not this turn's designated revealer
    #[error("caller is not this turn's revealer")]
    NotRevealer,

    /// An unconsumed commitment already exists for the current turn
    #[error("commitment already outstanding for this turn")]
    AlreadyCommitted,

    /// This side already revealed its decision this turn
    #[error("already revealed this turn")]
    AlreadyRevealed,

    /// Recomputed reveal hash does not match the stored commitment
    #[error("reveal does not match the stored commitment")]
    CommitmentMismatch,

    /// The designated committer tried to reveal without committing first
    #[error("committer has no commitment to reveal against")]
    MissingCommitment,

    /// Signature fails to verify against the committer's key
    #[error("invalid committer signature")]
    InvalidSignature,

    /// Signed structure is bound to a different battle id
    #[error("signed commitment bound to a different battle")]
    WrongBattle,

    /// Signed structure is bound to a different turn (replay)
    #[error("signed commitment bound to turn {bound}, current turn is {current}")]
    StaleSignature {
        /// Turn id the signature binds
        bound: u32,
        /// Battle's current turn id
        current: u32,
    },

    /// A battle already exists under the derived id (reuse the pair nonce)
    #[error("battle id already exists")]
    DuplicateBattle,

    /// Roster rejected at battle creation
    #[error(transparent)]
    Roster(#[from] RosterError),

    /// Timeout claim before the opponent's deadline passed
    #[error("opponent has not exceeded its deadline")]
    TimeoutNotElapsed,
}
