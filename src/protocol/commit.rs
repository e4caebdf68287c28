//! Commit / Reveal / Execute / Timeout
//!
//! The plain submission path. Turn parity fixes roles: on even turns side 0
//! commits and side 1 reveals first, on odd turns the roles swap. The
//! designated revealer's first reveal of a turn is itself the commitment
//! point, so it carries no prior hash to check against. The designated
//! committer must have an outstanding commitment before revealing.
//!
//! Legality is checked at resolution, not here: a structurally valid reveal
//! of an illegal decision is accepted and later degrades to a no-op.

use tracing::{debug, warn};

use crate::battle::id::BattleId;
use crate::battle::state::{CommitPhase, PlayerDecision, PlayerId, Side, TurnOutcome, Winner};
use crate::core::hash::{compute_move_commitment, Hash32};

use super::{Arena, ProtocolError};

impl Arena {
    /// Store the designated committer's commitment hash for the current
    /// turn.
    ///
    /// Rejected when the caller is not this turn's committer, when an
    /// unconsumed commitment is already outstanding, or when the committer
    /// has already revealed this turn.
    pub fn commit(
        &mut self,
        id: &BattleId,
        caller: &PlayerId,
        hash: Hash32,
        now: u64,
    ) -> Result<(), ProtocolError> {
        let battle = self
            .store_mut()
            .get_mut(id)
            .ok_or(ProtocolError::BattleNotFound)?;
        if battle.is_concluded() {
            return Err(ProtocolError::BattleConcluded);
        }

        let side = battle
            .side_of(caller)
            .ok_or(ProtocolError::NotAParticipant)?;
        if side != battle.committer_side() {
            return Err(ProtocolError::NotCommitter);
        }

        let turn = battle.data.turn;
        let slot = &mut battle.players[side.index()];
        if slot.phase.revealed_for(turn) {
            return Err(ProtocolError::AlreadyRevealed);
        }
        if slot.phase.committed_for(turn).is_some() {
            return Err(ProtocolError::AlreadyCommitted);
        }

        slot.phase = CommitPhase::Committed { turn, hash, at: now };
        slot.last_action_at = now;

        debug!(
            battle = %hex::encode(&id[..4]),
            turn,
            side = side.index(),
            "commitment stored"
        );
        Ok(())
    }

    /// Reveal a decision for the current turn.
    ///
    /// For the side holding a commitment the reveal hash is recomputed and
    /// must match. For the designated revealer with no commitment on file
    /// this call *is* the commitment point. A committer revealing without a
    /// commitment is a structural error.
    ///
    /// When `should_execute` is set and this reveal completes the pair, the
    /// turn resolves in the same call and its outcome is returned.
    #[allow(clippy::too_many_arguments)]
    pub fn reveal(
        &mut self,
        id: &BattleId,
        caller: &PlayerId,
        move_index: u8,
        salt: Hash32,
        extra: u64,
        should_execute: bool,
        now: u64,
    ) -> Result<Option<TurnOutcome>, ProtocolError> {
        let decision = PlayerDecision {
            move_index,
            extra,
            salt,
        };

        {
            let battle = self
                .store()
                .get(id)
                .ok_or(ProtocolError::BattleNotFound)?;
            if battle.is_concluded() {
                return Err(ProtocolError::BattleConcluded);
            }

            let side = battle
                .side_of(caller)
                .ok_or(ProtocolError::NotAParticipant)?;
            let turn = battle.data.turn;
            let slot = &battle.players[side.index()];
            if slot.phase.revealed_for(turn) || slot.pending.is_some() {
                return Err(ProtocolError::AlreadyRevealed);
            }

            match slot.phase.committed_for(turn) {
                Some(stored) => {
                    let recomputed =
                        compute_move_commitment(move_index, &salt, extra, turn, id);
                    if recomputed != stored {
                        return Err(ProtocolError::CommitmentMismatch);
                    }
                }
                None => {
                    // Only the designated revealer may reveal unannounced;
                    // its first reveal of the turn is the commitment point.
                    if side == battle.committer_side() {
                        return Err(ProtocolError::MissingCommitment);
                    }
                }
            }

            if !self
                .validator_ref()
                .is_legal_decision(battle, side, &decision)
            {
                // Accepted anyway; degrades to a no-op at resolution
                warn!(
                    battle = %hex::encode(&id[..4]),
                    turn,
                    side = side.index(),
                    move_index,
                    "revealed decision is illegal"
                );
            }
        }

        // Checks passed; record the reveal.
        let battle = self
            .store_mut()
            .get_mut(id)
            .ok_or(ProtocolError::BattleNotFound)?;
        let side = battle
            .side_of(caller)
            .ok_or(ProtocolError::NotAParticipant)?;
        let turn = battle.data.turn;
        let slot = &mut battle.players[side.index()];
        slot.pending = Some(decision);
        slot.phase = CommitPhase::Revealed { turn };
        slot.reveals += 1;
        slot.last_action_at = now;

        debug!(
            battle = %hex::encode(&id[..4]),
            turn,
            side = side.index(),
            "decision revealed"
        );

        if should_execute && battle.both_decided() {
            return self.execute(id);
        }
        Ok(None)
    }

    /// Resolve the current turn if both decisions are in.
    ///
    /// Returns `Ok(None)` while a decision is still outstanding; calling
    /// again in that state is harmless.
    pub fn execute(&mut self, id: &BattleId) -> Result<Option<TurnOutcome>, ProtocolError> {
        self.execute_inner(id)
    }

    /// Claim victory over an unresponsive opponent.
    ///
    /// On-demand check: succeeds only when the opponent has not revealed
    /// this turn and its last protocol action is past the deadline. On
    /// success the caller's side wins immediately.
    pub fn claim_timeout(
        &mut self,
        id: &BattleId,
        caller: &PlayerId,
        now: u64,
    ) -> Result<Side, ProtocolError> {
        let timed_out = {
            let battle = self
                .store()
                .get(id)
                .ok_or(ProtocolError::BattleNotFound)?;
            if battle.is_concluded() {
                return Err(ProtocolError::BattleConcluded);
            }
            let side = battle
                .side_of(caller)
                .ok_or(ProtocolError::NotAParticipant)?;
            self.validator_ref()
                .timed_out(battle, side.opponent(), now)
        };
        if !timed_out {
            return Err(ProtocolError::TimeoutNotElapsed);
        }

        let battle = self
            .store_mut()
            .get_mut(id)
            .ok_or(ProtocolError::BattleNotFound)?;
        let side = battle
            .side_of(caller)
            .ok_or(ProtocolError::NotAParticipant)?;
        battle.data.winner = Winner::Won(side);
        battle.players[side.index()].last_action_at = now;

        warn!(
            battle = %hex::encode(&id[..4]),
            turn = battle.data.turn,
            winner = side.index(),
            "timeout claimed"
        );
        Ok(side)
    }
}

// =============================================================================
// TESTS
// =============================================================================
