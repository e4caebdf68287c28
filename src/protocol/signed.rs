//! Signed-Commitment Fast Path
//!
//! The committer can hand its commitment to the opponent out of band as a
//! signed structure instead of making its own commit call. The revealer
//! then submits reveal-with-signed-commitment: one call that stores the
//! committer's commitment (after verifying the ed25519 signature against
//! the committer's key) and records the revealer's own decision.
//!
//! The signature binds battle id and turn, so a captured structure cannot
//! be replayed against another battle or a later turn. A commitment the
//! committer already placed on file is authoritative; a signed structure
//! arriving afterwards is ignored rather than checked.

use ed25519_dalek::{Keypair, PublicKey, SecretKey, Signature, Signer, Verifier};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::battle::id::BattleId;
use crate::battle::state::{CommitPhase, PlayerId, TurnOutcome};
use crate::core::hash::{Hash32, SIGNED_COMMIT_DOMAIN};

use super::{Arena, ProtocolError};

/// A commitment the committer signed over instead of submitting itself.
///
/// Binds the commitment digest to one battle and one turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedCommitment {
    /// Commitment digest over the committer's decision
    pub move_hash: Hash32,
    /// Battle this commitment is bound to
    pub battle_id: BattleId,
    /// Turn this commitment is bound to
    pub turn: u32,
}

impl SignedCommitment {
    /// Canonical byte payload the signature covers.
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut buf = SIGNED_COMMIT_DOMAIN.to_vec();
        let body = bincode::serialize(self).expect("fixed-size payload serializes");
        buf.extend_from_slice(&body);
        buf
    }
}

/// Produce the committer's signature over a [`SignedCommitment`].
///
/// Client-side helper; the protocol itself only ever verifies.
pub fn sign_commitment(commitment: &SignedCommitment, secret: &[u8; 32]) -> [u8; 64] {
    let secret = SecretKey::from_bytes(secret).expect("secret key must be 32 bytes");
    let public: PublicKey = (&secret).into();
    let kp = Keypair { secret, public };
    kp.sign(&commitment.signing_bytes()).to_bytes()
}

fn verify_commitment(
    commitment: &SignedCommitment,
    signature: &[u8; 64],
    signer: &PlayerId,
) -> Result<(), ProtocolError> {
    let vk = PublicKey::from_bytes(signer.as_bytes())
        .map_err(|_| ProtocolError::InvalidSignature)?;
    let sig =
        Signature::from_bytes(signature).map_err(|_| ProtocolError::InvalidSignature)?;
    vk.verify(&commitment.signing_bytes(), &sig)
        .map_err(|_| ProtocolError::InvalidSignature)
}

impl Arena {
    /// Reveal a decision while carrying the committer's signed commitment.
    ///
    /// Only this turn's designated revealer may call this. If the committer
    /// has no commitment on file, the signed structure is verified against
    /// the committer's key and stored as its commitment; if one is already
    /// on file it stays authoritative and the signed structure is ignored.
    /// The revealer's decision is then recorded exactly as in
    /// [`Arena::reveal`].
    #[allow(clippy::too_many_arguments)]
    pub fn reveal_with_signed_commit(
        &mut self,
        id: &BattleId,
        caller: &PlayerId,
        move_index: u8,
        salt: Hash32,
        extra: u64,
        signed: &SignedCommitment,
        signature: &[u8; 64],
        should_execute: bool,
        now: u64,
    ) -> Result<Option<TurnOutcome>, ProtocolError> {
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
            if side != battle.revealer_side() {
                return Err(ProtocolError::NotRevealer);
            }

            let turn = battle.data.turn;
            if signed.battle_id != *id {
                return Err(ProtocolError::WrongBattle);
            }
            if signed.turn != turn {
                return Err(ProtocolError::StaleSignature {
                    bound: signed.turn,
                    current: turn,
                });
            }

            let committer = battle.committer_side();
            let committer_slot = &battle.players[committer.index()];
            if committer_slot.phase.committed_for(turn).is_none()
                && !committer_slot.phase.revealed_for(turn)
            {
                verify_commitment(signed, signature, &committer_slot.id)?;
            }
        }

        // Store the committer's commitment if none is on file yet.
        let battle = self
            .store_mut()
            .get_mut(id)
            .ok_or(ProtocolError::BattleNotFound)?;
        let turn = battle.data.turn;
        let committer = battle.committer_side();
        let committer_slot = &mut battle.players[committer.index()];
        if committer_slot.phase.committed_for(turn).is_none()
            && !committer_slot.phase.revealed_for(turn)
        {
            committer_slot.phase = CommitPhase::Committed {
                turn,
                hash: signed.move_hash,
                at: now,
            };
            committer_slot.last_action_at = now;
            debug!(
                battle = %hex::encode(&id[..4]),
                turn,
                side = committer.index(),
                "signed commitment stored"
            );
        }

        self.reveal(id, caller, move_index, salt, extra, should_execute, now)
    }

    /// Publish a signed commitment on the committer's behalf.
    ///
    /// Anyone may call this; authority comes from the signature, not the
    /// caller. Stores the commitment only — it never records a reveal.
    pub fn commit_with_signature(
        &mut self,
        id: &BattleId,
        signed: &SignedCommitment,
        signature: &[u8; 64],
        now: u64,
    ) -> Result<(), ProtocolError> {
        let battle = self
            .store_mut()
            .get_mut(id)
            .ok_or(ProtocolError::BattleNotFound)?;
        if battle.is_concluded() {
            return Err(ProtocolError::BattleConcluded);
        }

        let turn = battle.data.turn;
        if signed.battle_id != *id {
            return Err(ProtocolError::WrongBattle);
        }
        if signed.turn != turn {
            return Err(ProtocolError::StaleSignature {
                bound: signed.turn,
                current: turn,
            });
        }

        let committer = battle.committer_side();
        let slot = &mut battle.players[committer.index()];
        if slot.phase.revealed_for(turn) {
            return Err(ProtocolError::AlreadyRevealed);
        }
        if slot.phase.committed_for(turn).is_some() {
            return Err(ProtocolError::AlreadyCommitted);
        }
        verify_commitment(signed, signature, &slot.id)?;

        slot.phase = CommitPhase::Committed {
            turn,
            hash: signed.move_hash,
            at: now,
        };
        slot.last_action_at = now;

        debug!(
            battle = %hex::encode(&id[..4]),
            turn,
            side = committer.index(),
            "signed commitment published"
        );
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
