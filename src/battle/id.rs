//! Battle Identifier Derivation
//!
//! A battle id is a pure function of the ordered participant pair and a
//! per-pair nonce, so both players (and anyone watching) can compute it
//! before the battle exists. The pair is positional: (a, b) and (b, a)
//! produce different ids because side assignment is part of the identity.

use crate::battle::state::PlayerId;
use crate::core::hash::{Hash32, StateHasher, BATTLE_ID_DOMAIN};

/// Opaque battle identifier. Used as the lookup key everywhere.
pub type BattleId = Hash32;

/// Derive the battle id for (side 0, side 1, nonce).
///
/// Same pair + same nonce ⇒ same id; incrementing the nonce yields a fresh
/// id for a rematch between the same pair.
pub fn derive_battle_id(side0: &PlayerId, side1: &PlayerId, nonce: u64) -> BattleId {
    let mut hasher = StateHasher::new(BATTLE_ID_DOMAIN);
    hasher.update_hash(&side0.0);
    hasher.update_hash(&side1.0);
    hasher.update_u64(nonce);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(b: u8) -> PlayerId {
        PlayerId([b; 32])
    }

    #[test]
    fn test_same_inputs_same_id() {
        assert_eq!(
            derive_battle_id(&pid(1), &pid(2), 0),
            derive_battle_id(&pid(1), &pid(2), 0)
        );
    }

    #[test]
    fn test_nonce_changes_id() {
        assert_ne!(
            derive_battle_id(&pid(1), &pid(2), 0),
            derive_battle_id(&pid(1), &pid(2), 1)
        );
    }

    #[test]
    fn test_pair_order_matters() {
        assert_ne!(
            derive_battle_id(&pid(1), &pid(2), 0),
            derive_battle_id(&pid(2), &pid(1), 0)
        );
    }
}
