//! Domain-Separated Hashing
//!
//! All digests in the protocol are SHA-256 with an explicit domain
//! separator, so a commitment can never collide with a battle id or a
//! signed-commitment digest. Order of updates is part of the format:
//! changing it changes every stored hash.

use sha2::{Digest, Sha256};

/// Hash output type (256 bits / 32 bytes)
pub type Hash32 = [u8; 32];

/// Domain separator for move commitments.
pub const COMMIT_DOMAIN: &[u8] = b"MON_ARENA_COMMIT_V1";

/// Domain separator for battle identifiers.
pub const BATTLE_ID_DOMAIN: &[u8] = b"MON_ARENA_BATTLE_V1";

/// Domain separator for turn seed derivation.
pub const SEED_DOMAIN: &[u8] = b"MON_ARENA_SEED_V1";

/// Domain separator for signed-commitment digests.
pub const SIGNED_COMMIT_DOMAIN: &[u8] = b"MON_ARENA_SIGNED_V1";

/// Deterministic hasher with typed update helpers.
///
/// Wraps SHA-256. Integers are fed little-endian; callers never touch
/// byte order directly.
pub struct StateHasher {
    hasher: Sha256,
}

impl StateHasher {
    /// Create a new hasher with a domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Update with raw bytes.
    #[inline]
    pub fn update_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Update with a u8 value.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a u64 value (little-endian).
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a 32-byte hash or key.
    #[inline]
    pub fn update_hash(&mut self, value: &Hash32) {
        self.hasher.update(value);
    }

    /// Finalize and return the digest.
    pub fn finalize(self) -> Hash32 {
        self.hasher.finalize().into()
    }
}

/// Compute hash with domain separator.
pub fn hash_with_domain(domain: &[u8], data: &[u8]) -> Hash32 {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute the commitment digest for a move decision.
///
/// Binds the hidden choice (move index, salt, extra data) to the exact
/// (turn, battle) it was made for. A commitment is never valid across a
/// different turn id or battle id because both are part of the preimage.
pub fn compute_move_commitment(
    move_index: u8,
    salt: &Hash32,
    extra: u64,
    turn: u32,
    battle_id: &Hash32,
) -> Hash32 {
    let mut hasher = StateHasher::new(COMMIT_DOMAIN);
    hasher.update_u8(move_index);
    hasher.update_hash(salt);
    hasher.update_u64(extra);
    hasher.update_u32(turn);
    hasher.update_hash(battle_id);
    hasher.finalize()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hasher_determinism() {
        let make_hash = || {
            let mut hasher = StateHasher::new(b"test");
            hasher.update_u32(100);
            hasher.update_u64(12345);
            hasher.update_u8(7);
            hasher.finalize()
        };

        assert_eq!(make_hash(), make_hash());
    }

    #[test]
    fn test_hash_order_matters() {
        let hash1 = {
            let mut h = StateHasher::new(b"test");
            h.update_u32(1);
            h.update_u32(2);
            h.finalize()
        };

        let hash2 = {
            let mut h = StateHasher::new(b"test");
            h.update_u32(2);
            h.update_u32(1);
            h.finalize()
        };

        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_domain_separation() {
        let data = [1u8, 2, 3, 4];

        let hash1 = hash_with_domain(b"DOMAIN_A", &data);
        let hash2 = hash_with_domain(b"DOMAIN_B", &data);

        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_commitment_binds_every_field() {
        let salt = [9u8; 32];
        let battle = [3u8; 32];
        let base = compute_move_commitment(1, &salt, 0, 5, &battle);

        assert_ne!(base, compute_move_commitment(2, &salt, 0, 5, &battle));
        assert_ne!(base, compute_move_commitment(1, &[8u8; 32], 0, 5, &battle));
        assert_ne!(base, compute_move_commitment(1, &salt, 1, 5, &battle));
        assert_ne!(base, compute_move_commitment(1, &salt, 0, 6, &battle));
        assert_ne!(base, compute_move_commitment(1, &salt, 0, 5, &[4u8; 32]));
    }

    #[test]
    fn test_commitment_reproducible() {
        let salt = [0xAB; 32];
        let battle = [0xCD; 32];

        let a = compute_move_commitment(3, &salt, 42, 7, &battle);
        let b = compute_move_commitment(3, &salt, 42, 7, &battle);
        assert_eq!(a, b);
    }
}
