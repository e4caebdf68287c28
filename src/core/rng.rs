//! Deterministic Random Number Generator
//!
//! Xorshift128+ seeded via SplitMix64. Given the same seed, produces the
//! identical sequence on every platform. The per-turn seed is derived from
//! both sides' revealed salts, so neither side controls it alone.

use serde::{Deserialize, Serialize};

use super::hash::{Hash32, StateHasher, SEED_DOMAIN};

/// Deterministic PRNG using the Xorshift128+ algorithm.
///
/// # Example
///
/// ```
/// use mon_arena::DeterministicRng;
///
/// let mut rng = DeterministicRng::new(12345);
/// let a = rng.next_u64();
/// let b = DeterministicRng::new(12345).next_u64();
/// assert_eq!(a, b);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Create a new RNG from a 64-bit seed.
    ///
    /// Uses SplitMix64 to initialize the internal state, ensuring good
    /// distribution even from weak seeds.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state0 = splitmix64(&mut s);
        let state1 = splitmix64(&mut s);

        // Xorshift state must never be all zeros
        let state = if state0 == 0 && state1 == 0 {
            [1, 1]
        } else {
            [state0, state1]
        };

        Self { state }
    }

    /// Generate the next 64-bit random value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }

    /// Generate a random u32.
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        self.next_u64() as u32
    }

    /// Generate a random integer in range [0, max).
    #[inline]
    pub fn next_int(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        (self.next_u64() % max as u64) as u32
    }

    /// Generate a random integer in range [min, max].
    #[inline]
    pub fn next_int_range(&mut self, min: i32, max: i32) -> i32 {
        if min >= max {
            return min;
        }
        let range = (max - min + 1) as u32;
        min + self.next_int(range) as i32
    }
}

/// External randomness seam: turns both sides' revealed salts into the
/// turn seed.
///
/// Must be pure — the engine is a deterministic function of its explicit
/// inputs, and any oracle that reads ambient state breaks replayability.
pub trait RandomnessOracle: Send + Sync {
    /// Derive the turn seed. Positional: `salt0` belongs to side 0.
    fn seed(&self, salt0: &Hash32, salt1: &Hash32) -> u64;
}

/// Default oracle: domain-separated SHA-256 over both salts in order.
#[derive(Clone, Copy, Debug, Default)]
pub struct HashSeedOracle;

impl RandomnessOracle for HashSeedOracle {
    fn seed(&self, salt0: &Hash32, salt1: &Hash32) -> u64 {
        derive_turn_seed(salt0, salt1)
    }
}

/// SplitMix64 step, used for seeding only.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Derive the turn seed from both sides' revealed salts.
///
/// The combination is positional: side 0's salt and side 1's salt are
/// distinct inputs, not interchangeable — `derive_turn_seed(a, b)` differs
/// from `derive_turn_seed(b, a)` for `a != b`.
pub fn derive_turn_seed(salt0: &Hash32, salt1: &Hash32) -> u64 {
    let mut hasher = StateHasher::new(SEED_DOMAIN);
    hasher.update_hash(salt0);
    hasher.update_hash(salt1);
    let digest = hasher.finalize();

    u64::from_le_bytes(digest[..8].try_into().unwrap())
}

// =============================================================================
// TESTS
// =============================================================================
