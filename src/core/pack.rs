//! Packed Per-Mon Battle Word
//!
//! A mon's mutable battle state lives in one u64: seven signed sub-fields
//! (an HP delta plus six stat-stage deltas) and two boolean flags. All bit
//! arithmetic is centralized here — call sites only see typed accessors,
//! and every write saturates to its declared field width so a field can
//! never overflow into its neighbour.
//!
//! Layout:
//!   bits  0..16  hp_delta   (i16, applied to base max HP)
//!   bits 16..22  attack     (i6, -32..=31)
//!   bits 22..28  defense    (i6)
//!   bits 28..34  sp_attack  (i6)
//!   bits 34..40  sp_defense (i6)
//!   bits 40..46  speed      (i6)
//!   bits 46..52  accuracy   (i6)
//!   bit  52      protect flag
//!   bit  53      recharge flag
//!   bits 54..64  reserved (zero)

use serde::{Deserialize, Serialize};

use crate::TEAM_CAPACITY;

/// Width of each stat-delta field in bits.
const STAT_BITS: u32 = 6;

/// Smallest representable stat delta.
pub const STAT_DELTA_MIN: i8 = -32;

/// Largest representable stat delta.
pub const STAT_DELTA_MAX: i8 = 31;

const HP_SHIFT: u32 = 0;
const STAT_BASE_SHIFT: u32 = 16;
const PROTECT_BIT: u32 = 52;
const RECHARGE_BIT: u32 = 53;

const STAT_MASK: u64 = (1 << STAT_BITS) - 1;
const HP_MASK: u64 = 0xFFFF;

/// The six boostable battle stats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Stat {
    /// Physical attack
    Attack = 0,
    /// Physical defense
    Defense = 1,
    /// Special attack
    SpAttack = 2,
    /// Special defense
    SpDefense = 3,
    /// Turn-order speed
    Speed = 4,
    /// Hit chance modifier
    Accuracy = 5,
}

impl Stat {
    /// All stats, in field order.
    pub const ALL: [Stat; 6] = [
        Stat::Attack,
        Stat::Defense,
        Stat::SpAttack,
        Stat::SpDefense,
        Stat::Speed,
        Stat::Accuracy,
    ];

    #[inline]
    fn shift(self) -> u32 {
        STAT_BASE_SHIFT + (self as u32) * STAT_BITS
    }
}

/// Packed mutable battle state of one mon.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedMon(pub u64);

impl PackedMon {
    /// Fresh state: all deltas zero, flags clear.
    pub const ZERO: PackedMon = PackedMon(0);

    /// HP delta (negative = damage taken).
    #[inline]
    pub fn hp_delta(self) -> i16 {
        ((self.0 >> HP_SHIFT) & HP_MASK) as u16 as i16
    }

    /// Set the HP delta.
    #[inline]
    pub fn set_hp_delta(&mut self, value: i16) {
        self.0 = (self.0 & !(HP_MASK << HP_SHIFT)) | (((value as u16) as u64) << HP_SHIFT);
    }

    /// Apply a saturating change to the HP delta.
    #[inline]
    pub fn apply_hp_delta(&mut self, change: i32) {
        let next = (self.hp_delta() as i32 + change)
            .clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        self.set_hp_delta(next);
    }

    /// Read a stat delta, sign-extended from its 6-bit field.
    #[inline]
    pub fn stat_delta(self, stat: Stat) -> i8 {
        sign_extend_6((self.0 >> stat.shift()) & STAT_MASK)
    }

    /// Write a stat delta, saturating to the declared field width.
    #[inline]
    pub fn set_stat_delta(&mut self, stat: Stat, value: i8) {
        let clamped = value.clamp(STAT_DELTA_MIN, STAT_DELTA_MAX);
        let bits = (clamped as u8 as u64) & STAT_MASK;
        let shift = stat.shift();
        self.0 = (self.0 & !(STAT_MASK << shift)) | (bits << shift);
    }

    /// Apply a saturating change to a stat delta.
    #[inline]
    pub fn apply_stat_delta(&mut self, stat: Stat, change: i8) {
        let next = (self.stat_delta(stat) as i16 + change as i16)
            .clamp(STAT_DELTA_MIN as i16, STAT_DELTA_MAX as i16) as i8;
        self.set_stat_delta(stat, next);
    }

    /// Protect flag (blocks incoming damage this turn).
    #[inline]
    pub fn protect(self) -> bool {
        (self.0 >> PROTECT_BIT) & 1 == 1
    }

    /// Set or clear the protect flag.
    #[inline]
    pub fn set_protect(&mut self, on: bool) {
        self.0 = (self.0 & !(1 << PROTECT_BIT)) | ((on as u64) << PROTECT_BIT);
    }

    /// Recharge flag (must skip the next action).
    #[inline]
    pub fn recharge(self) -> bool {
        (self.0 >> RECHARGE_BIT) & 1 == 1
    }

    /// Set or clear the recharge flag.
    #[inline]
    pub fn set_recharge(&mut self, on: bool) {
        self.0 = (self.0 & !(1 << RECHARGE_BIT)) | ((on as u64) << RECHARGE_BIT);
    }

    /// Current HP given the mon's base max HP. Never negative.
    #[inline]
    pub fn current_hp(self, max_hp: u16) -> u16 {
        let hp = max_hp as i32 + self.hp_delta() as i32;
        hp.clamp(0, u16::MAX as i32) as u16
    }

    /// Effective value of a base stat after the packed delta. Floor 1 so
    /// damage division is always defined.
    #[inline]
    pub fn effective_stat(self, stat: Stat, base: u8) -> u16 {
        let eff = base as i16 + self.stat_delta(stat) as i16;
        eff.max(1) as u16
    }

    /// Knocked out given the mon's base max HP.
    #[inline]
    pub fn is_ko(self, max_hp: u16) -> bool {
        self.current_hp(max_hp) == 0
    }
}

/// Sign-extend the low 6 bits of `bits` to an i8.
#[inline]
fn sign_extend_6(bits: u64) -> i8 {
    let shifted = (bits as u8) << 2;
    (shifted as i8) >> 2
}

// =============================================================================
// TEAM SIZE COUNTERS
// =============================================================================

/// Pack both sides' team sizes into one byte (side 0 low nibble).
///
/// # Panics
/// Panics if either count exceeds [`TEAM_CAPACITY`]; team sizes are
/// validated at battle creation, before packing.
pub fn pack_team_counts(side0: u8, side1: u8) -> u8 {
    assert!(side0 as usize <= TEAM_CAPACITY, "side 0 team too large");
    assert!(side1 as usize <= TEAM_CAPACITY, "side 1 team too large");
    (side1 << 4) | (side0 & 0x0F)
}

/// Unpack both sides' team sizes.
pub fn unpack_team_counts(packed: u8) -> (u8, u8) {
    (packed & 0x0F, packed >> 4)
}

// =============================================================================
// TESTS
// =============================================================================
