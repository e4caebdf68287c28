//! Battle State Definitions
//!
//! Per-battle records: metadata, rosters, packed per-mon state, pending
//! decisions and commitment bookkeeping. Mutated only by the protocol and
//! the turn-resolution engine. Uses BTreeMap for deterministic iteration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::battle::effects::{EffectArena, EffectId, MoveId};
use crate::battle::id::BattleId;
use crate::core::hash::Hash32;
use crate::core::pack::{pack_team_counts, unpack_team_counts, PackedMon, Stat};
use crate::{MOVES_PER_MON, TEAM_CAPACITY};

// =============================================================================
// PLAYER ID
// =============================================================================

/// Unique player identifier: the player's ed25519 public key bytes.
///
/// Implements Ord for deterministic BTreeMap ordering.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PlayerId(pub [u8; 32]);

impl PlayerId {
    /// Create from raw key bytes.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Short hex prefix for log lines.
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

// =============================================================================
// SIDES
// =============================================================================

/// One of the two battle sides. Side 0 commits first on even turns.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum Side {
    /// Side 0 (battle creator's side)
    Zero = 0,
    /// Side 1
    One = 1,
}

impl Side {
    /// Array index for this side.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// The other side.
    #[inline]
    pub fn opponent(self) -> Side {
        match self {
            Side::Zero => Side::One,
            Side::One => Side::Zero,
        }
    }
}

/// Winner indicator. Terminal once set: no further commitments accepted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    /// Battle still running
    #[default]
    Undecided,
    /// A side has won
    Won(Side),
}

/// Whose turn it is to switch a mon in.
///
/// `Both` is the normal state (both sides act); `Only(side)` opens after a
/// knockout and restricts the next turn to that side's forced replacement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwitchWindow {
    /// Normal turn: both sides act
    #[default]
    Both,
    /// Forced-switch turn for one side only
    Only(Side),
}

// =============================================================================
// DECISIONS
// =============================================================================

/// Move index sentinel: explicit no-op.
pub const MOVE_NONE: u8 = 0xFF;

/// Move index sentinel: switch; `extra` carries the bench index.
pub const MOVE_SWITCH: u8 = 0xFE;

/// Active-slot sentinel: no mon on the field yet (turn 0).
pub const NO_ACTIVE: u8 = 0xFF;

/// A revealed per-turn decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerDecision {
    /// Move slot (0..[`MOVES_PER_MON`]) or a sentinel
    pub move_index: u8,
    /// Auxiliary data (bench index for a switch, move-specific otherwise)
    pub extra: u64,
    /// Salt the decision was committed with; feeds turn seed derivation
    pub salt: Hash32,
}

impl PlayerDecision {
    /// Is this a switch decision?
    #[inline]
    pub fn is_switch(&self) -> bool {
        self.move_index == MOVE_SWITCH
    }

    /// Is this an explicit no-op?
    #[inline]
    pub fn is_noop(&self) -> bool {
        self.move_index == MOVE_NONE
    }
}

/// Per-(battle, turn) commitment state.
///
/// Explicit tri-state: there is no "hash equals empty" sentinel anywhere.
/// Turn 0 and turn N follow the same comparisons.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitPhase {
    /// No commitment outstanding
    #[default]
    NotCommitted,
    /// Unconsumed commitment for `turn`
    Committed {
        /// Turn the commitment was made for
        turn: u32,
        /// Commitment digest
        hash: Hash32,
        /// Caller-supplied timestamp of the commit
        at: u64,
    },
    /// Decision revealed for `turn`; commitment consumed
    Revealed {
        /// Turn the reveal was recorded for
        turn: u32,
    },
}

impl CommitPhase {
    /// Stored commitment hash if one is outstanding for `turn`.
    pub fn committed_for(&self, turn: u32) -> Option<Hash32> {
        match self {
            CommitPhase::Committed { turn: t, hash, .. } if *t == turn => Some(*hash),
            _ => None,
        }
    }

    /// Has this side already revealed for `turn`?
    pub fn revealed_for(&self, turn: u32) -> bool {
        matches!(self, CommitPhase::Revealed { turn: t } if *t == turn)
    }
}

/// Protocol bookkeeping for one participant.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlayerSlot {
    /// Participant identity (ed25519 public key)
    pub id: PlayerId,
    /// Commitment state for the current turn
    pub phase: CommitPhase,
    /// Revealed decision awaiting resolution
    pub pending: Option<PlayerDecision>,
    /// Timestamp of this side's last protocol action
    pub last_action_at: u64,
    /// Total revealed moves over the battle's lifetime
    pub reveals: u32,
}

impl PlayerSlot {
    fn new(id: PlayerId, now: u64) -> Self {
        Self {
            id,
            phase: CommitPhase::NotCommitted,
            pending: None,
            last_action_at: now,
            reveals: 0,
        }
    }
}

// =============================================================================
// ROSTERS
// =============================================================================

/// Immutable per-mon roster entry: species, base stats and move list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonSpec {
    /// Species identifier (catalog key, out of scope here)
    pub species: u16,
    /// Base maximum HP
    pub max_hp: u16,
    /// Base attack
    pub attack: u8,
    /// Base defense
    pub defense: u8,
    /// Base special attack
    pub sp_attack: u8,
    /// Base special defense
    pub sp_defense: u8,
    /// Base speed
    pub speed: u8,
    /// Move list (first `move_count` entries valid)
    pub moves: [MoveId; MOVES_PER_MON],
    /// Number of valid moves
    pub move_count: u8,
}

// =============================================================================
// BATTLE RECORDS
// =============================================================================

/// Battle metadata. Mutated only by the engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BattleData {
    /// Turn counter, monotonic from 0
    pub turn: u32,
    /// Winner indicator (terminal once `Won`)
    pub winner: Winner,
    /// Forced-switch window
    pub switch_window: SwitchWindow,
    /// Active mon slot per side ([`NO_ACTIVE`] until first switch-in)
    pub active: [u8; 2],
    /// Battle start timestamp (caller-supplied seconds)
    pub started_at: u64,
}

/// Packed rosters and mutable per-mon state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BattleConfig {
    /// Team rosters per side
    pub rosters: [[MonSpec; TEAM_CAPACITY]; 2],
    /// Both team sizes packed into one byte
    pub team_counts: u8,
    /// Packed mutable battle word per mon per side
    pub mons: [[PackedMon; TEAM_CAPACITY]; 2],
    /// Per-side effect-instance arenas
    pub side_effects: [EffectArena; 2],
    /// Global effect-instance arena
    pub global_effects: EffectArena,
}

/// One battle: metadata, config, and both participants' protocol slots.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Battle {
    /// Battle identifier (lookup key)
    pub id: BattleId,
    /// Metadata
    pub data: BattleData,
    /// Rosters and packed state
    pub config: BattleConfig,
    /// Protocol bookkeeping, one slot per side
    pub players: [PlayerSlot; 2],
}

/// Errors when assembling a battle from rosters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RosterError {
    /// A team is empty or larger than [`TEAM_CAPACITY`]
    #[error("team size {0} out of range 1..={TEAM_CAPACITY}")]
    BadTeamSize(usize),
    /// A mon has zero max HP or no moves
    #[error("invalid mon spec at side {side} slot {slot}")]
    BadMonSpec {
        /// Offending side index
        side: usize,
        /// Offending roster slot
        slot: usize,
    },
}

impl Battle {
    /// Assemble a new battle at turn 0. No mon is on the field yet; both
    /// sides must switch in on the first turn.
    pub fn new(
        id: BattleId,
        player0: PlayerId,
        player1: PlayerId,
        teams: [&[MonSpec]; 2],
        now: u64,
    ) -> Result<Self, RosterError> {
        let mut rosters = [[MonSpec::default(); TEAM_CAPACITY]; 2];
        for (side, team) in teams.iter().enumerate() {
            if team.is_empty() || team.len() > TEAM_CAPACITY {
                return Err(RosterError::BadTeamSize(team.len()));
            }
            for (slot, spec) in team.iter().enumerate() {
                if spec.max_hp == 0
                    || spec.move_count == 0
                    || spec.move_count as usize > MOVES_PER_MON
                {
                    return Err(RosterError::BadMonSpec { side, slot });
                }
                rosters[side][slot] = *spec;
            }
        }

        Ok(Self {
            id,
            data: BattleData {
                turn: 0,
                winner: Winner::Undecided,
                switch_window: SwitchWindow::Both,
                active: [NO_ACTIVE; 2],
                started_at: now,
            },
            config: BattleConfig {
                rosters,
                team_counts: pack_team_counts(teams[0].len() as u8, teams[1].len() as u8),
                mons: [[PackedMon::ZERO; TEAM_CAPACITY]; 2],
                side_effects: [EffectArena::default(), EffectArena::default()],
                global_effects: EffectArena::default(),
            },
            players: [PlayerSlot::new(player0, now), PlayerSlot::new(player1, now)],
        })
    }

    /// Which side a participant plays on, if any.
    pub fn side_of(&self, player: &PlayerId) -> Option<Side> {
        if self.players[0].id == *player {
            Some(Side::Zero)
        } else if self.players[1].id == *player {
            Some(Side::One)
        } else {
            None
        }
    }

    /// The side designated to commit this turn. Turn parity fixes roles:
    /// even turns ⇒ side 0 commits, odd turns ⇒ side 1.
    pub fn committer_side(&self) -> Side {
        if self.data.turn % 2 == 0 {
            Side::Zero
        } else {
            Side::One
        }
    }

    /// The side designated to reveal first this turn.
    pub fn revealer_side(&self) -> Side {
        self.committer_side().opponent()
    }

    /// Team size for a side.
    pub fn team_count(&self, side: Side) -> u8 {
        let (c0, c1) = unpack_team_counts(self.config.team_counts);
        match side {
            Side::Zero => c0,
            Side::One => c1,
        }
    }

    /// Roster entry for a slot on a side.
    pub fn mon_spec(&self, side: Side, slot: u8) -> &MonSpec {
        &self.config.rosters[side.index()][slot as usize]
    }

    /// Packed battle word for a slot on a side.
    pub fn mon(&self, side: Side, slot: u8) -> PackedMon {
        self.config.mons[side.index()][slot as usize]
    }

    /// Mutable packed battle word for a slot on a side.
    pub fn mon_mut(&mut self, side: Side, slot: u8) -> &mut PackedMon {
        &mut self.config.mons[side.index()][slot as usize]
    }

    /// Active slot for a side, if a mon is on the field.
    pub fn active_slot(&self, side: Side) -> Option<u8> {
        let slot = self.data.active[side.index()];
        (slot != NO_ACTIVE).then_some(slot)
    }

    /// Effective speed of a side's active mon (0 when none on field).
    pub fn active_speed(&self, side: Side) -> u16 {
        match self.active_slot(side) {
            Some(slot) => {
                let spec = self.mon_spec(side, slot);
                self.mon(side, slot).effective_stat(Stat::Speed, spec.speed)
            }
            None => 0,
        }
    }

    /// Does a side still have any mon that is not knocked out?
    pub fn has_usable_mon(&self, side: Side) -> bool {
        (0..self.team_count(side)).any(|slot| {
            let spec = self.mon_spec(side, slot);
            !self.mon(side, slot).is_ko(spec.max_hp)
        })
    }

    /// Terminal check: winner decided.
    pub fn is_concluded(&self) -> bool {
        matches!(self.data.winner, Winner::Won(_))
    }

    /// Both sides' decisions recorded for the current turn.
    pub fn both_decided(&self) -> bool {
        self.players[0].pending.is_some() && self.players[1].pending.is_some()
    }

    /// Compact binary snapshot of the full battle record.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Restore a battle from a binary snapshot.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }

    /// Human-readable JSON snapshot for debugging tools.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

// =============================================================================
// EVENTS
// =============================================================================

/// Observable event emitted during turn resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BattleEvent {
    /// A side's move resolved
    MoveUsed {
        /// Acting side
        side: Side,
        /// Move identifier
        move_id: MoveId,
    },
    /// Damage applied to a side's active mon
    Damage {
        /// Damaged side
        side: Side,
        /// HP removed
        amount: u16,
    },
    /// A packed stat delta changed
    StatChange {
        /// Affected side
        side: Side,
        /// Which stat
        stat: Stat,
        /// Signed change applied (pre-saturation)
        change: i8,
    },
    /// A mon switched in
    Switched {
        /// Switching side
        side: Side,
        /// New active roster slot
        slot: u8,
    },
    /// A mon was knocked out
    Knockout {
        /// Side whose mon fainted
        side: Side,
        /// Roster slot of the fainted mon
        slot: u8,
    },
    /// A registered effect hook fired
    EffectFired {
        /// Effect identifier
        effect: EffectId,
    },
    /// An illegal or stale decision degraded to a no-op
    DecisionSkipped {
        /// Skipped side
        side: Side,
    },
    /// A turn fully resolved
    TurnResolved {
        /// New turn id (old + 1)
        turn: u32,
    },
    /// The battle concluded
    BattleEnded {
        /// Winning side
        winner: Side,
    },
}

/// Result of one resolved turn.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnOutcome {
    /// Turn id after resolution (previous + 1)
    pub turn: u32,
    /// Winner indicator after resolution
    pub winner: Winner,
    /// Events in resolution order
    pub events: Vec<BattleEvent>,
}

// =============================================================================
// STORE
// =============================================================================

/// Battle-id-keyed record store.
///
/// Battles are fully independent: no state is shared across ids.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BattleStore {
    battles: BTreeMap<BattleId, Battle>,
}

impl BattleStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a battle. Returns false if the id is already present.
    pub fn insert(&mut self, battle: Battle) -> bool {
        if self.battles.contains_key(&battle.id) {
            return false;
        }
        self.battles.insert(battle.id, battle);
        true
    }

    /// Look up a battle.
    pub fn get(&self, id: &BattleId) -> Option<&Battle> {
        self.battles.get(id)
    }

    /// Look up a battle mutably.
    pub fn get_mut(&mut self, id: &BattleId) -> Option<&mut Battle> {
        self.battles.get_mut(id)
    }

    /// Number of stored battles.
    pub fn len(&self) -> usize {
        self.battles.len()
    }

    /// Is the store empty?
    pub fn is_empty(&self) -> bool {
        self.battles.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::id::derive_battle_id;

    fn test_mon(speed: u8) -> MonSpec {
        MonSpec {
            species: 1,
            max_hp: 100,
            attack: 50,
            defense: 40,
            sp_attack: 50,
            sp_defense: 40,
            speed,
            moves: [MoveId(1), MoveId(2), MoveId(0), MoveId(0)],
            move_count: 2,
        }
    }

    fn make_battle() -> Battle {
        let p0 = PlayerId([1; 32]);
        let p1 = PlayerId([2; 32]);
        let id = derive_battle_id(&p0, &p1, 0);
        let team = [test_mon(50), test_mon(30)];
        Battle::new(id, p0, p1, [&team, &team], 1_000).unwrap()
    }

    #[test]
    fn test_new_battle_starts_empty_field() {
        let battle = make_battle();
        assert_eq!(battle.data.turn, 0);
        assert_eq!(battle.data.winner, Winner::Undecided);
        assert_eq!(battle.active_slot(Side::Zero), None);
        assert_eq!(battle.active_slot(Side::One), None);
        assert_eq!(battle.team_count(Side::Zero), 2);
        assert!(battle.has_usable_mon(Side::Zero));
        assert!(!battle.is_concluded());
    }

    #[test]
    fn test_committer_parity() {
        let mut battle = make_battle();
        assert_eq!(battle.committer_side(), Side::Zero);
        assert_eq!(battle.revealer_side(), Side::One);

        battle.data.turn = 1;
        assert_eq!(battle.committer_side(), Side::One);
        assert_eq!(battle.revealer_side(), Side::Zero);
    }

    #[test]
    fn test_side_of() {
        let battle = make_battle();
        assert_eq!(battle.side_of(&PlayerId([1; 32])), Some(Side::Zero));
        assert_eq!(battle.side_of(&PlayerId([2; 32])), Some(Side::One));
        assert_eq!(battle.side_of(&PlayerId([3; 32])), None);
    }

    #[test]
    fn test_roster_validation() {
        let p0 = PlayerId([1; 32]);
        let p1 = PlayerId([2; 32]);
        let id = derive_battle_id(&p0, &p1, 0);

        let empty: [MonSpec; 0] = [];
        let team = [test_mon(50)];
        assert!(matches!(
            Battle::new(id, p0, p1, [&empty, &team], 0),
            Err(RosterError::BadTeamSize(0))
        ));

        let mut bad = test_mon(50);
        bad.max_hp = 0;
        let bad_team = [bad];
        assert!(matches!(
            Battle::new(id, p0, p1, [&team, &bad_team], 0),
            Err(RosterError::BadMonSpec { side: 1, slot: 0 })
        ));
    }

    #[test]
    fn test_commit_phase_tristate() {
        let phase = CommitPhase::Committed {
            turn: 3,
            hash: [7; 32],
            at: 100,
        };
        assert_eq!(phase.committed_for(3), Some([7; 32]));
        assert_eq!(phase.committed_for(4), None);
        assert!(!phase.revealed_for(3));

        let phase = CommitPhase::Revealed { turn: 3 };
        assert!(phase.revealed_for(3));
        assert!(!phase.revealed_for(2));
        assert_eq!(phase.committed_for(3), None);

        // Turn 0 uses the same comparisons as any other turn
        let phase = CommitPhase::NotCommitted;
        assert_eq!(phase.committed_for(0), None);
        assert!(!phase.revealed_for(0));
    }

    #[test]
    fn test_store_rejects_duplicate_id() {
        let mut store = BattleStore::new();
        let battle = make_battle();
        assert!(store.insert(battle.clone()));
        assert!(!store.insert(battle));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let mut battle = make_battle();
        battle.data.turn = 5;
        battle.data.active = [0, 1];
        battle.mon_mut(Side::Zero, 0).set_hp_delta(-33);

        let bytes = battle.to_bytes().unwrap();
        let restored = Battle::from_bytes(&bytes).unwrap();
        assert_eq!(restored.data.turn, 5);
        assert_eq!(restored.mon(Side::Zero, 0), battle.mon(Side::Zero, 0));

        let json = battle.to_json().unwrap();
        assert!(json.contains("\"turn\": 5"));
    }

    #[test]
    fn test_has_usable_mon_after_kos() {
        let mut battle = make_battle();
        for slot in 0..battle.team_count(Side::One) {
            battle.mon_mut(Side::One, slot).set_hp_delta(i16::MIN);
        }
        assert!(!battle.has_usable_mon(Side::One));
        assert!(battle.has_usable_mon(Side::Zero));
    }
}
