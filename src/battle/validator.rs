//! Decision Legality and Timeout Checks
//!
//! The validator is a pluggable, read-only seam: the engine asks it whether
//! a revealed decision is legal and the protocol asks it whether a side has
//! exceeded its deadline. When no external validator is installed the
//! engine-internal [`DefaultValidator`] applies the same rules.
//!
//! Legality is semantic, not structural: an illegal decision degrades to a
//! no-op for that side only and never aborts the call.

use crate::battle::state::{Battle, PlayerDecision, Side, SwitchWindow};
use crate::TURN_DEADLINE_SECS;

/// Legality and liveness oracle for submitted decisions.
///
/// Implementations must be pure/read-only with respect to battle state:
/// the engine's determinism depends on it.
pub trait DecisionValidator: Send + Sync {
    /// Is this decision legal for `side` against the battle's current state?
    fn is_legal_decision(&self, battle: &Battle, side: Side, decision: &PlayerDecision) -> bool;

    /// Has `side` exceeded its deadline for the current turn?
    /// On-demand check only; there is no background timer.
    fn timed_out(&self, battle: &Battle, side: Side, now: u64) -> bool;
}

/// Engine-internal fallback validator.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultValidator;

impl DecisionValidator for DefaultValidator {
    fn is_legal_decision(&self, battle: &Battle, side: Side, decision: &PlayerDecision) -> bool {
        default_is_legal(battle, side, decision)
    }

    fn timed_out(&self, battle: &Battle, side: Side, now: u64) -> bool {
        default_timed_out(battle, side, now)
    }
}

/// Baseline legality rules, shared with custom validators that want to
/// delegate.
pub fn default_is_legal(battle: &Battle, side: Side, decision: &PlayerDecision) -> bool {
    if battle.is_concluded() {
        return false;
    }

    // A forced-switch window restricts both sides: the owing side must
    // switch, the other side may only pass.
    match battle.data.switch_window {
        SwitchWindow::Only(owing) if owing == side => {
            return decision.is_switch() && is_valid_switch_target(battle, side, decision.extra);
        }
        SwitchWindow::Only(_) => return decision.is_noop(),
        SwitchWindow::Both => {}
    }

    if decision.is_noop() {
        return true;
    }
    if decision.is_switch() {
        return is_valid_switch_target(battle, side, decision.extra);
    }

    // Attack: needs a mon on the field (rules out turn 0), a ready mon,
    // and an in-range move slot.
    let Some(active) = battle.active_slot(side) else {
        return false;
    };
    let spec = battle.mon_spec(side, active);
    let word = battle.mon(side, active);
    if word.is_ko(spec.max_hp) || word.recharge() {
        return false;
    }
    decision.move_index < spec.move_count
}

/// Baseline timeout rule: the side has not revealed this turn and its last
/// protocol action is older than [`TURN_DEADLINE_SECS`].
pub fn default_timed_out(battle: &Battle, side: Side, now: u64) -> bool {
    if battle.is_concluded() {
        return false;
    }
    let slot = &battle.players[side.index()];
    if slot.pending.is_some() {
        return false;
    }
    let last = slot.last_action_at.max(battle.data.started_at);
    now.saturating_sub(last) > TURN_DEADLINE_SECS
}

fn is_valid_switch_target(battle: &Battle, side: Side, bench: u64) -> bool {
    if bench >= battle.team_count(side) as u64 {
        return false;
    }
    let bench = bench as u8;
    // Switching into the mon already on the field is illegal
    if battle.active_slot(side) == Some(bench) {
        return false;
    }
    let spec = battle.mon_spec(side, bench);
    !battle.mon(side, bench).is_ko(spec.max_hp)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::effects::MoveId;
    use crate::battle::id::derive_battle_id;
    use crate::battle::state::{MonSpec, PlayerId, MOVE_NONE, MOVE_SWITCH};

    fn test_mon() -> MonSpec {
        MonSpec {
            species: 1,
            max_hp: 100,
            attack: 50,
            defense: 40,
            sp_attack: 50,
            sp_defense: 40,
            speed: 60,
            moves: [MoveId(1), MoveId(2), MoveId(0), MoveId(0)],
            move_count: 2,
        }
    }

    fn make_battle() -> Battle {
        let p0 = PlayerId([1; 32]);
        let p1 = PlayerId([2; 32]);
        let id = derive_battle_id(&p0, &p1, 0);
        let team = [test_mon(), test_mon()];
        Battle::new(id, p0, p1, [&team, &team], 1_000).unwrap()
    }

    fn decision(move_index: u8, extra: u64) -> PlayerDecision {
        PlayerDecision {
            move_index,
            extra,
            salt: [0; 32],
        }
    }

    #[test]
    fn test_turn0_attack_illegal_switch_legal() {
        let battle = make_battle();

        // No mon on the field yet: attacks are illegal, switches are not
        assert!(!default_is_legal(&battle, Side::Zero, &decision(0, 0)));
        assert!(default_is_legal(&battle, Side::Zero, &decision(MOVE_SWITCH, 0)));
        assert!(default_is_legal(&battle, Side::Zero, &decision(MOVE_NONE, 0)));
    }

    #[test]
    fn test_switch_into_active_mon_illegal() {
        let mut battle = make_battle();
        battle.data.active[0] = 0;

        assert!(!default_is_legal(&battle, Side::Zero, &decision(MOVE_SWITCH, 0)));
        assert!(default_is_legal(&battle, Side::Zero, &decision(MOVE_SWITCH, 1)));
    }

    #[test]
    fn test_switch_out_of_range_or_ko_illegal() {
        let mut battle = make_battle();
        battle.data.active[0] = 0;

        assert!(!default_is_legal(&battle, Side::Zero, &decision(MOVE_SWITCH, 5)));

        battle.mon_mut(Side::Zero, 1).set_hp_delta(i16::MIN);
        assert!(!default_is_legal(&battle, Side::Zero, &decision(MOVE_SWITCH, 1)));
    }

    #[test]
    fn test_move_index_bounds() {
        let mut battle = make_battle();
        battle.data.active[0] = 0;

        assert!(default_is_legal(&battle, Side::Zero, &decision(0, 0)));
        assert!(default_is_legal(&battle, Side::Zero, &decision(1, 0)));
        // This mon only knows two moves
        assert!(!default_is_legal(&battle, Side::Zero, &decision(2, 0)));
    }

    #[test]
    fn test_recharging_mon_cannot_attack() {
        let mut battle = make_battle();
        battle.data.active[0] = 0;
        battle.mon_mut(Side::Zero, 0).set_recharge(true);

        assert!(!default_is_legal(&battle, Side::Zero, &decision(0, 0)));
        assert!(default_is_legal(&battle, Side::Zero, &decision(MOVE_NONE, 0)));
    }

    #[test]
    fn test_forced_switch_window() {
        let mut battle = make_battle();
        battle.data.active[0] = 0;
        battle.data.active[1] = 0;
        battle.data.switch_window = SwitchWindow::Only(Side::Zero);

        // Owing side must switch
        assert!(default_is_legal(&battle, Side::Zero, &decision(MOVE_SWITCH, 1)));
        assert!(!default_is_legal(&battle, Side::Zero, &decision(0, 0)));
        assert!(!default_is_legal(&battle, Side::Zero, &decision(MOVE_NONE, 0)));

        // Other side may only pass
        assert!(default_is_legal(&battle, Side::One, &decision(MOVE_NONE, 0)));
        assert!(!default_is_legal(&battle, Side::One, &decision(0, 0)));
        assert!(!default_is_legal(&battle, Side::One, &decision(MOVE_SWITCH, 1)));
    }

    #[test]
    fn test_timeout_boundaries() {
        let battle = make_battle();

        // Created at t=1000, deadline 300s
        assert!(!default_timed_out(&battle, Side::Zero, 1_000));
        assert!(!default_timed_out(&battle, Side::Zero, 1_300));
        assert!(default_timed_out(&battle, Side::Zero, 1_301));
    }

    #[test]
    fn test_no_timeout_once_revealed() {
        let mut battle = make_battle();
        battle.players[0].pending = Some(decision(MOVE_NONE, 0));

        assert!(!default_timed_out(&battle, Side::Zero, 10_000));
        assert!(default_timed_out(&battle, Side::One, 10_000));
    }
}
