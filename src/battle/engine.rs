//! Deterministic Turn Resolution
//!
//! The pure transform at the heart of the battle: given packed state, two
//! revealed decisions and the derived turn seed, produce the next state.
//!
//! # Determinism
//!
//! This module is 100% deterministic:
//! - All randomness comes from the turn-seeded Xorshift128+ PRNG
//! - Hook dispatch order is fixed (global arena, then side 0, then side 1)
//! - Integer arithmetic only; damage division truncates toward zero
//! - Packed-field writes saturate to their declared widths

use tracing::debug;

use crate::battle::effects::{HookAction, HookContext, HookRegistry, MoveId};
use crate::battle::state::{
    Battle, BattleEvent, CommitPhase, PlayerDecision, Side, SwitchWindow, TurnOutcome, Winner,
};
use crate::battle::validator::DecisionValidator;
use crate::core::rng::DeterministicRng;

/// Resolve the current turn.
///
/// Caller contract: both sides' decisions are recorded and the battle is
/// not concluded. If either precondition fails the battle is untouched and
/// the outcome reports the current turn with no events (matches the
/// `execute` no-op semantics).
///
/// Resolution steps:
/// 1. Seed the PRNG (seed derived from both salts by the caller's oracle).
/// 2. Compute action order: switch > priority tier > effective speed >
///    fixed side order.
/// 3. Each side in order: re-check legality against *current* state, run
///    pre-move hooks, apply the move, run post-move hooks, check knockouts.
/// 4. Round-end hooks: global arena, side 0 arena, side 1 arena.
/// 5. Evaluate the win condition (never on the turn-0 resolution).
/// 6. Increment the turn counter, clear decisions and commitments.
pub fn resolve_turn(
    battle: &mut Battle,
    registry: &HookRegistry,
    validator: &dyn DecisionValidator,
    seed: u64,
) -> TurnOutcome {
    let pending = (battle.players[0].pending, battle.players[1].pending);
    let ((Some(d0), Some(d1)), false) = (pending, battle.is_concluded()) else {
        return TurnOutcome {
            turn: battle.data.turn,
            winner: battle.data.winner,
            events: Vec::new(),
        };
    };

    let entry_turn = battle.data.turn;
    let decisions = [d0, d1];
    let mut rng = DeterministicRng::new(seed);
    let mut events = Vec::new();

    debug!(
        turn = entry_turn,
        battle = %hex::encode(&battle.id[..4]),
        "resolving turn"
    );

    // 2. Action order
    let first = first_actor(battle, registry, &decisions);
    let order = [first, first.opponent()];

    // 3. Actions
    for side in order {
        let decision = decisions[side.index()];

        // Re-check legality: the opponent's action this turn (a switch, a
        // knockout) may have invalidated a previously legal decision.
        if !validator.is_legal_decision(battle, side, &decision) {
            events.push(BattleEvent::DecisionSkipped { side });
            clear_recharge(battle, side);
            continue;
        }

        if decision.is_noop() {
            clear_recharge(battle, side);
            continue;
        }

        if decision.is_switch() {
            apply_switch(battle, side, decision.extra as u8, &mut events);
            continue;
        }

        apply_attack(battle, registry, side, &decision, &mut rng, &mut events);
    }

    // 4. Round-end hooks: global, then side 0, then side 1. Order is
    // observable game semantics — hooks mutate shared state.
    run_round_end(battle, registry, &mut rng, &mut events);

    // Protect lasts a single turn
    for side in [Side::Zero, Side::One] {
        if let Some(slot) = battle.active_slot(side) {
            battle.mon_mut(side, slot).set_protect(false);
        }
    }

    // Recompute the forced-switch window from field state
    battle.data.switch_window = derive_switch_window(battle);

    // 5. Win condition. Never finalized on the turn-0 resolution: the
    // battle cannot end in the same instant it started.
    if entry_turn > 0 {
        if !battle.has_usable_mon(Side::One) {
            conclude(battle, Side::Zero, &mut events);
        } else if !battle.has_usable_mon(Side::Zero) {
            conclude(battle, Side::One, &mut events);
        }
    }

    // 6. Advance the turn, consume decisions and commitments
    battle.data.turn = entry_turn + 1;
    for slot in battle.players.iter_mut() {
        slot.pending = None;
        slot.phase = CommitPhase::NotCommitted;
    }
    events.push(BattleEvent::TurnResolved {
        turn: battle.data.turn,
    });

    TurnOutcome {
        turn: battle.data.turn,
        winner: battle.data.winner,
        events,
    }
}

/// Which side acts first this turn.
///
/// A declared switch always outranks an attack; two switches fall back to
/// fixed side order. Otherwise: higher priority tier, then higher effective
/// speed, then fixed side order.
fn first_actor(battle: &Battle, registry: &HookRegistry, decisions: &[PlayerDecision; 2]) -> Side {
    match (decisions[0].is_switch(), decisions[1].is_switch()) {
        (true, false) => return Side::Zero,
        (false, true) => return Side::One,
        (true, true) => return Side::Zero,
        (false, false) => {}
    }

    let p0 = decision_priority(battle, registry, Side::Zero, &decisions[0]);
    let p1 = decision_priority(battle, registry, Side::One, &decisions[1]);
    if p0 != p1 {
        return if p0 > p1 { Side::Zero } else { Side::One };
    }

    let s0 = battle.active_speed(Side::Zero);
    let s1 = battle.active_speed(Side::One);
    if s0 != s1 {
        return if s0 > s1 { Side::Zero } else { Side::One };
    }

    Side::Zero
}

/// Priority tier of a decision. No-ops and out-of-range indices sit at
/// tier 0; they will be skipped or degraded later anyway.
fn decision_priority(
    battle: &Battle,
    registry: &HookRegistry,
    side: Side,
    decision: &PlayerDecision,
) -> i8 {
    if decision.is_noop() || decision.is_switch() {
        return 0;
    }
    match decision_move_id(battle, side, decision) {
        Some(id) => registry.move_priority(id),
        None => 0,
    }
}

fn decision_move_id(battle: &Battle, side: Side, decision: &PlayerDecision) -> Option<MoveId> {
    let active = battle.active_slot(side)?;
    let spec = battle.mon_spec(side, active);
    if decision.move_index >= spec.move_count {
        return None;
    }
    Some(spec.moves[decision.move_index as usize])
}

fn apply_switch(battle: &mut Battle, side: Side, bench: u8, events: &mut Vec<BattleEvent>) {
    battle.data.active[side.index()] = bench;
    events.push(BattleEvent::Switched { side, slot: bench });
}

fn apply_attack(
    battle: &mut Battle,
    registry: &HookRegistry,
    side: Side,
    decision: &PlayerDecision,
    rng: &mut DeterministicRng,
    events: &mut Vec<BattleEvent>,
) {
    let Some(move_id) = decision_move_id(battle, side, decision) else {
        events.push(BattleEvent::DecisionSkipped { side });
        return;
    };
    let Some(handler) = registry.move_handler(move_id) else {
        // Unregistered move: degrade, never abort
        events.push(BattleEvent::DecisionSkipped { side });
        return;
    };

    run_move_hooks(battle, registry, side, rng, events, HookPoint::PreMove);

    events.push(BattleEvent::MoveUsed { side, move_id });
    let mut ctx = HookContext {
        battle,
        rng,
        events,
    };
    handler.apply(side, &mut ctx);

    run_move_hooks(battle, registry, side, rng, events, HookPoint::PostMove);
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum HookPoint {
    PreMove,
    PostMove,
}

/// Run the acting side's arena hooks for one fixed point.
fn run_move_hooks(
    battle: &mut Battle,
    registry: &HookRegistry,
    acting: Side,
    rng: &mut DeterministicRng,
    events: &mut Vec<BattleEvent>,
    point: HookPoint,
) {
    for index in 0..crate::EFFECT_CAPACITY {
        let Some(mut instance) = battle.config.side_effects[acting.index()].slot(index) else {
            continue;
        };
        let Some(hook) = registry.effect_hook(instance.effect) else {
            // Orphaned instance (hook no longer registered): drop it
            battle.config.side_effects[acting.index()].remove(index);
            continue;
        };

        let action = {
            let mut ctx = HookContext {
                battle,
                rng,
                events,
            };
            match point {
                HookPoint::PreMove => hook.on_pre_move(&mut instance, acting, &mut ctx),
                HookPoint::PostMove => hook.on_post_move(&mut instance, acting, &mut ctx),
            }
        };
        match action {
            HookAction::Keep => battle.config.side_effects[acting.index()].update(index, instance),
            HookAction::Remove => battle.config.side_effects[acting.index()].remove(index),
        }
    }
}

/// Round-end dispatch in the documented order: global arena, side 0, side 1.
fn run_round_end(
    battle: &mut Battle,
    registry: &HookRegistry,
    rng: &mut DeterministicRng,
    events: &mut Vec<BattleEvent>,
) {
    // Global arena
    for index in 0..crate::EFFECT_CAPACITY {
        let Some(mut instance) = battle.config.global_effects.slot(index) else {
            continue;
        };
        let Some(hook) = registry.effect_hook(instance.effect) else {
            battle.config.global_effects.remove(index);
            continue;
        };
        let action = {
            let mut ctx = HookContext {
                battle,
                rng,
                events,
            };
            hook.on_round_end(&mut instance, None, &mut ctx)
        };
        match action {
            HookAction::Keep => battle.config.global_effects.update(index, instance),
            HookAction::Remove => battle.config.global_effects.remove(index),
        }
    }

    // Side arenas in fixed side order
    for side in [Side::Zero, Side::One] {
        for index in 0..crate::EFFECT_CAPACITY {
            let Some(mut instance) = battle.config.side_effects[side.index()].slot(index) else {
                continue;
            };
            let Some(hook) = registry.effect_hook(instance.effect) else {
                battle.config.side_effects[side.index()].remove(index);
                continue;
            };
            let action = {
                let mut ctx = HookContext {
                    battle,
                    rng,
                    events,
                };
                hook.on_round_end(&mut instance, Some(side), &mut ctx)
            };
            match action {
                HookAction::Keep => battle.config.side_effects[side.index()].update(index, instance),
                HookAction::Remove => battle.config.side_effects[side.index()].remove(index),
            }
        }
    }
}

/// Forced-switch window derived from field state: exactly one side with a
/// knocked-out active mon owes a replacement. Both (or neither) knocked
/// out falls back to a normal turn, where legality rules already force
/// both sides to switch.
fn derive_switch_window(battle: &Battle) -> SwitchWindow {
    let ko = |side: Side| -> bool {
        match battle.active_slot(side) {
            Some(slot) => {
                let spec = battle.mon_spec(side, slot);
                battle.mon(side, slot).is_ko(spec.max_hp)
            }
            None => false,
        }
    };

    match (ko(Side::Zero), ko(Side::One)) {
        (true, false) => SwitchWindow::Only(Side::Zero),
        (false, true) => SwitchWindow::Only(Side::One),
        _ => SwitchWindow::Both,
    }
}

/// A voluntary or degraded pass consumes the recharge flag.
fn clear_recharge(battle: &mut Battle, side: Side) {
    if let Some(slot) = battle.active_slot(side) {
        let mon = battle.mon_mut(side, slot);
        if mon.recharge() {
            mon.set_recharge(false);
        }
    }
}

fn conclude(battle: &mut Battle, winner: Side, events: &mut Vec<BattleEvent>) {
    battle.data.winner = Winner::Won(winner);
    events.push(BattleEvent::BattleEnded { winner });
    debug!(
        battle = %hex::encode(&battle.id[..4]),
        winner = ?winner,
        "battle concluded"
    );
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::effects::{ChipEffect, EffectId, EffectInstance, Strike};
    use crate::battle::id::derive_battle_id;
    use crate::battle::state::{MonSpec, PlayerId, MOVE_NONE, MOVE_SWITCH};
    use crate::battle::validator::DefaultValidator;

    const TACKLE: MoveId = MoveId(1);
    const QUICK_JAB: MoveId = MoveId(2);
    const CHIP: EffectId = EffectId(10);

    fn registry() -> HookRegistry {
        let mut r = HookRegistry::new();
        r.register_move(
            TACKLE,
            Box::new(Strike {
                power: 200,
                priority: 0,
                special: false,
            }),
        );
        r.register_move(
            QUICK_JAB,
            Box::new(Strike {
                power: 20,
                priority: 1,
                special: false,
            }),
        );
        r
    }

    fn mon(speed: u8, max_hp: u16) -> MonSpec {
        MonSpec {
            species: 1,
            max_hp,
            attack: 50,
            defense: 40,
            sp_attack: 50,
            sp_defense: 40,
            speed,
            moves: [TACKLE, QUICK_JAB, MoveId(0), MoveId(0)],
            move_count: 2,
        }
    }

    fn battle_with(team0: &[MonSpec], team1: &[MonSpec]) -> Battle {
        let p0 = PlayerId([1; 32]);
        let p1 = PlayerId([2; 32]);
        let id = derive_battle_id(&p0, &p1, 0);
        Battle::new(id, p0, p1, [team0, team1], 1_000).unwrap()
    }

    fn decide(battle: &mut Battle, side: Side, move_index: u8, extra: u64) {
        battle.players[side.index()].pending = Some(PlayerDecision {
            move_index,
            extra,
            salt: [side.index() as u8; 32],
        });
    }

    fn run(battle: &mut Battle, registry: &HookRegistry, seed: u64) -> TurnOutcome {
        resolve_turn(battle, registry, &DefaultValidator, seed)
    }

    /// Turn 0 with both sides switching in, leaving the battle at turn 1.
    fn open_battle(team0: &[MonSpec], team1: &[MonSpec], registry: &HookRegistry) -> Battle {
        let mut battle = battle_with(team0, team1);
        decide(&mut battle, Side::Zero, MOVE_SWITCH, 0);
        decide(&mut battle, Side::One, MOVE_SWITCH, 0);
        let outcome = run(&mut battle, registry, 1);
        assert_eq!(outcome.turn, 1);
        battle
    }

    #[test]
    fn test_noop_when_not_fully_decided() {
        let registry = registry();
        let team = [mon(50, 100)];
        let mut battle = battle_with(&team, &team);
        decide(&mut battle, Side::Zero, MOVE_SWITCH, 0);

        let outcome = run(&mut battle, &registry, 1);
        assert_eq!(outcome.turn, 0);
        assert!(outcome.events.is_empty());
        assert_eq!(battle.data.turn, 0);
        assert!(battle.players[0].pending.is_some());
    }

    #[test]
    fn test_turn0_double_switch() {
        let registry = registry();
        let team = [mon(50, 100), mon(30, 100)];
        let battle = open_battle(&team, &team, &registry);

        assert_eq!(battle.data.turn, 1);
        assert_eq!(battle.active_slot(Side::Zero), Some(0));
        assert_eq!(battle.active_slot(Side::One), Some(0));
        assert_eq!(battle.data.winner, Winner::Undecided);
        // Decisions and commitments consumed
        assert!(battle.players[0].pending.is_none());
        assert!(battle.players[1].pending.is_none());
    }

    #[test]
    fn test_turn0_attack_degrades_to_noop() {
        let registry = registry();
        let team = [mon(50, 100)];
        let mut battle = battle_with(&team, &team);
        decide(&mut battle, Side::Zero, 0, 0); // attack with nothing on field
        decide(&mut battle, Side::One, MOVE_SWITCH, 0);

        let outcome = run(&mut battle, &registry, 1);
        assert!(outcome
            .events
            .contains(&BattleEvent::DecisionSkipped { side: Side::Zero }));
        assert_eq!(battle.active_slot(Side::Zero), None);
        assert_eq!(battle.active_slot(Side::One), Some(0));
        assert_eq!(battle.data.turn, 1);
    }

    #[test]
    fn test_faster_side_acts_first() {
        let registry = registry();
        let fast = [mon(100, 100)];
        let slow = [mon(10, 100)];
        let mut battle = open_battle(&fast, &slow, &registry);

        decide(&mut battle, Side::Zero, 0, 0);
        decide(&mut battle, Side::One, 0, 0);
        let outcome = run(&mut battle, &registry, 42);

        let first_move = outcome
            .events
            .iter()
            .find_map(|e| match e {
                BattleEvent::MoveUsed { side, .. } => Some(*side),
                _ => None,
            })
            .unwrap();
        assert_eq!(first_move, Side::Zero);
    }

    #[test]
    fn test_priority_tier_beats_speed() {
        let registry = registry();
        let fast = [mon(100, 100)];
        let slow = [mon(10, 100)];
        let mut battle = open_battle(&fast, &slow, &registry);

        decide(&mut battle, Side::Zero, 0, 0); // tier 0, speed 100
        decide(&mut battle, Side::One, 1, 0); // tier 1, speed 10
        let outcome = run(&mut battle, &registry, 42);

        let first_move = outcome
            .events
            .iter()
            .find_map(|e| match e {
                BattleEvent::MoveUsed { side, .. } => Some(*side),
                _ => None,
            })
            .unwrap();
        assert_eq!(first_move, Side::One);
    }

    #[test]
    fn test_speed_tie_breaks_by_side_order() {
        let registry = registry();
        let team = [mon(55, 1000)];
        let mut battle = open_battle(&team, &team, &registry);

        decide(&mut battle, Side::Zero, 0, 0);
        decide(&mut battle, Side::One, 0, 0);
        let outcome = run(&mut battle, &registry, 42);

        let first_move = outcome
            .events
            .iter()
            .find_map(|e| match e {
                BattleEvent::MoveUsed { side, .. } => Some(*side),
                _ => None,
            })
            .unwrap();
        assert_eq!(first_move, Side::Zero);
    }

    #[test]
    fn test_switch_outranks_attack() {
        let registry = registry();
        let slow = [mon(10, 100), mon(20, 100)];
        let fast = [mon(100, 100)];
        let mut battle = open_battle(&slow, &fast, &registry);

        decide(&mut battle, Side::Zero, MOVE_SWITCH, 1);
        decide(&mut battle, Side::One, 0, 0);
        let outcome = run(&mut battle, &registry, 42);

        // The slow side's switch resolves before the fast side's attack,
        // so the attack lands on the replacement
        let switch_pos = outcome
            .events
            .iter()
            .position(|e| matches!(e, BattleEvent::Switched { side: Side::Zero, .. }))
            .unwrap();
        let move_pos = outcome
            .events
            .iter()
            .position(|e| matches!(e, BattleEvent::MoveUsed { side: Side::One, .. }))
            .unwrap();
        assert!(switch_pos < move_pos);
        assert_eq!(battle.active_slot(Side::Zero), Some(1));
        assert!(battle.mon(Side::Zero, 1).hp_delta() < 0);
        assert_eq!(battle.mon(Side::Zero, 0).hp_delta(), 0);
    }

    #[test]
    fn test_ko_truncates_victims_attack_and_opens_window() {
        let registry = registry();
        let strong = [mon(100, 1000)];
        let weak = [mon(10, 5), mon(10, 100)];
        let mut battle = open_battle(&strong, &weak, &registry);

        decide(&mut battle, Side::Zero, 0, 0); // 200-power tackle, kills
        decide(&mut battle, Side::One, 0, 0);
        let outcome = run(&mut battle, &registry, 42);

        // Victim's mon fainted before it acted; its attack was skipped
        assert!(outcome
            .events
            .contains(&BattleEvent::Knockout { side: Side::One, slot: 0 }));
        assert!(outcome
            .events
            .contains(&BattleEvent::DecisionSkipped { side: Side::One }));
        assert_eq!(battle.data.switch_window, SwitchWindow::Only(Side::One));
        // One usable mon left: no winner yet
        assert_eq!(battle.data.winner, Winner::Undecided);
    }

    #[test]
    fn test_forced_switch_turn_resolves_window() {
        let registry = registry();
        let strong = [mon(100, 1000)];
        let weak = [mon(10, 5), mon(10, 100)];
        let mut battle = open_battle(&strong, &weak, &registry);

        decide(&mut battle, Side::Zero, 0, 0);
        decide(&mut battle, Side::One, 0, 0);
        run(&mut battle, &registry, 42);
        assert_eq!(battle.data.switch_window, SwitchWindow::Only(Side::One));

        // Forced-switch turn: victim switches, other side passes
        decide(&mut battle, Side::Zero, MOVE_NONE, 0);
        decide(&mut battle, Side::One, MOVE_SWITCH, 1);
        run(&mut battle, &registry, 43);

        assert_eq!(battle.data.switch_window, SwitchWindow::Both);
        assert_eq!(battle.active_slot(Side::One), Some(1));
    }

    #[test]
    fn test_last_mon_ko_concludes_battle() {
        let registry = registry();
        let strong = [mon(100, 1000)];
        let weak = [mon(10, 5)];
        let mut battle = open_battle(&strong, &weak, &registry);

        decide(&mut battle, Side::Zero, 0, 0);
        decide(&mut battle, Side::One, 0, 0);
        let outcome = run(&mut battle, &registry, 42);

        assert_eq!(battle.data.winner, Winner::Won(Side::Zero));
        assert_eq!(outcome.winner, Winner::Won(Side::Zero));
        assert!(outcome
            .events
            .contains(&BattleEvent::BattleEnded { winner: Side::Zero }));
    }

    #[test]
    fn test_round_end_chip_effect_fires_and_expires() {
        let mut registry = registry();
        registry.register_effect(CHIP, Box::new(ChipEffect { per_round: 10 }));

        let team = [mon(50, 100)];
        let mut battle = open_battle(&team, &team, &registry);

        // Two rounds of chip on side 1
        battle.config.side_effects[1].insert(EffectInstance {
            effect: CHIP,
            data: 2,
        });

        decide(&mut battle, Side::Zero, MOVE_NONE, 0);
        decide(&mut battle, Side::One, MOVE_NONE, 0);
        run(&mut battle, &registry, 7);
        assert_eq!(battle.mon(Side::One, 0).hp_delta(), -10);
        assert_eq!(battle.config.side_effects[1].count(), 1);

        decide(&mut battle, Side::Zero, MOVE_NONE, 0);
        decide(&mut battle, Side::One, MOVE_NONE, 0);
        run(&mut battle, &registry, 8);
        assert_eq!(battle.mon(Side::One, 0).hp_delta(), -20);
        // Budget spent: instance removed
        assert_eq!(battle.config.side_effects[1].count(), 0);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let registry = registry();
        let team = [mon(50, 100), mon(30, 80)];

        let run_one = || {
            let mut battle = open_battle(&team, &team, &registry);
            decide(&mut battle, Side::Zero, 0, 0);
            decide(&mut battle, Side::One, 1, 0);
            let outcome = run(&mut battle, &registry, 12345);
            (battle.config.mons, outcome.events)
        };

        let (mons1, events1) = run_one();
        let (mons2, events2) = run_one();
        assert_eq!(mons1, mons2);
        assert_eq!(events1, events2);
    }

    #[test]
    fn test_different_seeds_change_damage_roll() {
        let registry = registry();
        let team = [mon(50, 10_000)];

        let damage_with_seed = |seed: u64| {
            let mut battle = open_battle(&team, &team, &registry);
            decide(&mut battle, Side::Zero, 0, 0);
            decide(&mut battle, Side::One, MOVE_NONE, 0);
            run(&mut battle, &registry, seed);
            battle.mon(Side::One, 0).hp_delta()
        };

        // 16 variance buckets: at least one differing seed among a handful
        let base = damage_with_seed(0);
        assert!((1..20).any(|s| damage_with_seed(s) != base));
    }

    #[test]
    fn test_concluded_battle_is_inert() {
        let registry = registry();
        let team = [mon(50, 100)];
        let mut battle = open_battle(&team, &team, &registry);
        battle.data.winner = Winner::Won(Side::Zero);

        decide(&mut battle, Side::Zero, 0, 0);
        decide(&mut battle, Side::One, 0, 0);
        let outcome = run(&mut battle, &registry, 1);
        assert!(outcome.events.is_empty());
        assert_eq!(battle.data.turn, 1);
    }
}
