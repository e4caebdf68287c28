//! Move and Effect Hook Dispatch
//!
//! The move/ability/effect catalog lives outside this crate. The engine
//! only knows two trait seams — [`MoveHandler`] for a decision's core
//! effect and [`EffectHook`] for persistent effects — and invokes them at
//! fixed points through a [`HookRegistry`] keyed by stable identifiers.
//!
//! Persistent effect instances live in fixed-capacity arenas with an
//! explicit occupancy count; a full arena rejects inserts instead of
//! growing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::battle::state::{Battle, BattleEvent, Side};
use crate::core::pack::Stat;
use crate::core::rng::DeterministicRng;
use crate::EFFECT_CAPACITY;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Stable move identifier (registry key).
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct MoveId(pub u16);

/// Stable effect identifier (registry key).
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct EffectId(pub u16);

/// One live effect: registry key plus opaque instance data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectInstance {
    /// Which registered hook implementation drives this instance
    pub effect: EffectId,
    /// Opaque per-instance data (counters, strength, ...)
    pub data: u64,
}

// =============================================================================
// EFFECT ARENA
// =============================================================================

/// Fixed-capacity effect-instance arena with explicit occupancy count.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectArena {
    slots: [Option<EffectInstance>; EFFECT_CAPACITY],
    count: u8,
}

impl EffectArena {
    /// Insert an instance into the first free slot.
    /// Returns false when the arena is full (never grows).
    pub fn insert(&mut self, instance: EffectInstance) -> bool {
        for slot in self.slots.iter_mut() {
            if slot.is_none() {
                *slot = Some(instance);
                self.count += 1;
                return true;
            }
        }
        false
    }

    /// Read a slot by index.
    pub fn slot(&self, index: usize) -> Option<EffectInstance> {
        self.slots.get(index).copied().flatten()
    }

    /// Overwrite an occupied slot (instance data updated by a hook).
    pub fn update(&mut self, index: usize, instance: EffectInstance) {
        if let Some(slot) = self.slots.get_mut(index) {
            if slot.is_some() {
                *slot = Some(instance);
            }
        }
    }

    /// Clear a slot.
    pub fn remove(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            if slot.take().is_some() {
                self.count -= 1;
            }
        }
    }

    /// Occupied slot count.
    pub fn count(&self) -> u8 {
        self.count
    }

    /// Is the arena at capacity?
    pub fn is_full(&self) -> bool {
        self.count as usize == EFFECT_CAPACITY
    }
}

// =============================================================================
// HOOK CONTEXT
// =============================================================================

/// Mutable view handed to move and effect hooks.
///
/// Hooks mutate battle state only through this context, which keeps the
/// event log consistent with what actually happened.
pub struct HookContext<'a> {
    /// The battle under resolution
    pub battle: &'a mut Battle,
    /// Turn-seeded PRNG
    pub rng: &'a mut DeterministicRng,
    /// Resolution event log
    pub events: &'a mut Vec<BattleEvent>,
}

impl HookContext<'_> {
    /// Deal damage to a side's active mon. Respects the protect flag and
    /// emits `Damage` / `Knockout` events. Returns HP actually removed.
    pub fn deal_damage(&mut self, target: Side, amount: u16) -> u16 {
        let Some(slot) = self.battle.active_slot(target) else {
            return 0;
        };
        let word = self.battle.mon(target, slot);
        if word.protect() {
            return 0;
        }

        let max_hp = self.battle.mon_spec(target, slot).max_hp;
        let before = word.current_hp(max_hp);
        let dealt = amount.min(before);

        let mon = self.battle.mon_mut(target, slot);
        mon.apply_hp_delta(-(dealt as i32));

        self.events.push(BattleEvent::Damage {
            side: target,
            amount: dealt,
        });
        if self.battle.mon(target, slot).is_ko(max_hp) {
            self.events.push(BattleEvent::Knockout { side: target, slot });
        }
        dealt
    }

    /// Apply a saturating stat-stage change to a side's active mon.
    pub fn boost(&mut self, target: Side, stat: Stat, change: i8) {
        let Some(slot) = self.battle.active_slot(target) else {
            return;
        };
        self.battle.mon_mut(target, slot).apply_stat_delta(stat, change);
        self.events.push(BattleEvent::StatChange {
            side: target,
            stat,
            change,
        });
    }

    /// Standard damage roll: `power * attack / defense`, truncating toward
    /// zero, then an 85–100% seed-driven variance, floor 1.
    pub fn damage_roll(&mut self, user: Side, target: Side, power: u8, special: bool) -> u16 {
        let (Some(user_slot), Some(target_slot)) =
            (self.battle.active_slot(user), self.battle.active_slot(target))
        else {
            return 0;
        };

        let (atk_stat, def_stat) = if special {
            (Stat::SpAttack, Stat::SpDefense)
        } else {
            (Stat::Attack, Stat::Defense)
        };

        let user_spec = self.battle.mon_spec(user, user_slot);
        let atk_base = if special { user_spec.sp_attack } else { user_spec.attack };
        let atk = self.battle.mon(user, user_slot).effective_stat(atk_stat, atk_base);

        let target_spec = self.battle.mon_spec(target, target_slot);
        let def_base = if special { target_spec.sp_defense } else { target_spec.defense };
        let def = self.battle.mon(target, target_slot).effective_stat(def_stat, def_base);

        // i32 division truncates toward zero
        let raw = (power as i32 * atk as i32) / def as i32;
        let variance = 85 + self.rng.next_int(16) as i32;
        let rolled = (raw * variance) / 100;
        rolled.clamp(1, u16::MAX as i32) as u16
    }

    /// Attach a persistent effect to a side's arena.
    /// Returns false when the arena is full (semantic no-op).
    pub fn add_side_effect(&mut self, side: Side, instance: EffectInstance) -> bool {
        self.battle.config.side_effects[side.index()].insert(instance)
    }

    /// Attach a persistent effect to the global arena.
    pub fn add_global_effect(&mut self, instance: EffectInstance) -> bool {
        self.battle.config.global_effects.insert(instance)
    }
}

// =============================================================================
// TRAITS
// =============================================================================

/// What a hook wants done with its instance after firing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookAction {
    /// Keep the (possibly updated) instance
    Keep,
    /// Remove the instance from its arena
    Remove,
}

/// Core effect of one decided move.
pub trait MoveHandler: Send + Sync {
    /// Priority tier; higher tiers act before lower ones regardless of speed.
    fn priority(&self) -> i8 {
        0
    }

    /// Apply the move. `user` is the acting side.
    fn apply(&self, user: Side, ctx: &mut HookContext<'_>);
}

/// Persistent effect invoked at the engine's fixed hook points.
///
/// Instances are passed by value (they are one id + one word); the engine
/// writes the updated instance back or drops it per the returned action.
pub trait EffectHook: Send + Sync {
    /// Before the owning side's move resolves.
    fn on_pre_move(
        &self,
        instance: &mut EffectInstance,
        acting: Side,
        ctx: &mut HookContext<'_>,
    ) -> HookAction {
        let _ = (instance, acting, ctx);
        HookAction::Keep
    }

    /// After the owning side's move resolved.
    fn on_post_move(
        &self,
        instance: &mut EffectInstance,
        acting: Side,
        ctx: &mut HookContext<'_>,
    ) -> HookAction {
        let _ = (instance, acting, ctx);
        HookAction::Keep
    }

    /// At round end. `owner` is None for global-arena instances.
    fn on_round_end(
        &self,
        instance: &mut EffectInstance,
        owner: Option<Side>,
        ctx: &mut HookContext<'_>,
    ) -> HookAction {
        let _ = (instance, owner, ctx);
        HookAction::Keep
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Registry of move and effect implementations keyed by stable identifier.
#[derive(Default)]
pub struct HookRegistry {
    moves: BTreeMap<MoveId, Box<dyn MoveHandler>>,
    effects: BTreeMap<EffectId, Box<dyn EffectHook>>,
}

impl HookRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a move handler.
    pub fn register_move(&mut self, id: MoveId, handler: Box<dyn MoveHandler>) {
        self.moves.insert(id, handler);
    }

    /// Register an effect hook.
    pub fn register_effect(&mut self, id: EffectId, hook: Box<dyn EffectHook>) {
        self.effects.insert(id, hook);
    }

    /// Look up a move handler.
    pub fn move_handler(&self, id: MoveId) -> Option<&dyn MoveHandler> {
        self.moves.get(&id).map(|h| h.as_ref())
    }

    /// Look up an effect hook.
    pub fn effect_hook(&self, id: EffectId) -> Option<&dyn EffectHook> {
        self.effects.get(&id).map(|h| h.as_ref())
    }

    /// Priority tier of a move (unregistered moves sort at tier 0).
    pub fn move_priority(&self, id: MoveId) -> i8 {
        self.moves.get(&id).map(|h| h.priority()).unwrap_or(0)
    }
}

// =============================================================================
// REFERENCE HANDLERS
// =============================================================================

/// Plain damaging move: the minimum viable [`MoveHandler`].
///
/// The real catalog lives outside this crate; this and [`ChipEffect`] exist
/// so the engine's hook points can be exercised without it.
pub struct Strike {
    /// Base power
    pub power: u8,
    /// Priority tier
    pub priority: i8,
    /// Use the special attack/defense pair
    pub special: bool,
}

impl MoveHandler for Strike {
    fn priority(&self) -> i8 {
        self.priority
    }

    fn apply(&self, user: Side, ctx: &mut HookContext<'_>) {
        let target = user.opponent();
        let amount = ctx.damage_roll(user, target, self.power, self.special);
        ctx.deal_damage(target, amount);
    }
}

/// Round-end chip damage with a turn budget in the instance data word.
pub struct ChipEffect {
    /// HP removed from the owner each round
    pub per_round: u16,
}

impl EffectHook for ChipEffect {
    fn on_round_end(
        &self,
        instance: &mut EffectInstance,
        owner: Option<Side>,
        ctx: &mut HookContext<'_>,
    ) -> HookAction {
        let Some(side) = owner else {
            return HookAction::Remove;
        };
        ctx.deal_damage(side, self.per_round);
        ctx.events.push(BattleEvent::EffectFired {
            effect: instance.effect,
        });

        // data word counts remaining rounds
        if instance.data <= 1 {
            HookAction::Remove
        } else {
            instance.data -= 1;
            HookAction::Keep
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
