//! Move-Submission Protocol
//!
//! The [`Arena`] owns the battle store and the pluggable seams (hook
//! registry, validator, randomness oracle) and exposes the protocol
//! operations: `create_battle`, `commit`, `reveal`, the signed-commitment
//! fast path, `execute` and `claim_timeout`.
//!
//! Every operation is atomic: it completes in full or fails in full with
//! no partial mutation surviving. Calls against different battle ids are
//! fully independent.

pub mod commit;
pub mod error;
pub mod signed;

pub use error::ProtocolError;
pub use signed::{sign_commitment, SignedCommitment};

use crate::battle::effects::HookRegistry;
use crate::battle::id::{derive_battle_id, BattleId};
use crate::battle::state::{
    Battle, BattleStore, MonSpec, PlayerId, Side, TurnOutcome, Winner,
};
use crate::battle::validator::{DecisionValidator, DefaultValidator};
use crate::core::pack::PackedMon;
use crate::core::rng::{HashSeedOracle, RandomnessOracle};

use tracing::info;

/// Protocol orchestrator: battle store plus the external seams.
pub struct Arena {
    store: BattleStore,
    registry: HookRegistry,
    validator: Option<Box<dyn DecisionValidator>>,
    oracle: Box<dyn RandomnessOracle>,
}

impl Default for Arena {
    fn default() -> Self {
        Self::new(HookRegistry::new())
    }
}

impl Arena {
    /// Create an arena with the given move/effect registry, the internal
    /// validator fallback and the default hash oracle.
    pub fn new(registry: HookRegistry) -> Self {
        Self {
            store: BattleStore::new(),
            registry,
            validator: None,
            oracle: Box::new(HashSeedOracle),
        }
    }

    /// Install an external validator.
    pub fn with_validator(mut self, validator: Box<dyn DecisionValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Install an external randomness oracle.
    pub fn with_oracle(mut self, oracle: Box<dyn RandomnessOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    /// Create a battle for (side 0, side 1) under the pair nonce.
    ///
    /// The id is `derive_battle_id(side0, side1, nonce)`; creating the same
    /// pair + nonce twice is rejected.
    pub fn create_battle(
        &mut self,
        side0: PlayerId,
        side1: PlayerId,
        nonce: u64,
        teams: [&[MonSpec]; 2],
        now: u64,
    ) -> Result<BattleId, ProtocolError> {
        let id = derive_battle_id(&side0, &side1, nonce);
        let battle = Battle::new(id, side0, side1, teams, now)?;
        if !self.store.insert(battle) {
            return Err(ProtocolError::DuplicateBattle);
        }
        info!(
            battle = %hex::encode(&id[..4]),
            side0 = %side0.short_hex(),
            side1 = %side1.short_hex(),
            "battle created"
        );
        Ok(id)
    }

    /// Read access to a battle record.
    pub fn battle(&self, id: &BattleId) -> Option<&Battle> {
        self.store.get(id)
    }

    /// Current turn id.
    pub fn turn(&self, id: &BattleId) -> Option<u32> {
        self.store.get(id).map(|b| b.data.turn)
    }

    /// Winner indicator.
    pub fn winner(&self, id: &BattleId) -> Option<Winner> {
        self.store.get(id).map(|b| b.data.winner)
    }

    /// Active roster slot for a side, if a mon is on the field.
    pub fn active_slot(&self, id: &BattleId, side: Side) -> Option<u8> {
        self.store.get(id).and_then(|b| b.active_slot(side))
    }

    /// Packed battle word for a mon.
    pub fn mon(&self, id: &BattleId, side: Side, slot: u8) -> Option<PackedMon> {
        self.store.get(id).map(|b| b.mon(side, slot))
    }

    /// Mutable access to the hook registry (catalog registration).
    pub fn registry_mut(&mut self) -> &mut HookRegistry {
        &mut self.registry
    }

    // -- internal plumbing shared by commit.rs / signed.rs ------------------

    pub(crate) fn store(&self) -> &BattleStore {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut BattleStore {
        &mut self.store
    }

    /// Resolve the current turn if both decisions are in.
    /// Splits field borrows so the registry/oracle can be used while the
    /// battle is held mutably.
    pub(crate) fn execute_inner(
        &mut self,
        id: &BattleId,
    ) -> Result<Option<TurnOutcome>, ProtocolError> {
        let Self {
            store,
            registry,
            validator,
            oracle,
        } = self;
        let battle = store.get_mut(id).ok_or(ProtocolError::BattleNotFound)?;
        if battle.is_concluded() {
            return Err(ProtocolError::BattleConcluded);
        }
        if !battle.both_decided() {
            return Ok(None);
        }

        let (Some(d0), Some(d1)) = (battle.players[0].pending, battle.players[1].pending) else {
            return Ok(None);
        };
        let seed = oracle.seed(&d0.salt, &d1.salt);

        let fallback = DefaultValidator;
        let validator: &dyn DecisionValidator = match validator {
            Some(v) => &**v,
            None => &fallback,
        };

        let outcome = crate::battle::engine::resolve_turn(battle, registry, validator, seed);
        Ok(Some(outcome))
    }

    pub(crate) fn validator_ref(&self) -> &dyn DecisionValidator {
        match &self.validator {
            Some(v) => v.as_ref(),
            None => &DefaultValidator,
        }
    }
}
