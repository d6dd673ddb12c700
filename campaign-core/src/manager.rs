//! Sole mutator/accessor of one [`GameState`] instance.
//!
//! Reads hand out borrowed references; the borrow checker prevents
//! callers from mutating through them, so no defensive copying is done
//! on the read path. All writes go through the patch methods below.
//! Forking (`fork`) deep-clones the whole value graph, which is the
//! sanctioned mechanism for speculative or batch simulation.

use crate::state::{
    ActionLogEntry, BattleState, Battlefield, City, DiplomacyRelation, Faction, FlagKey, FlagValue,
    GameState, General, GeneralCondition, LogKind, Phase, RelationLabel, TroopCounts,
};
use crate::turn::ACTIONS_PER_TURN;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateError {
    /// An id that should have originated from the current state was not
    /// found. This is a corrupted reference, i.e. a programmer error;
    /// callers abort the operation rather than retry.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Expected condition: the per-turn action budget is spent.
    #[error("no actions left this turn")]
    ActionsExhausted,

    #[error("no active battle")]
    NoActiveBattle,

    #[error("unknown tactic: {id}")]
    UnknownTactic { id: String },

    /// Corrupt persisted snapshot. No partial recovery; callers fall
    /// back to a fresh scenario.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// Partial update for a city. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct CityPatch {
    pub owner: Option<String>,
    pub troops: Option<TroopCounts>,
    pub food: Option<i64>,
    pub morale: Option<i32>,
    pub training: Option<i32>,
    pub development: Option<crate::state::Development>,
}

/// Partial update for a general.
#[derive(Debug, Clone, Default)]
pub struct GeneralPatch {
    pub condition: Option<GeneralCondition>,
    pub location: Option<String>,
    pub loyalty: Option<crate::grade::Grade>,
}

/// Partial update for a diplomatic relation.
#[derive(Debug, Clone, Default)]
pub struct RelationPatch {
    pub value: Option<i32>,
    pub is_alliance: Option<bool>,
    /// Appended to the relation's bounded history log.
    pub note: Option<String>,
}

#[derive(Debug)]
pub struct GameStateManager {
    state: GameState,
}

impl GameStateManager {
    pub fn new(state: GameState) -> Self {
        Self { state }
    }

    /// Borrowed read-only view of the whole state graph.
    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn into_state(self) -> GameState {
        self.state
    }

    /// Deep, independently-mutable copy of this manager and its state.
    pub fn fork(&self) -> GameStateManager {
        GameStateManager {
            state: self.state.clone(),
        }
    }

    // ------------------------------------------------------------------
    // Typed lookups
    // ------------------------------------------------------------------

    pub fn city(&self, id: &str) -> Result<&City, StateError> {
        self.state.cities.get(id).ok_or_else(|| StateError::NotFound {
            kind: "city",
            id: id.to_string(),
        })
    }

    pub fn general(&self, id: &str) -> Result<&General, StateError> {
        self.state
            .generals
            .get(id)
            .ok_or_else(|| StateError::NotFound {
                kind: "general",
                id: id.to_string(),
            })
    }

    pub fn faction(&self, id: &str) -> Result<&Faction, StateError> {
        self.state
            .factions
            .get(id)
            .ok_or_else(|| StateError::NotFound {
                kind: "faction",
                id: id.to_string(),
            })
    }

    pub fn battlefield(&self, id: &str) -> Result<&Battlefield, StateError> {
        self.state
            .battlefields
            .get(id)
            .ok_or_else(|| StateError::NotFound {
                kind: "battlefield",
                id: id.to_string(),
            })
    }

    pub fn relation(&self, a: &str, b: &str) -> Result<&DiplomacyRelation, StateError> {
        self.state
            .diplomacy
            .relation(a, b)
            .ok_or_else(|| StateError::NotFound {
                kind: "relation",
                id: format!("{a}/{b}"),
            })
    }

    pub fn player_faction(&self) -> Result<&Faction, StateError> {
        self.state
            .player_faction()
            .ok_or_else(|| StateError::NotFound {
                kind: "faction",
                id: "<player>".to_string(),
            })
    }

    // ------------------------------------------------------------------
    // Entity mutation
    // ------------------------------------------------------------------

    pub fn update_city(&mut self, id: &str, patch: CityPatch) -> Result<(), StateError> {
        let city = self
            .state
            .cities
            .get_mut(id)
            .ok_or_else(|| StateError::NotFound {
                kind: "city",
                id: id.to_string(),
            })?;

        if let Some(owner) = patch.owner {
            city.owner = owner;
        }
        if let Some(troops) = patch.troops {
            city.troops = TroopCounts {
                infantry: troops.infantry.max(0),
                cavalry: troops.cavalry.max(0),
                navy: troops.navy.max(0),
            };
        }
        if let Some(food) = patch.food {
            city.food = food.max(0);
        }
        if let Some(morale) = patch.morale {
            city.morale.set(morale);
        }
        if let Some(training) = patch.training {
            city.training.set(training);
        }
        if let Some(dev) = patch.development {
            city.development = dev;
        }
        Ok(())
    }

    /// Apply a partial patch to a general. Condition changes that would
    /// reverse a terminal state (dead, or captive except toward dead)
    /// are skipped, not errors: stale condition writes are an expected
    /// within-turn ordering, per the degradation rules.
    pub fn update_general(&mut self, id: &str, patch: GeneralPatch) -> Result<(), StateError> {
        let general = self
            .state
            .generals
            .get_mut(id)
            .ok_or_else(|| StateError::NotFound {
                kind: "general",
                id: id.to_string(),
            })?;

        if let Some(condition) = patch.condition {
            if general.condition.can_become(condition) {
                general.condition = condition;
            } else {
                log::debug!(
                    "skipping condition change for {}: {:?} -> {:?}",
                    id,
                    general.condition,
                    condition
                );
            }
        }
        if let Some(location) = patch.location {
            general.location = location;
        }
        if let Some(loyalty) = patch.loyalty {
            general.loyalty = loyalty;
        }
        Ok(())
    }

    pub fn update_relation(
        &mut self,
        a: &str,
        b: &str,
        patch: RelationPatch,
    ) -> Result<(), StateError> {
        let rel = self
            .state
            .diplomacy
            .relation_mut(a, b)
            .ok_or_else(|| StateError::NotFound {
                kind: "relation",
                id: format!("{a}/{b}"),
            })?;

        if let Some(value) = patch.value {
            rel.value.set(value);
            rel.label = RelationLabel::from_value(rel.value.get());
        }
        if let Some(is_alliance) = patch.is_alliance {
            rel.is_alliance = is_alliance;
        }
        if let Some(note) = patch.note {
            rel.push_event(note);
        }
        Ok(())
    }

    /// Add signed troop deltas to a city, saturating each count at zero.
    pub fn add_city_troops(&mut self, id: &str, delta: TroopCounts) -> Result<(), StateError> {
        let city = self
            .state
            .cities
            .get_mut(id)
            .ok_or_else(|| StateError::NotFound {
                kind: "city",
                id: id.to_string(),
            })?;

        city.troops.infantry = (city.troops.infantry + delta.infantry).max(0);
        city.troops.cavalry = (city.troops.cavalry + delta.cavalry).max(0);
        city.troops.navy = (city.troops.navy + delta.navy).max(0);
        Ok(())
    }

    /// Shift a relation value by `delta`, clamping into [0, 100], and
    /// recompute the band label from the clamped value. Returns the new
    /// value.
    pub fn add_relation_value(&mut self, a: &str, b: &str, delta: i32) -> Result<i32, StateError> {
        let rel = self
            .state
            .diplomacy
            .relation_mut(a, b)
            .ok_or_else(|| StateError::NotFound {
                kind: "relation",
                id: format!("{a}/{b}"),
            })?;

        rel.value.add(delta);
        let value = rel.value.get();
        rel.label = RelationLabel::from_value(value);
        Ok(value)
    }

    // ------------------------------------------------------------------
    // Flags, log, turn bookkeeping
    // ------------------------------------------------------------------

    pub fn set_flag(&mut self, key: FlagKey, value: FlagValue) {
        self.state.flags.insert(key, value);
    }

    pub fn flag(&self, key: &FlagKey) -> Option<&FlagValue> {
        self.state.flags.get(key)
    }

    pub fn flag_bool(&self, key: &FlagKey) -> bool {
        self.flag(key).and_then(FlagValue::as_bool).unwrap_or(false)
    }

    pub fn add_action_log(&mut self, kind: LogKind, text: impl Into<String>) {
        let turn = self.state.turn;
        self.state.action_log.push(ActionLogEntry {
            turn,
            kind,
            text: text.into(),
        });
    }

    /// Spend one action. Raises [`StateError::ActionsExhausted`] when
    /// called with zero remaining. Returns the remaining count.
    pub fn use_action(&mut self) -> Result<u32, StateError> {
        if self.state.actions_remaining == 0 {
            return Err(StateError::ActionsExhausted);
        }
        self.state.actions_remaining -= 1;
        Ok(self.state.actions_remaining)
    }

    /// Restore the fixed per-turn action budget.
    pub fn reset_actions(&mut self) {
        self.state.actions_remaining = ACTIONS_PER_TURN;
    }

    pub fn advance_turn(&mut self) {
        self.state.turn += 1;
    }

    pub fn set_phase(&mut self, phase: Phase) {
        self.state.phase = phase;
    }

    pub fn set_season(&mut self, season: impl Into<String>) {
        self.state.season = season.into();
    }

    pub fn set_game_over(&mut self, result: crate::state::CampaignResult) {
        self.state.game_over = true;
        self.state.result = Some(result);
    }

    pub fn set_battle(&mut self, battle: Option<BattleState>) {
        self.state.active_battle = battle;
    }

    /// Remove and return the active battle for resolution.
    pub fn take_battle(&mut self) -> Result<BattleState, StateError> {
        self.state
            .active_battle
            .take()
            .ok_or(StateError::NoActiveBattle)
    }

    pub fn mark_event_completed(&mut self, id: &str) {
        self.state.completed_events.insert(id.to_string());
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Serialize the entire state graph with full fidelity.
    pub fn serialize(&self) -> Result<String, StateError> {
        Ok(serde_json::to_string(&self.state)?)
    }

    /// Rebuild a manager from a serialized snapshot. A corrupt snapshot
    /// fails the whole call; there is no partial-recovery path.
    pub fn deserialize(snapshot: &str) -> Result<GameStateManager, StateError> {
        let state: GameState = serde_json::from_str(snapshot)?;
        Ok(GameStateManager::new(state))
    }
}
