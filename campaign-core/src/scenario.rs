//! Scenario templates: declarative campaign setups loaded from data.
//!
//! A template carries the full starting roster plus the scripted event
//! catalog. `instantiate` validates the cross-references, builds the
//! initial state and applies the chosen difficulty preset.

use crate::difficulty::{self, Difficulty};
use crate::events::EventRule;
use crate::manager::GameStateManager;
use crate::state::{
    Battlefield, City, DiplomacyRelation, Faction, GameState, General, ScenarioGoals,
};
use crate::turn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("scenario has no player faction")]
    NoPlayerFaction,
    #[error("scenario has more than one player faction")]
    MultiplePlayerFactions,
    #[error("duplicate id in scenario: {0}")]
    DuplicateId(String),
    #[error("{kind} '{id}' referenced by {referrer} does not exist")]
    UnknownReference {
        kind: &'static str,
        id: String,
        referrer: String,
    },
    #[error(transparent)]
    State(#[from] crate::manager::StateError),
}

/// Starting diplomatic stance between two factions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationSeed {
    pub a: String,
    pub b: String,
    pub value: i32,
    #[serde(default)]
    pub is_alliance: bool,
}

/// Declarative campaign setup, deserializable from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioTemplate {
    pub name: String,
    pub max_turns: u32,
    pub factions: Vec<Faction>,
    pub cities: Vec<City>,
    pub generals: Vec<General>,
    #[serde(default)]
    pub battlefields: Vec<Battlefield>,
    #[serde(default)]
    pub relations: Vec<RelationSeed>,
    #[serde(default)]
    pub goals: ScenarioGoals,
    #[serde(default)]
    pub events: Vec<EventRule>,
}

impl ScenarioTemplate {
    /// Check structural integrity: exactly one player faction, unique
    /// ids and no dangling cross-references.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        match self.factions.iter().filter(|f| f.is_player).count() {
            0 => return Err(ScenarioError::NoPlayerFaction),
            1 => {}
            _ => return Err(ScenarioError::MultiplePlayerFactions),
        }

        let mut seen = std::collections::BTreeSet::new();
        for id in self
            .factions
            .iter()
            .map(|f| &f.id)
            .chain(self.cities.iter().map(|c| &c.id))
            .chain(self.generals.iter().map(|g| &g.id))
            .chain(self.battlefields.iter().map(|b| &b.id))
        {
            if !seen.insert(id.clone()) {
                return Err(ScenarioError::DuplicateId(id.clone()));
            }
        }

        let faction_exists = |id: &str| self.factions.iter().any(|f| f.id == id);
        let city_exists = |id: &str| self.cities.iter().any(|c| c.id == id);
        let location_exists =
            |id: &str| city_exists(id) || self.battlefields.iter().any(|b| b.id == id);

        for faction in &self.factions {
            if !self.generals.iter().any(|g| g.id == faction.leader) {
                return Err(ScenarioError::UnknownReference {
                    kind: "general",
                    id: faction.leader.clone(),
                    referrer: format!("faction '{}'", faction.id),
                });
            }
        }
        for city in &self.cities {
            if !faction_exists(&city.owner) {
                return Err(ScenarioError::UnknownReference {
                    kind: "faction",
                    id: city.owner.clone(),
                    referrer: format!("city '{}'", city.id),
                });
            }
        }
        for general in &self.generals {
            if !faction_exists(&general.faction) {
                return Err(ScenarioError::UnknownReference {
                    kind: "faction",
                    id: general.faction.clone(),
                    referrer: format!("general '{}'", general.id),
                });
            }
            if !location_exists(&general.location) {
                return Err(ScenarioError::UnknownReference {
                    kind: "location",
                    id: general.location.clone(),
                    referrer: format!("general '{}'", general.id),
                });
            }
        }
        for relation in &self.relations {
            for side in [&relation.a, &relation.b] {
                if !faction_exists(side) {
                    return Err(ScenarioError::UnknownReference {
                        kind: "faction",
                        id: side.clone(),
                        referrer: "relations".to_string(),
                    });
                }
            }
        }

        let goal_refs = [
            ("battlefield", &self.goals.decisive_battlefield),
            ("city", &self.goals.primary_city),
            ("city", &self.goals.secondary_city),
            ("city", &self.goals.contested_city),
        ];
        for (kind, goal) in goal_refs {
            if let Some(id) = goal {
                let ok = match kind {
                    "battlefield" => self.battlefields.iter().any(|b| b.id == *id),
                    _ => city_exists(id),
                };
                if !ok {
                    return Err(ScenarioError::UnknownReference {
                        kind,
                        id: id.clone(),
                        referrer: "goals".to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Build the turn-1 campaign state with the given difficulty preset
    /// applied.
    pub fn instantiate(&self, level: Difficulty) -> Result<GameState, ScenarioError> {
        self.validate()?;

        let mut state = GameState {
            max_turns: self.max_turns,
            goals: self.goals.clone(),
            ..GameState::default()
        };
        state.phase = turn::determine_phase(state.turn);
        state.season = turn::season_for_turn(state.turn).to_string();

        for faction in &self.factions {
            state.factions.insert(faction.id.clone(), faction.clone());
        }
        for city in &self.cities {
            state.cities.insert(city.id.clone(), city.clone());
        }
        for general in &self.generals {
            state.generals.insert(general.id.clone(), general.clone());
        }
        for battlefield in &self.battlefields {
            state
                .battlefields
                .insert(battlefield.id.clone(), battlefield.clone());
        }
        for seed in &self.relations {
            let mut relation = DiplomacyRelation::new(&seed.a, &seed.b, seed.value);
            relation.is_alliance = seed.is_alliance;
            state.diplomacy.relations.push(relation);
        }
        // Relations are keyed by sorted pair; keep the list itself
        // sorted as well so iteration order never depends on authoring
        // order.
        state
            .diplomacy
            .relations
            .sort_by(|x, y| x.factions.cmp(&y.factions));

        let mut manager = GameStateManager::new(state);
        difficulty::apply(&mut manager, level)?;
        Ok(manager.into_state())
    }
}
