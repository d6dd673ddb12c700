//! Catalog-driven scripted/stochastic event engine.
//!
//! The catalog is content input: a list of trigger rules evaluated in
//! order against the current state every turn. Firing is idempotent —
//! an id in `completed_events` can never fire again — and rules later
//! in the catalog observe flag writes made by earlier rules within the
//! same call, which is what enables same-turn narrative chains.

use crate::manager::{CityPatch, GameStateManager, GeneralPatch, StateError};
use crate::rng::SeededRng;
use crate::state::{
    CityId, EventId, FactionId, FlagKey, FlagValue, GameState, GeneralCondition, GeneralId,
    LogKind, TroopCounts,
};
use serde::{Deserialize, Serialize};

/// Which cities an effect applies to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CityFilter {
    All,
    OwnedBy { faction: FactionId },
    Ids { ids: Vec<CityId> },
}

impl CityFilter {
    /// Matching city ids, sorted for deterministic application order.
    fn select(&self, state: &GameState) -> Vec<CityId> {
        let mut ids: Vec<CityId> = match self {
            CityFilter::All => state.cities.keys().cloned().collect(),
            CityFilter::OwnedBy { faction } => state.cities_of(faction),
            CityFilter::Ids { ids } => ids.clone(),
        };
        ids.sort();
        ids
    }
}

/// Trigger condition of one catalog rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    TurnIs { turn: u32 },
    TurnBetween { from: u32, to: u32 },
    FlagSet { key: FlagKey },
    FlagUnset { key: FlagKey },
    /// Probability draw against the injected RNG, live only within the
    /// given turn window.
    Chance { from: u32, to: u32, p: f64 },
    GeneralAlive { general: GeneralId },
    GeneralGone { general: GeneralId },
    All { of: Vec<Trigger> },
    Any { of: Vec<Trigger> },
}

impl Trigger {
    fn holds(&self, state: &GameState, rng: &mut SeededRng) -> bool {
        match self {
            Trigger::TurnIs { turn } => state.turn == *turn,
            Trigger::TurnBetween { from, to } => (*from..=*to).contains(&state.turn),
            Trigger::FlagSet { key } => match state.flags.get(key) {
                Some(FlagValue::Bool(b)) => *b,
                Some(_) => true,
                None => false,
            },
            Trigger::FlagUnset { key } => !Trigger::FlagSet { key: key.clone() }.holds(state, rng),
            Trigger::Chance { from, to, p } => {
                (*from..=*to).contains(&state.turn) && rng.chance(*p)
            }
            Trigger::GeneralAlive { general } => state
                .generals
                .get(general)
                .map(|g| g.condition.is_active())
                .unwrap_or(false),
            Trigger::GeneralGone { general } => state
                .generals
                .get(general)
                .map(|g| !g.condition.is_active())
                .unwrap_or(true),
            Trigger::All { of } => of.iter().all(|t| t.holds(state, rng)),
            Trigger::Any { of } => of.iter().any(|t| t.holds(state, rng)),
        }
    }
}

/// State mutation performed by a fired rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    SetFlag {
        key: FlagKey,
        value: FlagValue,
    },
    CityMorale {
        filter: CityFilter,
        delta: i32,
    },
    RelationDelta {
        a: FactionId,
        b: FactionId,
        delta: i32,
    },
    SetGeneralCondition {
        general: GeneralId,
        condition: GeneralCondition,
    },
    /// Formation hint consumed by the faction AI.
    SetAiFormation {
        faction: FactionId,
        formation: String,
    },
    AddFood {
        city: CityId,
        delta: i64,
    },
    AddTroops {
        city: CityId,
        troops: TroopCounts,
    },
}

/// One content-authored trigger rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRule {
    pub id: EventId,
    pub name: String,
    pub trigger: Trigger,
    pub effects: Vec<Effect>,
    pub narrative: String,
}

/// Result record for one fired rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventOutcome {
    pub id: EventId,
    pub name: String,
    pub narrative: String,
    pub applied: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct EventSystem {
    catalog: Vec<EventRule>,
}

impl EventSystem {
    pub fn new(catalog: Vec<EventRule>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &[EventRule] {
        &self.catalog
    }

    /// Evaluate every rule in catalog order against the current state
    /// and return the ids that fire now.
    ///
    /// Evaluation runs against a scratch copy of the state so that
    /// later rules observe flag/condition writes made by earlier rules
    /// in the same call, without touching the real state. Ids already
    /// in `completed_events` never fire.
    pub fn check_triggers(&self, state: &GameState, rng: &mut SeededRng) -> Vec<EventId> {
        let mut scratch = GameStateManager::new(state.clone());
        let mut fired = Vec::new();

        for rule in &self.catalog {
            if scratch.state().completed_events.contains(&rule.id) {
                continue;
            }
            if !rule.trigger.holds(scratch.state(), rng) {
                continue;
            }
            fired.push(rule.id.clone());
            scratch.mark_event_completed(&rule.id);
            for effect in &rule.effects {
                // Scratch application only feeds later triggers; failures
                // there surface for real in process_turn.
                let _ = apply_effect(&mut scratch, effect);
            }
        }

        fired
    }

    /// Evaluate and apply this turn's events through the manager,
    /// marking each fired id completed. Returns per-event records.
    pub fn process_turn(
        &self,
        manager: &mut GameStateManager,
        rng: &mut SeededRng,
    ) -> Vec<EventOutcome> {
        let fired = self.check_triggers(manager.state(), rng);
        let mut outcomes = Vec::new();

        for id in fired {
            let rule = match self.catalog.iter().find(|r| r.id == id) {
                Some(r) => r,
                None => continue,
            };

            let mut applied = Vec::new();
            for effect in &rule.effects {
                match apply_effect(manager, effect) {
                    Ok(line) => applied.push(line),
                    // Stale references are an expected within-turn
                    // ordering; skip the effect rather than abort.
                    Err(StateError::NotFound { kind, id }) => {
                        log::warn!("event {}: skipping stale {kind} reference {id}", rule.id);
                    }
                    Err(e) => {
                        log::warn!("event {}: effect failed: {e}", rule.id);
                    }
                }
            }

            manager.mark_event_completed(&rule.id);
            manager.add_action_log(LogKind::Event, rule.narrative.clone());
            log::info!("event fired: {} ({})", rule.name, rule.id);

            outcomes.push(EventOutcome {
                id: rule.id.clone(),
                name: rule.name.clone(),
                narrative: rule.narrative.clone(),
                applied,
            });
        }

        outcomes
    }
}

/// Apply one effect through the manager. Returns a short description of
/// what changed, for the per-event result record.
fn apply_effect(manager: &mut GameStateManager, effect: &Effect) -> Result<String, StateError> {
    match effect {
        Effect::SetFlag { key, value } => {
            manager.set_flag(key.clone(), value.clone());
            Ok(format!("flag {key:?} set"))
        }
        Effect::CityMorale { filter, delta } => {
            let ids = filter.select(manager.state());
            for id in &ids {
                let morale = manager.city(id)?.morale.get();
                manager.update_city(
                    id,
                    CityPatch {
                        morale: Some(morale + delta),
                        ..Default::default()
                    },
                )?;
            }
            Ok(format!("morale {delta:+} in {} cities", ids.len()))
        }
        Effect::RelationDelta { a, b, delta } => {
            let value = manager.add_relation_value(a, b, *delta)?;
            Ok(format!("relation {a}/{b} {delta:+} -> {value}"))
        }
        Effect::SetGeneralCondition { general, condition } => {
            manager.update_general(
                general,
                GeneralPatch {
                    condition: Some(*condition),
                    ..Default::default()
                },
            )?;
            Ok(format!("general {general} -> {condition:?}"))
        }
        Effect::SetAiFormation { faction, formation } => {
            manager.set_flag(
                FlagKey::AiFormation(faction.clone()),
                FlagValue::Text(formation.clone()),
            );
            Ok(format!("{faction} formation -> {formation}"))
        }
        Effect::AddFood { city, delta } => {
            let food = manager.city(city)?.food;
            manager.update_city(
                city,
                CityPatch {
                    food: Some(food + delta),
                    ..Default::default()
                },
            )?;
            Ok(format!("{city} food {delta:+}"))
        }
        Effect::AddTroops { city, troops } => {
            manager.add_city_troops(city, *troops)?;
            Ok(format!("{city} reinforced"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::GameStateBuilder;

    fn manager() -> GameStateManager {
        GameStateManager::new(
            GameStateBuilder::new()
                .with_faction("shu", true, "liubei")
                .with_faction("wei", false, "caocao")
                .with_city("chengdu", "shu", 5000, 9000)
                .with_city("xuchang", "wei", 8000, 9000)
                .with_general("liubei", "shu", "chengdu")
                .with_relation("shu", "wei", 45)
                .turn(3)
                .build(),
        )
    }

    fn rule(id: &str, trigger: Trigger, effects: Vec<Effect>) -> EventRule {
        EventRule {
            id: id.to_string(),
            name: id.to_string(),
            trigger,
            effects,
            narrative: format!("narrative for {id}"),
        }
    }

    #[test]
    fn test_turn_trigger_fires_once() {
        let system = EventSystem::new(vec![rule(
            "omen",
            Trigger::TurnIs { turn: 3 },
            vec![Effect::SetFlag {
                key: FlagKey::Custom("omen_seen".to_string()),
                value: FlagValue::Bool(true),
            }],
        )]);
        let mut m = manager();
        let mut rng = SeededRng::new(1);

        let outcomes = system.process_turn(&mut m, &mut rng);
        assert_eq!(outcomes.len(), 1);
        assert!(m.state().completed_events.contains("omen"));

        // Condition still true, but id is completed: never refires.
        let outcomes = system.process_turn(&mut m, &mut rng);
        assert!(outcomes.is_empty());
    }

    #[test]
    fn test_same_turn_chain_via_flags() {
        // Rule B triggers on a flag that rule A sets in the same call.
        let system = EventSystem::new(vec![
            rule(
                "victory_news",
                Trigger::TurnIs { turn: 3 },
                vec![Effect::SetFlag {
                    key: FlagKey::DecisiveVictory,
                    value: FlagValue::Bool(true),
                }],
            ),
            rule(
                "celebrations",
                Trigger::FlagSet {
                    key: FlagKey::DecisiveVictory,
                },
                vec![Effect::CityMorale {
                    filter: CityFilter::OwnedBy {
                        faction: "shu".to_string(),
                    },
                    delta: 10,
                }],
            ),
        ]);
        let mut m = manager();
        let mut rng = SeededRng::new(1);

        let outcomes = system.process_turn(&mut m, &mut rng);
        let ids: Vec<&str> = outcomes.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["victory_news", "celebrations"]);
        assert_eq!(m.city("chengdu").unwrap().morale.get(), 80);
        // Non-player city untouched
        assert_eq!(m.city("xuchang").unwrap().morale.get(), 70);
    }

    #[test]
    fn test_chain_order_matters() {
        // Reversed catalog order: the follower is evaluated before the
        // flag exists, so only the setter fires this turn.
        let system = EventSystem::new(vec![
            rule(
                "celebrations",
                Trigger::FlagSet {
                    key: FlagKey::DecisiveVictory,
                },
                vec![],
            ),
            rule(
                "victory_news",
                Trigger::TurnIs { turn: 3 },
                vec![Effect::SetFlag {
                    key: FlagKey::DecisiveVictory,
                    value: FlagValue::Bool(true),
                }],
            ),
        ]);
        let mut m = manager();
        let mut rng = SeededRng::new(1);

        let outcomes = system.process_turn(&mut m, &mut rng);
        let ids: Vec<&str> = outcomes.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["victory_news"]);

        // Next call the flag is visible.
        let outcomes = system.process_turn(&mut m, &mut rng);
        let ids: Vec<&str> = outcomes.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["celebrations"]);
    }

    #[test]
    fn test_chance_trigger_respects_window() {
        let system = EventSystem::new(vec![rule(
            "plague",
            Trigger::Chance {
                from: 5,
                to: 7,
                p: 1.0,
            },
            vec![],
        )]);
        let mut m = manager(); // turn 3, outside the window
        let mut rng = SeededRng::new(1);

        assert!(system.process_turn(&mut m, &mut rng).is_empty());

        let mut m = GameStateManager::new(
            GameStateBuilder::new()
                .with_faction("shu", true, "liubei")
                .turn(6)
                .build(),
        );
        assert_eq!(system.process_turn(&mut m, &mut rng).len(), 1);
    }

    #[test]
    fn test_chance_trigger_is_seed_deterministic() {
        let system = EventSystem::new(vec![rule(
            "ambush",
            Trigger::Chance {
                from: 1,
                to: 20,
                p: 0.5,
            },
            vec![],
        )]);

        let fire_with = |seed: u64| {
            let mut m = GameStateManager::new(
                GameStateBuilder::new()
                    .with_faction("shu", true, "liubei")
                    .turn(2)
                    .build(),
            );
            let mut rng = SeededRng::new(seed);
            !system.process_turn(&mut m, &mut rng).is_empty()
        };

        // Same seed, same outcome, whatever it is.
        assert_eq!(fire_with(11), fire_with(11));
        assert_eq!(fire_with(99), fire_with(99));
    }

    #[test]
    fn test_general_gone_trigger() {
        let system = EventSystem::new(vec![rule(
            "succession_crisis",
            Trigger::GeneralGone {
                general: "liubei".to_string(),
            },
            vec![],
        )]);
        let mut m = manager();
        let mut rng = SeededRng::new(1);

        assert!(system.process_turn(&mut m, &mut rng).is_empty());

        m.update_general(
            "liubei",
            GeneralPatch {
                condition: Some(GeneralCondition::Dead),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(system.process_turn(&mut m, &mut rng).len(), 1);
    }

    #[test]
    fn test_stale_reference_is_skipped_not_fatal() {
        let system = EventSystem::new(vec![rule(
            "reinforcements",
            Trigger::TurnIs { turn: 3 },
            vec![
                Effect::AddFood {
                    city: "no_such_city".to_string(),
                    delta: 100,
                },
                Effect::CityMorale {
                    filter: CityFilter::Ids {
                        ids: vec!["chengdu".to_string()],
                    },
                    delta: 5,
                },
            ],
        )]);
        let mut m = manager();
        let mut rng = SeededRng::new(1);

        let outcomes = system.process_turn(&mut m, &mut rng);
        assert_eq!(outcomes.len(), 1);
        // The stale food effect is skipped; the morale effect after it
        // still lands.
        assert_eq!(m.city("chengdu").unwrap().morale.get(), 75);
    }
}
