//! Faction AI subsystem.
//!
//! Non-player factions act through a narrow decision contract:
//! a [`FactionDecider`] sees a filtered [`FactionView`] and returns
//! structured [`FactionAction`]s. Deciders are constructor-injected and
//! interchangeable — the default is the deterministic [`RuleBasedAi`];
//! an LLM-backed client would implement the same trait externally.
//!
//! Every decision is executed through an [`ActionExecutor`] against the
//! manager, so no AI mutation bypasses the action log: a whole turn of
//! AI play is replayable from the log alone.

pub mod rules;

pub use rules::RuleBasedAi;

use crate::manager::{CityPatch, GameStateManager, StateError};
use crate::rng::SeededRng;
use crate::state::{
    BattleSide, BattleState, CityId, FactionId, FlagKey, FlagValue, GameState, LogKind, Phase,
    Terrain, TroopCounts, WindDirection,
};
use serde::{Deserialize, Serialize};

/// Actions a faction may take at most per turn.
const ACTIONS_PER_FACTION: usize = 2;

/// Share of a city's garrison committed to a march, in percent.
const MARCH_COMMIT_PCT: i64 = 60;

/// Battle-turn cap for AI-initiated sieges.
const AI_SIEGE_TURNS: u32 = 8;

/// City facts exposed to deciders.
#[derive(Debug, Clone, Serialize)]
pub struct CitySummary {
    pub id: CityId,
    pub owner: FactionId,
    pub troops: i64,
    pub food: i64,
    pub morale: i32,
    pub adjacent: Vec<String>,
}

/// Filtered state view for one faction's decision. Serializable so an
/// external client can receive it over a narrow request/response
/// contract.
#[derive(Debug, Clone, Serialize)]
pub struct FactionView {
    pub faction: FactionId,
    pub turn: u32,
    pub phase: Phase,
    pub own_cities: Vec<CitySummary>,
    pub player_faction: FactionId,
    pub player_cities: Vec<CitySummary>,
    pub relation_to_player: Option<i32>,
    pub alliance_with_player: bool,
    /// Formation hint set by scripted events, if any.
    pub formation_hint: Option<String>,
}

/// Development track targeted by a develop action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DevTrack {
    Agriculture,
    Commerce,
    Defense,
}

/// Structured faction actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FactionAction {
    ImproveRelations { target: FactionId },
    Develop { city: CityId, track: DevTrack },
    Recruit { city: CityId, infantry: i64 },
    Fortify { city: CityId },
    March { from: CityId, to: String },
    Pass,
}

/// AI decision-making contract.
///
/// Implementations must be deterministic given the same RNG stream:
/// all randomness comes from the injected [`SeededRng`].
pub trait FactionDecider {
    fn name(&self) -> &'static str;

    /// Choose this faction's actions for the turn. May return an empty
    /// list to pass.
    fn decide(&mut self, view: &FactionView, rng: &mut SeededRng) -> Vec<FactionAction>;
}

/// Result of executing one action.
#[derive(Debug, Clone)]
pub struct ExecutedAction {
    pub narrative: String,
    /// A march into hostile territory constructs a pending battle.
    pub battle: Option<BattleState>,
}

/// Mutation seam for AI actions. Everything an executor does must go
/// through the manager so it is observable and replayable.
pub trait ActionExecutor {
    fn execute(
        &mut self,
        manager: &mut GameStateManager,
        faction: &FactionId,
        action: &FactionAction,
    ) -> Result<ExecutedAction, StateError>;
}

/// Default executor: applies each action through the manager and writes
/// a matching action-log entry.
#[derive(Debug, Default)]
pub struct LoggedExecutor;

impl ActionExecutor for LoggedExecutor {
    fn execute(
        &mut self,
        manager: &mut GameStateManager,
        faction: &FactionId,
        action: &FactionAction,
    ) -> Result<ExecutedAction, StateError> {
        match action {
            FactionAction::ImproveRelations { target } => {
                let value = manager.add_relation_value(faction, target, 8)?;
                let note = format!("{faction} sent envoys (relations {value})");
                manager.update_relation(
                    faction,
                    target,
                    crate::manager::RelationPatch {
                        note: Some(note.clone()),
                        ..Default::default()
                    },
                )?;
                manager.add_action_log(LogKind::Diplomacy, note.clone());
                Ok(ExecutedAction {
                    narrative: note,
                    battle: None,
                })
            }
            FactionAction::Develop { city, track } => {
                let mut dev = manager.city(city)?.development;
                match track {
                    DevTrack::Agriculture => dev.agriculture = dev.agriculture.up(),
                    DevTrack::Commerce => dev.commerce = dev.commerce.up(),
                    DevTrack::Defense => dev.defense = dev.defense.up(),
                }
                manager.update_city(
                    city,
                    CityPatch {
                        development: Some(dev),
                        ..Default::default()
                    },
                )?;
                let narrative = format!("{faction} invested in {city} ({track:?})");
                manager.add_action_log(LogKind::Development, narrative.clone());
                Ok(ExecutedAction {
                    narrative,
                    battle: None,
                })
            }
            FactionAction::Recruit { city, infantry } => {
                // Recruitment is paid for in food, half a unit each.
                let food = manager.city(city)?.food;
                manager.add_city_troops(
                    city,
                    TroopCounts {
                        infantry: *infantry,
                        cavalry: 0,
                        navy: 0,
                    },
                )?;
                manager.update_city(
                    city,
                    CityPatch {
                        food: Some(food - infantry / 2),
                        ..Default::default()
                    },
                )?;
                let narrative = format!("{faction} raised {infantry} troops in {city}");
                manager.add_action_log(LogKind::Military, narrative.clone());
                Ok(ExecutedAction {
                    narrative,
                    battle: None,
                })
            }
            FactionAction::Fortify { city } => {
                let c = manager.city(city)?;
                let mut dev = c.development;
                dev.defense = dev.defense.up();
                let morale = c.morale.get();
                manager.update_city(
                    city,
                    CityPatch {
                        development: Some(dev),
                        morale: Some(morale + 5),
                        ..Default::default()
                    },
                )?;
                let narrative = format!("{faction} fortified {city}");
                manager.add_action_log(LogKind::Military, narrative.clone());
                Ok(ExecutedAction {
                    narrative,
                    battle: None,
                })
            }
            FactionAction::March { from, to } => execute_march(manager, faction, from, to),
            FactionAction::Pass => Ok(ExecutedAction {
                narrative: format!("{faction} held position"),
                battle: None,
            }),
        }
    }
}

/// March troops from one city toward a destination. A march on a city
/// held by another faction constructs a pending siege; a march to an
/// own city transfers the committed force.
fn execute_march(
    manager: &mut GameStateManager,
    faction: &FactionId,
    from: &CityId,
    to: &str,
) -> Result<ExecutedAction, StateError> {
    let source = manager.city(from)?;
    if source.owner != *faction {
        // Source was lost earlier this turn; skip quietly.
        log::warn!("{faction} cannot march from {from}: city not held");
        return Ok(ExecutedAction {
            narrative: format!("{faction} aborted a march from {from}"),
            battle: None,
        });
    }

    let committed = TroopCounts {
        infantry: source.troops.infantry * MARCH_COMMIT_PCT / 100,
        cavalry: source.troops.cavalry * MARCH_COMMIT_PCT / 100,
        navy: source.troops.navy * MARCH_COMMIT_PCT / 100,
    };
    let force = committed.total();
    let source_morale = source.morale.get();

    // Deciders are external input: resolve the destination before any
    // troops move. A battlefield or unknown id aborts quietly, same as
    // a lost source city.
    let target = match manager.city(to) {
        Ok(city) => city,
        Err(e) => {
            log::warn!("{faction} cannot march from {from} to {to}: {e}");
            return Ok(ExecutedAction {
                narrative: format!("{faction} aborted a march from {from}"),
                battle: None,
            });
        }
    };
    let target_owner = target.owner.clone();
    let garrison = target.troops.total();
    let defender_morale = target.morale.get();

    manager.add_city_troops(
        from,
        TroopCounts {
            infantry: -committed.infantry,
            cavalry: -committed.cavalry,
            navy: -committed.navy,
        },
    )?;
    manager.add_action_log(
        LogKind::March {
            from: from.clone(),
            to: to.to_string(),
        },
        format!("{faction} marched {force} troops from {from} to {to}"),
    );

    if target_owner == *faction {
        manager.add_city_troops(to, committed)?;
        return Ok(ExecutedAction {
            narrative: format!("{faction} reinforced {to} with {force} troops"),
            battle: None,
        });
    }

    // Hostile city: construct the pending siege for the caller to route
    // into the battle resolver.
    let state = manager.state();

    let mut attacker = BattleSide::new(faction, force);
    attacker.morale.set(source_morale);
    attacker.generals = generals_at(state, faction, from);

    let mut defender = BattleSide::new(&target_owner, garrison);
    defender.morale.set(defender_morale);
    defender.generals = generals_at(state, &target_owner, to);

    let battle = BattleState {
        location: to.to_string(),
        siege: true,
        attacker,
        defender,
        battle_turn: 0,
        max_battle_turns: AI_SIEGE_TURNS,
        available_tactics: vec![
            "hold".to_string(),
            "volley".to_string(),
            "charge".to_string(),
            "ambush".to_string(),
        ],
        terrain: Terrain::Plains,
        wind: WindDirection::Calm,
        scripted_rout: None,
        log: Vec::new(),
        is_over: false,
        result: None,
    };

    Ok(ExecutedAction {
        narrative: format!("{faction} laid siege to {to}"),
        battle: Some(battle),
    })
}

/// Active generals of `faction` located at `location`, sorted by id.
fn generals_at(state: &GameState, faction: &str, location: &str) -> Vec<String> {
    let mut ids: Vec<String> = state
        .generals
        .values()
        .filter(|g| g.faction == faction && g.location == location && g.condition.is_active())
        .map(|g| g.id.clone())
        .collect();
    ids.sort();
    ids
}

/// Drives all non-player factions for one turn.
pub struct FactionAiEngine {
    decider: Box<dyn FactionDecider>,
}

impl std::fmt::Debug for FactionAiEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactionAiEngine")
            .field("decider", &self.decider.name())
            .finish()
    }
}

impl FactionAiEngine {
    pub fn new(decider: Box<dyn FactionDecider>) -> Self {
        Self { decider }
    }

    /// Build the filtered view for one faction.
    pub fn build_view(state: &GameState, faction: &FactionId) -> FactionView {
        let summarize = |ids: &[CityId]| -> Vec<CitySummary> {
            ids.iter()
                .filter_map(|id| state.cities.get(id))
                .map(|c| CitySummary {
                    id: c.id.clone(),
                    owner: c.owner.clone(),
                    troops: c.troops.total(),
                    food: c.food,
                    morale: c.morale.get(),
                    adjacent: c.adjacent.clone(),
                })
                .collect()
        };

        let player = state
            .player_faction()
            .map(|f| f.id.clone())
            .unwrap_or_default();
        let relation = state
            .diplomacy
            .relation(faction, &player)
            .map(|r| r.value.get());
        let alliance = state
            .diplomacy
            .relation(faction, &player)
            .map(|r| r.is_alliance)
            .unwrap_or(false);
        let formation = state
            .flags
            .get(&FlagKey::AiFormation(faction.clone()))
            .and_then(|v| match v {
                FlagValue::Text(t) => Some(t.clone()),
                _ => None,
            });

        FactionView {
            faction: faction.clone(),
            turn: state.turn,
            phase: state.phase,
            own_cities: summarize(&state.cities_of(faction)),
            player_faction: player.clone(),
            player_cities: summarize(&state.cities_of(&player)),
            relation_to_player: relation,
            alliance_with_player: alliance,
            formation_hint: formation,
        }
    }

    /// Produce and execute this turn's actions for every non-player
    /// faction, in sorted faction order. Returns the narrative lines
    /// plus at most one pending battle for the caller to route into the
    /// battle resolver.
    pub fn run_turn(
        &mut self,
        manager: &mut GameStateManager,
        executor: &mut dyn ActionExecutor,
        rng: &mut SeededRng,
    ) -> (Vec<String>, Option<BattleState>) {
        let mut narratives = Vec::new();
        let mut pending_battle: Option<BattleState> = None;

        for faction in manager.state().ai_factions() {
            let view = Self::build_view(manager.state(), &faction);
            let actions = self.decider.decide(&view, rng);

            for action in actions.into_iter().take(ACTIONS_PER_FACTION) {
                // One pending battle per turn; further marches wait.
                if pending_battle.is_some() && matches!(action, FactionAction::March { .. }) {
                    continue;
                }
                match executor.execute(manager, &faction, &action) {
                    Ok(executed) => {
                        narratives.push(executed.narrative);
                        if pending_battle.is_none() {
                            pending_battle = executed.battle;
                        }
                    }
                    Err(e) => {
                        log::warn!("{faction} action failed: {e}");
                    }
                }
            }
        }

        (narratives, pending_battle)
    }
}
