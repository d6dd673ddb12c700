//! Campaign turn loop: phase schedule, seasonal calendar, food upkeep
//! and the end-of-turn pipeline.
//!
//! `end_turn` runs a fixed pipeline (upkeep, events, AI, game-over
//! check, advance) so replays of the same seed walk through identical
//! state transitions.

use crate::ai::{FactionAiEngine, LoggedExecutor};
use crate::battle::resolver::{execute_battle_turn, BattleTurnReport};
use crate::events::{EventOutcome, EventSystem};
use crate::grade::Grade;
use crate::manager::{CityPatch, GameStateManager, StateError};
use crate::rng::SeededRng;
use crate::state::{BattleState, CampaignResult, LogKind, Phase};
use crate::victory;
use serde::Serialize;

/// Player actions per campaign turn.
pub const ACTIONS_PER_TURN: u32 = 3;

/// One food unit feeds this many troops per turn.
const TROOPS_PER_FOOD: i64 = 10;

/// Infantry desertion on a starving turn, in percent.
const STARVATION_DESERTION_PCT: i64 = 5;

/// Morale hit on a starving turn.
const STARVATION_MORALE_PENALTY: i32 = 15;

/// Reserve multiple below which supply warnings are raised.
const LOW_RESERVE_MULT: i64 = 3;

/// Map a turn number onto the campaign phase.
///
/// Step function with no gaps or overlaps: early turns are preparation,
/// the middle stretch is the battle window, everything after is
/// aftermath.
pub fn determine_phase(turn: u32) -> Phase {
    match turn {
        0..=8 => Phase::Preparation,
        9..=13 => Phase::Battle,
        _ => Phase::Aftermath,
    }
}

/// Seasonal label for a turn. Purely narrative.
pub fn season_for_turn(turn: u32) -> &'static str {
    match turn {
        0..=2 => "Autumn",
        3..=5 => "Early Winter",
        6..=8 => "Midwinter",
        9..=10 => "Late Winter",
        11..=13 => "Spring",
        _ => "Summer",
    }
}

/// Food output multiplier for an agriculture grade, in percent.
fn agriculture_multiplier_pct(grade: Grade) -> i64 {
    match grade {
        Grade::D => 80,
        Grade::C => 100,
        Grade::B => 120,
        Grade::A => 150,
        Grade::S => 200,
    }
}

/// Summary handed to the caller when a turn opens.
#[derive(Debug, Clone, Serialize)]
pub struct TurnStart {
    pub turn: u32,
    pub phase: Phase,
    pub season: String,
    pub actions_available: u32,
}

/// Everything that happened during end-of-turn processing.
#[derive(Debug, Clone, Serialize)]
pub struct TurnEnd {
    /// Scripted events that fired this turn.
    pub events: Vec<EventOutcome>,
    /// Supply reports and AI narrative lines.
    pub changes: Vec<String>,
    /// One-line preview of the coming turn, absent when the game ended.
    pub preview: Option<String>,
    pub game_over: bool,
    pub result: Option<CampaignResult>,
    /// AI-initiated battle, already installed as the active battle.
    pub ai_battle: Option<BattleState>,
}

/// Owns the campaign loop: the manager, the event catalog, the faction
/// AI and the seeded RNG all live here so every source of randomness
/// flows through one stream.
#[derive(Debug)]
pub struct TurnManager {
    manager: GameStateManager,
    events: EventSystem,
    ai: FactionAiEngine,
    rng: SeededRng,
}

impl TurnManager {
    pub fn new(
        manager: GameStateManager,
        events: EventSystem,
        ai: FactionAiEngine,
        seed: u64,
    ) -> Self {
        Self {
            manager,
            events,
            ai,
            rng: SeededRng::new(seed),
        }
    }

    pub fn manager(&self) -> &GameStateManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut GameStateManager {
        &mut self.manager
    }

    /// Open a turn: restore the action budget and recompute phase and
    /// season from the turn number.
    pub fn start_turn(&mut self) -> TurnStart {
        let turn = self.manager.state().turn;
        let phase = determine_phase(turn);
        let season = season_for_turn(turn);

        self.manager.reset_actions();
        self.manager.set_phase(phase);
        self.manager.set_season(season);

        TurnStart {
            turn,
            phase,
            season: season.to_string(),
            actions_available: ACTIONS_PER_TURN,
        }
    }

    /// Advance one battle turn of the active battle, spending this
    /// manager's RNG stream.
    pub fn battle_turn(
        &mut self,
        player_tactic: Option<&str>,
    ) -> Result<BattleTurnReport, StateError> {
        execute_battle_turn(&mut self.manager, &mut self.rng, player_tactic)
    }

    /// Close a turn. Pipeline order is fixed: food upkeep, scripted
    /// events, faction AI, game-over check, then the turn advances.
    /// The game-over check runs before the turn number changes so the
    /// turn limit fires on the boundary turn itself.
    pub fn end_turn(&mut self) -> Result<TurnEnd, StateError> {
        if self.manager.state().game_over {
            return Ok(TurnEnd {
                events: Vec::new(),
                changes: Vec::new(),
                preview: None,
                game_over: true,
                result: self.manager.state().result.clone(),
                ai_battle: None,
            });
        }

        let mut changes = self.process_food_upkeep()?;

        let events = self.events.process_turn(&mut self.manager, &mut self.rng);

        let mut executor = LoggedExecutor;
        let (ai_lines, ai_battle) =
            self.ai
                .run_turn(&mut self.manager, &mut executor, &mut self.rng);
        changes.extend(ai_lines);
        if let Some(battle) = &ai_battle {
            self.manager.set_battle(Some(battle.clone()));
        }

        if let Some(reason) = victory::check_game_over(self.manager.state()) {
            let result = victory::judge(self.manager.state());
            log::info!("campaign over: {reason} (grade {})", result.grade);
            self.manager
                .add_action_log(LogKind::System, format!("campaign over: {reason}"));
            self.manager.set_game_over(result.clone());
            return Ok(TurnEnd {
                events,
                changes,
                preview: None,
                game_over: true,
                result: Some(result),
                ai_battle,
            });
        }

        self.manager.advance_turn();
        let next = self.manager.state().turn;
        let preview = format!(
            "Turn {next}: {} ({:?} phase)",
            season_for_turn(next),
            determine_phase(next)
        );

        Ok(TurnEnd {
            events,
            changes,
            preview: Some(preview),
            game_over: false,
            result: None,
            ai_battle,
        })
    }

    /// Per-city food production and consumption for the player faction.
    ///
    /// Production scales the population-tier base by the agriculture
    /// grade; consumption is one food per ten troops. A city at zero
    /// food suffers desertion and a morale hit in the same pass.
    fn process_food_upkeep(&mut self) -> Result<Vec<String>, StateError> {
        let player = self.manager.player_faction()?.id.clone();
        let mut lines = Vec::new();

        for city_id in self.manager.state().cities_of(&player) {
            let city = self.manager.city(&city_id)?;
            let production = city.population.base_food_production()
                * agriculture_multiplier_pct(city.development.agriculture)
                / 100;
            let consumption = city.troops.total() / TROOPS_PER_FOOD;
            let new_food = (city.food + production - consumption).max(0);
            let infantry = city.troops.infantry;
            let morale = city.morale.get();

            self.manager.update_city(
                &city_id,
                CityPatch {
                    food: Some(new_food),
                    ..Default::default()
                },
            )?;

            if new_food == 0 {
                let deserters = infantry * STARVATION_DESERTION_PCT / 100;
                self.manager.add_city_troops(
                    &city_id,
                    crate::state::TroopCounts {
                        infantry: -deserters,
                        cavalry: 0,
                        navy: 0,
                    },
                )?;
                self.manager.update_city(
                    &city_id,
                    CityPatch {
                        morale: Some(morale - STARVATION_MORALE_PENALTY),
                        ..Default::default()
                    },
                )?;
                log::warn!("{city_id} is starving: {deserters} deserted");
                lines.push(format!(
                    "{city_id}: granaries empty, {deserters} troops deserted"
                ));
            } else if consumption > 0 && new_food < consumption * LOW_RESERVE_MULT {
                lines.push(format!(
                    "{city_id}: food reserves low ({new_food}, upkeep {consumption})"
                ));
            } else {
                lines.push(format!(
                    "{city_id}: food {new_food} (+{production}/-{consumption})"
                ));
            }
        }

        Ok(lines)
    }
}
