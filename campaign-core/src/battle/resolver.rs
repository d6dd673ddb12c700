//! Orchestrates one battle turn and all post-battle bookkeeping.
//!
//! The resolver routes the player's chosen tactic to whichever side the
//! player occupies and the fixed heuristic to the other side, applies
//! exactly one clash per call, and on termination runs the post-battle
//! pass exactly once: survivor returns, capture bookkeeping, ownership
//! transfer for sieges, the decisive-victory flag, and the log line.

use crate::battle::engine;
use crate::grade::Grade;
use crate::manager::{CityPatch, GameStateManager, GeneralPatch, StateError};
use crate::rng::SeededRng;
use crate::state::{
    BattleResult, BattleSide, BattleState, CityId, FlagKey, FlagValue, GeneralCondition, LogKind,
    TroopCounts,
};

/// Outcome of one resolver call.
#[derive(Debug, Clone)]
pub struct BattleTurnReport {
    /// Log lines produced by this clash.
    pub lines: Vec<String>,
    pub is_over: bool,
    pub result: Option<BattleResult>,
}

/// Best martial grade among a side's still-active generals. Stale or
/// missing general references are skipped. Sides with no usable
/// commander fight at grade C.
fn side_commander_grade(manager: &GameStateManager, side: &BattleSide) -> Grade {
    side.generals
        .iter()
        .filter_map(|id| manager.general(id).ok())
        .filter(|g| g.condition.is_active())
        .map(|g| g.abilities.martial)
        .max()
        .unwrap_or(Grade::C)
}

/// Resolve the player's tactic choice for this clash. Unknown ids are a
/// caller bug; a known tactic that is gated out (wind, water) falls
/// back to the heuristic.
fn resolve_player_tactic(
    battle: &BattleState,
    chosen: Option<&str>,
) -> Result<&'static engine::TacticDef, StateError> {
    let id = match chosen {
        Some(id) => id.to_string(),
        None => engine::select_attacker_tactic(battle),
    };
    let def = engine::tactic(&id).ok_or(StateError::UnknownTactic { id: id.clone() })?;
    if engine::usable(def, battle) {
        Ok(def)
    } else {
        log::warn!("tactic {id} not usable here, falling back to heuristic");
        let fallback = engine::select_attacker_tactic(battle);
        engine::tactic(&fallback).ok_or(StateError::UnknownTactic { id: fallback })
    }
}

/// Apply exactly one clash to the active battle.
///
/// `player_tactic` is the player's choice for whichever side they
/// occupy (attacker or defender); `None` delegates to the heuristic.
/// When the clash ends the battle, post-battle bookkeeping runs and the
/// active-battle slot is cleared before returning.
pub fn execute_battle_turn(
    manager: &mut GameStateManager,
    rng: &mut SeededRng,
    player_tactic: Option<&str>,
) -> Result<BattleTurnReport, StateError> {
    // Validate everything against the in-place battle first so an
    // invalid tactic id cannot destroy the active battle.
    let battle_ref = manager
        .state()
        .active_battle
        .as_ref()
        .ok_or(StateError::NoActiveBattle)?;
    let attacker_is_player = manager.faction(&battle_ref.attacker.faction)?.is_player;

    let (attacker_tactic, defender_tactic) = if attacker_is_player {
        (
            resolve_player_tactic(battle_ref, player_tactic)?,
            engine::tactic(&engine::select_attacker_tactic(battle_ref))
                .unwrap_or(&engine::TACTICS[0]),
        )
    } else {
        (
            engine::tactic(&engine::select_attacker_tactic(battle_ref))
                .unwrap_or(&engine::TACTICS[0]),
            resolve_player_tactic(battle_ref, player_tactic)?,
        )
    };

    let mut battle = manager.take_battle()?;

    let attacker_commander = side_commander_grade(manager, &battle.attacker);
    let defender_commander = side_commander_grade(manager, &battle.defender);

    let log_start = battle.log.len();
    engine::execute_clash(
        &mut battle,
        attacker_tactic,
        defender_tactic,
        attacker_commander,
        defender_commander,
        rng,
    );
    battle.battle_turn += 1;

    if let Some(result) = engine::check_battle_end(&battle, rng) {
        battle.is_over = true;
        battle.result = Some(result);
        process_battle_result(manager, &mut battle)?;
        let report = BattleTurnReport {
            lines: battle.log[log_start..].to_vec(),
            is_over: true,
            result: battle.result,
        };
        // Battle stays taken: the active-battle slot is now clear.
        return Ok(report);
    }

    let lines = battle.log[log_start..].to_vec();
    manager.set_battle(Some(battle));
    Ok(BattleTurnReport {
        lines,
        is_over: false,
        result: None,
    })
}

/// Return city for a side's survivors after a battlefield fight.
///
/// A defeated (or drawn) attacker goes back to the city recorded in the
/// most recent march log entry. Otherwise the nearest adjacent city
/// still owned by the faction is used. `None` means the generals stay
/// at the battlefield — an explicit fallback, not a failure.
fn return_city(
    manager: &GameStateManager,
    battle: &BattleState,
    side: &BattleSide,
    defeated_attacker: bool,
) -> Option<CityId> {
    if defeated_attacker {
        let march_origin = manager
            .state()
            .action_log
            .iter()
            .rev()
            .find_map(|entry| match &entry.kind {
                LogKind::March { from, .. } => Some(from.clone()),
                _ => None,
            });
        if let Some(from) = march_origin {
            if manager.city(&from).is_ok() {
                return Some(from);
            }
        }
    }

    let battlefield = manager.battlefield(&battle.location).ok()?;
    battlefield
        .adjacent_cities
        .iter()
        .find(|id| {
            manager
                .city(id)
                .map(|c| c.owner == side.faction)
                .unwrap_or(false)
        })
        .cloned()
}

/// Move a side's surviving, non-captive generals and troops home after
/// a battlefield fight.
fn return_side_home(
    manager: &mut GameStateManager,
    battle: &BattleState,
    side: &BattleSide,
    defeated_attacker: bool,
) -> Result<(), StateError> {
    let destination = return_city(manager, battle, side, defeated_attacker);

    for general_id in &side.generals {
        let general = match manager.general(general_id) {
            Ok(g) => g,
            // Already removed or renamed mid-turn: skip.
            Err(_) => continue,
        };
        if !general.condition.is_active() {
            continue;
        }
        let location = match &destination {
            Some(city) => city.clone(),
            None => battle.location.clone(),
        };
        manager.update_general(
            general_id,
            GeneralPatch {
                location: Some(location),
                ..Default::default()
            },
        )?;
    }

    if side.troops > 0 {
        if let Some(city) = &destination {
            manager.add_city_troops(
                city,
                TroopCounts {
                    infantry: side.troops,
                    cavalry: 0,
                    navy: 0,
                },
            )?;
        }
    }

    Ok(())
}

/// Post-battle bookkeeping. Runs exactly once per battle termination;
/// the caller clears the active-battle slot.
pub fn process_battle_result(
    manager: &mut GameStateManager,
    battle: &mut BattleState,
) -> Result<(), StateError> {
    let Some(result) = battle.result.clone() else {
        return Ok(());
    };

    let player_id = manager
        .state()
        .player_faction()
        .map(|f| f.id.clone());

    // Decisive battlefield won by the player unlocks the scenario flag.
    if let (Some(decisive), Some(player)) = (
        manager.state().goals.decisive_battlefield.clone(),
        player_id,
    ) {
        if battle.location == decisive && result.winner.as_deref() == Some(player.as_str()) {
            manager.set_flag(FlagKey::DecisiveVictory, FlagValue::Bool(true));
        }
    }

    // Captures first so returned-home routing skips captives.
    for general_id in &result.captured_generals {
        match manager.update_general(
            general_id,
            GeneralPatch {
                condition: Some(GeneralCondition::Captive),
                ..Default::default()
            },
        ) {
            Ok(()) => {}
            Err(StateError::NotFound { .. }) => {
                log::warn!("captured general {general_id} no longer exists, skipping");
            }
            Err(e) => return Err(e),
        }
    }

    if battle.siege {
        // City siege: generals stay in place; the defending garrison is
        // rescaled to the surviving/initial ratio, and ownership moves
        // to the winner if different from the incumbent.
        let city_id = battle.location.clone();
        match manager.city(&city_id) {
            Ok(city) => {
                let ratio = battle.defender.survivor_ratio_pct();
                let scaled = TroopCounts {
                    infantry: city.troops.infantry * ratio / 100,
                    cavalry: city.troops.cavalry * ratio / 100,
                    navy: city.troops.navy * ratio / 100,
                };
                let incumbent = city.owner.clone();
                let new_owner = match &result.winner {
                    Some(winner) if *winner != incumbent => Some(winner.clone()),
                    _ => None,
                };
                manager.update_city(
                    &city_id,
                    CityPatch {
                        owner: new_owner.clone(),
                        troops: Some(scaled),
                        ..Default::default()
                    },
                )?;
                if new_owner.is_some() {
                    if let Some(r) = battle.result.as_mut() {
                        r.territory_change = Some(city_id.clone());
                    }
                }
            }
            Err(_) => {
                log::warn!("siege location {city_id} no longer exists, skipping transfer");
            }
        }
    } else {
        // Battlefield fight: both sides route home.
        let attacker_defeated =
            result.is_draw() || result.loser.as_deref() == Some(battle.attacker.faction.as_str());
        let attacker = battle.attacker.clone();
        let defender = battle.defender.clone();
        return_side_home(manager, battle, &attacker, attacker_defeated)?;
        return_side_home(manager, battle, &defender, false)?;
    }

    let line = match (&result.winner, &result.loser) {
        (Some(winner), Some(loser)) => format!(
            "Battle of {} ends: {} defeats {} ({} captured)",
            battle.location,
            winner,
            loser,
            result.captured_generals.len()
        ),
        _ => format!("Battle of {} ends in a draw", battle.location),
    };
    manager.add_action_log(LogKind::Battle, line);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{GeneralCondition, WindDirection};
    use crate::testing::{field_battle, GameStateBuilder};

    fn battle_manager() -> GameStateManager {
        GameStateManager::new(
            GameStateBuilder::new()
                .with_faction("shu", true, "liubei")
                .with_faction("wei", false, "caocao")
                .with_city("chengdu", "shu", 5000, 9000)
                .with_city("jiangling", "shu", 2000, 4000)
                .with_city("xuchang", "wei", 8000, 9000)
                .with_general("liubei", "shu", "chengdu")
                .with_general("guanyu", "shu", "chengdu")
                .with_general_martial("guanyu", Grade::S)
                .with_general("caocao", "wei", "xuchang")
                .with_battlefield("chibi", &["jiangling", "xuchang"])
                .build(),
        )
    }

    #[test]
    fn test_no_active_battle_is_error() {
        let mut m = battle_manager();
        let mut rng = SeededRng::new(1);
        assert!(matches!(
            execute_battle_turn(&mut m, &mut rng, None),
            Err(StateError::NoActiveBattle)
        ));
    }

    #[test]
    fn test_one_clash_per_call() {
        let mut m = battle_manager();
        let mut rng = SeededRng::new(1);
        let mut battle = field_battle("wei", "shu", 50_000, 50_000);
        battle.location = "chibi".to_string();
        battle.defender.generals = vec!["guanyu".to_string()];
        battle.attacker.generals = vec!["caocao".to_string()];
        m.set_battle(Some(battle));

        let report = execute_battle_turn(&mut m, &mut rng, Some("hold")).unwrap();
        assert!(!report.is_over);
        assert_eq!(m.state().active_battle.as_ref().unwrap().battle_turn, 1);
        assert_eq!(report.lines.len(), 1);
    }

    #[test]
    fn test_player_tactic_routed_to_defending_side() {
        let mut m = battle_manager();
        let mut rng = SeededRng::new(1);
        // Player (shu) defends; AI (wei) attacks.
        let mut battle = field_battle("wei", "shu", 40_000, 40_000);
        battle.location = "chibi".to_string();
        m.set_battle(Some(battle));

        let report = execute_battle_turn(&mut m, &mut rng, Some("ambush")).unwrap();
        // Defender line mentions the player's chosen tactic.
        assert!(report.lines[0].contains("shu uses Ambush"));
    }

    #[test]
    fn test_unknown_tactic_is_error() {
        let mut m = battle_manager();
        let mut rng = SeededRng::new(1);
        let mut battle = field_battle("wei", "shu", 40_000, 40_000);
        battle.location = "chibi".to_string();
        m.set_battle(Some(battle));

        assert!(matches!(
            execute_battle_turn(&mut m, &mut rng, Some("teleport")),
            Err(StateError::UnknownTactic { .. })
        ));
    }

    #[test]
    fn test_battle_runs_to_termination_and_clears_slot() {
        let mut m = battle_manager();
        let mut rng = SeededRng::new(7);
        let mut battle = field_battle("wei", "shu", 30_000, 30_000);
        battle.location = "chibi".to_string();
        battle.wind = WindDirection::Southeast;
        battle.available_tactics.push("fire_attack".to_string());
        battle.defender.generals = vec!["guanyu".to_string()];
        m.set_battle(Some(battle));

        let mut last = None;
        for _ in 0..20 {
            let report = execute_battle_turn(&mut m, &mut rng, Some("fire_attack")).unwrap();
            if report.is_over {
                last = report.result;
                break;
            }
        }

        let result = last.expect("battle should terminate within the turn cap");
        assert!(m.state().active_battle.is_none());
        // Fire attacks every turn against the heuristic: the player wins.
        assert_eq!(result.winner.as_deref(), Some("shu"));
        // Result line landed in the action log.
        assert!(m
            .state()
            .action_log
            .iter()
            .any(|e| e.kind == LogKind::Battle));
    }

    #[test]
    fn test_decisive_victory_flag_set() {
        let mut m = GameStateManager::new(
            GameStateBuilder::new()
                .with_faction("shu", true, "liubei")
                .with_faction("wei", false, "caocao")
                .with_city("jiangling", "shu", 2000, 4000)
                .with_battlefield("chibi", &["jiangling"])
                .decisive_battlefield("chibi")
                .build(),
        );

        let mut battle = field_battle("wei", "shu", 10_000, 10_000);
        battle.location = "chibi".to_string();
        battle.attacker.troops = 0; // defender (player) has won
        battle.result = engine::check_battle_end(&battle, &mut SeededRng::new(1));

        process_battle_result(&mut m, &mut battle).unwrap();
        assert!(m.flag_bool(&FlagKey::DecisiveVictory));
    }

    #[test]
    fn test_survivors_return_to_adjacent_friendly_city() {
        let mut m = battle_manager();
        let mut battle = field_battle("wei", "shu", 10_000, 20_000);
        battle.location = "chibi".to_string();
        battle.defender.generals = vec!["guanyu".to_string()];
        battle.defender.troops = 15_000;
        battle.attacker.troops = 0;
        battle.result = Some(BattleResult {
            winner: Some("shu".to_string()),
            loser: Some("wei".to_string()),
            captured_generals: vec![],
            territory_change: None,
        });

        let before = m.city("jiangling").unwrap().troops.infantry;
        process_battle_result(&mut m, &mut battle).unwrap();

        // Nearest adjacent shu city is jiangling.
        assert_eq!(m.general("guanyu").unwrap().location, "jiangling");
        assert_eq!(
            m.city("jiangling").unwrap().troops.infantry,
            before + 15_000
        );
    }

    #[test]
    fn test_defeated_attacker_routes_via_march_log() {
        let mut m = battle_manager();
        m.add_action_log(
            LogKind::March {
                from: "xuchang".to_string(),
                to: "chibi".to_string(),
            },
            "wei marches on chibi",
        );

        let mut battle = field_battle("wei", "shu", 20_000, 20_000);
        battle.location = "chibi".to_string();
        battle.attacker.generals = vec!["caocao".to_string()];
        // A draw sends the attacker back where the march started.
        battle.attacker.troops = 4_000;
        battle.defender.troops = 4_000;
        battle.result = Some(BattleResult::draw());

        process_battle_result(&mut m, &mut battle).unwrap();
        assert_eq!(m.general("caocao").unwrap().location, "xuchang");
    }

    #[test]
    fn test_no_friendly_city_generals_stay_put() {
        // All adjacent cities belong to shu or wei; make wu stranded.
        let mut state = battle_manager().state().clone();
        state.factions.insert(
            "wu".to_string(),
            crate::state::Faction {
                id: "wu".to_string(),
                name: "Wu".to_string(),
                is_player: false,
                leader: "sunquan".to_string(),
            },
        );
        state.generals.insert(
            "sunquan".to_string(),
            crate::state::General::new("sunquan", "Sun Quan", "wu", "chibi"),
        );
        let mut m = GameStateManager::new(state);

        let mut battle = field_battle("wu", "shu", 10_000, 10_000);
        battle.location = "chibi".to_string();
        battle.attacker.generals = vec!["sunquan".to_string()];
        battle.attacker.troops = 2_000;
        battle.defender.troops = 2_000;
        battle.result = Some(BattleResult::draw());

        process_battle_result(&mut m, &mut battle).unwrap();
        // No march entry, no adjacent wu city: stays at the battlefield.
        assert_eq!(m.general("sunquan").unwrap().location, "chibi");
    }

    #[test]
    fn test_siege_transfers_ownership_and_rescales_garrison() {
        let mut m = battle_manager();
        let mut battle = field_battle("wei", "shu", 10_000, 10_000);
        battle.location = "jiangling".to_string();
        battle.siege = true;
        battle.defender.initial_troops = 10_000;
        battle.defender.troops = 2_500; // 25% survive
        battle.attacker.troops = 6_000;
        battle.result = Some(BattleResult {
            winner: Some("wei".to_string()),
            loser: Some("shu".to_string()),
            captured_generals: vec![],
            territory_change: None,
        });

        process_battle_result(&mut m, &mut battle).unwrap();

        let city = m.city("jiangling").unwrap();
        assert_eq!(city.owner, "wei");
        // 2000 infantry scaled to 25%
        assert_eq!(city.troops.infantry, 500);
        assert_eq!(
            battle.result.unwrap().territory_change.as_deref(),
            Some("jiangling")
        );
    }

    #[test]
    fn test_captured_generals_become_captive() {
        let mut m = battle_manager();
        let mut battle = field_battle("wei", "shu", 10_000, 10_000);
        battle.location = "chibi".to_string();
        battle.defender.generals = vec!["guanyu".to_string()];
        battle.result = Some(BattleResult {
            winner: Some("wei".to_string()),
            loser: Some("shu".to_string()),
            captured_generals: vec!["guanyu".to_string(), "ghost".to_string()],
            territory_change: None,
        });

        // Unknown captured id is skipped, not fatal.
        process_battle_result(&mut m, &mut battle).unwrap();
        assert_eq!(
            m.general("guanyu").unwrap().condition,
            GeneralCondition::Captive
        );
        // Captive generals do not route home.
        assert_eq!(m.general("guanyu").unwrap().location, "chengdu");
    }
}
