//! Tactic-resolution rules for one simulated clash.
//!
//! A clash applies both sides' chosen tactics simultaneously against
//! the pre-round troop counts: attack multiplier × commander ability ×
//! morale factor × bounded random variance. Wind direction gates the
//! fire tactics; fire ships additionally need water.

use crate::grade::Grade;
use crate::rng::SeededRng;
use crate::state::{BattleResult, BattleState, TacticId, Terrain, WindDirection};

/// Portion of a side's troops committed per clash (divisor).
const ENGAGEMENT_DIVISOR: i64 = 10;

/// Random variance band applied to each side's damage, in percent.
const VARIANCE_MIN_PCT: i64 = 90;
const VARIANCE_MAX_PCT: i64 = 110;

/// Losses above this share of the engaged force cost extra morale.
const HEAVY_LOSS_EXTRA_MORALE: i32 = 5;

/// Capture probability per losing-side general at battle end.
const CAPTURE_CHANCE: f64 = 0.35;

/// A selectable battle move.
#[derive(Debug, Clone, Copy)]
pub struct TacticDef {
    pub id: &'static str,
    pub name: &'static str,
    /// Attack multiplier in percent (100 = neutral).
    pub attack_mult_pct: i64,
    /// Requires a water location (coast or river).
    pub naval: bool,
    /// Wind direction this tactic is gated on, if any.
    pub needs_wind: Option<WindDirection>,
    /// Morale damage inflicted on the opposing side.
    pub morale_hit: i32,
}

/// Built-in tactic table. Content selects a subset per battle through
/// `BattleState::available_tactics`.
pub const TACTICS: &[TacticDef] = &[
    TacticDef {
        id: "hold",
        name: "Hold the line",
        attack_mult_pct: 80,
        naval: false,
        needs_wind: None,
        morale_hit: 2,
    },
    TacticDef {
        id: "volley",
        name: "Arrow volley",
        attack_mult_pct: 110,
        naval: false,
        needs_wind: None,
        morale_hit: 3,
    },
    TacticDef {
        id: "charge",
        name: "Frontal charge",
        attack_mult_pct: 120,
        naval: false,
        needs_wind: None,
        morale_hit: 5,
    },
    TacticDef {
        id: "ambush",
        name: "Ambush",
        attack_mult_pct: 140,
        naval: false,
        needs_wind: None,
        morale_hit: 8,
    },
    TacticDef {
        id: "fire_attack",
        name: "Fire attack",
        attack_mult_pct: 180,
        naval: false,
        needs_wind: Some(WindDirection::Southeast),
        morale_hit: 12,
    },
    TacticDef {
        id: "fire_ship",
        name: "Fire ships",
        attack_mult_pct: 200,
        naval: true,
        needs_wind: Some(WindDirection::Southeast),
        morale_hit: 15,
    },
];

/// Look up a tactic definition by id.
pub fn tactic(id: &str) -> Option<&'static TacticDef> {
    TACTICS.iter().find(|t| t.id == id)
}

/// Whether a tactic may be used in this battle: it must be offered by
/// the battle, its wind gate must match, and naval tactics need water.
pub fn usable(def: &TacticDef, battle: &BattleState) -> bool {
    if !battle.available_tactics.iter().any(|t| t == def.id) {
        return false;
    }
    if let Some(wind) = def.needs_wind {
        if battle.wind != wind {
            return false;
        }
    }
    if def.naval && !matches!(battle.terrain, Terrain::Coast | Terrain::River) {
        return false;
    }
    true
}

/// Attack factor for the acting commander's ability grade, in percent.
fn grade_attack_pct(grade: Grade) -> i64 {
    match grade {
        Grade::D => 80,
        Grade::C => 100,
        Grade::B => 115,
        Grade::A => 130,
        Grade::S => 150,
    }
}

/// Morale factor in percent: 50% at zero morale, 100% at full.
fn morale_pct(morale: i32) -> i64 {
    50 + morale as i64 / 2
}

/// Damage a side deals this clash, from its pre-round strength.
fn clash_damage(
    troops: i64,
    def: &TacticDef,
    commander: Grade,
    morale: i32,
    rng: &mut SeededRng,
) -> i64 {
    let engaged = troops / ENGAGEMENT_DIVISOR;
    let variance = rng.int_in(VARIANCE_MIN_PCT, VARIANCE_MAX_PCT);
    engaged * def.attack_mult_pct * grade_attack_pct(commander) * morale_pct(morale) * variance
        / 100_000_000
}

/// Resolve one simultaneous clash, mutating both sides' troops and
/// morale. The caller advances `battle_turn` and checks for battle end.
pub fn execute_clash(
    battle: &mut BattleState,
    attacker_tactic: &TacticDef,
    defender_tactic: &TacticDef,
    attacker_commander: Grade,
    defender_commander: Grade,
    rng: &mut SeededRng,
) {
    let attacker_troops = battle.attacker.troops;
    let defender_troops = battle.defender.troops;

    let damage_to_defender = clash_damage(
        attacker_troops,
        attacker_tactic,
        attacker_commander,
        battle.attacker.morale.get(),
        rng,
    );
    let damage_to_attacker = clash_damage(
        defender_troops,
        defender_tactic,
        defender_commander,
        battle.defender.morale.get(),
        rng,
    );

    battle.defender.troops = (defender_troops - damage_to_defender).max(0);
    battle.attacker.troops = (attacker_troops - damage_to_attacker).max(0);

    let mut defender_morale_hit = attacker_tactic.morale_hit;
    if damage_to_defender > defender_troops / (ENGAGEMENT_DIVISOR / 2) {
        defender_morale_hit += HEAVY_LOSS_EXTRA_MORALE;
    }
    let mut attacker_morale_hit = defender_tactic.morale_hit;
    if damage_to_attacker > attacker_troops / (ENGAGEMENT_DIVISOR / 2) {
        attacker_morale_hit += HEAVY_LOSS_EXTRA_MORALE;
    }
    battle.defender.morale.add(-defender_morale_hit);
    battle.attacker.morale.add(-attacker_morale_hit);

    battle.log.push(format!(
        "{} uses {} ({} casualties) / {} uses {} ({} casualties)",
        battle.attacker.faction,
        attacker_tactic.name,
        damage_to_attacker,
        battle.defender.faction,
        defender_tactic.name,
        damage_to_defender,
    ));

    log::debug!(
        "clash at {}: {} -{} vs {} -{}",
        battle.location,
        battle.attacker.faction,
        damage_to_attacker,
        battle.defender.faction,
        damage_to_defender
    );
}

/// Fixed heuristic choice for the AI-controlled side: the usable tactic
/// with the highest attack multiplier, falling back to holding the line.
pub fn select_attacker_tactic(battle: &BattleState) -> TacticId {
    TACTICS
        .iter()
        .filter(|t| usable(t, battle))
        .max_by_key(|t| t.attack_mult_pct)
        .map(|t| t.id.to_string())
        .unwrap_or_else(|| "hold".to_string())
}

/// Check whether the battle is over and, if so, build the result.
///
/// Terminal conditions: a side's troops reach zero, the turn cap is
/// reached (higher survivor ratio wins, equal is a draw), or a scripted
/// rout names the loser. Losing-side generals are captured with a fixed
/// per-general probability drawn through the injected RNG.
pub fn check_battle_end(battle: &BattleState, rng: &mut SeededRng) -> Option<BattleResult> {
    let (winner, loser) = if let Some(routed) = &battle.scripted_rout {
        if *routed == battle.attacker.faction {
            (Some(&battle.defender), Some(&battle.attacker))
        } else {
            (Some(&battle.attacker), Some(&battle.defender))
        }
    } else if battle.attacker.troops <= 0 && battle.defender.troops <= 0 {
        (None, None)
    } else if battle.defender.troops <= 0 {
        (Some(&battle.attacker), Some(&battle.defender))
    } else if battle.attacker.troops <= 0 {
        (Some(&battle.defender), Some(&battle.attacker))
    } else if battle.battle_turn >= battle.max_battle_turns {
        let a = battle.attacker.survivor_ratio_pct();
        let d = battle.defender.survivor_ratio_pct();
        if a > d {
            (Some(&battle.attacker), Some(&battle.defender))
        } else if d > a {
            (Some(&battle.defender), Some(&battle.attacker))
        } else {
            (None, None)
        }
    } else {
        return None;
    };

    let mut captured = Vec::new();
    if let Some(losing) = loser {
        for general in &losing.generals {
            if rng.chance(CAPTURE_CHANCE) {
                captured.push(general.clone());
            }
        }
    }

    Some(BattleResult {
        winner: winner.map(|s| s.faction.clone()),
        loser: loser.map(|s| s.faction.clone()),
        captured_generals: captured,
        territory_change: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::field_battle;

    #[test]
    fn test_tactic_table_lookup() {
        assert_eq!(tactic("fire_attack").unwrap().attack_mult_pct, 180);
        assert_eq!(tactic("fire_ship").unwrap().attack_mult_pct, 200);
        assert!(tactic("teleport").is_none());
    }

    #[test]
    fn test_wind_gates_fire_tactics() {
        let mut battle = field_battle("wei", "shu", 10_000, 10_000);
        battle.available_tactics = vec!["charge".to_string(), "fire_attack".to_string()];

        battle.wind = WindDirection::Northwest;
        assert!(!usable(tactic("fire_attack").unwrap(), &battle));

        battle.wind = WindDirection::Southeast;
        assert!(usable(tactic("fire_attack").unwrap(), &battle));
    }

    #[test]
    fn test_fire_ship_needs_water() {
        let mut battle = field_battle("wei", "shu", 10_000, 10_000);
        battle.available_tactics = vec!["fire_ship".to_string()];
        battle.wind = WindDirection::Southeast;

        battle.terrain = Terrain::Plains;
        assert!(!usable(tactic("fire_ship").unwrap(), &battle));

        battle.terrain = Terrain::River;
        assert!(usable(tactic("fire_ship").unwrap(), &battle));
    }

    #[test]
    fn test_heuristic_prefers_highest_multiplier() {
        let mut battle = field_battle("wei", "shu", 10_000, 10_000);
        battle.available_tactics = vec![
            "hold".to_string(),
            "charge".to_string(),
            "fire_attack".to_string(),
        ];

        battle.wind = WindDirection::Southeast;
        assert_eq!(select_attacker_tactic(&battle), "fire_attack");

        // Fire gated out: next best.
        battle.wind = WindDirection::Calm;
        assert_eq!(select_attacker_tactic(&battle), "charge");
    }

    #[test]
    fn test_clash_damages_both_sides() {
        let mut battle = field_battle("wei", "shu", 10_000, 10_000);
        let mut rng = SeededRng::new(3);

        execute_clash(
            &mut battle,
            tactic("charge").unwrap(),
            tactic("hold").unwrap(),
            Grade::B,
            Grade::B,
            &mut rng,
        );

        assert!(battle.attacker.troops < 10_000);
        assert!(battle.defender.troops < 10_000);
        // The charging side deals more damage than the holding side.
        assert!(battle.defender.troops < battle.attacker.troops);
        assert_eq!(battle.log.len(), 1);
    }

    #[test]
    fn test_clash_is_seed_deterministic() {
        let run = |seed: u64| {
            let mut battle = field_battle("wei", "shu", 10_000, 10_000);
            let mut rng = SeededRng::new(seed);
            execute_clash(
                &mut battle,
                tactic("charge").unwrap(),
                tactic("volley").unwrap(),
                Grade::A,
                Grade::C,
                &mut rng,
            );
            (battle.attacker.troops, battle.defender.troops)
        };

        assert_eq!(run(42), run(42));
    }

    #[test]
    fn test_battle_end_on_annihilation() {
        let mut battle = field_battle("wei", "shu", 10_000, 10_000);
        let mut rng = SeededRng::new(1);

        assert!(check_battle_end(&battle, &mut rng).is_none());

        battle.defender.troops = 0;
        let result = check_battle_end(&battle, &mut rng).unwrap();
        assert_eq!(result.winner.as_deref(), Some("wei"));
        assert_eq!(result.loser.as_deref(), Some("shu"));
    }

    #[test]
    fn test_battle_end_on_turn_cap() {
        let mut battle = field_battle("wei", "shu", 10_000, 10_000);
        let mut rng = SeededRng::new(1);
        battle.battle_turn = battle.max_battle_turns;

        battle.attacker.troops = 8_000;
        battle.defender.troops = 5_000;
        let result = check_battle_end(&battle, &mut rng).unwrap();
        assert_eq!(result.winner.as_deref(), Some("wei"));

        // Equal survivor ratios: draw.
        battle.defender.troops = 8_000;
        let result = check_battle_end(&battle, &mut rng).unwrap();
        assert!(result.is_draw());
        assert!(result.captured_generals.is_empty());
    }

    #[test]
    fn test_scripted_rout_ends_battle() {
        let mut battle = field_battle("wei", "shu", 10_000, 10_000);
        let mut rng = SeededRng::new(1);
        battle.scripted_rout = Some("wei".to_string());

        let result = check_battle_end(&battle, &mut rng).unwrap();
        assert_eq!(result.winner.as_deref(), Some("shu"));
        assert_eq!(result.loser.as_deref(), Some("wei"));
    }
}
