//! End-of-campaign detection and outcome grading.
//!
//! Both entry points are pure functions of the state so they can be
//! called speculatively (previews, AI lookahead) without side effects.

use crate::grade::OutcomeGrade;
use crate::state::{FlagKey, GameState, GeneralCondition};
use std::fmt;

/// Why the campaign ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOverReason {
    LeaderDead,
    LeaderCaptured,
    NoCitiesLeft,
    TurnLimitReached,
}

impl fmt::Display for GameOverReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            GameOverReason::LeaderDead => "the faction leader has fallen",
            GameOverReason::LeaderCaptured => "the faction leader is in enemy hands",
            GameOverReason::NoCitiesLeft => "no cities remain under our banner",
            GameOverReason::TurnLimitReached => "the campaign season has ended",
        };
        f.write_str(text)
    }
}

/// Check the three defeat conditions plus the turn limit.
///
/// Runs at end of turn before the turn number advances, so the limit
/// fires on the boundary turn itself.
pub fn check_game_over(state: &GameState) -> Option<GameOverReason> {
    let player = state.player_faction()?;

    if let Some(leader) = state.generals.get(&player.leader) {
        match leader.condition {
            GeneralCondition::Dead => return Some(GameOverReason::LeaderDead),
            GeneralCondition::Captive => return Some(GameOverReason::LeaderCaptured),
            _ => {}
        }
    }

    if state.cities_of(&player.id).is_empty() {
        return Some(GameOverReason::NoCitiesLeft);
    }

    if state.turn >= state.max_turns {
        return Some(GameOverReason::TurnLimitReached);
    }

    None
}

/// Grade a finished campaign.
///
/// The cascade is strict: each step builds on the one below it, so a
/// campaign that never won the decisive battle caps at D no matter how
/// many cities were taken afterwards.
pub fn judge(state: &GameState) -> crate::state::CampaignResult {
    let (grade, reason) = grade_with_reason(state);
    crate::state::CampaignResult {
        grade,
        reason: reason.to_string(),
    }
}

fn grade_with_reason(state: &GameState) -> (OutcomeGrade, &'static str) {
    let player = match state.player_faction() {
        Some(f) => f,
        None => return (OutcomeGrade::F, "no player faction"),
    };

    let leader_lost = state
        .generals
        .get(&player.leader)
        .map(|g| !g.condition.is_active())
        .unwrap_or(true);
    if leader_lost {
        return (OutcomeGrade::F, "the leader was lost");
    }
    if state.cities_of(&player.id).is_empty() {
        return (OutcomeGrade::F, "every city fell");
    }

    let decisive = state
        .flags
        .get(&FlagKey::DecisiveVictory)
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if !decisive {
        return (OutcomeGrade::D, "the decisive battle was never won");
    }

    let owns = |goal: &Option<String>| {
        goal.as_ref()
            .and_then(|id| state.cities.get(id))
            .map(|c| c.owner == player.id)
            .unwrap_or(false)
    };

    if !owns(&state.goals.primary_city) {
        return (OutcomeGrade::C, "victory in the field, but the primary objective stands");
    }

    let allied = state.diplomacy.has_any_alliance(&player.id)
        || state
            .flags
            .get(&FlagKey::AllianceSealed)
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
    if !allied {
        return (OutcomeGrade::B, "the primary objective fell, but we fought alone");
    }

    let flawless = owns(&state.goals.secondary_city) && state.lost_generals(&player.id).is_empty();
    if !flawless {
        return (OutcomeGrade::A, "a famous victory, sealed by alliance");
    }

    (
        OutcomeGrade::S,
        "total victory: every objective taken and every general brought home",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{FlagValue, GameState};
    use crate::testing::GameStateBuilder;

    fn base_state() -> GameState {
        GameStateBuilder::new()
            .with_faction("shu", true, "liubei")
            .with_faction("wei", false, "caocao")
            .with_faction("wu", false, "sunquan")
            .with_city("chengdu", "shu", 5000, 9000)
            .with_city("xiangyang", "wei", 5000, 9000)
            .with_city("xuchang", "wei", 5000, 9000)
            .with_general("liubei", "shu", "chengdu")
            .with_general("guanyu", "shu", "chengdu")
            .with_relation("shu", "wu", 65)
            .primary_city("xiangyang")
            .secondary_city("xuchang")
            .build()
    }

    fn set_decisive(state: &mut GameState) {
        state
            .flags
            .insert(FlagKey::DecisiveVictory, FlagValue::Bool(true));
    }

    fn capture(state: &mut GameState, city: &str) {
        state.cities.get_mut(city).unwrap().owner = "shu".to_string();
    }

    fn seal_alliance(state: &mut GameState) {
        state
            .diplomacy
            .relation_mut(&"shu".to_string(), &"wu".to_string())
            .unwrap()
            .is_alliance = true;
    }

    #[test]
    fn test_leader_dead_is_game_over_and_f() {
        let mut state = base_state();
        state.generals.get_mut("liubei").unwrap().condition = crate::state::GeneralCondition::Dead;
        assert_eq!(check_game_over(&state), Some(GameOverReason::LeaderDead));
        assert_eq!(judge(&state).grade, OutcomeGrade::F);
    }

    #[test]
    fn test_leader_captured_is_game_over_and_f() {
        let mut state = base_state();
        state.generals.get_mut("liubei").unwrap().condition =
            crate::state::GeneralCondition::Captive;
        assert_eq!(
            check_game_over(&state),
            Some(GameOverReason::LeaderCaptured)
        );
        assert_eq!(judge(&state).grade, OutcomeGrade::F);
    }

    #[test]
    fn test_cityless_faction_is_game_over_and_f() {
        let mut state = base_state();
        state.cities.get_mut("chengdu").unwrap().owner = "wei".to_string();
        assert_eq!(check_game_over(&state), Some(GameOverReason::NoCitiesLeft));
        assert_eq!(judge(&state).grade, OutcomeGrade::F);
    }

    #[test]
    fn test_turn_limit_fires_on_boundary_turn() {
        let mut state = base_state();
        state.turn = state.max_turns - 1;
        assert_eq!(check_game_over(&state), None);
        state.turn = state.max_turns;
        assert_eq!(
            check_game_over(&state),
            Some(GameOverReason::TurnLimitReached)
        );
    }

    #[test]
    fn test_no_decisive_victory_caps_at_d() {
        let mut state = base_state();
        // Captured cities and alliances do not matter below the cap.
        capture(&mut state, "xiangyang");
        capture(&mut state, "xuchang");
        seal_alliance(&mut state);
        let result = judge(&state);
        assert_eq!(result.grade, OutcomeGrade::D);
        assert!(result.reason.contains("decisive"));
    }

    #[test]
    fn test_decisive_victory_alone_is_c() {
        let mut state = base_state();
        set_decisive(&mut state);
        assert_eq!(judge(&state).grade, OutcomeGrade::C);
    }

    #[test]
    fn test_primary_objective_upgrades_to_b() {
        let mut state = base_state();
        set_decisive(&mut state);
        capture(&mut state, "xiangyang");
        assert_eq!(judge(&state).grade, OutcomeGrade::B);
    }

    #[test]
    fn test_alliance_upgrades_to_a() {
        let mut state = base_state();
        set_decisive(&mut state);
        capture(&mut state, "xiangyang");
        seal_alliance(&mut state);
        assert_eq!(judge(&state).grade, OutcomeGrade::A);
    }

    #[test]
    fn test_alliance_flag_counts_like_a_live_alliance() {
        let mut state = base_state();
        set_decisive(&mut state);
        capture(&mut state, "xiangyang");
        state
            .flags
            .insert(FlagKey::AllianceSealed, FlagValue::Bool(true));
        assert_eq!(judge(&state).grade, OutcomeGrade::A);
    }

    #[test]
    fn test_full_sweep_with_no_losses_is_s() {
        let mut state = base_state();
        set_decisive(&mut state);
        capture(&mut state, "xiangyang");
        capture(&mut state, "xuchang");
        seal_alliance(&mut state);
        assert_eq!(judge(&state).grade, OutcomeGrade::S);
    }

    #[test]
    fn test_captive_general_blocks_s() {
        let mut state = base_state();
        set_decisive(&mut state);
        capture(&mut state, "xiangyang");
        capture(&mut state, "xuchang");
        seal_alliance(&mut state);
        state.generals.get_mut("guanyu").unwrap().condition =
            crate::state::GeneralCondition::Captive;
        assert_eq!(judge(&state).grade, OutcomeGrade::A);
    }

    #[test]
    fn test_wounded_general_does_not_block_s() {
        let mut state = base_state();
        set_decisive(&mut state);
        capture(&mut state, "xiangyang");
        capture(&mut state, "xuchang");
        seal_alliance(&mut state);
        state.generals.get_mut("guanyu").unwrap().condition =
            crate::state::GeneralCondition::Wounded;
        assert_eq!(judge(&state).grade, OutcomeGrade::S);
    }

    #[test]
    fn test_missing_secondary_objective_blocks_s() {
        let mut state = base_state();
        set_decisive(&mut state);
        capture(&mut state, "xiangyang");
        seal_alliance(&mut state);
        assert_eq!(judge(&state).grade, OutcomeGrade::A);
    }
}
