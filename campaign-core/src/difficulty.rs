//! Difficulty presets, applied once to a freshly instantiated campaign.
//!
//! A preset rescales the contested city's garrison and the player's
//! starting food, then records its tuning knobs as flags so events and
//! the AI can read them later without knowing which preset was chosen.

use crate::manager::{CityPatch, GameStateManager, StateError};
use crate::state::{FlagKey, FlagValue, TroopCounts};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl Difficulty {
    pub fn name(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Normal => "normal",
            Difficulty::Hard => "hard",
        }
    }

    /// Scale applied to the contested city's garrison, in percent.
    fn troop_scale_pct(self) -> i64 {
        match self {
            Difficulty::Easy => 70,
            Difficulty::Normal => 100,
            Difficulty::Hard => 130,
        }
    }

    /// Scale applied to the player's starting food, in percent.
    fn food_scale_pct(self) -> i64 {
        match self {
            Difficulty::Easy => 150,
            Difficulty::Normal => 100,
            Difficulty::Hard => 80,
        }
    }

    /// Troop-loss percentage at which a side collapses.
    fn collapse_ratio_pct(self) -> i64 {
        match self {
            Difficulty::Easy => 20,
            Difficulty::Normal => 30,
            Difficulty::Hard => 40,
        }
    }

    /// Morale penalty applied by collapse-adjacent events.
    fn morale_penalty(self) -> i64 {
        match self {
            Difficulty::Easy => 10,
            Difficulty::Normal => 15,
            Difficulty::Hard => 20,
        }
    }

    /// Minimum tolerated popular-support level.
    fn support_floor(self) -> i64 {
        match self {
            Difficulty::Easy => 20,
            Difficulty::Normal => 30,
            Difficulty::Hard => 40,
        }
    }
}

/// Apply a preset to a freshly built campaign. Idempotence is not
/// required; this runs exactly once, before turn 1.
pub fn apply(manager: &mut GameStateManager, difficulty: Difficulty) -> Result<(), StateError> {
    let pct = difficulty.troop_scale_pct();
    if let Some(contested) = manager.state().goals.contested_city.clone() {
        let troops = manager.city(&contested)?.troops;
        manager.update_city(
            &contested,
            CityPatch {
                troops: Some(TroopCounts {
                    infantry: troops.infantry * pct / 100,
                    cavalry: troops.cavalry * pct / 100,
                    navy: troops.navy * pct / 100,
                }),
                ..Default::default()
            },
        )?;
    }

    let food_pct = difficulty.food_scale_pct();
    let player = manager.player_faction()?.id.clone();
    for city_id in manager.state().cities_of(&player) {
        let food = manager.city(&city_id)?.food;
        manager.update_city(
            &city_id,
            CityPatch {
                food: Some(food * food_pct / 100),
                ..Default::default()
            },
        )?;
    }

    manager.set_flag(
        FlagKey::Difficulty,
        FlagValue::Text(difficulty.name().to_string()),
    );
    manager.set_flag(
        FlagKey::CollapseRatio,
        FlagValue::Int(difficulty.collapse_ratio_pct()),
    );
    manager.set_flag(
        FlagKey::MoralePenalty,
        FlagValue::Int(difficulty.morale_penalty()),
    );
    manager.set_flag(
        FlagKey::SupportFloor,
        FlagValue::Int(difficulty.support_floor()),
    );

    Ok(())
}
