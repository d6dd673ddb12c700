//! Deterministic turn-based campaign simulation engine.
//!
//! The campaign lives in a single aggregate value graph ([`state::GameState`])
//! owned by a [`manager::GameStateManager`]; all mutation goes through the
//! manager so invariants (bounded values, one-way general conditions, the
//! action budget) hold everywhere. On top of that sit the turn pipeline
//! ([`turn`]), the scripted event engine ([`events`]), the battle
//! sub-simulation ([`battle`]), the faction AI ([`ai`]) and the victory
//! judge ([`victory`]).
//!
//! Determinism is the load-bearing property: every random draw flows
//! through one [`rng::SeededRng`], hash maps are iterated in sorted key
//! order, and sim math is integer-only. Two runs from the same scenario
//! and seed produce byte-identical logs and equal
//! [`state::GameState::checksum`] values.

pub mod ai;
pub mod battle;
pub mod bounded;
pub mod difficulty;
pub mod events;
pub mod grade;
pub mod manager;
pub mod rng;
pub mod scenario;
pub mod state;
pub mod testing;
pub mod turn;
pub mod victory;

pub use difficulty::Difficulty;
pub use grade::{Grade, OutcomeGrade};
pub use manager::{GameStateManager, StateError};
pub use rng::SeededRng;
pub use scenario::{ScenarioError, ScenarioTemplate};
pub use state::{CampaignResult, GameState};
pub use turn::{TurnEnd, TurnManager, TurnStart, ACTIONS_PER_TURN};
pub use victory::{check_game_over, judge, GameOverReason};
