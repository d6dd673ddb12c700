//! Battle sub-simulation: tactic resolution rules ([`engine`]) and the
//! per-turn orchestration plus post-battle bookkeeping ([`resolver`]).

pub mod engine;
pub mod resolver;

pub use engine::{select_attacker_tactic, tactic, TacticDef, TACTICS};
pub use resolver::{execute_battle_turn, process_battle_result, BattleTurnReport};
