//! Headless campaign runner.
//!
//! Plays a scenario start to finish with the rule-based AI standing in
//! for the player's tactic choices, then reports the outcome. Used for
//! balance sweeps and determinism checks across seed batches.

use anyhow::{bail, Context};
use campaign_core::ai::{FactionAiEngine, RuleBasedAi};
use campaign_core::events::EventSystem;
use campaign_core::grade::OutcomeGrade;
use campaign_core::manager::GameStateManager;
use campaign_core::scenario::ScenarioTemplate;
use campaign_core::turn::TurnManager;
use campaign_core::Difficulty;

/// Hard cap on battle turns resolved per campaign turn, over all
/// battles. Purely a runaway guard; real battles end at their own cap.
const MAX_BATTLE_ROUNDS: u32 = 64;

/// Outcome of one headless campaign.
#[derive(Debug, Clone)]
pub struct CampaignReport {
    pub seed: u64,
    pub turns_played: u32,
    pub grade: OutcomeGrade,
    pub reason: String,
    /// Chronological narrative of the whole run.
    pub log: Vec<String>,
    /// Final state checksum, for replay comparison.
    pub checksum: u64,
}

/// Play one campaign to completion.
pub fn run_campaign(
    template: &ScenarioTemplate,
    difficulty: Difficulty,
    seed: u64,
) -> anyhow::Result<CampaignReport> {
    let state = template
        .instantiate(difficulty)
        .context("instantiating scenario")?;
    let manager = GameStateManager::new(state);
    run_from(manager, template, seed)
}

/// Play campaigns for each seed against the same starting state.
///
/// The scenario is instantiated once; each run plays on an isolated
/// fork, so seeds can never contaminate each other.
pub fn run_batch(
    template: &ScenarioTemplate,
    difficulty: Difficulty,
    seeds: &[u64],
) -> anyhow::Result<Vec<CampaignReport>> {
    let state = template
        .instantiate(difficulty)
        .context("instantiating scenario")?;
    let base = GameStateManager::new(state);

    seeds
        .iter()
        .map(|&seed| run_from(base.fork(), template, seed))
        .collect()
}

fn run_from(
    manager: GameStateManager,
    template: &ScenarioTemplate,
    seed: u64,
) -> anyhow::Result<CampaignReport> {
    let events = EventSystem::new(template.events.clone());
    let ai = FactionAiEngine::new(Box::new(RuleBasedAi));
    let mut tm = TurnManager::new(manager, events, ai, seed);
    let mut log = Vec::new();

    let result = loop {
        let start = tm.start_turn();
        log.push(format!(
            "== Turn {} ({}, {:?} phase) ==",
            start.turn, start.season, start.phase
        ));

        let end = tm.end_turn().context("ending turn")?;
        for event in &end.events {
            log.push(format!("[event] {}: {}", event.name, event.narrative));
        }
        log.extend(end.changes.iter().cloned());

        // Auto-resolve any battle the AI opened this turn.
        let mut rounds = 0;
        while tm.manager().state().active_battle.is_some() {
            let report = tm.battle_turn(None).context("resolving battle turn")?;
            log.extend(report.lines);
            rounds += 1;
            if rounds > MAX_BATTLE_ROUNDS {
                bail!("battle failed to terminate within {MAX_BATTLE_ROUNDS} rounds");
            }
        }

        if end.game_over {
            match end.result {
                Some(result) => break result,
                None => bail!("game over without a campaign result"),
            }
        }
    };

    let state = tm.manager().state();
    log.push(format!("Campaign over: {} ({})", result.grade, result.reason));
    log::info!(
        "seed {seed}: grade {} after {} turns",
        result.grade,
        state.turn
    );

    Ok(CampaignReport {
        seed,
        turns_played: state.turn,
        grade: result.grade,
        reason: result.reason,
        log,
        checksum: state.checksum(),
    })
}
