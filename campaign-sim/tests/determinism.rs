//! Same scenario, same seed: byte-identical runs.

use campaign_core::testing::demo_template;
use campaign_core::Difficulty;
use campaign_sim::{run_batch, run_campaign};

#[test]
fn test_same_seed_produces_identical_runs() {
    let template = demo_template();
    let a = run_campaign(&template, Difficulty::Normal, 42).unwrap();
    let b = run_campaign(&template, Difficulty::Normal, 42).unwrap();

    assert_eq!(a.log, b.log);
    assert_eq!(a.checksum, b.checksum);
    assert_eq!(a.grade, b.grade);
    assert_eq!(a.turns_played, b.turns_played);
}

#[test]
fn test_campaign_terminates_and_reports() {
    let template = demo_template();
    let report = run_campaign(&template, Difficulty::Normal, 7).unwrap();

    // A run never outlives its turn limit.
    assert!(report.turns_played <= template.max_turns);
    assert!(!report.reason.is_empty());
    assert!(report.log.iter().any(|l| l.starts_with("== Turn 1")));
    assert!(report.log.last().unwrap().starts_with("Campaign over"));
}

#[test]
fn test_batch_runs_are_isolated() {
    let template = demo_template();
    let batch = run_batch(&template, Difficulty::Normal, &[11, 11, 13]).unwrap();

    assert_eq!(batch.len(), 3);
    // Same seed twice: identical. The forked starting state is shared,
    // so any divergence would mean cross-run contamination.
    assert_eq!(batch[0].checksum, batch[1].checksum);
    assert_eq!(batch[0].log, batch[1].log);
}

#[test]
fn test_difficulty_changes_the_run() {
    let template = demo_template();
    let easy = run_campaign(&template, Difficulty::Easy, 42).unwrap();
    let hard = run_campaign(&template, Difficulty::Hard, 42).unwrap();
    // Same seed, different starting garrisons and food.
    assert_ne!(easy.checksum, hard.checksum);
}
