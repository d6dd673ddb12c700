//! Headless campaign driver: scenario/snapshot I/O and a batch runner
//! for replaying campaigns across seeds.

pub mod loader;
pub mod runner;

pub use loader::{load_snapshot, load_template, save_snapshot};
pub use runner::{run_batch, run_campaign, CampaignReport};
