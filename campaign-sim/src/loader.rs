//! Scenario template and snapshot file I/O.

use anyhow::Context;
use campaign_core::manager::GameStateManager;
use campaign_core::scenario::ScenarioTemplate;
use std::fs;
use std::path::Path;

/// Load and validate a scenario template from a JSON file.
pub fn load_template(path: &Path) -> anyhow::Result<ScenarioTemplate> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading scenario {}", path.display()))?;
    let template: ScenarioTemplate = serde_json::from_str(&text)
        .with_context(|| format!("parsing scenario {}", path.display()))?;
    template
        .validate()
        .with_context(|| format!("validating scenario {}", path.display()))?;
    Ok(template)
}

/// Write the full campaign state to a snapshot file.
pub fn save_snapshot(manager: &GameStateManager, path: &Path) -> anyhow::Result<()> {
    let snapshot = manager
        .serialize()
        .context("serializing campaign snapshot")?;
    fs::write(path, snapshot)
        .with_context(|| format!("writing snapshot {}", path.display()))?;
    log::info!("snapshot saved to {}", path.display());
    Ok(())
}

/// Restore a campaign from a snapshot file. A corrupt snapshot fails
/// outright rather than loading a partial state.
pub fn load_snapshot(path: &Path) -> anyhow::Result<GameStateManager> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading snapshot {}", path.display()))?;
    let manager = GameStateManager::deserialize(&text)
        .with_context(|| format!("parsing snapshot {}", path.display()))?;
    Ok(manager)
}
