//! JSON state file for workflows and execution history

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use workflow_automation_sdk::{Execution, Workflow};

/// Environment override for the state file location.
pub const STATE_PATH_VAR: &str = "WORKFLOW_AUTOMATION_STATE";

/// Everything the engine needs to survive a restart.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineState {
    pub workflows: Vec<Workflow>,
    pub executions: Vec<Execution>,
    pub next_workflow_seq: u64,
}

/// Get the path to the state file
pub fn state_file_path() -> PathBuf {
    use directories::ProjectDirs;

    if let Ok(path) = std::env::var(STATE_PATH_VAR) {
        return PathBuf::from(path);
    }

    if let Some(proj_dirs) =
        ProjectDirs::from("com", "workflow-automation", "workflow-automation")
    {
        proj_dirs.data_dir().join("state.json")
    } else {
        PathBuf::from(".workflow-automation-state.json")
    }
}

/// Load engine state from disk, falling back to empty state
pub fn load_state() -> EngineState {
    load_state_from(&state_file_path())
}

pub fn load_state_from(path: &Path) -> EngineState {
    if let Ok(content) = std::fs::read_to_string(path) {
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        EngineState::default()
    }
}

/// Save engine state to disk
pub fn save_state(state: &EngineState) -> Result<()> {
    save_state_to(&state_file_path(), state)
}

pub fn save_state_to(path: &Path, state: &EngineState) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(state)?;
    std::fs::write(path, content)?;
    Ok(())
}
