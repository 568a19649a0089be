//! Trigger evaluation for enabled workflows

use chrono::Local;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use workflow_automation_sdk::{Trigger, Workflow};

/// Files modified within this window satisfy a file_change trigger.
const FILE_CHANGE_WINDOW: Duration = Duration::from_secs(5 * 60);

const DEFAULT_INTERVAL_MINUTES: i64 = 60;

/// A satisfied trigger found during one evaluation pass.
#[derive(Debug, Clone)]
pub struct TriggerHit {
    pub workflow_id: String,
    pub trigger_id: String,
    pub trigger_type: String,
}

/// Evaluate all enabled triggers of all enabled workflows, in declaration
/// order. Triggers are OR-combined: the first satisfied trigger claims the
/// workflow and its remaining triggers are skipped for this pass, so each
/// workflow id appears at most once.
pub fn evaluate(project_path: &Path, workflows: &[Workflow]) -> Vec<TriggerHit> {
    let mut hits = Vec::new();

    for workflow in workflows {
        if !workflow.enabled {
            continue;
        }
        for trigger in &workflow.triggers {
            if !trigger.enabled {
                continue;
            }
            if is_satisfied(project_path, workflow, trigger) {
                hits.push(TriggerHit {
                    workflow_id: workflow.id.clone(),
                    trigger_id: trigger.id.clone(),
                    trigger_type: trigger.trigger_type.clone(),
                });
                break;
            }
        }
    }

    hits
}

fn is_satisfied(project_path: &Path, workflow: &Workflow, trigger: &Trigger) -> bool {
    match trigger.trigger_type.as_str() {
        // Manual triggers only fire through an explicit run request
        "manual" => false,
        "time_based" => interval_satisfied(workflow, &trigger.condition),
        "file_change" => file_change_satisfied(project_path, &trigger.condition),
        _ => false,
    }
}

/// An interval trigger fires when the workflow has never run, or when at
/// least `interval_minutes` (default 60) have passed since its last run.
fn interval_satisfied(workflow: &Workflow, condition: &HashMap<String, Value>) -> bool {
    if condition.get("type").and_then(Value::as_str) != Some("interval") {
        return false;
    }
    let interval_minutes = condition
        .get("interval_minutes")
        .and_then(Value::as_i64)
        .unwrap_or(DEFAULT_INTERVAL_MINUTES);

    match workflow.last_run {
        None => true,
        Some(last_run) => {
            Local::now().signed_duration_since(last_run)
                >= chrono::Duration::minutes(interval_minutes)
        }
    }
}

fn file_change_satisfied(project_path: &Path, condition: &HashMap<String, Value>) -> bool {
    let pattern = condition
        .get("pattern")
        .and_then(Value::as_str)
        .unwrap_or("*");
    let rel_path = condition.get("path").and_then(Value::as_str).unwrap_or(".");

    let check_path = project_path.join(rel_path);
    if !check_path.exists() {
        return false;
    }

    !recently_modified(&check_path, pattern, FILE_CHANGE_WINDOW).is_empty()
}

/// Filesystem watcher surrogate: files directly under `dir` matching the
/// glob `pattern` whose modification time falls within `window`.
pub fn recently_modified(dir: &Path, pattern: &str, window: Duration) -> Vec<PathBuf> {
    let Some(full_pattern) = dir.join(pattern).to_str().map(str::to_owned) else {
        return Vec::new();
    };
    let Ok(paths) = glob::glob(&full_pattern) else {
        return Vec::new();
    };

    let now = SystemTime::now();
    paths
        .flatten()
        .filter(|path| {
            path.metadata()
                .and_then(|meta| meta.modified())
                .map(|mtime| match now.duration_since(mtime) {
                    Ok(age) => age <= window,
                    // Modification times in the future count as recent
                    Err(_) => true,
                })
                .unwrap_or(false)
        })
        .collect()
}
