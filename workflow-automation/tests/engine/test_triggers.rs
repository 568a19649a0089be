//! Trigger evaluation through the engine facade

use super::common::*;
use chrono::{Duration, Local};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use workflow_automation::AutomationEngine;

#[tokio::test]
async fn test_interval_trigger_lifecycle() {
    let engine = test_engine();
    let workflow = engine.create_workflow("Hourly", "interval lifecycle");
    engine.add_trigger(&workflow.id, "time_based", interval_condition(60));
    engine.add_action(&workflow.id, "notification", notification_params("tick"));

    // Never run: the trigger fires
    assert_eq!(engine.check_triggers(), vec![workflow.id.clone()]);

    // Immediately after a run it is quiet
    engine.run_workflow(&workflow.id).await.unwrap();
    assert!(engine.check_triggers().is_empty());

    // Once 61 simulated minutes have elapsed it fires again
    let mut state = engine.snapshot();
    state.workflows[0].last_run = Some(Local::now() - Duration::minutes(61));
    let engine = AutomationEngine::with_state(
        std::env::temp_dir(),
        Arc::new(ScriptedAnalysis {
            suggestions: vec![],
            fail_with: None,
        }),
        state,
    );
    assert_eq!(engine.check_triggers(), vec![workflow.id]);
}

#[test]
fn test_manual_trigger_is_excluded_from_evaluation() {
    let engine = test_engine();
    let workflow = engine.create_workflow("Manual only", "desc");
    engine.add_trigger(&workflow.id, "manual", HashMap::new());

    assert!(engine.check_triggers().is_empty());
}

#[tokio::test]
async fn test_manual_workflow_still_runs_on_request() {
    let engine = test_engine();
    let workflow = engine.create_workflow("Manual only", "desc");
    engine.add_trigger(&workflow.id, "manual", HashMap::new());
    engine.add_action(&workflow.id, "notification", notification_params("ran"));

    let execution = engine.run_workflow(&workflow.id).await.unwrap();
    assert_eq!(execution.results.len(), 1);
}

#[test]
fn test_file_change_trigger_sees_recent_writes() {
    let dir = create_temp_dir("file_change");
    std::fs::write(dir.join("changed.txt"), "contents").unwrap();

    let engine = AutomationEngine::with_analysis(
        &dir,
        Arc::new(ScriptedAnalysis {
            suggestions: vec![],
            fail_with: None,
        }),
    );
    let workflow = engine.create_workflow("On change", "desc");
    let mut condition = HashMap::new();
    condition.insert("pattern".to_string(), json!("*.txt"));
    condition.insert("path".to_string(), json!("."));
    engine.add_trigger(&workflow.id, "file_change", condition);

    assert_eq!(engine.check_triggers(), vec![workflow.id]);

    cleanup_temp_dir(&dir);
}

#[test]
fn test_each_triggered_workflow_appears_once_in_declaration_order() {
    let engine = test_engine();

    let first = engine.create_workflow("First", "desc");
    engine.add_trigger(&first.id, "time_based", interval_condition(60));
    // A second satisfiable trigger must not report the workflow twice
    engine.add_trigger(&first.id, "time_based", interval_condition(30));

    let second = engine.create_workflow("Second", "desc");
    engine.add_trigger(&second.id, "time_based", interval_condition(60));

    assert_eq!(engine.check_triggers(), vec![first.id, second.id]);
}
