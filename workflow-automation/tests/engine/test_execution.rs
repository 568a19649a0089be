//! Execution semantics: ordering, partial-failure tolerance, timeouts

use super::common::*;
use std::collections::HashMap;
use workflow_automation_sdk::{ActionStatus, EngineError, ExecutionStatus};

#[cfg(unix)]
#[tokio::test]
async fn test_successful_run_of_command_and_notification() {
    let engine = test_engine();
    let workflow = engine.create_workflow("Echo and notify", "two-step run");
    engine.add_action(
        &workflow.id,
        "command",
        command_params_with_timeout("echo ok", 5),
    );
    engine.add_action(&workflow.id, "notification", notification_params("done"));

    let execution = engine.run_workflow(&workflow.id).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.results.len(), 2);
    assert!(execution.results.iter().all(|r| r.succeeded()));
    assert_eq!(execution.results[0].output.trim(), "ok");

    let stored = engine.get_workflow(&workflow.id).unwrap();
    assert_eq!(stored.run_count, 1);
    assert_eq!(stored.success_count, 1);
}

#[cfg(unix)]
#[tokio::test]
async fn test_failed_action_does_not_stop_the_sequence() {
    let engine = test_engine();
    let workflow = engine.create_workflow("Broken first step", "continue on failure");
    engine.add_action(
        &workflow.id,
        "command",
        command_params_with_timeout("echo broken >&2; exit 1", 5),
    );
    engine.add_action(&workflow.id, "notification", notification_params("cleanup"));

    let execution = engine.run_workflow(&workflow.id).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::CompletedWithErrors);
    assert_eq!(execution.results.len(), 2);

    let first = &execution.results[0];
    assert_eq!(first.status, ActionStatus::Failed);
    assert_eq!(first.return_code, Some(1));
    assert!(first.error.as_deref().unwrap_or("").contains("broken"));

    // The notification after the failure still ran
    let second = &execution.results[1];
    assert_eq!(second.status, ActionStatus::Completed);

    let stored = engine.get_workflow(&workflow.id).unwrap();
    assert_eq!(stored.run_count, 1);
    assert_eq!(stored.success_count, 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_timeout_is_recorded_not_raised() {
    let engine = test_engine();
    let workflow = engine.create_workflow("Slow step", "timeout handling");
    engine.add_action(
        &workflow.id,
        "command",
        command_params_with_timeout("sleep 2", 1),
    );
    engine.add_action(&workflow.id, "notification", notification_params("after"));

    let execution = engine.run_workflow(&workflow.id).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::CompletedWithErrors);
    assert_eq!(
        execution.results[0].error.as_deref(),
        Some("Action timed out after 1 seconds")
    );
    assert_eq!(execution.results[1].status, ActionStatus::Completed);
}

#[tokio::test]
async fn test_actions_run_in_declared_order() {
    let engine = test_engine();
    let workflow = engine.create_workflow("Ordered", "three notifications");
    for message in ["first", "second", "third"] {
        engine.add_action(&workflow.id, "notification", notification_params(message));
    }

    let execution = engine.run_workflow(&workflow.id).await.unwrap();

    let ids: Vec<&str> = execution
        .results
        .iter()
        .map(|r| r.action_id.as_str())
        .collect();
    assert_eq!(ids, vec!["action-01", "action-02", "action-03"]);
    assert!(execution.results[0].output.contains("first"));
    assert!(execution.results[2].output.contains("third"));
}

#[tokio::test]
async fn test_results_length_matches_action_count_per_run() {
    let engine = test_engine();
    let workflow = engine.create_workflow("Counted", "desc");
    engine.add_action(&workflow.id, "notification", notification_params("one"));
    engine.add_action(&workflow.id, "notification", notification_params("two"));

    engine.run_workflow(&workflow.id).await.unwrap();
    engine.run_workflow(&workflow.id).await.unwrap();

    let executions = engine.executions();
    assert_eq!(executions.len(), 2);
    assert!(executions.iter().all(|e| e.results.len() == 2));
    assert_eq!(engine.get_workflow(&workflow.id).unwrap().run_count, 2);
}

#[tokio::test]
async fn test_unknown_action_type_is_a_recorded_failure() {
    let engine = test_engine();
    let workflow = engine.create_workflow("Odd step", "desc");
    engine.add_action(&workflow.id, "webhook", HashMap::new());

    let execution = engine.run_workflow(&workflow.id).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::CompletedWithErrors);
    assert_eq!(
        execution.results[0].error.as_deref(),
        Some("Unknown action type: webhook")
    );
}

#[tokio::test]
async fn test_missing_script_is_a_recorded_failure() {
    let engine = test_engine();
    let workflow = engine.create_workflow("Scripted", "desc");
    let mut parameters = HashMap::new();
    parameters.insert(
        "script_path".to_string(),
        serde_json::json!("no_such_script.sh"),
    );
    engine.add_action(&workflow.id, "script", parameters);

    let execution = engine.run_workflow(&workflow.id).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::CompletedWithErrors);
    assert!(execution.results[0]
        .error
        .as_deref()
        .unwrap_or("")
        .contains("Script not found"));
}

#[tokio::test]
async fn test_ai_analysis_uses_the_collaborator() {
    let engine = engine_with_analysis(vec!["open redirect", "weak session ids"], None);
    let workflow = engine.create_workflow("Security sweep", "desc");
    let mut parameters = HashMap::new();
    parameters.insert("analysis_type".to_string(), serde_json::json!("security"));
    engine.add_action(&workflow.id, "ai_analysis", parameters);

    let execution = engine.run_workflow(&workflow.id).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.results[0].output, "Found 2 security issues");
    assert!(execution.results[0].details.is_some());
}

#[tokio::test]
async fn test_ai_collaborator_failure_is_tolerated() {
    let engine = engine_with_analysis(vec![], Some("service offline"));
    let workflow = engine.create_workflow("Analysis then notify", "desc");
    engine.add_action(&workflow.id, "ai_analysis", HashMap::new());
    engine.add_action(&workflow.id, "notification", notification_params("still here"));

    let execution = engine.run_workflow(&workflow.id).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::CompletedWithErrors);
    assert!(execution.results[0]
        .error
        .as_deref()
        .unwrap_or("")
        .contains("service offline"));
    assert_eq!(execution.results[1].status, ActionStatus::Completed);
}

#[tokio::test]
async fn test_unknown_workflow_creates_no_execution() {
    let engine = test_engine();
    let err = engine.run_workflow("workflow-404").await.unwrap_err();

    assert!(matches!(err, EngineError::WorkflowNotFound { .. }));
    assert!(engine.executions().is_empty());
}
