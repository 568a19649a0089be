//! Aggregate statistics over stored execution records

use super::common::*;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use workflow_automation::actions::{ActionContext, ActionHandler, ActionOutcome};
use workflow_automation_sdk::{async_trait, Action, ExecutionStatus};

#[tokio::test]
async fn test_success_rate_after_one_successful_run() {
    let engine = test_engine();
    let workflow = engine.create_workflow("Single", "desc");
    engine.add_action(&workflow.id, "notification", notification_params("ok"));

    engine.run_workflow(&workflow.id).await.unwrap();

    let stats = engine.stats();
    assert_eq!(stats.total_executions, 1);
    assert_eq!(stats.successful_executions, 1);
    assert_eq!(stats.failed_executions, 0);
    assert_eq!(stats.success_rate, 100.0);
}

#[tokio::test]
async fn test_success_rate_counts_error_runs_in_the_total() {
    let engine = test_engine();

    let good = engine.create_workflow("Good", "desc");
    engine.add_action(&good.id, "notification", notification_params("ok"));

    let bad = engine.create_workflow("Bad", "desc");
    engine.add_action(&bad.id, "webhook", HashMap::new());

    engine.run_workflow(&good.id).await.unwrap();
    let execution = engine.run_workflow(&bad.id).await.unwrap();
    assert_eq!(execution.status, ExecutionStatus::CompletedWithErrors);

    let stats = engine.stats();
    assert_eq!(stats.total_executions, 2);
    assert_eq!(stats.successful_executions, 1);
    // completed_with_errors is neither successful nor failed
    assert_eq!(stats.failed_executions, 0);
    assert_eq!(stats.success_rate, 50.0);
}

struct PanickingHandler;

#[async_trait]
impl ActionHandler for PanickingHandler {
    async fn run(&self, _action: &Action, _ctx: &ActionContext) -> Result<ActionOutcome> {
        panic!("defective handler");
    }
}

#[tokio::test]
async fn test_failed_executions_come_from_engine_faults() {
    let mut engine = test_engine();
    engine.register_action_handler("boom", Arc::new(PanickingHandler));

    let good = engine.create_workflow("Good", "desc");
    engine.add_action(&good.id, "notification", notification_params("ok"));

    let faulty = engine.create_workflow("Faulty", "desc");
    engine.add_action(&faulty.id, "boom", HashMap::new());

    engine.run_workflow(&good.id).await.unwrap();
    let execution = engine.run_workflow(&faulty.id).await.unwrap();
    assert_eq!(execution.status, ExecutionStatus::Failed);

    let stats = engine.stats();
    assert_eq!(stats.total_executions, 2);
    assert_eq!(stats.successful_executions, 1);
    assert_eq!(stats.failed_executions, 1);
    assert_eq!(stats.success_rate, 50.0);
}

#[test]
fn test_workflow_counts_track_enabled_flag() {
    let engine = test_engine();
    engine.create_workflow("One", "desc");
    engine.create_workflow("Two", "desc");

    let mut state = engine.snapshot();
    state.workflows[1].enabled = false;
    let engine = workflow_automation::AutomationEngine::with_state(
        std::env::temp_dir(),
        Arc::new(ScriptedAnalysis {
            suggestions: vec![],
            fail_with: None,
        }),
        state,
    );

    let stats = engine.stats();
    assert_eq!(stats.total_workflows, 2);
    assert_eq!(stats.enabled_workflows, 1);
    assert_eq!(stats.success_rate, 0.0);
}
