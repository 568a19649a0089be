//! Command-line host for the workflow automation engine

use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use workflow_automation::ai::HttpAnalysisService;
use workflow_automation::{store, AutomationEngine, Scheduler};
use workflow_automation_sdk::{
    log_info, log_step_start, log_success, log_warning, EngineEvent, ExecutionStatus,
};

#[derive(Parser, Debug)]
#[command(name = "workflow-automation")]
#[command(about = "Workflow automation and process management")]
#[command(version)]
struct Cli {
    /// Project directory workflows run against (defaults to the current
    /// directory)
    #[arg(long, value_name = "PATH", global = true)]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new workflow
    Create { name: String, description: String },

    /// Add a trigger to a workflow
    AddTrigger {
        workflow_id: String,
        /// manual, time_based, file_change
        trigger_type: String,
        /// JSON condition for the trigger
        #[arg(long, value_name = "JSON")]
        condition: Option<String>,
    },

    /// Add an action to a workflow
    AddAction {
        workflow_id: String,
        /// command, script, ai_analysis, notification
        action_type: String,
        /// JSON parameters for the action
        #[arg(long, value_name = "JSON")]
        parameters: Option<String>,
    },

    /// Manually run a workflow
    Run { workflow_id: String },

    /// Evaluate all triggers and list the triggered workflow ids
    CheckTriggers,

    /// List workflows and recent executions
    List,

    /// Show aggregate execution statistics
    Stats,

    /// Poll triggers on an interval and dispatch triggered workflows
    Watch {
        #[arg(long, default_value_t = 30, value_name = "SECS")]
        interval_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    let project_path = match cli.project {
        Some(path) => path,
        None => std::env::current_dir()?,
    };

    let state = store::load_state();
    let engine = Arc::new(AutomationEngine::with_state(
        project_path,
        Arc::new(HttpAnalysisService::from_env()),
        state,
    ));

    match cli.command {
        Command::Create { name, description } => {
            let workflow = engine.create_workflow(&name, &description);
            log_success!("Created workflow: {} ({})", workflow.name, workflow.id);
        }
        Command::AddTrigger {
            workflow_id,
            trigger_type,
            condition,
        } => add_trigger(&engine, &workflow_id, &trigger_type, condition)?,
        Command::AddAction {
            workflow_id,
            action_type,
            parameters,
        } => add_action(&engine, &workflow_id, &action_type, parameters)?,
        Command::Run { workflow_id } => run(&engine, &workflow_id).await?,
        Command::CheckTriggers => check_triggers(&engine),
        Command::List => list(&engine),
        Command::Stats => stats(&engine),
        Command::Watch { interval_secs } => watch_triggers(engine.clone(), interval_secs).await,
    }

    store::save_state(&engine.snapshot())?;
    Ok(())
}

/// Parse an optional `--condition`/`--parameters` JSON object.
fn parse_json_map(raw: Option<String>) -> Result<HashMap<String, Value>> {
    let Some(raw) = raw else {
        return Ok(HashMap::new());
    };
    let value: Value =
        serde_json::from_str(&raw).map_err(|e| anyhow::anyhow!("Invalid JSON: {}", e))?;
    match value {
        Value::Object(map) => Ok(map.into_iter().collect()),
        _ => anyhow::bail!("Expected a JSON object"),
    }
}

fn add_trigger(
    engine: &AutomationEngine,
    workflow_id: &str,
    trigger_type: &str,
    condition: Option<String>,
) -> Result<()> {
    let mut condition = parse_json_map(condition)?;

    if condition.is_empty() {
        match trigger_type {
            "time_based" => {
                condition.insert("type".to_string(), Value::from("interval"));
                condition.insert("interval_minutes".to_string(), Value::from(60));
            }
            "file_change" => {
                condition.insert("pattern".to_string(), Value::from("*"));
                condition.insert("path".to_string(), Value::from("."));
            }
            _ => {}
        }
    }

    if engine.add_trigger(workflow_id, trigger_type, condition) {
        log_success!("Added {} trigger to workflow {}", trigger_type, workflow_id);
    } else {
        log_warning!("Workflow {} not found", workflow_id);
    }
    Ok(())
}

fn add_action(
    engine: &AutomationEngine,
    workflow_id: &str,
    action_type: &str,
    parameters: Option<String>,
) -> Result<()> {
    let mut parameters = parse_json_map(parameters)?;

    if action_type == "command" && !parameters.contains_key("command") {
        log_warning!("Command action requires a 'command' parameter");
        return Ok(());
    }
    if action_type == "ai_analysis" && !parameters.contains_key("analysis_type") {
        parameters.insert("analysis_type".to_string(), Value::from("general"));
    }

    if engine.add_action(workflow_id, action_type, parameters) {
        log_success!("Added {} action to workflow {}", action_type, workflow_id);
    } else {
        log_warning!("Workflow {} not found", workflow_id);
    }
    Ok(())
}

async fn run(engine: &Arc<AutomationEngine>, workflow_id: &str) -> Result<()> {
    let mut events = engine.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(EngineEvent::ActionStarted {
                    step,
                    total,
                    action_name,
                    ..
                }) => {
                    log_step_start!(step, total, action_name);
                }
                Ok(EngineEvent::ActionFailed { error, .. }) => {
                    log_warning!("Action failed: {}", error);
                }
                Ok(EngineEvent::WorkflowCompleted { .. }) => break,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Closed) => break,
                Err(_) => {}
            }
        }
    });

    let execution = engine.run_workflow(workflow_id).await?;
    printer.await.ok();

    println!();
    log_info!(
        "Execution {}: {}",
        execution.execution_id,
        status_label(execution.status)
    );
    if let Some(error) = &execution.error_message {
        log_warning!("{}", error);
    }
    for (index, result) in execution.results.iter().enumerate() {
        let marker = if result.succeeded() { "✓" } else { "✗" };
        println!("  {}. {} {}", index + 1, marker, result.action_name);
        if !result.output.is_empty() {
            println!("     {}", truncate(&result.output, 100));
        }
        if let Some(error) = &result.error {
            println!("     error: {}", truncate(error, 200));
        }
    }
    Ok(())
}

fn check_triggers(engine: &AutomationEngine) {
    let triggered = engine.check_triggers();
    if triggered.is_empty() {
        log_info!("No workflows triggered");
    } else {
        for workflow_id in triggered {
            log_success!("Triggered: {}", workflow_id);
        }
    }
}

fn list(engine: &AutomationEngine) {
    let stats = engine.stats();
    log_info!(
        "Workflows: {} total, {} enabled",
        stats.total_workflows,
        stats.enabled_workflows
    );
    log_info!(
        "Executions: {} total, success rate {:.1}%",
        stats.total_executions,
        stats.success_rate
    );

    for workflow in engine.workflows() {
        let marker = if workflow.enabled { "✓" } else { "✗" };
        println!("  {} {} ({})", marker, workflow.name, workflow.id);
        println!("      {}", workflow.description);
        println!(
            "      triggers: {} | actions: {} | runs: {} | successes: {}",
            workflow.triggers.len(),
            workflow.actions.len(),
            workflow.run_count,
            workflow.success_count
        );
        if let Some(last_run) = workflow.last_run {
            println!("      last run: {}", last_run.format("%Y-%m-%d %H:%M"));
        }
    }

    let executions = engine.executions();
    if !executions.is_empty() {
        println!();
        log_info!("Recent executions:");
        for execution in executions.iter().rev().take(5) {
            let successful = execution
                .results
                .iter()
                .filter(|r| r.succeeded())
                .count();
            println!(
                "  {} {} — {} ({}/{} actions successful)",
                execution.started_at.format("%Y-%m-%d %H:%M"),
                execution.workflow_id,
                status_label(execution.status),
                successful,
                execution.results.len()
            );
        }
    }
}

fn stats(engine: &AutomationEngine) {
    let stats = engine.stats();
    println!("Total workflows:       {}", stats.total_workflows);
    println!("Enabled workflows:     {}", stats.enabled_workflows);
    println!("Total executions:      {}", stats.total_executions);
    println!("Successful executions: {}", stats.successful_executions);
    println!("Failed executions:     {}", stats.failed_executions);
    println!("Success rate:          {:.1}%", stats.success_rate);
}

async fn watch_triggers(engine: Arc<AutomationEngine>, interval_secs: u64) {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    let mut events = engine.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(EngineEvent::TriggerFired {
                    workflow_id,
                    trigger_type,
                    ..
                }) => {
                    log_info!("Trigger fired for {} ({})", workflow_id, trigger_type);
                }
                Ok(EngineEvent::WorkflowCompleted {
                    workflow_id,
                    status,
                    failed_actions,
                    ..
                }) => {
                    if failed_actions == 0 {
                        log_success!("{}: {}", workflow_id, status_label(status));
                    } else {
                        log_warning!(
                            "{}: {} ({} failed actions)",
                            workflow_id,
                            status_label(status),
                            failed_actions
                        );
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Closed) => break,
                Err(_) => {}
            }
        }
    });

    log_info!(
        "Watching triggers every {}s (ctrl-c to stop)",
        interval_secs
    );
    let scheduler = Scheduler::new(engine, Duration::from_secs(interval_secs));
    scheduler.run(shutdown_rx).await;
}

fn status_label(status: ExecutionStatus) -> &'static str {
    match status {
        ExecutionStatus::Running => "running",
        ExecutionStatus::Completed => "completed",
        ExecutionStatus::CompletedWithErrors => "completed with errors",
        ExecutionStatus::Failed => "failed",
    }
}

fn truncate(text: &str, limit: usize) -> String {
    let text = text.trim_end();
    if text.chars().count() > limit {
        let head: String = text.chars().take(limit).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}
