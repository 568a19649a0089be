//! Action execution: one handler per action type behind a uniform result
//! contract
//!
//! Expected failure modes (timeout, nonzero exit, missing resource,
//! collaborator error, unknown type) are captured into the `ActionResult`;
//! nothing here aborts a workflow run.

use anyhow::Result;
use chrono::Local;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use workflow_automation_sdk::{
    async_trait, Action, ActionResult, ActionStatus, AnalysisPreferences, AnalysisService,
    log_notification,
};

/// Shared state handlers execute against.
pub struct ActionContext {
    pub project_path: PathBuf,
    pub analysis: Arc<dyn AnalysisService>,
    pub preferences: AnalysisPreferences,
}

/// Raw outcome produced by a handler, before timestamps and identity are
/// attached.
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub status: ActionStatus,
    pub output: String,
    pub error: Option<String>,
    pub return_code: Option<i32>,
    pub details: Option<Value>,
}

impl ActionOutcome {
    pub fn completed(output: impl Into<String>) -> Self {
        Self {
            status: ActionStatus::Completed,
            output: output.into(),
            error: None,
            return_code: None,
            details: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: ActionStatus::Failed,
            output: String::new(),
            error: Some(error.into()),
            return_code: None,
            details: None,
        }
    }

    pub fn with_return_code(mut self, code: Option<i32>) -> Self {
        self.return_code = code;
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// One executable step type. Implementations must report expected failures
/// through `ActionOutcome`, not `Err`; an `Err` is treated as a handler
/// defect and still lands in the result as a failure.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn run(&self, action: &Action, ctx: &ActionContext) -> Result<ActionOutcome>;
}

/// Dispatches actions to the handler registered for their type, enforcing
/// the per-action timeout. New action types register a handler; the run
/// loop never changes.
pub struct ActionExecutor {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
    ctx: ActionContext,
}

impl ActionExecutor {
    /// Build an executor with the four built-in handlers registered.
    pub fn new(project_path: impl Into<PathBuf>, analysis: Arc<dyn AnalysisService>) -> Self {
        let mut executor = Self {
            handlers: HashMap::new(),
            ctx: ActionContext {
                project_path: project_path.into(),
                analysis,
                preferences: AnalysisPreferences::default(),
            },
        };
        executor.register("command", Arc::new(CommandHandler));
        executor.register("script", Arc::new(ScriptHandler));
        executor.register("ai_analysis", Arc::new(AiAnalysisHandler));
        executor.register("notification", Arc::new(NotificationHandler));
        executor
    }

    pub fn register(&mut self, action_type: &str, handler: Arc<dyn ActionHandler>) {
        self.handlers.insert(action_type.to_string(), handler);
    }

    /// Execute a single action and capture a normalized result.
    ///
    /// On timeout the handler future is dropped, which kills any child
    /// process it spawned (`kill_on_drop`).
    pub async fn execute(&self, action: &Action) -> ActionResult {
        let started_at = Local::now();

        let outcome = match self.handlers.get(&action.action_type) {
            None => ActionOutcome::failed(format!(
                "Unknown action type: {}",
                action.action_type
            )),
            Some(handler) => {
                match tokio::time::timeout(action.timeout(), handler.run(action, &self.ctx)).await
                {
                    Err(_) => ActionOutcome::failed(format!(
                        "Action timed out after {} seconds",
                        action.timeout_secs
                    )),
                    Ok(Err(e)) => ActionOutcome::failed(e.to_string()),
                    Ok(Ok(outcome)) => outcome,
                }
            }
        };

        ActionResult {
            action_id: action.id.clone(),
            action_name: action.name.clone(),
            started_at,
            completed_at: Some(Local::now()),
            status: outcome.status,
            output: outcome.output,
            error: outcome.error,
            return_code: outcome.return_code,
            details: outcome.details,
        }
    }
}

/// Run a command line through the platform shell.
fn shell_command(command_line: &str) -> Command {
    #[cfg(windows)]
    {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command_line);
        cmd
    }

    #[cfg(not(windows))]
    {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command_line);
        cmd
    }
}

fn process_outcome(output: std::process::Output) -> ActionOutcome {
    let code = output.status.code();
    if output.status.success() {
        ActionOutcome::completed(String::from_utf8_lossy(&output.stdout).into_owned())
            .with_return_code(code)
    } else {
        let mut outcome =
            ActionOutcome::failed(String::from_utf8_lossy(&output.stderr).into_owned())
                .with_return_code(code);
        outcome.output = String::from_utf8_lossy(&output.stdout).into_owned();
        outcome
    }
}

/// Shell command in the project working directory. Exit 0 maps to completed
/// with stdout captured; nonzero maps to failed with stderr captured.
struct CommandHandler;

#[async_trait]
impl ActionHandler for CommandHandler {
    async fn run(&self, action: &Action, ctx: &ActionContext) -> Result<ActionOutcome> {
        let Some(command_line) = action.param_str("command") else {
            return Ok(ActionOutcome::failed(
                "Command action requires a 'command' parameter",
            ));
        };

        let output = shell_command(command_line)
            .current_dir(&ctx.project_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(process_outcome(output))
    }
}

/// Script invocation as an isolated subprocess, under the same timeout and
/// kill discipline as commands. The script's text is never evaluated in
/// this process.
struct ScriptHandler;

#[async_trait]
impl ActionHandler for ScriptHandler {
    async fn run(&self, action: &Action, ctx: &ActionContext) -> Result<ActionOutcome> {
        let Some(script_path) = action.param_str("script_path") else {
            return Ok(ActionOutcome::failed(
                "Script action requires a 'script_path' parameter",
            ));
        };

        let script_path = ctx.project_path.join(script_path);
        if !script_path.exists() {
            return Ok(ActionOutcome::failed(format!(
                "Script not found: {}",
                script_path.display()
            )));
        }

        let interpreter = action.param_str("interpreter").unwrap_or("sh");
        let output = Command::new(interpreter)
            .arg(&script_path)
            .current_dir(&ctx.project_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(process_outcome(output))
    }
}

/// Delegates to the AI analysis collaborator and summarizes its suggestion
/// list per analysis type. Collaborator failures never raise past this
/// boundary.
struct AiAnalysisHandler;

#[async_trait]
impl ActionHandler for AiAnalysisHandler {
    async fn run(&self, action: &Action, ctx: &ActionContext) -> Result<ActionOutcome> {
        let analysis_type = action.param_str("analysis_type").unwrap_or("general");
        let query = match analysis_type {
            "security" => "Identify security vulnerabilities and insecure patterns in this project",
            "code_quality" => "Identify code smells and maintainability problems in this project",
            _ => "Analyze this project and suggest improvements",
        };

        let suggestions = match ctx
            .analysis
            .analyze(query, &ctx.project_path, &ctx.preferences)
            .await
        {
            Ok(suggestions) => suggestions,
            Err(e) => {
                return Ok(ActionOutcome::failed(format!("AI analysis failed: {}", e)));
            }
        };

        let top: Vec<&String> = suggestions
            .iter()
            .take(ctx.preferences.max_suggestions)
            .collect();

        let outcome = match analysis_type {
            "security" => {
                ActionOutcome::completed(format!("Found {} security issues", suggestions.len()))
                    .with_details(json!(top))
            }
            "code_quality" => ActionOutcome::completed(format!(
                "Found {} code quality findings",
                suggestions.len()
            ))
            .with_details(json!({
                "findings": suggestions.len(),
                "items": top,
            })),
            _ => ActionOutcome::completed(format!("Collected {} suggestions", suggestions.len()))
                .with_details(json!(top)),
        };

        Ok(outcome)
    }
}

/// Synchronous notification emission. Only the console channel prints;
/// every channel completes.
struct NotificationHandler;

#[async_trait]
impl ActionHandler for NotificationHandler {
    async fn run(&self, action: &Action, _ctx: &ActionContext) -> Result<ActionOutcome> {
        let message = action.param_str("message").unwrap_or("Workflow notification");
        let channel = action.param_str("channel").unwrap_or("console");

        if channel == "console" {
            log_notification!(message);
        }

        Ok(ActionOutcome::completed(format!(
            "Notification sent via {}: {}",
            channel, message
        )))
    }
}
