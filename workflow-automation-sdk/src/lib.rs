// Re-export async trait for convenience
pub use async_trait::async_trait;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Default per-action execution bound in seconds.
pub const DEFAULT_ACTION_TIMEOUT_SECS: u64 = 300;

/// Workflow trigger definition.
///
/// `condition` is an opaque key→value map whose shape is a contract between
/// the trigger type and its evaluator, not validated at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    pub id: String,
    pub name: String,
    /// manual, time_based, file_change
    #[serde(rename = "type")]
    pub trigger_type: String,
    pub condition: HashMap<String, Value>,
    pub enabled: bool,
}

/// Workflow action definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    pub name: String,
    /// command, script, ai_analysis, notification
    #[serde(rename = "type")]
    pub action_type: String,
    pub parameters: HashMap<String, Value>,
    pub timeout_secs: u64,
}

impl Action {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Look up a string parameter by key.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }
}

/// Complete workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub triggers: Vec<Trigger>,
    pub actions: Vec<Action>,
    pub enabled: bool,
    pub created_at: DateTime<Local>,
    pub last_run: Option<DateTime<Local>>,
    pub run_count: u64,
    pub success_count: u64,
}

/// Status of one action within one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Running,
    Completed,
    Failed,
}

/// Terminal and in-flight states of a workflow execution.
///
/// `Failed` means the run loop itself faulted; individual action failures
/// are recorded per result and yield `CompletedWithErrors`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Completed,
    CompletedWithErrors,
    Failed,
}

/// Normalized outcome record of one action within one execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub action_id: String,
    pub action_name: String,
    pub started_at: DateTime<Local>,
    pub completed_at: Option<DateTime<Local>>,
    pub status: ActionStatus,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Process exit code, for command and script actions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_code: Option<i32>,
    /// Handler-specific detail payload, for ai_analysis actions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ActionResult {
    pub fn succeeded(&self) -> bool {
        self.status == ActionStatus::Completed
    }
}

/// One concrete run of a workflow's action sequence.
///
/// Created when the run begins, `results` appended as actions complete,
/// finalized exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub workflow_id: String,
    pub execution_id: Uuid,
    pub started_at: DateTime<Local>,
    pub completed_at: Option<DateTime<Local>>,
    pub status: ExecutionStatus,
    pub results: Vec<ActionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Execution {
    pub fn failed_actions(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == ActionStatus::Failed)
            .count()
    }
}

/// Aggregate statistics over all workflows and executions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EngineStats {
    pub total_workflows: usize,
    pub enabled_workflows: usize,
    pub total_executions: usize,
    pub successful_executions: usize,
    pub failed_executions: usize,
    pub success_rate: f64,
}

/// Structured events emitted by the engine during trigger checks and runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A trigger was satisfied during an evaluation pass
    TriggerFired {
        workflow_id: String,
        trigger_id: String,
        trigger_type: String,
    },
    /// A workflow run started
    WorkflowStarted {
        workflow_id: String,
        execution_id: Uuid,
        total_actions: usize,
    },
    /// An action started
    ActionStarted {
        execution_id: Uuid,
        action_id: String,
        action_name: String,
        step: usize,
        total: usize,
    },
    /// An action completed
    ActionCompleted {
        execution_id: Uuid,
        action_id: String,
        output_preview: String,
    },
    /// An action failed (the run continues)
    ActionFailed {
        execution_id: Uuid,
        action_id: String,
        error: String,
    },
    /// A workflow run reached a terminal status
    WorkflowCompleted {
        workflow_id: String,
        execution_id: Uuid,
        status: ExecutionStatus,
        failed_actions: usize,
    },
}

/// Errors surfaced to callers of the engine API.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Run requested for an unknown or disabled workflow id. No execution
    /// record is created.
    #[error("Workflow '{id}' not found or disabled")]
    WorkflowNotFound { id: String },
}

/// Failures reported by the AI analysis collaborator.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("AI service not configured: {0}")]
    NotConfigured(String),
    #[error("AI service request failed: {0}")]
    Request(String),
    #[error("AI service returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// Preference bundle passed to the AI analysis collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisPreferences {
    pub detail_level: String,
    pub max_suggestions: usize,
}

impl Default for AnalysisPreferences {
    fn default() -> Self {
        Self {
            detail_level: "standard".to_string(),
            max_suggestions: 5,
        }
    }
}

/// External AI analysis service: natural-language query plus project path
/// in, textual suggestions out. Consumed only by the ai_analysis action.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn analyze(
        &self,
        query: &str,
        project_path: &Path,
        preferences: &AnalysisPreferences,
    ) -> Result<Vec<String>, ServiceError>;
}

// ============================================================================
// Console Logging Macros
// ============================================================================

/// Logs an informational message.
#[macro_export]
macro_rules! log_info {
    ($message:expr) => {
        println!("\x1b[36mℹ {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[36mℹ {}\x1b[0m", format!($fmt, $($arg)*));
    };
}

/// Logs a warning message.
#[macro_export]
macro_rules! log_warning {
    ($message:expr) => {
        println!("\x1b[33m⚠ Warning: {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[33m⚠ Warning: {}\x1b[0m", format!($fmt, $($arg)*));
    };
}

/// Logs a success message.
#[macro_export]
macro_rules! log_success {
    ($message:expr) => {
        println!("\x1b[32m✓ {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[32m✓ {}\x1b[0m", format!($fmt, $($arg)*));
    };
}

/// Logs a delivered notification message.
///
/// Outputs:
/// ```text
/// 🔔 Notification: build finished
/// ```
#[macro_export]
macro_rules! log_notification {
    ($message:expr) => {
        println!("\x1b[35m🔔 Notification: {}\x1b[0m", $message);
    };
}

/// Logs the start of a workflow step.
///
/// Outputs:
/// ```text
/// → Step 2/5: Action 2
/// ```
#[macro_export]
macro_rules! log_step_start {
    ($step:expr, $total:expr, $name:expr) => {
        println!("\x1b[36m→ Step {}/{}: {}\x1b[0m", $step, $total, $name);
    };
}
