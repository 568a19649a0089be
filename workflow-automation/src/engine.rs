//! Workflow run orchestration, execution history, and aggregate statistics

use chrono::Local;
use futures::FutureExt;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use uuid::Uuid;
use workflow_automation_sdk::{
    AnalysisService, EngineError, EngineEvent, EngineStats, Execution, ExecutionStatus, Workflow,
};

use crate::actions::{ActionExecutor, ActionHandler};
use crate::ai::HttpAnalysisService;
use crate::registry::WorkflowRegistry;
use crate::store::EngineState;
use crate::triggers;

/// The workflow automation engine: registry, trigger evaluation, action
/// execution, and execution history behind one facade.
pub struct AutomationEngine {
    project_path: PathBuf,
    registry: Mutex<WorkflowRegistry>,
    executions: Mutex<Vec<Execution>>,
    executor: ActionExecutor,
    events_tx: broadcast::Sender<EngineEvent>,
    /// One async lock per workflow id; concurrent runs of the same id are
    /// serialized so the run/success counters cannot race.
    run_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl AutomationEngine {
    /// Engine with the HTTP-backed AI collaborator configured from the
    /// environment.
    pub fn new(project_path: impl Into<PathBuf>) -> Self {
        Self::with_analysis(project_path, Arc::new(HttpAnalysisService::from_env()))
    }

    pub fn with_analysis(
        project_path: impl Into<PathBuf>,
        analysis: Arc<dyn AnalysisService>,
    ) -> Self {
        Self::with_state(project_path, analysis, EngineState::default())
    }

    /// Restore an engine from persisted state.
    pub fn with_state(
        project_path: impl Into<PathBuf>,
        analysis: Arc<dyn AnalysisService>,
        state: EngineState,
    ) -> Self {
        let project_path = project_path.into();
        // Capacity 1000 to reduce lagging for chatty workflows
        let (events_tx, _) = broadcast::channel(1000);
        Self {
            executor: ActionExecutor::new(project_path.clone(), analysis),
            registry: Mutex::new(WorkflowRegistry::from_parts(
                state.workflows,
                state.next_workflow_seq,
            )),
            executions: Mutex::new(state.executions),
            project_path,
            events_tx,
            run_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn project_path(&self) -> &Path {
        &self.project_path
    }

    /// Subscribe to the structured event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events_tx.subscribe()
    }

    /// Register a handler for an additional action type.
    pub fn register_action_handler(&mut self, action_type: &str, handler: Arc<dyn ActionHandler>) {
        self.executor.register(action_type, handler);
    }

    pub fn create_workflow(&self, name: &str, description: &str) -> Workflow {
        self.registry.lock().unwrap().create_workflow(name, description)
    }

    pub fn add_trigger(
        &self,
        workflow_id: &str,
        trigger_type: &str,
        condition: HashMap<String, Value>,
    ) -> bool {
        self.registry
            .lock()
            .unwrap()
            .add_trigger(workflow_id, trigger_type, condition)
    }

    pub fn add_action(
        &self,
        workflow_id: &str,
        action_type: &str,
        parameters: HashMap<String, Value>,
    ) -> bool {
        self.registry
            .lock()
            .unwrap()
            .add_action(workflow_id, action_type, parameters)
    }

    pub fn workflows(&self) -> Vec<Workflow> {
        self.registry.lock().unwrap().workflows().to_vec()
    }

    pub fn get_workflow(&self, workflow_id: &str) -> Option<Workflow> {
        self.registry.lock().unwrap().get(workflow_id).cloned()
    }

    /// Execution history, oldest first.
    pub fn executions(&self) -> Vec<Execution> {
        self.executions.lock().unwrap().clone()
    }

    /// Evaluate all triggers and return the distinct triggered workflow ids
    /// in workflow declaration order.
    pub fn check_triggers(&self) -> Vec<String> {
        let hits = {
            let registry = self.registry.lock().unwrap();
            triggers::evaluate(&self.project_path, registry.workflows())
        };

        hits.into_iter()
            .map(|hit| {
                let _ = self.events_tx.send(EngineEvent::TriggerFired {
                    workflow_id: hit.workflow_id.clone(),
                    trigger_id: hit.trigger_id,
                    trigger_type: hit.trigger_type,
                });
                hit.workflow_id
            })
            .collect()
    }

    /// Run every action of a workflow in declared order.
    ///
    /// Individual action failures are recorded in the execution's results
    /// and do not stop the sequence; later diagnostic or cleanup steps
    /// still run. Only a fault escaping the loop itself (a handler defect)
    /// fails the whole execution. Returns `WorkflowNotFound` for unknown or
    /// disabled ids without creating an execution record.
    pub async fn run_workflow(&self, workflow_id: &str) -> Result<Execution, EngineError> {
        let run_lock = {
            let mut locks = self.run_locks.lock().unwrap();
            locks
                .entry(workflow_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        let _run_guard = run_lock.lock().await;

        let workflow = {
            let registry = self.registry.lock().unwrap();
            registry.get(workflow_id).filter(|w| w.enabled).cloned()
        }
        .ok_or_else(|| EngineError::WorkflowNotFound {
            id: workflow_id.to_string(),
        })?;

        let execution_id = Uuid::new_v4();
        let mut execution = Execution {
            workflow_id: workflow.id.clone(),
            execution_id,
            started_at: Local::now(),
            completed_at: None,
            status: ExecutionStatus::Running,
            results: Vec::new(),
            error_message: None,
        };

        let _ = self.events_tx.send(EngineEvent::WorkflowStarted {
            workflow_id: workflow.id.clone(),
            execution_id,
            total_actions: workflow.actions.len(),
        });

        let loop_result = {
            let execution = &mut execution;
            let actions = &workflow.actions;
            let total = actions.len();
            AssertUnwindSafe(async move {
                for (index, action) in actions.iter().enumerate() {
                    let _ = self.events_tx.send(EngineEvent::ActionStarted {
                        execution_id,
                        action_id: action.id.clone(),
                        action_name: action.name.clone(),
                        step: index + 1,
                        total,
                    });

                    let result = self.executor.execute(action).await;

                    let event = if result.succeeded() {
                        EngineEvent::ActionCompleted {
                            execution_id,
                            action_id: action.id.clone(),
                            output_preview: preview(&result.output),
                        }
                    } else {
                        EngineEvent::ActionFailed {
                            execution_id,
                            action_id: action.id.clone(),
                            error: result
                                .error
                                .clone()
                                .unwrap_or_else(|| "Unknown error".to_string()),
                        }
                    };
                    let _ = self.events_tx.send(event);

                    execution.results.push(result);
                }
            })
            .catch_unwind()
            .await
        };

        let finished_at = Local::now();
        let loop_completed = loop_result.is_ok();
        let mut all_succeeded = false;

        execution.completed_at = Some(finished_at);
        match loop_result {
            Ok(()) => {
                if execution.failed_actions() == 0 {
                    execution.status = ExecutionStatus::Completed;
                    all_succeeded = true;
                } else {
                    execution.status = ExecutionStatus::CompletedWithErrors;
                }
            }
            Err(payload) => {
                execution.status = ExecutionStatus::Failed;
                execution.error_message = Some(panic_message(payload));
            }
        }

        self.registry.lock().unwrap().record_run(
            &workflow.id,
            finished_at,
            loop_completed,
            all_succeeded,
        );

        let _ = self.events_tx.send(EngineEvent::WorkflowCompleted {
            workflow_id: workflow.id.clone(),
            execution_id,
            status: execution.status,
            failed_actions: execution.failed_actions(),
        });

        self.executions.lock().unwrap().push(execution.clone());
        Ok(execution)
    }

    /// Aggregate statistics, computed on demand from the stored records.
    pub fn stats(&self) -> EngineStats {
        let (total_workflows, enabled_workflows) = {
            let registry = self.registry.lock().unwrap();
            let workflows = registry.workflows();
            (
                workflows.len(),
                workflows.iter().filter(|w| w.enabled).count(),
            )
        };

        let executions = self.executions.lock().unwrap();
        let total_executions = executions.len();
        let successful_executions = executions
            .iter()
            .filter(|e| e.status == ExecutionStatus::Completed)
            .count();
        let failed_executions = executions
            .iter()
            .filter(|e| e.status == ExecutionStatus::Failed)
            .count();
        let success_rate = if total_executions > 0 {
            successful_executions as f64 / total_executions as f64 * 100.0
        } else {
            0.0
        };

        EngineStats {
            total_workflows,
            enabled_workflows,
            total_executions,
            successful_executions,
            failed_executions,
            success_rate,
        }
    }

    /// Snapshot the mutable state for persistence.
    pub fn snapshot(&self) -> EngineState {
        let registry = self.registry.lock().unwrap();
        EngineState {
            workflows: registry.workflows().to_vec(),
            executions: self.executions.lock().unwrap().clone(),
            next_workflow_seq: registry.next_seq(),
        }
    }
}

/// First 100 characters of an action's output, for event payloads.
fn preview(output: &str) -> String {
    let trimmed = output.trim_end();
    if trimmed.chars().count() > 100 {
        let head: String = trimmed.chars().take(100).collect();
        format!("{}...", head)
    } else {
        trimmed.to_string()
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "workflow run panicked".to_string()
    }
}
