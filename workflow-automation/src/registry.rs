//! In-memory catalog of workflow definitions

use chrono::{DateTime, Local};
use serde_json::Value;
use std::collections::HashMap;
use workflow_automation_sdk::{Action, Trigger, Workflow, DEFAULT_ACTION_TIMEOUT_SECS};

/// Owns all workflow definitions and assigns their identifiers.
///
/// Condition and parameter maps are stored as-is; their shape is checked
/// lazily by the trigger evaluator and action handlers, not here.
#[derive(Debug, Default)]
pub struct WorkflowRegistry {
    workflows: Vec<Workflow>,
    next_seq: u64,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a registry from previously persisted parts.
    pub fn from_parts(workflows: Vec<Workflow>, next_seq: u64) -> Self {
        Self {
            workflows,
            next_seq,
        }
    }

    pub fn workflows(&self) -> &[Workflow] {
        &self.workflows
    }

    pub fn get(&self, workflow_id: &str) -> Option<&Workflow> {
        self.workflows.iter().find(|w| w.id == workflow_id)
    }

    fn get_mut(&mut self, workflow_id: &str) -> Option<&mut Workflow> {
        self.workflows.iter_mut().find(|w| w.id == workflow_id)
    }

    /// Sequence value the next created workflow will use.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Create a new workflow: enabled, counters zeroed, id assigned from a
    /// monotonic sequence.
    pub fn create_workflow(&mut self, name: &str, description: &str) -> Workflow {
        self.next_seq += 1;
        let workflow = Workflow {
            id: format!("workflow-{:03}", self.next_seq),
            name: name.to_string(),
            description: description.to_string(),
            triggers: Vec::new(),
            actions: Vec::new(),
            enabled: true,
            created_at: Local::now(),
            last_run: None,
            run_count: 0,
            success_count: 0,
        };
        self.workflows.push(workflow.clone());
        workflow
    }

    /// Add a trigger to a workflow. Returns false if the workflow is unknown.
    pub fn add_trigger(
        &mut self,
        workflow_id: &str,
        trigger_type: &str,
        condition: HashMap<String, Value>,
    ) -> bool {
        let Some(workflow) = self.get_mut(workflow_id) else {
            return false;
        };
        let seq = workflow.triggers.len() + 1;
        workflow.triggers.push(Trigger {
            id: format!("trigger-{:02}", seq),
            name: format!("Trigger {}", seq),
            trigger_type: trigger_type.to_string(),
            condition,
            enabled: true,
        });
        true
    }

    /// Add an action to a workflow. Returns false if the workflow is unknown.
    ///
    /// An optional numeric `timeout` parameter (seconds) overrides the
    /// 300-second default.
    pub fn add_action(
        &mut self,
        workflow_id: &str,
        action_type: &str,
        parameters: HashMap<String, Value>,
    ) -> bool {
        let Some(workflow) = self.get_mut(workflow_id) else {
            return false;
        };
        let timeout_secs = parameters
            .get("timeout")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_ACTION_TIMEOUT_SECS);
        let seq = workflow.actions.len() + 1;
        workflow.actions.push(Action {
            id: format!("action-{:02}", seq),
            name: format!("Action {}", seq),
            action_type: action_type.to_string(),
            parameters,
            timeout_secs,
        });
        true
    }

    /// Record a finished run invocation against a workflow.
    ///
    /// `run_count` advances once per invocation regardless of outcome.
    /// `last_run` only advances when the run loop completed normally, so
    /// interval triggers re-fire after a faulted run. `success_count`
    /// requires a clean loop with zero failed actions.
    pub fn record_run(
        &mut self,
        workflow_id: &str,
        now: DateTime<Local>,
        loop_completed: bool,
        all_succeeded: bool,
    ) {
        if let Some(workflow) = self.get_mut(workflow_id) {
            workflow.run_count += 1;
            if loop_completed {
                workflow.last_run = Some(now);
            }
            if all_succeeded {
                workflow.success_count += 1;
            }
        }
    }

    /// Consume the registry for persistence.
    pub fn into_parts(self) -> (Vec<Workflow>, u64) {
        (self.workflows, self.next_seq)
    }
}
