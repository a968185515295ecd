//! The task map. Readers get deep copies; only the owning loop mutates.

use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use parking_lot::RwLock;
use thiserror::Error;
use uuid::Uuid;

use crate::memory::{self, StepOutcome};
use crate::types::{Step, Task, TaskStatus};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("task not found: {0}")]
    NotFound(String),

    #[error("invalid status transition {from} -> {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },
}

/// What the loop needs from its task before asking the oracle.
#[derive(Debug, Clone)]
pub struct DecisionContext {
    pub prompt: String,
    pub history: Vec<Step>,
    pub summary: String,
    pub blocked_selectors: BTreeSet<String>,
}

#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<String, Task>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new pending task and return its id.
    pub fn create(&self, prompt: &str) -> String {
        let id = Uuid::new_v4().to_string();
        let task = Task {
            id: id.clone(),
            prompt: prompt.to_string(),
            status: TaskStatus::Pending,
            steps: Vec::new(),
            summary: memory::initial_summary(prompt),
            error: String::new(),
            created_at: Utc::now(),
            completed_at: None,
            blocked_selectors: BTreeSet::new(),
        };
        self.tasks.write().insert(id.clone(), task);
        id
    }

    /// A copy of the task, safe to hold and modify.
    pub fn get(&self, id: &str) -> Option<Task> {
        self.tasks.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.read().contains_key(id)
    }

    /// Move the task forward. Terminal states stamp `completed_at` and, on
    /// failure, the error text.
    pub(crate) fn transition(
        &self,
        id: &str,
        next: TaskStatus,
        error: Option<String>,
    ) -> Result<(), RegistryError> {
        self.with_task(id, |task| {
            if !task.status.can_transition_to(next) {
                return Err(RegistryError::InvalidTransition {
                    from: task.status,
                    to: next,
                });
            }
            task.status = next;
            if next.is_terminal() {
                task.completed_at = Some(Utc::now());
            }
            if let Some(error) = error {
                task.error = error;
            }
            Ok(())
        })?
    }

    /// The slice of task state the oracle is shown, with the last `window` steps.
    pub(crate) fn decision_context(
        &self,
        id: &str,
        window: usize,
    ) -> Result<DecisionContext, RegistryError> {
        self.with_task(id, |task| {
            let start = task.steps.len().saturating_sub(window);
            DecisionContext {
                prompt: task.prompt.clone(),
                history: task.steps[start..].to_vec(),
                summary: task.summary.clone(),
                blocked_selectors: task.blocked_selectors.clone(),
            }
        })
    }

    /// Append a step and fold it into the working memory.
    pub(crate) fn record_step(&self, id: &str, step: Step) -> Result<(), RegistryError> {
        self.with_task(id, |task| {
            debug_assert_eq!(step.iteration as usize, task.steps.len() + 1);
            task.summary = memory::update(
                &task.summary,
                &StepOutcome {
                    iteration: step.iteration,
                    action: &step.action,
                    thought: &step.thought,
                    execution_success: step.execution_success,
                    execution_error: &step.execution_error,
                    page_url: &step.url,
                },
            );
            task.steps.push(step);
        })
    }

    pub(crate) fn block_selector(&self, id: &str, selector: &str) -> Result<(), RegistryError> {
        self.with_task(id, |task| {
            task.blocked_selectors.insert(selector.to_string());
        })
    }

    fn with_task<R>(&self, id: &str, f: impl FnOnce(&mut Task) -> R) -> Result<R, RegistryError> {
        let mut tasks = self.tasks.write();
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        Ok(f(task))
    }
}
