//! The per-task decision loop: observe -> decide -> execute -> record.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::Agent;
use crate::actions::ActionDispatcher;
use crate::brain::prompt::SYSTEM_PROMPT;
use crate::brain::{DecisionRequest, ErrorClass, OracleError, classify};
use crate::hands::Surface;
use crate::memory::truncate;
use crate::types::{Event, Step, TaskStatus};

/// Oracle error text kept on a failed task.
const ORACLE_ERROR_MAX_CHARS: usize = 320;
/// Any failure text kept on a task.
const TASK_ERROR_MAX_CHARS: usize = 2000;

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub max_iterations: u32,
    /// Consecutive retryable oracle failures tolerated before giving up.
    pub max_consecutive_oracle_errors: u32,
    pub retry_pause: Duration,
    /// Settle pause after click/navigate.
    pub settle_after_change: Duration,
    /// Settle pause after everything else.
    pub settle_default: Duration,
    /// How long a `wait` action sleeps.
    pub wait_pause: Duration,
    /// Steps shown to the oracle in detail.
    pub history_window: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 30,
            max_consecutive_oracle_errors: 5,
            retry_pause: Duration::from_secs(3),
            settle_after_change: Duration::from_secs(3),
            settle_default: Duration::from_secs(1),
            wait_pause: Duration::from_secs(2),
            history_window: 5,
        }
    }
}

enum Outcome {
    Completed,
    Failed(String),
}

pub(super) struct TaskRunner {
    agent: Agent,
    task_id: String,
    dispatcher: ActionDispatcher,
}

impl TaskRunner {
    pub(super) fn new(agent: Agent, task_id: String) -> Self {
        let dispatcher = ActionDispatcher::new(agent.config.wait_pause);
        Self {
            agent,
            task_id,
            dispatcher,
        }
    }

    pub(super) async fn run(self) {
        if let Err(e) = self
            .agent
            .registry
            .transition(&self.task_id, TaskStatus::Running, None)
        {
            error!(task_id = %self.task_id, "cannot start task: {e}");
            return;
        }
        info!(task_id = %self.task_id, "task running");

        let outcome = match self.agent.launcher.launch().await {
            Ok(surface) => self.drive(surface.as_ref()).await,
            Err(e) => Outcome::Failed(e.to_string()),
        };
        self.finish(outcome);
    }

    async fn drive(&self, surface: &dyn Surface) -> Outcome {
        let config = &self.agent.config;
        let registry = &self.agent.registry;
        let task_id = self.task_id.as_str();
        let mut error_streak = 0u32;
        let mut iteration = 1u32;

        while iteration <= config.max_iterations {
            info!(task_id, iteration, max = config.max_iterations, "iteration");

            // Observe
            let screenshot = match surface.screenshot().await {
                Ok(bytes) => bytes,
                Err(e) => {
                    return Outcome::Failed(format!(
                        "screenshot failed at iteration {iteration}: {e}"
                    ));
                }
            };
            let encoded = BASE64.encode(&screenshot);
            let url = surface.url().await.unwrap_or_default();
            let title = surface.title().await.unwrap_or_default();

            self.publish(Event::Screenshot {
                screenshot: encoded.clone(),
            });

            // Decide
            let context = match registry.decision_context(task_id, config.history_window) {
                Ok(context) => context,
                Err(e) => return Outcome::Failed(e.to_string()),
            };
            let dom = surface.dom().await.unwrap_or_else(|e| {
                debug!(task_id, "dom extraction failed: {e}");
                String::new()
            });
            let accessibility_tree = surface.accessibility_tree().await.unwrap_or_else(|e| {
                debug!(task_id, "accessibility extraction failed: {e}");
                String::new()
            });

            let request = DecisionRequest {
                system_prompt: SYSTEM_PROMPT,
                screenshot: &screenshot,
                url: &url,
                title: &title,
                task_prompt: &context.prompt,
                history: &context.history,
                dom: &dom,
                accessibility_tree: &accessibility_tree,
                summary: &context.summary,
                blocked_selectors: &context.blocked_selectors,
            };

            let decision = match self.agent.oracle.decide(request).await {
                Ok(decision) => {
                    error_streak = 0;
                    decision
                }
                Err(err) => {
                    error_streak += 1;
                    warn!(task_id, iteration, error_streak, "oracle error: {err}");
                    match retry_policy(&err, error_streak, config.max_consecutive_oracle_errors) {
                        Retry::Abort(message) => return Outcome::Failed(message),
                        Retry::Again => {
                            tokio::time::sleep(config.retry_pause).await;
                            continue;
                        }
                    }
                }
            };

            info!(
                task_id,
                iteration,
                action = %decision.action,
                selector = %decision.selector,
                done = decision.done,
                success = decision.success,
                "decision: {}",
                decision.thought
            );

            let action = decision.record();

            // Complete
            if decision.is_done() {
                let step = Step {
                    iteration,
                    screenshot: Some(encoded),
                    url,
                    title,
                    thought: decision.thought.clone(),
                    action,
                    execution_success: true,
                    execution_error: String::new(),
                    timestamp: Utc::now(),
                };
                if let Err(e) = self.record(step) {
                    return Outcome::Failed(e);
                }
                return if decision.success {
                    Outcome::Completed
                } else {
                    Outcome::Failed(decision.thought)
                };
            }

            // Execute
            let (execution_success, execution_error) =
                match self.dispatcher.execute(surface, &action).await {
                    Ok(()) => (true, String::new()),
                    Err(e) => {
                        warn!(task_id, iteration, "action error: {e}");
                        if let Some(selector) = e.unresolved_selector() {
                            if let Err(err) = registry.block_selector(task_id, selector) {
                                warn!(task_id, iteration, selector, "cannot block selector: {err}");
                            }
                        }
                        (false, e.to_string())
                    }
                };

            // Settle
            let settle = if action.is_state_changing() {
                config.settle_after_change
            } else {
                config.settle_default
            };
            tokio::time::sleep(settle).await;

            // Record
            let step = Step {
                iteration,
                screenshot: Some(encoded),
                url,
                title,
                thought: decision.thought,
                action,
                execution_success,
                execution_error,
                timestamp: Utc::now(),
            };
            if let Err(e) = self.record(step) {
                return Outcome::Failed(e);
            }

            iteration += 1;
        }

        Outcome::Failed(format!(
            "max iterations ({}) reached without completing task",
            config.max_iterations
        ))
    }

    /// Append the step, fold it into memory, tell observers.
    fn record(&self, step: Step) -> Result<(), String> {
        self.agent
            .registry
            .record_step(&self.task_id, step.clone())
            .map_err(|e| e.to_string())?;
        self.publish(Event::StepComplete {
            step: Box::new(step),
        });
        Ok(())
    }

    fn finish(&self, outcome: Outcome) {
        let (status, error, event) = match outcome {
            Outcome::Completed => (
                TaskStatus::Completed,
                None,
                Event::TaskComplete {
                    message: "Task completed successfully".to_string(),
                },
            ),
            Outcome::Failed(message) => {
                let message = truncate(&message, TASK_ERROR_MAX_CHARS);
                (
                    TaskStatus::Failed,
                    Some(message.clone()),
                    Event::TaskFailed { error: message },
                )
            }
        };

        if let Err(e) = self
            .agent
            .registry
            .transition(&self.task_id, status, error.clone())
        {
            error!(task_id = %self.task_id, "cannot finish task: {e}");
            return;
        }
        match &error {
            None => info!(task_id = %self.task_id, "task completed"),
            Some(message) => info!(task_id = %self.task_id, "task failed: {message}"),
        }
        self.publish(event);
    }

    fn publish(&self, event: Event) {
        self.agent.events.publish(&self.task_id, event);
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Retry {
    Again,
    Abort(String),
}

/// What to do after the `streak`-th consecutive oracle failure.
fn retry_policy(err: &OracleError, streak: u32, threshold: u32) -> Retry {
    let clipped = truncate(&err.to_string(), ORACLE_ERROR_MAX_CHARS);
    match classify(err) {
        ErrorClass::Fatal => Retry::Abort(format!(
            "oracle rejected the request with status {}. Likely invalid model input (for example an oversized screenshot). {clipped}",
            err.status_code().unwrap_or_default()
        )),
        ErrorClass::Retryable if streak >= threshold => {
            Retry::Abort(format!("oracle failed {streak} times in a row. {clipped}"))
        }
        ErrorClass::Retryable => Retry::Again,
    }
}
