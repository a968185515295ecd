//! Task lifecycle: submit a goal, get a snapshot, watch it live.

mod runner;

use std::sync::Arc;

use tracing::info;

use crate::brain::Oracle;
use crate::events::{EventHub, SubscriberId, Subscription};
use crate::hands::SurfaceLauncher;
use crate::registry::TaskRegistry;
use crate::types::Task;

pub use runner::LoopConfig;

/// Runs one independent decision loop per submitted task.
#[derive(Clone)]
pub struct Agent {
    registry: Arc<TaskRegistry>,
    events: Arc<EventHub>,
    oracle: Arc<dyn Oracle>,
    launcher: Arc<dyn SurfaceLauncher>,
    config: Arc<LoopConfig>,
}

impl Agent {
    pub fn new(
        oracle: Arc<dyn Oracle>,
        launcher: Arc<dyn SurfaceLauncher>,
        config: LoopConfig,
    ) -> Self {
        Self {
            registry: Arc::new(TaskRegistry::new()),
            events: Arc::new(EventHub::default()),
            oracle,
            launcher,
            config: Arc::new(config),
        }
    }

    /// Create a pending task and start its loop in the background.
    /// Returns immediately with the task id. Must be called inside a tokio runtime.
    pub fn submit(&self, prompt: &str) -> String {
        let task_id = self.registry.create(prompt);
        info!(task_id = %task_id, "task submitted");
        tokio::spawn(runner::TaskRunner::new(self.clone(), task_id.clone()).run());
        task_id
    }

    /// A deep copy of the task, or `None` if the id is unknown.
    pub fn get(&self, task_id: &str) -> Option<Task> {
        self.registry.get(task_id)
    }

    pub fn subscribe(&self, task_id: &str) -> Subscription {
        self.events.subscribe(task_id)
    }

    pub fn unsubscribe(&self, task_id: &str, id: SubscriberId) {
        self.events.unsubscribe(task_id, id)
    }

    /// Live observers currently attached to the task.
    pub fn subscriber_count(&self, task_id: &str) -> usize {
        self.events.subscriber_count(task_id)
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.registry.contains(task_id)
    }
}
