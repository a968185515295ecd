use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a task. Only moves forward: pending -> running -> completed | failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Whether `next` is a legal forward transition from `self`.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Running, TaskStatus::Completed)
                | (TaskStatus::Running, TaskStatus::Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user-submitted goal and everything the agent did for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub prompt: String,
    pub status: TaskStatus,
    pub steps: Vec<Step>,
    pub summary: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub blocked_selectors: BTreeSet<String>,
}

impl Task {
    /// Drop screenshot payloads. The polling read never carries them.
    pub fn strip_screenshots(&mut self) {
        for step in &mut self.steps {
            step.screenshot = None;
        }
    }
}

/// A single iteration of the agent loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub iteration: u32,
    /// Base64 PNG, only present on the live channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    pub url: String,
    pub title: String,
    pub thought: String,
    pub action: ActionRecord,
    pub execution_success: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub execution_error: String,
    pub timestamp: DateTime<Utc>,
}

/// The closed set of things the oracle may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Navigate,
    Click,
    Type,
    Scroll,
    Wait,
    Hold,
    Drag,
    Done,
}

impl ActionKind {
    pub const ALL: [ActionKind; 8] = [
        ActionKind::Navigate,
        ActionKind::Click,
        ActionKind::Type,
        ActionKind::Scroll,
        ActionKind::Wait,
        ActionKind::Hold,
        ActionKind::Drag,
        ActionKind::Done,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Navigate => "navigate",
            ActionKind::Click => "click",
            ActionKind::Type => "type",
            ActionKind::Scroll => "scroll",
            ActionKind::Wait => "wait",
            ActionKind::Hold => "hold",
            ActionKind::Drag => "drag",
            ActionKind::Done => "done",
        }
    }

    /// Case-insensitive lookup by wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An action exactly as the oracle proposed it. Nothing here is validated:
/// `action` may name an unknown kind and required fields may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub selector: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub success: bool,
}

impl ActionRecord {
    pub fn kind(&self) -> Option<ActionKind> {
        ActionKind::from_name(&self.action)
    }

    /// Click and navigate are the actions most likely to kick off
    /// asynchronous page changes.
    pub fn is_state_changing(&self) -> bool {
        matches!(
            self.kind(),
            Some(ActionKind::Click | ActionKind::Navigate)
        )
    }
}

/// A validated action, ready to run against a surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Navigate { url: String },
    Click { selector: String },
    Type { selector: String, text: String },
    Scroll { direction: ScrollDirection },
    Wait,
    Hold { selector: String, duration: Duration },
    Drag { source: String, target: String },
    Done { success: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    Up,
    Down,
}

/// Notifications streamed to live observers of a task.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Screenshot { screenshot: String },
    StepComplete { step: Box<Step> },
    TaskComplete { message: String },
    TaskFailed { error: String },
}

/// What goes over the wire: the event plus the task it belongs to.
#[derive(Debug, Serialize)]
pub struct WireEvent<'a> {
    pub task_id: &'a str,
    #[serde(flatten)]
    pub event: &'a Event,
}
