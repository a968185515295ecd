//! The decision oracle: given what the page looks like and what happened so far,
//! it proposes the next action.

mod error;
mod openrouter;
pub mod prompt;

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{ActionKind, ActionRecord, Step};

pub use error::{ErrorClass, OracleError, classify};
pub use openrouter::OpenRouterClient;

/// Everything the oracle gets to see for one decision.
#[derive(Debug, Clone, Copy)]
pub struct DecisionRequest<'a> {
    pub system_prompt: &'a str,
    pub screenshot: &'a [u8],
    pub url: &'a str,
    pub title: &'a str,
    pub task_prompt: &'a str,
    /// Most recent steps only, oldest first.
    pub history: &'a [Step],
    pub dom: &'a str,
    pub accessibility_tree: &'a str,
    pub summary: &'a str,
    pub blocked_selectors: &'a BTreeSet<String>,
}

/// The oracle's reply. `action` is kept as free text so a finished task or an
/// unknown kind still parses; the dispatcher judges it later.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    #[serde(default)]
    pub thought: String,
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

impl Decision {
    /// A `done` action counts as finishing even if the flag was left unset.
    pub fn is_done(&self) -> bool {
        self.done || ActionKind::from_name(&self.action) == Some(ActionKind::Done)
    }

    /// The proposed action as it is stored on a step.
    pub fn record(&self) -> ActionRecord {
        ActionRecord {
            action: match self.action.trim() {
                "" if self.is_done() => ActionKind::Done.as_str().to_string(),
                kind => kind.to_string(),
            },
            selector: self.selector.clone(),
            value: self.value.clone(),
            done: self.is_done(),
            success: self.success,
        }
    }
}

#[async_trait]
pub trait Oracle: Send + Sync {
    async fn decide(&self, request: DecisionRequest<'_>) -> Result<Decision, OracleError>;
}

/// Parse a decision out of model output, tolerating markdown code fences.
pub fn parse_decision(content: &str) -> Result<Decision, OracleError> {
    let cleaned = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    serde_json::from_str(cleaned)
        .map_err(|e| OracleError::Parse(format!("{e}; raw content: {cleaned}")))
}
