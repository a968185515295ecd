//! Working memory: a bounded markdown summary the oracle reads instead of the
//! full step history.
//!
//! Everything here is a pure function of (prior summary, step outcome) so it can
//! be exercised without a running loop.

use crate::types::{ActionKind, ActionRecord};

const INLINE_MAX_CHARS: usize = 50;
const THOUGHT_MAX_CHARS: usize = 150;
const ERROR_MAX_CHARS: usize = 200;

/// What one iteration produced, as seen by the summarizer.
#[derive(Debug, Clone, Copy)]
pub struct StepOutcome<'a> {
    pub iteration: u32,
    pub action: &'a ActionRecord,
    pub thought: &'a str,
    pub execution_success: bool,
    pub execution_error: &'a str,
    pub page_url: &'a str,
}

/// Summary a task starts out with.
pub fn initial_summary(prompt: &str) -> String {
    format!(
        "## Task Summary\n\n**Goal:** {}\n\n**Initial Context:**\n- Task just started\n- No pages visited yet\n- No actions taken\n\n**Progress:**\n- [ ] Started task\n",
        one_line(prompt)
    )
}

/// Fold one step into the summary. Returns the summary unchanged if a block for
/// the same iteration is already present.
pub fn update(summary: &str, outcome: &StepOutcome<'_>) -> String {
    if contains_step(summary, outcome.iteration) {
        return summary.to_string();
    }

    let mut out = String::with_capacity(summary.len() + 256);
    out.push_str(summary);

    let phase = phase_label(summary, outcome.page_url);
    let action = outcome.action;
    let indicator = if outcome.execution_success { "[x]" } else { "[ ]" };

    out.push_str(&format!("\n{}{})\n", step_header(outcome.iteration), phase));
    let kind = if action.action.trim().is_empty() {
        "(none)".to_string()
    } else {
        clip(&action.action, INLINE_MAX_CHARS)
    };
    out.push_str(&format!("- **Action:** {kind}"));
    if !action.selector.is_empty() {
        out.push_str(&format!(" on `{}`", clip(&action.selector, INLINE_MAX_CHARS)));
    }
    if !action.value.is_empty() {
        let value = clip(&action.value, INLINE_MAX_CHARS);
        if action.kind() == Some(ActionKind::Type) {
            out.push_str(&format!(" with value: \"{value}\""));
        } else {
            out.push_str(&format!(" with value: {value}"));
        }
    }
    out.push('\n');

    if !outcome.thought.is_empty() {
        out.push_str(&format!(
            "- **Thought:** {}\n",
            clip(outcome.thought, THOUGHT_MAX_CHARS)
        ));
    }

    if outcome.execution_success {
        out.push_str(&format!("- **Status:** {indicator} Completed\n"));
        if let Some(discovery) = discovery(action) {
            out.push_str(&format!("- **Key Discovery:** {discovery}\n"));
        }
    } else if !outcome.execution_error.is_empty() {
        out.push_str(&format!(
            "- **Error:** {}\n",
            clip(outcome.execution_error, ERROR_MAX_CHARS)
        ));
        out.push_str(&format!("- **Status:** {indicator} FAILED\n"));
        if let Some(lesson) = lesson(action, outcome.execution_error) {
            out.push_str(&format!("- **DO NOT REPEAT:** {lesson}\n"));
        }
    }

    out
}

fn step_header(iteration: u32) -> String {
    format!("### Step {iteration} (")
}

/// Only headers start a line: every piece of free text is flattened by `clip`.
fn contains_step(summary: &str, iteration: u32) -> bool {
    let header = step_header(iteration);
    summary.lines().any(|line| line.starts_with(&header))
}

fn phase_label(summary: &str, page_url: &str) -> &'static str {
    if summary.contains("Logged in") || page_url.contains("dashboard") || page_url.contains("account")
    {
        "Logged in / Post-login"
    } else if summary.contains("Navigated to") {
        "Navigation"
    } else {
        "Progress"
    }
}

/// Guidance on what not to try again after a failed action.
pub fn lesson(action: &ActionRecord, error: &str) -> Option<String> {
    let selector = clip(&action.selector, INLINE_MAX_CHARS);

    if error.contains("element not found") || error.contains("does not have child") {
        return Some(match action.kind() {
            Some(ActionKind::Click) => {
                format!("Selector `{selector}` doesn't work - element not found or incorrect")
            }
            Some(ActionKind::Type) => format!(
                "Text entry into `{selector}` failed - editor may use rich text or a different DOM structure"
            ),
            _ => format!("Selector `{selector}` does not resolve - do not reuse it"),
        });
    }

    if error.contains("not visible") {
        return Some(format!(
            "Element `{selector}` exists but is not visible - scroll or dismiss overlays first"
        ));
    }

    if error.contains("click failed") {
        return Some(format!(
            "Click on `{selector}` failed - element may be covered or disabled"
        ));
    }

    if error.starts_with("unknown action type") || error.starts_with("missing action type") {
        return Some(format!(
            "`{}` is not an action - use one of navigate, click, type, scroll, wait, hold, drag, done",
            clip(&action.action, INLINE_MAX_CHARS)
        ));
    }

    None
}

/// Something worth remembering about a successful action.
pub fn discovery(action: &ActionRecord) -> Option<String> {
    match action.kind()? {
        ActionKind::Type => Some(format!(
            "Successfully typed into {}",
            clip(&action.selector, INLINE_MAX_CHARS)
        )),
        ActionKind::Click => Some(format!(
            "Successfully clicked {}",
            clip(&action.selector, INLINE_MAX_CHARS)
        )),
        ActionKind::Navigate => Some(format!("Navigated to {}", one_line(&action.value))),
        _ => None,
    }
}

fn one_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

/// `truncate` for text embedded in a summary line.
fn clip(text: &str, max_chars: usize) -> String {
    truncate(&one_line(text), max_chars)
}

/// Clip `text` to at most `max_chars` characters, marking the cut with `...`.
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
