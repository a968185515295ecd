use std::fmt::Write as _;

use super::DecisionRequest;
use crate::types::Step;

pub const SYSTEM_PROMPT: &str = r#"You are a browser automation agent. You control a real Chrome browser to complete tasks for the user, ONE action at a time.

You will receive:
1. A screenshot of the current browser state
2. The current page URL and title
3. The user's task
4. A TASK SUMMARY with previous actions, errors and key discoveries
5. Your last few actions in detail
6. A list of visible elements, each with a `selector=` you can use directly
7. An accessibility outline of the page
8. BLOCKED SELECTORS that are known not to resolve. Never use them again.

The summary already holds the history. Do not restate it in your thought.

## Learning from execution errors
- "element not found": the selector is wrong. Pick another from the element list.
- "element exists but is not visible": scroll, or dismiss overlays (cookie banners, modals) first.
- "click failed": the element is covered or disabled. Try another route.
- Same failure 2-3 times: change approach completely.

## Response format
Respond with ONLY a JSON object, no markdown, no text around it:
{
  "thought": "1-2 sentences: what you see and what you target next",
  "action": "navigate|click|type|scroll|wait|hold|drag|done",
  "selector": "CSS selector of the target element",
  "value": "URL for navigate, text for type, up/down for scroll, ms for hold, target for drag",
  "done": false,
  "success": false
}

## Actions
- "navigate": full https:// URL in "value".
- "click": CSS selector in "selector".
- "type": selector in "selector", text in "value". The field is cleared first. A trailing "\n" presses Enter.
- "scroll": "up" or "down" in "value".
- "wait": let the page load.
- "hold": press and hold "selector" for "value" milliseconds (default 1000).
- "drag": drag "selector" to "value", which is a CSS selector, "up"/"down", or "x,y" pixel offset.
- "done": the task is finished. Set "done": true and "success" as below.

## Completion
- "done": true, "success": true ONLY when you can see on screen that the task is accomplished.
- "done": true, "success": false when it cannot be done (login wall, CAPTCHA, feature missing). Use "thought" to explain why and where the user could look instead.
Try at least 3-4 different approaches before giving up.

Use CSS selectors only, never XPath."#;

/// Render the last steps as one line each, with any execution error below.
pub fn history_text(history: &[Step]) -> String {
    if history.is_empty() {
        return "(none — this is the first step)".to_string();
    }

    let mut out = String::new();
    for step in history {
        let status = if step.execution_success {
            "SUCCESS"
        } else {
            "FAILED"
        };
        let action = &step.action;
        let kind = if action.action.is_empty() {
            "(none)"
        } else {
            action.action.as_str()
        };
        let _ = write!(out, "Step {} [{}]: {}", step.iteration, status, kind);
        if !action.selector.is_empty() {
            let _ = write!(out, " on selector={:?}", action.selector);
        }
        if !action.value.is_empty() {
            let _ = write!(out, " value={:?}", action.value);
        }
        let _ = write!(out, " | URL: {}", step.url);
        if !step.thought.is_empty() {
            let _ = write!(out, " | Thought: {}", step.thought);
        }
        if !step.execution_success && !step.execution_error.is_empty() {
            let _ = write!(out, "\n  Execution Error: {}", step.execution_error);
        }
        out.push('\n');
    }
    out
}

/// The text part of the user message.
pub fn user_context(request: &DecisionRequest<'_>) -> String {
    let blocked = if request.blocked_selectors.is_empty() {
        "(none)".to_string()
    } else {
        request
            .blocked_selectors
            .iter()
            .map(|s| format!("- `{s}`"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "Task: {task}\n\nCurrent URL: {url}\nPage Title: {title}\n\n{summary}\n\nPrevious actions:\n{history}\n\nBLOCKED SELECTORS:\n{blocked}\n\nVisible elements:\n{dom}\n\nAccessibility outline:\n{ax}\n\nAnalyze the screenshot and decide the next action. Respond with JSON only.",
        task = request.task_prompt,
        url = request.url,
        title = request.title,
        summary = request.summary,
        history = history_text(request.history),
        dom = or_unavailable(request.dom),
        ax = or_unavailable(request.accessibility_tree),
    )
}

fn or_unavailable(text: &str) -> &str {
    if text.trim().is_empty() {
        "(unavailable)"
    } else {
        text
    }
}
