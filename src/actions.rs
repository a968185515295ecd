//! Turning a proposed action into exactly one surface call.

use std::time::Duration;

use thiserror::Error;

use crate::hands::{Surface, SurfaceError};
use crate::types::{Action, ActionKind, ActionRecord, ScrollDirection};

pub const DEFAULT_HOLD_MS: u64 = 1000;

#[derive(Debug, Error)]
pub enum ActionError {
    /// A required field was missing or malformed. The surface was never touched.
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

impl ActionError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// The selector this failure proves unusable, if any.
    pub fn unresolved_selector(&self) -> Option<&str> {
        match self {
            ActionError::Surface(err) => err.unresolved_selector(),
            ActionError::Validation(_) => None,
        }
    }
}

/// Empty scrolls go down.
pub fn parse_direction(raw: &str) -> Result<ScrollDirection, ActionError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "down" => Ok(ScrollDirection::Down),
        "up" => Ok(ScrollDirection::Up),
        other => Err(ActionError::invalid(format!(
            "scroll direction must be up or down, got {other:?}"
        ))),
    }
}

/// Check the proposal's kind and required fields and build the typed action.
/// A set `done` flag wins over whatever kind was named.
pub fn parse(record: &ActionRecord) -> Result<Action, ActionError> {
    fn require(field: &str, message: &str) -> Result<String, ActionError> {
        if field.trim().is_empty() {
            Err(ActionError::invalid(message))
        } else {
            Ok(field.to_string())
        }
    }

    if record.done {
        return Ok(Action::Done {
            success: record.success,
        });
    }

    let Some(kind) = record.kind() else {
        return Err(if record.action.trim().is_empty() {
            ActionError::invalid("missing action type")
        } else {
            ActionError::invalid(format!("unknown action type: {}", record.action.trim()))
        });
    };

    let selector = &record.selector;
    let value = &record.value;
    Ok(match kind {
        ActionKind::Navigate => Action::Navigate {
            url: require(value, "navigate action requires a URL in value")?,
        },
        ActionKind::Click => Action::Click {
            selector: require(selector, "click action requires a selector")?,
        },
        ActionKind::Type => Action::Type {
            selector: require(selector, "type action requires a selector")?,
            text: value.clone(),
        },
        ActionKind::Scroll => Action::Scroll {
            direction: parse_direction(value)?,
        },
        ActionKind::Wait => Action::Wait,
        ActionKind::Hold => Action::Hold {
            selector: require(selector, "hold action requires a selector")?,
            duration: Duration::from_millis(value.trim().parse().unwrap_or(DEFAULT_HOLD_MS)),
        },
        ActionKind::Drag => Action::Drag {
            source: require(selector, "drag action requires a source selector")?,
            target: require(value, "drag action requires a target in value")?,
        },
        ActionKind::Done => Action::Done {
            success: record.success,
        },
    })
}

/// Executes proposed actions against a surface. Settle pauses are the
/// caller's business; only `wait` sleeps here.
#[derive(Debug, Clone)]
pub struct ActionDispatcher {
    wait: Duration,
}

impl ActionDispatcher {
    pub fn new(wait: Duration) -> Self {
        Self { wait }
    }

    /// Validate, then make exactly one surface call.
    pub async fn execute(
        &self,
        surface: &dyn Surface,
        record: &ActionRecord,
    ) -> Result<(), ActionError> {
        match parse(record)? {
            Action::Navigate { url } => surface.navigate(&url).await?,
            Action::Click { selector } => surface.click(&selector).await?,
            Action::Type { selector, text } => surface.type_text(&selector, &text).await?,
            Action::Scroll { direction } => surface.scroll(direction).await?,
            Action::Wait => tokio::time::sleep(self.wait).await,
            Action::Hold { selector, duration } => surface.hold(&selector, duration).await?,
            Action::Drag { source, target } => surface.drag(&source, &target).await?,
            Action::Done { .. } => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSurface {
        calls: Mutex<Vec<String>>,
    }

    impl RecordingSurface {
        fn record(&self, call: String) -> Result<(), SurfaceError> {
            self.calls.lock().push(call);
            Ok(())
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl Surface for RecordingSurface {
        async fn navigate(&self, url: &str) -> Result<(), SurfaceError> {
            self.record(format!("navigate {url}"))
        }
        async fn click(&self, selector: &str) -> Result<(), SurfaceError> {
            if selector == "#missing" {
                return Err(SurfaceError::ElementNotFound(selector.into()));
            }
            self.record(format!("click {selector}"))
        }
        async fn type_text(&self, selector: &str, text: &str) -> Result<(), SurfaceError> {
            self.record(format!("type {selector} {text:?}"))
        }
        async fn scroll(&self, direction: ScrollDirection) -> Result<(), SurfaceError> {
            self.record(format!("scroll {direction:?}"))
        }
        async fn hold(&self, selector: &str, duration: Duration) -> Result<(), SurfaceError> {
            self.record(format!("hold {selector} {}", duration.as_millis()))
        }
        async fn drag(&self, source: &str, target: &str) -> Result<(), SurfaceError> {
            self.record(format!("drag {source} {target}"))
        }
        async fn screenshot(&self) -> Result<Vec<u8>, SurfaceError> {
            Ok(vec![])
        }
        async fn url(&self) -> Result<String, SurfaceError> {
            Ok(String::new())
        }
        async fn title(&self) -> Result<String, SurfaceError> {
            Ok(String::new())
        }
        async fn dom(&self) -> Result<String, SurfaceError> {
            Ok(String::new())
        }
        async fn accessibility_tree(&self) -> Result<String, SurfaceError> {
            Ok(String::new())
        }
    }

    fn proposal(action: &str, selector: &str, value: &str) -> ActionRecord {
        ActionRecord {
            action: action.into(),
            selector: selector.into(),
            value: value.into(),
            ..Default::default()
        }
    }

    fn dispatcher() -> ActionDispatcher {
        ActionDispatcher::new(Duration::ZERO)
    }

    #[test]
    fn hold_duration_falls_back_to_default() {
        assert_eq!(
            parse(&proposal("hold", "#h", "soon")).unwrap(),
            Action::Hold {
                selector: "#h".into(),
                duration: Duration::from_millis(DEFAULT_HOLD_MS)
            }
        );
        assert_eq!(
            parse(&proposal("hold", "#h", "2500")).unwrap(),
            Action::Hold {
                selector: "#h".into(),
                duration: Duration::from_millis(2500)
            }
        );
    }

    #[test]
    fn done_flag_wins_over_action_kind() {
        let mut record = proposal("click", "#a", "");
        record.done = true;
        record.success = true;
        assert_eq!(parse(&record).unwrap(), Action::Done { success: true });

        let mut record = proposal("", "", "");
        record.done = true;
        assert_eq!(parse(&record).unwrap(), Action::Done { success: false });
    }

    #[test]
    fn unknown_or_missing_kinds_are_validation_errors() {
        let err = parse(&proposal("teleport", "#a", "")).unwrap_err();
        assert_eq!(err.to_string(), "unknown action type: teleport");
        let err = parse(&proposal("  ", "#a", "")).unwrap_err();
        assert_eq!(err.to_string(), "missing action type");
        assert_eq!(
            parse(&proposal("CLICK", "#a", "")).unwrap(),
            Action::Click {
                selector: "#a".into()
            }
        );
    }

    #[tokio::test]
    async fn missing_fields_fail_before_touching_the_surface() {
        let surface = RecordingSurface::default();
        let cases = [
            proposal("navigate", "", ""),
            proposal("click", "", ""),
            proposal("type", "", "text"),
            proposal("hold", "", "100"),
            proposal("drag", "", "#b"),
            proposal("drag", "#a", ""),
            proposal("scroll", "", "sideways"),
            proposal("teleport", "#a", ""),
        ];
        for case in &cases {
            let err = dispatcher().execute(&surface, case).await.unwrap_err();
            assert!(matches!(err, ActionError::Validation(_)), "{case:?}");
            assert_eq!(err.unresolved_selector(), None);
        }
        assert!(surface.calls().is_empty());
    }

    #[tokio::test]
    async fn dispatches_one_call_per_action() {
        let surface = RecordingSurface::default();
        let d = dispatcher();
        for case in [
            proposal("navigate", "", "https://a.test"),
            proposal("type", "#q", ""),
            proposal("scroll", "", ""),
            proposal("scroll", "", "UP"),
            proposal("drag", "#a", "up"),
            proposal("wait", "", ""),
        ] {
            d.execute(&surface, &case).await.unwrap();
        }

        assert_eq!(
            surface.calls(),
            vec![
                "navigate https://a.test".to_string(),
                "type #q \"\"".to_string(),
                "scroll Down".to_string(),
                "scroll Up".to_string(),
                "drag #a up".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn surface_failures_are_reported_not_raised() {
        let surface = RecordingSurface::default();
        let err = dispatcher()
            .execute(&surface, &proposal("click", "#missing", ""))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "element not found: #missing");
        assert_eq!(err.unresolved_selector(), Some("#missing"));
    }
}
