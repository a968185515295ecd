use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use tracing::{debug, info};

use super::dom::{self, AX_TREE_MAX_CHARS, DOM_SNAPSHOT_MAX_CHARS};
use super::{Surface, SurfaceError, SurfaceLauncher};
use crate::types::ScrollDirection;

const ELEMENT_TIMEOUT: Duration = Duration::from_secs(10);
const SCROLL_PIXELS: i64 = 500;

const VISIBLE_JS: &str = "function() { const r = this.getBoundingClientRect(); const s = getComputedStyle(this); return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none'; }";
const CLEAR_JS: &str = "function() { if ('value' in this) { this.value = ''; } else if (this.isContentEditable) { this.textContent = ''; } }";

/// Launches a dedicated Chrome per task.
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    pub headless: bool,
    pub width: u32,
    pub height: u32,
}

#[async_trait]
impl SurfaceLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<Box<dyn Surface>, SurfaceError> {
        let launcher = self.clone();
        let surface = tokio::task::spawn_blocking(move || ChromeSurface::launch(&launcher))
            .await
            .map_err(|e| SurfaceError::Launch(format!("browser launch panicked: {e}")))?
            .map_err(|e| SurfaceError::Launch(format!("{e:#}")))?;
        Ok(Box::new(surface))
    }
}

/// A Chrome window driven over CDP. The browser process dies with this value.
pub struct ChromeSurface {
    _browser: Browser,
    tab: Arc<Tab>,
}

impl ChromeSurface {
    fn launch(opts: &ChromeLauncher) -> anyhow::Result<Self> {
        info!(headless = opts.headless, width = opts.width, height = opts.height, "launching chrome");

        let options = LaunchOptions {
            headless: opts.headless,
            sandbox: false,
            window_size: Some((opts.width, opts.height)),
            args: vec![
                OsStr::new("--no-first-run"),
                OsStr::new("--no-default-browser-check"),
                OsStr::new("--disable-gpu"),
                OsStr::new("--disable-dev-shm-usage"),
                // Anti-bot flags
                OsStr::new("--disable-blink-features=AutomationControlled"),
                OsStr::new("--disable-infobars"),
            ],
            idle_browser_timeout: Duration::from_secs(300),
            ..Default::default()
        };

        let browser = Browser::new(options)
            .map_err(|e| anyhow::anyhow!("Browser launch failed: {}", e))?;
        let tab = browser.new_tab()?;
        tab.navigate_to("about:blank")?;

        debug!("chrome ready");
        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    /// Run a blocking CDP interaction off the async runtime.
    async fn on_tab<T, F>(&self, op: F) -> Result<T, SurfaceError>
    where
        T: Send + 'static,
        F: FnOnce(&Tab) -> Result<T, SurfaceError> + Send + 'static,
    {
        let tab = self.tab.clone();
        tokio::task::spawn_blocking(move || op(&tab))
            .await
            .map_err(|e| SurfaceError::Other(format!("browser task panicked: {e}")))?
    }
}

fn find<'a>(tab: &'a Tab, selector: &str) -> Result<Element<'a>, SurfaceError> {
    tab.wait_for_element_with_custom_timeout(selector, ELEMENT_TIMEOUT)
        .map_err(|_| SurfaceError::ElementNotFound(selector.to_string()))
}

fn ensure_visible(element: &Element<'_>, selector: &str) -> Result<(), SurfaceError> {
    let _ = element.scroll_into_view();
    let visible = element
        .call_js_fn(VISIBLE_JS, vec![], false)
        .map_err(SurfaceError::other)?
        .value
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if visible {
        Ok(())
    } else {
        Err(SurfaceError::NotVisible(selector.to_string()))
    }
}

fn evaluate_string(tab: &Tab, script: &str) -> Result<String, SurfaceError> {
    let result = tab.evaluate(script, false).map_err(SurfaceError::other)?;
    Ok(result
        .value
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_default())
}

/// Run a gesture script; `target` names the second element of a drag.
fn run_gesture(
    tab: &Tab,
    script: &str,
    selector: &str,
    target: Option<&str>,
) -> Result<(), SurfaceError> {
    let outcome = evaluate_string(tab, script)?;
    dom::gesture_result(&outcome, selector, target)
}

#[async_trait]
impl Surface for ChromeSurface {
    async fn navigate(&self, url: &str) -> Result<(), SurfaceError> {
        let url = url.to_string();
        self.on_tab(move |tab| {
            tab.navigate_to(&url)
                .and_then(|t| t.wait_until_navigated())
                .map(|_| ())
                .map_err(|e| SurfaceError::Other(format!("navigate to {url} failed: {e}")))
        })
        .await
    }

    async fn click(&self, selector: &str) -> Result<(), SurfaceError> {
        let selector = selector.to_string();
        self.on_tab(move |tab| {
            let element = find(tab, &selector)?;
            ensure_visible(&element, &selector)?;
            element
                .click()
                .map(|_| ())
                .map_err(|e| SurfaceError::Interaction {
                    action: "click",
                    selector: selector.clone(),
                    reason: e.to_string(),
                })
        })
        .await
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<(), SurfaceError> {
        let selector = selector.to_string();
        let text = text.to_string();
        self.on_tab(move |tab| {
            let element = find(tab, &selector)?;
            ensure_visible(&element, &selector)?;
            let interaction = |e: anyhow::Error| SurfaceError::Interaction {
                action: "type",
                selector: selector.clone(),
                reason: e.to_string(),
            };
            element.click().map_err(interaction)?;
            element
                .call_js_fn(CLEAR_JS, vec![], false)
                .map_err(interaction)?;

            // A newline in the value means "press Enter".
            let mut lines = text.split('\n').peekable();
            while let Some(line) = lines.next() {
                if !line.is_empty() {
                    tab.type_str(line).map_err(interaction)?;
                }
                if lines.peek().is_some() {
                    tab.press_key("Enter").map_err(interaction)?;
                }
            }
            Ok(())
        })
        .await
    }

    async fn scroll(&self, direction: ScrollDirection) -> Result<(), SurfaceError> {
        let pixels = match direction {
            ScrollDirection::Up => -SCROLL_PIXELS,
            ScrollDirection::Down => SCROLL_PIXELS,
        };
        self.on_tab(move |tab| {
            tab.evaluate(&dom::scroll_script(pixels), false)
                .map(|_| ())
                .map_err(SurfaceError::other)
        })
        .await
    }

    async fn hold(&self, selector: &str, duration: Duration) -> Result<(), SurfaceError> {
        let selector = selector.to_string();
        self.on_tab(move |tab| {
            run_gesture(tab, &dom::mouse_event_script(&selector, "mousedown"), &selector, None)?;
            std::thread::sleep(duration);
            run_gesture(tab, &dom::mouse_event_script(&selector, "mouseup"), &selector, None)
        })
        .await
    }

    async fn drag(&self, source: &str, target: &str) -> Result<(), SurfaceError> {
        let script = dom::drag_script(source, target);
        let source = source.to_string();
        let target = target.to_string();
        self.on_tab(move |tab| run_gesture(tab, &script, &source, Some(&target)))
            .await
    }

    async fn screenshot(&self) -> Result<Vec<u8>, SurfaceError> {
        self.on_tab(|tab| {
            tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
                .map_err(|e| SurfaceError::Other(format!("screenshot failed: {e}")))
        })
        .await
    }

    async fn url(&self) -> Result<String, SurfaceError> {
        self.on_tab(|tab| evaluate_string(tab, "window.location.href"))
            .await
    }

    async fn title(&self) -> Result<String, SurfaceError> {
        self.on_tab(|tab| evaluate_string(tab, "document.title"))
            .await
    }

    async fn dom(&self) -> Result<String, SurfaceError> {
        self.on_tab(|tab| {
            let raw = evaluate_string(tab, dom::SNAPSHOT_JS)?;
            Ok(dom::clip_snapshot(raw, DOM_SNAPSHOT_MAX_CHARS))
        })
        .await
    }

    async fn accessibility_tree(&self) -> Result<String, SurfaceError> {
        self.on_tab(|tab| {
            let raw = evaluate_string(tab, dom::ACCESSIBILITY_JS)?;
            Ok(dom::clip_snapshot(raw, AX_TREE_MAX_CHARS))
        })
        .await
    }
}
