#![allow(dead_code)]

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use browser_agent::brain::{Decision, DecisionRequest, Oracle, OracleError};
use browser_agent::hands::{Surface, SurfaceError, SurfaceLauncher};
use browser_agent::types::ScrollDirection;
use browser_agent::{Agent, LoopConfig, Task};
use parking_lot::Mutex;
use tokio::sync::Semaphore;

pub fn decision(action: &str, selector: &str, value: &str) -> Decision {
    Decision {
        thought: format!("{action} next"),
        action: action.into(),
        selector: selector.into(),
        value: value.into(),
        ..Default::default()
    }
}

pub fn done(success: bool, thought: &str) -> Decision {
    Decision {
        thought: thought.into(),
        action: "done".into(),
        done: true,
        success,
        ..Default::default()
    }
}

pub fn api_error(status: u16) -> OracleError {
    OracleError::Api {
        status,
        body: format!("status {status}"),
    }
}

/// What the oracle was shown on one call.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub history: Vec<u32>,
    pub blocked_selectors: BTreeSet<String>,
    pub summary: String,
}

/// Replays canned replies in order, then keeps asking to wait.
#[derive(Default)]
pub struct ScriptedOracle {
    replies: Mutex<VecDeque<Result<Decision, OracleError>>>,
    seen: Mutex<Vec<SeenRequest>>,
    fallback_error: Option<u16>,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedOracle {
    pub fn new(replies: Vec<Result<Decision, OracleError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Default::default()
        }
    }

    /// Like `new`, but every reply waits for a permit on `gate`.
    pub fn gated(replies: Vec<Result<Decision, OracleError>>, gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(replies)
        }
    }

    /// Fails every call with `status`.
    pub fn always_failing(status: u16) -> Self {
        Self {
            fallback_error: Some(status),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn decide(&self, request: DecisionRequest<'_>) -> Result<Decision, OracleError> {
        self.seen.lock().push(SeenRequest {
            history: request.history.iter().map(|s| s.iteration).collect(),
            blocked_selectors: request.blocked_selectors.clone(),
            summary: request.summary.to_string(),
        });
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate open").forget();
        }
        if let Some(reply) = self.replies.lock().pop_front() {
            return reply;
        }
        match self.fallback_error {
            Some(status) => Err(api_error(status)),
            None => Ok(decision("wait", "", "")),
        }
    }
}

/// In-memory page. `#missing` never resolves.
pub struct FakeSurface {
    calls: Arc<Mutex<Vec<String>>>,
    fail_screenshot: bool,
}

impl FakeSurface {
    fn record(&self, call: String) -> Result<(), SurfaceError> {
        self.calls.lock().push(call);
        Ok(())
    }

    fn resolve(&self, selector: &str) -> Result<(), SurfaceError> {
        if selector == "#missing" {
            Err(SurfaceError::ElementNotFound(selector.to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Surface for FakeSurface {
    async fn navigate(&self, url: &str) -> Result<(), SurfaceError> {
        self.record(format!("navigate {url}"))
    }
    async fn click(&self, selector: &str) -> Result<(), SurfaceError> {
        self.resolve(selector)?;
        self.record(format!("click {selector}"))
    }
    async fn type_text(&self, selector: &str, text: &str) -> Result<(), SurfaceError> {
        self.resolve(selector)?;
        self.record(format!("type {selector} {text}"))
    }
    async fn scroll(&self, direction: ScrollDirection) -> Result<(), SurfaceError> {
        self.record(format!("scroll {direction:?}"))
    }
    async fn hold(&self, selector: &str, duration: Duration) -> Result<(), SurfaceError> {
        self.resolve(selector)?;
        self.record(format!("hold {selector} {}", duration.as_millis()))
    }
    async fn drag(&self, source: &str, target: &str) -> Result<(), SurfaceError> {
        self.resolve(source)?;
        self.record(format!("drag {source} {target}"))
    }
    async fn screenshot(&self) -> Result<Vec<u8>, SurfaceError> {
        if self.fail_screenshot {
            return Err(SurfaceError::Other("target closed".into()));
        }
        Ok(vec![0x89, b'P', b'N', b'G'])
    }
    async fn url(&self) -> Result<String, SurfaceError> {
        Ok("https://example.test/".into())
    }
    async fn title(&self) -> Result<String, SurfaceError> {
        Ok("Example".into())
    }
    async fn dom(&self) -> Result<String, SurfaceError> {
        Err(SurfaceError::Other("no dom".into()))
    }
    async fn accessibility_tree(&self) -> Result<String, SurfaceError> {
        Ok(String::new())
    }
}

#[derive(Default, Clone)]
pub struct FakeLauncher {
    pub calls: Arc<Mutex<Vec<String>>>,
    pub fail_launch: bool,
    pub fail_screenshot: bool,
}

impl FakeLauncher {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl SurfaceLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn Surface>, SurfaceError> {
        if self.fail_launch {
            return Err(SurfaceError::Launch("chrome not installed".into()));
        }
        Ok(Box::new(FakeSurface {
            calls: self.calls.clone(),
            fail_screenshot: self.fail_screenshot,
        }))
    }
}

pub fn fast_config(max_iterations: u32) -> LoopConfig {
    LoopConfig {
        max_iterations,
        max_consecutive_oracle_errors: 3,
        retry_pause: Duration::ZERO,
        settle_after_change: Duration::ZERO,
        settle_default: Duration::ZERO,
        wait_pause: Duration::ZERO,
        history_window: 5,
    }
}

pub fn agent(oracle: Arc<ScriptedOracle>, launcher: FakeLauncher, max_iterations: u32) -> Agent {
    Agent::new(oracle, Arc::new(launcher), fast_config(max_iterations))
}

/// Poll until the task reaches a terminal state.
pub async fn wait_terminal(agent: &Agent, task_id: &str) -> Task {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let task = agent.get(task_id).expect("task exists");
        if task.status.is_terminal() {
            return task;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "task {task_id} never finished: {:?}",
            task.status
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
