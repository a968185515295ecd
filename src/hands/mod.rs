//! The automation surface: whatever can drive a page and report what it shows.

mod chrome;
pub mod dom;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::ScrollDirection;

pub use chrome::{ChromeLauncher, ChromeSurface};

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("element exists but is not visible: {0}")]
    NotVisible(String),

    #[error("{action} failed on {selector}: {reason}")]
    Interaction {
        action: &'static str,
        selector: String,
        reason: String,
    },

    #[error("failed to start browser: {0}")]
    Launch(String),

    #[error("{0}")]
    Other(String),
}

impl SurfaceError {
    pub fn other(err: impl std::fmt::Display) -> Self {
        Self::Other(err.to_string())
    }

    /// The selector this failure proves unusable, if any.
    pub fn unresolved_selector(&self) -> Option<&str> {
        match self {
            SurfaceError::ElementNotFound(selector) => Some(selector),
            _ => None,
        }
    }
}

/// One controlled browsing session.
#[async_trait]
pub trait Surface: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), SurfaceError>;
    async fn click(&self, selector: &str) -> Result<(), SurfaceError>;
    /// Clears the field, then types `text`. An empty `text` just clears it.
    async fn type_text(&self, selector: &str, text: &str) -> Result<(), SurfaceError>;
    async fn scroll(&self, direction: ScrollDirection) -> Result<(), SurfaceError>;
    async fn hold(&self, selector: &str, duration: Duration) -> Result<(), SurfaceError>;
    /// `target` is a selector, `up`/`down`, or an `x,y` pixel offset.
    async fn drag(&self, source: &str, target: &str) -> Result<(), SurfaceError>;

    /// PNG bytes of the current viewport.
    async fn screenshot(&self) -> Result<Vec<u8>, SurfaceError>;
    async fn url(&self) -> Result<String, SurfaceError>;
    async fn title(&self) -> Result<String, SurfaceError>;
    async fn dom(&self) -> Result<String, SurfaceError>;
    async fn accessibility_tree(&self) -> Result<String, SurfaceError>;
}

/// Starts a fresh surface for each task.
#[async_trait]
pub trait SurfaceLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn Surface>, SurfaceError>;
}
