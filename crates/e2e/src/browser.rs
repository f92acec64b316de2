//! Browser capability seam
//!
//! Page objects are written against [`BrowserPage`] so they can drive a real
//! Playwright browser or an in-memory fake.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::E2eResult;

/// Element state to wait for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

impl WaitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitState::Visible => "visible",
            WaitState::Hidden => "hidden",
            WaitState::Attached => "attached",
            WaitState::Detached => "detached",
        }
    }
}

/// When navigation counts as finished
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    DomContentLoaded,
    Load,
    #[default]
    NetworkIdle,
}

impl LoadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadState::DomContentLoaded => "domcontentloaded",
            LoadState::Load => "load",
            LoadState::NetworkIdle => "networkidle",
        }
    }
}

#[async_trait]
pub trait BrowserPage: Send {
    async fn navigate(&mut self, url: &str, wait_until: LoadState) -> E2eResult<()>;

    async fn fill(&mut self, selector: &str, value: &str, timeout: Duration) -> E2eResult<()>;

    async fn click(&mut self, selector: &str, timeout: Duration) -> E2eResult<()>;

    /// Fails with [`crate::E2eError::Timeout`] if the state is not reached in time
    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration, state: WaitState) -> E2eResult<()>;

    async fn screenshot(&mut self, path: &Path, full_page: bool) -> E2eResult<()>;

    async fn current_url(&mut self) -> E2eResult<String>;
}
