//! Error types for browser, API and run orchestration

use testfleet_core::HarnessError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error(transparent)]
    Harness(#[from] HarnessError),

    #[error("Playwright not found. Install with: npm i playwright && npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Step failed: {step} - {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Report tool failed: {command}: {stderr}")]
    ReportTool { command: String, stderr: String },

    #[error("Report tool not installed at {0}")]
    ReportToolMissing(String),

    #[error("Test executor failed to start: {0}")]
    ExecutorStart(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type E2eResult<T> = Result<T, E2eError>;
