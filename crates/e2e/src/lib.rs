//! Testfleet E2E layer
//!
//! Everything that touches the outside world during a run:
//! - Drives browsers through Playwright via generated Node scripts
//! - Page objects written against the [`BrowserPage`] capability
//! - REST clients written against the [`HttpClient`] capability
//! - Installs and invokes the Allure report tool
//! - Runs planned suites through the external test executor
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  MassTestRunner                                             │
//! │    ├── SuiteRegistry        (arm suite, record stats)       │
//! │    ├── TestDataGenerator    (suite data set)                │
//! │    ├── ExecutionPlanBuilder (workers, slices, browsers)     │
//! │    ├── TestExecutor         (pytest -n <workers> ...)       │
//! │    ├── PerformanceMonitor   (samples during the run)        │
//! │    ├── ReportTool           (allure generate)               │
//! │    └── ResourceReclaimer    (browsers, stale files)         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Page objects: BasePage<P> ── LoginPage, InventoryPage      │
//! │    P: BrowserPage ── PlaywrightPage | test fakes            │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod browser;
pub mod error;
pub mod pages;
pub mod playwright;
pub mod report;
pub mod runner;

pub use api::{ApiResponse, HttpClient, ReqwestClient, UserApiClient};
pub use browser::{BrowserPage, LoadState, WaitState};
pub use error::{E2eError, E2eResult};
pub use playwright::{PlaywrightConfig, PlaywrightPage};
pub use report::ReportTool;
pub use runner::{MassTestRunner, RunOptions, RunOutcome};
