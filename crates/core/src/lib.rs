//! Testfleet Core Library
//!
//! Performance-aware planning for large browser and API test runs.
//!
//! A plan is built from a point-in-time [`ResourceSnapshot`]: the allocator
//! picks a worker count, the distributor spreads test identifiers across
//! workers by category, and the browser pool planner sizes per-engine quotas.
//! After a run, the [`ResourceReclaimer`] terminates leftover browsers and
//! purges stale transient files.

pub mod allocator;
pub mod browser_pool;
pub mod cache;
pub mod config;
pub mod distributor;
pub mod error;
pub mod monitor;
pub mod plan;
pub mod probe;
pub mod reclaimer;
pub mod suite;
pub mod test_data;

// Re-export commonly used types
pub use allocator::{AllocationRequest, WorkerAllocation, WorkerAllocator};
pub use browser_pool::{BrowserEngine, BrowserPoolPlanner, BrowserQuota};
pub use cache::TtlCache;
pub use config::{HarnessConfig, OptimizationSettings};
pub use distributor::{Distribution, TestCategory, TestDistributor, WorkerKey, WorkerSlice};
pub use error::{HarnessError, Result};
pub use monitor::{PerformanceMonitor, PerformanceReport};
pub use plan::{ExecutionPlan, ExecutionPlanBuilder, PlanSummary};
pub use probe::{FixedProbe, HostProbe, ResourceProbe, ResourceSnapshot};
pub use reclaimer::ResourceReclaimer;
pub use suite::{SuiteRegistry, SuiteStatus, TestSuite};
pub use test_data::TestDataGenerator;

/// Testfleet version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
