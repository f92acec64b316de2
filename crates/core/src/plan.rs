//! Execution plan assembly
//!
//! ```text
//! ResourceProbe::snapshot
//!     -> WorkerAllocator::allocate
//!     -> TestDistributor::distribute
//!     -> BrowserPoolPlanner::plan
//!     -> ExecutionPlan
//! ```
//!
//! A plan is a value: it is built once per run and never mutated. Given the same
//! snapshot and identifiers the builder produces the same plan.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::allocator::{AllocationRequest, WorkerAllocation, WorkerAllocator};
use crate::browser_pool::{BrowserEngine, BrowserPoolPlanner, BrowserQuota};
use crate::config::{HarnessConfig, OptimizationSettings, PlannerConfig};
use crate::distributor::{Distribution, TestDistributor};
use crate::probe::{ResourceProbe, ResourceSnapshot};

const GIB: u64 = 1024 * 1024 * 1024;

/// Aggregate resources a plan expects to consume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequirements {
    pub memory_bytes: u64,
    pub cpu_cores: u32,
    pub disk_bytes: u64,
}

impl ResourceRequirements {
    /// Human-readable form, e.g. `12GB / 6 cores / 10GB disk`
    pub fn describe(&self) -> String {
        format!(
            "{}GB / {} cores / {}GB disk",
            self.memory_bytes / GIB,
            self.cpu_cores,
            self.disk_bytes / GIB
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub test_count: usize,
    pub workers: u32,
    pub allocation: WorkerAllocation,
    pub snapshot: ResourceSnapshot,
    pub distribution: Distribution,
    pub browser_config: BTreeMap<BrowserEngine, BrowserQuota>,
    pub estimated_duration_secs: f64,
    pub resource_requirements: ResourceRequirements,
    pub optimization: OptimizationSettings,
}

impl ExecutionPlan {
    /// Compact form written into run reports
    pub fn summary(&self) -> PlanSummary {
        let mut per_worker: BTreeMap<String, usize> = BTreeMap::new();
        for (key, slices) in self.distribution.by_worker() {
            per_worker.insert(key.to_string(), slices.iter().map(|s| s.identifiers.len()).sum());
        }

        PlanSummary {
            test_count: self.test_count,
            workers: self.workers,
            slices: self.distribution.slices.len(),
            tests_per_worker: per_worker,
            browser_instances: self
                .browser_config
                .iter()
                .map(|(engine, quota)| (engine.to_string(), quota.instances))
                .collect(),
            estimated_duration_secs: self.estimated_duration_secs,
            resources: self.resource_requirements.describe(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub test_count: usize,
    pub workers: u32,
    pub slices: usize,
    pub tests_per_worker: BTreeMap<String, usize>,
    pub browser_instances: BTreeMap<String, u32>,
    pub estimated_duration_secs: f64,
    pub resources: String,
}

/// Composes the planning chain
#[derive(Clone)]
pub struct ExecutionPlanBuilder {
    probe: Arc<dyn ResourceProbe>,
    allocator: WorkerAllocator,
    distributor: TestDistributor,
    pool: BrowserPoolPlanner,
    planner: PlannerConfig,
    optimization: OptimizationSettings,
}

impl ExecutionPlanBuilder {
    pub fn new(probe: Arc<dyn ResourceProbe>, config: &HarnessConfig) -> Self {
        Self {
            probe,
            allocator: WorkerAllocator::new(config.planner.clone()),
            distributor: TestDistributor::new(config.planner.per_test_secs),
            pool: BrowserPoolPlanner::new(config.browser_pool.pool_size_per_worker),
            planner: config.planner.clone(),
            optimization: config.optimization.clone(),
        }
    }

    pub fn build<S: AsRef<str>>(&self, test_count: usize, identifiers: &[S]) -> ExecutionPlan {
        self.build_with(&AllocationRequest::new(test_count), identifiers)
    }

    /// Build with an explicit allocation request (worker ceiling, memory budget)
    pub fn build_with<S: AsRef<str>>(&self, request: &AllocationRequest, identifiers: &[S]) -> ExecutionPlan {
        let snapshot = self.probe.snapshot();
        let mut allocation = self.allocator.allocate(request, &snapshot);

        if identifiers.is_empty() {
            debug!("No test identifiers supplied; planning a single worker");
            allocation.workers = 1;
        }
        let workers = allocation.workers;

        let distribution = self.distributor.distribute(identifiers, workers);
        let browser_config = self.pool.plan(workers);

        let estimated_duration_secs =
            request.test_count as f64 * self.planner.per_test_secs as f64 / workers as f64;

        let resource_requirements = ResourceRequirements {
            memory_bytes: workers as u64 * request.memory_per_worker,
            cpu_cores: workers,
            disk_bytes: self.planner.disk_budget,
        };

        info!(
            "Execution plan: {} tests, {} workers, {} slices, ~{:.0}s",
            request.test_count,
            workers,
            distribution.slices.len(),
            estimated_duration_secs
        );

        ExecutionPlan {
            test_count: request.test_count,
            workers,
            allocation,
            snapshot,
            distribution,
            browser_config,
            estimated_duration_secs,
            resource_requirements,
            optimization: self.optimization.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::FixedProbe;

    fn builder(cpus: u32, mem_gib: u64) -> ExecutionPlanBuilder {
        let probe = FixedProbe(ResourceSnapshot::new(cpus, mem_gib * GIB, 25.0, "test"));
        ExecutionPlanBuilder::new(Arc::new(probe), &HarnessConfig::default())
    }

    #[test]
    fn test_plan_shape() {
        let ids: Vec<String> = (0..100).map(|i| format!("tests/api/test_{}.py", i)).collect();
        let plan = builder(8, 16).build(1000, &ids);

        assert_eq!(plan.workers, 6);
        assert_eq!(plan.estimated_duration_secs, 1000.0 * 30.0 / 6.0);
        assert_eq!(plan.resource_requirements.memory_bytes, 12 * GIB);
        assert_eq!(plan.resource_requirements.cpu_cores, 6);
        assert_eq!(plan.resource_requirements.disk_bytes, 10 * GIB);
        assert_eq!(plan.browser_config[&BrowserEngine::Chromium].instances, 6);
        assert!(plan.optimization.headless);
        assert!(plan.optimization.disable_images);
        assert!(!plan.optimization.disable_javascript);
        assert_eq!(plan.optimization.timeout_secs, 300);
        assert_eq!(plan.distribution.identifiers().count(), 100);
    }

    #[test]
    fn test_empty_identifiers() {
        let plan = builder(32, 64).build::<String>(500, &[]);
        assert_eq!(plan.workers, 1);
        assert!(plan.distribution.is_empty());
        assert_eq!(plan.browser_config[&BrowserEngine::Webkit].instances, 1);
    }

    #[test]
    fn test_deterministic() {
        let ids = ["test_ui_login", "test_api_user", "test_grpc_order", "test_checkout"];
        let b = builder(8, 16);
        assert_eq!(b.build(400, &ids), b.build(400, &ids));
    }

    #[test]
    fn test_summary() {
        let ids = ["test_ui_a", "test_api_b", "test_grpc_c"];
        let plan = builder(8, 16).build(20, &ids);
        assert_eq!(plan.workers, 2);

        let summary = plan.summary();
        assert_eq!(summary.slices, 3);
        assert_eq!(summary.tests_per_worker["worker_0"], 2);
        assert_eq!(summary.tests_per_worker["worker_1"], 1);
        assert_eq!(summary.browser_instances["firefox"], 2);
        assert_eq!(summary.resources, "4GB / 2 cores / 10GB disk");
    }
}
