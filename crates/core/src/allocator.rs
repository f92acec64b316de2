//! Worker count allocation

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::PlannerConfig;
use crate::probe::ResourceSnapshot;

/// Input to a worker allocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationRequest {
    pub test_count: usize,
    /// Caller-imposed ceiling, on top of the configured maximum
    pub worker_ceiling: Option<u32>,
    /// Memory budget per worker in bytes
    pub memory_per_worker: u64,
}

impl AllocationRequest {
    pub fn new(test_count: usize) -> Self {
        Self {
            test_count,
            worker_ceiling: None,
            memory_per_worker: PlannerConfig::default().memory_per_worker,
        }
    }

    pub fn with_ceiling(mut self, ceiling: Option<u32>) -> Self {
        self.worker_ceiling = ceiling.map(|c| c.max(1));
        self
    }
}

/// Resolved worker count plus the bounds that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerAllocation {
    pub workers: u32,
    pub cpu_bound: u32,
    pub memory_bound: u32,
    pub test_bound: u32,
    pub configured_max: u32,
}

/// Bounds parallelism by CPU, memory, test volume and configuration
#[derive(Debug, Clone)]
pub struct WorkerAllocator {
    config: PlannerConfig,
}

impl WorkerAllocator {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Compute a worker count; always at least 1
    pub fn allocate(&self, request: &AllocationRequest, snapshot: &ResourceSnapshot) -> WorkerAllocation {
        let cpu_bound = floor_u32(snapshot.cpu_count as f64 * self.config.cpu_ratio);
        let memory_bound = floor_u32(snapshot.available_memory_gib() * self.config.workers_per_gib);
        let tests_per_worker = self.config.tests_per_worker.max(1);
        let test_bound = u32::try_from(request.test_count / tests_per_worker)
            .unwrap_or(u32::MAX)
            .min(self.config.max_test_bound);

        let mut configured_max = self.config.max_workers;
        if let Some(ceiling) = request.worker_ceiling {
            configured_max = configured_max.min(ceiling);
        }

        let workers = cpu_bound
            .min(memory_bound)
            .min(test_bound)
            .min(configured_max)
            .max(1);

        info!(
            "Optimal workers: {} (CPU: {}, Memory: {}, Tests: {}, Max: {})",
            workers, cpu_bound, memory_bound, test_bound, configured_max
        );

        WorkerAllocation {
            workers,
            cpu_bound,
            memory_bound,
            test_bound,
            configured_max,
        }
    }
}

impl Default for WorkerAllocator {
    fn default() -> Self {
        Self::new(PlannerConfig::default())
    }
}

fn floor_u32(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.floor().min(u32::MAX as f64) as u32
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const GIB: u64 = 1024 * 1024 * 1024;

    fn snapshot(cpus: u32, mem_gib: u64) -> ResourceSnapshot {
        ResourceSnapshot::new(cpus, mem_gib * GIB, 10.0, "test")
    }

    #[test]
    fn test_small_suite_floors_to_one() {
        let alloc = WorkerAllocator::default().allocate(&AllocationRequest::new(5), &snapshot(4, 8));
        assert_eq!(alloc.cpu_bound, 3);
        assert_eq!(alloc.memory_bound, 16);
        assert_eq!(alloc.test_bound, 0);
        assert_eq!(alloc.workers, 1);
    }

    #[test]
    fn test_large_suite_cpu_bound() {
        let alloc = WorkerAllocator::default().allocate(&AllocationRequest::new(1000), &snapshot(8, 16));
        assert_eq!(alloc.cpu_bound, 6);
        assert_eq!(alloc.memory_bound, 32);
        assert_eq!(alloc.test_bound, 20);
        assert_eq!(alloc.workers, 6);
    }

    #[test_case(64, 64, 100_000, 8 ; "configured max wins")]
    #[test_case(64, 1, 100_000, 2 ; "memory bound wins")]
    #[test_case(64, 64, 45, 4 ; "test bound wins")]
    #[test_case(1, 64, 1000, 1 ; "single cpu")]
    #[test_case(16, 0, 1000, 1 ; "no memory reported")]
    fn test_bounds(cpus: u32, mem_gib: u64, tests: usize, expected: u32) {
        let alloc = WorkerAllocator::default().allocate(&AllocationRequest::new(tests), &snapshot(cpus, mem_gib));
        assert_eq!(alloc.workers, expected);
    }

    #[test]
    fn test_ceiling_applies() {
        let request = AllocationRequest::new(1000).with_ceiling(Some(2));
        let alloc = WorkerAllocator::default().allocate(&request, &snapshot(32, 64));
        assert_eq!(alloc.workers, 2);
    }

    #[test]
    fn test_zero_tests() {
        let alloc = WorkerAllocator::default().allocate(&AllocationRequest::new(0), &snapshot(8, 16));
        assert_eq!(alloc.workers, 1);
    }

    #[test]
    fn test_always_within_range() {
        let allocator = WorkerAllocator::default();
        let snap = snapshot(48, 256);
        for count in (1..=100_000).step_by(997) {
            let w = allocator.allocate(&AllocationRequest::new(count), &snap).workers;
            assert!((1..=8).contains(&w), "count {} gave {}", count, w);
        }
    }
}
