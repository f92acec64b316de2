//! Browser instance quotas per engine

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Browser engines driven by the harness
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserEngine {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl BrowserEngine {
    pub const ALL: [BrowserEngine; 3] = [BrowserEngine::Chromium, BrowserEngine::Firefox, BrowserEngine::Webkit];

    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserEngine::Chromium => "chromium",
            BrowserEngine::Firefox => "firefox",
            BrowserEngine::Webkit => "webkit",
        }
    }

    /// Fixed per-instance ceilings: (memory MB, CPU share)
    pub fn limits(&self) -> (u32, f64) {
        match self {
            BrowserEngine::Chromium => (512, 0.5),
            BrowserEngine::Firefox => (768, 0.6),
            BrowserEngine::Webkit => (256, 0.4),
        }
    }
}

impl fmt::Display for BrowserEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BrowserEngine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(BrowserEngine::Chromium),
            "firefox" => Ok(BrowserEngine::Firefox),
            "webkit" | "safari" => Ok(BrowserEngine::Webkit),
            other => Err(format!("unknown browser engine: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserQuota {
    pub instances: u32,
    pub memory_limit_mb: u32,
    pub cpu_limit: f64,
}

/// Sizes browser pools from a worker count
#[derive(Debug, Clone)]
pub struct BrowserPoolPlanner {
    pool_size_per_worker: u32,
}

impl BrowserPoolPlanner {
    pub fn new(pool_size_per_worker: u32) -> Self {
        Self { pool_size_per_worker }
    }

    /// Each engine gets an equal third of the pool. The integer-division
    /// remainder is left unallocated.
    pub fn plan(&self, worker_count: u32) -> BTreeMap<BrowserEngine, BrowserQuota> {
        let total = worker_count.saturating_mul(self.pool_size_per_worker);
        let per_engine = total / BrowserEngine::ALL.len() as u32;

        BrowserEngine::ALL
            .iter()
            .map(|engine| {
                let (memory_limit_mb, cpu_limit) = engine.limits();
                (
                    *engine,
                    BrowserQuota {
                        instances: per_engine,
                        memory_limit_mb,
                        cpu_limit,
                    },
                )
            })
            .collect()
    }
}

impl Default for BrowserPoolPlanner {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_split() {
        let plan = BrowserPoolPlanner::default().plan(4);
        assert_eq!(plan.len(), 3);
        assert!(plan.values().all(|q| q.instances == 4));
        assert_eq!(plan[&BrowserEngine::Firefox].memory_limit_mb, 768);
        assert_eq!(plan[&BrowserEngine::Webkit].cpu_limit, 0.4);
    }

    #[test]
    fn test_remainder_dropped() {
        let planner = BrowserPoolPlanner::new(2);
        for workers in 0..50 {
            let plan = planner.plan(workers);
            let sum: u32 = plan.values().map(|q| q.instances).sum();
            let total = workers * 2;
            assert!(sum <= total);
            assert_eq!(sum == total, total % 3 == 0);
        }
    }

    #[test]
    fn test_engine_from_str() {
        assert_eq!("Firefox".parse::<BrowserEngine>().unwrap(), BrowserEngine::Firefox);
        assert!("lynx".parse::<BrowserEngine>().is_err());
    }
}
