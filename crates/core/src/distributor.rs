//! Test bucketing and per-worker slicing

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Category a test identifier belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestCategory {
    Ui,
    Api,
    Grpc,
    Integration,
}

impl TestCategory {
    /// Bucket iteration order
    pub const ALL: [TestCategory; 4] = [
        TestCategory::Ui,
        TestCategory::Api,
        TestCategory::Grpc,
        TestCategory::Integration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TestCategory::Ui => "ui",
            TestCategory::Api => "api",
            TestCategory::Grpc => "grpc",
            TestCategory::Integration => "integration",
        }
    }

    /// Case-insensitive substring match; `ui` beats `api` beats `grpc`.
    pub fn classify(identifier: &str) -> Self {
        let lower = identifier.to_lowercase();
        [TestCategory::Ui, TestCategory::Api, TestCategory::Grpc]
            .into_iter()
            .find(|c| lower.contains(c.as_str()))
            .unwrap_or(TestCategory::Integration)
    }
}

impl fmt::Display for TestCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifiers of one category, in input order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestBucket {
    pub category: TestCategory,
    pub identifiers: Vec<String>,
}

/// Synthetic worker key, rendered as `worker_<n>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct WorkerKey(pub u32);

impl fmt::Display for WorkerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker_{}", self.0)
    }
}

impl From<WorkerKey> for String {
    fn from(key: WorkerKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for WorkerKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value
            .strip_prefix("worker_")
            .and_then(|n| n.parse().ok())
            .map(WorkerKey)
            .ok_or_else(|| format!("invalid worker key: {}", value))
    }
}

/// Contiguous run of one bucket assigned to a worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSlice {
    pub worker: WorkerKey,
    pub category: TestCategory,
    pub identifiers: Vec<String>,
    pub estimated_secs: u64,
}

/// Slices in emission order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    pub slices: Vec<WorkerSlice>,
}

impl Distribution {
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// Slices grouped by worker; a worker may hold slices of several categories
    pub fn by_worker(&self) -> BTreeMap<WorkerKey, Vec<&WorkerSlice>> {
        let mut map: BTreeMap<WorkerKey, Vec<&WorkerSlice>> = BTreeMap::new();
        for slice in &self.slices {
            map.entry(slice.worker).or_default().push(slice);
        }
        map
    }

    /// All identifiers, bucket order preserved
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.slices.iter().flat_map(|s| s.identifiers.iter().map(String::as_str))
    }

    pub fn total_estimated_secs(&self) -> u64 {
        self.slices.iter().map(|s| s.estimated_secs).sum()
    }
}

/// Splits test identifiers across workers
#[derive(Debug, Clone)]
pub struct TestDistributor {
    per_test_secs: u64,
}

impl TestDistributor {
    pub fn new(per_test_secs: u64) -> Self {
        Self { per_test_secs }
    }

    /// Group identifiers into non-empty buckets, in category order
    pub fn bucket<S: AsRef<str>>(identifiers: &[S]) -> Vec<TestBucket> {
        let mut groups: BTreeMap<TestCategory, Vec<String>> = BTreeMap::new();
        for id in identifiers {
            let id = id.as_ref();
            groups
                .entry(TestCategory::classify(id))
                .or_default()
                .push(id.to_string());
        }

        TestCategory::ALL
            .iter()
            .filter_map(|c| {
                groups.remove(c).map(|identifiers| TestBucket {
                    category: *c,
                    identifiers,
                })
            })
            .collect()
    }

    pub fn distribute<S: AsRef<str>>(&self, identifiers: &[S], worker_count: u32) -> Distribution {
        let workers = worker_count.max(1);
        let mut slices = Vec::new();
        // Shared across buckets, never reset
        let mut next_worker = 0u32;

        for bucket in Self::bucket(identifiers) {
            let files_per_worker = (bucket.identifiers.len() / workers as usize).max(1);

            for chunk in bucket.identifiers.chunks(files_per_worker) {
                slices.push(WorkerSlice {
                    worker: WorkerKey(next_worker),
                    category: bucket.category,
                    identifiers: chunk.to_vec(),
                    estimated_secs: chunk.len() as u64 * self.per_test_secs,
                });
                next_worker = (next_worker + 1) % workers;
            }
        }

        Distribution { slices }
    }
}

impl Default for TestDistributor {
    fn default() -> Self {
        Self::new(30)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("tests/ui/test_login.py", TestCategory::Ui)]
    #[test_case("tests/API/test_users.py", TestCategory::Api)]
    #[test_case("test_order_grpc.py", TestCategory::Grpc)]
    #[test_case("test_checkout_flow.py", TestCategory::Integration)]
    #[test_case("test_build_api.py", TestCategory::Ui ; "ui substring beats api")]
    fn test_classify(id: &str, expected: TestCategory) {
        assert_eq!(TestCategory::classify(id), expected);
    }

    #[test]
    fn test_round_robin_across_buckets() {
        let dist = TestDistributor::default().distribute(&["test_ui_a", "test_api_b", "test_grpc_c"], 2);

        let workers: Vec<String> = dist.slices.iter().map(|s| s.worker.to_string()).collect();
        assert_eq!(workers, vec!["worker_0", "worker_1", "worker_0"]);

        let categories: Vec<TestCategory> = dist.slices.iter().map(|s| s.category).collect();
        assert_eq!(categories, vec![TestCategory::Ui, TestCategory::Api, TestCategory::Grpc]);
        assert!(dist.slices.iter().all(|s| s.estimated_secs == 30));

        let grouped = dist.by_worker();
        assert_eq!(grouped[&WorkerKey(0)].len(), 2);
        assert_eq!(grouped[&WorkerKey(1)].len(), 1);
    }

    #[test]
    fn test_strides() {
        let ids: Vec<String> = (0..7).map(|i| format!("test_ui_{}", i)).collect();
        let dist = TestDistributor::default().distribute(&ids, 3);

        // 7 / 3 = 2 per stride -> 2, 2, 2, 1
        let sizes: Vec<usize> = dist.slices.iter().map(|s| s.identifiers.len()).collect();
        assert_eq!(sizes, vec![2, 2, 2, 1]);
        let keys: Vec<u32> = dist.slices.iter().map(|s| s.worker.0).collect();
        assert_eq!(keys, vec![0, 1, 2, 0]);
        assert_eq!(dist.slices[3].estimated_secs, 30);
        assert_eq!(dist.total_estimated_secs(), 7 * 30);
    }

    #[test]
    fn test_partition_is_exact() {
        let ids: Vec<String> = (0..53)
            .map(|i| match i % 4 {
                0 => format!("tests/ui/test_{}.py", i),
                1 => format!("tests/api/test_{}.py", i),
                2 => format!("tests/grpc/test_{}.py", i),
                _ => format!("tests/e2e/test_{}.py", i),
            })
            .collect();

        for workers in 1..=9 {
            let dist = TestDistributor::default().distribute(&ids, workers);
            let mut seen: Vec<&str> = dist.identifiers().collect();
            let mut expected: Vec<&str> = ids.iter().map(String::as_str).collect();
            seen.sort();
            expected.sort();
            assert_eq!(seen, expected, "workers = {}", workers);
            assert!(dist.slices.iter().all(|s| s.worker.0 < workers));
        }
    }

    #[test]
    fn test_empty_buckets_omitted() {
        let buckets = TestDistributor::bucket(&["test_api_one", "test_api_two"]);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].category, TestCategory::Api);
        assert!(TestDistributor::default().distribute::<&str>(&[], 4).is_empty());
    }

    #[test]
    fn test_zero_workers_treated_as_one() {
        let dist = TestDistributor::default().distribute(&["test_ui_a", "test_ui_b"], 0);
        assert_eq!(dist.slices.len(), 2);
        assert!(dist.slices.iter().all(|s| s.worker == WorkerKey(0)));
    }

    #[test]
    fn test_worker_key_serde() {
        let json = serde_json::to_string(&WorkerKey(3)).unwrap();
        assert_eq!(json, "\"worker_3\"");
        let back: WorkerKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, WorkerKey(3));
        assert!(serde_json::from_str::<WorkerKey>("\"w3\"").is_err());
    }
}
