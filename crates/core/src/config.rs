//! Harness configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::Result;

const GIB: u64 = 1024 * 1024 * 1024;

/// Top-level harness configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Worker sizing heuristics
    pub planner: PlannerConfig,

    /// Browser pool sizing
    pub browser_pool: BrowserPoolConfig,

    /// Flags handed to the browser layer
    pub optimization: OptimizationSettings,

    /// Working directories
    pub paths: PathsConfig,

    /// Post-run cleanup
    pub reclaim: ReclaimConfig,

    /// External report tool
    pub report: ReportConfig,

    /// External test executor
    pub executor: ExecutorConfig,

    /// System under test
    pub target: TargetConfig,
}

/// Worker allocation heuristics.
///
/// `cpu_ratio` and `workers_per_gib` are coarse ratios with no measured basis;
/// they are exposed so deployments can tune them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Hard ceiling on workers
    pub max_workers: u32,

    /// Fraction of logical CPUs usable as workers
    pub cpu_ratio: f64,

    /// Workers allowed per GiB of available memory
    pub workers_per_gib: f64,

    /// Tests needed to justify one worker
    pub tests_per_worker: usize,

    /// Upper bound for the test-count bound
    pub max_test_bound: u32,

    /// Estimated seconds per test
    pub per_test_secs: u64,

    /// Memory budget per worker in bytes
    pub memory_per_worker: u64,

    /// Disk budget for a whole run in bytes
    pub disk_budget: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_workers: 8,
            cpu_ratio: 0.8,
            workers_per_gib: 2.0,
            tests_per_worker: 10,
            max_test_bound: 20,
            per_test_secs: 30,
            memory_per_worker: 2 * GIB,
            disk_budget: 10 * GIB,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserPoolConfig {
    /// Browser instances per worker
    pub pool_size_per_worker: u32,
}

impl Default for BrowserPoolConfig {
    fn default() -> Self {
        Self {
            pool_size_per_worker: 3,
        }
    }
}

/// Browser optimization flags carried in every plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationSettings {
    pub headless: bool,
    pub disable_images: bool,
    pub disable_javascript: bool,
    pub disable_css: bool,
    /// Per-test timeout in seconds
    pub timeout_secs: u64,
    /// Trade fidelity for speed in page objects (shorter waits, viewport screenshots)
    pub mass_test_mode: bool,
}

impl Default for OptimizationSettings {
    fn default() -> Self {
        Self {
            headless: true,
            disable_images: true,
            disable_javascript: false,
            disable_css: false,
            timeout_secs: 300,
            mass_test_mode: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Suite registry root (holds configs/ and reports/)
    pub suites_dir: PathBuf,

    /// Directory for run reports
    pub reports_dir: PathBuf,

    /// Directory for screenshots
    pub screenshots_dir: PathBuf,

    /// Raw Allure results
    pub allure_results_dir: PathBuf,

    /// Generated Allure HTML
    pub allure_report_dir: PathBuf,

    /// Test data root (holds dynamic/)
    pub test_data_dir: PathBuf,

    /// Root of the test tree handed to the executor
    pub tests_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            suites_dir: PathBuf::from("test_suites"),
            reports_dir: PathBuf::from("test_suites/reports"),
            screenshots_dir: PathBuf::from("screenshots"),
            allure_results_dir: PathBuf::from("allure-results"),
            allure_report_dir: PathBuf::from("allure-report"),
            test_data_dir: PathBuf::from("test_data"),
            tests_dir: PathBuf::from("tests"),
        }
    }
}

/// Which file timestamp decides whether a transient file is stale
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampBasis {
    /// Birth time, falling back to mtime where the platform has none
    #[default]
    Created,
    Modified,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReclaimConfig {
    pub retention_days: u64,
    pub transient_dirs: Vec<PathBuf>,
    pub browser_patterns: Vec<String>,
    pub timestamp_basis: TimestampBasis,
    pub terminate_browsers: bool,
}

impl ReclaimConfig {
    /// Configured retention as a duration
    pub fn retention(&self) -> Duration {
        retention_for_days(self.retention_days)
    }
}

/// `days` whole days, saturating instead of overflowing
pub fn retention_for_days(days: u64) -> Duration {
    Duration::from_secs(days.saturating_mul(24 * 60 * 60))
}

impl Default for ReclaimConfig {
    fn default() -> Self {
        Self {
            retention_days: 7,
            transient_dirs: vec![
                PathBuf::from("screenshots"),
                PathBuf::from("allure-results"),
                PathBuf::from("videos"),
            ],
            browser_patterns: vec![
                "chrome".to_string(),
                "chromium".to_string(),
                "firefox".to_string(),
                "webkit".to_string(),
            ],
            timestamp_basis: TimestampBasis::Created,
            terminate_browsers: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Directory the report tool is installed into
    pub install_dir: PathBuf,

    /// Explicit tool binary (skips the local install)
    pub binary_path: Option<PathBuf>,

    pub version: String,

    pub download_base: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            install_dir: PathBuf::from("allure-commandline"),
            binary_path: None,
            version: "2.24.0".to_string(),
            download_base: "https://repo.maven.apache.org/maven2/io/qameta/allure/allure-commandline"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub program: String,
    pub extra_args: Vec<String>,
    /// Upper bound on a whole run
    pub timeout_secs: u64,
    pub reruns: u32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            program: "pytest".to_string(),
            extra_args: Vec::new(),
            timeout_secs: 3600,
            reruns: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub base_url: String,
    pub api_base_url: String,
    pub grpc_server: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.saucedemo.com".to_string(),
            api_base_url: "https://api.example.com".to_string(),
            grpc_server: "localhost:50051".to_string(),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply environment overrides
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("TEST_BASE_URL") {
            self.target.base_url = v;
        }
        if let Some(v) = var("API_BASE_URL") {
            self.target.api_base_url = v;
        }
        if let Some(v) = var("GRPC_SERVER") {
            self.target.grpc_server = v;
        }
        if let Some(v) = var("HEADLESS") {
            self.optimization.headless = v.eq_ignore_ascii_case("true");
        }
        if let Some(v) = var("MASS_TEST_MODE") {
            self.optimization.mass_test_mode = v.eq_ignore_ascii_case("true");
        }
        if let Some(n) = var("MAX_WORKERS").and_then(|v| v.parse::<u32>().ok()) {
            self.planner.max_workers = n.max(1);
        }
    }

    /// Reject settings that would make planning meaningless
    pub fn validate(&self) -> Result<()> {
        use crate::HarnessError::InvalidConfig;

        if self.planner.max_workers == 0 {
            return Err(InvalidConfig("planner.max_workers must be at least 1".into()));
        }
        if self.planner.tests_per_worker == 0 {
            return Err(InvalidConfig("planner.tests_per_worker must be at least 1".into()));
        }
        if !(self.planner.cpu_ratio >= 0.0) || !(self.planner.workers_per_gib >= 0.0) {
            return Err(InvalidConfig("planner ratios must be non-negative".into()));
        }
        Ok(())
    }
}

/// Whether we are running under a CI system
pub fn is_ci() -> bool {
    ["CI", "GITHUB_ACTIONS", "TRAVIS", "CIRCLECI"]
        .iter()
        .any(|key| std::env::var(key).map(|v| v == "true").unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = HarnessConfig::load(&tmp.path().join("nope.toml")).unwrap();
        assert_eq!(config.planner.max_workers, 8);
        assert_eq!(config.optimization.timeout_secs, 300);
        assert_eq!(config.reclaim.retention_days, 7);
    }

    #[test]
    fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("conf").join("testfleet.toml");

        let mut config = HarnessConfig::default();
        config.planner.max_workers = 4;
        config.browser_pool.pool_size_per_worker = 6;
        config.save(&path).unwrap();

        let loaded = HarnessConfig::load(&path).unwrap();
        assert_eq!(loaded.planner.max_workers, 4);
        assert_eq!(loaded.browser_pool.pool_size_per_worker, 6);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("testfleet.toml");
        std::fs::write(&path, "[planner]\nmax_workers = 2\n").unwrap();

        let config = HarnessConfig::load(&path).unwrap();
        assert_eq!(config.planner.max_workers, 2);
        assert_eq!(config.planner.per_test_secs, 30);
        assert_eq!(config.executor.program, "pytest");
    }

    #[test]
    fn test_zero_workers_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("testfleet.toml");
        std::fs::write(&path, "[planner]\nmax_workers = 0\n").unwrap();
        assert!(HarnessConfig::load(&path).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("HEADLESS", "false"),
            ("MAX_WORKERS", "3"),
            ("TEST_BASE_URL", "http://localhost:3000"),
        ]
        .into_iter()
        .collect();

        let mut config = HarnessConfig::default();
        config.apply_vars(|k| vars.get(k).map(|v| v.to_string()));

        assert!(!config.optimization.headless);
        assert_eq!(config.planner.max_workers, 3);
        assert_eq!(config.target.base_url, "http://localhost:3000");
        assert_eq!(config.target.api_base_url, "https://api.example.com");
    }

    #[test]
    fn test_retention_saturates() {
        let mut reclaim = ReclaimConfig::default();
        assert_eq!(reclaim.retention(), Duration::from_secs(7 * 24 * 60 * 60));

        reclaim.retention_days = u64::MAX;
        assert_eq!(reclaim.retention(), Duration::from_secs(u64::MAX));
    }
}
