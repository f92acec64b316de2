//! Test suite registry and run reports
//!
//! Suites are persisted as a single JSON document (`{"suites": [...]}`) that is
//! rewritten in full on every change. A failed write is logged and the
//! in-memory registry keeps the update, so the two can drift until the next
//! successful save. Writers in different processes are not coordinated; the
//! last one wins.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::error::absorb;
use crate::{HarnessError, Result};

/// Lifecycle of a suite record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuiteStatus {
    #[default]
    Created,
    Running,
    Completed,
    FailedToStart,
}

impl fmt::Display for SuiteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SuiteStatus::Created => "created",
            SuiteStatus::Running => "running",
            SuiteStatus::Completed => "completed",
            SuiteStatus::FailedToStart => "failed_to_start",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSuite {
    pub name: String,
    pub description: String,
    pub test_count: usize,
    #[serde(default)]
    pub execution_time: f64,
    #[serde(default)]
    pub passed: usize,
    #[serde(default)]
    pub failed: usize,
    #[serde(default)]
    pub skipped: usize,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub last_run: String,
    #[serde(default)]
    pub status: SuiteStatus,
}

/// Outcome of one executed test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestExecution {
    pub suite_name: String,
    pub test_name: String,
    pub status: ExecutionStatus,
    pub duration: f64,
    #[serde(default)]
    pub error_message: String,
    #[serde(default)]
    pub screenshot_path: String,
    #[serde(default)]
    pub log_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub suite_name: String,
    pub execution_time: String,
    pub summary: ExecutionSummary,
    pub executions: Vec<TestExecution>,
    pub duration: f64,
    pub success_rate: f64,
}

/// Per-suite metrics derived from the last run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteMetrics {
    pub suite_name: String,
    pub total_tests: usize,
    pub avg_execution_time: f64,
    pub success_rate: f64,
    pub last_run: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionGroup {
    pub tests: Vec<String>,
    pub parallel: u32,
}

/// Static grouping template for a suite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteExecutionPlan {
    pub suite_name: String,
    pub total_tests: usize,
    pub execution_groups: BTreeMap<String, ExecutionGroup>,
    pub estimated_duration: u64,
    pub browsers: Vec<String>,
    pub workers: u32,
    pub memory: String,
    pub cpu: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    suites: Vec<TestSuite>,
}

/// JSON-backed registry of suites, keyed by name
pub struct SuiteRegistry {
    root: PathBuf,
    suites: BTreeMap<String, TestSuite>,
}

impl SuiteRegistry {
    /// Open the registry rooted at `root`, creating `configs/` and `reports/`
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(root.join("configs"))?;
        std::fs::create_dir_all(root.join("reports"))?;

        let mut registry = Self {
            root,
            suites: BTreeMap::new(),
        };
        registry.suites = registry.load();
        Ok(registry)
    }

    pub fn registry_file(&self) -> PathBuf {
        self.root.join("configs").join("suites.json")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.root.join("reports")
    }

    fn load(&self) -> BTreeMap<String, TestSuite> {
        let path = self.registry_file();
        if !path.exists() {
            return BTreeMap::new();
        }

        let parsed = std::fs::read_to_string(&path)
            .map_err(HarnessError::from)
            .and_then(|content| serde_json::from_str::<RegistryFile>(&content).map_err(HarnessError::from));

        match parsed {
            Ok(file) => file.suites.into_iter().map(|s| (s.name.clone(), s)).collect(),
            Err(e) => {
                error!("Error loading suites from {}: {}", path.display(), e);
                BTreeMap::new()
            }
        }
    }

    fn save(&self) -> Result<()> {
        let path = self.registry_file();
        let data = RegistryFile {
            suites: self.suites.values().cloned().collect(),
        };
        write_json_atomic(&path, &data)
    }

    fn save_logged(&self) {
        if let Err(e) = absorb(self.save(), "Error saving suites") {
            error!("Suites not saved to {}: {}", self.registry_file().display(), e);
        }
    }

    /// Create (or replace) a suite
    pub fn create_suite(&mut self, name: &str, description: &str, test_count: usize) -> TestSuite {
        let suite = TestSuite {
            name: name.to_string(),
            description: description.to_string(),
            test_count,
            execution_time: 0.0,
            passed: 0,
            failed: 0,
            skipped: 0,
            created_at: now_iso(),
            last_run: String::new(),
            status: SuiteStatus::Created,
        };

        self.suites.insert(name.to_string(), suite.clone());
        self.save_logged();
        info!("Created test suite: {}", name);
        suite
    }

    pub fn get_suite(&self, name: &str) -> Option<&TestSuite> {
        self.suites.get(name)
    }

    pub fn list_suites(&self) -> Vec<&TestSuite> {
        self.suites.values().collect()
    }

    fn transition(&mut self, name: &str, allowed: &[SuiteStatus], to: SuiteStatus) -> Result<&mut TestSuite> {
        let suite = self
            .suites
            .get_mut(name)
            .ok_or_else(|| HarnessError::SuiteNotFound(name.to_string()))?;

        if !allowed.contains(&suite.status) {
            return Err(HarnessError::InvalidStateTransition {
                suite: name.to_string(),
                from: suite.status.to_string(),
                to: to.to_string(),
            });
        }
        suite.status = to;
        Ok(suite)
    }

    /// Arm a suite for a new run
    pub fn mark_running(&mut self, name: &str) -> Result<TestSuite> {
        let suite = self
            .transition(
                name,
                &[SuiteStatus::Created, SuiteStatus::Completed, SuiteStatus::FailedToStart],
                SuiteStatus::Running,
            )?
            .clone();
        self.save_logged();
        Ok(suite)
    }

    /// Record that a run never produced results
    pub fn mark_failed_to_start(&mut self, name: &str) -> Result<TestSuite> {
        let suite = self
            .transition(name, &[SuiteStatus::Created, SuiteStatus::Running], SuiteStatus::FailedToStart)?
            .clone();
        self.save_logged();
        Ok(suite)
    }

    /// Record the results of a completed run; once per run
    pub fn update_suite_stats(
        &mut self,
        name: &str,
        passed: usize,
        failed: usize,
        skipped: usize,
        duration: f64,
    ) -> Result<TestSuite> {
        let suite = self.transition(name, &[SuiteStatus::Created, SuiteStatus::Running], SuiteStatus::Completed)?;
        suite.passed = passed;
        suite.failed = failed;
        suite.skipped = skipped;
        suite.execution_time = duration;
        suite.last_run = now_iso();
        let suite = suite.clone();

        self.save_logged();
        Ok(suite)
    }

    pub fn suite_metrics(&self, name: &str) -> Option<SuiteMetrics> {
        let suite = self.get_suite(name)?;
        let (avg, rate) = if suite.test_count > 0 {
            (
                suite.execution_time / suite.test_count as f64,
                suite.passed as f64 / suite.test_count as f64 * 100.0,
            )
        } else {
            (0.0, 0.0)
        };

        Some(SuiteMetrics {
            suite_name: name.to_string(),
            total_tests: suite.test_count,
            avg_execution_time: avg,
            success_rate: rate,
            last_run: suite.last_run.clone(),
            created_at: suite.created_at.clone(),
        })
    }

    /// Static grouping template; actual sizing comes from the planner
    pub fn suite_execution_plan(&self, name: &str) -> Option<SuiteExecutionPlan> {
        let suite = self.get_suite(name)?;
        let groups = [
            ("smoke", 1),
            ("regression", 4),
            ("ui", 2),
            ("api", 8),
            ("grpc", 4),
            ("integration", 2),
        ];

        Some(SuiteExecutionPlan {
            suite_name: name.to_string(),
            total_tests: suite.test_count,
            execution_groups: groups
                .iter()
                .map(|(g, parallel)| {
                    (
                        g.to_string(),
                        ExecutionGroup {
                            tests: Vec::new(),
                            parallel: *parallel,
                        },
                    )
                })
                .collect(),
            estimated_duration: suite.test_count as u64 * 30,
            browsers: vec!["chromium".into(), "firefox".into(), "webkit".into()],
            workers: 8,
            memory: "4GB".to_string(),
            cpu: "4 cores".to_string(),
        })
    }

    /// Summarize executions and write them to `reports/<name>_executions_<ts>.json`
    pub fn create_execution_report(&self, name: &str, executions: Vec<TestExecution>) -> ExecutionReport {
        let count = |status: ExecutionStatus| executions.iter().filter(|e| e.status == status).count();
        let summary = ExecutionSummary {
            total: executions.len(),
            passed: count(ExecutionStatus::Passed),
            failed: count(ExecutionStatus::Failed),
            skipped: count(ExecutionStatus::Skipped),
        };
        let success_rate = if executions.is_empty() {
            0.0
        } else {
            summary.passed as f64 / executions.len() as f64 * 100.0
        };

        let report = ExecutionReport {
            suite_name: name.to_string(),
            execution_time: now_iso(),
            duration: executions.iter().map(|e| e.duration).sum(),
            summary,
            executions,
            success_rate,
        };

        let path = report_path(&self.reports_dir(), &format!("{}_executions", name), Local::now());
        if let Err(e) = absorb(write_json_atomic(&path, &report), "Error saving report") {
            error!("Execution report not saved to {}: {}", path.display(), e);
        }
        report
    }
}

/// `<dir>/<name>_<YYYYMMDD_HHMMSS>.json`
pub fn report_path(dir: &Path, name: &str, at: DateTime<Local>) -> PathBuf {
    dir.join(format!("{}_{}.json", name, at.format("%Y%m%d_%H%M%S")))
}

fn now_iso() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// Write pretty JSON through a temp file in the same directory, then rename
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let write = || -> std::result::Result<(), Box<dyn std::error::Error>> {
        std::fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, value)?;
        tmp.flush()?;
        tmp.persist(path)?;
        Ok(())
    };
    write().map_err(|e| HarnessError::persistence(path, e))
}
