//! Mass test runner: plans a run, hands it to the external executor and
//! records the outcome

use async_trait::async_trait;
use chrono::Local;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use testfleet_core::error::absorb;
use testfleet_core::monitor::{PerformanceMonitor, PerformanceReport};
use testfleet_core::suite::{report_path, write_json_atomic, ExecutionStatus, TestExecution};
use testfleet_core::{
    AllocationRequest, ExecutionPlan, ExecutionPlanBuilder, HarnessConfig, HarnessError, HostProbe, PlanSummary,
    ResourceProbe, ResourceReclaimer, SuiteRegistry, SuiteStatus, TestCategory, TestDataGenerator, TestSuite,
    TtlCache,
};
use tokio::process::Command;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::error::{E2eError, E2eResult};
use crate::report::ReportTool;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Caller options for a single run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Upper bound on workers; the planner may choose fewer
    pub worker_ceiling: Option<u32>,
    pub headless: bool,
}

/// Fully resolved executor invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutorCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Runs the external test executor
#[async_trait]
pub trait TestExecutor: Send + Sync {
    async fn execute(&self, command: &ExecutorCommand) -> E2eResult<ExecutorOutput>;
}

/// Executor backed by a child process
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor;

#[async_trait]
impl TestExecutor for ProcessExecutor {
    async fn execute(&self, command: &ExecutorCommand) -> E2eResult<ExecutorOutput> {
        info!("Running: {} {}", command.program, command.args.join(" "));

        let child = Command::new(&command.program)
            .args(&command.args)
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(command.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(E2eError::ExecutorStart(format!("{}: {}", command.program, e))),
            Err(_) => {
                return Err(E2eError::Timeout(format!(
                    "{} after {}s",
                    command.program,
                    command.timeout.as_secs()
                )))
            }
        };

        Ok(ExecutorOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Counts from the executor's final summary line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryCounts {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl SummaryCounts {
    /// Parse the last line carrying counts, e.g.
    /// `=== 10 passed, 2 failed, 1 skipped, 1 error in 3.21s ===`
    pub fn parse(output: &str) -> Option<Self> {
        let re = Regex::new(r"(\d+) (passed|failed|skipped|errors?)\b").ok()?;
        let line = output.lines().rev().find(|l| re.is_match(l))?;

        let mut counts = Self::default();
        for cap in re.captures_iter(line) {
            let n: usize = cap[1].parse().unwrap_or(0);
            match &cap[2] {
                "passed" => counts.passed += n,
                "failed" => counts.failed += n,
                "skipped" => counts.skipped += n,
                _ => counts.errors += n,
            }
        }
        Some(counts)
    }
}

/// Artifact written to the reports dir after every run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub suite_name: String,
    pub timestamp: String,
    pub plan: PlanSummary,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_secs: f64,
    pub executor_succeeded: bool,
    pub performance: PerformanceReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub suite: TestSuite,
    pub plan: PlanSummary,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_secs: f64,
    pub executor_succeeded: bool,
    pub report_generated: bool,
    pub run_report: Option<PathBuf>,
    pub files_reclaimed: usize,
}

impl RunOutcome {
    pub fn success(&self) -> bool {
        self.executor_succeeded && self.failed == 0
    }
}

/// Test files under `<tests_dir>/{ui,api,grpc,integration}`, sorted.
///
/// Identifiers are relative to the parent of `tests_dir` (`tests/api/test_users.py`),
/// so directory names above the test tree never reach the category classifier.
pub fn discover_tests(tests_dir: &Path) -> E2eResult<Vec<String>> {
    if tests_dir.exists() && !tests_dir.is_dir() {
        return Err(HarnessError::InvalidConfig(format!("tests dir {} is not a directory", tests_dir.display())).into());
    }
    let root = tests_dir.parent().unwrap_or_else(|| Path::new(""));

    let mut found = Vec::new();
    for category in TestCategory::ALL {
        let dir = tests_dir.join(category.as_str());
        if !dir.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&dir) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                    continue;
                }
            };
            let path = entry.path();
            let is_test = entry.file_type().is_file()
                && path.extension().map(|e| e == "py").unwrap_or(false)
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with("test_"))
                    .unwrap_or(false);
            if is_test {
                let relative = path.strip_prefix(root).unwrap_or(path);
                found.push(relative.to_string_lossy().replace('\\', "/"));
            }
        }
    }
    found.sort();
    Ok(found)
}

/// Per-test results from verbose executor output.
///
/// Reads both the xdist form (`[gw0] [ 50%] PASSED tests/ui/test_a.py::test_x`)
/// and the serial form (`tests/ui/test_a.py::test_x PASSED`). A test reported
/// more than once (reruns) keeps its last status. Failure reasons come from the
/// short summary (`FAILED tests/ui/test_a.py::test_x - AssertionError`).
pub fn parse_executions(suite: &str, output: &str) -> Vec<TestExecution> {
    let (Ok(result), Ok(reason)) = (
        Regex::new(
            r"^(?:\[gw\d+\]\s+\[\s*\d+%\]\s+(?P<s1>PASSED|FAILED|SKIPPED|ERROR)\s+(?P<t1>\S+::\S+)|(?P<t2>\S+::\S+)\s+(?P<s2>PASSED|FAILED|SKIPPED|ERROR)\b)",
        ),
        Regex::new(r"^(?:FAILED|ERROR) (\S+::\S+) - (.+)$"),
    ) else {
        return Vec::new();
    };

    let mut executions: Vec<TestExecution> = Vec::new();
    for line in output.lines() {
        if let Some(cap) = result.captures(line) {
            let (Some(test), Some(status)) = (
                cap.name("t1").or_else(|| cap.name("t2")),
                cap.name("s1").or_else(|| cap.name("s2")),
            ) else {
                continue;
            };
            let status = match status.as_str() {
                "PASSED" => ExecutionStatus::Passed,
                "SKIPPED" => ExecutionStatus::Skipped,
                _ => ExecutionStatus::Failed,
            };
            match executions.iter_mut().find(|e| e.test_name == test.as_str()) {
                Some(existing) => existing.status = status,
                None => executions.push(TestExecution {
                    suite_name: suite.to_string(),
                    test_name: test.as_str().to_string(),
                    status,
                    duration: 0.0,
                    error_message: String::new(),
                    screenshot_path: String::new(),
                    log_path: String::new(),
                }),
            }
        } else if let Some(cap) = reason.captures(line) {
            if let Some(existing) = executions.iter_mut().find(|e| e.test_name == &cap[1]) {
                existing.error_message = cap[2].trim().to_string();
            }
        }
    }
    executions
}

/// Executor invocation for a planned run
pub fn build_command(config: &HarnessConfig, plan: &ExecutionPlan, suite: &str, options: &RunOptions) -> ExecutorCommand {
    let tests_dir = config.paths.tests_dir.to_string_lossy();
    let mut args = vec![
        "-v".to_string(),
        "--tb=short".to_string(),
        format!("-n={}", plan.workers),
        "--dist=loadfile".to_string(),
        format!("--alluredir={}", config.paths.allure_results_dir.display()),
        "-m".to_string(),
        suite.to_string(),
        format!("{}/", tests_dir.trim_end_matches('/')),
    ];
    if options.headless {
        args.push("--headless".to_string());
    }
    if config.executor.reruns > 0 {
        args.push("--reruns".to_string());
        args.push(config.executor.reruns.to_string());
        args.push("--reruns-delay".to_string());
        args.push("1".to_string());
    }
    args.extend(config.executor.extra_args.iter().cloned());

    let env = vec![
        ("TEST_BASE_URL".to_string(), config.target.base_url.clone()),
        ("API_BASE_URL".to_string(), config.target.api_base_url.clone()),
        ("GRPC_SERVER".to_string(), config.target.grpc_server.clone()),
        ("HEADLESS".to_string(), options.headless.to_string()),
        ("MASS_TEST_MODE".to_string(), "true".to_string()),
    ];

    ExecutorCommand {
        program: config.executor.program.clone(),
        args,
        env,
        timeout: Duration::from_secs(config.executor.timeout_secs),
    }
}

pub struct MassTestRunner {
    config: HarnessConfig,
    probe: Arc<dyn ResourceProbe>,
    executor: Box<dyn TestExecutor>,
    registry: SuiteRegistry,
    data: TestDataGenerator,
    report: ReportTool,
    reclaimer: Arc<ResourceReclaimer>,
    monitor_interval: Duration,
}

impl MassTestRunner {
    /// Runner against the live host and the configured executor
    pub fn new(config: HarnessConfig) -> E2eResult<Self> {
        let reclaimer = ResourceReclaimer::new(&config.reclaim);
        Self::with_parts(config, Arc::new(HostProbe::default()), Box::new(ProcessExecutor), reclaimer)
    }

    pub fn with_parts(
        config: HarnessConfig,
        probe: Arc<dyn ResourceProbe>,
        executor: Box<dyn TestExecutor>,
        reclaimer: ResourceReclaimer,
    ) -> E2eResult<Self> {
        let registry = SuiteRegistry::open(&config.paths.suites_dir)?;
        let data = TestDataGenerator::new(&config.paths.test_data_dir, TtlCache::new(Duration::from_secs(3600)));
        let report = ReportTool::new(&config.report, &config.paths);

        Ok(Self {
            config,
            probe,
            executor,
            registry,
            data,
            report,
            reclaimer: Arc::new(reclaimer),
            monitor_interval: Duration::from_secs(5),
        })
    }

    pub fn with_monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval = interval;
        self
    }

    pub fn registry(&self) -> &SuiteRegistry {
        &self.registry
    }

    fn arm_suite(&mut self, suite: &str, count: usize) -> E2eResult<()> {
        match self.registry.get_suite(suite).map(|s| s.status) {
            None => {
                self.registry
                    .create_suite(suite, &format!("Mass test suite with {} tests", count), count);
            }
            Some(SuiteStatus::Running) => {
                warn!("Suite {} was left running by an earlier run; marking it failed to start", suite);
                self.registry.mark_failed_to_start(suite)?;
            }
            Some(_) => {}
        }
        self.registry.mark_running(suite)?;
        Ok(())
    }

    /// Arm the suite, run it and always reclaim afterwards.
    ///
    /// An error after arming releases the suite as failed-to-start before the
    /// error is returned, so the next run can re-arm it.
    pub async fn run_mass_test(&mut self, suite: &str, count: usize, options: &RunOptions) -> E2eResult<RunOutcome> {
        info!("Starting mass test: suite={} tests={}", suite, count);
        self.arm_suite(suite, count)?;

        let result = self.run_armed(suite, count, options).await;
        if let Err(e) = &result {
            error!("Mass test {} aborted: {}", suite, e);
            if self.registry.get_suite(suite).map(|s| s.status) == Some(SuiteStatus::Running) {
                if let Err(e) = self.registry.mark_failed_to_start(suite) {
                    error!("Could not release suite {}: {}", suite, e);
                }
            }
        }

        let files_reclaimed = self.reclaim().await;
        let mut outcome = result?;
        outcome.files_reclaimed = files_reclaimed;

        info!(
            "Mass test finished: {} passed, {} failed, {} skipped in {:.1}s",
            outcome.passed, outcome.failed, outcome.skipped, outcome.duration_secs
        );
        Ok(outcome)
    }

    async fn run_armed(&mut self, suite: &str, count: usize, options: &RunOptions) -> E2eResult<RunOutcome> {
        absorb(self.data.create_suite_data(suite, count), "Error generating test data")?;

        let tests_dir = self.config.paths.tests_dir.clone();
        let identifiers = tokio::task::spawn_blocking(move || discover_tests(&tests_dir)).await??;
        debug!("Discovered {} test files", identifiers.len());

        let mut request = AllocationRequest::new(count).with_ceiling(options.worker_ceiling);
        request.memory_per_worker = self.config.planner.memory_per_worker;
        let builder = ExecutionPlanBuilder::new(self.probe.clone(), &self.config);
        let plan = tokio::task::spawn_blocking(move || builder.build_with(&request, &identifiers)).await?;
        let command = build_command(&self.config, &plan, suite, options);

        let monitor = PerformanceMonitor::start(self.probe.clone(), self.monitor_interval, command.timeout);
        let started = Instant::now();
        let result = self.executor.execute(&command).await;
        let duration_secs = started.elapsed().as_secs_f64();
        let probe = self.probe.clone();
        let (samples, current) = tokio::task::spawn_blocking(move || (monitor.stop(), probe.snapshot())).await?;
        let performance = PerformanceReport::from_samples(&samples, &current);

        let (counts, executor_succeeded, suite_record) = match result {
            Ok(output) => {
                let counts = SummaryCounts::parse(&output.stdout).unwrap_or_else(|| {
                    warn!("No test summary in executor output");
                    if output.success {
                        SummaryCounts::default()
                    } else {
                        SummaryCounts {
                            failed: count,
                            ..Default::default()
                        }
                    }
                });
                if !output.success {
                    error!("Executor reported failure: {}", output.stderr.trim());
                }
                let record = self.registry.update_suite_stats(
                    suite,
                    counts.passed,
                    counts.failed + counts.errors,
                    counts.skipped,
                    duration_secs,
                )?;

                let executions = parse_executions(suite, &output.stdout);
                if !executions.is_empty() {
                    let report = self.registry.create_execution_report(suite, executions);
                    debug!("Recorded {} test executions for {}", report.summary.total, suite);
                }
                (counts, output.success, record)
            }
            Err(E2eError::ExecutorStart(reason)) => {
                error!("Executor failed to start: {}", reason);
                let record = self.registry.mark_failed_to_start(suite)?;
                let counts = SummaryCounts {
                    failed: count,
                    ..Default::default()
                };
                (counts, false, record)
            }
            Err(e) => {
                error!("Executor failed: {}", e);
                let record = self.registry.update_suite_stats(suite, 0, count, 0, duration_secs)?;
                let counts = SummaryCounts {
                    failed: count,
                    ..Default::default()
                };
                (counts, false, record)
            }
        };

        let failed = counts.failed + counts.errors;
        let summary = plan.summary();
        let run_report = RunReport {
            suite_name: suite.to_string(),
            timestamp: Local::now().to_rfc3339(),
            plan: summary.clone(),
            passed: counts.passed,
            failed,
            skipped: counts.skipped,
            duration_secs,
            executor_succeeded,
            performance,
        };
        let report_file = report_path(&self.config.paths.reports_dir, suite, Local::now());
        let run_report_path = absorb(write_json_atomic(&report_file, &run_report), "Error writing run report")?
            .map(|_| report_file);

        let report_generated = match self.report.generate().await {
            Ok(()) => true,
            Err(e) => {
                error!("Allure report generation failed: {}", e);
                false
            }
        };

        Ok(RunOutcome {
            suite: suite_record,
            plan: summary,
            passed: counts.passed,
            failed,
            skipped: counts.skipped,
            duration_secs,
            executor_succeeded,
            report_generated,
            run_report: run_report_path,
            files_reclaimed: 0,
        })
    }

    /// Browser/file reclamation plus stale test data, off the async workers
    async fn reclaim(&self) -> usize {
        let reclaimer = self.reclaimer.clone();
        let data = self.data.clone();
        let retention = self.config.reclaim.retention();

        let cleanup = tokio::task::spawn_blocking(move || {
            let removed = reclaimer.reclaim(retention);
            data.cleanup(DAY);
            removed
        });
        match cleanup.await {
            Ok(removed) => removed,
            Err(e) => {
                error!("Cleanup did not complete: {}", e);
                0
            }
        }
    }
}
