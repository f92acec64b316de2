//! Post-run cleanup of orphaned browsers and stale transient files
//!
//! Everything here is best-effort: a failure on one process or file is logged
//! and the sweep moves on to the next item.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{ReclaimConfig, TimestampBasis};
use crate::{HarnessError, Result};

/// A process as seen by the reclaimer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: i32,
    pub name: String,
}

/// Access to the host process table
pub trait ProcessTable: Send + Sync {
    fn list(&self) -> Result<Vec<ProcessInfo>>;
    fn terminate(&self, pid: i32) -> Result<()>;
}

/// Live process table
#[derive(Debug, Clone, Default)]
pub struct HostProcessTable;

impl ProcessTable for HostProcessTable {
    #[cfg(target_os = "linux")]
    fn list(&self) -> Result<Vec<ProcessInfo>> {
        let mut out = Vec::new();
        for entry in std::fs::read_dir("/proc")? {
            let Ok(entry) = entry else { continue };
            let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<i32>().ok()) else {
                continue;
            };
            // Processes can exit between readdir and read
            if let Ok(comm) = std::fs::read_to_string(entry.path().join("comm")) {
                out.push(ProcessInfo {
                    pid,
                    name: comm.trim().to_string(),
                });
            }
        }
        Ok(out)
    }

    #[cfg(not(target_os = "linux"))]
    fn list(&self) -> Result<Vec<ProcessInfo>> {
        let output = std::process::Command::new("ps").args(["-axo", "pid=,comm="]).output()?;
        if !output.status.success() {
            return Err(HarnessError::Subprocess {
                command: "ps -axo pid=,comm=".to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter_map(|line| {
                let mut parts = line.trim().splitn(2, char::is_whitespace);
                let pid = parts.next()?.parse().ok()?;
                let name = parts.next()?.trim();
                let name = Path::new(name).file_name()?.to_string_lossy().to_string();
                Some(ProcessInfo { pid, name })
            })
            .collect())
    }

    #[cfg(unix)]
    fn terminate(&self, pid: i32) -> Result<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        kill(Pid::from_raw(pid), Signal::SIGTERM).map_err(|e| HarnessError::Subprocess {
            command: format!("kill -TERM {}", pid),
            stderr: e.to_string(),
        })
    }

    #[cfg(not(unix))]
    fn terminate(&self, pid: i32) -> Result<()> {
        Err(HarnessError::Subprocess {
            command: format!("terminate {}", pid),
            stderr: "process termination is only supported on unix".to_string(),
        })
    }
}

pub struct ResourceReclaimer {
    transient_dirs: Vec<PathBuf>,
    browser_patterns: Vec<String>,
    timestamp_basis: TimestampBasis,
    terminate_browsers: bool,
    processes: Box<dyn ProcessTable>,
}

impl ResourceReclaimer {
    pub fn new(config: &ReclaimConfig) -> Self {
        Self::with_process_table(config, Box::new(HostProcessTable))
    }

    pub fn with_process_table(config: &ReclaimConfig, processes: Box<dyn ProcessTable>) -> Self {
        Self {
            transient_dirs: config.transient_dirs.clone(),
            browser_patterns: config.browser_patterns.iter().map(|p| p.to_lowercase()).collect(),
            timestamp_basis: config.timestamp_basis,
            terminate_browsers: config.terminate_browsers,
            processes,
        }
    }

    /// Run both cleanup passes; returns the number of files removed
    pub fn reclaim(&self, retention: Duration) -> usize {
        if self.terminate_browsers {
            let terminated = self.terminate_browser_processes();
            info!("Terminated {} browser process(es)", terminated);
        }

        let cutoff = SystemTime::now()
            .checked_sub(retention)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let removed: usize = self
            .transient_dirs
            .iter()
            .map(|dir| self.purge_dir(dir, cutoff))
            .sum();
        info!("Removed {} stale file(s)", removed);
        removed
    }

    /// Signal every process whose name matches a browser pattern
    pub fn terminate_browser_processes(&self) -> usize {
        let own_pid = std::process::id() as i32;
        let processes = match self.processes.list() {
            Ok(p) => p,
            Err(e) => {
                warn!("Could not list processes: {}", e);
                return 0;
            }
        };

        let mut terminated = 0;
        for proc in processes.iter().filter(|p| p.pid != own_pid && self.is_browser(&p.name)) {
            match self.processes.terminate(proc.pid) {
                Ok(()) => {
                    debug!("Sent SIGTERM to {} (pid {})", proc.name, proc.pid);
                    terminated += 1;
                }
                Err(e) => warn!("Could not terminate {} (pid {}): {}", proc.name, proc.pid, e),
            }
        }
        terminated
    }

    fn is_browser(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.browser_patterns.iter().any(|p| name.contains(p.as_str()))
    }

    /// Delete files under `dir` whose timestamp is before `cutoff`
    pub fn purge_dir(&self, dir: &Path, cutoff: SystemTime) -> usize {
        if !dir.exists() {
            return 0;
        }

        let mut removed = 0;
        for entry in WalkDir::new(dir).min_depth(1) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let stamp = match entry.metadata().map_err(HarnessError::from).and_then(|m| self.timestamp(&m)) {
                Ok(t) => t,
                Err(e) => {
                    warn!("No timestamp for {}: {}", entry.path().display(), e);
                    continue;
                }
            };

            if stamp < cutoff {
                match std::fs::remove_file(entry.path()) {
                    Ok(()) => {
                        debug!("Removed {}", entry.path().display());
                        removed += 1;
                    }
                    Err(e) => warn!("Could not remove {}: {}", entry.path().display(), e),
                }
            }
        }
        removed
    }

    fn timestamp(&self, metadata: &std::fs::Metadata) -> Result<SystemTime> {
        match self.timestamp_basis {
            TimestampBasis::Created => Ok(metadata.created().or_else(|_| metadata.modified())?),
            TimestampBasis::Modified => Ok(metadata.modified()?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tempfile::TempDir;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    #[derive(Default, Clone)]
    struct FakeTable {
        procs: Vec<ProcessInfo>,
        killed: Arc<Mutex<Vec<i32>>>,
        fail_on: Option<i32>,
    }

    impl ProcessTable for FakeTable {
        fn list(&self) -> Result<Vec<ProcessInfo>> {
            Ok(self.procs.clone())
        }

        fn terminate(&self, pid: i32) -> Result<()> {
            if self.fail_on == Some(pid) {
                return Err(HarnessError::Subprocess {
                    command: format!("kill {}", pid),
                    stderr: "EPERM".into(),
                });
            }
            self.killed.lock().push(pid);
            Ok(())
        }
    }

    fn aged_file(dir: &Path, name: &str, age: Duration) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"x").unwrap();
        let file = std::fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
        path
    }

    fn config_for(dir: &Path) -> ReclaimConfig {
        ReclaimConfig {
            transient_dirs: vec![dir.to_path_buf()],
            timestamp_basis: TimestampBasis::Modified,
            terminate_browsers: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_retention_window() {
        let tmp = TempDir::new().unwrap();
        let old = aged_file(tmp.path(), "old.png", 10 * DAY);
        let fresh = aged_file(tmp.path(), "fresh.png", DAY);

        let reclaimer = ResourceReclaimer::with_process_table(&config_for(tmp.path()), Box::new(FakeTable::default()));
        assert_eq!(reclaimer.reclaim(7 * DAY), 1);
        assert!(!old.exists());
        assert!(fresh.exists());
    }

    #[test]
    fn test_nested_and_missing_dirs() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("run1").join("attachments");
        std::fs::create_dir_all(&nested).unwrap();
        aged_file(&nested, "a.json", 30 * DAY);
        aged_file(&nested, "b.json", 30 * DAY);

        let mut config = config_for(tmp.path());
        config.transient_dirs.push(tmp.path().join("does-not-exist"));

        let reclaimer = ResourceReclaimer::with_process_table(&config, Box::new(FakeTable::default()));
        assert_eq!(reclaimer.reclaim(7 * DAY), 2);
    }

    #[test]
    fn test_terminates_matching_browsers() {
        let table = FakeTable {
            procs: vec![
                ProcessInfo { pid: 10, name: "chrome".into() },
                ProcessInfo { pid: 11, name: "Firefox-bin".into() },
                ProcessInfo { pid: 12, name: "bash".into() },
                ProcessInfo { pid: 13, name: "WebKitWebProcess".into() },
                ProcessInfo { pid: 14, name: "chromium".into() },
            ],
            fail_on: Some(14),
            ..Default::default()
        };
        let killed = table.killed.clone();

        let reclaimer = ResourceReclaimer::with_process_table(&ReclaimConfig::default(), Box::new(table));
        assert_eq!(reclaimer.terminate_browser_processes(), 3);
        assert_eq!(*killed.lock(), vec![10, 11, 13]);
    }

    #[test]
    fn test_unbounded_retention_keeps_everything() {
        let tmp = TempDir::new().unwrap();
        let old = aged_file(tmp.path(), "old.png", 400 * DAY);

        let mut config = config_for(tmp.path());
        config.retention_days = u64::MAX;
        let reclaimer = ResourceReclaimer::with_process_table(&config, Box::new(FakeTable::default()));
        assert_eq!(reclaimer.reclaim(config.retention()), 0);
        assert!(old.exists());
    }
}
