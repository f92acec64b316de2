//! Allure report tool management
//!
//! The tool is invoked with a fixed contract:
//! `<tool> generate <results> --clean -o <report>`, `<tool> serve <results>`,
//! `<tool> open <report>`.

use flate2::read::GzDecoder;
use std::path::{Path, PathBuf};
use testfleet_core::config::{PathsConfig, ReportConfig};
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::error::{E2eError, E2eResult};

pub struct ReportTool {
    config: ReportConfig,
    results_dir: PathBuf,
    report_dir: PathBuf,
}

impl ReportTool {
    pub fn new(config: &ReportConfig, paths: &PathsConfig) -> Self {
        Self {
            config: config.clone(),
            results_dir: paths.allure_results_dir.clone(),
            report_dir: paths.allure_report_dir.clone(),
        }
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    pub fn report_dir(&self) -> &Path {
        &self.report_dir
    }

    fn local_binary(&self) -> PathBuf {
        let name = if cfg!(windows) { "allure.bat" } else { "allure" };
        self.config.install_dir.join("bin").join(name)
    }

    /// Explicit path, then the local install, then whatever is on PATH
    pub fn binary(&self) -> PathBuf {
        if let Some(path) = &self.config.binary_path {
            return path.clone();
        }
        let local = self.local_binary();
        if local.exists() {
            local
        } else {
            PathBuf::from("allure")
        }
    }

    pub fn download_url(&self) -> String {
        format!(
            "{base}/{ver}/allure-commandline-{ver}.tgz",
            base = self.config.download_base.trim_end_matches('/'),
            ver = self.config.version
        )
    }

    /// Download and unpack the command-line distribution into the install dir
    pub async fn install(&self) -> E2eResult<PathBuf> {
        let local = self.local_binary();
        if local.exists() {
            info!("Allure already installed at {}", local.display());
            return Ok(local);
        }

        let url = self.download_url();
        info!("Downloading Allure {} from {}", self.config.version, url);
        let response = reqwest::get(&url).await?.error_for_status()?;
        let bytes = response.bytes().await?;

        let bin = unpack_distribution(&bytes, &self.config.install_dir, &self.config.version)?;
        info!("Allure installed at {}", bin.display());
        Ok(bin)
    }

    /// Build the HTML report from raw results
    pub async fn generate(&self) -> E2eResult<()> {
        let bin = self.binary();
        let args = [
            "generate".to_string(),
            self.results_dir.to_string_lossy().to_string(),
            "--clean".to_string(),
            "-o".to_string(),
            self.report_dir.to_string_lossy().to_string(),
        ];
        let command = format!("{} {}", bin.display(), args.join(" "));
        debug!("Running {}", command);

        let output = Command::new(&bin).args(&args).output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                E2eError::ReportToolMissing(bin.display().to_string())
            } else {
                E2eError::Io(e)
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            error!("Report generation failed: {}", stderr);
            return Err(E2eError::ReportTool { command, stderr });
        }
        info!("Allure report generated at {}", self.report_dir.display());
        Ok(())
    }

    /// Serve raw results in a browser until interrupted
    pub async fn serve(&self, port: Option<u16>) -> E2eResult<()> {
        let mut args = vec!["serve".to_string(), self.results_dir.to_string_lossy().to_string()];
        if let Some(port) = port {
            args.push("--port".to_string());
            args.push(port.to_string());
        }
        self.run_interactive(&args).await
    }

    /// Open a previously generated report
    pub async fn open(&self) -> E2eResult<()> {
        if !self.report_dir.exists() {
            return Err(E2eError::ReportTool {
                command: "open".to_string(),
                stderr: format!("report directory {} does not exist", self.report_dir.display()),
            });
        }
        let args = ["open".to_string(), self.report_dir.to_string_lossy().to_string()];
        self.run_interactive(&args).await
    }

    async fn run_interactive(&self, args: &[String]) -> E2eResult<()> {
        let bin = self.binary();
        let command = format!("{} {}", bin.display(), args.join(" "));
        info!("Running {}", command);

        let status = Command::new(&bin).args(args).status().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                E2eError::ReportToolMissing(bin.display().to_string())
            } else {
                E2eError::Io(e)
            }
        })?;
        if status.success() {
            Ok(())
        } else {
            Err(E2eError::ReportTool {
                command,
                stderr: format!("exited with {}", status),
            })
        }
    }
}

/// Unpack a `.tgz` distribution whose top-level dir is `allure-<version>`
/// so that it ends up at `install_dir`; returns the binary path.
pub fn unpack_distribution(archive: &[u8], install_dir: &Path, version: &str) -> E2eResult<PathBuf> {
    let parent = match install_dir.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)?;

    let staging = tempfile::tempdir_in(&parent)?;
    tar::Archive::new(GzDecoder::new(archive)).unpack(staging.path())?;

    let extracted = staging.path().join(format!("allure-{}", version));
    if !extracted.is_dir() {
        return Err(E2eError::ReportTool {
            command: "install".to_string(),
            stderr: format!("archive has no allure-{} directory", version),
        });
    }
    if install_dir.exists() {
        std::fs::remove_dir_all(install_dir)?;
    }
    std::fs::rename(&extracted, install_dir)?;

    let bin = install_dir.join("bin").join("allure");
    #[cfg(unix)]
    if bin.exists() {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755))?;
    }
    Ok(bin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::TempDir;

    fn fake_distribution(version: &str) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        let script = b"#!/bin/sh\necho allure\n";
        let mut header = tar::Header::new_gnu();
        header.set_size(script.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("allure-{}/bin/allure", version), &script[..])
            .unwrap();
        builder.into_inner().unwrap().finish().unwrap()
    }

    fn tool(tmp: &Path) -> ReportTool {
        let config = ReportConfig {
            install_dir: tmp.join("allure-commandline"),
            binary_path: Some(tmp.join("no-such-allure")),
            ..Default::default()
        };
        let paths = PathsConfig {
            allure_results_dir: tmp.join("allure-results"),
            allure_report_dir: tmp.join("allure-report"),
            ..Default::default()
        };
        ReportTool::new(&config, &paths)
    }

    #[test]
    fn test_download_url() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(
            tool(tmp.path()).download_url(),
            "https://repo.maven.apache.org/maven2/io/qameta/allure/allure-commandline/2.24.0/allure-commandline-2.24.0.tgz"
        );
    }

    #[test]
    fn test_unpack_distribution() {
        let tmp = TempDir::new().unwrap();
        let install_dir = tmp.path().join("allure-commandline");

        let bin = unpack_distribution(&fake_distribution("2.24.0"), &install_dir, "2.24.0").unwrap();
        assert_eq!(bin, install_dir.join("bin").join("allure"));
        assert!(bin.exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            assert_eq!(std::fs::metadata(&bin).unwrap().permissions().mode() & 0o777, 0o755);
        }
    }

    #[test]
    fn test_unpack_rejects_wrong_version() {
        let tmp = TempDir::new().unwrap();
        let err = unpack_distribution(&fake_distribution("2.1.0"), &tmp.path().join("allure"), "2.24.0").unwrap_err();
        assert!(matches!(err, E2eError::ReportTool { .. }));
    }

    #[tokio::test]
    async fn test_generate_without_tool() {
        let tmp = TempDir::new().unwrap();
        let err = tool(tmp.path()).generate().await.unwrap_err();
        assert!(matches!(err, E2eError::ReportToolMissing(_)));
    }

    #[tokio::test]
    async fn test_open_requires_report() {
        let tmp = TempDir::new().unwrap();
        assert!(tool(tmp.path()).open().await.is_err());
    }
}
