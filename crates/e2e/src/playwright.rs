//! Playwright browser automation
//!
//! Each Node process starts from a fresh browser, so [`PlaywrightPage`] keeps
//! the page-mutating actions performed so far and replays them ahead of every
//! new action. Waits and screenshots run once and are not replayed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use testfleet_core::{BrowserEngine, OptimizationSettings};
use tokio::process::Command as TokioCommand;
use tracing::debug;

use crate::browser::{BrowserPage, LoadState, WaitState};
use crate::error::{E2eError, E2eResult};

/// A single browser action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Navigate { url: String, wait_until: LoadState },
    Fill { selector: String, value: String, timeout_ms: u64 },
    Click { selector: String, timeout_ms: u64 },
    WaitFor { selector: String, timeout_ms: u64, state: WaitState },
    Screenshot { path: PathBuf, full_page: bool },
}

impl Action {
    /// Whether the action changes page state and must be replayed
    pub fn replays(&self) -> bool {
        matches!(self, Action::Navigate { .. } | Action::Fill { .. } | Action::Click { .. })
    }

    pub fn name(&self) -> String {
        match self {
            Action::Navigate { url, .. } => format!("navigate:{}", url),
            Action::Fill { selector, .. } => format!("fill:{}", selector),
            Action::Click { selector, .. } => format!("click:{}", selector),
            Action::WaitFor { selector, state, .. } => format!("wait:{}:{}", selector, state.as_str()),
            Action::Screenshot { path, .. } => format!("screenshot:{}", path.display()),
        }
    }

    fn to_js(&self) -> String {
        match self {
            Action::Navigate { url, wait_until } => {
                format!("    await page.goto({}, {{ waitUntil: '{}' }});", js(url), wait_until.as_str())
            }
            Action::Fill { selector, value, timeout_ms } => {
                format!("    await page.fill({}, {}, {{ timeout: {} }});", js(selector), js(value), timeout_ms)
            }
            Action::Click { selector, timeout_ms } => {
                format!("    await page.click({}, {{ timeout: {} }});", js(selector), timeout_ms)
            }
            Action::WaitFor { selector, timeout_ms, state } => format!(
                "    await page.waitForSelector({}, {{ state: '{}', timeout: {} }});",
                js(selector),
                state.as_str(),
                timeout_ms
            ),
            Action::Screenshot { path, full_page } => format!(
                "    await page.screenshot({{ path: {}, fullPage: {} }});",
                js(&path.to_string_lossy()),
                full_page
            ),
        }
    }
}

/// Quote a string as a JavaScript literal
fn js(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub browser: BrowserEngine,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub optimization: OptimizationSettings,
    /// Directory whose `node_modules` provides `playwright`
    pub working_dir: PathBuf,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            browser: BrowserEngine::Chromium,
            viewport_width: 1280,
            viewport_height: 720,
            optimization: OptimizationSettings::default(),
            working_dir: PathBuf::from("."),
        }
    }
}

/// Last line a generated script prints
#[derive(Debug, Clone, Deserialize)]
struct ScriptResult {
    success: bool,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    timeout: bool,
}

fn parse_result(stdout: &str) -> Option<ScriptResult> {
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| l.starts_with('{'))
        .and_then(|l| serde_json::from_str(l).ok())
}

/// Build the Node script running `steps` in a fresh browser
pub fn build_script(config: &PlaywrightConfig, steps: &[&Action]) -> String {
    let opt = &config.optimization;
    let mut script = format!(
        r#"const {{ chromium, firefox, webkit }} = require('playwright');

(async () => {{
  const browser = await {browser}.launch({{ headless: {headless} }});
  const context = await browser.newContext({{
    viewport: {{ width: {width}, height: {height} }},
    javaScriptEnabled: {javascript}
  }});
  const page = await context.newPage();
  page.setDefaultTimeout({timeout_ms});
"#,
        browser = config.browser.as_str(),
        headless = opt.headless,
        width = config.viewport_width,
        height = config.viewport_height,
        javascript = !opt.disable_javascript,
        timeout_ms = opt.timeout_secs * 1000,
    );

    if opt.disable_images {
        script.push_str("  await page.route('**/*.{png,jpg,jpeg,gif,svg,ico}', route => route.abort());\n");
    }
    if opt.disable_css {
        script.push_str("  await page.route('**/*.css', route => route.abort());\n");
    }

    script.push_str("\n  try {\n");
    for (i, step) in steps.iter().enumerate() {
        script.push_str(&format!("    // Step {}: {}\n", i + 1, step.name()));
        script.push_str(&step.to_js());
        script.push('\n');
    }
    script.push_str(
        r#"    console.log(JSON.stringify({ success: true, url: page.url() }));
  } catch (error) {
    console.log(JSON.stringify({ success: false, error: error.message, timeout: error.name === 'TimeoutError', url: page.url() }));
    process.exitCode = 1;
  } finally {
    await browser.close();
  }
})();
"#,
    );
    script
}

/// [`BrowserPage`] backed by generated Playwright scripts
pub struct PlaywrightPage {
    config: PlaywrightConfig,
    history: Vec<Action>,
    last_url: Option<String>,
}

impl PlaywrightPage {
    /// Create a page; fails if Playwright is not installed
    pub fn new(config: PlaywrightConfig) -> E2eResult<Self> {
        Self::check_playwright_installed(&config.working_dir)?;
        Ok(Self {
            config,
            history: Vec::new(),
            last_url: None,
        })
    }

    fn check_playwright_installed(dir: &Path) -> E2eResult<()> {
        let status = Command::new("npx")
            .args(["playwright", "--version"])
            .current_dir(dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    /// Actions that will be replayed before the next one
    pub fn history(&self) -> &[Action] {
        &self.history
    }

    async fn perform(&mut self, action: Action) -> E2eResult<()> {
        let mut steps: Vec<&Action> = self.history.iter().collect();
        steps.push(&action);
        let script = build_script(&self.config, &steps);

        let result = self.run_script(&script).await?;
        if let Some(url) = result.url {
            self.last_url = Some(url);
        }

        if !result.success {
            let reason = result.error.unwrap_or_else(|| "unknown error".to_string());
            return Err(if result.timeout {
                E2eError::Timeout(format!("{} ({})", action.name(), reason))
            } else {
                E2eError::StepFailed {
                    step: action.name(),
                    reason,
                }
            });
        }

        if action.replays() {
            self.history.push(action);
        }
        Ok(())
    }

    async fn run_script(&self, script: &str) -> E2eResult<ScriptResult> {
        let mut file = tempfile::Builder::new()
            .prefix("testfleet-")
            .suffix(".js")
            .tempfile_in(&self.config.working_dir)?;
        file.write_all(script.as_bytes())?;
        file.flush()?;

        debug!("Running Playwright script: {}", file.path().display());

        let output = TokioCommand::new("node")
            .arg(file.path())
            .current_dir(&self.config.working_dir)
            .kill_on_drop(true)
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_result(&stdout).ok_or_else(|| {
            E2eError::Playwright(format!(
                "Script produced no result:\nstdout: {}\nstderr: {}",
                stdout,
                String::from_utf8_lossy(&output.stderr)
            ))
        })
    }
}

fn millis(timeout: Duration) -> u64 {
    timeout.as_millis().min(u64::MAX as u128) as u64
}

#[async_trait]
impl BrowserPage for PlaywrightPage {
    async fn navigate(&mut self, url: &str, wait_until: LoadState) -> E2eResult<()> {
        self.perform(Action::Navigate {
            url: url.to_string(),
            wait_until,
        })
        .await
    }

    async fn fill(&mut self, selector: &str, value: &str, timeout: Duration) -> E2eResult<()> {
        self.perform(Action::Fill {
            selector: selector.to_string(),
            value: value.to_string(),
            timeout_ms: millis(timeout),
        })
        .await
    }

    async fn click(&mut self, selector: &str, timeout: Duration) -> E2eResult<()> {
        self.perform(Action::Click {
            selector: selector.to_string(),
            timeout_ms: millis(timeout),
        })
        .await
    }

    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration, state: WaitState) -> E2eResult<()> {
        self.perform(Action::WaitFor {
            selector: selector.to_string(),
            timeout_ms: millis(timeout),
            state,
        })
        .await
    }

    async fn screenshot(&mut self, path: &Path, full_page: bool) -> E2eResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.perform(Action::Screenshot {
            path: path.to_path_buf(),
            full_page,
        })
        .await
    }

    async fn current_url(&mut self) -> E2eResult<String> {
        if let Some(url) = &self.last_url {
            return Ok(url.clone());
        }
        if self.history.is_empty() {
            return Ok("about:blank".to_string());
        }

        let steps: Vec<&Action> = self.history.iter().collect();
        let script = build_script(&self.config, &steps);
        let result = self.run_script(&script).await?;
        let url = result.url.unwrap_or_default();
        self.last_url = Some(url.clone());
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_quotes_and_flags() {
        let config = PlaywrightConfig {
            browser: BrowserEngine::Firefox,
            optimization: OptimizationSettings {
                disable_css: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let nav = Action::Navigate {
            url: "https://example.com/it's".into(),
            wait_until: LoadState::DomContentLoaded,
        };
        let fill = Action::Fill {
            selector: "#user-name".into(),
            value: "a\"b".into(),
            timeout_ms: 5000,
        };

        let script = build_script(&config, &[&nav, &fill]);
        assert!(script.contains("await firefox.launch({ headless: true })"));
        assert!(script.contains("javaScriptEnabled: true"));
        assert!(script.contains("route.abort()"));
        assert!(script.contains("'**/*.css'"));
        assert!(script.contains(r#"await page.goto("https://example.com/it's", { waitUntil: 'domcontentloaded' });"#));
        assert!(script.contains(r##"await page.fill("#user-name", "a\"b", { timeout: 5000 });"##));
        assert!(script.contains("page.setDefaultTimeout(300000)"));
    }

    #[test]
    fn test_replay_classification() {
        assert!(Action::Click { selector: "#a".into(), timeout_ms: 1 }.replays());
        assert!(!Action::WaitFor {
            selector: "#a".into(),
            timeout_ms: 1,
            state: WaitState::Hidden
        }
        .replays());
        assert!(!Action::Screenshot { path: "a.png".into(), full_page: true }.replays());
    }

    #[test]
    fn test_parse_result_takes_last_json_line() {
        let stdout = "some noise\n{\"success\":true,\"url\":\"https://www.saucedemo.com/inventory.html\"}\n";
        let parsed = parse_result(stdout).unwrap();
        assert!(parsed.success);
        assert_eq!(parsed.url.as_deref(), Some("https://www.saucedemo.com/inventory.html"));

        let failed = parse_result("{\"success\":false,\"error\":\"Timeout 3000ms exceeded\",\"timeout\":true}").unwrap();
        assert!(!failed.success && failed.timeout);
        assert!(parse_result("no json here").is_none());
    }
}
