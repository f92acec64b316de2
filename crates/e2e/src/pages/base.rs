//! Shared page-object behaviour

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use testfleet_core::HarnessConfig;

use crate::browser::{BrowserPage, LoadState, WaitState};
use crate::error::{E2eError, E2eResult};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);
const MASS_MODE_TIMEOUT_CAP: Duration = Duration::from_millis(3000);

/// Counters collected while a page object is used
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMetrics {
    pub page_loads: u32,
    pub total_load_secs: f64,
    pub screenshots_taken: u32,
    pub retry_attempts: u32,
}

impl PageMetrics {
    pub fn avg_load_secs(&self) -> f64 {
        self.total_load_secs / self.page_loads.max(1) as f64
    }
}

pub struct BasePage<P> {
    page: P,
    mass_test_mode: bool,
    screenshots_dir: PathBuf,
    retry_backoff: Duration,
    selector_cache: HashMap<String, WaitState>,
    metrics: PageMetrics,
}

impl<P: BrowserPage> BasePage<P> {
    pub fn new(page: P, mass_test_mode: bool) -> Self {
        Self {
            page,
            mass_test_mode,
            screenshots_dir: PathBuf::from("screenshots"),
            retry_backoff: Duration::from_millis(500),
            selector_cache: HashMap::new(),
            metrics: PageMetrics::default(),
        }
    }

    /// Mass mode and screenshot location taken from the harness config
    pub fn configured(page: P, config: &HarnessConfig) -> Self {
        Self::new(page, config.optimization.mass_test_mode).with_screenshots_dir(config.paths.screenshots_dir.clone())
    }

    pub fn with_screenshots_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.screenshots_dir = dir.into();
        self
    }

    /// Base delay between retries; attempt `n` waits `n * backoff`
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn page_mut(&mut self) -> &mut P {
        &mut self.page
    }

    pub fn into_inner(self) -> P {
        self.page
    }

    pub fn metrics(&self) -> &PageMetrics {
        &self.metrics
    }

    pub fn clear_cache(&mut self) {
        self.selector_cache.clear();
        info!("Selector cache cleared");
    }

    pub async fn goto(&mut self, url: &str) -> E2eResult<()> {
        info!("Navigating to {}", url);
        let wait_until = if self.mass_test_mode {
            LoadState::DomContentLoaded
        } else {
            LoadState::NetworkIdle
        };

        let start = Instant::now();
        let result = self.page.navigate(url, wait_until).await;
        let elapsed = start.elapsed().as_secs_f64();
        self.metrics.total_load_secs += elapsed;

        match result {
            Ok(()) => {
                self.metrics.page_loads += 1;
                // Page content changed, cached states no longer hold
                self.selector_cache.clear();
                debug!("goto executed in {:.3}s", elapsed);
                Ok(())
            }
            Err(e) => {
                error!("goto failed after {:.3}s: {}", elapsed, e);
                Err(e)
            }
        }
    }

    /// Wait for `selector` to reach `state`; false on timeout or failure
    pub async fn wait_for_selector(&mut self, selector: &str, timeout: Duration, state: WaitState) -> bool {
        let timeout = if self.mass_test_mode {
            timeout.min(MASS_MODE_TIMEOUT_CAP)
        } else {
            timeout
        };

        if self.selector_cache.get(selector) == Some(&state) {
            return true;
        }

        match self.page.wait_for_selector(selector, timeout, state).await {
            Ok(()) => {
                self.selector_cache.insert(selector.to_string(), state);
                true
            }
            Err(e) => {
                error!("Timeout waiting for selector {}: {}", selector, e);
                false
            }
        }
    }

    pub async fn is_element_visible(&mut self, selector: &str, timeout: Duration) -> bool {
        match self.page.wait_for_selector(selector, timeout, WaitState::Visible).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Element {} not visible: {}", selector, e);
                false
            }
        }
    }

    pub async fn fill_field(&mut self, selector: &str, value: &str, retry: u32) -> E2eResult<()> {
        let attempts = retry.max(1);
        let mut last_error = String::new();

        for attempt in 0..attempts {
            info!("Filling field {} (attempt {})", selector, attempt + 1);
            let result = match self.page.fill(selector, "", DEFAULT_TIMEOUT).await {
                Ok(()) => self.page.fill(selector, value, DEFAULT_TIMEOUT).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!("Fill failed (attempt {}): {}", attempt + 1, e);
                    last_error = e.to_string();
                    self.metrics.retry_attempts += 1;
                    if attempt + 1 < attempts {
                        tokio::time::sleep(self.retry_backoff * (attempt + 1)).await;
                    }
                }
            }
        }

        self.custom_assert(false, &format!("Failed to fill field {} after {} attempts: {}", selector, attempts, last_error))
            .await
    }

    pub async fn click_button(&mut self, selector: &str, retry: u32) -> E2eResult<()> {
        let attempts = retry.max(1);
        let mut last_error = String::new();

        for attempt in 0..attempts {
            info!("Clicking button {} (attempt {})", selector, attempt + 1);
            match self.page.click(selector, DEFAULT_TIMEOUT).await {
                Ok(()) => {
                    self.selector_cache.clear();
                    return Ok(());
                }
                Err(e) => {
                    warn!("Click failed (attempt {}): {}", attempt + 1, e);
                    last_error = e.to_string();
                    self.metrics.retry_attempts += 1;
                    if attempt + 1 < attempts {
                        tokio::time::sleep(self.retry_backoff * (attempt + 1)).await;
                    }
                }
            }
        }

        self.custom_assert(false, &format!("Failed to click button {} after {} attempts: {}", selector, attempts, last_error))
            .await
    }

    /// Screenshot under the screenshots dir; viewport only in mass mode
    pub async fn take_screenshot(&mut self, name: Option<&str>) -> E2eResult<PathBuf> {
        let name = match name {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => format!("screenshot_{}.png", Local::now().format("%Y%m%d_%H%M%S")),
        };
        let path = self.screenshots_dir.join(name);

        self.page.screenshot(&path, !self.mass_test_mode).await?;
        self.metrics.screenshots_taken += 1;
        info!("Screenshot saved to {}", path.display());
        Ok(path)
    }

    /// Fail with `message` when `condition` is false, capturing a screenshot first
    pub async fn custom_assert(&mut self, condition: bool, message: &str) -> E2eResult<()> {
        if condition {
            return Ok(());
        }

        error!("Assertion failed: {}", message);
        let name = format!("assertion_failed_{}.png", Local::now().format("%Y%m%d_%H%M%S"));
        if let Err(e) = self.take_screenshot(Some(&name)).await {
            warn!("Could not capture failure screenshot: {}", e);
        }
        Err(E2eError::AssertionFailed(message.to_string()))
    }

    pub async fn current_url(&mut self) -> E2eResult<String> {
        self.page.current_url().await
    }
}
