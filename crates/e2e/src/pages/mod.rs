//! Page objects for the system under test

pub mod base;
pub mod inventory;
pub mod login;

pub use base::{BasePage, PageMetrics};
pub use inventory::InventoryPage;
pub use login::LoginPage;

#[cfg(test)]
pub(crate) mod fake {
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet};
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;

    use crate::browser::{BrowserPage, LoadState, WaitState};
    use crate::error::{E2eError, E2eResult};

    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        Navigate(String, LoadState),
        Fill(String, String),
        Click(String),
        Wait(String, u64, WaitState),
        Screenshot(PathBuf, bool),
    }

    /// In-memory page: static visibility, scripted failures, click routes
    #[derive(Default)]
    pub struct FakePage {
        pub calls: Arc<Mutex<Vec<Call>>>,
        visible: HashSet<String>,
        fields: HashMap<String, String>,
        routes: HashMap<String, String>,
        url: String,
        fill_failures: u32,
        click_failures: u32,
    }

    impl FakePage {
        pub fn with_visible(mut self, selectors: &[&str]) -> Self {
            self.visible.extend(selectors.iter().map(|s| s.to_string()));
            self
        }

        pub fn failing_fills(mut self, n: u32) -> Self {
            self.fill_failures = n;
            self
        }

        pub fn failing_clicks(mut self, n: u32) -> Self {
            self.click_failures = n;
            self
        }

        /// Clicking `selector` lands on `url`
        pub fn route(mut self, selector: &str, url: &str) -> Self {
            self.routes.insert(selector.to_string(), url.to_string());
            self
        }

        pub fn field(&self, selector: &str) -> Option<String> {
            self.fields.get(selector).cloned()
        }
    }

    #[async_trait]
    impl BrowserPage for FakePage {
        async fn navigate(&mut self, url: &str, wait_until: LoadState) -> E2eResult<()> {
            self.calls.lock().push(Call::Navigate(url.to_string(), wait_until));
            self.url = url.to_string();
            Ok(())
        }

        async fn fill(&mut self, selector: &str, value: &str, _timeout: Duration) -> E2eResult<()> {
            self.calls.lock().push(Call::Fill(selector.to_string(), value.to_string()));
            if self.fill_failures > 0 {
                self.fill_failures -= 1;
                return Err(E2eError::StepFailed {
                    step: format!("fill:{}", selector),
                    reason: "element detached".into(),
                });
            }
            self.fields.insert(selector.to_string(), value.to_string());
            Ok(())
        }

        async fn click(&mut self, selector: &str, _timeout: Duration) -> E2eResult<()> {
            self.calls.lock().push(Call::Click(selector.to_string()));
            if self.click_failures > 0 {
                self.click_failures -= 1;
                return Err(E2eError::StepFailed {
                    step: format!("click:{}", selector),
                    reason: "element not clickable".into(),
                });
            }
            if let Some(url) = self.routes.get(selector) {
                self.url = url.clone();
            }
            Ok(())
        }

        async fn wait_for_selector(&mut self, selector: &str, timeout: Duration, state: WaitState) -> E2eResult<()> {
            self.calls
                .lock()
                .push(Call::Wait(selector.to_string(), timeout.as_millis() as u64, state));
            let present = self.visible.contains(selector);
            let reached = match state {
                WaitState::Visible | WaitState::Attached => present,
                WaitState::Hidden | WaitState::Detached => !present,
            };
            if reached {
                Ok(())
            } else {
                Err(E2eError::Timeout(selector.to_string()))
            }
        }

        async fn screenshot(&mut self, path: &Path, full_page: bool) -> E2eResult<()> {
            self.calls.lock().push(Call::Screenshot(path.to_path_buf(), full_page));
            Ok(())
        }

        async fn current_url(&mut self) -> E2eResult<String> {
            Ok(self.url.clone())
        }
    }
}
