//! Login page of the demo store

use std::time::Duration;

use super::base::BasePage;
use crate::browser::{BrowserPage, WaitState};
use crate::error::E2eResult;

pub const USERNAME: &str = "#user-name";
pub const PASSWORD: &str = "#password";
pub const LOGIN_BUTTON: &str = "#login-button";
pub const ERROR_MESSAGE: &str = "[data-test='error']";

const FIELD_TIMEOUT: Duration = Duration::from_secs(10);

pub struct LoginPage<P> {
    base: BasePage<P>,
    url: String,
}

impl<P: BrowserPage> LoginPage<P> {
    pub fn new(base: BasePage<P>, base_url: &str) -> Self {
        Self {
            base,
            url: format!("{}/", base_url.trim_end_matches('/')),
        }
    }

    pub fn base(&mut self) -> &mut BasePage<P> {
        &mut self.base
    }

    pub async fn goto(&mut self) -> E2eResult<()> {
        let url = self.url.clone();
        self.base.goto(&url).await
    }

    pub async fn login(&mut self, username: &str, password: &str) -> E2eResult<()> {
        self.base.fill_field(USERNAME, username, 2).await?;
        self.base.fill_field(PASSWORD, password, 2).await?;
        self.base.click_button(LOGIN_BUTTON, 2).await
    }

    pub async fn is_logged_in(&mut self) -> bool {
        match self.base.current_url().await {
            Ok(url) => url.ends_with("/inventory.html"),
            Err(_) => false,
        }
    }

    /// Assert that the login form fields are all shown
    pub async fn validate_login_fields(&mut self) -> E2eResult<()> {
        for (selector, label) in [
            (USERNAME, "Username field"),
            (PASSWORD, "Password field"),
            (LOGIN_BUTTON, "Login button"),
        ] {
            let visible = self.base.wait_for_selector(selector, FIELD_TIMEOUT, WaitState::Visible).await;
            self.base.custom_assert(visible, &format!("{} not visible", label)).await?;
        }
        Ok(())
    }

    pub async fn has_error(&mut self) -> bool {
        self.base.is_element_visible(ERROR_MESSAGE, Duration::from_secs(5)).await
    }
}
