//! Page objects driven through a scripted storefront
//!
//! The storefront models just enough of the demo store to walk the login and
//! cart flows without a browser.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use testfleet_e2e::pages::{BasePage, InventoryPage, LoginPage};
use testfleet_e2e::{BrowserPage, E2eError, E2eResult, LoadState, WaitState};

const BASE_URL: &str = "https://www.saucedemo.com";

#[derive(Default)]
struct Storefront {
    url: String,
    username: String,
    password: String,
    cart: HashSet<String>,
}

impl Storefront {
    fn visible(&self, selector: &str) -> bool {
        if self.url.ends_with("/inventory.html") {
            if let Some(item) = selector
                .strip_prefix("[data-test='add-to-cart-")
                .and_then(|s| s.strip_suffix("']"))
            {
                return !self.cart.contains(item);
            }
            if let Some(item) = selector.strip_prefix("[data-test='remove-").and_then(|s| s.strip_suffix("']")) {
                return self.cart.contains(item);
            }
            return matches!(selector, ".inventory_container" | ".shopping_cart_link");
        }
        match selector {
            "#user-name" | "#password" | "#login-button" => true,
            "[data-test='error']" => self.username == "locked_out_user",
            _ => false,
        }
    }
}

#[async_trait]
impl BrowserPage for Storefront {
    async fn navigate(&mut self, url: &str, _wait_until: LoadState) -> E2eResult<()> {
        self.url = url.to_string();
        Ok(())
    }

    async fn fill(&mut self, selector: &str, value: &str, _timeout: Duration) -> E2eResult<()> {
        match selector {
            "#user-name" => self.username = value.to_string(),
            "#password" => self.password = value.to_string(),
            other => {
                return Err(E2eError::StepFailed {
                    step: format!("fill:{}", other),
                    reason: "no such field".into(),
                })
            }
        }
        Ok(())
    }

    async fn click(&mut self, selector: &str, _timeout: Duration) -> E2eResult<()> {
        if !self.visible(selector) {
            return Err(E2eError::Timeout(selector.to_string()));
        }
        match selector {
            "#login-button" if self.username == "standard_user" && self.password == "secret_sauce" => {
                self.url = format!("{}/inventory.html", BASE_URL);
            }
            ".shopping_cart_link" => self.url = format!("{}/cart.html", BASE_URL),
            s if s.starts_with("[data-test='add-to-cart-") => {
                let item = &s["[data-test='add-to-cart-".len()..s.len() - 2];
                self.cart.insert(item.to_string());
            }
            s if s.starts_with("[data-test='remove-") => {
                let item = &s["[data-test='remove-".len()..s.len() - 2];
                self.cart.remove(item);
            }
            _ => {}
        }
        Ok(())
    }

    async fn wait_for_selector(&mut self, selector: &str, _timeout: Duration, state: WaitState) -> E2eResult<()> {
        let visible = self.visible(selector);
        let reached = match state {
            WaitState::Visible | WaitState::Attached => visible,
            WaitState::Hidden | WaitState::Detached => !visible,
        };
        if reached {
            Ok(())
        } else {
            Err(E2eError::Timeout(selector.to_string()))
        }
    }

    async fn screenshot(&mut self, _path: &Path, _full_page: bool) -> E2eResult<()> {
        Ok(())
    }

    async fn current_url(&mut self) -> E2eResult<String> {
        Ok(self.url.clone())
    }
}

fn base(page: Storefront) -> BasePage<Storefront> {
    BasePage::new(page, true).with_retry_backoff(Duration::ZERO)
}

#[tokio::test]
async fn login_then_shop() {
    let mut login = LoginPage::new(base(Storefront::default()), BASE_URL);
    login.goto().await.unwrap();
    login.validate_login_fields().await.unwrap();
    login.login("standard_user", "secret_sauce").await.unwrap();
    assert!(login.is_logged_in().await);

    let page = std::mem::replace(login.base(), base(Storefront::default())).into_inner();
    let mut inventory = InventoryPage::new(base(page), BASE_URL);
    assert!(inventory.is_loaded().await);
    assert!(inventory.add_item_to_cart("sauce-labs-backpack").await);
    assert!(!inventory.add_item_to_cart("sauce-labs-backpack").await);
    assert!(inventory.remove_item_from_cart("sauce-labs-backpack").await);
    inventory.go_to_cart().await.unwrap();
    assert_eq!(
        inventory.base().current_url().await.unwrap(),
        "https://www.saucedemo.com/cart.html"
    );
}

#[tokio::test]
async fn locked_out_user_sees_error() {
    let mut login = LoginPage::new(base(Storefront::default()), BASE_URL);
    login.goto().await.unwrap();
    login.login("locked_out_user", "secret_sauce").await.unwrap();
    assert!(!login.is_logged_in().await);
    assert!(login.has_error().await);
}

#[tokio::test]
async fn unknown_field_fails_after_retries() {
    let mut base = base(Storefront::default());
    let err = base.fill_field("#zip", "12345", 2).await.unwrap_err();
    assert!(matches!(err, E2eError::AssertionFailed(_)));
    assert_eq!(base.metrics().retry_attempts, 2);
}
