//! Inventory page, shown after a successful login

use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use super::base::BasePage;
use crate::error::E2eResult;
use crate::browser::BrowserPage;

pub const INVENTORY_CONTAINER: &str = ".inventory_container";
pub const CART_BUTTON: &str = ".shopping_cart_link";

const VISIBILITY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct InventoryPage<P> {
    base: BasePage<P>,
    url: String,
}

impl<P: BrowserPage> InventoryPage<P> {
    pub fn new(base: BasePage<P>, base_url: &str) -> Self {
        Self {
            base,
            url: format!("{}/inventory.html", base_url.trim_end_matches('/')),
        }
    }

    pub fn base(&mut self) -> &mut BasePage<P> {
        &mut self.base
    }

    pub async fn goto(&mut self) -> E2eResult<()> {
        let url = self.url.clone();
        self.base.goto(&url).await
    }

    pub async fn is_loaded(&mut self) -> bool {
        self.base.is_element_visible(INVENTORY_CONTAINER, VISIBILITY_TIMEOUT).await
    }

    /// Item names use the store's slug form, e.g. `sauce-labs-backpack`
    pub async fn add_item_to_cart(&mut self, item: &str) -> bool {
        self.toggle_cart_item(&format!("[data-test='add-to-cart-{}']", item), item, "Added")
            .await
    }

    pub async fn remove_item_from_cart(&mut self, item: &str) -> bool {
        self.toggle_cart_item(&format!("[data-test='remove-{}']", item), item, "Removed")
            .await
    }

    async fn toggle_cart_item(&mut self, selector: &str, item: &str, verb: &str) -> bool {
        if !self.base.is_element_visible(selector, VISIBILITY_TIMEOUT).await {
            warn!("Cart button not found for {}", item);
            return false;
        }
        match self.base.click_button(selector, 1).await {
            Ok(()) => {
                info!("{} {} (cart)", verb, item);
                true
            }
            Err(e) => {
                warn!("Cart update failed for {}: {}", item, e);
                false
            }
        }
    }

    pub async fn go_to_cart(&mut self) -> E2eResult<()> {
        self.base.click_button(CART_BUTTON, 2).await
    }

    pub async fn take_inventory_screenshot(&mut self) -> E2eResult<PathBuf> {
        self.base.take_screenshot(None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages::fake::{Call, FakePage};

    fn inventory(page: FakePage) -> InventoryPage<FakePage> {
        InventoryPage::new(
            BasePage::new(page, false).with_retry_backoff(Duration::ZERO),
            "https://www.saucedemo.com/",
        )
    }

    #[tokio::test]
    async fn test_goto_and_loaded() {
        let page = FakePage::default().with_visible(&[INVENTORY_CONTAINER]);
        let calls = page.calls.clone();
        let mut inv = inventory(page);

        inv.goto().await.unwrap();
        assert!(inv.is_loaded().await);
        assert!(matches!(&calls.lock()[0], Call::Navigate(url, _) if url == "https://www.saucedemo.com/inventory.html"));
    }

    #[tokio::test]
    async fn test_cart_buttons() {
        let page = FakePage::default().with_visible(&["[data-test='add-to-cart-sauce-labs-backpack']"]);
        let calls = page.calls.clone();
        let mut inv = inventory(page);

        assert!(inv.add_item_to_cart("sauce-labs-backpack").await);
        assert!(!inv.remove_item_from_cart("sauce-labs-backpack").await);
        inv.go_to_cart().await.unwrap();

        let clicks: Vec<Call> = calls
            .lock()
            .iter()
            .filter(|c| matches!(c, Call::Click(_)))
            .cloned()
            .collect();
        assert_eq!(
            clicks,
            vec![
                Call::Click("[data-test='add-to-cart-sauce-labs-backpack']".into()),
                Call::Click(CART_BUTTON.into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_screenshot_is_full_page_outside_mass_mode() {
        let page = FakePage::default();
        let calls = page.calls.clone();
        let mut inv = inventory(page);

        let path = inv.take_inventory_screenshot().await.unwrap();
        assert!(path.starts_with("screenshots"));
        assert!(matches!(&calls.lock()[0], Call::Screenshot(_, true)));
    }
}
