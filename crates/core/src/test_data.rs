//! Generated test data for suites
//!
//! Per-test data is memoized through an injected [`TtlCache`]; suite-wide data
//! sets are written under `<data_dir>/dynamic/`.

use chrono::Local;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

use crate::cache::TtlCache;
use crate::suite::write_json_atomic;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    pub username: String,
    pub password: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub role: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductData {
    pub name: String,
    pub price: f64,
    pub category: String,
    pub description: String,
    pub sku: String,
    pub stock: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: String,
    pub quantity: u32,
    #[serde(default)]
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderData {
    pub order_id: String,
    pub user_id: String,
    pub products: Vec<OrderLine>,
    pub total_amount: f64,
    pub status: String,
    pub created_at: String,
}

/// Kinds of per-test data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    User,
    Product,
    Order,
}

impl DataKind {
    fn as_str(&self) -> &'static str {
        match self {
            DataKind::User => "user",
            DataKind::Product => "product",
            DataKind::Order => "order",
        }
    }
}

/// Built-in accounts for the system under test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserKind {
    Standard,
    Locked,
    Problem,
    Random,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteData {
    pub suite_name: String,
    pub created_at: String,
    pub users: Vec<UserData>,
    pub products: Vec<ProductData>,
    pub orders: Vec<OrderData>,
}

#[derive(Clone)]
pub struct TestDataGenerator {
    data_dir: PathBuf,
    cache: TtlCache<String, serde_json::Value>,
}

impl TestDataGenerator {
    pub fn new(data_dir: impl Into<PathBuf>, cache: TtlCache<String, serde_json::Value>) -> Self {
        Self {
            data_dir: data_dir.into(),
            cache,
        }
    }

    pub fn dynamic_dir(&self) -> PathBuf {
        self.data_dir.join("dynamic")
    }

    pub fn user(&self, kind: UserKind) -> UserData {
        let fixed = |username: &str, email: &str, first: &str, phone: &str| UserData {
            username: username.to_string(),
            password: "secret_sauce".to_string(),
            email: email.to_string(),
            first_name: first.to_string(),
            last_name: "User".to_string(),
            phone: phone.to_string(),
            role: "user".to_string(),
            is_active: true,
        };

        match kind {
            UserKind::Standard => fixed("standard_user", "standard@test.com", "Standard", "0123456789"),
            UserKind::Locked => fixed("locked_out_user", "locked@test.com", "Locked", "0123456788"),
            UserKind::Problem => fixed("problem_user", "problem@test.com", "Problem", "0123456787"),
            UserKind::Random => self.random_user(),
        }
    }

    fn random_user(&self) -> UserData {
        let mut rng = rand::thread_rng();
        let username = format!("testuser_{}", random_string(6));
        UserData {
            email: format!("{}@test.com", username),
            username,
            password: "Test@123".to_string(),
            first_name: format!("Test{}", random_string(4)),
            last_name: format!("User{}", random_string(4)),
            phone: format!("0{}", rng.gen_range(100_000_000..=999_999_999)),
            role: "user".to_string(),
            is_active: true,
        }
    }

    pub fn product(&self) -> ProductData {
        const CATEGORIES: [&str; 5] = ["electronics", "clothing", "books", "food", "sports"];
        let mut rng = rand::thread_rng();
        ProductData {
            name: format!("Product_{}", random_string(6)),
            price: (rng.gen_range(10.0..1000.0_f64) * 100.0).round() / 100.0,
            category: CATEGORIES[rng.gen_range(0..CATEGORIES.len())].to_string(),
            description: format!("Test product description {}", random_string(10)),
            sku: format!("SKU_{}", random_string(8)),
            stock: rng.gen_range(0..=1000),
        }
    }

    pub fn order(&self, user_id: Option<&str>, products: Option<Vec<OrderLine>>) -> OrderData {
        let mut rng = rand::thread_rng();
        let products = products.unwrap_or_else(|| {
            (0..rng.gen_range(1..=3))
                .map(|i| OrderLine {
                    product_id: format!("prod_{}", i),
                    quantity: rng.gen_range(1..=5),
                    price: 0.0,
                })
                .collect()
        });
        let total_amount = products.iter().map(|p| p.price * p.quantity as f64).sum();

        OrderData {
            order_id: format!("ORD_{}", random_string(8)),
            user_id: user_id
                .map(str::to_string)
                .unwrap_or_else(|| format!("user_{}", random_string(6))),
            products,
            total_amount,
            status: "pending".to_string(),
            created_at: Local::now().to_rfc3339(),
        }
    }

    /// Stable data for one test, memoized under `<test>_<kind>`
    pub fn data_for_test(&self, test_name: &str, kind: DataKind) -> serde_json::Value {
        let key = format!("{}_{}", test_name, kind.as_str());
        self.cache.get_or_insert_with(key, || {
            let value = match kind {
                DataKind::User => serde_json::to_value(self.random_user()),
                DataKind::Product => serde_json::to_value(self.product()),
                DataKind::Order => serde_json::to_value(self.order(None, None)),
            };
            value.unwrap_or(serde_json::Value::Null)
        })
    }

    /// Generate a data set sized to the suite and write it to `dynamic/`
    pub fn create_suite_data(&self, suite_name: &str, test_count: usize) -> Result<(SuiteData, PathBuf)> {
        let data = SuiteData {
            suite_name: suite_name.to_string(),
            created_at: Local::now().to_rfc3339(),
            users: (0..(test_count / 10).min(50)).map(|_| self.random_user()).collect(),
            products: (0..(test_count / 20).min(100)).map(|_| self.product()).collect(),
            orders: (0..(test_count / 5).min(200)).map(|_| self.order(None, None)).collect(),
        };

        let path = self.dynamic_dir().join(format!(
            "suite_{}_{}.json",
            suite_name,
            Local::now().format("%Y%m%d_%H%M%S")
        ));
        write_json_atomic(&path, &data)?;
        info!(
            "Generated test data for {}: {} users, {} products, {} orders",
            suite_name,
            data.users.len(),
            data.products.len(),
            data.orders.len()
        );
        Ok((data, path))
    }

    /// Remove `cache_*` and `suite_*` files older than `older_than`
    pub fn cleanup(&self, older_than: Duration) -> usize {
        let dir = self.dynamic_dir();
        let cutoff = SystemTime::now()
            .checked_sub(older_than)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => return 0,
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if !is_generated(&path) {
                continue;
            }
            let stale = entry
                .metadata()
                .and_then(|m| m.modified())
                .map(|t| t < cutoff)
                .unwrap_or(false);
            if !stale {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    info!("Cleaned up old test data: {}", path.display());
                    removed += 1;
                }
                Err(e) => warn!("Error cleaning up {}: {}", path.display(), e),
            }
        }
        removed
    }
}

fn is_generated(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with("cache_") || n.starts_with("suite_"))
        .unwrap_or(false)
}

fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
