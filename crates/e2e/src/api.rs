//! HTTP API clients

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::error::E2eResult;

/// Status code plus the parsed JSON body (`Null` when the body is not JSON)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status_code: u16,
    pub json_body: Value,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str) -> E2eResult<ApiResponse>;
    async fn post(&self, url: &str, body: &Value) -> E2eResult<ApiResponse>;
    async fn put(&self, url: &str, body: &Value) -> E2eResult<ApiResponse>;
    async fn delete(&self, url: &str) -> E2eResult<ApiResponse>;
}

/// [`HttpClient`] over reqwest
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new(timeout: Duration) -> E2eResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> E2eResult<ApiResponse> {
        let response = request.send().await?;
        let status_code = response.status().as_u16();
        let text = response.text().await?;
        let json_body = serde_json::from_str(&text).unwrap_or(Value::Null);
        debug!("HTTP {} ({} bytes)", status_code, text.len());
        Ok(ApiResponse { status_code, json_body })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> E2eResult<ApiResponse> {
        self.send(self.client.get(url)).await
    }

    async fn post(&self, url: &str, body: &Value) -> E2eResult<ApiResponse> {
        self.send(self.client.post(url).json(body)).await
    }

    async fn put(&self, url: &str, body: &Value) -> E2eResult<ApiResponse> {
        self.send(self.client.put(url).json(body)).await
    }

    async fn delete(&self, url: &str) -> E2eResult<ApiResponse> {
        self.send(self.client.delete(url)).await
    }
}

/// Client for the user REST endpoints
pub struct UserApiClient<H> {
    base_url: String,
    http: H,
}

impl<H: HttpClient> UserApiClient<H> {
    pub fn new(base_url: &str, http: H) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    pub async fn get_user(&self, user_id: &str) -> E2eResult<ApiResponse> {
        self.http.get(&format!("{}/users/{}", self.base_url, user_id)).await
    }

    pub async fn login(&self, username: &str, password: &str) -> E2eResult<ApiResponse> {
        self.http
            .post(
                &format!("{}/login", self.base_url),
                &json!({ "username": username, "password": password }),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingClient {
        requests: Mutex<Vec<(String, String, Option<Value>)>>,
    }

    impl RecordingClient {
        fn record(&self, method: &str, url: &str, body: Option<&Value>) -> ApiResponse {
            self.requests
                .lock()
                .push((method.to_string(), url.to_string(), body.cloned()));
            ApiResponse {
                status_code: if url.ends_with("/users/missing") { 404 } else { 200 },
                json_body: json!({ "ok": true }),
            }
        }
    }

    #[async_trait]
    impl HttpClient for RecordingClient {
        async fn get(&self, url: &str) -> E2eResult<ApiResponse> {
            Ok(self.record("GET", url, None))
        }
        async fn post(&self, url: &str, body: &Value) -> E2eResult<ApiResponse> {
            Ok(self.record("POST", url, Some(body)))
        }
        async fn put(&self, url: &str, body: &Value) -> E2eResult<ApiResponse> {
            Ok(self.record("PUT", url, Some(body)))
        }
        async fn delete(&self, url: &str) -> E2eResult<ApiResponse> {
            Ok(self.record("DELETE", url, None))
        }
    }

    #[tokio::test]
    async fn test_user_endpoints() {
        let client = UserApiClient::new("https://api.example.com/", RecordingClient::default());

        let found = client.get_user("42").await.unwrap();
        let missing = client.get_user("missing").await.unwrap();
        client.login("standard_user", "secret_sauce").await.unwrap();

        assert!(found.is_success());
        assert_eq!(missing.status_code, 404);

        let requests = client.http.requests.lock();
        assert_eq!(requests[0].1, "https://api.example.com/users/42");
        assert_eq!(requests[2].0, "POST");
        assert_eq!(requests[2].1, "https://api.example.com/login");
        assert_eq!(
            requests[2].2,
            Some(json!({ "username": "standard_user", "password": "secret_sauce" }))
        );
    }
}
