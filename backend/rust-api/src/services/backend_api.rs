use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

const REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the separately-owned backend API.
#[derive(Clone)]
pub struct BackendApiClient {
    client: Client,
    base_url: String,
}

impl BackendApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Asks the backend to recompute the learner's path, forwarding their token.
    pub async fn refresh_learning_path(&self, bearer_token: &str) -> Result<Value> {
        let url = format!("{}/v1/learning-paths/user/refresh", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(bearer_token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .timeout(REFRESH_TIMEOUT)
            .send()
            .await
            .context("Failed to call backend learning-path refresh")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!(
                "Backend refresh returned error {}: {}",
                status,
                error_text
            ));
        }

        response
            .json()
            .await
            .context("Failed to parse backend refresh response")
    }
}

/// Body returned when the backend could not be reached or refused the refresh.
pub fn refresh_initiated() -> Value {
    json!({
        "success": true,
        "message": "Learning path refresh initiated",
    })
}
