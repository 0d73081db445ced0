//! Ephemeral channel credential retrieval.
//!
//! The realtime channel authenticates with a short-lived client secret
//! issued by the assistant backend. The client fetches a fresh secret before
//! every connection attempt; issuing and expiring the secrets is entirely
//! the backend's business.

use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use serde_json::{Value, json};

use crate::config::Config;

/// Fetch a fresh client secret from the token endpoint.
pub async fn fetch_client_secret(config: &Config) -> Result<String> {
    let client = Client::new();

    log::debug!("Requesting client secret from {}", config.token_url);

    let body = json!({
        "uuid": config.client_id,
        "application": {
            "name": env!("APP_NAME"),
            "version": env!("APP_VERSION"),
        },
    });

    let response = client
        .post(config.token_url)
        .header("Device-Id", &config.device_id)
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await
        .with_context(|| format!("Token request to {} failed", config.token_url))?;

    if !response.status().is_success() {
        return Err(anyhow!("Token endpoint returned HTTP {}", response.status()));
    }

    let payload: Value = response
        .json()
        .await
        .context("Token endpoint returned invalid JSON")?;

    parse_client_secret(&payload)
        .ok_or_else(|| anyhow!("No client_secret in token endpoint response"))
}

/// The backend returns either `{"client_secret": {"value": "ek_..."}}` or the
/// flat `{"client_secret": "ek_..."}`; accept both.
fn parse_client_secret(payload: &Value) -> Option<String> {
    match payload.get("client_secret")? {
        Value::Object(obj) => obj.get("value")?.as_str().map(str::to_string),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}
