//! Client binding to the token exchange service.

use serde_json::{json, Value};
use std::future::Future;
use std::time::Duration;

use crate::error::AuthError;
use crate::oauth::TokenResponse;

/// Exchanges grants for tokens on the client's behalf.
///
/// Implemented by [`BrokerClient`] over HTTP; tests substitute their own.
pub trait TokenExchanger: Send + Sync {
    fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> impl Future<Output = Result<TokenResponse, AuthError>> + Send;

    fn refresh(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<TokenResponse, AuthError>> + Send;
}

#[derive(Debug, Clone)]
pub struct BrokerClient {
    http: reqwest::Client,
    base_url: String,
}

impl BrokerClient {
    pub fn new(base_url: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self::with_client(http, base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn post(&self, endpoint: &str, body: Value) -> Result<TokenResponse, AuthError> {
        let url = format!("{}/{endpoint}", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            return Err(broker_error(status.as_u16(), &body));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AuthError::Network(format!("invalid token response: {}", e.without_url())))
    }
}

/// Map a broker error body `{error, details}` onto the client taxonomy.
/// A 500 carrying an `error` but no `details` is the broker's own
/// configuration failure; anything else came from the provider.
fn broker_error(status: u16, body: &Value) -> AuthError {
    let reported = body.get("error").and_then(Value::as_str);
    if status == 500 && body.get("details").is_none() {
        if let Some(msg) = reported {
            return AuthError::Configuration(msg.to_string());
        }
    }
    let message = reported.unwrap_or("token exchange failed").to_string();
    let code = body
        .get("details")
        .and_then(|d| d.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| status.to_string());
    AuthError::Provider { code, message }
}

impl TokenExchanger for BrokerClient {
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse, AuthError> {
        self.post(
            "exchange_token",
            json!({ "code": code, "code_verifier": code_verifier }),
        )
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        self.post("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
    }
}
