//! Stateless token exchange against the provider's token endpoint.
//!
//! Each call validates its input, injects the client credentials and makes a
//! single form-encoded POST. Nothing is retained between calls, so one
//! instance serves any number of concurrent sessions.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use std::fmt;
use thiserror::Error;

use crate::config::ProviderConfig;

/// OAuth grant forwarded to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantKind {
    AuthorizationCode,
    RefreshToken,
}

impl GrantKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::RefreshToken => "refresh_token",
        }
    }

    fn failure_message(self) -> &'static str {
        match self {
            Self::AuthorizationCode => "Failed to exchange token",
            Self::RefreshToken => "Failed to refresh token",
        }
    }
}

impl fmt::Display for GrantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A grant request as received from the client. Credentials are added by
/// the service.
#[derive(Clone, PartialEq, Eq)]
pub enum ExchangeRequest {
    AuthorizationCodeGrant { code: String, code_verifier: String },
    RefreshGrant { refresh_token: String },
}

impl ExchangeRequest {
    pub fn kind(&self) -> GrantKind {
        match self {
            Self::AuthorizationCodeGrant { .. } => GrantKind::AuthorizationCode,
            Self::RefreshGrant { .. } => GrantKind::RefreshToken,
        }
    }
}

impl fmt::Debug for ExchangeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // code, verifier and refresh token are all bearer material
        f.debug_struct("ExchangeRequest")
            .field("grant_type", &self.kind().as_str())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Rejected locally; no network call was made.
    #[error("{0}")]
    InvalidRequest(String),

    /// Client credentials are not configured; no network call was made.
    #[error("{0}")]
    Configuration(String),

    /// The provider answered with a non-success status.
    #[error("provider rejected {grant} grant with status {status}")]
    Provider {
        grant: GrantKind,
        status: u16,
        details: Value,
    },

    /// The provider could not be reached or its response could not be read.
    #[error("{grant} request failed: {message}")]
    Network { grant: GrantKind, message: String },
}

impl IntoResponse for ExchangeError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            Self::Configuration(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": msg }))
            }
            Self::Provider {
                grant,
                status,
                details,
            } => {
                let code = if (400..500).contains(&status) {
                    StatusCode::BAD_REQUEST
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                (
                    code,
                    json!({ "error": grant.failure_message(), "details": details }),
                )
            }
            Self::Network { grant, message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": grant.failure_message(), "details": message }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

/// Forwards grants to the provider's token endpoint.
#[derive(Debug, Clone)]
pub struct TokenExchangeService {
    http: reqwest::Client,
    provider: ProviderConfig,
}

impl TokenExchangeService {
    pub fn new(http: reqwest::Client, provider: ProviderConfig) -> Self {
        Self { http, provider }
    }

    pub fn provider(&self) -> &ProviderConfig {
        &self.provider
    }

    /// Exchange an authorization code plus its PKCE verifier.
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<Value, ExchangeError> {
        self.execute(ExchangeRequest::AuthorizationCodeGrant {
            code: code.to_string(),
            code_verifier: code_verifier.to_string(),
        })
        .await
    }

    /// Obtain a new access token from a refresh token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<Value, ExchangeError> {
        self.execute(ExchangeRequest::RefreshGrant {
            refresh_token: refresh_token.to_string(),
        })
        .await
    }

    /// Validate, build the form body and forward it. Returns the provider's
    /// JSON response verbatim.
    pub async fn execute(&self, request: ExchangeRequest) -> Result<Value, ExchangeError> {
        let grant = request.kind();
        let params = self.form_params(request)?;

        tracing::debug!(grant = %grant, "forwarding grant to token endpoint");

        let response = self
            .http
            .post(&self.provider.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(grant = %grant, error = %e, "token endpoint unreachable");
                ExchangeError::Network {
                    grant,
                    message: e.without_url().to_string(),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let details = serde_json::from_str::<Value>(&body).unwrap_or(Value::String(body));
            let provider_error = details
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            tracing::warn!(
                grant = %grant,
                status = status.as_u16(),
                provider_error,
                "token endpoint rejected grant"
            );
            return Err(ExchangeError::Provider {
                grant,
                status: status.as_u16(),
                details,
            });
        }

        let payload = response.json::<Value>().await.map_err(|e| {
            tracing::error!(grant = %grant, error = %e, "token endpoint returned unreadable body");
            ExchangeError::Network {
                grant,
                message: format!("invalid token response: {}", e.without_url()),
            }
        })?;

        tracing::info!(grant = %grant, "token grant succeeded");
        Ok(payload)
    }

    fn form_params(
        &self,
        request: ExchangeRequest,
    ) -> Result<Vec<(&'static str, String)>, ExchangeError> {
        let grant = request.kind();
        match request {
            ExchangeRequest::AuthorizationCodeGrant {
                code,
                code_verifier,
            } => {
                if code.is_empty() || code_verifier.is_empty() {
                    return Err(ExchangeError::InvalidRequest(
                        "Missing code or code_verifier".to_string(),
                    ));
                }
                let (client_id, client_secret) = self.credentials(true)?;
                Ok(vec![
                    ("grant_type", grant.as_str().to_string()),
                    ("code", code),
                    ("redirect_uri", self.provider.redirect_uri.clone()),
                    ("client_id", client_id),
                    ("client_secret", client_secret.unwrap_or_default()),
                    ("code_verifier", code_verifier),
                ])
            }
            ExchangeRequest::RefreshGrant { refresh_token } => {
                if refresh_token.is_empty() {
                    return Err(ExchangeError::InvalidRequest(
                        "Missing refresh_token".to_string(),
                    ));
                }
                let (client_id, client_secret) =
                    self.credentials(self.provider.refresh_requires_secret)?;
                let mut params = vec![
                    ("grant_type", grant.as_str().to_string()),
                    ("refresh_token", refresh_token),
                    ("client_id", client_id),
                ];
                if let Some(secret) = client_secret {
                    params.push(("client_secret", secret));
                }
                Ok(params)
            }
        }
    }

    fn credentials(&self, with_secret: bool) -> Result<(String, Option<String>), ExchangeError> {
        let missing_id = !self.provider.has_client_id();
        let missing_secret = with_secret && !self.provider.has_client_secret();
        if missing_id || missing_secret {
            tracing::error!(
                missing_client_id = missing_id,
                missing_client_secret = missing_secret,
                "provider credentials not configured"
            );
            return Err(ExchangeError::Configuration(
                "Missing provider client credentials".to_string(),
            ));
        }
        let secret = with_secret.then(|| self.provider.client_secret.clone());
        Ok((self.provider.client_id.clone(), secret))
    }
}
