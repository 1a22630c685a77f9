//! Calls to the protected API with the session's bearer token.

use serde_json::Value;
use std::time::Duration;

use super::broker::TokenExchanger;
use super::session::Session;
use crate::error::AuthError;
use crate::oauth::token::now_secs;
use crate::oauth::TokenSet;

/// Consumer of the token store. A 401 from the resource clears the session;
/// refreshing is explicit via [`AuthorizedClient::refresh`].
pub struct AuthorizedClient<X> {
    http: reqwest::Client,
    session: Session,
    exchanger: X,
}

impl<X: TokenExchanger> AuthorizedClient<X> {
    pub fn new(session: Session, exchanger: X) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self::with_client(http, session, exchanger)
    }

    pub fn with_client(http: reqwest::Client, session: Session, exchanger: X) -> Self {
        Self {
            http,
            session,
            exchanger,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// GET a JSON resource.
    ///
    /// An expired token is reported without touching the store so the caller
    /// can choose to refresh.
    pub async fn get_json(&self, url: &str) -> Result<Value, AuthError> {
        let tokens = self.session.tokens.get().ok_or(AuthError::NotAuthenticated)?;
        if tokens.is_expired_at(now_secs()) {
            return Err(AuthError::TokenExpired);
        }

        let response = self
            .http
            .get(url)
            .bearer_auth(&tokens.access_token)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.without_url().to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            tracing::info!("resource rejected access token; clearing session");
            self.session.tokens.clear();
            return Err(AuthError::SessionExpired);
        }
        if !status.is_success() {
            return Err(AuthError::Resource {
                status: status.as_u16(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::Network(e.without_url().to_string()))
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// On success the store holds the merged set (prior refresh token kept
    /// when the provider does not rotate it). On failure the store is cleared.
    pub async fn refresh(&self) -> Result<TokenSet, AuthError> {
        let current = self.session.tokens.get().ok_or(AuthError::NotAuthenticated)?;
        let Some(refresh_token) = current.refresh_token.as_deref() else {
            self.session.tokens.clear();
            return Err(AuthError::NotAuthenticated);
        };

        match self.exchanger.refresh(refresh_token).await {
            Ok(response) => {
                let next = current.refreshed(response, now_secs());
                self.session.tokens.set(&next);
                tracing::info!("access token refreshed");
                Ok(next)
            }
            Err(error) => {
                tracing::warn!(error = %error, "token refresh failed; clearing session");
                self.session.tokens.clear();
                Err(error)
            }
        }
    }
}
