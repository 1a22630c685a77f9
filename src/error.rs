//! Client-side error taxonomy for the login and token lifecycle.

use thiserror::Error;

/// Generic message shown for any failed exchange. Provider and network
/// failures are deliberately indistinguishable to the user.
pub const EXCHANGE_FAILED_MESSAGE: &str = "Authentication failed. Please try logging in again.";

/// Errors surfaced by the PKCE generator, the callback state machine and the
/// token-consuming clients.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The operating-system random source could not be read. Login cannot start.
    #[error("secure random source unavailable: {0}")]
    EntropyUnavailable(String),

    /// The callback URL carried no authorization code.
    #[error("no authorization code found in callback URL")]
    MissingCode,

    /// No code verifier was stored for this session (never set or already consumed).
    #[error("no code verifier stored for this session")]
    MissingVerifier,

    /// The identity provider (or the broker relaying it) rejected the grant.
    #[error("provider error {code}: {message}")]
    Provider { code: String, message: String },

    /// The broker reported missing or invalid credentials configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The broker could not be reached.
    #[error("network error: {0}")]
    Network(String),

    /// No token set is stored for this session.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The stored access token is past its expiry; refresh or log in again.
    #[error("access token expired")]
    TokenExpired,

    /// A protected resource answered 401. The session has been cleared.
    #[error("session expired, login required")]
    SessionExpired,

    /// A protected resource answered with an unexpected status.
    #[error("resource request failed with status {status}")]
    Resource { status: u16 },
}

impl AuthError {
    /// Message suitable for showing to the end user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Provider { .. } | Self::Network(_) => EXCHANGE_FAILED_MESSAGE.to_string(),
            Self::MissingCode => "No authorization code found in URL".to_string(),
            Self::NotAuthenticated | Self::SessionExpired | Self::MissingVerifier => {
                "Please log in again.".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Whether the appropriate reaction is to restart the login flow.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            Self::MissingVerifier
                | Self::NotAuthenticated
                | Self::SessionExpired
                | Self::Provider { .. }
                | Self::Network(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_and_network_share_user_message() {
        let provider = AuthError::Provider {
            code: "invalid_grant".to_string(),
            message: "Failed to exchange token".to_string(),
        };
        let network = AuthError::Network("connection refused".to_string());
        assert_eq!(provider.user_message(), network.user_message());
        assert_eq!(provider.user_message(), EXCHANGE_FAILED_MESSAGE);
    }

    #[test]
    fn test_requires_login() {
        assert!(AuthError::SessionExpired.requires_login());
        assert!(AuthError::MissingVerifier.requires_login());
        assert!(!AuthError::MissingCode.requires_login());
        assert!(!AuthError::TokenExpired.requires_login());
        assert!(!AuthError::EntropyUnavailable("no rng".to_string()).requires_login());
    }
}
