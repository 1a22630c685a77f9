//! Builds the provider authorization URL and records the attempt.

use super::session::Session;
use crate::config::ProviderConfig;
use crate::error::AuthError;
use crate::oauth::pkce::{self, CHALLENGE_METHOD};

/// Public (non-secret) client registration as seen by the browser side.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub authorize_url: String,
    pub client_id: String,
    /// Must be byte-for-byte the URI the broker uses at exchange time.
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    /// Base URL of the token exchange service, without trailing slash.
    pub broker_url: String,
}

impl ClientConfig {
    /// Derive the client view from the provider registration. The secret is
    /// never copied.
    pub fn for_provider(provider: &ProviderConfig, broker_url: &str) -> Self {
        Self {
            authorize_url: provider.authorize_url.clone(),
            client_id: provider.client_id.clone(),
            redirect_uri: provider.redirect_uri.clone(),
            scopes: provider.scopes.clone(),
            broker_url: broker_url.trim_end_matches('/').to_string(),
        }
    }
}

pub struct AuthorizationInitiator {
    config: ClientConfig,
}

impl AuthorizationInitiator {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Start a login round trip and return the URL to navigate to.
    ///
    /// Replaces any attempt already recorded in `session`; only one can be in
    /// flight per session.
    pub fn begin_login(&self, session: &Session) -> Result<String, AuthError> {
        let verifier = pkce::generate_verifier()?;
        session.attempts.put_verifier(&verifier);
        let challenge = pkce::derive_challenge(&verifier);

        let scope = self.config.scopes.join(" ");
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("code_challenge", challenge.as_str()),
            ("code_challenge_method", CHALLENGE_METHOD),
        ];

        let query_string = params
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let separator = if self.config.authorize_url.contains('?') { '&' } else { '?' };
        tracing::debug!(client_id = %self.config.client_id, "authorization attempt started");

        Ok(format!("{}{separator}{query_string}", self.config.authorize_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config() -> ClientConfig {
        ClientConfig {
            authorize_url: "https://accounts.example.com/authorize".to_string(),
            client_id: "client-123".to_string(),
            redirect_uri: "https://app.example.com/callback".to_string(),
            scopes: vec![
                "user-read-email".to_string(),
                "playlist-read-private".to_string(),
                "user-read-private".to_string(),
            ],
            broker_url: "https://broker.example.com".to_string(),
        }
    }

    fn query(url: &str) -> Vec<(String, String)> {
        url::Url::parse(url)
            .unwrap()
            .query_pairs()
            .into_owned()
            .collect()
    }

    #[test]
    fn test_begin_login_builds_authorization_url() {
        let session = Session::in_memory();
        let url = AuthorizationInitiator::new(config())
            .begin_login(&session)
            .unwrap();

        assert!(url.starts_with("https://accounts.example.com/authorize?"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fapp.example.com%2Fcallback"));

        let pairs = query(&url);
        let keys: Vec<&str> = pairs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            [
                "client_id",
                "redirect_uri",
                "response_type",
                "scope",
                "code_challenge",
                "code_challenge_method"
            ]
        );

        let params: HashMap<_, _> = pairs.into_iter().collect();
        assert_eq!(params["client_id"], "client-123");
        assert_eq!(params["redirect_uri"], "https://app.example.com/callback");
        assert_eq!(params["response_type"], "code");
        assert_eq!(
            params["scope"],
            "user-read-email playlist-read-private user-read-private"
        );
        assert_eq!(params["code_challenge_method"], "S256");

        let verifier = session.attempts.take_verifier().unwrap();
        assert_eq!(params["code_challenge"], pkce::derive_challenge(&verifier));
    }

    #[test]
    fn test_second_login_overwrites_attempt() {
        let session = Session::in_memory();
        let initiator = AuthorizationInitiator::new(config());

        let _first = initiator.begin_login(&session).unwrap();
        let second = initiator.begin_login(&session).unwrap();

        let verifier = session.attempts.take_verifier().unwrap();
        let params: HashMap<_, _> = query(&second).into_iter().collect();
        assert_eq!(params["code_challenge"], pkce::derive_challenge(&verifier));
        assert!(session.attempts.take_verifier().is_none());
    }

    #[test]
    fn test_for_provider_trims_broker_url() {
        let provider = ProviderConfig {
            authorize_url: "https://accounts.example.com/authorize".to_string(),
            token_url: "https://accounts.example.com/api/token".to_string(),
            client_id: "client-123".to_string(),
            client_secret: "s3cret".to_string(),
            redirect_uri: "https://app.example.com/callback".to_string(),
            scopes: vec!["a".to_string()],
            refresh_requires_secret: false,
        };
        let cfg = ClientConfig::for_provider(&provider, "https://broker.example.com/");
        assert_eq!(cfg.broker_url, "https://broker.example.com");
        assert_eq!(cfg.redirect_uri, provider.redirect_uri);
    }
}
