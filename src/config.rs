use serde::Deserialize;
use std::fmt;
use std::path::Path;

/// Top-level configuration parsed from TOML.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub provider: ProviderConfig,
}

/// Server-level configuration.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Origin allowed by CORS. `*` allows any origin.
    #[serde(default = "default_allowed_origin")]
    pub allowed_origin: String,
    /// Timeout for the outbound call to the provider's token endpoint (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8888
}

fn default_allowed_origin() -> String {
    "*".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

/// Identity provider registration.
///
/// `client_id` and `client_secret` may be empty at startup; requests that need
/// them are then rejected with a configuration error.
#[derive(Clone, Deserialize)]
pub struct ProviderConfig {
    pub authorize_url: String,
    pub token_url: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    /// Must match byte-for-byte the URI registered with the provider.
    pub redirect_uri: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Send `client_secret` on refresh grants (confidential-client refresh).
    #[serde(default)]
    pub refresh_requires_secret: bool,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("authorize_url", &self.authorize_url)
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .field("refresh_requires_secret", &self.refresh_requires_secret)
            .finish()
    }
}

impl ProviderConfig {
    pub fn has_client_id(&self) -> bool {
        !self.client_id.is_empty()
    }

    pub fn has_client_secret(&self) -> bool {
        !self.client_secret.is_empty()
    }
}

/// Load and validate config from a TOML file, applying environment variable overrides.
pub fn load_config(path: &Path) -> Result<Config, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

    parse_config(&content, |name| std::env::var(name).ok())
}

/// Parse TOML, apply overrides looked up through `env`, then validate.
pub fn parse_config(
    content: &str,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Config, String> {
    let mut config: Config =
        toml::from_str(content).map_err(|e| format!("Failed to parse TOML config: {e}"))?;

    apply_env_overrides(&mut config, env);
    validate(&config)?;

    Ok(config)
}

/// Apply environment variable overrides.
fn apply_env_overrides(config: &mut Config, env: impl Fn(&str) -> Option<String>) {
    if let Some(val) = env("PKCE_BROKER_CLIENT_ID") {
        config.provider.client_id = val;
    }
    if let Some(val) = env("PKCE_BROKER_CLIENT_SECRET") {
        config.provider.client_secret = val;
    }
    if let Some(val) = env("PKCE_BROKER_REDIRECT_URI") {
        config.provider.redirect_uri = val;
    }
}

/// Validate the entire configuration. Returns an error string on failure.
fn validate(config: &Config) -> Result<(), String> {
    validate_server(&config.server)?;
    validate_provider(&config.provider)?;
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), String> {
    if server.allowed_origin != "*" {
        let origin = url::Url::parse(&server.allowed_origin).map_err(|e| {
            format!(
                "server.allowed_origin '{}' is not a valid origin: {e}",
                server.allowed_origin
            )
        })?;
        // An origin is scheme://host[:port] with nothing after it.
        if origin.path() != "/" || server.allowed_origin.ends_with('/') {
            return Err(format!(
                "server.allowed_origin '{}' must be an origin without a path",
                server.allowed_origin
            ));
        }
    }

    if server.request_timeout_secs == 0 {
        return Err("server.request_timeout_secs must be greater than zero".to_string());
    }

    Ok(())
}

fn validate_provider(provider: &ProviderConfig) -> Result<(), String> {
    for (field, value) in [
        ("provider.authorize_url", &provider.authorize_url),
        ("provider.token_url", &provider.token_url),
        ("provider.redirect_uri", &provider.redirect_uri),
    ] {
        if value.is_empty() {
            return Err(format!("{field} is required"));
        }
        if !value.starts_with("http://") && !value.starts_with("https://") {
            return Err(format!("{field} must be a valid HTTP(S) URL"));
        }
    }

    if provider.token_url.starts_with("http://") {
        tracing::warn!(
            "provider.token_url uses http:// — client credentials will be sent in cleartext"
        );
    }

    let scope_regex = regex_lite::Regex::new(r"^[\x21\x23-\x5B\x5D-\x7E]+$")
        .map_err(|e| format!("internal scope pattern error: {e}"))?;
    for scope in &provider.scopes {
        // RFC 6749 §3.3 scope-token: printable ASCII except space, '"' and '\'
        if !scope_regex.is_match(scope) {
            return Err(format!(
                "provider.scopes entry '{scope}' is not a valid scope token"
            ));
        }
    }

    // Credentials are checked per request so that a missing secret becomes
    // a 500 on the affected endpoint rather than a startup failure.
    let missing: Vec<&str> = [
        ("client_id", provider.has_client_id()),
        ("client_secret", provider.has_client_secret()),
    ]
    .iter()
    .filter(|(_, present)| !present)
    .map(|(k, _)| *k)
    .collect();

    if !missing.is_empty() {
        tracing::warn!(
            missing = %missing.join(", "),
            "provider credentials missing; token requests will fail until configured"
        );
    }

    Ok(())
}
