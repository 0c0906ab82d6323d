use serde::Deserialize;
use thiserror::Error;
use url::Url;

const DEFAULT_UPSTREAM_URL: &str = "https://api.github.com";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_TOKEN_EXPIRATION_SECS: u64 = 3600;
const MAX_TOKEN_EXPIRATION_SECS: u64 = 365 * 24 * 3600;
const DEFAULT_MAX_SEARCH_WINDOWS: u32 = 30;
const DEFAULT_MAX_ORGANIZATION_PAGES: u32 = 100;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Upstream URL cannot be used as a base: {0}")]
    InvalidUpstreamUrl(String),

    #[error("Upstream token is empty")]
    EmptyUpstreamToken,

    #[error("Upstream timeout cannot be 0")]
    InvalidTimeout,

    #[error("Login username is empty")]
    EmptyUsername,

    #[error("Login password is empty")]
    EmptyPassword,

    #[error("JWT signing key is empty")]
    EmptySigningKey,

    #[error("Token expiration must be between 1 second and one year")]
    InvalidExpiration,

    #[error("Accumulation limit `{0}` cannot be 0")]
    InvalidAccumulationLimit(&'static str),
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 8080,
        }
    }
}

fn default_admin_listener() -> Listener {
    Listener {
        host: "127.0.0.1".into(),
        port: 8081,
    }
}

fn default_upstream_url() -> Url {
    Url::parse(DEFAULT_UPSTREAM_URL).expect("default upstream URL is valid")
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_expiration_secs() -> u64 {
    DEFAULT_TOKEN_EXPIRATION_SECS
}

/// Source-hosting API the repositories are fetched from.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct UpstreamConfig {
    /// Base URL of the API, `https://api.github.com` unless overridden.
    #[serde(default = "default_upstream_url")]
    pub url: Url,
    /// Personal access token sent as a bearer credential on every call.
    pub token: String,
    /// Timeout applied to each upstream call, including reading the body.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// The single account allowed to log in.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct LoginConfig {
    pub username: String,
    pub password: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct JwtConfig {
    /// HMAC key used to sign and verify issued tokens
    pub signing_key: String,
    #[serde(default = "default_expiration_secs")]
    pub expiration_secs: u64,
}

/// Hard caps on the number of upstream calls made for one request.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct AccumulationConfig {
    /// Maximum number of date windows queried in search mode.
    pub max_search_windows: u32,
    /// Maximum number of listing pages fetched in organization mode.
    pub max_organization_pages: u32,
}

impl Default for AccumulationConfig {
    fn default() -> Self {
        AccumulationConfig {
            max_search_windows: DEFAULT_MAX_SEARCH_WINDOWS,
            max_organization_pages: DEFAULT_MAX_ORGANIZATION_PAGES,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub listener: Listener,
    #[serde(default = "default_admin_listener")]
    pub admin_listener: Listener,
    pub upstream: UpstreamConfig,
    pub login: LoginConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub accumulation: AccumulationConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;

        if self.upstream.url.cannot_be_a_base() {
            return Err(ValidationError::InvalidUpstreamUrl(
                self.upstream.url.to_string(),
            ));
        }
        if self.upstream.token.is_empty() {
            return Err(ValidationError::EmptyUpstreamToken);
        }
        if self.upstream.timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }

        if self.login.username.is_empty() {
            return Err(ValidationError::EmptyUsername);
        }
        if self.login.password.is_empty() {
            return Err(ValidationError::EmptyPassword);
        }

        if self.jwt.signing_key.is_empty() {
            return Err(ValidationError::EmptySigningKey);
        }
        if self.jwt.expiration_secs == 0 || self.jwt.expiration_secs > MAX_TOKEN_EXPIRATION_SECS {
            return Err(ValidationError::InvalidExpiration);
        }

        if self.accumulation.max_search_windows == 0 {
            return Err(ValidationError::InvalidAccumulationLimit(
                "max_search_windows",
            ));
        }
        if self.accumulation.max_organization_pages == 0 {
            return Err(ValidationError::InvalidAccumulationLimit(
                "max_organization_pages",
            ));
        }

        Ok(())
    }

    /// Replaces secrets with values from the environment, if present. The
    /// lookup is injected so callers decide where values come from. Returns
    /// the names of the variables that were applied.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Vec<&'static str>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut applied = Vec::new();
        let targets: [(&'static str, &mut String); 4] = [
            ("GATEWAY_UPSTREAM_TOKEN", &mut self.upstream.token),
            ("GATEWAY_LOGIN_USERNAME", &mut self.login.username),
            ("GATEWAY_LOGIN_PASSWORD", &mut self.login.password),
            ("GATEWAY_JWT_SIGNING_KEY", &mut self.jwt.signing_key),
        ];

        for (name, field) in targets {
            if let Some(value) = lookup(name) {
                *field = value;
                applied.push(name);
            }
        }

        applied
    }
}
