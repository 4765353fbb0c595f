//! Service configuration.
//!
//! Settings are layered: `config/default.toml`, then `config/local.toml`,
//! then environment variables prefixed with `TEAMDUES`, using `__` between
//! path segments:
//!
//! ```text
//! TEAMDUES__DATABASE__URL=postgres://localhost/teamdues
//! TEAMDUES__STRIPE__SECRET_KEY=sk_test_...
//! TEAMDUES__STRIPE__WEBHOOK_SECRET=whsec_...
//! ```

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),
    #[error("Missing required setting: {0}")]
    Missing(&'static str),
    #[error("Invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub stripe: StripeSettings,
    #[serde(default)]
    pub push: PushSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Worker threads; actix picks one per core when unset.
    pub workers: Option<usize>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_seconds: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            acquire_timeout_seconds: default_acquire_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthSettings {
    /// Shared HS256 secret of the identity provider.
    #[serde(default)]
    pub jwt_secret: String,
    /// Expected `aud` claim, if the provider sets one.
    pub audience: Option<String>,
    /// Bearer token for internal callers of the push endpoint.
    #[serde(default)]
    pub service_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSettings {
    #[serde(default)]
    pub secret_key: String,
    #[serde(default)]
    pub webhook_secret: String,
    #[serde(default = "default_stripe_api_base")]
    pub api_base: String,
    #[serde(default = "default_stripe_api_version")]
    pub api_version: Option<String>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_webhook_tolerance")]
    pub webhook_tolerance_seconds: i64,
    #[serde(default = "default_stripe_timeout")]
    pub timeout_seconds: u64,
}

impl Default for StripeSettings {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            webhook_secret: String::new(),
            api_base: default_stripe_api_base(),
            api_version: default_stripe_api_version(),
            currency: default_currency(),
            webhook_tolerance_seconds: default_webhook_tolerance(),
            timeout_seconds: default_stripe_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushSettings {
    /// How long the push service may hold an undelivered message.
    #[serde(default = "default_push_ttl")]
    pub ttl_seconds: u32,
    #[serde(default = "default_push_icon")]
    pub icon: String,
    #[serde(default = "default_push_timeout")]
    pub timeout_seconds: u64,
}

impl Default for PushSettings {
    fn default() -> Self {
        Self {
            ttl_seconds: default_push_ttl(),
            icon: default_push_icon(),
            timeout_seconds: default_push_timeout(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout() -> u64 {
    5
}

fn default_stripe_api_base() -> String {
    "https://api.stripe.com".to_string()
}

fn default_stripe_api_version() -> Option<String> {
    Some("2023-10-16".to_string())
}

fn default_currency() -> String {
    "usd".to_string()
}

fn default_webhook_tolerance() -> i64 {
    300
}

fn default_stripe_timeout() -> u64 {
    30
}

fn default_push_ttl() -> u32 {
    86_400
}

fn default_push_icon() -> String {
    "/icon-192.png".to_string()
}

fn default_push_timeout() -> u64 {
    10
}

impl Settings {
    /// Load settings from the config files and environment, then validate.
    pub fn load() -> Result<Self, ConfigError> {
        let raw = ::config::Config::builder()
            .add_source(::config::File::with_name("config/default").required(false))
            .add_source(::config::File::with_name("config/local").required(false))
            .add_source(
                ::config::Environment::with_prefix("TEAMDUES")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let settings: Settings = raw.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.is_empty() {
            return Err(ConfigError::Missing("database.url"));
        }
        if self.auth.jwt_secret.is_empty() {
            return Err(ConfigError::Missing("auth.jwt_secret"));
        }
        if self.auth.service_token.is_empty() {
            return Err(ConfigError::Missing("auth.service_token"));
        }
        if self.stripe.secret_key.is_empty() {
            return Err(ConfigError::Missing("stripe.secret_key"));
        }
        if self.stripe.webhook_secret.is_empty() {
            return Err(ConfigError::Missing("stripe.webhook_secret"));
        }
        if self.stripe.webhook_tolerance_seconds <= 0 {
            return Err(ConfigError::Invalid {
                key: "stripe.webhook_tolerance_seconds",
                reason: "must be positive".to_string(),
            });
        }
        if self.stripe.currency.len() != 3 {
            return Err(ConfigError::Invalid {
                key: "stripe.currency",
                reason: format!("'{}' is not an ISO currency code", self.stripe.currency),
            });
        }
        Ok(())
    }
}
