//! Webhook gate configuration.
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then `WEBHOOK_*` environment variables. The signing secret is read from
//! `CONTENTFUL_SIGNING_SECRET` and is mandatory; a gate without a secret
//! refuses to start.

use crate::signing::SigningSecret;
use config::{Config, Environment, File, Map};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Environment variable holding the shared signing secret
pub const SECRET_ENV_VAR: &str = "CONTENTFUL_SIGNING_SECRET";

/// Prefix for environment overrides (`WEBHOOK_PORT`, `WEBHOOK_BIND_ADDRESS`, ...)
pub const ENV_PREFIX: &str = "WEBHOOK";

/// Default listening port
pub const DEFAULT_PORT: u16 = 8080;

/// Default bind address
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";

/// Default upper bound on a buffered request body (2 MiB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Errors that can occur when loading the gate configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// The configuration file path is invalid.
    #[error("invalid configuration path: {0}")]
    InvalidPath(String),

    /// The configuration could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] config::ConfigError),

    /// No signing secret was configured, or it was empty.
    #[error("signing secret is not set; export CONTENTFUL_SIGNING_SECRET")]
    MissingSecret,
}

/// Configuration as it appears in files and environment variables.
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_bind_address")]
    bind_address: String,
    #[serde(default)]
    signing_secret: Option<String>,
    #[serde(default)]
    max_age_seconds: Option<u64>,
    #[serde(default = "default_max_body_bytes")]
    max_body_bytes: usize,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_bind_address() -> String {
    DEFAULT_BIND_ADDRESS.to_string()
}

fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Webhook gate configuration
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Port to listen on
    pub port: u16,
    /// Address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub bind_address: String,
    /// Shared secret for verifying request signatures
    pub signing_secret: SigningSecret,
    /// Maximum accepted age of the signed timestamp; `None` disables the check
    pub max_age_seconds: Option<u64>,
    /// Largest request body that will be buffered for verification
    pub max_body_bytes: usize,
}

impl WebhookConfig {
    /// Create a configuration with default network settings and the given secret
    pub fn new(signing_secret: impl Into<SigningSecret>) -> Self {
        Self {
            port: DEFAULT_PORT,
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            signing_secret: signing_secret.into(),
            max_age_seconds: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the bind address
    pub fn with_bind_address(mut self, address: impl Into<String>) -> Self {
        self.bind_address = address.into();
        self
    }

    /// Enable the replay window
    pub fn with_max_age_seconds(mut self, seconds: u64) -> Self {
        self.max_age_seconds = Some(seconds);
        self
    }

    /// Set the body size limit
    pub fn with_max_body_bytes(mut self, bytes: usize) -> Self {
        self.max_body_bytes = bytes;
        self
    }

    /// Get the full bind address (ip:port)
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Load configuration from an optional TOML file, `WEBHOOK_*` environment
    /// variables and `CONTENTFUL_SIGNING_SECRET`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration file does not exist or cannot be parsed
    /// - No non-empty signing secret is available
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_secret(path, std::env::var(SECRET_ENV_VAR).ok())
    }

    /// Like [`WebhookConfig::load`], with the secret supplied by the caller
    /// instead of read from the process environment.
    ///
    /// A non-empty `env_secret` takes precedence over a `signing_secret` key
    /// in the file.
    pub fn load_with_secret(
        path: Option<&Path>,
        env_secret: Option<String>,
    ) -> Result<Self, ConfigError> {
        Self::load_from_sources(path, env_secret, std::env::vars())
    }

    fn load_from_sources(
        path: Option<&Path>,
        env_secret: Option<String>,
        env_vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            let path_str = path
                .to_str()
                .ok_or_else(|| ConfigError::InvalidPath(format!("{:?}", path)))?;

            if !path.exists() {
                return Err(ConfigError::FileNotFound(path_str.to_string()));
            }

            builder = builder.add_source(File::with_name(path_str));
        }

        // The secret only comes from the file or CONTENTFUL_SIGNING_SECRET
        let secret_key = format!("{}_SIGNING_SECRET", ENV_PREFIX);
        let env_overrides: Map<String, String> = env_vars
            .into_iter()
            .filter(|(key, _)| !key.eq_ignore_ascii_case(&secret_key))
            .collect();

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .source(Some(env_overrides)),
            )
            .build()?;
        let raw: RawConfig = config.try_deserialize()?;

        let signing_secret = env_secret
            .map(SigningSecret::from)
            .filter(|s| !s.is_empty())
            .or_else(|| {
                raw.signing_secret
                    .map(SigningSecret::from)
                    .filter(|s| !s.is_empty())
            })
            .ok_or(ConfigError::MissingSecret)?;

        Ok(Self {
            port: raw.port,
            bind_address: raw.bind_address,
            signing_secret,
            max_age_seconds: raw.max_age_seconds,
            max_body_bytes: raw.max_body_bytes,
        })
    }
}
