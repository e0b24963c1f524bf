//! Process-wide configuration loaded from the environment.
//!
//! Every field is read explicitly with its key and default. Loading happens
//! once at startup; any error here is fatal and the server never starts.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::AppId;

/// Environment key for the GitHub App ID.
pub const ENV_APP_ID: &str = "GH_APP_ID";
/// Environment key for the path to the App's PEM private key.
pub const ENV_PRIVATE_KEY_PATH: &str = "GH_PRIVATE_KEY_PATH";
/// Environment key for the webhook shared secret.
pub const ENV_WEBHOOK_SECRET: &str = "GH_WEBHOOK_SECRET";
/// Environment key for the listen port.
pub const ENV_PORT: &str = "PORT";
/// Environment key for a GitHub Enterprise API base URL.
pub const ENV_API_BASE_URL: &str = "GITHUB_API_BASE_URL";

/// Port used when `PORT` is not set.
pub const DEFAULT_PORT: u16 = 8080;

/// Errors that prevent the configuration from loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("required environment variable {key} is not set")]
    Missing { key: &'static str },

    /// The App ID is not a non-negative decimal integer.
    #[error("GH_APP_ID must be numeric, got {value:?}")]
    InvalidAppId {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    /// The port is not a valid TCP port number.
    #[error("PORT must be a port number, got {value:?}")]
    InvalidPort {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Immutable configuration shared by the whole process.
#[derive(Clone)]
pub struct Config {
    /// The GitHub App identity.
    pub app_id: AppId,

    /// Location of the PEM-encoded private key used to sign App JWTs.
    pub private_key_path: PathBuf,

    /// Shared secret for webhook signature verification.
    pub webhook_secret: Vec<u8>,

    /// TCP port to listen on.
    pub port: u16,

    /// GitHub Enterprise API base URL, if not talking to github.com.
    pub api_base_url: Option<String>,
}

impl Config {
    /// Loads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the configuration using `lookup` to resolve each key.
    ///
    /// Empty values are treated the same as unset ones.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing { key });

        let app_id_raw = require(ENV_APP_ID)?;
        let app_id = app_id_raw
            .parse::<AppId>()
            .map_err(|source| ConfigError::InvalidAppId {
                value: app_id_raw.clone(),
                source,
            })?;

        let private_key_path = PathBuf::from(require(ENV_PRIVATE_KEY_PATH)?);
        let webhook_secret = require(ENV_WEBHOOK_SECRET)?.into_bytes();

        let port = match get(ENV_PORT) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|source| ConfigError::InvalidPort { value: raw, source })?,
            None => DEFAULT_PORT,
        };

        let api_base_url = get(ENV_API_BASE_URL);

        Ok(Config {
            app_id,
            private_key_path,
            webhook_secret,
            port,
            api_base_url,
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("app_id", &self.app_id)
            .field("private_key_path", &self.private_key_path)
            .field("webhook_secret", &"<redacted>")
            .field("port", &self.port)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}
