//! # Configuration
//!
//! Server configuration is read from a TOML file (`quire.toml` by default)
//! and then overridden by environment variables.
//!
//! ## Environment Overrides
//!
//! - `QUIRE_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all
//! - `QUIRE_RATE_LIMIT`: Requests per second (0 disables rate limiting)
//! - `QUIRE_ADMIN_KEY`: Bearer key for the `/v2/admin` endpoints
//! - `QUIRE_JWE_SECRET` / `QUIRE_JWT_SECRET`: institution token secrets
//! - `QUIRE_SHARE_URL` / `QUIRE_SHARE_TOKEN`: external metadata index

use quire_core::{QuireError, Settings};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "quire.toml";

/// Maximum config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// Default rate limit: 100 requests per second.
pub const DEFAULT_RATE_LIMIT: u32 = 100;

// =============================================================================
// SECTIONS
// =============================================================================

/// `[server]`: listener address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// `[security]`: HTTP hardening.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// "*" or a comma-separated origin list. Unset means localhost only.
    pub cors_origins: Option<String>,
    /// Requests per second; 0 disables the limiter.
    pub rate_limit: u32,
    /// Key required by the admin endpoints. Unset leaves them open.
    pub admin_key: Option<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            cors_origins: None,
            rate_limit: DEFAULT_RATE_LIMIT,
            admin_key: None,
        }
    }
}

/// `[share]`: where metadata graphs are pushed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareConfig {
    /// Push endpoint. Unset means graphs are only logged.
    pub url: Option<String>,
    /// Bearer token sent with every push.
    pub token: Option<String>,
}

// =============================================================================
// CONFIG
// =============================================================================

/// Complete server configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub security: SecurityConfig,
    pub share: ShareConfig,
    pub platform: Settings,
}

impl Config {
    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, QuireError> {
        toml::from_str(text)
            .map_err(|e| QuireError::SerializationError(format!("Invalid config: {}", e)))
    }

    /// Load configuration and apply environment overrides.
    ///
    /// An explicit `path` must exist. Without one, `quire.toml` in the
    /// working directory is used when present and defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, QuireError> {
        let mut config = match path {
            Some(path) => Self::read(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    Self::read(default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self, QuireError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            QuireError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(QuireError::SerializationError(format!(
                "Config file size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| QuireError::IoError(format!("Read config: {}", e)))?;
        tracing::info!("Loaded configuration from {}", path.display());
        Self::from_toml(&text)
    }

    /// Apply `QUIRE_*` overrides from `lookup`. Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(origins) = var("QUIRE_CORS_ORIGINS") {
            self.security.cors_origins = Some(origins);
        }
        if let Some(limit) = var("QUIRE_RATE_LIMIT") {
            match limit.parse() {
                Ok(limit) => self.security.rate_limit = limit,
                Err(_) => tracing::warn!("Ignoring invalid QUIRE_RATE_LIMIT '{}'", limit),
            }
        }
        if let Some(key) = var("QUIRE_ADMIN_KEY") {
            self.security.admin_key = Some(key);
        }
        if let Some(secret) = var("QUIRE_JWE_SECRET") {
            self.platform.jwe_secret = secret;
        }
        if let Some(secret) = var("QUIRE_JWT_SECRET") {
            self.platform.jwt_secret = secret;
        }
        if let Some(url) = var("QUIRE_SHARE_URL") {
            self.share.url = Some(url);
        }
        if let Some(token) = var("QUIRE_SHARE_TOKEN") {
            self.share.token = Some(token);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
