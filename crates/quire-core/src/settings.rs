//! # Platform Settings
//!
//! Values the core needs at runtime. The binary fills these from its
//! configuration file and environment.

use crate::primitives::{DEFAULT_CAMPAIGN_REFRESH_SECS, DEFAULT_DOMAIN};
use serde::{Deserialize, Serialize};

/// Runtime settings of a [`crate::Platform`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Public base URL; canonical preprint and profile URLs hang off it.
    pub domain: String,
    /// Secret the institution token encryption key is derived from.
    pub jwe_secret: String,
    /// HMAC secret of the signed inner institution token.
    pub jwt_secret: String,
    /// Seconds before the campaign table is rebuilt.
    pub campaign_refresh_secs: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            domain: DEFAULT_DOMAIN.to_string(),
            jwe_secret: "osf_api_cas_login_jwe_secret_32b".to_string(),
            jwt_secret: "osf_api_cas_login_jwt_secret_32b".to_string(),
            campaign_refresh_secs: DEFAULT_CAMPAIGN_REFRESH_SECS,
        }
    }
}

impl Settings {
    /// Join a relative path onto the domain with exactly one slash.
    #[must_use]
    pub fn absolute_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.domain.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
