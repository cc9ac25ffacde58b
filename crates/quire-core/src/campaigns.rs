//! # Campaigns
//!
//! A campaign is a sign-up channel: it decides which system tag new users
//! receive, which confirmation mail they get, how they log in and where
//! they land afterwards. The table is derived from the registered
//! providers and cached by [`CampaignCache`].
//!
//! ## Refresh
//!
//! - An empty cache is built synchronously by the caller.
//! - Once the table is older than [`RefreshPolicy::threshold`], exactly one
//!   caller rebuilds it while every concurrent caller keeps reading the
//!   stale snapshot.

use crate::clock::Clock;
use crate::mail::MailTemplate;
use crate::model::{Provider, User};
use crate::primitives::{DEFAULT_CAMPAIGN_REFRESH_SECS, NATIVE_PROVIDER_ID, NATIVE_PROVIDER_NAME};
use crate::types::QuireError;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

// =============================================================================
// CAMPAIGN TABLE
// =============================================================================

/// How users of a campaign authenticate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginType {
    Native,
    Institution,
    Proxy,
}

/// The service a proxy campaign signs users up for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceProvider {
    pub name: String,
    pub logo_path: String,
    pub external_url: Option<String>,
}

/// One campaign entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Campaign {
    pub name: String,
    pub system_tag: String,
    pub redirect_url: String,
    pub confirmation_email_template: Option<MailTemplate>,
    pub login_type: LoginType,
    pub provider: Option<ServiceProvider>,
}

/// Immutable campaign snapshot, keyed by campaign name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CampaignTable {
    campaigns: BTreeMap<String, Campaign>,
}

fn join(domain: &str, path: &str) -> String {
    format!("{}/{}", domain.trim_end_matches('/'), path)
}

impl CampaignTable {
    /// Build the table for `domain` and the registered providers.
    #[must_use]
    pub fn build(domain: &str, providers: &[Provider]) -> Self {
        let mut campaigns = BTreeMap::new();
        let mut insert = |campaign: Campaign| {
            campaigns.insert(campaign.name.clone(), campaign);
        };

        insert(Campaign {
            name: "prereg".to_string(),
            system_tag: "prereg_challenge_campaign".to_string(),
            redirect_url: join(domain, "prereg/"),
            confirmation_email_template: Some(MailTemplate::ConfirmPrereg),
            login_type: LoginType::Native,
            provider: None,
        });
        insert(Campaign {
            name: "erpc".to_string(),
            system_tag: "erp_challenge_campaign".to_string(),
            redirect_url: join(domain, "erpc/"),
            confirmation_email_template: Some(MailTemplate::ConfirmErpc),
            login_type: LoginType::Native,
            provider: None,
        });

        for provider in providers {
            let id = provider.id.as_str();
            let (name, url_path, external_url) = if id == NATIVE_PROVIDER_ID {
                (NATIVE_PROVIDER_NAME.to_string(), "preprints/".to_string(), None)
            } else {
                let external = (!provider.external_url.is_empty())
                    .then(|| provider.external_url.clone());
                (provider.name.clone(), format!("preprints/{}", id), external)
            };
            insert(Campaign {
                name: format!("{}-preprints", id),
                system_tag: format!("{}_preprints", id),
                redirect_url: join(domain, &url_path),
                confirmation_email_template: Some(MailTemplate::ConfirmPreprints {
                    provider: id.to_string(),
                    name: name.clone(),
                }),
                login_type: LoginType::Proxy,
                provider: Some(ServiceProvider {
                    name,
                    logo_path: provider.logo_path.clone(),
                    external_url,
                }),
            });
        }

        insert(Campaign {
            name: "institution".to_string(),
            system_tag: "institution_campaign".to_string(),
            redirect_url: String::new(),
            confirmation_email_template: None,
            login_type: LoginType::Institution,
            provider: None,
        });

        Self { campaigns }
    }

    #[must_use]
    pub fn get(&self, campaign: &str) -> Option<&Campaign> {
        self.campaigns.get(campaign)
    }

    /// Campaign names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.campaigns.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.campaigns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.campaigns.is_empty()
    }

    #[must_use]
    pub fn system_tag_for(&self, campaign: &str) -> Option<&str> {
        self.get(campaign).map(|c| c.system_tag.as_str())
    }

    #[must_use]
    pub fn email_template_for(&self, campaign: &str) -> Option<&MailTemplate> {
        self.get(campaign)
            .and_then(|c| c.confirmation_email_template.as_ref())
    }

    /// The campaign whose system tag the user carries, if any.
    #[must_use]
    pub fn campaign_for_user(&self, user: &User) -> Option<&str> {
        self.campaigns
            .values()
            .find(|c| user.system_tags.contains(&c.system_tag))
            .map(|c| c.name.as_str())
    }

    fn login_is(&self, campaign: &str, login_type: LoginType) -> Option<bool> {
        self.get(campaign).map(|c| c.login_type == login_type)
    }

    /// `None` when the campaign is unknown.
    #[must_use]
    pub fn is_institution_login(&self, campaign: &str) -> Option<bool> {
        self.login_is(campaign, LoginType::Institution)
    }

    /// `None` when the campaign is unknown.
    #[must_use]
    pub fn is_native_login(&self, campaign: &str) -> Option<bool> {
        self.login_is(campaign, LoginType::Native)
    }

    /// `None` when the campaign is unknown.
    #[must_use]
    pub fn is_proxy_login(&self, campaign: &str) -> Option<bool> {
        self.login_is(campaign, LoginType::Proxy)
    }

    /// The service behind a proxy campaign.
    #[must_use]
    pub fn service_provider(&self, campaign: &str) -> Option<&ServiceProvider> {
        self.get(campaign)
            .filter(|c| c.login_type == LoginType::Proxy)
            .and_then(|c| c.provider.as_ref())
    }

    /// Where users land after signing up through `campaign`.
    #[must_use]
    pub fn url_for(&self, campaign: &str) -> Option<&str> {
        self.get(campaign).map(|c| c.redirect_url.as_str())
    }
}

// =============================================================================
// CACHE
// =============================================================================

/// When a cached table counts as expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    pub threshold: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            threshold: Duration::seconds(DEFAULT_CAMPAIGN_REFRESH_SECS),
        }
    }
}

#[derive(Debug, Default)]
struct Snapshot {
    table: Option<Arc<CampaignTable>>,
    built_at: Option<DateTime<Utc>>,
}

/// Clears the refreshing flag when the rebuild ends, even on error.
struct RefreshGuard<'a>(&'a AtomicBool);

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Time-bounded cache of the campaign table.
pub struct CampaignCache {
    snapshot: Mutex<Snapshot>,
    refreshing: AtomicBool,
    clock: Arc<dyn Clock>,
    policy: RefreshPolicy,
    domain: String,
}

impl std::fmt::Debug for CampaignCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CampaignCache")
            .field("policy", &self.policy)
            .field("domain", &self.domain)
            .field("refreshing", &self.refreshing.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl CampaignCache {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, policy: RefreshPolicy, domain: impl Into<String>) -> Self {
        Self {
            snapshot: Mutex::new(Snapshot::default()),
            refreshing: AtomicBool::new(false),
            clock,
            policy,
            domain: domain.into(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Snapshot> {
        self.snapshot.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The current table, building or refreshing it through `providers`
    /// as needed.
    pub fn table<F>(&self, providers: F) -> Result<Arc<CampaignTable>, QuireError>
    where
        F: FnOnce() -> Result<Vec<Provider>, QuireError>,
    {
        let now = self.clock.now();
        let (current, expired) = {
            let snapshot = self.lock();
            let expired = snapshot
                .built_at
                .is_none_or(|built| now - built >= self.policy.threshold);
            (snapshot.table.clone(), expired)
        };

        match current {
            Some(table) if !expired => Ok(table),
            Some(stale) => {
                if self
                    .refreshing
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
                {
                    return Ok(stale);
                }
                let _guard = RefreshGuard(&self.refreshing);
                let table = Arc::new(CampaignTable::build(&self.domain, &providers()?));
                let mut snapshot = self.lock();
                snapshot.table = Some(Arc::clone(&table));
                snapshot.built_at = Some(self.clock.now());
                Ok(table)
            }
            None => {
                let mut snapshot = self.lock();
                if let Some(table) = &snapshot.table {
                    return Ok(Arc::clone(table));
                }
                let table = Arc::new(CampaignTable::build(&self.domain, &providers()?));
                snapshot.table = Some(Arc::clone(&table));
                snapshot.built_at = Some(self.clock.now());
                Ok(table)
            }
        }
    }

    /// Drop the cached table; the next lookup rebuilds synchronously.
    pub fn invalidate(&self) {
        let mut snapshot = self.lock();
        snapshot.table = None;
        snapshot.built_at = None;
    }

    /// When the current table was built.
    #[must_use]
    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.lock().built_at
    }

    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }
}

// =============================================================================
// TESTS
// =============================================================================
