//! # Platform
//!
//! The platform ties storage, time, settings and the outbound collaborators
//! (mail, export) together and is the entry point for every operation.
//!
//! ## Storage Backends
//!
//! - `InMemory`: ordered in-memory tables (fast, volatile)
//! - `Persistent`: redb tables (ACID, survives restarts)
//!
//! ## Collaborators
//!
//! Mail and export leave the core through [`Mailer`] and [`ExportSink`].
//! Both default to null implementations; the binary installs real ones.

use crate::campaigns::{CampaignCache, CampaignTable, RefreshPolicy};
use crate::clock::{Clock, SystemClock};
use crate::export::{ExportSink, NullSink};
use crate::mail::{Mailer, NullMailer};
use crate::model::{
    AccessToken, File, Institution, License, Preprint, Project, Provider, Subject, User,
};
use crate::primitives::{MAX_DESCRIPTION_LENGTH, MAX_TEXT_LENGTH};
use crate::publication::PreprintEditor;
use crate::query;
use crate::settings::Settings;
use crate::share::{FormatOptions, MetadataGraph, PreprintSnapshot, format_preprint};
use crate::storage::RedbStore;
use crate::store::{MemoryStore, Record, StorageBackend, Store};
use crate::types::{FileId, Permission, PreprintId, ProjectId, ProviderId, QuireError, UserId};
use chrono::{DateTime, Duration, Utc};
use std::path::Path;
use std::sync::Arc;

/// The preprint platform.
pub struct Platform {
    pub(crate) backend: StorageBackend,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) exports: Arc<dyn ExportSink>,
    pub(crate) mailer: Arc<dyn Mailer>,
    pub(crate) campaigns: CampaignCache,
    pub(crate) settings: Settings,
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform")
            .field("backend", &self.backend)
            .field("campaigns", &self.campaigns)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::new()
    }
}

fn check_length(field: &str, value: &str, max: usize) -> Result<(), QuireError> {
    if value.chars().count() > max {
        return Err(QuireError::InvalidState(format!(
            "{} exceeds {} characters",
            field, max
        )));
    }
    Ok(())
}

impl Platform {
    /// Create a platform with in-memory storage and default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_backend(StorageBackend::InMemory(MemoryStore::new()))
    }

    /// Create a platform over redb storage at `path`.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, QuireError> {
        Ok(Self::with_backend(StorageBackend::Persistent(
            RedbStore::open(path)?,
        )))
    }

    /// Create a platform over an explicit backend.
    #[must_use]
    pub fn with_backend(backend: StorageBackend) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let settings = Settings::default();
        Self {
            backend,
            campaigns: Self::campaign_cache(&clock, &settings),
            clock,
            exports: Arc::new(NullSink),
            mailer: Arc::new(NullMailer),
            settings,
        }
    }

    fn campaign_cache(clock: &Arc<dyn Clock>, settings: &Settings) -> CampaignCache {
        CampaignCache::new(
            Arc::clone(clock),
            RefreshPolicy {
                threshold: Duration::seconds(settings.campaign_refresh_secs),
            },
            settings.domain.clone(),
        )
    }

    /// Replace the settings. Resets the campaign cache.
    #[must_use]
    pub fn settings(mut self, settings: Settings) -> Self {
        self.campaigns = Self::campaign_cache(&self.clock, &settings);
        self.settings = settings;
        self
    }

    /// Replace the clock. Resets the campaign cache.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.campaigns = Self::campaign_cache(&clock, &self.settings);
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn export_sink(mut self, exports: Arc<dyn ExportSink>) -> Self {
        self.exports = exports;
        self
    }

    #[must_use]
    pub fn mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = mailer;
        self
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Current time according to the platform clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    #[must_use]
    pub fn current_settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn store(&self) -> &StorageBackend {
        &self.backend
    }

    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    /// Load a record by key.
    pub fn get<R: Record>(&self, key: &str) -> Result<Option<R>, QuireError> {
        self.backend.get(key)
    }

    /// Load a record or fail with `NotFound`.
    pub fn require<R: Record>(&self, key: &str) -> Result<R, QuireError> {
        self.backend.require(key)
    }

    /// All records of a type.
    pub fn all<R: Record>(&self) -> Result<Vec<R>, QuireError> {
        self.backend.all()
    }

    // =========================================================================
    // SEEDING
    // =========================================================================

    pub fn add_user(&mut self, user: &User) -> Result<(), QuireError> {
        check_length("fullname", &user.fullname, MAX_TEXT_LENGTH)?;
        self.backend.put(user)
    }

    pub fn add_institution(&mut self, institution: &Institution) -> Result<(), QuireError> {
        check_length("name", &institution.name, MAX_TEXT_LENGTH)?;
        self.backend.put(institution)
    }

    /// Register a provider. Provider campaigns change, so the campaign
    /// table is rebuilt on next use.
    pub fn add_provider(&mut self, provider: &Provider) -> Result<(), QuireError> {
        check_length("name", &provider.name, MAX_TEXT_LENGTH)?;
        self.backend.put(provider)?;
        self.campaigns.invalidate();
        Ok(())
    }

    /// Register a subject; every parent must already exist.
    pub fn add_subject(&mut self, subject: &Subject) -> Result<(), QuireError> {
        check_length("text", &subject.text, MAX_TEXT_LENGTH)?;
        for parent in &subject.parents {
            if self.backend.get::<Subject>(parent.as_str())?.is_none() {
                return Err(QuireError::InvalidSubject(format!(
                    "unknown parent subject {}",
                    parent
                )));
            }
        }
        self.backend.put(subject)
    }

    pub fn add_license(&mut self, license: &License) -> Result<(), QuireError> {
        check_length("name", &license.name, MAX_TEXT_LENGTH)?;
        self.backend.put(license)
    }

    /// Create a private project owned by `creator`.
    pub fn create_project(
        &mut self,
        title: &str,
        description: &str,
        creator: &UserId,
    ) -> Result<Project, QuireError> {
        check_length("title", title, MAX_TEXT_LENGTH)?;
        check_length("description", description, MAX_DESCRIPTION_LENGTH)?;
        self.backend.require::<User>(creator.as_str())?;
        let mut project = Project::new(title, creator, self.now());
        project.description = description.to_string();
        self.backend.put(&project)?;
        Ok(project)
    }

    /// Add a contributor to a project. Only admins may add contributors.
    pub fn add_contributor(
        &mut self,
        project: &ProjectId,
        user: &UserId,
        permission: Permission,
        visible: bool,
        actor: &UserId,
    ) -> Result<bool, QuireError> {
        let mut node = self.backend.require::<Project>(project.as_str())?;
        if !node.is_admin(actor) {
            return Err(QuireError::PermissionDenied(
                "Only admins can add contributors.".to_string(),
            ));
        }
        self.backend.require::<User>(user.as_str())?;
        let added = node.add_contributor(user, permission, visible, Some(actor), self.now());
        if added {
            self.backend.put(&node)?;
        }
        Ok(added)
    }

    /// Tag a project. Requires write permission.
    pub fn add_tag(&mut self, project: &ProjectId, tag: &str, actor: &UserId) -> Result<bool, QuireError> {
        check_length("tag", tag, MAX_TEXT_LENGTH)?;
        let mut node = self.backend.require::<Project>(project.as_str())?;
        if !node.has_permission(actor, Permission::Write) {
            return Err(QuireError::PermissionDenied(
                "Only contributors with write permission can add tags.".to_string(),
            ));
        }
        let added = node.add_tag(tag, Some(actor), self.now());
        if added {
            self.backend.put(&node)?;
        }
        Ok(added)
    }

    /// Make a project public or private. Requires admin permission.
    pub fn set_project_public(
        &mut self,
        project: &ProjectId,
        public: bool,
        actor: &UserId,
    ) -> Result<bool, QuireError> {
        let mut node = self.backend.require::<Project>(project.as_str())?;
        if !node.is_admin(actor) {
            return Err(QuireError::PermissionDenied(
                "Only admins can change a project's visibility.".to_string(),
            ));
        }
        let changed = node.set_public(public, Some(actor), self.now());
        if changed {
            self.backend.put(&node)?;
        }
        Ok(changed)
    }

    /// Store a file in a project. Requires write permission.
    pub fn add_file(&mut self, project: &ProjectId, name: &str, actor: &UserId) -> Result<File, QuireError> {
        check_length("name", name, MAX_TEXT_LENGTH)?;
        let node = self.backend.require::<Project>(project.as_str())?;
        if !node.has_permission(actor, Permission::Write) {
            return Err(QuireError::PermissionDenied(
                "Only contributors with write permission can upload files.".to_string(),
            ));
        }
        let file = File::new(project, name);
        self.backend.put(&file)?;
        Ok(file)
    }

    /// Flag a file deleted.
    pub fn delete_file(&mut self, file: &FileId) -> Result<(), QuireError> {
        let mut record = self.backend.require::<File>(file.as_str())?;
        record.is_deleted = true;
        self.backend.put(&record)
    }

    /// Flag a project deleted.
    pub fn delete_project(&mut self, project: &ProjectId, actor: &UserId) -> Result<(), QuireError> {
        let mut node = self.backend.require::<Project>(project.as_str())?;
        if !node.is_admin(actor) {
            return Err(QuireError::PermissionDenied(
                "Only admins can delete a project.".to_string(),
            ));
        }
        node.is_deleted = true;
        node.date_modified = self.now();
        self.backend.put(&node)
    }

    // =========================================================================
    // PREPRINTS
    // =========================================================================

    /// Create an unpublished preprint for `project`.
    ///
    /// A project carries at most one preprint per provider.
    pub fn create_preprint(
        &mut self,
        project: &ProjectId,
        provider: Option<&ProviderId>,
        actor: &UserId,
    ) -> Result<Preprint, QuireError> {
        let node = self.backend.require::<Project>(project.as_str())?;
        if !node.is_admin(actor) {
            return Err(QuireError::PermissionDenied(
                "User must be an admin to create a preprint.".to_string(),
            ));
        }
        if node.is_deleted {
            return Err(QuireError::InvalidState(
                "Cannot create a preprint for a deleted project.".to_string(),
            ));
        }
        if let Some(id) = provider {
            self.backend.require::<Provider>(id.as_str())?;
        }
        let duplicate = self
            .backend
            .all::<Preprint>()?
            .iter()
            .any(|p| &p.node == project && p.provider.as_ref() == provider);
        if duplicate {
            return Err(QuireError::InvalidState(
                "Only one preprint per provider can be submitted for a project.".to_string(),
            ));
        }

        let preprint = Preprint::new(project, provider.cloned(), self.now());
        self.backend.put(&preprint)?;
        Ok(preprint)
    }

    /// Open a preprint for editing.
    pub fn edit_preprint(&mut self, preprint: &PreprintId) -> Result<PreprintEditor<'_>, QuireError> {
        PreprintEditor::load(self, preprint)
    }

    /// Re-export a preprint without changing it.
    ///
    /// Dispatches an export even when nothing changed and even when the
    /// preprint is unpublished; `is_published` is left untouched.
    pub fn force_update(&mut self, preprint: &PreprintId) -> Result<(), QuireError> {
        let mut editor = self.edit_preprint(preprint)?;
        editor.save(true)?;
        Ok(())
    }

    /// Whether `viewer` may read `preprint`.
    pub fn can_view_preprint(
        &self,
        preprint: &Preprint,
        viewer: Option<&UserId>,
    ) -> Result<bool, QuireError> {
        let project = self.backend.require::<Project>(preprint.node.as_str())?;
        Ok(query::preprint_visible_to(preprint, &project, viewer))
    }

    /// Load everything the formatter needs for one preprint.
    pub fn snapshot(&self, preprint: &PreprintId) -> Result<PreprintSnapshot, QuireError> {
        let preprint = self.backend.require::<Preprint>(preprint.as_str())?;
        let project = self.backend.require::<Project>(preprint.node.as_str())?;
        let primary_file = match &preprint.primary_file {
            Some(id) => self.backend.get::<File>(id.as_str())?,
            None => None,
        };

        let mut contributors = Vec::with_capacity(project.contributors.len());
        for contributor in &project.contributors {
            let user = self.backend.require::<User>(contributor.user.as_str())?;
            contributors.push((contributor.clone(), user));
        }

        let mut subjects = Vec::new();
        for id in preprint.distinct_subjects() {
            if let Some(subject) = self.backend.get::<Subject>(id.as_str())? {
                subjects.push(subject);
            }
        }

        Ok(PreprintSnapshot {
            preprint,
            project,
            primary_file,
            contributors,
            subjects,
        })
    }

    /// Format a preprint's metadata graph with the platform domain.
    pub fn format_preprint(&self, preprint: &PreprintId) -> Result<MetadataGraph, QuireError> {
        let snapshot = self.snapshot(preprint)?;
        format_preprint(&snapshot, &FormatOptions::from(&self.settings))
    }

    // =========================================================================
    // CAMPAIGNS & TOKENS
    // =========================================================================

    /// The campaign table, rebuilt from the providers when expired.
    pub fn campaigns(&self) -> Result<Arc<CampaignTable>, QuireError> {
        self.campaigns.table(|| self.backend.all::<Provider>())
    }

    /// When the campaign table was last built.
    #[must_use]
    pub fn campaigns_refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.campaigns.last_refreshed()
    }

    /// Resolve a bearer token to its user.
    pub fn user_for_token(&self, token: &str) -> Result<User, QuireError> {
        let record = self
            .backend
            .get::<AccessToken>(token)?
            .ok_or_else(|| QuireError::AuthenticationFailed("unknown access token".to_string()))?;
        let user = self
            .backend
            .get::<User>(record.user.as_str())?
            .ok_or_else(|| QuireError::AuthenticationFailed("token user vanished".to_string()))?;
        if user.is_disabled {
            return Err(QuireError::AuthenticationFailed(
                "user is disabled".to_string(),
            ));
        }
        Ok(user)
    }

    /// Issue a new bearer token for `user`.
    pub fn issue_token(&mut self, user: &UserId) -> Result<AccessToken, QuireError> {
        let token = AccessToken {
            token: crate::model::generate_long_id(),
            user: user.clone(),
            date_created: self.now(),
        };
        self.backend.put(&token)?;
        Ok(token)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_project_requires_known_creator() {
        let mut platform = Platform::new();
        let err = platform
            .create_project("Title", "", &UserId::new("ghost"))
            .expect_err("unknown creator");
        assert!(matches!(err, QuireError::NotFound { kind: "User", .. }));
    }

    #[test]
    fn overlong_title_rejected() {
        let mut platform = Platform::new();
        let user = User::registered("Ada", "ada@example.com", platform.now());
        platform.add_user(&user).expect("user");
        let title = "x".repeat(MAX_TEXT_LENGTH + 1);
        assert!(platform.create_project(&title, "", &user.id).is_err());
    }

    #[test]
    fn one_preprint_per_provider() {
        let mut platform = Platform::new();
        let user = User::registered("Ada", "ada@example.com", platform.now());
        platform.add_user(&user).expect("user");
        platform.add_provider(&Provider::new("osf", "OSF")).expect("provider");
        let project = platform.create_project("Title", "", &user.id).expect("project");
        let osf = ProviderId::new("osf");

        platform
            .create_preprint(&project.id, Some(&osf), &user.id)
            .expect("first");
        let err = platform
            .create_preprint(&project.id, Some(&osf), &user.id)
            .expect_err("second");
        assert!(matches!(err, QuireError::InvalidState(_)));
    }

    #[test]
    fn tokens_resolve_to_users() {
        let mut platform = Platform::new();
        let user = User::registered("Ada", "ada@example.com", platform.now());
        platform.add_user(&user).expect("user");

        let token = platform.issue_token(&user.id).expect("token");
        assert_eq!(platform.user_for_token(&token.token).expect("user").id, user.id);
        assert!(matches!(
            platform.user_for_token("nope"),
            Err(QuireError::AuthenticationFailed(_))
        ));
    }

    #[test]
    fn only_admins_change_visibility() {
        let mut platform = Platform::new();
        let owner = User::registered("Ada", "ada@example.com", platform.now());
        let writer = User::registered("Bob", "bob@example.com", platform.now());
        platform.add_user(&owner).expect("user");
        platform.add_user(&writer).expect("user");
        let project = platform.create_project("Title", "", &owner.id).expect("project");
        platform
            .add_contributor(&project.id, &writer.id, Permission::Write, true, &owner.id)
            .expect("contributor");

        assert!(matches!(
            platform.set_project_public(&project.id, true, &writer.id),
            Err(QuireError::PermissionDenied(_))
        ));
        assert!(platform.set_project_public(&project.id, true, &owner.id).expect("public"));
        assert!(!platform.set_project_public(&project.id, true, &owner.id).expect("again"));
        assert!(platform.require::<Project>(project.id.as_str()).expect("project").is_public);
    }

    #[test]
    fn new_provider_appears_in_campaigns() {
        let mut platform = Platform::new();
        assert!(platform.campaigns().expect("table").get("osf-preprints").is_none());
        platform.add_provider(&Provider::new("osf", "OSF")).expect("provider");
        assert!(platform.campaigns().expect("table").get("osf-preprints").is_some());
    }
}
