//! # Publication State Controller
//!
//! All preprint mutations go through a [`PreprintEditor`]. The editor
//! loads the preprint and its project, checks that the actor administers
//! the project, applies the change and, when asked to persist, saves both
//! records and runs the export hook.
//!
//! ## State Machine
//!
//! ```text
//! Unpublished ──set_published(true)──► Published
//! ```
//!
//! There is no way back. Publishing requires a provider, at least one
//! subject group and a primary file that belongs to the project.
//!
//! ## Export Hook
//!
//! A save dispatches an export when the preprint is published and the
//! editor holds unsaved changes, or when `force_update` is set.

use crate::model::{File, License, Preprint, PreprintProjection, Project, Provider};
use crate::platform::Platform;
use crate::primitives::MAX_TEXT_LENGTH;
use crate::store::Store;
use crate::taxonomy;
use crate::types::{
    FileId, LicenseId, LogAction, PreprintId, ProviderId, QuireError, SubjectId, UserId,
};

/// An empty allow-list accepts every license.
fn check_license(provider: &Provider, license: &LicenseId) -> Result<(), QuireError> {
    if provider.licenses_acceptable.is_empty() || provider.licenses_acceptable.contains(license) {
        Ok(())
    } else {
        Err(QuireError::InvalidLicense(format!(
            "license is not acceptable for {}",
            provider.name
        )))
    }
}

/// Editing session over one preprint.
pub struct PreprintEditor<'p> {
    platform: &'p mut Platform,
    preprint: Preprint,
    project: Project,
    dirty: bool,
}

impl std::fmt::Debug for PreprintEditor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreprintEditor")
            .field("preprint", &self.preprint.id)
            .field("project", &self.project.id)
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl<'p> PreprintEditor<'p> {
    pub(crate) fn load(platform: &'p mut Platform, id: &PreprintId) -> Result<Self, QuireError> {
        let preprint = platform.backend.require::<Preprint>(id.as_str())?;
        let project = platform.backend.require::<Project>(preprint.node.as_str())?;
        Ok(Self {
            platform,
            preprint,
            project,
            dirty: false,
        })
    }

    #[must_use]
    pub fn preprint(&self) -> &Preprint {
        &self.preprint
    }

    #[must_use]
    pub fn project(&self) -> &Project {
        &self.project
    }

    /// Whether the editor holds changes not yet saved.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn require_admin(&self, actor: &UserId, action: &str) -> Result<(), QuireError> {
        if self.project.is_admin(actor) {
            Ok(())
        } else {
            Err(QuireError::PermissionDenied(format!(
                "Only admins can {}.",
                action
            )))
        }
    }

    fn finish(&mut self, persist: bool) -> Result<(), QuireError> {
        if persist {
            self.save(false)?;
        }
        Ok(())
    }

    fn load_file(&self, id: &FileId) -> Result<Option<File>, QuireError> {
        self.platform.backend.get::<File>(id.as_str())
    }

    fn load_provider(&self) -> Result<Option<Provider>, QuireError> {
        match &self.preprint.provider {
            Some(id) => self.platform.backend.get::<Provider>(id.as_str()),
            None => Ok(None),
        }
    }

    /// Check the current subjects and license against `provider`'s
    /// allow-lists.
    fn check_allow_lists(&self, provider: Option<&Provider>) -> Result<(), QuireError> {
        taxonomy::validate_groups(&self.platform.backend, provider, &self.preprint.subjects)?;
        if let (Some(provider), Some(license)) = (provider, &self.preprint.license) {
            check_license(provider, license)?;
        }
        Ok(())
    }

    // =========================================================================
    // OPERATIONS
    // =========================================================================

    /// Set the primary file.
    ///
    /// The file must exist, must not be deleted and must belong to the
    /// preprint's project. The first assignment logs `PreprintInitiated`,
    /// later changes log `PreprintFileUpdated`.
    pub fn set_primary_file(
        &mut self,
        file: &FileId,
        actor: &UserId,
        persist: bool,
    ) -> Result<(), QuireError> {
        self.require_admin(actor, "change a preprint's primary file")?;

        let valid = self
            .load_file(file)?
            .is_some_and(|f| !f.is_deleted && f.project == self.project.id);
        if !valid {
            return Err(QuireError::InvalidFile(
                "This file is not a valid primary file for this preprint.".to_string(),
            ));
        }

        if self.preprint.primary_file.as_ref() != Some(file) {
            let action = if self.preprint.primary_file.is_none() {
                LogAction::PreprintInitiated
            } else {
                LogAction::PreprintFileUpdated
            };
            self.preprint.primary_file = Some(file.clone());
            self.project
                .add_log(action, Some(actor), self.platform.now());
            self.dirty = true;
        }
        self.finish(persist)
    }

    /// Replace the subject groups.
    ///
    /// Empty groups are dropped. Every remaining group is validated before
    /// anything is assigned, so a rejected call leaves the preprint as it
    /// was.
    pub fn set_subjects(
        &mut self,
        groups: &[Vec<SubjectId>],
        actor: &UserId,
        persist: bool,
    ) -> Result<(), QuireError> {
        self.require_admin(actor, "change a preprint's subjects")?;

        let groups: Vec<Vec<SubjectId>> = groups
            .iter()
            .filter(|g| !g.is_empty())
            .cloned()
            .collect();
        if groups.is_empty() && self.preprint.is_published {
            return Err(QuireError::InvalidState(
                "A published preprint must have at least one subject.".to_string(),
            ));
        }
        let provider = self.load_provider()?;
        taxonomy::validate_groups(&self.platform.backend, provider.as_ref(), &groups)?;

        if self.preprint.subjects != groups {
            self.preprint.subjects = groups;
            self.project.add_log(
                LogAction::PreprintSubjectsUpdated,
                Some(actor),
                self.platform.now(),
            );
            self.dirty = true;
        }
        self.finish(persist)
    }

    /// Publish the preprint.
    ///
    /// `false` on a published preprint fails; `true` on a published
    /// preprint changes nothing. Publishing makes a private project public.
    pub fn set_published(
        &mut self,
        published: bool,
        actor: &UserId,
        persist: bool,
    ) -> Result<(), QuireError> {
        self.require_admin(actor, "publish a preprint")?;

        match (self.preprint.is_published, published) {
            (true, false) => {
                return Err(QuireError::InvalidState(
                    "Cannot unpublish preprint.".to_string(),
                ));
            }
            (true, true) | (false, false) => return self.finish(persist),
            (false, true) => {}
        }

        let primary_file = match &self.preprint.primary_file {
            Some(id) => self.load_file(id)?,
            None => None,
        };
        let projection =
            PreprintProjection::compute(&self.preprint, &self.project, primary_file.as_ref());
        if projection.is_preprint_orphan {
            return Err(QuireError::InvalidState(
                "Preprint node is not a valid preprint; cannot publish.".to_string(),
            ));
        }
        if self.preprint.provider.is_none() {
            return Err(QuireError::InvalidState(
                "Preprint provider not specified; cannot publish.".to_string(),
            ));
        }
        if self.preprint.subjects.is_empty() {
            return Err(QuireError::InvalidState(
                "Preprint must have at least one subject to be published.".to_string(),
            ));
        }
        let provider = self.load_provider()?;
        self.check_allow_lists(provider.as_ref())?;

        let now = self.platform.now();
        self.preprint.is_published = true;
        self.preprint.date_published = Some(now);
        self.project
            .add_log(LogAction::PreprintPublished, Some(actor), now);
        self.project.set_public(true, Some(actor), now);
        self.dirty = true;
        self.finish(persist)
    }

    /// Set the provider. Only unpublished preprints can move.
    pub fn set_provider(
        &mut self,
        provider: &ProviderId,
        actor: &UserId,
        persist: bool,
    ) -> Result<(), QuireError> {
        self.require_admin(actor, "change a preprint's provider")?;
        if self.preprint.provider.as_ref() == Some(provider) {
            return self.finish(persist);
        }
        if self.preprint.is_published {
            return Err(QuireError::InvalidState(
                "Cannot change the provider of a published preprint.".to_string(),
            ));
        }
        let next = self
            .platform
            .backend
            .require::<Provider>(provider.as_str())?;
        self.check_allow_lists(Some(&next))?;
        self.preprint.provider = Some(provider.clone());
        self.dirty = true;
        self.finish(persist)
    }

    /// Set the license; the provider's allow-list applies when non-empty.
    pub fn set_license(
        &mut self,
        license: &LicenseId,
        actor: &UserId,
        persist: bool,
    ) -> Result<(), QuireError> {
        self.require_admin(actor, "change a preprint's license")?;
        if self
            .platform
            .backend
            .get::<License>(license.as_str())?
            .is_none()
        {
            return Err(QuireError::InvalidLicense(format!(
                "unknown license {}",
                license
            )));
        }
        if let Some(provider) = self.load_provider()? {
            check_license(&provider, license)?;
        }

        if self.preprint.license.as_ref() != Some(license) {
            self.preprint.license = Some(license.clone());
            self.project.add_log(
                LogAction::PreprintLicenseUpdated,
                Some(actor),
                self.platform.now(),
            );
            self.dirty = true;
        }
        self.finish(persist)
    }

    /// Set or clear the article DOI. Blank input clears it.
    pub fn set_doi(
        &mut self,
        doi: Option<&str>,
        actor: &UserId,
        persist: bool,
    ) -> Result<(), QuireError> {
        self.require_admin(actor, "change a preprint's DOI")?;
        let doi = doi.map(str::trim).filter(|d| !d.is_empty());
        if let Some(d) = doi {
            if d.len() > MAX_TEXT_LENGTH || d.chars().any(char::is_whitespace) {
                return Err(QuireError::InvalidState(format!("Invalid DOI: {}", d)));
            }
        }
        let doi = doi.map(str::to_string);
        if self.preprint.article_doi != doi {
            self.preprint.article_doi = doi;
            self.dirty = true;
        }
        self.finish(persist)
    }

    // =========================================================================
    // SAVE
    // =========================================================================

    /// Save the preprint and its project.
    ///
    /// Returns whether an export was dispatched.
    pub fn save(&mut self, force_update: bool) -> Result<bool, QuireError> {
        let dispatch = (self.preprint.is_published && self.dirty) || force_update;
        if self.dirty {
            let now = self.platform.now();
            self.preprint.date_modified = now;
            self.project.date_modified = now;
        }
        self.platform.backend.put(&self.project)?;
        self.platform.backend.put(&self.preprint)?;
        self.dirty = false;

        if dispatch {
            self.platform.exports.dispatch(&self.preprint.id);
        }
        Ok(dispatch)
    }
}
