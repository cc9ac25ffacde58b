//! # Domain Records
//!
//! The persisted entities of the platform: users, institutions, projects
//! (with contributors, tags and logs), files, taxonomy subjects, providers,
//! licenses, preprints and access tokens.
//!
//! A preprint owns its primary file reference. Whether a project "is a
//! preprint" is never stored; it is derived on read by
//! [`PreprintProjection`].

use crate::primitives::{GUID_ALPHABET, NAME_SUFFIXES, SHORT_GUID_LENGTH};
use crate::store::Record;
use crate::types::{
    FileId, InstitutionId, LicenseId, LogAction, Permission, PreprintId, ProjectId, ProviderId,
    SubjectId, UserId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// =============================================================================
// IDENTIFIER GENERATION
// =============================================================================

/// Generate a short guid (users, projects, preprints).
#[must_use]
pub fn generate_guid() -> String {
    let bytes = uuid::Uuid::new_v4().into_bytes();
    bytes
        .iter()
        .take(SHORT_GUID_LENGTH)
        .map(|b| GUID_ALPHABET[*b as usize % GUID_ALPHABET.len()] as char)
        .collect()
}

/// Generate a long opaque id (files, subjects, licenses, tokens).
#[must_use]
pub fn generate_long_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

// =============================================================================
// NAMES
// =============================================================================

/// Name parts imputed from a full name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameParts {
    pub given_name: String,
    pub middle_names: String,
    pub family_name: String,
    pub suffix: String,
}

/// Split a full name into given, middle, family and suffix parts.
///
/// `"BoJack Horseman"` → given `BoJack`, family `Horseman`;
/// `"Martin Luther King Jr."` → given `Martin`, middle `Luther`,
/// family `King`, suffix `Jr.`.
#[must_use]
pub fn impute_names(fullname: &str) -> NameParts {
    let mut tokens: Vec<&str> = fullname.split_whitespace().collect();

    let mut suffix = String::new();
    if tokens.len() > 2 {
        if let Some(last) = tokens.last() {
            if NAME_SUFFIXES.contains(&last.to_lowercase().as_str()) {
                suffix = (*last).to_string();
                tokens.pop();
            }
        }
    }

    match tokens.as_slice() {
        [] => NameParts::default(),
        [only] => NameParts {
            given_name: (*only).to_string(),
            suffix,
            ..NameParts::default()
        },
        [first, middle @ .., last] => NameParts {
            given_name: (*first).to_string(),
            middle_names: middle.join(" "),
            family_name: (*last).to_string(),
            suffix,
        },
    }
}

// =============================================================================
// USER
// =============================================================================

/// A user account. Unregistered users exist as contributors only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub fullname: String,
    pub given_name: String,
    pub middle_names: String,
    pub family_name: String,
    pub suffix: String,
    /// Primary email; `None` for unregistered contributors.
    pub username: Option<String>,
    /// Confirmed email addresses.
    pub emails: Vec<String>,
    pub is_registered: bool,
    pub is_disabled: bool,
    pub affiliated_institutions: Vec<InstitutionId>,
    pub system_tags: Vec<String>,
    pub date_registered: Option<DateTime<Utc>>,
    pub date_last_login: Option<DateTime<Utc>>,
}

impl User {
    /// Create an unregistered user with names imputed from `fullname`.
    #[must_use]
    pub fn unregistered(fullname: impl Into<String>) -> Self {
        let fullname = fullname.into();
        let names = impute_names(&fullname);
        Self {
            id: UserId::new(generate_guid()),
            fullname,
            given_name: names.given_name,
            middle_names: names.middle_names,
            family_name: names.family_name,
            suffix: names.suffix,
            username: None,
            emails: Vec::new(),
            is_registered: false,
            is_disabled: false,
            affiliated_institutions: Vec::new(),
            system_tags: Vec::new(),
            date_registered: None,
            date_last_login: None,
        }
    }

    /// Create a registered user whose username is a confirmed email.
    #[must_use]
    pub fn registered(
        fullname: impl Into<String>,
        username: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut user = Self::unregistered(fullname);
        user.register(username, now);
        user
    }

    /// Mark the user registered under `username`.
    pub fn register(&mut self, username: impl Into<String>, now: DateTime<Utc>) {
        let username = username.into();
        if !self.emails.contains(&username) {
            self.emails.push(username.clone());
        }
        self.username = Some(username);
        self.is_registered = true;
        self.date_registered = Some(now);
    }

    /// Check institution affiliation.
    #[must_use]
    pub fn is_affiliated_with(&self, institution: &InstitutionId) -> bool {
        self.affiliated_institutions.contains(institution)
    }

    /// Relative profile URL (`/<id>/`).
    #[must_use]
    pub fn profile_url(&self) -> String {
        format!("/{}/", self.id)
    }

    /// Gravatar-style profile image URL.
    ///
    /// Hashes the username when present, the user id otherwise.
    #[must_use]
    pub fn profile_image_url(&self) -> String {
        let seed = self
            .username
            .as_deref()
            .map(|u| u.trim().to_lowercase())
            .unwrap_or_else(|| self.id.to_string());
        let digest = Sha256::digest(seed.as_bytes());
        format!(
            "https://secure.gravatar.com/avatar/{:x}?d=identicon&size=70",
            digest
        )
    }
}

// =============================================================================
// INSTITUTION
// =============================================================================

/// An institution users can log in through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Institution {
    pub id: InstitutionId,
    pub name: String,
    pub description: String,
}

impl Institution {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: InstitutionId::new(id),
            name: name.into(),
            description: String::new(),
        }
    }
}

// =============================================================================
// PROJECT
// =============================================================================

/// A contributor entry on a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    pub user: UserId,
    pub permission: Permission,
    /// Bibliographic contributors are cited as creators.
    pub visible: bool,
}

/// An entry in a project's append-only log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeLog {
    pub action: LogAction,
    pub user: Option<UserId>,
    pub date: DateTime<Utc>,
}

/// A project, the container a preprint is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub title: String,
    pub description: String,
    pub creator: UserId,
    /// Contributors in contribution order.
    pub contributors: Vec<Contributor>,
    pub tags: Vec<String>,
    pub is_public: bool,
    pub is_deleted: bool,
    pub date_created: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
    pub logs: Vec<NodeLog>,
}

impl Project {
    /// Create a private project with `creator` as its visible admin.
    #[must_use]
    pub fn new(title: impl Into<String>, creator: &UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: ProjectId::new(generate_guid()),
            title: title.into(),
            description: String::new(),
            creator: creator.clone(),
            contributors: vec![Contributor {
                user: creator.clone(),
                permission: Permission::Admin,
                visible: true,
            }],
            tags: Vec::new(),
            is_public: false,
            is_deleted: false,
            date_created: now,
            date_modified: now,
            logs: vec![NodeLog {
                action: LogAction::ProjectCreated,
                user: Some(creator.clone()),
                date: now,
            }],
        }
    }

    /// Permission held by `user`, if a contributor.
    #[must_use]
    pub fn permission_of(&self, user: &UserId) -> Option<Permission> {
        self.contributors
            .iter()
            .find(|c| &c.user == user)
            .map(|c| c.permission)
    }

    /// Check whether `user` holds at least `required`.
    #[must_use]
    pub fn has_permission(&self, user: &UserId, required: Permission) -> bool {
        self.permission_of(user)
            .is_some_and(|held| held.allows(required))
    }

    /// Check whether `user` is a project admin.
    #[must_use]
    pub fn is_admin(&self, user: &UserId) -> bool {
        self.has_permission(user, Permission::Admin)
    }

    /// Add a contributor. Returns `false` when the user already contributes.
    pub fn add_contributor(
        &mut self,
        user: &UserId,
        permission: Permission,
        visible: bool,
        actor: Option<&UserId>,
        now: DateTime<Utc>,
    ) -> bool {
        if self.permission_of(user).is_some() {
            return false;
        }
        self.contributors.push(Contributor {
            user: user.clone(),
            permission,
            visible,
        });
        self.add_log(LogAction::ContributorAdded, actor, now);
        true
    }

    /// Add a tag. Duplicates are ignored.
    pub fn add_tag(&mut self, tag: &str, actor: Option<&UserId>, now: DateTime<Utc>) -> bool {
        let tag = tag.trim();
        if tag.is_empty() || self.has_tag(tag) {
            return false;
        }
        self.tags.push(tag.to_string());
        self.add_log(LogAction::TagAdded, actor, now);
        true
    }

    /// Check for a tag (case-insensitive).
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Change visibility, logging the change. Returns whether it changed.
    pub fn set_public(&mut self, public: bool, actor: Option<&UserId>, now: DateTime<Utc>) -> bool {
        if self.is_public == public {
            return false;
        }
        self.is_public = public;
        let action = if public {
            LogAction::MadePublic
        } else {
            LogAction::MadePrivate
        };
        self.add_log(action, actor, now);
        true
    }

    /// Append a log entry and bump the modification date.
    pub fn add_log(&mut self, action: LogAction, actor: Option<&UserId>, now: DateTime<Utc>) {
        self.logs.push(NodeLog {
            action,
            user: actor.cloned(),
            date: now,
        });
        self.date_modified = now;
    }

    /// The most recent log action, if any.
    #[must_use]
    pub fn last_log_action(&self) -> Option<LogAction> {
        self.logs.last().map(|l| l.action)
    }
}

// =============================================================================
// FILE
// =============================================================================

/// A stored file owned by a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    pub id: FileId,
    pub project: ProjectId,
    pub name: String,
    pub path: String,
    pub is_deleted: bool,
}

impl File {
    #[must_use]
    pub fn new(project: &ProjectId, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: FileId::new(generate_long_id()),
            project: project.clone(),
            path: format!("/{}", name),
            name,
            is_deleted: false,
        }
    }
}

// =============================================================================
// TAXONOMY
// =============================================================================

/// A taxonomy term. Top-level subjects have no parents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub text: String,
    pub parents: Vec<SubjectId>,
}

impl Subject {
    /// Create a top-level subject.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: SubjectId::new(generate_long_id()),
            text: text.into(),
            parents: Vec::new(),
        }
    }

    /// Create a subject under `parent`.
    #[must_use]
    pub fn child_of(text: impl Into<String>, parent: &SubjectId) -> Self {
        let mut subject = Self::new(text);
        subject.parents.push(parent.clone());
        subject
    }

    #[must_use]
    pub fn is_top_level(&self) -> bool {
        self.parents.is_empty()
    }
}

/// One allow-list entry on a provider: a hierarchy path, plus whether
/// children of its last element are acceptable as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptableSubject {
    pub path: Vec<SubjectId>,
    pub include_children: bool,
}

// =============================================================================
// PROVIDER & LICENSE
// =============================================================================

/// A publishing venue preprints are submitted under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub id: ProviderId,
    pub name: String,
    pub description: String,
    pub logo_path: String,
    pub banner_path: String,
    pub external_url: String,
    /// Empty means every subject is acceptable.
    pub subjects_acceptable: Vec<AcceptableSubject>,
    /// Empty means every license is acceptable.
    pub licenses_acceptable: Vec<LicenseId>,
}

impl Provider {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ProviderId::new(id),
            name: name.into(),
            description: String::new(),
            logo_path: String::new(),
            banner_path: String::new(),
            external_url: String::new(),
            subjects_acceptable: Vec::new(),
            licenses_acceptable: Vec::new(),
        }
    }
}

/// A license a preprint can be released under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    pub id: LicenseId,
    pub name: String,
    pub text: String,
}

impl License {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: LicenseId::new(generate_long_id()),
            name: name.into(),
            text: String::new(),
        }
    }
}

// =============================================================================
// PREPRINT
// =============================================================================

/// Publication state of a preprint. The only transition is
/// `Unpublished → Published`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicationState {
    Unpublished,
    Published,
}

/// A preprint attached to a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preprint {
    pub id: PreprintId,
    pub node: ProjectId,
    pub provider: Option<ProviderId>,
    /// Ordered hierarchy groups, each a root-to-leaf path.
    pub subjects: Vec<Vec<SubjectId>>,
    pub primary_file: Option<FileId>,
    pub license: Option<LicenseId>,
    pub article_doi: Option<String>,
    pub is_published: bool,
    pub date_created: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
    pub date_published: Option<DateTime<Utc>>,
}

impl Preprint {
    /// Create an unpublished preprint for `node`.
    #[must_use]
    pub fn new(node: &ProjectId, provider: Option<ProviderId>, now: DateTime<Utc>) -> Self {
        Self {
            id: PreprintId::new(generate_guid()),
            node: node.clone(),
            provider,
            subjects: Vec::new(),
            primary_file: None,
            license: None,
            article_doi: None,
            is_published: false,
            date_created: now,
            date_modified: now,
            date_published: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> PublicationState {
        if self.is_published {
            PublicationState::Published
        } else {
            PublicationState::Unpublished
        }
    }

    /// Relative canonical URL (`/<id>/`).
    #[must_use]
    pub fn url(&self) -> String {
        format!("/{}/", self.id)
    }

    /// Distinct subject ids across all groups, in first-seen order.
    #[must_use]
    pub fn distinct_subjects(&self) -> Vec<SubjectId> {
        let mut seen = Vec::new();
        for id in self.subjects.iter().flatten() {
            if !seen.contains(id) {
                seen.push(id.clone());
            }
        }
        seen
    }
}

/// Project-level flags derived from a preprint, its project and its
/// primary file. Recomputed on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprintProjection {
    /// The project carries a published, non-orphaned preprint.
    pub is_preprint: bool,
    /// The primary file is missing, deleted, or no longer in the project.
    pub is_preprint_orphan: bool,
}

impl PreprintProjection {
    #[must_use]
    pub fn compute(preprint: &Preprint, project: &Project, primary_file: Option<&File>) -> Self {
        let is_preprint_orphan = match (&preprint.primary_file, primary_file) {
            (Some(id), Some(file)) => {
                &file.id != id || file.is_deleted || file.project != project.id
            }
            _ => true,
        };
        Self {
            is_preprint: preprint.is_published && !is_preprint_orphan && !project.is_deleted,
            is_preprint_orphan,
        }
    }
}

// =============================================================================
// ACCESS TOKEN
// =============================================================================

/// Bearer credential issued after a successful institution login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub token: String,
    pub user: UserId,
    pub date_created: DateTime<Utc>,
}

// =============================================================================
// RECORD IMPLEMENTATIONS
// =============================================================================

macro_rules! impl_record {
    ($ty:ty, $table:literal, $kind:literal, |$r:ident| $key:expr) => {
        impl Record for $ty {
            const TABLE: &'static str = $table;
            const KIND: &'static str = $kind;

            fn key(&self) -> &str {
                let $r = self;
                $key
            }
        }
    };
}

impl_record!(User, "users", "User", |r| r.id.as_str());
impl_record!(Institution, "institutions", "Institution", |r| r.id.as_str());
impl_record!(Project, "projects", "Project", |r| r.id.as_str());
impl_record!(File, "files", "File", |r| r.id.as_str());
impl_record!(Subject, "subjects", "Subject", |r| r.id.as_str());
impl_record!(Provider, "providers", "PreprintProvider", |r| r.id.as_str());
impl_record!(License, "licenses", "License", |r| r.id.as_str());
impl_record!(Preprint, "preprints", "Preprint", |r| r.id.as_str());
impl_record!(AccessToken, "access_tokens", "AccessToken", |r| r.token.as_str());

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_guids_have_fixed_length() {
        let guid = generate_guid();
        assert_eq!(guid.len(), SHORT_GUID_LENGTH);
        assert!(generate_long_id().len() > SHORT_GUID_LENGTH);
    }

    #[test]
    fn impute_two_part_name() {
        let names = impute_names("BoJack Horseman");
        assert_eq!(names.given_name, "BoJack");
        assert_eq!(names.family_name, "Horseman");
        assert!(names.middle_names.is_empty());
        assert!(names.suffix.is_empty());
    }

    #[test]
    fn impute_name_with_middle_and_suffix() {
        let names = impute_names("Martin Luther King Jr.");
        assert_eq!(names.given_name, "Martin");
        assert_eq!(names.middle_names, "Luther");
        assert_eq!(names.family_name, "King");
        assert_eq!(names.suffix, "Jr.");
    }

    #[test]
    fn impute_single_token() {
        let names = impute_names("Cher");
        assert_eq!(names.given_name, "Cher");
        assert!(names.family_name.is_empty());
    }

    #[test]
    fn project_creator_is_admin() {
        let user = UserId::new("abcde");
        let project = Project::new("Title", &user, Utc::now());
        assert!(project.is_admin(&user));
        assert!(!project.is_public);
    }

    #[test]
    fn duplicate_contributor_rejected() {
        let user = UserId::new("abcde");
        let mut project = Project::new("Title", &user, Utc::now());
        assert!(!project.add_contributor(&user, Permission::Read, true, None, Utc::now()));
        assert_eq!(project.contributors.len(), 1);
    }

    #[test]
    fn projection_flags_orphaned_preprint() {
        let now = Utc::now();
        let user = UserId::new("abcde");
        let project = Project::new("Title", &user, now);
        let mut preprint = Preprint::new(&project.id, None, now);
        preprint.is_published = true;

        let projection = PreprintProjection::compute(&preprint, &project, None);
        assert!(projection.is_preprint_orphan);
        assert!(!projection.is_preprint);

        let file = File::new(&project.id, "paper.pdf");
        preprint.primary_file = Some(file.id.clone());
        let projection = PreprintProjection::compute(&preprint, &project, Some(&file));
        assert!(!projection.is_preprint_orphan);
        assert!(projection.is_preprint);
    }

    #[test]
    fn projection_flags_file_from_other_project() {
        let now = Utc::now();
        let user = UserId::new("abcde");
        let project = Project::new("Title", &user, now);
        let other = Project::new("Other", &user, now);
        let file = File::new(&other.id, "paper.pdf");
        let mut preprint = Preprint::new(&project.id, None, now);
        preprint.primary_file = Some(file.id.clone());

        let projection = PreprintProjection::compute(&preprint, &project, Some(&file));
        assert!(projection.is_preprint_orphan);
    }

    #[test]
    fn profile_image_url_is_stable() {
        let user = User::registered("Ada Lovelace", "ada@example.com", Utc::now());
        assert_eq!(user.profile_image_url(), user.profile_image_url());
        assert!(user.profile_image_url().starts_with("https://secure.gravatar.com/avatar/"));
    }
}
