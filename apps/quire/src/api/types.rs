//! # API Request/Response Types
//!
//! JSON:API-shaped documents: every body is `{"data": ...}` and every
//! error is `{"errors": [{"status", "detail"}]}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use quire_core::{
    AcceptableSubject, Campaign, File, FileId, Institution, InstitutionId, License, LicenseId,
    Permission, Preprint, PreprintProjection, Project, ProjectId, Provider, ProviderId,
    QuireError, Subject, SubjectId, User, UserId,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// DOCUMENTS
// =============================================================================

/// Top-level JSON:API document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document<T> {
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl<T> Document<T> {
    pub fn new(data: T) -> Self {
        Self { data, meta: None }
    }

    #[must_use]
    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// A resource object as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource<A> {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub attributes: A,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub links: BTreeMap<String, String>,
}

impl<A> Resource<A> {
    pub fn new(kind: &str, id: impl ToString, attributes: A) -> Self {
        Self {
            id: id.to_string(),
            kind: kind.to_string(),
            attributes,
            links: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_link(mut self, name: &str, href: String) -> Self {
        self.links.insert(name.to_string(), href);
        self
    }
}

/// A resource object sent by a client. `id` is present on updates only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceInput<A> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub attributes: A,
}

impl<A> ResourceInput<A> {
    /// Reject a body whose type (or id, on updates) does not match the URL.
    pub fn check(&self, kind: &str, id: Option<&str>) -> Result<(), ApiError> {
        if self.kind != kind {
            return Err(ApiError::new(
                StatusCode::CONFLICT,
                format!("Resource type '{}' does not match '{}'.", self.kind, kind),
            ));
        }
        if let (Some(expected), Some(given)) = (id, self.id.as_deref()) {
            if expected != given {
                return Err(ApiError::new(
                    StatusCode::CONFLICT,
                    format!("Resource id '{}' does not match '{}'.", given, expected),
                ));
            }
        }
        Ok(())
    }
}

/// Body of a create or update request.
pub type Input<A> = Document<ResourceInput<A>>;

// =============================================================================
// ERRORS
// =============================================================================

/// One entry of an error document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub status: String,
    pub detail: String,
}

/// Error document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDocument {
    pub errors: Vec<ErrorObject>,
}

/// Detail returned for every authentication failure.
pub const AUTHENTICATION_FAILED: &str = "Authentication credentials were not provided or are invalid.";

/// An error on its way to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, AUTHENTICATION_FAILED)
    }

    pub fn forbidden(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, detail)
    }

    pub fn gone(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::GONE, detail)
    }
}

impl From<QuireError> for ApiError {
    fn from(err: QuireError) -> Self {
        let status = match &err {
            QuireError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            QuireError::InvalidState(_) => StatusCode::CONFLICT,
            QuireError::InvalidFile(_)
            | QuireError::InvalidSubject(_)
            | QuireError::InvalidLicense(_) => StatusCode::BAD_REQUEST,
            QuireError::NotFound { .. } => StatusCode::NOT_FOUND,
            QuireError::AuthenticationFailed(_) => return Self::unauthorized(),
            QuireError::InvalidGraph(_)
            | QuireError::SerializationError(_)
            | QuireError::IoError(_) => {
                tracing::error!("Internal error: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorDocument {
            errors: vec![ErrorObject {
                status: self.status.as_u16().to_string(),
                detail: self.detail,
            }],
        };
        (self.status, Json(body)).into_response()
    }
}

// =============================================================================
// RESPONSE ATTRIBUTES
// =============================================================================

/// `users` attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAttributes {
    pub full_name: String,
    pub given_name: String,
    pub middle_names: String,
    pub family_name: String,
    pub suffix: String,
    pub active: bool,
    pub date_registered: Option<DateTime<Utc>>,
    pub profile_image: String,
    pub institutions: Vec<InstitutionId>,
}

impl From<&User> for UserAttributes {
    fn from(user: &User) -> Self {
        Self {
            full_name: user.fullname.clone(),
            given_name: user.given_name.clone(),
            middle_names: user.middle_names.clone(),
            family_name: user.family_name.clone(),
            suffix: user.suffix.clone(),
            active: user.is_registered && !user.is_disabled,
            date_registered: user.date_registered,
            profile_image: user.profile_image_url(),
            institutions: user.affiliated_institutions.clone(),
        }
    }
}

/// `institutions` attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstitutionAttributes {
    pub name: String,
    pub description: String,
}

impl From<&Institution> for InstitutionAttributes {
    fn from(institution: &Institution) -> Self {
        Self {
            name: institution.name.clone(),
            description: institution.description.clone(),
        }
    }
}

/// `preprint_providers` attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderAttributes {
    pub name: String,
    pub description: String,
    pub logo_path: String,
    pub banner_path: String,
    pub external_url: String,
}

impl From<&Provider> for ProviderAttributes {
    fn from(provider: &Provider) -> Self {
        Self {
            name: provider.name.clone(),
            description: provider.description.clone(),
            logo_path: provider.logo_path.clone(),
            banner_path: provider.banner_path.clone(),
            external_url: provider.external_url.clone(),
        }
    }
}

/// `preprints` attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprintAttributes {
    pub node: ProjectId,
    pub provider: Option<ProviderId>,
    pub primary_file: Option<FileId>,
    pub subjects: Vec<Vec<SubjectId>>,
    pub license: Option<LicenseId>,
    pub doi: Option<String>,
    pub is_published: bool,
    pub is_preprint_orphan: bool,
    pub date_created: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
    pub date_published: Option<DateTime<Utc>>,
}

impl PreprintAttributes {
    pub fn new(preprint: &Preprint, projection: PreprintProjection) -> Self {
        Self {
            node: preprint.node.clone(),
            provider: preprint.provider.clone(),
            primary_file: preprint.primary_file.clone(),
            subjects: preprint.subjects.clone(),
            license: preprint.license.clone(),
            doi: preprint.article_doi.clone(),
            is_published: preprint.is_published,
            is_preprint_orphan: projection.is_preprint_orphan,
            date_created: preprint.date_created,
            date_modified: preprint.date_modified,
            date_published: preprint.date_published,
        }
    }
}

/// `subjects` attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectAttributes {
    pub text: String,
    pub parents: Vec<SubjectId>,
}

impl From<&Subject> for SubjectAttributes {
    fn from(subject: &Subject) -> Self {
        Self {
            text: subject.text.clone(),
            parents: subject.parents.clone(),
        }
    }
}

/// `licenses` attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseAttributes {
    pub name: String,
    pub text: String,
}

impl From<&License> for LicenseAttributes {
    fn from(license: &License) -> Self {
        Self {
            name: license.name.clone(),
            text: license.text.clone(),
        }
    }
}

/// `nodes` attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectAttributes {
    pub title: String,
    pub description: String,
    pub public: bool,
    pub tags: Vec<String>,
    pub date_created: DateTime<Utc>,
}

impl From<&Project> for ProjectAttributes {
    fn from(project: &Project) -> Self {
        Self {
            title: project.title.clone(),
            description: project.description.clone(),
            public: project.is_public,
            tags: project.tags.clone(),
            date_created: project.date_created,
        }
    }
}

/// `files` attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAttributes {
    pub name: String,
    pub path: String,
    pub node: ProjectId,
}

impl From<&File> for FileAttributes {
    fn from(file: &File) -> Self {
        Self {
            name: file.name.clone(),
            path: file.path.clone(),
            node: file.project.clone(),
        }
    }
}

/// `campaigns` attributes.
pub type CampaignAttributes = Campaign;

// =============================================================================
// REQUEST ATTRIBUTES
// =============================================================================

/// Editable preprint fields. Absent fields are left alone.
///
/// An empty `doi` clears the DOI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprintChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_file: Option<FileId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subjects: Option<Vec<Vec<SubjectId>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<LicenseId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_published: Option<bool>,
}

/// `POST /v2/preprints` attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPreprint {
    pub node: ProjectId,
    #[serde(flatten)]
    pub changes: PreprintChanges,
}

/// `GET /v2/preprint_providers/{id}/taxonomies` query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaxonomyQuery {
    /// `null` for top-level subjects, or a parent subject id.
    #[serde(rename = "filter[parents]")]
    pub parents: Option<String>,
}

// =============================================================================
// ADMIN ATTRIBUTES
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInstitution {
    pub id: InstitutionId,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProvider {
    pub id: ProviderId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub logo_path: String,
    #[serde(default)]
    pub banner_path: String,
    #[serde(default)]
    pub external_url: String,
    #[serde(default)]
    pub subjects_acceptable: Vec<AcceptableSubject>,
    #[serde(default)]
    pub licenses_acceptable: Vec<LicenseId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSubject {
    #[serde(default)]
    pub id: Option<SubjectId>,
    pub text: String,
    #[serde(default)]
    pub parents: Vec<SubjectId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLicense {
    #[serde(default)]
    pub id: Option<LicenseId>,
    pub name: String,
    #[serde(default)]
    pub text: String,
}

/// A user; registered when `username` is given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub fullname: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub institutions: Vec<InstitutionId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewContributor {
    pub user: UserId,
    #[serde(default)]
    pub permission: Permission,
    #[serde(default = "visible_by_default")]
    pub visible: bool,
}

fn visible_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProject {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub creator: UserId,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub contributors: Vec<NewContributor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFile {
    pub node: ProjectId,
    pub name: String,
    /// Contributor uploading the file.
    pub actor: UserId,
}

// =============================================================================
// TESTS
// =============================================================================
