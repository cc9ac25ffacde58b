//! # API Endpoint Handlers
//!
//! Handlers lock the shared platform, call into `quire-core` and shape the
//! result as JSON:API documents. Every rule lives in the core; handlers
//! only check who is asking.

use super::{
    AppState,
    auth::Viewer,
    types::{
        ApiError, CampaignAttributes, Document, FileAttributes, HealthResponse, Input,
        InstitutionAttributes, LicenseAttributes, NewFile, NewInstitution, NewLicense,
        NewPreprint, NewProject, NewProvider, NewSubject, NewUser, PreprintAttributes,
        PreprintChanges, ProjectAttributes, ProviderAttributes, Resource, SubjectAttributes,
        TaxonomyQuery, UserAttributes,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use quire_core::{
    File, Institution, License, MetadataGraph, Platform, Preprint, PreprintEditor, PreprintId,
    PreprintProjection, Project, Provider, QuireError, Subject, SubjectId, User, UserId, query,
    taxonomy,
};
use serde_json::json;

type ApiResult<T> = Result<T, ApiError>;
type One<A> = Json<Document<Resource<A>>>;
type Many<A> = Json<Document<Vec<Resource<A>>>>;
type Created<A> = (StatusCode, One<A>);

fn one<A>(resource: Resource<A>) -> One<A> {
    Json(Document::new(resource))
}

fn created<A>(resource: Resource<A>) -> Created<A> {
    (StatusCode::CREATED, one(resource))
}

// =============================================================================
// RESOURCE BUILDERS
// =============================================================================

fn user_resource(platform: &Platform, user: &User) -> Resource<UserAttributes> {
    Resource::new("users", &user.id, UserAttributes::from(user)).with_link(
        "html",
        platform.current_settings().absolute_url(&user.profile_url()),
    )
}

fn preprint_resource(
    platform: &Platform,
    preprint: &Preprint,
) -> ApiResult<Resource<PreprintAttributes>> {
    let project = platform.require::<Project>(preprint.node.as_str())?;
    let file = match &preprint.primary_file {
        Some(id) => platform.get::<File>(id.as_str())?,
        None => None,
    };
    let projection = PreprintProjection::compute(preprint, &project, file.as_ref());
    Ok(Resource::new(
        "preprints",
        &preprint.id,
        PreprintAttributes::new(preprint, projection),
    )
    .with_link(
        "html",
        platform.current_settings().absolute_url(&preprint.url()),
    ))
}

fn provider_resource(provider: &Provider) -> Resource<ProviderAttributes> {
    Resource::new("preprint_providers", &provider.id, ProviderAttributes::from(provider))
}

fn subject_resources(subjects: &[Subject]) -> Vec<Resource<SubjectAttributes>> {
    subjects
        .iter()
        .map(|s| Resource::new("subjects", &s.id, SubjectAttributes::from(s)))
        .collect()
}

fn license_resources(licenses: &[License]) -> Vec<Resource<LicenseAttributes>> {
    licenses
        .iter()
        .map(|l| Resource::new("licenses", &l.id, LicenseAttributes::from(l)))
        .collect()
}

/// Anonymous viewers get 401, signed-in viewers 403.
fn ensure_visible(platform: &Platform, preprint: &Preprint, viewer: &Viewer) -> ApiResult<()> {
    if platform.can_view_preprint(preprint, viewer.id())? {
        return Ok(());
    }
    match viewer.0 {
        None => Err(ApiError::unauthorized()),
        Some(_) => Err(ApiError::forbidden(
            "You do not have permission to perform this action.",
        )),
    }
}

/// Apply requested changes in a fixed order, publishing last, then save.
///
/// Nothing is saved when any change is rejected.
fn apply_changes(
    editor: &mut PreprintEditor<'_>,
    changes: &PreprintChanges,
    actor: &UserId,
) -> Result<bool, QuireError> {
    if let Some(provider) = &changes.provider {
        editor.set_provider(provider, actor, false)?;
    }
    if let Some(file) = &changes.primary_file {
        editor.set_primary_file(file, actor, false)?;
    }
    if let Some(subjects) = &changes.subjects {
        editor.set_subjects(subjects, actor, false)?;
    }
    if let Some(license) = &changes.license {
        editor.set_license(license, actor, false)?;
    }
    if let Some(doi) = &changes.doi {
        editor.set_doi(Some(doi.as_str()), actor, false)?;
    }
    if let Some(published) = changes.is_published {
        editor.set_published(published, actor, false)?;
    }
    editor.save(false)
}

// =============================================================================
// HEALTH
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// INSTITUTION LOGIN & USERS
// =============================================================================

/// Exchange an encrypted institution token for a user and access token.
pub async fn institution_auth_handler(
    State(state): State<AppState>,
    body: String,
) -> ApiResult<One<UserAttributes>> {
    let mut platform = state.platform.write().await;
    match platform.authenticate_institution(body.trim()) {
        Ok(login) => {
            tracing::info!(
                user = %login.user.id,
                institution = %login.institution.id,
                created = login.created,
                "Institution login"
            );
            let document = Document::new(user_resource(&platform, &login.user)).with_meta(json!({
                "access_token": login.token.token,
                "institution": login.institution.id,
                "created": login.created,
            }));
            Ok(Json(document))
        }
        Err(e) => {
            tracing::warn!(
                event = "auth_failure",
                reason = "institution_token",
                "Institution login failed: {}",
                e
            );
            Err(e.into())
        }
    }
}

/// The signed-in user.
pub async fn me_handler(
    State(state): State<AppState>,
    viewer: Viewer,
) -> ApiResult<One<UserAttributes>> {
    let user = viewer.require()?;
    let platform = state.platform.read().await;
    Ok(one(user_resource(&platform, &user)))
}

/// Any user; disabled accounts are gone.
pub async fn user_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<One<UserAttributes>> {
    let platform = state.platform.read().await;
    let user = platform.require::<User>(&id)?;
    if user.is_disabled {
        return Err(ApiError::gone("This user has been deactivated."));
    }
    Ok(one(user_resource(&platform, &user)))
}

// =============================================================================
// PROVIDERS
// =============================================================================

/// Every provider, sorted by name.
pub async fn providers_handler(
    State(state): State<AppState>,
) -> ApiResult<Many<ProviderAttributes>> {
    let platform = state.platform.read().await;
    let providers = query::providers_by_name(platform.store())?;
    Ok(Json(Document::new(
        providers.iter().map(provider_resource).collect(),
    )))
}

pub async fn provider_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<One<ProviderAttributes>> {
    let platform = state.platform.read().await;
    let provider = platform.require::<Provider>(&id)?;
    Ok(one(provider_resource(&provider)))
}

/// Preprints of a provider the viewer may see, newest first.
pub async fn provider_preprints_handler(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<String>,
) -> ApiResult<Many<PreprintAttributes>> {
    let platform = state.platform.read().await;
    let provider = platform.require::<Provider>(&id)?;
    let preprints = query::provider_preprints(platform.store(), &provider.id, viewer.id())?;
    let resources = preprints
        .iter()
        .map(|p| preprint_resource(&platform, p))
        .collect::<ApiResult<Vec<_>>>()?;
    Ok(Json(
        Document::new(resources).with_meta(json!({ "total": preprints.len() })),
    ))
}

/// Subjects a provider accepts.
///
/// `filter[parents]=null` lists top-level subjects, `filter[parents]=<id>`
/// the children of `<id>`, and no filter every acceptable subject.
pub async fn provider_taxonomies_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(filter): Query<TaxonomyQuery>,
) -> ApiResult<Many<SubjectAttributes>> {
    let platform = state.platform.read().await;
    let provider = platform.require::<Provider>(&id)?;
    let store = platform.store();
    let subjects = match filter.parents.as_deref() {
        Some("null") => taxonomy::top_level_subjects(store, &provider)?,
        Some(parent) => taxonomy::children_of(store, &provider, &SubjectId::new(parent))?,
        None => taxonomy::all_subjects(store, &provider)?,
    };
    Ok(Json(Document::new(subject_resources(&subjects))))
}

/// Licenses a provider accepts.
pub async fn provider_licenses_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Many<LicenseAttributes>> {
    let platform = state.platform.read().await;
    let provider = platform.require::<Provider>(&id)?;
    let licenses = query::provider_licenses(platform.store(), &provider)?;
    Ok(Json(Document::new(license_resources(&licenses))))
}

// =============================================================================
// PREPRINTS
// =============================================================================

/// Create a preprint for a project the viewer administers.
pub async fn create_preprint_handler(
    State(state): State<AppState>,
    viewer: Viewer,
    Json(body): Json<Input<NewPreprint>>,
) -> ApiResult<Created<PreprintAttributes>> {
    let user = viewer.require()?;
    body.data.check("preprints", None)?;
    let NewPreprint { node, changes } = body.data.attributes;

    let mut platform = state.platform.write().await;
    let preprint = platform.create_preprint(&node, changes.provider.as_ref(), &user.id)?;
    let preprint = {
        let mut editor = platform.edit_preprint(&preprint.id)?;
        apply_changes(&mut editor, &changes, &user.id)?;
        editor.preprint().clone()
    };
    tracing::info!(preprint = %preprint.id, node = %node, "Preprint created");
    Ok(created(preprint_resource(&platform, &preprint)?))
}

pub async fn preprint_handler(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<String>,
) -> ApiResult<One<PreprintAttributes>> {
    let platform = state.platform.read().await;
    let preprint = platform.require::<Preprint>(&id)?;
    ensure_visible(&platform, &preprint, &viewer)?;
    Ok(one(preprint_resource(&platform, &preprint)?))
}

/// Update a preprint. Only project admins may edit.
pub async fn update_preprint_handler(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<String>,
    Json(body): Json<Input<PreprintChanges>>,
) -> ApiResult<One<PreprintAttributes>> {
    let user = viewer.require()?;
    body.data.check("preprints", Some(&id))?;
    let changes = body.data.attributes;

    let mut platform = state.platform.write().await;
    let (preprint, dispatched) = {
        let mut editor = platform.edit_preprint(&PreprintId::new(id))?;
        if !editor.project().is_admin(&user.id) {
            return Err(ApiError::forbidden(
                "User must be an admin to update a preprint.",
            ));
        }
        let dispatched = apply_changes(&mut editor, &changes, &user.id)?;
        (editor.preprint().clone(), dispatched)
    };
    tracing::info!(preprint = %preprint.id, dispatched, "Preprint updated");
    Ok(one(preprint_resource(&platform, &preprint)?))
}

/// The metadata graph the index would receive.
pub async fn preprint_metadata_handler(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<String>,
) -> ApiResult<Json<Document<MetadataGraph>>> {
    let platform = state.platform.read().await;
    let preprint = platform.require::<Preprint>(&id)?;
    ensure_visible(&platform, &preprint, &viewer)?;
    Ok(Json(Document::new(platform.format_preprint(&preprint.id)?)))
}

// =============================================================================
// SUBJECTS, LICENSES & CAMPAIGNS
// =============================================================================

pub async fn subject_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<One<SubjectAttributes>> {
    let platform = state.platform.read().await;
    let subject = platform.require::<Subject>(&id)?;
    Ok(one(Resource::new(
        "subjects",
        &subject.id,
        SubjectAttributes::from(&subject),
    )))
}

/// Every license, sorted by name.
pub async fn licenses_handler(
    State(state): State<AppState>,
) -> ApiResult<Many<LicenseAttributes>> {
    let platform = state.platform.read().await;
    let mut licenses = platform.all::<License>()?;
    licenses.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(Json(Document::new(license_resources(&licenses))))
}

/// Look up one campaign by name.
pub async fn campaign_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<One<CampaignAttributes>> {
    let platform = state.platform.read().await;
    let before = platform.campaigns_refreshed_at();
    let table = platform.campaigns()?;
    if platform.campaigns_refreshed_at() != before {
        tracing::info!(campaigns = table.len(), "Campaign table rebuilt");
    }
    let campaign = table
        .get(&name)
        .cloned()
        .ok_or_else(|| QuireError::not_found("Campaign", &name))?;
    Ok(one(Resource::new("campaigns", &name, campaign)))
}

// =============================================================================
// ADMIN: SEEDING
// =============================================================================

pub async fn admin_institution_handler(
    State(state): State<AppState>,
    Json(body): Json<Input<NewInstitution>>,
) -> ApiResult<Created<InstitutionAttributes>> {
    body.data.check("institutions", None)?;
    let attrs = body.data.attributes;
    let mut institution = Institution::new(attrs.id.as_str(), attrs.name);
    institution.description = attrs.description;

    state.platform.write().await.add_institution(&institution)?;
    tracing::info!(institution = %institution.id, "Institution added");
    Ok(created(Resource::new(
        "institutions",
        &institution.id,
        InstitutionAttributes::from(&institution),
    )))
}

pub async fn admin_provider_handler(
    State(state): State<AppState>,
    Json(body): Json<Input<NewProvider>>,
) -> ApiResult<Created<ProviderAttributes>> {
    body.data.check("preprint_providers", None)?;
    let attrs = body.data.attributes;
    let mut provider = Provider::new(attrs.id.as_str(), attrs.name);
    provider.description = attrs.description;
    provider.logo_path = attrs.logo_path;
    provider.banner_path = attrs.banner_path;
    provider.external_url = attrs.external_url;
    provider.subjects_acceptable = attrs.subjects_acceptable;
    provider.licenses_acceptable = attrs.licenses_acceptable;

    state.platform.write().await.add_provider(&provider)?;
    tracing::info!(provider = %provider.id, "Provider added; campaign table invalidated");
    Ok(created(provider_resource(&provider)))
}

pub async fn admin_subject_handler(
    State(state): State<AppState>,
    Json(body): Json<Input<NewSubject>>,
) -> ApiResult<Created<SubjectAttributes>> {
    body.data.check("subjects", None)?;
    let attrs = body.data.attributes;
    let mut subject = Subject::new(attrs.text);
    if let Some(id) = attrs.id {
        subject.id = id;
    }
    subject.parents = attrs.parents;

    state.platform.write().await.add_subject(&subject)?;
    Ok(created(Resource::new(
        "subjects",
        &subject.id,
        SubjectAttributes::from(&subject),
    )))
}

pub async fn admin_license_handler(
    State(state): State<AppState>,
    Json(body): Json<Input<NewLicense>>,
) -> ApiResult<Created<LicenseAttributes>> {
    body.data.check("licenses", None)?;
    let attrs = body.data.attributes;
    let mut license = License::new(attrs.name);
    if let Some(id) = attrs.id {
        license.id = id;
    }
    license.text = attrs.text;

    state.platform.write().await.add_license(&license)?;
    Ok(created(Resource::new(
        "licenses",
        &license.id,
        LicenseAttributes::from(&license),
    )))
}

/// Create a user. Active registered users get an access token in `meta`.
pub async fn admin_user_handler(
    State(state): State<AppState>,
    Json(body): Json<Input<NewUser>>,
) -> ApiResult<Created<UserAttributes>> {
    body.data.check("users", None)?;
    let attrs = body.data.attributes;

    let mut platform = state.platform.write().await;
    let mut user = match attrs.username {
        Some(username) => User::registered(attrs.fullname, username, platform.now()),
        None => User::unregistered(attrs.fullname),
    };
    user.is_disabled = attrs.disabled;
    for institution in attrs.institutions {
        platform.require::<Institution>(institution.as_str())?;
        if !user.is_affiliated_with(&institution) {
            user.affiliated_institutions.push(institution);
        }
    }
    platform.add_user(&user)?;

    let mut document = Document::new(user_resource(&platform, &user));
    if user.is_registered && !user.is_disabled {
        let token = platform.issue_token(&user.id)?;
        document = document.with_meta(json!({ "access_token": token.token }));
    }
    tracing::info!(user = %user.id, registered = user.is_registered, "User added");
    Ok((StatusCode::CREATED, Json(document)))
}

/// Create a project with contributors and tags added by its creator.
pub async fn admin_project_handler(
    State(state): State<AppState>,
    Json(body): Json<Input<NewProject>>,
) -> ApiResult<Created<ProjectAttributes>> {
    body.data.check("nodes", None)?;
    let attrs = body.data.attributes;
    let creator = attrs.creator;

    let mut platform = state.platform.write().await;
    let project = platform.create_project(&attrs.title, &attrs.description, &creator)?;
    for contributor in &attrs.contributors {
        platform.add_contributor(
            &project.id,
            &contributor.user,
            contributor.permission,
            contributor.visible,
            &creator,
        )?;
    }
    for tag in &attrs.tags {
        platform.add_tag(&project.id, tag, &creator)?;
    }
    if attrs.public {
        platform.set_project_public(&project.id, true, &creator)?;
    }

    let project = platform.require::<Project>(project.id.as_str())?;
    Ok(created(Resource::new(
        "nodes",
        &project.id,
        ProjectAttributes::from(&project),
    )))
}

pub async fn admin_file_handler(
    State(state): State<AppState>,
    Json(body): Json<Input<NewFile>>,
) -> ApiResult<Created<FileAttributes>> {
    body.data.check("files", None)?;
    let attrs = body.data.attributes;
    let file = state
        .platform
        .write()
        .await
        .add_file(&attrs.node, &attrs.name, &attrs.actor)?;
    Ok(created(Resource::new(
        "files",
        &file.id,
        FileAttributes::from(&file),
    )))
}

// =============================================================================
// ADMIN: FORCED EXPORT
// =============================================================================

/// Re-export a preprint whatever its state.
pub async fn force_update_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, One<PreprintAttributes>)> {
    let mut platform = state.platform.write().await;
    let id = PreprintId::new(id);
    platform.force_update(&id)?;
    let preprint = platform.require::<Preprint>(id.as_str())?;
    tracing::info!(preprint = %preprint.id, "Forced metadata export");
    Ok((
        StatusCode::ACCEPTED,
        one(preprint_resource(&platform, &preprint)?),
    ))
}
