//! Integration tests for the Quire HTTP API.
//!
//! Uses axum-test to drive the router without starting a real server.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use axum::http::{HeaderValue, StatusCode, header};
use axum_test::{TestResponse, TestServer};
use quire::api::{AUTHENTICATION_FAILED, AppState, ErrorDocument, HealthResponse, create_router};
use quire::config::SecurityConfig;
use quire_core::{
    InstitutionPayload, Platform, PreprintId, RecordingSink, Settings, TokenProvider, TokenUser,
    seal_token,
};
use serde_json::{Value, json};
use std::sync::Arc;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

struct Harness {
    server: TestServer,
    exports: Arc<RecordingSink>,
}

fn open_security() -> SecurityConfig {
    SecurityConfig {
        rate_limit: 0,
        ..SecurityConfig::default()
    }
}

fn harness_with(security: SecurityConfig) -> Harness {
    let exports = Arc::new(RecordingSink::new());
    let platform = Platform::new().export_sink(exports.clone());
    let router = create_router(AppState::new(platform), &security);
    Harness {
        server: TestServer::new(router).unwrap(),
        exports,
    }
}

fn harness() -> Harness {
    harness_with(open_security())
}

fn bearer(token: &str) -> HeaderValue {
    format!("Bearer {}", token).parse::<HeaderValue>().unwrap()
}

fn doc(kind: &str, attributes: Value) -> Value {
    json!({ "data": { "type": kind, "attributes": attributes } })
}

fn error_detail(response: &TestResponse) -> String {
    let errors: ErrorDocument = response.json();
    errors.errors[0].detail.clone()
}

async fn admin(server: &TestServer, path: &str, kind: &str, attributes: Value) -> Value {
    let response = server
        .post(&format!("/v2/admin/{}", path))
        .json(&doc(kind, attributes))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json()
}

/// A registered user; returns (id, access token).
async fn seed_user(server: &TestServer, fullname: &str, username: &str) -> (String, String) {
    let body = admin(
        server,
        "users",
        "users",
        json!({ "fullname": fullname, "username": username }),
    )
    .await;
    (
        body["data"]["id"].as_str().unwrap().to_string(),
        body["meta"]["access_token"].as_str().unwrap().to_string(),
    )
}

struct World {
    owner: String,
    owner_token: String,
    reader_token: String,
    stranger_token: String,
    project: String,
    file: String,
    preprint: String,
}

/// Provider `osf`, subjects Biology > Genetics and Physics, a CC-BY
/// license, a private project with a file and an unpublished preprint.
async fn world(server: &TestServer) -> World {
    admin(server, "licenses", "licenses", json!({ "id": "cc-by", "name": "CC-BY 4.0" })).await;
    admin(server, "licenses", "licenses", json!({ "id": "cc0", "name": "CC0 1.0" })).await;
    admin(server, "subjects", "subjects", json!({ "id": "biology", "text": "Biology" })).await;
    admin(
        server,
        "subjects",
        "subjects",
        json!({ "id": "genetics", "text": "Genetics", "parents": ["biology"] }),
    )
    .await;
    admin(server, "subjects", "subjects", json!({ "id": "physics", "text": "Physics" })).await;
    admin(
        server,
        "providers",
        "preprint_providers",
        json!({ "id": "osf", "name": "OSF", "licenses_acceptable": ["cc-by"] }),
    )
    .await;

    let (owner, owner_token) = seed_user(server, "Ada Lovelace", "ada@example.com").await;
    let (reader, reader_token) = seed_user(server, "Mary Somerville", "mary@example.com").await;
    let (_, stranger_token) = seed_user(server, "Charles Babbage", "charles@example.com").await;

    let project = admin(
        server,
        "projects",
        "nodes",
        json!({
            "title": "Engines",
            "creator": owner,
            "tags": ["engines"],
            "contributors": [{ "user": reader, "permission": "read" }],
        }),
    )
    .await;
    let project = project["data"]["id"].as_str().unwrap().to_string();

    let file = admin(
        server,
        "files",
        "files",
        json!({ "node": project, "name": "paper.pdf", "actor": owner }),
    )
    .await;
    let file = file["data"]["id"].as_str().unwrap().to_string();

    let response = server
        .post("/v2/preprints")
        .add_header(header::AUTHORIZATION, bearer(&owner_token))
        .json(&doc("preprints", json!({ "node": project, "provider": "osf" })))
        .await;
    response.assert_status(StatusCode::CREATED);
    let preprint: Value = response.json();
    let preprint = preprint["data"]["id"].as_str().unwrap().to_string();

    World {
        owner,
        owner_token,
        reader_token,
        stranger_token,
        project,
        file,
        preprint,
    }
}

async fn patch_preprint(server: &TestServer, w: &World, attributes: Value) -> TestResponse {
    server
        .patch(&format!("/v2/preprints/{}", w.preprint))
        .add_header(header::AUTHORIZATION, bearer(&w.owner_token))
        .json(&json!({ "data": { "id": w.preprint, "type": "preprints", "attributes": attributes } }))
        .await
}

async fn publish(server: &TestServer, w: &World) {
    let response = patch_preprint(
        server,
        w,
        json!({ "primary_file": w.file, "subjects": [["biology", "genetics"]], "is_published": true }),
    )
    .await;
    response.assert_status_ok();
}

fn sealed(institution: &str, username: &str) -> String {
    let settings = Settings::default();
    let payload = InstitutionPayload {
        provider: TokenProvider {
            idp: "https://idp.circle.example.edu".to_string(),
            id: institution.to_string(),
            user: TokenUser {
                fullname: "Ada Lovelace".to_string(),
                username: username.to_string(),
                ..TokenUser::default()
            },
        },
    };
    seal_token(&payload, &settings.jwe_secret, &settings.jwt_secret).unwrap()
}

// =============================================================================
// HEALTH & ROUTING
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let h = harness();
    let response = h.server.get("/health").await;
    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_404_on_unknown_endpoint() {
    let h = harness();
    h.server.get("/unknown").await.assert_status_not_found();
}

#[tokio::test]
async fn test_method_not_allowed() {
    let h = harness();
    let response = h.server.post("/health").await;
    assert_eq!(response.status_code(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_invalid_json_body() {
    let h = harness();
    let response = h
        .server
        .post("/v2/admin/providers")
        .text("not valid json")
        .content_type("application/json")
        .await;
    assert!(response.status_code().is_client_error());
}

// =============================================================================
// PUBLICATION FLOW
// =============================================================================

#[tokio::test]
async fn test_publish_dispatches_once() {
    let h = harness();
    let w = world(&h.server).await;
    let id = PreprintId::new(w.preprint.clone());
    assert_eq!(h.exports.count_for(&id), 0);

    publish(&h.server, &w).await;
    assert_eq!(h.exports.count_for(&id), 1);

    let body: Value = h
        .server
        .get(&format!("/v2/preprints/{}", w.preprint))
        .await
        .json();
    let attributes = &body["data"]["attributes"];
    assert_eq!(attributes["is_published"], true);
    assert_eq!(attributes["is_preprint_orphan"], false);
    assert!(attributes["date_published"].is_string());
    assert_eq!(body["data"]["type"], "preprints");
}

#[tokio::test]
async fn test_force_update_dispatches_again() {
    let h = harness();
    let w = world(&h.server).await;
    let id = PreprintId::new(w.preprint.clone());
    publish(&h.server, &w).await;

    let response = h
        .server
        .post(&format!("/v2/admin/preprints/{}/force_update", w.preprint))
        .await;
    response.assert_status(StatusCode::ACCEPTED);
    let body: Value = response.json();
    assert_eq!(body["data"]["attributes"]["is_published"], true);
    assert_eq!(h.exports.count_for(&id), 2);
}

#[tokio::test]
async fn test_force_update_unpublished_still_dispatches() {
    let h = harness();
    let w = world(&h.server).await;
    h.server
        .post(&format!("/v2/admin/preprints/{}/force_update", w.preprint))
        .await
        .assert_status(StatusCode::ACCEPTED);
    assert_eq!(h.exports.count_for(&PreprintId::new(w.preprint.clone())), 1);
}

#[tokio::test]
async fn test_unpublish_conflicts() {
    let h = harness();
    let w = world(&h.server).await;
    publish(&h.server, &w).await;

    let response = patch_preprint(&h.server, &w, json!({ "is_published": false })).await;
    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(error_detail(&response), "Cannot unpublish preprint.");
    let errors: ErrorDocument = response.json();
    assert_eq!(errors.errors[0].status, "409");
}

#[tokio::test]
async fn test_publish_without_subjects_rejected_and_nothing_saved() {
    let h = harness();
    let w = world(&h.server).await;

    let response = patch_preprint(
        &h.server,
        &w,
        json!({ "primary_file": w.file, "is_published": true }),
    )
    .await;
    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(
        error_detail(&response),
        "Preprint must have at least one subject to be published."
    );

    let body: Value = h
        .server
        .get(&format!("/v2/preprints/{}", w.preprint))
        .add_header(header::AUTHORIZATION, bearer(&w.owner_token))
        .await
        .json();
    assert_eq!(body["data"]["attributes"]["is_published"], false);
    assert!(body["data"]["attributes"]["primary_file"].is_null());
    assert_eq!(h.exports.dispatched().len(), 0);
}

#[tokio::test]
async fn test_foreign_file_rejected() {
    let h = harness();
    let w = world(&h.server).await;
    let other = admin(
        &h.server,
        "projects",
        "nodes",
        json!({ "title": "Other", "creator": w.owner }),
    )
    .await;
    let other_file = admin(
        &h.server,
        "files",
        "files",
        json!({ "node": other["data"]["id"], "name": "x.pdf", "actor": w.owner }),
    )
    .await;

    let response = patch_preprint(
        &h.server,
        &w,
        json!({ "primary_file": other_file["data"]["id"] }),
    )
    .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        error_detail(&response),
        "Invalid file: This file is not a valid primary file for this preprint."
    );
}

#[tokio::test]
async fn test_invalid_subject_hierarchy_rejected() {
    let h = harness();
    let w = world(&h.server).await;
    let response = patch_preprint(&h.server, &w, json!({ "subjects": [["genetics"]] })).await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_license_must_be_acceptable() {
    let h = harness();
    let w = world(&h.server).await;

    patch_preprint(&h.server, &w, json!({ "license": "cc0" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    let response = patch_preprint(&h.server, &w, json!({ "license": "cc-by" })).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["attributes"]["license"], "cc-by");
}

#[tokio::test]
async fn test_doi_set_and_cleared() {
    let h = harness();
    let w = world(&h.server).await;

    let body: Value = patch_preprint(&h.server, &w, json!({ "doi": " 10.1234/engines " }))
        .await
        .json();
    assert_eq!(body["data"]["attributes"]["doi"], "10.1234/engines");

    let body: Value = patch_preprint(&h.server, &w, json!({ "doi": "" })).await.json();
    assert!(body["data"]["attributes"]["doi"].is_null());
}

#[tokio::test]
async fn test_non_admin_cannot_edit() {
    let h = harness();
    let w = world(&h.server).await;
    let response = h
        .server
        .patch(&format!("/v2/preprints/{}", w.preprint))
        .add_header(header::AUTHORIZATION, bearer(&w.reader_token))
        .json(&doc("preprints", json!({ "is_published": true })))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_patch_requires_login() {
    let h = harness();
    let w = world(&h.server).await;
    let response = h
        .server
        .patch(&format!("/v2/preprints/{}", w.preprint))
        .json(&doc("preprints", json!({ "doi": "10.1/x" })))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_type_mismatch_conflicts() {
    let h = harness();
    let w = world(&h.server).await;
    let response = h
        .server
        .patch(&format!("/v2/preprints/{}", w.preprint))
        .add_header(header::AUTHORIZATION, bearer(&w.owner_token))
        .json(&doc("nodes", json!({})))
        .await;
    response.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_second_preprint_for_provider_conflicts() {
    let h = harness();
    let w = world(&h.server).await;
    let response = h
        .server
        .post("/v2/preprints")
        .add_header(header::AUTHORIZATION, bearer(&w.owner_token))
        .json(&doc("preprints", json!({ "node": w.project, "provider": "osf" })))
        .await;
    response.assert_status(StatusCode::CONFLICT);
}

// =============================================================================
// VISIBILITY
// =============================================================================

#[tokio::test]
async fn test_unpublished_preprint_visibility() {
    let h = harness();
    let w = world(&h.server).await;
    let path = format!("/v2/preprints/{}", w.preprint);

    h.server.get(&path).await.assert_status(StatusCode::UNAUTHORIZED);
    h.server
        .get(&path)
        .add_header(header::AUTHORIZATION, bearer(&w.stranger_token))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    h.server
        .get(&path)
        .add_header(header::AUTHORIZATION, bearer(&w.reader_token))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    h.server
        .get(&path)
        .add_header(header::AUTHORIZATION, bearer(&w.owner_token))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_provider_listing_filters_by_viewer() {
    let h = harness();
    let w = world(&h.server).await;
    let path = "/v2/preprint_providers/osf/preprints";

    let anonymous: Value = h.server.get(path).await.json();
    assert_eq!(anonymous["data"].as_array().unwrap().len(), 0);
    let owner: Value = h
        .server
        .get(path)
        .add_header(header::AUTHORIZATION, bearer(&w.owner_token))
        .await
        .json();
    assert_eq!(owner["data"].as_array().unwrap().len(), 1);

    publish(&h.server, &w).await;
    let anonymous: Value = h.server.get(path).await.json();
    assert_eq!(anonymous["data"].as_array().unwrap().len(), 1);
    assert_eq!(anonymous["meta"]["total"], 1);
}

#[tokio::test]
async fn test_unknown_bearer_token_rejected() {
    let h = harness();
    let response = h
        .server
        .get("/v2/preprint_providers/osf/preprints")
        .add_header(header::AUTHORIZATION, bearer("not-a-token"))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(error_detail(&response), AUTHENTICATION_FAILED);
}

#[tokio::test]
async fn test_metadata_graph_for_published_preprint() {
    let h = harness();
    let w = world(&h.server).await;
    publish(&h.server, &w).await;

    let response = h
        .server
        .get(&format!("/v2/preprints/{}/metadata", w.preprint))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    let nodes = body["data"].as_array().unwrap();
    assert_eq!(nodes[0]["@type"], "preprint");
    assert_eq!(nodes[0]["title"], "Engines");
    let people = nodes.iter().filter(|n| n["@type"] == "person").count();
    assert_eq!(people, 2);
    let subjects = nodes.iter().filter(|n| n["@type"] == "subject").count();
    assert_eq!(subjects, 2);
}

// =============================================================================
// PROVIDERS, TAXONOMIES & LICENSES
// =============================================================================

#[tokio::test]
async fn test_providers_sorted_by_name() {
    let h = harness();
    admin(&h.server, "providers", "preprint_providers", json!({ "id": "socarxiv", "name": "SocArXiv" })).await;
    admin(&h.server, "providers", "preprint_providers", json!({ "id": "agrixiv", "name": "AgriXiv" })).await;

    let body: Value = h.server.get("/v2/preprint_providers").await.json();
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["attributes"]["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["AgriXiv", "SocArXiv"]);

    h.server
        .get("/v2/preprint_providers/nope")
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_taxonomy_filters() {
    let h = harness();
    world(&h.server).await;
    let texts = |body: &Value| -> Vec<String> {
        body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["attributes"]["text"].as_str().unwrap().to_string())
            .collect()
    };
    let path = "/v2/preprint_providers/osf/taxonomies";

    let all: Value = h.server.get(path).await.json();
    assert_eq!(texts(&all), vec!["Biology", "Genetics", "Physics"]);

    let top: Value = h
        .server
        .get(path)
        .add_query_param("filter[parents]", "null")
        .await
        .json();
    assert_eq!(texts(&top), vec!["Biology", "Physics"]);

    let children: Value = h
        .server
        .get(path)
        .add_query_param("filter[parents]", "biology")
        .await
        .json();
    assert_eq!(texts(&children), vec!["Genetics"]);
}

#[tokio::test]
async fn test_restricted_taxonomy() {
    let h = harness();
    world(&h.server).await;
    admin(
        &h.server,
        "providers",
        "preprint_providers",
        json!({
            "id": "biorxiv",
            "name": "BioXiv",
            "subjects_acceptable": [{ "path": ["biology"], "include_children": true }],
        }),
    )
    .await;

    let body: Value = h
        .server
        .get("/v2/preprint_providers/biorxiv/taxonomies")
        .await
        .json();
    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["biology", "genetics"]);
}

#[tokio::test]
async fn test_provider_licenses() {
    let h = harness();
    world(&h.server).await;
    admin(&h.server, "providers", "preprint_providers", json!({ "id": "open", "name": "Open" })).await;

    let restricted: Value = h.server.get("/v2/preprint_providers/osf/licenses").await.json();
    assert_eq!(restricted["data"].as_array().unwrap().len(), 1);
    let open: Value = h.server.get("/v2/preprint_providers/open/licenses").await.json();
    assert_eq!(open["data"].as_array().unwrap().len(), 2);
    let all: Value = h.server.get("/v2/licenses").await.json();
    assert_eq!(all["data"][0]["attributes"]["name"], "CC-BY 4.0");
}

#[tokio::test]
async fn test_subject_detail() {
    let h = harness();
    world(&h.server).await;
    let body: Value = h.server.get("/v2/subjects/genetics").await.json();
    assert_eq!(body["data"]["attributes"]["parents"], json!(["biology"]));
    h.server.get("/v2/subjects/nope").await.assert_status_not_found();
}

#[tokio::test]
async fn test_subject_with_unknown_parent_rejected() {
    let h = harness();
    let response = h
        .server
        .post("/v2/admin/subjects")
        .json(&doc("subjects", json!({ "text": "Orphan", "parents": ["nope"] })))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

// =============================================================================
// CAMPAIGNS
// =============================================================================

#[tokio::test]
async fn test_campaign_lookup() {
    let h = harness();
    let response = h.server.get("/v2/campaigns/prereg").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["attributes"]["system_tag"], "prereg_challenge_campaign");
    assert_eq!(body["data"]["attributes"]["login_type"], "native");

    h.server
        .get("/v2/campaigns/osf-preprints")
        .await
        .assert_status_not_found();
    admin(&h.server, "providers", "preprint_providers", json!({ "id": "osf", "name": "OSF" })).await;
    let body: Value = h.server.get("/v2/campaigns/osf-preprints").await.json();
    assert_eq!(body["data"]["attributes"]["login_type"], "proxy");
    assert_eq!(body["data"]["attributes"]["system_tag"], "osf_preprints");
}

// =============================================================================
// INSTITUTION LOGIN & USERS
// =============================================================================

#[tokio::test]
async fn test_institution_login_issues_token() {
    let h = harness();
    admin(&h.server, "institutions", "institutions", json!({ "id": "CIR", "name": "Circle University" })).await;

    let response = h
        .server
        .post("/v2/institutions/auth")
        .text(sealed("CIR", "ada@circle.example.edu"))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["meta"]["created"], true);
    assert_eq!(body["data"]["attributes"]["full_name"], "Ada Lovelace");
    assert_eq!(body["data"]["attributes"]["institutions"], json!(["CIR"]));
    let token = body["meta"]["access_token"].as_str().unwrap();

    let me: Value = h
        .server
        .get("/v2/users/me")
        .add_header(header::AUTHORIZATION, bearer(token))
        .await
        .json();
    assert_eq!(me["data"]["id"], body["data"]["id"]);

    let again: Value = h
        .server
        .post("/v2/institutions/auth")
        .text(sealed("CIR", "ada@circle.example.edu"))
        .await
        .json();
    assert_eq!(again["meta"]["created"], false);
    assert_eq!(again["data"]["id"], body["data"]["id"]);
}

#[tokio::test]
async fn test_institution_failures_are_uniform() {
    let h = harness();
    admin(&h.server, "institutions", "institutions", json!({ "id": "CIR", "name": "Circle University" })).await;

    let unknown = h
        .server
        .post("/v2/institutions/auth")
        .text(sealed("NOPE", "ada@circle.example.edu"))
        .await;
    let garbage = h.server.post("/v2/institutions/auth").text("a.b.c.d.e").await;

    unknown.assert_status(StatusCode::UNAUTHORIZED);
    garbage.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(error_detail(&unknown), error_detail(&garbage));
}

#[tokio::test]
async fn test_me_requires_login() {
    let h = harness();
    h.server
        .get("/v2/users/me")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_user_detail_statuses() {
    let h = harness();
    let (id, _) = seed_user(&h.server, "Ada Lovelace", "ada@example.com").await;
    let disabled = admin(
        &h.server,
        "users",
        "users",
        json!({ "fullname": "Gone User", "username": "gone@example.com", "disabled": true }),
    )
    .await;
    assert!(disabled.get("meta").is_none());

    let body: Value = h.server.get(&format!("/v2/users/{}", id)).await.json();
    assert_eq!(body["data"]["attributes"]["given_name"], "Ada");
    assert_eq!(body["data"]["attributes"]["active"], true);
    h.server
        .get(&format!("/v2/users/{}", disabled["data"]["id"].as_str().unwrap()))
        .await
        .assert_status(StatusCode::GONE);
    h.server.get("/v2/users/zzzzz").await.assert_status_not_found();
}

// =============================================================================
// ADMIN KEY & RATE LIMITING
// =============================================================================

#[tokio::test]
async fn test_admin_key_required_when_configured() {
    let h = harness_with(SecurityConfig {
        admin_key: Some("test-admin-key".to_string()),
        ..open_security()
    });
    let body = doc("preprint_providers", json!({ "id": "osf", "name": "OSF" }));

    h.server
        .post("/v2/admin/providers")
        .json(&body)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    h.server
        .post("/v2/admin/providers")
        .add_header(header::AUTHORIZATION, bearer("wrong-key"))
        .json(&body)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    h.server
        .post("/v2/admin/providers")
        .add_header(header::AUTHORIZATION, bearer("test-admin-key"))
        .json(&body)
        .await
        .assert_status(StatusCode::CREATED);

    // Public endpoints ignore the admin key.
    h.server.get("/v2/preprint_providers/osf").await.assert_status_ok();
}

#[tokio::test]
async fn test_rate_limit_throttles() {
    let h = harness_with(SecurityConfig {
        rate_limit: 1,
        ..SecurityConfig::default()
    });
    h.server.get("/health").await.assert_status_ok();
    let response = h.server.get("/health").await;
    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(error_detail(&response), "Request was throttled.");
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    use tower::ServiceExt;

    let router = create_router(AppState::new(Platform::new()), &open_security());
    let body = "x".repeat(3 * 1024 * 1024);
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/v2/institutions/auth")
        .body(axum::body::Body::from(body))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}
