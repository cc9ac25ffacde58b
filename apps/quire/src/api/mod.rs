//! # Quire HTTP API Module
//!
//! JSON:API-shaped REST server over the shared [`quire_core::Platform`].
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `POST /v2/institutions/auth` - Institution login (encrypted token body)
//! - `GET /v2/users/me`, `GET /v2/users/{id}` - Users
//! - `GET /v2/preprint_providers[/{id}[/preprints|/taxonomies|/licenses]]` - Providers
//! - `POST /v2/preprints`, `GET|PATCH /v2/preprints/{id}` - Preprints
//! - `GET /v2/preprints/{id}/metadata` - Formatted metadata graph
//! - `GET /v2/subjects/{id}`, `GET /v2/licenses` - Taxonomy and licenses
//! - `GET /v2/campaigns/{name}` - Campaign lookup
//! - `POST /v2/admin/...` - Seeding and forced export (admin key)
//!
//! ## Security Configuration
//!
//! See [`crate::config::SecurityConfig`]: CORS origins, rate limit and
//! admin key.

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::{Viewer, bearer_token, keys_match};
pub use middleware::create_rate_limiter;
pub use types::{
    AUTHENTICATION_FAILED, ApiError, CampaignAttributes, Document, ErrorDocument, ErrorObject,
    FileAttributes, HealthResponse, Input, InstitutionAttributes, LicenseAttributes,
    NewContributor, NewFile, NewInstitution, NewLicense, NewPreprint, NewProject, NewProvider,
    NewSubject, NewUser, PreprintAttributes, PreprintChanges, ProjectAttributes,
    ProviderAttributes, Resource, ResourceInput, SubjectAttributes, TaxonomyQuery,
    UserAttributes,
};

use crate::SharedPlatform;
use crate::config::SecurityConfig;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use quire_core::{Platform, QuireError};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Maximum request body size (2 MiB).
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state containing the platform.
#[derive(Clone)]
pub struct AppState {
    pub platform: SharedPlatform,
}

impl AppState {
    /// Wrap a platform for sharing.
    #[must_use]
    pub fn new(platform: Platform) -> Self {
        Self {
            platform: Arc::new(RwLock::new(platform)),
        }
    }

    /// Share an already wrapped platform (e.g. with the export worker).
    #[must_use]
    pub fn from_shared(platform: SharedPlatform) -> Self {
        Self { platform }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build the CORS layer.
///
/// - `Some("*")`: allows all origins (development only)
/// - `None`: localhost only
/// - otherwise: comma-separated list of allowed origins
fn build_cors_layer(origins: Option<&str>) -> CorsLayer {
    match origins {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (cors_origins = \"*\"). This is insecure for production!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!("CORS: No valid origins configured, defaulting to localhost only");
                build_localhost_cors()
            } else {
                restricted_cors(allowed_origins)
            }
        }
        None => {
            tracing::info!("CORS: No origins configured, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

fn restricted_cors(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:5000",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:5000",
    ]
    .into_iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();
    restricted_cors(origins)
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Rate Limiting - protects against DoS (if enabled)
/// 4. Admin key - guards `/v2/admin` (if configured)
pub fn create_router(state: AppState, security: &SecurityConfig) -> Router {
    let cors = build_cors_layer(security.cors_origins.as_deref());

    let mut admin = Router::new()
        .route("/institutions", post(handlers::admin_institution_handler))
        .route("/providers", post(handlers::admin_provider_handler))
        .route("/subjects", post(handlers::admin_subject_handler))
        .route("/licenses", post(handlers::admin_license_handler))
        .route("/users", post(handlers::admin_user_handler))
        .route("/projects", post(handlers::admin_project_handler))
        .route("/files", post(handlers::admin_file_handler))
        .route(
            "/preprints/{id}/force_update",
            post(handlers::force_update_handler),
        );

    match security.admin_key.as_deref().filter(|k| !k.is_empty()) {
        Some(key) => {
            tracing::info!("Admin key authentication enabled");
            admin = admin.route_layer(axum_middleware::from_fn_with_state(
                Arc::<str>::from(key),
                auth::admin_key_middleware,
            ));
        }
        None => {
            tracing::warn!(
                "Admin key authentication DISABLED - /v2/admin endpoints are publicly accessible! \
                 Set QUIRE_ADMIN_KEY to enable authentication."
            );
        }
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/v2/institutions/auth", post(handlers::institution_auth_handler))
        .route("/v2/users/me", get(handlers::me_handler))
        .route("/v2/users/{id}", get(handlers::user_handler))
        .route("/v2/preprint_providers", get(handlers::providers_handler))
        .route("/v2/preprint_providers/{id}", get(handlers::provider_handler))
        .route(
            "/v2/preprint_providers/{id}/preprints",
            get(handlers::provider_preprints_handler),
        )
        .route(
            "/v2/preprint_providers/{id}/taxonomies",
            get(handlers::provider_taxonomies_handler),
        )
        .route(
            "/v2/preprint_providers/{id}/licenses",
            get(handlers::provider_licenses_handler),
        )
        .route("/v2/preprints", post(handlers::create_preprint_handler))
        .route(
            "/v2/preprints/{id}",
            get(handlers::preprint_handler).patch(handlers::update_preprint_handler),
        )
        .route(
            "/v2/preprints/{id}/metadata",
            get(handlers::preprint_metadata_handler),
        )
        .route("/v2/subjects/{id}", get(handlers::subject_handler))
        .route("/v2/licenses", get(handlers::licenses_handler))
        .route("/v2/campaigns/{name}", get(handlers::campaign_handler))
        .nest("/v2/admin", admin);

    if security.rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", security.rate_limit);
        router = router.layer(axum_middleware::from_fn_with_state(
            create_rate_limiter(security.rate_limit),
            middleware::rate_limit_middleware,
        ));
    } else {
        tracing::info!("Rate limiting disabled");
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server.
pub async fn run_server(
    addr: &str,
    state: AppState,
    security: &SecurityConfig,
) -> Result<(), QuireError> {
    let router = create_router(state, security);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| QuireError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("Quire HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| QuireError::IoError(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
