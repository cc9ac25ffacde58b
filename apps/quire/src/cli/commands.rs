//! # CLI Command Implementations

use crate::SharedPlatform;
use crate::api::{self, AppState};
use crate::config::Config;
use crate::mail::LogMailer;
use crate::share::{Delivery, export_channel, run_export_worker};
use quire_core::{
    InstitutionPayload, Platform, Preprint, PreprintId, Project, Provider, QuireError, Settings,
    Store, Subject, TokenProvider, TokenUser, User, envelope,
    primitives::{NATIVE_PROVIDER_ID, NATIVE_PROVIDER_NAME},
    seal_token,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Where the platform's records live.
#[derive(Debug, Clone)]
pub struct StoreArgs {
    pub database: PathBuf,
    pub backend: String,
}

/// Claims for `seal-token`.
#[derive(Debug, Clone)]
pub struct TokenArgs {
    pub institution: String,
    pub username: String,
    pub fullname: String,
    pub given_name: String,
    pub family_name: String,
    pub idp: String,
}

fn to_pretty_json(value: &impl serde::Serialize) -> Result<String, QuireError> {
    serde_json::to_string_pretty(value).map_err(|e| QuireError::SerializationError(e.to_string()))
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server and the export worker.
pub async fn cmd_server(
    store: &StoreArgs,
    mut config: Config,
    host: Option<String>,
    port: Option<u16>,
) -> Result<(), QuireError> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let (sink, queue) = export_channel();
    let platform = load_platform(store, &config.platform)?
        .export_sink(Arc::new(sink))
        .mailer(Arc::new(LogMailer));
    let shared: SharedPlatform = Arc::new(RwLock::new(platform));
    let delivery = Delivery::from_config(&config.share);

    println!("Quire Preprint Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", config.server.host);
    println!("  Port:     {}", config.server.port);
    println!("  Backend:  {}", store.backend);
    println!("  Database: {:?}", store.database);
    println!("  Domain:   {}", config.platform.domain);
    println!("  Index:    {}", delivery.describe());
    println!();
    println!("Endpoints:");
    println!("  POST  /v2/institutions/auth      - Institution login");
    println!("  GET   /v2/preprint_providers     - List providers");
    println!("  POST  /v2/preprints              - Create a preprint");
    println!("  PATCH /v2/preprints/{{id}}         - Edit or publish a preprint");
    println!("  GET   /v2/preprints/{{id}}/metadata - Metadata graph");
    println!("  GET   /health                    - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let worker = tokio::spawn(run_export_worker(Arc::clone(&shared), queue, delivery));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let result = api::run_server(&addr, AppState::from_shared(shared), &config.security).await;
    worker.abort();
    result
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show record counts.
pub fn cmd_status(store: &StoreArgs, json_mode: bool) -> Result<(), QuireError> {
    let platform = load_platform(store, &Settings::default())?;
    let records = platform.store();
    let users = records.count::<User>()?;
    let projects = records.count::<Project>()?;
    let providers = records.count::<Provider>()?;
    let subjects = records.count::<Subject>()?;
    let preprints = platform.all::<Preprint>()?;
    let published = preprints.iter().filter(|p| p.is_published).count();

    if json_mode {
        let output = serde_json::json!({
            "database": store.database.to_string_lossy(),
            "backend": store.backend,
            "users": users,
            "projects": projects,
            "providers": providers,
            "subjects": subjects,
            "preprints": preprints.len(),
            "published": published,
        });
        println!("{}", to_pretty_json(&output)?);
        return Ok(());
    }

    println!("Quire Status");
    println!("============");
    println!("Database: {:?}", store.database);
    println!("Backend:  {}", store.backend);
    println!();
    println!("Users:      {}", users);
    println!("Projects:   {}", projects);
    println!("Providers:  {}", providers);
    println!("Subjects:   {}", subjects);
    println!("Preprints:  {} ({} published)", preprints.len(), published);

    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Create the database and register the native provider.
pub fn cmd_init(store: &StoreArgs, force: bool) -> Result<(), QuireError> {
    if store.backend == "redb" && store.database.exists() {
        if !force {
            return Err(QuireError::InvalidState(format!(
                "Database already exists at {:?}. Use --force to overwrite.",
                store.database
            )));
        }
        std::fs::remove_file(&store.database)
            .map_err(|e| QuireError::IoError(format!("Remove database: {}", e)))?;
        tracing::warn!("Removed existing database at {:?}", store.database);
    }

    let mut platform = load_platform(store, &Settings::default())?;
    if platform.get::<Provider>(NATIVE_PROVIDER_ID)?.is_none() {
        platform.add_provider(&Provider::new(NATIVE_PROVIDER_ID, NATIVE_PROVIDER_NAME))?;
    }

    println!("Initialized database at {:?}", store.database);
    Ok(())
}

// =============================================================================
// FORMAT COMMAND
// =============================================================================

/// Print the metadata graph of one preprint.
pub fn cmd_format(
    store: &StoreArgs,
    config: &Config,
    preprint: &str,
    wrap: bool,
) -> Result<(), QuireError> {
    let platform = load_platform(store, &config.platform)?;
    let graph = platform.format_preprint(&PreprintId::new(preprint))?;

    let output = if wrap {
        to_pretty_json(&envelope(&graph)?)?
    } else {
        to_pretty_json(&graph)?
    };
    println!("{}", output);
    Ok(())
}

// =============================================================================
// CAMPAIGNS COMMAND
// =============================================================================

/// Show the campaign table, or one campaign.
pub fn cmd_campaigns(
    store: &StoreArgs,
    config: &Config,
    name: Option<&str>,
    json_mode: bool,
) -> Result<(), QuireError> {
    let platform = load_platform(store, &config.platform)?;
    let table = platform.campaigns()?;

    if let Some(name) = name {
        let campaign = table
            .get(name)
            .ok_or_else(|| QuireError::not_found("Campaign", name))?;
        println!("{}", to_pretty_json(campaign)?);
        return Ok(());
    }

    if json_mode {
        println!("{}", to_pretty_json(&*table)?);
        return Ok(());
    }

    println!("Campaigns ({})", table.len());
    println!("=========");
    for name in table.names() {
        let Some(campaign) = table.get(name) else {
            continue;
        };
        println!(
            "  {:<28} {:<12} {}",
            name,
            format!("{:?}", campaign.login_type).to_lowercase(),
            campaign.redirect_url
        );
    }
    Ok(())
}

// =============================================================================
// SEAL-TOKEN COMMAND
// =============================================================================

/// Print an institution login token sealed with the configured secrets.
pub fn cmd_seal_token(config: &Config, args: TokenArgs) -> Result<(), QuireError> {
    let payload = InstitutionPayload {
        provider: TokenProvider {
            idp: args.idp,
            id: args.institution,
            user: TokenUser {
                fullname: args.fullname,
                given_name: args.given_name,
                family_name: args.family_name,
                username: args.username,
                ..TokenUser::default()
            },
        },
    };
    let token = seal_token(
        &payload,
        &config.platform.jwe_secret,
        &config.platform.jwt_secret,
    )?;
    println!("{}", token);
    Ok(())
}

// =============================================================================
// UTILITIES
// =============================================================================

/// Open the platform for the selected backend.
pub fn load_platform(store: &StoreArgs, settings: &Settings) -> Result<Platform, QuireError> {
    let platform = match store.backend.as_str() {
        "redb" => Platform::with_redb(&store.database)?,
        "memory" => Platform::new(),
        other => {
            return Err(QuireError::InvalidState(format!(
                "Unknown backend '{}'; expected \"redb\" or \"memory\"",
                other
            )));
        }
    };
    Ok(platform.settings(settings.clone()))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn redb_store(dir: &tempfile::TempDir) -> StoreArgs {
        StoreArgs {
            database: dir.path().join("quire.db"),
            backend: "redb".to_string(),
        }
    }

    #[test]
    fn unknown_backend_rejected() {
        let store = StoreArgs {
            database: PathBuf::from("unused.db"),
            backend: "file".to_string(),
        };
        assert!(matches!(
            load_platform(&store, &Settings::default()),
            Err(QuireError::InvalidState(_))
        ));
    }

    #[test]
    fn init_registers_native_provider_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = redb_store(&dir);

        cmd_init(&store, false).expect("init");
        assert!(matches!(cmd_init(&store, false), Err(QuireError::InvalidState(_))));
        cmd_init(&store, true).expect("forced init");

        let platform = load_platform(&store, &Settings::default()).expect("open");
        assert!(platform.is_persistent());
        let providers = platform.all::<Provider>().expect("providers");
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].id.as_str(), NATIVE_PROVIDER_ID);
    }

    #[test]
    fn format_unknown_preprint_fails() {
        let store = StoreArgs {
            database: PathBuf::from("unused.db"),
            backend: "memory".to_string(),
        };
        assert!(matches!(
            cmd_format(&store, &Config::default(), "zzzzz", false),
            Err(QuireError::NotFound { .. })
        ));
    }

    #[test]
    fn sealed_token_opens_with_config_secrets() {
        let config = Config::default();
        let payload = InstitutionPayload {
            provider: TokenProvider {
                idp: "https://idp.example.edu".to_string(),
                id: "CIR".to_string(),
                user: TokenUser {
                    username: "ada@example.edu".to_string(),
                    fullname: "Ada Lovelace".to_string(),
                    ..TokenUser::default()
                },
            },
        };
        let token = seal_token(
            &payload,
            &config.platform.jwe_secret,
            &config.platform.jwt_secret,
        )
        .expect("seal");
        let opened = quire_core::open_token(
            &token,
            &config.platform.jwe_secret,
            &config.platform.jwt_secret,
        )
        .expect("open");
        assert_eq!(opened.provider.user.username, "ada@example.edu");
        assert!(cmd_seal_token(
            &config,
            TokenArgs {
                institution: "CIR".to_string(),
                username: "ada@example.edu".to_string(),
                fullname: "Ada Lovelace".to_string(),
                given_name: String::new(),
                family_name: String::new(),
                idp: "https://idp.example.edu".to_string(),
            }
        )
        .is_ok());
    }
}
