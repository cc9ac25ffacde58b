//! # Quire CLI Module
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server and export worker
//! - `status` - Show record counts
//! - `init` - Initialize a new database with the native provider
//! - `format` - Print a preprint's metadata graph
//! - `campaigns` - Show the campaign table
//! - `seal-token` - Build an institution login token (for testing logins)

mod commands;

use crate::config::Config;
use clap::{Parser, Subcommand};
use quire_core::QuireError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Quire - preprint server
///
/// Publishes preprints, formats their scholarly metadata for the external
/// index and logs users in through their institutions.
#[derive(Parser, Debug)]
#[command(name = "quire")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the database
    #[arg(short = 'D', long, global = true, default_value = "quire.db")]
    pub database: PathBuf,

    /// Storage backend: "redb" (ACID database) or "memory" (volatile)
    #[arg(short = 'B', long, global = true, default_value = "redb")]
    pub backend: String,

    /// Configuration file (defaults to ./quire.toml when present)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to (overrides the config file)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show record counts
    Status,

    /// Initialize a new database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// Print the metadata graph of a preprint
    Format {
        /// Preprint id
        preprint: String,

        /// Wrap the graph in the push envelope
        #[arg(short, long)]
        envelope: bool,
    },

    /// Show the campaign table, or one campaign
    Campaigns {
        /// Campaign name (e.g. "prereg", "osf-preprints")
        name: Option<String>,
    },

    /// Seal an institution login token with the configured secrets
    SealToken {
        /// Institution id
        #[arg(short, long)]
        institution: String,

        /// Username (email) asserted by the institution
        #[arg(short, long)]
        username: String,

        /// Full name
        #[arg(short, long, default_value = "")]
        fullname: String,

        /// Given name
        #[arg(long, default_value = "")]
        given_name: String,

        /// Family name
        #[arg(long, default_value = "")]
        family_name: String,

        /// Identity provider URL
        #[arg(long, default_value = "https://idp.example.edu")]
        idp: String,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), QuireError> {
    let config = Config::load(cli.config.as_deref())?;
    let store = StoreArgs {
        database: cli.database,
        backend: cli.backend,
    };
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => cmd_server(&store, config, host, port).await,
        Some(Commands::Status) | None => cmd_status(&store, json_mode),
        Some(Commands::Init { force }) => cmd_init(&store, force),
        Some(Commands::Format { preprint, envelope }) => {
            cmd_format(&store, &config, &preprint, envelope)
        }
        Some(Commands::Campaigns { name }) => {
            cmd_campaigns(&store, &config, name.as_deref(), json_mode)
        }
        Some(Commands::SealToken {
            institution,
            username,
            fullname,
            given_name,
            family_name,
            idp,
        }) => cmd_seal_token(
            &config,
            TokenArgs {
                institution,
                username,
                fullname,
                given_name,
                family_name,
                idp,
            },
        ),
    }
}
