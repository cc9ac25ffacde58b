//! # Quire - Preprint Server
//!
//! The main binary for the Quire preprint platform.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for inspection and setup
//! - Background export of metadata graphs to the scholarly index
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      apps/quire (THE BINARY)                    │
//! │                                                                 │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐     │
//! │  │   CLI       │    │   HTTP API  │    │  Export Worker   │     │
//! │  │  (clap)     │    │   (axum)    │    │ (tokio+reqwest)  │     │
//! │  └──────┬──────┘    └──────┬──────┘    └────────┬─────────┘     │
//! │         │                  │                    │               │
//! │         └──────────────────┼────────────────────┘               │
//! │                            ▼                                    │
//! │                    ┌───────────────┐                            │
//! │                    │  quire-core   │                            │
//! │                    │ (THE LOGIC)   │                            │
//! │                    └───────────────┘                            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Create the database with the native provider
//! quire init
//!
//! # Start the HTTP server
//! quire server --host 0.0.0.0 --port 8080
//!
//! # Inspect
//! quire campaigns
//! quire format <preprint-id> --envelope
//! ```

use clap::Parser;
use quire::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // QUIRE_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("QUIRE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "quire=info,quire_core=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Quire startup banner.
fn print_banner() {
    println!(
        r#"
   ██████╗ ██╗   ██╗██╗██████╗ ███████╗
  ██╔═══██╗██║   ██║██║██╔══██╗██╔════╝
  ██║   ██║██║   ██║██║██████╔╝█████╗
  ██║▄▄ ██║██║   ██║██║██╔══██╗██╔══╝
  ╚██████╔╝╚██████╔╝██║██║  ██║███████╗
   ╚══▀▀═╝  ╚═════╝ ╚═╝╚═╝  ╚═╝╚══════╝

  Preprint Server v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
