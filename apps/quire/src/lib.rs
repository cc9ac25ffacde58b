//! # Quire Server
//!
//! The async half of Quire: HTTP API, configuration, mail logging and the
//! metadata export worker. Every rule lives in `quire-core`; this crate
//! only moves requests in and exports out.

pub mod api;
pub mod cli;
pub mod config;
pub mod mail;
pub mod share;

use quire_core::Platform;
use std::sync::Arc;
use tokio::sync::RwLock;

/// The platform as shared by handlers and the export worker.
pub type SharedPlatform = Arc<RwLock<Platform>>;
