//! # quire-core
//!
//! The preprint publication engine for Quire - THE LOGIC.
//!
//! This crate holds the domain records and every rule that governs them:
//! - `publication`: the preprint state controller (Unpublished → Published)
//! - `share`: the metadata graph formatter for the external scholarly index
//! - `institution` / `token`: institution-mediated login
//! - `campaigns`: the time-bounded campaign table
//!
//! ## Architectural Constraints
//!
//! - Pure Rust: NO async, NO network dependencies
//! - Deterministic storage order (BTreeMap tables)
//! - Side effects leave the crate only through the `Mailer` and
//!   `ExportSink` traits
//! - Derived flags (`is_preprint`, `is_preprint_orphan`) are computed on
//!   read, never stored

// =============================================================================
// MODULES
// =============================================================================

pub mod campaigns;
pub mod clock;
pub mod export;
pub mod institution;
pub mod mail;
pub mod model;
pub mod platform;
pub mod primitives;
pub mod publication;
pub mod query;
pub mod settings;
pub mod share;
pub mod storage;
pub mod store;
pub mod taxonomy;
pub mod token;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    FileId, InstitutionId, LicenseId, LogAction, Permission, PreprintId, ProjectId, ProviderId,
    QuireError, SubjectId, UserId,
};

// =============================================================================
// RE-EXPORTS: Records & Storage
// =============================================================================

pub use model::{
    AcceptableSubject, AccessToken, Contributor, File, Institution, License, NodeLog, Preprint,
    PreprintProjection, Project, Provider, PublicationState, Subject, User,
};
pub use storage::RedbStore;
pub use store::{MemoryStore, Record, StorageBackend, Store};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use campaigns::{Campaign, CampaignCache, CampaignTable, LoginType, RefreshPolicy};
pub use clock::{Clock, ManualClock, SystemClock};
pub use export::{ExportSink, NullSink, RecordingSink};
pub use institution::InstitutionLogin;
pub use mail::{Mail, MailTemplate, Mailer, NullMailer, RecordingMailer};
pub use platform::Platform;
pub use publication::PreprintEditor;
pub use settings::Settings;
pub use share::{FormatOptions, GraphNode, MetadataGraph, NodeKind, PreprintSnapshot, envelope, format_preprint};
pub use token::{InstitutionPayload, TokenProvider, TokenUser, open_token, seal_token};
