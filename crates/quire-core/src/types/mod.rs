//! # Core Type Definitions
//!
//! This module contains the identifier and error types shared by every
//! other module:
//! - Record identifiers (`UserId`, `ProjectId`, `PreprintId`, ...)
//! - Contributor permissions and project log actions
//! - Error types (`QuireError`)
//!
//! Identifiers are opaque strings. Users, projects and preprints carry
//! short guids (see [`crate::primitives::SHORT_GUID_LENGTH`]); every other
//! record uses a long id.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Wrap a raw identifier.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

record_id!(
    /// Identifier of a user account (short guid).
    UserId
);
record_id!(
    /// Identifier of a project, the container a preprint is attached to (short guid).
    ProjectId
);
record_id!(
    /// Identifier of a stored file.
    FileId
);
record_id!(
    /// Identifier of a preprint provider (publishing venue), e.g. `osf`.
    ProviderId
);
record_id!(
    /// Identifier of a taxonomy subject.
    SubjectId
);
record_id!(
    /// Identifier of a preprint (short guid).
    PreprintId
);
record_id!(
    /// Identifier of an institution, e.g. `CIR`.
    InstitutionId
);
record_id!(
    /// Identifier of a license.
    LicenseId
);

// =============================================================================
// PERMISSIONS
// =============================================================================

/// Contributor permission on a project.
///
/// Ordered so that `Admin > Write > Read`; holding a level implies every
/// lower level.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    #[default]
    Read,
    Write,
    Admin,
}

impl Permission {
    /// Check whether this level grants `required`.
    #[must_use]
    pub fn allows(self, required: Permission) -> bool {
        self >= required
    }
}

// =============================================================================
// PROJECT LOG ACTIONS
// =============================================================================

/// Actions recorded in a project's append-only log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogAction {
    ProjectCreated,
    ContributorAdded,
    TagAdded,
    MadePublic,
    MadePrivate,
    PreprintInitiated,
    PreprintFileUpdated,
    PreprintPublished,
    PreprintSubjectsUpdated,
    PreprintLicenseUpdated,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Quire system.
///
/// - No silent failures
/// - Use `Result<T, QuireError>` for fallible operations
/// - The core should never panic; all errors must be recoverable
#[derive(Debug, Error)]
pub enum QuireError {
    /// The acting user lacks the permission the operation requires.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The requested transition is not allowed in the current state.
    #[error("{0}")]
    InvalidState(String),

    /// The file reference is not usable as a primary file.
    #[error("Invalid file: {0}")]
    InvalidFile(String),

    /// A subject or subject hierarchy was rejected.
    #[error("Invalid subject: {0}")]
    InvalidSubject(String),

    /// The license is not acceptable for the provider.
    #[error("Invalid license: {0}")]
    InvalidLicense(String),

    /// A referenced record does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Institution login or bearer token was rejected.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// A metadata graph failed construction-time validation.
    #[error("Invalid metadata graph: {0}")]
    InvalidGraph(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl QuireError {
    /// Shorthand for [`QuireError::NotFound`].
    pub fn not_found(kind: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
