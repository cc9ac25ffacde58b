//! # Platform Primitives
//!
//! Hardcoded constants shared across the Quire core.

/// Length of short guids given to users, projects and preprints.
pub const SHORT_GUID_LENGTH: usize = 5;

/// Alphabet short guids are drawn from (no `0`, `1`, `i`, `l`, `o`).
pub const GUID_ALPHABET: &[u8] = b"23456789abcdefghjkmnpqrstuvwxyz";

/// Resolver prefix used for DOI work identifiers.
pub const DOI_RESOLVER: &str = "http://dx.doi.org/";

/// Projects carrying this tag are exported as deleted.
pub const QA_TEST_TAG: &str = "qatest";

/// Provider id of the platform's own (unbranded) preprint service.
pub const NATIVE_PROVIDER_ID: &str = "osf";

/// Display name of the native preprint service.
pub const NATIVE_PROVIDER_NAME: &str = "OSF";

/// Default public domain, used when no configuration overrides it.
pub const DEFAULT_DOMAIN: &str = "http://localhost:5000/";

/// Default campaign cache refresh threshold, in seconds.
pub const DEFAULT_CAMPAIGN_REFRESH_SECS: i64 = 60 * 60;

/// Maximum depth of a subject hierarchy path (root, child, grandchild).
pub const MAX_SUBJECT_DEPTH: usize = 3;

/// Maximum number of subject groups on a single preprint.
pub const MAX_SUBJECT_GROUPS: usize = 64;

/// Maximum length of titles, names and other free-text fields.
pub const MAX_TEXT_LENGTH: usize = 512;

/// Maximum length of project descriptions.
pub const MAX_DESCRIPTION_LENGTH: usize = 65536;

/// Generational suffixes recognized when imputing names from a full name.
pub const NAME_SUFFIXES: &[&str] = &["jr", "jr.", "sr", "sr.", "ii", "iii", "iv", "v"];
