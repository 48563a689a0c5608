//! Error types for charter.
//!
//! All errors are strongly typed using thiserror, grouped by the phase that
//! produces them. This enables pattern matching on specific failure
//! conditions and keeps the fatal/advisory split explicit: everything in
//! this module aborts a resolution run. Advisory findings (narrowing
//! attempts, no-op overrides) are [`ConflictRecord`]s, not errors.
//!
//! [`ConflictRecord`]: crate::resolve::ConflictRecord

use thiserror::Error;

use crate::location::SourceLocation;

/// Parse errors raised while extracting rules from a constitution document.
///
/// Parsing is format-tolerant but never guesses: a structurally malformed
/// block always names its exact location rather than being skipped or
/// defaulted.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    #[error("{location}: list item has no owning key")]
    OrphanListItem { location: SourceLocation },

    #[error("{location}: rule declaration has an empty key")]
    EmptyKey { location: SourceLocation },

    #[error("{location}: rule declaration for '{key}' has no value")]
    EmptyValue { key: String, location: SourceLocation },

    #[error("{location}: indented declaration '{key}' has no owning key")]
    StrayIndentedRule {
        key: String,
        location: SourceLocation,
    },

    #[error("{location}: unknown inheritance marker class '{marker}'")]
    UnknownMarker {
        marker: String,
        location: SourceLocation,
    },

    #[error("{location}: inheritance marker is not followed by a rule declaration")]
    DanglingMarker { location: SourceLocation },

    #[error("{location}: legal rule '{key}' is missing the required 'source' citation field")]
    MissingLegalCitation {
        key: String,
        location: SourceLocation,
    },

    #[error("{location}: supersede marker on '{key}' carries no 'approved:' process reference")]
    UnapprovedSupersede {
        key: String,
        location: SourceLocation,
    },

    /// Two rules for the same key at the same precedence rank. Ties are
    /// never arbitrarily broken.
    #[error("duplicate declaration of '{key}' at equal rank ({first} and {second})")]
    DuplicateKey {
        key: String,
        first: SourceLocation,
        second: SourceLocation,
    },
}

/// Fetch errors raised by the document source adapter.
///
/// Recoverable only in lenient mode (the affected level is dropped from the
/// chain with a warning); fatal in strict mode.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("document not found: {source_ref}")]
    NotFound { source_ref: String },

    #[error("fetch of {source_ref} timed out after {timeout_secs}s")]
    NetworkTimeout {
        source_ref: String,
        timeout_secs: u64,
    },

    #[error("network error fetching {source_ref}: {message}")]
    NetworkError { source_ref: String, message: String },

    #[error("permission denied reading {source_ref}")]
    PermissionDenied { source_ref: String },
}

impl FetchError {
    /// The source reference the failed fetch was addressed to.
    #[must_use]
    pub fn source_ref(&self) -> &str {
        match self {
            Self::NotFound { source_ref }
            | Self::NetworkTimeout { source_ref, .. }
            | Self::NetworkError { source_ref, .. }
            | Self::PermissionDenied { source_ref } => source_ref,
        }
    }
}

/// Chain construction errors. Always fatal.
#[derive(Debug, Clone, Error)]
pub enum ChainError {
    /// The inheritance chain revisits a document it already contains.
    #[error("inheritance cycle: {source_ref} appears twice in the chain")]
    Cycle { source_ref: String },

    /// More ancestor levels than the Org/Team maximum. Deep chains are a
    /// configuration error, never silently flattened.
    #[error("inheritance chain declares {found} ancestor levels, maximum is {max} (Team and Org)")]
    DepthExceeded { found: usize, max: usize },
}

/// Resolution errors. Always fatal; no effective ruleset is produced.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// Two binding legal citations disagree on the same key. The resolver
    /// never arbitrates between binding texts.
    #[error(
        "legal contradiction on '{key}': '{first_citation}' and '{second_citation}' \
         bind different values"
    )]
    LegalContradiction {
        key: String,
        first_citation: String,
        second_citation: String,
    },
}

/// Configuration errors raised before a run starts. Reported as invocation
/// errors.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("invalid rank table: {reason}")]
    InvalidRankTable { reason: String },

    #[error("cannot read rank table {path}: {message}")]
    UnreadableRankTable { path: String, message: String },
}

/// Top-level error type for charter.
///
/// Everything that can abort a resolution run converges here; the CLI maps
/// it onto the exit-code contract via [`CharterError::exit_code`].
#[derive(Debug, Error)]
pub enum CharterError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("resolve error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The run could not start at all: bad arguments or a wholly unfindable
    /// root document.
    #[error("invocation error: {message}")]
    Invocation { message: String },
}

impl CharterError {
    /// Convenience constructor for invocation errors.
    pub fn invocation(message: impl Into<String>) -> Self {
        Self::Invocation {
            message: message.into(),
        }
    }

    /// Maps this error onto the CLI exit-code contract.
    ///
    /// `1` = resolution aborted (fatal error mid-run); `2` = invocation
    /// error (bad arguments, root document unfindable, bad rank table).
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Invocation { .. } | Self::Config(_) => 2,
            _ => 1,
        }
    }
}

/// Result alias used throughout the crate.
pub type CharterResult<T> = Result<T, CharterError>;
