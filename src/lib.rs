//! # charter - constitutional inheritance resolver
//!
//! charter computes a repository's effective governance configuration from
//! up to three authority tiers (organization, team, repository) plus an
//! external legal tier, merging their constitution documents under
//! per-category precedence and reporting every conflict for audit.
//!
//! ## Core concepts
//!
//! - **Constitution document**: a declarative governance file at one
//!   authority level, fetched from the filesystem or over HTTPS.
//! - **Rule**: an atomic `key: value` declaration with provenance and a
//!   category fixed exactly once at classification.
//! - **Safety rule**: highest-authority declaring level wins.
//! - **Configurable rule**: most specific declaring level wins.
//! - **Legal rule**: sourced from a binding external instrument; overrides
//!   every internal level.
//! - **Effective ruleset**: the conflict-resolved key to value mapping for
//!   one run, with shadowed instances kept for audit.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use charter::{resolve_repository, RunOptions};
//!
//! let report = resolve_repository(RunOptions::for_root("CONSTITUTION.md")).await?;
//! println!("{}", report.to_text());
//! std::process::exit(report.exit_code());
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod chain;
pub mod classify;
pub mod document;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod level;
pub mod location;
pub mod report;
pub mod resolve;
pub mod rule;
pub mod value;

use std::path::PathBuf;

// Re-export primary types at crate root for convenience
pub use chain::{ChainBuilder, ChainLevel, ChainWarning, DocumentChain};
pub use classify::{classify, ClassifierWarning, SafetyKeyTable, CANONICAL_SAFETY_KEYS};
pub use document::{ConstitutionDocument, FetchMode, SourceRef};
pub use error::{
    ChainError, CharterError, CharterResult, ConfigError, FetchError, ParseError, ResolveError,
};
pub use extract::{extract, Extraction};
pub use fetch::{DocumentFetcher, FailureMode, FetchOptions, FetchOutcome, FetchRequest};
pub use level::{Level, LevelName, RankRow, RankTable};
pub use location::SourceLocation;
pub use report::ResolutionReport;
pub use resolve::{
    ConflictReason, ConflictRecord, EffectiveRuleset, Resolution, Resolver, Severity,
};
pub use rule::{Category, InlineMarker, RawRule, Rule, RuleKey};
pub use value::{Bound, Value};

/// Everything one resolution run needs.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Path to the repository constitution document.
    pub root: PathBuf,

    /// Supplemental parent references (the `--parent` flag), resolved
    /// relative to the repository document.
    pub extra_parents: Vec<String>,

    pub fetch: FetchOptions,

    /// Precedence table; amendments load a replacement from JSON.
    pub rank_table: RankTable,

    /// Canonical safety-keys table.
    pub safety_keys: SafetyKeyTable,
}

impl RunOptions {
    /// Default options for a repository document.
    #[must_use]
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extra_parents: Vec::new(),
            fetch: FetchOptions::default(),
            rank_table: RankTable::default(),
            safety_keys: SafetyKeyTable::default(),
        }
    }
}

/// Runs one full resolution: fetch the chain, classify every level, merge,
/// and assemble the report.
///
/// Fetching fans out per level; classification and merging run
/// single-threaded after the join. The whole run is rebuilt from scratch
/// on every invocation; nothing is cached or persisted.
///
/// # Errors
///
/// Propagates fetch failures (strict mode), parse errors, cycles, depth
/// violations, and legal contradictions; see [`error`] for the taxonomy.
pub async fn resolve_repository(options: RunOptions) -> CharterResult<ResolutionReport> {
    let fetcher = DocumentFetcher::new(options.fetch);
    let chain = ChainBuilder::new(fetcher)
        .build(&options.root, &options.extra_parents)
        .await?;

    let mut levels = Vec::with_capacity(chain.levels.len());
    let mut warnings = Vec::new();
    for chain_level in &chain.levels {
        let (rules, classifier_warnings) = classify(
            chain_level.extraction.rules.clone(),
            chain_level.document.level,
            &options.safety_keys,
        );
        warnings.extend(classifier_warnings.iter().map(ToString::to_string));
        levels.push(Level {
            name: chain_level.document.level,
            source: chain_level.document.source_ref.raw.clone(),
            rules,
        });
    }

    let resolution = Resolver::new(options.rank_table).resolve(&levels)?;
    Ok(ResolutionReport::build(&resolution, &chain, warnings))
}
