//! Inheritance chain construction.
//!
//! Starting from the repository document's `inherits_from` references, the
//! builder resolves at most one Team and one Org ancestor. Deeper chains
//! are a configuration error, never silently flattened. Cycle detection
//! tracks visited document identities (canonical path or normalized URL);
//! a revisit is fatal, never silently broken.
//!
//! The finished chain is presented root-first (Org, Team, Repo) for
//! humans; the resolver looks ranks up in the rank table and never relies
//! on list position.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use tracing::{debug, info};

use crate::document::{ConstitutionDocument, SourceRef};
use crate::error::{ChainError, CharterError, CharterResult};
use crate::extract::{extract, Extraction};
use crate::fetch::{DocumentFetcher, FetchOutcome, FetchRequest};
use crate::level::LevelName;

/// Ancestor levels above Repo: Team and Org.
pub const MAX_ANCESTORS: usize = 2;

/// One fetched and extracted level of the chain.
#[derive(Debug, Clone)]
pub struct ChainLevel {
    pub document: ConstitutionDocument,
    pub extraction: Extraction,
}

/// A dropped level (lenient mode only). Advisory, never fatal.
#[derive(Debug, Clone)]
pub struct ChainWarning {
    pub level: LevelName,
    pub source: String,
    pub reason: String,
}

impl fmt::Display for ChainWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "skipped {} level ({}): {}",
            self.level, self.source, self.reason
        )
    }
}

/// The assembled inheritance chain, root-first.
#[derive(Debug, Clone)]
pub struct DocumentChain {
    pub levels: Vec<ChainLevel>,
    pub warnings: Vec<ChainWarning>,
}

/// Builds inheritance chains by following `inherits_from` references.
#[derive(Debug)]
pub struct ChainBuilder {
    fetcher: DocumentFetcher,
}

/// Tracks which ancestor slots are taken while walking references.
#[derive(Debug, Default)]
struct AncestorSlots {
    team: bool,
    org: bool,
}

impl AncestorSlots {
    fn assign(&mut self, from: LevelName) -> Result<LevelName, ChainError> {
        let next = match from {
            LevelName::Repo if !self.team => LevelName::Team,
            LevelName::Repo if !self.org => LevelName::Org,
            LevelName::Team if !self.org => LevelName::Org,
            _ => {
                return Err(ChainError::DepthExceeded {
                    found: MAX_ANCESTORS + 1,
                    max: MAX_ANCESTORS,
                })
            }
        };
        match next {
            LevelName::Team => self.team = true,
            LevelName::Org => self.org = true,
            LevelName::Repo => {}
        }
        Ok(next)
    }
}

impl ChainBuilder {
    #[must_use]
    pub const fn new(fetcher: DocumentFetcher) -> Self {
        Self { fetcher }
    }

    /// Fetches and extracts the whole chain for a repository document.
    ///
    /// `extra_parents` supplement the document's own `inherits_from`
    /// section (the `--parent` CLI flag); they resolve relative to the
    /// repository document.
    ///
    /// # Errors
    ///
    /// A root document that cannot be read is an invocation error. Parse
    /// errors, cycles, chain depth, and strict-mode fetch failures abort
    /// the run.
    pub async fn build(
        &self,
        root: &Path,
        extra_parents: &[String],
    ) -> CharterResult<DocumentChain> {
        let root_ref = SourceRef::parse(&root.to_string_lossy(), None);
        let root_doc = self
            .fetcher
            .fetch(&root_ref, LevelName::Repo)
            .await
            .map_err(|e| {
                CharterError::invocation(format!("cannot read repository constitution: {e}"))
            })?;
        let root_extraction = extract(&root_doc)?;

        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(root_ref.canonical_id());

        let mut slots = AncestorSlots::default();
        let mut pending: Vec<FetchRequest> = Vec::new();
        let declared: Vec<String> = root_extraction
            .parents
            .iter()
            .cloned()
            .chain(extra_parents.iter().cloned())
            .collect();
        for raw in &declared {
            let source = SourceRef::relative_to(raw, &root_ref);
            if !visited.insert(source.canonical_id()) {
                return Err(ChainError::Cycle {
                    source_ref: source.raw,
                }
                .into());
            }
            let level = slots.assign(LevelName::Repo)?;
            pending.push(FetchRequest { source, level });
        }

        let mut levels = vec![ChainLevel {
            document: root_doc,
            extraction: root_extraction,
        }];
        let mut warnings = Vec::new();

        while !pending.is_empty() {
            let outcomes = self
                .fetcher
                .fetch_parents(std::mem::take(&mut pending))
                .await?;

            for outcome in outcomes {
                match outcome {
                    FetchOutcome::Fetched(document) => {
                        debug!(source = %document.source_ref, level = %document.level,
                               digest = %document.digest, "chain level fetched");
                        let extraction = extract(&document)?;
                        for raw in &extraction.parents {
                            let source = SourceRef::relative_to(raw, &document.source_ref);
                            // Revisiting a known document is a cycle; only
                            // then can a fresh reference take a slot.
                            if !visited.insert(source.canonical_id()) {
                                return Err(ChainError::Cycle {
                                    source_ref: source.raw,
                                }
                                .into());
                            }
                            let level = slots.assign(document.level)?;
                            pending.push(FetchRequest { source, level });
                        }
                        levels.push(ChainLevel {
                            document,
                            extraction,
                        });
                    }
                    FetchOutcome::Skipped {
                        source,
                        level,
                        error,
                    } => {
                        warnings.push(ChainWarning {
                            level,
                            source: source.raw.clone(),
                            reason: error.to_string(),
                        });
                    }
                }
            }
        }

        // Root-first presentation: Org, Team, Repo.
        levels.sort_by_key(|l| l.document.level);
        info!(
            levels = levels.len(),
            dropped = warnings.len(),
            "inheritance chain assembled"
        );
        Ok(DocumentChain { levels, warnings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FailureMode, FetchOptions};
    use std::io::Write;

    fn write_doc(dir: &Path, name: &str, text: &str) {
        let mut f = std::fs::File::create(dir.join(name)).unwrap();
        f.write_all(text.as_bytes()).unwrap();
    }

    fn builder(mode: FailureMode) -> ChainBuilder {
        ChainBuilder::new(DocumentFetcher::new(FetchOptions {
            mode,
            ..FetchOptions::default()
        }))
    }

    #[tokio::test]
    async fn three_level_chain_assembles_root_first() {
        let dir = tempfile::tempdir().unwrap();
        write_doc(dir.path(), "org.md", "## security_protocol\nnever_commit:\n- keys\n");
        write_doc(dir.path(), "team.md", "inherits_from: org.md\n\n## review\ncode_review: opus\n");
        write_doc(dir.path(), "repo.md", "inherits_from: team.md\n\n## review\ncode_review: sonnet\n");

        let chain = builder(FailureMode::Strict)
            .build(&dir.path().join("repo.md"), &[])
            .await
            .unwrap();

        let order: Vec<LevelName> = chain.levels.iter().map(|l| l.document.level).collect();
        assert_eq!(order, vec![LevelName::Org, LevelName::Team, LevelName::Repo]);
        assert!(chain.warnings.is_empty());
    }

    #[tokio::test]
    async fn cycle_is_fatal_never_truncated() {
        let dir = tempfile::tempdir().unwrap();
        // Repo -> Team -> Org -> Team reintroduces Team.
        write_doc(dir.path(), "org.md", "inherits_from: team.md\n");
        write_doc(dir.path(), "team.md", "inherits_from: org.md\n\nx: 1\n");
        write_doc(dir.path(), "repo.md", "inherits_from: team.md\n\ny: 2\n");

        let err = builder(FailureMode::Strict)
            .build(&dir.path().join("repo.md"), &[])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CharterError::Chain(ChainError::Cycle { ref source_ref }) if source_ref == "team.md"
        ));
    }

    #[tokio::test]
    async fn chain_deeper_than_org_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        write_doc(dir.path(), "global.md", "x: 0\n");
        write_doc(dir.path(), "org.md", "inherits_from: global.md\n\nx: 1\n");
        write_doc(dir.path(), "team.md", "inherits_from: org.md\n\nx: 2\n");
        write_doc(dir.path(), "repo.md", "inherits_from: team.md\n\nx: 3\n");

        let err = builder(FailureMode::Strict)
            .build(&dir.path().join("repo.md"), &[])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CharterError::Chain(ChainError::DepthExceeded { found: 3, max: 2 })
        ));
    }

    #[tokio::test]
    async fn lenient_mode_drops_unfetchable_level_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        write_doc(dir.path(), "org.md", "## security_protocol\nnever_commit:\n- keys\n");
        write_doc(
            dir.path(),
            "repo.md",
            "inherits_from:\n- missing-team.md\n- org.md\n\ny: 2\n",
        );

        let chain = builder(FailureMode::Lenient)
            .build(&dir.path().join("repo.md"), &[])
            .await
            .unwrap();

        let order: Vec<LevelName> = chain.levels.iter().map(|l| l.document.level).collect();
        assert_eq!(order, vec![LevelName::Org, LevelName::Repo]);
        assert_eq!(chain.warnings.len(), 1);
        assert_eq!(chain.warnings[0].level, LevelName::Team);
        assert!(chain.warnings[0].to_string().contains("missing-team.md"));
    }

    #[tokio::test]
    async fn strict_mode_aborts_on_unfetchable_level() {
        let dir = tempfile::tempdir().unwrap();
        write_doc(dir.path(), "repo.md", "inherits_from: missing-team.md\n\ny: 2\n");

        let err = builder(FailureMode::Strict)
            .build(&dir.path().join("repo.md"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, CharterError::Fetch(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[tokio::test]
    async fn unreadable_root_is_an_invocation_error() {
        let err = builder(FailureMode::Strict)
            .build(Path::new("/nonexistent/repo.md"), &[])
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn extra_parents_supplement_inherits_from() {
        let dir = tempfile::tempdir().unwrap();
        write_doc(dir.path(), "org.md", "x: 1\n");
        write_doc(dir.path(), "repo.md", "y: 2\n");

        let chain = builder(FailureMode::Strict)
            .build(&dir.path().join("repo.md"), &["org.md".to_string()])
            .await
            .unwrap();

        let order: Vec<LevelName> = chain.levels.iter().map(|l| l.document.level).collect();
        // A single supplemental parent takes the Team slot.
        assert_eq!(order, vec![LevelName::Team, LevelName::Repo]);
    }
}
