//! Document source adapter.
//!
//! Fetches constitution documents by reference: local filesystem reads or
//! HTTPS GETs with a bounded timeout. Fetches for independent levels fan
//! out over a `JoinSet` and are joined before classification begins, since
//! fetch latency dominates. Each task writes its own result slot; there is
//! no shared mutable state.
//!
//! Failure handling follows the run's mode: strict (default) aborts the
//! whole run on the first failure and cancels sibling in-flight fetches
//! (the run is already doomed); lenient lets every fetch complete so the
//! maximal usable partial chain is retained, downgrading each failure to a
//! warning.
//!
//! This component has no side effects beyond the read: no writes, no cache.

use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::document::{ConstitutionDocument, FetchMode, SourceRef};
use crate::error::FetchError;
use crate::level::LevelName;

/// What a fetch failure does to the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureMode {
    /// Any fetch failure aborts the run.
    #[default]
    Strict,

    /// A fetch failure drops that level from the chain with a warning.
    Lenient,
}

/// Fetch configuration.
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub mode: FailureMode,

    /// Bound on each URL fetch.
    pub timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            mode: FailureMode::Strict,
            timeout: Duration::from_secs(10),
        }
    }
}

/// One parent fetch to perform.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub source: SourceRef,
    pub level: LevelName,
}

/// Result slot for one requested fetch.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Fetched(ConstitutionDocument),

    /// Lenient-mode failure: the level is dropped from the chain.
    Skipped {
        source: SourceRef,
        level: LevelName,
        error: FetchError,
    },
}

/// Fetches constitution documents.
#[derive(Debug, Clone)]
pub struct DocumentFetcher {
    options: FetchOptions,
    client: reqwest::Client,
}

impl DocumentFetcher {
    /// Builds a fetcher; the HTTP client carries the configured timeout.
    #[must_use]
    pub fn new(options: FetchOptions) -> Self {
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()
            .unwrap_or_default();
        Self { options, client }
    }

    /// The configured failure mode.
    #[must_use]
    pub const fn mode(&self) -> FailureMode {
        self.options.mode
    }

    /// Fetches a single document.
    pub async fn fetch(
        &self,
        source: &SourceRef,
        level: LevelName,
    ) -> Result<ConstitutionDocument, FetchError> {
        debug!(source = %source, %level, mode = %source.mode, "fetching constitution");
        let text = match source.mode {
            FetchMode::Local => self.fetch_local(source).await?,
            FetchMode::Url => self.fetch_url(source).await?,
        };
        Ok(ConstitutionDocument::new(source.clone(), level, text))
    }

    async fn fetch_local(&self, source: &SourceRef) -> Result<String, FetchError> {
        tokio::fs::read_to_string(&source.target)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => FetchError::NotFound {
                    source_ref: source.raw.clone(),
                },
                std::io::ErrorKind::PermissionDenied => FetchError::PermissionDenied {
                    source_ref: source.raw.clone(),
                },
                _ => FetchError::NetworkError {
                    source_ref: source.raw.clone(),
                    message: e.to_string(),
                },
            })
    }

    async fn fetch_url(&self, source: &SourceRef) -> Result<String, FetchError> {
        let response = self
            .client
            .get(&source.target)
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(source, &e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound {
                source_ref: source.raw.clone(),
            });
        }
        if status == reqwest::StatusCode::FORBIDDEN || status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(FetchError::PermissionDenied {
                source_ref: source.raw.clone(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::NetworkError {
                source_ref: source.raw.clone(),
                message: format!("unexpected status {status}"),
            });
        }

        response
            .text()
            .await
            .map_err(|e| self.map_reqwest_error(source, &e))
    }

    fn map_reqwest_error(&self, source: &SourceRef, error: &reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::NetworkTimeout {
                source_ref: source.raw.clone(),
                timeout_secs: self.options.timeout.as_secs(),
            }
        } else {
            FetchError::NetworkError {
                source_ref: source.raw.clone(),
                message: error.to_string(),
            }
        }
    }

    /// Fetches a batch of parent documents concurrently, one task per
    /// level.
    ///
    /// Strict mode returns the first failure and aborts the remaining
    /// in-flight fetches. Lenient mode joins everything and reports one
    /// outcome per request, in request order.
    pub async fn fetch_parents(
        &self,
        requests: Vec<FetchRequest>,
    ) -> Result<Vec<FetchOutcome>, FetchError> {
        let mut set: JoinSet<(usize, FetchRequest, Result<ConstitutionDocument, FetchError>)> =
            JoinSet::new();
        for (slot, request) in requests.into_iter().enumerate() {
            let fetcher = self.clone();
            set.spawn(async move {
                let result = fetcher.fetch(&request.source, request.level).await;
                (slot, request, result)
            });
        }

        let mut slots: Vec<Option<FetchOutcome>> = Vec::new();
        slots.resize_with(set.len(), || None);

        while let Some(joined) = set.join_next().await {
            let Ok((slot, request, result)) = joined else {
                // A panicked or cancelled task; in strict mode the run is
                // already aborting, in lenient mode nothing to record.
                continue;
            };
            match result {
                Ok(document) => slots[slot] = Some(FetchOutcome::Fetched(document)),
                Err(error) => match self.options.mode {
                    FailureMode::Strict => {
                        set.abort_all();
                        return Err(error);
                    }
                    FailureMode::Lenient => {
                        warn!(source = %request.source, level = %request.level, %error,
                              "dropping level after fetch failure (lenient mode)");
                        slots[slot] = Some(FetchOutcome::Skipped {
                            source: request.source,
                            level: request.level,
                            error,
                        });
                    }
                },
            }
        }

        Ok(slots.into_iter().flatten().collect())
    }
}
