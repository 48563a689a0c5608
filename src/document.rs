//! Constitution documents and source references.
//!
//! A [`SourceRef`] names where a document lives and how to fetch it; a
//! [`ConstitutionDocument`] is one fetched document. Documents are created
//! per run, immutable, and discarded after resolution. They are never
//! persisted; the authored files (in version control or on a remote host)
//! are the only durable state.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::level::LevelName;

/// How a document is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// Read from the local filesystem.
    Local,

    /// HTTPS GET with a bounded timeout.
    Url,
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Url => write!(f, "url"),
        }
    }
}

/// A reference to a constitution document: the raw authored string plus the
/// resolved target.
///
/// Mode detection is an exact prefix match: `https://` means URL mode,
/// anything else is a local path resolved relative to the referencing
/// document's directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// The reference exactly as authored.
    pub raw: String,

    pub mode: FetchMode,

    /// Fetch target: an absolute-ish path for local mode, the URL for URL
    /// mode.
    pub target: String,
}

impl SourceRef {
    /// Parses a reference, resolving local paths against `base_dir` (the
    /// directory of the referencing document).
    #[must_use]
    pub fn parse(raw: &str, base_dir: Option<&Path>) -> Self {
        let raw = raw.trim();
        if raw.starts_with("https://") {
            return Self {
                raw: raw.to_string(),
                mode: FetchMode::Url,
                target: raw.to_string(),
            };
        }

        let path = Path::new(raw);
        let target = match base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        };
        Self {
            raw: raw.to_string(),
            mode: FetchMode::Local,
            target: target.to_string_lossy().into_owned(),
        }
    }

    /// Parses a reference found inside `referencing`, resolving relative
    /// paths against the referencing document's own location: URL parents
    /// join per RFC 3986, local parents resolve against the document's
    /// directory.
    #[must_use]
    pub fn relative_to(raw: &str, referencing: &SourceRef) -> Self {
        let trimmed = raw.trim();
        if trimmed.starts_with("https://") {
            return Self::parse(trimmed, None);
        }
        match referencing.mode {
            FetchMode::Url => {
                let joined = url::Url::parse(&referencing.target)
                    .ok()
                    .and_then(|base| base.join(trimmed).ok());
                match joined {
                    Some(url) => Self {
                        raw: trimmed.to_string(),
                        mode: FetchMode::Url,
                        target: url.to_string(),
                    },
                    None => Self::parse(trimmed, None),
                }
            }
            FetchMode::Local => {
                let base = Path::new(&referencing.target).parent();
                Self::parse(trimmed, base)
            }
        }
    }

    /// Canonical identity used for cycle detection.
    ///
    /// Local paths canonicalize through the filesystem when possible so
    /// `./team.md` and `team.md` collide; URLs normalize through the `url`
    /// crate so trailing-slash and default-port variants collide. Falls
    /// back to a lexical cleanup when neither succeeds.
    #[must_use]
    pub fn canonical_id(&self) -> String {
        match self.mode {
            FetchMode::Url => url::Url::parse(&self.target)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| self.target.clone()),
            FetchMode::Local => std::fs::canonicalize(&self.target)
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_else(|_| lexical_clean(Path::new(&self.target))),
        }
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Lexically removes `.` and resolves `..` components without touching the
/// filesystem.
fn lexical_clean(path: &Path) -> String {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !cleaned.pop() {
                    cleaned.push("..");
                }
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    cleaned.to_string_lossy().into_owned()
}

/// One fetched constitution document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstitutionDocument {
    pub source_ref: SourceRef,

    /// Authority tier this document speaks for.
    pub level: LevelName,

    pub raw_text: String,

    pub fetched_at: DateTime<Utc>,

    /// blake3 hex digest of `raw_text`, reported in the audit chain.
    pub digest: String,
}

impl ConstitutionDocument {
    /// Wraps fetched text with its provenance.
    #[must_use]
    pub fn new(source_ref: SourceRef, level: LevelName, raw_text: String) -> Self {
        let digest = blake3::hash(raw_text.as_bytes()).to_hex().to_string();
        Self {
            source_ref,
            level,
            raw_text,
            fetched_at: Utc::now(),
            digest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn https_prefix_selects_url_mode() {
        let r = SourceRef::parse("https://example.com/CONSTITUTION.org.md", None);
        assert_eq!(r.mode, FetchMode::Url);
        assert_eq!(r.target, "https://example.com/CONSTITUTION.org.md");
    }

    #[test]
    fn http_prefix_is_not_url_mode() {
        // Exact-prefix contract: only https:// selects URL mode.
        let r = SourceRef::parse("http://example.com/org.md", None);
        assert_eq!(r.mode, FetchMode::Local);
    }

    #[test]
    fn relative_path_resolves_against_base_dir() {
        let r = SourceRef::parse("../team/CONSTITUTION.md", Some(Path::new("/repos/api")));
        assert_eq!(r.mode, FetchMode::Local);
        assert_eq!(r.target, "/repos/api/../team/CONSTITUTION.md");
        assert_eq!(r.canonical_id(), "/repos/team/CONSTITUTION.md");
    }

    #[test]
    fn equivalent_local_refs_share_canonical_id() {
        let a = SourceRef::parse("./x/../team.md", Some(Path::new("/repos")));
        let b = SourceRef::parse("team.md", Some(Path::new("/repos")));
        assert_eq!(a.canonical_id(), b.canonical_id());
    }

    #[test]
    fn document_digest_is_content_stable() {
        let r = SourceRef::parse("CONSTITUTION.md", None);
        let a = ConstitutionDocument::new(r.clone(), LevelName::Repo, "x: 1\n".to_string());
        let b = ConstitutionDocument::new(r, LevelName::Repo, "x: 1\n".to_string());
        assert_eq!(a.digest, b.digest);
    }
}
