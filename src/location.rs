//! Source locations for diagnostics and rule provenance.
//!
//! Every rule and every error names the exact document (file path or URL)
//! and, where known, the line it came from, so a human can fix the
//! authoring document rather than chase the resolver.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A position inside a constitution document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    /// File path or URL of the document.
    pub source: String,

    /// 1-based line number, when the producing phase knows it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl SourceLocation {
    /// Creates a location.
    pub fn new(source: impl Into<String>, line: Option<usize>) -> Self {
        Self {
            source: source.into(),
            line,
        }
    }

    /// Location covering a whole document (no line).
    pub fn whole(source: impl Into<String>) -> Self {
        Self::new(source, None)
    }

    /// Returns the same location with a different line.
    #[must_use]
    pub fn at_line(&self, line: usize) -> Self {
        Self {
            source: self.source.clone(),
            line: Some(line),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{line}", self.source),
            None => write!(f, "{}", self.source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_line_when_present() {
        let loc = SourceLocation::new("teams/platform/CONSTITUTION.md", Some(7));
        assert_eq!(loc.to_string(), "teams/platform/CONSTITUTION.md:7");

        let whole = SourceLocation::whole("https://example.com/org.md");
        assert_eq!(whole.to_string(), "https://example.com/org.md");
    }
}
