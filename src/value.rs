//! Rule values.
//!
//! Constitution documents are loosely structured, so values are a tagged
//! variant rather than a fixed schema: plain scalars, lists, and nested
//! mappings. The extractor matches exhaustively on this enum; tolerance for
//! the document format never costs type safety downstream.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Possible values a rule can hold.
///
/// # Examples
///
/// ```
/// use charter::Value;
///
/// let scalar = Value::scalar("opus");
/// let list = Value::List(vec!["keys".to_string(), "passwords".to_string()]);
///
/// assert!(scalar.is_scalar());
/// assert!(list.is_list());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// A single scalar, kept as authored text.
    Scalar(String),

    /// An ordered list of scalar items.
    List(Vec<String>),

    /// A nested key/value mapping, insertion-ordered.
    Mapping(IndexMap<String, Value>),
}

/// A numeric envelope declared by a higher authority.
///
/// The floor/ceiling is enforced top-down while the exact value inside it
/// is chosen bottom-up; see the resolver's bounded-value handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bound {
    /// Inclusive lower bound, if declared.
    pub min: Option<i64>,

    /// Inclusive upper bound, if declared.
    pub max: Option<i64>,
}

impl Bound {
    /// Whether `value` falls inside the envelope.
    #[must_use]
    pub fn contains(&self, value: i64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

impl Value {
    /// Creates a scalar value from anything string-like.
    pub fn scalar(text: impl Into<String>) -> Self {
        Self::Scalar(text.into())
    }

    #[must_use]
    pub const fn is_scalar(&self) -> bool {
        matches!(self, Self::Scalar(_))
    }

    #[must_use]
    pub const fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    #[must_use]
    pub const fn is_mapping(&self) -> bool {
        matches!(self, Self::Mapping(_))
    }

    /// Returns the scalar text, if this is a scalar.
    #[must_use]
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Self::Scalar(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the list items, if this is a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the mapping, if this is a mapping.
    #[must_use]
    pub fn as_mapping(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Self::Mapping(v) => Some(v),
            _ => None,
        }
    }

    /// Parses the scalar as an integer, tolerating a trailing unit word
    /// ("30 files", "85%").
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        let text = self.as_scalar()?.trim();
        let digits: String = text
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '-')
            .collect();
        if digits.is_empty() {
            return None;
        }
        digits.parse().ok()
    }

    /// Interprets a mapping value as a numeric envelope, if it declares
    /// `min` and/or `max` entries.
    #[must_use]
    pub fn as_bound(&self) -> Option<Bound> {
        let mapping = self.as_mapping()?;
        let min = mapping.get("min").and_then(Value::as_int);
        let max = mapping.get("max").and_then(Value::as_int);
        if min.is_none() && max.is_none() {
            return None;
        }
        Some(Bound { min, max })
    }

    /// Canonical text rendering used for textual-identity comparison
    /// (no-op override detection). Not a serialization format.
    #[must_use]
    pub fn canonical_text(&self) -> String {
        match self {
            Self::Scalar(v) => v.trim().to_string(),
            Self::List(items) => {
                let trimmed: Vec<&str> = items.iter().map(|i| i.trim()).collect();
                format!("[{}]", trimmed.join(", "))
            }
            Self::Mapping(map) => {
                let mut parts: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("{k}: {}", v.canonical_text()))
                    .collect();
                parts.sort();
                format!("{{{}}}", parts.join(", "))
            }
        }
    }

    /// Whether `self` would narrow `winner` had it won: a strict subset of
    /// a winning list, or a lower numeric value than a winning scalar.
    ///
    /// Narrowing never changes the outcome; it is diagnostic signal for a
    /// lower authority attempting to weaken a safety rule.
    #[must_use]
    pub fn narrows(&self, winner: &Value) -> bool {
        match (self, winner) {
            (Self::List(mine), Self::List(theirs)) => {
                mine.len() < theirs.len() && mine.iter().all(|item| theirs.contains(item))
            }
            (Self::Scalar(_), Self::Scalar(_)) => match (self.as_int(), winner.as_int()) {
                (Some(mine), Some(theirs)) => mine < theirs,
                _ => false,
            },
            _ => false,
        }
    }
}
