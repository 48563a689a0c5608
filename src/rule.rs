//! Rule records and their provenance.
//!
//! A rule travels through two shapes. The extractor emits [`RawRule`]s,
//! which carry everything read from the document but no category. The
//! classifier consumes them and constructs [`Rule`]s, fixing the category
//! exactly once. Nothing downstream can mutate a category; the split makes
//! that a property of the types rather than a convention.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::level::LevelName;
use crate::location::SourceLocation;
use crate::value::Value;

/// A dotted rule path derived from heading nesting,
/// e.g. `security_protocol.never_commit`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleKey(String);

impl RuleKey {
    /// Creates a key from an already-dotted path.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Joins section segments and a leaf key into a dotted path.
    #[must_use]
    pub fn from_segments(sections: &[String], leaf: &str) -> Self {
        if sections.is_empty() {
            return Self(leaf.to_string());
        }
        Self(format!("{}.{leaf}", sections.join(".")))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The leaf segment of the path.
    #[must_use]
    pub fn tail(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    /// The first segment of the path.
    #[must_use]
    pub fn root(&self) -> &str {
        self.0.split('.').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Conflict-resolution category of a rule. Resolved exactly once by the
/// classifier and never mutated afterward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Highest-authority declaring level wins, irrespective of specificity.
    Safety,

    /// Most specific declaring level wins.
    Configurable,

    /// Sourced from a binding external instrument; overrides all internal
    /// levels.
    Legal,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Safety => write!(f, "safety"),
            Self::Configurable => write!(f, "configurable"),
            Self::Legal => write!(f, "legal"),
        }
    }
}

/// An explicit `# INHERITANCE:` marker line immediately preceding a rule
/// declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "class")]
pub enum InlineMarker {
    /// `# INHERITANCE: safety — higher-wins`
    Safety,

    /// `# INHERITANCE: configurable — specific-wins`
    Configurable,

    /// `# INHERITANCE: supersede — approved:<process-ref>`
    ///
    /// Lets a lower level override an inherited safety rule through the
    /// constitutional-change process; always leaves an audit record.
    Supersede {
        /// Reference to the approving process record.
        approved_by: String,
    },
}

/// A rule as read from a document, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRule {
    pub key: RuleKey,
    pub value: Value,

    /// Explicit inline marker, if one preceded the declaration.
    pub marker: Option<InlineMarker>,

    /// `source` citation field, present only for entries under the
    /// reserved legal root (enforced at extraction time).
    pub citation: Option<String>,

    /// Whether the rule was declared under a reserved
    /// `org_compliance`/`legal` root section.
    pub under_legal_root: bool,

    pub location: SourceLocation,
}

/// A classified rule with full provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub key: RuleKey,
    pub value: Value,
    pub category: Category,

    /// The authority level whose document declared this rule.
    pub declared_level: LevelName,

    /// Exact document and line the rule came from.
    pub location: SourceLocation,

    /// Whether an explicit inline annotation chose the category.
    pub inline_annotation: bool,

    /// Binding citation, for legal rules.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citation: Option<String>,

    /// Approving process reference, when the rule carries an explicit
    /// supersede marker.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supersede_approval: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_from_segments_joins_with_dots() {
        let key = RuleKey::from_segments(
            &["security_protocol".to_string(), "secrets".to_string()],
            "never_commit",
        );
        assert_eq!(key.as_str(), "security_protocol.secrets.never_commit");
        assert_eq!(key.tail(), "never_commit");
        assert_eq!(key.root(), "security_protocol");
    }

    #[test]
    fn bare_leaf_key_has_no_dot() {
        let key = RuleKey::from_segments(&[], "inherits_from");
        assert_eq!(key.as_str(), "inherits_from");
        assert_eq!(key.tail(), "inherits_from");
    }

    #[test]
    fn rule_round_trips_through_json() {
        let rule = Rule {
            key: RuleKey::new("security_protocol.never_commit"),
            value: Value::List(vec!["keys".to_string(), "passwords".to_string()]),
            category: Category::Safety,
            declared_level: LevelName::Org,
            location: SourceLocation::new("CONSTITUTION.org.md", Some(14)),
            inline_annotation: false,
            citation: None,
            supersede_approval: None,
        };
        let json = serde_json::to_string(&rule).unwrap();
        let back: Rule = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rule);
        assert_eq!(back.category, Category::Safety);
        assert_eq!(back.value, rule.value);
    }
}
