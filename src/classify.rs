//! Category classification.
//!
//! Each rule's category is resolved exactly once, by this module, using a
//! three-step fallback chain:
//!
//! 1. an explicit inline marker on the declaration;
//! 2. membership in the canonical safety-keys table (the enumerated
//!    non-negotiable list);
//! 3. default to Configurable.
//!
//! Explicit markers remove ambiguity for authors who use them; the
//! canonical table protects against an author forgetting to mark a
//! known-dangerous key; the default favors permissiveness for genuinely
//! new keys. Legal classification is structural: only rules declared under
//! the reserved legal root (which the extractor guarantees carry a
//! citation) are Legal.

use std::fmt;

use crate::level::LevelName;
use crate::location::SourceLocation;
use crate::rule::{Category, InlineMarker, RawRule, Rule, RuleKey};

/// The canonical non-negotiable keys. A rule whose key tail or any dotted
/// segment matches one of these defaults to Safety.
pub const CANONICAL_SAFETY_KEYS: [&str; 12] = [
    "never_commit",
    "security_review",
    "kill_switch",
    "pre_commit_hooks",
    "human_pr_review",
    "constitutional_change",
    "compliance",
    "audit_requirements",
    "data_classification",
    "credential_rotation",
    "security_protocol",
    "mandatory_session_protocol",
];

/// The canonical safety-keys table.
///
/// Carried as data so amendments can extend it without touching the
/// fallback chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyKeyTable {
    keys: Vec<String>,
}

impl Default for SafetyKeyTable {
    fn default() -> Self {
        Self {
            keys: CANONICAL_SAFETY_KEYS.iter().map(|k| (*k).to_string()).collect(),
        }
    }
}

impl SafetyKeyTable {
    /// Builds a table from explicit keys.
    #[must_use]
    pub fn new(keys: Vec<String>) -> Self {
        Self { keys }
    }

    /// Whether a rule key is covered by the table.
    #[must_use]
    pub fn covers(&self, key: &RuleKey) -> bool {
        key.as_str()
            .split('.')
            .any(|segment| self.keys.iter().any(|k| k == segment))
    }
}

/// An advisory finding from classification. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierWarning {
    pub key: RuleKey,
    pub location: SourceLocation,
}

impl fmt::Display for ClassifierWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: inline marker downgrades canonical safety key '{}' to configurable",
            self.location, self.key
        )
    }
}

/// Classifies one document's raw rules for the level that declared them.
///
/// An inline `configurable` marker on a canonical safety key wins (inline
/// is the highest classification precedence) but is surfaced as a warning:
/// the source material never settles whether that should be allowed, so the
/// downgrade is flagged rather than silently accepted.
#[must_use]
pub fn classify(
    raw_rules: Vec<RawRule>,
    level: LevelName,
    table: &SafetyKeyTable,
) -> (Vec<Rule>, Vec<ClassifierWarning>) {
    let mut rules = Vec::with_capacity(raw_rules.len());
    let mut warnings = Vec::new();

    for raw in raw_rules {
        let in_table = table.covers(&raw.key);

        let (category, inline_annotation, supersede_approval) = if raw.under_legal_root {
            (Category::Legal, false, None)
        } else {
            match &raw.marker {
                Some(InlineMarker::Safety) => (Category::Safety, true, None),
                Some(InlineMarker::Configurable) => {
                    if in_table {
                        warnings.push(ClassifierWarning {
                            key: raw.key.clone(),
                            location: raw.location.clone(),
                        });
                    }
                    (Category::Configurable, true, None)
                }
                Some(InlineMarker::Supersede { approved_by }) => {
                    // A supersede declaration competes in the category the
                    // key would otherwise have; the approval is what lets
                    // it beat higher authority.
                    let category = if in_table {
                        Category::Safety
                    } else {
                        Category::Configurable
                    };
                    (category, true, Some(approved_by.clone()))
                }
                None if in_table => (Category::Safety, false, None),
                None => (Category::Configurable, false, None),
            }
        };

        rules.push(Rule {
            key: raw.key,
            value: raw.value,
            category,
            declared_level: level,
            location: raw.location,
            inline_annotation,
            citation: raw.citation,
            supersede_approval,
        });
    }

    (rules, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn raw(key: &str, marker: Option<InlineMarker>) -> RawRule {
        RawRule {
            key: RuleKey::new(key),
            value: Value::scalar("x"),
            marker,
            citation: None,
            under_legal_root: false,
            location: SourceLocation::new("CONSTITUTION.md", Some(1)),
        }
    }

    #[test]
    fn canonical_key_defaults_to_safety() {
        let table = SafetyKeyTable::default();
        let (rules, warnings) =
            classify(vec![raw("security_protocol.never_commit", None)], LevelName::Org, &table);
        assert_eq!(rules[0].category, Category::Safety);
        assert!(!rules[0].inline_annotation);
        assert!(warnings.is_empty());
    }

    #[test]
    fn unmatched_key_defaults_to_configurable() {
        let table = SafetyKeyTable::default();
        let (rules, _) = classify(vec![raw("conventions.style", None)], LevelName::Repo, &table);
        assert_eq!(rules[0].category, Category::Configurable);
    }

    #[test]
    fn inline_marker_beats_the_table_but_warns() {
        let table = SafetyKeyTable::default();
        let (rules, warnings) = classify(
            vec![raw(
                "security_protocol.never_commit",
                Some(InlineMarker::Configurable),
            )],
            LevelName::Repo,
            &table,
        );
        assert_eq!(rules[0].category, Category::Configurable);
        assert!(rules[0].inline_annotation);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].to_string().contains("never_commit"));
    }

    #[test]
    fn inline_safety_marker_on_plain_key() {
        let table = SafetyKeyTable::default();
        let (rules, warnings) = classify(
            vec![raw("review.code_review", Some(InlineMarker::Safety))],
            LevelName::Org,
            &table,
        );
        assert_eq!(rules[0].category, Category::Safety);
        assert!(warnings.is_empty());
    }

    #[test]
    fn legal_root_rules_are_legal_regardless_of_markers() {
        let table = SafetyKeyTable::default();
        let mut r = raw("data_residency", None);
        r.under_legal_root = true;
        r.citation = Some("GDPR Article 44".to_string());
        let (rules, _) = classify(vec![r], LevelName::Org, &table);
        assert_eq!(rules[0].category, Category::Legal);
        assert_eq!(rules[0].citation.as_deref(), Some("GDPR Article 44"));
    }

    #[test]
    fn supersede_keeps_the_table_category_and_records_approval() {
        let table = SafetyKeyTable::default();
        let (rules, _) = classify(
            vec![raw(
                "security_protocol.never_commit",
                Some(InlineMarker::Supersede {
                    approved_by: "adr-0042".to_string(),
                }),
            )],
            LevelName::Repo,
            &table,
        );
        assert_eq!(rules[0].category, Category::Safety);
        assert_eq!(rules[0].supersede_approval.as_deref(), Some("adr-0042"));
    }
}
