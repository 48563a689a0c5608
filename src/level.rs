//! Authority levels and the data-driven precedence table.
//!
//! The precedence model itself (which categories exist and how their
//! (category, level) pairs rank) is data, not code: governance amendments
//! change the rules of the resolver over time, so an amended table can be
//! loaded from JSON instead of patching the resolver. User documents never
//! configure it; it is an operator input.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ConfigError;
use crate::rule::{Category, Rule};

/// An authority tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelName {
    Org,
    Team,
    Repo,
}

impl LevelName {
    /// All levels, root-first.
    pub const ROOT_FIRST: [LevelName; 3] = [LevelName::Org, LevelName::Team, LevelName::Repo];
}

impl fmt::Display for LevelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Org => write!(f, "org"),
            Self::Team => write!(f, "team"),
            Self::Repo => write!(f, "repo"),
        }
    }
}

/// One row of the precedence table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankRow {
    pub category: Category,

    /// `None` for the legal tier, which outranks every internal level
    /// regardless of where the rule was declared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<LevelName>,

    pub rank: u8,
}

/// The precedence table mapping (category, declaring level) to an ordinal.
///
/// Lower ordinals mean higher authority. The fixed hybrid default:
/// Legal=0, Org/Safety=1, Team/Safety=2, Org/Config=3, Team/Config=4,
/// Repo/Config=5. A repo-declared safety rule ranks below both inherited
/// safety tiers; within a category only relative order matters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RankTableData", into = "RankTableData")]
pub struct RankTable {
    rows: Vec<RankRow>,
}

/// Raw serialized form, validated on the way in.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RankTableData {
    rows: Vec<RankRow>,
}

impl From<RankTable> for RankTableData {
    fn from(table: RankTable) -> Self {
        Self { rows: table.rows }
    }
}

impl TryFrom<RankTableData> for RankTable {
    type Error = ConfigError;

    fn try_from(data: RankTableData) -> Result<Self, Self::Error> {
        RankTable::new(data.rows)
    }
}

impl Default for RankTable {
    fn default() -> Self {
        Self {
            rows: vec![
                RankRow {
                    category: Category::Legal,
                    level: None,
                    rank: 0,
                },
                RankRow {
                    category: Category::Safety,
                    level: Some(LevelName::Org),
                    rank: 1,
                },
                RankRow {
                    category: Category::Safety,
                    level: Some(LevelName::Team),
                    rank: 2,
                },
                RankRow {
                    category: Category::Configurable,
                    level: Some(LevelName::Org),
                    rank: 3,
                },
                RankRow {
                    category: Category::Configurable,
                    level: Some(LevelName::Team),
                    rank: 4,
                },
                RankRow {
                    category: Category::Configurable,
                    level: Some(LevelName::Repo),
                    rank: 5,
                },
                RankRow {
                    category: Category::Safety,
                    level: Some(LevelName::Repo),
                    rank: 6,
                },
            ],
        }
    }
}

impl RankTable {
    /// Builds a validated table.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidRankTable` if a (category, level) pair
    /// is duplicated, the legal row is missing, or any internal
    /// (category, level) combination is uncovered.
    pub fn new(rows: Vec<RankRow>) -> Result<Self, ConfigError> {
        let mut seen: Vec<(Category, Option<LevelName>)> = Vec::with_capacity(rows.len());
        for row in &rows {
            let pair = (row.category, row.level);
            if seen.contains(&pair) {
                return Err(ConfigError::InvalidRankTable {
                    reason: format!(
                        "duplicate row for category '{}' level '{}'",
                        row.category,
                        row.level.map_or_else(|| "any".to_string(), |l| l.to_string()),
                    ),
                });
            }
            seen.push(pair);
        }

        if !seen.contains(&(Category::Legal, None)) {
            return Err(ConfigError::InvalidRankTable {
                reason: "missing legal row".to_string(),
            });
        }
        for category in [Category::Safety, Category::Configurable] {
            for level in LevelName::ROOT_FIRST {
                if !seen.contains(&(category, Some(level))) {
                    return Err(ConfigError::InvalidRankTable {
                        reason: format!("missing row for category '{category}' level '{level}'"),
                    });
                }
            }
        }

        Ok(Self { rows })
    }

    /// Loads an amended table from JSON text.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::InvalidRankTable {
            reason: e.to_string(),
        })
    }

    /// The precedence ordinal for a rule. Legal rules rank identically at
    /// every declaring level.
    #[must_use]
    pub fn rank_of(&self, category: Category, level: LevelName) -> u8 {
        self.rows
            .iter()
            .find(|row| {
                row.category == category && (row.level.is_none() || row.level == Some(level))
            })
            .map(|row| row.rank)
            .unwrap_or(u8::MAX)
    }
}

/// One authority tier's document contribution: its classified rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub name: LevelName,

    /// Source reference the level's document was fetched from.
    pub source: String,

    pub rules: Vec<Rule>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_matches_hybrid_model() {
        let table = RankTable::default();
        assert_eq!(table.rank_of(Category::Legal, LevelName::Repo), 0);
        assert_eq!(table.rank_of(Category::Legal, LevelName::Org), 0);
        assert_eq!(table.rank_of(Category::Safety, LevelName::Org), 1);
        assert_eq!(table.rank_of(Category::Safety, LevelName::Team), 2);
        assert_eq!(table.rank_of(Category::Configurable, LevelName::Org), 3);
        assert_eq!(table.rank_of(Category::Configurable, LevelName::Team), 4);
        assert_eq!(table.rank_of(Category::Configurable, LevelName::Repo), 5);
        // Safety ranks stay ordered Org < Team < Repo.
        assert!(
            table.rank_of(Category::Safety, LevelName::Team)
                < table.rank_of(Category::Safety, LevelName::Repo)
        );
    }

    #[test]
    fn table_round_trips_through_json() {
        let table = RankTable::default();
        let json = serde_json::to_string(&table).unwrap();
        let back = RankTable::from_json(&json).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn missing_row_is_rejected() {
        let rows = vec![RankRow {
            category: Category::Legal,
            level: None,
            rank: 0,
        }];
        let err = RankTable::new(rows).unwrap_err();
        assert!(err.to_string().contains("missing row"));
    }

    #[test]
    fn duplicate_row_is_rejected() {
        let mut rows = vec![
            RankRow {
                category: Category::Legal,
                level: None,
                rank: 0,
            },
            RankRow {
                category: Category::Safety,
                level: Some(LevelName::Org),
                rank: 1,
            },
        ];
        rows.push(rows[1]);
        let err = RankTable::new(rows).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }
}
