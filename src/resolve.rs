//! Conflict resolution.
//!
//! For every distinct key observed across the chain, the resolver picks
//! exactly one winner under per-category precedence and keeps every
//! shadowed instance for audit. Conflicts are explicit records, not hidden
//! errors; advisory findings (narrowing attempts, no-op overrides) never
//! abort the run, while ambiguity about input correctness (same-rank ties,
//! contradictory legal citations) always does.
//!
//! The whole pass is pure: deterministic output given the same levels and
//! rank table, no I/O, no shared state.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CharterResult, ParseError, ResolveError};
use crate::level::{Level, RankTable};
use crate::rule::{Category, Rule, RuleKey};

/// Why a conflict record exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    /// The category's precedence order decided the winner.
    CategoryPrecedence,

    /// A lower level overrode an inherited rule through the approved
    /// constitutional-change process.
    ExplicitSupersede,

    /// A legal rule displaced internal instances.
    LegalOverride,
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CategoryPrecedence => write!(f, "category_precedence"),
            Self::ExplicitSupersede => write!(f, "explicit_supersede"),
            Self::LegalOverride => write!(f, "legal_override"),
        }
    }
}

/// Whether a conflict gates CI or merely asks for review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// One resolved conflict, immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub key: RuleKey,
    pub winner: Rule,
    pub losers: Vec<Rule>,
    pub reason: ConflictReason,
    pub severity: Severity,

    /// Human-readable cause, e.g. what a narrowing attempt removed.
    pub detail: String,
}

/// One key's outcome: the winner plus everything it shadowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveEntry {
    pub winner: Rule,
    pub shadowed: Vec<Rule>,
}

/// The final conflict-resolved ruleset. Every key observed anywhere in the
/// chain appears exactly once; iteration order is sorted by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveRuleset {
    entries: BTreeMap<RuleKey, EffectiveEntry>,
}

impl EffectiveRuleset {
    /// The winning rule for a key.
    #[must_use]
    pub fn winner(&self, key: &RuleKey) -> Option<&Rule> {
        self.entries.get(key).map(|e| &e.winner)
    }

    /// The shadowed instances for a key.
    #[must_use]
    pub fn shadowed(&self, key: &RuleKey) -> &[Rule] {
        self.entries.get(key).map_or(&[], |e| e.shadowed.as_slice())
    }

    /// Sorted iteration over all entries.
    pub fn iter(&self) -> impl Iterator<Item = (&RuleKey, &EffectiveEntry)> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, key: RuleKey, winner: Rule, shadowed: Vec<Rule>) {
        self.entries.insert(key, EffectiveEntry { winner, shadowed });
    }
}

/// Output of one resolution pass.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub effective: EffectiveRuleset,
    pub conflicts: Vec<ConflictRecord>,
}

impl Resolution {
    /// Whether any Error-severity conflict is present.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.conflicts
            .iter()
            .any(|c| c.severity == Severity::Error)
    }
}

/// Merges the chain's levels into one effective ruleset.
#[derive(Debug, Clone)]
pub struct Resolver {
    rank_table: RankTable,
}

impl Resolver {
    #[must_use]
    pub const fn new(rank_table: RankTable) -> Self {
        Self { rank_table }
    }

    /// Resolves all levels into one [`Resolution`].
    ///
    /// # Errors
    ///
    /// Same-rank ties and contradictory legal citations abort with no
    /// effective ruleset produced.
    pub fn resolve(&self, levels: &[Level]) -> CharterResult<Resolution> {
        let mut by_key: BTreeMap<RuleKey, Vec<Rule>> = BTreeMap::new();
        for level in levels {
            for rule in &level.rules {
                by_key.entry(rule.key.clone()).or_default().push(rule.clone());
            }
        }

        let mut effective = EffectiveRuleset::default();
        let mut conflicts = Vec::new();

        for (key, instances) in by_key {
            self.resolve_key(&key, instances, &mut effective, &mut conflicts)?;
        }

        Ok(Resolution {
            effective,
            conflicts,
        })
    }

    fn rank(&self, rule: &Rule) -> u8 {
        self.rank_table.rank_of(rule.category, rule.declared_level)
    }

    fn resolve_key(
        &self,
        key: &RuleKey,
        instances: Vec<Rule>,
        effective: &mut EffectiveRuleset,
        conflicts: &mut Vec<ConflictRecord>,
    ) -> CharterResult<()> {
        // A same-rank pair in the same category is ambiguous input even
        // when a higher authority would shadow both. Legal instances are
        // exempt; citation specificity arbitrates them.
        for (i, a) in instances.iter().enumerate() {
            for b in &instances[i + 1..] {
                if a.category != Category::Legal
                    && a.category == b.category
                    && self.rank(a) == self.rank(b)
                {
                    return Err(ParseError::DuplicateKey {
                        key: key.to_string(),
                        first: a.location.clone(),
                        second: b.location.clone(),
                    }
                    .into());
                }
            }
        }

        let has_legal = instances.iter().any(|r| r.category == Category::Legal);
        let has_safety = instances.iter().any(|r| r.category == Category::Safety);

        let winner = if has_legal {
            self.resolve_legal(key, &instances, conflicts)?
        } else if has_safety {
            self.resolve_safety(key, &instances, conflicts)?
        } else {
            self.resolve_configurable(key, &instances, conflicts)?
        };

        let shadowed: Vec<Rule> = instances
            .iter()
            .filter(|r| !std::ptr::eq(*r, winner))
            .cloned()
            .collect();
        let winner = winner.clone();
        effective.insert(key.clone(), winner, shadowed);
        Ok(())
    }

    /// Legal precedence: the most specific citation wins outright.
    fn resolve_legal<'a>(
        &self,
        key: &RuleKey,
        instances: &'a [Rule],
        conflicts: &mut Vec<ConflictRecord>,
    ) -> CharterResult<&'a Rule> {
        let legal: Vec<&Rule> = instances
            .iter()
            .filter(|r| r.category == Category::Legal)
            .collect();

        let mut winner = legal[0];
        for candidate in &legal[1..] {
            match citation_score(candidate).cmp(&citation_score(winner)) {
                std::cmp::Ordering::Greater => winner = candidate,
                std::cmp::Ordering::Less => {}
                std::cmp::Ordering::Equal => {
                    if candidate.value.canonical_text() != winner.value.canonical_text() {
                        // Two binding texts disagree; never arbitrated.
                        return Err(ResolveError::LegalContradiction {
                            key: key.to_string(),
                            first_citation: winner.citation.clone().unwrap_or_default(),
                            second_citation: candidate.citation.clone().unwrap_or_default(),
                        }
                        .into());
                    }
                    // Identical binding values: keep the earlier location
                    // for determinism.
                }
            }
        }

        if instances.len() > 1 {
            // A displaced but differing binding text gates CI even though
            // specificity picked a winner; agreeing texts merely shadow.
            let disagreement = legal.iter().any(|r| {
                !std::ptr::eq(*r, winner)
                    && r.value.canonical_text() != winner.value.canonical_text()
            });
            conflicts.push(ConflictRecord {
                key: key.clone(),
                winner: winner.clone(),
                losers: instances
                    .iter()
                    .filter(|r| !std::ptr::eq(*r, winner))
                    .cloned()
                    .collect(),
                reason: ConflictReason::LegalOverride,
                severity: if disagreement {
                    Severity::Error
                } else {
                    Severity::Warning
                },
                detail: format!(
                    "binding citation '{}' overrides all internal levels",
                    winner.citation.as_deref().unwrap_or("")
                ),
            });
        }
        Ok(winner)
    }

    /// Safety precedence: highest authority (lowest rank) wins, unless an
    /// approved supersede or an in-range bounded value applies.
    fn resolve_safety<'a>(
        &self,
        key: &RuleKey,
        instances: &'a [Rule],
        conflicts: &mut Vec<ConflictRecord>,
    ) -> CharterResult<&'a Rule> {
        // An approved supersede beats the precedence order; that is its
        // whole purpose. The most specific approved instance wins.
        let superseders: Vec<&Rule> = instances
            .iter()
            .filter(|r| r.supersede_approval.is_some())
            .collect();
        if !superseders.is_empty() {
            let winner = self.extreme_by_rank(key, &superseders, Extreme::HighestRank)?;
            conflicts.push(ConflictRecord {
                key: key.clone(),
                winner: winner.clone(),
                losers: instances
                    .iter()
                    .filter(|r| !std::ptr::eq(*r, winner))
                    .cloned()
                    .collect(),
                reason: ConflictReason::ExplicitSupersede,
                severity: Severity::Warning,
                detail: format!(
                    "supersede approved by '{}'",
                    winner.supersede_approval.as_deref().unwrap_or("")
                ),
            });
            return Ok(winner);
        }

        let safety: Vec<&Rule> = instances
            .iter()
            .filter(|r| r.category == Category::Safety)
            .collect();
        let authority = self.extreme_by_rank(key, &safety, Extreme::LowestRank)?;

        // Bounded-but-adjustable: the authority declares the envelope, the
        // most specific lower level picks the exact value inside it.
        if let Some(bound) = authority.value.as_bound() {
            let candidates: Vec<&Rule> = instances
                .iter()
                .filter(|r| !std::ptr::eq(*r, authority) && r.value.as_int().is_some())
                .collect();
            if !candidates.is_empty() {
                let specific = self.extreme_by_rank(key, &candidates, Extreme::HighestRank)?;
                let value = specific.value.as_int().unwrap_or_default();
                if bound.contains(value) {
                    return Ok(specific);
                }
                conflicts.push(ConflictRecord {
                    key: key.clone(),
                    winner: authority.clone(),
                    losers: vec![specific.clone()],
                    reason: ConflictReason::CategoryPrecedence,
                    severity: Severity::Error,
                    detail: format!(
                        "value {value} falls outside the envelope declared by {}",
                        authority.location
                    ),
                });
                return Ok(authority);
            }
        }

        // Narrowing attempts never win, but the attempt itself is signal.
        for loser in instances {
            if std::ptr::eq(loser, authority) {
                continue;
            }
            if loser.category == Category::Safety
                && self.rank(loser) > self.rank(authority)
                && loser.value.narrows(&authority.value)
            {
                conflicts.push(ConflictRecord {
                    key: key.clone(),
                    winner: authority.clone(),
                    losers: vec![loser.clone()],
                    reason: ConflictReason::CategoryPrecedence,
                    severity: Severity::Warning,
                    detail: format!(
                        "{} level attempts to narrow a safety rule set by {} level",
                        loser.declared_level, authority.declared_level
                    ),
                });
            }
        }

        Ok(authority)
    }

    /// Configurable precedence: the most specific level wins, silently.
    fn resolve_configurable<'a>(
        &self,
        key: &RuleKey,
        instances: &'a [Rule],
        conflicts: &mut Vec<ConflictRecord>,
    ) -> CharterResult<&'a Rule> {
        let refs: Vec<&Rule> = instances.iter().collect();
        let winner = self.extreme_by_rank(key, &refs, Extreme::HighestRank)?;

        for loser in instances {
            if std::ptr::eq(loser, winner) {
                continue;
            }
            if loser.value.canonical_text() == winner.value.canonical_text() {
                conflicts.push(ConflictRecord {
                    key: key.clone(),
                    winner: winner.clone(),
                    losers: vec![loser.clone()],
                    reason: ConflictReason::CategoryPrecedence,
                    severity: Severity::Warning,
                    detail: format!(
                        "override at {} level repeats the inherited value verbatim",
                        winner.declared_level
                    ),
                });
            }
        }

        Ok(winner)
    }

    /// Picks the instance at the extreme rank; an exact tie is fatal.
    fn extreme_by_rank<'a>(
        &self,
        key: &RuleKey,
        instances: &[&'a Rule],
        extreme: Extreme,
    ) -> Result<&'a Rule, ParseError> {
        let mut best = instances[0];
        let mut best_rank = self.rank(best);
        let mut tied: Option<&Rule> = None;

        for candidate in &instances[1..] {
            let rank = self.rank(candidate);
            let better = match extreme {
                Extreme::LowestRank => rank < best_rank,
                Extreme::HighestRank => rank > best_rank,
            };
            if better {
                best = candidate;
                best_rank = rank;
                tied = None;
            } else if rank == best_rank {
                tied = Some(candidate);
            }
        }

        if let Some(other) = tied {
            return Err(ParseError::DuplicateKey {
                key: key.to_string(),
                first: best.location.clone(),
                second: other.location.clone(),
            });
        }
        Ok(best)
    }
}

#[derive(Debug, Clone, Copy)]
enum Extreme {
    LowestRank,
    HighestRank,
}

/// Citation specificity: a numbered article or section beats prose, longer
/// citations beat shorter ones. Deterministic by construction.
fn citation_score(rule: &Rule) -> (bool, usize) {
    let citation = rule.citation.as_deref().unwrap_or("").trim();
    let has_number = citation.chars().any(|c| c.is_ascii_digit());
    (has_number, citation.len())
}
