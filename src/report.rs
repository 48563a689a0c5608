//! Resolution reports.
//!
//! The report is the boundary surface: a structured view of the effective
//! ruleset, every conflict, and the audited chain, rendered as JSON for
//! machines or text for humans. Output is deterministic: effective rules
//! are sorted by key and resolving identical inputs twice yields
//! byte-identical JSON.

use serde::{Deserialize, Serialize};

use crate::chain::DocumentChain;
use crate::document::FetchMode;
use crate::level::LevelName;
use crate::location::SourceLocation;
use crate::resolve::{ConflictReason, Resolution, Severity};
use crate::rule::{Category, RuleKey};
use crate::value::Value;

/// One effective rule, as reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveRuleView {
    pub key: RuleKey,
    pub value: Value,
    pub category: Category,
    pub level: LevelName,
    pub source: SourceLocation,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub citation: Option<String>,
}

/// Provenance summary of one side of a conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRefView {
    pub level: LevelName,
    pub category: Category,
    pub source: SourceLocation,
}

/// One conflict, as reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictView {
    pub key: RuleKey,
    pub winner: RuleRefView,
    pub shadowed: Vec<RuleRefView>,
    pub reason: ConflictReason,
    pub severity: Severity,
    pub detail: String,
}

/// One level of the audited chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEntryView {
    pub level: LevelName,
    pub source: String,
    pub fetch_mode: FetchMode,

    /// blake3 digest of the fetched document text.
    pub digest: String,
}

/// The full report for one resolution run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionReport {
    pub effective_rules: Vec<EffectiveRuleView>,
    pub conflicts: Vec<ConflictView>,
    pub chain: Vec<ChainEntryView>,

    /// Run-level advisories: dropped levels, classifier downgrades.
    pub warnings: Vec<String>,
}

impl ResolutionReport {
    /// Assembles the report from a finished resolution.
    #[must_use]
    pub fn build(
        resolution: &Resolution,
        chain: &DocumentChain,
        extra_warnings: Vec<String>,
    ) -> Self {
        let effective_rules = resolution
            .effective
            .iter()
            .map(|(key, entry)| EffectiveRuleView {
                key: key.clone(),
                value: entry.winner.value.clone(),
                category: entry.winner.category,
                level: entry.winner.declared_level,
                source: entry.winner.location.clone(),
                citation: entry.winner.citation.clone(),
            })
            .collect();

        let conflicts = resolution
            .conflicts
            .iter()
            .map(|record| ConflictView {
                key: record.key.clone(),
                winner: RuleRefView {
                    level: record.winner.declared_level,
                    category: record.winner.category,
                    source: record.winner.location.clone(),
                },
                shadowed: record
                    .losers
                    .iter()
                    .map(|loser| RuleRefView {
                        level: loser.declared_level,
                        category: loser.category,
                        source: loser.location.clone(),
                    })
                    .collect(),
                reason: record.reason,
                severity: record.severity,
                detail: record.detail.clone(),
            })
            .collect();

        let chain_views = chain
            .levels
            .iter()
            .map(|level| ChainEntryView {
                level: level.document.level,
                source: level.document.source_ref.raw.clone(),
                fetch_mode: level.document.source_ref.mode,
                digest: level.document.digest.clone(),
            })
            .collect();

        let mut warnings: Vec<String> = chain.warnings.iter().map(ToString::to_string).collect();
        warnings.extend(extra_warnings);

        Self {
            effective_rules,
            conflicts,
            chain: chain_views,
            warnings,
        }
    }

    /// Whether any Error-severity conflict is present.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.conflicts.iter().any(|c| c.severity == Severity::Error)
    }

    /// Exit code for a completed run: `0` when errors are absent
    /// (warnings permitted), `1` otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(self.has_errors())
    }

    /// Deterministic JSON rendering.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Human-readable rendering; mirrors the JSON, one line per conflict.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut lines = vec![
            "Constitutional resolution".to_string(),
            "=========================".to_string(),
            String::new(),
            "Chain:".to_string(),
        ];
        for entry in &self.chain {
            lines.push(format!(
                "  {:<5} {} ({}, blake3:{})",
                entry.level.to_string(),
                entry.source,
                entry.fetch_mode,
                &entry.digest[..12.min(entry.digest.len())],
            ));
        }

        lines.push(String::new());
        lines.push(format!("Effective rules: {}", self.effective_rules.len()));
        for rule in &self.effective_rules {
            lines.push(format!(
                "  {} = {}  [{}, {}]",
                rule.key,
                rule.value.canonical_text(),
                rule.category,
                rule.level,
            ));
        }

        if !self.conflicts.is_empty() {
            lines.push(String::new());
            lines.push(format!("Conflicts: {}", self.conflicts.len()));
            for conflict in &self.conflicts {
                let prefix = match conflict.severity {
                    Severity::Error => "[ERROR]",
                    Severity::Warning => "[WARNING]",
                };
                lines.push(format!(
                    "  {prefix} {}: {} wins ({}); {}",
                    conflict.key, conflict.winner.level, conflict.reason, conflict.detail,
                ));
            }
        }

        for warning in &self.warnings {
            lines.push(format!("  [WARNING] {warning}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Result: {}",
            if self.has_errors() {
                "ERRORS PRESENT"
            } else {
                "RESOLVED"
            }
        ));
        lines.join("\n")
    }
}
