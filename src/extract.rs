//! Rule extraction from constitution documents.
//!
//! Constitutions are structured Markdown: headings open nested sections,
//! `key: value` lines declare rules, and a `# INHERITANCE:` comment line
//! immediately preceding a declaration attaches an explicit marker. The
//! parser is format-tolerant (prose, blank lines, and unknown comments are
//! documentation, not structure) but never guesses: a structurally
//! malformed block is a [`ParseError`] naming the offending line, never a
//! skipped rule or a defaulted value.

use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;

use crate::document::ConstitutionDocument;
use crate::error::ParseError;
use crate::location::SourceLocation;
use crate::rule::{InlineMarker, RawRule, RuleKey};
use crate::value::Value;

/// Reserved top-level section roots that mark legal rules.
pub const LEGAL_ROOTS: [&str; 2] = ["org_compliance", "legal"];

/// Everything extracted from one document.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Flat rule list, categories not yet assigned.
    pub rules: Vec<RawRule>,

    /// Raw `inherits_from` references, in declaration order.
    pub parents: Vec<String>,
}

fn marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^#+\s*INHERITANCE:\s*([A-Za-z_]+)\s*(?:[—–-]+\s*(.*))?$").unwrap()
    })
}

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(#{1,6})\s+(.+)$").unwrap())
}

fn rule_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\s*)([A-Za-z0-9_][A-Za-z0-9_\-]*)\s*:\s*(.*)$").unwrap())
}

fn list_item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*-\s+(.+)$").unwrap())
}

fn bare_colon_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*:").unwrap())
}

/// Normalizes a heading into a key segment, the way section names are
/// matched: lowercase, runs of non-word characters collapsed to `_`.
fn normalize_heading(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_underscore = true;
    for c in raw.trim().chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            last_underscore = false;
        } else if !last_underscore {
            out.push('_');
            last_underscore = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

fn strip_quotes(text: &str) -> &str {
    let t = text.trim();
    for quote in ['"', '\''] {
        if t.len() >= 2 && t.starts_with(quote) && t.ends_with(quote) {
            return &t[1..t.len() - 1];
        }
    }
    t
}

/// A `key:` declaration whose value spans following lines.
#[derive(Debug)]
struct OpenBlock {
    leaf: String,
    sections: Vec<String>,
    marker: Option<InlineMarker>,
    location: SourceLocation,
    body: BlockBody,
    is_inherits: bool,
}

#[derive(Debug)]
enum BlockBody {
    /// No item seen yet; resolves to List or Mapping, or errors at close.
    Unknown,
    List(Vec<String>),
    Mapping(IndexMap<String, Value>),
}

/// Extracts rules and parent references from one document.
///
/// # Errors
///
/// Returns the first [`ParseError`] encountered; extraction never proceeds
/// past malformed structure.
pub fn extract(document: &ConstitutionDocument) -> Result<Extraction, ParseError> {
    Parser::new(document).run()
}

struct Parser<'a> {
    doc: &'a ConstitutionDocument,
    sections: Vec<(usize, String)>,
    pending_marker: Option<(InlineMarker, SourceLocation)>,
    open: Option<OpenBlock>,
    out: Extraction,
}

impl<'a> Parser<'a> {
    fn new(doc: &'a ConstitutionDocument) -> Self {
        Self {
            doc,
            sections: Vec::new(),
            pending_marker: None,
            open: None,
            out: Extraction::default(),
        }
    }

    fn location(&self, line_no: usize) -> SourceLocation {
        SourceLocation::new(self.doc.source_ref.raw.clone(), Some(line_no))
    }

    fn run(mut self) -> Result<Extraction, ParseError> {
        for (idx, line) in self.doc.raw_text.lines().enumerate() {
            let line_no = idx + 1;
            self.step(line, line_no)?;
        }
        self.close_block()?;
        if let Some((_, location)) = self.pending_marker.take() {
            return Err(ParseError::DanglingMarker { location });
        }
        Ok(self.out)
    }

    fn step(&mut self, line: &str, line_no: usize) -> Result<(), ParseError> {
        // Marker comments look like headings; check them first.
        if let Some(caps) = marker_re().captures(line) {
            self.close_block()?;
            if let Some((_, location)) = self.pending_marker.take() {
                return Err(ParseError::DanglingMarker { location });
            }
            let class = caps.get(1).map_or("", |m| m.as_str()).to_lowercase();
            let detail = caps.get(2).map_or("", |m| m.as_str()).trim().to_string();
            let location = self.location(line_no);
            let marker = match class.as_str() {
                "safety" => InlineMarker::Safety,
                "configurable" => InlineMarker::Configurable,
                "supersede" => {
                    let approved_by = detail
                        .strip_prefix("approved:")
                        .map(|r| r.trim().to_string())
                        .filter(|r| !r.is_empty());
                    // Approval text is checked again at attach time so the
                    // error can name the rule key.
                    InlineMarker::Supersede {
                        approved_by: approved_by.unwrap_or_default(),
                    }
                }
                _ => {
                    return Err(ParseError::UnknownMarker {
                        marker: class,
                        location,
                    })
                }
            };
            self.pending_marker = Some((marker, location));
            return Ok(());
        }

        if let Some(caps) = heading_re().captures(line) {
            self.close_block()?;
            if let Some((_, location)) = self.pending_marker.take() {
                return Err(ParseError::DanglingMarker { location });
            }
            let depth = caps[1].len();
            let name = normalize_heading(&caps[2]);
            while self
                .sections
                .last()
                .map_or(false, |(d, _)| *d >= depth)
            {
                self.sections.pop();
            }
            // Depth-1 headings are the document title, not a key segment.
            if depth >= 2 && !name.is_empty() {
                self.sections.push((depth, name));
            }
            return Ok(());
        }

        if bare_colon_re().is_match(line) {
            return Err(ParseError::EmptyKey {
                location: self.location(line_no),
            });
        }

        if let Some(caps) = list_item_re().captures(line) {
            let item = strip_quotes(&caps[1]).to_string();
            match self.open.as_mut() {
                Some(block) => match &mut block.body {
                    BlockBody::Unknown => block.body = BlockBody::List(vec![item]),
                    BlockBody::List(items) => items.push(item),
                    BlockBody::Mapping(_) => {
                        return Err(ParseError::OrphanListItem {
                            location: self.location(line_no),
                        })
                    }
                },
                None => {
                    return Err(ParseError::OrphanListItem {
                        location: self.location(line_no),
                    })
                }
            }
            return Ok(());
        }

        if let Some(caps) = rule_re().captures(line) {
            let indent = caps[1].len();
            let key = caps[2].to_string();
            let value_text = caps[3].trim().to_string();

            if indent == 0 {
                self.close_block()?;
                let location = self.location(line_no);
                let marker = self.pending_marker.take().map(|(m, _)| m);
                let is_inherits = key == "inherits_from";

                if value_text.is_empty() {
                    self.open = Some(OpenBlock {
                        leaf: key,
                        sections: self.sections.iter().map(|(_, n)| n.clone()).collect(),
                        marker,
                        location,
                        body: BlockBody::Unknown,
                        is_inherits,
                    });
                } else if is_inherits {
                    if marker.is_some() {
                        return Err(ParseError::DanglingMarker { location });
                    }
                    self.out.parents.push(strip_quotes(&value_text).to_string());
                } else {
                    let sections: Vec<String> =
                        self.sections.iter().map(|(_, n)| n.clone()).collect();
                    self.emit(
                        &sections,
                        &key,
                        Value::scalar(strip_quotes(&value_text)),
                        marker,
                        location,
                    )?;
                }
            } else {
                // Indented key line: a mapping entry when a block is open,
                // a mis-indented declaration otherwise.
                let Some(block) = self.open.as_mut() else {
                    return Err(ParseError::StrayIndentedRule {
                        key,
                        location: self.location(line_no),
                    });
                };
                if value_text.is_empty() {
                    return Err(ParseError::EmptyValue {
                        key: key.clone(),
                        location: self.location(line_no),
                    });
                }
                match &mut block.body {
                    BlockBody::Unknown => {
                        let mut map = IndexMap::new();
                        map.insert(key, Value::scalar(strip_quotes(&value_text)));
                        block.body = BlockBody::Mapping(map);
                    }
                    BlockBody::Mapping(map) => {
                        map.insert(key, Value::scalar(strip_quotes(&value_text)));
                    }
                    BlockBody::List(_) => {
                        return Err(ParseError::OrphanListItem {
                            location: self.location(line_no),
                        })
                    }
                }
            }
            return Ok(());
        }

        // Anything else is prose. A block still waiting for its value is
        // malformed; otherwise prose simply closes nothing.
        if line.trim().is_empty() {
            return Ok(());
        }
        if matches!(
            self.open.as_ref().map(|b| &b.body),
            Some(BlockBody::Unknown)
        ) {
            let block = self.open.take().expect("checked above");
            return Err(ParseError::EmptyValue {
                key: block.leaf,
                location: block.location,
            });
        }
        self.close_block()
    }

    /// Closes any open multi-line block, emitting its rule.
    fn close_block(&mut self) -> Result<(), ParseError> {
        let Some(block) = self.open.take() else {
            return Ok(());
        };
        let value = match block.body {
            BlockBody::Unknown => {
                return Err(ParseError::EmptyValue {
                    key: block.leaf,
                    location: block.location,
                })
            }
            BlockBody::List(items) => Value::List(items),
            BlockBody::Mapping(map) => Value::Mapping(map),
        };

        if block.is_inherits {
            if block.marker.is_some() {
                return Err(ParseError::DanglingMarker {
                    location: block.location,
                });
            }
            match value {
                Value::List(items) => self.out.parents.extend(items),
                Value::Scalar(s) => self.out.parents.push(s),
                Value::Mapping(_) => {
                    return Err(ParseError::EmptyValue {
                        key: block.leaf,
                        location: block.location,
                    })
                }
            }
            return Ok(());
        }

        let sections = block.sections.clone();
        self.emit(&sections, &block.leaf, value, block.marker, block.location)
    }

    /// Emits one raw rule, applying legal-root handling and marker checks.
    fn emit(
        &mut self,
        sections: &[String],
        leaf: &str,
        value: Value,
        marker: Option<InlineMarker>,
        location: SourceLocation,
    ) -> Result<(), ParseError> {
        let under_legal_root = sections
            .first()
            .map_or(false, |root| LEGAL_ROOTS.contains(&root.as_str()));

        if let Some(InlineMarker::Supersede { approved_by }) = &marker {
            if approved_by.is_empty() {
                return Err(ParseError::UnapprovedSupersede {
                    key: RuleKey::from_segments(sections, leaf).to_string(),
                    location,
                });
            }
        }

        let (key, value, citation) = if under_legal_root {
            // Legal rules live under the reserved root but compete on the
            // bare concern key; the root segment is stripped.
            let inner: Vec<String> = sections[1..].to_vec();
            let key = RuleKey::from_segments(&inner, leaf);

            let Value::Mapping(mut map) = value else {
                return Err(ParseError::MissingLegalCitation {
                    key: key.to_string(),
                    location,
                });
            };
            let Some(citation) = map.shift_remove("source").and_then(|v| match v {
                Value::Scalar(s) if !s.trim().is_empty() => Some(s),
                _ => None,
            }) else {
                return Err(ParseError::MissingLegalCitation {
                    key: key.to_string(),
                    location,
                });
            };
            let value = if map.len() == 1 {
                // A lone residual entry is the binding value itself.
                map.shift_remove_index(0).expect("len checked").1
            } else {
                Value::Mapping(map)
            };
            (key, value, Some(citation))
        } else {
            (RuleKey::from_segments(sections, leaf), value, None)
        };

        self.out.rules.push(RawRule {
            key,
            value,
            marker,
            citation,
            under_legal_root,
            location,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::SourceRef;
    use crate::level::LevelName;

    fn doc(text: &str) -> ConstitutionDocument {
        ConstitutionDocument::new(
            SourceRef::parse("CONSTITUTION.md", None),
            LevelName::Repo,
            text.to_string(),
        )
    }

    #[test]
    fn scalar_rule_under_nested_headings_gets_dotted_key() {
        let text = "# Repo constitution\n\n## security_protocol\n\n### secrets\n\nnever_commit: keys\n";
        let extraction = extract(&doc(text)).unwrap();
        assert_eq!(extraction.rules.len(), 1);
        let rule = &extraction.rules[0];
        assert_eq!(rule.key.as_str(), "security_protocol.secrets.never_commit");
        assert_eq!(rule.value, Value::scalar("keys"));
        assert_eq!(rule.location.line, Some(7));
    }

    #[test]
    fn list_value_collects_items() {
        let text = "## security_protocol\nnever_commit:\n- keys\n- passwords\n";
        let extraction = extract(&doc(text)).unwrap();
        assert_eq!(
            extraction.rules[0].value,
            Value::List(vec!["keys".to_string(), "passwords".to_string()])
        );
    }

    #[test]
    fn mapping_value_collects_indented_entries() {
        let text = "## limits\nblast_radius:\n  min: 1\n  max: 30\n";
        let extraction = extract(&doc(text)).unwrap();
        let bound = extraction.rules[0].value.as_bound().unwrap();
        assert_eq!(bound.min, Some(1));
        assert_eq!(bound.max, Some(30));
    }

    #[test]
    fn inline_marker_attaches_to_next_declaration() {
        let text = "## review\n# INHERITANCE: safety — higher-wins\ncode_review: opus\n";
        let extraction = extract(&doc(text)).unwrap();
        assert_eq!(extraction.rules[0].marker, Some(InlineMarker::Safety));
    }

    #[test]
    fn supersede_marker_requires_approval_ref() {
        let text = "## review\n# INHERITANCE: supersede — approved:adr-0042\ncode_review: sonnet\n";
        let extraction = extract(&doc(text)).unwrap();
        assert_eq!(
            extraction.rules[0].marker,
            Some(InlineMarker::Supersede {
                approved_by: "adr-0042".to_string()
            })
        );

        let bad = "## review\n# INHERITANCE: supersede\ncode_review: sonnet\n";
        let err = extract(&doc(bad)).unwrap_err();
        assert!(matches!(err, ParseError::UnapprovedSupersede { .. }));
    }

    #[test]
    fn unknown_marker_class_is_rejected() {
        let text = "# INHERITANCE: advisory — whatever\nx: 1\n";
        let err = extract(&doc(text)).unwrap_err();
        assert!(matches!(err, ParseError::UnknownMarker { .. }));
    }

    #[test]
    fn marker_without_declaration_is_dangling() {
        let text = "## review\n# INHERITANCE: safety — higher-wins\n\nJust prose here.\n";
        let err = extract(&doc(text)).unwrap_err();
        assert!(matches!(err, ParseError::DanglingMarker { .. }));
    }

    #[test]
    fn inherits_from_scalar_and_list_forms() {
        let scalar = "inherits_from: ../team/CONSTITUTION.md\n";
        let extraction = extract(&doc(scalar)).unwrap();
        assert_eq!(extraction.parents, vec!["../team/CONSTITUTION.md"]);

        let list = "inherits_from:\n- ../team/CONSTITUTION.md\n- https://example.com/org.md\n";
        let extraction = extract(&doc(list)).unwrap();
        assert_eq!(
            extraction.parents,
            vec!["../team/CONSTITUTION.md", "https://example.com/org.md"]
        );
    }

    #[test]
    fn orphan_list_item_is_an_error_with_location() {
        let text = "## security\n\n- keys\n";
        let err = extract(&doc(text)).unwrap_err();
        let ParseError::OrphanListItem { location } = err else {
            panic!("expected OrphanListItem, got {err:?}");
        };
        assert_eq!(location.line, Some(3));
    }

    #[test]
    fn key_with_no_value_is_an_error_not_a_default() {
        let text = "## security\nnever_commit:\n\nProse that is not a value.\n";
        let err = extract(&doc(text)).unwrap_err();
        assert!(matches!(err, ParseError::EmptyValue { ref key, .. } if key == "never_commit"));
    }

    #[test]
    fn legal_entry_requires_source_citation() {
        let ok = "## org_compliance\ndata_residency:\n  source: \"GDPR Article 44\"\n  policy: eu_only\n";
        let extraction = extract(&doc(ok)).unwrap();
        let rule = &extraction.rules[0];
        assert!(rule.under_legal_root);
        assert_eq!(rule.key.as_str(), "data_residency");
        assert_eq!(rule.citation.as_deref(), Some("GDPR Article 44"));
        assert_eq!(rule.value, Value::scalar("eu_only"));

        let missing = "## org_compliance\ndata_residency:\n  policy: eu_only\n";
        let err = extract(&doc(missing)).unwrap_err();
        assert!(matches!(err, ParseError::MissingLegalCitation { .. }));
    }

    #[test]
    fn legal_scalar_without_mapping_is_rejected() {
        let text = "## legal\ndata_residency: eu_only\n";
        let err = extract(&doc(text)).unwrap_err();
        assert!(matches!(err, ParseError::MissingLegalCitation { .. }));
    }

    #[test]
    fn mis_indented_declaration_is_rejected_not_dropped() {
        let text = "## security\nnever_commit: keys\n  rotation: daily\n";
        let err = extract(&doc(text)).unwrap_err();
        let ParseError::StrayIndentedRule { key, location } = err else {
            panic!("expected StrayIndentedRule, got {err:?}");
        };
        assert_eq!(key, "rotation");
        assert_eq!(location.line, Some(3));
    }

    #[test]
    fn prose_and_blank_lines_are_ignored() {
        let text = "# Title\n\nSome prose explaining the constitution.\n\n## conventions\n\nMore prose.\n\nstyle: terse\n";
        let extraction = extract(&doc(text)).unwrap();
        assert_eq!(extraction.rules.len(), 1);
        assert_eq!(extraction.rules[0].key.as_str(), "conventions.style");
    }

    #[test]
    fn sibling_heading_replaces_section_segment() {
        let text = "## alpha\na: 1\n## beta\nb: 2\n";
        let extraction = extract(&doc(text)).unwrap();
        assert_eq!(extraction.rules[0].key.as_str(), "alpha.a");
        assert_eq!(extraction.rules[1].key.as_str(), "beta.b");
    }
}
