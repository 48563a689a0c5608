//! Binary-level tests: argument handling, output formats, exit codes.

use std::io::Write;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;

fn write_doc(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(text.as_bytes()).unwrap();
    path
}

fn charter() -> Command {
    Command::cargo_bin("charter").unwrap()
}

#[test]
fn resolves_a_simple_document_with_exit_zero() {
    let dir = tempfile::tempdir().unwrap();
    let repo = write_doc(dir.path(), "repo.md", "## conventions\nstyle: terse\n");

    charter()
        .arg(&repo)
        .assert()
        .success()
        .stdout(predicate::str::contains("conventions.style"))
        .stdout(predicate::str::contains("Result: RESOLVED"));
}

#[test]
fn json_format_emits_parseable_report() {
    let dir = tempfile::tempdir().unwrap();
    write_doc(dir.path(), "org.md", "## review\ncode_review: opus\n");
    let repo = write_doc(
        dir.path(),
        "repo.md",
        "inherits_from: org.md\n\n## review\ncode_review: sonnet\n",
    );

    let output = charter()
        .arg(&repo)
        .args(["--format", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let rules = report["effective_rules"].as_array().unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0]["key"], "review.code_review");
    assert_eq!(rules[0]["level"], "repo");
    assert_eq!(report["chain"].as_array().unwrap().len(), 2);
}

#[test]
fn error_severity_conflict_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    write_doc(
        dir.path(),
        "org.md",
        "## quality_standards\n\
         # INHERITANCE: safety — higher-wins\n\
         blast_radius:\n\
         \x20\x20max: 30\n",
    );
    let repo = write_doc(
        dir.path(),
        "repo.md",
        "inherits_from: org.md\n\n## quality_standards\nblast_radius: 500 files\n",
    );

    charter()
        .arg(&repo)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("[ERROR]"))
        .stdout(predicate::str::contains("Result: ERRORS PRESENT"));
}

#[test]
fn missing_root_document_exits_two() {
    charter()
        .arg("/nonexistent/CONSTITUTION.md")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cannot read repository constitution"));
}

#[test]
fn strict_mode_missing_parent_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    let repo = write_doc(dir.path(), "repo.md", "inherits_from: missing-team.md\n\ny: 2\n");

    charter()
        .arg(&repo)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("missing-team.md"));
}

#[test]
fn lenient_mode_missing_parent_resolves_with_warning() {
    let dir = tempfile::tempdir().unwrap();
    write_doc(dir.path(), "org.md", "## review\ncode_review: opus\n");
    let repo = write_doc(
        dir.path(),
        "repo.md",
        "inherits_from:\n- missing-team.md\n- org.md\n\n## conventions\nstyle: terse\n",
    );

    charter()
        .arg(&repo)
        .arg("--lenient")
        .assert()
        .success()
        .stdout(predicate::str::contains("[WARNING]"))
        .stdout(predicate::str::contains("missing-team.md"));
}

#[test]
fn lenient_and_strict_flags_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let repo = write_doc(dir.path(), "repo.md", "x: 1\n");

    charter()
        .arg(&repo)
        .args(["--lenient", "--strict"])
        .assert()
        .code(2);
}

#[test]
fn parent_flag_supplements_the_chain() {
    let dir = tempfile::tempdir().unwrap();
    let org = write_doc(dir.path(), "org.md", "## review\ncode_review: opus\n");
    let repo = write_doc(dir.path(), "repo.md", "## conventions\nstyle: terse\n");

    charter()
        .arg(&repo)
        .args(["--parent", &org.to_string_lossy()])
        .assert()
        .success()
        .stdout(predicate::str::contains("review.code_review"));
}

#[test]
fn unreadable_rank_table_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    let repo = write_doc(dir.path(), "repo.md", "x: 1\n");

    charter()
        .arg(&repo)
        .args(["--rank-table", "/nonexistent/table.json"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cannot read rank table"));
}

#[test]
fn invalid_rank_table_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    let repo = write_doc(dir.path(), "repo.md", "x: 1\n");
    let table = write_doc(
        dir.path(),
        "table.json",
        r#"{"rows": [{"category": "legal", "rank": 0}]}"#,
    );

    charter()
        .arg(&repo)
        .args(["--rank-table", &table.to_string_lossy()])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid rank table"));
}

#[test]
fn legal_contradiction_exits_one_with_both_citations() {
    let dir = tempfile::tempdir().unwrap();
    write_doc(
        dir.path(),
        "org.md",
        "## org_compliance\n\
         data_residency:\n\
         \x20\x20source: \"GDPR Article 44\"\n\
         \x20\x20policy: eu_only\n",
    );
    let repo = write_doc(
        dir.path(),
        "repo.md",
        "inherits_from: org.md\n\n\
         ## org_compliance\n\
         data_residency:\n\
         \x20\x20source: \"CCPA Section 98\"\n\
         \x20\x20policy: us_only\n",
    );

    charter()
        .arg(&repo)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("GDPR Article 44"))
        .stderr(predicate::str::contains("CCPA Section 98"));
}
