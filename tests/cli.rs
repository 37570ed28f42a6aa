// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 genomegenie contributors

//! Command-line behaviour

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

const OPTIONS: &str = r#"
pipeline:
  - parallel:
      - [prep1, ajob]
      - bjob
  - finalize
module: [gatk-4.0.1, samtools]
inputs:
  - {normal_bam: normal1.bam}
  - {normal_bam: normal2.bam}
prep1: {ref_fasta: reference.fasta}
ajob: {output: result1.vcf.gz}
bjob: {inputs: all, output: result2.vcf.gz}
finalize:
  inputs:
    - {ajob: result1.vcf.gz, bjob: result2.vcf.gz}
  output: consolidated.json
sge:
  queue: short.q
  log_directory: batch
  walltime: "00:30:00"
  cputime: "00:30:00"
  memory: 16 GB
"#;

fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("opts.yaml"), OPTIONS).unwrap();

    let templates = dir.path().join("templates");
    std::fs::create_dir(&templates).unwrap();
    let bodies = [
        ("prep1", "prep -R {{ ref_fasta }} -I {{ normal_bam }}"),
        ("ajob", "ajob -I {{ normal_bam }} -O {{ output }}"),
        ("bjob", "bjob {{ normal_bam | join(' ') }} -O {{ output }}"),
        ("finalize", "merge {{ ajob }} {{ bjob }} > {{ output }}"),
    ];
    for (name, body) in bodies {
        std::fs::write(templates.join(name), body).unwrap();
    }
    dir
}

fn genomegenie(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("genomegenie").unwrap();
    cmd.current_dir(dir);
    cmd
}

#[test]
fn validate_accepts_complete_options() {
    let dir = workspace();
    genomegenie(dir.path())
        .args(["validate", "opts.yaml", "-t", "templates"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Pipeline is valid"));
}

#[test]
fn validate_reports_missing_template_variables() {
    let dir = workspace();
    std::fs::write(dir.path().join("templates/ajob"), "ajob -I {{ tumor_bam }}").unwrap();

    genomegenie(dir.path())
        .args(["validate", "opts.yaml", "-t", "templates"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("tumor_bam"));
}

#[test]
fn validate_missing_file() {
    let dir = workspace();
    genomegenie(dir.path())
        .args(["validate", "nope.yaml"])
        .assert()
        .failure();
}

#[test]
fn graph_formats() {
    let dir = workspace();
    genomegenie(dir.path())
        .args(["graph", "opts.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("finalize [after: ajob, bjob]"));

    genomegenie(dir.path())
        .args(["graph", "opts.yaml", "--format", "mermaid"])
        .assert()
        .success()
        .stdout(predicate::str::contains("graph TD"));

    genomegenie(dir.path())
        .args(["graph", "opts.yaml", "-f", "dot"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("digraph pipeline {"));
}

#[test]
fn malformed_graph_is_rejected() {
    let dir = workspace();
    let broken = OPTIONS.replace("  - finalize\n", "  - 42\n");
    std::fs::write(dir.path().join("broken.yaml"), broken).unwrap();

    genomegenie(dir.path())
        .args(["graph", "broken.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("number"));
}

#[test]
fn render_modes() {
    let dir = workspace();
    std::fs::write(dir.path().join("vars.json"), r#"{"output": "out.vcf"}"#).unwrap();

    genomegenie(dir.path())
        .args(["render", "ajob", "vars.json", "-t", "templates"])
        .assert()
        .failure();

    genomegenie(dir.path())
        .args(["render", "ajob", "vars.json", "-t", "templates", "--mode", "debug"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ajob -I {{ normal_bam }} -O out.vcf"));
}

#[test]
fn debug_run_persists_scripts_only() {
    let dir = workspace();
    genomegenie(dir.path())
        .args(["run", "opts.yaml", "-t", "templates", "--debug", "-o", "scripts.json"])
        .assert()
        .success();

    let text = std::fs::read_to_string(dir.path().join("scripts.json")).unwrap();
    let rows: serde_json::Value = serde_json::from_str(&text).unwrap();
    let rows = rows.as_array().unwrap();

    // prep1 x2, ajob x2, bjob x1, finalize x1
    assert_eq!(rows.len(), 6);
    for row in rows {
        let row = row.as_object().unwrap();
        assert_eq!(row.keys().collect::<Vec<_>>(), vec!["script"]);
        assert!(row["script"].as_str().unwrap().starts_with("#!/bin/bash"));
    }
    assert!(rows[5]["script"]
        .as_str()
        .unwrap()
        .contains("merge result1.vcf.gz result2.vcf.gz > consolidated.json"));
}

#[test]
fn run_with_fake_scheduler() {
    let dir = workspace();
    let with_scheduler = format!(
        "{OPTIONS}scheduler:\n  submit: [sh, -c, 'echo \"Your job 7 has been submitted\"']\n  status: [sh, -c, 'echo gone >&2']\n"
    );
    std::fs::write(dir.path().join("opts.yaml"), with_scheduler).unwrap();

    genomegenie(dir.path())
        .args(["run", "opts.yaml", "-t", "templates", "--monitor", "0", "--fields", "job_id,step"])
        .assert()
        .success();

    let text = std::fs::read_to_string(dir.path().join("pipeline-scripts.json")).unwrap();
    let rows: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(rows.as_array().unwrap().len(), 6);
    assert_eq!(rows[0], serde_json::json!({"job_id": "7", "step": "prep1"}));
}

#[test]
fn run_reports_failed_submissions() {
    let dir = workspace();
    let failing = format!(
        "{OPTIONS}scheduler:\n  submit: [sh, -c, 'echo \"unknown queue\" >&2; exit 1']\n  status: [sh, -c, 'true']\n"
    );
    std::fs::write(dir.path().join("opts.yaml"), failing).unwrap();

    genomegenie(dir.path())
        .args(["run", "opts.yaml", "-t", "templates", "--monitor", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("6 of 6 job(s) failed"));

    // A failed run still leaves a table with one row per job
    let text = std::fs::read_to_string(dir.path().join("pipeline-scripts.json")).unwrap();
    let rows: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(rows.as_array().unwrap().len(), 6);
    assert_eq!(rows[0]["success"], false);
    assert_eq!(rows[0]["stderr"], "unknown queue\n");
}
