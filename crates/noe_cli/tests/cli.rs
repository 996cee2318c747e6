//! End-to-end runs of the `noe` binary over temp directories.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};

const TS: &str = "2025-03-01T12:00:00Z";

const POLICY: &str = r#"{"rules":[{"quota":"disability","period":2,"offset":2}],"priority":["disability"]}"#;

fn pool(d1_status: &str) -> String {
    json!({
        "round": "2025-A",
        "candidates": [
            {"id": "G1", "display_name": "Gil", "rank_by_quota": {"general": 1}},
            {"id": "G2", "display_name": "Gus", "rank_by_quota": {"general": 2}},
            {"id": "D1", "display_name": "Dana", "quota_eligibility": ["disability"],
             "rank_by_quota": {"general": 3, "disability": 1}, "status": d1_status},
            {"id": "D2", "display_name": "Dev", "quota_eligibility": ["disability"],
             "rank_by_quota": {"general": 4, "disability": 2}}
        ]
    })
    .to_string()
}

fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
    let p = dir.join(name);
    fs::write(&p, body).unwrap();
    p
}

fn read_json(p: &Path) -> Value {
    serde_json::from_slice(&fs::read(p).unwrap()).unwrap()
}

fn noe() -> Command {
    let mut cmd = Command::cargo_bin("noe").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

fn seated(order: &Value) -> Vec<String> {
    order["entries"].as_array().unwrap().iter().map(|e| e["candidate_id"].as_str().unwrap().to_string()).collect()
}

#[test]
fn run_writes_canonical_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let cands = write(dir.path(), "candidates.json", &pool("active"));
    let policy = write(dir.path(), "policy.json", POLICY);
    let out = dir.path().join("out");

    noe()
        .args(["--candidates", cands.to_str().unwrap(), "--policy", policy.to_str().unwrap()])
        .args(["--out", out.to_str().unwrap(), "--timestamp", TS])
        .assert()
        .success();

    let order = read_json(&out.join("nomination_order.json"));
    assert_eq!(seated(&order), ["G1", "D1", "G2", "D2"]);
    assert_eq!(order["version"], 1);
    assert_eq!(order["entries"][1]["quota_of_appointment"], "disability");
    assert!(!out.join("order_diff.json").exists());

    let run = read_json(&out.join("run_record.json"));
    assert!(run["id"].as_str().unwrap().starts_with("RUN:2025-03-01T12:00:00Z:"));
    assert_eq!(run["round"], "2025-A");
    assert_eq!(run["outputs"]["order_id"], order["order_id"]);
    assert_eq!(run["inputs"]["candidates_sha256"].as_str().unwrap().len(), 64);
}

#[test]
fn identical_inputs_give_identical_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let cands = write(dir.path(), "candidates.json", &pool("active"));
    let policy = write(dir.path(), "policy.json", POLICY);

    let mut outs = Vec::new();
    for name in ["a", "b"] {
        let out = dir.path().join(name);
        noe()
            .args(["--candidates", cands.to_str().unwrap(), "--policy", policy.to_str().unwrap()])
            .args(["--out", out.to_str().unwrap(), "--timestamp", TS, "--quiet"])
            .assert()
            .success();
        outs.push(out);
    }
    for f in ["nomination_order.json", "run_record.json"] {
        assert_eq!(fs::read(outs[0].join(f)).unwrap(), fs::read(outs[1].join(f)).unwrap(), "{f}");
    }
}

#[test]
fn previous_order_produces_a_diff_and_text_report() {
    let dir = tempfile::tempdir().unwrap();
    let policy = write(dir.path(), "policy.json", POLICY);
    let first = dir.path().join("v1");
    let cands = write(dir.path(), "candidates.json", &pool("active"));
    noe()
        .args(["--candidates", cands.to_str().unwrap(), "--policy", policy.to_str().unwrap()])
        .args(["--out", first.to_str().unwrap(), "--timestamp", TS])
        .assert()
        .success();

    let cands = write(dir.path(), "candidates.json", &pool("eliminated"));
    let second = dir.path().join("v2");
    let prev = first.join("nomination_order.json");
    noe()
        .args(["--candidates", cands.to_str().unwrap(), "--policy", policy.to_str().unwrap()])
        .args(["--previous", prev.to_str().unwrap()])
        .args(["--out", second.to_str().unwrap(), "--timestamp", TS, "--render", "text"])
        .assert()
        .success();

    let order = read_json(&second.join("nomination_order.json"));
    assert_eq!(seated(&order), ["G1", "D2", "G2"]);
    assert_eq!(order["version"], 2);

    let diff = read_json(&second.join("order_diff.json"));
    assert_eq!(
        diff,
        json!({
            "from_version": 1,
            "to_version": 2,
            "moves": [
                {"candidate_id": "D2", "previous_seat": 4, "new_seat": 2},
                {"candidate_id": "D1", "previous_seat": 2, "new_seat": null}
            ]
        })
    );

    let run = read_json(&second.join("run_record.json"));
    assert_eq!(run["inputs"]["previous_order_id"], read_json(&prev)["order_id"]);

    let report = fs::read_to_string(second.join("report.txt")).unwrap();
    assert!(report.starts_with("Nomination Order v2 [2025-A] (compared with v1)\n"));
    assert!(report.contains("D1 Dana (was seat 2)"));
}

#[test]
fn json_report_is_written_on_request() {
    let dir = tempfile::tempdir().unwrap();
    let cands = write(dir.path(), "candidates.json", &pool("active"));
    let policy = write(dir.path(), "policy.json", POLICY);
    noe()
        .args(["--candidates", cands.to_str().unwrap(), "--policy", policy.to_str().unwrap()])
        .args(["--out", dir.path().to_str().unwrap(), "--timestamp", TS, "--render", "json"])
        .assert()
        .success();
    let report = read_json(&dir.path().join("report.json"));
    assert_eq!(report["cover"]["version"], 1);
    assert_eq!(report["seats"].as_array().unwrap().len(), 4);
}

#[test]
fn validate_only_reports_rank_ties() {
    let dir = tempfile::tempdir().unwrap();
    let policy = write(dir.path(), "policy.json", POLICY);
    let ok = write(dir.path(), "ok.json", &pool("active"));
    noe()
        .args(["--validate-only", "--candidates", ok.to_str().unwrap(), "--policy", policy.to_str().unwrap()])
        .assert()
        .code(0)
        .stderr(predicate::str::contains("inputs OK"));

    let tie = write(
        dir.path(),
        "tie.json",
        r#"{"candidates":[
            {"id":"A","display_name":"a","rank_by_quota":{"general":1}},
            {"id":"B","display_name":"b","rank_by_quota":{"general":1}}
        ]}"#,
    );
    noe()
        .args(["--validate-only", "--candidates", tie.to_str().unwrap(), "--policy", policy.to_str().unwrap()])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Quota.RankTie"));
    assert!(!dir.path().join("nomination_order.json").exists());
}

#[test]
fn invalid_policy_exits_2() {
    let dir = tempfile::tempdir().unwrap();
    let cands = write(dir.path(), "candidates.json", &pool("active"));
    let policy = write(dir.path(), "policy.json", r#"{"rules":[{"quota":"disability","period":0,"offset":1}]}"#);
    noe()
        .args(["--candidates", cands.to_str().unwrap(), "--policy", policy.to_str().unwrap()])
        .args(["--out", dir.path().to_str().unwrap(), "--timestamp", TS])
        .assert()
        .code(2);
}

#[test]
fn manifest_digest_mismatch_exits_3() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "candidates.json", &pool("active"));
    write(dir.path(), "policy.json", POLICY);
    let manifest = write(
        dir.path(),
        "manifest.json",
        &json!({
            "candidates_path": "candidates.json",
            "policy_path": "policy.json",
            "inputs_sha256": {"candidates_path": "0".repeat(64)}
        })
        .to_string(),
    );
    noe()
        .args(["--manifest", manifest.to_str().unwrap(), "--out", dir.path().to_str().unwrap()])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("sha256 mismatch"));
}

#[test]
fn manifest_run_uses_manifest_round() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "candidates.json", &pool("active"));
    write(dir.path(), "policy.json", POLICY);
    let manifest = write(
        dir.path(),
        "manifest.json",
        r#"{"round":"2025-B","candidates_path":"candidates.json","policy_path":"policy.json"}"#,
    );
    let out = dir.path().join("out");
    noe()
        .args(["--manifest", manifest.to_str().unwrap(), "--out", out.to_str().unwrap(), "--timestamp", TS])
        .assert()
        .success();
    assert_eq!(read_json(&out.join("run_record.json"))["round"], "2025-B");
}

#[test]
fn edited_previous_order_exits_3() {
    let dir = tempfile::tempdir().unwrap();
    let cands = write(dir.path(), "candidates.json", &pool("active"));
    let policy = write(dir.path(), "policy.json", POLICY);
    let first = dir.path().join("v1");
    noe()
        .args(["--candidates", cands.to_str().unwrap(), "--policy", policy.to_str().unwrap()])
        .args(["--out", first.to_str().unwrap(), "--timestamp", TS])
        .assert()
        .success();

    let prev = first.join("nomination_order.json");
    let mut order = read_json(&prev);
    order["entries"][0]["candidate_id"] = json!("G2");
    order["entries"][2]["candidate_id"] = json!("G1");
    fs::write(&prev, order.to_string()).unwrap();

    noe()
        .args(["--candidates", cands.to_str().unwrap(), "--policy", policy.to_str().unwrap()])
        .args(["--previous", prev.to_str().unwrap(), "--out", dir.path().to_str().unwrap()])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("does not match its entries"));
}

#[test]
fn previous_order_at_last_version_exits_2() {
    let dir = tempfile::tempdir().unwrap();
    let cands = write(dir.path(), "candidates.json", &pool("active"));
    let policy = write(dir.path(), "policy.json", POLICY);
    let first = dir.path().join("v1");
    noe()
        .args(["--candidates", cands.to_str().unwrap(), "--policy", policy.to_str().unwrap()])
        .args(["--out", first.to_str().unwrap(), "--timestamp", TS])
        .assert()
        .success();

    // The order id covers the seats only, so the edited file still verifies.
    let prev = first.join("nomination_order.json");
    let mut order = read_json(&prev);
    order["version"] = json!(u64::MAX);
    fs::write(&prev, order.to_string()).unwrap();

    let out = dir.path().join("v2");
    noe()
        .args(["--candidates", cands.to_str().unwrap(), "--policy", policy.to_str().unwrap()])
        .args(["--previous", prev.to_str().unwrap(), "--out", out.to_str().unwrap()])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cannot be advanced"));
    assert!(!out.join("nomination_order.json").exists());
}

#[test]
fn missing_input_exits_4() {
    let dir = tempfile::tempdir().unwrap();
    let policy = write(dir.path(), "policy.json", POLICY);
    let missing = dir.path().join("nope.json");
    noe()
        .args(["--candidates", missing.to_str().unwrap(), "--policy", policy.to_str().unwrap()])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("file not found"));
}

#[test]
fn url_inputs_are_refused() {
    noe()
        .args(["--candidates", "https://example.org/c.json", "--policy", "p.json"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no scheme"));
}
