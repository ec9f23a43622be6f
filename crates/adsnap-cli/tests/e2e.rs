use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicUsize, Ordering};

use adsnap_core::types::SyntaxKind;
use adsnap_format::fixture::{self, SnapshotBuilder};
use serde_json::Value;

struct TempDir {
    path: PathBuf,
}

impl TempDir {
    fn new(prefix: &str) -> Self {
        static CTR: AtomicUsize = AtomicUsize::new(0);
        let n = CTR.fetch_add(1, Ordering::SeqCst);
        let mut path = std::env::temp_dir();
        path.push(format!("{}_{}_{}", prefix, std::process::id(), n));
        std::fs::create_dir_all(&path).expect("create temp dir");
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

fn adsnap() -> Command {
    Command::new(env!("CARGO_BIN_EXE_adsnap"))
}

fn run(cwd: &Path, args: &[&str]) -> Output {
    adsnap()
        .current_dir(cwd)
        .args(args)
        .output()
        .expect("run adsnap")
}

fn run_code(cwd: &Path, args: &[&str], expected: i32) -> Output {
    let out = run(cwd, args);
    assert_eq!(
        out.status.code(),
        Some(expected),
        "args={args:?}\nstdout={}\nstderr={}",
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr),
    );
    out
}

/// Writes the shared corpus snapshot into `dir` and returns its file name.
fn write_corpus(dir: &TempDir) -> String {
    let mut fx = SnapshotBuilder::new();
    fx.server("DC=corp,DC=local");
    fx.description("unit fixture");
    let oc = fx.attribute("objectClass", SyntaxKind::String, false);
    let sam = fx.attribute("sAMAccountName", SyntaxKind::String, true);
    let mail = fx.attribute("mail", SyntaxKind::String, true);
    let count = fx.attribute("logonCount", SyntaxKind::Integer, true);
    let sid = fx.attribute("objectSid", SyntaxKind::Sid, true);
    fx.class("top");
    fx.class("user");
    let root = fx.prefix("");

    fx.object(
        root,
        "CN=Alice,OU=Staff,DC=corp,DC=local",
        vec![
            (oc, vec![fixture::vstr("top"), fixture::vstr("user")]),
            (sam, vec![fixture::vstr("ahill")]),
            (mail, vec![fixture::vstr("ahill@corp.local")]),
            (count, vec![fixture::vint(42)]),
            (sid, vec![fixture::vsid(1, 5, &[21, 1, 2, 3])]),
        ],
    );
    fx.object(
        root,
        "CN=Bob,OU=Staff,DC=corp,DC=local",
        vec![
            (oc, vec![fixture::vstr("top"), fixture::vstr("user")]),
            (sam, vec![fixture::vstr("bjones")]),
        ],
    );

    let name = "corp.dat";
    std::fs::write(dir.path().join(name), fx.build()).expect("write snapshot");
    name.to_owned()
}

#[test]
fn help_smoke() {
    let dir = TempDir::new("adsnap_e2e_help");
    let out = run_code(dir.path(), &["--help"], 0);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Execute LDAP filters directly against ADExplorer snapshot files."));
    assert!(stdout.contains("query"));
    assert!(stdout.contains("header"));
}

#[test]
fn query_with_matches_exits_zero() {
    let dir = TempDir::new("adsnap_e2e_query");
    let snap = write_corpus(&dir);
    let out = run_code(
        dir.path(),
        &["query", &snap, "--filter", "(objectClass=user)"],
        0,
    );
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("CN=Alice,OU=Staff,DC=corp,DC=local"));
    assert!(stdout.contains("CN=Bob,OU=Staff,DC=corp,DC=local"));
}

#[test]
fn query_without_matches_exits_one() {
    let dir = TempDir::new("adsnap_e2e_nomatch");
    let snap = write_corpus(&dir);
    run_code(
        dir.path(),
        &["query", &snap, "--filter", "(objectClass=computer)"],
        1,
    );
}

#[test]
fn bad_filter_exits_two() {
    let dir = TempDir::new("adsnap_e2e_badfilter");
    let snap = write_corpus(&dir);
    let out = run_code(
        dir.path(),
        &["query", &snap, "--filter", "(&(objectClass=user)"],
        2,
    );
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("filter syntax error"));
}

#[test]
fn missing_snapshot_exits_three() {
    let dir = TempDir::new("adsnap_e2e_missing");
    run_code(
        dir.path(),
        &["query", "nope.dat", "--filter", "(cn=*)"],
        3,
    );
}

#[test]
fn corrupt_snapshot_exits_three() {
    let dir = TempDir::new("adsnap_e2e_corrupt");
    let snap = write_corpus(&dir);
    let path = dir.path().join(&snap);
    let mut data = std::fs::read(&path).unwrap();
    data[0] = b'x';
    std::fs::write(&path, &data).unwrap();
    let out = run_code(dir.path(), &["query", &snap, "--filter", "(cn=*)"], 3);
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("bad signature"));
}

#[test]
fn json_output_with_projection() {
    let dir = TempDir::new("adsnap_e2e_json");
    let snap = write_corpus(&dir);
    let out = run_code(
        dir.path(),
        &[
            "query",
            &snap,
            "--filter",
            "(mail=*)",
            "--attributes",
            "sAMAccountName,mail",
            "--format",
            "json",
        ],
        0,
    );
    let rows: Value = serde_json::from_slice(&out.stdout).expect("stdout is valid JSON");
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["dn"], "CN=Alice,OU=Staff,DC=corp,DC=local");
    assert_eq!(rows[0]["sAMAccountName"][0], "ahill");
    assert_eq!(rows[0]["mail"][0], "ahill@corp.local");
    assert!(rows[0].get("objectClass").is_none());
}

#[test]
fn csv_output_joins_multivalues() {
    let dir = TempDir::new("adsnap_e2e_csv");
    let snap = write_corpus(&dir);
    let out = run_code(
        dir.path(),
        &[
            "query",
            &snap,
            "--filter",
            "(sAMAccountName=ahill)",
            "--attributes",
            "objectClass",
            "--format",
            "csv",
        ],
        0,
    );
    let stdout = String::from_utf8_lossy(&out.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "dn,objectClass");
    assert_eq!(lines[1], "\"CN=Alice,OU=Staff,DC=corp,DC=local\",top;user");
}

#[test]
fn ignore_case_widens_matches() {
    let dir = TempDir::new("adsnap_e2e_case");
    let snap = write_corpus(&dir);
    run_code(
        dir.path(),
        &["query", &snap, "--filter", "(sAMAccountName=AHILL)"],
        1,
    );
    run_code(
        dir.path(),
        &[
            "query",
            &snap,
            "--filter",
            "(sAMAccountName=AHILL)",
            "--ignore-case",
        ],
        0,
    );
}

#[test]
fn limit_truncates_results() {
    let dir = TempDir::new("adsnap_e2e_limit");
    let snap = write_corpus(&dir);
    let out = run_code(
        dir.path(),
        &[
            "query", &snap, "--filter", "(objectClass=user)", "--limit", "1", "--format", "json",
        ],
        0,
    );
    let rows: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(rows.as_array().unwrap().len(), 1);
}

#[test]
fn unknown_projection_warns() {
    let dir = TempDir::new("adsnap_e2e_unknown");
    let snap = write_corpus(&dir);
    let out = run_code(
        dir.path(),
        &[
            "query",
            &snap,
            "--filter",
            "(mail=*)",
            "--attributes",
            "mail,telephoneNumber",
        ],
        0,
    );
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("telephoneNumber"));
}

#[test]
fn benchmark_prints_stats_to_stderr() {
    let dir = TempDir::new("adsnap_e2e_bench");
    let snap = write_corpus(&dir);
    let out = run_code(
        dir.path(),
        &[
            "query",
            &snap,
            "--filter",
            "(objectClass=user)",
            "--benchmark",
        ],
        0,
    );
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Objects scanned: 2"));
    assert!(stderr.contains("Matches:         2"));
}

#[test]
fn output_flag_writes_file() {
    let dir = TempDir::new("adsnap_e2e_output");
    let snap = write_corpus(&dir);
    run_code(
        dir.path(),
        &[
            "query", &snap, "--filter", "(mail=*)", "--format", "json", "--output", "out.json",
        ],
        0,
    );
    let text = std::fs::read_to_string(dir.path().join("out.json")).unwrap();
    let rows: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(rows.as_array().unwrap().len(), 1);
}

#[test]
fn header_command_prints_metadata() {
    let dir = TempDir::new("adsnap_e2e_header");
    let snap = write_corpus(&dir);
    let out = run_code(dir.path(), &["header", &snap], 0);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Server:       DC=corp,DC=local"));
    assert!(stdout.contains("Description:  unit fixture"));
    assert!(stdout.contains("Objects:      2"));

    let out = run_code(dir.path(), &["header", &snap, "--json"], 0);
    let parsed: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(parsed["object_count"], 2);
    assert_eq!(parsed["server"], "DC=corp,DC=local");
    assert_eq!(parsed["captured_at"], "2024-01-15T10:30:00Z");
}

#[test]
fn attributes_command_lists_schema() {
    let dir = TempDir::new("adsnap_e2e_attrs");
    let snap = write_corpus(&dir);
    let out = run_code(dir.path(), &["attributes", &snap, "--json"], 0);
    let parsed: Value = serde_json::from_slice(&out.stdout).unwrap();
    let attrs = parsed.as_array().unwrap();
    assert_eq!(attrs.len(), 5);
    assert_eq!(attrs[0]["name"], "objectClass");
    assert_eq!(attrs[0]["syntax"], "string");
    assert_eq!(attrs[3]["syntax"], "integer");
}