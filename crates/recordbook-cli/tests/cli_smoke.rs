use serde_json::Value;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

struct TempDirGuard {
    path: PathBuf,
}

impl TempDirGuard {
    fn new(prefix: &str) -> Self {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "recordbook-cli-{prefix}-{}-{unique}",
            std::process::id()
        ));
        fs::create_dir_all(&path).expect("temp dir should be created");
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn store(&self) -> PathBuf {
        self.path.join("store.jsonl")
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

/// Run the binary inside `dir` with `--store <dir>/store.jsonl` prepended.
fn run_in<I, S>(dir: &TempDirGuard, args: I) -> Output
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let bin = env!("CARGO_BIN_EXE_recordbook");
    Command::new(bin)
        .current_dir(dir.path())
        .env_remove("RECORDBOOK_STORE")
        .env_remove("RECORDBOOK_CONFIG")
        .env("RUST_LOG", "off")
        .arg("--store")
        .arg(dir.store())
        .args(args)
        .output()
        .expect("recordbook command should execute")
}

fn assert_success(output: &Output) {
    if !output.status.success() {
        panic!(
            "command failed with status {:?}\nstdout:\n{}\nstderr:\n{}",
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );
    }
}

fn assert_failure(output: &Output) -> String {
    if output.status.success() {
        panic!(
            "command unexpectedly succeeded\nstdout:\n{}\nstderr:\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );
    }
    assert_eq!(output.status.code(), Some(1));
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn parse_json_stdout(output: &Output) -> Value {
    serde_json::from_slice::<Value>(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout should be valid json: {e}\nstdout:\n{}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

fn json_ok<I, S>(dir: &TempDirGuard, args: I) -> Value
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = run_in(dir, args);
    assert_success(&output);
    parse_json_stdout(&output)
}

#[test]
fn submit_and_resolve_a_tied_chain() {
    let dir = TempDirGuard::new("chain");

    let anchor = json_ok(
        &dir,
        ["record", "submit", "--build", "100", "--record", "10", "--submitter", "5", "--json"],
    );
    assert_eq!(anchor["action"], "record.submit");
    assert_eq!(anchor["entry"]["id"], 1);
    assert_eq!(anchor["entry"]["jointBuildRecord"], 0);

    let tie = json_ok(
        &dir,
        [
            "record", "submit", "--build", "101", "--record", "10", "--ties-with", "1",
            "--submitter", "6", "--json",
        ],
    );
    assert_eq!(tie["entry"]["id"], 2);
    assert_eq!(tie["entry"]["jointBuildRecordId"], 1);

    let resolved = json_ok(&dir, ["record", "anchor", "2", "--json"]);
    assert_eq!(resolved["anchor"]["id"], 1);

    let chain = json_ok(&dir, ["record", "chain", "2", "--json"]);
    assert!(
        chain["storeSnapshot"]
            .as_str()
            .is_some_and(|s| s.starts_with("rbs1_"))
    );
    assert_eq!(chain["anchorId"], 1);
    assert_eq!(chain["count"], 2);
    let ids: Vec<u64> = chain["members"]
        .as_array()
        .expect("members should be an array")
        .iter()
        .map(|m| m["id"].as_u64().expect("member id"))
        .collect();
    assert_eq!(ids, vec![1, 2]);

    let holders = json_ok(&dir, ["record", "holders", "10", "--json"]);
    assert_eq!(holders["count"], 1);
}

#[test]
fn dangling_tie_is_rejected_and_not_written() {
    let dir = TempDirGuard::new("dangling");
    assert_success(&run_in(
        &dir,
        ["record", "submit", "--build", "100", "--record", "10", "--submitter", "5"],
    ));

    let stderr = assert_failure(&run_in(
        &dir,
        [
            "record", "submit", "--build", "101", "--record", "10", "--ties-with", "999",
            "--submitter", "5",
        ],
    ));
    assert!(stderr.contains("error:"), "stderr was: {stderr}");
    assert!(stderr.contains("999"), "stderr was: {stderr}");

    let chain = json_ok(&dir, ["record", "chain", "1", "--json"]);
    assert_eq!(chain["count"], 1);
    assert!(!dir.path().join("store.jsonl.lock").exists());
}

#[test]
fn verify_dispute_and_remove_update_the_store() {
    let dir = TempDirGuard::new("attest");
    assert_success(&run_in(
        &dir,
        ["record", "submit", "--build", "100", "--record", "10", "--submitter", "5"],
    ));

    let verified = json_ok(&dir, ["record", "verify", "1", "--by", "77", "--json"]);
    assert_eq!(verified["entry"]["verified"], 1);
    assert_eq!(verified["entry"]["verifierId"], 77);

    let disputed = json_ok(&dir, ["record", "dispute", "1", "--by", "88", "--json"]);
    assert_eq!(disputed["entry"]["reported"], 1);

    let cleared = json_ok(&dir, ["record", "dispute", "1", "--clear", "--json"]);
    assert_eq!(cleared["entry"]["reported"], 0);

    assert_success(&run_in(&dir, ["record", "remove", "1"]));
    let stderr = assert_failure(&run_in(&dir, ["record", "anchor", "1"]));
    assert!(stderr.contains("not found"), "stderr was: {stderr}");
}

#[test]
fn strike_ids_are_allocated_per_user() {
    let dir = TempDirGuard::new("strikes");

    let next = json_ok(&dir, ["strike", "next", "42", "--json"]);
    assert_eq!(next["nextId"], 0);

    let added = json_ok(
        &dir,
        ["strike", "add", "42", "--author", "7", "--reason", "spam", "--json"],
    );
    assert_eq!(added["strike"]["strikeId"], 0);

    let next = json_ok(&dir, ["strike", "next", "42", "--json"]);
    assert_eq!(next["nextId"], 1);
    let other = json_ok(&dir, ["strike", "next", "43", "--json"]);
    assert_eq!(other["nextId"], 0);

    assert_success(&run_in(
        &dir,
        ["strike", "add", "43", "--author", "7", "--reason", "flood"],
    ));
    let counts = json_ok(&dir, ["strike", "counts", "--json"]);
    assert_eq!(counts["count"], 2);

    let revoked = json_ok(&dir, ["strike", "revoke", "42", "0", "--json"]);
    assert_eq!(revoked["strike"]["reason"], "spam");
    let listed = json_ok(&dir, ["strike", "list", "42", "--json"]);
    assert_eq!(listed["count"], 0);
}

#[test]
fn strike_reason_must_not_be_blank() {
    let dir = TempDirGuard::new("strike-reason");
    assert_success(&run_in(
        &dir,
        ["strike", "add", "42", "--author", "7", "--reason", "spam"],
    ));

    for args in [
        vec!["strike", "add", "42", "--author", "7", "--reason", "   "],
        vec!["strike", "edit", "42", "0", "--reason", ""],
        vec!["strike", "edit", "42", "0", "--reason", "  "],
    ] {
        let stderr = assert_failure(&run_in(&dir, args));
        assert!(stderr.contains("reason is required"), "stderr was: {stderr}");
    }

    let listed = json_ok(&dir, ["strike", "list", "42", "--json"]);
    assert_eq!(listed["count"], 1);
    assert_eq!(listed["items"][0]["reason"], "spam");

    let edited = json_ok(
        &dir,
        ["strike", "edit", "42", "0", "--reason", " spam in #builds ", "--json"],
    );
    assert_eq!(edited["strike"]["reason"], "spam in #builds");
}

#[test]
fn malformed_scope_key_is_rejected() {
    let dir = TempDirGuard::new("scope");
    let stderr = assert_failure(&run_in(&dir, ["strike", "next", "abc"]));
    assert!(stderr.contains("invalid scope"), "stderr was: {stderr}");
}

#[test]
fn tickets_are_numbered_per_guild() {
    let dir = TempDirGuard::new("tickets");

    let opened = json_ok(
        &dir,
        [
            "ticket", "open", "9", "--channel", "500", "--type", "submit-build", "--creator",
            "3", "--json",
        ],
    );
    assert_eq!(opened["ticket"]["ticketId"], 0);
    assert_eq!(opened["ticket"]["ticketType"], 1);

    let next = json_ok(&dir, ["ticket", "next", "9", "--json"]);
    assert_eq!(next["nextId"], 1);

    let stderr = assert_failure(&run_in(
        &dir,
        [
            "ticket", "open", "9", "--channel", "500", "--type", "general", "--creator", "3",
        ],
    ));
    assert!(stderr.contains("already ticket"), "stderr was: {stderr}");

    let found = json_ok(&dir, ["ticket", "channel", "500", "--json"]);
    assert_eq!(found["ticket"]["guildId"], 9);

    assert_success(&run_in(&dir, ["ticket", "close", "9", "0"]));
    let next = json_ok(&dir, ["ticket", "next", "9", "--json"]);
    assert_eq!(next["nextId"], 0);
}

#[test]
fn unknown_ticket_type_is_a_usage_error() {
    let dir = TempDirGuard::new("ticket-type");
    let output = run_in(
        &dir,
        [
            "ticket", "open", "9", "--channel", "500", "--type", "appeal", "--creator", "3",
        ],
    );
    assert!(!output.status.success());
}

#[test]
fn config_file_supplies_chain_depth() {
    let dir = TempDirGuard::new("config");
    let config = dir.path().join("recordbook.toml");
    fs::write(&config, "max_chain_depth = 1\n").expect("config should write");

    for build in ["100", "101"] {
        let mut args = vec!["record", "submit", "--build", build, "--record", "10"];
        if build == "101" {
            args.extend(["--ties-with", "1"]);
        }
        args.extend(["--submitter", "5"]);
        assert_success(&run_in(&dir, args));
    }

    let chain = json_ok(&dir, ["record", "chain", "2", "--json"]);
    assert_eq!(chain["count"], 2);

    fs::write(&config, "max_chain_depth = 0\n").expect("config should write");
    let stderr = assert_failure(&run_in(&dir, ["record", "chain", "2"]));
    assert!(stderr.contains("max_chain_depth"), "stderr was: {stderr}");
}
