// Integration tests for `matchday run` / `matchday validate`.
// Run with: cargo test -p matchday-cli --test recon_cli_tests -- --nocapture

use std::path::Path;
use std::process::Command;

fn matchday() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_matchday"));
    cmd.env_remove("RUST_LOG");
    cmd
}

const CONFIG: &str = r#"
name = "Evening slate"
window_secs = 300

[precedence]
default = ["api", "tv"]

[precedence.fields]
channel = ["tv", "api"]

[[sources]]
id = "api"
file = "api.json"
shape = "flashlive_event"
league = "MLB"

[[sources]]
id = "tv"
file = "tv.csv"

[[sources]]
id = "posts"
file = "posts.json"
shape = "social_post"
"#;

const API_JSON: &str = r#"{"DATA": [
  {"EVENT_ID": "e1", "HOME": {"NAME": "Yankees"}, "AWAY": {"NAME": "Red Sox"},
   "START_TIME": 1749683100, "STATE": "SCHEDULED"}
]}"#;

const TV_CSV: &str = "\
id,home,away,start_time,channel
t1,NY Yankees,Boston Red Sox,2025-06-11T23:07:00Z,ESPN
t2,,,,
";

const POSTS_JSON: &str = r#"[
  {"title": "Yankees win 5-3 over Red Sox", "link": "https://x.example/1"},
  {"title": "Yankees win 5-3 over the Red Sox", "link": "https://x.example/2"},
  {"title": "Mets lose again", "link": "https://x.example/3"}
]"#;

fn write_slate(dir: &Path, config: &str) -> std::path::PathBuf {
    std::fs::write(dir.join("api.json"), API_JSON).unwrap();
    std::fs::write(dir.join("tv.csv"), TV_CSV).unwrap();
    std::fs::write(dir.join("posts.json"), POSTS_JSON).unwrap();
    let path = dir.join("slate.recon.toml");
    std::fs::write(&path, config).unwrap();
    path
}

fn stderr_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// ===========================================================================
// run
// ===========================================================================

#[test]
fn run_json_emits_single_document() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let config = write_slate(dir.path(), CONFIG);

    let output = matchday()
        .args(["run", config.to_str().unwrap(), "--json"])
        .output()
        .expect("matchday run --json");

    assert!(output.status.success(), "exit code: {:?}\nstderr: {}", output.status, stderr_of(&output));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let val: serde_json::Value = serde_json::from_str(stdout.trim())
        .unwrap_or_else(|e| panic!("stdout must be valid JSON: {e}\n{stdout}"));

    assert_eq!(val["summary"]["canonical_records"], 3);
    assert_eq!(val["summary"]["matched_groups"], 1);
    assert_eq!(val["summary"]["suppressed_duplicates"], 1);
    assert_eq!(val["summary"]["excluded"], 1);

    let event = &val["records"][0];
    assert_eq!(event["kind"], "event");
    assert_eq!(event["fields"]["home"], "Yankees");
    assert_eq!(event["fields"]["channel"], "ESPN");
    assert_eq!(event["start"], "2025-06-11T23:05:00Z");

    let stderr = stderr_of(&output);
    assert!(stderr.contains("recon 'Evening slate'"), "stderr: {stderr}");
    assert!(stderr.contains("missing_fields=1"), "stderr: {stderr}");
}

#[test]
fn run_without_json_keeps_stdout_empty() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let config = write_slate(dir.path(), CONFIG);

    let output = matchday()
        .args(["run", config.to_str().unwrap()])
        .output()
        .expect("matchday run");

    assert!(output.status.success(), "stderr: {}", stderr_of(&output));
    assert!(output.stdout.is_empty());
    assert!(stderr_of(&output).contains("3 canonical"));
}

#[test]
fn run_writes_output_file() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let config = write_slate(dir.path(), CONFIG);
    let out = dir.path().join("result.json");

    let output = matchday()
        .args(["run", config.to_str().unwrap(), "--output", out.to_str().unwrap()])
        .output()
        .expect("matchday run --output");

    assert!(output.status.success(), "stderr: {}", stderr_of(&output));
    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(written["meta"]["sources"], serde_json::json!(["api", "tv", "posts"]));
    assert!(stderr_of(&output).contains("wrote"));
}

#[test]
fn run_with_verbose_logs_source_loading() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let config = write_slate(dir.path(), CONFIG);

    let output = matchday()
        .args(["-v", "run", config.to_str().unwrap()])
        .output()
        .expect("matchday -v run");

    assert!(output.status.success());
    let stderr = stderr_of(&output);
    assert!(stderr.contains("source 'api': 1 records"), "stderr: {stderr}");
}

#[test]
fn run_empty_result_exits_62() {
    let dir = tempfile::tempdir().expect("create temp dir");
    std::fs::write(dir.path().join("empty.json"), "[]").unwrap();
    let config = dir.path().join("empty.recon.toml");
    std::fs::write(
        &config,
        "name = \"Nothing\"\n[[sources]]\nid = \"a\"\nfile = \"empty.json\"\n",
    )
    .unwrap();

    let output = matchday()
        .args(["run", config.to_str().unwrap()])
        .output()
        .expect("matchday run");

    assert_eq!(output.status.code(), Some(62));
    assert!(stderr_of(&output).contains("zero records reconciled"));
}

#[test]
fn run_missing_source_file_exits_61() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let config = dir.path().join("slate.recon.toml");
    std::fs::write(&config, CONFIG).unwrap();

    let output = matchday()
        .args(["run", config.to_str().unwrap()])
        .output()
        .expect("matchday run");

    assert_eq!(output.status.code(), Some(61));
    assert!(stderr_of(&output).contains("cannot read"));
}

#[test]
fn run_malformed_dump_exits_61() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let config = write_slate(dir.path(), CONFIG);
    std::fs::write(dir.path().join("api.json"), "{ not json").unwrap();

    let output = matchday()
        .args(["run", config.to_str().unwrap()])
        .output()
        .expect("matchday run");

    assert_eq!(output.status.code(), Some(61));
    assert!(stderr_of(&output).contains("source 'api'"));
}

#[test]
fn run_invalid_config_exits_60() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let config = write_slate(dir.path(), &CONFIG.replace("window_secs = 300", "threshold = 2.0"));

    let output = matchday()
        .args(["run", config.to_str().unwrap()])
        .output()
        .expect("matchday run");

    assert_eq!(output.status.code(), Some(60));
    assert!(stderr_of(&output).contains("threshold must be within"));
}

// ===========================================================================
// validate
// ===========================================================================

#[test]
fn validate_accepts_good_config() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let config = write_slate(dir.path(), CONFIG);

    let output = matchday()
        .args(["validate", config.to_str().unwrap()])
        .output()
        .expect("matchday validate");

    assert!(output.status.success());
    let stderr = stderr_of(&output);
    assert!(stderr.contains("valid: recon 'Evening slate' with 3 source(s)"), "stderr: {stderr}");
    assert!(!stderr.contains("warning"));
}

#[test]
fn validate_rejects_unknown_precedence_source() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let config = write_slate(
        dir.path(),
        &CONFIG.replace("default = [\"api\", \"tv\"]", "default = [\"espn\"]"),
    );

    let output = matchday()
        .args(["validate", config.to_str().unwrap()])
        .output()
        .expect("matchday validate");

    assert_eq!(output.status.code(), Some(60));
    let stderr = stderr_of(&output);
    assert!(stderr.contains("unknown source"), "stderr: {stderr}");
    assert!(stderr.contains("hint:"));
}

#[test]
fn validate_warns_about_missing_files() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let config = dir.path().join("slate.recon.toml");
    std::fs::write(&config, CONFIG).unwrap();

    let output = matchday()
        .args(["validate", config.to_str().unwrap()])
        .output()
        .expect("matchday validate");

    assert!(output.status.success());
    assert!(stderr_of(&output).contains("warning: source file not found"));
}

#[test]
fn missing_subcommand_is_usage_error() {
    let output = matchday().output().expect("matchday");
    assert_eq!(output.status.code(), Some(2));
}
