use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

const V1: &str = "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi";

fn story_scan(store: &TempDir) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("story-scan").unwrap();
    cmd.env_remove("RUST_LOG")
        .env("STORY_SCAN_STEADY_DELAY_MS", "0")
        .arg("--store-dir")
        .arg(store.path());
    cmd
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

#[test]
fn test_classify_valid_cid() {
    let store = TempDir::new().unwrap();
    let output = story_scan(&store)
        .args(["classify", &format!("ipfs://{V1}/metadata.json"), "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json = stdout_json(&output);
    assert_eq!(json["class"], "valid_v1");
    assert_eq!(json["cid"], V1);
    assert_eq!(json["fetchable"], true);
}

#[test]
fn test_classify_placeholder_human_output() {
    let store = TempDir::new().unwrap();
    story_scan(&store)
        .args(["classify", &format!("Qm{}", "0".repeat(44))])
        .assert()
        .success()
        .stdout(predicate::str::contains("unpublished placeholder"));
}

#[test]
fn test_cache_import_list_show() {
    let store = TempDir::new().unwrap();
    let input = TempDir::new().unwrap();
    let export = input.path().join("records.json");
    // Values may be double-encoded, as browser storage exports are.
    let record = serde_json::json!({
        "metadata": { "name": "The Lighthouse", "description": "A keeper's log" },
        "storyContent": "It was the last night of the season.",
        "author": "Ada"
    });
    std::fs::write(
        &export,
        serde_json::to_string(&serde_json::json!({
            "story_nft_4": record.to_string(),
            "story_nft_9": { "title": "Ninth" },
            "theme": "dark"
        }))
        .unwrap(),
    )
    .unwrap();

    let output = story_scan(&store)
        .args(["cache", "import", "--json"])
        .arg(&export)
        .output()
        .unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["imported"], serde_json::json!([4, 9]));
    assert_eq!(json["skipped"], serde_json::json!(["theme"]));

    let output = story_scan(&store)
        .args(["cache", "list", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    let items = json.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["id"], 4);
    assert_eq!(items[0]["title"], "The Lighthouse");
    assert_eq!(items[1]["title"], "Ninth");

    let output = story_scan(&store)
        .args(["cache", "show", "4", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["title"], "The Lighthouse");
    assert_eq!(json["author"], "Ada");
    assert_eq!(json["resolutionSource"], "local_cache_only");
}

#[test]
fn test_cache_import_single_record_with_id() {
    let store = TempDir::new().unwrap();
    let input = TempDir::new().unwrap();
    let file = input.path().join("one.json");
    std::fs::write(&file, r#"{"title":"Solo","images":["ipfs://a.png"]}"#).unwrap();

    story_scan(&store)
        .args(["cache", "import", "--id", "12"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 1 record(s)"));

    story_scan(&store)
        .args(["cache", "show", "12", "--raw"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Solo"));
}

#[test]
fn test_cache_show_missing_record_fails() {
    let store = TempDir::new().unwrap();
    story_scan(&store)
        .args(["cache", "show", "3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No cached record for token 3"));
}

#[test]
fn test_scan_unreachable_registry_defers_every_id() {
    let store = TempDir::new().unwrap();
    // Nothing listens on the discard port; every call fails at the transport level.
    let output = story_scan(&store)
        .args(["--rpc-url", "http://127.0.0.1:9", "scan", "--limit", "3", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json = stdout_json(&output);
    assert_eq!(json["records"], serde_json::json!([]));
    assert_eq!(json["summary"]["deferred"], serde_json::json!([0, 1, 2]));
    assert_eq!(json["summary"]["stop"]["reason"], "range_exhausted");
}

#[test]
#[ignore = "requires network access to the registry RPC"]
fn test_scan_live_registry() {
    let store = TempDir::new().unwrap();
    let output = story_scan(&store)
        .args(["scan", "--limit", "5", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert!(json["summary"].is_object());
}
