//! Integration tests for the `huesync` binary.
//!
//! Parsing, help, completions, and error paths run without a bridge; the
//! rest talk to a wiremock server standing in for one.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::{Value, json};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `huesync` binary with env isolation.
///
/// Clears all `HUESYNC_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn huesync_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("huesync");
    cmd.env("HOME", "/tmp/huesync-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/huesync-cli-test-nonexistent")
        .env_remove("HUESYNC_PROFILE")
        .env_remove("HUESYNC_BRIDGE")
        .env_remove("HUESYNC_APP_KEY")
        .env_remove("HUESYNC_OUTPUT")
        .env_remove("HUESYNC_INSECURE")
        .env_remove("HUESYNC_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

fn snapshot() -> Vec<Value> {
    vec![
        json!({
            "id": "L1", "id_v1": "/lights/1", "type": "light",
            "owner": {"rid": "D1", "rtype": "device"},
            "metadata": {"name": "Desk", "archetype": "desk_lamp"},
            "on": {"on": false},
            "dimming": {"brightness": 40.0}
        }),
        json!({
            "id": "D1", "type": "device",
            "metadata": {"name": "Desk lamp", "archetype": "desk_lamp"},
            "services": [{"rid": "L1", "rtype": "light"}]
        }),
        json!({
            "id": "R1", "id_v1": "/groups/1", "type": "room",
            "metadata": {"name": "Office", "archetype": "office"},
            "children": [{"rid": "D1", "rtype": "device"}],
            "services": [{"rid": "G1", "rtype": "grouped_light"}]
        }),
        json!({
            "id": "G1", "type": "grouped_light",
            "owner": {"rid": "R1", "rtype": "room"},
            "on": {"on": false}
        }),
    ]
}

/// Fake bridge serving [`snapshot`] for the full-resource GET.
async fn fake_bridge() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/clip/v2/resource"))
        .and(header("hue-application-key", "cli-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [],
            "data": snapshot(),
        })))
        .mount(&server)
        .await;
    server
}

/// Run the binary off the async runtime so wiremock keeps serving.
async fn run_against(server: &MockServer, args: &[&str]) -> std::process::Output {
    let mut cmd = huesync_cmd();
    cmd.args(["--bridge", &server.uri(), "--app-key", "cli-key"])
        .args(args);
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = huesync_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    huesync_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("list")
            .and(predicate::str::contains("watch"))
            .and(predicate::str::contains("light"))
            .and(predicate::str::contains("scene")),
    );
}

#[test]
fn test_version_flag() {
    huesync_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("huesync"));
}

#[test]
fn test_light_set_help_lists_attributes() {
    huesync_cmd()
        .args(["light", "set", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("--brightness")
                .and(predicate::str::contains("--mirek"))
                .and(predicate::str::contains("--xy")),
        );
}

#[test]
fn test_invalid_subcommand() {
    huesync_cmd()
        .arg("frobnicate")
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_watch_resource_conflicts_with_type() {
    huesync_cmd()
        .args(["watch", "--resource", "light/L1", "--type", "light"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("cannot be used with"));
}

// ── Completions ─────────────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    huesync_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("huesync"));
}

#[test]
fn test_completions_zsh() {
    huesync_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef huesync"));
}

#[test]
fn test_completions_fish() {
    huesync_cmd()
        .args(["completions", "fish"])
        .assert()
        .success()
        .stdout(predicate::str::contains("complete -c huesync"));
}

// ── Configuration errors ────────────────────────────────────────────

#[test]
fn test_list_without_config_points_at_init() {
    let output = huesync_cmd().arg("list").output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let text = combined_output(&output);
    assert!(text.contains("config init"), "Expected init hint:\n{text}");
}

#[test]
fn test_bridge_without_app_key_is_an_auth_error() {
    huesync_cmd()
        .args(["--bridge", "https://10.0.0.2", "list"])
        .assert()
        .failure()
        .code(3);
}

#[test]
fn test_unknown_profile() {
    huesync_cmd()
        .args(["--profile", "nope", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope"));
}

#[test]
fn test_config_show_masks_plaintext_key() {
    let dir = tempfile::tempdir().unwrap();
    let cfg_dir = dir.path().join("huesync");
    std::fs::create_dir_all(&cfg_dir).unwrap();
    std::fs::write(
        cfg_dir.join("config.toml"),
        "default_profile = \"home\"\n\n[profiles.home]\nbridge = \"https://10.0.0.2\"\napp_key = \"hunter2\"\n",
    )
    .unwrap();

    huesync_cmd()
        .env("XDG_CONFIG_HOME", dir.path())
        .env("HOME", dir.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("[profiles.home]")
                .and(predicate::str::contains("****"))
                .and(predicate::str::contains("hunter2").not()),
        );
}

// ── Against a fake bridge ───────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_list_plain_prints_identities_in_type_order() {
    let server = fake_bridge().await;
    let output = run_against(&server, &["list", "-o", "plain"]).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(
        lines,
        ["device/D1", "room/R1", "light/L1", "grouped_light/G1"]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_list_within_room_and_type_filter() {
    let server = fake_bridge().await;
    let output = run_against(&server, &["list", "--within", "Office", "-o", "plain"]).await;
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().collect::<Vec<_>>(), ["device/D1", "grouped_light/G1"]);

    let output = run_against(&server, &["list", "--type", "light", "-o", "plain"]).await;
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), "light/L1");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_show_json_by_name() {
    let server = fake_bridge().await;
    let output = run_against(&server, &["show", "Desk", "-o", "json"]).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    let shown: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(shown["id"], "L1");
    assert_eq!(shown["type"], "light");
    assert_eq!(shown["name"], "Desk");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_show_unknown_resource_is_not_found() {
    let server = fake_bridge().await;
    let output = run_against(&server, &["show", "Kitchen"]).await;
    assert_eq!(output.status.code(), Some(4), "{}", combined_output(&output));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_light_on_sends_put() {
    let server = fake_bridge().await;
    Mock::given(method("PUT"))
        .and(path("/clip/v2/resource/light/L1"))
        .and(body_json(json!({"on": {"on": true}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [],
            "data": [{"rid": "L1", "rtype": "light"}],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let output = run_against(&server, &["--quiet", "light", "on", "Desk"]).await;
    assert!(output.status.success(), "{}", combined_output(&output));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_light_set_batches_into_one_put() {
    let server = fake_bridge().await;
    Mock::given(method("PUT"))
        .and(path("/clip/v2/resource/light/L1"))
        .and(body_json(json!({
            "on": {"on": true},
            "dimming": {"brightness": 75.0},
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [],
            "data": [{"rid": "L1", "rtype": "light"}],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let output = run_against(
        &server,
        &["--quiet", "light", "set", "light/L1", "--on", "true", "-B", "75"],
    )
    .await;
    assert!(output.status.success(), "{}", combined_output(&output));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rejected_key_maps_to_auth_exit_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/clip/v2/resource"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "errors": [{"description": "unauthorized user"}],
            "data": [],
        })))
        .mount(&server)
        .await;

    let output = run_against(&server, &["list"]).await;
    assert_eq!(output.status.code(), Some(3), "{}", combined_output(&output));
}
