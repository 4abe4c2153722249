//! End-to-end CLI tests for the ipums-extract binary.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Binary isolated from the user's config file and API key.
fn ipums_cmd(config_home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("ipums-extract").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home)
        .env_remove("IPUMS_API_KEY")
        .env_remove("IPUMS_BASE_URL")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_binary_help_displays_usage() {
    let home = TempDir::new().unwrap();
    ipums_cmd(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("IPUMS microdata extracts"));
}

#[test]
fn test_binary_version_displays_version() {
    let home = TempDir::new().unwrap();
    ipums_cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ipums-extract"));
}

#[test]
fn test_binary_requires_subcommand() {
    let home = TempDir::new().unwrap();
    ipums_cmd(home.path()).assert().failure();
}

#[test]
fn test_from_ddi_prints_definition() {
    let home = TempDir::new().unwrap();
    ipums_cmd(home.path())
        .args(["-q", "from-ddi"])
        .arg(fixture("usa_00136.xml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"collection\": \"usa\""))
        .stdout(predicate::str::contains("\"us2012b\""))
        .stdout(predicate::str::contains("\"fixed_width\""))
        .stdout(predicate::str::contains("\"preselected\": true"));
}

#[test]
fn test_from_ddi_writes_output_file() {
    let home = TempDir::new().unwrap();
    let output = home.path().join("usa_00136.json");
    ipums_cmd(home.path())
        .args(["-q", "from-ddi"])
        .arg(fixture("usa_00136.xml"))
        .arg("--output")
        .arg(&output)
        .assert()
        .success();

    let extracts = ipums_extract::define_extract_from_json(&output).unwrap();
    assert_eq!(extracts.len(), 1);
    assert_eq!(extracts[0].variables().len(), 10);
}

#[test]
fn test_missing_api_key_fails() {
    let home = TempDir::new().unwrap();
    ipums_cmd(home.path())
        .args(["status", "usa", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No API key"));
}

#[test]
fn test_unknown_config_key_fails_with_line_number() {
    let home = TempDir::new().unwrap();
    let config_dir = home.path().join("ipums");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("config.toml"),
        "api_key = \"abc\"\nretries = 3\n",
    )
    .unwrap();

    ipums_cmd(home.path())
        .args(["status", "usa", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("retries"))
        .stderr(predicate::str::contains("line 2"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_status_command_against_mock_server() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(path("/extracts/10"))
        .and(query_param("collection", "usa"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "number": 10,
            "status": "completed",
            "collection": "usa",
            "samples": {"us2012b": {}},
            "variables": {"AGE": {}},
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/extracts/11"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let base_url = format!("{}/extracts", server.uri());
    let assertions = tokio::task::spawn_blocking(move || {
        let home = TempDir::new().unwrap();
        ipums_cmd(home.path())
            .env("IPUMS_API_KEY", "test-key")
            .env("IPUMS_BASE_URL", &base_url)
            .args(["status", "usa", "10"])
            .assert()
            .success()
            .stdout(predicate::str::contains("usa 10: completed"));

        ipums_cmd(home.path())
            .args(["--api-key", "test-key", "--base-url", &base_url])
            .args(["status", "usa", "11"])
            .assert()
            .success()
            .stdout(predicate::str::contains("usa 11: not found"));
    });
    assertions.await.unwrap();
}
