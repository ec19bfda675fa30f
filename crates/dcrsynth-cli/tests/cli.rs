//! Black-box tests for the `dcrsynth` binary against the fixtures directory.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn dcrsynth(out: &Path) -> Command {
    let mut cmd = Command::cargo_bin("dcrsynth").unwrap();
    cmd.env_remove("RUST_LOG")
        .arg("--out")
        .arg(out)
        .arg("--config")
        .arg(fixture("config.json"));
    cmd
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn generate_routes_tables_and_writes_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("artifacts");

    let output = dcrsynth(&out)
        .arg("--json")
        .arg("generate")
        .arg(fixture("schema.json"))
        .assert()
        .code(2)
        .get_output()
        .clone();
    let v = stdout_json(&output);

    let counts = &v["summary"]["counts"];
    assert_eq!(counts["total"], 4);
    assert_eq!(counts["ready"], 2);
    assert_eq!(counts["manual"], 1);
    assert_eq!(counts["failed"], 1);
    assert_eq!(v["summary"]["failed"][0]["tableId"], "Heartbeat");
    assert_eq!(v["summary"]["failed"][0]["code"], "schema.unavailable");
    assert_eq!(v["summary"]["manual"][0]["tableId"], "WebApp_CL");

    assert!(out.join("Syslog-latest.json").exists());
    assert!(out.join("SecurityEvent-latest.json").exists());
    // Manual tables are still persisted so they can be deployed by hand.
    assert!(out.join("WebApp_CL-latest.json").exists());
    assert!(!out.join("Heartbeat-latest.json").exists());

    let manual = read_json(&out.join("manual-deployment.json"));
    assert_eq!(manual["tables"][0]["tableId"], "WebApp_CL");
    assert_eq!(manual["tables"][0]["columnCount"], 8);
    assert!(manual["tables"][0]["reason"].as_str().unwrap().contains("columns"));
}

#[test]
fn generated_document_is_fully_substituted() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("artifacts");

    dcrsynth(&out)
        .arg("generate")
        .arg(fixture("schema.json"))
        .arg("--table")
        .arg("WebApp_CL")
        .arg("--table")
        .arg("Syslog")
        .assert()
        .success();

    let doc = read_json(&out.join("WebApp_CL-latest.json"));
    let params = doc["parameters"].as_object().unwrap();
    assert!(!params.contains_key("tableName"));
    assert!(!params.contains_key("columns"));
    assert_eq!(
        params["dataCollectionRuleName"]["defaultValue"],
        "dcr-WebApp_CL-westeurope"
    );
    assert_eq!(params["location"]["defaultValue"], "westeurope");

    let props = &doc["resources"][0]["properties"];
    let columns = props["streamDeclarations"]["Custom-WebApp_CL"]["columns"]
        .as_array()
        .unwrap();
    assert_eq!(columns.len(), 8);
    assert!(columns.iter().all(|c| c["name"] != "RequestId"));
    assert_eq!(props["dataFlows"][0]["streams"][0], "Custom-WebApp_CL");
    assert_eq!(props["dataFlows"][0]["outputStream"], "Microsoft-WebApp_CL");

    let syslog = read_json(&out.join("Syslog-latest.json"));
    assert_eq!(
        syslog["resources"][0]["properties"]["dataFlows"][0]["outputStream"],
        "Microsoft-Syslog"
    );
    assert!(!fs::read_to_string(out.join("Syslog-latest.json"))
        .unwrap()
        .contains("parameters('tableName')"));
}

#[test]
fn retention_keeps_configured_number_of_versions() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("artifacts");

    for _ in 0..3 {
        dcrsynth(&out)
            .arg("generate")
            .arg(fixture("schema.json"))
            .arg("--table")
            .arg("Syslog")
            .assert()
            .success();
        std::thread::sleep(std::time::Duration::from_millis(5));
    }

    let output = dcrsynth(&out)
        .arg("--json")
        .arg("versions")
        .arg("Syslog")
        .assert()
        .success()
        .get_output()
        .clone();
    let versions = stdout_json(&output)["versions"].as_array().unwrap().clone();
    assert_eq!(versions.len(), 3);
    assert!(versions[..2].iter().all(|v| v["isLatest"] == false));
    assert_eq!(versions[2]["isLatest"], true);

    let output = dcrsynth(&out)
        .arg("--json")
        .arg("prune")
        .arg("Syslog")
        .arg("--keep")
        .arg("0")
        .assert()
        .success()
        .get_output()
        .clone();
    assert_eq!(stdout_json(&output)["removed"]["Syslog"], 2);
    assert!(out.join("Syslog-latest.json").exists());
}

#[test]
fn dry_run_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("artifacts");

    dcrsynth(&out)
        .arg("generate")
        .arg(fixture("schema.json"))
        .arg("--dry-run")
        .assert()
        .code(2);
    assert!(!out.exists());
}

#[test]
fn broken_template_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("artifacts");

    let output = dcrsynth(&out)
        .arg("generate")
        .arg(fixture("schema.json"))
        .arg("--table")
        .arg("Syslog")
        .arg("--template")
        .arg(fixture("bad-template.json"))
        .assert()
        .failure()
        .get_output()
        .clone();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error:"));
    assert!(stderr.contains("template"));
    assert!(!out.join("Syslog-latest.json").exists());
}

#[test]
fn unknown_table_filter_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    dcrsynth(&dir.path().join("artifacts"))
        .arg("generate")
        .arg(fixture("schema.json"))
        .arg("--table")
        .arg("NoSuchTable")
        .assert()
        .failure();
}

#[test]
fn name_falls_back_to_abbreviation() {
    let dir = tempfile::tempdir().unwrap();
    let output = dcrsynth(dir.path())
        .arg("name")
        .arg("SecurityEvent")
        .arg("--location")
        .arg("australiasoutheast")
        .assert()
        .success()
        .get_output()
        .clone();
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "dcr-SecEvt-australiasoutheast"
    );
}

#[test]
fn endpoint_mode_allows_longer_names() {
    let dir = tempfile::tempdir().unwrap();
    let output = dcrsynth(dir.path())
        .arg("--json")
        .arg("name")
        .arg("SecurityEvent")
        .arg("--location")
        .arg("australiasoutheast")
        .arg("--mode")
        .arg("with-endpoint")
        .assert()
        .success()
        .get_output()
        .clone();
    let v = stdout_json(&output);
    assert_eq!(v["resourceName"], "dcr-SecurityEvent-australiasoutheast");
    assert_eq!(v["maxLength"], 64);
}

#[test]
fn plan_lists_every_table() {
    let dir = tempfile::tempdir().unwrap();
    let output = dcrsynth(dir.path())
        .arg("--json")
        .arg("plan")
        .arg(fixture("schema.json"))
        .assert()
        .success()
        .get_output()
        .clone();
    let v = stdout_json(&output);
    assert_eq!(v["entries"].as_array().unwrap().len(), 4);
    assert!(v["collisions"].as_array().unwrap().is_empty());
    assert_eq!(v["maxLength"], 30);
}

#[test]
fn doctor_passes_with_bundled_templates() {
    let dir = tempfile::tempdir().unwrap();
    let output = dcrsynth(&dir.path().join("artifacts"))
        .arg("--json")
        .arg("doctor")
        .assert()
        .success()
        .get_output()
        .clone();
    assert_eq!(stdout_json(&output)["ok"], true);
}
