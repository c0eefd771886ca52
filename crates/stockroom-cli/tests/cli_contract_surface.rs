// SPDX-License-Identifier: Apache-2.0

use assert_cmd::Command;
use serde_json::Value;
use std::path::Path;

fn parse_commands_from_help(text: &str) -> Vec<String> {
    let mut commands = Vec::new();
    let mut in_commands = false;
    for line in text.lines() {
        let trimmed = line.trim_end();
        if trimmed == "Commands:" {
            in_commands = true;
            continue;
        }
        if in_commands {
            if trimmed.is_empty() {
                break;
            }
            let name = trimmed.split_whitespace().next().unwrap_or("");
            if !name.is_empty() && name != "help" {
                commands.push(name.to_string());
            }
        }
    }
    commands.sort();
    commands
}

/// Isolated from any integration configured in the caller's environment.
fn stockroom(root: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_stockroom"));
    for var in [
        "STOCKROOM_DB_PATH",
        "STOCKROOM_SHEETS_SPREADSHEET_ID",
        "STOCKROOM_SHEETS_ACCESS_TOKEN",
        "STOCKROOM_SLACK_BOT_TOKEN",
        "STOCKROOM_SLACK_CHANNEL",
        "STOCKROOM_SOURCE_FILE",
        "STOCKROOM_SECTIONS",
        "STOCKROOM_LOG_LEVEL",
        "STOCKROOM_SYNC_FETCH_TIMEOUT_MS",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd.env("STOCKROOM_DATA_DIR", root)
        .env("STOCKROOM_SETTINGS_PATH", root.join("settings.json"))
        .arg("--db")
        .arg(root.join("ledger.sqlite"))
        .arg("--json");
    cmd
}

fn stdout_json(output: &std::process::Output) -> Value {
    let text = String::from_utf8(output.stdout.clone()).expect("utf8 stdout");
    serde_json::from_str(text.trim()).expect("json stdout")
}

fn write_source(root: &Path) -> std::path::PathBuf {
    let path = root.join("source.json");
    std::fs::write(
        &path,
        r#"{"sections": {
            "Produto": [
                {"Nome_do_Recurso": "Drill", "ID_do_Recurso": "D-1"},
                {"Nome_do_Recurso": "Drill", "ID_do_Recurso": "D-2"},
                {"Nome_do_Recurso": "Drill", "ID_do_Recurso": "D-3"}
            ],
            "Mecânica": [{"Item": "Wrench"}]
        }}"#,
    )
    .expect("write source");
    path
}

#[test]
fn help_command_surface_is_stable() {
    let output = Command::new(env!("CARGO_BIN_EXE_stockroom"))
        .arg("--help")
        .output()
        .expect("run help");
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).expect("utf8 help");
    assert_eq!(
        parse_commands_from_help(&text),
        vec![
            "checkin", "checkout", "history", "item", "items", "notifier", "search", "serve",
            "sync", "usage", "version"
        ]
    );
}

#[test]
fn unknown_flag_returns_usage_exit_code_with_machine_error() {
    let output = Command::new(env!("CARGO_BIN_EXE_stockroom"))
        .args(["--json", "--unknown-flag"])
        .output()
        .expect("run bad cli");
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8(output.stderr).expect("utf8 stderr");
    assert!(stderr.contains("usage_error"));
}

#[test]
fn version_output_contains_crate_version() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = stockroom(dir.path()).arg("version").output().expect("run");
    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn sync_then_checkout_and_history_end_to_end() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source = write_source(dir.path());

    let output = stockroom(dir.path())
        .args(["sync", "--section", "Produto", "--section", "Mecânica", "--file"])
        .arg(&source)
        .output()
        .expect("sync");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let report = stdout_json(&output);
    assert_eq!(report["summary"]["records_read"], 4);
    assert_eq!(report["summary"]["items_created"], 2);

    let low_names = |dir: &Path| -> Vec<String> {
        let output = stockroom(dir).args(["items", "--low-stock"]).output().expect("items");
        assert!(output.status.success());
        stdout_json(&output)
            .as_array()
            .expect("array")
            .iter()
            .map(|item| item["name"].as_str().expect("name").to_string())
            .collect()
    };
    assert_eq!(low_names(dir.path()), vec!["Wrench"]);

    let output = stockroom(dir.path()).args(["search", "dri"]).output().expect("search");
    let found = stdout_json(&output);
    let drill = found[0]["id"].as_i64().expect("drill id");
    assert_eq!(found[0]["total"], 3);

    let output = stockroom(dir.path())
        .args(["checkout", "--item", &drill.to_string(), "--quantity", "2", "--actor", "Ana"])
        .env("STOCKROOM_CHAT_ENABLED", "false")
        .output()
        .expect("checkout");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let outcome = stdout_json(&output);
    assert_eq!(outcome["new_balance"], 1);
    assert_eq!(outcome["notified"], false);
    assert_eq!(low_names(dir.path()), vec!["Drill", "Wrench"]);

    let output = stockroom(dir.path())
        .args(["checkout", "--item", &drill.to_string(), "--quantity", "5", "--actor", "Ana"])
        .output()
        .expect("oversell");
    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8(output.stderr).expect("utf8 stderr");
    assert!(stderr.contains("insufficient_stock"));

    let output = stockroom(dir.path()).args(["history"]).output().expect("history");
    let rows = stdout_json(&output);
    assert_eq!(rows.as_array().map(Vec::len), Some(1));
    assert_eq!(rows[0]["actor"], "Ana");

    let output = stockroom(dir.path())
        .args(["usage", "--item", &drill.to_string()])
        .output()
        .expect("usage");
    assert_eq!(stdout_json(&output).as_array().map(Vec::len), Some(2));
}

#[test]
fn sync_without_source_is_a_dependency_failure() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = stockroom(dir.path()).arg("sync").output().expect("sync");
    assert_eq!(output.status.code(), Some(4));
    let stderr = String::from_utf8(output.stderr).expect("utf8 stderr");
    assert!(stderr.contains("external_source_unavailable"));
}

#[test]
fn notifier_toggle_persists_between_runs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = stockroom(dir.path()).args(["notifier", "off"]).output().expect("off");
    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["chat_enabled"], false);

    let output = stockroom(dir.path())
        .args(["notifier", "status"])
        .output()
        .expect("status");
    assert_eq!(stdout_json(&output)["chat_enabled"], false);
    assert!(dir.path().join("settings.json").exists());
}

#[test]
fn missing_item_maps_to_validation_exit_code() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = stockroom(dir.path()).args(["item", "42"]).output().expect("item");
    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("not_found"));
}
