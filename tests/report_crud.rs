use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicU64, Ordering};

fn rescuehub_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_rescuehub"));
    cmd.env("HOME", home);
    cmd.env_remove("RESCUEHUB_CONFIG");
    cmd.env_remove("RESCUEHUB_UI_COLOR");
    cmd.env_remove("RESCUEHUB_UI_MAX_TABLE_ROWS");
    cmd.env_remove("RESCUEHUB_DATA_DIR");
    cmd.env_remove("RESCUEHUB_GEOCODING_ENDPOINT");
    cmd.env_remove("RESCUEHUB_LOCATION_COMMAND");
    cmd.env_remove("RESCUEHUB_PHOTO_MAX_BYTES");
    cmd.env("RESCUEHUB_SEED_SAMPLE_DATA", "false");
    cmd.env("RESCUEHUB_GEOCODING_ENABLED", "false");
    cmd
}

fn run(home: &Path, args: &[&str]) -> Output {
    rescuehub_cmd(home).args(args).output().expect("run rescuehub")
}

fn run_json(home: &Path, args: &[&str]) -> serde_json::Value {
    let out = run(home, args);
    assert!(
        out.status.success(),
        "args {args:?} failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    serde_json::from_slice(&out.stdout).expect("parse json")
}

fn make_temp_home() -> PathBuf {
    static HOME_SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = HOME_SEQ.fetch_add(1, Ordering::Relaxed);
    let home =
        std::env::temp_dir().join(format!("rescuehub-crud-test-{}-{seq}", std::process::id()));
    let _ = std::fs::remove_dir_all(&home);
    std::fs::create_dir_all(&home).expect("create home");
    home
}

fn add_report(home: &Path, title: &str, category: &str, severity: &str) -> serde_json::Value {
    run_json(
        home,
        &[
            "report",
            "add",
            "--json",
            "--title",
            title,
            "--category",
            category,
            "--severity",
            severity,
            "--description",
            "Water rising fast near the bridge",
            "--lat",
            "40.7",
            "--lng",
            "-74.01",
        ],
    )
}

#[test]
fn fresh_install_is_seeded_with_samples() {
    let home = make_temp_home();
    let out = rescuehub_cmd(&home)
        .env("RESCUEHUB_SEED_SAMPLE_DATA", "true")
        .args(["dashboard", "--json"])
        .output()
        .expect("run rescuehub");
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(v["activeReports"], 3);
    assert_eq!(v["availableVolunteers"], 2);

    let stored = home.join(".local/share/rescuehub/disaster-reports.json");
    assert!(stored.exists());
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn added_report_is_persisted_with_coordinate_address() {
    let home = make_temp_home();
    let report = add_report(&home, "Flooded basement", "shelter", "high");

    let id = report["id"].as_str().expect("id");
    assert!(id.starts_with("report-"));
    assert_eq!(report["status"], "active");
    assert_eq!(report["category"], "shelter");
    assert_eq!(report["location"]["lat"], 40.7);
    assert_eq!(report["location"]["lng"], -74.01);
    assert_eq!(report["address"], "40.7000, -74.0100");

    let shown = run_json(&home, &["report", "show", "--id", id, "--json"]);
    assert_eq!(shown["title"], "Flooded basement");

    let raw = std::fs::read_to_string(home.join(".local/share/rescuehub/disaster-reports.json"))
        .expect("read store");
    let stored: serde_json::Value = serde_json::from_str(&raw).expect("parse store");
    assert_eq!(stored[0]["id"], id);
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn list_filters_by_category_and_severity() {
    let home = make_temp_home();
    add_report(&home, "Heart attack", "medical", "critical");
    add_report(&home, "Need blankets", "shelter", "low");
    add_report(&home, "Broken leg", "medical", "medium");

    let medical = run_json(&home, &["report", "list", "--category", "medical", "--json"]);
    let titles: Vec<&str> = medical
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|r| r["title"].as_str())
        .collect();
    assert_eq!(titles, ["Heart attack", "Broken leg"]);

    let critical = run_json(
        &home,
        &[
            "report", "list", "--category", "medical", "--severity", "critical", "--date",
            "today", "--json",
        ],
    );
    assert_eq!(critical.as_array().map(Vec::len), Some(1));

    let all = run_json(&home, &["report", "list", "--date", "forever", "--json"]);
    assert_eq!(all.as_array().map(Vec::len), Some(3));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn delete_with_yes_removes_and_repeated_delete_is_a_noop() {
    let home = make_temp_home();
    let report = add_report(&home, "Gas leak", "sos", "critical");
    let id = report["id"].as_str().expect("id");

    let deleted = run_json(&home, &["report", "delete", "--id", id, "--yes", "--json"]);
    assert_eq!(deleted[0]["deleted"], true);

    let again = run(&home, &["report", "delete", "--id", id]);
    assert!(again.status.success());
    assert!(String::from_utf8_lossy(&again.stdout).contains("nothing to delete"));

    let listed = run_json(&home, &["report", "list", "--json"]);
    assert_eq!(listed.as_array().map(Vec::len), Some(0));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn volunteers_register_list_and_delete() {
    let home = make_temp_home();
    let ana = run_json(
        &home,
        &[
            "volunteer",
            "add",
            "--name",
            "Ana",
            "--phone",
            "555-0100",
            "--skill",
            "medical,cooking",
            "--available",
            "--json",
        ],
    );
    assert_eq!(ana["skills"], serde_json::json!(["medical", "cooking"]));
    assert_eq!(ana["available"], true);

    run_json(
        &home,
        &["volunteer", "add", "--name", "Ben", "--phone", "555-0101", "--json"],
    );

    let available = run_json(&home, &["volunteer", "list", "--available-only", "--json"]);
    assert_eq!(available.as_array().map(Vec::len), Some(1));

    let stats = run_json(&home, &["dashboard", "--json"]);
    assert_eq!(stats["availableVolunteers"], 1);
    assert_eq!(stats["totalVolunteers"], 2);

    let id = ana["id"].as_str().expect("id");
    run_json(&home, &["volunteer", "delete", "--id", id, "--yes", "--json"]);
    let all = run_json(&home, &["volunteer", "list", "--json"]);
    assert_eq!(all.as_array().map(Vec::len), Some(1));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn mutations_leave_an_operation_log() {
    let home = make_temp_home();
    add_report(&home, "Power line down", "other", "high");
    let logs = home.join(".local/share/rescuehub/logs");
    let entries: Vec<_> = std::fs::read_dir(&logs)
        .expect("logs dir")
        .filter_map(Result::ok)
        .collect();
    assert_eq!(entries.len(), 1);
    let raw = std::fs::read_to_string(entries[0].path()).expect("read log");
    let v: serde_json::Value = serde_json::from_str(&raw).expect("parse log");
    assert_eq!(v["command"], "report add");
    assert_eq!(v["status"], "ok");
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn map_markers_use_category_styles() {
    let home = make_temp_home();
    add_report(&home, "Shelter full", "shelter", "medium");
    let markers = run_json(&home, &["map", "markers", "--json"]);
    assert_eq!(markers[0]["icon"], "home");
    assert_eq!(markers[0]["color"], "#2563eb");

    let density = run_json(&home, &["map", "density", "--json"]);
    assert_eq!(density[0]["weight"], 0.6);
    assert_eq!(density[0]["color"], "#d97706");
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn theme_toggles_and_persists() {
    let home = make_temp_home();
    let shown = run(&home, &["theme"]);
    assert_eq!(String::from_utf8_lossy(&shown.stdout).trim(), "light");
    let toggled = run_json(&home, &["theme", "toggle", "--json"]);
    assert_eq!(toggled["theme"], "dark");
    let shown = run(&home, &["theme", "show"]);
    assert_eq!(String::from_utf8_lossy(&shown.stdout).trim(), "dark");
    let _ = std::fs::remove_dir_all(&home);
}
