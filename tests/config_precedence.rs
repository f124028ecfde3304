use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};

fn base_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_rescuehub"));
    cmd.env("HOME", home);
    cmd.env_remove("RESCUEHUB_CONFIG");
    cmd.env_remove("RESCUEHUB_UI_COLOR");
    cmd.env_remove("RESCUEHUB_UI_MAX_TABLE_ROWS");
    cmd.env_remove("RESCUEHUB_DATA_DIR");
    cmd.env_remove("RESCUEHUB_SEED_SAMPLE_DATA");
    cmd.env_remove("RESCUEHUB_GEOCODING_ENABLED");
    cmd.env_remove("RESCUEHUB_GEOCODING_ENDPOINT");
    cmd.env_remove("RESCUEHUB_LOCATION_COMMAND");
    cmd.env_remove("RESCUEHUB_PHOTO_MAX_BYTES");
    cmd
}

fn make_temp_home() -> PathBuf {
    static HOME_SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = HOME_SEQ.fetch_add(1, Ordering::Relaxed);
    let home =
        std::env::temp_dir().join(format!("rescuehub-config-test-{}-{seq}", std::process::id()));
    let _ = std::fs::remove_dir_all(&home);
    std::fs::create_dir_all(&home).expect("create home");
    home
}

fn write_file(path: &Path, bytes: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("mkdirs");
    }
    std::fs::write(path, bytes).expect("write");
}

fn show_config(cmd: &mut Command) -> serde_json::Value {
    let out = cmd
        .args(["config", "--show", "--json"])
        .output()
        .expect("run rescuehub");
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    serde_json::from_slice(&out.stdout).expect("parse json")
}

#[test]
fn defaults_without_config_file() {
    let home = make_temp_home();
    let v = show_config(&mut base_cmd(&home));
    assert_eq!(v["ui"]["max_table_rows"], 20);
    assert_eq!(v["storage"]["seed_sample_data"], true);
    assert_eq!(v["geocoding"]["endpoint"], "https://nominatim.openstreetmap.org");
    assert_eq!(v["map"]["center_lat"], 40.7128);
    assert!(v.get("config_path").is_none());
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn default_config_file_is_applied() {
    let home = make_temp_home();
    write_file(
        &home.join(".config/rescuehub/config.toml"),
        br#"
[ui]
max_table_rows = 5

[geocoding]
enabled = false

[map]
center_lat = 35.0
center_lng = 139.0
"#,
    );
    let v = show_config(&mut base_cmd(&home));
    assert_eq!(v["ui"]["max_table_rows"], 5);
    assert_eq!(v["geocoding"]["enabled"], false);
    assert_eq!(v["map"]["center_lng"], 139.0);
    assert!(v["config_path"].as_str().is_some_and(|p| p.ends_with("config.toml")));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn config_flag_beats_env_config_path() {
    let home = make_temp_home();
    let flag_path = home.join("flag.toml");
    let env_path = home.join("env.toml");
    write_file(&flag_path, b"[ui]\nmax_table_rows = 7\n");
    write_file(&env_path, b"[ui]\nmax_table_rows = 9\n");

    let mut cmd = base_cmd(&home);
    cmd.env("RESCUEHUB_CONFIG", &env_path);
    cmd.arg("--config").arg(&flag_path);
    let v = show_config(&mut cmd);
    assert_eq!(v["ui"]["max_table_rows"], 7);

    let mut cmd = base_cmd(&home);
    cmd.env("RESCUEHUB_CONFIG", &env_path);
    let v = show_config(&mut cmd);
    assert_eq!(v["ui"]["max_table_rows"], 9);
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn invalid_toml_exits_2() {
    let home = make_temp_home();
    write_file(&home.join(".config/rescuehub/config.toml"), b"[ui\n");
    let out = base_cmd(&home)
        .args(["dashboard"])
        .output()
        .expect("run rescuehub");
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn data_dir_flag_beats_config_file() {
    let home = make_temp_home();
    let from_file = home.join("from-file");
    let from_flag = home.join("from-flag");
    write_file(
        &home.join(".config/rescuehub/config.toml"),
        format!("[storage]\ndata_dir = \"{}\"\n", from_file.display()).as_bytes(),
    );
    let out = base_cmd(&home)
        .arg("--data-dir")
        .arg(&from_flag)
        .args(["dashboard"])
        .output()
        .expect("run rescuehub");
    assert!(out.status.success());
    assert!(from_flag.join("disaster-reports.json").exists());
    assert!(!from_file.exists());
    let _ = std::fs::remove_dir_all(&home);
}
