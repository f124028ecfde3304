use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Audit trail for one mutating command.
#[derive(Debug, Clone)]
pub struct OperationRecord {
    pub command: &'static str,
    pub started_at: OffsetDateTime,
    pub finished_at: OffsetDateTime,
    pub affected_ids: Vec<String>,
    pub source: Option<PathBuf>,
    pub storage_error: Option<String>,
}

impl OperationRecord {
    pub fn new(command: &'static str, started_at: OffsetDateTime) -> Self {
        Self {
            command,
            started_at,
            finished_at: started_at,
            affected_ids: Vec::new(),
            source: None,
            storage_error: None,
        }
    }

    pub fn status(&self) -> &'static str {
        if self.storage_error.is_some() {
            "storage_error"
        } else if self.affected_ids.is_empty() {
            "noop"
        } else {
            "ok"
        }
    }
}

#[derive(Debug, Serialize)]
struct OperationLog<'a> {
    schema_version: &'static str,
    tool_version: String,
    command: &'static str,
    started_at: String,
    finished_at: String,
    status: &'static str,
    affected_ids: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    storage_error: Option<&'a str>,
}

pub fn logs_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("logs")
}

pub fn write_operation_log(
    data_dir: &Path,
    home_dir: &Path,
    record: &OperationRecord,
) -> Result<PathBuf> {
    let dir = logs_dir(data_dir);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create log directory: {}", dir.display()))?;

    let pid = std::process::id();
    let ts = record.finished_at.unix_timestamp_nanos();
    let file_name = format!("{}-{pid}-{ts}.json", record.command.replace(' ', "-"));
    let path = dir.join(file_name);

    let log = OperationLog {
        schema_version: "1.0",
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        command: record.command,
        started_at: format_ts(record.started_at),
        finished_at: format_ts(record.finished_at),
        status: record.status(),
        affected_ids: &record.affected_ids,
        source: record.source.as_deref().map(|p| mask_home(p, home_dir)),
        storage_error: record.storage_error.as_deref(),
    };

    let json = serde_json::to_vec_pretty(&log).context("failed to serialize operation log")?;
    std::fs::write(&path, json)
        .with_context(|| format!("failed to write operation log: {}", path.display()))?;
    Ok(path)
}

fn format_ts(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339).unwrap_or_else(|_| "unknown".to_string())
}

fn mask_home(path: &Path, home_dir: &Path) -> String {
    match path.strip_prefix(home_dir) {
        Ok(rest) if rest.as_os_str().is_empty() => "~".to_string(),
        Ok(rest) => format!("~/{}", rest.display()),
        Err(_) => path.display().to_string(),
    }
}
