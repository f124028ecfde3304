use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{OffsetDateTime, UtcOffset};

use crate::core::{Report, Volunteer};
use crate::error::{RescueError, Result};

pub const EXPORT_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub reports: Vec<Report>,
    pub volunteers: Vec<Volunteer>,
    #[serde(with = "time::serde::rfc3339")]
    pub exported_at: OffsetDateTime,
    pub version: String,
}

impl ExportDocument {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

pub fn export_all(
    reports: &[Report],
    volunteers: &[Volunteer],
    now: OffsetDateTime,
) -> ExportDocument {
    ExportDocument {
        reports: reports.to_vec(),
        volunteers: volunteers.to_vec(),
        exported_at: now.to_offset(UtcOffset::UTC),
        version: EXPORT_VERSION.to_string(),
    }
}

/// `rescue-hub-data-YYYY-MM-DD.json`, dated in UTC.
pub fn export_file_name(now: OffsetDateTime) -> String {
    let date = now.to_offset(UtcOffset::UTC).date();
    format!(
        "rescue-hub-data-{:04}-{:02}-{:02}.json",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

/// Records to append. No id-collision check is made against existing state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportBatch {
    pub reports: Vec<Report>,
    pub volunteers: Vec<Volunteer>,
    /// Array entries that were not JSON objects.
    pub skipped: usize,
}

/// Any JSON document is accepted; `reports` and `volunteers` are read only
/// when they are arrays and every other field is ignored. Record fields are
/// read leniently, so only malformed JSON is an error.
pub fn parse_import(text: &str) -> Result<ImportBatch> {
    let doc: Value = serde_json::from_str(text).map_err(RescueError::Parse)?;
    let mut skipped = 0;
    let reports = array_field(&doc, "reports", &mut skipped);
    let volunteers = array_field(&doc, "volunteers", &mut skipped);
    Ok(ImportBatch {
        reports,
        volunteers,
        skipped,
    })
}

fn array_field<T: DeserializeOwned>(doc: &Value, key: &str, skipped: &mut usize) -> Vec<T> {
    let Some(Value::Array(items)) = doc.get(key) else {
        return Vec::new();
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Object(_) => match T::deserialize(item) {
                Ok(record) => out.push(record),
                Err(_) => *skipped += 1,
            },
            _ => *skipped += 1,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn export_has_fixed_shape() {
        let doc = export_all(&[], &[], datetime!(2026-05-04 23:30 -02:00));
        let v: Value = serde_json::from_str(&doc.to_json_pretty().unwrap()).unwrap();
        assert_eq!(v.get("version").and_then(|s| s.as_str()), Some("1.0"));
        assert_eq!(
            v.get("exportedAt").and_then(|s| s.as_str()),
            Some("2026-05-05T01:30:00Z")
        );
        assert!(v.get("reports").is_some_and(Value::is_array));
        assert!(v.get("volunteers").is_some_and(Value::is_array));
    }

    #[test]
    fn file_name_uses_the_utc_date() {
        assert_eq!(
            export_file_name(datetime!(2026-05-04 23:30 -02:00)),
            "rescue-hub-data-2026-05-05.json"
        );
    }

    #[test]
    fn import_reads_arrays_and_ignores_everything_else() {
        let batch = parse_import(
            r#"{"reports":[{"id":"report-x","title":"Gas leak","category":"sos"}],
                "volunteers":"not an array","extra":42}"#,
        )
        .unwrap();
        assert_eq!(batch.reports.len(), 1);
        assert_eq!(batch.reports[0].title, "Gas leak");
        assert!(batch.volunteers.is_empty());

        let batch = parse_import("[1, 2, 3]").unwrap();
        assert_eq!(batch, ImportBatch::default());
    }

    #[test]
    fn records_without_ids_or_with_nulls_are_admitted() {
        let batch = parse_import(
            r#"{"reports":[
                    {"title":"Flood","category":"sos","severity":"high"},
                    {"id":"report-1","title":"Fire","description":null,
                     "timestamp":1700000000000}],
                "volunteers":[{"name":null,"skills":null}]}"#,
        )
        .unwrap();
        assert_eq!(batch.reports.len(), 2);
        assert!(batch.reports[0].id.starts_with(crate::core::REPORT_ID_PREFIX));
        assert_eq!(batch.reports[1].id, "report-1");
        assert_eq!(batch.reports[1].description, "");
        assert_eq!(batch.volunteers.len(), 1);
        assert_eq!(batch.skipped, 0);
    }

    #[test]
    fn non_object_entries_are_skipped_and_counted() {
        let batch =
            parse_import(r#"{"reports":[1,"x",null,{"title":"Gas leak"}],"volunteers":[[]]}"#)
                .unwrap();
        assert_eq!(batch.reports.len(), 1);
        assert!(batch.volunteers.is_empty());
        assert_eq!(batch.skipped, 4);
    }

    #[test]
    fn malformed_json_is_a_parse_error_with_position() {
        let err = parse_import("{\"reports\": [").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Parse);
        let message = err.to_string();
        assert!(message.contains("unexpected end of input"), "{message}");
        assert!(message.contains("line 1"), "{message}");
    }
}
