use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::core::lenient;
use crate::core::{Category, Location, Severity, Status};

pub const REPORT_ID_PREFIX: &str = "report-";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    #[serde(default = "new_report_id", deserialize_with = "lenient::report_id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::tag")]
    pub category: Category,
    #[serde(default, deserialize_with = "lenient::tag")]
    pub severity: Severity,
    #[serde(default, deserialize_with = "lenient::text")]
    pub description: String,
    #[serde(
        default,
        deserialize_with = "lenient::location",
        skip_serializing_if = "Option::is_none"
    )]
    pub location: Option<Location>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub address: Option<String>,
    #[serde(
        default = "epoch",
        serialize_with = "time::serde::rfc3339::serialize",
        deserialize_with = "lenient::timestamp"
    )]
    pub timestamp: OffsetDateTime,
    #[serde(default, deserialize_with = "lenient::tag")]
    pub status: Status,
    #[serde(
        default,
        deserialize_with = "lenient::opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub photo: Option<String>,
}

impl Report {
    pub fn is_active(&self) -> bool {
        self.status == Status::Active
    }
}

/// Form fields of a report submission, before an id, timestamp and location
/// are attached. `address` is whatever reverse geocoding produced.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    pub title: String,
    pub category: Category,
    pub severity: Severity,
    pub description: String,
    pub address: Option<String>,
    pub photo: Option<String>,
}

pub fn new_report_id() -> String {
    format!("{REPORT_ID_PREFIX}{}", uuid::Uuid::new_v4().simple())
}

pub(crate) fn epoch() -> OffsetDateTime {
    OffsetDateTime::UNIX_EPOCH
}
