//! Field readers for stored and imported records. Files written by other
//! clients may carry `null`, numbers where text is expected, or no id at all;
//! every reader falls back to the field's default instead of failing.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::{Location, Skill};

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub(crate) fn text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(scalar_text(Value::deserialize(d)?).unwrap_or_default())
}

pub(crate) fn opt_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(scalar_text(Value::deserialize(d)?))
}

/// Category, severity and status names.
pub(crate) fn tag<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: From<String> + Default,
{
    Ok(scalar_text(Value::deserialize(d)?)
        .map(T::from)
        .unwrap_or_default())
}

pub(crate) fn report_id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    id_or(d, crate::core::new_report_id)
}

pub(crate) fn volunteer_id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    id_or(d, crate::core::new_volunteer_id)
}

fn id_or<'de, D: Deserializer<'de>>(d: D, fresh: fn() -> String) -> Result<String, D::Error> {
    Ok(scalar_text(Value::deserialize(d)?)
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(fresh))
}

/// RFC 3339 text or epoch milliseconds; anything else reads as the epoch.
pub(crate) fn timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<OffsetDateTime, D::Error> {
    let parsed = match Value::deserialize(d)? {
        Value::String(s) => OffsetDateTime::parse(s.trim(), &Rfc3339).ok(),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .and_then(|ms| {
                OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000).ok()
            }),
        _ => None,
    };
    Ok(parsed.unwrap_or(OffsetDateTime::UNIX_EPOCH))
}

pub(crate) fn location<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Location>, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(None),
        value => Ok(Location::deserialize(value).ok()),
    }
}

pub(crate) fn skills<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Skill>, D::Error> {
    match Value::deserialize(d)? {
        Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(scalar_text)
            .map(Skill::from)
            .collect()),
        _ => Ok(Vec::new()),
    }
}

pub(crate) fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(matches!(Value::deserialize(d)?, Value::Bool(true)))
}

#[cfg(test)]
mod tests {
    use crate::core::{Category, Report, Severity, Status, Volunteer};
    use time::macros::datetime;

    #[test]
    fn report_without_id_gets_a_fresh_one() {
        let a: Report = serde_json::from_str(r#"{"title":"Flood"}"#).unwrap();
        let b: Report = serde_json::from_str(r#"{"title":"Flood","id":null}"#).unwrap();
        assert!(a.id.starts_with(crate::core::REPORT_ID_PREFIX));
        assert!(b.id.starts_with(crate::core::REPORT_ID_PREFIX));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn null_and_numeric_fields_fall_back() {
        let r: Report = serde_json::from_str(
            r#"{"id":17,"title":null,"category":null,"severity":3,
                "description":null,"address":null,"status":null,
                "location":{"lat":"north"},"photo":null,
                "timestamp":1700000000000}"#,
        )
        .unwrap();
        assert_eq!(r.id, "17");
        assert_eq!(r.title, "");
        assert_eq!(r.category, Category::default());
        assert_eq!(r.severity, Severity::Other("3".to_string()));
        assert_eq!(r.description, "");
        assert_eq!(r.address, None);
        assert_eq!(r.status, Status::Active);
        assert_eq!(r.location, None);
        assert_eq!(r.photo, None);
        assert_eq!(r.timestamp, datetime!(2023-11-14 22:13:20 UTC));
    }

    #[test]
    fn unreadable_timestamp_reads_as_epoch() {
        let r: Report =
            serde_json::from_str(r#"{"id":"r","timestamp":"last tuesday"}"#).unwrap();
        assert_eq!(r.timestamp, time::OffsetDateTime::UNIX_EPOCH);
    }

    #[test]
    fn volunteer_fields_tolerate_odd_shapes() {
        let v: Volunteer = serde_json::from_str(
            r#"{"name":"Asha","phone":5551234,"skills":["medical",null,"cooking"],
                "available":"yes","registeredAt":null}"#,
        )
        .unwrap();
        assert!(v.id.starts_with(crate::core::VOLUNTEER_ID_PREFIX));
        assert_eq!(v.phone, "5551234");
        assert_eq!(v.skills.len(), 2);
        assert!(!v.available);
        assert_eq!(v.registered_at, time::OffsetDateTime::UNIX_EPOCH);

        let v: Volunteer = serde_json::from_str(r#"{"skills":"medical"}"#).unwrap();
        assert!(v.skills.is_empty());
    }
}
