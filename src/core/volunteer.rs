use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

use crate::core::kinds::capitalize;
use crate::core::lenient;

pub const VOLUNTEER_ID_PREFIX: &str = "volunteer-";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volunteer {
    #[serde(default = "new_volunteer_id", deserialize_with = "lenient::volunteer_id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub phone: String,
    #[serde(default, deserialize_with = "lenient::skills")]
    pub skills: Vec<Skill>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub available: bool,
    #[serde(
        default = "crate::core::report::epoch",
        serialize_with = "time::serde::rfc3339::serialize",
        deserialize_with = "lenient::timestamp"
    )]
    pub registered_at: OffsetDateTime,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewVolunteer {
    pub name: String,
    pub phone: String,
    pub skills: Vec<Skill>,
    pub available: bool,
}

pub fn new_volunteer_id() -> String {
    format!("{VOLUNTEER_ID_PREFIX}{}", uuid::Uuid::new_v4().simple())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Skill {
    Medical,
    SearchRescue,
    Logistics,
    Communication,
    Transportation,
    Cooking,
    Other(String),
}

impl Skill {
    pub const KNOWN: [Skill; 6] = [
        Skill::Medical,
        Skill::SearchRescue,
        Skill::Logistics,
        Skill::Communication,
        Skill::Transportation,
        Skill::Cooking,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Skill::Medical => "medical",
            Skill::SearchRescue => "search-rescue",
            Skill::Logistics => "logistics",
            Skill::Communication => "communication",
            Skill::Transportation => "transportation",
            Skill::Cooking => "cooking",
            Skill::Other(tag) => tag.as_str(),
        }
    }

    pub fn label(&self) -> String {
        capitalize(self.as_str())
    }
}

impl From<String> for Skill {
    fn from(s: String) -> Self {
        match s.as_str() {
            "medical" => Skill::Medical,
            "search-rescue" => Skill::SearchRescue,
            "logistics" => Skill::Logistics,
            "communication" => Skill::Communication,
            "transportation" => Skill::Transportation,
            "cooking" => Skill::Cooking,
            _ => Skill::Other(s),
        }
    }
}

impl From<Skill> for String {
    fn from(s: Skill) -> Self {
        match s {
            Skill::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Skill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Skill {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Skill::from(s.trim().to_ascii_lowercase()) {
            Skill::Other(tag) => Err(format!(
                "unknown skill: {tag} (expected medical|search-rescue|logistics|communication|transportation|cooking)"
            )),
            known => Ok(known),
        }
    }
}

/// Keeps the first occurrence of each skill, preserving order.
pub fn dedup_skills(skills: Vec<Skill>) -> Vec<Skill> {
    let mut out: Vec<Skill> = Vec::with_capacity(skills.len());
    for skill in skills {
        if !out.contains(&skill) {
            out.push(skill);
        }
    }
    out
}
