use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Incident category. Unknown names coming from imported files are kept
/// verbatim in `Other` so they survive a save/export cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Medical,
    Shelter,
    Food,
    Sos,
    Other(String),
}

impl Category {
    pub const KNOWN: [Category; 4] = [
        Category::Medical,
        Category::Shelter,
        Category::Food,
        Category::Sos,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Category::Medical => "medical",
            Category::Shelter => "shelter",
            Category::Food => "food",
            Category::Sos => "sos",
            Category::Other(name) => name.as_str(),
        }
    }

    pub fn label(&self) -> String {
        capitalize(self.as_str())
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::Other(String::new())
    }
}

impl From<String> for Category {
    fn from(s: String) -> Self {
        match s.as_str() {
            "medical" => Category::Medical,
            "shelter" => Category::Shelter,
            "food" => Category::Food,
            "sos" => Category::Sos,
            _ => Category::Other(s),
        }
    }
}

impl From<Category> for String {
    fn from(c: Category) -> Self {
        match c {
            Category::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Category::from(s.trim().to_ascii_lowercase()) {
            Category::Other(name) => Err(format!(
                "unknown category: {name} (expected medical|shelter|food|sos)"
            )),
            known => Ok(known),
        }
    }
}

/// Urgency of an incident. Ordered by urgency; an unrecognised name sits
/// between `Low` and `Medium`, where the density overlay weighs it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
    Other(String),
}

impl Severity {
    pub const KNOWN: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
            Severity::Other(name) => name.as_str(),
        }
    }

    pub fn label(&self) -> String {
        capitalize(self.as_str())
    }

    fn urgency_rank(&self) -> u8 {
        match self {
            Severity::Low => 0,
            Severity::Other(_) => 1,
            Severity::Medium => 2,
            Severity::High => 3,
            Severity::Critical => 4,
        }
    }
}

impl Ord for Severity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.urgency_rank()
            .cmp(&other.urgency_rank())
            .then_with(|| match (self, other) {
                (Severity::Other(a), Severity::Other(b)) => a.cmp(b),
                _ => Ordering::Equal,
            })
    }
}

impl PartialOrd for Severity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Other(String::new())
    }
}

impl From<String> for Severity {
    fn from(s: String) -> Self {
        match s.as_str() {
            "low" => Severity::Low,
            "medium" => Severity::Medium,
            "high" => Severity::High,
            "critical" => Severity::Critical,
            _ => Severity::Other(s),
        }
    }
}

impl From<Severity> for String {
    fn from(s: Severity) -> Self {
        match s {
            Severity::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Severity::from(s.trim().to_ascii_lowercase()) {
            Severity::Other(name) => Err(format!(
                "unknown severity: {name} (expected low|medium|high|critical)"
            )),
            known => Ok(known),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Status {
    #[default]
    Active,
    Resolved,
    Other(String),
}

impl Status {
    pub fn as_str(&self) -> &str {
        match self {
            Status::Active => "active",
            Status::Resolved => "resolved",
            Status::Other(name) => name.as_str(),
        }
    }

    pub fn label(&self) -> String {
        capitalize(self.as_str())
    }
}

impl From<String> for Status {
    fn from(s: String) -> Self {
        match s.as_str() {
            "active" => Status::Active,
            "resolved" => Status::Resolved,
            _ => Status::Other(s),
        }
    }
}

impl From<Status> for String {
    fn from(s: Status) -> Self {
        match s {
            Status::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Status::from(s.trim().to_ascii_lowercase()) {
            Status::Other(name) => Err(format!(
                "unknown status: {name} (expected active|resolved)"
            )),
            known => Ok(known),
        }
    }
}

pub(crate) fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
