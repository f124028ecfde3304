use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use crate::core::{Report, Volunteer};
use crate::error::{RescueError, Result};

pub const REPORTS_KEY: &str = "disaster-reports";
pub const VOLUNTEERS_KEY: &str = "disaster-volunteers";
pub const THEME_KEY: &str = "theme";

/// Named string blobs. Reads are best-effort; writes report a `StorageError`.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> io::Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        let storage_err = |source: io::Error| RescueError::StorageWrite {
            key: key.to_string(),
            path: path.clone(),
            source,
        };
        std::fs::create_dir_all(&self.dir).map_err(storage_err)?;
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        std::fs::write(&tmp, value).map_err(storage_err)?;
        std::fs::rename(&tmp, &path).map_err(storage_err)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every subsequent `set` fails, as a full or read-only disk would.
    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn insert(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes {
            return Err(RescueError::StorageWrite {
                key: key.to_string(),
                path: PathBuf::from(format!("memory:{key}")),
                source: io::Error::other("storage quota exceeded"),
            });
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Loaded {
    pub reports: Vec<Report>,
    pub volunteers: Vec<Volunteer>,
    pub warnings: Vec<String>,
}

/// Never fails: a missing key is an empty list and an unreadable or
/// malformed blob is an empty list plus a warning.
pub fn load(store: &dyn KeyValueStore) -> Loaded {
    let mut warnings = Vec::new();
    let reports = load_list(store, REPORTS_KEY, &mut warnings);
    let volunteers = load_list(store, VOLUNTEERS_KEY, &mut warnings);
    Loaded {
        reports,
        volunteers,
        warnings,
    }
}

fn load_list<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
    warnings: &mut Vec<String>,
) -> Vec<T> {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(err) => {
            warnings.push(format!("could not read `{key}`: {err}"));
            return Vec::new();
        }
    };
    if raw.trim().is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Vec<T>>(&raw) {
        Ok(list) => list,
        Err(err) => {
            warnings.push(format!("ignored malformed `{key}`: {err}"));
            Vec::new()
        }
    }
}

pub fn save(
    store: &mut dyn KeyValueStore,
    reports: &[Report],
    volunteers: &[Volunteer],
) -> Result<()> {
    save_list(store, REPORTS_KEY, reports)?;
    save_list(store, VOLUNTEERS_KEY, volunteers)?;
    Ok(())
}

fn save_list<T: Serialize>(store: &mut dyn KeyValueStore, key: &str, list: &[T]) -> Result<()> {
    let json = serde_json::to_string(list).map_err(|source| RescueError::StorageEncode {
        key: key.to_string(),
        source,
    })?;
    store.set(key, &json)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme: {other} (expected light|dark)")),
        }
    }
}

/// Accepts both a JSON string and the bare word the browser build stored.
pub fn load_theme(store: &dyn KeyValueStore) -> Theme {
    let Ok(Some(raw)) = store.get(THEME_KEY) else {
        return Theme::default();
    };
    serde_json::from_str::<Theme>(&raw)
        .ok()
        .or_else(|| raw.parse().ok())
        .unwrap_or_default()
}

pub fn save_theme(store: &mut dyn KeyValueStore, theme: Theme) -> Result<()> {
    let json = serde_json::to_string(&theme).map_err(|source| RescueError::StorageEncode {
        key: THEME_KEY.to_string(),
        source,
    })?;
    store.set(THEME_KEY, &json)
}
