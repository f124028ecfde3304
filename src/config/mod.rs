use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::Location;

pub const DEFAULT_GEOCODING_ENDPOINT: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_MAP_CENTER: Location = Location {
    lat: 40.7128,
    lng: -74.0060,
};

#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub ui: UiConfig,
    pub storage: StorageConfig,
    pub geocoding: GeocodingConfig,
    pub location: LocationConfig,
    pub map: MapConfig,
    pub photo: PhotoConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UiConfig {
    pub color: bool,
    pub max_table_rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StorageConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    pub seed_sample_data: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeocodingConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MapConfig {
    pub center_lat: f64,
    pub center_lng: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PhotoConfig {
    pub max_bytes: u64,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            ui: UiConfig {
                color: true,
                max_table_rows: 20,
            },
            storage: StorageConfig {
                data_dir: None,
                seed_sample_data: true,
            },
            geocoding: GeocodingConfig {
                enabled: true,
                endpoint: DEFAULT_GEOCODING_ENDPOINT.to_string(),
                user_agent: format!("rescuehub/{}", env!("CARGO_PKG_VERSION")),
                timeout_secs: 10,
            },
            location: LocationConfig {
                command: None,
                timeout_secs: 10,
            },
            map: MapConfig {
                center_lat: DEFAULT_MAP_CENTER.lat,
                center_lng: DEFAULT_MAP_CENTER.lng,
            },
            photo: PhotoConfig {
                max_bytes: 5 * 1024 * 1024,
            },
            config_path: None,
        }
    }
}

impl EffectiveConfig {
    pub fn data_dir(&self, home_dir: &Path) -> PathBuf {
        self.storage
            .data_dir
            .clone()
            .unwrap_or_else(|| crate::platform::default_data_dir(home_dir))
    }

    pub fn map_center(&self) -> Location {
        Location::new(self.map.center_lat, self.map.center_lng)
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    ui: Option<RawUiConfig>,
    storage: Option<RawStorageConfig>,
    geocoding: Option<RawGeocodingConfig>,
    location: Option<RawLocationConfig>,
    map: Option<RawMapConfig>,
    photo: Option<RawPhotoConfig>,
}

#[derive(Debug, Deserialize)]
struct RawUiConfig {
    color: Option<bool>,
    max_table_rows: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawStorageConfig {
    data_dir: Option<PathBuf>,
    seed_sample_data: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawGeocodingConfig {
    enabled: Option<bool>,
    endpoint: Option<String>,
    user_agent: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawLocationConfig {
    command: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawMapConfig {
    center_lat: Option<f64>,
    center_lng: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawPhotoConfig {
    max_bytes: Option<u64>,
}

pub fn default_config_path(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/rescuehub/config.toml")
}

pub fn load(config_path: Option<&Path>, home_dir: &Path) -> Result<EffectiveConfig> {
    let mut cfg = EffectiveConfig::default();

    let env_path = std::env::var_os("RESCUEHUB_CONFIG")
        .filter(|p| !p.is_empty())
        .map(PathBuf::from);
    let path = config_path
        .map(ToOwned::to_owned)
        .or(env_path)
        .unwrap_or_else(|| default_config_path(home_dir));

    if path.exists() {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let raw: RawConfig = toml::from_str(&s)
            .with_context(|| format!("failed to parse config file (TOML): {}", path.display()))?;
        apply_raw_config(&mut cfg, raw);
        cfg.config_path = Some(path.display().to_string());
    }

    apply_env_overrides(&mut cfg)?;

    Ok(cfg)
}

fn apply_raw_config(cfg: &mut EffectiveConfig, raw: RawConfig) {
    if let Some(ui) = raw.ui {
        if let Some(color) = ui.color {
            cfg.ui.color = color;
        }
        if let Some(max_table_rows) = ui.max_table_rows {
            cfg.ui.max_table_rows = max_table_rows;
        }
    }

    if let Some(storage) = raw.storage {
        if let Some(data_dir) = storage.data_dir {
            cfg.storage.data_dir = Some(data_dir);
        }
        if let Some(seed) = storage.seed_sample_data {
            cfg.storage.seed_sample_data = seed;
        }
    }

    if let Some(geo) = raw.geocoding {
        if let Some(enabled) = geo.enabled {
            cfg.geocoding.enabled = enabled;
        }
        if let Some(endpoint) = geo.endpoint {
            cfg.geocoding.endpoint = endpoint;
        }
        if let Some(user_agent) = geo.user_agent {
            cfg.geocoding.user_agent = user_agent;
        }
        if let Some(timeout_secs) = geo.timeout_secs {
            cfg.geocoding.timeout_secs = timeout_secs;
        }
    }

    if let Some(location) = raw.location {
        if let Some(command) = location.command {
            cfg.location.command = Some(command);
        }
        if let Some(timeout_secs) = location.timeout_secs {
            cfg.location.timeout_secs = timeout_secs;
        }
    }

    if let Some(map) = raw.map {
        if let Some(lat) = map.center_lat {
            cfg.map.center_lat = lat;
        }
        if let Some(lng) = map.center_lng {
            cfg.map.center_lng = lng;
        }
    }

    if let Some(photo) = raw.photo {
        if let Some(max_bytes) = photo.max_bytes {
            cfg.photo.max_bytes = max_bytes;
        }
    }
}

fn apply_env_overrides(cfg: &mut EffectiveConfig) -> Result<()> {
    if let Ok(v) = std::env::var("RESCUEHUB_UI_COLOR") {
        cfg.ui.color = parse_bool(&v).with_context(|| "RESCUEHUB_UI_COLOR")?;
    }
    if let Ok(v) = std::env::var("RESCUEHUB_UI_MAX_TABLE_ROWS") {
        cfg.ui.max_table_rows = v
            .trim()
            .parse::<usize>()
            .with_context(|| "RESCUEHUB_UI_MAX_TABLE_ROWS")?;
    }
    if let Ok(v) = std::env::var("RESCUEHUB_DATA_DIR") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.storage.data_dir = Some(PathBuf::from(v));
        }
    }
    if let Ok(v) = std::env::var("RESCUEHUB_SEED_SAMPLE_DATA") {
        cfg.storage.seed_sample_data =
            parse_bool(&v).with_context(|| "RESCUEHUB_SEED_SAMPLE_DATA")?;
    }
    if let Ok(v) = std::env::var("RESCUEHUB_GEOCODING_ENABLED") {
        cfg.geocoding.enabled = parse_bool(&v).with_context(|| "RESCUEHUB_GEOCODING_ENABLED")?;
    }
    if let Ok(v) = std::env::var("RESCUEHUB_GEOCODING_ENDPOINT") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.geocoding.endpoint = v.to_string();
        }
    }
    if let Ok(v) = std::env::var("RESCUEHUB_LOCATION_COMMAND") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.location.command = Some(v.to_string());
        }
    }
    if let Ok(v) = std::env::var("RESCUEHUB_PHOTO_MAX_BYTES") {
        cfg.photo.max_bytes = v
            .trim()
            .parse::<u64>()
            .with_context(|| "RESCUEHUB_PHOTO_MAX_BYTES")?;
    }

    Ok(())
}

fn parse_bool(s: &str) -> Result<bool> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow::anyhow!(
            "invalid boolean: {s} (expected true|false|1|0|yes|no|on|off)"
        )),
    }
}
