use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Contents of `config.toml`; every section and key is optional
#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub globe: GlobeSettings,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServerSettings {
    pub bind: Option<String>,
    pub capacity: Option<usize>,
    pub geoip_db: Option<PathBuf>, // GeoLite2-City.mmdb
    pub demo: Option<bool>,
    pub demo_interval_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GlobeSettings {
    pub url: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    pub point_lifetime_ms: Option<u64>,
    pub trail_lifetime_ms: Option<u64>,
    pub max_rendered_events: Option<usize>,
    pub texture: Option<PathBuf>, // equirectangular image
    pub color_scheme: Option<u8>,
}

impl Settings {
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content).unwrap_or_else(|err| {
                warn!(path = %path.display(), error = %err, "ignoring malformed config");
                Self::default()
            }),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "config unreadable");
                Self::default()
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("globewatch")
            .join("config.toml")
    }
}
