//! Runtime configuration resolved from the settings file and CLI flags
//!
//! Precedence: flag, then file, then built-in default.

use crate::poller::{DEFAULT_POLL_INTERVAL, DEFAULT_REQUEST_TIMEOUT};
use crate::scene::SceneConfig;
use crate::settings::{GlobeSettings, ServerSettings};
use crate::store::DEFAULT_CAPACITY;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BIND: &str = "127.0.0.1:8787";
pub const DEFAULT_URL: &str = "http://127.0.0.1:8787/activity-log";
pub const DEFAULT_DEMO_INTERVAL: Duration = Duration::from_millis(700);
/// Seconds per rendered frame
pub const DEFAULT_FRAME_TIME: f32 = 0.05;

/// Flags given to `serve`; `None` means not given
#[derive(Debug, Clone, Default)]
pub struct ServeOverrides {
    pub bind: Option<String>,
    pub capacity: Option<usize>,
    pub geoip_db: Option<PathBuf>,
    pub demo: bool,
    pub demo_interval_ms: Option<u64>,
    pub log_json: bool,
}

#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub bind: String,
    pub capacity: usize,
    pub geoip_db: Option<PathBuf>,
    pub demo: bool,
    pub demo_interval: Duration,
    pub log_json: bool,
}

impl ServeConfig {
    pub fn resolve(file: &ServerSettings, flags: ServeOverrides) -> Self {
        Self {
            bind: flags.bind.or_else(|| file.bind.clone()).unwrap_or_else(|| DEFAULT_BIND.to_string()),
            capacity: flags.capacity.or(file.capacity).unwrap_or(DEFAULT_CAPACITY).max(1),
            geoip_db: flags.geoip_db.or_else(|| file.geoip_db.clone()),
            demo: flags.demo || file.demo.unwrap_or(false),
            demo_interval: flags
                .demo_interval_ms
                .or(file.demo_interval_ms)
                .map(|ms| Duration::from_millis(ms.max(10)))
                .unwrap_or(DEFAULT_DEMO_INTERVAL),
            log_json: flags.log_json,
        }
    }
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self::resolve(&ServerSettings::default(), ServeOverrides::default())
    }
}

/// Flags given to `globe`
#[derive(Debug, Clone, Default)]
pub struct GlobeOverrides {
    pub url: Option<String>,
    pub poll_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
    pub texture: Option<PathBuf>,
    pub time: Option<f32>,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct GlobeConfig {
    pub url: String,
    pub request_timeout: Duration,
    pub texture: Option<PathBuf>,
    pub time_step: f32,
    pub seed: Option<u64>,
    pub color_scheme: u8,
    pub scene: SceneConfig,
}

impl GlobeConfig {
    pub fn resolve(file: &GlobeSettings, flags: GlobeOverrides) -> Self {
        let ms = Duration::from_millis;
        let defaults = SceneConfig::default();
        let scene = SceneConfig {
            poll_interval: flags
                .poll_ms
                .or(file.poll_interval_ms)
                .map(|v| ms(v.max(100)))
                .unwrap_or(DEFAULT_POLL_INTERVAL),
            point_lifetime: file.point_lifetime_ms.map(ms).unwrap_or(defaults.point_lifetime),
            trail_lifetime: file.trail_lifetime_ms.map(ms).unwrap_or(defaults.trail_lifetime),
            max_rendered_events: file
                .max_rendered_events
                .map(|n| n.max(1))
                .unwrap_or(defaults.max_rendered_events),
            ..defaults
        };
        Self {
            url: flags.url.or_else(|| file.url.clone()).unwrap_or_else(|| DEFAULT_URL.to_string()),
            request_timeout: flags
                .timeout_ms
                .or(file.request_timeout_ms)
                .map(ms)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            texture: flags.texture.or_else(|| file.texture.clone()),
            time_step: flags.time.unwrap_or(DEFAULT_FRAME_TIME).clamp(0.005, 1.0),
            seed: flags.seed,
            color_scheme: file.color_scheme.unwrap_or(2).min(9),
            scene,
        }
    }
}

impl Default for GlobeConfig {
    fn default() -> Self {
        Self::resolve(&GlobeSettings::default(), GlobeOverrides::default())
    }
}
