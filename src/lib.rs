//! Live request activity on a terminal globe
//!
//! `serve` keeps a bounded in-memory activity log behind a small HTTP API.
//! `globe` polls that API and draws every event as a fading point with a
//! short pulsing trail on a rotating braille globe.

pub mod actor;
pub mod canvas;
pub mod cities;
pub mod colors;
pub mod config;
pub mod demo;
pub mod error;
pub mod event;
pub mod geo;
pub mod geoip;
pub mod globe;
pub mod help;
pub mod poller;
pub mod scene;
pub mod server;
pub mod settings;
pub mod stats;
pub mod store;
pub mod telemetry;
pub mod terminal;
pub mod view;

pub use error::{EventError, GeoError, TextureLoadError, TransportError};
pub use event::{ActivityEvent, EventDraft, GeoLocation};
pub use store::ActivityLog;
