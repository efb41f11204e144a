//! Activity event schema shared by the log store, the HTTP layer and the poller

use crate::error::{EventError, GeoError};
use crate::geo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Longest prompt summary kept for display, in characters
pub const MAX_SUMMARY_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub lat: f64,
    pub lng: f64,
    pub city: String,
    pub country: String,
}

impl GeoLocation {
    pub fn validate(&self) -> Result<(), GeoError> {
        geo::validate(self.lat, self.lng)
    }

    /// Key used to count distinct locations
    pub fn location_key(&self) -> String {
        format!("{},{}", self.city, self.country)
    }
}

/// One recorded request outcome with its geographic origin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub geo: GeoLocation,
    pub success: bool,
    pub latency_ms: u64,
    pub prompt_summary: String,
}

/// Body of a successful `GET /activity-log`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogPage {
    pub events: Vec<ActivityEvent>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

/// `{ success, data | error }` wrapper used by every endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None, message: None }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(error.into()), message: None }
    }
}

impl Envelope<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self { success: true, data: None, error: None, message: Some(message.into()) }
    }
}

/// Event as handed to the store; id and timestamp are filled in on append.
///
/// Over HTTP the geo block may be omitted when `ip` is given and the server
/// has a GeoIP database to resolve it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDraft {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub geo: Option<GeoLocation>,
    pub success: bool,
    pub latency_ms: u64,
    #[serde(default)]
    pub prompt_summary: String,
    #[serde(default)]
    pub ip: Option<IpAddr>,
}

impl EventDraft {
    pub fn new(geo: GeoLocation, success: bool, latency_ms: u64, prompt_summary: impl Into<String>) -> Self {
        Self {
            geo: Some(geo),
            success,
            latency_ms,
            prompt_summary: prompt_summary.into(),
            ..Self::default()
        }
    }

    /// Parse a JSON body, mapping serde failures into [`EventError::Malformed`].
    pub fn from_json(body: &[u8]) -> Result<Self, EventError> {
        serde_json::from_slice(body).map_err(|e| EventError::Malformed(e.to_string()))
    }

    /// Turn the draft into a complete event, filling in defaults.
    pub fn finalize(self, now: DateTime<Utc>) -> Result<ActivityEvent, EventError> {
        let geo = self.geo.ok_or(EventError::MissingGeo)?;
        geo.validate()?;
        let id = match self.id {
            Some(id) if !id.trim().is_empty() => id,
            _ => uuid::Uuid::new_v4().to_string(),
        };
        Ok(ActivityEvent {
            id,
            timestamp: self.timestamp.unwrap_or(now),
            geo,
            success: self.success,
            latency_ms: self.latency_ms,
            prompt_summary: truncate_summary(&self.prompt_summary),
        })
    }
}

/// Cut a summary to [`MAX_SUMMARY_CHARS`] characters on a char boundary.
pub fn truncate_summary(summary: &str) -> String {
    match summary.char_indices().nth(MAX_SUMMARY_CHARS) {
        Some((idx, _)) => summary[..idx].to_string(),
        None => summary.to_string(),
    }
}
