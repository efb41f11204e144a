//! HTTP surface over the activity log
//!
//! Every response body is an [`Envelope`].

use crate::config::ServeConfig;
use crate::demo;
use crate::event::{ActivityEvent, Envelope, EventDraft, LogPage};
use crate::geoip::GeoIpLookup;
use crate::store::{ActivityLog, AppendError};
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub const DEFAULT_LIMIT: usize = 100;
pub const MAX_LIMIT: usize = 1000;
const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub log: Arc<ActivityLog>,
    pub geoip: Option<Arc<GeoIpLookup>>,
}

impl AppState {
    pub fn new(log: Arc<ActivityLog>) -> Self {
        Self { log, geoip: None }
    }

    pub fn with_geoip(mut self, geoip: GeoIpLookup) -> Self {
        self.geoip = geoip.is_available().then(|| Arc::new(geoip));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Health {
    pub events: usize,
    pub capacity: usize,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz_handler))
        .route(
            "/activity-log",
            get(list_handler).post(append_handler).delete(clear_handler),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

fn envelope<T: Serialize>(status: StatusCode, body: Envelope<T>) -> Response {
    (status, Json(body)).into_response()
}

fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    envelope::<()>(status, Envelope::failure(message))
}

/// `limit`/`offset` from the query string; missing or unparsable values use defaults.
pub fn parse_window(params: &HashMap<String, String>) -> (usize, usize) {
    let limit = params
        .get("limit")
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(DEFAULT_LIMIT)
        .clamp(1, MAX_LIMIT);
    let offset = params
        .get("offset")
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    (limit, offset)
}

pub async fn list_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let (limit, offset) = parse_window(&params);
    let page = state
        .log
        .list_with_total(limit, offset)
        .map(|(events, total)| LogPage { events, total, limit, offset });
    match page {
        Ok(page) => envelope(StatusCode::OK, Envelope::ok(page)),
        Err(err) => {
            error!(error = %err, "listing activity log failed");
            failure(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

pub async fn append_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let mut draft = match EventDraft::from_json(&body) {
        Ok(draft) => draft,
        Err(err) => return failure(StatusCode::BAD_REQUEST, err.to_string()),
    };
    if draft.geo.is_none() {
        if let (Some(ip), Some(geoip)) = (draft.ip, state.geoip.as_ref()) {
            draft.geo = geoip.locate(ip);
        }
    }

    match state.log.append(draft) {
        Ok(event) => {
            debug!(id = %event.id, city = %event.geo.city, success = event.success, "event recorded");
            envelope::<ActivityEvent>(StatusCode::CREATED, Envelope::ok(event))
        }
        Err(AppendError::Rejected(err)) => {
            warn!(error = %err, "rejected event draft");
            failure(StatusCode::BAD_REQUEST, err.to_string())
        }
        Err(AppendError::Poisoned(err)) => {
            error!(error = %err, "append failed");
            failure(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

pub async fn clear_handler(State(state): State<AppState>) -> Response {
    match state.log.clear() {
        Ok(removed) => {
            info!(removed, "activity log cleared");
            envelope(StatusCode::OK, Envelope::message(format!("Cleared {removed} events")))
        }
        Err(err) => failure(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

pub async fn healthz_handler(State(state): State<AppState>) -> Response {
    match state.log.len() {
        Ok(events) => envelope(
            StatusCode::OK,
            Envelope::ok(Health { events, capacity: state.log.capacity() }),
        ),
        Err(err) => failure(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        if let (Ok(mut sigterm), Ok(mut sigint)) =
            (signal(SignalKind::terminate()), signal(SignalKind::interrupt()))
        {
            tokio::select! {
                _ = sigterm.recv() => {}
                _ = sigint.recv() => {}
            }
            return;
        }
    }
    let _ = tokio::signal::ctrl_c().await;
}

/// Bind, serve until Ctrl-C or SIGTERM, then stop the demo generator.
pub async fn serve(config: ServeConfig) -> io::Result<()> {
    let log = Arc::new(ActivityLog::new(config.capacity));
    let state = AppState::new(Arc::clone(&log)).with_geoip(GeoIpLookup::new(config.geoip_db.as_deref()));
    if config.geoip_db.is_some() && state.geoip.is_none() {
        warn!("geoip disabled, drafts without geo will be rejected");
    }

    let listener = TcpListener::bind(&config.bind).await?;
    info!(addr = %listener.local_addr()?, capacity = config.capacity, "globewatch listening");

    let (stop_tx, stop_rx) = watch::channel(false);
    let demo_task = config
        .demo
        .then(|| tokio::spawn(demo::run(Arc::clone(&log), config.demo_interval, stop_rx)));

    let result = axum::serve(listener, build_router(state))
        .with_graceful_shutdown(wait_for_shutdown_signal())
        .await;

    let _ = stop_tx.send(true);
    if let Some(task) = demo_task {
        let _ = task.await;
    }
    info!("globewatch stopped");
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::GeoLocation;
    use serde_json::Value;

    fn state() -> AppState {
        AppState::new(Arc::new(ActivityLog::new(5)))
    }

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn window_defaults_and_clamps() {
        assert_eq!(parse_window(&params(&[])), (100, 0));
        assert_eq!(parse_window(&params(&[("limit", "5"), ("offset", "2")])), (5, 2));
        assert_eq!(parse_window(&params(&[("limit", "0")])), (1, 0));
        assert_eq!(parse_window(&params(&[("limit", "99999")])), (1000, 0));
        assert_eq!(parse_window(&params(&[("limit", "ten"), ("offset", "-3")])), (100, 0));
    }

    #[tokio::test]
    async fn post_then_list() {
        let state = state();
        let body = br#"{"geo":{"lat":-1.3,"lng":36.8,"city":"Nairobi","country":"KE"},"success":true,"latencyMs":210,"promptSummary":"hi"}"#;
        let created = append_handler(State(state.clone()), Bytes::from_static(body)).await;
        assert_eq!(created.status(), StatusCode::CREATED);
        let created = body_json(created).await;
        assert_eq!(created["success"], true);
        assert_eq!(created["data"]["geo"]["city"], "Nairobi");

        let listed = list_handler(State(state), Query(params(&[]))).await;
        assert_eq!(listed.status(), StatusCode::OK);
        let listed = body_json(listed).await;
        assert_eq!(listed["data"]["total"], 1);
        assert_eq!(listed["data"]["limit"], 100);
        assert_eq!(listed["data"]["events"][0]["latencyMs"], 210);
    }

    #[tokio::test]
    async fn bad_drafts_are_400() {
        let state = state();
        let out_of_range = br#"{"geo":{"lat":91,"lng":0,"city":"","country":""},"success":true,"latencyMs":1}"#;
        let response = append_handler(State(state.clone()), Bytes::from_static(out_of_range)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["success"], false);

        let garbage = append_handler(State(state.clone()), Bytes::from_static(b"not json")).await;
        assert_eq!(garbage.status(), StatusCode::BAD_REQUEST);

        let no_geo = br#"{"success":false,"latencyMs":3,"ip":"8.8.8.8"}"#;
        let response = append_handler(State(state.clone()), Bytes::from_static(no_geo)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(state.log.is_empty().unwrap());
    }

    #[tokio::test]
    async fn clear_and_health() {
        let state = state();
        let geo = GeoLocation { lat: 0.0, lng: 0.0, city: "Null Island".into(), country: "".into() };
        for _ in 0..7 {
            state.log.append(EventDraft::new(geo.clone(), true, 1, "")).unwrap();
        }
        let health = body_json(healthz_handler(State(state.clone())).await).await;
        assert_eq!(health["data"]["events"], 5);
        assert_eq!(health["data"]["capacity"], 5);

        let cleared = clear_handler(State(state.clone())).await;
        assert_eq!(cleared.status(), StatusCode::OK);
        let cleared = body_json(cleared).await;
        assert_eq!(cleared["success"], true);
        assert_eq!(cleared["message"], "Cleared 5 events");
        assert!(state.log.is_empty().unwrap());
    }
}
