//! Background polling of the activity log
//!
//! A single worker thread fetches on a fixed interval and hands outcomes to the
//! render thread over a channel. Outcomes are applied in arrival order, so the
//! last response to arrive wins. Failures keep the previous snapshot around and
//! mark it stale.

use crate::error::TransportError;
use crate::event::{ActivityEvent, Envelope, LogPage};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Granularity of the worker's cancellable sleep
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// How long `shutdown` waits for the worker before detaching it
const SHUTDOWN_GRACE: Duration = Duration::from_millis(200);

pub type PollOutcome = Result<Vec<ActivityEvent>, TransportError>;

/// Anything that can produce the current activity log
pub trait LogSource: Send + 'static {
    fn fetch(&mut self) -> PollOutcome;
}

/// Reads `GET /activity-log` through a ureq agent with a request timeout
pub struct HttpLogSource {
    agent: ureq::Agent,
    url: String,
    limit: usize,
}

impl HttpLogSource {
    pub fn new(url: impl Into<String>, limit: usize, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self { agent, url: url.into(), limit }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl LogSource for HttpLogSource {
    fn fetch(&mut self) -> PollOutcome {
        let response = self
            .agent
            .get(&self.url)
            .query("limit", &self.limit.to_string())
            .query("offset", "0")
            .call()?;
        let envelope: Envelope<LogPage> = response
            .into_json()
            .map_err(|e| TransportError::Malformed(e.to_string()))?;
        if !envelope.success {
            return Err(TransportError::Rejected(envelope.error.unwrap_or_default()));
        }
        let page = envelope
            .data
            .ok_or_else(|| TransportError::Malformed("missing data".to_string()))?;
        Ok(page.events)
    }
}

/// Latest snapshot the scene draws from
#[derive(Debug, Default)]
pub struct RenderState {
    events: Vec<ActivityEvent>,
    stale: bool,
    last_error: Option<TransportError>,
    last_success: Option<Instant>,
    generation: u64,
}

impl RenderState {
    pub fn events(&self) -> &[ActivityEvent] {
        &self.events
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn last_error(&self) -> Option<&TransportError> {
        self.last_error.as_ref()
    }

    pub fn last_success(&self) -> Option<Instant> {
        self.last_success
    }

    /// Number of outcomes applied so far
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Apply one poll outcome. Errors keep the current events.
    pub fn apply(&mut self, outcome: PollOutcome) {
        self.generation += 1;
        match outcome {
            Ok(events) => {
                self.events = sanitize(events);
                self.stale = false;
                self.last_error = None;
                self.last_success = Some(Instant::now());
            }
            Err(err) => {
                warn!(error = %err, kept = self.events.len(), "activity poll failed, keeping last snapshot");
                self.stale = true;
                self.last_error = Some(err);
            }
        }
    }
}

/// Drop events whose coordinates would not project.
fn sanitize(events: Vec<ActivityEvent>) -> Vec<ActivityEvent> {
    let before = events.len();
    let kept: Vec<_> = events
        .into_iter()
        .filter(|e| e.geo.validate().is_ok())
        .collect();
    if kept.len() != before {
        warn!(dropped = before - kept.len(), "ignoring events with invalid coordinates");
    }
    kept
}

/// Owns the polling worker; dropping it stops the worker.
pub struct LogPoller {
    receiver: Receiver<PollOutcome>,
    cancel: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    state: RenderState,
}

impl LogPoller {
    pub fn spawn<S: LogSource>(mut source: S, interval: Duration) -> io::Result<Self> {
        let (tx, rx) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));
        let worker_cancel = Arc::clone(&cancel);

        let worker = thread::Builder::new()
            .name("log-poller".to_string())
            .spawn(move || {
                while !worker_cancel.load(Ordering::Relaxed) {
                    let outcome = source.fetch();
                    if worker_cancel.load(Ordering::Relaxed) || tx.send(outcome).is_err() {
                        break;
                    }
                    sleep_cancellable(interval, &worker_cancel);
                }
                debug!("log poller stopped");
            })?;

        Ok(Self {
            receiver: rx,
            cancel,
            worker: Some(worker),
            state: RenderState::default(),
        })
    }

    /// Apply every outcome that has arrived. Returns true if any did.
    pub fn poll(&mut self) -> bool {
        let mut applied = false;
        loop {
            match self.receiver.try_recv() {
                Ok(outcome) => {
                    self.state.apply(outcome);
                    applied = true;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        applied
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Stop the worker. Safe to call more than once.
    ///
    /// A worker still blocked in a request after `SHUTDOWN_GRACE` is detached;
    /// it exits once the request returns, since the cancel flag is checked
    /// before its outcome is sent.
    pub fn shutdown(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        let Some(worker) = self.worker.take() else {
            return;
        };
        let deadline = Instant::now() + SHUTDOWN_GRACE;
        while !worker.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        if worker.is_finished() {
            let _ = worker.join();
        } else {
            debug!("log poller busy in a request, detaching");
        }
    }
}

impl Drop for LogPoller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn sleep_cancellable(total: Duration, cancel: &AtomicBool) {
    let deadline = Instant::now() + total;
    while !cancel.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::GeoLocation;
    use chrono::Utc;
    use std::collections::VecDeque;

    fn event(id: &str, lat: f64) -> ActivityEvent {
        ActivityEvent {
            id: id.into(),
            timestamp: Utc::now(),
            geo: GeoLocation { lat, lng: 10.0, city: "X".into(), country: "Y".into() },
            success: true,
            latency_ms: 5,
            prompt_summary: String::new(),
        }
    }

    struct Scripted(VecDeque<PollOutcome>);

    impl LogSource for Scripted {
        fn fetch(&mut self) -> PollOutcome {
            self.0
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Network("script exhausted".into())))
        }
    }

    fn wait_for_generation(poller: &mut LogPoller, generation: u64) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while poller.state().generation() < generation {
            poller.poll();
            assert!(Instant::now() < deadline, "poller never reached generation {generation}");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn failure_keeps_previous_events_and_marks_stale() {
        let mut state = RenderState::default();
        state.apply(Ok(vec![event("a", 1.0), event("b", 2.0)]));
        assert!(!state.is_stale());
        let before = state.events().to_vec();

        state.apply(Err(TransportError::Timeout));
        assert_eq!(state.events(), before.as_slice());
        assert!(state.is_stale());
        assert_eq!(state.last_error(), Some(&TransportError::Timeout));

        state.apply(Ok(vec![event("c", 3.0)]));
        assert!(!state.is_stale());
        assert!(state.last_error().is_none());
        assert_eq!(state.events().len(), 1);
    }

    #[test]
    fn later_outcome_replaces_earlier() {
        let mut state = RenderState::default();
        state.apply(Ok(vec![event("a", 1.0)]));
        state.apply(Ok(vec![event("b", 1.0), event("c", 1.0)]));
        let ids: Vec<_> = state.events().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["b", "c"]);
        assert_eq!(state.generation(), 2);
    }

    #[test]
    fn invalid_coordinates_are_dropped_at_the_boundary() {
        let mut state = RenderState::default();
        state.apply(Ok(vec![event("ok", 45.0), event("bad", 120.0)]));
        assert_eq!(state.events().len(), 1);
        assert_eq!(state.events()[0].id, "ok");
    }

    #[test]
    fn worker_delivers_outcomes_in_order_and_stops_on_shutdown() {
        let script = Scripted(VecDeque::from(vec![
            Ok(vec![event("a", 0.0)]),
            Err(TransportError::Status(502)),
        ]));
        let mut poller = LogPoller::spawn(script, Duration::from_millis(10)).unwrap();

        wait_for_generation(&mut poller, 2);
        assert!(poller.state().is_stale());
        assert_eq!(poller.state().events()[0].id, "a");

        poller.shutdown();
        assert!(!poller.is_running());
        poller.shutdown();
    }

    /// Accepts connections and never answers them.
    fn silent_server() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let mut held = Vec::new();
            for stream in listener.incoming().flatten() {
                held.push(stream);
            }
        });
        format!("http://{addr}/activity-log")
    }

    #[test]
    fn unanswered_request_times_out_and_goes_stale() {
        let mut source = HttpLogSource::new(silent_server(), 10, Duration::from_millis(400));
        let started = Instant::now();
        let outcome = source.fetch();
        let elapsed = started.elapsed();

        assert_eq!(outcome, Err(TransportError::Timeout));
        assert!(elapsed >= Duration::from_millis(300), "returned after {elapsed:?}");
        assert!(elapsed < Duration::from_secs(3), "returned after {elapsed:?}");

        let mut state = RenderState::default();
        state.apply(Ok(vec![event("a", 1.0)]));
        state.apply(outcome);
        assert!(state.is_stale());
        assert_eq!(state.events().len(), 1);
    }

    #[test]
    fn shutdown_does_not_wait_for_a_hung_request() {
        let source = HttpLogSource::new(silent_server(), 10, Duration::from_secs(5));
        let mut poller = LogPoller::spawn(source, Duration::from_millis(10)).unwrap();
        thread::sleep(Duration::from_millis(100));

        let started = Instant::now();
        poller.shutdown();
        assert!(started.elapsed() < Duration::from_secs(1), "shutdown took {:?}", started.elapsed());
        assert!(!poller.is_running());
    }

    #[test]
    fn http_source_reports_unreachable_server() {
        let mut source = HttpLogSource::new("http://127.0.0.1:9/activity-log", 10, Duration::from_millis(300));
        assert!(source.fetch().is_err());
    }
}
