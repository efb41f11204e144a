//! Synthetic traffic for `serve --demo`

use crate::cities::{City, CITIES};
use crate::event::EventDraft;
use crate::store::{ActivityLog, AppendError};
use rand::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

const SUMMARIES: &[&str] = &[
    "Summarize this article about tidal energy",
    "Translate the menu into Portuguese",
    "Write a haiku about compilers",
    "Explain the borrow checker to a beginner",
    "Draft a polite follow-up email",
    "What is the capital of Mongolia?",
    "Refactor this function to avoid clones",
    "Suggest names for a bakery",
    "Convert this recipe to metric units",
    "List three facts about octopuses",
];

/// Random request outcomes from the reference city table
pub struct DemoTraffic {
    rng: StdRng,
    failure_rate: f64,
}

impl DemoTraffic {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self { rng, failure_rate: 0.1 }
    }

    pub fn next_draft(&mut self) -> EventDraft {
        let city: &City = CITIES.choose(&mut self.rng).unwrap_or(&CITIES[0]);
        let success = !self.rng.gen_bool(self.failure_rate);
        let latency_ms = if success {
            self.rng.gen_range(120..2_400)
        } else {
            self.rng.gen_range(2_000..30_000)
        };
        let summary = SUMMARIES.choose(&mut self.rng).copied().unwrap_or_default();
        EventDraft::new(city.geo(), success, latency_ms, summary)
    }

    pub fn emit(&mut self, log: &ActivityLog) -> Result<(), AppendError> {
        let event = log.append(self.next_draft())?;
        debug!(id = %event.id, city = %event.geo.city, success = event.success, "demo event");
        Ok(())
    }
}

/// Append one synthetic event per tick until `shutdown` flips to true.
pub async fn run(log: Arc<ActivityLog>, every: Duration, mut shutdown: watch::Receiver<bool>) {
    info!(interval_ms = every.as_millis() as u64, "demo traffic enabled");
    let mut traffic = DemoTraffic::new(None);
    let mut ticker = tokio::time::interval(every);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = traffic.emit(&log) {
                    warn!(error = %err, "demo traffic stopped");
                    return;
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drafts_are_always_accepted() {
        let log = ActivityLog::new(64);
        let mut traffic = DemoTraffic::new(Some(11));
        for _ in 0..200 {
            traffic.emit(&log).unwrap();
        }
        assert_eq!(log.len().unwrap(), 64);
    }

    #[test]
    fn seeded_traffic_repeats() {
        let mut a = DemoTraffic::new(Some(5));
        let mut b = DemoTraffic::new(Some(5));
        for _ in 0..10 {
            assert_eq!(a.next_draft(), b.next_draft());
        }
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let log = Arc::new(ActivityLog::new(100));
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(run(Arc::clone(&log), Duration::from_millis(5), rx));
        tokio::time::sleep(Duration::from_millis(60)).await;
        tx.send(true).unwrap();
        task.await.unwrap();
        assert!(log.len().unwrap() > 0);
    }
}
