//! Aggregate counters shown over the globe

use crate::event::ActivityEvent;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Stats {
    pub total: usize,
    /// Fraction in 0..=1; 0 when there are no events
    pub success_rate: f64,
    pub avg_latency_ms: f64,
    pub distinct_locations: usize,
}

impl Stats {
    pub fn from_events(events: &[ActivityEvent]) -> Self {
        if events.is_empty() {
            return Self::default();
        }
        let total = events.len();
        let successes = events.iter().filter(|e| e.success).count();
        let latency_sum: u128 = events.iter().map(|e| e.latency_ms as u128).sum();
        let locations: HashSet<String> = events.iter().map(|e| e.geo.location_key()).collect();
        Self {
            total,
            success_rate: successes as f64 / total as f64,
            avg_latency_ms: latency_sum as f64 / total as f64,
            distinct_locations: locations.len(),
        }
    }

    pub fn success_rate_percent(&self) -> String {
        format!("{:.1}%", self.success_rate * 100.0)
    }

    pub fn avg_latency_label(&self) -> String {
        format!("{}ms", self.avg_latency_ms.round() as u64)
    }

    /// Overlay lines, top to bottom
    pub fn lines(&self) -> [String; 4] {
        [
            format!("REQUESTS  {}", self.total),
            format!("SUCCESS   {}", self.success_rate_percent()),
            format!("LATENCY   {}", self.avg_latency_label()),
            format!("LOCATIONS {}", self.distinct_locations),
        ]
    }
}
