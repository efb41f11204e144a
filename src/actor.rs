//! Point and trail actors
//!
//! Each actor wraps one event and a position fixed at spawn time. Visual state
//! is a pure function of the actor and the current instant, so nothing here
//! mutates per frame.

use crate::error::GeoError;
use crate::event::ActivityEvent;
use crate::geo;
use chrono::{DateTime, Utc};
use glam::Vec3;
use std::sync::Arc;
use std::time::Duration;

pub const POINT_LIFETIME: Duration = Duration::from_secs(10);
pub const TRAIL_LIFETIME: Duration = Duration::from_secs(3);

/// Vertical bob of a point, as a fraction of its radius
const BOB_AMPLITUDE: f32 = 0.01;
/// Scale applied to the selected point
const HIGHLIGHT_SCALE: f32 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Spawned,
    Aging,
    Expired,
}

/// Colour family keyed on the request outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tone {
    Affirmative,
    Failure,
}

impl Tone {
    pub fn of(event: &ActivityEvent) -> Self {
        if event.success {
            Tone::Affirmative
        } else {
            Tone::Failure
        }
    }
}

/// What the scene layer draws for one actor on one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualState {
    pub position: Vec3,
    pub opacity: f32,
    pub scale: f32,
    pub tone: Tone,
    pub phase: Phase,
    pub highlighted: bool,
}

impl VisualState {
    pub fn is_visible(&self) -> bool {
        self.phase != Phase::Expired
    }
}

/// Seconds since the event was recorded; future timestamps clamp to zero.
pub fn age_seconds(event: &ActivityEvent, now: DateTime<Utc>) -> f32 {
    let millis = (now - event.timestamp).num_milliseconds().max(0);
    millis as f32 / 1000.0
}

/// Linear fade from 1 at spawn to 0 at `lifetime`.
pub fn decay_opacity(age: f32, lifetime: Duration) -> f32 {
    let lifetime = lifetime.as_secs_f32();
    if lifetime <= 0.0 {
        return 0.0;
    }
    (1.0 - age / lifetime).max(0.0)
}

fn phase_for(age: f32, opacity: f32) -> Phase {
    if opacity <= 0.0 {
        Phase::Expired
    } else if age <= 0.0 {
        Phase::Spawned
    } else {
        Phase::Aging
    }
}

/// Surface marker for one event
#[derive(Debug, Clone)]
pub struct PointActor {
    event: Arc<ActivityEvent>,
    anchor: Vec3,
    radius: f32,
    lifetime: Duration,
}

impl PointActor {
    pub fn spawn(event: Arc<ActivityEvent>, radius: f32, lifetime: Duration) -> Result<Self, GeoError> {
        let anchor = geo::project(event.geo.lat, event.geo.lng, radius)?;
        Ok(Self { event, anchor, radius, lifetime })
    }

    pub fn event(&self) -> &ActivityEvent {
        &self.event
    }

    pub fn anchor(&self) -> Vec3 {
        self.anchor
    }

    pub fn render(&self, now: DateTime<Utc>, highlighted: bool) -> VisualState {
        let age = age_seconds(&self.event, now);
        let opacity = decay_opacity(age, self.lifetime);
        let bob = age.sin() * BOB_AMPLITUDE * self.radius;
        VisualState {
            position: self.anchor + Vec3::Y * bob,
            opacity,
            scale: if highlighted { HIGHLIGHT_SCALE } else { 1.0 },
            tone: Tone::of(&self.event),
            phase: phase_for(age, opacity),
            highlighted,
        }
    }
}

/// Pulsing halo around a fresh event, on a shorter clock than its point
#[derive(Debug, Clone)]
pub struct TrailActor {
    event: Arc<ActivityEvent>,
    anchor: Vec3,
    lifetime: Duration,
}

impl TrailActor {
    pub fn spawn(event: Arc<ActivityEvent>, radius: f32, lifetime: Duration) -> Result<Self, GeoError> {
        let anchor = geo::project(event.geo.lat, event.geo.lng, radius)?;
        Ok(Self { event, anchor, lifetime })
    }

    pub fn render(&self, now: DateTime<Utc>) -> VisualState {
        let age = age_seconds(&self.event, now);
        let opacity = decay_opacity(age, self.lifetime);
        VisualState {
            position: self.anchor,
            opacity,
            scale: 1.0 + (age * 10.0).sin() * 0.5,
            tone: Tone::of(&self.event),
            phase: phase_for(age, opacity),
            highlighted: false,
        }
    }
}
