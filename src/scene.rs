//! Scene orchestration: camera, light, globe, starfield and the live actors
//!
//! The orchestrator is the only owner of point/trail registrations. It spawns
//! a pair for each newly seen event and otherwise leaves actors alone until
//! their own clocks run out.

use crate::actor::{age_seconds, PointActor, TrailActor, VisualState, POINT_LIFETIME, TRAIL_LIFETIME};
use crate::error::TextureLoadError;
use crate::event::ActivityEvent;
use crate::geo;
use crate::poller::DEFAULT_POLL_INTERVAL;
use chrono::{DateTime, Datelike, Timelike, Utc};
use glam::{Quat, Vec3};
use rand::prelude::*;
use std::collections::HashMap;
use std::f32::consts::{FRAC_PI_2, TAU};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Tunables that used to be scattered literals
#[derive(Debug, Clone)]
pub struct SceneConfig {
    pub poll_interval: Duration,
    pub point_lifetime: Duration,
    pub trail_lifetime: Duration,
    /// Hard ceiling on simultaneously registered events
    pub max_rendered_events: usize,
    pub globe_radius: f32,
    /// Marker shell radius as a multiple of the globe radius
    pub marker_altitude: f32,
    pub trail_altitude: f32,
    pub atmosphere_altitude: f32,
    pub star_count: usize,
    /// Radians per second
    pub auto_rotate_speed: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            point_lifetime: POINT_LIFETIME,
            trail_lifetime: TRAIL_LIFETIME,
            max_rendered_events: 500,
            globe_radius: 1.0,
            marker_altitude: 1.01,
            trail_altitude: 1.02,
            atmosphere_altitude: 1.08,
            star_count: 180,
            auto_rotate_speed: 0.08,
        }
    }
}

// ============================================================================
// Camera
// ============================================================================

const MIN_ZOOM: f32 = 0.3;
const MAX_ZOOM: f32 = 3.0;

/// Orbit camera looking at the origin from +Z
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub yaw: f32,
    pub pitch: f32,
    pub zoom: f32,
    pub auto_rotate: bool,
    home: (f32, f32),
}

impl Camera {
    /// Camera centred on a geographic location
    pub fn looking_at(lat: f64, lng: f64) -> Self {
        let (yaw, pitch) = Self::angles_for(lat, lng);
        Self { yaw, pitch, zoom: 1.0, auto_rotate: true, home: (yaw, pitch) }
    }

    fn angles_for(lat: f64, lng: f64) -> (f32, f32) {
        let dir = geo::project(lat.clamp(-90.0, 90.0), lng.clamp(-180.0, 180.0), 1.0).unwrap_or(Vec3::Z);
        let yaw = (-dir.x).atan2(dir.z);
        let pitch = dir.y.atan2((dir.x * dir.x + dir.z * dir.z).sqrt());
        (yaw, pitch)
    }

    fn rotation(&self) -> Quat {
        Quat::from_rotation_x(self.pitch) * Quat::from_rotation_y(self.yaw)
    }

    /// World space to view space (+Z towards the viewer)
    pub fn to_view(&self, world: Vec3) -> Vec3 {
        self.rotation() * world
    }

    pub fn to_world(&self, view: Vec3) -> Vec3 {
        self.rotation().inverse() * view
    }

    pub fn orbit(&mut self, d_yaw: f32, d_pitch: f32) {
        self.yaw = (self.yaw + d_yaw).rem_euclid(TAU);
        self.pitch = (self.pitch + d_pitch).clamp(-FRAC_PI_2, FRAC_PI_2);
    }

    pub fn zoom_by(&mut self, factor: f32) {
        self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    pub fn reset(&mut self) {
        (self.yaw, self.pitch) = self.home;
        self.zoom = 1.0;
    }

    pub fn advance(&mut self, dt: f32, speed: f32) {
        if self.auto_rotate {
            self.orbit(speed * dt, 0.0);
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::looking_at(20.0, -30.0)
    }
}

// ============================================================================
// Lighting
// ============================================================================

/// Directional light placed over the current subsolar point
#[derive(Debug, Clone, Copy)]
pub struct SunLight {
    pub direction: Vec3,
}

impl SunLight {
    pub fn at(now: DateTime<Utc>) -> Self {
        let hours_utc = now.num_seconds_from_midnight() as f64 / 3600.0;
        let lng = (12.0 - hours_utc) / 24.0 * 360.0;
        let lng = if lng < -180.0 { lng + 360.0 } else { lng };
        let declination = -23.44 * ((360.0 / 365.0) * (now.ordinal() as f64 + 10.0)).to_radians().cos();
        let direction = geo::project(declination, lng, 1.0).unwrap_or(Vec3::X);
        Self { direction }
    }

    /// 1 in full day, 0 in full night, linear across the twilight band.
    pub fn daylight(&self, normal: Vec3) -> f32 {
        // Twilight ends 18 degrees past the terminator
        const NIGHT_EDGE: f32 = -0.309;
        let d = normal.normalize_or_zero().dot(self.direction);
        ((d - NIGHT_EDGE) / -NIGHT_EDGE).clamp(0.0, 1.0)
    }
}

// ============================================================================
// Globe
// ============================================================================

/// Equirectangular RGB texture for the base sphere
#[derive(Debug, Clone)]
pub struct SurfaceTexture {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 3]>,
}

impl SurfaceTexture {
    pub fn load(path: &Path) -> Result<Self, TextureLoadError> {
        std::fs::metadata(path).map_err(|source| TextureLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let image = image::open(path).map_err(|source| TextureLoadError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        if width == 0 || height == 0 {
            return Err(TextureLoadError::Empty(path.to_path_buf()));
        }
        let pixels = rgb.pixels().map(|p| p.0).collect();
        Ok(Self { width, height, pixels })
    }

    pub fn from_pixels(width: u32, height: u32, pixels: Vec<[u8; 3]>) -> Option<Self> {
        (width > 0 && height > 0 && pixels.len() == (width * height) as usize)
            .then_some(Self { width, height, pixels })
    }

    pub fn sample(&self, lat: f64, lng: f64) -> [u8; 3] {
        let u = ((lng + 180.0) / 360.0).clamp(0.0, 1.0);
        let v = ((90.0 - lat) / 180.0).clamp(0.0, 1.0);
        let x = ((u * self.width as f64) as u32).min(self.width - 1);
        let y = ((v * self.height as f64) as u32).min(self.height - 1);
        self.pixels[(y * self.width + x) as usize]
    }

    /// Relative luminance in 0..=1
    pub fn luminance(&self, lat: f64, lng: f64) -> f32 {
        let [r, g, b] = self.sample(lat, lng);
        (0.2126 * r as f32 + 0.7152 * g as f32 + 0.0722 * b as f32) / 255.0
    }
}

#[derive(Debug, Clone)]
pub enum Surface {
    Textured(SurfaceTexture),
    /// Coastline outlines, used when no texture is configured
    Outline,
    /// Plain sphere, used when a configured texture cannot be loaded
    Flat,
}

#[derive(Debug, Clone)]
pub struct Globe {
    pub radius: f32,
    pub atmosphere_radius: f32,
    pub surface: Surface,
}

impl Globe {
    pub fn new(radius: f32, atmosphere_altitude: f32, texture: Option<&Path>) -> Self {
        let surface = match texture {
            None => Surface::Outline,
            Some(path) => match SurfaceTexture::load(path) {
                Ok(tex) => {
                    info!(path = %path.display(), width = tex.width, height = tex.height, "surface texture loaded");
                    Surface::Textured(tex)
                }
                Err(err) => {
                    warn!(error = %err, "surface texture unavailable, falling back to flat globe");
                    Surface::Flat
                }
            },
        };
        Self { radius, atmosphere_radius: radius * atmosphere_altitude, surface }
    }
}

// ============================================================================
// Starfield
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct Star {
    pub direction: Vec3,
    pub brightness: f32,
    pub phase: f32,
}

impl Star {
    pub fn twinkle(&self, t: f32) -> f32 {
        self.brightness * (0.6 + 0.4 * (t * 1.7 + self.phase).sin())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Starfield {
    pub stars: Vec<Star>,
}

impl Starfield {
    pub fn generate(count: usize, rng: &mut StdRng) -> Self {
        let stars = (0..count)
            .map(|_| {
                let z: f32 = rng.gen_range(-1.0..1.0);
                let theta: f32 = rng.gen_range(0.0..TAU);
                let r = (1.0 - z * z).sqrt();
                Star {
                    direction: Vec3::new(r * theta.cos(), r * theta.sin(), z),
                    brightness: rng.gen_range(0.2..1.0),
                    phase: rng.gen_range(0.0..TAU),
                }
            })
            .collect();
        Self { stars }
    }
}

// ============================================================================
// Registrations
// ============================================================================

/// Point + trail pair for one event
#[derive(Debug, Clone)]
pub struct Registration {
    event: Arc<ActivityEvent>,
    point: PointActor,
    trail: TrailActor,
}

impl Registration {
    pub fn event(&self) -> &ActivityEvent {
        &self.event
    }
}

/// Visual state of one registration on one frame
#[derive(Debug, Clone)]
pub struct MarkerFrame {
    pub event: Arc<ActivityEvent>,
    pub point: VisualState,
    pub trail: VisualState,
}

/// Everything the view needs that changes per frame
#[derive(Debug, Clone)]
pub struct Frame {
    pub markers: Vec<MarkerFrame>,
    pub sun: SunLight,
    /// Seconds since the scene was created, for cosmetic animation
    pub time: f32,
}

pub struct SceneOrchestrator {
    config: SceneConfig,
    camera: Camera,
    globe: Globe,
    starfield: Starfield,
    registrations: Vec<Registration>,
    /// Spawned ids and their timestamps, kept until the point would have expired
    seen: HashMap<String, DateTime<Utc>>,
    selected: Option<String>,
    created: DateTime<Utc>,
}

impl SceneOrchestrator {
    pub fn new(config: SceneConfig, texture: Option<&Path>, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let globe = Globe::new(config.globe_radius, config.atmosphere_altitude, texture);
        let starfield = Starfield::generate(config.star_count, &mut rng);
        Self {
            config,
            camera: Camera::default(),
            globe,
            starfield,
            registrations: Vec::new(),
            seen: HashMap::new(),
            selected: None,
            created: Utc::now(),
        }
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn globe(&self) -> &Globe {
        &self.globe
    }

    pub fn starfield(&self) -> &Starfield {
        &self.starfield
    }

    pub fn registrations(&self) -> &[Registration] {
        &self.registrations
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Spawn actors for events not seen before. Returns how many were spawned.
    ///
    /// Existing actors are never removed here just because their event left
    /// the polled window.
    pub fn sync(&mut self, events: &[ActivityEvent], now: DateTime<Utc>) -> usize {
        let cap = self.config.max_rendered_events;
        let lifetime = self.config.point_lifetime.as_secs_f32();
        let window = &events[events.len().saturating_sub(cap)..];
        let marker_radius = self.config.globe_radius * self.config.marker_altitude;
        let trail_radius = self.config.globe_radius * self.config.trail_altitude;

        let mut spawned = 0;
        for event in window {
            if self.seen.contains_key(&event.id) || age_seconds(event, now) >= lifetime {
                continue;
            }
            let shared = Arc::new(event.clone());
            let point = PointActor::spawn(Arc::clone(&shared), marker_radius, self.config.point_lifetime);
            let trail = TrailActor::spawn(Arc::clone(&shared), trail_radius, self.config.trail_lifetime);
            match (point, trail) {
                (Ok(point), Ok(trail)) => {
                    self.seen.insert(event.id.clone(), event.timestamp);
                    self.registrations.push(Registration { event: shared, point, trail });
                    spawned += 1;
                }
                (Err(err), _) | (_, Err(err)) => {
                    warn!(id = %event.id, error = %err, "skipping event that cannot be placed");
                }
            }
        }

        if self.registrations.len() > cap {
            self.registrations.sort_by_key(|r| r.event.timestamp);
            let excess = self.registrations.len() - cap;
            self.registrations.drain(..excess);
            debug!(retired = excess, cap, "render ceiling reached");
        }
        if spawned > 0 {
            debug!(spawned, active = self.registrations.len(), "spawned markers");
        }
        spawned
    }

    /// Render every registration at `now`, dropping the fully expired ones.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Frame {
        let selected = self.selected.as_deref();
        let mut markers = Vec::with_capacity(self.registrations.len());
        self.registrations.retain(|reg| {
            let highlighted = selected == Some(reg.event.id.as_str());
            let point = reg.point.render(now, highlighted);
            let trail = reg.trail.render(now);
            if !point.is_visible() && !trail.is_visible() {
                return false;
            }
            markers.push(MarkerFrame { event: Arc::clone(&reg.event), point, trail });
            true
        });

        let lifetime = self.config.point_lifetime;
        self.seen.retain(|_, ts| {
            (now - *ts).to_std().map_or(true, |age| age <= lifetime)
        });

        if let Some(id) = &self.selected {
            if !self.registrations.iter().any(|r| &r.event.id == id) {
                self.selected = None;
            }
        }

        let time = (now - self.created).num_milliseconds().max(0) as f32 / 1000.0;
        Frame { markers, sun: SunLight::at(now), time }
    }

    pub fn select_next(&mut self) {
        self.step_selection(1);
    }

    pub fn select_previous(&mut self) {
        self.step_selection(-1);
    }

    fn step_selection(&mut self, step: isize) {
        let n = self.registrations.len();
        if n == 0 {
            self.selected = None;
            return;
        }
        let current = self
            .selected
            .as_ref()
            .and_then(|id| self.registrations.iter().position(|r| &r.event.id == id));
        let next = match current {
            Some(i) => (i as isize + step).rem_euclid(n as isize) as usize,
            None if step < 0 => n - 1,
            None => 0,
        };
        self.selected = Some(self.registrations[next].event.id.clone());
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn selected_event(&self) -> Option<&ActivityEvent> {
        let id = self.selected.as_ref()?;
        self.registrations.iter().find(|r| &r.event.id == id).map(|r| r.event())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventDraft, GeoLocation};
    use crate::store::ActivityLog;
    use chrono::Duration as ChronoDuration;

    fn event(id: &str, ts: DateTime<Utc>) -> ActivityEvent {
        ActivityEvent {
            id: id.into(),
            timestamp: ts,
            geo: GeoLocation { lat: 48.9, lng: 2.3, city: "Paris".into(), country: "FR".into() },
            success: true,
            latency_ms: 90,
            prompt_summary: String::new(),
        }
    }

    fn scene() -> SceneOrchestrator {
        SceneOrchestrator::new(SceneConfig::default(), None, Some(7))
    }

    fn after(base: DateTime<Utc>, millis: i64) -> DateTime<Utc> {
        base + ChronoDuration::milliseconds(millis)
    }

    #[test]
    fn spawns_once_per_event_id() {
        let now = Utc::now();
        let mut scene = scene();
        let events = vec![event("a", now), event("b", now)];
        assert_eq!(scene.sync(&events, now), 2);
        assert_eq!(scene.sync(&events, now), 0);
        assert_eq!(scene.len(), 2);
    }

    #[test]
    fn actors_survive_store_clear_until_they_decay() {
        let log = ActivityLog::new(10);
        let geo = GeoLocation { lat: 1.3, lng: 103.8, city: "Singapore".into(), country: "SG".into() };
        log.append(EventDraft::new(geo.clone(), true, 50, "a")).unwrap();
        log.append(EventDraft::new(geo, false, 70, "b")).unwrap();
        let now = Utc::now();

        let mut scene = scene();
        scene.sync(&log.list(100, 0).unwrap(), now);
        assert_eq!(scene.len(), 2);

        log.clear().unwrap();
        scene.sync(&log.list(100, 0).unwrap(), after(now, 100));
        let frame = scene.tick(after(now, 1_000));
        assert_eq!(frame.markers.len(), 2);
        assert!(frame.markers.iter().all(|m| m.point.opacity > 0.0));

        let frame = scene.tick(after(now, 11_000));
        assert!(frame.markers.is_empty());
        assert!(scene.is_empty());
    }

    #[test]
    fn trail_expiry_keeps_registration_while_point_lives() {
        let now = Utc::now();
        let mut scene = scene();
        scene.sync(&[event("a", now)], now);
        let frame = scene.tick(after(now, 4_000));
        assert_eq!(frame.markers.len(), 1);
        assert!(!frame.markers[0].trail.is_visible());
        assert!(frame.markers[0].point.is_visible());
    }

    #[test]
    fn registration_count_never_exceeds_ceiling() {
        let now = Utc::now();
        let mut scene = scene();
        let events: Vec<_> = (0..600).map(|i| event(&format!("e{i}"), after(now, i))).collect();
        scene.sync(&events, after(now, 600));
        assert_eq!(scene.len(), 500);
        assert_eq!(scene.registrations()[0].event().id, "e100");

        let more: Vec<_> = (600..700).map(|i| event(&format!("e{i}"), after(now, i))).collect();
        scene.sync(&more, after(now, 700));
        assert_eq!(scene.len(), 500);
        assert!(scene.registrations().iter().any(|r| r.event().id == "e699"));
        assert!(!scene.registrations().iter().any(|r| r.event().id == "e100"));
    }

    #[test]
    fn already_expired_events_are_not_spawned() {
        let now = Utc::now();
        let mut scene = scene();
        assert_eq!(scene.sync(&[event("old", after(now, -20_000))], now), 0);
        assert!(scene.is_empty());
    }

    #[test]
    fn expired_ids_do_not_respawn_while_still_polled() {
        let now = Utc::now();
        let mut scene = scene();
        let events = vec![event("a", now)];
        scene.sync(&events, now);
        scene.tick(after(now, 9_999));
        assert_eq!(scene.sync(&events, after(now, 9_999)), 0);
    }

    #[test]
    fn selection_cycles_and_highlights() {
        let now = Utc::now();
        let mut scene = scene();
        scene.sync(&[event("a", now), event("b", now)], now);
        scene.select_next();
        assert_eq!(scene.selected_event().map(|e| e.id.as_str()), Some("a"));
        scene.select_next();
        assert_eq!(scene.selected_event().map(|e| e.id.as_str()), Some("b"));
        scene.select_next();
        assert_eq!(scene.selected_event().map(|e| e.id.as_str()), Some("a"));
        scene.select_previous();
        assert_eq!(scene.selected_event().map(|e| e.id.as_str()), Some("b"));

        let frame = scene.tick(now);
        let highlighted: Vec<_> = frame.markers.iter().filter(|m| m.point.highlighted).collect();
        assert_eq!(highlighted.len(), 1);
        assert_eq!(highlighted[0].event.id, "b");
    }

    #[test]
    fn missing_texture_falls_back_to_flat() {
        let globe = Globe::new(1.0, 1.08, Some(Path::new("/nonexistent/globewatch/earth.png")));
        assert!(matches!(globe.surface, Surface::Flat));
    }

    #[test]
    fn undecodable_texture_falls_back_to_flat() {
        let path = std::env::temp_dir().join(format!("globewatch-bad-texture-{}.png", std::process::id()));
        std::fs::write(&path, b"definitely not a png").unwrap();
        let globe = Globe::new(1.0, 1.08, Some(&path));
        let _ = std::fs::remove_file(&path);
        assert!(matches!(globe.surface, Surface::Flat));
    }

    #[test]
    fn no_texture_uses_outline_surface() {
        assert!(matches!(Globe::new(1.0, 1.08, None).surface, Surface::Outline));
    }

    #[test]
    fn texture_sampling_maps_corners() {
        let tex = SurfaceTexture::from_pixels(2, 1, vec![[0, 0, 0], [255, 255, 255]]).unwrap();
        assert_eq!(tex.sample(0.0, -170.0), [0, 0, 0]);
        assert_eq!(tex.sample(0.0, 170.0), [255, 255, 255]);
        assert!((tex.luminance(10.0, 90.0) - 1.0).abs() < 1e-3);
    }

    #[test]
    fn camera_centres_requested_location() {
        for (lat, lng) in [(0.0, 0.0), (51.5, -0.1), (-33.9, 151.2)] {
            let cam = Camera::looking_at(lat, lng);
            let p = geo::project(lat, lng, 1.0).unwrap();
            let v = cam.to_view(p);
            assert!(v.x.abs() < 1e-4 && v.y.abs() < 1e-4, "{lat},{lng} -> {v:?}");
            assert!((v.z - 1.0).abs() < 1e-4);
            assert!((cam.to_world(v) - p).length() < 1e-4);
        }
    }

    #[test]
    fn camera_controls_clamp() {
        let mut cam = Camera::default();
        cam.orbit(0.0, 10.0);
        assert_eq!(cam.pitch, FRAC_PI_2);
        cam.zoom_by(100.0);
        assert_eq!(cam.zoom, MAX_ZOOM);
        cam.reset();
        assert_eq!(cam.zoom, 1.0);
        assert_eq!((cam.yaw, cam.pitch), cam.home);
    }

    #[test]
    fn sunlight_faces_subsolar_point() {
        let noon = DateTime::parse_from_rfc3339("2025-03-20T12:00:00Z").unwrap().with_timezone(&Utc);
        let sun = SunLight::at(noon);
        let greenwich = geo::project(0.0, 0.0, 1.0).unwrap();
        let antipode = geo::project(0.0, 180.0, 1.0).unwrap();
        assert_eq!(sun.daylight(greenwich), 1.0);
        assert_eq!(sun.daylight(antipode), 0.0);
    }

    #[test]
    fn starfield_is_seeded() {
        let a = Starfield::generate(20, &mut StdRng::seed_from_u64(3));
        let b = Starfield::generate(20, &mut StdRng::seed_from_u64(3));
        assert_eq!(a.stars.len(), 20);
        assert!(a.stars.iter().zip(&b.stars).all(|(x, y)| x.direction == y.direction));
        assert!(a.stars.iter().all(|s| (s.direction.length() - 1.0).abs() < 1e-4));
    }
}
