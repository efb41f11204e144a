//! Draws a scene frame and its overlays into the terminal back buffer

use crate::canvas::{dither, level, BrailleCanvas, Ink};
use crate::cities::{trace_ring, COASTLINES};
use crate::colors::{ink_color, status_to_scheme, ColorState, StatusColor};
use crate::event::ActivityEvent;
use crate::geo;
use crate::help::render_help_overlay;
use crate::scene::{Frame, SceneOrchestrator, Surface};
use crate::stats::Stats;
use crate::terminal::Terminal;
use glam::Vec3;

pub const HELP: &str = "\
GLOBEWATCH
─────────────────────
←→↑↓/hjkl  Orbit
+/-        Zoom in/out
0          Reset camera
r          Toggle auto-rotate
Tab        Next event
Shift-Tab  Previous event
Space      Pause
1-9        Frame speed
Shift+0-9  Colour scheme
?          Close help
q/Esc      Quit";

/// Share of the smaller canvas side covered by the globe at zoom 1
const GLOBE_FILL: f32 = 0.42;

/// Text state drawn over the globe
#[derive(Debug, Clone, Default)]
pub struct Overlay<'a> {
    pub stats: Stats,
    pub stale: bool,
    pub last_error: Option<String>,
    pub selected: Option<&'a ActivityEvent>,
    pub paused: bool,
    pub show_help: bool,
}

pub struct View {
    canvas: BrailleCanvas,
    cells: (u16, u16),
}

/// Screen mapping for one frame
struct Projection {
    cx: f32,
    cy: f32,
    /// Dots per world unit
    scale: f32,
}

impl Projection {
    fn to_dots(&self, view: Vec3) -> (i32, i32) {
        (
            (self.cx + view.x * self.scale).round() as i32,
            (self.cy - view.y * self.scale).round() as i32,
        )
    }
}

impl View {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self { canvas: BrailleCanvas::for_cells(cols, rows), cells: (cols, rows) }
    }

    pub fn render(
        &mut self,
        term: &mut Terminal,
        scene: &SceneOrchestrator,
        frame: &Frame,
        overlay: &Overlay,
        colors: ColorState,
    ) {
        let (cols, rows) = term.size();
        if (cols, rows) != self.cells {
            *self = Self::new(cols, rows);
        }
        self.canvas.clear();

        let (dw, dh) = self.canvas.size();
        let globe = scene.globe();
        let camera = scene.camera();
        let proj = Projection {
            cx: dw as f32 / 2.0,
            cy: dh as f32 / 2.0,
            scale: dw.min(dh) as f32 * GLOBE_FILL * camera.zoom / globe.radius.max(f32::EPSILON),
        };

        self.draw_stars(scene, frame, &proj);
        self.draw_surface(scene, frame, &proj);
        self.draw_atmosphere(scene, &proj);
        self.draw_markers(scene, frame, &proj);

        term.clear();
        let scheme = colors.scheme;
        self.canvas.blit(term, |ink| ink_color(scheme, ink));
        draw_overlay(term, overlay, scheme);
    }

    fn draw_stars(&mut self, scene: &SceneOrchestrator, frame: &Frame, proj: &Projection) {
        let (dw, dh) = self.canvas.size();
        let reach = dw.max(dh) as f32 * 0.75;
        let keep_out = scene.globe().atmosphere_radius * proj.scale;
        for star in &scene.starfield().stars {
            let v = scene.camera().to_view(star.direction);
            if v.z > 0.0 {
                continue;
            }
            let x = proj.cx + v.x * reach;
            let y = proj.cy - v.y * reach;
            if (x - proj.cx).hypot(y - proj.cy) <= keep_out {
                continue;
            }
            let brightness = star.twinkle(frame.time);
            if brightness > 0.3 {
                self.canvas.plot(x.round() as i32, y.round() as i32, Ink::Star(level(brightness)));
            }
        }
    }

    fn draw_surface(&mut self, scene: &SceneOrchestrator, frame: &Frame, proj: &Projection) {
        let globe = scene.globe();
        let camera = scene.camera();
        match &globe.surface {
            Surface::Outline => {
                self.draw_graticule(scene, frame, proj);
                self.draw_coastlines(scene, frame, proj);
            }
            surface => {
                let r = globe.radius * proj.scale;
                let (dw, dh) = self.canvas.size();
                let y0 = (proj.cy - r).floor().max(0.0) as i32;
                let y1 = (proj.cy + r).ceil().min(dh as f32) as i32;
                let x0 = (proj.cx - r).floor().max(0.0) as i32;
                let x1 = (proj.cx + r).ceil().min(dw as f32) as i32;
                for py in y0..y1 {
                    for px in x0..x1 {
                        let nx = (px as f32 - proj.cx) / r;
                        let ny = (proj.cy - py as f32) / r;
                        let d2 = nx * nx + ny * ny;
                        if d2 > 1.0 {
                            continue;
                        }
                        let normal = camera.to_world(Vec3::new(nx, ny, (1.0 - d2).sqrt()));
                        let day = frame.sun.daylight(normal);
                        let shade = match surface {
                            Surface::Textured(tex) => {
                                let (lat, lng) = geo::unproject(normal);
                                tex.luminance(lat, lng) * (0.2 + 0.8 * day)
                            }
                            _ => 0.12 + 0.38 * day,
                        };
                        if dither(px, py, shade) {
                            self.canvas.plot(px, py, Ink::Surface(level(shade)));
                        } else if day < 0.2 && dither(px, py, 0.06) {
                            self.canvas.plot(px, py, Ink::Night(0));
                        }
                    }
                }
            }
        }
    }

    fn plot_geo(&mut self, scene: &SceneOrchestrator, proj: &Projection, lat: f64, lng: f64, ink: Ink) {
        let Ok(world) = geo::project(lat, lng, scene.globe().radius) else {
            return;
        };
        let v = scene.camera().to_view(world);
        if v.z < 0.0 {
            return;
        }
        let (x, y) = proj.to_dots(v);
        self.canvas.plot(x, y, ink);
    }

    fn draw_graticule(&mut self, scene: &SceneOrchestrator, frame: &Frame, proj: &Projection) {
        let lit = |lat: f64, lng: f64| {
            geo::project(lat, lng, 1.0).map_or(false, |n| frame.sun.daylight(n) > 0.5)
        };
        for lat in (-60..=60).step_by(30) {
            for lng in (-180..180).step_by(2) {
                let (lat, lng) = (lat as f64, lng as f64);
                if lit(lat, lng) {
                    self.plot_geo(scene, proj, lat, lng, Ink::Graticule);
                }
            }
        }
        for lng in (-180..180).step_by(30) {
            for lat in (-90..=90).step_by(2) {
                let (lat, lng) = (lat as f64, lng as f64);
                if lit(lat, lng) {
                    self.plot_geo(scene, proj, lat, lng, Ink::Graticule);
                }
            }
        }
    }

    fn draw_coastlines(&mut self, scene: &SceneOrchestrator, frame: &Frame, proj: &Projection) {
        for (_, ring) in COASTLINES {
            for (lat, lng) in trace_ring(ring, 16) {
                let day = geo::project(lat, lng, 1.0).map_or(0.0, |n| frame.sun.daylight(n));
                let ink = Ink::Coast(if day > 0.7 { 2 } else { 1 });
                self.plot_geo(scene, proj, lat, lng, ink);
            }
        }
    }

    fn draw_atmosphere(&mut self, scene: &SceneOrchestrator, proj: &Projection) {
        let radius = (scene.globe().atmosphere_radius * proj.scale).round() as i32;
        self.canvas.ring(proj.cx.round() as i32, proj.cy.round() as i32, radius, Ink::Atmosphere);
    }

    fn draw_markers(&mut self, scene: &SceneOrchestrator, frame: &Frame, proj: &Projection) {
        let camera = scene.camera();
        for marker in &frame.markers {
            let trail = &marker.trail;
            if trail.is_visible() {
                let v = camera.to_view(trail.position);
                if v.z >= 0.0 {
                    let (x, y) = proj.to_dots(v);
                    let radius = (trail.scale * 3.0 * camera.zoom).round() as i32;
                    self.canvas.ring(x, y, radius, Ink::Trail(trail.tone, level(trail.opacity)));
                }
            }

            let point = &marker.point;
            if point.is_visible() {
                let v = camera.to_view(point.position);
                if v.z >= 0.0 {
                    let (x, y) = proj.to_dots(v);
                    let ink = if point.highlighted {
                        Ink::Highlight
                    } else {
                        Ink::Point(point.tone, level(point.opacity))
                    };
                    self.canvas.disc(x, y, point.scale.round() as i32, ink);
                }
            }
        }
    }
}

fn draw_overlay(term: &mut Terminal, overlay: &Overlay, scheme: u8) {
    let (width, height) = term.size();
    let info = status_to_scheme(scheme, StatusColor::Info);
    for (row, line) in overlay.stats.lines().iter().enumerate() {
        term.set_str(1, row as i32, line, Some(info), false);
    }

    let (status, tone) = match (&overlay.last_error, overlay.stale) {
        (Some(err), true) => (format!("STALE {err}"), StatusColor::Critical),
        (None, true) => ("STALE".to_string(), StatusColor::Critical),
        _ if overlay.paused => ("PAUSED".to_string(), StatusColor::Warning),
        _ => ("LIVE".to_string(), StatusColor::Good),
    };
    let status: String = status.chars().take(width.saturating_sub(2) as usize).collect();
    let x = width as i32 - status.chars().count() as i32 - 1;
    term.set_str(x, 0, &status, Some(status_to_scheme(7, tone)), true);

    let footer = match overlay.selected {
        Some(event) => detail_line(event),
        None => "Tab select  ? help".to_string(),
    };
    let footer: String = footer.chars().take(width.saturating_sub(2) as usize).collect();
    term.set_str(1, height as i32 - 1, &footer, Some(status_to_scheme(scheme, StatusColor::Muted)), false);

    if overlay.show_help {
        render_help_overlay(term, width, height, HELP);
    }
}

/// One-line summary of an event for the footer
pub fn detail_line(event: &ActivityEvent) -> String {
    let place = match (event.geo.city.is_empty(), event.geo.country.is_empty()) {
        (false, false) => format!("{}, {}", event.geo.city, event.geo.country),
        (false, true) => event.geo.city.clone(),
        (true, false) => event.geo.country.clone(),
        (true, true) => format!("{:.1}, {:.1}", event.geo.lat, event.geo.lng),
    };
    let outcome = if event.success { "ok" } else { "failed" };
    let mut line = format!("▸ {place}  {outcome}  {}ms", event.latency_ms);
    if !event.prompt_summary.is_empty() {
        line.push_str(&format!("  \"{}\"", event.prompt_summary));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::GeoLocation;
    use crate::scene::SceneConfig;
    use chrono::Utc;
    use crossterm::style::Color;

    fn event(id: &str, lat: f64, lng: f64, success: bool) -> ActivityEvent {
        ActivityEvent {
            id: id.into(),
            timestamp: Utc::now(),
            geo: GeoLocation { lat, lng, city: "Reykjavik".into(), country: "IS".into() },
            success,
            latency_ms: 321,
            prompt_summary: "weather".into(),
        }
    }

    fn has_fg(term: &Terminal, color: Color) -> bool {
        let (w, h) = term.size();
        (0..h).any(|y| (0..w).any(|x| term.cell(x, y).is_some_and(|c| c.fg == Some(color))))
    }

    fn row_text(term: &Terminal, y: u16) -> String {
        (0..term.size().0).filter_map(|x| term.cell(x, y)).map(|c| c.ch).collect()
    }

    #[test]
    fn facing_marker_is_drawn_and_hidden_one_is_not() {
        let now = Utc::now();
        let mut scene = SceneOrchestrator::new(SceneConfig::default(), None, Some(1));
        let front = scene.camera().to_world(Vec3::Z);
        let (lat, lng) = geo::unproject(front);
        let back_lng = if lng > 0.0 { lng - 180.0 } else { lng + 180.0 };
        let events = vec![event("front", lat, lng, true), event("back", -lat, back_lng, false)];
        scene.sync(&events, now);
        let frame = scene.tick(now);

        let mut term = Terminal::headless(60, 24);
        let mut view = View::new(60, 24);
        view.render(&mut term, &scene, &frame, &Overlay::default(), ColorState::new(2));

        assert_eq!(term.cell(30, 12).and_then(|c| c.fg), Some(Color::Green));
        assert!(!has_fg(&term, Color::Red));
    }

    #[test]
    fn overlay_shows_stats_status_and_selection() {
        let now = Utc::now();
        let events = vec![event("a", 64.1, -21.9, true)];
        let mut scene = SceneOrchestrator::new(SceneConfig::default(), None, Some(1));
        scene.sync(&events, now);
        scene.select_next();
        let frame = scene.tick(now);
        let overlay = Overlay {
            stats: Stats::from_events(&events),
            stale: true,
            last_error: Some("request timed out".into()),
            selected: scene.selected_event(),
            ..Overlay::default()
        };

        let mut term = Terminal::headless(80, 24);
        View::new(80, 24).render(&mut term, &scene, &frame, &overlay, ColorState::default());

        assert!(row_text(&term, 0).contains("REQUESTS  1"));
        assert!(row_text(&term, 0).contains("STALE request timed out"));
        assert!(row_text(&term, 23).contains("Reykjavik, IS  ok  321ms"));
    }

    #[test]
    fn help_overlay_is_drawn_on_request() {
        let scene = SceneOrchestrator::new(SceneConfig::default(), None, Some(1));
        let frame = Frame { markers: Vec::new(), sun: crate::scene::SunLight::at(Utc::now()), time: 0.0 };
        let overlay = Overlay { show_help: true, ..Overlay::default() };
        let mut term = Terminal::headless(80, 30);
        View::new(80, 30).render(&mut term, &scene, &frame, &overlay, ColorState::default());
        assert!((0..30).any(|y| row_text(&term, y).contains("Reset camera")));
    }

    #[test]
    fn detail_line_falls_back_to_coordinates() {
        let mut e = event("x", 10.0, 20.0, false);
        e.geo.city.clear();
        e.geo.country.clear();
        e.prompt_summary.clear();
        assert_eq!(detail_line(&e), "▸ 10.0, 20.0  failed  321ms");
    }
}
