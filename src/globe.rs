//! Interactive terminal globe fed by the activity log poller

use crate::colors::ColorState;
use crate::config::GlobeConfig;
use crate::poller::{HttpLogSource, LogPoller};
use crate::scene::SceneOrchestrator;
use crate::stats::Stats;
use crate::terminal::Terminal;
use crate::view::{Overlay, View};
use chrono::Utc;
use crossterm::event::{KeyCode, KeyModifiers};
use std::io;
use std::time::Instant;
use tracing::info;

/// Orbit step per key press, radians
const ORBIT_STEP: f32 = 0.08;
const ZOOM_STEP: f32 = 1.2;

/// Keyboard-driven view state
#[derive(Debug, Clone, Copy)]
pub struct Controls {
    /// Seconds per frame
    pub speed: f32,
    pub paused: bool,
    pub show_help: bool,
    pub colors: ColorState,
}

impl Controls {
    pub fn new(speed: f32, scheme: u8) -> Self {
        Self { speed, paused: false, show_help: false, colors: ColorState::new(scheme) }
    }

    /// Apply one key press. Returns true when the viewer should quit.
    pub fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers, scene: &mut SceneOrchestrator) -> bool {
        if self.colors.handle_key(code) {
            return false;
        }
        match code {
            KeyCode::Tab => {
                scene.select_next();
                return false;
            }
            KeyCode::BackTab => {
                scene.select_previous();
                return false;
            }
            _ => {}
        }
        let camera = scene.camera_mut();
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => return true,
            KeyCode::Char('?') => self.show_help = !self.show_help,
            KeyCode::Char(' ') => self.paused = !self.paused,
            KeyCode::Left | KeyCode::Char('h') => camera.orbit(-ORBIT_STEP, 0.0),
            KeyCode::Right | KeyCode::Char('l') => camera.orbit(ORBIT_STEP, 0.0),
            KeyCode::Up | KeyCode::Char('k') => camera.orbit(0.0, ORBIT_STEP),
            KeyCode::Down | KeyCode::Char('j') => camera.orbit(0.0, -ORBIT_STEP),
            KeyCode::Char('+') | KeyCode::Char('=') => camera.zoom_by(ZOOM_STEP),
            KeyCode::Char('-') | KeyCode::Char('_') => camera.zoom_by(1.0 / ZOOM_STEP),
            KeyCode::Char('0') => camera.reset(),
            KeyCode::Char('r') => camera.auto_rotate = !camera.auto_rotate,
            KeyCode::Char(c @ '1'..='9') => {
                self.speed = match c {
                    '1' => 0.01,
                    '2' => 0.02,
                    '3' => 0.03,
                    '4' => 0.05,
                    '5' => 0.07,
                    '6' => 0.1,
                    '7' => 0.15,
                    '8' => 0.2,
                    _ => 0.3,
                };
            }
            _ => {}
        }
        false
    }
}

/// Run the viewer until q/Esc
pub fn run(config: GlobeConfig) -> io::Result<()> {
    info!(url = %config.url, poll_ms = config.scene.poll_interval.as_millis() as u64, "starting globe viewer");

    let source = HttpLogSource::new(
        config.url.clone(),
        config.scene.max_rendered_events,
        config.request_timeout,
    );
    let mut poller = LogPoller::spawn(source, config.scene.poll_interval)?;
    let mut scene = SceneOrchestrator::new(config.scene.clone(), config.texture.as_deref(), config.seed);
    let mut controls = Controls::new(config.time_step, config.color_scheme);

    let mut term = Terminal::new(true)?;
    let (mut prev_w, mut prev_h) = term.size();
    let mut view = View::new(prev_w, prev_h);
    let mut stats = Stats::default();
    let mut last_frame = Instant::now();

    loop {
        let (width, height) = crossterm::terminal::size().unwrap_or(term.size());
        if width != prev_w || height != prev_h {
            term.resize(width, height);
            term.clear_screen()?;
            prev_w = width;
            prev_h = height;
        }

        if let Some((code, mods)) = term.check_key()? {
            if controls.handle_key(code, mods, &mut scene) {
                break;
            }
        }

        if poller.poll() {
            let events = poller.state().events();
            scene.sync(events, Utc::now());
            stats = Stats::from_events(events);
        }

        let dt = last_frame.elapsed().as_secs_f32();
        last_frame = Instant::now();

        if controls.paused && !controls.show_help {
            term.sleep(0.1);
            continue;
        }
        if !controls.paused {
            let speed = scene.config().auto_rotate_speed;
            scene.camera_mut().advance(dt, speed);
        }

        let frame = scene.tick(Utc::now());
        let state = poller.state();
        let overlay = Overlay {
            stats,
            stale: state.is_stale(),
            last_error: state.last_error().map(|e| e.to_string()),
            selected: scene.selected_event(),
            paused: controls.paused,
            show_help: controls.show_help,
        };
        view.render(&mut term, &scene, &frame, &overlay, controls.colors);
        term.present()?;
        term.sleep(controls.speed);
    }

    poller.shutdown();
    info!("globe viewer closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneConfig;

    fn scene() -> SceneOrchestrator {
        SceneOrchestrator::new(SceneConfig::default(), None, Some(3))
    }

    #[test]
    fn quit_keys() {
        let mut scene = scene();
        let mut controls = Controls::new(0.05, 2);
        assert!(controls.handle_key(KeyCode::Char('q'), KeyModifiers::NONE, &mut scene));
        assert!(controls.handle_key(KeyCode::Esc, KeyModifiers::NONE, &mut scene));
        assert!(controls.handle_key(KeyCode::Char('c'), KeyModifiers::CONTROL, &mut scene));
        assert!(!controls.handle_key(KeyCode::Char('c'), KeyModifiers::NONE, &mut scene));
    }

    #[test]
    fn camera_keys_move_and_reset() {
        let mut scene = scene();
        let mut controls = Controls::new(0.05, 2);
        let start = *scene.camera();
        controls.handle_key(KeyCode::Right, KeyModifiers::NONE, &mut scene);
        controls.handle_key(KeyCode::Char('k'), KeyModifiers::NONE, &mut scene);
        controls.handle_key(KeyCode::Char('+'), KeyModifiers::NONE, &mut scene);
        assert_ne!(scene.camera().yaw, start.yaw);
        assert_ne!(scene.camera().pitch, start.pitch);
        assert!(scene.camera().zoom > 1.0);

        controls.handle_key(KeyCode::Char('0'), KeyModifiers::NONE, &mut scene);
        assert_eq!(scene.camera().zoom, 1.0);
        assert_eq!(scene.camera().yaw, start.yaw);

        controls.handle_key(KeyCode::Char('r'), KeyModifiers::NONE, &mut scene);
        assert_eq!(scene.camera().auto_rotate, !start.auto_rotate);
    }

    #[test]
    fn speed_scheme_pause_and_help() {
        let mut scene = scene();
        let mut controls = Controls::new(0.05, 2);
        controls.handle_key(KeyCode::Char('1'), KeyModifiers::NONE, &mut scene);
        assert_eq!(controls.speed, 0.01);
        controls.handle_key(KeyCode::Char('&'), KeyModifiers::SHIFT, &mut scene);
        assert!(controls.colors.is_mono());
        controls.handle_key(KeyCode::Char(' '), KeyModifiers::NONE, &mut scene);
        assert!(controls.paused);
        controls.handle_key(KeyCode::Char('?'), KeyModifiers::NONE, &mut scene);
        assert!(controls.show_help);
    }

    #[test]
    fn tab_cycles_selection() {
        let mut scene = scene();
        let now = Utc::now();
        let events: Vec<_> = ["a", "b"]
            .iter()
            .map(|id| crate::event::ActivityEvent {
                id: id.to_string(),
                timestamp: now,
                geo: crate::event::GeoLocation { lat: 1.0, lng: 2.0, city: "C".into(), country: "D".into() },
                success: true,
                latency_ms: 1,
                prompt_summary: String::new(),
            })
            .collect();
        scene.sync(&events, now);
        let mut controls = Controls::new(0.05, 2);
        controls.handle_key(KeyCode::BackTab, KeyModifiers::SHIFT, &mut scene);
        assert_eq!(scene.selected_event().map(|e| e.id.as_str()), Some("b"));
        controls.handle_key(KeyCode::Tab, KeyModifiers::NONE, &mut scene);
        assert_eq!(scene.selected_event().map(|e| e.id.as_str()), Some("a"));
    }
}
