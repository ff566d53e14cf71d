//! Simulation state: the one owner of everything that changes between frames.
//!
//! Input handlers and the frame loop run on the same event-loop thread, so
//! setters here are plain `&mut self` methods and never interleave with an
//! update or a draw.

use std::fmt;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::camera::CameraController;
use crate::clock::PhaseClock;
use crate::config::{AppConfig, RAIN_INTENSITY_RANGE, TIME_OF_DAY_RANGE};
use crate::lightning::Lightning;
use crate::phase::{StyleTable, PHASE_COUNT};
use crate::rain::Rain;
use crate::style::{self, EffectiveStyle, Modifiers};

#[derive(Debug)]
pub struct Simulation {
    pub clock: PhaseClock,
    pub camera: CameraController,
    pub rain: Rain,
    pub lightning: Lightning,
    auto_advance: bool,
    rain_intensity: f32,
    time_of_day: f32,
    frame: u64,
    rng: StdRng,
}

impl Simulation {
    pub fn new(config: &AppConfig) -> Self {
        // Offset from the scene seed so rain does not mirror the city layout.
        let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(0x5eed));
        let rain = Rain::new(config.rain_drops, &mut rng);
        let mut camera = CameraController::default();
        camera.set_manual(config.manual_camera);
        camera.set_aspect(config.window_width, config.window_height);
        Self {
            clock: PhaseClock::new(config.phase_duration, config.transition_duration),
            camera,
            rain,
            lightning: Lightning::default(),
            auto_advance: config.auto_advance,
            rain_intensity: config
                .rain_intensity
                .clamp(RAIN_INTENSITY_RANGE.0, RAIN_INTENSITY_RANGE.1),
            time_of_day: config
                .time_of_day
                .clamp(TIME_OF_DAY_RANGE.0, TIME_OF_DAY_RANGE.1),
            frame: 0,
            rng,
        }
    }

    /// One fixed simulation step. Runs strictly before the frame is composed.
    pub fn update(&mut self) {
        if self.auto_advance {
            self.clock.tick();
        } else {
            self.clock.advance_reveal();
        }
        self.camera.update();
        let phase = self.clock.phase();
        self.rain.update(phase, &mut self.rng);
        self.lightning.update(phase, &mut self.rng);
        self.frame += 1;
    }

    /// Style for this frame, resolved from the clock and the global modifiers.
    pub fn effective_style(&self, table: &StyleTable) -> EffectiveStyle {
        style::resolve(
            table,
            self.clock.phase(),
            self.clock.exit_progress(),
            self.modifiers(),
        )
    }

    pub fn modifiers(&self) -> Modifiers {
        Modifiers {
            time_of_day: self.time_of_day,
            rain_intensity: self.rain_intensity,
        }
    }

    pub fn next_phase(&mut self) {
        self.clock.set_phase(1);
    }

    pub fn prev_phase(&mut self) {
        self.clock.set_phase(-1);
    }

    pub fn set_auto_advance(&mut self, enabled: bool) {
        self.auto_advance = enabled;
        log::info!("Auto advance {}", if enabled { "on" } else { "off" });
    }

    pub fn set_manual_camera(&mut self, manual: bool) {
        self.camera.set_manual(manual);
        log::info!(
            "Camera {} at azimuth {:.2}, distance {:.0}",
            if manual { "manual" } else { "orbit" },
            self.camera.azimuth(),
            self.camera.distance()
        );
    }

    pub fn set_camera_distance(&mut self, distance: f32) {
        self.camera.set_distance(distance);
    }

    pub fn set_camera_height(&mut self, height: f32) {
        self.camera.set_height(height);
    }

    pub fn set_rain_intensity(&mut self, intensity: f32) {
        self.rain_intensity = intensity.clamp(RAIN_INTENSITY_RANGE.0, RAIN_INTENSITY_RANGE.1);
    }

    pub fn set_time_of_day(&mut self, time: f32) {
        self.time_of_day = time.clamp(TIME_OF_DAY_RANGE.0, TIME_OF_DAY_RANGE.1);
    }

    pub fn drag(&mut self, dx: f32) {
        self.camera.drag(dx);
    }

    pub fn wheel(&mut self, delta: f32) {
        self.camera.wheel(delta);
    }

    pub fn auto_advance(&self) -> bool {
        self.auto_advance
    }

    pub fn rain_intensity(&self) -> f32 {
        self.rain_intensity
    }

    pub fn time_of_day(&self) -> f32 {
        self.time_of_day
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn telemetry(&self) -> Telemetry {
        let phase = self.clock.phase();
        let info = phase.info();
        Telemetry {
            label: info.label,
            era: info.era,
            description: info.description,
            progress: self.clock.phase_fraction(),
            index: phase.index() + 1,
        }
    }
}

/// What the phase-info overlay shows each frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Telemetry {
    pub label: &'static str,
    pub era: &'static str,
    pub description: &'static str,
    /// `timer / phase_duration`.
    pub progress: f32,
    /// One-based phase number.
    pub index: usize,
}

impl Telemetry {
    /// "(index+1)/5".
    pub fn counter(&self) -> String {
        format!("{}/{}", self.index, PHASE_COUNT)
    }
}

impl fmt::Display for Telemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) | {} | {:>3.0}% | {}",
            self.label,
            self.era,
            self.counter(),
            self.progress * 100.0,
            self.description
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::Phase;

    fn sim() -> Simulation {
        Simulation::new(&AppConfig {
            rain_drops: 50,
            ..AppConfig::default()
        })
    }

    #[test]
    fn setters_clamp_silently() {
        let mut sim = sim();
        sim.set_rain_intensity(5.0);
        sim.set_time_of_day(-1.0);
        assert_eq!(sim.rain_intensity(), 2.0);
        assert_eq!(sim.time_of_day(), 0.5);
        sim.set_camera_distance(0.0);
        assert_eq!(sim.camera.distance(), crate::camera::DISTANCE_RANGE.0);
    }

    #[test]
    fn paused_clock_still_grows_the_reveal() {
        let mut sim = sim();
        sim.set_auto_advance(false);
        for _ in 0..50 {
            sim.update();
        }
        assert_eq!(sim.clock.timer(), 0);
        assert!(sim.clock.building_reveal() > 0.0);
        assert_eq!(sim.frame(), 50);
    }

    #[test]
    fn manual_navigation_wraps() {
        let mut sim = sim();
        sim.prev_phase();
        assert_eq!(sim.clock.phase(), Phase::PhysicallyBased);
        sim.next_phase();
        assert_eq!(sim.clock.phase(), Phase::Wireframe);
        assert_eq!(sim.clock.timer(), 0);
    }

    #[test]
    fn telemetry_reports_counter_and_progress() {
        let mut sim = sim();
        sim.next_phase();
        for _ in 0..200 {
            sim.update();
        }
        let t = sim.telemetry();
        assert_eq!(t.label, "Flat Shading");
        assert_eq!(t.counter(), "2/5");
        approx::assert_relative_eq!(t.progress, 0.25);
        let title = t.to_string();
        assert!(title.starts_with("Flat Shading (1980s) | 2/5"));
        assert!(title.ends_with(Phase::Flat.info().description));
    }

    #[test]
    fn time_of_day_reaches_the_resolved_style() {
        let table = StyleTable::new();
        let mut sim = sim();
        sim.next_phase();
        let base = sim.effective_style(&table).ambient.unwrap();
        sim.set_time_of_day(1.5);
        let bright = sim.effective_style(&table).ambient.unwrap();
        approx::assert_relative_eq!(bright.x, base.x * 1.5, epsilon = 1e-6);
    }
}
