//! Orbit camera: automatic slow orbit with hand-held wobble, or drag-driven.

use std::f32::consts::TAU;

use glam::{Mat4, Vec3};

pub const DISTANCE_RANGE: (f32, f32) = (300.0, 1600.0);
pub const HEIGHT_RANGE: (f32, f32) = (40.0, 900.0);
const ORBIT_STEP: f32 = 0.001;
const DRAG_SENSITIVITY: f32 = 0.005;
const WHEEL_SENSITIVITY: f32 = 0.5;
const WOBBLE: f32 = 6.0;
const TARGET_BOB: f32 = 4.0;

#[derive(Debug, Clone)]
pub struct CameraController {
    azimuth: f32,
    distance: f32,
    height: f32,
    manual: bool,
    /// Frames since start; drives wobble and bob.
    frame: u64,
    pub fov_degrees: f32,
    pub aspect: f32,
}

impl Default for CameraController {
    fn default() -> Self {
        Self {
            azimuth: 0.0,
            distance: 900.0,
            height: 320.0,
            manual: false,
            frame: 0,
            fov_degrees: 55.0,
            aspect: 16.0 / 9.0,
        }
    }
}

impl CameraController {
    /// Advance one frame. Orbits on its own unless in manual mode.
    pub fn update(&mut self) {
        self.frame += 1;
        if !self.manual {
            self.azimuth = (self.azimuth + ORBIT_STEP).rem_euclid(TAU);
        }
    }

    /// Horizontal drag in pixels. Ignored unless manual.
    pub fn drag(&mut self, dx: f32) {
        if self.manual {
            self.azimuth = (self.azimuth + dx * DRAG_SENSITIVITY).rem_euclid(TAU);
        }
    }

    /// Wheel delta. Ignored unless manual.
    pub fn wheel(&mut self, delta: f32) {
        if self.manual {
            self.set_distance(self.distance + delta * WHEEL_SENSITIVITY);
        }
    }

    pub fn set_manual(&mut self, manual: bool) {
        self.manual = manual;
    }

    pub fn set_distance(&mut self, distance: f32) {
        self.distance = distance.clamp(DISTANCE_RANGE.0, DISTANCE_RANGE.1);
    }

    pub fn set_height(&mut self, height: f32) {
        self.height = height.clamp(HEIGHT_RANGE.0, HEIGHT_RANGE.1);
    }

    pub fn set_aspect(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    pub fn eye(&self) -> Vec3 {
        let base = Vec3::new(
            self.azimuth.sin() * self.distance,
            self.height,
            self.azimuth.cos() * self.distance,
        );
        if self.manual {
            return base;
        }
        let t = self.frame as f32;
        base + Vec3::new(
            (t * 0.011).sin() * WOBBLE,
            (t * 0.017).sin() * WOBBLE * 0.5,
            (t * 0.013).cos() * WOBBLE,
        )
    }

    /// Scene centre with a slow vertical bob.
    pub fn target(&self) -> Vec3 {
        Vec3::new(0.0, 40.0 + (self.frame as f32 * 0.008).sin() * TARGET_BOB, 0.0)
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), self.target(), Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_degrees.to_radians(), self.aspect, 1.0, 8000.0)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    pub fn azimuth(&self) -> f32 {
        self.azimuth
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn is_manual(&self) -> bool {
        self.manual
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn auto_orbit_advances_azimuth() {
        let mut camera = CameraController::default();
        for _ in 0..100 {
            camera.update();
        }
        assert_relative_eq!(camera.azimuth(), 0.1, epsilon = 1e-5);
    }

    #[test]
    fn drag_only_steers_in_manual_mode() {
        let mut camera = CameraController::default();
        camera.drag(100.0);
        assert_eq!(camera.azimuth(), 0.0);

        camera.set_manual(true);
        camera.drag(100.0);
        assert_relative_eq!(camera.azimuth(), 0.5);
        camera.update();
        assert_relative_eq!(camera.azimuth(), 0.5);
    }

    #[test]
    fn azimuth_stays_within_one_turn() {
        let mut camera = CameraController::default();
        for _ in 0..10_000 {
            camera.update();
        }
        assert!(camera.azimuth() >= 0.0 && camera.azimuth() < TAU);
        assert_relative_eq!(camera.azimuth(), 10.0 - TAU, epsilon = 1e-2);

        camera.set_manual(true);
        let before = camera.azimuth();
        camera.drag(-2000.0);
        assert!(camera.azimuth() >= 0.0 && camera.azimuth() < TAU);
        assert_relative_eq!(camera.azimuth(), (before - 10.0).rem_euclid(TAU), epsilon = 1e-3);
    }

    #[test]
    fn manual_mode_has_no_wobble() {
        let mut camera = CameraController::default();
        camera.set_manual(true);
        for _ in 0..37 {
            camera.update();
        }
        let eye = camera.eye();
        assert_relative_eq!(eye.y, camera.height());
        assert_relative_eq!(eye.length_squared(), camera.distance().powi(2) + camera.height().powi(2), max_relative = 1e-5);
    }

    #[test]
    fn distance_and_height_are_clamped() {
        let mut camera = CameraController::default();
        camera.set_distance(1.0);
        camera.set_height(1e6);
        assert_eq!(camera.distance(), DISTANCE_RANGE.0);
        assert_eq!(camera.height(), HEIGHT_RANGE.1);

        camera.set_manual(true);
        camera.wheel(1e6);
        assert_eq!(camera.distance(), DISTANCE_RANGE.1);
    }

    #[test]
    fn wheel_is_ignored_when_orbiting() {
        let mut camera = CameraController::default();
        let before = camera.distance();
        camera.wheel(200.0);
        assert_eq!(camera.distance(), before);
    }
}
