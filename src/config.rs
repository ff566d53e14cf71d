//! Application configuration. Loaded from `config.ron` at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::AppError;

pub const RAIN_INTENSITY_RANGE: (f32, f32) = (0.0, 2.0);
pub const TIME_OF_DAY_RANGE: (f32, f32) = (0.5, 1.5);

/// Startup settings. Every field has a default so partial files are accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,
    /// Seed for scene generation and rain respawn.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Frames spent in each phase.
    #[serde(default = "default_phase_duration")]
    pub phase_duration: u32,
    /// Frames of the entry and exit blend windows. Must be under half of `phase_duration`.
    #[serde(default = "default_transition_duration")]
    pub transition_duration: u32,
    #[serde(default = "default_rain_drops")]
    pub rain_drops: usize,
    #[serde(default = "default_tree_count")]
    pub tree_count: usize,
    #[serde(default = "default_one")]
    pub rain_intensity: f32,
    #[serde(default = "default_one")]
    pub time_of_day: f32,
    #[serde(default = "default_true")]
    pub auto_advance: bool,
    #[serde(default)]
    pub manual_camera: bool,
    /// Equirectangular sky image. Absent means a flat background.
    #[serde(default)]
    pub background_image: Option<PathBuf>,
    /// Leaf texture. Absent means flat-colour canopies.
    #[serde(default)]
    pub leaf_texture: Option<PathBuf>,
    /// Edge length of the generated texture maps.
    #[serde(default = "default_texture_size")]
    pub texture_size: u32,
}

fn default_window_width() -> u32 {
    1280
}
fn default_window_height() -> u32 {
    720
}
fn default_seed() -> u64 {
    1984
}
fn default_phase_duration() -> u32 {
    800
}
fn default_transition_duration() -> u32 {
    180
}
fn default_rain_drops() -> usize {
    600
}
fn default_tree_count() -> usize {
    60
}
fn default_one() -> f32 {
    1.0
}
fn default_true() -> bool {
    true
}
fn default_texture_size() -> u32 {
    128
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            window_width: default_window_width(),
            window_height: default_window_height(),
            seed: default_seed(),
            phase_duration: default_phase_duration(),
            transition_duration: default_transition_duration(),
            rain_drops: default_rain_drops(),
            tree_count: default_tree_count(),
            rain_intensity: default_one(),
            time_of_day: default_one(),
            auto_advance: default_true(),
            manual_camera: false,
            background_image: None,
            leaf_texture: None,
            texture_size: default_texture_size(),
        }
    }
}

impl AppConfig {
    /// Load config from `config.ron`. If the file is missing or invalid, returns default config.
    pub fn load() -> Self {
        let path = config_path();
        match std::fs::read_to_string(&path) {
            Ok(data) => match Self::parse(&data) {
                Ok(c) => {
                    log::info!("Loaded config from {:?}", path);
                    return c.validated();
                }
                Err(e) => log::warn!("Invalid config at {:?}: {}, using defaults", path, e),
            },
            Err(_) => log::debug!("No config at {:?}, using defaults", path),
        }
        Self::default()
    }

    pub fn parse(data: &str) -> Result<Self, AppError> {
        Ok(ron::from_str(data)?)
    }

    /// Clamps out-of-range values and repairs an overlapping transition window.
    pub fn validated(mut self) -> Self {
        let overlapping = self
            .transition_duration
            .checked_mul(2)
            .map_or(true, |window| window >= self.phase_duration);
        if overlapping {
            log::warn!(
                "transition_duration {} overlaps phase_duration {}, using {}/{}",
                self.transition_duration,
                self.phase_duration,
                default_transition_duration(),
                default_phase_duration()
            );
            self.phase_duration = default_phase_duration();
            self.transition_duration = default_transition_duration();
        }
        self.rain_intensity = self
            .rain_intensity
            .clamp(RAIN_INTENSITY_RANGE.0, RAIN_INTENSITY_RANGE.1);
        self.time_of_day = self
            .time_of_day
            .clamp(TIME_OF_DAY_RANGE.0, TIME_OF_DAY_RANGE.1);
        self.window_width = self.window_width.max(1);
        self.window_height = self.window_height.max(1);
        self
    }

    pub fn background_path(&self) -> Option<&Path> {
        self.background_image.as_deref()
    }

    pub fn leaf_path(&self) -> Option<&Path> {
        self.leaf_texture.as_deref()
    }
}

fn config_path() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("config.ron")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_falls_back_per_field() {
        let config = AppConfig::parse("(seed: 7, tree_count: 12)").unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.tree_count, 12);
        assert_eq!(config.phase_duration, 800);
        assert!(config.auto_advance);
        assert!(config.background_image.is_none());
    }

    #[test]
    fn overlapping_transition_is_repaired() {
        let config = AppConfig {
            phase_duration: 300,
            transition_duration: 150,
            ..AppConfig::default()
        }
        .validated();
        assert_eq!(config.phase_duration, 800);
        assert_eq!(config.transition_duration, 180);
    }

    #[test]
    fn huge_transition_is_repaired_without_overflow() {
        let config = AppConfig::parse("(phase_duration: 800, transition_duration: 3000000000)")
            .unwrap()
            .validated();
        assert_eq!(config.phase_duration, 800);
        assert_eq!(config.transition_duration, 180);
    }

    #[test]
    fn slider_values_are_clamped() {
        let config = AppConfig {
            rain_intensity: 9.0,
            time_of_day: 0.1,
            ..AppConfig::default()
        }
        .validated();
        assert_eq!(config.rain_intensity, 2.0);
        assert_eq!(config.time_of_day, 0.5);
    }

    #[test]
    fn shipped_config_matches_defaults() {
        let shipped = AppConfig::parse(include_str!("../config.ron")).unwrap();
        let defaults = AppConfig::default();
        assert_eq!(shipped.seed, defaults.seed);
        assert_eq!(shipped.rain_drops, defaults.rain_drops);
        assert_eq!(shipped.transition_duration, defaults.transition_duration);
        assert_eq!(shipped.texture_size, defaults.texture_size);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(matches!(AppConfig::parse("(seed: \"x\""), Err(AppError::Config(_))));
    }
}
