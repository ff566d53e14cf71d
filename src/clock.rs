//! Phase/transition clock.
//!
//! Frame-counted state machine: which phase is active, how long it has been
//! active, how far the current boundary blend has progressed, and how far the
//! wireframe reveal of phase 0 has grown.

use crate::math::{ease_in_out_cubic, normalize};
use crate::phase::Phase;

pub const DEFAULT_PHASE_DURATION: u32 = 800;
pub const DEFAULT_TRANSITION_DURATION: u32 = 180;

const REVEAL_SPEED: f32 = 0.008;
const TREE_REVEAL_SPEEDUP: f32 = 1.2;
/// Building reveal that must be reached before trees start growing.
const TREE_REVEAL_START: f32 = 0.3;
const REVEAL_SNAP: f32 = 0.995;
const PROGRESS_SNAP: f32 = 0.01;
/// Exit progress of the last phase at which the next wireframe reveal is re-armed.
const REVEAL_PREARM: f32 = 0.9;

/// Which part of the phase the timer is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Entering,
    Steady,
    Exiting,
}

#[derive(Debug, Clone)]
pub struct PhaseClock {
    phase: Phase,
    timer: u32,
    progress: f32,
    building_reveal: f32,
    tree_reveal: f32,
    phase_duration: u32,
    transition_duration: u32,
    reveal_resets: u32,
}

impl Default for PhaseClock {
    fn default() -> Self {
        Self::new(DEFAULT_PHASE_DURATION, DEFAULT_TRANSITION_DURATION)
    }
}

impl PhaseClock {
    /// `transition_duration` must be under half of `phase_duration`; `AppConfig::validated` enforces it.
    pub fn new(phase_duration: u32, transition_duration: u32) -> Self {
        debug_assert!(transition_duration.saturating_mul(2) < phase_duration);
        Self {
            phase: Phase::Wireframe,
            timer: 0,
            progress: 0.0,
            building_reveal: 0.0,
            tree_reveal: 0.0,
            phase_duration,
            transition_duration,
            reveal_resets: 0,
        }
    }

    /// Advance one frame of auto-advance timing.
    pub fn tick(&mut self) {
        self.timer += 1;
        if self.timer >= self.phase_duration {
            self.timer = 0;
            self.phase = self.phase.next();
            log::info!("Phase -> {}", self.phase.info().label);
            if self.phase == Phase::Wireframe {
                self.reset_reveal();
            }
        }

        self.progress = self.compute_progress();
        self.advance_reveal();

        if self.phase == Phase::PhysicallyBased
            && self.window() == Window::Exiting
            && self.progress > REVEAL_PREARM
            && self.phase.next() == Phase::Wireframe
        {
            self.building_reveal = 0.0;
            self.tree_reveal = 0.0;
        }
    }

    /// Grow the wireframe reveal. No-op outside phase 0.
    pub fn advance_reveal(&mut self) {
        if self.phase != Phase::Wireframe {
            return;
        }
        self.building_reveal = approach(self.building_reveal, REVEAL_SPEED);
        if self.building_reveal > TREE_REVEAL_START {
            self.tree_reveal = approach(self.tree_reveal, REVEAL_SPEED * TREE_REVEAL_SPEEDUP);
        }
    }

    /// Jump `direction` phases, bypassing the timer.
    pub fn set_phase(&mut self, direction: i32) {
        self.phase = self.phase.offset(direction);
        self.timer = 0;
        self.progress = 0.0;
        if self.phase == Phase::Wireframe {
            self.reset_reveal();
        }
        log::info!("Phase set to {}", self.phase.info().label);
    }

    fn reset_reveal(&mut self) {
        self.building_reveal = 0.0;
        self.tree_reveal = 0.0;
        self.reveal_resets += 1;
        log::debug!("Reveal reset #{}", self.reveal_resets);
    }

    fn compute_progress(&self) -> f32 {
        let timer = self.timer as f32;
        let duration = self.phase_duration as f32;
        let transition_start = self.transition_start() as f32;
        let entry_end = self.transition_duration as f32;

        if timer > transition_start {
            // Never snapped down: the exit blend is non-zero from its first frame.
            let raw = ease_in_out_cubic(normalize(timer, transition_start, duration));
            if raw > 1.0 - PROGRESS_SNAP {
                1.0
            } else {
                raw
            }
        } else if timer < entry_end {
            let raw = 1.0 - ease_in_out_cubic(normalize(timer, 0.0, entry_end));
            if raw < PROGRESS_SNAP {
                0.0
            } else if raw > 1.0 - PROGRESS_SNAP {
                1.0
            } else {
                raw
            }
        } else {
            0.0
        }
    }

    pub fn window(&self) -> Window {
        if self.timer > self.transition_start() {
            Window::Exiting
        } else if self.timer < self.transition_duration && self.progress > 0.0 {
            Window::Entering
        } else {
            Window::Steady
        }
    }

    /// Blend towards the next phase; zero unless exiting.
    pub fn exit_progress(&self) -> f32 {
        match self.window() {
            Window::Exiting => self.progress,
            _ => 0.0,
        }
    }

    /// Residual presence of the previous phase; zero unless entering.
    pub fn entry_progress(&self) -> f32 {
        match self.window() {
            Window::Entering => self.progress,
            _ => 0.0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn next_phase(&self) -> Phase {
        self.phase.next()
    }

    pub fn previous_phase(&self) -> Phase {
        self.phase.offset(-1)
    }

    #[cfg(test)]
    pub fn timer(&self) -> u32 {
        self.timer
    }

    #[cfg(test)]
    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn building_reveal(&self) -> f32 {
        self.building_reveal
    }

    pub fn tree_reveal(&self) -> f32 {
        self.tree_reveal
    }

    pub fn phase_duration(&self) -> u32 {
        self.phase_duration
    }

    pub fn transition_start(&self) -> u32 {
        self.phase_duration - self.transition_duration
    }

    /// `timer / phase_duration`, for the progress bar.
    pub fn phase_fraction(&self) -> f32 {
        self.timer as f32 / self.phase_duration as f32
    }

    /// Number of hard reveal resets (entries into phase 0).
    #[cfg(test)]
    pub fn reveal_resets(&self) -> u32 {
        self.reveal_resets
    }
}

/// Asymptotic approach towards 1, snapped once close enough.
fn approach(value: f32, speed: f32) -> f32 {
    if value >= 1.0 {
        return 1.0;
    }
    let next = value + speed * (1.0 - value);
    if next > REVEAL_SNAP {
        1.0
    } else {
        next
    }
}
