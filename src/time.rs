//! Frame pacing for the simulation loop.

use std::time::{Duration, Instant};

/// Upper bound on catch-up steps per redraw, so a stall never snowballs.
const MAX_STEPS_PER_FRAME: u32 = 5;

/// Converts wall-clock redraws into fixed simulation steps.
#[derive(Debug)]
pub struct FramePacer {
    /// Time of the last frame.
    last_frame: Instant,
    /// Fixed timestep (default 60 Hz).
    step: Duration,
    /// Accumulated time not yet consumed by steps.
    accumulator: Duration,
    /// Steps run since start.
    steps: u64,
}

impl Default for FramePacer {
    fn default() -> Self {
        Self::new()
    }
}

impl FramePacer {
    pub fn new() -> Self {
        Self {
            last_frame: Instant::now(),
            step: Duration::from_secs_f64(1.0 / 60.0),
            accumulator: Duration::ZERO,
            steps: 0,
        }
    }

    /// Record a redraw and return how many fixed steps should run before drawing.
    pub fn frame(&mut self) -> u32 {
        let now = Instant::now();
        let delta = now - self.last_frame;
        self.last_frame = now;
        self.advance(delta)
    }

    /// Feed an explicit delta. Split out of [`FramePacer::frame`] for determinism in tests.
    pub fn advance(&mut self, delta: Duration) -> u32 {
        self.accumulator += delta;
        let mut steps = 0;
        while self.accumulator >= self.step && steps < MAX_STEPS_PER_FRAME {
            self.accumulator -= self.step;
            steps += 1;
        }
        if steps == MAX_STEPS_PER_FRAME {
            // Drop the backlog rather than fast-forward the animation.
            self.accumulator = Duration::ZERO;
        }
        self.steps += u64::from(steps);
        steps
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_step_per_sixtieth() {
        let mut pacer = FramePacer::new();
        assert_eq!(pacer.advance(Duration::from_millis(10)), 0);
        assert_eq!(pacer.advance(Duration::from_millis(10)), 1);
        assert_eq!(pacer.advance(Duration::from_millis(34)), 2);
        assert_eq!(pacer.steps(), 3);
    }

    #[test]
    fn long_stall_is_capped() {
        let mut pacer = FramePacer::new();
        assert_eq!(pacer.advance(Duration::from_secs(3)), MAX_STEPS_PER_FRAME);
        assert_eq!(pacer.advance(Duration::ZERO), 0);
    }
}
