//! Storm lightning: an idle/flashing flicker, only in the physically based phase.

use rand::Rng;

use crate::phase::Phase;

/// Chance per idle frame that a strike starts.
const STRIKE_CHANCE: f32 = 0.004;
const FLASH_FRAMES: u32 = 12;
const FLICKER_RATE: f32 = 1.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lightning {
    #[default]
    Idle,
    Flashing {
        remaining: u32,
    },
}

impl Lightning {
    pub fn update<R: Rng>(&mut self, phase: Phase, rng: &mut R) {
        let roll = rng.gen::<f32>();
        self.step(phase, roll);
    }

    fn step(&mut self, phase: Phase, roll: f32) {
        if phase < Phase::PhysicallyBased {
            *self = Lightning::Idle;
            return;
        }
        *self = match *self {
            Lightning::Idle if roll < STRIKE_CHANCE => {
                log::trace!("Lightning strike");
                Lightning::Flashing {
                    remaining: FLASH_FRAMES,
                }
            }
            Lightning::Idle => Lightning::Idle,
            Lightning::Flashing { remaining } if remaining <= 1 => Lightning::Idle,
            Lightning::Flashing { remaining } => Lightning::Flashing {
                remaining: remaining - 1,
            },
        };
    }

    /// Flicker strength in `[0, 1]`; zero while idle.
    pub fn intensity(&self) -> f32 {
        match *self {
            Lightning::Idle => 0.0,
            Lightning::Flashing { remaining } => (remaining as f32 * FLICKER_RATE).sin().abs(),
        }
    }

    pub fn is_flashing(&self) -> bool {
        matches!(self, Lightning::Flashing { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_flashes_before_the_last_phase() {
        let mut bolt = Lightning::default();
        for phase in &Phase::ALL[..4] {
            for _ in 0..100 {
                bolt.step(*phase, 0.0);
                assert!(!bolt.is_flashing());
            }
        }
    }

    #[test]
    fn flash_counts_down_then_returns_to_idle() {
        let mut bolt = Lightning::default();
        bolt.step(Phase::PhysicallyBased, 0.0);
        assert_eq!(bolt, Lightning::Flashing { remaining: FLASH_FRAMES });
        for _ in 0..FLASH_FRAMES - 1 {
            let i = bolt.intensity();
            assert!((0.0..=1.0).contains(&i));
            bolt.step(Phase::PhysicallyBased, 0.0);
            assert!(bolt.is_flashing());
        }
        bolt.step(Phase::PhysicallyBased, 0.0);
        assert_eq!(bolt, Lightning::Idle);
        assert_eq!(bolt.intensity(), 0.0);
    }

    #[test]
    fn idle_stays_idle_on_a_high_roll() {
        let mut bolt = Lightning::default();
        bolt.step(Phase::PhysicallyBased, 0.5);
        assert_eq!(bolt, Lightning::Idle);
    }

    #[test]
    fn leaving_the_phase_cancels_a_flash() {
        let mut bolt = Lightning::Flashing { remaining: 5 };
        bolt.step(Phase::Wireframe, 0.9);
        assert_eq!(bolt, Lightning::Idle);
    }
}
