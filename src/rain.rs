//! Rain: falling streaks and the puddle grid they feed.

use glam::{Vec2, Vec3};
use rand::Rng;

use crate::phase::Phase;
use crate::scene::GRID_EXTENT;

/// Drops below this height respawn above the city.
pub const GROUND_Y: f32 = 0.0;
pub const SPAWN_MIN: f32 = 250.0;
pub const SPAWN_MAX: f32 = 700.0;
const SCATTER: f32 = GRID_EXTENT + 120.0;
const PUDDLE_SPACING: f32 = 90.0;
const PUDDLE_JITTER: f32 = 25.0;
/// Fall speed and streak length multiplier in the heavy-rain phase.
const STORM_SCALE: f32 = 1.5;

#[derive(Debug, Clone, PartialEq)]
pub struct Raindrop {
    /// Head of the streak.
    pub position: Vec3,
    pub length: f32,
    pub speed: f32,
    pub thickness: f32,
}

impl Raindrop {
    fn spawn<R: Rng>(rng: &mut R, min_y: f32) -> Self {
        Self {
            position: Vec3::new(
                rng.gen_range(-SCATTER..SCATTER),
                rng.gen_range(min_y..SPAWN_MAX),
                rng.gen_range(-SCATTER..SCATTER),
            ),
            length: rng.gen_range(8.0..20.0),
            speed: rng.gen_range(4.0..10.0),
            thickness: rng.gen_range(0.5..1.5),
        }
    }

    fn respawn<R: Rng>(&mut self, rng: &mut R) {
        self.position = Vec3::new(
            rng.gen_range(-SCATTER..SCATTER),
            rng.gen_range(SPAWN_MIN..SPAWN_MAX),
            rng.gen_range(-SCATTER..SCATTER),
        );
    }
}

/// A puddle cell: fixed centre with jitter baked in at creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Puddle {
    pub center: Vec2,
    pub base_radius: f32,
    /// Offsets the ripple cycle so neighbouring puddles do not pulse in step.
    pub ripple_offset: f32,
}

#[derive(Debug, Clone)]
pub struct Rain {
    drops: Vec<Raindrop>,
    puddles: Vec<Puddle>,
}

impl Rain {
    /// `count` is fixed for the lifetime of the simulation.
    pub fn new<R: Rng>(count: usize, rng: &mut R) -> Self {
        let drops = (0..count).map(|_| Raindrop::spawn(&mut *rng, GROUND_Y)).collect();

        let cells = (2.0 * GRID_EXTENT / PUDDLE_SPACING) as i32;
        let mut puddles = Vec::with_capacity(((cells + 1) * (cells + 1)) as usize);
        for ix in 0..=cells {
            for iz in 0..=cells {
                let center = Vec2::new(
                    -GRID_EXTENT + ix as f32 * PUDDLE_SPACING + rng.gen_range(-PUDDLE_JITTER..PUDDLE_JITTER),
                    -GRID_EXTENT + iz as f32 * PUDDLE_SPACING + rng.gen_range(-PUDDLE_JITTER..PUDDLE_JITTER),
                );
                puddles.push(Puddle {
                    center,
                    base_radius: rng.gen_range(8.0..16.0),
                    ripple_offset: rng.gen_range(0.0..1.0),
                });
            }
        }
        log::debug!("Rain: {} drops, {} puddles", count, puddles.len());

        Self { drops, puddles }
    }

    /// Integrate one frame of falling; drops that reach the ground respawn above.
    pub fn update<R: Rng>(&mut self, phase: Phase, rng: &mut R) {
        let scale = phase_scale(phase);
        for drop in &mut self.drops {
            drop.position.y -= drop.speed * scale;
            if drop.position.y < GROUND_Y {
                drop.respawn(rng);
            }
        }
    }

    /// `floor(total × intensity)`, capped at the drop count.
    pub fn active_count(&self, intensity: f32) -> usize {
        let wanted = (self.drops.len() as f32 * intensity.max(0.0)).floor() as usize;
        wanted.min(self.drops.len())
    }

    pub fn drops(&self) -> &[Raindrop] {
        &self.drops
    }

    pub fn puddles(&self) -> &[Puddle] {
        &self.puddles
    }
}

/// Speed/streak multiplier for `phase`.
pub fn phase_scale(phase: Phase) -> f32 {
    if phase == Phase::AdvancedLit {
        STORM_SCALE
    } else {
        1.0
    }
}
