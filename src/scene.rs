//! Scene geometry store: everything generated once at startup.

use glam::{Vec2, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Road lines per axis.
pub const GRID_LINES: usize = 7;
pub const ROAD_SPACING: f32 = 160.0;
pub const ROAD_WIDTH: f32 = 24.0;
/// Half the span of the road grid.
pub const GRID_EXTENT: f32 = ROAD_SPACING * (GRID_LINES - 1) as f32 / 2.0;
/// Extra clearance between a tree and a building footprint.
pub const BUILDING_BUFFER: f32 = 12.0;
pub const CANOPY_LAYERS: usize = 6;

const TREE_ATTEMPTS: usize = 60;
const TREE_SCATTER: f32 = GRID_EXTENT + 60.0;
const LOT_MARGIN: f32 = 8.0;
const LOT_CHANCE: f64 = 0.7;

#[derive(Debug, Clone, PartialEq)]
pub struct Building {
    /// Centre of the box; `y` is half the height so the base sits on the ground.
    pub position: Vec3,
    pub width: f32,
    pub height: f32,
    pub depth: f32,
}

impl Building {
    pub fn new(x: f32, z: f32, width: f32, height: f32, depth: f32) -> Self {
        Self {
            position: Vec3::new(x, height / 2.0, z),
            width,
            height,
            depth,
        }
    }

    pub fn size(&self) -> Vec3 {
        Vec3::new(self.width, self.height, self.depth)
    }

    pub fn footprint(&self) -> Vec2 {
        Vec2::new(self.position.x, self.position.z)
    }

    /// Phase offset of the idle sway, derived from the footprint position.
    pub fn sway_offset(&self) -> f32 {
        (self.position.x + self.position.z) * 0.01
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Runs along x at a fixed z.
    Horizontal,
    /// Runs along z at a fixed x.
    Vertical,
}

/// A straight stretch of road between two ground-plane points (x, z).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoadSegment {
    pub start: Vec2,
    pub end: Vec2,
    pub width: f32,
    pub orientation: Orientation,
}

impl RoadSegment {
    pub fn center(&self) -> Vec2 {
        (self.start + self.end) * 0.5
    }

    pub fn length(&self) -> f32 {
        self.start.distance(self.end)
    }
}

/// Axis-aligned patch where two roads cross.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    pub min: Vec2,
    pub max: Vec2,
}

impl Intersection {
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RoadPiece {
    Straight(RoadSegment),
    Intersection(Intersection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeKind {
    Pine,
    Deciduous,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    /// Ground-plane position (x, z).
    pub position: Vec2,
    pub height: f32,
    pub trunk_height: f32,
    pub trunk_width: f32,
    pub canopy_size: f32,
    pub sway_offset: f32,
    pub kind: TreeKind,
    /// Per-layer tint jitter used by the physically based phase.
    pub layer_jitter: [f32; CANOPY_LAYERS],
}

/// Represents the entire city: read-only once generated.
#[derive(Debug, Default)]
pub struct Scene {
    buildings: Vec<Building>,
    roads: Vec<RoadPiece>,
    trees: Vec<Tree>,
}

impl Scene {
    /// Generate the city from `seed`. The same seed always yields the same city.
    pub fn generate(seed: u64, tree_count: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let buildings = generate_buildings(&mut rng);
        let roads = generate_roads();
        let trees = place_trees(&mut rng, &buildings, tree_count);
        log::info!(
            "Generated {} buildings, {} road pieces, {}/{} trees",
            buildings.len(),
            roads.len(),
            trees.len(),
            tree_count
        );
        Self {
            buildings,
            roads,
            trees,
        }
    }

    pub fn buildings(&self) -> &[Building] {
        &self.buildings
    }

    pub fn roads(&self) -> &[RoadPiece] {
        &self.roads
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    pub fn intersections(&self) -> impl Iterator<Item = &Intersection> {
        self.roads().iter().filter_map(|piece| match piece {
            RoadPiece::Intersection(i) => Some(i),
            RoadPiece::Straight(_) => None,
        })
    }

    pub fn straight_roads(&self) -> impl Iterator<Item = &RoadSegment> {
        self.roads().iter().filter_map(|piece| match piece {
            RoadPiece::Straight(s) => Some(s),
            RoadPiece::Intersection(_) => None,
        })
    }
}

fn grid_line(i: usize) -> f32 {
    -GRID_EXTENT + i as f32 * ROAD_SPACING
}

/// Up to four buildings per block, taller towards the centre of the city.
fn generate_buildings(rng: &mut StdRng) -> Vec<Building> {
    let mut buildings = Vec::new();
    let block = ROAD_SPACING - ROAD_WIDTH - 2.0 * LOT_MARGIN;
    let lot = block / 2.0;
    for bx in 0..GRID_LINES - 1 {
        for bz in 0..GRID_LINES - 1 {
            let origin_x = grid_line(bx) + ROAD_WIDTH / 2.0 + LOT_MARGIN;
            let origin_z = grid_line(bz) + ROAD_WIDTH / 2.0 + LOT_MARGIN;
            for lx in 0..2 {
                for lz in 0..2 {
                    if !rng.gen_bool(LOT_CHANCE) {
                        continue;
                    }
                    let width = rng.gen_range(30.0..lot - 6.0);
                    let depth = rng.gen_range(30.0..lot - 6.0);
                    let slack_x = (lot - width) / 2.0;
                    let slack_z = (lot - depth) / 2.0;
                    let x = origin_x + lot * (lx as f32 + 0.5) + rng.gen_range(-slack_x..=slack_x);
                    let z = origin_z + lot * (lz as f32 + 0.5) + rng.gen_range(-slack_z..=slack_z);
                    let centrality = 1.0 - (Vec2::new(x, z).length() / (GRID_EXTENT * 1.5)).min(1.0);
                    let height = rng.gen_range(60.0_f32..160.0) + centrality * rng.gen_range(60.0..200.0);
                    buildings.push(Building::new(x, z, width, height, depth));
                }
            }
        }
    }
    buildings
}

/// Full-length roads on every grid line, plus one patch per crossing pair.
fn generate_roads() -> Vec<RoadPiece> {
    let mut horizontal = Vec::with_capacity(GRID_LINES);
    let mut vertical = Vec::with_capacity(GRID_LINES);
    for i in 0..GRID_LINES {
        let c = grid_line(i);
        horizontal.push(RoadSegment {
            start: Vec2::new(-GRID_EXTENT, c),
            end: Vec2::new(GRID_EXTENT, c),
            width: ROAD_WIDTH,
            orientation: Orientation::Horizontal,
        });
        vertical.push(RoadSegment {
            start: Vec2::new(c, -GRID_EXTENT),
            end: Vec2::new(c, GRID_EXTENT),
            width: ROAD_WIDTH,
            orientation: Orientation::Vertical,
        });
    }

    let intersections = find_intersections(&horizontal, &vertical);
    horizontal
        .into_iter()
        .chain(vertical)
        .map(RoadPiece::Straight)
        .chain(intersections.into_iter().map(RoadPiece::Intersection))
        .collect()
}

/// Pairs whose coordinates fall within half a road width of each other's span.
pub fn find_intersections(horizontal: &[RoadSegment], vertical: &[RoadSegment]) -> Vec<Intersection> {
    let mut out = Vec::new();
    for h in horizontal {
        let z = h.start.y;
        let (h_min, h_max) = (h.start.x.min(h.end.x), h.start.x.max(h.end.x));
        for v in vertical {
            let x = v.start.x;
            let (v_min, v_max) = (v.start.y.min(v.end.y), v.start.y.max(v.end.y));
            let half = h.width.max(v.width) / 2.0;
            let crosses_h = x >= h_min - half && x <= h_max + half;
            let crosses_v = z >= v_min - half && z <= v_max + half;
            if crosses_h && crosses_v {
                out.push(Intersection {
                    min: Vec2::new(x - v.width / 2.0, z - h.width / 2.0),
                    max: Vec2::new(x + v.width / 2.0, z + h.width / 2.0),
                });
            }
        }
    }
    out
}

/// Rejection-sample tree positions clear of buildings and roads.
fn place_trees(rng: &mut StdRng, buildings: &[Building], count: usize) -> Vec<Tree> {
    let mut trees = Vec::with_capacity(count);
    let mut dropped = 0;
    for _ in 0..count {
        let spot = (0..TREE_ATTEMPTS).find_map(|_| {
            let candidate = Vec2::new(
                rng.gen_range(-TREE_SCATTER..TREE_SCATTER),
                rng.gen_range(-TREE_SCATTER..TREE_SCATTER),
            );
            (clear_of_buildings(candidate, buildings) && clear_of_roads(candidate)).then_some(candidate)
        });
        let Some(position) = spot else {
            dropped += 1;
            continue;
        };

        let height = rng.gen_range(30.0..70.0);
        let mut layer_jitter = [0.0; CANOPY_LAYERS];
        for j in layer_jitter.iter_mut() {
            *j = rng.gen_range(-0.08..0.08);
        }
        trees.push(Tree {
            position,
            height,
            trunk_height: height * 0.35,
            trunk_width: rng.gen_range(3.0..6.0),
            canopy_size: rng.gen_range(14.0..26.0),
            sway_offset: rng.gen_range(0.0..std::f32::consts::TAU),
            kind: if rng.gen_bool(0.5) {
                TreeKind::Pine
            } else {
                TreeKind::Deciduous
            },
            layer_jitter,
        });
    }
    if dropped > 0 {
        log::debug!("Dropped {} trees after {} attempts each", dropped, TREE_ATTEMPTS);
    }
    trees
}

pub fn clear_of_buildings(point: Vec2, buildings: &[Building]) -> bool {
    buildings
        .iter()
        .all(|b| point.distance(b.footprint()) > b.width / 2.0 + BUILDING_BUFFER)
}

fn clear_of_roads(point: Vec2) -> bool {
    let clearance = ROAD_WIDTH / 2.0 + 4.0;
    (0..GRID_LINES).all(|i| {
        let c = grid_line(i);
        (point.x - c).abs() > clearance && (point.y - c).abs() > clearance
    })
}
