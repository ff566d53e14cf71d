//! Scene compositor.
//!
//! Turns the resolved style, the clock and the geometry store into a
//! [`DrawList`], layer by layer: sky, ground, roads, buildings, trees, rain, haze.

use glam::{Mat4, Quat, Vec2, Vec3};

use crate::assets::{Loaded, TextureSlot};
use crate::clock::PhaseClock;
use crate::draw::{
    DrawList, Fog, Layer, LineDraw, Outline, PositionedLight, Shape, SolidDraw, SurfaceParams,
};
use crate::field::NoiseField;
use crate::math::{ease_in_out_cubic, ease_out_quart, mix_vec3, normalize, Transform};
use crate::phase::{Phase, StyleTable};
use crate::rain;
use crate::scene::{
    Building, Orientation, Scene, Tree, TreeKind, CANOPY_LAYERS, GRID_EXTENT, ROAD_SPACING,
};
use crate::state::Simulation;
use crate::style::{EffectiveStyle, RenderMode};

const SKY_RADIUS: f32 = 3000.0;
const GROUND_SIZE: f32 = 2.0 * (GRID_EXTENT + 240.0);
const WIRE_GRID_SPACING: f32 = 80.0;
/// Noise above this marks a building's windows as lit.
const WINDOW_LIT_THRESHOLD: f32 = 0.7;
const WINDOW_WARM: Vec3 = Vec3::new(1.0, 0.85, 0.55);
const WINDOW_COOL: Vec3 = Vec3::new(0.85, 0.92, 1.0);
const BUILDING_SWAY: f32 = 0.004;
/// Building reveal at which the window band starts fading in.
const BAND_REVEAL_START: f32 = 0.3;
const WIRE_CANOPY_LAYERS: usize = 5;
/// Share of the tree reveal spent growing the trunk.
const TRUNK_REVEAL_SHARE: f32 = 0.4;
const CANOPY_DROOP: f32 = 0.06;
const TRUNK_COLOR: Vec3 = Vec3::new(0.35, 0.24, 0.15);
const PINE_TINT: Vec3 = Vec3::new(0.13, 0.32, 0.18);
const DECIDUOUS_TINT: Vec3 = Vec3::new(0.28, 0.48, 0.18);
const RAIN_COLOR: Vec3 = Vec3::new(0.7, 0.75, 0.85);
const PUDDLE_COLOR: Vec3 = Vec3::new(0.18, 0.2, 0.24);
const ASPHALT: Vec3 = Vec3::new(0.12, 0.12, 0.13);
const LANE_PAINT: Vec3 = Vec3::new(0.9, 0.85, 0.5);
const STRIKE_POSITION: Vec3 = Vec3::new(0.0, 700.0, 0.0);
const LAMP_POSITION: Vec3 = Vec3::new(150.0, 260.0, 120.0);
/// Ground radius of the light shaft under the lamp.
const SHAFT_RADIUS: f32 = 110.0;
/// Shaft opacity at full volumetric strength.
const SHAFT_ALPHA: f32 = 0.12;

/// How a building or tree is drawn this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Treatment {
    /// Progressive wireframe growth of phase 0.
    Reveal,
    /// Solid box with a window band.
    Solid,
    /// Solid box with full material, glowing band and roof slab.
    Textured,
}

pub fn treatment(clock: &PhaseClock) -> Treatment {
    let exiting = clock.exit_progress() > 0.0;
    match clock.phase() {
        Phase::Wireframe if !exiting => Treatment::Reveal,
        Phase::Wireframe | Phase::PhysicallyBased => Treatment::Textured,
        _ => Treatment::Solid,
    }
}

/// Rain opacity: full in the storm phase, fading across the windows either side of it.
pub fn rain_visibility(clock: &PhaseClock) -> f32 {
    match clock.phase() {
        Phase::AdvancedLit => 1.0,
        Phase::EnvironmentMapped => clock.exit_progress(),
        Phase::PhysicallyBased => clock.entry_progress(),
        _ => 0.0,
    }
}

/// Road opacity: the street grid arrives late in the storm-to-PBR boundary.
pub fn road_visibility(clock: &PhaseClock) -> f32 {
    match clock.phase() {
        Phase::PhysicallyBased => 1.0,
        Phase::AdvancedLit => normalize(clock.exit_progress(), 0.5, 1.0),
        _ => 0.0,
    }
}

#[derive(Debug)]
pub struct Compositor {
    table: StyleTable,
    field: NoiseField,
    loaded: Loaded,
}

impl Compositor {
    pub fn new(table: StyleTable, seed: u32, loaded: Loaded) -> Self {
        Self {
            table,
            field: NoiseField::new(seed),
            loaded,
        }
    }

    pub fn compose(&self, scene: &Scene, sim: &Simulation) -> DrawList {
        let style = sim.effective_style(&self.table);
        let clock = &sim.clock;
        let background = background(&style, sim.time_of_day());
        let mut list = DrawList::new(background, sim.camera.view_projection(), sim.camera.eye());
        self.light(&mut list, &style, sim);

        let mut frame = Frame {
            style: &style,
            list: &mut list,
            clock,
            time: sim.frame() as f32,
            textured: clock.phase() >= Phase::EnvironmentMapped
                || (clock.phase() == Phase::Flat && clock.exit_progress() >= 0.8),
        };

        self.sky(&mut frame, sim.time_of_day());
        self.ground(&mut frame);
        let roads = road_visibility(clock);
        if roads > 0.0 {
            self.roads(&mut frame, scene, roads);
        }
        let treatment = treatment(clock);
        for building in scene.buildings() {
            self.building(&mut frame, building, treatment);
        }
        for tree in scene.trees() {
            self.tree(&mut frame, tree, treatment);
        }
        self.rain(&mut frame, sim);
        self.haze(&mut frame);

        list
    }

    fn light(&self, list: &mut DrawList, style: &EffectiveStyle, sim: &Simulation) {
        let flash = sim.lightning.intensity();
        let ambient = style.ambient.unwrap_or(Vec3::ZERO);
        list.lighting.ambient = ambient + Vec3::splat(0.5 * flash);
        list.lighting.directional = style.directional.map(|d| (d.color, d.direction));
        if let Some(point) = style.point {
            list.lighting.push_point(PositionedLight {
                position: LAMP_POSITION,
                color: point.color,
                intensity: point.intensity,
            });
        }
        if sim.lightning.is_flashing() {
            list.lighting.push_point(PositionedLight {
                position: STRIKE_POSITION,
                color: Vec3::new(0.8, 0.85, 1.0) * sim.time_of_day(),
                intensity: 3.0 * flash,
            });
        }
        if style.effects.fog.enabled {
            list.fog = Some(Fog {
                color: list.clear,
                density: style.effects.fog.strength() * 0.0009 * (0.5 + 0.5 * style.rain_intensity),
            });
        }
        list.bloom = style
            .effects
            .bloom
            .strength()
            .max(style.effects.glow.strength());
    }

    fn sky(&self, frame: &mut Frame, time_of_day: f32) {
        if frame.style.mode == RenderMode::Wireframe {
            return;
        }
        let previous = self.table.get(frame.clock.previous_phase());
        let alpha = (frame.style.effects.hdr_background.strength()
            + frame.clock.entry_progress() * previous.effects.hdr_background.strength())
        .min(1.0);
        if alpha <= 0.0 {
            return;
        }
        let texture = self.loaded.get(TextureSlot::Sky);
        let color = if texture.is_some() {
            Vec3::ONE
        } else {
            Vec3::new(0.5, 0.6, 0.75)
        } * time_of_day;
        frame.list.solids.push(SolidDraw {
            layer: Layer::Sky,
            shape: Shape::Sphere,
            model: Mat4::from_scale(Vec3::splat(SKY_RADIUS)),
            color: color.extend(alpha),
            surface: SurfaceParams::UNLIT,
            texture,
            uv_scale: 1.0,
        });
    }

    fn ground(&self, frame: &mut Frame) {
        if frame.style.mode == RenderMode::Wireframe {
            let color = stroke_color(frame.style);
            let steps = (GROUND_SIZE / WIRE_GRID_SPACING) as i32;
            let half = GROUND_SIZE / 2.0;
            for i in 0..=steps {
                let c = -half + i as f32 * WIRE_GRID_SPACING;
                for (from, to) in [
                    (Vec3::new(-half, 0.0, c), Vec3::new(half, 0.0, c)),
                    (Vec3::new(c, 0.0, -half), Vec3::new(c, 0.0, half)),
                ] {
                    frame.list.lines.push(LineDraw {
                        layer: Layer::Ground,
                        outline: Outline::Segment,
                        model: segment(from, to),
                        color: color.extend(0.35),
                        weight: 1.0,
                    });
                }
            }
            return;
        }
        let fill = frame.style.fill.unwrap_or(Vec3::splat(0.5)) * 0.45;
        let texture = frame.texture(self.loaded.get(TextureSlot::Ground));
        let surface = frame.surface();
        frame.paint(
            Layer::Ground,
            Shape::Cube,
            Transform::boxed(Vec3::new(0.0, -1.0, 0.0), Vec3::new(GROUND_SIZE, 2.0, GROUND_SIZE)),
            fill,
            1.0,
            surface,
            texture,
            24.0,
        );
    }

    fn roads(&self, frame: &mut Frame, scene: &Scene, alpha: f32) {
        let surface = SurfaceParams {
            roughness: 0.6,
            reflectivity: 0.3,
            ..frame.surface()
        };
        for road in scene.straight_roads() {
            let center = road.center();
            let size = match road.orientation {
                Orientation::Horizontal => Vec3::new(road.length(), 0.6, road.width),
                Orientation::Vertical => Vec3::new(road.width, 0.6, road.length()),
            };
            frame.paint(
                Layer::Roads,
                Shape::Cube,
                Transform::boxed(Vec3::new(center.x, 0.3, center.y), size),
                ASPHALT,
                alpha,
                surface,
                None,
                1.0,
            );
            lane_dashes(frame, road.start, road.end, road.width, alpha);
        }
        for patch in scene.intersections() {
            let center = patch.center();
            let size = patch.size();
            frame.paint(
                Layer::Roads,
                Shape::Cube,
                Transform::boxed(Vec3::new(center.x, 0.4, center.y), Vec3::new(size.x, 0.8, size.y)),
                ASPHALT * 1.3,
                alpha,
                surface,
                None,
                1.0,
            );
        }
    }

    fn window_lit(&self, building: &Building, time: f32) -> bool {
        let p = building.position;
        self.field.sample3(p.x * 0.01, p.z * 0.01, time * 0.0005) > WINDOW_LIT_THRESHOLD
    }

    /// Per-building bulb colour, fixed for the life of the scene.
    fn window_tone(&self, building: &Building) -> Vec3 {
        let p = building.position;
        mix_vec3(WINDOW_WARM, WINDOW_COOL, self.field.sample2(p.x * 0.05, p.z * 0.05))
    }

    fn building(&self, frame: &mut Frame, b: &Building, treatment: Treatment) {
        let (x, z) = (b.position.x, b.position.z);
        if treatment == Treatment::Reveal {
            let reveal = frame.clock.building_reveal();
            let h = b.height * ease_out_quart(reveal);
            if h <= 0.0 {
                return;
            }
            let stroke = stroke_color(frame.style);
            let weight = stroke_weight(frame.style);
            let shell = Transform::boxed(Vec3::new(x, h / 2.0, z), Vec3::new(b.width, h, b.depth));
            let glow = frame.style.effects.glow.strength();
            if glow > 0.0 {
                frame.list.lines.push(LineDraw {
                    layer: Layer::Buildings,
                    outline: Outline::Cube,
                    model: Transform { scale: shell.scale * 1.04, ..shell }.matrix(),
                    color: stroke.extend(0.3 * glow),
                    weight: weight * 3.0,
                });
            }
            frame.line(Layer::Buildings, Outline::Cube, shell.matrix(), stroke, 1.0, weight);
            if reveal > BAND_REVEAL_START {
                let band_alpha = ease_in_out_cubic(normalize(reveal, BAND_REVEAL_START, 1.0));
                frame.line(
                    Layer::Buildings,
                    Outline::Cube,
                    window_band(Vec3::new(x, h / 2.0, z), Vec3::new(b.width, h, b.depth)).matrix(),
                    stroke * 0.7,
                    band_alpha,
                    weight,
                );
            }
            return;
        }

        let pivot = Vec3::new(x, 0.0, z);
        // Still during phase 0, including its exit toward flat shading.
        let sway = if frame.clock.phase() == Phase::Wireframe {
            Quat::IDENTITY
        } else {
            Quat::from_rotation_z((frame.time * 0.01 + b.sway_offset()).sin() * BUILDING_SWAY)
        };
        let place = |t: Transform| t.rotated_about(pivot, sway);
        let fill = frame.style.fill.unwrap_or(Vec3::splat(0.6));
        let surface = frame.surface();
        let window = frame.style.effects.window_lights;
        let lit = window.enabled && self.window_lit(b, frame.time);
        let concrete = frame.texture(self.loaded.get(TextureSlot::Concrete));
        let bulbs = self.window_tone(b);

        frame.paint(
            Layer::Buildings,
            Shape::Cube,
            place(Transform::boxed(b.position, b.size())),
            fill,
            1.0,
            surface,
            concrete,
            b.height / 40.0,
        );

        let band = place(window_band(b.position, b.size()));
        match (treatment, lit) {
            (Treatment::Textured, true) => {
                let glow = SurfaceParams {
                    emissive: window.strength().min(1.0),
                    ..surface
                };
                frame.paint(Layer::Buildings, Shape::Cube, band, bulbs, 1.0, glow, None, 1.0);
            }
            (_, true) => {
                let color = mix_vec3(fill, bulbs, window.strength().min(1.0));
                let warm = SurfaceParams {
                    emissive: 0.6 * window.strength().min(1.0),
                    ..surface
                };
                frame.paint(Layer::Buildings, Shape::Cube, band, color, 1.0, warm, None, 1.0);
            }
            (_, false) => {
                frame.paint(Layer::Buildings, Shape::Cube, band, fill * 0.6, 1.0, surface, None, 1.0);
            }
        }

        if treatment == Treatment::Textured {
            let roof = place(Transform::boxed(
                b.position + Vec3::new(0.0, b.height * 0.55, 0.0),
                Vec3::new(b.width * 0.7, b.height * 0.1, b.depth * 0.7),
            ));
            let texture = frame.texture(self.loaded.get(TextureSlot::Roof));
            frame.paint(Layer::Buildings, Shape::Cube, roof, fill * 0.5, 1.0, surface, texture, 2.0);
        }
    }

    fn tree(&self, frame: &mut Frame, tree: &Tree, treatment: Treatment) {
        let base = Vec3::new(tree.position.x, 0.0, tree.position.y);
        let canopy_height = tree.height - tree.trunk_height;

        if treatment == Treatment::Reveal {
            let reveal = frame.clock.tree_reveal();
            let stroke = stroke_color(frame.style);
            let weight = stroke_weight(frame.style);
            let trunk = ease_out_quart(normalize(reveal, 0.0, TRUNK_REVEAL_SHARE));
            if trunk <= 0.0 {
                return;
            }
            let th = tree.trunk_height * trunk;
            let trunk_box = Transform::boxed(
                base + Vec3::new(0.0, th / 2.0, 0.0),
                Vec3::new(tree.trunk_width, th, tree.trunk_width),
            );
            frame.line(Layer::Trees, Outline::Cube, trunk_box.matrix(), stroke, 1.0, weight);
            if trunk < 1.0 {
                return;
            }
            let canopy = normalize(reveal, TRUNK_REVEAL_SHARE, 1.0) * WIRE_CANOPY_LAYERS as f32;
            for i in 0..WIRE_CANOPY_LAYERS {
                let layer_progress = (canopy - i as f32).clamp(0.0, 1.0);
                if layer_progress <= 0.0 {
                    break;
                }
                let cone = canopy_layer(tree, i, WIRE_CANOPY_LAYERS, canopy_height);
                frame.line(Layer::Trees, Outline::Cone, cone.matrix(), stroke, layer_progress, weight);
            }
            return;
        }

        let wind = (self.field.sample3(
            tree.position.x * 0.01,
            tree.position.y * 0.01,
            frame.time * 0.01,
        ) - 0.5)
            * 0.12
            * (tree.height / 50.0);
        let sway = Quat::from_rotation_z(wind) * Quat::from_rotation_x(wind * 0.5 * tree.sway_offset.sin());
        let place = |t: Transform| t.rotated_about(base, sway);
        let surface = frame.surface();

        let trunk = place(Transform::boxed(
            base + Vec3::new(0.0, tree.trunk_height / 2.0, 0.0),
            Vec3::new(tree.trunk_width, tree.trunk_height, tree.trunk_width),
        ));
        frame.paint(Layer::Trees, Shape::Cube, trunk, TRUNK_COLOR, 1.0, surface, None, 1.0);

        let tint = match tree.kind {
            TreeKind::Pine => PINE_TINT,
            TreeKind::Deciduous => DECIDUOUS_TINT,
        };
        let leaves = frame.texture(self.loaded.get(TextureSlot::Leaf));
        let foliage = SurfaceParams {
            subsurface: surface.subsurface.max(0.2),
            ..surface
        };
        for i in 0..CANOPY_LAYERS {
            let color = if frame.clock.phase() == Phase::PhysicallyBased {
                tint * (1.0 + tree.layer_jitter[i])
            } else {
                tint
            };
            let cone = place(canopy_layer(tree, i, CANOPY_LAYERS, canopy_height));
            frame.paint(Layer::Trees, Shape::Cone, cone, color, 1.0, foliage, leaves, 1.0);
        }
    }

    fn rain(&self, frame: &mut Frame, sim: &Simulation) {
        let phase = frame.clock.phase();
        let visibility = rain_visibility(frame.clock);
        if visibility > 0.0 {
            let active = &sim.rain.drops()[..sim.rain.active_count(frame.style.rain_intensity)];
            let scale = rain::phase_scale(phase);
            let streak = |d: &rain::Raindrop| {
                segment(d.position, d.position - Vec3::new(0.0, d.length * scale, 0.0))
            };
            if frame.style.effects.bloom.enabled || frame.style.effects.glow.enabled {
                let glow_count = active.len() * 3 / 10;
                for drop in &active[..glow_count] {
                    frame.list.lines.push(LineDraw {
                        layer: Layer::Rain,
                        outline: Outline::Segment,
                        model: streak(drop),
                        color: RAIN_COLOR.extend(0.15 * visibility),
                        weight: drop.thickness * 3.0,
                    });
                }
            }
            let main_count = if phase == Phase::AdvancedLit {
                active.len()
            } else {
                active.len() * 7 / 10
            };
            for drop in &active[..main_count] {
                frame.list.lines.push(LineDraw {
                    layer: Layer::Rain,
                    outline: Outline::Segment,
                    model: streak(drop),
                    color: RAIN_COLOR.extend(0.6 * visibility),
                    weight: drop.thickness,
                });
            }
        }

        let wet = if phase >= Phase::AdvancedLit {
            1.0
        } else {
            visibility
        };
        if wet <= 0.0 || frame.style.mode == RenderMode::Wireframe {
            return;
        }
        let puddle_surface = SurfaceParams {
            specular: Vec3::ONE,
            shininess: 80.0,
            roughness: 0.1,
            reflectivity: 0.8,
            ..frame.surface()
        };
        for puddle in sim.rain.puddles() {
            let c = puddle.center;
            let radius = puddle.base_radius
                * (0.5 + self.field.sample3(c.x * 0.01, c.y * 0.01, frame.time * 0.002));
            frame.paint(
                Layer::Rain,
                Shape::Disc,
                Transform::boxed(Vec3::new(c.x, 0.15, c.y), Vec3::new(radius, 1.0, radius)),
                PUDDLE_COLOR,
                0.55 * wet,
                puddle_surface,
                None,
                1.0,
            );
            if phase < Phase::AdvancedLit {
                continue;
            }
            for k in 0..2 {
                let cycle = (frame.time * 0.01 + puddle.ripple_offset + k as f32 * 0.5).fract();
                let r = radius * (0.3 + cycle * 1.2);
                frame.list.lines.push(LineDraw {
                    layer: Layer::Rain,
                    outline: Outline::Ring,
                    model: Transform::boxed(Vec3::new(c.x, 0.3, c.y), Vec3::new(r, 1.0, r)).matrix(),
                    color: RAIN_COLOR.extend((1.0 - cycle) * 0.5 * wet),
                    weight: 1.0,
                });
            }
        }
    }

    /// Volumetric light: a translucent cone from the lamp down to the ground.
    fn haze(&self, frame: &mut Frame) {
        let strength = frame.style.effects.volumetric.strength();
        let Some(point) = frame.style.point else {
            return;
        };
        if strength <= 0.0 || frame.style.mode == RenderMode::Wireframe {
            return;
        }
        let shaft = Transform::boxed(
            Vec3::new(LAMP_POSITION.x, 0.0, LAMP_POSITION.z),
            Vec3::new(SHAFT_RADIUS, LAMP_POSITION.y, SHAFT_RADIUS),
        );
        frame.list.solids.push(SolidDraw {
            layer: Layer::Haze,
            shape: Shape::Cone,
            model: shaft.matrix(),
            color: (point.color * point.intensity.min(1.0)).extend(SHAFT_ALPHA * strength.min(1.0)),
            surface: SurfaceParams::UNLIT,
            texture: None,
            uv_scale: 1.0,
        });
    }
}

/// Per-frame drawing context shared by the layer routines.
struct Frame<'a> {
    style: &'a EffectiveStyle,
    list: &'a mut DrawList,
    clock: &'a PhaseClock,
    time: f32,
    /// Whether this frame uses texture maps at all.
    textured: bool,
}

impl Frame<'_> {
    fn surface(&self) -> SurfaceParams {
        let m = self.style.material_or_default();
        SurfaceParams {
            specular: m.specular,
            shininess: m.shininess,
            metallic: m.metallic,
            roughness: m.roughness,
            reflectivity: m.reflectivity,
            subsurface: m.subsurface,
            emissive: 0.0,
        }
    }

    fn texture(&self, slot: Option<TextureSlot>) -> Option<TextureSlot> {
        slot.filter(|_| self.textured)
    }

    fn line(&mut self, layer: Layer, outline: Outline, model: Mat4, color: Vec3, alpha: f32, weight: f32) {
        self.list.lines.push(LineDraw {
            layer,
            outline,
            model,
            color: color.extend(alpha),
            weight,
        });
    }

    /// Emit a shape in the current render mode: edges only when wireframe,
    /// otherwise filled, with an outline on top if the style strokes.
    #[allow(clippy::too_many_arguments)]
    fn paint(
        &mut self,
        layer: Layer,
        shape: Shape,
        transform: Transform,
        color: Vec3,
        alpha: f32,
        surface: SurfaceParams,
        texture: Option<TextureSlot>,
        uv_scale: f32,
    ) {
        let model = transform.matrix();
        let outline = match shape {
            Shape::Cube => Some(Outline::Cube),
            Shape::Cone => Some(Outline::Cone),
            Shape::Disc => Some(Outline::Ring),
            Shape::Sphere => None,
        };
        if self.style.mode == RenderMode::Wireframe {
            if let Some(outline) = outline {
                let stroke = stroke_color(self.style);
                let weight = stroke_weight(self.style);
                self.line(layer, outline, model, stroke, alpha, weight);
            }
            return;
        }
        self.list.solids.push(SolidDraw {
            layer,
            shape,
            model,
            color: color.extend(alpha),
            surface,
            texture,
            uv_scale,
        });
        if let (Some(stroke), Some(outline)) = (self.style.stroke, outline) {
            if stroke.weight > 0.0 {
                self.line(layer, outline, model, stroke.color, alpha, stroke.weight);
            }
        }
    }
}

fn stroke_color(style: &EffectiveStyle) -> Vec3 {
    style.stroke.map(|s| s.color).unwrap_or(Vec3::ONE)
}

fn stroke_weight(style: &EffectiveStyle) -> f32 {
    style.stroke.map(|s| s.weight).unwrap_or(1.0)
}

fn background(style: &EffectiveStyle, time_of_day: f32) -> Vec3 {
    if style.mode == RenderMode::Wireframe {
        return Vec3::ZERO;
    }
    let storm = style.effects.fog.strength().min(1.0);
    mix_vec3(Vec3::new(0.45, 0.55, 0.7), Vec3::new(0.1, 0.11, 0.15), storm) * time_of_day
}

/// Window band: 10% above the box centre, 80% of its height, slightly proud of the walls.
fn window_band(center: Vec3, size: Vec3) -> Transform {
    Transform::boxed(
        center + Vec3::new(0.0, size.y * 0.1, 0.0),
        Vec3::new(size.x * 1.02, size.y * 0.8, size.z * 1.02),
    )
}

/// Cone `i` of `layers`, tapering linearly from 100% to 40% and drooping slightly.
fn canopy_layer(tree: &Tree, i: usize, layers: usize, canopy_height: f32) -> Transform {
    let t = i as f32 / (layers - 1) as f32;
    let radius = tree.canopy_size * 0.5 * (1.0 - 0.6 * t);
    let y = tree.trunk_height + canopy_height * 0.55 * t;
    let droop_axis = Vec3::new((i as f32 * 1.3).cos(), 0.0, (i as f32 * 1.3).sin());
    Transform::new(
        Vec3::new(tree.position.x, y, tree.position.y),
        Quat::from_axis_angle(droop_axis, CANOPY_DROOP),
        Vec3::new(radius, canopy_height * 0.45, radius),
    )
}

/// Dashed centre line, skipping the crossings.
fn lane_dashes(frame: &mut Frame, start: Vec2, end: Vec2, width: f32, alpha: f32) {
    const DASH: f32 = 12.0;
    const GAP: f32 = 18.0;
    let length = start.distance(end);
    let dir = (end - start) / length;
    let mut s = width;
    while s + DASH < length - width {
        let a = start + dir * s;
        let b = start + dir * (s + DASH);
        let near_crossing = {
            let along = if dir.x.abs() > 0.5 { a.x } else { a.y };
            let offset = (along + GRID_EXTENT).rem_euclid(ROAD_SPACING);
            offset < width || offset > ROAD_SPACING - width
        };
        if !near_crossing {
            frame.line(
                Layer::Roads,
                Outline::Segment,
                segment(Vec3::new(a.x, 0.7, a.y), Vec3::new(b.x, 0.7, b.y)),
                LANE_PAINT,
                alpha,
                1.0,
            );
        }
        s += DASH + GAP;
    }
}

/// Model matrix mapping the unit segment (origin to -Y) onto `from -> to`.
pub fn segment(from: Vec3, to: Vec3) -> Mat4 {
    let delta = to - from;
    let length = delta.length();
    if length <= f32::EPSILON {
        return Mat4::from_translation(from) * Mat4::from_scale(Vec3::ZERO);
    }
    let rotation = Quat::from_rotation_arc(Vec3::NEG_Y, delta / length);
    Mat4::from_scale_rotation_translation(Vec3::splat(length), rotation, from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use approx::assert_relative_eq;

    struct Fixture {
        scene: Scene,
        sim: Simulation,
        compositor: Compositor,
    }

    fn fixture(loaded: Loaded) -> Fixture {
        let config = AppConfig {
            rain_drops: 100,
            tree_count: 20,
            ..AppConfig::default()
        };
        Fixture {
            scene: Scene::generate(config.seed, config.tree_count),
            sim: Simulation::new(&config),
            compositor: Compositor::new(StyleTable::new(), 7, loaded),
        }
    }

    impl Fixture {
        fn jump_to(&mut self, phase: Phase) {
            while self.sim.clock.phase() != phase {
                self.sim.next_phase();
            }
        }

        fn run(&mut self, frames: u32) {
            for _ in 0..frames {
                self.sim.update();
            }
        }

        fn compose(&self) -> DrawList {
            self.compositor.compose(&self.scene, &self.sim)
        }
    }

    #[test]
    fn fresh_wireframe_draws_nothing_but_the_grid() {
        let mut f = fixture(Loaded::all());
        f.sim.set_auto_advance(false);
        let list = f.compose();
        assert!(list.solids.is_empty());
        assert!(list.is_layer_empty(Layer::Buildings));
        assert!(!list.is_layer_empty(Layer::Ground));
        assert_eq!(list.clear, Vec3::ZERO);
        assert!(list.lighting.directional.is_none());
    }

    #[test]
    fn wireframe_reveal_grows_building_outlines() {
        let mut f = fixture(Loaded::all());
        f.sim.set_auto_advance(false);
        f.run(120);
        let list = f.compose();
        assert!(list.solids.is_empty());
        let outlines: Vec<_> = list.lines_in(Layer::Buildings).collect();
        // Glow, shell and band per building once the band has started.
        assert_eq!(outlines.len(), 3 * f.scene.buildings().len());
        let b = &f.scene.buildings()[0];
        let shell_height = outlines[1].model.y_axis.y;
        assert!(shell_height > 0.0 && shell_height < b.height);
        assert!(list.is_layer_empty(Layer::Rain));
        assert!(list.is_layer_empty(Layer::Roads));
    }

    #[test]
    fn flat_phase_is_solid_without_extras() {
        let mut f = fixture(Loaded::all());
        f.jump_to(Phase::Flat);
        f.run(300);
        let list = f.compose();
        assert_eq!(list.solids_in(Layer::Buildings).count(), 2 * f.scene.buildings().len());
        assert!(list.is_layer_empty(Layer::Sky));
        assert!(list.is_layer_empty(Layer::Roads));
        assert!(list.is_layer_empty(Layer::Rain));
        assert!(list.solids.iter().all(|d| d.texture.is_none()));
        assert!(list.lighting.directional.is_some());
        assert!(list.lighting.points.is_empty());
    }

    #[test]
    fn pbr_phase_adds_roofs_roads_and_sky() {
        let mut f = fixture(Loaded::all());
        f.jump_to(Phase::PhysicallyBased);
        f.run(300);
        let list = f.compose();
        assert_eq!(list.solids_in(Layer::Buildings).count(), 3 * f.scene.buildings().len());
        assert!(!list.is_layer_empty(Layer::Roads));
        assert_eq!(list.solids_in(Layer::Sky).count(), 1);
        assert!(list
            .solids_in(Layer::Buildings)
            .any(|d| d.texture == Some(TextureSlot::Roof)));
        // Steady PBR: no falling rain, but the streets stay wet.
        assert!(list.lines_in(Layer::Rain).all(|d| d.outline == Outline::Ring));
        assert!(list.solids_in(Layer::Rain).count() > 0);
    }

    #[test]
    fn storm_phase_draws_glow_and_main_rain() {
        let mut f = fixture(Loaded::all());
        f.jump_to(Phase::AdvancedLit);
        f.sim.set_rain_intensity(0.5);
        f.run(300);
        let list = f.compose();
        let active = f.sim.rain.active_count(0.5);
        let streaks = list
            .lines_in(Layer::Rain)
            .filter(|d| d.outline == Outline::Segment)
            .count();
        assert_eq!(streaks, active + active * 3 / 10);
        let rings = list.lines_in(Layer::Rain).filter(|d| d.outline == Outline::Ring).count();
        assert_eq!(rings, 2 * f.sim.rain.puddles().len());
        assert!(list.fog.is_some());
    }

    #[test]
    fn rain_fades_in_during_the_boundary_into_the_storm() {
        let mut f = fixture(Loaded::all());
        f.jump_to(Phase::EnvironmentMapped);
        f.run(f.sim.clock.transition_start() + 60);
        let visibility = rain_visibility(&f.sim.clock);
        assert!(visibility > 0.0 && visibility < 1.0);
        let list = f.compose();
        let streak = list
            .lines_in(Layer::Rain)
            .find(|d| d.outline == Outline::Segment)
            .expect("rain streaks");
        assert!(streak.color.w < 0.6);
        assert!(list.lines_in(Layer::Rain).all(|d| d.outline != Outline::Ring));
    }

    #[test]
    fn layers_are_emitted_in_fixed_order() {
        let mut f = fixture(Loaded::all());
        f.jump_to(Phase::AdvancedLit);
        f.run(f.sim.clock.transition_start() + 170);
        let list = f.compose();
        assert!(!list.is_layer_empty(Layer::Roads));
        assert!(list.solids.windows(2).all(|w| w[0].layer <= w[1].layer));
        assert!(list.lines.windows(2).all(|w| w[0].layer <= w[1].layer));
    }

    #[test]
    fn composing_is_deterministic() {
        let mut f = fixture(Loaded::all());
        f.jump_to(Phase::AdvancedLit);
        f.run(40);
        assert_eq!(f.compose(), f.compose());
    }

    #[test]
    fn missing_textures_fall_back_to_flat_colour() {
        let mut f = fixture(Loaded::default());
        f.jump_to(Phase::PhysicallyBased);
        f.run(10);
        let list = f.compose();
        assert!(list.solids.iter().all(|d| d.texture.is_none()));
        assert!(list.validate().is_ok());
    }

    #[test]
    fn leaving_wireframe_draws_full_height_outlines() {
        let mut f = fixture(Loaded::all());
        f.run(f.sim.clock.transition_start() + 20);
        assert_eq!(treatment(&f.sim.clock), Treatment::Textured);
        let list = f.compose();
        assert!(list.solids.is_empty());
        // Held as full-height outlines until the solid cross-fade starts.
        let b = &f.scene.buildings()[0];
        let shell = list.lines_in(Layer::Buildings).next().expect("building outline");
        assert_relative_eq!(shell.model.y_axis.length(), b.height, epsilon = 1e-3);
    }

    #[test]
    fn lightning_boosts_ambient_and_adds_a_light() {
        let mut f = fixture(Loaded::all());
        f.jump_to(Phase::PhysicallyBased);
        f.run(300);
        f.sim.lightning = crate::lightning::Lightning::Idle;
        let calm = f.compose();
        f.sim.lightning = crate::lightning::Lightning::Flashing { remaining: 3 };
        let flash = f.compose();
        assert!(flash.lighting.ambient.x > calm.lighting.ambient.x);
        assert_eq!(flash.lighting.points.len(), calm.lighting.points.len() + 1);
    }

    #[test]
    fn tree_trunks_finish_before_canopies_start() {
        let mut f = fixture(Loaded::all());
        f.sim.set_auto_advance(false);
        f.run(60);
        let list = f.compose();
        let trees = f.scene.trees().to_vec();
        assert!(f.sim.clock.tree_reveal() > 0.0 && f.sim.clock.tree_reveal() < TRUNK_REVEAL_SHARE);
        assert_eq!(list.lines_in(Layer::Trees).count(), trees.len());
        assert!(list.lines_in(Layer::Trees).all(|d| d.outline == Outline::Cube));

        let mut canopy_seen = false;
        for _ in 0..400 {
            f.run(1);
            let list = f.compose();
            if list.lines_in(Layer::Trees).any(|d| d.outline == Outline::Cone) {
                canopy_seen = true;
                let trunks = list.lines_in(Layer::Trees).filter(|d| d.outline == Outline::Cube);
                for (trunk, tree) in trunks.zip(&trees) {
                    assert_relative_eq!(trunk.model.y_axis.y, tree.trunk_height, epsilon = 1e-3);
                }
            }
        }
        assert!(canopy_seen);
    }

    #[test]
    fn revealed_trees_have_five_wire_layers() {
        let mut f = fixture(Loaded::all());
        f.sim.set_auto_advance(false);
        f.run(2000);
        assert_eq!(f.sim.clock.tree_reveal(), 1.0);
        let list = f.compose();
        let trees = f.scene.trees().len();
        let cones = list
            .lines_in(Layer::Trees)
            .filter(|d| d.outline == Outline::Cone)
            .count();
        assert_eq!(cones, WIRE_CANOPY_LAYERS * trees);
        assert_eq!(list.lines_in(Layer::Trees).count(), (WIRE_CANOPY_LAYERS + 1) * trees);
    }

    #[test]
    fn solid_canopies_taper_and_take_their_kind_tint() {
        let mut f = fixture(Loaded::all());
        f.jump_to(Phase::Flat);
        f.run(300);
        let list = f.compose();
        let solids: Vec<_> = list.solids_in(Layer::Trees).collect();
        assert_eq!(solids.len(), (CANOPY_LAYERS + 1) * f.scene.trees().len());

        for (draws, tree) in solids.chunks(CANOPY_LAYERS + 1).zip(f.scene.trees()) {
            assert_eq!(draws[0].shape, Shape::Cube);
            let cones = &draws[1..];
            assert!(cones.iter().all(|d| d.shape == Shape::Cone));
            let widest = cones[0].model.x_axis.length();
            let narrowest = cones[CANOPY_LAYERS - 1].model.x_axis.length();
            assert_relative_eq!(widest, tree.canopy_size * 0.5, max_relative = 1e-4);
            assert_relative_eq!(narrowest / widest, 0.4, max_relative = 1e-4);

            let tint = match tree.kind {
                TreeKind::Pine => PINE_TINT,
                TreeKind::Deciduous => DECIDUOUS_TINT,
            };
            assert!(cones.iter().all(|d| d.color.truncate() == tint));
        }
    }

    #[test]
    fn canopy_jitter_only_in_the_physically_based_phase() {
        let mut f = fixture(Loaded::all());
        f.jump_to(Phase::PhysicallyBased);
        f.run(300);
        let list = f.compose();
        let solids: Vec<_> = list.solids_in(Layer::Trees).collect();
        let mut jittered = 0;
        for (draws, tree) in solids.chunks(CANOPY_LAYERS + 1).zip(f.scene.trees()) {
            let tint = match tree.kind {
                TreeKind::Pine => PINE_TINT,
                TreeKind::Deciduous => DECIDUOUS_TINT,
            };
            for (i, cone) in draws[1..].iter().enumerate() {
                let expected = tint * (1.0 + tree.layer_jitter[i]);
                assert!(cone.color.truncate().abs_diff_eq(expected, 1e-5));
                if cone.color.truncate() != tint {
                    jittered += 1;
                }
            }
        }
        assert!(jittered > 0);
    }

    #[test]
    fn buildings_hold_still_until_wireframe_is_left() {
        let mut f = fixture(Loaded::all());
        f.run(f.sim.clock.transition_start() + 170);
        assert_eq!(f.sim.clock.phase(), Phase::Wireframe);
        let list = f.compose();
        assert!(list.solids_in(Layer::Buildings).count() > 0);
        assert!(list
            .solids_in(Layer::Buildings)
            .all(|d| d.model.x_axis.y.abs() < 1e-6));
        assert!(list
            .lines_in(Layer::Buildings)
            .all(|d| d.model.x_axis.y.abs() < 1e-6));

        f.run(100);
        assert_eq!(f.sim.clock.phase(), Phase::Flat);
        let list = f.compose();
        assert!(list
            .solids_in(Layer::Buildings)
            .any(|d| d.model.x_axis.y.abs() > 1e-6));
    }

    #[test]
    fn lit_windows_are_stable_and_drive_the_band() {
        let mut f = fixture(Loaded::all());
        f.jump_to(Phase::AdvancedLit);
        f.run(300);
        let time = f.sim.frame() as f32;
        let twin = Compositor::new(StyleTable::new(), 7, Loaded::all());
        let buildings = f.scene.buildings();
        for b in buildings {
            assert_eq!(f.compositor.window_lit(b, time), twin.window_lit(b, time));
        }
        let unchanged = buildings
            .iter()
            .filter(|b| f.compositor.window_lit(b, time) == f.compositor.window_lit(b, time + 1.0))
            .count();
        assert!(unchanged * 100 >= buildings.len() * 95);

        let list = f.compose();
        let solids: Vec<_> = list.solids_in(Layer::Buildings).collect();
        assert_eq!(solids.len(), 2 * buildings.len());
        for (draws, b) in solids.chunks(2).zip(buildings) {
            let band = draws[1];
            assert_eq!(band.surface.emissive > 0.0, f.compositor.window_lit(b, time));
        }
    }

    #[test]
    fn storm_phase_draws_a_light_shaft_under_the_lamp() {
        let mut f = fixture(Loaded::all());
        f.jump_to(Phase::AdvancedLit);
        f.run(300);
        let list = f.compose();
        let shafts: Vec<_> = list.solids_in(Layer::Haze).collect();
        assert_eq!(shafts.len(), 1);
        let shaft = shafts[0];
        assert_eq!(shaft.shape, Shape::Cone);
        assert_eq!(shaft.surface, SurfaceParams::UNLIT);
        assert!(shaft.color.w > 0.0 && shaft.color.w <= SHAFT_ALPHA);
        let apex = shaft.model.transform_point3(Vec3::Y);
        assert!(apex.abs_diff_eq(LAMP_POSITION, 1e-3));
        assert_eq!(list.solids.last().map(|d| d.layer), Some(Layer::Haze));
    }

    #[test]
    fn no_light_shaft_outside_the_storm() {
        for phase in [Phase::Flat, Phase::EnvironmentMapped, Phase::PhysicallyBased] {
            let mut f = fixture(Loaded::all());
            f.jump_to(phase);
            f.run(300);
            assert_eq!(f.compose().solids_in(Layer::Haze).count(), 0, "{phase:?}");
        }
    }

    #[test]
    fn segment_maps_unit_line_onto_endpoints() {
        let from = Vec3::new(1.0, 2.0, 3.0);
        let to = Vec3::new(11.0, 2.0, 3.0);
        let m = segment(from, to);
        let a = m.transform_point3(Vec3::ZERO);
        let b = m.transform_point3(Vec3::NEG_Y);
        assert_relative_eq!(a.x, from.x, epsilon = 1e-4);
        assert_relative_eq!(b.x, to.x, epsilon = 1e-4);
        assert_relative_eq!(b.y, to.y, epsilon = 1e-4);
    }
}
