//! Style resolver: the effective rendering parameters for one frame.
//!
//! Boundaries touching the wireframe phase and the flat-to-textured boundary
//! are not plain interpolations; see [`resolve`].

use glam::Vec3;

use crate::math::{ease_in_out_cubic, ease_out_quart, mix, mix_vec3, normalize};
use crate::phase::{
    DirectionalLight, Effects, Material, Phase, PhaseStyle, PointLight, Stroke, StyleTable, Toggle,
};

/// Progress below which phase 0 (and above which the end of phase 4) shows the pure wireframe look.
const PURE_WIREFRAME_EPSILON: f32 = 0.01;
/// Share of a wireframe boundary that stays fully wireframe.
const WIREFRAME_HOLD: f32 = 0.95;
/// Flat fill is held until this much of the flat-to-textured boundary.
const FLAT_FILL_HOLD: f32 = 0.8;
/// Start of the eased remap used for the other flat-to-textured parameters.
const FLAT_PARAM_START: f32 = 0.4;

/// Global scalars applied on top of the phase styles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Modifiers {
    /// Brightness post-multiplier for every light colour.
    pub time_of_day: f32,
    pub rain_intensity: f32,
}

impl Default for Modifiers {
    fn default() -> Self {
        Self {
            time_of_day: 1.0,
            rain_intensity: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Stroke only, no fill, no lighting.
    Wireframe,
    Solid,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectiveStyle {
    pub mode: RenderMode,
    pub stroke: Option<Stroke>,
    pub fill: Option<Vec3>,
    pub ambient: Option<Vec3>,
    pub directional: Option<DirectionalLight>,
    pub point: Option<PointLight>,
    pub material: Option<Material>,
    pub effects: Effects,
    pub rain_intensity: f32,
}

impl EffectiveStyle {
    /// A phase style taken as-is.
    pub fn pure(style: &PhaseStyle) -> Self {
        Self {
            mode: if style.fill.is_some() {
                RenderMode::Solid
            } else {
                RenderMode::Wireframe
            },
            stroke: style.stroke,
            fill: style.fill,
            ambient: style.ambient,
            directional: style.directional,
            point: style.point,
            material: style.material,
            effects: style.effects,
            rain_intensity: 0.0,
        }
    }

    /// Stroke-only look of the wireframe phase.
    fn wireframe(style: &PhaseStyle) -> Self {
        Self {
            mode: RenderMode::Wireframe,
            fill: None,
            ambient: None,
            directional: None,
            point: None,
            material: None,
            ..Self::pure(style)
        }
    }

    fn scale_lights(&mut self, k: f32) {
        if let Some(ambient) = self.ambient.as_mut() {
            *ambient *= k;
        }
        if let Some(dir) = self.directional.as_mut() {
            dir.color *= k;
        }
        if let Some(point) = self.point.as_mut() {
            point.color *= k;
        }
    }

    /// Material to shade with; matte when the style carries none.
    pub fn material_or_default(&self) -> Material {
        self.material.unwrap_or_default()
    }
}

/// Resolve the style for `phase` blending `exit_progress` of the way towards the next phase.
pub fn resolve(
    table: &StyleTable,
    phase: Phase,
    exit_progress: f32,
    modifiers: Modifiers,
) -> EffectiveStyle {
    let next = phase.next();
    let p = exit_progress.clamp(0.0, 1.0);
    let current_style = table.get(phase);
    let next_style = table.get(next);

    let mut style = if (phase == Phase::Wireframe && p < PURE_WIREFRAME_EPSILON)
        || (phase == Phase::PhysicallyBased && p > 1.0 - PURE_WIREFRAME_EPSILON)
    {
        EffectiveStyle::wireframe(table.get(Phase::Wireframe))
    } else if phase == Phase::Wireframe || next == Phase::Wireframe {
        wireframe_boundary(current_style, next_style, phase == Phase::Wireframe, p)
    } else if phase == Phase::Flat && next == Phase::EnvironmentMapped {
        let params = ease_in_out_cubic(normalize(p, FLAT_PARAM_START, 1.0));
        let fill = normalize(p, FLAT_FILL_HOLD, 1.0);
        blend_styles(current_style, next_style, params, fill)
    } else {
        let t = ease_out_quart(p);
        blend_styles(current_style, next_style, t, t)
    };

    style.scale_lights(modifiers.time_of_day);
    style.rain_intensity = modifiers.rain_intensity;
    style
}

/// Stays wireframe until the final stretch towards the solid side, then cross-fades.
fn wireframe_boundary(
    current: &PhaseStyle,
    next: &PhaseStyle,
    leaving_wireframe: bool,
    p: f32,
) -> EffectiveStyle {
    let (wire, solid, towards_solid) = if leaving_wireframe {
        (current, next, p)
    } else {
        (next, current, 1.0 - p)
    };
    if towards_solid < WIREFRAME_HOLD {
        return EffectiveStyle::wireframe(wire);
    }
    let t = normalize(towards_solid, WIREFRAME_HOLD, 1.0);
    blend_styles(wire, solid, t, t)
}

fn blend_styles(a: &PhaseStyle, b: &PhaseStyle, t: f32, fill_t: f32) -> EffectiveStyle {
    let fill = blend_opt(a.fill, b.fill, fill_t);
    EffectiveStyle {
        mode: if fill.is_some() {
            RenderMode::Solid
        } else {
            RenderMode::Wireframe
        },
        stroke: blend_opt(a.stroke, b.stroke, t),
        fill,
        ambient: blend_opt(a.ambient, b.ambient, t),
        directional: blend_opt(a.directional, b.directional, t),
        point: blend_opt(a.point, b.point, t),
        material: blend_opt(a.material, b.material, t),
        effects: blend(a.effects, b.effects, t),
        rain_intensity: 0.0,
    }
}

/// Numeric cross-fade between two records of the same kind.
trait Blend: Copy {
    fn lerp(self, other: Self, t: f32) -> Self;
    /// This record at `w` of its strength, for fading in or out against an absent one.
    fn fade(self, w: f32) -> Self;
}

fn blend<T: Blend>(a: T, b: T, t: f32) -> T {
    if t <= 0.0 {
        a
    } else if t >= 1.0 {
        b
    } else {
        a.lerp(b, t)
    }
}

fn blend_opt<T: Blend>(a: Option<T>, b: Option<T>, t: f32) -> Option<T> {
    match (a, b) {
        (Some(a), Some(b)) => Some(blend(a, b, t)),
        (Some(a), None) if t <= 0.0 => Some(a),
        (Some(a), None) if t < 1.0 => Some(a.fade(1.0 - t)),
        (None, Some(b)) if t >= 1.0 => Some(b),
        (None, Some(b)) if t > 0.0 => Some(b.fade(t)),
        _ => None,
    }
}

impl Blend for Vec3 {
    fn lerp(self, other: Self, t: f32) -> Self {
        mix_vec3(self, other, t)
    }

    fn fade(self, w: f32) -> Self {
        self * w
    }
}

impl Blend for Stroke {
    fn lerp(self, other: Self, t: f32) -> Self {
        Stroke {
            color: mix_vec3(self.color, other.color, t),
            weight: mix(self.weight, other.weight, t),
        }
    }

    fn fade(self, w: f32) -> Self {
        Stroke {
            weight: self.weight * w,
            ..self
        }
    }
}

impl Blend for DirectionalLight {
    fn lerp(self, other: Self, t: f32) -> Self {
        let direction = mix_vec3(self.direction, other.direction, t).normalize_or_zero();
        DirectionalLight {
            color: mix_vec3(self.color, other.color, t),
            direction: if direction == Vec3::ZERO {
                other.direction
            } else {
                direction
            },
        }
    }

    fn fade(self, w: f32) -> Self {
        DirectionalLight {
            color: self.color * w,
            ..self
        }
    }
}

impl Blend for PointLight {
    fn lerp(self, other: Self, t: f32) -> Self {
        PointLight {
            color: mix_vec3(self.color, other.color, t),
            intensity: mix(self.intensity, other.intensity, t),
        }
    }

    fn fade(self, w: f32) -> Self {
        PointLight {
            intensity: self.intensity * w,
            ..self
        }
    }
}

impl Blend for Material {
    fn lerp(self, other: Self, t: f32) -> Self {
        Material {
            specular: mix_vec3(self.specular, other.specular, t),
            shininess: mix(self.shininess, other.shininess, t),
            metallic: mix(self.metallic, other.metallic, t),
            roughness: mix(self.roughness, other.roughness, t),
            reflectivity: mix(self.reflectivity, other.reflectivity, t),
            subsurface: mix(self.subsurface, other.subsurface, t),
        }
    }

    fn fade(self, w: f32) -> Self {
        Material::default().lerp(self, w)
    }
}

impl Blend for Toggle {
    fn lerp(self, other: Self, t: f32) -> Self {
        Toggle {
            enabled: self.enabled || other.enabled,
            intensity: mix(self.strength(), other.strength(), t),
        }
    }

    fn fade(self, w: f32) -> Self {
        Toggle {
            intensity: self.intensity * w,
            ..self
        }
    }
}

impl Blend for Effects {
    fn lerp(self, other: Self, t: f32) -> Self {
        Effects {
            fog: self.fog.lerp(other.fog, t),
            bloom: self.bloom.lerp(other.bloom, t),
            volumetric: self.volumetric.lerp(other.volumetric, t),
            window_lights: self.window_lights.lerp(other.window_lights, t),
            hdr_background: self.hdr_background.lerp(other.hdr_background, t),
            glow: self.glow.lerp(other.glow, t),
        }
    }

    fn fade(self, w: f32) -> Self {
        Effects {
            fog: self.fog.fade(w),
            bloom: self.bloom.fade(w),
            volumetric: self.volumetric.fade(w),
            window_lights: self.window_lights.fade(w),
            hdr_background: self.hdr_background.fade(w),
            glow: self.glow.fade(w),
        }
    }
}
