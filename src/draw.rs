//! Backend-neutral frame description produced by the compositor.

use glam::{Mat4, Vec3, Vec4};

use crate::assets::TextureSlot;
use crate::error::FrameError;

pub const MAX_POINT_LIGHTS: usize = 4;

/// Filled unit meshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Unit cube centred at the origin.
    Cube,
    /// Base radius 1 at y = 0, apex at y = 1.
    Cone,
    /// Unit sphere.
    Sphere,
    /// Unit disc in the xz plane.
    Disc,
}

/// Stroked unit meshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outline {
    Cube,
    Cone,
    /// From the origin down to (0, -1, 0).
    Segment,
    /// Unit circle in the xz plane.
    Ring,
}

/// Composition layers in draw order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Layer {
    Sky,
    Ground,
    Roads,
    Buildings,
    Trees,
    Rain,
    /// Additive, translucent, drawn last without depth writes.
    Haze,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceParams {
    pub specular: Vec3,
    pub shininess: f32,
    pub metallic: f32,
    pub roughness: f32,
    pub reflectivity: f32,
    pub subsurface: f32,
    /// 0 = fully lit, 1 = unlit self-illuminated colour.
    pub emissive: f32,
}

impl SurfaceParams {
    pub const UNLIT: SurfaceParams = SurfaceParams {
        specular: Vec3::ZERO,
        shininess: 1.0,
        metallic: 0.0,
        roughness: 1.0,
        reflectivity: 0.0,
        subsurface: 0.0,
        emissive: 1.0,
    };
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolidDraw {
    pub layer: Layer,
    pub shape: Shape,
    pub model: Mat4,
    pub color: Vec4,
    pub surface: SurfaceParams,
    pub texture: Option<TextureSlot>,
    pub uv_scale: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineDraw {
    pub layer: Layer,
    pub outline: Outline,
    pub model: Mat4,
    pub color: Vec4,
    pub weight: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionedLight {
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lighting {
    pub ambient: Vec3,
    /// Colour and travel direction.
    pub directional: Option<(Vec3, Vec3)>,
    pub points: Vec<PositionedLight>,
}

impl Lighting {
    /// Adds a point light; extra lights beyond the shader limit are dropped.
    pub fn push_point(&mut self, light: PositionedLight) {
        if self.points.len() < MAX_POINT_LIGHTS {
            self.points.push(light);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fog {
    pub color: Vec3,
    pub density: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawList {
    pub clear: Vec3,
    pub view_proj: Mat4,
    pub eye: Vec3,
    pub lighting: Lighting,
    pub fog: Option<Fog>,
    /// Bloom/glow strength for the output stage.
    pub bloom: f32,
    pub solids: Vec<SolidDraw>,
    pub lines: Vec<LineDraw>,
}

impl DrawList {
    pub fn new(clear: Vec3, view_proj: Mat4, eye: Vec3) -> Self {
        Self {
            clear,
            view_proj,
            eye,
            lighting: Lighting::default(),
            fog: None,
            bloom: 0.0,
            solids: Vec::new(),
            lines: Vec::new(),
        }
    }

    pub fn solids_in(&self, layer: Layer) -> impl Iterator<Item = &SolidDraw> {
        self.solids.iter().filter(move |d| d.layer == layer)
    }

    pub fn lines_in(&self, layer: Layer) -> impl Iterator<Item = &LineDraw> {
        self.lines.iter().filter(move |d| d.layer == layer)
    }

    #[cfg(test)]
    pub fn is_layer_empty(&self, layer: Layer) -> bool {
        self.solids_in(layer).next().is_none() && self.lines_in(layer).next().is_none()
    }

    /// Reject the frame if any transform went non-finite.
    pub fn validate(&self) -> Result<(), FrameError> {
        if !self.view_proj.is_finite() {
            return Err(FrameError::NonFinite("camera"));
        }
        if self.solids.iter().any(|d| !d.model.is_finite()) {
            return Err(FrameError::NonFinite("solid"));
        }
        if self.lines.iter().any(|d| !d.model.is_finite()) {
            return Err(FrameError::NonFinite("line"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_transform_fails_validation() {
        let mut list = DrawList::new(Vec3::ZERO, Mat4::IDENTITY, Vec3::ZERO);
        assert!(list.validate().is_ok());
        list.lines.push(LineDraw {
            layer: Layer::Rain,
            outline: Outline::Segment,
            model: Mat4::from_scale(Vec3::splat(f32::NAN)),
            color: Vec4::ONE,
            weight: 1.0,
        });
        assert!(matches!(list.validate(), Err(FrameError::NonFinite("line"))));
    }

    #[test]
    fn point_lights_are_capped() {
        let mut lighting = Lighting::default();
        for _ in 0..MAX_POINT_LIGHTS + 3 {
            lighting.push_point(PositionedLight {
                position: Vec3::ZERO,
                color: Vec3::ONE,
                intensity: 1.0,
            });
        }
        assert_eq!(lighting.points.len(), MAX_POINT_LIGHTS);
    }
}
