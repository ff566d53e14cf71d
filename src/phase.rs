//! The five rendering eras and their static style records.

use glam::Vec3;

pub const PHASE_COUNT: usize = 5;

/// One of the five rendering eras, in cycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    Wireframe,
    Flat,
    EnvironmentMapped,
    AdvancedLit,
    PhysicallyBased,
}

impl Phase {
    pub const ALL: [Phase; PHASE_COUNT] = [
        Phase::Wireframe,
        Phase::Flat,
        Phase::EnvironmentMapped,
        Phase::AdvancedLit,
        Phase::PhysicallyBased,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Wraps any index onto the cycle.
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % PHASE_COUNT]
    }

    /// Steps `direction` phases forward (negative steps backward), wrapping.
    pub fn offset(self, direction: i32) -> Self {
        let n = PHASE_COUNT as i32;
        Self::from_index((self.index() as i32 + direction % n + n) as usize)
    }

    pub fn next(self) -> Self {
        self.offset(1)
    }

    pub fn info(self) -> &'static PhaseInfo {
        &PHASE_INFO[self.index()]
    }
}

/// Text shown by the phase-info overlay.
#[derive(Debug)]
pub struct PhaseInfo {
    pub label: &'static str,
    pub era: &'static str,
    pub description: &'static str,
}

pub static PHASE_INFO: [PhaseInfo; PHASE_COUNT] = [
    PhaseInfo {
        label: "Wireframe",
        era: "1960s-1970s",
        description: "Vector displays: edges only, no surfaces, no light.",
    },
    PhaseInfo {
        label: "Flat Shading",
        era: "1980s",
        description: "One colour per face, lit by a single directional light.",
    },
    PhaseInfo {
        label: "Environment Mapping",
        era: "1990s",
        description: "Textured surfaces, specular highlights and a reflected sky.",
    },
    PhaseInfo {
        label: "Advanced Lighting",
        era: "2000s",
        description: "Fog, bloom, volumetric light, lit windows and rain.",
    },
    PhaseInfo {
        label: "Physically Based",
        era: "2010s-today",
        description: "Metallic/roughness materials, HDR sky, wet streets and storms.",
    },
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub color: Vec3,
    pub weight: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub color: Vec3,
    /// Direction the light travels (towards the ground).
    pub direction: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub color: Vec3,
    pub intensity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub specular: Vec3,
    pub shininess: f32,
    pub metallic: f32,
    pub roughness: f32,
    pub reflectivity: f32,
    pub subsurface: f32,
}

impl Default for Material {
    /// Matte, non-reflective surface.
    fn default() -> Self {
        Self {
            specular: Vec3::ZERO,
            shininess: 1.0,
            metallic: 0.0,
            roughness: 1.0,
            reflectivity: 0.0,
            subsurface: 0.0,
        }
    }
}

/// A post-effect switch with its strength.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Toggle {
    pub enabled: bool,
    pub intensity: f32,
}

impl Toggle {
    pub const fn on(intensity: f32) -> Self {
        Self {
            enabled: true,
            intensity,
        }
    }

    /// Strength if enabled, otherwise zero.
    pub fn strength(&self) -> f32 {
        if self.enabled {
            self.intensity
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Effects {
    pub fog: Toggle,
    pub bloom: Toggle,
    pub volumetric: Toggle,
    pub window_lights: Toggle,
    pub hdr_background: Toggle,
    pub glow: Toggle,
}

/// Rendering parameters of one phase. `None` means "none of this kind", never "zero".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseStyle {
    pub stroke: Option<Stroke>,
    pub fill: Option<Vec3>,
    pub ambient: Option<Vec3>,
    pub directional: Option<DirectionalLight>,
    pub point: Option<PointLight>,
    pub material: Option<Material>,
    pub effects: Effects,
}

/// Immutable per-phase style lookup.
#[derive(Debug, Clone)]
pub struct StyleTable {
    styles: [PhaseStyle; PHASE_COUNT],
}

impl Default for StyleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleTable {
    pub fn new() -> Self {
        let sun = Vec3::new(-0.4, -1.0, -0.3).normalize();
        Self {
            styles: [
                PhaseStyle {
                    stroke: Some(Stroke {
                        color: Vec3::new(0.2, 1.0, 0.4),
                        weight: 1.0,
                    }),
                    fill: None,
                    ambient: None,
                    directional: None,
                    point: None,
                    material: None,
                    effects: Effects {
                        glow: Toggle::on(0.6),
                        ..Effects::default()
                    },
                },
                PhaseStyle {
                    stroke: None,
                    fill: Some(Vec3::new(0.72, 0.72, 0.76)),
                    ambient: Some(Vec3::new(0.35, 0.35, 0.4)),
                    directional: Some(DirectionalLight {
                        color: Vec3::new(0.9, 0.9, 0.85),
                        direction: sun,
                    }),
                    point: None,
                    material: Some(Material::default()),
                    effects: Effects::default(),
                },
                PhaseStyle {
                    stroke: None,
                    fill: Some(Vec3::new(0.65, 0.68, 0.75)),
                    ambient: Some(Vec3::new(0.3, 0.32, 0.38)),
                    directional: Some(DirectionalLight {
                        color: Vec3::new(1.0, 0.95, 0.85),
                        direction: sun,
                    }),
                    point: Some(PointLight {
                        color: Vec3::new(0.9, 0.85, 0.7),
                        intensity: 0.6,
                    }),
                    material: Some(Material {
                        specular: Vec3::new(0.6, 0.6, 0.65),
                        shininess: 24.0,
                        metallic: 0.2,
                        roughness: 0.5,
                        reflectivity: 0.45,
                        subsurface: 0.0,
                    }),
                    effects: Effects {
                        hdr_background: Toggle::on(0.8),
                        ..Effects::default()
                    },
                },
                PhaseStyle {
                    stroke: None,
                    fill: Some(Vec3::new(0.5, 0.52, 0.58)),
                    ambient: Some(Vec3::new(0.18, 0.2, 0.26)),
                    directional: Some(DirectionalLight {
                        color: Vec3::new(0.7, 0.75, 0.9),
                        direction: Vec3::new(0.3, -1.0, -0.5).normalize(),
                    }),
                    point: Some(PointLight {
                        color: Vec3::new(1.0, 0.8, 0.55),
                        intensity: 1.2,
                    }),
                    material: Some(Material {
                        specular: Vec3::new(0.8, 0.8, 0.85),
                        shininess: 48.0,
                        metallic: 0.1,
                        roughness: 0.35,
                        reflectivity: 0.3,
                        subsurface: 0.15,
                    }),
                    effects: Effects {
                        fog: Toggle::on(0.6),
                        bloom: Toggle::on(0.5),
                        volumetric: Toggle::on(0.7),
                        window_lights: Toggle::on(1.0),
                        ..Effects::default()
                    },
                },
                PhaseStyle {
                    stroke: None,
                    fill: Some(Vec3::new(0.6, 0.6, 0.62)),
                    ambient: Some(Vec3::new(0.25, 0.27, 0.32)),
                    directional: Some(DirectionalLight {
                        color: Vec3::new(1.0, 0.96, 0.9),
                        direction: sun,
                    }),
                    point: Some(PointLight {
                        color: Vec3::new(1.0, 0.9, 0.8),
                        intensity: 1.0,
                    }),
                    material: Some(Material {
                        specular: Vec3::ONE,
                        shininess: 64.0,
                        metallic: 0.35,
                        roughness: 0.4,
                        reflectivity: 0.6,
                        subsurface: 0.25,
                    }),
                    effects: Effects {
                        fog: Toggle::on(0.25),
                        bloom: Toggle::on(0.4),
                        window_lights: Toggle::on(0.8),
                        hdr_background: Toggle::on(1.0),
                        glow: Toggle::on(0.3),
                        ..Effects::default()
                    },
                },
            ],
        }
    }

    pub fn get(&self, phase: Phase) -> &PhaseStyle {
        &self.styles[phase.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_wrap_both_ways() {
        assert_eq!(Phase::PhysicallyBased.offset(1), Phase::Wireframe);
        assert_eq!(Phase::Wireframe.offset(-1), Phase::PhysicallyBased);
        assert_eq!(Phase::Flat.offset(-6), Phase::Wireframe);
        assert_eq!(Phase::from_index(7), Phase::EnvironmentMapped);
    }

    #[test]
    fn wireframe_phase_has_no_lights() {
        let table = StyleTable::new();
        let wire = table.get(Phase::Wireframe);
        assert!(wire.fill.is_none());
        assert!(wire.ambient.is_none());
        assert!(wire.directional.is_none());
        assert!(wire.stroke.is_some());
    }

    #[test]
    fn every_solid_phase_fills_and_lights() {
        let table = StyleTable::new();
        for phase in &Phase::ALL[1..] {
            let style = table.get(*phase);
            assert!(style.fill.is_some(), "{:?}", phase);
            assert!(style.ambient.is_some(), "{:?}", phase);
            assert!(style.material.is_some(), "{:?}", phase);
        }
    }
}
