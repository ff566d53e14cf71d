//! Unit meshes for every shape and outline the compositor emits.

use std::f32::consts::TAU;

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::draw::{Outline, Shape};

const CONE_SEGMENTS: u32 = 16;
const CONE_OUTLINE_SPOKES: u32 = 4;
const SPHERE_RINGS: u32 = 16;
const SPHERE_SEGMENTS: u32 = 24;
const CIRCLE_SEGMENTS: u32 = 32;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }

    /// Position-only vertex for outlines.
    fn line(position: [f32; 3]) -> Self {
        Self::new(position, [0.0, 1.0, 0.0], [0.0, 0.0])
    }

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                // Position
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                // Normal
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                // UV
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 6]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

/// CPU-side geometry, triangles or line pairs depending on the generator.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn for_shape(shape: Shape) -> Self {
        match shape {
            Shape::Cube => Self::cube(),
            Shape::Cone => Self::cone(),
            Shape::Sphere => Self::sphere(),
            Shape::Disc => Self::disc(),
        }
    }

    pub fn for_outline(outline: Outline) -> Self {
        match outline {
            Outline::Cube => Self::cube_edges(),
            Outline::Cone => Self::cone_edges(),
            Outline::Segment => Self {
                vertices: vec![Vertex::line([0.0, 0.0, 0.0]), Vertex::line([0.0, -1.0, 0.0])],
                indices: vec![0, 1],
            },
            Outline::Ring => Self::ring(),
        }
    }

    /// Unit cube centered at the origin with per-face normals.
    pub fn cube() -> Self {
        let vertices = vec![
            // Front face
            Vertex::new([-0.5, -0.5, 0.5], [0.0, 0.0, 1.0], [0.0, 1.0]),
            Vertex::new([0.5, -0.5, 0.5], [0.0, 0.0, 1.0], [1.0, 1.0]),
            Vertex::new([0.5, 0.5, 0.5], [0.0, 0.0, 1.0], [1.0, 0.0]),
            Vertex::new([-0.5, 0.5, 0.5], [0.0, 0.0, 1.0], [0.0, 0.0]),
            // Back face
            Vertex::new([0.5, -0.5, -0.5], [0.0, 0.0, -1.0], [0.0, 1.0]),
            Vertex::new([-0.5, -0.5, -0.5], [0.0, 0.0, -1.0], [1.0, 1.0]),
            Vertex::new([-0.5, 0.5, -0.5], [0.0, 0.0, -1.0], [1.0, 0.0]),
            Vertex::new([0.5, 0.5, -0.5], [0.0, 0.0, -1.0], [0.0, 0.0]),
            // Top face
            Vertex::new([-0.5, 0.5, 0.5], [0.0, 1.0, 0.0], [0.0, 1.0]),
            Vertex::new([0.5, 0.5, 0.5], [0.0, 1.0, 0.0], [1.0, 1.0]),
            Vertex::new([0.5, 0.5, -0.5], [0.0, 1.0, 0.0], [1.0, 0.0]),
            Vertex::new([-0.5, 0.5, -0.5], [0.0, 1.0, 0.0], [0.0, 0.0]),
            // Bottom face
            Vertex::new([-0.5, -0.5, -0.5], [0.0, -1.0, 0.0], [0.0, 1.0]),
            Vertex::new([0.5, -0.5, -0.5], [0.0, -1.0, 0.0], [1.0, 1.0]),
            Vertex::new([0.5, -0.5, 0.5], [0.0, -1.0, 0.0], [1.0, 0.0]),
            Vertex::new([-0.5, -0.5, 0.5], [0.0, -1.0, 0.0], [0.0, 0.0]),
            // Right face
            Vertex::new([0.5, -0.5, 0.5], [1.0, 0.0, 0.0], [0.0, 1.0]),
            Vertex::new([0.5, -0.5, -0.5], [1.0, 0.0, 0.0], [1.0, 1.0]),
            Vertex::new([0.5, 0.5, -0.5], [1.0, 0.0, 0.0], [1.0, 0.0]),
            Vertex::new([0.5, 0.5, 0.5], [1.0, 0.0, 0.0], [0.0, 0.0]),
            // Left face
            Vertex::new([-0.5, -0.5, -0.5], [-1.0, 0.0, 0.0], [0.0, 1.0]),
            Vertex::new([-0.5, -0.5, 0.5], [-1.0, 0.0, 0.0], [1.0, 1.0]),
            Vertex::new([-0.5, 0.5, 0.5], [-1.0, 0.0, 0.0], [1.0, 0.0]),
            Vertex::new([-0.5, 0.5, -0.5], [-1.0, 0.0, 0.0], [0.0, 0.0]),
        ];

        #[rustfmt::skip]
        let indices = vec![
            0, 1, 2, 2, 3, 0,       // Front
            4, 5, 6, 6, 7, 4,       // Back
            8, 9, 10, 10, 11, 8,    // Top
            12, 13, 14, 14, 15, 12, // Bottom
            16, 17, 18, 18, 19, 16, // Right
            20, 21, 22, 22, 23, 20, // Left
        ];

        Self { vertices, indices }
    }

    /// Base radius 1 on y = 0, apex at y = 1, closed underneath.
    pub fn cone() -> Self {
        let mut mesh = Self::default();
        for i in 0..CONE_SEGMENTS {
            let a0 = i as f32 / CONE_SEGMENTS as f32 * TAU;
            let a1 = (i + 1) as f32 / CONE_SEGMENTS as f32 * TAU;
            let mid = (a0 + a1) * 0.5;
            let side = |a: f32| {
                let n = glam::Vec3::new(a.cos(), 1.0, a.sin()).normalize();
                [n.x, n.y, n.z]
            };
            let base = mesh.vertices.len() as u32;
            mesh.vertices.extend([
                Vertex::new([a0.cos(), 0.0, a0.sin()], side(a0), [a0 / TAU, 1.0]),
                Vertex::new([0.0, 1.0, 0.0], side(mid), [mid / TAU, 0.0]),
                Vertex::new([a1.cos(), 0.0, a1.sin()], side(a1), [a1 / TAU, 1.0]),
            ]);
            mesh.indices.extend([base, base + 1, base + 2]);
        }
        mesh.append_disc(0.0, [0.0, -1.0, 0.0]);
        mesh
    }

    /// Unit UV sphere; `u` wraps around y, `v` runs top to bottom.
    pub fn sphere() -> Self {
        let mut mesh = Self::default();
        for ring in 0..=SPHERE_RINGS {
            let v = ring as f32 / SPHERE_RINGS as f32;
            let theta = v * std::f32::consts::PI;
            for seg in 0..=SPHERE_SEGMENTS {
                let u = seg as f32 / SPHERE_SEGMENTS as f32;
                let phi = u * TAU;
                let p = [theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin()];
                mesh.vertices.push(Vertex::new(p, p, [u, v]));
            }
        }
        let stride = SPHERE_SEGMENTS + 1;
        for ring in 0..SPHERE_RINGS {
            for seg in 0..SPHERE_SEGMENTS {
                let a = ring * stride + seg;
                let b = a + stride;
                mesh.indices.extend([a, b, a + 1, a + 1, b, b + 1]);
            }
        }
        mesh
    }

    /// Unit disc in the xz plane facing up.
    pub fn disc() -> Self {
        let mut mesh = Self::default();
        mesh.append_disc(0.0, [0.0, 1.0, 0.0]);
        mesh
    }

    fn append_disc(&mut self, y: f32, normal: [f32; 3]) {
        let center = self.vertices.len() as u32;
        self.vertices.push(Vertex::new([0.0, y, 0.0], normal, [0.5, 0.5]));
        for i in 0..CIRCLE_SEGMENTS {
            let a = i as f32 / CIRCLE_SEGMENTS as f32 * TAU;
            self.vertices.push(Vertex::new(
                [a.cos(), y, a.sin()],
                normal,
                [0.5 + 0.5 * a.cos(), 0.5 + 0.5 * a.sin()],
            ));
        }
        for i in 0..CIRCLE_SEGMENTS {
            let a = center + 1 + i;
            let b = center + 1 + (i + 1) % CIRCLE_SEGMENTS;
            self.indices.extend([center, b, a]);
        }
    }

    pub fn cube_edges() -> Self {
        let vertices = (0..8)
            .map(|i| {
                let c = |bit: u32| if i & bit != 0 { 0.5 } else { -0.5 };
                Vertex::line([c(1), c(2), c(4)])
            })
            .collect();
        // Pairs of corners differing in exactly one bit.
        let mut indices = Vec::with_capacity(24);
        for a in 0..8u32 {
            for bit in [1, 2, 4] {
                if a & bit == 0 {
                    indices.extend([a, a | bit]);
                }
            }
        }
        Self { vertices, indices }
    }

    pub fn cone_edges() -> Self {
        let mut mesh = Self::circle(CONE_SEGMENTS);
        let apex = mesh.vertices.len() as u32;
        mesh.vertices.push(Vertex::line([0.0, 1.0, 0.0]));
        let step = CONE_SEGMENTS / CONE_OUTLINE_SPOKES;
        for spoke in 0..CONE_OUTLINE_SPOKES {
            mesh.indices.extend([spoke * step, apex]);
        }
        mesh
    }

    pub fn ring() -> Self {
        Self::circle(CIRCLE_SEGMENTS)
    }

    fn circle(segments: u32) -> Self {
        let vertices = (0..segments)
            .map(|i| {
                let a = i as f32 / segments as f32 * TAU;
                Vertex::line([a.cos(), 0.0, a.sin()])
            })
            .collect();
        let indices = (0..segments).flat_map(|i| [i, (i + 1) % segments]).collect();
        Self { vertices, indices }
    }
}

/// A GPU mesh with vertex and index buffers.
pub struct Mesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_indices: u32,
}

impl Mesh {
    pub fn new(device: &wgpu::Device, label: &str, data: &MeshData) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} Vertex Buffer")),
            contents: bytemuck::cast_slice(&data.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} Index Buffer")),
            contents: bytemuck::cast_slice(&data.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            vertex_buffer,
            index_buffer,
            num_indices: data.indices.len() as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn all_meshes() -> Vec<MeshData> {
        let shapes = [Shape::Cube, Shape::Cone, Shape::Sphere, Shape::Disc];
        let outlines = [Outline::Cube, Outline::Cone, Outline::Segment, Outline::Ring];
        shapes
            .into_iter()
            .map(MeshData::for_shape)
            .chain(outlines.into_iter().map(MeshData::for_outline))
            .collect()
    }

    #[test]
    fn indices_stay_in_bounds() {
        for mesh in all_meshes() {
            let n = mesh.vertices.len() as u32;
            assert!(!mesh.indices.is_empty());
            assert!(mesh.indices.iter().all(|&i| i < n));
        }
    }

    #[test]
    fn cube_edges_are_twelve_unit_lines() {
        let edges = MeshData::cube_edges();
        assert_eq!(edges.indices.len(), 24);
        for pair in edges.indices.chunks(2) {
            let a = glam::Vec3::from(edges.vertices[pair[0] as usize].position);
            let b = glam::Vec3::from(edges.vertices[pair[1] as usize].position);
            assert_relative_eq!(a.distance(b), 1.0);
        }
    }

    #[test]
    fn cone_spans_base_to_apex() {
        let cone = MeshData::cone();
        let ys = cone.vertices.iter().map(|v| v.position[1]);
        let (lo, hi) = ys.fold((f32::MAX, f32::MIN), |(lo, hi), y| (lo.min(y), hi.max(y)));
        assert_eq!((lo, hi), (0.0, 1.0));
    }

    #[test]
    fn sphere_normals_are_unit_length() {
        for v in MeshData::sphere().vertices {
            assert_relative_eq!(glam::Vec3::from(v.normal).length(), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn segment_hangs_below_the_origin() {
        let seg = MeshData::for_outline(Outline::Segment);
        assert_eq!(seg.vertices[1].position, [0.0, -1.0, 0.0]);
    }
}
