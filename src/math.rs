//! Math utilities: transforms, easing and interpolation.

use glam::{Mat4, Quat, Vec3};

/// Represents a 3D transformation
#[derive(Debug, Clone, Copy)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    /// Create a new transform
    pub fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Axis-aligned box of the given size centred at `position`.
    pub fn boxed(position: Vec3, size: Vec3) -> Self {
        Self::new(position, Quat::IDENTITY, size)
    }

    /// Returns a copy rotated about `pivot` (world space).
    pub fn rotated_about(&self, pivot: Vec3, rotation: Quat) -> Self {
        Self {
            position: pivot + rotation * (self.position - pivot),
            rotation: rotation * self.rotation,
            scale: self.scale,
        }
    }

    /// Generate transformation matrix
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

/// Interpolate so that `t == 0` yields `a` and `t == 1` yields `b` bit-for-bit.
pub fn mix(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

/// Component-wise [`mix`].
pub fn mix_vec3(a: Vec3, b: Vec3, t: f32) -> Vec3 {
    Vec3::new(mix(a.x, b.x, t), mix(a.y, b.y, t), mix(a.z, b.z, t))
}

/// Maps `value` from `[start, end]` onto `[0, 1]`, clamped.
pub fn normalize(value: f32, start: f32, end: f32) -> f32 {
    if end <= start {
        return 1.0;
    }
    ((value - start) / (end - start)).clamp(0.0, 1.0)
}

pub fn ease_in_out_cubic(x: f32) -> f32 {
    let x = x.clamp(0.0, 1.0);
    if x < 0.5 {
        4.0 * x * x * x
    } else {
        1.0 - (-2.0 * x + 2.0).powi(3) / 2.0
    }
}

pub fn ease_out_quart(x: f32) -> f32 {
    let x = x.clamp(0.0, 1.0);
    1.0 - (1.0 - x).powi(4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn mix_hits_endpoints_exactly() {
        let (a, b) = (0.123_456_7_f32, 987.654_3_f32);
        assert_eq!(mix(a, b, 0.0).to_bits(), a.to_bits());
        assert_eq!(mix(a, b, 1.0).to_bits(), b.to_bits());
        assert_relative_eq!(mix(0.0, 10.0, 0.25), 2.5);
    }

    #[test]
    fn easing_curves_are_anchored() {
        for ease in [ease_in_out_cubic, ease_out_quart] {
            assert_eq!(ease(0.0), 0.0);
            assert_eq!(ease(1.0), 1.0);
            assert!(ease(0.3) < ease(0.6));
        }
        assert_relative_eq!(ease_in_out_cubic(0.5), 0.5);
    }

    #[test]
    fn normalize_clamps_outside_range() {
        assert_eq!(normalize(-5.0, 0.0, 10.0), 0.0);
        assert_eq!(normalize(15.0, 0.0, 10.0), 1.0);
        assert_relative_eq!(normalize(620.0 + 90.0, 620.0, 800.0), 0.5);
    }

    #[test]
    fn rotating_about_pivot_moves_position() {
        let t = Transform::boxed(Vec3::new(1.0, 0.0, 0.0), Vec3::ONE);
        let r = t.rotated_about(Vec3::ZERO, Quat::from_rotation_y(std::f32::consts::FRAC_PI_2));
        assert_relative_eq!(r.position.z, -1.0, epsilon = 1e-6);
        assert_relative_eq!(r.position.x, 0.0, epsilon = 1e-6);
    }
}
