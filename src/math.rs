use crate::{Float, Vec3f};
use cgmath::InnerSpace;

pub fn lerp(t: Float, v1: Float, v2: Float) -> Float {
    (1.0 - t) * v1 + t * v2
}

/// Builds the two vectors completing an orthonormal basis around `v1`,
/// which must be normalized.
pub fn coordinate_system(v1: Vec3f) -> (Vec3f, Vec3f) {
    let v2 = if v1.x.abs() > v1.y.abs() {
        Vec3f::new(-v1.z, 0.0, v1.x) / (v1.x * v1.x + v1.z * v1.z).sqrt()
    } else {
        Vec3f::new(0.0, v1.z, -v1.y) / (v1.y * v1.y + v1.z * v1.z).sqrt()
    };
    let v3 = v1.cross(v2);
    (v2, v3)
}
