use crate::{Float, Point2f, Vec2f, Vec3f, INV_4_PI, INV_PI, PI};
use std::f32;

pub fn concentric_sample_disk(u: Point2f) -> Point2f {
    // map sample from [0, 1] to [-1, 1]
    let u_offset = 2.0 * u - Vec2f::new(1.0, 1.0);
    if u_offset == Point2f::new(0.0, 0.0) {
        return Point2f::new(0.0, 0.0);
    }

    let (r, theta) = if u_offset.x.abs() > u_offset.y.abs() {
        (u_offset.x, f32::consts::FRAC_PI_4 * (u_offset.y / u_offset.x))
    } else {
        (u_offset.y, f32::consts::FRAC_PI_2 - f32::consts::FRAC_PI_4 * (u_offset.x / u_offset.y))
    };

    r * Point2f::new(theta.cos(), theta.sin())
}

/// Pdf of [`concentric_sample_disk`] with respect to area on the unit disc.
pub fn concentric_disk_pdf() -> Float {
    INV_PI
}

pub fn cosine_sample_hemisphere(u: Point2f) -> Vec3f {
    let d = concentric_sample_disk(u);
    let z = Float::sqrt(Float::max(0.0, 1.0 - d.x * d.x - d.y * d.y));
    Vec3f::new(d.x, d.y, z)
}

pub fn cosine_hemisphere_pdf(cos_theta: Float) -> Float {
    cos_theta * INV_PI
}

pub fn uniform_sample_sphere(u: Point2f) -> Vec3f {
    let z = 1.0 - 2.0 * u.x;
    let r = Float::sqrt(Float::max(0.0, 1.0 - z * z));
    let phi = 2.0 * PI * u.y;
    Vec3f::new(r * phi.cos(), r * phi.sin(), z)
}

pub fn uniform_sphere_pdf() -> Float {
    INV_4_PI
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sampler::Sampler;
    use approx::assert_abs_diff_eq;
    use cgmath::{EuclideanSpace, InnerSpace};

    #[test]
    fn test_disk_samples_inside_unit_disk() {
        let mut sampler = Sampler::new_with_seed(1);
        for _ in 0..1000 {
            let d = concentric_sample_disk(sampler.get_2d());
            assert!(d.to_vec().magnitude() <= 1.0 + 1e-6);
        }
    }

    #[test]
    fn test_disk_center_maps_to_center() {
        let d = concentric_sample_disk(Point2f::new(0.5, 0.5));
        assert_eq!(d, Point2f::new(0.0, 0.0));
    }

    #[test]
    fn test_cosine_hemisphere_upper() {
        let mut sampler = Sampler::new_with_seed(2);
        for _ in 0..1000 {
            let w = cosine_sample_hemisphere(sampler.get_2d());
            assert!(w.z >= 0.0);
            assert_abs_diff_eq!(w.magnitude(), 1.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_uniform_sphere_unit_length() {
        let mut sampler = Sampler::new_with_seed(3);
        for _ in 0..1000 {
            let w = uniform_sample_sphere(sampler.get_2d());
            assert_abs_diff_eq!(w.magnitude(), 1.0, epsilon = 1e-4);
        }
    }
}
