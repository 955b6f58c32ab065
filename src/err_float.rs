use crate::{Float, Point3f};

pub const MACHINE_EPSILON: f32 = f32::EPSILON * 0.5;

pub fn next_float_up(mut v: f32) -> f32 {
    if v == f32::INFINITY { return v; }

    if v == -0.0 { v = 0.0 }

    let bits = v.to_bits();
    let bits = if v >= 0.0 { bits + 1 } else { bits - 1 };
    f32::from_bits(bits)
}

pub fn next_float_down(mut v: f32) -> f32 {
    if v == f32::NEG_INFINITY { return v; }

    if v == 0.0 { v = -0.0 }

    let bits = v.to_bits();
    let bits = if v >= 0.0 { bits - 1 } else { bits + 1 };
    f32::from_bits(bits)
}

/// Conservative bound on the float rounding error of an intersection point,
/// in terms of the hit position's magnitude and the ray parameter.
pub fn hit_error_bound(p: Point3f, t: Float) -> Float {
    let err = 32.0 * MACHINE_EPSILON;
    err * Float::max(
        Float::max(p.x.abs(), p.y.abs()),
        Float::max(p.z.abs(), t),
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_next_float_brackets() {
        let v = 1.0f32;
        assert!(next_float_up(v) > v);
        assert!(next_float_down(v) < v);
        assert_eq!(next_float_up(next_float_down(v)), v);
    }

    #[test]
    fn test_hit_error_grows_with_magnitude() {
        let near = hit_error_bound(point3f!(1, 1, 1), 1.0);
        let far = hit_error_bound(point3f!(1000, 1, 1), 1000.0);
        assert!(far > near);
        assert!(near > 0.0);
    }
}
