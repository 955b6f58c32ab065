use crate::err_float::{next_float_down, next_float_up};
use crate::{Float, Point3f, Vec3f};
use cgmath::InnerSpace;
use std::ops::Deref;

pub fn distance(p1: Point3f, p2: Point3f) -> Float {
    (p1 - p2).magnitude()
}

pub struct Ray {
    pub origin: Point3f,
    pub dir: Vec3f,
    pub t_max: f32,
}

impl Ray {
    pub fn new(origin: Point3f, dir: Vec3f) -> Self {
        Self { origin, dir, t_max: f32::INFINITY }
    }

    pub fn with_t_max(origin: Point3f, dir: Vec3f, t_max: f32) -> Self {
        Self { origin, dir, t_max }
    }

    pub fn at(&self, t: f32) -> Point3f {
        self.origin + (self.dir * t)
    }
}

#[derive(Copy, Clone, Debug)]
pub struct Normal3(pub Vec3f);

impl Normal3 {
    pub fn new(x: Float, y: Float, z: Float) -> Self {
        Self(Vec3f::new(x, y, z))
    }

    pub fn faceforward(self, v: Vec3f) -> Self {
        if self.dot(v) < 0.0 {
            Self(-self.0)
        } else {
            self
        }
    }
}

impl Deref for Normal3 {
    type Target = Vec3f;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec3f> for Normal3 {
    fn from(v: Vec3f) -> Self {
        Self(v)
    }
}

impl From<Normal3> for Vec3f {
    fn from(n: Normal3) -> Self {
        n.0
    }
}

/// Offsets a ray origin off a surface along the geometric normal, on the
/// side `dir` leaves through, and nudges each offset component away from
/// the surface by one ulp. `error` is the hit's scalar error bound.
pub fn offset_ray_origin(p: Point3f, error: Float, n: Normal3, dir: Vec3f) -> Point3f {
    offset_ray_origin_biased(p, error, n, dir, 1.0).0
}

/// Like [`offset_ray_origin`] but with an explicit scale on the error bound.
/// Also returns the signed bias distance, which occlusion tests between two
/// surface points use to shrink their maximum distance.
pub fn offset_ray_origin_biased(
    p: Point3f,
    error: Float,
    n: Normal3,
    dir: Vec3f,
    bias_scale: Float,
) -> (Point3f, Float) {
    let side = if dir.dot(n.0) < 0.0 { -1.0 } else { 1.0 };
    let bias = side * error * bias_scale;
    let offset = bias * n.0;

    let mut po: Point3f = p + offset;
    for i in 0..3 {
        if offset[i] > 0.0 { po[i] = next_float_up(po[i]) }
        else if offset[i] < 0.0 { po[i] = next_float_down(po[i]) }
    }

    (po, bias)
}
