use crate::{Float, Normal3, Point2f, Point3f, Ray, Vec3f, INV_PI, PI};
use cgmath::InnerSpace;

/// Rejection threshold for hits too close to the ray origin. Origins are
/// already offset off surfaces; this guards residual self-intersection.
pub const MIN_HIT_DISTANCE: Float = 1e-5;

/// Shape-level intersection record. The scene layer turns this into a full
/// `HitRecord` by attaching primitive ids and error bounds.
pub struct ShapeHit {
    pub t: Float,
    pub position: Point3f,
    pub normal: Normal3,
    pub uv: Point2f,
}

#[derive(Clone, Copy, Debug)]
pub enum Shape {
    Sphere(Sphere),
    Quad(Quad),
}

impl Shape {
    pub fn intersect(&self, ray: &Ray) -> Option<ShapeHit> {
        match self {
            Shape::Sphere(s) => s.intersect(ray),
            Shape::Quad(q) => q.intersect(ray),
        }
    }

    pub fn bounding_sphere(&self) -> (Point3f, Float) {
        match self {
            Shape::Sphere(s) => (s.center, s.radius),
            Shape::Quad(q) => q.bounding_sphere(),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Sphere {
    pub center: Point3f,
    pub radius: Float,
}

impl Sphere {
    pub fn new(center: Point3f, radius: Float) -> Self {
        Self { center, radius }
    }

    pub fn intersect(&self, ray: &Ray) -> Option<ShapeHit> {
        let oc = ray.origin - self.center;
        let a = ray.dir.magnitude2();
        let half_b = oc.dot(ray.dir);
        let c = oc.magnitude2() - self.radius * self.radius;

        let discrim = half_b * half_b - a * c;
        if discrim < 0.0 {
            return None;
        }
        let sqrt_d = discrim.sqrt();

        let t0 = (-half_b - sqrt_d) / a;
        let t1 = (-half_b + sqrt_d) / a;
        let t = if t0 > MIN_HIT_DISTANCE { t0 } else { t1 };
        if t <= MIN_HIT_DISTANCE || t > ray.t_max {
            return None;
        }

        // reproject onto the sphere to cut down accumulated error
        let radial = (ray.at(t) - self.center).normalize();
        let position = self.center + radial * self.radius;

        let theta = radial.z.clamp(-1.0, 1.0).acos();
        let phi = Float::atan2(radial.y, radial.x).rem_euclid(2.0 * PI);
        let uv = Point2f::new(phi * 0.5 * INV_PI, theta * INV_PI);

        Some(ShapeHit {
            t,
            position,
            normal: Normal3::from(radial),
            uv,
        })
    }
}

/// Planar parallelogram spanned by two edge vectors from a corner point.
#[derive(Clone, Copy, Debug)]
pub struct Quad {
    pub corner: Point3f,
    pub edge_u: Vec3f,
    pub edge_v: Vec3f,
    normal: Vec3f,
    inv_len_u_sq: Float,
    inv_len_v_sq: Float,
}

impl Quad {
    pub fn new(corner: Point3f, edge_u: Vec3f, edge_v: Vec3f) -> Self {
        let normal = edge_u.cross(edge_v).normalize();
        Self {
            corner,
            edge_u,
            edge_v,
            normal,
            inv_len_u_sq: 1.0 / edge_u.magnitude2(),
            inv_len_v_sq: 1.0 / edge_v.magnitude2(),
        }
    }

    pub fn intersect(&self, ray: &Ray) -> Option<ShapeHit> {
        let denom = ray.dir.dot(self.normal);
        if denom.abs() < 1e-9 {
            return None;
        }

        let t = (self.corner - ray.origin).dot(self.normal) / denom;
        if t <= MIN_HIT_DISTANCE || t > ray.t_max {
            return None;
        }

        let position = ray.at(t);
        let d = position - self.corner;
        let u = d.dot(self.edge_u) * self.inv_len_u_sq;
        let v = d.dot(self.edge_v) * self.inv_len_v_sq;
        if !(0.0..=1.0).contains(&u) || !(0.0..=1.0).contains(&v) {
            return None;
        }

        Some(ShapeHit {
            t,
            position,
            normal: Normal3::from(self.normal),
            uv: Point2f::new(u, v),
        })
    }

    pub fn bounding_sphere(&self) -> (Point3f, Float) {
        let half_diag = (self.edge_u + self.edge_v) * 0.5;
        let center = self.corner + half_diag;
        let radius = Float::max(
            half_diag.magnitude(),
            ((self.edge_u - self.edge_v) * 0.5).magnitude(),
        );
        (center, radius)
    }
}
