use crate::err_float::hit_error_bound;
use crate::lights::EnvironmentLight;
use crate::shapes::Shape;
use crate::{Float, Normal3, Point2f, Point3f, Ray, Spectrum, Vec3f};
use bitflags::bitflags;
use cgmath::InnerSpace;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct MaterialFlags: u32 {
        /// Marks thin translucent surfaces. Vertex merging refuses to mix
        /// vertices whose transparency classification differs, which would
        /// otherwise ring at their silhouettes.
        const TRANSPARENT = 1 << 0;
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Material {
    pub albedo: Spectrum,
    pub flags: MaterialFlags,
}

impl Material {
    pub fn diffuse(albedo: Spectrum) -> Self {
        Self { albedo, flags: MaterialFlags::empty() }
    }

    pub fn with_flags(albedo: Spectrum, flags: MaterialFlags) -> Self {
        Self { albedo, flags }
    }
}

pub struct Primitive {
    pub shape: Shape,
    pub material: u32,
}

/// Nearest-hit record produced by [`Scene::cast_ray`].
pub struct HitRecord {
    pub position: Point3f,
    pub normal: Normal3,
    pub t: Float,
    pub error: Float,
    pub uv: Point2f,
    pub prim_id: u32,
}

/// Immutable scene: analytic primitives, their materials, and one
/// environment light. Queries are read-only and safe to share across
/// worker threads.
pub struct Scene {
    primitives: Vec<Primitive>,
    materials: Vec<Material>,
    environment: Box<dyn EnvironmentLight>,
    bounds_center: Point3f,
    bounds_radius: Float,
}

impl Scene {
    pub fn new(
        primitives: Vec<Primitive>,
        materials: Vec<Material>,
        environment: Box<dyn EnvironmentLight>,
    ) -> Self {
        let (bounds_center, bounds_radius) = bounding_sphere_of(&primitives);
        Self {
            primitives,
            materials,
            environment,
            bounds_center,
            bounds_radius,
        }
    }

    pub fn cast_ray(&self, ray: &Ray) -> Option<HitRecord> {
        let mut nearest: Option<(u32, crate::shapes::ShapeHit)> = None;
        let mut t_max = ray.t_max;

        for (id, prim) in self.primitives.iter().enumerate() {
            let clipped = Ray::with_t_max(ray.origin, ray.dir, t_max);
            if let Some(hit) = prim.shape.intersect(&clipped) {
                t_max = hit.t;
                nearest = Some((id as u32, hit));
            }
        }

        nearest.map(|(prim_id, hit)| HitRecord {
            error: hit_error_bound(hit.position, hit.t),
            position: hit.position,
            normal: hit.normal,
            t: hit.t,
            uv: hit.uv,
            prim_id,
        })
    }

    pub fn is_occluded(&self, origin: Point3f, dir: Vec3f, max_distance: Float) -> bool {
        let ray = Ray::with_t_max(origin, dir, max_distance);
        self.primitives
            .iter()
            .any(|prim| prim.shape.intersect(&ray).is_some())
    }

    /// Material bound to a primitive. Primitives may share materials.
    pub fn material(&self, prim_id: u32) -> &Material {
        &self.materials[self.primitives[prim_id as usize].material as usize]
    }

    pub fn environment(&self) -> &dyn EnvironmentLight {
        self.environment.as_ref()
    }

    /// Sphere enclosing all primitives; light-path seeding and the merge
    /// radius schedule are both expressed in terms of it.
    pub fn bounding_sphere(&self) -> (Point3f, Float) {
        (self.bounds_center, self.bounds_radius)
    }
}

fn bounding_sphere_of(primitives: &[Primitive]) -> (Point3f, Float) {
    let mut iter = primitives.iter().map(|p| p.shape.bounding_sphere());
    let Some((mut center, mut radius)) = iter.next() else {
        return (Point3f::new(0.0, 0.0, 0.0), 1.0);
    };

    for (c, r) in iter {
        let d = (c - center).magnitude();
        if radius >= d + r {
            continue;
        }
        if r >= d + radius {
            center = c;
            radius = r;
            continue;
        }
        let merged = (d + radius + r) * 0.5;
        center += (c - center) * ((merged - radius) / d);
        radius = merged;
    }

    (center, radius)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lights::UniformEnvironment;
    use crate::shapes::Sphere;
    use approx::assert_abs_diff_eq;

    fn two_sphere_scene() -> Scene {
        let primitives = vec![
            Primitive {
                shape: Shape::Sphere(Sphere::new(point3f!(0, 0, 4), 1.0)),
                material: 0,
            },
            Primitive {
                shape: Shape::Sphere(Sphere::new(point3f!(0, 0, 10), 1.0)),
                material: 0,
            },
        ];
        let materials = vec![Material::diffuse(Spectrum::uniform(0.5))];
        Scene::new(
            primitives,
            materials,
            Box::new(UniformEnvironment::new(Spectrum::uniform(1.0))),
        )
    }

    #[test]
    fn test_nearest_hit_wins() {
        let scene = two_sphere_scene();
        let hit = scene
            .cast_ray(&Ray::new(point3f!(0, 0, 0), vec3f!(0, 0, 1)))
            .unwrap();
        assert_eq!(hit.prim_id, 0);
        assert_abs_diff_eq!(hit.t, 3.0, epsilon = 1e-5);
        assert!(hit.error > 0.0);
    }

    #[test]
    fn test_shared_material_resolves_through_primitive() {
        let scene = two_sphere_scene();
        assert_eq!(scene.material(1).albedo, Spectrum::uniform(0.5));
    }

    #[test]
    fn test_occlusion_respects_max_distance() {
        let scene = two_sphere_scene();
        let origin = point3f!(0, 0, 0);
        let dir = vec3f!(0, 0, 1);

        assert!(scene.is_occluded(origin, dir, 100.0));
        assert!(!scene.is_occluded(origin, dir, 2.0));
    }

    #[test]
    fn test_bounding_sphere_encloses_primitives() {
        let scene = two_sphere_scene();
        let (center, radius) = scene.bounding_sphere();

        for p in [point3f!(0, 0, 3), point3f!(0, 0, 11), point3f!(1, 0, 4)] {
            assert!((p - center).magnitude() <= radius + 1e-4);
        }
    }

    #[test]
    fn test_empty_scene_fallback_bounds() {
        let scene = Scene::new(
            vec![],
            vec![],
            Box::new(UniformEnvironment::new(Spectrum::uniform(1.0))),
        );
        let (_, radius) = scene.bounding_sphere();
        assert_eq!(radius, 1.0);
        assert!(scene
            .cast_ray(&Ray::new(point3f!(0, 0, 0), vec3f!(0, 0, 1)))
            .is_none());
    }
}
