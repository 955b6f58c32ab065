use crate::math::coordinate_system;
use crate::sampler::Sampler;
use crate::sampling::{cosine_hemisphere_pdf, cosine_sample_hemisphere};
use crate::scene::{HitRecord, MaterialFlags, Scene};
use crate::{Float, Normal3, Point2f, Point3f, Spectrum, Vec3f, INV_PI};
use cgmath::InnerSpace;

/// Everything the integrator needs to shade one hit point: the resolved
/// geometry of the hit plus the material data looked up for it.
#[derive(Clone, Copy)]
pub struct SurfaceParameters {
    pub position: Point3f,
    pub geometric_normal: Normal3,
    pub shading_normal: Normal3,
    /// Unit direction back toward the previous path vertex.
    pub view: Vec3f,
    pub error: Float,
    pub uv: Point2f,
    pub prim_id: u32,
    pub albedo: Spectrum,
    pub flags: MaterialFlags,
}

/// BSDF value for a fixed direction pair, with the pdfs of sampling the
/// outgoing direction forward (from `v`) and reverse (from `l`). The value
/// carries no cosine; estimators apply their own geometry factors.
pub struct BsdfEval {
    pub reflectance: Spectrum,
    pub forward_pdf: Float,
    pub reverse_pdf: Float,
}

impl BsdfEval {
    fn zero() -> Self {
        Self {
            reflectance: Spectrum::black(),
            forward_pdf: 0.0,
            reverse_pdf: 0.0,
        }
    }
}

/// Importance-sampled scattering direction with the same pdf pair as
/// [`BsdfEval`].
pub struct BsdfSample {
    pub direction: Vec3f,
    pub reflectance: Spectrum,
    pub forward_pdf: Float,
    pub reverse_pdf: Float,
}

/// Resolves a hit into shading data. `view` must point back along the
/// casting ray. Returns `None` for degenerate geometry, which terminates
/// the path (never an error).
pub fn compute_surface_parameters(
    scene: &Scene,
    hit: &HitRecord,
    view: Vec3f,
) -> Option<SurfaceParameters> {
    let n = hit.normal;
    let len_sq = n.magnitude2();
    if !len_sq.is_finite() || len_sq < 1e-12 {
        return None;
    }

    let material = scene.material(hit.prim_id);
    Some(SurfaceParameters {
        position: hit.position,
        geometric_normal: n,
        shading_normal: n,
        view,
        error: hit.error,
        uv: hit.uv,
        prim_id: hit.prim_id,
        albedo: material.albedo,
        flags: material.flags,
    })
}

impl SurfaceParameters {
    /// Lambert reflection between view direction `v` and light direction
    /// `l`, both pointing away from the surface. Zero whenever either lies
    /// under the shading hemisphere.
    pub fn evaluate_bsdf(&self, v: Vec3f, l: Vec3f) -> BsdfEval {
        let n = self.shading_normal;
        let dot_nl = n.dot(l);
        let dot_nv = n.dot(v);
        if dot_nl <= 0.0 || dot_nv <= 0.0 {
            return BsdfEval::zero();
        }

        BsdfEval {
            reflectance: self.albedo * INV_PI,
            forward_pdf: cosine_hemisphere_pdf(dot_nl),
            reverse_pdf: cosine_hemisphere_pdf(dot_nv),
        }
    }

    /// Cosine-hemisphere scattering around the shading normal.
    pub fn sample_bsdf(&self, sampler: &mut Sampler, v: Vec3f) -> Option<BsdfSample> {
        let n = self.shading_normal;
        let dot_nv = n.dot(v);
        if dot_nv <= 0.0 {
            return None;
        }

        let local = cosine_sample_hemisphere(sampler.get_2d());
        let (t, b) = coordinate_system(n.0);
        let l = (local.x * t + local.y * b + local.z * n.0).normalize();
        let dot_nl = n.dot(l);
        if dot_nl <= 0.0 {
            return None;
        }

        Some(BsdfSample {
            direction: l,
            reflectance: self.albedo * INV_PI,
            forward_pdf: cosine_hemisphere_pdf(dot_nl),
            reverse_pdf: cosine_hemisphere_pdf(dot_nv),
        })
    }

    /// Russian-roulette survival probability.
    pub fn continuation_probability(&self) -> Float {
        Float::min(self.albedo.average(), 1.0)
    }
}
