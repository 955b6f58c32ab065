use crate::math::coordinate_system;
use crate::sampler::Sampler;
use crate::sampling::{
    concentric_disk_pdf, concentric_sample_disk, uniform_sample_sphere, uniform_sphere_pdf,
};
use crate::{Float, Point3f, Spectrum, Vec3f, FLOAT_MAX};
use crate::math::lerp;
use cgmath::InnerSpace;

/// Sample of an emitted light ray, used to seed light paths.
pub struct EmissionSample {
    pub position: Point3f,
    pub direction: Vec3f,
    pub radiance: Spectrum,
    /// Pdf of choosing the emission direction (solid angle at the receiver).
    pub direction_pdf: Float,
    /// Joint pdf of the emitted ray (position x direction).
    pub emission_pdf: Float,
    pub cos_at_light: Float,
}

/// Sample of a direction toward the light, used for next-event estimation.
pub struct DirectSample {
    pub direction: Vec3f,
    pub radiance: Spectrum,
    pub direction_pdf: Float,
    pub emission_pdf: Float,
    pub cos_at_light: Float,
    pub distance: Float,
}

/// Radiance looked up for an escaped ray, with the pdfs the sampling
/// strategies would have assigned to that direction.
pub struct EnvironmentRadiance {
    pub radiance: Spectrum,
    pub direct_pdf: Float,
    pub emission_pdf: Float,
}

/// Infinitely distant light surrounding the scene. Emission is modeled from
/// a virtual disc on the scene bounding sphere, which is where the bounding
/// radius in the pdfs below comes from.
///
/// This is the only light kind the integrator samples today; an area-light
/// sampler would be a second implementor of this seam.
pub trait EnvironmentLight: Send + Sync {
    fn radiance(&self, dir: Vec3f) -> Spectrum;

    fn sample_emission(
        &self,
        sampler: &mut Sampler,
        scene_center: Point3f,
        scene_radius: Float,
    ) -> EmissionSample {
        let to_light = uniform_sample_sphere(sampler.get_2d());
        let (dx, dz) = coordinate_system(to_light);
        let disc = concentric_sample_disk(sampler.get_2d());

        let position =
            scene_center + scene_radius * (to_light + disc.x * dx + disc.y * dz);
        let direction_pdf = uniform_sphere_pdf();
        let disc_pdf = concentric_disk_pdf() / (scene_radius * scene_radius);

        EmissionSample {
            position,
            direction: -to_light,
            radiance: self.radiance(to_light),
            direction_pdf,
            emission_pdf: direction_pdf * disc_pdf,
            cos_at_light: 1.0,
        }
    }

    fn sample_direct(&self, sampler: &mut Sampler, scene_radius: Float) -> DirectSample {
        let direction = uniform_sample_sphere(sampler.get_2d());
        let direction_pdf = uniform_sphere_pdf();
        let disc_pdf = concentric_disk_pdf() / (scene_radius * scene_radius);

        DirectSample {
            direction,
            radiance: self.radiance(direction),
            direction_pdf,
            emission_pdf: direction_pdf * disc_pdf,
            cos_at_light: 1.0,
            distance: FLOAT_MAX,
        }
    }

    fn evaluate(&self, dir: Vec3f, scene_radius: Float) -> EnvironmentRadiance {
        let direct_pdf = uniform_sphere_pdf();
        let disc_pdf = concentric_disk_pdf() / (scene_radius * scene_radius);

        EnvironmentRadiance {
            radiance: self.radiance(dir),
            direct_pdf,
            emission_pdf: direct_pdf * disc_pdf,
        }
    }
}

/// Constant radiance in every direction.
pub struct UniformEnvironment {
    radiance: Spectrum,
}

impl UniformEnvironment {
    pub fn new(radiance: Spectrum) -> Self {
        Self { radiance }
    }
}

impl EnvironmentLight for UniformEnvironment {
    fn radiance(&self, _dir: Vec3f) -> Spectrum {
        self.radiance
    }
}

/// Vertical gradient sky, nadir to zenith.
pub struct GradientEnvironment {
    nadir: Spectrum,
    zenith: Spectrum,
}

impl GradientEnvironment {
    pub fn new(nadir: Spectrum, zenith: Spectrum) -> Self {
        Self { nadir, zenith }
    }

    /// The usual demo sky: white toward the ground, light blue overhead.
    pub fn sky() -> Self {
        Self::new(Spectrum::uniform(1.0), Spectrum::from([0.5, 0.7, 1.0]))
    }
}

impl EnvironmentLight for GradientEnvironment {
    fn radiance(&self, dir: Vec3f) -> Spectrum {
        // scale so t is between 0.0 and 1.0
        let t = 0.5 * (dir.normalize().y + 1.0);
        Spectrum::new_with(|i| lerp(t, self.nadir[i], self.zenith[i]))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::PI;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_emission_pdf_couples_direction_and_disc() {
        let light = UniformEnvironment::new(Spectrum::uniform(2.0));
        let mut sampler = Sampler::new_with_seed(5);
        let radius = 10.0;

        for _ in 0..100 {
            let sample = light.sample_emission(&mut sampler, point3f!(0, 0, 0), radius);
            assert_abs_diff_eq!(
                sample.emission_pdf,
                sample.direction_pdf / (PI * radius * radius),
                epsilon = 1e-8
            );
            assert_eq!(sample.cos_at_light, 1.0);

            // emitted rays start on the bounding sphere's far shell and point inward
            let offset = sample.position - point3f!(0, 0, 0);
            assert!(offset.magnitude() >= radius - 1e-3);
            assert!(offset.magnitude() <= radius * 2.0f32.sqrt() + 1e-3);
            assert!(sample.direction.dot(offset) < 0.0);
        }
    }

    #[test]
    fn test_direct_sample_matches_evaluate() {
        let light = GradientEnvironment::sky();
        let mut sampler = Sampler::new_with_seed(6);
        let radius = 3.0;

        for _ in 0..100 {
            let sample = light.sample_direct(&mut sampler, radius);
            let eval = light.evaluate(sample.direction, radius);
            assert_eq!(sample.radiance, eval.radiance);
            assert_abs_diff_eq!(sample.direction_pdf, eval.direct_pdf, epsilon = 1e-10);
            assert_abs_diff_eq!(sample.emission_pdf, eval.emission_pdf, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_gradient_interpolates_vertically() {
        let light = GradientEnvironment::new(Spectrum::black(), Spectrum::uniform(1.0));
        assert_abs_diff_eq!(light.radiance(vec3f!(0, 1, 0))[0], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(light.radiance(vec3f!(0, -1, 0))[0], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(light.radiance(vec3f!(1, 0, 0))[0], 0.5, epsilon = 1e-6);
    }
}
