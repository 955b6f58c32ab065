use std::time::Duration;

use approx::assert_abs_diff_eq;
use pretty_assertions::assert_eq;

use vcm::scene::Primitive;
use vcm::shapes::{Shape, Sphere};
use vcm::{
    point3f, render, vec3f, CameraSettings, Material, RayCastCamera, RenderSettings, Scene,
    Spectrum, UniformEnvironment,
};

#[test]
fn env_only_single_bounce_is_exact() -> anyhow::Result<()> {
    let scene = Scene::new(
        vec![],
        vec![],
        Box::new(UniformEnvironment::new(Spectrum::uniform(0.75))),
    );
    let framebuffer = render(&scene, &test_camera(), &test_settings(1, 2))?;

    // with nothing to hit, every camera path terminates on its first miss
    // and the estimator has a single deterministic term
    for pixel in framebuffer.pixels() {
        for channel in pixel.to_rgb() {
            assert_abs_diff_eq!(channel, 0.75, epsilon = 1e-6);
        }
    }

    Ok(())
}

#[test]
fn single_thread_render_is_bit_identical() -> anyhow::Result<()> {
    let settings = test_settings(4, 2);

    let first = render(&sphere_scene(), &test_camera(), &settings)?;
    let second = render(&sphere_scene(), &test_camera(), &settings)?;

    assert_eq!(first.pixels(), second.pixels());

    Ok(())
}

fn sphere_scene() -> Scene {
    Scene::new(
        vec![Primitive {
            shape: Shape::Sphere(Sphere::new(point3f!(0, 0, 0), 1.0)),
            material: 0,
        }],
        vec![Material::diffuse(Spectrum::uniform(0.5))],
        Box::new(UniformEnvironment::new(Spectrum::uniform(1.0))),
    )
}

fn test_camera() -> RayCastCamera {
    RayCastCamera::new(
        &CameraSettings {
            position: point3f!(0, 0, -4),
            look_at: point3f!(0, 0, 0),
            up: vec3f!(0, 1, 0),
            fov: 60.0,
        },
        8,
        8,
    )
}

fn test_settings(max_bounce: u32, iterations: u64) -> RenderSettings {
    RenderSettings {
        max_bounce_count: max_bounce,
        time_budget: Duration::from_secs(60),
        thread_count: 1,
        max_iterations: Some(iterations),
        ..Default::default()
    }
}
