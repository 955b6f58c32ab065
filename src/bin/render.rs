use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use vcm::scene::Primitive;
use vcm::shapes::{Quad, Shape, Sphere};
use vcm::{
    point3f, render, vec3f, CameraSettings, GradientEnvironment, Material, RayCastCamera,
    RenderSettings, Scene, Spectrum, UniformEnvironment,
};

#[derive(Parser, Debug)]
#[command(about = "Progressive VCM render of a built-in scene")]
struct Args {
    /// Output EXR path
    #[arg(short, long, default_value = "render.exr")]
    output: PathBuf,

    /// Built-in scene to render
    #[arg(long, value_enum, default_value = "demo")]
    scene: ScenePreset,

    #[arg(long, default_value_t = 256)]
    width: u32,

    #[arg(long, default_value_t = 256)]
    height: u32,

    /// Seconds to keep accumulating passes
    #[arg(short = 't', long, default_value_t = 30.0)]
    seconds: f64,

    #[arg(long, default_value_t = 10)]
    max_bounce: u32,

    /// Initial merge radius as a fraction of the scene bounding radius
    #[arg(long, default_value_t = 0.0025)]
    radius_factor: f32,

    /// Radius reduction exponent in (0, 1]
    #[arg(long, default_value_t = 0.75)]
    radius_alpha: f32,

    /// Worker threads, 0 for one per logical cpu
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// Stop after this many passes even if time remains
    #[arg(long)]
    iterations: Option<u64>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ScenePreset {
    /// Floor and three diffuse spheres under a gradient sky
    Demo,
    /// Single gray sphere in a uniform white environment
    Furnace,
}

impl ScenePreset {
    fn build(self) -> (Scene, CameraSettings) {
        match self {
            ScenePreset::Demo => demo_scene(),
            ScenePreset::Furnace => furnace_scene(),
        }
    }
}

fn demo_scene() -> (Scene, CameraSettings) {
    let primitives = vec![
        Primitive {
            shape: Shape::Quad(Quad::new(
                point3f!(-4, 0, -4),
                vec3f!(0, 0, 8),
                vec3f!(8, 0, 0),
            )),
            material: 0,
        },
        Primitive {
            shape: Shape::Sphere(Sphere::new(point3f!(0, 1, 0.3), 1.0)),
            material: 1,
        },
        Primitive {
            shape: Shape::Sphere(Sphere::new(point3f!(-2.1, 0.7, 1.0), 0.7)),
            material: 2,
        },
        Primitive {
            shape: Shape::Sphere(Sphere::new(point3f!(1.9, 0.5, 1.4), 0.5)),
            material: 3,
        },
    ];
    let materials = vec![
        Material::diffuse(Spectrum::uniform(0.7)),
        Material::diffuse(Spectrum::from([0.75, 0.35, 0.25])),
        Material::diffuse(Spectrum::from([0.3, 0.45, 0.8])),
        Material::diffuse(Spectrum::uniform(0.85)),
    ];

    let scene = Scene::new(primitives, materials, Box::new(GradientEnvironment::sky()));
    let camera = CameraSettings {
        position: point3f!(0, 1.6, -5.5),
        look_at: point3f!(0, 0.8, 0),
        up: vec3f!(0, 1, 0),
        fov: 55.0,
    };
    (scene, camera)
}

fn furnace_scene() -> (Scene, CameraSettings) {
    let scene = Scene::new(
        vec![Primitive {
            shape: Shape::Sphere(Sphere::new(point3f!(0, 0, 0), 1.0)),
            material: 0,
        }],
        vec![Material::diffuse(Spectrum::uniform(0.5))],
        Box::new(UniformEnvironment::new(Spectrum::uniform(1.0))),
    );
    let camera = CameraSettings {
        position: point3f!(0, 0, -4),
        look_at: point3f!(0, 0, 0),
        up: vec3f!(0, 1, 0),
        fov: 45.0,
    };
    (scene, camera)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let (scene, camera_settings) = args.scene.build();
    let camera = RayCastCamera::new(&camera_settings, args.width, args.height);

    let settings = RenderSettings {
        max_bounce_count: args.max_bounce,
        time_budget: Duration::from_secs_f64(args.seconds),
        radius_factor: args.radius_factor,
        radius_alpha: args.radius_alpha,
        thread_count: args.threads,
        max_iterations: args.iterations,
    };

    let framebuffer = render(&scene, &camera, &settings)?;

    let width = framebuffer.width() as usize;
    let height = framebuffer.height() as usize;
    let pixels = framebuffer.to_rgb();
    exr::prelude::write_rgb_file(&args.output, width, height, |x, y| {
        let [r, g, b] = pixels[y * width + x];
        (r, g, b)
    })
    .with_context(|| format!("writing {}", args.output.display()))?;

    Ok(())
}
