#[macro_use] pub mod macros; // must stay at the top
pub mod camera;
pub mod err_float;
pub mod framebuffer;
pub mod geometry;
pub mod hash_grid;
pub mod integrator;
pub mod lights;
pub mod math;
pub mod sampler;
pub mod sampling;
pub mod scene;
pub mod shading;
pub mod shapes;
pub mod spectrum;

pub use geometry::*;
pub use camera::{CameraSettings, RayCastCamera};
pub use framebuffer::Framebuffer;
pub use integrator::{render, RenderSettings};
pub use lights::{EnvironmentLight, GradientEnvironment, UniformEnvironment};
pub use sampler::Sampler;
pub use scene::{Material, MaterialFlags, Scene};
pub use spectrum::Spectrum;

pub type Float = f32;

pub type Point2f = cgmath::Point2<Float>;
pub type Point2i = cgmath::Point2<i32>;
pub type Point3f = cgmath::Point3<Float>;
pub type Vec2f = cgmath::Vector2<Float>;
pub type Vec3f = cgmath::Vector3<Float>;

pub const PI: Float = std::f32::consts::PI;
pub const INV_PI: Float = std::f32::consts::FRAC_1_PI;
pub const INV_4_PI: Float = 1.0 / (4.0 * PI);
pub const FLOAT_MAX: Float = f32::MAX;
