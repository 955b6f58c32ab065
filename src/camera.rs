use crate::sampler::Sampler;
use crate::{Float, Point2f, Point3f, Ray, Vec3f};
use cgmath::InnerSpace;

pub struct CameraSettings {
    pub position: Point3f,
    pub look_at: Point3f,
    pub up: Vec3f,
    /// Horizontal field of view in degrees.
    pub fov: Float,
}

/// Pinhole camera over a pixel grid. The virtual image plane sits at a
/// distance (in pixel units) that gives every pixel unit area, so the
/// image-plane pdf of a primary ray is exactly 1 and all solid-angle
/// conversions reduce to [`RayCastCamera::image_plane_pdf`].
pub struct RayCastCamera {
    pub position: Point3f,
    pub forward: Vec3f,
    right: Vec3f,
    up: Vec3f,
    width: u32,
    height: u32,
    virtual_image_plane_distance: Float,
}

impl RayCastCamera {
    pub fn new(settings: &CameraSettings, width: u32, height: u32) -> Self {
        let forward = (settings.look_at - settings.position).normalize();
        let right = forward.cross(settings.up).normalize();
        let up = right.cross(forward);

        let half_fov = settings.fov.to_radians() * 0.5;
        let virtual_image_plane_distance = width as Float / (2.0 * half_fov.tan());

        Self {
            position: settings.position,
            forward,
            right,
            up,
            width,
            height,
            virtual_image_plane_distance,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_count(&self) -> u32 {
        self.width * self.height
    }

    /// Primary ray through a uniformly jittered position inside pixel
    /// `(x, y)`.
    pub fn jittered_ray(&self, sampler: &mut Sampler, x: u32, y: u32) -> Ray {
        let vx = x as Float + sampler.get_1d() - self.width as Float * 0.5;
        let vy = self.height as Float * 0.5 - (y as Float + sampler.get_1d());

        let dir = (self.forward * self.virtual_image_plane_distance
            + self.right * vx
            + self.up * vy)
            .normalize();
        Ray::new(self.position, dir)
    }

    /// Projects a world point onto the pixel grid. Only valid for points in
    /// front of the camera; callers test that and the viewport bounds.
    pub fn world_to_image(&self, p: Point3f) -> Point2f {
        let v = p - self.position;
        let z = v.dot(self.forward);
        let scale = self.virtual_image_plane_distance / z;

        Point2f::new(
            v.dot(self.right) * scale + self.width as Float * 0.5,
            self.height as Float * 0.5 - v.dot(self.up) * scale,
        )
    }

    /// Solid-angle pdf of the camera generating a ray along unit `dir`,
    /// under the unit-pixel-area image plane. `dir` must face the camera
    /// forward half-space.
    pub fn image_plane_pdf(&self, dir: Vec3f) -> Float {
        let cos_at_camera = self.forward.dot(dir);
        let image_point_distance = self.virtual_image_plane_distance / cos_at_camera;
        (image_point_distance * image_point_distance) / cos_at_camera
    }
}
