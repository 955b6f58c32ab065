use cgmath::InnerSpace;

use super::RenderSettings;
use crate::camera::RayCastCamera;
use crate::framebuffer::FramebufferWriter;
use crate::geometry::{offset_ray_origin, offset_ray_origin_biased};
use crate::hash_grid::HashGrid;
use crate::sampler::Sampler;
use crate::scene::{MaterialFlags, Scene};
use crate::shading::{compute_surface_parameters, SurfaceParameters};
use crate::{Float, Point3f, Ray, Spectrum, Vec3f, PI};

const SHADOW_BIAS_SCALE: Float = 0.1;

/// Per-pass weights derived from the progressive merge radius. The radius
/// shrinks as `baseRadius * i^((alpha - 1) / 2)`, so merging bias vanishes
/// as passes accumulate while `vm_weight * vc_weight == 1` holds on every
/// pass.
pub(crate) struct IterationConstants {
    pub radius: Float,
    pub vm_weight: Float,
    pub vc_weight: Float,
    pub vm_normalization: Float,
}

impl IterationConstants {
    pub fn new(
        iteration: u64,
        settings: &RenderSettings,
        scene_radius: Float,
        light_path_count: Float,
    ) -> Self {
        let base_radius = settings.radius_factor * scene_radius;
        let exponent = (settings.radius_alpha - 1.0) * 0.5;
        let radius = base_radius * (iteration as Float).powf(exponent);
        let eta_vcm = PI * radius * radius * light_path_count;

        Self {
            radius,
            vm_weight: eta_vcm,
            vc_weight: 1.0 / eta_vcm,
            vm_normalization: 1.0 / eta_vcm,
        }
    }
}

/// Walker state shared by the light and camera passes. `d_vcm`, `d_vc` and
/// `d_vm` are the running pdf ratios that let every strategy compute its
/// balance weight from local data alone.
struct PathState {
    origin: Point3f,
    direction: Vec3f,
    throughput: Spectrum,
    d_vcm: Float,
    d_vc: Float,
    d_vm: Float,
    path_length: u32,
    is_area_measure: bool,
}

/// Snapshot of one light-path vertex, kept for the connection and merging
/// strategies of the camera pass.
pub(crate) struct LightVertex {
    pub surface: SurfaceParameters,
    pub throughput: Spectrum,
    pub d_vcm: Float,
    pub d_vc: Float,
    pub d_vm: Float,
    pub path_length: u32,
}

/// All light-path vertices of one pass, flat, with per-path end offsets.
/// Positions are kept in a parallel array so the hash grid can build off a
/// contiguous slice; grid indices are indices into `vertices`.
#[derive(Default)]
pub(crate) struct LightPathSet {
    vertices: Vec<LightVertex>,
    positions: Vec<Point3f>,
    path_ends: Vec<u32>,
}

impl LightPathSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.positions.clear();
        self.path_ends.clear();
    }

    fn push(&mut self, vertex: LightVertex) {
        self.positions.push(vertex.surface.position);
        self.vertices.push(vertex);
    }

    fn finish_path(&mut self) {
        self.path_ends.push(self.vertices.len() as u32);
    }

    fn path(&self, index: usize) -> &[LightVertex] {
        let end = self.path_ends[index] as usize;
        let start = match index {
            0 => 0,
            i => self.path_ends[i - 1] as usize,
        };
        &self.vertices[start..end]
    }

    fn vertex(&self, index: u32) -> &LightVertex {
        &self.vertices[index as usize]
    }

    pub fn positions(&self) -> &[Point3f] {
        &self.positions
    }

    pub fn path_count(&self) -> usize {
        self.path_ends.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }
}

/// Everything one worker thread owns while rendering: the shared read-only
/// collaborators plus its private sampler and framebuffer writer.
pub(crate) struct KernelContext<'a> {
    pub scene: &'a Scene,
    pub camera: &'a RayCastCamera,
    pub sampler: Sampler,
    pub writer: FramebufferWriter<'a>,
    pub max_path_length: u32,
}

/// One full VCM pass: walk a light path per pixel, hash the stored vertices,
/// then walk a camera path per pixel consuming them.
pub(crate) fn vcm_iteration(
    ctx: &mut KernelContext<'_>,
    light_paths: &mut LightPathSet,
    grid: &mut HashGrid,
    constants: &IterationConstants,
) {
    let light_path_count = ctx.camera.pixel_count() as Float;

    light_paths.clear();
    for _ in 0..ctx.camera.pixel_count() {
        trace_light_path(ctx, light_paths, constants, light_path_count);
        light_paths.finish_path();
    }

    grid.build(light_paths.positions(), constants.radius);

    for y in 0..ctx.camera.height() {
        for x in 0..ctx.camera.width() {
            trace_camera_path(ctx, light_paths, grid, constants, light_path_count, x, y);
        }
    }
}

fn trace_light_path(
    ctx: &mut KernelContext<'_>,
    light_paths: &mut LightPathSet,
    constants: &IterationConstants,
    light_path_count: Float,
) {
    let (scene_center, scene_radius) = ctx.scene.bounding_sphere();
    let emission =
        ctx.scene
            .environment()
            .sample_emission(&mut ctx.sampler, scene_center, scene_radius);
    if emission.emission_pdf <= 0.0 || emission.radiance.is_black() {
        return;
    }

    let cos_term = emission.cos_at_light / emission.emission_pdf;
    let mut state = PathState {
        origin: emission.position,
        direction: emission.direction,
        throughput: emission.radiance / emission.emission_pdf,
        d_vcm: emission.direction_pdf / emission.emission_pdf,
        d_vc: cos_term,
        d_vm: cos_term * constants.vc_weight,
        path_length: 1,
        // the light sits at infinity, so the first hit stays in solid angle
        is_area_measure: false,
    };

    while state.path_length + 2 < ctx.max_path_length {
        let ray = Ray::new(state.origin, state.direction);
        let Some(hit) = ctx.scene.cast_ray(&ray) else {
            break;
        };
        let Some(surface) = compute_surface_parameters(ctx.scene, &hit, -state.direction) else {
            break;
        };

        update_on_hit(&mut state, &surface, hit.t);

        light_paths.push(LightVertex {
            surface,
            throughput: state.throughput,
            d_vcm: state.d_vcm,
            d_vc: state.d_vc,
            d_vm: state.d_vm,
            path_length: state.path_length,
        });

        connect_to_camera(ctx, &state, &surface, constants, light_path_count);

        if !scatter(&mut ctx.sampler, &surface, &mut state, constants) {
            break;
        }
    }
}

fn trace_camera_path(
    ctx: &mut KernelContext<'_>,
    light_paths: &LightPathSet,
    grid: &HashGrid,
    constants: &IterationConstants,
    light_path_count: Float,
    x: u32,
    y: u32,
) {
    let pixel = y * ctx.camera.width() + x;
    let ray = ctx.camera.jittered_ray(&mut ctx.sampler, x, y);

    let mut state = PathState {
        origin: ray.origin,
        direction: ray.dir,
        throughput: Spectrum::uniform(1.0),
        d_vcm: light_path_count / ctx.camera.image_plane_pdf(ray.dir),
        d_vc: 0.0,
        d_vm: 0.0,
        path_length: 1,
        is_area_measure: true,
    };
    let mut color = Spectrum::black();

    while state.path_length < ctx.max_path_length {
        let cast = Ray::new(state.origin, state.direction);
        let Some(hit) = ctx.scene.cast_ray(&cast) else {
            color += state.throughput * sky_radiance(ctx.scene, &state);
            break;
        };
        let Some(surface) = compute_surface_parameters(ctx.scene, &hit, -state.direction) else {
            break;
        };

        update_on_hit(&mut state, &surface, hit.t);

        if state.path_length + 1 < ctx.max_path_length {
            color += state.throughput
                * connect_to_environment(ctx.scene, &mut ctx.sampler, &surface, &state, constants);
        }

        // connect against the paired light path's vertices, shortest first
        for vertex in light_paths.path(pixel as usize) {
            if vertex.path_length + 1 + state.path_length > ctx.max_path_length {
                break;
            }
            color += state.throughput
                * vertex.throughput
                * connect_vertices(ctx.scene, vertex, &surface, &state, constants);
        }

        color += state.throughput
            * merge_contributions(
                grid,
                light_paths,
                &surface,
                &state,
                constants,
                ctx.max_path_length,
            );

        if !scatter(&mut ctx.sampler, &surface, &mut state, constants) {
            break;
        }
    }

    ctx.writer.write(pixel, color);
}

/// Moves the walker's pdf ratios into area measure at a fresh hit. The
/// very first hit of an environment-seeded light path skips the distance
/// term, its seed pdf being a solid-angle density.
fn update_on_hit(state: &mut PathState, surface: &SurfaceParameters, travel_distance: Float) {
    if state.path_length > 1 || state.is_area_measure {
        state.d_vcm *= travel_distance * travel_distance;
    }

    let cos_view = surface.shading_normal.dot(surface.view).abs();
    state.d_vcm /= cos_view;
    state.d_vc /= cos_view;
    state.d_vm /= cos_view;
}

/// Samples the next bounce direction and applies Russian roulette. Returns
/// false when the path terminates, either by rejection or by the roulette
/// draw; on survival both pdfs are scaled by the survival probability.
fn scatter(
    sampler: &mut Sampler,
    surface: &SurfaceParameters,
    state: &mut PathState,
    constants: &IterationConstants,
) -> bool {
    let Some(sample) = surface.sample_bsdf(sampler, surface.view) else {
        return false;
    };

    let continuation = surface.continuation_probability();
    if continuation <= 0.0 || sampler.get_1d() > continuation {
        return false;
    }
    let forward_pdf = sample.forward_pdf * continuation;
    let reverse_pdf = sample.reverse_pdf * continuation;

    let cos_theta = surface.shading_normal.dot(sample.direction).abs();

    state.d_vc = (cos_theta / forward_pdf)
        * (state.d_vc * reverse_pdf + state.d_vcm + constants.vm_weight);
    state.d_vm = (cos_theta / forward_pdf)
        * (state.d_vm * reverse_pdf + state.d_vcm * constants.vc_weight + 1.0);
    state.d_vcm = 1.0 / forward_pdf;

    state.throughput *= sample.reflectance * (cos_theta / forward_pdf);
    state.origin = offset_ray_origin(
        surface.position,
        surface.error,
        surface.geometric_normal,
        sample.direction,
    );
    state.direction = sample.direction;
    state.path_length += 1;
    state.is_area_measure = true;
    true
}

fn mis_weight(light_weight: Float, camera_weight: Float) -> Float {
    1.0 / (light_weight + 1.0 + camera_weight)
}

/// Camera ray escaped the scene. Length-1 paths see the sky directly with
/// no competing technique to weight against.
fn sky_radiance(scene: &Scene, state: &PathState) -> Spectrum {
    let (_, scene_radius) = scene.bounding_sphere();
    let env = scene.environment().evaluate(state.direction, scene_radius);
    if env.radiance.is_black() {
        return Spectrum::black();
    }
    if state.path_length == 1 {
        return env.radiance;
    }

    let light_weight = env.direct_pdf * state.d_vcm + env.emission_pdf * state.d_vc;
    env.radiance * mis_weight(light_weight, 0.0)
}

/// Light tracing contribution: splats the current light vertex onto the
/// image plane. Writes straight into the projected pixel rather than the
/// path's own index.
fn connect_to_camera(
    ctx: &mut KernelContext<'_>,
    state: &PathState,
    surface: &SurfaceParameters,
    constants: &IterationConstants,
    light_path_count: Float,
) {
    let camera = ctx.camera;
    let to_position = surface.position - camera.position;
    if camera.forward.dot(to_position) <= 0.0 {
        return;
    }

    let image = camera.world_to_image(surface.position);
    let x = image.x.floor();
    let y = image.y.floor();
    if x < 0.0 || y < 0.0 || x >= camera.width() as Float || y >= camera.height() as Float {
        return;
    }

    let dist_sq = to_position.magnitude2();
    let dist = dist_sq.sqrt();
    let to_camera = -to_position / dist;

    let eval = surface.evaluate_bsdf(surface.view, to_camera);
    if eval.reflectance.is_black() {
        return;
    }
    let reverse_pdf = eval.reverse_pdf * surface.continuation_probability();

    let cos_surface = surface.shading_normal.dot(to_camera).abs();
    let image_to_surface = camera.image_plane_pdf(to_position / dist) * cos_surface / dist_sq;
    let camera_pdf_area = image_to_surface;

    let light_weight = (camera_pdf_area / light_path_count)
        * (constants.vm_weight + state.d_vcm + state.d_vc * reverse_pdf);
    let mis = mis_weight(light_weight, 0.0);

    let (origin, _) = offset_ray_origin_biased(
        surface.position,
        surface.error,
        surface.geometric_normal,
        to_camera,
        SHADOW_BIAS_SCALE,
    );
    if ctx.scene.is_occluded(origin, to_camera, dist) {
        return;
    }

    let pixel = y as u32 * camera.width() + x as u32;
    let contribution =
        state.throughput * eval.reflectance * (mis * image_to_surface / light_path_count);
    ctx.writer.write(pixel, contribution);
}

/// Next event estimation at a camera vertex against the environment light.
fn connect_to_environment(
    scene: &Scene,
    sampler: &mut Sampler,
    surface: &SurfaceParameters,
    state: &PathState,
    constants: &IterationConstants,
) -> Spectrum {
    let (_, scene_radius) = scene.bounding_sphere();
    let sample = scene.environment().sample_direct(sampler, scene_radius);
    if sample.direction_pdf <= 0.0 || sample.radiance.is_black() {
        return Spectrum::black();
    }

    let eval = surface.evaluate_bsdf(surface.view, sample.direction);
    if eval.reflectance.is_black() {
        return Spectrum::black();
    }

    let cos_surface = surface.shading_normal.dot(sample.direction).abs();
    let light_weight = eval.forward_pdf / sample.direction_pdf;
    let camera_weight = (sample.emission_pdf * cos_surface
        / (sample.direction_pdf * sample.cos_at_light))
        * (constants.vm_weight + state.d_vcm + state.d_vc * eval.reverse_pdf);
    let mis = mis_weight(light_weight, camera_weight);

    let (origin, _) = offset_ray_origin_biased(
        surface.position,
        surface.error,
        surface.geometric_normal,
        sample.direction,
        SHADOW_BIAS_SCALE,
    );
    if scene.is_occluded(origin, sample.direction, sample.distance) {
        return Spectrum::black();
    }

    sample.radiance * eval.reflectance * (mis * cos_surface / sample.direction_pdf)
}

/// Deterministic connection between a camera vertex and one stored light
/// vertex. The caller multiplies in both throughputs.
fn connect_vertices(
    scene: &Scene,
    vertex: &LightVertex,
    surface: &SurfaceParameters,
    state: &PathState,
    constants: &IterationConstants,
) -> Spectrum {
    let span = vertex.surface.position - surface.position;
    let dist_sq = span.magnitude2();
    if dist_sq < 1e-12 {
        return Spectrum::black();
    }
    let dist = dist_sq.sqrt();
    let to_light = span / dist;

    let camera_eval = surface.evaluate_bsdf(surface.view, to_light);
    if camera_eval.reflectance.is_black() {
        return Spectrum::black();
    }
    let light_eval = vertex.surface.evaluate_bsdf(vertex.surface.view, -to_light);
    if light_eval.reflectance.is_black() {
        return Spectrum::black();
    }

    let cos_camera = surface.shading_normal.dot(to_light).abs();
    let cos_light = vertex.surface.shading_normal.dot(-to_light).abs();
    let geometry = cos_light * cos_camera / dist_sq;
    if geometry <= 0.0 {
        return Spectrum::black();
    }

    let camera_pdf_area = camera_eval.forward_pdf * cos_light / dist_sq;
    let light_pdf_area = light_eval.forward_pdf * cos_camera / dist_sq;

    let light_weight = camera_pdf_area
        * (constants.vm_weight + vertex.d_vcm + vertex.d_vc * light_eval.reverse_pdf);
    let camera_weight = light_pdf_area
        * (constants.vm_weight + state.d_vcm + state.d_vc * camera_eval.reverse_pdf);
    let mis = mis_weight(light_weight, camera_weight);

    let (origin, bias) = offset_ray_origin_biased(
        surface.position,
        surface.error,
        surface.geometric_normal,
        to_light,
        SHADOW_BIAS_SCALE,
    );
    // back the far end off, it sits on a surface of its own
    let max_distance = dist - 16.0 * bias.abs();
    if scene.is_occluded(origin, to_light, max_distance) {
        return Spectrum::black();
    }

    camera_eval.reflectance * light_eval.reflectance * (mis * geometry)
}

/// Density-estimation merge over every stored light vertex within the merge
/// radius of the camera vertex. No occlusion test: proximity stands in for
/// visibility, which is what the radius schedule drives to zero.
fn merge_contributions(
    grid: &HashGrid,
    light_paths: &LightPathSet,
    surface: &SurfaceParameters,
    state: &PathState,
    constants: &IterationConstants,
    max_path_length: u32,
) -> Spectrum {
    let mut sum = Spectrum::black();
    grid.for_each_in_radius(surface.position, |index| {
        let vertex = light_paths.vertex(index);
        if state.path_length + vertex.path_length > max_path_length {
            return;
        }
        // opaque and transparent vertices never merge
        if vertex.surface.flags.contains(MaterialFlags::TRANSPARENT)
            != surface.flags.contains(MaterialFlags::TRANSPARENT)
        {
            return;
        }

        let eval = surface.evaluate_bsdf(surface.view, vertex.surface.view);
        if eval.reflectance.is_black() {
            return;
        }

        let light_weight = vertex.d_vcm * constants.vc_weight + vertex.d_vm * eval.forward_pdf;
        let camera_weight = state.d_vcm * constants.vc_weight + state.d_vm * eval.reverse_pdf;
        let mis = mis_weight(light_weight, camera_weight);

        sum += eval.reflectance * vertex.throughput * mis;
    });

    sum * constants.vm_normalization
}
