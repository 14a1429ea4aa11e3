//! Depth of field
//!
//! Gather-based camera DoF at half resolution:
//!
//! ```text
//! color, depth ─► prepare ─► source/coc (mip 0) ─► downsample ×2 (mips 1, 2)
//!                                                        │
//!         color ◄─ resolve ◄─ blur 2 ◄─ blur 1 (49 taps) ◄┘
//! ```
//!
//! Only active for camera views with a finite aperture. While inactive the
//! pass owns no GPU resources at all.

use std::f32::consts::{FRAC_PI_4, PI, TAU};

use glam::{UVec2, Vec2, Vec3, Vec4};

use crate::errors::{Result, WorkbenchError};
use crate::renderer::backend::{GpuBackend, SamplerState, TextureDesc};
use crate::renderer::graph::{
    DrawState, Framebuffer, PassRecorder, PersistentTexture, PushConstant, RenderPass,
    TextureFromPool, UniformBuffer,
};
use crate::renderer::pipeline::UtilityShader;
use crate::renderer::resources::SceneResources;
use crate::renderer::state::SceneState;

pub const KERNEL_RADIUS: i32 = 3;
pub const SAMPLES_LEN: usize = ((KERNEL_RADIUS * 2 + 1) * (KERNEL_RADIUS * 2 + 1)) as usize;
/// Mips of the half-resolution source and circle-of-confusion targets.
const MIP_COUNT: u32 = 3;
/// Millimeters to scene units.
const SCALE_CAMERA: f32 = 0.001;

pub type DofSamples = [Vec4; SAMPLES_LEN];

const MIP_SAMPLER: SamplerState = SamplerState::LINEAR;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Aperture {
    blades: u32,
    rotation: f32,
    ratio: f32,
}

#[derive(Debug)]
pub struct DofPass {
    enabled: bool,

    aperture_size: f32,
    distance: f32,
    invsensor_size: f32,
    near: f32,
    far: f32,
    /// Noise offset, advanced with the TAA sample.
    offset: f32,
    aperture: Option<Aperture>,

    samples_buf: UniformBuffer<DofSamples>,
    source_tx: PersistentTexture,
    coc_tx: PersistentTexture,
    blur_tx: TextureFromPool,

    down_ps: RenderPass,
    down2_ps: [RenderPass; 2],
    blur_ps: RenderPass,
    blur2_ps: RenderPass,
    resolve_ps: RenderPass,

    downsample_fb: Framebuffer,
    down2_fb: [Framebuffer; 2],
    blur1_fb: Framebuffer,
    blur2_fb: Framebuffer,
    resolve_fb: Framebuffer,
}

impl Default for DofPass {
    fn default() -> Self {
        Self {
            enabled: false,
            aperture_size: 0.0,
            distance: 0.0,
            invsensor_size: 0.0,
            near: 0.0,
            far: 0.0,
            offset: 0.0,
            aperture: None,
            samples_buf: UniformBuffer::new("dof_samples", [Vec4::ZERO; SAMPLES_LEN]),
            source_tx: PersistentTexture::new(),
            coc_tx: PersistentTexture::new(),
            blur_tx: TextureFromPool::new("wb_dof_blur_tx"),
            down_ps: RenderPass::new("Dof.Prepare"),
            down2_ps: [
                RenderPass::new("Dof.Downsample1"),
                RenderPass::new("Dof.Downsample2"),
            ],
            blur_ps: RenderPass::new("Dof.Blur1"),
            blur2_ps: RenderPass::new("Dof.Blur2"),
            resolve_ps: RenderPass::new("Dof.Resolve"),
            downsample_fb: Framebuffer::new("dof_downsample_fb"),
            down2_fb: [
                Framebuffer::new("dof_downsample_mip1_fb"),
                Framebuffer::new("dof_downsample_mip2_fb"),
            ],
            blur1_fb: Framebuffer::new("dof_blur1_fb"),
            blur2_fb: Framebuffer::new("dof_blur2_fb"),
            resolve_fb: Framebuffer::new("dof_resolve_fb"),
        }
    }
}

impl DofPass {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives the lens parameters for the frame and (re)allocates the
    /// half-resolution targets. Frees everything when DoF is inactive.
    pub fn init(
        &mut self,
        backend: &mut dyn GpuBackend,
        scene_state: &SceneState,
        resources: &mut SceneResources,
        taa_sample: u32,
    ) -> Result<()> {
        let dof = scene_state
            .camera
            .active_dof()
            .copied()
            .filter(|_| scene_state.draw_dof);
        self.enabled = dof.is_some();
        let Some(dof) = dof else {
            self.free(backend);
            return Ok(());
        };

        let camera = &scene_state.camera;
        let focal_len = SCALE_CAMERA * camera.lens;
        let sensor = SCALE_CAMERA * camera.sensor_size;
        let fstop = dof.fstop.max(1e-5);
        let aperture = 0.5 * SCALE_CAMERA * camera.lens / fstop;

        // Focusing at the focal length puts the image plane at infinity.
        let focus_offset = (dof.focus_distance - focal_len).abs().max(1e-5);
        self.aperture_size = aperture * (focal_len / focus_offset).abs();
        self.distance = -dof.focus_distance;
        self.invsensor_size = scene_state.resolution.x as f32 / sensor;
        self.near = -camera.clip_start;
        self.far = -camera.clip_end;
        self.offset = if scene_state.aa_samples > 0 {
            taa_sample as f32 / scene_state.aa_samples as f32
        } else {
            0.0
        };

        let shape = Aperture {
            blades: dof.aperture_blades,
            rotation: dof.aperture_rotation,
            ratio: 1.0 / dof.aperture_ratio.max(1e-5),
        };
        if self.aperture != Some(shape) {
            setup_samples(&mut self.samples_buf.data, shape);
            self.samples_buf.push_update(backend)?;
            self.aperture = Some(shape);
        }

        let half_res = half_resolution(scene_state.resolution);
        self.source_tx.ensure_2d(
            backend,
            &TextureDesc::target("wb_dof_source_tx", half_res, wgpu::TextureFormat::Rgba16Float)
                .with_mips(MIP_COUNT),
        )?;
        self.coc_tx.ensure_2d(
            backend,
            &TextureDesc::target("wb_dof_coc_tx", half_res, wgpu::TextureFormat::Rg8Unorm)
                .with_mips(MIP_COUNT),
        )?;
        resources.cavity.ensure_jitter(backend)?;
        Ok(())
    }

    pub fn sync(
        &mut self,
        backend: &mut dyn GpuBackend,
        scene_state: &SceneState,
        resources: &mut SceneResources,
    ) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let inverted_size = scene_state.resolution.as_vec2().recip();
        let dof_params = Vec3::new(self.aperture_size, self.distance, self.invsensor_size);
        let near_far = Vec2::new(self.near, self.far);
        let shaders = &mut resources.shader_cache;

        let ps = &mut self.down_ps;
        ps.init();
        ps.state_set(DrawState::WRITE_COLOR);
        ps.shader_set(shaders.utility_shader_get(backend, UtilityShader::DofPrepare)?);
        ps.bind_texture("sceneColorTex", resources.color_tx.slot(), SamplerState::DEFAULT);
        ps.bind_texture("sceneDepthTex", resources.depth_tx.slot(), SamplerState::DEFAULT);
        ps.push_constant("invertedViewportSize", PushConstant::Vec2(inverted_size));
        ps.push_constant("dofParams", PushConstant::Vec3(dof_params));
        ps.push_constant("nearFar", PushConstant::Vec2(near_far));
        ps.draw_fullscreen();

        let downsample = shaders.utility_shader_get(backend, UtilityShader::DofDownsample)?;
        for (level, ps) in self.down2_ps.iter_mut().enumerate() {
            ps.init();
            ps.state_set(DrawState::WRITE_COLOR);
            ps.shader_set(downsample);
            ps.bind_texture("inputCocTex", self.coc_tx.slot(), MIP_SAMPLER);
            ps.bind_texture("colorBuffer", self.source_tx.slot(), MIP_SAMPLER);
            ps.push_constant("sourceLevel", PushConstant::Int(level as i32));
            ps.draw_fullscreen();
        }

        let ps = &mut self.blur_ps;
        ps.init();
        ps.state_set(DrawState::WRITE_COLOR);
        ps.shader_set(shaders.utility_shader_get(backend, UtilityShader::DofBlur1)?);
        ps.bind_ubo("samples", self.samples_buf.slot());
        ps.bind_texture("noiseTex", resources.cavity.jitter_slot(), SamplerState::NEAREST_REPEAT);
        ps.bind_texture("inputCocTex", self.coc_tx.slot(), MIP_SAMPLER);
        ps.bind_texture("halfResColorTex", self.source_tx.slot(), MIP_SAMPLER);
        ps.push_constant("invertedViewportSize", PushConstant::Vec2(inverted_size));
        ps.push_constant("noiseOffset", PushConstant::Float(self.offset));
        ps.draw_fullscreen();

        let ps = &mut self.blur2_ps;
        ps.init();
        ps.state_set(DrawState::WRITE_COLOR);
        ps.shader_set(shaders.utility_shader_get(backend, UtilityShader::DofBlur2)?);
        ps.bind_texture("inputCocTex", self.coc_tx.slot(), MIP_SAMPLER);
        ps.bind_texture("blurTex", self.blur_tx.slot(), SamplerState::DEFAULT);
        ps.push_constant("invertedViewportSize", PushConstant::Vec2(inverted_size));
        ps.draw_fullscreen();

        let ps = &mut self.resolve_ps;
        ps.init();
        ps.state_set(DrawState::WRITE_COLOR | DrawState::BLEND_ALPHA_PREMUL);
        ps.shader_set(shaders.utility_shader_get(backend, UtilityShader::DofResolve)?);
        ps.bind_texture("halfResColorTex", self.source_tx.slot(), MIP_SAMPLER);
        ps.bind_texture("sceneDepthTex", resources.depth_tx.slot(), SamplerState::DEFAULT);
        ps.push_constant("invertedViewportSize", PushConstant::Vec2(inverted_size));
        ps.push_constant("dofParams", PushConstant::Vec3(dof_params));
        ps.push_constant("nearFar", PushConstant::Vec2(near_far));
        ps.draw_fullscreen();
        Ok(())
    }

    pub fn draw(
        &mut self,
        backend: &mut dyn GpuBackend,
        scene_state: &SceneState,
        resources: &mut SceneResources,
    ) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let (Some(source), Some(coc)) = (self.source_tx.handle(), self.coc_tx.handle()) else {
            return Err(WorkbenchError::Configuration(
                "depth of field drawn before init".to_string(),
            ));
        };
        let color = super::acquired(&resources.color_tx, "color")?;
        let blur = self.blur_tx.acquire(
            &mut resources.pool,
            backend,
            &TextureDesc::target(
                "",
                half_resolution(scene_state.resolution),
                wgpu::TextureFormat::Rgba16Float,
            ),
        )?;

        let fb = self.downsample_fb.ensure(backend, None, &[source, coc])?;
        backend.submit_pass(fb, &self.down_ps);
        for (i, (fb, ps)) in self.down2_fb.iter_mut().zip(&self.down2_ps).enumerate() {
            let fb = fb.ensure_level(backend, None, &[source, coc], i as u32 + 1)?;
            backend.submit_pass(fb, ps);
        }

        let fb = self.blur1_fb.ensure(backend, None, &[blur])?;
        backend.submit_pass(fb, &self.blur_ps);

        let fb = self.blur2_fb.ensure(backend, None, &[source])?;
        backend.submit_pass(fb, &self.blur2_ps);

        let fb = self.resolve_fb.ensure(backend, None, &[color])?;
        backend.submit_pass(fb, &self.resolve_ps);

        self.blur_tx.release(&mut resources.pool);
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    #[must_use]
    pub fn samples(&self) -> &DofSamples {
        &self.samples_buf.data
    }

    /// `(aperture_size, distance, invsensor_size)` as sent to the shaders.
    #[must_use]
    pub fn params(&self) -> Vec3 {
        Vec3::new(self.aperture_size, self.distance, self.invsensor_size)
    }

    pub fn free(&mut self, backend: &mut dyn GpuBackend) {
        self.samples_buf.free(backend);
        self.source_tx.free(backend);
        self.coc_tx.free(backend);
        self.aperture = None;
        self.downsample_fb.free(backend);
        for fb in &mut self.down2_fb {
            fb.free(backend);
        }
        self.blur1_fb.free(backend);
        self.blur2_fb.free(backend);
        self.resolve_fb.free(backend);
    }
}

fn half_resolution(resolution: UVec2) -> UVec2 {
    (resolution / 2).max(UVec2::ONE)
}

/// Maps a point of the `[-1, 1]` square onto the unit disc, returning
/// `(radius, angle)`.
fn square_to_circle(x: f32, y: f32) -> (f32, f32) {
    if x > -y {
        if x > y {
            (x, FRAC_PI_4 * (y / x))
        } else {
            (y, FRAC_PI_4 * (2.0 - x / y))
        }
    } else if x < y {
        (-x, FRAC_PI_4 * (4.0 + y / x))
    } else if y != 0.0 {
        (-y, FRAC_PI_4 * (6.0 - x / y))
    } else {
        (-y, 0.0)
    }
}

/// Radius scale turning a circle into a regular polygon with `blades` sides.
fn circle_to_polygon_radius(blades: f32, theta: f32) -> f32 {
    let side_angle = TAU / blades;
    (side_angle * 0.5).cos() / (theta - side_angle * ((blades * theta + PI) / TAU).floor()).cos()
}

/// Fills the 49-tap kernel ring by ring: xy is the tap offset, z the
/// undistorted radius.
fn setup_samples(samples: &mut DofSamples, aperture: Aperture) {
    let mut index = 0;
    for ring in 0..=KERNEL_RADIUS {
        for j in -KERNEL_RADIUS..=KERNEL_RADIUS {
            for k in -KERNEL_RADIUS..=KERNEL_RADIUS {
                if j.abs() > ring || k.abs() > ring {
                    continue;
                }
                if j.abs() < ring && k.abs() < ring {
                    continue;
                }
                let coord = Vec2::new(j as f32, k as f32) / KERNEL_RADIUS as f32;
                let (mut r, mut theta) = square_to_circle(coord.x, coord.y);
                let z = r;
                if aperture.blades >= 3 {
                    r *= circle_to_polygon_radius(aperture.blades as f32, theta);
                }
                theta += aperture.rotation;
                samples[index] = Vec4::new(
                    r * theta.cos() * aperture.ratio,
                    r * theta.sin(),
                    z,
                    0.0,
                );
                index += 1;
            }
        }
    }
}
