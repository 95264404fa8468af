use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

use super::context::Capabilities;
use super::draw::{DepthFunc, DrawBackend, DrawCommand};
use super::matrices::GameMatrices;
use super::targets::{RenderTargetTextures, TargetFactory, TargetSpec};

/// Texture unit the shadow map is bound to while receivers are drawn.
pub const SHADOW_TEXTURE_UNIT: u32 = 3;

const LIGHT_FOV_DEGREES: f32 = 45.0;
const POLYGON_OFFSET: (f32, f32) = (4.0, 15.0);
const MIN_LIGHT_NEAR: f32 = 0.1;
const MIN_EXTENT: f32 = 1e-4;

/// Shadow data in the layout the unit shader expects.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ShadowUniform {
    pub light_view_proj: [[f32; 4]; 4],
    pub texture_matrix: [[f32; 4]; 4],
}

/// Light frustum fitted around the part of the view that casts or receives
/// shadows.
#[derive(Clone, Copy, Debug)]
pub struct ShadowFrustumFit {
    /// Compact view frustum corners, BLF, BRF, BRN, BLN, TLF, TRF, TRN, TLN.
    pub corners: [Vec3; 8],
    pub light_view: Mat4,
    /// Includes the scale/translate that maps the corners onto the unit cube.
    pub light_projection: Mat4,
    pub light_near: f32,
    pub light_far: f32,
}

fn shadow_up(direction: Vec3) -> Vec3 {
    if direction.dot(Vec3::Z).abs() > 0.999 {
        Vec3::Y
    } else {
        Vec3::Z
    }
}

impl ShadowFrustumFit {
    /// `depth_range` is measured from the camera's near plane.
    pub fn compute(
        matrices: &GameMatrices,
        light_position: Vec3,
        depth_range: (f32, f32),
    ) -> Option<Self> {
        let (near_offset, far_offset) = depth_range;
        let compact = matrices
            .frustum_with_range(matrices.near + near_offset, matrices.near + far_offset);
        let corners = compact.corners()?;

        let focus = matrices.look_at;
        let direction = (focus - light_position).try_normalize()?;

        let mut light_near = f32::MAX;
        let mut light_far = f32::MIN;
        for corner in &corners {
            let distance = (*corner - light_position).dot(direction);
            light_near = light_near.min(distance);
            light_far = light_far.max(distance);
        }
        let light_near = light_near.max(MIN_LIGHT_NEAR);
        let light_far = light_far.max(light_near + MIN_LIGHT_NEAR);

        let light_view = Mat4::look_at_rh(light_position, focus, shadow_up(direction));
        let projection =
            Mat4::perspective_rh(LIGHT_FOV_DEGREES.to_radians(), 1.0, light_near, light_far);

        let view_projection = projection * light_view;
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        for corner in &corners {
            let p = view_projection.project_point3(*corner);
            min = min.min(p);
            max = max.max(p);
        }

        let extent = (max - min).max(Vec3::splat(MIN_EXTENT));
        let mid = (min + max) * 0.5;
        // x and y onto [-1, 1], z onto the [0, 1] depth range
        let scale = Vec3::new(2.0 / extent.x, 2.0 / extent.y, 1.0 / extent.z);
        let translate = Vec3::new(-mid.x * scale.x, -mid.y * scale.y, -min.z * scale.z);
        let fit = Mat4::from_translation(translate) * Mat4::from_scale(scale);

        Some(Self {
            corners,
            light_view,
            light_projection: fit * projection,
            light_near,
            light_far,
        })
    }

    pub fn view_projection(&self) -> Mat4 {
        self.light_projection * self.light_view
    }

    /// World position to shadow texture coordinates: `u, v` in `[0, 1]`
    /// with `v` pointing down, `z` the light depth.
    pub fn texture_matrix(&self) -> Mat4 {
        let bias = Mat4::from_cols(
            Vec4::new(0.5, 0.0, 0.0, 0.0),
            Vec4::new(0.0, -0.5, 0.0, 0.0),
            Vec4::new(0.0, 0.0, 1.0, 0.0),
            Vec4::new(0.5, 0.5, 0.0, 1.0),
        );
        bias * self.view_projection()
    }

    pub fn uniform(&self) -> ShadowUniform {
        ShadowUniform {
            light_view_proj: self.view_projection().to_cols_array_2d(),
            texture_matrix: self.texture_matrix().to_cols_array_2d(),
        }
    }
}

/// Owns the shadow depth texture and the per-frame light fit.
#[derive(Debug)]
pub struct ShadowMapGenerator {
    resolution: u32,
    target: Option<RenderTargetTextures>,
    target_resolution: u32,
    // resolution whose allocation last failed, retried only once it changes
    failed_resolution: Option<u32>,
    fit: Option<ShadowFrustumFit>,
}

impl ShadowMapGenerator {
    pub fn new(resolution: u32) -> Self {
        Self {
            resolution,
            target: None,
            target_resolution: 0,
            failed_resolution: None,
            fit: None,
        }
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Takes effect on the next shadow pass.
    pub fn set_resolution(&mut self, resolution: u32) {
        self.resolution = resolution;
    }

    pub fn fit(&self) -> Option<&ShadowFrustumFit> {
        self.fit.as_ref()
    }

    pub fn target(&self) -> Option<&RenderTargetTextures> {
        self.target.as_ref()
    }

    fn ensure_target(&mut self, factory: &mut dyn TargetFactory) -> Option<RenderTargetTextures> {
        if self.target.is_some() && self.target_resolution == self.resolution {
            return self.target;
        }
        if self.failed_resolution == Some(self.resolution) {
            return None;
        }
        if let Some(old) = self.target.take() {
            factory.destroy_target(&old);
        }
        let spec = TargetSpec::new(self.resolution, self.resolution, true);
        match factory.create_target(spec) {
            Ok(target) => {
                log::debug!("Created {}x{} shadow map", self.resolution, self.resolution);
                self.target = Some(target);
                self.target_resolution = self.resolution;
                self.failed_resolution = None;
                self.target
            }
            Err(err) => {
                log::warn!(
                    "{}x{} shadow map unavailable ({}). Shadows stay off until the resolution changes.",
                    self.resolution,
                    self.resolution,
                    err
                );
                self.failed_resolution = Some(self.resolution);
                None
            }
        }
    }

    /// Fits the light frustum and binds the shadow target for a depth-only
    /// pass. Returns false when the pass must be skipped.
    pub fn begin_pass(
        &mut self,
        backend: &mut dyn DrawBackend,
        factory: &mut dyn TargetFactory,
        capabilities: Capabilities,
        matrices: &GameMatrices,
        light_position: Vec3,
        depth_range: (f32, f32),
    ) -> bool {
        self.fit = None;
        if !capabilities.shadow_maps {
            return false;
        }
        let Some(target) = self.ensure_target(factory) else {
            return false;
        };
        let Some(fit) = ShadowFrustumFit::compute(matrices, light_position, depth_range) else {
            log::warn!("Degenerate light frustum, skipping shadow pass");
            return false;
        };
        self.fit = Some(fit);

        backend.submit(DrawCommand::SetRenderTarget(Some(target.id)));
        backend.submit(DrawCommand::SetViewport {
            x: 0,
            y: 0,
            width: self.resolution,
            height: self.resolution,
        });
        backend.submit(DrawCommand::Clear {
            color: Some(Vec4::ZERO),
            depth: true,
        });
        backend.submit(DrawCommand::SetDepthTest(Some(DepthFunc::LessEqual)));
        backend.submit(DrawCommand::SetDepthWrite(true));
        backend.submit(DrawCommand::SetColorWrite(false));
        backend.submit(DrawCommand::SetPolygonOffset(Some(POLYGON_OFFSET)));
        backend.submit(DrawCommand::SetLighting(false));
        backend.submit(DrawCommand::SetProjection(fit.light_projection));
        backend.submit(DrawCommand::SetView(fit.light_view));
        true
    }

    /// Restores the camera state after the depth-only pass.
    pub fn end_pass(&self, backend: &mut dyn DrawBackend, matrices: &GameMatrices) {
        backend.submit(DrawCommand::SetPolygonOffset(None));
        backend.submit(DrawCommand::SetColorWrite(true));
        backend.submit(DrawCommand::SetRenderTarget(None));
        backend.submit(DrawCommand::SetViewport {
            x: matrices.viewport.x,
            y: matrices.viewport.y,
            width: matrices.viewport.width,
            height: matrices.viewport.height,
        });
        backend.submit(DrawCommand::SetProjection(matrices.projection));
        backend.submit(DrawCommand::SetView(matrices.view));
    }

    /// Binds the shadow map for comparison sampling. No-op without a fit.
    pub fn activate(&self, backend: &mut dyn DrawBackend) -> bool {
        let (Some(target), Some(fit)) = (self.target, self.fit) else {
            return false;
        };
        let Some(depth) = target.depth else {
            return false;
        };
        backend.submit(DrawCommand::BindTexture {
            unit: SHADOW_TEXTURE_UNIT,
            texture: Some(depth),
        });
        backend.submit(DrawCommand::SetShadowCompare {
            unit: SHADOW_TEXTURE_UNIT,
            enabled: true,
        });
        backend.submit(DrawCommand::SetTextureMatrix {
            unit: SHADOW_TEXTURE_UNIT,
            matrix: fit.texture_matrix(),
        });
        true
    }

    pub fn deactivate(&self, backend: &mut dyn DrawBackend) {
        backend.submit(DrawCommand::SetShadowCompare {
            unit: SHADOW_TEXTURE_UNIT,
            enabled: false,
        });
        backend.submit(DrawCommand::SetTextureMatrix {
            unit: SHADOW_TEXTURE_UNIT,
            matrix: Mat4::IDENTITY,
        });
        backend.submit(DrawCommand::BindTexture {
            unit: SHADOW_TEXTURE_UNIT,
            texture: None,
        });
    }

    pub fn release(&mut self, factory: &mut dyn TargetFactory) {
        if let Some(target) = self.target.take() {
            factory.destroy_target(&target);
        }
        self.fit = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::matrices::Viewport;
    use crate::renderer::recorder::CommandRecorder;
    use crate::renderer::targets::MemoryTargetFactory;
    use crate::scene::Camera;

    fn matrices() -> GameMatrices {
        GameMatrices::new(&Camera::default(), Viewport::new(1024, 768))
    }

    #[test]
    fn uniform_is_two_matrices() {
        assert_eq!(std::mem::size_of::<ShadowUniform>(), 128);
        let fit =
            ShadowFrustumFit::compute(&matrices(), Vec3::new(40.0, 30.0, 120.0), (0.0, 80.0))
                .unwrap();
        let uniform = fit.uniform();
        assert_eq!(bytemuck::bytes_of(&uniform).len(), 128);
    }

    #[test]
    fn light_at_focus_is_degenerate() {
        let m = matrices();
        assert!(ShadowFrustumFit::compute(&m, m.look_at, (0.0, 50.0)).is_none());
    }

    #[test]
    fn resolution_change_recreates_target() {
        let m = matrices();
        let mut factory = MemoryTargetFactory::default();
        let mut recorder = CommandRecorder::new();
        let mut shadows = ShadowMapGenerator::new(512);
        let light = Vec3::new(50.0, 50.0, 150.0);

        assert!(shadows.begin_pass(&mut recorder, &mut factory, Capabilities::FULL, &m, light, (0.0, 60.0)));
        let first = shadows.target().copied().unwrap();
        assert!(shadows.begin_pass(&mut recorder, &mut factory, Capabilities::FULL, &m, light, (0.0, 60.0)));
        assert_eq!(shadows.target().copied(), Some(first));

        shadows.set_resolution(1024);
        assert!(shadows.begin_pass(&mut recorder, &mut factory, Capabilities::FULL, &m, light, (0.0, 60.0)));
        assert_ne!(shadows.target().copied(), Some(first));
        assert_eq!(factory.live(), 1);
    }

    #[test]
    fn missing_capability_skips_pass() {
        let m = matrices();
        let mut factory = MemoryTargetFactory::default();
        let mut recorder = CommandRecorder::new();
        let mut shadows = ShadowMapGenerator::new(512);
        let ran = shadows.begin_pass(
            &mut recorder,
            &mut factory,
            Capabilities::FIXED_FUNCTION,
            &m,
            Vec3::new(0.0, 0.0, 100.0),
            (0.0, 60.0),
        );
        assert!(!ran);
        assert!(recorder.commands().is_empty());
        assert!(!shadows.activate(&mut recorder));
    }

    #[test]
    fn failed_allocation_skips_pass() {
        let m = matrices();
        let mut factory = MemoryTargetFactory::default();
        factory.set_fail_allocations(true);
        let mut recorder = CommandRecorder::new();
        let mut shadows = ShadowMapGenerator::new(512);
        assert!(!shadows.begin_pass(
            &mut recorder,
            &mut factory,
            Capabilities::FULL,
            &m,
            Vec3::new(0.0, 0.0, 100.0),
            (0.0, 60.0),
        ));
        assert!(recorder.commands().is_empty());
    }

    #[test]
    fn failed_resolution_is_not_retried() {
        let m = matrices();
        let mut factory = MemoryTargetFactory::default();
        factory.set_fail_allocations(true);
        let mut recorder = CommandRecorder::new();
        let mut shadows = ShadowMapGenerator::new(512);
        let light = Vec3::new(0.0, 0.0, 100.0);

        assert!(!shadows.begin_pass(&mut recorder, &mut factory, Capabilities::FULL, &m, light, (0.0, 60.0)));
        // the factory recovers, but the failed size stays off
        factory.set_fail_allocations(false);
        assert!(!shadows.begin_pass(&mut recorder, &mut factory, Capabilities::FULL, &m, light, (0.0, 60.0)));
        assert_eq!(factory.created(), 0);
        assert!(shadows.target().is_none());

        shadows.set_resolution(256);
        assert!(shadows.begin_pass(&mut recorder, &mut factory, Capabilities::FULL, &m, light, (0.0, 60.0)));
        assert_eq!(factory.created(), 1);
        assert_eq!(shadows.resolution(), 256);
    }
}
