use std::time::Instant;

use glam::{Vec3, Vec4};
use hecs::{Entity, World};

use super::context::{check_gpu_errors, Capabilities, GraphicsContext};
use super::draw::{DepthFunc, DrawBackend, DrawCommand, RenderFlags};
use super::error::RenderError;
use super::feedback::{
    FeedbackArena, FeedbackKey, FeedbackKind, ATTACK_FEEDBACK_DURATION, MOVE_FEEDBACK_DURATION,
};
use super::ground::{GroundRenderer, GroundRendererRegistry, NullGroundRenderer, WaterRenderer};
use super::icons::draw_icons;
use super::items::{ItemPass, ItemPassOptions};
use super::matrices::{GameMatrices, PickRect, Viewport};
use super::particles::{apply_fog, draw_bullet_trails, ParticleList, VisibleEffects};
use super::postprocess::{begin_screen_space, blit_scene, FadeCompositor, FadeStatistics, SceneTexture};
use super::shadows::{ShadowFrustumFit, ShadowMapGenerator};
use super::targets::{RenderTargetCache, TargetFactory};
use super::visibility::{RenderItem, RenderItemList};
use crate::scene::{Camera, Canvas, Effect, LocalViewer};
use crate::settings::RenderSettings;

const ATTACK_FEEDBACK_COLOR: Vec4 = Vec4::new(1.0, 0.0, 0.0, 1.0);
const MOVE_FEEDBACK_COLOR: Vec4 = Vec4::new(0.0, 1.0, 0.0, 1.0);

/// Everything a frame reads from the game.
pub struct FrameInput<'a> {
    pub world: &'a World,
    pub effects: &'a mut [Effect],
    pub canvas: Option<&'a dyn Canvas>,
    pub viewer: Option<&'a dyn LocalViewer>,
    pub camera: Option<&'a Camera>,
    pub viewport: Viewport,
    /// Frame time; feedbacks expire against it.
    pub now: Instant,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStatistics {
    pub items_rendered: u32,
    pub cells_rendered: u32,
    pub particles_rendered: u32,
    pub icons_rendered: u32,
    pub texture_binds_cells: u64,
    pub texture_binds_items: u64,
    pub texture_binds_water: u64,
    pub texture_binds_particles: u64,
    pub shadow_pass: bool,
    pub rendered_to_texture: bool,
    pub fades: FadeStatistics,
}

fn measure_binds(backend: &mut dyn DrawBackend, pass: impl FnOnce(&mut dyn DrawBackend)) -> u64 {
    let before = backend.texture_binds();
    pass(&mut *backend);
    backend.texture_binds().saturating_sub(before)
}

/// Draws the battlefield: terrain, items, water, effects and overlays.
pub struct CanvasRenderer {
    settings: RenderSettings,
    matrices: Option<GameMatrices>,
    render_items: RenderItemList,
    visible_effects: VisibleEffects,
    particles: ParticleList,
    feedbacks: FeedbackArena,
    shadows: ShadowMapGenerator,
    targets: RenderTargetCache,
    item_pass: ItemPass,
    ground: Box<dyn GroundRenderer>,
    water: Option<Box<dyn WaterRenderer>>,
    statistics: FrameStatistics,
}

impl CanvasRenderer {
    pub fn new(settings: RenderSettings, registry: &GroundRendererRegistry) -> Self {
        let ground = registry.create(&settings.ground_renderer).unwrap_or_else(|| {
            log::warn!("No ground renderer registered; terrain will not be drawn");
            Box::new(NullGroundRenderer)
        });
        log::info!("Using ground renderer '{}'", ground.name());

        Self {
            shadows: ShadowMapGenerator::new(settings.shadow_map_resolution),
            settings,
            matrices: None,
            render_items: RenderItemList::new(),
            visible_effects: VisibleEffects::new(),
            particles: ParticleList::new(),
            feedbacks: FeedbackArena::new(),
            targets: RenderTargetCache::new(),
            item_pass: ItemPass::new(),
            ground,
            water: None,
            statistics: FrameStatistics::default(),
        }
    }

    /// Prepares the ground renderer for a new map.
    pub fn initialize(&mut self, canvas: &dyn Canvas) {
        self.ground.initialize(canvas);
        self.particles.clear();
    }

    /// Releases every GPU resource the renderer owns.
    pub fn shutdown<B: DrawBackend>(&mut self, ctx: &mut GraphicsContext<B>) {
        self.ground.shutdown();
        self.shadows.release(ctx.targets.as_mut());
        self.targets.flush(ctx.targets.as_mut());
        log::info!("Canvas renderer shut down");
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: RenderSettings) {
        self.shadows.set_resolution(settings.shadow_map_resolution);
        self.settings = settings;
    }

    pub fn set_ground_renderer(&mut self, ground: Box<dyn GroundRenderer>) {
        self.ground.shutdown();
        self.ground = ground;
    }

    pub fn set_water_renderer(&mut self, water: Option<Box<dyn WaterRenderer>>) {
        self.water = water;
    }

    pub fn statistics(&self) -> &FrameStatistics {
        &self.statistics
    }

    pub fn render_items(&self) -> &[RenderItem] {
        self.render_items.items()
    }

    pub fn radar_contacts(&self) -> &[Entity] {
        self.render_items.radar_contacts()
    }

    /// Light frustum of the last shadow pass.
    pub fn shadow_fit(&self) -> Option<&ShadowFrustumFit> {
        self.shadows.fit()
    }

    pub fn matrices(&self) -> Option<&GameMatrices> {
        self.matrices.as_ref()
    }

    pub fn render_target_cache(&self) -> &RenderTargetCache {
        &self.targets
    }

    pub fn feedbacks(&self) -> &FeedbackArena {
        &self.feedbacks
    }

    /// Items of the last frame inside a viewport rectangle.
    pub fn pick_items(&self, world: &World, rect: PickRect) -> Vec<Entity> {
        match &self.matrices {
            Some(matrices) => self.render_items.pick(world, &matrices.pick_frustum(rect)),
            None => Vec::new(),
        }
    }

    /// Cached render targets no longer match the viewport.
    pub fn widget_resized<B: DrawBackend>(&mut self, ctx: &mut GraphicsContext<B>) {
        self.targets.flush(ctx.targets.as_mut());
    }

    pub fn reset<B: DrawBackend>(&mut self, ctx: &mut GraphicsContext<B>) {
        self.particles.clear();
        self.targets.flush(ctx.targets.as_mut());
    }

    pub fn item_removed(&mut self, entity: Entity) {
        self.render_items.remove_item(entity);
        self.feedbacks.forget_item(entity);
    }

    pub fn set_particles_dirty(&mut self) {
        self.particles.set_dirty();
    }

    pub fn add_attack_feedback(&mut self, target: Entity, now: Instant) -> FeedbackKey {
        self.feedbacks.add(
            FeedbackKind::ItemTint { entity: target },
            ATTACK_FEEDBACK_COLOR,
            now,
            ATTACK_FEEDBACK_DURATION,
        )
    }

    pub fn add_move_feedback(
        &mut self,
        canvas: &dyn Canvas,
        x: f32,
        y: f32,
        now: Instant,
    ) -> FeedbackKey {
        let position = Vec3::new(x, y, canvas.height_at(x, y));
        self.feedbacks.add(
            FeedbackKind::GroundMarker { position },
            MOVE_FEEDBACK_COLOR,
            now,
            MOVE_FEEDBACK_DURATION,
        )
    }

    /// Renders one frame. Fails without side effects when a collaborator is
    /// missing or the viewport is empty.
    pub fn render<B: DrawBackend>(
        &mut self,
        ctx: &mut GraphicsContext<B>,
        frame: FrameInput<'_>,
    ) -> Result<(), RenderError> {
        let camera = frame.camera.ok_or(RenderError::MissingCamera)?;
        let canvas = frame.canvas.ok_or(RenderError::MissingCanvas)?;
        let viewer = frame.viewer.ok_or(RenderError::MissingLocalViewer)?;
        if frame.viewport.is_empty() {
            return Err(RenderError::InvalidViewport {
                width: frame.viewport.width,
                height: frame.viewport.height,
            });
        }

        self.statistics = FrameStatistics::default();
        let matrices = GameMatrices::new(camera, frame.viewport);
        self.matrices = Some(matrices);

        self.visible_effects
            .classify(frame.effects, &matrices.frustum, canvas, viewer);
        self.visible_effects.apply_delayed_updates(frame.effects);
        let effects: &[Effect] = frame.effects;
        let world = frame.world;

        let expired = self.feedbacks.sweep(frame.now);
        if expired > 0 {
            log::debug!("{} visual feedbacks expired", expired);
        }
        self.render_items
            .rebuild(world, &matrices.frustum, viewer, &self.feedbacks);
        self.ground.generate_cell_list(canvas, &matrices);

        let capabilities = ctx.capabilities();
        let icons = *ctx.icons();
        let light_position = ctx.light_position();
        let unit_shader = ctx
            .unit_shader()
            .filter(|_| self.settings.use_unit_shaders);
        let use_unit_shadows = unit_shader.is_some();
        let use_ground_shadows = self.settings.use_ground_shaders;
        let debug = self.settings.debug.clone();

        let backend: &mut dyn DrawBackend = &mut ctx.backend;
        let factory: &mut dyn TargetFactory = ctx.targets.as_mut();

        self.begin_frame(backend, &matrices);

        let depth_range = self.depth_range();
        if use_unit_shadows || use_ground_shadows {
            self.statistics.shadow_pass = self.render_shadow_map(
                backend,
                factory,
                capabilities,
                &matrices,
                light_position,
                depth_range,
                world,
                canvas,
            );
        }

        let scene = if self.must_render_to_texture(capabilities, effects) {
            self.start_rendering_to_texture(backend, factory, &matrices)
        } else {
            None
        };
        if scene.is_some() {
            self.statistics.rendered_to_texture = true;
            backend.submit(DrawCommand::SetProjection(matrices.projection_with_range(
                matrices.near + depth_range.0,
                matrices.near + depth_range.1,
            )));
        }

        apply_fog(backend, effects, &self.visible_effects);
        backend.submit(DrawCommand::SetLighting(self.settings.use_light));

        let mut flags = RenderFlags::empty();
        if self.settings.use_light {
            flags |= RenderFlags::LIT;
        }

        let ground_shadowed = use_ground_shadows && self.shadows.activate(backend);
        if debug.render_ground {
            let ground_flags = if ground_shadowed {
                flags | RenderFlags::SHADOWED
            } else {
                flags
            };
            let ground = &mut self.ground;
            let mut cells = 0;
            self.statistics.texture_binds_cells = measure_binds(backend, |backend| {
                cells = ground.render_cells(canvas, ground_flags, backend);
            });
            self.statistics.cells_rendered = cells;
        }
        check_gpu_errors(backend, "after ground rendering");

        let mut items_shadowed = use_unit_shadows && use_ground_shadows && ground_shadowed;
        if use_ground_shadows && !use_unit_shadows {
            self.shadows.deactivate(backend);
        } else if use_unit_shadows && !use_ground_shadows {
            items_shadowed = self.shadows.activate(backend);
        }

        if debug.render_items {
            let item_flags = if items_shadowed {
                flags | RenderFlags::SHADOWED
            } else {
                flags
            };
            let options = self.item_options(camera, debug.bounding_boxes, debug.wireframes);
            if let Some(shader) = unit_shader {
                backend.submit(DrawCommand::BindShader(Some(shader)));
            }
            let (item_pass, list) = (&mut self.item_pass, &self.render_items);
            let mut items = 0;
            self.statistics.texture_binds_items = measure_binds(backend, |backend| {
                items = item_pass.render(backend, world, list, &matrices, item_flags, &options);
            });
            self.statistics.items_rendered = items;
            if unit_shader.is_some() {
                backend.submit(DrawCommand::BindShader(None));
            }
        }
        if use_unit_shadows {
            self.shadows.deactivate(backend);
        }
        check_gpu_errors(backend, "after item rendering");

        if debug.render_water {
            if let Some(water) = self.water.as_mut() {
                self.statistics.texture_binds_water =
                    measure_binds(backend, |backend| water.render(backend));
            }
        }
        check_gpu_errors(backend, "after water rendering");

        if debug.render_particles {
            self.particles.rebuild(
                effects,
                self.visible_effects.particles(),
                matrices.camera_position,
            );
            let particles = &self.particles;
            let mut drawn = 0;
            self.statistics.texture_binds_particles = measure_binds(backend, |backend| {
                drawn = particles.draw(backend, effects, &matrices);
            });
            self.statistics.particles_rendered = drawn;
        }

        backend.submit(DrawCommand::SetLighting(false));
        draw_bullet_trails(backend, effects, &self.visible_effects);

        self.statistics.icons_rendered = draw_icons(
            backend,
            world,
            self.item_pass.iconic(),
            self.render_items.radar_contacts(),
            &matrices,
            viewer,
            &icons,
        ) as u32;

        self.feedbacks.paint(backend);

        if scene.is_some() {
            backend.submit(DrawCommand::SetRenderTarget(None));
            backend.submit(DrawCommand::SetViewport {
                x: matrices.viewport.x,
                y: matrices.viewport.y,
                width: matrices.viewport.width,
                height: matrices.viewport.height,
            });
        }

        begin_screen_space(backend);
        if let Some(scene) = &scene {
            blit_scene(backend, scene);
        }

        self.statistics.fades = FadeCompositor {
            backend: &mut *backend,
            factory: &mut *factory,
            cache: &mut self.targets,
            viewport: matrices.viewport,
        }
        .render(effects, self.visible_effects.fades(), scene);

        if let Some(scene) = scene {
            self.targets.release(scene.target);
        }
        Ok(())
    }

    fn begin_frame(&self, backend: &mut dyn DrawBackend, matrices: &GameMatrices) {
        backend.submit(DrawCommand::SetViewport {
            x: matrices.viewport.x,
            y: matrices.viewport.y,
            width: matrices.viewport.width,
            height: matrices.viewport.height,
        });
        backend.submit(DrawCommand::Clear {
            color: Some(Vec4::new(0.0, 0.0, 0.0, 1.0)),
            depth: true,
        });
        backend.submit(DrawCommand::SetBlend(None));
        backend.submit(DrawCommand::SetLighting(false));
        backend.submit(DrawCommand::SetColor(Vec4::ONE));
        backend.submit(DrawCommand::SetDepthTest(Some(DepthFunc::LessEqual)));
        backend.submit(DrawCommand::SetDepthWrite(true));
        backend.submit(DrawCommand::SetProjection(matrices.projection));
        backend.submit(DrawCommand::SetView(matrices.view));
    }

    /// Near/far offsets from the camera near plane covering everything
    /// that was found visible.
    fn depth_range(&self) -> (f32, f32) {
        let ground = self.ground.statistics();
        let near = ground.min_distance.min(self.render_items.min_distance());
        let far = ground.max_distance.max(self.render_items.max_distance());
        (near, far)
    }

    fn item_options(&self, camera: &Camera, bounding_boxes: bool, wireframes: bool) -> ItemPassOptions {
        ItemPassOptions {
            use_lod: self.settings.use_lod,
            iconify_base_distance: self.settings.iconify_base_distance,
            bounding_boxes,
            wireframes,
            selection_rotation: self
                .settings
                .align_selection_boxes
                .then(|| camera.rotation_degrees()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn render_shadow_map(
        &mut self,
        backend: &mut dyn DrawBackend,
        factory: &mut dyn TargetFactory,
        capabilities: Capabilities,
        matrices: &GameMatrices,
        light_position: Vec3,
        depth_range: (f32, f32),
        world: &World,
        canvas: &dyn Canvas,
    ) -> bool {
        if !self.shadows.begin_pass(
            backend,
            factory,
            capabilities,
            matrices,
            light_position,
            depth_range,
        ) {
            return false;
        }

        if self.settings.debug.render_ground {
            self.ground
                .render_cells(canvas, RenderFlags::DEPTH_ONLY, backend);
        }
        if self.settings.debug.render_items {
            let options = ItemPassOptions {
                use_lod: self.settings.use_lod,
                iconify_base_distance: self.settings.iconify_base_distance,
                ..ItemPassOptions::default()
            };
            self.item_pass.render(
                backend,
                world,
                &self.render_items,
                matrices,
                RenderFlags::DEPTH_ONLY,
                &options,
            );
        }

        self.shadows.end_pass(backend, matrices);
        check_gpu_errors(backend, "after shadow map rendering");
        true
    }

    fn must_render_to_texture(&self, capabilities: Capabilities, effects: &[Effect]) -> bool {
        self.settings.use_unit_shaders
            && capabilities.render_to_texture
            && self.visible_effects.has_shader_fades(effects)
    }

    fn start_rendering_to_texture(
        &mut self,
        backend: &mut dyn DrawBackend,
        factory: &mut dyn TargetFactory,
        matrices: &GameMatrices,
    ) -> Option<SceneTexture> {
        let viewport = matrices.viewport;
        let id = match self
            .targets
            .acquire(factory, viewport.width, viewport.height, true)
        {
            Ok(id) => id,
            Err(err) => {
                log::warn!(
                    "Cannot render scene to texture ({}). Shader effects disabled this frame.",
                    err
                );
                return None;
            }
        };
        let target = self.targets.get(id)?;
        let scene = SceneTexture {
            target: id,
            color: target.color(),
            depth: target.depth(),
        };

        backend.submit(DrawCommand::SetRenderTarget(Some(id)));
        backend.submit(DrawCommand::SetViewport {
            x: 0,
            y: 0,
            width: viewport.width,
            height: viewport.height,
        });
        backend.submit(DrawCommand::SetProjection(matrices.projection));
        backend.submit(DrawCommand::SetView(matrices.view));
        backend.submit(DrawCommand::Clear {
            color: Some(Vec4::ZERO),
            depth: true,
        });
        backend.submit(DrawCommand::SetDepthTest(Some(DepthFunc::LessEqual)));
        Some(scene)
    }
}
