use std::time::{Duration, Instant};

use glam::{Vec3, Vec4};
use hecs::World;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rts_canvas::renderer::{
    Capabilities, CommandRecorder, DrawCommand, FrustumPlane, GameMatrices,
    GroundRendererRegistry, IconTextures, MemoryTargetFactory, ModelId, ShaderId, TextureId,
    Viewport,
};
use rts_canvas::scene::{
    Camera, Effect, EffectKind, FadeEffect, FadePass, FlatCanvas, ItemBody, ItemRenderer,
    ItemVisual, ModelItemRenderer, ModelLodTable, OmniscientViewer, Particle, ParticleSystem,
    PlayerId, UnitClass, UnitStatus,
};
use rts_canvas::{CanvasRenderer, FrameInput, GraphicsContext, RenderError, RenderSettings};

struct Battlefield {
    world: World,
    effects: Vec<Effect>,
    canvas: FlatCanvas,
    viewer: OmniscientViewer,
    camera: Camera,
}

impl Battlefield {
    fn new() -> Self {
        Self {
            world: World::new(),
            effects: Vec::new(),
            canvas: FlatCanvas::new(32, 32),
            viewer: OmniscientViewer::new(PlayerId(1)),
            camera: Camera::default(),
        }
    }

    fn spawn_tank(&mut self, position: Vec3) -> hecs::Entity {
        self.world.spawn((
            ItemBody::new(position, Vec3::ONE),
            ItemVisual::new(ModelItemRenderer::new(
                ModelId(7),
                1.0,
                ModelLodTable::uniform(2, 30.0),
            )),
            UnitStatus::new(PlayerId(1), UnitClass::Land, 100),
        ))
    }

    fn frame(&mut self, now: Instant) -> FrameInput<'_> {
        FrameInput {
            world: &self.world,
            effects: &mut self.effects,
            canvas: Some(&self.canvas),
            viewer: Some(&self.viewer),
            camera: Some(&self.camera),
            viewport: Viewport::new(640, 480),
            now,
        }
    }
}

fn context(capabilities: Capabilities) -> GraphicsContext<CommandRecorder> {
    GraphicsContext::new(
        CommandRecorder::new(),
        Box::new(MemoryTargetFactory::default()),
        capabilities,
        IconTextures::default(),
    )
    .with_unit_shader(ShaderId(1))
}

fn renderer() -> CanvasRenderer {
    CanvasRenderer::new(
        RenderSettings::default(),
        &GroundRendererRegistry::with_builtin(TextureId(20)),
    )
}

#[test]
fn empty_battlefield_draws_ground_only() {
    let mut ctx = context(Capabilities::FULL);
    let mut renderer = renderer();
    let mut battlefield = Battlefield::new();
    renderer.initialize(&battlefield.canvas);

    renderer
        .render(&mut ctx, battlefield.frame(Instant::now()))
        .unwrap();

    assert_eq!(ctx.backend().mesh_draws(), 0);
    assert_eq!(renderer.statistics().items_rendered, 0);
    assert!(renderer.statistics().cells_rendered > 0);
    assert!(renderer.render_items().is_empty());
}

#[test]
fn unit_leaves_view_after_dolly() {
    let mut ctx = context(Capabilities::FULL);
    let mut renderer = renderer();
    let mut battlefield = Battlefield::new();
    let tank = battlefield.spawn_tank(Vec3::ZERO);

    renderer
        .render(&mut ctx, battlefield.frame(Instant::now()))
        .unwrap();
    assert_eq!(renderer.statistics().items_rendered, 1);
    assert_eq!(renderer.render_items()[0].entity, tank);
    assert!(ctx.backend().mesh_draws() >= 1);

    ctx.backend_mut().clear();
    battlefield.camera.dolly(-500.0);
    renderer
        .render(&mut ctx, battlefield.frame(Instant::now()))
        .unwrap();
    assert_eq!(renderer.statistics().items_rendered, 0);
    assert!(renderer.render_items().is_empty());
    assert_eq!(ctx.backend().mesh_draws(), 0);
}

fn view_frustum(camera: &Camera) -> rts_canvas::renderer::Frustum {
    GameMatrices::new(camera, Viewport::new(640, 480)).frustum
}

#[test]
fn unit_on_far_boundary_leaves_view_after_one_step_back() {
    let mut ctx = context(Capabilities::FULL);
    let mut renderer = renderer();
    let mut battlefield = Battlefield::new();
    let camera = battlefield.camera;
    let far = *view_frustum(&camera).plane(FrustumPlane::Far);

    // sphere of radius 1 reaching half a unit inside the far plane
    let on_axis = camera.eye + (camera.target - camera.eye).normalize() * camera.far;
    let on_plane = on_axis - far.normal * far.distance(on_axis);
    let tank = battlefield.spawn_tank(on_plane - far.normal * 0.5);

    renderer
        .render(&mut ctx, battlefield.frame(Instant::now()))
        .unwrap();
    assert_eq!(renderer.render_items().len(), 1);
    assert_eq!(renderer.render_items()[0].entity, tank);

    battlefield.camera.dolly(-1.0);
    renderer
        .render(&mut ctx, battlefield.frame(Instant::now()))
        .unwrap();
    assert!(renderer.render_items().is_empty());
    assert_eq!(renderer.statistics().items_rendered, 0);
}

#[test]
fn unit_on_side_boundary_leaves_view_when_camera_steps_away() {
    let mut ctx = context(Capabilities::FULL);
    let mut renderer = renderer();
    let mut battlefield = Battlefield::new();
    let camera = battlefield.camera;
    let left = *view_frustum(&camera).plane(FrustumPlane::Left);

    let on_plane = camera.target - left.normal * left.distance(camera.target);
    let tank = battlefield.spawn_tank(on_plane - left.normal * 0.5);

    renderer
        .render(&mut ctx, battlefield.frame(Instant::now()))
        .unwrap();
    assert_eq!(renderer.render_items().len(), 1);
    assert_eq!(renderer.render_items()[0].entity, tank);

    // one unit sideways, away from the tank
    battlefield.camera.eye += left.normal;
    battlefield.camera.target += left.normal;
    renderer
        .render(&mut ctx, battlefield.frame(Instant::now()))
        .unwrap();
    assert!(renderer.render_items().is_empty());
}

#[test]
fn render_items_are_exactly_the_units_in_view() {
    let mut rng = SmallRng::seed_from_u64(0xb477);
    let mut ctx = context(Capabilities::FULL);
    let mut renderer = renderer();

    for _ in 0..24 {
        let mut battlefield = Battlefield::new();
        let target = Vec3::new(rng.gen_range(0.0..128.0), rng.gen_range(0.0..128.0), 0.0);
        battlefield.camera.target = target;
        battlefield.camera.eye = target
            + Vec3::new(
                rng.gen_range(-30.0..30.0),
                rng.gen_range(-60.0..-5.0),
                rng.gen_range(10.0..80.0),
            );
        let tanks: Vec<_> = (0..48)
            .map(|_| {
                battlefield.spawn_tank(Vec3::new(
                    rng.gen_range(-64.0..192.0),
                    rng.gen_range(-64.0..192.0),
                    rng.gen_range(0.0..4.0),
                ))
            })
            .collect();

        renderer
            .render(&mut ctx, battlefield.frame(Instant::now()))
            .unwrap();
        ctx.backend_mut().clear();
        let frustum = renderer.matrices().unwrap().frustum;

        for tank in tanks {
            let body = battlefield.world.get::<&ItemBody>(tank).unwrap();
            let visual = battlefield.world.get::<&ItemVisual>(tank).unwrap();
            let distance = visual.0.item_in_frustum(&frustum, body.center);
            let listed = renderer.render_items().iter().any(|item| item.entity == tank);
            assert_eq!(listed, distance > 0.0, "tank at {}", body.center);
        }
        assert_eq!(
            renderer.statistics().items_rendered as usize,
            renderer.render_items().len()
        );
    }
}

#[test]
fn unit_shadow_pass_runs_with_full_capabilities() {
    let mut ctx = context(Capabilities::FULL);
    let mut renderer = renderer();
    let mut battlefield = Battlefield::new();
    battlefield.spawn_tank(Vec3::ZERO);

    renderer
        .render(&mut ctx, battlefield.frame(Instant::now()))
        .unwrap();

    assert!(renderer.statistics().shadow_pass);
    assert!(renderer.shadow_fit().is_some());
    // depth pass plus the lit pass
    assert_eq!(ctx.backend().mesh_draws(), 2);
    assert!(ctx
        .backend()
        .commands()
        .iter()
        .any(|command| matches!(command, DrawCommand::BindShader(Some(ShaderId(1))))));
}

#[test]
fn fixed_function_skips_shadows_and_render_to_texture() {
    let mut ctx = context(Capabilities::FIXED_FUNCTION);
    let mut renderer = renderer();
    let mut battlefield = Battlefield::new();
    battlefield.spawn_tank(Vec3::ZERO);
    let mut blur = FadeEffect::full_screen(Vec4::ONE);
    blur.passes.push(FadePass {
        shader: ShaderId(5),
        downscale: 1,
    });
    battlefield.effects.push(Effect::new(EffectKind::Fade(blur)));

    renderer
        .render(&mut ctx, battlefield.frame(Instant::now()))
        .unwrap();

    let stats = renderer.statistics();
    assert!(!stats.shadow_pass);
    assert!(!stats.rendered_to_texture);
    assert_eq!(stats.fades.skipped, 1);
    assert_eq!(
        ctx.backend()
            .count(|command| matches!(command, DrawCommand::SetShadowCompare { .. })),
        0
    );
    assert_eq!(
        ctx.backend()
            .count(|command| matches!(command, DrawCommand::SetRenderTarget(Some(_)))),
        0
    );
}

#[test]
fn shader_fades_render_scene_to_texture() {
    let mut ctx = context(Capabilities::FULL);
    let mut renderer = renderer();
    let mut battlefield = Battlefield::new();
    battlefield.spawn_tank(Vec3::ZERO);
    let mut blur = FadeEffect::full_screen(Vec4::new(1.0, 1.0, 1.0, 0.5));
    blur.passes = vec![
        FadePass {
            shader: ShaderId(5),
            downscale: 2,
        },
        FadePass {
            shader: ShaderId(6),
            downscale: 1,
        },
    ];
    battlefield.effects.push(Effect::new(EffectKind::Fade(blur)));
    battlefield
        .effects
        .push(Effect::new(EffectKind::Fade(FadeEffect::full_screen(
            Vec4::new(0.0, 0.0, 0.0, 0.3),
        ))));

    renderer
        .render(&mut ctx, battlefield.frame(Instant::now()))
        .unwrap();

    let stats = renderer.statistics();
    assert!(stats.rendered_to_texture);
    assert_eq!(stats.fades.direct, 1);
    assert_eq!(stats.fades.shader_passes, 2);
    assert_eq!(stats.fades.skipped, 0);
    assert_eq!(renderer.render_target_cache().in_use_count(), 0);
    assert!(!renderer.render_target_cache().is_empty());

    // the frame ends on the screen
    let last_target = ctx
        .backend()
        .commands()
        .iter()
        .rev()
        .find_map(|command| match command {
            DrawCommand::SetRenderTarget(target) => Some(*target),
            _ => None,
        });
    assert_eq!(last_target, Some(None));
}

#[test]
fn cached_targets_are_reused_across_frames() {
    let mut ctx = context(Capabilities::FULL);
    let mut renderer = renderer();
    let mut battlefield = Battlefield::new();
    let mut blur = FadeEffect::full_screen(Vec4::ONE);
    blur.passes.push(FadePass {
        shader: ShaderId(5),
        downscale: 2,
    });
    battlefield.effects.push(Effect::new(EffectKind::Fade(blur)));

    renderer
        .render(&mut ctx, battlefield.frame(Instant::now()))
        .unwrap();
    let cached = renderer.render_target_cache().len();
    renderer
        .render(&mut ctx, battlefield.frame(Instant::now()))
        .unwrap();
    assert_eq!(renderer.render_target_cache().len(), cached);

    renderer.widget_resized(&mut ctx);
    assert!(renderer.render_target_cache().is_empty());
}

#[test]
fn removed_item_is_forgotten() {
    let mut ctx = context(Capabilities::FULL);
    let mut renderer = renderer();
    let mut battlefield = Battlefield::new();
    let kept = battlefield.spawn_tank(Vec3::ZERO);
    let removed = battlefield.spawn_tank(Vec3::new(2.0, 0.0, 0.0));
    let now = Instant::now();
    renderer.add_attack_feedback(removed, now);

    renderer.render(&mut ctx, battlefield.frame(now)).unwrap();
    assert_eq!(renderer.render_items().len(), 2);

    renderer.item_removed(removed);
    battlefield.world.despawn(removed).unwrap();

    let remaining: Vec<_> = renderer.render_items().iter().map(|i| i.entity).collect();
    assert_eq!(remaining, vec![kept]);
    assert!(renderer.feedbacks().item_tint(removed).is_none());
}

#[test]
fn attack_feedback_tints_until_expired() {
    let mut ctx = context(Capabilities::FULL);
    let mut renderer = renderer();
    let mut battlefield = Battlefield::new();
    let tank = battlefield.spawn_tank(Vec3::ZERO);
    let now = Instant::now();
    renderer.add_attack_feedback(tank, now);

    renderer.render(&mut ctx, battlefield.frame(now)).unwrap();
    assert_eq!(renderer.render_items()[0].tint, Vec4::new(1.0, 0.0, 0.0, 1.0));

    // the frame that expires the feedback already draws untinted
    let later = now + Duration::from_secs(5);
    renderer.render(&mut ctx, battlefield.frame(later)).unwrap();
    assert!(renderer.feedbacks().is_empty());
    assert_eq!(renderer.render_items()[0].tint, Vec4::ONE);
}

fn smoke(count: usize) -> Effect {
    let mut system = ParticleSystem::new(Vec3::ZERO, 3.0);
    system.particles = (0..count)
        .map(|i| Particle {
            position: Vec3::new(i as f32 * 0.2, 0.0, 0.5),
            size: 0.5,
            color: Vec4::ONE,
            life: 1.0,
            texture: TextureId(30),
        })
        .collect();
    Effect::new(EffectKind::Particles(system))
}

#[test]
fn particle_list_is_rebuilt_only_when_dirty() {
    let mut ctx = context(Capabilities::FULL);
    let mut renderer = renderer();
    let mut battlefield = Battlefield::new();
    battlefield.effects.push(smoke(8));

    renderer
        .render(&mut ctx, battlefield.frame(Instant::now()))
        .unwrap();
    assert_eq!(renderer.statistics().particles_rendered, 8);

    // stale entries past the shrunk system are skipped
    if let EffectKind::Particles(system) = &mut battlefield.effects[0].kind {
        system.particles.truncate(3);
    }
    renderer
        .render(&mut ctx, battlefield.frame(Instant::now()))
        .unwrap();
    assert_eq!(renderer.statistics().particles_rendered, 3);

    if let EffectKind::Particles(system) = &mut battlefield.effects[0].kind {
        system.particles.extend(smoke_particles(9));
    }
    // still the eight entries of the first build
    renderer
        .render(&mut ctx, battlefield.frame(Instant::now()))
        .unwrap();
    assert_eq!(renderer.statistics().particles_rendered, 8);

    renderer.set_particles_dirty();
    renderer
        .render(&mut ctx, battlefield.frame(Instant::now()))
        .unwrap();
    assert_eq!(renderer.statistics().particles_rendered, 12);
}

fn smoke_particles(count: usize) -> Vec<Particle> {
    match smoke(count).kind {
        EffectKind::Particles(system) => system.particles,
        _ => Vec::new(),
    }
}

#[test]
fn missing_canvas_is_reported() {
    let mut ctx = context(Capabilities::FULL);
    let mut renderer = renderer();
    let battlefield = Battlefield::new();
    let result = renderer.render(
        &mut ctx,
        FrameInput {
            world: &battlefield.world,
            effects: &mut [],
            canvas: None,
            viewer: Some(&battlefield.viewer),
            camera: Some(&battlefield.camera),
            viewport: Viewport::new(640, 480),
            now: Instant::now(),
        },
    );
    assert_eq!(result, Err(RenderError::MissingCanvas));
    assert!(ctx.backend().commands().is_empty());
    assert!(renderer.matrices().is_none());
}

#[test]
fn gpu_errors_do_not_abort_the_frame() {
    let mut ctx = context(Capabilities::FULL);
    let mut renderer = renderer();
    let mut battlefield = Battlefield::new();
    battlefield.spawn_tank(Vec3::ZERO);
    ctx.backend_mut().inject_error("out of memory");

    assert!(renderer
        .render(&mut ctx, battlefield.frame(Instant::now()))
        .is_ok());
    assert_eq!(renderer.statistics().items_rendered, 1);
    assert!(!ctx.check_errors("after frame"));
}

#[test]
fn shutdown_releases_targets() {
    let mut ctx = context(Capabilities::FULL);
    let mut renderer = renderer();
    let mut battlefield = Battlefield::new();
    battlefield.spawn_tank(Vec3::ZERO);
    renderer
        .render(&mut ctx, battlefield.frame(Instant::now()))
        .unwrap();

    renderer.shutdown(&mut ctx);
    assert!(renderer.render_target_cache().is_empty());
}
