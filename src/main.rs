mod demo_scenes;

use std::time::{Duration, Instant};

use demo_scenes::DemoScene;
use rts_canvas::renderer::{
    Capabilities, CommandRecorder, FlatWaterRenderer, GroundRendererRegistry, HeadlessGpu,
    IconTextures, MemoryTargetFactory, PickRect, ShaderId, ShadowUniform, TargetFactory,
    TextureId, Viewport, WgpuTargetFactory,
};
use rts_canvas::{CanvasRenderer, FrameInput, GraphicsContext, RenderError, RenderSettings};

//const ACTIVE_SCENE: DemoScene = DemoScene::Skirmish { units: 200, seed: 7 };

const ACTIVE_SCENE: DemoScene = DemoScene::Bombardment {
    units: 160,
    seed: 42,
};

const FRAME_COUNT: u32 = 12;
const FRAME_TIME: Duration = Duration::from_millis(16);
const GROUND_TEXTURE: TextureId = TextureId(20);
const UNIT_SHADER: ShaderId = ShaderId(1);

fn run() -> Result<(), RenderError> {
    let settings = RenderSettings::load();
    let viewport = Viewport::new(settings.resolution.width, settings.resolution.height);

    let gpu = match pollster::block_on(HeadlessGpu::request(settings.gpu_backend.to_wgpu())) {
        Ok(gpu) => Some(gpu),
        Err(err) => {
            log::warn!("No GPU available ({}). Using in-memory render targets.", err);
            None
        }
    };
    let (targets, capabilities): (Box<dyn TargetFactory>, Capabilities) = match &gpu {
        Some(gpu) => (
            Box::new(WgpuTargetFactory::new(gpu.device.clone())),
            gpu.capabilities(),
        ),
        None => (Box::new(MemoryTargetFactory::default()), Capabilities::FULL),
    };
    let shadow_buffer = gpu.as_ref().map(|gpu| {
        gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("ShadowUniformBuffer"),
            size: std::mem::size_of::<ShadowUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    });

    let mut ctx = GraphicsContext::new(
        CommandRecorder::new(),
        targets,
        capabilities,
        IconTextures::default(),
    )
    .with_unit_shader(UNIT_SHADER)
    .with_light_position(glam::Vec3::new(20.0, -40.0, 120.0));

    let mut battlefield = ACTIVE_SCENE.build();
    let registry = GroundRendererRegistry::with_builtin(GROUND_TEXTURE);
    let mut renderer = CanvasRenderer::new(settings, &registry);
    renderer.initialize(&battlefield.canvas);
    renderer.set_water_renderer(Some(Box::new(FlatWaterRenderer::new(
        -0.2,
        glam::Vec2::new(
            battlefield.canvas.width as f32,
            battlefield.canvas.height as f32,
        ),
    ))));

    let start = Instant::now();
    for frame in 0..FRAME_COUNT {
        let now = start + FRAME_TIME * frame;

        for entity in battlefield.advance(FRAME_TIME.as_secs_f32()) {
            renderer.item_removed(entity);
        }
        renderer.set_particles_dirty();

        if frame % 4 == 0 {
            if let Some(target) = battlefield.random_unit() {
                renderer.add_attack_feedback(target, now);
            }
            renderer.add_move_feedback(&battlefield.canvas, 40.0, 52.0, now);
        }

        renderer.render(
            &mut ctx,
            FrameInput {
                world: &battlefield.world,
                effects: &mut battlefield.effects,
                canvas: Some(&battlefield.canvas),
                viewer: Some(&battlefield.viewer),
                camera: Some(&battlefield.camera),
                viewport,
                now,
            },
        )?;

        if let (Some(gpu), Some(buffer), Some(fit)) =
            (&gpu, &shadow_buffer, renderer.shadow_fit())
        {
            gpu.queue
                .write_buffer(buffer, 0, bytemuck::bytes_of(&fit.uniform()));
        }

        let stats = renderer.statistics();
        log::info!(
            "Frame {}: {} items, {} cells, {} particles, {} icons, {} commands ({} draw calls), shadows: {}, rtt: {}",
            frame,
            stats.items_rendered,
            stats.cells_rendered,
            stats.particles_rendered,
            stats.icons_rendered,
            ctx.backend().commands().len(),
            ctx.backend().draw_calls(),
            stats.shadow_pass,
            stats.rendered_to_texture
        );
        ctx.backend_mut().clear();
    }

    let picked = renderer.pick_items(
        &battlefield.world,
        PickRect {
            x: viewport.width as f32 * 0.4,
            y: viewport.height as f32 * 0.4,
            width: viewport.width as f32 * 0.2,
            height: viewport.height as f32 * 0.2,
        },
    );
    log::info!("{} items under the center of the screen", picked.len());

    renderer.shutdown(&mut ctx);
    Ok(())
}

fn main() {
    rts_canvas::init_logging();
    if let Err(err) = run() {
        log::error!("Canvas demo failed: {err}");
    }
}
