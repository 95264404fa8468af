use glam::{Mat4, Vec2, Vec3, Vec4};

use super::draw::{
    BlendFactor, BlendMode, DepthFunc, DrawBackend, DrawCommand, FogParams, LineVertex,
    QuadVertex, TextureId,
};
use super::frustum::Frustum;
use super::matrices::GameMatrices;
use crate::scene::{Canvas, Effect, EffectKind, LocalViewer};

/// Started effects of this frame, as indices into the effect slice.
#[derive(Debug, Default)]
pub struct VisibleEffects {
    fog: Vec<usize>,
    particles: Vec<usize>,
    bullet_trails: Vec<usize>,
    fades: Vec<usize>,
    generic: Vec<usize>,
    all: Vec<usize>,
}

impl VisibleEffects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.fog.clear();
        self.particles.clear();
        self.bullet_trails.clear();
        self.fades.clear();
        self.generic.clear();
        self.all.clear();
    }

    pub fn classify(
        &mut self,
        effects: &[Effect],
        frustum: &Frustum,
        canvas: &dyn Canvas,
        viewer: &dyn LocalViewer,
    ) {
        self.clear();
        for (index, effect) in effects.iter().enumerate() {
            if !effect.started {
                continue;
            }
            match &effect.kind {
                EffectKind::Fog(_) => self.fog.push(index),
                EffectKind::BulletTrail(_) => self.bullet_trails.push(index),
                EffectKind::Fade(_) => self.fades.push(index),
                EffectKind::Particles(system) => {
                    if frustum.sphere_distance(system.position, system.bounding_radius) <= 0.0 {
                        continue;
                    }
                    if system.test_fogged {
                        let (x, y) = (system.position.x, system.position.y);
                        if !canvas.on_map(x, y) || !viewer.can_see_point(x, y) {
                            continue;
                        }
                    }
                    self.particles.push(index);
                }
                EffectKind::Light { .. } => continue,
                EffectKind::Generic { .. } => self.generic.push(index),
            }
            self.all.push(index);
        }
    }

    /// Applies pending moves of every classified effect.
    pub fn apply_delayed_updates(&self, effects: &mut [Effect]) {
        for &index in &self.all {
            if let Some(effect) = effects.get_mut(index) {
                effect.apply_delayed_updates();
            }
        }
    }

    pub fn fog(&self) -> &[usize] {
        &self.fog
    }

    pub fn particles(&self) -> &[usize] {
        &self.particles
    }

    pub fn bullet_trails(&self) -> &[usize] {
        &self.bullet_trails
    }

    pub fn fades(&self) -> &[usize] {
        &self.fades
    }

    pub fn generic(&self) -> &[usize] {
        &self.generic
    }

    pub fn all(&self) -> &[usize] {
        &self.all
    }

    /// True when a visible fade needs shader passes.
    pub fn has_shader_fades(&self, effects: &[Effect]) -> bool {
        self.fades.iter().any(|&index| {
            matches!(
                effects.get(index).map(|effect| &effect.kind),
                Some(EffectKind::Fade(fade)) if fade.pass_count() > 0
            )
        })
    }
}

/// Enables fog from the first visible fog effect, or disables it.
pub fn apply_fog(backend: &mut dyn DrawBackend, effects: &[Effect], visible: &VisibleEffects) {
    let params = visible.fog().first().and_then(|&index| match effects.get(index) {
        Some(Effect {
            kind: EffectKind::Fog(fog),
            ..
        }) => Some(FogParams {
            color: fog.color,
            start: fog.start,
            end: fog.end,
        }),
        _ => None,
    });
    backend.submit(DrawCommand::SetFog(params));
}

#[derive(Debug, Clone, Copy)]
struct SortedParticle {
    effect: usize,
    particle: usize,
    /// Shift toward the camera, shared by the whole system.
    offset: Vec3,
    distance_sq: f32,
}

/// Visible particles sorted back to front. Rebuilt when marked dirty, when
/// the camera moves, or when the visible systems or the effect slice change.
#[derive(Debug)]
pub struct ParticleList {
    entries: Vec<SortedParticle>,
    dirty: bool,
    camera: Option<Vec3>,
    systems: Vec<usize>,
    effect_count: usize,
}

impl Default for ParticleList {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            dirty: true,
            camera: None,
            systems: Vec::new(),
            effect_count: 0,
        }
    }
}

impl ParticleList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.dirty = true;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Effect and particle indices, farthest first.
    pub fn order(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.entries.iter().map(|entry| (entry.effect, entry.particle))
    }

    /// True when the cached order no longer matches this frame's input.
    fn is_stale(&self, effects: &[Effect], systems: &[usize], camera: Vec3) -> bool {
        self.dirty
            || self.camera != Some(camera)
            || self.effect_count != effects.len()
            || self.systems != systems
    }

    pub fn rebuild(&mut self, effects: &[Effect], systems: &[usize], camera: Vec3) {
        if !self.is_stale(effects, systems, camera) {
            return;
        }
        self.entries.clear();
        self.camera = Some(camera);
        self.effect_count = effects.len();
        self.systems.clear();
        self.systems.extend_from_slice(systems);
        for &effect in systems {
            let Some(Effect {
                kind: EffectKind::Particles(system),
                ..
            }) = effects.get(effect)
            else {
                continue;
            };
            let offset = if system.particle_dist != 0.0 {
                let to_camera = camera - system.position;
                let length = to_camera.length();
                if length > f32::EPSILON {
                    to_camera * (system.particle_dist / length)
                } else {
                    Vec3::ZERO
                }
            } else {
                Vec3::ZERO
            };
            for (particle, p) in system.particles.iter().enumerate() {
                if p.life <= 0.0 {
                    continue;
                }
                self.entries.push(SortedParticle {
                    effect,
                    particle,
                    offset,
                    distance_sq: p.position.distance_squared(camera),
                });
            }
        }
        // stable, so equal distances keep system order
        self.entries
            .sort_by(|a, b| b.distance_sq.total_cmp(&a.distance_sq));
        self.dirty = false;
    }

    /// Returns the number of particles drawn.
    pub fn draw(
        &self,
        backend: &mut dyn DrawBackend,
        effects: &[Effect],
        matrices: &GameMatrices,
    ) -> u32 {
        if self.entries.is_empty() {
            return 0;
        }
        let (right, up, _) = matrices.billboard_axes();

        backend.submit(DrawCommand::SetDepthTest(Some(DepthFunc::LessEqual)));
        backend.submit(DrawCommand::SetDepthWrite(false));
        backend.submit(DrawCommand::SetLighting(false));
        backend.submit(DrawCommand::SetModel(Mat4::IDENTITY));

        let mut current_dst: Option<BlendFactor> = None;
        let mut current_texture: Option<TextureId> = None;
        let mut batch: Vec<QuadVertex> = Vec::new();
        let mut drawn = 0;

        for entry in &self.entries {
            let Some(Effect {
                kind: EffectKind::Particles(system),
                ..
            }) = effects.get(entry.effect)
            else {
                continue;
            };
            let Some(particle) = system.particles.get(entry.particle) else {
                continue;
            };

            let dst_changed = current_dst != Some(system.blend.dst);
            let texture_changed = current_texture != Some(particle.texture);
            if dst_changed || texture_changed {
                if !batch.is_empty() {
                    backend.submit(DrawCommand::DrawQuads(std::mem::take(&mut batch)));
                }
                if dst_changed {
                    backend.submit(DrawCommand::SetBlend(Some(system.blend)));
                    current_dst = Some(system.blend.dst);
                }
                if texture_changed {
                    backend.submit(DrawCommand::BindTexture {
                        unit: 0,
                        texture: Some(particle.texture),
                    });
                    current_texture = Some(particle.texture);
                }
            }

            let (x, y) = if system.align_particles {
                (right * 0.5, up * 0.5)
            } else {
                (Vec3::new(0.5, 0.0, 0.0), Vec3::new(0.0, 0.5, 0.0))
            };
            let center = particle.position + entry.offset;
            let (x, y) = (x * particle.size, y * particle.size);
            let color = particle.color;
            batch.extend([
                QuadVertex::new(center - x - y, Vec2::new(0.0, 0.0), color),
                QuadVertex::new(center + x - y, Vec2::new(1.0, 0.0), color),
                QuadVertex::new(center + x + y, Vec2::new(1.0, 1.0), color),
                QuadVertex::new(center - x + y, Vec2::new(0.0, 1.0), color),
            ]);
            drawn += 1;
        }
        if !batch.is_empty() {
            backend.submit(DrawCommand::DrawQuads(batch));
        }

        backend.submit(DrawCommand::SetDepthWrite(true));
        backend.submit(DrawCommand::SetBlend(Some(BlendMode::ALPHA)));
        drawn
    }
}

/// Draws trails as lines, one batch per run of equal widths. Returns the
/// number of trails drawn.
pub fn draw_bullet_trails(
    backend: &mut dyn DrawBackend,
    effects: &[Effect],
    visible: &VisibleEffects,
) -> usize {
    let trails: Vec<_> = visible
        .bullet_trails()
        .iter()
        .filter_map(|&index| match effects.get(index) {
            Some(Effect {
                kind: EffectKind::BulletTrail(trail),
                ..
            }) => Some(*trail),
            _ => None,
        })
        .collect();
    if trails.is_empty() {
        return 0;
    }

    backend.submit(DrawCommand::SetBlend(Some(BlendMode::ALPHA)));
    backend.submit(DrawCommand::SetLighting(false));
    backend.submit(DrawCommand::SetModel(Mat4::IDENTITY));
    backend.submit(DrawCommand::BindTexture {
        unit: 0,
        texture: None,
    });

    let mut width: Option<f32> = None;
    let mut lines: Vec<LineVertex> = Vec::new();
    for trail in &trails {
        if width != Some(trail.width) {
            if !lines.is_empty() {
                backend.submit(DrawCommand::DrawLines(std::mem::take(&mut lines)));
            }
            backend.submit(DrawCommand::SetLineWidth(trail.width));
            width = Some(trail.width);
        }
        lines.push(LineVertex {
            position: trail.start,
            color: trail.color,
        });
        lines.push(LineVertex {
            position: trail.end,
            color: Vec4::new(trail.color.x, trail.color.y, trail.color.z, 0.0),
        });
    }
    if !lines.is_empty() {
        backend.submit(DrawCommand::DrawLines(lines));
    }
    backend.submit(DrawCommand::SetLineWidth(1.0));
    trails.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::matrices::Viewport;
    use crate::renderer::recorder::CommandRecorder;
    use crate::scene::{
        BulletTrail, Camera, FadeEffect, FadePass, FlatCanvas, FogEffect, OmniscientViewer,
        Particle, ParticleSystem, PlayerId,
    };
    use crate::renderer::draw::ShaderId;

    fn particle(position: Vec3, texture: u32) -> Particle {
        Particle {
            position,
            size: 1.0,
            color: Vec4::ONE,
            life: 1.0,
            texture: TextureId(texture),
        }
    }

    fn matrices() -> GameMatrices {
        GameMatrices::new(&Camera::default(), Viewport::new(800, 600))
    }

    #[test]
    fn classification_skips_unstarted_and_lights() {
        let effects = vec![
            Effect::new(EffectKind::Fog(FogEffect {
                color: Vec4::ONE,
                start: 10.0,
                end: 100.0,
            })),
            Effect::delayed(EffectKind::Fade(FadeEffect::full_screen(Vec4::ONE))),
            Effect::new(EffectKind::Light { color: Vec4::ONE }),
            Effect::new(EffectKind::Particles(ParticleSystem::new(Vec3::ZERO, 2.0))),
            Effect::new(EffectKind::Particles(ParticleSystem::new(
                Vec3::new(0.0, -500.0, 0.0),
                2.0,
            ))),
            Effect::new(EffectKind::Generic {
                position: Vec3::ZERO,
            }),
        ];
        let mut visible = VisibleEffects::new();
        visible.classify(
            &effects,
            &matrices().frustum,
            &FlatCanvas::new(64, 64),
            &OmniscientViewer::new(PlayerId(1)),
        );
        assert_eq!(visible.fog(), &[0]);
        assert!(visible.fades().is_empty());
        assert_eq!(visible.particles(), &[3]);
        assert_eq!(visible.generic(), &[5]);
        assert_eq!(visible.all(), &[0, 3, 5]);
    }

    #[test]
    fn fogged_systems_need_map_position() {
        let mut system = ParticleSystem::new(Vec3::new(-2.0, 0.0, 0.0), 5.0);
        system.test_fogged = true;
        let effects = vec![Effect::new(EffectKind::Particles(system))];
        let mut visible = VisibleEffects::new();
        visible.classify(
            &effects,
            &matrices().frustum,
            &FlatCanvas::new(64, 64),
            &OmniscientViewer::new(PlayerId(1)),
        );
        assert!(visible.particles().is_empty());
    }

    #[test]
    fn shader_fades_are_detected() {
        let mut fade = FadeEffect::full_screen(Vec4::ONE);
        let effects_plain = vec![Effect::new(EffectKind::Fade(fade.clone()))];
        fade.passes.push(FadePass {
            shader: ShaderId(1),
            downscale: 1,
        });
        let effects_shader = vec![Effect::new(EffectKind::Fade(fade))];

        let frustum = matrices().frustum;
        let canvas = FlatCanvas::new(8, 8);
        let viewer = OmniscientViewer::new(PlayerId(1));
        let mut visible = VisibleEffects::new();
        visible.classify(&effects_plain, &frustum, &canvas, &viewer);
        assert!(!visible.has_shader_fades(&effects_plain));
        visible.classify(&effects_shader, &frustum, &canvas, &viewer);
        assert!(visible.has_shader_fades(&effects_shader));
    }

    #[test]
    fn particles_sorted_far_to_near_and_cached() {
        let camera = Vec3::new(0.0, -30.0, 40.0);
        let mut system = ParticleSystem::new(Vec3::ZERO, 10.0);
        system.particles = vec![
            particle(Vec3::new(0.0, 0.0, 0.0), 1),
            particle(Vec3::new(0.0, 5.0, 0.0), 1),
            particle(Vec3::new(0.0, -5.0, 0.0), 1),
        ];
        let mut effects = vec![Effect::new(EffectKind::Particles(system))];

        let mut list = ParticleList::new();
        list.rebuild(&effects, &[0], camera);
        let order: Vec<_> = list.order().map(|(_, p)| p).collect();
        assert_eq!(order, vec![1, 0, 2]);
        assert!(!list.is_dirty());

        if let EffectKind::Particles(system) = &mut effects[0].kind {
            system.particles.push(particle(Vec3::new(0.0, 20.0, 0.0), 1));
        }
        list.rebuild(&effects, &[0], camera);
        assert_eq!(list.len(), 3);

        list.set_dirty();
        list.rebuild(&effects, &[0], camera);
        assert_eq!(list.len(), 4);
    }

    #[test]
    fn camera_move_resorts_particles() {
        let system = {
            let mut system = ParticleSystem::new(Vec3::ZERO, 20.0);
            system.particles = vec![
                particle(Vec3::new(0.0, -10.0, 0.0), 31),
                particle(Vec3::new(0.0, 10.0, 0.0), 32),
            ];
            system
        };
        let effects = vec![Effect::new(EffectKind::Particles(system))];

        let mut list = ParticleList::new();
        list.rebuild(&effects, &[0], Vec3::new(0.0, -30.0, 40.0));
        let order: Vec<_> = list.order().map(|(_, p)| p).collect();
        assert_eq!(order, vec![1, 0]);

        list.rebuild(&effects, &[0], Vec3::new(0.0, 30.0, 40.0));
        let order: Vec<_> = list.order().map(|(_, p)| p).collect();
        assert_eq!(order, vec![0, 1]);
    }

    #[test]
    fn removed_effect_drops_its_entries() {
        let mut visible_system = ParticleSystem::new(Vec3::ZERO, 5.0);
        visible_system.particles = vec![particle(Vec3::ZERO, 33)];
        let mut culled_system = ParticleSystem::new(Vec3::new(0.0, -500.0, 0.0), 5.0);
        culled_system.particles = vec![
            particle(Vec3::new(0.0, -500.0, 0.0), 34),
            particle(Vec3::new(1.0, -500.0, 0.0), 34),
        ];
        let mut effects = vec![
            Effect::new(EffectKind::Particles(visible_system)),
            Effect::new(EffectKind::Particles(culled_system)),
        ];
        let m = matrices();
        let mut list = ParticleList::new();
        list.rebuild(&effects, &[0], m.camera_position);
        assert_eq!(list.len(), 1);

        // the culled system now sits at index 0 but is still not visible
        effects.remove(0);
        list.rebuild(&effects, &[], m.camera_position);
        assert!(list.is_empty());
        let mut recorder = CommandRecorder::new();
        assert_eq!(list.draw(&mut recorder, &effects, &m), 0);
        assert_eq!(recorder.quad_count(), 0);
    }

    #[test]
    fn particle_batches_break_on_texture() {
        let mut system = ParticleSystem::new(Vec3::ZERO, 10.0);
        system.particles = vec![
            particle(Vec3::new(0.0, 10.0, 0.0), 1),
            particle(Vec3::new(0.0, 8.0, 0.0), 1),
            particle(Vec3::new(0.0, 6.0, 0.0), 2),
        ];
        let effects = vec![Effect::new(EffectKind::Particles(system))];
        let m = matrices();
        let mut list = ParticleList::new();
        list.rebuild(&effects, &[0], m.camera_position);

        let mut recorder = CommandRecorder::new();
        assert_eq!(list.draw(&mut recorder, &effects, &m), 3);
        assert_eq!(
            recorder.count(|command| matches!(command, DrawCommand::DrawQuads(_))),
            2
        );
        assert_eq!(recorder.quad_count(), 3);
    }

    #[test]
    fn trails_batched_by_width() {
        let trail = |width: f32| {
            Effect::new(EffectKind::BulletTrail(BulletTrail {
                start: Vec3::ZERO,
                end: Vec3::X,
                width,
                color: Vec4::ONE,
            }))
        };
        let effects = vec![trail(1.0), trail(1.0), trail(2.0)];
        let mut visible = VisibleEffects::new();
        visible.classify(
            &effects,
            &matrices().frustum,
            &FlatCanvas::new(8, 8),
            &OmniscientViewer::new(PlayerId(1)),
        );
        let mut recorder = CommandRecorder::new();
        assert_eq!(draw_bullet_trails(&mut recorder, &effects, &visible), 3);
        assert_eq!(
            recorder.count(|command| matches!(command, DrawCommand::DrawLines(_))),
            2
        );
    }

    #[test]
    fn only_first_fog_is_used() {
        let fog = |start: f32| {
            Effect::new(EffectKind::Fog(FogEffect {
                color: Vec4::ONE,
                start,
                end: 100.0,
            }))
        };
        let effects = vec![fog(5.0), fog(50.0)];
        let mut visible = VisibleEffects::new();
        visible.classify(
            &effects,
            &matrices().frustum,
            &FlatCanvas::new(8, 8),
            &OmniscientViewer::new(PlayerId(1)),
        );
        let mut recorder = CommandRecorder::new();
        apply_fog(&mut recorder, &effects, &visible);
        assert!(matches!(
            recorder.commands(),
            [DrawCommand::SetFog(Some(FogParams { start, .. }))] if *start == 5.0
        ));
    }
}
