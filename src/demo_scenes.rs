use glam::{Vec3, Vec4};
use hecs::{Entity, World};
use log::info;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rts_canvas::renderer::{BlendMode, ModelId, ShaderId, TextureId};
use rts_canvas::scene::{
    BulletTrail, Camera, Effect, EffectKind, FadeEffect, FadePass, FlatCanvas, FogEffect,
    ItemBody, ItemVisual, ModelItemRenderer, ModelLod, ModelLodTable, OmniscientViewer, Particle,
    ParticleSystem, PlayerId, RadarEmitter, Selected, UnitClass, UnitStatus,
};

const LOCAL_PLAYER: PlayerId = PlayerId(1);
const ENEMY_PLAYER: PlayerId = PlayerId(2);
const SMOKE_TEXTURE: TextureId = TextureId(30);
const FIRE_TEXTURE: TextureId = TextureId(31);
const BLUR_SHADER: ShaderId = ShaderId(2);

#[allow(dead_code)]
#[derive(Clone, Copy, Debug)]
pub enum DemoScene {
    Empty,
    Skirmish { units: usize, seed: u64 },
    /// Skirmish plus fire, trails and a blurred screen fade.
    Bombardment { units: usize, seed: u64 },
}

pub struct DemoBattlefield {
    pub world: World,
    pub effects: Vec<Effect>,
    pub canvas: FlatCanvas,
    pub viewer: OmniscientViewer,
    pub camera: Camera,
    rng: SmallRng,
}

fn tank_visual() -> ItemVisual {
    ItemVisual::new(ModelItemRenderer::new(
        ModelId(1),
        1.5,
        ModelLodTable::uniform(3, 25.0),
    ))
}

fn aircraft_visual() -> ItemVisual {
    ItemVisual::new(ModelItemRenderer::new(
        ModelId(2),
        2.0,
        ModelLodTable::uniform(2, 40.0),
    ))
}

fn facility_visual() -> ItemVisual {
    ItemVisual::new(ModelItemRenderer::new(
        ModelId(3),
        4.0,
        ModelLodTable::new(vec![
            ModelLod {
                min_distance: 0.0,
                has_transparent_meshes: true,
            },
            ModelLod {
                min_distance: 60.0,
                has_transparent_meshes: false,
            },
        ]),
    ))
}

impl DemoScene {
    pub fn build(self) -> DemoBattlefield {
        let canvas = FlatCanvas::new(96, 96);
        let camera = Camera {
            eye: Vec3::new(48.0, 10.0, 45.0),
            target: Vec3::new(48.0, 48.0, 0.0),
            ..Camera::default()
        };
        let mut battlefield = DemoBattlefield {
            world: World::new(),
            effects: Vec::new(),
            canvas,
            viewer: OmniscientViewer::new(LOCAL_PLAYER),
            camera,
            rng: SmallRng::seed_from_u64(0),
        };

        match self {
            DemoScene::Empty => {}
            DemoScene::Skirmish { units, seed } => {
                battlefield.rng = SmallRng::seed_from_u64(seed);
                battlefield.spawn_units(units);
            }
            DemoScene::Bombardment { units, seed } => {
                battlefield.rng = SmallRng::seed_from_u64(seed);
                battlefield.spawn_units(units);
                battlefield.spawn_effects();
            }
        }

        info!(
            "Demo scene {:?}: {} entities, {} effects",
            self,
            battlefield.world.len(),
            battlefield.effects.len()
        );
        battlefield
    }
}

impl DemoBattlefield {
    fn random_ground_position(&mut self) -> Vec3 {
        let x = self.rng.gen_range(2.0..self.canvas.width as f32 - 2.0);
        let y = self.rng.gen_range(2.0..self.canvas.height as f32 - 2.0);
        Vec3::new(x, y, self.canvas.ground_height)
    }

    fn spawn_units(&mut self, count: usize) {
        for i in 0..count {
            let owner = if self.rng.gen_bool(0.5) {
                LOCAL_PLAYER
            } else {
                ENEMY_PLAYER
            };
            let mut position = self.random_ground_position();
            let heading = self.rng.gen_range(0.0..360.0);
            let roll = self.rng.gen_range(0..10);

            let (class, visual, size) = match roll {
                0 => (UnitClass::Facility, facility_visual(), Vec3::new(4.0, 4.0, 3.0)),
                1 | 2 => {
                    position.z += 8.0;
                    (UnitClass::Aircraft, aircraft_visual(), Vec3::new(2.0, 2.0, 1.0))
                }
                _ => (UnitClass::Land, tank_visual(), Vec3::new(1.0, 1.5, 0.8)),
            };

            let mut unit = UnitStatus::new(owner, class, 100);
            unit.health = self.rng.gen_range(10..=100);
            let body = ItemBody::new(position, size).with_heading(heading);
            let entity = self.world.spawn((body, visual, unit));

            if owner == LOCAL_PLAYER && i % 7 == 0 {
                let _ = self.world.insert_one(entity, Selected);
            }
            if class == UnitClass::Facility && owner == ENEMY_PLAYER {
                let _ = self.world.insert_one(
                    entity,
                    RadarEmitter {
                        transmitted_power: 400.0,
                    },
                );
            }
        }
    }

    fn spawn_effects(&mut self) {
        self.effects.push(Effect::new(EffectKind::Fog(FogEffect {
            color: Vec4::new(0.6, 0.6, 0.7, 1.0),
            start: 60.0,
            end: 180.0,
        })));

        for _ in 0..6 {
            let position = self.random_ground_position();
            let mut system = ParticleSystem::new(position, 4.0);
            system.particle_dist = 0.5;
            system.test_fogged = true;
            if self.rng.gen_bool(0.5) {
                system.blend = BlendMode::ADDITIVE;
            }
            let texture = if system.blend == BlendMode::ADDITIVE {
                FIRE_TEXTURE
            } else {
                SMOKE_TEXTURE
            };
            system.particles = (0..24)
                .map(|_| Particle {
                    position: position
                        + Vec3::new(
                            self.rng.gen_range(-1.0..1.0),
                            self.rng.gen_range(-1.0..1.0),
                            self.rng.gen_range(0.0..3.0),
                        ),
                    size: self.rng.gen_range(0.3..1.2),
                    color: Vec4::new(1.0, 0.8, 0.6, 0.7),
                    life: self.rng.gen_range(0.5..3.0),
                    texture,
                })
                .collect();
            self.effects.push(Effect::new(EffectKind::Particles(system)));
        }

        for _ in 0..10 {
            let start = self.random_ground_position() + Vec3::new(0.0, 0.0, 0.5);
            let end = self.random_ground_position() + Vec3::new(0.0, 0.0, 0.5);
            let width = if self.rng.gen_bool(0.3) { 2.0 } else { 1.0 };
            self.effects
                .push(Effect::new(EffectKind::BulletTrail(BulletTrail {
                    start,
                    end,
                    width,
                    color: Vec4::new(1.0, 1.0, 0.5, 1.0),
                })));
        }

        let mut blur = FadeEffect::full_screen(Vec4::new(1.0, 1.0, 1.0, 0.5));
        blur.passes = vec![
            FadePass {
                shader: BLUR_SHADER,
                downscale: 2,
            },
            FadePass {
                shader: BLUR_SHADER,
                downscale: 1,
            },
        ];
        self.effects.push(Effect::new(EffectKind::Fade(blur)));
        self.effects
            .push(Effect::new(EffectKind::Fade(FadeEffect::full_screen(Vec4::new(
                0.0, 0.0, 0.0, 0.2,
            )))));
    }

    /// Ages particles, drifts the camera and damages random units. Returns
    /// units that were destroyed and removed from the world.
    pub fn advance(&mut self, dt: f32) -> Vec<Entity> {
        for effect in &mut self.effects {
            if let EffectKind::Particles(system) = &mut effect.kind {
                for particle in &mut system.particles {
                    particle.life -= dt;
                    particle.position.z += dt * 0.8;
                }
                if self.rng.gen_bool(0.2) {
                    effect.pending_position = Some(
                        system.position + Vec3::new(self.rng.gen_range(-0.5..0.5), 0.0, 0.0),
                    );
                }
            }
        }
        self.camera.dolly(-0.5);

        let mut destroyed = Vec::new();
        for (entity, unit) in self.world.query_mut::<&mut UnitStatus>() {
            if self.rng.gen_bool(0.05) {
                unit.health = unit.health.saturating_sub(self.rng.gen_range(5..40));
                if unit.health == 0 {
                    destroyed.push(entity);
                }
            }
        }
        for entity in &destroyed {
            let _ = self.world.despawn(*entity);
        }
        destroyed
    }

    pub fn random_unit(&mut self) -> Option<Entity> {
        let entities: Vec<Entity> = self
            .world
            .query::<&UnitStatus>()
            .iter()
            .map(|(entity, _)| entity)
            .collect();
        if entities.is_empty() {
            return None;
        }
        Some(entities[self.rng.gen_range(0..entities.len())])
    }
}
