use glam::{Vec3, Vec4};

use crate::renderer::draw::{BlendMode, ShaderId, TextureId};

/// Linear distance fog.
#[derive(Debug, Clone, Copy)]
pub struct FogEffect {
    pub color: Vec4,
    pub start: f32,
    pub end: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct BulletTrail {
    pub start: Vec3,
    pub end: Vec3,
    pub width: f32,
    pub color: Vec4,
}

#[derive(Debug, Clone, Copy)]
pub struct FadePass {
    pub shader: ShaderId,
    /// Output of this pass is `viewport / downscale`.
    pub downscale: u32,
}

/// Screen-space fade. Without passes it is a plain coloured quad; with
/// passes each shader reads the previous pass' output.
#[derive(Debug, Clone)]
pub struct FadeEffect {
    /// `x, y, w, h` in `[0, 1]` screen units, origin bottom-left.
    pub geometry: Vec4,
    pub color: Vec4,
    pub blend: BlendMode,
    pub passes: Vec<FadePass>,
}

impl FadeEffect {
    pub fn full_screen(color: Vec4) -> Self {
        Self {
            geometry: Vec4::new(0.0, 0.0, 1.0, 1.0),
            color,
            blend: BlendMode::ALPHA,
            passes: Vec::new(),
        }
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    pub fn downscale(&self, pass: usize) -> u32 {
        self.passes.get(pass).map_or(1, |p| p.downscale.max(1))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Particle {
    pub position: Vec3,
    pub size: f32,
    pub color: Vec4,
    /// Remaining life; dead particles are not drawn.
    pub life: f32,
    pub texture: TextureId,
}

#[derive(Debug, Clone)]
pub struct ParticleSystem {
    pub position: Vec3,
    pub bounding_radius: f32,
    /// Pulls every particle this far toward the camera when non-zero.
    pub particle_dist: f32,
    pub align_particles: bool,
    pub blend: BlendMode,
    /// Only drawn when the local player can see the system's position.
    pub test_fogged: bool,
    pub particles: Vec<Particle>,
}

impl ParticleSystem {
    pub fn new(position: Vec3, bounding_radius: f32) -> Self {
        Self {
            position,
            bounding_radius,
            particle_dist: 0.0,
            align_particles: true,
            blend: BlendMode::ALPHA,
            test_fogged: false,
            particles: Vec::new(),
        }
    }

    pub fn live_particles(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter().filter(|p| p.life > 0.0)
    }

    fn move_to(&mut self, position: Vec3) {
        let delta = position - self.position;
        self.position = position;
        for particle in &mut self.particles {
            particle.position += delta;
        }
    }
}

#[derive(Debug, Clone)]
pub enum EffectKind {
    Fog(FogEffect),
    BulletTrail(BulletTrail),
    Fade(FadeEffect),
    Particles(ParticleSystem),
    /// Handled by the lighting code, skipped here.
    Light { color: Vec4 },
    /// Anything else; only gets its delayed updates.
    Generic { position: Vec3 },
}

#[derive(Debug, Clone)]
pub struct Effect {
    pub started: bool,
    /// Position change requested during the simulation step, applied when
    /// the effect is next drawn.
    pub pending_position: Option<Vec3>,
    pub kind: EffectKind,
}

impl Effect {
    pub fn new(kind: EffectKind) -> Self {
        Self {
            started: true,
            pending_position: None,
            kind,
        }
    }

    pub fn delayed(kind: EffectKind) -> Self {
        Self {
            started: false,
            ..Self::new(kind)
        }
    }

    pub fn position(&self) -> Option<Vec3> {
        match &self.kind {
            EffectKind::Particles(system) => Some(system.position),
            EffectKind::Generic { position } => Some(*position),
            EffectKind::BulletTrail(trail) => Some(trail.start),
            _ => None,
        }
    }

    pub fn apply_delayed_updates(&mut self) {
        let Some(position) = self.pending_position.take() else {
            return;
        };
        match &mut self.kind {
            EffectKind::Particles(system) => system.move_to(position),
            EffectKind::Generic { position: p } => *p = position,
            EffectKind::BulletTrail(trail) => {
                let delta = position - trail.start;
                trail.start = position;
                trail.end += delta;
            }
            EffectKind::Fog(_) | EffectKind::Fade(_) | EffectKind::Light { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delayed_update_moves_particles_with_system() {
        let mut system = ParticleSystem::new(Vec3::ZERO, 1.0);
        system.particles.push(Particle {
            position: Vec3::X,
            size: 1.0,
            color: Vec4::ONE,
            life: 1.0,
            texture: TextureId(1),
        });
        let mut effect = Effect::new(EffectKind::Particles(system));
        effect.pending_position = Some(Vec3::new(0.0, 5.0, 0.0));
        effect.apply_delayed_updates();

        let EffectKind::Particles(system) = &effect.kind else {
            panic!("kind changed");
        };
        assert_eq!(system.particles[0].position, Vec3::new(1.0, 5.0, 0.0));
        assert!(effect.pending_position.is_none());
    }

    #[test]
    fn downscale_defaults_to_one() {
        let fade = FadeEffect::full_screen(Vec4::ONE);
        assert_eq!(fade.downscale(3), 1);
    }
}
