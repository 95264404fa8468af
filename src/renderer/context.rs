use glam::Vec3;

use super::draw::{DrawBackend, ShaderId, TextureId};
use super::targets::TargetFactory;

/// Optional backend features. Missing ones switch the matching pass off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub render_to_texture: bool,
    pub shadow_maps: bool,
    pub shaders: bool,
}

impl Capabilities {
    pub const FULL: Self = Self {
        render_to_texture: true,
        shadow_maps: true,
        shaders: true,
    };
    pub const FIXED_FUNCTION: Self = Self {
        render_to_texture: false,
        shadow_maps: false,
        shaders: false,
    };
}

/// Billboard textures for far-away and radar-only units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IconTextures {
    pub land: TextureId,
    pub aircraft: TextureId,
    pub facility: TextureId,
    pub radar: TextureId,
    pub jamming: TextureId,
}

impl Default for IconTextures {
    fn default() -> Self {
        Self {
            land: TextureId(1),
            aircraft: TextureId(2),
            facility: TextureId(3),
            radar: TextureId(4),
            jamming: TextureId(5),
        }
    }
}

/// Everything the canvas renderer needs from the graphics system, created
/// once when the pipeline starts and dropped at teardown.
pub struct GraphicsContext<B: DrawBackend> {
    pub(crate) backend: B,
    pub(crate) targets: Box<dyn TargetFactory>,
    capabilities: Capabilities,
    icons: IconTextures,
    unit_shader: Option<ShaderId>,
    light_position: Vec3,
}

impl<B: DrawBackend> GraphicsContext<B> {
    pub fn new(
        backend: B,
        targets: Box<dyn TargetFactory>,
        capabilities: Capabilities,
        icons: IconTextures,
    ) -> Self {
        if !capabilities.render_to_texture {
            log::info!("Render-to-texture unavailable; shader fade effects disabled");
        }
        if !capabilities.shadow_maps {
            log::info!("Shadow maps unavailable; shadows disabled");
        }
        if !capabilities.shaders {
            log::info!("Shaders unavailable; using fixed-function rendering");
        }
        Self {
            backend,
            targets,
            capabilities,
            icons,
            unit_shader: None,
            light_position: Vec3::new(0.0, 0.0, 100.0),
        }
    }

    /// Installs the unit shadow shader. Ignored without shader and shadow
    /// map support.
    pub fn with_unit_shader(mut self, shader: ShaderId) -> Self {
        if self.capabilities.shaders && self.capabilities.shadow_maps {
            self.unit_shader = Some(shader);
        } else {
            log::info!("Unit shader not loaded: missing shader or shadow map support");
        }
        self
    }

    pub fn with_light_position(mut self, position: Vec3) -> Self {
        self.light_position = position;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn target_factory(&self) -> &dyn TargetFactory {
        self.targets.as_ref()
    }

    pub fn target_factory_mut(&mut self) -> &mut dyn TargetFactory {
        self.targets.as_mut()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn icons(&self) -> &IconTextures {
        &self.icons
    }

    pub fn unit_shader(&self) -> Option<ShaderId> {
        self.unit_shader
    }

    pub fn light_position(&self) -> Vec3 {
        self.light_position
    }

    pub fn set_light_position(&mut self, position: Vec3) {
        self.light_position = position;
    }

    /// Drains backend errors, logging each with `context`. Returns true when
    /// any error was pending.
    pub fn check_errors(&mut self, context: &str) -> bool {
        check_gpu_errors(&mut self.backend, context)
    }
}

/// Drains and logs pending backend errors.
pub(crate) fn check_gpu_errors(backend: &mut dyn DrawBackend, context: &str) -> bool {
    let mut found = false;
    while let Some(message) = backend.take_error() {
        log::error!("GPU error {}: {}", context, message);
        found = true;
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::recorder::CommandRecorder;
    use crate::renderer::targets::MemoryTargetFactory;

    #[test]
    fn unit_shader_requires_capabilities() {
        let ctx = GraphicsContext::new(
            CommandRecorder::new(),
            Box::new(MemoryTargetFactory::default()),
            Capabilities::FIXED_FUNCTION,
            IconTextures::default(),
        )
        .with_unit_shader(ShaderId(9));
        assert!(ctx.unit_shader().is_none());

        let ctx = GraphicsContext::new(
            CommandRecorder::new(),
            Box::new(MemoryTargetFactory::default()),
            Capabilities::FULL,
            IconTextures::default(),
        )
        .with_unit_shader(ShaderId(9));
        assert_eq!(ctx.unit_shader(), Some(ShaderId(9)));
    }

    #[test]
    fn errors_are_drained() {
        let mut ctx = GraphicsContext::new(
            CommandRecorder::new(),
            Box::new(MemoryTargetFactory::default()),
            Capabilities::FULL,
            IconTextures::default(),
        );
        ctx.backend_mut().inject_error("a");
        ctx.backend_mut().inject_error("b");
        assert!(ctx.check_errors("after test"));
        assert!(!ctx.check_errors("after test"));
    }
}
