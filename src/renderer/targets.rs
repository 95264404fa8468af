use std::collections::HashSet;

use super::draw::{TargetId, TextureId};
use super::error::TargetError;

/// Texture ids handed out by target factories start here so they never
/// collide with caller-provided texture ids.
pub const TARGET_TEXTURE_BASE: u32 = 1 << 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TargetSpec {
    pub width: u32,
    pub height: u32,
    pub depth: bool,
}

impl TargetSpec {
    pub fn new(width: u32, height: u32, depth: bool) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }
}

/// Textures backing one off-screen target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderTargetTextures {
    pub id: TargetId,
    pub color: TextureId,
    pub depth: Option<TextureId>,
}

/// Allocates GPU storage for render targets.
pub trait TargetFactory {
    fn max_texture_size(&self) -> u32;

    fn create_target(&mut self, spec: TargetSpec) -> Result<RenderTargetTextures, TargetError>;

    fn destroy_target(&mut self, target: &RenderTargetTextures);
}

pub(crate) fn check_spec(spec: TargetSpec, max: u32) -> Result<(), TargetError> {
    if spec.width == 0 || spec.height == 0 {
        return Err(TargetError::ZeroSize);
    }
    let requested = spec.width.max(spec.height);
    if requested > max {
        return Err(TargetError::TooLarge { requested, max });
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct SceneRenderTarget {
    textures: RenderTargetTextures,
    spec: TargetSpec,
    in_use: bool,
}

impl SceneRenderTarget {
    pub fn id(&self) -> TargetId {
        self.textures.id
    }

    pub fn color(&self) -> TextureId {
        self.textures.color
    }

    pub fn depth(&self) -> Option<TextureId> {
        self.textures.depth
    }

    pub fn width(&self) -> u32 {
        self.spec.width
    }

    pub fn height(&self) -> u32 {
        self.spec.height
    }

    pub fn has_depth(&self) -> bool {
        self.spec.depth
    }

    pub fn in_use(&self) -> bool {
        self.in_use
    }
}

/// Reuses off-screen targets by `(width, height, depth)`. A target is held by
/// one consumer between `acquire` and `release`; the flag is advisory.
#[derive(Debug, Default)]
pub struct RenderTargetCache {
    targets: Vec<SceneRenderTarget>,
}

impl RenderTargetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(
        &mut self,
        factory: &mut dyn TargetFactory,
        width: u32,
        height: u32,
        depth: bool,
    ) -> Result<TargetId, TargetError> {
        let spec = TargetSpec::new(width, height, depth);
        if let Some(target) = self
            .targets
            .iter_mut()
            .find(|target| !target.in_use && target.spec == spec)
        {
            target.in_use = true;
            return Ok(target.id());
        }

        let textures = factory.create_target(spec)?;
        log::debug!(
            "Created render target {:?} ({}x{}, depth: {})",
            textures.id,
            width,
            height,
            depth
        );
        self.targets.push(SceneRenderTarget {
            textures,
            spec,
            in_use: true,
        });
        Ok(textures.id)
    }

    /// Returns false when the target is unknown or was not held.
    pub fn release(&mut self, id: TargetId) -> bool {
        match self.targets.iter_mut().find(|target| target.id() == id) {
            Some(target) if target.in_use => {
                target.in_use = false;
                true
            }
            Some(_) => {
                log::warn!("Render target {:?} released twice", id);
                false
            }
            None => {
                log::warn!("Release of unknown render target {:?}", id);
                false
            }
        }
    }

    /// Destroys every cached target.
    pub fn flush(&mut self, factory: &mut dyn TargetFactory) {
        let held = self.in_use_count();
        if held > 0 {
            log::warn!("Flushing render target cache with {} targets in use", held);
        }
        for target in self.targets.drain(..) {
            factory.destroy_target(&target.textures);
        }
    }

    pub fn get(&self, id: TargetId) -> Option<&SceneRenderTarget> {
        self.targets.iter().find(|target| target.id() == id)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn in_use_count(&self) -> usize {
        self.targets.iter().filter(|target| target.in_use).count()
    }
}

/// Factory that hands out ids without touching a GPU.
#[derive(Debug)]
pub struct MemoryTargetFactory {
    max_size: u32,
    next_target: u64,
    next_texture: u32,
    live: HashSet<TargetId>,
    created: usize,
    fail_allocations: bool,
}

impl MemoryTargetFactory {
    pub fn new(max_size: u32) -> Self {
        Self {
            max_size,
            next_target: 1,
            next_texture: TARGET_TEXTURE_BASE,
            live: HashSet::new(),
            created: 0,
            fail_allocations: false,
        }
    }

    /// Makes every following allocation fail.
    pub fn set_fail_allocations(&mut self, fail: bool) {
        self.fail_allocations = fail;
    }

    pub fn created(&self) -> usize {
        self.created
    }

    pub fn live(&self) -> usize {
        self.live.len()
    }

    fn next_texture(&mut self) -> TextureId {
        let id = TextureId(self.next_texture);
        self.next_texture += 1;
        id
    }
}

impl Default for MemoryTargetFactory {
    fn default() -> Self {
        Self::new(8192)
    }
}

impl TargetFactory for MemoryTargetFactory {
    fn max_texture_size(&self) -> u32 {
        self.max_size
    }

    fn create_target(&mut self, spec: TargetSpec) -> Result<RenderTargetTextures, TargetError> {
        check_spec(spec, self.max_size)?;
        if self.fail_allocations {
            return Err(TargetError::Backend("allocation disabled".into()));
        }
        let id = TargetId(self.next_target);
        self.next_target += 1;
        let color = self.next_texture();
        let depth = spec.depth.then(|| self.next_texture());
        self.live.insert(id);
        self.created += 1;
        Ok(RenderTargetTextures { id, color, depth })
    }

    fn destroy_target(&mut self, target: &RenderTargetTextures) {
        self.live.remove(&target.id);
    }
}
