use bitflags::bitflags;
use glam::{Mat4, Vec2, Vec3, Vec4};

/// Texture known to the draw backend. Icon textures are handed in by the
/// caller, render-target textures are allocated by a [`TargetFactory`].
///
/// [`TargetFactory`]: crate::renderer::targets::TargetFactory
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShaderId(pub u32);

/// Identifies a model shared by many items. Render items are bucketed by it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
    SrcColor,
    DstColor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlendMode {
    pub src: BlendFactor,
    pub dst: BlendFactor,
}

impl BlendMode {
    pub const ALPHA: Self = Self {
        src: BlendFactor::SrcAlpha,
        dst: BlendFactor::OneMinusSrcAlpha,
    };
    pub const ADDITIVE: Self = Self {
        src: BlendFactor::SrcAlpha,
        dst: BlendFactor::One,
    };
}

impl Default for BlendMode {
    fn default() -> Self {
        Self::ALPHA
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepthFunc {
    Less,
    LessEqual,
    Always,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FogParams {
    pub color: Vec4,
    pub start: f32,
    pub end: f32,
}

bitflags! {
    /// Per-pass flags handed to item and ground renderers.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct RenderFlags: u32 {
        /// Only depth is written (shadow pass). Colour, tint and icons are skipped.
        const DEPTH_ONLY = 1 << 0;
        /// The shadow map is bound on the shadow texture unit.
        const SHADOWED = 1 << 1;
        /// Lighting is enabled for this pass.
        const LIT = 1 << 2;
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineVertex {
    pub position: Vec3,
    pub color: Vec4,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuadVertex {
    pub position: Vec3,
    pub uv: Vec2,
    pub color: Vec4,
}

impl QuadVertex {
    pub fn new(position: Vec3, uv: Vec2, color: Vec4) -> Self {
        Self {
            position,
            uv,
            color,
        }
    }
}

/// One ordered instruction for the backend. The frame is a flat stream of
/// these; state persists until changed.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    /// `None` selects the screen.
    SetRenderTarget(Option<TargetId>),
    SetViewport {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },
    Clear {
        color: Option<Vec4>,
        depth: bool,
    },
    SetDepthTest(Option<DepthFunc>),
    SetDepthWrite(bool),
    SetColorWrite(bool),
    /// `(factor, units)`; `None` disables the offset.
    SetPolygonOffset(Option<(f32, f32)>),
    SetWireframe(bool),
    SetCulling(bool),
    SetBlend(Option<BlendMode>),
    /// Fragments with alpha below the reference are discarded.
    SetAlphaTest(Option<f32>),
    SetLighting(bool),
    SetFog(Option<FogParams>),
    SetProjection(Mat4),
    SetView(Mat4),
    SetModel(Mat4),
    SetTextureMatrix {
        unit: u32,
        matrix: Mat4,
    },
    SetShadowCompare {
        unit: u32,
        enabled: bool,
    },
    BindTexture {
        unit: u32,
        texture: Option<TextureId>,
    },
    GenerateMipmaps(TextureId),
    BindShader(Option<ShaderId>),
    SetUniform {
        name: &'static str,
        value: f32,
    },
    SetColor(Vec4),
    SetLineWidth(f32),
    PrepareModel(ModelId),
    DrawMesh {
        model: ModelId,
        lod: usize,
        transparent: bool,
    },
    /// Vertex pairs, one segment each.
    DrawLines(Vec<LineVertex>),
    /// Groups of four vertices, one quad each.
    DrawQuads(Vec<QuadVertex>),
}

impl DrawCommand {
    /// True for commands that rasterize geometry.
    pub fn is_draw_call(&self) -> bool {
        matches!(
            self,
            DrawCommand::DrawMesh { .. } | DrawCommand::DrawLines(_) | DrawCommand::DrawQuads(_)
        )
    }
}

/// Consumer of the command stream.
pub trait DrawBackend {
    fn submit(&mut self, command: DrawCommand);

    /// Monotonic number of texture binds issued so far.
    fn texture_binds(&self) -> u64;

    /// Returns and clears the oldest pending backend error.
    fn take_error(&mut self) -> Option<String>;
}

pub(crate) fn screen_quad(geometry: Vec4, uv_max: Vec2, color: Vec4) -> [QuadVertex; 4] {
    let (x, y, w, h) = (geometry.x, geometry.y, geometry.z, geometry.w);
    [
        QuadVertex::new(Vec3::new(x, y, 0.0), Vec2::new(x, y) * uv_max, color),
        QuadVertex::new(
            Vec3::new(x + w, y, 0.0),
            Vec2::new(x + w, y) * uv_max,
            color,
        ),
        QuadVertex::new(
            Vec3::new(x + w, y + h, 0.0),
            Vec2::new(x + w, y + h) * uv_max,
            color,
        ),
        QuadVertex::new(
            Vec3::new(x, y + h, 0.0),
            Vec2::new(x, y + h) * uv_max,
            color,
        ),
    ]
}
