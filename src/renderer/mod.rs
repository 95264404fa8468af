pub mod canvas_renderer;
pub mod context;
pub mod draw;
pub mod error;
pub mod feedback;
pub mod frustum;
pub mod gpu;
pub mod ground;
pub mod icons;
pub mod items;
pub mod matrices;
pub mod particles;
pub mod postprocess;
pub mod recorder;
pub mod selection;
pub mod shadows;
pub mod targets;
pub mod visibility;

pub use canvas_renderer::{CanvasRenderer, FrameInput, FrameStatistics};
pub use context::{Capabilities, GraphicsContext, IconTextures};
pub use draw::{
    BlendFactor, BlendMode, DepthFunc, DrawBackend, DrawCommand, FogParams, LineVertex, ModelId,
    QuadVertex, RenderFlags, ShaderId, TargetId, TextureId,
};
pub use error::{RenderError, TargetError};
pub use feedback::{FeedbackArena, FeedbackKind};
pub use frustum::{Frustum, FrustumPlane, Plane};
pub use gpu::{HeadlessGpu, WgpuTargetFactory};
pub use ground::{
    FlatGroundRenderer, FlatWaterRenderer, GroundRenderer, GroundRendererRegistry,
    GroundRendererStatistics, NullGroundRenderer, WaterRenderer,
};
pub use matrices::{GameMatrices, PickRect, Viewport};
pub use postprocess::FadeStatistics;
pub use recorder::CommandRecorder;
pub use shadows::{ShadowFrustumFit, ShadowMapGenerator, ShadowUniform};
pub use targets::{MemoryTargetFactory, RenderTargetCache, TargetFactory, TargetSpec};
pub use visibility::{RenderItem, RenderItemList};
