// scene/mod.rs

pub mod camera;
pub mod canvas;
pub mod components;
pub mod effects;
pub mod model;

// Re-export commonly used types
pub use camera::Camera;
pub use canvas::{Allegiance, Canvas, FlatCanvas, LocalViewer, OmniscientViewer, VisibleStatus};
pub use effects::{
    BulletTrail, Effect, EffectKind, FadeEffect, FadePass, FogEffect, Particle, ParticleSystem,
};
pub use model::{ItemRenderer, ModelItemRenderer, ModelLod, ModelLodTable};

// Re-export all components
pub use components::{
    ItemBody, ItemVisual, PlayerId, RadarEmitter, RadarJammer, Selected, UnitClass, UnitStatus,
};
