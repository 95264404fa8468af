pub mod renderer;
pub mod scene;
pub mod settings;

pub use renderer::{CanvasRenderer, FrameInput, FrameStatistics, GraphicsContext, RenderError};
pub use settings::RenderSettings;

/// Info level by default, `RUST_LOG` overrides. Safe to call repeatedly.
pub fn init_logging() {
    let _ = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init();
}
