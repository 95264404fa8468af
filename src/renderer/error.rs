use thiserror::Error;

/// Caller contract violations detected before a frame issues any command.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("no camera set for the canvas renderer")]
    MissingCamera,
    #[error("no canvas set for the canvas renderer")]
    MissingCanvas,
    #[error("no local player viewer set for the canvas renderer")]
    MissingLocalViewer,
    #[error("viewport {width}x{height} is empty")]
    InvalidViewport { width: u32, height: u32 },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TargetError {
    #[error("render-to-texture is not supported by this backend")]
    Unsupported,
    #[error("render target size must be non-zero")]
    ZeroSize,
    #[error("render target {requested} exceeds the maximum texture size {max}")]
    TooLarge { requested: u32, max: u32 },
    #[error("render target allocation failed: {0}")]
    Backend(String),
}
