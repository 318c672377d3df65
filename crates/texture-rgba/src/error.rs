use crate::frame::FrameRejection;

/// Errors reported to the dispatch layer for texture operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RendererError {
    /// The key argument was missing or could not be interpreted.
    #[error("texture key is missing or invalid")]
    InvalidKey,
    /// Reported by dispatch layers that require exclusive creation; the
    /// registry itself treats repeated creates as idempotent.
    #[error("a renderer already exists for key {0}")]
    AlreadyExists(i64),
    #[error("frame dimensions must be positive")]
    InvalidDimensions,
    #[error("row stride is smaller than width * 4")]
    InvalidStride,
    #[error("pixel buffer is smaller than row stride * height")]
    BufferTooSmall,
    #[error("no renderer for key {0}")]
    RendererNotFound(i64),
    #[error("failed to create renderer: {0}")]
    CreationFailed(String),
    #[error("failed to bind presentation surface: {0}")]
    SurfaceBindFailure(String),
    #[error("presentation surface unavailable: {0}")]
    SurfaceUnavailable(String),
    #[error("render failed: {0}")]
    RenderFailure(String),
}

impl RendererError {
    /// Stable machine-readable code for the dispatch boundary.
    pub fn code(&self) -> &'static str {
        match self {
            RendererError::InvalidKey => "INVALID_KEY",
            RendererError::AlreadyExists(_) => "ALREADY_EXISTS",
            RendererError::InvalidDimensions => "INVALID_DIMENSIONS",
            RendererError::InvalidStride => "INVALID_STRIDE",
            RendererError::BufferTooSmall => "BUFFER_TOO_SMALL",
            RendererError::RendererNotFound(_) => "RENDERER_NOT_FOUND",
            RendererError::CreationFailed(_) => "CREATE_TEXTURE_FAILED",
            RendererError::SurfaceBindFailure(_) => "SURFACE_BIND_FAILED",
            RendererError::SurfaceUnavailable(_) => "SURFACE_UNAVAILABLE",
            RendererError::RenderFailure(_) => "RENDER_FAILED",
        }
    }

    /// Whether the error was a frame validation rejection (no GPU state touched).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            RendererError::InvalidDimensions
                | RendererError::InvalidStride
                | RendererError::BufferTooSmall
        )
    }
}

impl From<FrameRejection> for RendererError {
    fn from(value: FrameRejection) -> Self {
        match value {
            FrameRejection::InvalidDimensions => RendererError::InvalidDimensions,
            FrameRejection::InvalidStride => RendererError::InvalidStride,
            FrameRejection::BufferTooSmall => RendererError::BufferTooSmall,
        }
    }
}

/// Failures raised by a graphics backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The presentation surface was destroyed or went out of date.
    #[error("presentation surface lost")]
    SurfaceLost,
    #[error("surface bind refused: {0}")]
    SurfaceBind(String),
    #[error("shader compilation failed: {0}")]
    ShaderCompile(String),
    #[error("device error: {0}")]
    Device(String),
    #[error("texture allocation failed: {0}")]
    Allocation(String),
    #[error("draw failed: {0}")]
    Render(String),
}
