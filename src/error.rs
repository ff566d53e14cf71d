//! Error types for startup and per-frame failures.

use std::path::PathBuf;

/// Failures while bringing the application up.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Window creation failed: {0}")]
    Window(#[from] winit::error::OsError),

    #[error("Event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    #[error("Surface creation failed: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("No compatible graphics adapter found")]
    NoAdapter,

    #[error("Device request failed: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("Invalid config: {0}")]
    Config(#[from] ron::error::SpannedError),

    #[error("Failed to load asset {path:?}: {source}")]
    Asset {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Invalid texture size {0}")]
    TextureSize(u32),
}

/// Failures confined to a single frame. The frame is skipped; the loop continues.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("Surface unavailable: {0}")]
    Surface(#[from] wgpu::SurfaceError),

    #[error("Non-finite transform in {0} draw")]
    NonFinite(&'static str),
}
