use std::path::PathBuf;

use ash::vk;

/// Vulkan 层的错误
#[derive(Debug, thiserror::Error)]
pub enum GfxError {
    #[error("failed to load vulkan entry: {0}")]
    LoadEntry(#[from] ash::LoadingError),

    #[error("vulkan call failed: {0}")]
    Vk(#[from] vk::Result),

    #[error("required {kind} is not supported: {name}")]
    Unsupported { kind: &'static str, name: String },

    #[error("no suitable gpu: {0}")]
    NoSuitableGpu(String),

    #[error("failed to read shader {path:?}: {source}")]
    ShaderLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("buffer is not host visible: {0}")]
    NotMapped(String),

    #[error("invalid debug name: {0}")]
    DebugName(#[from] std::ffi::NulError),
}

pub type GfxResult<T> = Result<T, GfxError>;
