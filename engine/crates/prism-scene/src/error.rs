use std::path::PathBuf;

use crate::material::TextureSlot;

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("failed to import gltf file {path:?}: {source}")]
    Import {
        path: PathBuf,
        #[source]
        source: gltf::Error,
    },

    #[error("gltf file {0:?} contains no scene")]
    NoScene(PathBuf),

    #[error("mesh {mesh} primitive {primitive} has no POSITION attribute")]
    MissingPositions { mesh: usize, primitive: usize },

    #[error("mesh {mesh} primitive {primitive} uses mode {mode:?}, only triangles are supported")]
    UnsupportedPrimitiveMode {
        mesh: usize,
        primitive: usize,
        mode: gltf::mesh::Mode,
    },

    #[error("image {image} uses unsupported pixel format {format:?}")]
    UnsupportedTextureFormat { image: usize, format: gltf::image::Format },

    #[error("{slot:?} texture must have {expected} channels, got {channels}")]
    TextureChannels {
        slot: TextureSlot,
        expected: &'static str,
        channels: u32,
    },

    #[error("texture data size mismatch: {width}x{height}x{channels} expects {expected} bytes, got {actual}")]
    TextureSize {
        width: u32,
        height: u32,
        channels: u32,
        expected: usize,
        actual: usize,
    },
}

pub type SceneResult<T> = Result<T, SceneError>;
