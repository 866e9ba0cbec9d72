use std::path::PathBuf;

use prism_gfx::error::GfxError;
use prism_scene::error::SceneError;

use crate::frame::frame_ring::SlotState;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Gfx(#[from] GfxError),

    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error("primitive ids must be dense: {distinct} distinct ids but max id is {max_id}")]
    SparsePrimitiveIds { distinct: usize, max_id: u32 },

    #[error("primitive {0} has no vertices or no triangles")]
    EmptyPrimitive(u32),

    #[error("instance index {0} does not fit in the 24-bit custom index")]
    CustomIndexOverflow(usize),

    #[error("frame slot {slot} is {actual:?}, expected {expected:?}")]
    SlotState {
        slot: usize,
        expected: SlotState,
        actual: SlotState,
    },

    #[error("no descriptor set for frame slot {0}")]
    MissingDescriptorSet(usize),

    #[error("failed to read config {path:?}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

pub type RenderResult<T> = Result<T, RenderError>;
