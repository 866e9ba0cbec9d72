pub mod rt_pipeline;
pub mod shader;
