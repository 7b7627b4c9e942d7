mod manager;
mod metadata;

pub use manager::Checkpointer;
pub use metadata::{CheckpointHyperparameters, CheckpointMetadata, CheckpointMetrics};
