use serde::{Deserialize, Serialize};

use crate::config::ExperimentConfig;

/// Metrics snapshot at checkpoint time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointMetrics {
    pub average_reward: f32,
    pub total_episodes: usize,
    pub model_updates: usize,
}

/// Hyperparameters recorded in checkpoint metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointHyperparameters {
    pub learning_rate: f64,
    pub gamma: f32,
    pub batch_size: usize,
    pub train_after: usize,
    pub train_frequency: usize,
    pub target_update_interval: usize,
    pub memory_capacity: usize,
    pub history_length: usize,
    pub explorer_initial: f32,
    pub explorer_final: f32,
    pub explorer_horizon: usize,
}

impl CheckpointHyperparameters {
    pub fn from_config(config: &ExperimentConfig) -> Self {
        CheckpointHyperparameters {
            learning_rate: config.learner.learning_rate,
            gamma: config.learner.gamma,
            batch_size: config.learner.batch_size,
            train_after: config.learner.train_after,
            train_frequency: config.learner.train_frequency,
            target_update_interval: config.learner.target_update_interval,
            memory_capacity: config.memory.capacity,
            history_length: config.memory.history_length,
            explorer_initial: config.explorer.initial,
            explorer_final: config.explorer.final_value,
            explorer_horizon: config.explorer.horizon,
        }
    }
}

/// Top-level checkpoint metadata written to metadata.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub epoch: usize,
    pub step: usize,
    pub timestamp: u64,
    pub backend: String,
    pub epsilon: f32,
    pub metrics: CheckpointMetrics,
    pub hyperparameters: CheckpointHyperparameters,
}
