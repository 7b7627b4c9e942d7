use std::path::PathBuf;

use crate::experiment::Role;

/// Errors raised while loading or validating experiment configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("config validation error: {0}")]
    Validation(String),

    #[error("not enough clients (need at least 2, got {0})")]
    NotEnoughClients(usize),

    #[error("invalid client endpoint '{0}' (expected host[:port])")]
    InvalidEndpoint(String),

    #[error("unknown backend '{name}' (known: {known:?})")]
    UnknownBackend { name: String, known: Vec<String> },

    #[error("not enough agents (required: 2, got: {0})")]
    RoleCount(usize),

    #[error("role {0} defined more than once")]
    DuplicateRole(Role),
}

/// Errors reported by an environment connection.
#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
    #[error("the other role disconnected from the arena")]
    Disconnected,

    #[error("action {action} is out of range (available: {available})")]
    InvalidAction { action: usize, available: usize },

    #[error("role {0} is already connected")]
    AlreadyConnected(Role),
}

/// Errors raised by a value model backend.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("input has {got} values, model expects {expected}")]
    ShapeMismatch { expected: usize, got: usize },

    #[error("empty minibatch")]
    EmptyBatch,

    #[error("backend failure: {0}")]
    Backend(String),

    #[error("failed to save model to {path}: {reason}")]
    Save { path: PathBuf, reason: String },
}

/// Errors raised by the replay memory.
#[derive(Debug, thiserror::Error)]
pub enum ReplayMemoryError {
    #[error("frame has {got} pixels, memory expects {expected}")]
    FrameShape { expected: usize, got: usize },
}

/// Errors that can occur during checkpoint operations.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("failed to read metadata from {path}: {source}")]
    MetadataRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse metadata from {path}: {source}")]
    MetadataParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to save model: {0}")]
    ModelSave(#[from] ModelError),

    #[error("no 'latest' checkpoint in {0}")]
    NoLatestSymlink(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that end a role's control loop.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("environment for role {role} not ready after {attempts} reset attempts")]
    EnvironmentNotReady { role: Role, attempts: usize },

    #[error("environment error: {0}")]
    Environment(#[from] EnvironmentError),

    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("replay memory error: {0}")]
    Memory(#[from] ReplayMemoryError),

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("role thread panicked: {0}")]
    Panicked(String),
}

/// Errors that stop an experiment before or while it is launched.
#[derive(Debug, thiserror::Error)]
pub enum ExperimentError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("environment error: {0}")]
    Environment(#[from] EnvironmentError),

    #[error("failed to open visualizer output in {path}: {source}")]
    Visualizer {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to spawn thread for role {role}: {source}")]
    Spawn { role: Role, source: std::io::Error },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Validation("explorer.horizon must be > 0".to_string());
        assert_eq!(
            err.to_string(),
            "config validation error: explorer.horizon must be > 0"
        );
    }

    #[test]
    fn test_role_count_display() {
        let err = ConfigError::RoleCount(1);
        assert_eq!(err.to_string(), "not enough agents (required: 2, got: 1)");
    }

    #[test]
    fn test_not_ready_display() {
        let err = RunnerError::EnvironmentNotReady {
            role: Role::Learner,
            attempts: 3,
        };
        assert_eq!(
            err.to_string(),
            "environment for role 1 not ready after 3 reset attempts"
        );
    }

    #[test]
    fn test_unknown_backend_display() {
        let err = ConfigError::UnknownBackend {
            name: "cntk".into(),
            known: vec!["ndarray".into(), "wgpu".into()],
        };
        assert_eq!(
            err.to_string(),
            "unknown backend 'cntk' (known: [\"ndarray\", \"wgpu\"])"
        );
    }
}
