use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ai::BackendRegistry;
use crate::env::ClientEndpoint;
use crate::error::ConfigError;

/// Top-level experiment configuration, loadable from TOML.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub experiment: ExperimentSection,
    pub explorer: ExplorerConfig,
    pub memory: MemoryConfig,
    pub learner: LearnerConfig,
    pub reset: ResetConfig,
    pub arena: ArenaConfig,
    pub checkpoint: CheckpointConfig,
    pub visualizer: VisualizerConfig,
}

/// Step budget, lifecycle timings and output locations.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ExperimentSection {
    pub epoch_size: usize,
    pub max_epochs: usize,
    pub startup_delay_ms: u64,
    pub poll_interval_ms: u64,
    pub shutdown_grace_ms: u64,
    pub results_dir: PathBuf,
    pub seed: Option<u64>,
}

impl Default for ExperimentSection {
    fn default() -> Self {
        ExperimentSection {
            epoch_size: 100_000,
            max_epochs: 5,
            startup_delay_ms: 1000,
            poll_interval_ms: 100,
            shutdown_grace_ms: 5000,
            results_dir: PathBuf::from("results/pig_chase/dqn"),
            seed: None,
        }
    }
}

impl ExperimentSection {
    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Total number of learner steps.
    pub fn max_training_steps(&self) -> usize {
        self.epoch_size * self.max_epochs
    }
}

/// Linear epsilon-greedy schedule.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    pub initial: f32,
    #[serde(rename = "final")]
    pub final_value: f32,
    pub horizon: usize,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        ExplorerConfig {
            initial: 1.0,
            final_value: 0.1,
            horizon: 1_000_000,
        }
    }
}

/// Replay memory sizing.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub capacity: usize,
    pub frame_height: usize,
    pub frame_width: usize,
    pub history_length: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        MemoryConfig {
            capacity: 100_000,
            frame_height: 84,
            frame_width: 84,
            history_length: 4,
        }
    }
}

/// Q-learning hyperparameters.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
    pub gamma: f32,
    pub batch_size: usize,
    pub train_after: usize,
    pub train_frequency: usize,
    pub target_update_interval: usize,
    pub learning_rate: f64,
    pub reward_clip: f32,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        LearnerConfig {
            gamma: 0.99,
            batch_size: 32,
            train_after: 50_000,
            train_frequency: 4,
            target_update_interval: 10_000,
            learning_rate: 2.5e-4,
            reward_clip: 1.0,
        }
    }
}

/// Null-observation retry policy for `reset`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ResetConfig {
    pub max_attempts: usize,
    pub retry_delay_ms: u64,
}

impl Default for ResetConfig {
    fn default() -> Self {
        ResetConfig {
            max_attempts: 100,
            retry_delay_ms: 100,
        }
    }
}

impl ResetConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Rules of the in-process pig chase arena.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    pub max_steps: usize,
    pub randomize_positions: bool,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        ArenaConfig {
            max_steps: 25,
            randomize_positions: true,
        }
    }
}

/// Where checkpoints go and how they are named.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    pub dir: PathBuf,
    pub prefix: String,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        CheckpointConfig {
            dir: PathBuf::from("checkpoints"),
            prefix: "pig_chase-dqn".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualizerKind {
    #[default]
    Console,
    Jsonl,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct VisualizerConfig {
    pub kind: VisualizerKind,
}

impl ExperimentConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: ExperimentConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the file
    /// does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::warn!(
                "config file '{}' not found, using defaults",
                path.display()
            );
            Ok(Self::default())
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let exp = &self.experiment;
        if exp.epoch_size == 0 {
            return Err(ConfigError::Validation(
                "experiment.epoch_size must be > 0".into(),
            ));
        }
        if exp.max_epochs == 0 {
            return Err(ConfigError::Validation(
                "experiment.max_epochs must be > 0".into(),
            ));
        }
        if exp.epoch_size.checked_mul(exp.max_epochs).is_none() {
            return Err(ConfigError::Validation(
                "experiment.epoch_size * experiment.max_epochs overflows".into(),
            ));
        }
        if exp.poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "experiment.poll_interval_ms must be > 0".into(),
            ));
        }

        let ex = &self.explorer;
        if !(0.0..=1.0).contains(&ex.initial) {
            return Err(ConfigError::Validation(
                "explorer.initial must be in [0, 1]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&ex.final_value) {
            return Err(ConfigError::Validation(
                "explorer.final must be in [0, 1]".into(),
            ));
        }
        if ex.final_value > ex.initial {
            return Err(ConfigError::Validation(
                "explorer.final must be <= explorer.initial".into(),
            ));
        }
        if ex.horizon == 0 {
            return Err(ConfigError::Validation(
                "explorer.horizon must be > 0".into(),
            ));
        }

        let mem = &self.memory;
        if mem.history_length == 0 {
            return Err(ConfigError::Validation(
                "memory.history_length must be > 0".into(),
            ));
        }
        if mem.frame_height < 36 || mem.frame_width < 36 {
            return Err(ConfigError::Validation(
                "memory frames must be at least 36x36".into(),
            ));
        }
        if mem.capacity <= mem.history_length {
            return Err(ConfigError::Validation(
                "memory.capacity must be > memory.history_length".into(),
            ));
        }

        let learner = &self.learner;
        if learner.learning_rate <= 0.0 {
            return Err(ConfigError::Validation(
                "learner.learning_rate must be > 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&learner.gamma) {
            return Err(ConfigError::Validation(
                "learner.gamma must be in [0, 1]".into(),
            ));
        }
        if learner.batch_size == 0 {
            return Err(ConfigError::Validation(
                "learner.batch_size must be > 0".into(),
            ));
        }
        if learner.train_frequency == 0 {
            return Err(ConfigError::Validation(
                "learner.train_frequency must be > 0".into(),
            ));
        }
        if learner.target_update_interval == 0 {
            return Err(ConfigError::Validation(
                "learner.target_update_interval must be > 0".into(),
            ));
        }
        if learner.reward_clip <= 0.0 {
            return Err(ConfigError::Validation(
                "learner.reward_clip must be > 0".into(),
            ));
        }
        if mem.capacity < learner.batch_size {
            return Err(ConfigError::Validation(
                "memory.capacity must be >= learner.batch_size".into(),
            ));
        }

        if self.reset.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "reset.max_attempts must be >= 1".into(),
            ));
        }
        if self.arena.max_steps == 0 {
            return Err(ConfigError::Validation(
                "arena.max_steps must be > 0".into(),
            ));
        }
        if self.checkpoint.prefix.is_empty() {
            return Err(ConfigError::Validation(
                "checkpoint.prefix must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Generate a TOML string with all default values.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&ExperimentConfig::default()).expect("default config serializes")
    }
}

/// Everything the experiment needs, resolved once at startup: the file
/// configuration plus command-line selections.
#[derive(Debug, Clone)]
pub struct ExperimentSettings {
    pub config: ExperimentConfig,
    pub clients: Vec<ClientEndpoint>,
    pub backend: String,
    pub device: Option<usize>,
    pub logdir: PathBuf,
}

impl ExperimentSettings {
    /// Validate the configuration together with the CLI selections.
    ///
    /// `logdir` is derived from `experiment.results_dir` and `run_id`.
    pub fn new(
        config: ExperimentConfig,
        clients: &[String],
        backend: &str,
        device: Option<usize>,
        run_id: &str,
        registry: &BackendRegistry,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if clients.len() < 2 {
            return Err(ConfigError::NotEnoughClients(clients.len()));
        }
        let clients = clients
            .iter()
            .map(|c| c.parse::<ClientEndpoint>())
            .collect::<Result<Vec<_>, _>>()?;
        registry.resolve(backend)?;

        let logdir = config.experiment.results_dir.join(run_id);
        Ok(ExperimentSettings {
            config,
            clients,
            backend: backend.to_string(),
            device,
            logdir,
        })
    }
}
