use std::collections::BTreeMap;
use std::path::Path;

use crate::config::{ExperimentConfig, LearnerConfig};
use crate::error::{ConfigError, ModelError};
use crate::training::Minibatch;

/// Shape and optimisation settings a backend needs to build a value model.
#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub history_length: usize,
    pub frame_height: usize,
    pub frame_width: usize,
    pub num_actions: usize,
    pub device: Option<usize>,
    pub learning_rate: f64,
    pub gamma: f32,
    pub target_update_interval: usize,
}

impl ModelSpec {
    pub fn new(config: &ExperimentConfig, num_actions: usize, device: Option<usize>) -> Self {
        let learner: &LearnerConfig = &config.learner;
        ModelSpec {
            history_length: config.memory.history_length,
            frame_height: config.memory.frame_height,
            frame_width: config.memory.frame_width,
            num_actions,
            device,
            learning_rate: learner.learning_rate,
            gamma: learner.gamma,
            target_update_interval: learner.target_update_interval,
        }
    }

    /// Number of values in one stacked input state.
    pub fn state_len(&self) -> usize {
        self.history_length * self.frame_height * self.frame_width
    }
}

/// A learnable action-value function.
pub trait ValueModel {
    /// Identifier of the backend the model runs on.
    fn backend(&self) -> &str;

    fn num_actions(&self) -> usize;

    /// Predicted value of every action for one stacked state.
    fn evaluate(&self, state: &[f32]) -> Result<Vec<f32>, ModelError>;

    /// One temporal-difference update. Returns the loss.
    fn train(&mut self, batch: &Minibatch) -> Result<f32, ModelError>;

    /// Persist the model weights under `dir`.
    fn save(&self, dir: &Path) -> Result<(), ModelError>;
}

pub type ModelFactory = fn(&ModelSpec) -> Result<Box<dyn ValueModel>, ModelError>;

/// Maps backend identifiers to model factories.
#[derive(Clone)]
pub struct BackendRegistry {
    factories: BTreeMap<String, ModelFactory>,
}

impl BackendRegistry {
    pub fn empty() -> Self {
        BackendRegistry {
            factories: BTreeMap::new(),
        }
    }

    /// Registry with the bundled `ndarray` and `wgpu` backends.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register("ndarray", super::algorithms::ndarray_factory);
        registry.register("wgpu", super::algorithms::wgpu_factory);
        registry
    }

    pub fn register(&mut self, name: &str, factory: ModelFactory) {
        self.factories.insert(name.to_string(), factory);
    }

    pub fn resolve(&self, name: &str) -> Result<ModelFactory, ConfigError> {
        self.factories
            .get(name)
            .copied()
            .ok_or_else(|| ConfigError::UnknownBackend {
                name: name.to_string(),
                known: self.names(),
            })
    }

    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failing_factory(_spec: &ModelSpec) -> Result<Box<dyn ValueModel>, ModelError> {
        Err(ModelError::Backend("unavailable".into()))
    }

    #[test]
    fn test_defaults_are_registered() {
        let registry = BackendRegistry::with_defaults();
        assert_eq!(registry.names(), vec!["ndarray", "wgpu"]);
        assert!(registry.resolve("ndarray").is_ok());
    }

    #[test]
    fn test_unknown_backend_lists_known() {
        let registry = BackendRegistry::with_defaults();
        match registry.resolve("chainer") {
            Err(ConfigError::UnknownBackend { name, known }) => {
                assert_eq!(name, "chainer");
                assert_eq!(known.len(), 2);
            }
            _ => panic!("expected UnknownBackend"),
        }
    }

    #[test]
    fn test_register_custom_backend() {
        let mut registry = BackendRegistry::empty();
        registry.register("stub", failing_factory);
        let factory = registry.resolve("stub").unwrap();
        let spec = ModelSpec::new(&ExperimentConfig::default(), 3, None);
        assert!(factory(&spec).is_err());
    }

    #[test]
    fn test_spec_state_len() {
        let spec = ModelSpec::new(&ExperimentConfig::default(), 3, None);
        assert_eq!(spec.state_len(), 4 * 84 * 84);
        assert!((spec.gamma - 0.99).abs() < 1e-6);
    }
}
