use rand::Rng;

use crate::config::ExplorerConfig;

/// Linearly decaying epsilon-greedy exploration schedule.
#[derive(Debug, Clone)]
pub struct LinearEpsilonGreedyExplorer {
    initial: f32,
    final_value: f32,
    horizon: usize,
}

impl LinearEpsilonGreedyExplorer {
    pub fn new(initial: f32, final_value: f32, horizon: usize) -> Self {
        assert!(
            final_value <= initial,
            "final exploration rate must not exceed the initial rate"
        );
        assert!(horizon > 0, "exploration horizon must be positive");
        LinearEpsilonGreedyExplorer {
            initial,
            final_value,
            horizon,
        }
    }

    pub fn from_config(config: &ExplorerConfig) -> Self {
        Self::new(config.initial, config.final_value, config.horizon)
    }

    /// Probability of taking a random action after `step` steps.
    pub fn probability(&self, step: usize) -> f32 {
        let progress = step.min(self.horizon) as f32 / self.horizon as f32;
        let value = self.initial - (self.initial - self.final_value) * progress;
        value.max(self.final_value)
    }

    /// Draw whether to explore at `step`.
    pub fn is_exploring<R: Rng>(&self, step: usize, rng: &mut R) -> bool {
        rng.random::<f32>() < self.probability(step)
    }
}
