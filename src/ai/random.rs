use rand::rngs::StdRng;
use rand::Rng;

use super::agent::Agent;
use super::seeded_rng;

/// An agent that selects uniformly at random among `num_actions` actions.
pub struct RandomAgent {
    num_actions: usize,
    rng: StdRng,
}

impl RandomAgent {
    pub fn new(num_actions: usize, seed: Option<u64>) -> Self {
        assert!(num_actions > 0, "RandomAgent needs at least one action");
        RandomAgent {
            num_actions,
            rng: seeded_rng(seed),
        }
    }

    pub fn random_action(&mut self) -> usize {
        self.rng.random_range(0..self.num_actions)
    }
}

impl<O> Agent<O> for RandomAgent {
    fn act(&mut self, _observation: &O, _reward: f32, _done: bool, _training: bool) -> usize {
        self.random_action()
    }

    fn name(&self) -> &str {
        "Random"
    }
}
