use super::agent::Agent;
use super::focused::FocusedAgent;
use super::random::RandomAgent;
use crate::env::{AdversaryType, SymbolicState};

/// The scripted challenger: plays randomly or chases the pig, switching
/// behaviour every episode.
pub struct ChallengeAgent {
    random: RandomAgent,
    focused: FocusedAgent,
    current: AdversaryType,
    upcoming: AdversaryType,
}

impl ChallengeAgent {
    pub fn new(num_actions: usize, seed: Option<u64>) -> Self {
        ChallengeAgent {
            random: RandomAgent::new(num_actions, seed),
            focused: FocusedAgent::new(),
            current: AdversaryType::Random,
            upcoming: AdversaryType::Random,
        }
    }

    /// Adversary type currently presented.
    pub fn current(&self) -> AdversaryType {
        self.current
    }

    /// Switch to the behaviour for the next episode and return it.
    /// Successive calls alternate, starting with `Random`.
    pub fn next_adversary(&mut self) -> AdversaryType {
        self.current = self.upcoming;
        self.upcoming = self.current.other();
        self.current
    }
}

impl Agent<SymbolicState> for ChallengeAgent {
    fn act(&mut self, state: &SymbolicState, reward: f32, done: bool, training: bool) -> usize {
        match self.current {
            AdversaryType::Random => self.random.act(state, reward, done, training),
            AdversaryType::Focused => self.focused.act(state, reward, done, training),
        }
    }

    fn name(&self) -> &str {
        "Challenger"
    }
}
