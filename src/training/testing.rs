//! Test doubles shared by the runner and orchestrator tests.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::ai::{ModelSpec, ValueModel};
use crate::env::{AdversaryType, Environment, Step};
use crate::error::{EnvironmentError, ModelError};
use crate::training::Minibatch;

/// Everything a [`ScriptedEnv`] was asked to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvEvent {
    Reset(Option<AdversaryType>, bool),
    Step(usize),
}

/// Environment replaying scripted reset outcomes, with fixed-length episodes.
pub struct ScriptedEnv<O> {
    resets: VecDeque<Option<O>>,
    observation: O,
    episode_len: usize,
    in_episode: usize,
    done: bool,
    steps: usize,
    fail_after: Option<(usize, fn() -> EnvironmentError)>,
    events: Arc<Mutex<Vec<EnvEvent>>>,
}

impl<O: Clone> ScriptedEnv<O> {
    pub fn new(observation: O, episode_len: usize) -> Self {
        ScriptedEnv {
            resets: VecDeque::new(),
            observation,
            episode_len,
            in_episode: 0,
            done: true,
            steps: 0,
            fail_after: None,
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Outcomes returned by the first resets; later resets succeed.
    pub fn with_resets(mut self, resets: Vec<Option<O>>) -> Self {
        self.resets = resets.into();
        self
    }

    /// Fail every step after the first `steps`.
    pub fn failing_after(mut self, steps: usize, error: fn() -> EnvironmentError) -> Self {
        self.fail_after = Some((steps, error));
        self
    }

    pub fn events(&self) -> Arc<Mutex<Vec<EnvEvent>>> {
        self.events.clone()
    }
}

impl<O: Clone> Environment for ScriptedEnv<O> {
    type Observation = O;

    fn available_actions(&self) -> usize {
        3
    }

    fn done(&self) -> bool {
        self.done
    }

    fn reset(&mut self, adversary: Option<AdversaryType>) -> Result<Option<O>, EnvironmentError> {
        let outcome = self
            .resets
            .pop_front()
            .unwrap_or_else(|| Some(self.observation.clone()));
        self.events
            .lock()
            .unwrap()
            .push(EnvEvent::Reset(adversary, outcome.is_some()));
        if outcome.is_some() {
            self.done = false;
            self.in_episode = 0;
        }
        Ok(outcome)
    }

    fn step(&mut self, action: usize) -> Result<Step<O>, EnvironmentError> {
        if let Some((limit, error)) = self.fail_after {
            if self.steps >= limit {
                return Err(error());
            }
        }
        self.steps += 1;
        self.in_episode += 1;
        self.done = self.in_episode >= self.episode_len;
        self.events.lock().unwrap().push(EnvEvent::Step(action));
        Ok(Step {
            observation: self.observation.clone(),
            reward: -1.0,
            done: self.done,
        })
    }
}

/// Constant-valued model whose checkpoints are a single marker file.
pub struct StubModel {
    num_actions: usize,
}

impl ValueModel for StubModel {
    fn backend(&self) -> &str {
        "stub"
    }

    fn num_actions(&self) -> usize {
        self.num_actions
    }

    fn evaluate(&self, _state: &[f32]) -> Result<Vec<f32>, ModelError> {
        Ok((0..self.num_actions).map(|a| a as f32).collect())
    }

    fn train(&mut self, _batch: &Minibatch) -> Result<f32, ModelError> {
        Ok(0.25)
    }

    fn save(&self, dir: &Path) -> Result<(), ModelError> {
        std::fs::write(dir.join("weights.bin"), b"stub").map_err(|e| ModelError::Save {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

pub fn stub_factory(spec: &ModelSpec) -> Result<Box<dyn ValueModel>, ModelError> {
    Ok(Box::new(StubModel {
        num_actions: spec.num_actions,
    }))
}
