use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::Rng;

use super::model::ValueModel;
use super::seeded_rng;
use crate::config::LearnerConfig;
use crate::env::Frame;
use crate::error::ModelError;
use crate::training::{push_normalized, ReplayMemory, Visualizer};

/// Deep Q-learning agent acting on a stack of the most recent frames.
///
/// The agent does not own its replay memory; the caller appends transitions
/// and hands the memory to [`QLearnerAgent::learn`].
pub struct QLearnerAgent {
    model: Box<dyn ValueModel>,
    config: LearnerConfig,
    history: VecDeque<Frame>,
    history_length: usize,
    rng: StdRng,
    losses: Vec<f32>,
    q_values: Vec<f32>,
    updates: usize,
}

impl QLearnerAgent {
    pub fn new(
        model: Box<dyn ValueModel>,
        config: LearnerConfig,
        history_length: usize,
        seed: Option<u64>,
    ) -> Self {
        QLearnerAgent {
            model,
            config,
            history: VecDeque::with_capacity(history_length),
            history_length,
            rng: seeded_rng(seed),
            losses: Vec::new(),
            q_values: Vec::new(),
            updates: 0,
        }
    }

    pub fn model(&self) -> &dyn ValueModel {
        self.model.as_ref()
    }

    pub fn updates(&self) -> usize {
        self.updates
    }

    /// Fill the frame history with the first observation of an episode.
    pub fn start_episode(&mut self, frame: &Frame) {
        self.history.clear();
        for _ in 0..self.history_length {
            self.history.push_back(frame.clone());
        }
    }

    /// Slide the frame history forward by one observation.
    pub fn observe(&mut self, frame: &Frame) {
        if self.history.len() == self.history_length {
            self.history.pop_front();
        }
        self.history.push_back(frame.clone());
    }

    /// Current stacked state, normalised to `[0, 1]`.
    pub fn state(&self) -> Vec<f32> {
        let frame_len = self.history.front().map_or(0, Frame::len);
        let mut out = Vec::with_capacity(self.history_length * frame_len);
        for frame in &self.history {
            push_normalized(&mut out, frame);
        }
        out
    }

    /// Pick an action: uniformly random when `explore`, otherwise the action
    /// with the highest predicted value.
    pub fn act(&mut self, explore: bool) -> Result<usize, ModelError> {
        let num_actions = self.model.num_actions();
        if explore {
            return Ok(self.rng.random_range(0..num_actions));
        }
        let values = self.model.evaluate(&self.state())?;
        let (best, best_q) = values
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |acc, (i, q)| if q > acc.1 { (i, q) } else { acc });
        self.q_values.push(best_q);
        Ok(best)
    }

    /// Train on a minibatch once `train_after` steps have elapsed, every
    /// `train_frequency` steps. Returns the loss when an update ran.
    pub fn learn(&mut self, step: usize, memory: &ReplayMemory) -> Result<Option<f32>, ModelError> {
        if step <= self.config.train_after || step % self.config.train_frequency != 0 {
            return Ok(None);
        }
        let Some(mut batch) = memory.minibatch(self.config.batch_size, &mut self.rng) else {
            return Ok(None);
        };
        let clip = self.config.reward_clip;
        for reward in &mut batch.rewards {
            *reward = reward.clamp(-clip, clip);
        }

        let loss = self.model.train(&batch)?;
        self.updates += 1;
        self.losses.push(loss);
        Ok(Some(loss))
    }

    /// Report learner statistics gathered since the previous call.
    pub fn inject_summaries(&mut self, step: usize, visualizer: &mut dyn Visualizer) {
        if !self.losses.is_empty() {
            let mean = self.losses.iter().sum::<f32>() / self.losses.len() as f32;
            visualizer.add_scalar("Training/loss", step, mean);
            self.losses.clear();
        }
        if !self.q_values.is_empty() {
            let mean = self.q_values.iter().sum::<f32>() / self.q_values.len() as f32;
            visualizer.add_scalar("Training/Q", step, mean);
            self.q_values.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{Minibatch, Transition};
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    /// Prefers the last action and records every batch it is trained on.
    struct StubModel {
        batches: Arc<Mutex<Vec<Minibatch>>>,
    }

    impl ValueModel for StubModel {
        fn backend(&self) -> &str {
            "stub"
        }

        fn num_actions(&self) -> usize {
            3
        }

        fn evaluate(&self, state: &[f32]) -> Result<Vec<f32>, ModelError> {
            assert_eq!(state.len(), 2 * 4);
            Ok(vec![0.1, 0.2, 0.9])
        }

        fn train(&mut self, batch: &Minibatch) -> Result<f32, ModelError> {
            self.batches.lock().unwrap().push(batch.clone());
            Ok(0.5)
        }

        fn save(&self, _dir: &Path) -> Result<(), ModelError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct Recording(Vec<(String, usize, f32)>);

    impl Visualizer for Recording {
        fn add_scalar(&mut self, tag: &str, step: usize, value: f32) {
            self.0.push((tag.to_string(), step, value));
        }
    }

    fn agent(train_after: usize) -> (QLearnerAgent, Arc<Mutex<Vec<Minibatch>>>) {
        let batches = Arc::new(Mutex::new(Vec::new()));
        let config = LearnerConfig {
            batch_size: 2,
            train_after,
            train_frequency: 2,
            reward_clip: 1.0,
            ..Default::default()
        };
        let model = StubModel {
            batches: batches.clone(),
        };
        (QLearnerAgent::new(Box::new(model), config, 2, Some(4)), batches)
    }

    fn frame(v: u8) -> Frame {
        Frame { pixels: vec![v; 4] }
    }

    #[test]
    fn test_history_stacks_latest_frames() {
        let (mut agent, _) = agent(0);
        agent.start_episode(&frame(0));
        assert_eq!(agent.state(), vec![0.0; 8]);
        agent.observe(&frame(255));
        let state = agent.state();
        assert_eq!(&state[..4], &[0.0; 4]);
        assert_eq!(&state[4..], &[1.0; 4]);
    }

    #[test]
    fn test_greedy_action_is_argmax() {
        let (mut agent, _) = agent(0);
        agent.start_episode(&frame(10));
        assert_eq!(agent.act(false).unwrap(), 2);
        for _ in 0..20 {
            assert!(agent.act(true).unwrap() < 3);
        }
    }

    #[test]
    fn test_learn_waits_and_clips_rewards() {
        let (mut agent, batches) = agent(10);
        let mut memory = ReplayMemory::new(50, (2, 2), 2);
        for i in 0..20u8 {
            memory
                .append(Transition {
                    observation: frame(i),
                    action: 0,
                    reward: 25.0,
                    done: false,
                })
                .unwrap();
        }

        assert_eq!(agent.learn(10, &memory).unwrap(), None);
        assert_eq!(agent.learn(11, &memory).unwrap(), None);
        assert_eq!(agent.learn(12, &memory).unwrap(), Some(0.5));
        assert_eq!(agent.updates(), 1);

        let batches = batches.lock().unwrap();
        assert!(batches[0].rewards.iter().all(|&r| r == 1.0));
    }

    #[test]
    fn test_inject_summaries_reports_and_resets() {
        let (mut agent, _) = agent(0);
        let mut memory = ReplayMemory::new(50, (2, 2), 2);
        for i in 0..10u8 {
            memory
                .append(Transition {
                    observation: frame(i),
                    action: 1,
                    reward: -1.0,
                    done: false,
                })
                .unwrap();
        }
        agent.start_episode(&frame(1));
        agent.act(false).unwrap();
        agent.learn(2, &memory).unwrap();

        let mut vis = Recording::default();
        agent.inject_summaries(7, &mut vis);
        let tags: Vec<&str> = vis.0.iter().map(|(t, _, _)| t.as_str()).collect();
        assert_eq!(tags, vec!["Training/loss", "Training/Q"]);

        vis.0.clear();
        agent.inject_summaries(8, &mut vis);
        assert!(vis.0.is_empty());
    }
}
