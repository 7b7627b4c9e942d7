use rand::Rng;

use crate::env::Frame;
use crate::error::ReplayMemoryError;

/// One environment step as seen by the learner: the frame observed after
/// taking `action`, the reward it produced and whether the episode ended.
#[derive(Debug, Clone)]
pub struct Transition {
    pub observation: Frame,
    pub action: usize,
    pub reward: f32,
    pub done: bool,
}

/// A batch of stacked-history samples, flattened row-major as
/// `[batch, history_length, height, width]`.
#[derive(Debug, Clone)]
pub struct Minibatch {
    pub states: Vec<f32>,
    pub actions: Vec<usize>,
    pub rewards: Vec<f32>,
    pub next_states: Vec<f32>,
    pub terminals: Vec<bool>,
}

impl Minibatch {
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Append a frame to `out`, scaled to `[0, 1]`.
pub fn push_normalized(out: &mut Vec<f32>, frame: &Frame) {
    out.extend(frame.pixels.iter().map(|&p| p as f32 / 255.0));
}

/// Fixed-capacity ring buffer of transitions with a fixed frame shape.
/// Appending to a full memory overwrites the oldest transition.
pub struct ReplayMemory {
    buffer: Vec<Transition>,
    capacity: usize,
    position: usize,
    frame_len: usize,
    history_length: usize,
}

impl ReplayMemory {
    pub fn new(capacity: usize, frame_shape: (usize, usize), history_length: usize) -> Self {
        assert!(capacity > 0, "replay memory capacity must be positive");
        ReplayMemory {
            buffer: Vec::new(),
            capacity,
            position: 0,
            frame_len: frame_shape.0 * frame_shape.1,
            history_length,
        }
    }

    /// Add a transition, evicting the oldest when full.
    pub fn append(&mut self, transition: Transition) -> Result<(), ReplayMemoryError> {
        if transition.observation.len() != self.frame_len {
            return Err(ReplayMemoryError::FrameShape {
                expected: self.frame_len,
                got: transition.observation.len(),
            });
        }
        if self.buffer.len() < self.capacity {
            self.buffer.push(transition);
        } else {
            self.buffer[self.position] = transition;
        }
        self.position = (self.position + 1) % self.capacity;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Transition `index` in chronological order, 0 being the oldest.
    pub fn get(&self, index: usize) -> Option<&Transition> {
        if index >= self.buffer.len() {
            return None;
        }
        let oldest = if self.buffer.len() < self.capacity {
            0
        } else {
            self.position
        };
        self.buffer.get((oldest + index) % self.capacity)
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Transition> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }

    /// Stacked frames ending at chronological `index` (inclusive).
    fn push_history(&self, out: &mut Vec<f32>, index: usize) {
        for i in (index + 1 - self.history_length)..=index {
            if let Some(t) = self.get(i) {
                push_normalized(out, &t.observation);
            }
        }
    }

    /// Sample `batch_size` transitions with replacement. A sample's pre-state
    /// history never spans an episode boundary. Returns `None` while the memory
    /// holds too few usable transitions.
    pub fn minibatch<R: Rng>(&self, batch_size: usize, rng: &mut R) -> Option<Minibatch> {
        let h = self.history_length;
        if self.len() <= h || batch_size == 0 {
            return None;
        }

        let state_len = h * self.frame_len;
        let mut batch = Minibatch {
            states: Vec::with_capacity(batch_size * state_len),
            actions: Vec::with_capacity(batch_size),
            rewards: Vec::with_capacity(batch_size),
            next_states: Vec::with_capacity(batch_size * state_len),
            terminals: Vec::with_capacity(batch_size),
        };

        let max_tries = batch_size * 100;
        let mut tries = 0;
        while batch.len() < batch_size && tries < max_tries {
            tries += 1;
            let index = rng.random_range(h..self.len());
            let crosses_episode = ((index - h)..index)
                .filter_map(|i| self.get(i))
                .any(|t| t.done);
            if crosses_episode {
                continue;
            }
            let Some(t) = self.get(index) else { continue };
            self.push_history(&mut batch.states, index - 1);
            self.push_history(&mut batch.next_states, index);
            batch.actions.push(t.action);
            batch.rewards.push(t.reward);
            batch.terminals.push(t.done);
        }

        (batch.len() == batch_size).then_some(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn transition(tag: u8, done: bool) -> Transition {
        Transition {
            observation: Frame {
                pixels: vec![tag; 4],
            },
            action: tag as usize,
            reward: tag as f32,
            done,
        }
    }

    #[test]
    fn test_append_and_len() {
        let mut memory = ReplayMemory::new(10, (2, 2), 2);
        assert!(memory.is_empty());

        memory.append(transition(0, false)).unwrap();
        assert_eq!(memory.len(), 1);

        for i in 1..10 {
            memory.append(transition(i, false)).unwrap();
        }
        assert_eq!(memory.len(), 10);
    }

    #[test]
    fn test_ring_keeps_most_recent_in_order() {
        let mut memory = ReplayMemory::new(5, (2, 2), 2);
        for i in 0..13 {
            memory.append(transition(i, false)).unwrap();
        }
        assert_eq!(memory.len(), 5);
        let actions: Vec<usize> = memory.iter().map(|t| t.action).collect();
        assert_eq!(actions, vec![8, 9, 10, 11, 12]);
        assert_eq!(memory.get(0).unwrap().action, 8);
        assert!(memory.get(5).is_none());
    }

    #[test]
    fn test_rejects_wrong_frame_shape() {
        let mut memory = ReplayMemory::new(5, (3, 3), 2);
        let err = memory.append(transition(1, false)).unwrap_err();
        assert!(matches!(
            err,
            ReplayMemoryError::FrameShape { expected: 9, got: 4 }
        ));
        assert!(memory.is_empty());
    }

    #[test]
    fn test_minibatch_shapes() {
        let mut memory = ReplayMemory::new(50, (2, 2), 3);
        for i in 0..40 {
            memory.append(transition(i, false)).unwrap();
        }
        let mut rng = StdRng::seed_from_u64(11);
        let batch = memory.minibatch(8, &mut rng).unwrap();
        assert_eq!(batch.len(), 8);
        assert_eq!(batch.states.len(), 8 * 3 * 4);
        assert_eq!(batch.next_states.len(), 8 * 3 * 4);
    }

    #[test]
    fn test_minibatch_next_state_is_shifted_history() {
        let mut memory = ReplayMemory::new(50, (2, 2), 2);
        for i in 0..20 {
            memory.append(transition(i, false)).unwrap();
        }
        let mut rng = StdRng::seed_from_u64(5);
        let batch = memory.minibatch(4, &mut rng).unwrap();
        for (k, &action) in batch.actions.iter().enumerate() {
            let tag = action as f32 / 255.0;
            let state = &batch.states[k * 8..(k + 1) * 8];
            let next = &batch.next_states[k * 8..(k + 1) * 8];
            // Newest frame of the pre-state precedes the sampled transition.
            assert!((state[7] - (action as f32 - 1.0) / 255.0).abs() < 1e-6);
            assert!((next[7] - tag).abs() < 1e-6);
        }
    }

    #[test]
    fn test_minibatch_skips_episode_boundaries() {
        let mut memory = ReplayMemory::new(50, (2, 2), 2);
        // Every transition is terminal, so no pre-state is valid.
        for i in 0..20 {
            memory.append(transition(i, true)).unwrap();
        }
        let mut rng = StdRng::seed_from_u64(5);
        assert!(memory.minibatch(4, &mut rng).is_none());
    }

    #[test]
    fn test_minibatch_needs_history() {
        let mut memory = ReplayMemory::new(50, (2, 2), 4);
        for i in 0..4 {
            memory.append(transition(i, false)).unwrap();
        }
        let mut rng = StdRng::seed_from_u64(5);
        assert!(memory.minibatch(1, &mut rng).is_none());
    }
}
