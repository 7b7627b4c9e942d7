use std::collections::VecDeque;

/// Rewards collected since the last episode boundary.
#[derive(Debug, Default, Clone)]
pub struct RewardWindow {
    rewards: Vec<f32>,
}

/// Summary of one flushed reward window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardSummary {
    pub total: f32,
    pub max: f32,
    pub min: f32,
    pub actions: usize,
}

impl RewardWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, reward: f32) {
        self.rewards.push(reward);
    }

    pub fn summary(&self) -> Option<RewardSummary> {
        if self.rewards.is_empty() {
            return None;
        }
        Some(RewardSummary {
            total: self.rewards.iter().sum(),
            max: self.rewards.iter().copied().fold(f32::NEG_INFINITY, f32::max),
            min: self.rewards.iter().copied().fold(f32::INFINITY, f32::min),
            actions: self.rewards.len(),
        })
    }

    /// Summarize and clear.
    pub fn flush(&mut self) -> Option<RewardSummary> {
        let summary = self.summary();
        self.rewards.clear();
        summary
    }
}

/// Rolling statistics over the most recent episodes.
pub struct EpisodeStats {
    totals: VecDeque<f32>,
    capacity: usize,
    total_episodes: usize, // lifetime count, never capped
}

impl EpisodeStats {
    pub fn with_capacity(capacity: usize) -> Self {
        EpisodeStats {
            totals: VecDeque::with_capacity(capacity),
            capacity,
            total_episodes: 0,
        }
    }

    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    pub fn record(&mut self, summary: &RewardSummary) {
        self.total_episodes += 1;
        self.totals.push_back(summary.total);
        if self.totals.len() > self.capacity {
            self.totals.pop_front();
        }
    }

    /// Average episode reward over the last N episodes.
    pub fn average_reward(&self, last_n: usize) -> f32 {
        let n = self.totals.len().min(last_n);
        if n == 0 {
            return 0.0;
        }
        let sum: f32 = self.totals.iter().rev().take(n).sum();
        sum / n as f32
    }

    pub fn total_episodes(&self) -> usize {
        self.total_episodes
    }
}

impl Default for EpisodeStats {
    fn default() -> Self {
        Self::new()
    }
}
