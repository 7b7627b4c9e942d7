//! Training infrastructure: exploration schedule, replay memory, reward
//! bookkeeping, per-role control loops and the experiment orchestrator.

mod cancel;
mod epoch;
mod explorer;
mod orchestrator;
mod replay_memory;
mod runner;
mod visualizer;

#[cfg(test)]
pub(crate) mod testing;

pub use cancel::CancellationToken;
pub use epoch::{EpisodeStats, RewardSummary, RewardWindow};
pub use explorer::LinearEpsilonGreedyExplorer;
pub use orchestrator::{
    ExperimentOrchestrator, ExperimentOutcome, ExperimentReport, OrchestratorConfig,
    RoleDefinition, RoleReport, ROLE_COUNT,
};
pub use replay_memory::{push_normalized, Minibatch, ReplayMemory, Transition};
pub use runner::{reset_with_retry, ChallengerRunner, LearnerRunner, RoleRunner, RunSummary};
pub use visualizer::{
    create_visualizer, visualize_training, ConsoleVisualizer, JsonLinesVisualizer, Visualizer,
};
