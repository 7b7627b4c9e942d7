use std::thread;

use tracing::{debug, info, warn};

use crate::ai::{Agent, ChallengeAgent, ModelFactory, ModelSpec, QLearnerAgent};
use crate::checkpoint::{CheckpointHyperparameters, CheckpointMetadata, CheckpointMetrics, Checkpointer};
use crate::config::{ExperimentConfig, ResetConfig};
use crate::env::{AdversaryType, Environment, Frame, SymbolicState};
use crate::error::{EnvironmentError, RunnerError};
use crate::experiment::Role;
use crate::training::cancel::CancellationToken;
use crate::training::epoch::{EpisodeStats, RewardWindow};
use crate::training::explorer::LinearEpsilonGreedyExplorer;
use crate::training::replay_memory::{ReplayMemory, Transition};
use crate::training::visualizer::{visualize_training, Visualizer};

/// What a role's control loop did before it returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub steps: usize,
    pub episodes: usize,
    pub checkpoints: usize,
}

/// A role's control loop, run to completion on its own thread.
pub trait RoleRunner: Send {
    fn role(&self) -> Role;

    fn run(self: Box<Self>, cancel: CancellationToken) -> Result<RunSummary, RunnerError>;
}

/// Request a new episode, retrying null observations.
///
/// Each null observation is logged and followed by `retry_delay`. Returns
/// `Ok(None)` if `cancel` fires while retrying.
pub fn reset_with_retry<E: Environment>(
    env: &mut E,
    role: Role,
    adversary: Option<AdversaryType>,
    policy: &ResetConfig,
    cancel: &CancellationToken,
) -> Result<Option<E::Observation>, RunnerError> {
    for attempt in 1..=policy.max_attempts {
        if let Some(observation) = env.reset(adversary)? {
            return Ok(Some(observation));
        }
        // The other role ended the episode with its first action.
        warn!(%role, attempt, "received null observation on reset, retrying");
        if cancel.is_cancelled() {
            return Ok(None);
        }
        if attempt < policy.max_attempts {
            thread::sleep(policy.retry_delay());
        }
    }
    Err(RunnerError::EnvironmentNotReady {
        role,
        attempts: policy.max_attempts,
    })
}

/// Drives the scripted challenger until cancelled or the arena closes.
pub struct ChallengerRunner<E> {
    env: E,
    agent: ChallengeAgent,
    reset: ResetConfig,
}

impl<E> ChallengerRunner<E>
where
    E: Environment<Observation = SymbolicState> + Send,
{
    pub fn new(env: E, reset: ResetConfig, seed: Option<u64>) -> Self {
        let agent = ChallengeAgent::new(env.available_actions(), seed);
        ChallengerRunner { env, agent, reset }
    }

    fn run_loop(
        &mut self,
        cancel: &CancellationToken,
        summary: &mut RunSummary,
    ) -> Result<(), RunnerError> {
        let role = Role::Challenger;
        let mut observation: Option<SymbolicState> = None;
        let mut reward = 0.0;
        let mut done = false;

        while !cancel.is_cancelled() {
            if observation.is_none() || self.env.done() {
                let adversary = self.agent.next_adversary();
                match reset_with_retry(&mut self.env, role, Some(adversary), &self.reset, cancel)? {
                    Some(obs) => observation = Some(obs),
                    None => break,
                }
                summary.episodes += 1;
                debug!(%role, adversary = adversary.name(), "challenger episode started");
            }

            let Some(obs) = observation.as_ref() else {
                continue;
            };
            let action = self.agent.act(obs, reward, done, true);
            let step = self.env.step(action)?;
            observation = Some(step.observation);
            reward = step.reward;
            done = step.done;
            summary.steps += 1;
        }
        Ok(())
    }
}

impl<E> RoleRunner for ChallengerRunner<E>
where
    E: Environment<Observation = SymbolicState> + Send,
{
    fn role(&self) -> Role {
        Role::Challenger
    }

    fn run(mut self: Box<Self>, cancel: CancellationToken) -> Result<RunSummary, RunnerError> {
        info!(agent = self.agent.name(), "challenger started");
        let mut summary = RunSummary::default();
        match self.run_loop(&cancel, &mut summary) {
            Ok(()) => {}
            Err(RunnerError::Environment(EnvironmentError::Disconnected)) => {
                info!("learner left the arena, challenger stopping");
            }
            Err(e) => return Err(e),
        }
        info!(steps = summary.steps, episodes = summary.episodes, "challenger finished");
        Ok(summary)
    }
}

/// Drives the Q-learner for exactly `epoch_size * max_epochs` steps.
///
/// The model is built on the runner's own thread from `factory`, so it never
/// crosses threads.
pub struct LearnerRunner<E> {
    env: E,
    factory: ModelFactory,
    spec: ModelSpec,
    config: ExperimentConfig,
    checkpointer: Checkpointer,
    visualizer: Box<dyn Visualizer>,
    seed: Option<u64>,
}

impl<E> LearnerRunner<E>
where
    E: Environment<Observation = Frame> + Send,
{
    pub fn new(
        env: E,
        factory: ModelFactory,
        spec: ModelSpec,
        config: ExperimentConfig,
        visualizer: Box<dyn Visualizer>,
        seed: Option<u64>,
    ) -> Self {
        let checkpointer = Checkpointer::new(config.experiment.epoch_size, &config.checkpoint);
        LearnerRunner {
            env,
            factory,
            spec,
            config,
            checkpointer,
            visualizer,
            seed,
        }
    }
}

struct LearnerState {
    agent: QLearnerAgent,
    memory: ReplayMemory,
    explorer: LinearEpsilonGreedyExplorer,
    rewards: RewardWindow,
    stats: EpisodeStats,
    summary: RunSummary,
}

impl<E> LearnerRunner<E>
where
    E: Environment<Observation = Frame> + Send,
{
    fn run_loop(
        &mut self,
        state: &mut LearnerState,
        cancel: &CancellationToken,
    ) -> Result<(), RunnerError> {
        let role = Role::Learner;
        let max_steps = self.config.experiment.max_training_steps();
        let mut rng = crate::ai::seeded_rng(self.seed.map(|s| s.wrapping_add(1)));
        let mut in_episode = false;

        for step in 1..=max_steps {
            if cancel.is_cancelled() {
                info!(step, "learner cancelled");
                break;
            }

            if !in_episode || self.env.done() {
                if in_episode {
                    if let Some(rewards) = state.rewards.flush() {
                        visualize_training(self.visualizer.as_mut(), step, &rewards);
                        state.stats.record(&rewards);
                    }
                    state.agent.inject_summaries(step, self.visualizer.as_mut());
                }
                let Some(obs) =
                    reset_with_retry(&mut self.env, role, None, &self.config.reset, cancel)?
                else {
                    break;
                };
                state.agent.start_episode(&obs);
                state.summary.episodes += 1;
                in_episode = true;
            }

            let explore = state.explorer.is_exploring(step, &mut rng);
            let action = state.agent.act(explore)?;
            let outcome = self.env.step(action)?;

            state.rewards.push(outcome.reward);
            state.agent.observe(&outcome.observation);
            state.memory.append(Transition {
                observation: outcome.observation,
                action,
                reward: outcome.reward,
                done: outcome.done,
            })?;
            state.agent.learn(step, &state.memory)?;
            state.summary.steps = step;

            if self.checkpointer.is_due(step) {
                self.checkpoint(state, step)?;
            }
        }
        Ok(())
    }

    fn checkpoint(&mut self, state: &mut LearnerState, step: usize) -> Result<(), RunnerError> {
        let epoch = self.checkpointer.epoch_index(step);
        let epsilon = state.explorer.probability(step);
        let metadata = CheckpointMetadata {
            epoch,
            step,
            timestamp: Checkpointer::timestamp(),
            backend: state.agent.model().backend().to_string(),
            epsilon,
            metrics: CheckpointMetrics {
                average_reward: state.stats.average_reward(100),
                total_episodes: state.stats.total_episodes(),
                model_updates: state.agent.updates(),
            },
            hyperparameters: CheckpointHyperparameters::from_config(&self.config),
        };
        self.checkpointer.save(state.agent.model(), &metadata)?;
        state.summary.checkpoints += 1;

        self.visualizer.add_scalar("Training/epsilon", step, epsilon);
        self.visualizer.flush();
        info!(
            epoch,
            step,
            epsilon,
            episodes = state.stats.total_episodes(),
            avg_reward = state.stats.average_reward(100),
            memory = state.memory.len(),
            "epoch complete"
        );
        Ok(())
    }
}

impl<E> RoleRunner for LearnerRunner<E>
where
    E: Environment<Observation = Frame> + Send,
{
    fn role(&self) -> Role {
        Role::Learner
    }

    fn run(mut self: Box<Self>, cancel: CancellationToken) -> Result<RunSummary, RunnerError> {
        let model = (self.factory)(&self.spec)?;
        info!(
            backend = model.backend(),
            max_steps = self.config.experiment.max_training_steps(),
            "learner started"
        );

        let memory = &self.config.memory;
        let mut state = LearnerState {
            agent: QLearnerAgent::new(
                model,
                self.config.learner.clone(),
                memory.history_length,
                self.seed,
            ),
            memory: ReplayMemory::new(
                memory.capacity,
                (memory.frame_height, memory.frame_width),
                memory.history_length,
            ),
            explorer: LinearEpsilonGreedyExplorer::from_config(&self.config.explorer),
            rewards: RewardWindow::new(),
            stats: EpisodeStats::new(),
            summary: RunSummary::default(),
        };

        let result = match self.run_loop(&mut state, &cancel) {
            Err(RunnerError::Environment(EnvironmentError::Disconnected)) if cancel.is_cancelled() => {
                Ok(())
            }
            other => other,
        };
        self.visualizer.flush();
        result?;

        info!(
            steps = state.summary.steps,
            episodes = state.summary.episodes,
            checkpoints = state.summary.checkpoints,
            "learner finished"
        );
        Ok(state.summary)
    }
}
