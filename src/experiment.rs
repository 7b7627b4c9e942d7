//! Role identities and the assembly of both roles from resolved settings.

use std::fmt;

use tracing::info;

use crate::ai::{BackendRegistry, ModelSpec};
use crate::config::ExperimentSettings;
use crate::env::{Environment, FrameStateBuilder, LocalArena, SymbolicStateBuilder};
use crate::error::ExperimentError;
use crate::training::{create_visualizer, ChallengerRunner, LearnerRunner, RoleDefinition};

/// Display names of the two roles, in role order.
pub const AGENT_NAMES: [&str; 2] = ["Agent_1", "Agent_2"];

/// The two seats of the experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    /// Scripted agent, role 0.
    Challenger,
    /// Learning agent, role 1.
    Learner,
}

impl Role {
    pub fn index(self) -> usize {
        match self {
            Role::Challenger => 0,
            Role::Learner => 1,
        }
    }

    pub fn other(self) -> Role {
        match self {
            Role::Challenger => Role::Learner,
            Role::Learner => Role::Challenger,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// Build the challenger and learner definitions for one experiment.
///
/// Both roles connect to a fresh in-process arena: the challenger sees the
/// symbolic state, the learner rendered frames.
pub fn build_role_definitions(
    settings: &ExperimentSettings,
    registry: &BackendRegistry,
) -> Result<Vec<RoleDefinition>, ExperimentError> {
    let config = &settings.config;
    let factory = registry.resolve(&settings.backend)?;
    let seed = |offset: u64| config.experiment.seed.map(|s| s.wrapping_add(offset));

    let arena = LocalArena::new(config.arena.clone(), &settings.clients, seed(0));
    let challenger_env = arena.connect(Role::Challenger, SymbolicStateBuilder)?;
    let learner_env = arena.connect(
        Role::Learner,
        FrameStateBuilder::new(config.memory.frame_height, config.memory.frame_width),
    )?;

    let visualizer = create_visualizer(config.visualizer.kind, &settings.logdir)
        .map_err(|source| ExperimentError::Visualizer {
            path: settings.logdir.clone(),
            source,
        })?;
    let spec = ModelSpec::new(config, learner_env.available_actions(), settings.device);
    info!(
        backend = %settings.backend,
        logdir = %settings.logdir.display(),
        epochs = config.experiment.max_epochs,
        "experiment assembled"
    );

    Ok(vec![
        RoleDefinition::new(
            AGENT_NAMES[Role::Challenger.index()],
            Box::new(ChallengerRunner::new(
                challenger_env,
                config.reset.clone(),
                seed(1),
            )),
        ),
        RoleDefinition::new(
            AGENT_NAMES[Role::Learner.index()],
            Box::new(LearnerRunner::new(
                learner_env,
                factory,
                spec,
                config.clone(),
                visualizer,
                seed(2),
            )),
        ),
    ])
}
