//! The turn-based pig chase environment: the `Environment` contract each role
//! talks to, an in-process arena implementing it, state builders that turn the
//! arena into per-role observations, and client endpoint parsing.

mod arena;
mod endpoint;
mod state;

pub use arena::{Action, ArenaClient, Facing, LocalArena, Pose, Tile, BOARD_SIZE};
pub use endpoint::{ClientEndpoint, DEFAULT_PORT};
pub use state::{ArenaView, Frame, FrameStateBuilder, StateBuilder, SymbolicState, SymbolicStateBuilder};

use crate::error::EnvironmentError;

/// The adversary flavour the challenger presents for an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum AdversaryType {
    Random,
    Focused,
}

impl AdversaryType {
    pub fn other(self) -> AdversaryType {
        match self {
            AdversaryType::Random => AdversaryType::Focused,
            AdversaryType::Focused => AdversaryType::Random,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AdversaryType::Random => "random",
            AdversaryType::Focused => "focused",
        }
    }
}

/// Outcome of submitting one action.
#[derive(Debug, Clone)]
pub struct Step<O> {
    pub observation: O,
    pub reward: f32,
    pub done: bool,
}

/// One role's connection to a turn-based environment.
///
/// `reset` and `step` block until the other role's pending action has been
/// resolved. `reset` returns `Ok(None)` when the episode ended before this role
/// could observe it; callers retry.
pub trait Environment {
    type Observation;

    fn available_actions(&self) -> usize;

    fn done(&self) -> bool;

    fn reset(
        &mut self,
        adversary: Option<AdversaryType>,
    ) -> Result<Option<Self::Observation>, EnvironmentError>;

    fn step(&mut self, action: usize) -> Result<Step<Self::Observation>, EnvironmentError>;
}
