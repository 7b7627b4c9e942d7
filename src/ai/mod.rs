mod agent;
pub mod algorithms;
mod challenger;
mod focused;
mod model;
pub mod networks;
mod qlearner;
mod random;

pub use agent::Agent;
pub use algorithms::QNetworkModel;
pub use challenger::ChallengeAgent;
pub use focused::FocusedAgent;
pub use model::{BackendRegistry, ModelFactory, ModelSpec, ValueModel};
pub use networks::{QNetwork, QNetworkConfig};
pub use qlearner::QLearnerAgent;
pub use random::RandomAgent;

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Deterministic generator when `seed` is set, OS-seeded otherwise.
pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}
