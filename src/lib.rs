//! # Pig Chase
//!
//! A two-agent reinforcement-learning experiment on a turn-based pig chase
//! arena: a scripted challenger plays against a deep Q-learner that trains
//! on-line with an epsilon-greedy schedule, replay memory and per-epoch
//! checkpoints. Models run on the Burn ML framework.
//!
//! ## Modules
//!
//! - [`env`]: Environment contract, in-process arena, state builders
//! - [`ai`]: Agents (random, focused, challenger, Q-learner), value models, backends
//! - [`training`]: Explorer, replay memory, role runners, orchestrator
//! - [`checkpoint`]: Per-epoch model persistence and metadata
//! - [`experiment`]: Roles and assembly of both runners from settings
//! - [`config`]: TOML configuration loading and validation
//! - [`error`]: Structured error types
//! - [`telemetry`]: Logging setup

#![recursion_limit = "256"]

pub mod ai;
pub mod checkpoint;
pub mod config;
pub mod env;
pub mod error;
pub mod experiment;
pub mod telemetry;
pub mod training;
