use std::collections::HashSet;
use std::io;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::ExperimentSection;
use crate::error::{ConfigError, ExperimentError, RunnerError};
use crate::experiment::Role;
use crate::training::cancel::CancellationToken;
use crate::training::runner::{RoleRunner, RunSummary};

/// Number of roles an experiment runs.
pub const ROLE_COUNT: usize = 2;

/// One role to launch: a display name and the runner driving it.
pub struct RoleDefinition {
    pub name: String,
    pub role: Role,
    pub runner: Box<dyn RoleRunner>,
}

impl RoleDefinition {
    pub fn new(name: impl Into<String>, runner: Box<dyn RoleRunner>) -> Self {
        RoleDefinition {
            name: name.into(),
            role: runner.role(),
            runner,
        }
    }
}

/// Lifecycle timings of the orchestrator.
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    pub startup_delay: Duration,
    pub poll_interval: Duration,
    pub shutdown_grace: Duration,
}

impl From<&ExperimentSection> for OrchestratorConfig {
    fn from(section: &ExperimentSection) -> Self {
        OrchestratorConfig {
            startup_delay: section.startup_delay(),
            poll_interval: section.poll_interval(),
            shutdown_grace: section.shutdown_grace(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExperimentOutcome {
    /// The learner finished on its own.
    Completed,
    /// Supervision stopped on a user interrupt.
    Interrupted,
}

/// How one role's thread ended. `result` is `None` when the thread was still
/// blocked after the shutdown grace period and was detached.
#[derive(Debug)]
pub struct RoleReport {
    pub name: String,
    pub role: Role,
    pub result: Option<Result<RunSummary, RunnerError>>,
}

#[derive(Debug)]
pub struct ExperimentReport {
    pub outcome: ExperimentOutcome,
    pub roles: Vec<RoleReport>,
}

impl ExperimentReport {
    pub fn role(&self, role: Role) -> Option<&RoleReport> {
        self.roles.iter().find(|r| r.role == role)
    }
}

type RoleHandle = JoinHandle<Result<RunSummary, RunnerError>>;

/// Starts a runner on a thread called `thread_name`.
type Spawner = fn(String, Box<dyn RoleRunner>, CancellationToken) -> io::Result<RoleHandle>;

fn spawn_role_thread(
    thread_name: String,
    runner: Box<dyn RoleRunner>,
    cancel: CancellationToken,
) -> io::Result<RoleHandle> {
    thread::Builder::new()
        .name(thread_name)
        .spawn(move || runner.run(cancel))
}

struct Launched {
    name: String,
    role: Role,
    handle: RoleHandle,
}

/// Runs both roles on their own threads and supervises them until the
/// learner finishes or an interrupt arrives.
pub struct ExperimentOrchestrator {
    config: OrchestratorConfig,
    interrupt: CancellationToken,
}

impl ExperimentOrchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        ExperimentOrchestrator {
            config,
            interrupt: CancellationToken::new(),
        }
    }

    /// Token that stops supervision when cancelled, e.g. from a ctrl-c handler.
    pub fn interrupt_token(&self) -> CancellationToken {
        self.interrupt.clone()
    }

    fn validate(definitions: &[RoleDefinition]) -> Result<(), ConfigError> {
        if definitions.len() != ROLE_COUNT {
            return Err(ConfigError::RoleCount(definitions.len()));
        }
        let mut seen = HashSet::new();
        for def in definitions {
            if !seen.insert(def.role) {
                return Err(ConfigError::DuplicateRole(def.role));
            }
        }
        Ok(())
    }

    pub fn run(&self, definitions: Vec<RoleDefinition>) -> Result<ExperimentReport, ExperimentError> {
        self.run_with(definitions, spawn_role_thread)
    }

    fn run_with(
        &self,
        mut definitions: Vec<RoleDefinition>,
        spawn: Spawner,
    ) -> Result<ExperimentReport, ExperimentError> {
        Self::validate(&definitions)?;
        definitions.sort_by_key(|d| d.role.index());

        let cancel = CancellationToken::new();
        let mut launched: Vec<Launched> = Vec::with_capacity(definitions.len());
        for def in definitions {
            let RoleDefinition { name, role, runner } = def;
            let handle = match spawn(format!("role-{}-{}", role, name), runner, cancel.clone()) {
                Ok(handle) => handle,
                Err(source) => {
                    // Roles already running must stop before the error is reported.
                    cancel.cancel();
                    let stopped = self.join_all(launched);
                    warn!(%role, stopped = stopped.len(), "launch aborted");
                    return Err(ExperimentError::Spawn { role, source });
                }
            };
            info!(%role, name = %name, "role started");
            launched.push(Launched { name, role, handle });

            // Give the arena time to come up before the next role connects.
            if role == Role::Challenger {
                thread::sleep(self.config.startup_delay);
            }
        }

        let outcome = self.supervise(&launched);
        cancel.cancel();
        let roles = self.join_all(launched);
        Ok(ExperimentReport { outcome, roles })
    }

    fn supervise(&self, launched: &[Launched]) -> ExperimentOutcome {
        let learner_finished = || {
            launched
                .iter()
                .filter(|l| l.role == Role::Learner)
                .all(|l| l.handle.is_finished())
        };

        loop {
            if learner_finished() {
                info!("learner finished, shutting down");
                return ExperimentOutcome::Completed;
            }
            if self.interrupt.is_cancelled() {
                info!("caught interrupt, shutting down");
                return ExperimentOutcome::Interrupted;
            }
            thread::sleep(self.config.poll_interval);
            debug!(
                live = 1 + launched.iter().filter(|l| !l.handle.is_finished()).count(),
                "supervising"
            );
        }
    }

    fn join_all(&self, launched: Vec<Launched>) -> Vec<RoleReport> {
        let deadline = Instant::now() + self.config.shutdown_grace;
        let tick = self.config.poll_interval.min(Duration::from_millis(10));

        launched
            .into_iter()
            .map(|Launched { name, role, handle }| {
                while !handle.is_finished() && Instant::now() < deadline {
                    thread::sleep(tick);
                }
                let result = if handle.is_finished() {
                    Some(handle.join().unwrap_or_else(|payload| {
                        Err(RunnerError::Panicked(panic_message(payload.as_ref())))
                    }))
                } else {
                    warn!(%role, name = %name, "role still running after shutdown grace, detaching");
                    None
                };
                match &result {
                    Some(Ok(summary)) => info!(
                        %role,
                        steps = summary.steps,
                        episodes = summary.episodes,
                        "role stopped"
                    ),
                    Some(Err(e)) => warn!(%role, error = %e, "role failed"),
                    None => {}
                }
                RoleReport { name, role, result }
            })
            .collect()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
