use std::path::PathBuf;
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};

use pig_chase::ai::BackendRegistry;
use pig_chase::config::{ExperimentConfig, ExperimentSettings};
use pig_chase::experiment::{build_role_definitions, Role};
use pig_chase::telemetry;
use pig_chase::training::{
    CancellationToken, ExperimentOrchestrator, ExperimentOutcome, OrchestratorConfig,
};

/// Pig chase DQN experiment: a scripted challenger against a learning agent.
#[derive(Parser)]
#[command(name = "pig_chase", about = "Pig Chase DQN experiment")]
struct Cli {
    /// Neural network backend
    #[arg(short, long, default_value = "ndarray")]
    backend: String,

    /// Number of epochs to run (overrides `experiment.max_epochs`)
    #[arg(short, long)]
    epochs: Option<usize>,

    /// Client endpoints (host[:port]), one per role
    #[arg(default_values_t = ["127.0.0.1:10000".to_string(), "127.0.0.1:10001".to_string()])]
    clients: Vec<String>,

    /// GPU device on which to run the experiment (negative for the default)
    #[arg(short, long, default_value_t = -1, allow_negative_numbers = true)]
    device: i64,

    /// Path to TOML configuration file
    #[arg(long, default_value = "pig_chase.toml")]
    config: PathBuf,

    /// Print the default configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.print_config {
        print!("{}", ExperimentConfig::default_toml());
        return Ok(());
    }
    telemetry::init()?;

    let mut config = ExperimentConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    if let Some(epochs) = cli.epochs {
        config.experiment.max_epochs = epochs;
    }

    let registry = BackendRegistry::with_defaults();
    let run_id = format!(
        "run-{}",
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    );
    let settings = ExperimentSettings::new(
        config,
        &cli.clients,
        &cli.backend,
        usize::try_from(cli.device).ok(),
        &run_id,
        &registry,
    )
    .context("invalid experiment settings")?;

    let definitions = build_role_definitions(&settings, &registry)?;
    let orchestrator =
        ExperimentOrchestrator::new(OrchestratorConfig::from(&settings.config.experiment));
    install_interrupt_handler(orchestrator.interrupt_token())?;

    let report = orchestrator.run(definitions)?;
    match report.outcome {
        ExperimentOutcome::Interrupted => info!("experiment interrupted"),
        ExperimentOutcome::Completed => info!(logdir = %settings.logdir.display(), "experiment complete"),
    }

    if let Some(Some(Err(e))) = report.role(Role::Learner).map(|r| r.result.as_ref()) {
        bail!("learner failed: {e}");
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum InterruptAction {
    Shutdown,
    Exit,
}

/// The first ctrl-c asks for a graceful shutdown, any later one exits.
fn interrupt_action(received: usize) -> InterruptAction {
    if received <= 1 {
        InterruptAction::Shutdown
    } else {
        InterruptAction::Exit
    }
}

/// Cancel `interrupt` on ctrl-c; exit the process on a second ctrl-c.
fn install_interrupt_handler(interrupt: CancellationToken) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building signal runtime")?;
    thread::Builder::new()
        .name("signal".into())
        .spawn(move || {
            runtime.block_on(async {
                let mut received = 0;
                loop {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        warn!("failed to listen for ctrl-c: {e}");
                        return;
                    }
                    received += 1;
                    match interrupt_action(received) {
                        InterruptAction::Shutdown => {
                            warn!("interrupt received, shutting down (ctrl-c again to exit now)");
                            interrupt.cancel();
                        }
                        InterruptAction::Exit => {
                            warn!("second interrupt received, exiting");
                            std::process::exit(130);
                        }
                    }
                }
            })
        })
        .context("spawning signal thread")?;
    Ok(())
}
