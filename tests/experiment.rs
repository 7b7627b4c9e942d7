use std::fs;
use std::time::Duration;

use pig_chase::ai::BackendRegistry;
use pig_chase::checkpoint::Checkpointer;
use pig_chase::config::{ExperimentConfig, ExperimentSettings, VisualizerKind};
use pig_chase::error::{ConfigError, ExperimentError};
use pig_chase::experiment::{build_role_definitions, Role};
use pig_chase::training::{ExperimentOrchestrator, ExperimentOutcome, OrchestratorConfig};

fn clients() -> Vec<String> {
    vec!["127.0.0.1:10000".into(), "127.0.0.1:10001".into()]
}

fn tiny_config(root: &std::path::Path) -> ExperimentConfig {
    let mut config = ExperimentConfig::default();
    config.experiment.epoch_size = 20;
    config.experiment.max_epochs = 2;
    config.experiment.startup_delay_ms = 0;
    config.experiment.poll_interval_ms = 5;
    config.experiment.results_dir = root.join("results");
    config.experiment.seed = Some(7);
    config.explorer.horizon = 30;
    config.memory.capacity = 100;
    config.memory.frame_height = 36;
    config.memory.frame_width = 36;
    config.memory.history_length = 2;
    config.learner.batch_size = 4;
    config.learner.train_after = 10;
    config.learner.train_frequency = 2;
    config.learner.target_update_interval = 3;
    config.arena.max_steps = 5;
    config.checkpoint.dir = root.join("checkpoints");
    config.visualizer.kind = VisualizerKind::Jsonl;
    config
}

#[test]
fn test_miniature_experiment_end_to_end() {
    let root = tempfile::tempdir().unwrap();
    let registry = BackendRegistry::with_defaults();
    let settings = ExperimentSettings::new(
        tiny_config(root.path()),
        &clients(),
        "ndarray",
        None,
        "run-test",
        &registry,
    )
    .unwrap();

    let definitions = build_role_definitions(&settings, &registry).unwrap();
    let orchestrator = ExperimentOrchestrator::new(OrchestratorConfig {
        shutdown_grace: Duration::from_secs(10),
        ..OrchestratorConfig::from(&settings.config.experiment)
    });
    let report = orchestrator.run(definitions).unwrap();

    assert_eq!(report.outcome, ExperimentOutcome::Completed);
    let learner = report.role(Role::Learner).unwrap();
    let summary = learner
        .result
        .as_ref()
        .expect("learner joined")
        .as_ref()
        .expect("learner succeeded");
    assert_eq!(summary.steps, 40);
    assert_eq!(summary.checkpoints, 2);
    assert!(summary.episodes >= 1);

    let challenger = report.role(Role::Challenger).unwrap();
    assert!(matches!(challenger.result, Some(Ok(_))));

    let checkpoints = Checkpointer::new(20, &settings.config.checkpoint)
        .list_checkpoints()
        .unwrap();
    let epochs: Vec<usize> = checkpoints.iter().map(|(_, m)| m.epoch).collect();
    assert_eq!(epochs, vec![1, 2]);
    let (path, meta) = &checkpoints[1];
    assert!(path.ends_with("pig_chase-dqn_2.model"));
    assert!(path.join("q_network.mpk").exists());
    assert_eq!(meta.step, 40);
    assert_eq!(meta.backend, "ndarray");
    assert!((meta.epsilon - 0.1).abs() < 1e-6);

    let scalars = fs::read_to_string(settings.logdir.join("scalars.jsonl")).unwrap();
    assert!(scalars.contains("Training/reward per episode"));
    assert!(scalars.contains("Training/epsilon"));
}

#[test]
fn test_unknown_backend_fails_before_launch() {
    let root = tempfile::tempdir().unwrap();
    let registry = BackendRegistry::with_defaults();
    let err = ExperimentSettings::new(
        tiny_config(root.path()),
        &clients(),
        "cntk",
        None,
        "run-test",
        &registry,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::UnknownBackend { .. }));
    assert!(!root.path().join("results").exists());
}

#[test]
fn test_single_role_definition_is_a_configuration_error() {
    let root = tempfile::tempdir().unwrap();
    let registry = BackendRegistry::with_defaults();
    let settings = ExperimentSettings::new(
        tiny_config(root.path()),
        &clients(),
        "ndarray",
        None,
        "run-test",
        &registry,
    )
    .unwrap();

    let mut definitions = build_role_definitions(&settings, &registry).unwrap();
    definitions.truncate(1);
    let err = ExperimentOrchestrator::new(OrchestratorConfig::from(&settings.config.experiment))
        .run(definitions)
        .unwrap_err();
    assert!(matches!(
        err,
        ExperimentError::Config(ConfigError::RoleCount(1))
    ));
    assert!(!settings.config.checkpoint.dir.exists());
}
