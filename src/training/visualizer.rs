use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{info, warn};

use crate::config::VisualizerKind;
use crate::training::epoch::RewardSummary;

/// Sink for scalar training summaries.
pub trait Visualizer: Send {
    fn add_scalar(&mut self, tag: &str, step: usize, value: f32);

    fn flush(&mut self) {}
}

/// Logs every scalar through `tracing`.
#[derive(Debug, Default)]
pub struct ConsoleVisualizer;

impl Visualizer for ConsoleVisualizer {
    fn add_scalar(&mut self, tag: &str, step: usize, value: f32) {
        info!(target: "pig_chase::summary", step, tag, value, "summary");
    }
}

#[derive(serde::Serialize)]
struct ScalarRecord<'a> {
    tag: &'a str,
    step: usize,
    value: f32,
}

/// Appends scalars as JSON lines to `<logdir>/scalars.jsonl`.
pub struct JsonLinesVisualizer {
    writer: BufWriter<File>,
}

impl JsonLinesVisualizer {
    pub fn create(logdir: &Path) -> std::io::Result<Self> {
        fs::create_dir_all(logdir)?;
        let file = File::options()
            .create(true)
            .append(true)
            .open(logdir.join("scalars.jsonl"))?;
        Ok(JsonLinesVisualizer {
            writer: BufWriter::new(file),
        })
    }
}

impl Visualizer for JsonLinesVisualizer {
    fn add_scalar(&mut self, tag: &str, step: usize, value: f32) {
        let record = ScalarRecord { tag, step, value };
        let written = serde_json::to_writer(&mut self.writer, &record)
            .map_err(std::io::Error::from)
            .and_then(|_| self.writer.write_all(b"\n"));
        if let Err(e) = written {
            warn!("failed to write summary {tag}: {e}");
        }
    }

    fn flush(&mut self) {
        if let Err(e) = self.writer.flush() {
            warn!("failed to flush summaries: {e}");
        }
    }
}

impl Drop for JsonLinesVisualizer {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

/// Build the visualizer selected in configuration.
pub fn create_visualizer(
    kind: VisualizerKind,
    logdir: &Path,
) -> std::io::Result<Box<dyn Visualizer>> {
    Ok(match kind {
        VisualizerKind::Console => Box::new(ConsoleVisualizer),
        VisualizerKind::Jsonl => Box::new(JsonLinesVisualizer::create(logdir)?),
    })
}

/// Report one episode's rewards.
pub fn visualize_training(visualizer: &mut dyn Visualizer, step: usize, summary: &RewardSummary) {
    visualizer.add_scalar("Training/reward per episode", step, summary.total);
    visualizer.add_scalar("Training/max.reward", step, summary.max);
    visualizer.add_scalar("Training/min.reward", step, summary.min);
    visualizer.add_scalar("Training/actions per episode", step, summary.actions as f32);
}
