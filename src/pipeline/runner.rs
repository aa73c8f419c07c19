//! The capture pipeline: simulator, custom sensors and writer for one worker.
//!
//! A [`CapturePipeline`] owns its simulator and camera sensors for its whole
//! lifetime. Both are acquired in [`CapturePipeline::setup`] and released in
//! [`CapturePipeline::shutdown`], which also runs on drop, so every exit path
//! gives them back.
//!
//! ```text
//! for each episode:
//!   begin_episode(task, ep)          -- failure aborts the episode
//!   for each observation:
//!     capture_step -> FrameBundle    -- per-view failures absorbed
//!     aggregator.push(bundle)
//!   aggregator.finish() -> EpisodeRecord -> writer.write
//! ```

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use super::summary::{BatchSummary, EpisodeFailure, TaskOutcome, TaskSummary};
use crate::capture::CaptureOrchestrator;
use crate::config::CaptureConfig;
use crate::episode::{EpisodeAggregator, EpisodeRecord};
use crate::error::CaptureError;
use crate::persist::EpisodeWriter;
use crate::sim::{CameraFactory, CameraSensor, Simulator};
use crate::view::ViewRegistry;

/// Drives one simulator through episodes and persists each one.
pub struct CapturePipeline<S: Simulator, C: CameraSensor> {
    config: CaptureConfig,
    simulator: S,
    orchestrator: CaptureOrchestrator<C>,
    writer: EpisodeWriter,
    active: bool,
}

impl<S: Simulator, C: CameraSensor> CapturePipeline<S, C> {
    /// Launch `simulator` and create a sensor for every custom view.
    ///
    /// If either step fails, whatever was already acquired is released before
    /// the error is returned.
    pub fn setup<F>(
        config: CaptureConfig,
        registry: ViewRegistry,
        mut simulator: S,
        factory: &mut F,
        writer: EpisodeWriter,
    ) -> Result<Self>
    where
        F: CameraFactory<Sensor = C>,
    {
        if let Err(err) = simulator.launch() {
            simulator.shutdown();
            return Err(err).context("Failed to launch simulator");
        }
        let orchestrator = match CaptureOrchestrator::with_factory(registry, factory) {
            Ok(orchestrator) => orchestrator,
            Err(err) => {
                simulator.shutdown();
                return Err(err).context("Failed to attach custom cameras");
            }
        };

        info!(
            views = orchestrator.registry().len(),
            custom = orchestrator.registry().custom_views().len(),
            output = %writer.output_dir().display(),
            "Capture pipeline ready"
        );
        Ok(Self {
            config,
            simulator,
            orchestrator,
            writer,
            active: true,
        })
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn registry(&self) -> &ViewRegistry {
        self.orchestrator.registry()
    }

    pub fn writer(&self) -> &EpisodeWriter {
        &self.writer
    }

    /// Replay one demonstration and aggregate it. Nothing is written.
    ///
    /// A reset or stepping failure aborts the whole episode.
    pub fn capture_episode(
        &mut self,
        task_name: &str,
        episode_index: usize,
    ) -> Result<EpisodeRecord, CaptureError> {
        let descriptions = self
            .simulator
            .begin_episode(task_name, episode_index)
            .map_err(|err| CaptureError::Reset {
                task: task_name.to_string(),
                episode: episode_index,
                reason: format!("{err:#}"),
            })?;

        let mut aggregator = EpisodeAggregator::new(
            self.orchestrator.registry(),
            task_name,
            episode_index,
            descriptions,
            self.config.step_duration,
        )
        .with_depth_in_meters(self.config.depth_in_meters);

        let mut step = 0;
        loop {
            let observation = match self.simulator.next_observation() {
                Ok(Some(observation)) => observation,
                Ok(None) => break,
                Err(err) => {
                    return Err(CaptureError::Observation {
                        task: task_name.to_string(),
                        episode: episode_index,
                        step,
                        reason: format!("{err:#}"),
                    })
                }
            };
            if step >= self.config.max_steps {
                warn!(
                    task = task_name,
                    episode = episode_index,
                    max_steps = self.config.max_steps,
                    "demonstration exceeds max_steps; truncating"
                );
                break;
            }
            let bundle = self.orchestrator.capture_step(step, &observation);
            aggregator.push(bundle)?;
            step += 1;
        }

        Ok(aggregator.finish())
    }

    /// Capture and write `episodes` episodes of `task_name`.
    ///
    /// Episodes that fail to capture are logged and skipped; their index is
    /// not reused. Write errors stop the task.
    pub fn run_task(&mut self, task_name: &str, episodes: usize) -> Result<TaskSummary> {
        info!(task = task_name, episodes, "Capturing task");
        let mut summary = TaskSummary::new(task_name);

        for episode_index in 0..episodes {
            match self.capture_episode(task_name, episode_index) {
                Ok(record) => {
                    let dir = self.writer.write(&record).with_context(|| {
                        format!("Failed to save {task_name} episode {episode_index}")
                    })?;
                    summary.saved.push(dir);
                }
                Err(err) => {
                    warn!(
                        task = task_name,
                        episode = episode_index,
                        error = %err,
                        "Episode capture failed; skipping"
                    );
                    summary.failures.push(EpisodeFailure {
                        episode_index,
                        reason: err.to_string(),
                    });
                }
            }
        }

        info!(
            task = task_name,
            saved = summary.saved.len(),
            failed = summary.failures.len(),
            "Task complete"
        );
        Ok(summary)
    }

    /// Run every task in turn on this pipeline. A task that stops with an
    /// error is recorded and the batch moves on.
    pub fn run_batch(&mut self, tasks: &[String], episodes: usize) -> BatchSummary {
        let mut batch = BatchSummary::default();
        for task in tasks {
            let outcome = match self.run_task(task, episodes) {
                Ok(summary) => TaskOutcome::Completed(summary),
                Err(err) => {
                    let reason = format!("{err:#}");
                    error!(task = %task, error = %reason, "Task failed");
                    TaskOutcome::Failed {
                        task_name: task.clone(),
                        reason,
                    }
                }
            };
            batch.outcomes.push(outcome);
        }
        batch
    }

    /// Release the custom sensors and shut the simulator down. Safe to call
    /// more than once.
    pub fn shutdown(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        self.orchestrator.release();
        self.simulator.shutdown();
        info!("Capture pipeline shut down");
    }
}

impl<S: Simulator, C: CameraSensor> Drop for CapturePipeline<S, C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
