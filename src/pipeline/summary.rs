//! Outcome reporting for task and batch runs.

use std::path::PathBuf;

/// An episode that was skipped because its capture aborted.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeFailure {
    pub episode_index: usize,
    pub reason: String,
}

/// What one task run produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskSummary {
    pub task_name: String,
    /// Episode directories written, in episode order.
    pub saved: Vec<PathBuf>,
    pub failures: Vec<EpisodeFailure>,
}

impl TaskSummary {
    pub fn new(task_name: &str) -> Self {
        Self {
            task_name: task_name.to_string(),
            ..Self::default()
        }
    }

    pub fn attempted(&self) -> usize {
        self.saved.len() + self.failures.len()
    }
}

/// Result of one task within a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Completed(TaskSummary),
    /// The task could not run at all, or an I/O error stopped it.
    Failed { task_name: String, reason: String },
}

impl TaskOutcome {
    pub fn task_name(&self) -> &str {
        match self {
            Self::Completed(summary) => &summary.task_name,
            Self::Failed { task_name, .. } => task_name,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Per-task outcomes of a batch, in task order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    pub outcomes: Vec<TaskOutcome>,
}

impl BatchSummary {
    pub fn episodes_saved(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o {
                TaskOutcome::Completed(summary) => summary.saved.len(),
                TaskOutcome::Failed { .. } => 0,
            })
            .sum()
    }

    pub fn episodes_failed(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o {
                TaskOutcome::Completed(summary) => summary.failures.len(),
                TaskOutcome::Failed { .. } => 0,
            })
            .sum()
    }

    pub fn failed_tasks(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_completed())
            .map(TaskOutcome::task_name)
            .collect()
    }
}
