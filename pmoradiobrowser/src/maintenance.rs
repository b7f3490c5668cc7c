//! Maintenance tasks delegated to shell scripts
//!
//! A task named `fix-permissions` runs `{scripts_dir}/fix-permissions.sh`
//! through `bash`; its combined output is returned to the caller.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{info, warn};

/// Errors of a maintenance task
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MaintenanceError {
    #[error("{0} script not found")]
    NotFound(String),

    #[error("invalid task name: {0:?}")]
    InvalidName(String),

    #[error("{task} failed: {reason}")]
    Failed { task: String, reason: String },
}

/// Runs named maintenance tasks
#[async_trait]
pub trait MaintenanceRunner: Send + Sync {
    /// Run `task` and return its output
    async fn run(&self, task: &str) -> Result<String, MaintenanceError>;
}

/// Task names are restricted to `[A-Za-z0-9_-]`
pub fn is_valid_task_name(task: &str) -> bool {
    !task.is_empty()
        && task
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Runs `{scripts_dir}/{task}.sh` with bash
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    scripts_dir: PathBuf,
}

impl ScriptRunner {
    pub fn new<P: AsRef<Path>>(scripts_dir: P) -> Self {
        Self {
            scripts_dir: scripts_dir.as_ref().to_path_buf(),
        }
    }

    pub fn script_path(&self, task: &str) -> PathBuf {
        self.scripts_dir.join(format!("{task}.sh"))
    }
}

#[async_trait]
impl MaintenanceRunner for ScriptRunner {
    async fn run(&self, task: &str) -> Result<String, MaintenanceError> {
        if !is_valid_task_name(task) {
            return Err(MaintenanceError::InvalidName(task.to_string()));
        }

        let script = self.script_path(task);
        if !script.is_file() {
            return Err(MaintenanceError::NotFound(task.to_string()));
        }

        info!("Running maintenance task {} ({})", task, script.display());
        let output = Command::new("bash")
            .arg(&script)
            .output()
            .await
            .map_err(|e| MaintenanceError::Failed {
                task: task.to_string(),
                reason: e.to_string(),
            })?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            warn!("Maintenance task {} exited with {}", task, output.status);
        }
        Ok(text)
    }
}
