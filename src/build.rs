use std::path::Path;

use serde::Serialize;
use tokio::process::Command;

use crate::config::BuildConf;
use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Pending,
    Fulfilled(String),
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    pub conf: BuildConf,
    pub outcome: BuildOutcome,
}

impl BuildResult {
    pub fn pending(conf: BuildConf) -> Self {
        Self {
            conf,
            outcome: BuildOutcome::Pending,
        }
    }

    /// Text shown as the build output: the value on success, the reason on failure.
    pub fn output(&self) -> &str {
        match &self.outcome {
            BuildOutcome::Pending => "",
            BuildOutcome::Fulfilled(value) => value,
            BuildOutcome::Rejected(reason) => reason,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BuildState {
    InProgress,
    Successful,
    Failed,
}

impl From<&BuildOutcome> for BuildState {
    fn from(outcome: &BuildOutcome) -> Self {
        match outcome {
            BuildOutcome::Rejected(_) => BuildState::Failed,
            BuildOutcome::Fulfilled(_) => BuildState::Successful,
            BuildOutcome::Pending => BuildState::InProgress,
        }
    }
}

/// Body of `POST /rest/build-status/1.0/commits/{hash}`.
#[derive(Debug, Serialize)]
pub struct BuildStatusPayload<'a> {
    pub state: BuildState,
    pub key: &'a str,
    pub name: &'a str,
    pub url: &'a str,
    pub description: &'a str,
}

impl<'a> BuildStatusPayload<'a> {
    pub fn new(result: &'a BuildResult, url: &'a str) -> Self {
        Self {
            state: BuildState::from(&result.outcome),
            key: &result.conf.key,
            name: &result.conf.name,
            url,
            description: &result.conf.process,
        }
    }
}

/// Runs every build in order; a failing build is recorded and the next one still runs.
pub async fn run_builds(confs: &[BuildConf], workdir: &Path) -> Vec<BuildResult> {
    let mut results = Vec::with_capacity(confs.len());
    for conf in confs {
        tracing::info!(key = %conf.key, "running build {}", conf.name);
        let outcome = match run_build(conf, workdir).await {
            Ok(stdout) => {
                tracing::info!(key = %conf.key, "build passed");
                BuildOutcome::Fulfilled(stdout)
            }
            Err(err) => {
                tracing::warn!(key = %conf.key, "{}", err);
                match err {
                    Error::BuildFailed { reason, .. } => BuildOutcome::Rejected(reason),
                    other => BuildOutcome::Rejected(other.to_string()),
                }
            }
        };
        results.push(BuildResult {
            conf: conf.clone(),
            outcome,
        });
    }
    results
}

async fn run_build(conf: &BuildConf, workdir: &Path) -> Result<String, Error> {
    let output = Command::new("sh")
        .current_dir(workdir)
        .arg("-c")
        .arg(&conf.process)
        .output()
        .await
        .map_err(|e| Error::BuildFailed {
            key: conf.key.clone(),
            reason: format!("failed to spawn `{}`: {}", conf.process, e),
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if output.status.success() {
        return Ok(stdout);
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let reason = if stderr.trim().is_empty() {
        format!("{}\n{}", output.status, stdout)
    } else {
        stderr.into_owned()
    };
    Err(Error::BuildFailed {
        key: conf.key.clone(),
        reason: reason.trim_end().to_string(),
    })
}
