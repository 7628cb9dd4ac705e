use std::path::{Path, PathBuf};

use crate::config::{Config, config_path, load_config};
use crate::error::Result;
use crate::guard::{self, Commit};

#[derive(Debug)]
pub struct PreflightContext {
    pub repo_root: PathBuf,
    pub commit: Commit,
    pub config: Config,
}

pub async fn run_preflight(
    force: bool,
    config_override: Option<&Path>,
) -> Result<PreflightContext> {
    // Local checks come first so a dirty tree aborts before any network call.
    tracing::debug!("preflight: start");
    let repo_root = guard::repo_root().await?;
    if force {
        tracing::warn!("--force given, skipping git status check");
    }
    let commit = guard::latest_commit_at(&repo_root, force).await?;

    let path = config_path(&repo_root, config_override);
    let config = load_config(&path).await?;
    tracing::debug!(
        "preflight: done commit={} branch={} builds={}",
        commit.id,
        commit.branch.as_deref().unwrap_or("<detached>"),
        config.builds.len()
    );
    Ok(PreflightContext {
        repo_root,
        commit,
        config,
    })
}
