use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = ".stashbuild.toml";
pub const PASSWORD_ENV: &str = "STASHBUILD_PASSWORD";
pub const USERNAME_ENV: &str = "STASHBUILD_USERNAME";

const DEFAULT_COMMENT_ROLE: &str = "Developers";

/// One build step as declared in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BuildConf {
    pub key: String,
    pub name: String,
    pub process: String,
}

#[derive(Debug, Deserialize)]
struct FileConfig {
    stash_url: String,
    jira_url: String,
    username: Option<String>,
    #[serde(default)]
    allow_unsafe_certificate: bool,
    comment_role: Option<String>,
    #[serde(default, rename = "build")]
    builds: Vec<BuildConf>,
}

/// Credentials and endpoints shared by the host and the issue tracker.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub stash_url: String,
    pub jira_url: String,
    pub allow_unsafe_certificate: bool,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("stash_url", &self.stash_url)
            .field("jira_url", &self.jira_url)
            .field("allow_unsafe_certificate", &self.allow_unsafe_certificate)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    pub comment_role: String,
    pub builds: Vec<BuildConf>,
}

pub fn config_path(repo_root: &Path, explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(path) => path.to_path_buf(),
        None => repo_root.join(CONFIG_FILE),
    }
}

pub async fn load_config(path: &Path) -> Result<Config> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let env = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
    parse_config(&content, env).with_context(|| format!("failed to parse {}", path.display()))
}

fn parse_config(content: &str, env: impl Fn(&str) -> Option<String>) -> Result<Config> {
    let file: FileConfig = toml::from_str(content)?;

    let username = env(USERNAME_ENV)
        .or(file.username)
        .ok_or_else(|| anyhow::anyhow!("no username in config and {} is unset", USERNAME_ENV))?;
    let Some(password) = env(PASSWORD_ENV) else {
        bail!("missing {} for Atlassian API", PASSWORD_ENV);
    };
    if file.builds.is_empty() {
        bail!("no [[build]] entries configured");
    }

    Ok(Config {
        credentials: Credentials {
            username,
            password,
            stash_url: file.stash_url.trim_end_matches('/').to_string(),
            jira_url: file.jira_url.trim_end_matches('/').to_string(),
            allow_unsafe_certificate: file.allow_unsafe_certificate,
        },
        comment_role: file
            .comment_role
            .unwrap_or_else(|| DEFAULT_COMMENT_ROLE.to_string()),
        builds: file.builds,
    })
}
