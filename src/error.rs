use thiserror::Error;

/// Which side of the working tree made the repository dirty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyKind {
    Staged,
    Unstaged,
}

impl std::fmt::Display for DirtyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DirtyKind::Staged => write!(f, "staged"),
            DirtyKind::Unstaged => write!(f, "unstaged"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Git error: There are {kind} changes ({} paths)", .paths.len())]
    DirtyRepository { kind: DirtyKind, paths: Vec<String> },

    #[error("git query failed: {0}")]
    VcsUnavailable(#[from] git2::Error),

    #[error("Could not find commits")]
    NoCommits,

    #[error("{method} {url} returned {status}: {body}")]
    HttpStatus {
        method: reqwest::Method,
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid JIRA issue key - {0}")]
    InvalidIssueKey(String),

    #[error("cannot derive a JIRA issue key from {0:?}; pass one with --jirakey")]
    UnresolvedIssueKey(String),

    #[error("build {key} failed: {reason}")]
    BuildFailed { key: String, reason: String },

    #[error("failed to render build comment: {0}")]
    Template(#[from] tera::Error),

    #[error(transparent)]
    Setup(#[from] anyhow::Error),
}

impl Error {
    /// Process exit code used when this error ends the run.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::DirtyRepository { .. } => 2,
            Error::VcsUnavailable(_) => 3,
            Error::NoCommits => 4,
            Error::HttpStatus { .. } | Error::Transport(_) => 5,
            Error::InvalidIssueKey(_) | Error::UnresolvedIssueKey(_) => 6,
            Error::BuildFailed { .. } | Error::Template(_) | Error::Setup(_) => 1,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
