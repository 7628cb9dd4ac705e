use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

static ISSUE_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Z0-9_]*-[0-9]+$").expect("valid issue key regex"));

/// Issue key from a branch ref: everything after the last `/`.
pub fn issue_key_from_ref(path: &str) -> Result<String> {
    let Some((_, tail)) = path.rsplit_once('/') else {
        return Err(Error::UnresolvedIssueKey(path.to_string()));
    };
    if !ISSUE_KEY.is_match(tail) {
        return Err(Error::UnresolvedIssueKey(path.to_string()));
    }
    Ok(tail.to_string())
}

/// An explicit key is taken as-is; otherwise it comes from the branch.
pub fn resolve_issue_key(explicit: Option<&str>, branch: Option<&str>) -> Result<String> {
    if let Some(key) = explicit {
        return Ok(key.to_string());
    }
    match branch {
        Some(branch) => issue_key_from_ref(branch),
        None => Err(Error::UnresolvedIssueKey(String::from("detached HEAD"))),
    }
}

pub fn issue_link(jira_url: &str, issue_key: &str) -> String {
    format!("{}/browse/{}", jira_url, issue_key)
}

pub fn comment_link(jira_url: &str, issue_key: &str, comment_id: &str) -> String {
    format!(
        "{}?focusedCommentId={id}&page=com.atlassian.jira.plugin.system.issuetabpanels:comment-tabpanel#comment-{id}",
        issue_link(jira_url, issue_key),
        id = comment_id
    )
}
