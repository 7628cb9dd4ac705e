use serde::Serialize;
use tera::{Context as TeraContext, Tera};

use crate::build::{BuildOutcome, BuildResult};
use crate::error::Result;
use crate::guard::Commit;

const COMMENT_TEMPLATE: &str = include_str!("../templates/build_comment.txt");

const PASSED: &str = "{color:green}*Passed*{color} (/)";
const FAILED: &str = "{color:red}*Failed*{color} (x)";
const RUNNING: &str = "{color:orange}*Running*{color}";

#[derive(Debug, Serialize)]
struct TemplateCommit<'a> {
    id: &'a str,
    author: &'a str,
    message: &'a str,
}

#[derive(Debug, Serialize)]
struct TemplateBuild<'a> {
    name: &'a str,
    key: &'a str,
    process: &'a str,
    result: &'static str,
    output: &'a str,
}

fn result_marker(outcome: &BuildOutcome) -> &'static str {
    match outcome {
        BuildOutcome::Rejected(_) => FAILED,
        BuildOutcome::Fulfilled(_) => PASSED,
        BuildOutcome::Pending => RUNNING,
    }
}

/// Jira wiki markup summarising every build for one commit, in input order.
pub fn compose_log_message(results: &[BuildResult], commit: &Commit) -> Result<String> {
    let builds: Vec<TemplateBuild<'_>> = results
        .iter()
        .map(|r| TemplateBuild {
            name: &r.conf.name,
            key: &r.conf.key,
            process: &r.conf.process,
            result: result_marker(&r.outcome),
            output: r.output(),
        })
        .collect();

    let mut tera_ctx = TeraContext::new();
    tera_ctx.insert(
        "commit",
        &TemplateCommit {
            id: &commit.id,
            author: &commit.author,
            message: &commit.message,
        },
    );
    tera_ctx.insert("builds", &builds);

    let message = Tera::one_off(COMMENT_TEMPLATE, &tera_ctx, false)?;
    tracing::trace!("created log message:\n{}", message);
    Ok(message)
}
