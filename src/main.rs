mod atlassian;
mod build;
mod comment;
mod config;
mod error;
mod guard;
mod issue;
mod output;
mod preflight;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};

use crate::atlassian::AtlassianClient;
use crate::build::{BuildOutcome, BuildResult};
use crate::error::Result;
use crate::output::Verbosity;

#[derive(Parser, Debug)]
#[command(
    name = "stashbuild",
    version,
    about = "Run builds and report them to Stash and JIRA",
    long_about = None
)]
struct Cli {
    /// Increase output verbosity; repeat for more detail
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Force stash build, don't check git status
    #[arg(short, long, default_value_t = false)]
    force: bool,

    /// JIRA issue key to post comments to instead of the one in the branch name
    #[arg(short = 'k', long = "jirakey", value_name = "KEY")]
    jirakey: Option<String>,

    /// Config file to use instead of .stashbuild.toml in the repository root
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let verbosity = Verbosity::new(cli.verbose);
    output::init_tracing(verbosity);

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => output::report(&err, verbosity),
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let ctx = preflight::run_preflight(cli.force, cli.config.as_deref()).await?;

    let client = AtlassianClient::new(
        ctx.config.credentials.clone(),
        ctx.config.comment_role.clone(),
    )?;
    client.check_credentials().await?;

    let issue_key =
        issue::resolve_issue_key(cli.jirakey.as_deref(), ctx.commit.branch.as_deref())?;
    let jira_url = &client.credentials().jira_url;
    let link = issue::issue_link(jira_url, &issue_key);

    let pending: Vec<BuildResult> = ctx
        .config
        .builds
        .iter()
        .cloned()
        .map(BuildResult::pending)
        .collect();
    client
        .post_build_results(&pending, &ctx.commit, &link)
        .await;

    let results = build::run_builds(&ctx.config.builds, &ctx.repo_root).await;
    client
        .post_build_results(&results, &ctx.commit, &link)
        .await;

    let comment_id = client
        .post_log_comment(&results, &ctx.commit, &issue_key)
        .await?;

    let failed = results
        .iter()
        .filter(|r| matches!(r.outcome, BuildOutcome::Rejected(_)))
        .count();
    println!(
        "builds: {} passed, {} failed",
        results.len() - failed,
        failed
    );
    println!(
        "comment: {}",
        issue::comment_link(jira_url, &issue_key, &comment_id)
    );
    Ok(())
}
