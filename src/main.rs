mod config;
mod design_doc;
mod pr;
mod report;
mod sync;

use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{error, info, info_span, warn, Instrument};
use tracing_subscriber::EnvFilter;

use crate::design_doc::DesignDocLink;
use crate::pr::{GitHubClient, RepoRef, TriggerContext};
use crate::report::StageOutput;
use crate::sync::{SyncMode, SyncOptions};

/// Design Doc Sync: when a pull request merges, copy the design document
/// links listed in its description into the open PRs built on the same branch.
#[derive(Parser, Debug)]
#[command(name = "design-doc-sync", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to a config file (default: .design-doc-sync.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// How links are written into target PRs
    #[arg(long, global = true, value_enum)]
    mode: Option<SyncMode>,

    /// Heading written into target PRs (default depends on --mode)
    #[arg(long, global = true)]
    section_title: Option<String>,

    /// Repository as owner/repo
    #[arg(long, global = true, env = "GITHUB_REPOSITORY")]
    repo: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(flatten)]
    Stage(StageCommand),

    /// Print the design docs listed in a description (file or stdin)
    Extract {
        file: Option<PathBuf>,
    },
}

/// Pipeline stages; each one talks to GitHub.
#[derive(Subcommand, Debug)]
enum StageCommand {
    /// Resolve the merged PR and output its design docs and base branch
    Details {
        /// PR number to use when the event payload carries none
        #[arg(long, env = "PR_NUMBER")]
        pr_number: Option<u64>,
    },
    /// Output the open PRs targeting or branching from the base branch
    FindTargets {
        #[arg(long, env = "base_branch")]
        base_branch: Option<String>,

        #[arg(long, env = "merged_pr_number")]
        merged_pr_number: Option<String>,
    },
    /// Merge design docs into the description of each target PR
    Update {
        /// JSON array of PR numbers
        #[arg(long, env = "target_pr_numbers")]
        target_pr_numbers: Option<String>,

        /// JSON array of design doc link lines
        #[arg(long, env = "design_docs")]
        design_docs: Option<String>,
    },
    /// Run details, find-targets and update in one process
    Run {
        #[arg(long, env = "PR_NUMBER")]
        pr_number: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    info!("loading configuration");
    let config = config::Config::load(cli.config.as_deref())?;
    let options = config.sync_options(cli.mode, cli.section_title);

    let result = match cli.command {
        Command::Extract { file } => extract(file.as_deref(), &options),
        Command::Stage(command) => run_stage(command, cli.repo, &config, options).await,
    };

    if let Err(e) = &result {
        error!(error = %e, "stage failed");
    }
    result
}

type StageResult = Result<(), Box<dyn std::error::Error>>;

fn extract(file: Option<&Path>, options: &SyncOptions) -> StageResult {
    let text = match file {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let links = design_doc::extract_with_title(&text, &options.source_title);
    info!(links = links.len(), "extracted design docs");
    report::print_design_docs(&links);
    Ok(())
}

async fn run_stage(
    command: StageCommand,
    repo: Option<String>,
    config: &config::Config,
    options: SyncOptions,
) -> StageResult {
    let stage = Stage::connect(repo, config, options)?;
    match command {
        StageCommand::Details { pr_number } => {
            stage
                .details(pr_number)
                .instrument(info_span!("stage", name = "details"))
                .await
        }
        StageCommand::FindTargets {
            base_branch,
            merged_pr_number,
        } => {
            stage
                .find_targets(base_branch, merged_pr_number)
                .instrument(info_span!("stage", name = "find-targets"))
                .await
        }
        StageCommand::Update {
            target_pr_numbers,
            design_docs,
        } => {
            stage
                .update(target_pr_numbers, design_docs)
                .instrument(info_span!("stage", name = "update"))
                .await
        }
        StageCommand::Run { pr_number } => stage.run(pr_number).await,
    }
}

/// Everything a pipeline stage needs to talk to GitHub and publish outputs.
struct Stage {
    repo: RepoRef,
    client: GitHubClient,
    options: SyncOptions,
    output: StageOutput,
}

impl Stage {
    fn connect(
        repo: Option<String>,
        config: &config::Config,
        options: SyncOptions,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let repo: RepoRef = sync::required_input("repository (--repo or GITHUB_REPOSITORY)", repo)?.parse()?;
        let client = GitHubClient::from_config(config)?;
        Ok(Self {
            repo,
            client,
            options,
            output: StageOutput::from_env(),
        })
    }

    async fn details(&self, pr_number: Option<u64>) -> StageResult {
        let ctx = TriggerContext::from_env(self.repo.clone(), pr_number)?;

        let details = sync::merged_pr_details(&ctx, &self.client, &self.options).await?;
        self.output.write_details(&details)?;
        Ok(())
    }

    async fn find_targets(&self, base_branch: Option<String>, merged_pr_number: Option<String>) -> StageResult {
        let base_branch = sync::required_input("base_branch", base_branch)?;
        let merged_pr_number = sync::number_input("merged_pr_number", merged_pr_number.as_deref())?;
        info!(%base_branch, ?merged_pr_number, "finding open PRs");

        let targets = sync::find_targets(&self.client, &self.repo, &base_branch, merged_pr_number).await?;
        self.output.set_json("target_pr_numbers", &targets)?;
        Ok(())
    }

    async fn update(&self, target_pr_numbers: Option<String>, design_docs: Option<String>) -> StageResult {
        let targets: Vec<u64> = sync::json_list_input("target_pr_numbers", target_pr_numbers.as_deref())?;
        let links: Vec<DesignDocLink> = sync::json_list_input("design_docs", design_docs.as_deref())?;
        info!(?targets, design_docs = links.len(), "updating PR descriptions");

        let summary = sync::merge_into(&self.client, &self.repo, &targets, &links, &self.options).await;
        self.write_summary(&summary)
    }

    async fn run(&self, pr_number: Option<u64>) -> StageResult {
        let ctx = TriggerContext::from_env(self.repo.clone(), pr_number)?;
        let pipeline = sync::run_pipeline(&ctx, &self.client, &self.options).await?;

        if let Some(details) = &pipeline.details {
            self.output.write_details(details)?;
        }
        self.output.set_json("target_pr_numbers", &pipeline.targets)?;
        self.write_summary(&pipeline.summary)
    }

    fn write_summary(&self, summary: &report::SyncSummary) -> StageResult {
        report::print_summary(summary, &self.options);
        self.output.write_summary(summary)?;
        if summary.has_errors() {
            warn!(errors = summary.error_count, "some PR descriptions could not be updated");
        }
        Ok(())
    }
}
