use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, error, info, instrument};

use crate::design_doc::{self, render_section, DesignDocLink, DEFAULT_SECTION_TITLE, RELATED_SECTION_TITLE};
use crate::pr::{PrError, RepoRef, ReviewPlatform};
use crate::report::types::{SyncSummary, TargetOutcome};

/// How links are written into a target PR that may already list some.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SyncMode {
    /// Union new links into an existing section, or append a new one
    #[default]
    MergeDedup,
    /// Leave the PR untouched when the section heading is already present
    SkipIfPresent,
}

impl SyncMode {
    pub fn default_section_title(self) -> &'static str {
        match self {
            SyncMode::MergeDedup => DEFAULT_SECTION_TITLE,
            SyncMode::SkipIfPresent => RELATED_SECTION_TITLE,
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::MergeDedup => write!(f, "merge-dedup"),
            SyncMode::SkipIfPresent => write!(f, "skip-if-present"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub mode: SyncMode,
    /// Title of the section written into target PRs
    pub section_title: String,
    /// Title of the section read from the merged PR
    pub source_title: String,
}

impl SyncOptions {
    pub fn new(mode: SyncMode, section_title: Option<String>) -> Self {
        Self {
            mode,
            section_title: section_title.unwrap_or_else(|| mode.default_section_title().to_string()),
            source_title: DEFAULT_SECTION_TITLE.to_string(),
        }
    }

    pub fn heading(&self) -> String {
        format!("## {}", self.section_title)
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::new(SyncMode::default(), None)
    }
}

/// Result of merging links into one description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyUpdate {
    /// The description needs to be rewritten with this text
    Replace(String),
    /// The description already holds every link
    Unchanged,
    /// Skip-if-present found the heading; the PR must not be touched
    Skip,
}

/// Merge `links` into `body` according to `options`.
pub fn merge_body(body: &str, links: &[DesignDocLink], options: &SyncOptions) -> BodyUpdate {
    if links.is_empty() {
        return BodyUpdate::Unchanged;
    }
    let title = options.section_title.as_str();

    let merged = match options.mode {
        SyncMode::SkipIfPresent => {
            if body.contains(&options.heading()) {
                return BodyUpdate::Skip;
            }
            append_section(body, title, &dedup(&[], links))
        }
        SyncMode::MergeDedup => match design_doc::locate_for_merge(body, title) {
            Some(section) => {
                debug!(matcher = %section.matcher, existing = section.links.len(), "merging into existing section");
                let union = dedup(&section.links, links);
                let mut out = String::with_capacity(body.len() + 256);
                out.push_str(&body[..section.span.start]);
                out.push_str(&render_section(title, &union));
                out.push_str(section.trailing_whitespace(body));
                out.push_str(&body[section.span.end..]);
                out
            }
            None => append_section(body, title, &dedup(&[], links)),
        },
    };

    if merged == body {
        BodyUpdate::Unchanged
    } else {
        BodyUpdate::Replace(merged)
    }
}

fn append_section(body: &str, title: &str, links: &[DesignDocLink]) -> String {
    format!("{}\n\n{}", body, render_section(title, links))
}

/// Existing links first, then new ones, each kept once in first-seen order.
fn dedup(existing: &[DesignDocLink], new: &[DesignDocLink]) -> Vec<DesignDocLink> {
    let mut seen = HashSet::new();
    existing
        .iter()
        .chain(new)
        .filter(|link| seen.insert(link.as_str()))
        .cloned()
        .collect()
}

/// Merge `links` into the description of every PR in `targets`, one at a
/// time and in order. A failure on one PR is logged and counted; it never
/// stops the batch.
#[instrument(skip_all, fields(repo = %repo, targets = targets.len(), links = links.len(), mode = %options.mode))]
pub async fn merge_into<C>(
    client: &C,
    repo: &RepoRef,
    targets: &[u64],
    links: &[DesignDocLink],
    options: &SyncOptions,
) -> SyncSummary
where
    C: ReviewPlatform + ?Sized,
{
    let mut summary = SyncSummary::default();
    if targets.is_empty() {
        info!("no target PRs to update");
        return summary;
    }
    if links.is_empty() {
        info!("no design docs to add");
        return summary;
    }

    for &number in targets {
        let outcome = match sync_one(client, repo, number, links, options).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(pr = number, error = %e, "failed to update PR description");
                TargetOutcome::Failed(e.to_string())
            }
        };
        summary.record(number, outcome);
    }

    info!(
        success = summary.success_count,
        errors = summary.error_count,
        skipped = summary.skipped_count,
        "PR description updates completed"
    );
    summary
}

async fn sync_one<C>(
    client: &C,
    repo: &RepoRef,
    number: u64,
    links: &[DesignDocLink],
    options: &SyncOptions,
) -> Result<TargetOutcome, PrError>
where
    C: ReviewPlatform + ?Sized,
{
    let pr = client.get_pull_request(repo, number).await?;
    match merge_body(&pr.body, links, options) {
        BodyUpdate::Replace(body) => {
            client.update_pull_request_body(repo, number, &body).await?;
            info!(pr = number, "updated PR description");
            Ok(TargetOutcome::Updated)
        }
        BodyUpdate::Unchanged => {
            info!(pr = number, "PR description already lists every design doc");
            Ok(TargetOutcome::Unchanged)
        }
        BodyUpdate::Skip => {
            info!(pr = number, heading = %options.heading(), "PR already has a design doc section, skipping");
            Ok(TargetOutcome::Skipped)
        }
    }
}
