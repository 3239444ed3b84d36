use std::collections::HashSet;
use tracing::{debug, info, instrument};

use crate::pr::{PrError, PullRequestFilter, RepoRef, ReviewPlatform};

/// Find the open PRs that should receive the merged PR's design docs:
/// those targeting `base_branch` and those opened from it. Newest first,
/// each PR once, never the merged PR itself.
#[instrument(skip(client), fields(repo = %repo))]
pub async fn find_targets<C>(
    client: &C,
    repo: &RepoRef,
    base_branch: &str,
    merged_pr_number: Option<u64>,
) -> Result<Vec<u64>, PrError>
where
    C: ReviewPlatform + ?Sized,
{
    let by_base = client
        .list_open_pull_requests(repo, &PullRequestFilter::base(base_branch))
        .await?;
    debug!(count = by_base.len(), "open PRs targeting base branch");

    let by_head = client
        .list_open_pull_requests(repo, &PullRequestFilter::head(base_branch))
        .await?;
    debug!(count = by_head.len(), "open PRs from base branch");

    let mut seen = HashSet::new();
    let targets: Vec<u64> = by_base
        .iter()
        .chain(&by_head)
        .filter(|pr| Some(pr.number) != merged_pr_number)
        .filter(|pr| seen.insert(pr.number))
        .inspect(|pr| debug!(pr = pr.number, title = %pr.title, "target PR"))
        .map(|pr| pr.number)
        .collect();

    info!(targets = targets.len(), "found target PRs");
    Ok(targets)
}
