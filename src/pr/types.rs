use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use super::PrError;

/// A pull request as seen by the sync pipeline.
/// Note: not Deserialize itself; built from [`PullRequestPayload`], which
/// mirrors both the REST API response and the webhook event payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    /// PR number (e.g., 42)
    pub number: u64,
    /// PR title
    pub title: String,
    /// Description; an absent body is stored as an empty string
    pub body: String,
    /// Branch the PR targets
    pub base_branch: String,
    /// Branch carrying the changes
    pub head_branch: String,
    /// Whether the PR has been merged
    pub merged: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BranchRef {
    #[serde(rename = "ref")]
    pub name: String,
}

/// Wire shape of a pull request object, shared by `GET /pulls/{n}`,
/// `GET /pulls` and the `pull_request` field of event payloads.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PullRequestPayload {
    pub number: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub base: BranchRef,
    pub head: BranchRef,
    /// Only present on single-PR responses and events
    #[serde(default)]
    pub merged: Option<bool>,
    #[serde(default)]
    pub merged_at: Option<String>,
}

impl From<PullRequestPayload> for PullRequest {
    fn from(payload: PullRequestPayload) -> Self {
        PullRequest {
            number: payload.number,
            title: payload.title,
            body: payload.body.unwrap_or_default(),
            base_branch: payload.base.name,
            head_branch: payload.head.name,
            merged: payload.merged.unwrap_or(false) || payload.merged_at.is_some(),
        }
    }
}

/// Repository coordinates, parsed from `owner/repo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl FromStr for RepoRef {
    type Err = PrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (owner, repo) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| PrError::InvalidRepository(s.to_string()))?;
        if owner.is_empty() || repo.is_empty() || repo.contains('/') {
            return Err(PrError::InvalidRepository(s.to_string()));
        }
        Ok(RepoRef {
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Filter for listing open pull requests. Branch names are plain; the
/// client qualifies `head` with the repository owner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullRequestFilter {
    pub base: Option<String>,
    pub head: Option<String>,
}

impl PullRequestFilter {
    pub fn base(branch: &str) -> Self {
        Self {
            base: Some(branch.to_string()),
            head: None,
        }
    }

    pub fn head(branch: &str) -> Self {
        Self {
            base: None,
            head: Some(branch.to_string()),
        }
    }
}
