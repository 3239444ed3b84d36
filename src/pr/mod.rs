pub mod context;
pub mod github;
pub mod types;

pub use context::{resolve_triggering_pr, ContextError, TriggerContext};
pub use github::GitHubClient;
pub use types::{PullRequest, PullRequestFilter, RepoRef};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrError {
    #[error("GitHub API request failed: {0}")]
    ApiRequest(#[from] reqwest::Error),

    #[error("GitHub API returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid repository (expected owner/repo): {0}")]
    InvalidRepository(String),

    #[error("GitHub token not found in environment")]
    MissingToken,
}

/// Operations the sync pipeline needs from the code review platform.
/// Implementations must be Send + Sync so the pipeline can hold them
/// across await points.
#[async_trait]
pub trait ReviewPlatform: Send + Sync {
    /// Fetch a single pull request.
    async fn get_pull_request(&self, repo: &RepoRef, number: u64) -> Result<PullRequest, PrError>;

    /// List every open pull request matching `filter`.
    /// Results come back newest first and must be complete (no paging left
    /// to the caller).
    async fn list_open_pull_requests(
        &self,
        repo: &RepoRef,
        filter: &PullRequestFilter,
    ) -> Result<Vec<PullRequest>, PrError>;

    /// Replace the description of a pull request.
    async fn update_pull_request_body(
        &self,
        repo: &RepoRef,
        number: u64,
        body: &str,
    ) -> Result<(), PrError>;
}
