use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::types::{PullRequest, PullRequestPayload, RepoRef};
use super::{PrError, ReviewPlatform};

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Failed to read event payload: {0}")]
    EventRead(#[from] std::io::Error),

    #[error("Failed to parse event payload: {0}")]
    EventParse(#[from] serde_json::Error),

    #[error(transparent)]
    Platform(#[from] PrError),

    #[error("Could not determine the triggering pull request from the CI context")]
    Unavailable,
}

/// What the CI run knows about the event that triggered it.
#[derive(Debug, Clone)]
pub struct TriggerContext {
    pub repo: RepoRef,
    /// Raw event payload, `Value::Null` when none was provided
    pub event: Value,
    /// PR number given explicitly on the command line or in `PR_NUMBER`
    pub pr_number: Option<u64>,
}

impl TriggerContext {
    /// Build the context for `repo`, reading the event payload from
    /// `GITHUB_EVENT_PATH` when the variable is set.
    pub fn from_env(repo: RepoRef, pr_number: Option<u64>) -> Result<Self, ContextError> {
        let event = match std::env::var("GITHUB_EVENT_PATH") {
            Ok(path) => Self::load_event(Path::new(&path))?,
            Err(_) => {
                debug!("GITHUB_EVENT_PATH not set, continuing without event payload");
                Value::Null
            }
        };

        Ok(Self {
            repo,
            event,
            pr_number,
        })
    }

    pub fn load_event(path: &Path) -> Result<Value, ContextError> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

/// Places the triggering PR can come from, in lookup order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrSource {
    /// `pull_request` object embedded in the event payload
    EventPullRequest,
    /// PR number supplied explicitly, fetched from the API
    ExplicitNumber,
    /// Issue number from the event payload, fetched from the API
    EventIssueNumber,
}

pub const PR_SOURCES: [PrSource; 3] = [
    PrSource::EventPullRequest,
    PrSource::ExplicitNumber,
    PrSource::EventIssueNumber,
];

impl fmt::Display for PrSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrSource::EventPullRequest => write!(f, "event pull_request"),
            PrSource::ExplicitNumber => write!(f, "explicit PR number"),
            PrSource::EventIssueNumber => write!(f, "event issue number"),
        }
    }
}

impl PrSource {
    /// `Ok(None)` when this source has nothing to offer for the context.
    pub async fn lookup<C>(self, ctx: &TriggerContext, client: &C) -> Result<Option<PullRequest>, ContextError>
    where
        C: ReviewPlatform + ?Sized,
    {
        match self {
            PrSource::EventPullRequest => match ctx.event.get("pull_request") {
                Some(pr) if !pr.is_null() => {
                    let payload: PullRequestPayload = serde_json::from_value(pr.clone())?;
                    Ok(Some(payload.into()))
                }
                _ => Ok(None),
            },
            PrSource::ExplicitNumber => match ctx.pr_number {
                Some(number) => Ok(Some(client.get_pull_request(&ctx.repo, number).await?)),
                None => Ok(None),
            },
            PrSource::EventIssueNumber => {
                let number = ctx
                    .event
                    .pointer("/issue/number")
                    .and_then(Value::as_u64)
                    .or_else(|| ctx.event.get("number").and_then(Value::as_u64));
                match number {
                    Some(number) => Ok(Some(client.get_pull_request(&ctx.repo, number).await?)),
                    None => Ok(None),
                }
            }
        }
    }
}

/// Resolve the PR that triggered this run, trying each [`PrSource`] in
/// order and returning the first one found. A failing source is logged
/// and skipped.
pub async fn resolve_triggering_pr<C>(ctx: &TriggerContext, client: &C) -> Result<PullRequest, ContextError>
where
    C: ReviewPlatform + ?Sized,
{
    for source in PR_SOURCES {
        match source.lookup(ctx, client).await {
            Ok(Some(pr)) => {
                info!(%source, pr = pr.number, "resolved triggering pull request");
                return Ok(pr);
            }
            Ok(None) => debug!(%source, "source not available"),
            Err(e) => warn!(%source, error = %e, "pull request lookup failed, trying next source"),
        }
    }
    Err(ContextError::Unavailable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pr::testing::{test_pull_request, FakePlatform};
    use std::io::Write;

    fn context(event: Value, pr_number: Option<u64>) -> TriggerContext {
        TriggerContext {
            repo: "org/app".parse().unwrap(),
            event,
            pr_number,
        }
    }

    fn fixture_event() -> Value {
        serde_json::from_str(include_str!("../../tests/fixtures/pull_request_closed.json")).unwrap()
    }

    #[tokio::test]
    async fn test_event_pull_request_wins() {
        let client = FakePlatform::new(vec![test_pull_request(99, "from api")]);
        let ctx = context(fixture_event(), Some(99));

        let pr = resolve_triggering_pr(&ctx, &client).await.unwrap();
        assert_eq!(pr.number, 42);
        assert!(pr.merged);
        assert_eq!(pr.base_branch, "develop");
        assert!(pr.body.contains("設計書一覧"));
    }

    #[tokio::test]
    async fn test_explicit_number_before_issue_number() {
        let client = FakePlatform::new(vec![
            test_pull_request(5, "explicit"),
            test_pull_request(6, "issue"),
        ]);
        let ctx = context(serde_json::json!({"issue": {"number": 6}}), Some(5));

        let pr = resolve_triggering_pr(&ctx, &client).await.unwrap();
        assert_eq!(pr.number, 5);
    }

    #[tokio::test]
    async fn test_falls_back_to_issue_number() {
        let client = FakePlatform::new(vec![test_pull_request(6, "issue")]);
        let ctx = context(serde_json::json!({"issue": {"number": 6}}), None);
        assert_eq!(resolve_triggering_pr(&ctx, &client).await.unwrap().number, 6);

        let ctx = context(serde_json::json!({"number": 6, "action": "closed"}), None);
        assert_eq!(resolve_triggering_pr(&ctx, &client).await.unwrap().number, 6);
    }

    #[tokio::test]
    async fn test_failing_source_is_skipped() {
        // Explicit number 404s, issue number resolves.
        let client = FakePlatform::new(vec![test_pull_request(6, "issue")]);
        let ctx = context(serde_json::json!({"issue": {"number": 6}}), Some(404));
        assert_eq!(resolve_triggering_pr(&ctx, &client).await.unwrap().number, 6);
    }

    #[tokio::test]
    async fn test_unavailable_when_nothing_resolves() {
        let client = FakePlatform::default();
        let ctx = context(Value::Null, None);
        assert!(matches!(
            resolve_triggering_pr(&ctx, &client).await,
            Err(ContextError::Unavailable)
        ));

        let ctx = context(serde_json::json!({"pull_request": null}), Some(1));
        assert!(matches!(
            resolve_triggering_pr(&ctx, &client).await,
            Err(ContextError::Unavailable)
        ));
    }

    #[test]
    fn test_load_event_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"number": 3}}"#).unwrap();
        let event = TriggerContext::load_event(file.path()).unwrap();
        assert_eq!(event["number"], 3);

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        write!(bad, "not json").unwrap();
        assert!(matches!(
            TriggerContext::load_event(bad.path()),
            Err(ContextError::EventParse(_))
        ));
    }
}
