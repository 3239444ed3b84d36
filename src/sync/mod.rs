pub mod merge;
pub mod targets;

pub use merge::{merge_into, SyncMode, SyncOptions};
pub use targets::find_targets;

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{info, info_span, Instrument};

use crate::design_doc::{extract_with_title, DesignDocLink};
use crate::pr::{resolve_triggering_pr, ContextError, PrError, ReviewPlatform, TriggerContext};
use crate::report::SyncSummary;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{0} is required")]
    MissingInput(&'static str),

    #[error("Invalid {name}: {reason}")]
    InvalidInput { name: &'static str, reason: String },

    #[error(transparent)]
    Platform(#[from] PrError),

    #[error(transparent)]
    Context(#[from] ContextError),
}

/// What the details stage learns about the triggering PR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedPrDetails {
    pub merged_pr_number: u64,
    pub base_branch: String,
    /// Empty when the PR was closed without merging
    pub design_docs: Vec<DesignDocLink>,
    pub merged: bool,
}

/// Resolve the triggering PR and extract its design docs.
/// A PR closed without merging still reports its number and base branch,
/// with no design docs.
pub async fn merged_pr_details<C>(
    ctx: &TriggerContext,
    client: &C,
    options: &SyncOptions,
) -> Result<MergedPrDetails, SyncError>
where
    C: ReviewPlatform + ?Sized,
{
    let pr = resolve_triggering_pr(ctx, client).await?;
    if !pr.merged {
        info!(pr = pr.number, "pull request was not merged, nothing to propagate");
        return Ok(MergedPrDetails {
            merged_pr_number: pr.number,
            base_branch: pr.base_branch,
            design_docs: Vec::new(),
            merged: false,
        });
    }

    let design_docs = extract_with_title(&pr.body, &options.source_title);
    info!(
        pr = pr.number,
        base_branch = %pr.base_branch,
        head_branch = %pr.head_branch,
        design_docs = design_docs.len(),
        "extracted design docs from merged PR"
    );
    Ok(MergedPrDetails {
        merged_pr_number: pr.number,
        base_branch: pr.base_branch,
        design_docs,
        merged: true,
    })
}

/// Everything one full pipeline run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub details: Option<MergedPrDetails>,
    pub targets: Vec<u64>,
    pub summary: SyncSummary,
}

/// Run details, target discovery and the merge in one go.
pub async fn run_pipeline<C>(
    ctx: &TriggerContext,
    client: &C,
    options: &SyncOptions,
) -> Result<PipelineReport, SyncError>
where
    C: ReviewPlatform + ?Sized,
{
    let mut report = PipelineReport::default();

    let details = merged_pr_details(ctx, client, options)
        .instrument(info_span!("stage", name = "details"))
        .await?;

    if details.design_docs.is_empty() {
        if details.merged {
            info!("merged PR lists no design docs");
        }
        report.details = Some(details);
        return Ok(report);
    }

    report.targets = find_targets(
        client,
        &ctx.repo,
        &details.base_branch,
        Some(details.merged_pr_number),
    )
    .instrument(info_span!("stage", name = "find-targets"))
    .await?;

    report.summary = merge_into(client, &ctx.repo, &report.targets, &details.design_docs, options)
        .instrument(info_span!("stage", name = "update"))
        .await;
    report.details = Some(details);
    Ok(report)
}

/// A required text input; blank counts as missing.
pub fn required_input(name: &'static str, value: Option<String>) -> Result<String, SyncError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(SyncError::MissingInput(name))
}

/// An optional PR number input; blank counts as absent.
pub fn number_input(name: &'static str, value: Option<&str>) -> Result<Option<u64>, SyncError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e: std::num::ParseIntError| SyncError::InvalidInput {
                name,
                reason: e.to_string(),
            }),
        None => Ok(None),
    }
}

/// A JSON array input passed between stages; blank counts as `[]`.
pub fn json_list_input<T: DeserializeOwned>(name: &'static str, value: Option<&str>) -> Result<Vec<T>, SyncError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(raw) => serde_json::from_str(raw).map_err(|e| SyncError::InvalidInput {
            name,
            reason: e.to_string(),
        }),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pr::testing::{test_pull_request, FakePlatform};
    use crate::pr::PullRequest;

    const DOC_AUTH: &str = "* [認証設計](https://docs.google.com/spreadsheets/d/1AbCdEf/edit#gid=0)";
    const DOC_API: &str = "* [API 仕様](https://docs.google.com/spreadsheets/d/2GhIjKl/edit)";

    fn fixture_context() -> TriggerContext {
        TriggerContext {
            repo: "org/app".parse().unwrap(),
            event: serde_json::from_str(include_str!("../../tests/fixtures/pull_request_closed.json")).unwrap(),
            pr_number: None,
        }
    }

    fn open_pr(number: u64, base: &str, head: &str, body: &str) -> PullRequest {
        PullRequest {
            base_branch: base.to_string(),
            head_branch: head.to_string(),
            ..test_pull_request(number, body)
        }
    }

    #[tokio::test]
    async fn test_merged_pr_details_from_event() {
        let client = FakePlatform::default();
        let details = merged_pr_details(&fixture_context(), &client, &SyncOptions::default())
            .await
            .unwrap();

        assert!(details.merged);
        assert_eq!(details.merged_pr_number, 42);
        assert_eq!(details.base_branch, "develop");
        let docs: Vec<&str> = details.design_docs.iter().map(DesignDocLink::as_str).collect();
        assert_eq!(docs, vec![DOC_AUTH, DOC_API]);
    }

    #[tokio::test]
    async fn test_unmerged_pr_keeps_number_and_base_branch() {
        let body = "## 設計書一覧\n\n* [A](https://docs.google.com/spreadsheets/d/aaa)\n";
        let client = FakePlatform::new(vec![
            test_pull_request(8, body),
            open_pr(9, "main", "feature/9", ""),
        ]);
        let ctx = TriggerContext {
            repo: "org/app".parse().unwrap(),
            event: serde_json::Value::Null,
            pr_number: Some(8),
        };
        let expected = MergedPrDetails {
            merged_pr_number: 8,
            base_branch: "main".to_string(),
            design_docs: Vec::new(),
            merged: false,
        };
        assert_eq!(
            merged_pr_details(&ctx, &client, &SyncOptions::default()).await.unwrap(),
            expected
        );

        let report = run_pipeline(&ctx, &client, &SyncOptions::default()).await.unwrap();
        assert_eq!(report.details, Some(expected));
        assert!(report.targets.is_empty());
        assert!(client.updates().is_empty());
    }

    #[tokio::test]
    async fn test_unresolvable_context_is_fatal() {
        let client = FakePlatform::default();
        let ctx = TriggerContext {
            repo: "org/app".parse().unwrap(),
            event: serde_json::Value::Null,
            pr_number: None,
        };
        assert!(matches!(
            run_pipeline(&ctx, &client, &SyncOptions::default()).await,
            Err(SyncError::Context(ContextError::Unavailable))
        ));
    }

    #[tokio::test]
    async fn test_run_pipeline_end_to_end() {
        let existing = format!("作業中\n\n## 設計書一覧\n\n{}\n", DOC_API);
        let client = FakePlatform::new(vec![
            open_pr(10, "develop", "feature/a", "説明"),
            open_pr(11, "main", "develop", &existing),
            open_pr(12, "main", "feature/b", "unrelated"),
        ]);

        let report = run_pipeline(&fixture_context(), &client, &SyncOptions::default())
            .await
            .unwrap();

        assert_eq!(report.targets, vec![10, 11]);
        assert_eq!(report.summary.success_count, 2);
        assert_eq!(report.summary.error_count, 0);
        assert_eq!(
            client.body(10).unwrap(),
            format!("説明\n\n## 設計書一覧\n\n{}\n{}", DOC_AUTH, DOC_API)
        );
        assert_eq!(
            client.body(11).unwrap(),
            format!("作業中\n\n## 設計書一覧\n\n{}\n{}\n", DOC_API, DOC_AUTH)
        );
        assert_eq!(client.body(12).unwrap(), "unrelated");
    }

    #[tokio::test]
    async fn test_run_pipeline_without_design_docs_skips_discovery() {
        let mut merged = open_pr(20, "develop", "feature/z", "no docs here");
        merged.merged = true;
        let client = FakePlatform::new(vec![merged, open_pr(21, "develop", "feature/y", "")]);
        let ctx = TriggerContext {
            repo: "org/app".parse().unwrap(),
            event: serde_json::json!({"number": 20}),
            pr_number: None,
        };

        let report = run_pipeline(&ctx, &client, &SyncOptions::default()).await.unwrap();
        assert!(report.details.unwrap().design_docs.is_empty());
        assert!(report.targets.is_empty());
        assert!(client.updates().is_empty());
    }

    #[test]
    fn test_required_input() {
        assert_eq!(required_input("base_branch", Some(" develop ".to_string())).unwrap(), "develop");
        assert!(matches!(
            required_input("base_branch", Some("  ".to_string())),
            Err(SyncError::MissingInput("base_branch"))
        ));
        assert!(required_input("base_branch", None).is_err());
    }

    #[test]
    fn test_number_input() {
        assert_eq!(number_input("merged_pr_number", Some("42")).unwrap(), Some(42));
        assert_eq!(number_input("merged_pr_number", Some("")).unwrap(), None);
        assert!(matches!(
            number_input("merged_pr_number", Some("abc")),
            Err(SyncError::InvalidInput { name: "merged_pr_number", .. })
        ));
    }

    #[test]
    fn test_json_list_input() {
        let numbers: Vec<u64> = json_list_input("target_pr_numbers", Some("[3, 1]")).unwrap();
        assert_eq!(numbers, vec![3, 1]);
        let empty: Vec<u64> = json_list_input("target_pr_numbers", None).unwrap();
        assert!(empty.is_empty());

        let docs: Vec<DesignDocLink> =
            json_list_input("design_docs", Some(&serde_json::to_string(&[DOC_AUTH]).unwrap())).unwrap();
        assert_eq!(docs, vec![DesignDocLink::new(DOC_AUTH)]);

        assert!(json_list_input::<u64>("target_pr_numbers", Some("[1,")).is_err());
    }
}
