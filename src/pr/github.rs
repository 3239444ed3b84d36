use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use tracing::{debug, instrument};

use super::types::{PullRequest, PullRequestFilter, PullRequestPayload, RepoRef};
use super::{PrError, ReviewPlatform};
use crate::config::Config;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

const USER_AGENT: &str = "design-doc-sync";
const PER_PAGE: usize = 100;

/// [`ReviewPlatform`] backed by the GitHub REST API.
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

impl GitHubClient {
    pub fn new(token: String, api_url: &str) -> Result<Self, PrError> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Build a client from the resolved token and API URL.
    pub fn from_config(config: &Config) -> Result<Self, PrError> {
        let token = config.github_token().ok_or(PrError::MissingToken)?;
        Self::new(token, &config.api_url())
    }

    fn pulls_url(&self, repo: &RepoRef) -> String {
        format!("{}/repos/{}/{}/pulls", self.api_url, repo.owner, repo.repo)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }
}

/// Turn a non-2xx response into [`PrError::Status`], keeping the body as
/// the message.
async fn check_status(response: Response) -> Result<Response, PrError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(PrError::Status {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl ReviewPlatform for GitHubClient {
    #[instrument(skip(self), fields(repo = %repo, pr = number))]
    async fn get_pull_request(&self, repo: &RepoRef, number: u64) -> Result<PullRequest, PrError> {
        let url = format!("{}/{}", self.pulls_url(repo), number);
        debug!("fetching pull request");
        let response = check_status(self.request(Method::GET, &url).send().await?).await?;
        let payload = response.json::<PullRequestPayload>().await?;
        debug!(base = %payload.base.name, head = %payload.head.name, "received pull request");
        Ok(payload.into())
    }

    #[instrument(skip(self), fields(repo = %repo))]
    async fn list_open_pull_requests(
        &self,
        repo: &RepoRef,
        filter: &PullRequestFilter,
    ) -> Result<Vec<PullRequest>, PrError> {
        let url = self.pulls_url(repo);
        let mut query: Vec<(&str, String)> = vec![
            ("state", "open".to_string()),
            ("sort", "created".to_string()),
            ("direction", "desc".to_string()),
            ("per_page", PER_PAGE.to_string()),
        ];
        if let Some(base) = &filter.base {
            query.push(("base", base.clone()));
        }
        if let Some(head) = &filter.head {
            query.push(("head", format!("{}:{}", repo.owner, head)));
        }

        let mut pulls = Vec::new();
        for page in 1.. {
            let response = check_status(
                self.request(Method::GET, &url)
                    .query(&query)
                    .query(&[("page", page)])
                    .send()
                    .await?,
            )
            .await?;
            let batch = response.json::<Vec<PullRequestPayload>>().await?;
            let fetched = batch.len();
            debug!(page, fetched, "received page of pull requests");
            pulls.extend(batch.into_iter().map(PullRequest::from));
            if fetched < PER_PAGE {
                break;
            }
        }
        Ok(pulls)
    }

    #[instrument(skip(self, body), fields(repo = %repo, pr = number, body_bytes = body.len()))]
    async fn update_pull_request_body(
        &self,
        repo: &RepoRef,
        number: u64,
        body: &str,
    ) -> Result<(), PrError> {
        let url = format!("{}/{}", self.pulls_url(repo), number);
        debug!("updating pull request body");
        check_status(
            self.request(Method::PATCH, &url)
                .json(&serde_json::json!({ "body": body }))
                .send()
                .await?,
        )
        .await?;
        Ok(())
    }
}
