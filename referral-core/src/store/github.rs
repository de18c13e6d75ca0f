//! Documents as files in a GitHub repository, through the contents API.
//!
//! Every write is a commit. Reads try the configured branch, then `main`,
//! then `master`, so a repository renamed between the two still loads.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::{BlobStore, StoreError, WriteReport};

const READ_TIMEOUT: Duration = Duration::from_secs(15);
const WRITE_TIMEOUT: Duration = Duration::from_secs(20);

/// Connection settings for [`GithubBlobStore`].
#[derive(Debug, Clone)]
pub struct GithubConfig {
    pub token: String,
    /// `owner/name`
    pub repo: String,
    pub branch: String,
    /// Overridable for tests
    pub api_base: String,
}

impl GithubConfig {
    pub fn new(token: impl Into<String>, repo: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            repo: repo.into(),
            branch: branch.into(),
            api_base: "https://api.github.com".to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

pub struct GithubBlobStore {
    client: Client,
    config: GithubConfig,
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    sha: Option<String>,
}

#[derive(Debug, Serialize)]
struct PutRequest<'a> {
    message: String,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
}

impl GithubBlobStore {
    pub fn new(config: GithubConfig) -> Result<Self, StoreError> {
        if config.token.is_empty() || config.repo.is_empty() {
            return Err(StoreError::NotConfigured(
                "GitHub token and repository are required".to_string(),
            ));
        }

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(concat!("referral-core/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StoreError::Remote(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn contents_url(&self, key: &str) -> String {
        format!(
            "{}/repos/{}/contents/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.repo,
            key
        )
    }

    fn auth_header(&self) -> String {
        format!("token {}", self.config.token)
    }

    fn branches(&self) -> Vec<&str> {
        let mut branches = vec![self.config.branch.as_str()];
        for fallback in ["main", "master"] {
            if !branches.contains(&fallback) {
                branches.push(fallback);
            }
        }
        branches.retain(|b| !b.is_empty());
        branches
    }

    async fn get_contents(&self, key: &str, branch: &str) -> Result<Option<ContentsResponse>, StoreError> {
        let response = self
            .client
            .get(self.contents_url(key))
            .query(&[("ref", branch)])
            .header(header::AUTHORIZATION, self.auth_header())
            .timeout(READ_TIMEOUT)
            .send()
            .await
            .map_err(map_request_error)?;

        match response.status() {
            StatusCode::OK => {
                let body = response
                    .json::<ContentsResponse>()
                    .await
                    .map_err(|e| StoreError::Remote(format!("Invalid contents response: {}", e)))?;
                Ok(Some(body))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(StoreError::Remote(format!(
                "GitHub returned {} for {}@{}",
                status, key, branch
            ))),
        }
    }
}

fn map_request_error(e: reqwest::Error) -> StoreError {
    if e.is_timeout() {
        StoreError::Timeout(e.to_string())
    } else {
        StoreError::Remote(e.to_string())
    }
}

/// The contents API wraps base64 at 60 columns.
fn decode_content(encoded: &str) -> Result<Vec<u8>, StoreError> {
    let compact: String = encoded.split_whitespace().collect();
    BASE64
        .decode(compact)
        .map_err(|e| StoreError::Remote(format!("Invalid base64 content: {}", e)))
}

#[async_trait]
impl BlobStore for GithubBlobStore {
    fn id(&self) -> &str {
        "github"
    }

    async fn read_blob(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut last_error = None;

        for branch in self.branches() {
            match self.get_contents(key, branch).await {
                Ok(Some(ContentsResponse {
                    content: Some(content),
                    ..
                })) if !content.is_empty() => return decode_content(&content).map(Some),
                Ok(_) => debug!(key = %key, branch = %branch, "No content on branch"),
                Err(e) => {
                    debug!(key = %key, branch = %branch, error = %e, "GitHub read failed");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }

    async fn write_blob(&self, key: &str, bytes: &[u8]) -> Result<WriteReport, StoreError> {
        let branch = self.config.branch.as_str();
        let sha = self
            .get_contents(key, branch)
            .await?
            .and_then(|existing| existing.sha);

        let body = PutRequest {
            message: format!("Auto-update {}", key),
            content: BASE64.encode(bytes),
            branch,
            sha,
        };

        let response = self
            .client
            .put(self.contents_url(key))
            .header(header::AUTHORIZATION, self.auth_header())
            .json(&body)
            .timeout(WRITE_TIMEOUT)
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(StoreError::Remote(format!("GitHub API error {}: {}", status, text)));
        }

        info!(key = %key, repo = %self.config.repo, branch = %branch, "Pushed document");
        Ok(WriteReport::local())
    }
}
