// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! GitHub hosting API.
//!
//! Tree listings come from the REST API's recursive tree endpoint, file
//! content comes from the raw content host. Requests are issued one at a
//! time without retries; a bearer token is optional and only raises the
//! rate limit.

use crate::{
    config::Settings,
    remote::{RemoteError, RemoteHost, RepoRef, Result, TreeEntry},
};

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, ACCEPT, AUTHORIZATION, USER_AGENT},
    Client, Response, StatusCode,
};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

const DEFAULT_USER_AGENT: &str = concat!("skillsync/", env!("CARGO_PKG_VERSION"));
const GITHUB_ACCEPT_HEADER: &str = "application/vnd.github.v3+json";

/// Remote host backed by the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GithubHost {
    client: Client,
    api_url: String,
    raw_url: String,
}

impl GithubHost {
    /// Construct new GitHub host.
    ///
    /// # Errors
    ///
    /// - Return [`RemoteError::Http`] if HTTP client cannot be built.
    pub fn new(token: Option<&str>, api_url: impl Into<String>, raw_url: impl Into<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, DEFAULT_USER_AGENT.parse().map_err(invalid_header)?);
        headers.insert(ACCEPT, GITHUB_ACCEPT_HEADER.parse().map_err(invalid_header)?);

        if let Some(token) = token.map(str::trim).filter(|token| !token.is_empty()) {
            headers.insert(
                AUTHORIZATION,
                format!("Bearer {token}").parse().map_err(invalid_header)?,
            );
        }

        Ok(Self {
            client: Client::builder().default_headers(headers).build()?,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            raw_url: raw_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Construct new GitHub host from settings.
    ///
    /// # Errors
    ///
    /// - Return [`RemoteError::Http`] if HTTP client cannot be built.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(
            settings.github_token().as_deref(),
            settings.github.api_url.as_str(),
            settings.github.raw_url.as_str(),
        )
    }
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    #[serde(default)]
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[async_trait]
impl RemoteHost for GithubHost {
    #[instrument(skip(self), level = "debug")]
    async fn tree(&self, repo: &RepoRef) -> Result<Vec<TreeEntry>> {
        let url = format!(
            "{}/repos/{}/{}/git/trees/{}",
            self.api_url, repo.owner, repo.repo, repo.branch
        );
        debug!("fetch tree {url}");
        let response = self
            .client
            .get(&url)
            .query(&[("recursive", "1")])
            .send()
            .await?;

        let response = match response.status() {
            StatusCode::OK => response,
            StatusCode::NOT_FOUND => {
                return Err(RemoteError::NotFound(format!(
                    "repository {} or branch {:?}",
                    repo.key(),
                    repo.branch
                )))
            }
            StatusCode::CONFLICT => return Err(RemoteError::EmptyRepository(repo.key())),
            _ => return Err(failure(response, &repo.key()).await),
        };

        let listing: TreeResponse = response.json().await?;
        if listing.truncated {
            warn!("tree listing of {repo} was truncated by the API");
        }

        Ok(listing.tree)
    }

    #[instrument(skip(self), level = "debug")]
    async fn raw(&self, repo: &RepoRef, path: &str) -> Result<Vec<u8>> {
        let url = format!(
            "{}/{}/{}/{}/{}",
            self.raw_url, repo.owner, repo.repo, repo.branch, path
        );
        let response = self.client.get(&url).send().await?;

        match response.status() {
            StatusCode::OK => Ok(response.bytes().await?.to_vec()),
            StatusCode::NOT_FOUND => Err(RemoteError::NotFound(format!("file {path:?} in {repo}"))),
            _ => Err(failure(response, path).await),
        }
    }
}

async fn failure(response: Response, context: &str) -> RemoteError {
    let status = response.status();
    if let Some(error) = rate_limited(status, response.headers()) {
        return error;
    }

    RemoteError::Api {
        status: status.as_u16(),
        context: context.to_string(),
        message: response.text().await.unwrap_or_default(),
    }
}

/// Rate limit error if `status` and `headers` report an exhausted quota.
fn rate_limited(status: StatusCode, headers: &HeaderMap) -> Option<RemoteError> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
    };

    let exhausted = status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN && header("x-ratelimit-remaining").as_deref() == Some("0"));
    exhausted.then(|| RemoteError::RateLimited {
        reset: header("x-ratelimit-reset"),
    })
}

fn invalid_header(error: reqwest::header::InvalidHeaderValue) -> RemoteError {
    RemoteError::Api {
        status: 0,
        context: "request headers".into(),
        message: error.to_string(),
    }
}
