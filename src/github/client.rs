use async_trait::async_trait;
use reqwest::header::{HeaderMap, LINK};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::engine::Permissions;
use crate::error::PulseError;
use crate::github::types::*;

/// Where poll snapshots come from.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_snapshot(&self) -> Result<FetchedSnapshot, PulseError>;

    /// Login of the token owner, if it can be resolved.
    async fn current_user_login(&self) -> Result<Option<String>, PulseError>;
}

/// Outcome of reading a per-PR sub-resource.
enum Probe<T> {
    Granted(T),
    /// 403/404: the token lacks the scope.
    Denied,
}

const USER_AGENT: &str = concat!("pr-pulse/", env!("CARGO_PKG_VERSION"));
const SEARCH_PAGE_SIZE: &str = "50";
const ACTIVITY_PAGE_SIZE: &str = "100";
/// Upper bound on pages followed for one comment or review list.
const MAX_ACTIVITY_PAGES: usize = 100;

pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

impl GitHubClient {
    pub fn new(api_url: &str, token: &str, timeout: Duration) -> Result<Self, PulseError> {
        if token.trim().is_empty() {
            return Err(PulseError::CredentialError("GitHub token is empty".to_string()));
        }

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| PulseError::ConfigError(format!("Failed to create GitHub client: {}", e)))?;

        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.trim().to_string(),
        })
    }

    async fn send(&self, path: &str, query: &[(&str, &str)]) -> Result<reqwest::Response, PulseError> {
        let url = format!("{}{}", self.api_url, path);
        self.send_url(&url, query).await
    }

    async fn send_url(&self, url: &str, query: &[(&str, &str)]) -> Result<reqwest::Response, PulseError> {
        debug!("GET {}", url);
        let response = self
            .http
            .get(url)
            .query(query)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .send()
            .await?;
        Ok(response)
    }

    /// Top-level request: any non-success status fails the whole fetch.
    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, PulseError> {
        let response = self.send(path, query).await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(PulseError::FetchError(
                "GitHub rejected the token (401 Unauthorized)".to_string(),
            ));
        }
        if !status.is_success() {
            return Err(PulseError::FetchError(format!("GET {} returned {}", path, status)));
        }
        Ok(response.json::<T>().await?)
    }

    /// Sub-resource request: 403/404 mean "not permitted" rather than failure.
    async fn probe_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Probe<T>, PulseError> {
        let response = self.send(path, query).await?;
        Self::read_probe(path, response).await
    }

    async fn read_probe<T: DeserializeOwned>(
        path: &str,
        response: reqwest::Response,
    ) -> Result<Probe<T>, PulseError> {
        let status = response.status();
        match status {
            StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                debug!("GET {} denied with {}", path, status);
                Ok(Probe::Denied)
            }
            StatusCode::UNAUTHORIZED => Err(PulseError::FetchError(
                "GitHub rejected the token (401 Unauthorized)".to_string(),
            )),
            s if s.is_success() => Ok(Probe::Granted(response.json::<T>().await?)),
            s => Err(PulseError::FetchError(format!("GET {} returned {}", path, s))),
        }
    }

    /// Sub-resource list, following `Link: rel="next"` to the end. GitHub
    /// lists comments and reviews oldest first, so the newest activity is
    /// on the last page.
    async fn probe_list<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Probe<Vec<T>>, PulseError> {
        let response = self.send(path, query).await?;
        let mut next = next_page(response.headers());
        let mut items = match Self::read_probe::<Vec<T>>(path, response).await? {
            Probe::Granted(items) => items,
            Probe::Denied => return Ok(Probe::Denied),
        };

        let mut pages = 1;
        while let Some(url) = next.take() {
            // The bearer token is only ever sent to the configured API host.
            if !url.starts_with(&format!("{}/", self.api_url)) {
                warn!("Not following pagination link outside {}: {}", self.api_url, url);
                break;
            }
            if pages >= MAX_ACTIVITY_PAGES {
                warn!("{} has more than {} pages, newest activity may be missed", path, pages);
                break;
            }

            let response = self.send_url(&url, &[]).await?;
            let status = response.status();
            if !status.is_success() {
                return Err(PulseError::FetchError(format!("GET {} returned {}", url, status)));
            }
            next = next_page(response.headers());
            items.extend(response.json::<Vec<T>>().await?);
            pages += 1;
        }

        Ok(Probe::Granted(items))
    }

    async fn search_open_pull_requests(&self, login: &str) -> Result<Vec<SearchItem>, PulseError> {
        let q = format!("is:pr is:open author:{} archived:false", login);
        let results: SearchResults = self
            .get_json("/search/issues", &[("q", q.as_str()), ("per_page", SEARCH_PAGE_SIZE)])
            .await?;
        Ok(results.items)
    }

    async fn fetch_pull_request(
        &self,
        item: &SearchItem,
        repo_full_name: String,
        permissions: &mut Permissions,
    ) -> Result<PullRequestSnapshot, PulseError> {
        let number = item.number;
        let mut pr = PullRequestSnapshot::new(repo_full_name, number);
        pr.title = item.title.clone();
        pr.html_url = item.html_url.clone();
        pr.draft = item.draft;

        let repo = pr.repo_full_name.clone();

        match self
            .probe_json::<PullDetails>(&format!("/repos/{}/pulls/{}", repo, number), &[])
            .await?
        {
            Probe::Granted(details) => {
                pr.draft = details.draft;
                pr.mergeable_state = details.mergeable_state;
                match self
                    .probe_json::<CombinedStatus>(
                        &format!("/repos/{}/commits/{}/status", repo, details.head.sha),
                        &[],
                    )
                    .await?
                {
                    Probe::Granted(status) => pr.ci_state = Some(status.state),
                    Probe::Denied => permissions.can_read_commit_statuses = false,
                }
            }
            Probe::Denied => permissions.can_read_pull_requests = false,
        }

        match self
            .probe_list::<IssueComment>(
                &format!("/repos/{}/issues/{}/comments", repo, number),
                &[("per_page", ACTIVITY_PAGE_SIZE)],
            )
            .await?
        {
            Probe::Granted(comments) => {
                pr.recent_comments = comments.into_iter().map(Comment::from).collect();
            }
            Probe::Denied => permissions.can_read_comments = false,
        }

        match self
            .probe_list::<PullReview>(
                &format!("/repos/{}/pulls/{}/reviews", repo, number),
                &[("per_page", ACTIVITY_PAGE_SIZE)],
            )
            .await?
        {
            Probe::Granted(reviews) => {
                pr.recent_reviews = reviews.into_iter().filter_map(PullReview::into_review).collect();
            }
            Probe::Denied => permissions.can_read_reviews = false,
        }

        Ok(pr)
    }
}

#[async_trait]
impl SnapshotSource for GitHubClient {
    async fn fetch_snapshot(&self) -> Result<FetchedSnapshot, PulseError> {
        let user: User = self.get_json("/user", &[]).await?;
        let items = self.search_open_pull_requests(&user.login).await?;

        let mut permissions = Permissions::default();
        let mut pull_requests = Vec::with_capacity(items.len());
        for item in &items {
            let Some(repo_full_name) = item.repo_full_name() else {
                warn!("Skipping search result with unexpected repository URL {}", item.repository_url);
                continue;
            };
            pull_requests.push(self.fetch_pull_request(item, repo_full_name, &mut permissions).await?);
        }

        if !permissions.has_all() {
            warn!("Token is missing permissions: {}", permissions.missing().join(", "));
        }
        info!("Fetched {} open pull requests for {}", pull_requests.len(), user.login);

        Ok(FetchedSnapshot {
            pull_requests,
            permissions,
            viewer_login: Some(user.login),
        })
    }

    async fn current_user_login(&self) -> Result<Option<String>, PulseError> {
        let user: User = self.get_json("/user", &[]).await?;
        Ok(Some(user.login).filter(|login| !login.is_empty()))
    }
}

/// Target of the `rel="next"` entry of a `Link` header.
fn next_page(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',').find_map(|entry| {
        let (target, params) = entry.split_once(';')?;
        let is_next = params.split(';').any(|param| param.trim() == "rel=\"next\"");
        is_next.then(|| {
            target
                .trim()
                .trim_start_matches('<')
                .trim_end_matches('>')
                .to_string()
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn link(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(LINK, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_next_page_is_read_from_link_header() {
        let headers = link(
            "<https://api.github.com/repositories/1/issues/5/comments?per_page=100&page=2>; rel=\"next\", \
             <https://api.github.com/repositories/1/issues/5/comments?per_page=100&page=3>; rel=\"last\"",
        );
        assert_eq!(
            next_page(&headers).as_deref(),
            Some("https://api.github.com/repositories/1/issues/5/comments?per_page=100&page=2")
        );
    }

    #[test]
    fn test_last_page_has_no_next() {
        let headers = link(
            "<https://api.github.com/repositories/1/issues/5/comments?per_page=100&page=1>; rel=\"prev\", \
             <https://api.github.com/repositories/1/issues/5/comments?per_page=100&page=1>; rel=\"first\"",
        );
        assert_eq!(next_page(&headers), None);
        assert_eq!(next_page(&HeaderMap::new()), None);
    }
}
