//! Code-search API client
//!
//! Translates "find a named file in repository R" into zero or more
//! completed API calls: paginates the result set, keeps the shared rate
//! budget fed from response headers, backs off on secondary rate limits,
//! and classifies missing repositories as deleted or renamed via the
//! metadata endpoint.

use crate::config::Config;
use crate::repo::RepoRef;
use crate::search::budget::{
    SharedBudget, AUTHENTICATED_SEARCHES_PER_MINUTE, UNAUTHENTICATED_SEARCHES_PER_MINUTE,
};
use crate::search::Backoff;
use crate::storage::SearchHit;
use crate::SiftError;
use reqwest::{header::HeaderMap, redirect::Policy, Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::{Duration, SystemTime};
use url::Url;

/// Result of a completed search call for one repository.
#[derive(Debug)]
pub enum SearchOutcome {
    /// The full paginated result set was retrieved; may be empty.
    Found { hits: Vec<SearchHit> },

    /// The platform authoritatively reports the repository gone.
    NotFound,

    /// The repository has moved; the crawl must be retried against
    /// `target`.
    Renamed { target: RepoRef },

    /// The call failed for a retryable reason (timeout, 5xx, exhausted
    /// secondary-rate-limit backoff). Nothing was persisted.
    Transient { reason: String },
}

/// One page of the code-search response body.
#[derive(Debug, Deserialize)]
struct SearchPage {
    total_count: u64,
    #[serde(default)]
    incomplete_results: bool,
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    path: String,
}

/// Repository metadata, used for rename classification.
#[derive(Debug, Deserialize)]
struct RepoInfo {
    full_name: String,
}

enum PageOutcome {
    Items { items: Vec<SearchItem>, total_count: u64 },
    RepoUnknown,
}

/// Builds the HTTP client used for all remote calls.
///
/// Redirects are handled manually so repository renames surface as 301
/// responses instead of being silently followed.
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(concat!("repo-sift/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::none())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Rate-limited search client.
pub struct SearchClient {
    http: Client,
    api_base: Url,
    token: Option<String>,
    budget: SharedBudget,
    per_page: u32,
    backoff_base: Duration,
    backoff_attempts: u32,
}

impl SearchClient {
    /// Creates a client from the loaded configuration.
    ///
    /// `token` switches between the authenticated and anonymous budget
    /// estimates; the search algorithm is identical in both modes.
    pub fn new(config: &Config, token: Option<String>) -> Result<Self, SiftError> {
        let api_base = Url::parse(&config.api.api_base_url)?;
        let window_limit = if token.is_some() {
            AUTHENTICATED_SEARCHES_PER_MINUTE
        } else {
            UNAUTHENTICATED_SEARCHES_PER_MINUTE
        };

        Ok(Self {
            http: build_http_client()?,
            api_base,
            token,
            budget: SharedBudget::new(window_limit),
            per_page: config.crawler.results_per_page,
            backoff_base: Duration::from_millis(config.crawler.retry_base_delay_ms),
            backoff_attempts: config.crawler.max_retry_attempts,
        })
    }

    /// Searches one repository for all files with the given name.
    ///
    /// Every page is fetched before this returns, so a `Found` outcome is
    /// always the complete result set.
    pub async fn search(&self, repo: &RepoRef, filename: &str) -> SearchOutcome {
        let mut hits: Vec<SearchHit> = Vec::new();
        let mut page = 1u32;

        loop {
            match self.fetch_page(repo, filename, page).await {
                Ok(PageOutcome::Items { items, total_count }) => {
                    let full_page = items.len() as u32 >= self.per_page;
                    hits.extend(items.into_iter().map(|item| SearchHit::new(item.path)));

                    if !full_page || hits.len() as u64 >= total_count {
                        tracing::debug!(
                            "Search for {} complete: {} hits over {} page(s)",
                            repo,
                            hits.len(),
                            page
                        );
                        return SearchOutcome::Found { hits };
                    }
                    page += 1;
                }
                Ok(PageOutcome::RepoUnknown) => return self.classify_unknown(repo).await,
                Err(reason) => return SearchOutcome::Transient { reason },
            }
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, String> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| format!("API base URL cannot hold a path: {}", self.api_base))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Fetches one search page, retrying secondary rate limits with
    /// backoff. Network failures and 5xx responses are returned as
    /// transient reasons for the driver to handle.
    async fn fetch_page(
        &self,
        repo: &RepoRef,
        filename: &str,
        page: u32,
    ) -> Result<PageOutcome, String> {
        let url = self.endpoint(&["search", "code"])?;
        let query = format!("filename:{} repo:{}/{}", filename, repo.owner, repo.name);
        let mut backoff = Backoff::new(self.backoff_base, self.backoff_attempts);

        loop {
            self.budget.acquire().await;

            let request = self
                .http
                .get(url.clone())
                .query(&[("q", query.as_str())])
                .query(&[("per_page", self.per_page), ("page", page)]);
            let response = match self.authorize(request).send().await {
                Ok(response) => response,
                Err(e) => return Err(format!("request failed: {e}")),
            };

            self.record_budget(&response).await;

            match response.status() {
                StatusCode::OK => {
                    let body: SearchPage = response
                        .json()
                        .await
                        .map_err(|e| format!("malformed search response: {e}"))?;
                    if body.incomplete_results {
                        tracing::debug!("Search index reported incomplete results for {}", repo);
                    }
                    return Ok(PageOutcome::Items {
                        items: body.items,
                        total_count: body.total_count,
                    });
                }

                StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY => {
                    return Ok(PageOutcome::RepoUnknown);
                }

                status
                    if status == StatusCode::FORBIDDEN
                        || status == StatusCode::TOO_MANY_REQUESTS =>
                {
                    let retry_after = retry_after(response.headers());
                    match backoff.next_delay() {
                        Some(delay) => {
                            let wait = retry_after.map_or(delay, |after| after.max(delay));
                            tracing::warn!(
                                "Secondary rate limit searching {} (HTTP {}), retrying in {:?}",
                                repo,
                                status,
                                wait
                            );
                            tokio::time::sleep(wait).await;
                        }
                        None => {
                            return Err(format!(
                                "secondary rate limit persisted after {} attempts",
                                backoff.attempts()
                            ));
                        }
                    }
                }

                status => return Err(format!("HTTP {status}")),
            }
        }
    }

    /// Decides whether an unknown-to-search repository was deleted,
    /// renamed, or merely has nothing indexed.
    async fn classify_unknown(&self, repo: &RepoRef) -> SearchOutcome {
        let url = match self.endpoint(&["repos", repo.owner.as_str(), repo.name.as_str()]) {
            Ok(url) => url,
            Err(reason) => return SearchOutcome::Transient { reason },
        };

        let response = match self.authorize(self.http.get(url)).send().await {
            Ok(response) => response,
            Err(e) => {
                return SearchOutcome::Transient {
                    reason: format!("metadata request failed: {e}"),
                }
            }
        };

        match response.status() {
            StatusCode::OK => self.compare_canonical(repo, response).await,

            status if status.is_redirection() => {
                let location = response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                match location {
                    Some(location) => self.follow_redirect(repo, &location).await,
                    None => SearchOutcome::Transient {
                        reason: "redirect without a Location header".to_string(),
                    },
                }
            }

            StatusCode::NOT_FOUND => SearchOutcome::NotFound,

            status => SearchOutcome::Transient {
                reason: format!("metadata endpoint returned HTTP {status}"),
            },
        }
    }

    /// Reads the canonical identity from a metadata response and compares
    /// it against the reference we asked about.
    async fn compare_canonical(&self, repo: &RepoRef, response: Response) -> SearchOutcome {
        let info: RepoInfo = match response.json().await {
            Ok(info) => info,
            Err(e) => {
                return SearchOutcome::Transient {
                    reason: format!("malformed metadata response: {e}"),
                }
            }
        };

        match RepoRef::parse(&info.full_name) {
            Some(target) if &target != repo => SearchOutcome::Renamed { target },
            // The repository exists under the asked-for name but the
            // search index has nothing for it: a completed empty search.
            Some(_) => SearchOutcome::Found { hits: Vec::new() },
            None => SearchOutcome::Transient {
                reason: format!("unparseable canonical name: {:?}", info.full_name),
            },
        }
    }

    /// Follows one metadata redirect to learn the canonical identity. The
    /// platform redirects renamed repositories to an id-based URL, so the
    /// target ref has to come from the body, not the Location path.
    async fn follow_redirect(&self, repo: &RepoRef, location: &str) -> SearchOutcome {
        let url = match self.api_base.join(location) {
            Ok(url) => url,
            Err(e) => {
                return SearchOutcome::Transient {
                    reason: format!("unusable redirect target {location:?}: {e}"),
                }
            }
        };

        let response = match self.authorize(self.http.get(url)).send().await {
            Ok(response) => response,
            Err(e) => {
                return SearchOutcome::Transient {
                    reason: format!("redirect request failed: {e}"),
                }
            }
        };

        match response.status() {
            StatusCode::OK => self.compare_canonical(repo, response).await,
            StatusCode::NOT_FOUND => SearchOutcome::NotFound,
            status => SearchOutcome::Transient {
                reason: format!("redirect target returned HTTP {status}"),
            },
        }
    }

    /// Feeds the rate-limit headers of a response into the shared budget.
    async fn record_budget(&self, response: &Response) {
        let headers = response.headers();
        let Some(remaining) = header_u64(headers, "x-ratelimit-remaining") else {
            return;
        };

        let reset_after = header_u64(headers, "x-ratelimit-reset").map(|reset_epoch| {
            let now_epoch = SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            Duration::from_secs(reset_epoch.saturating_sub(now_epoch))
        });

        self.budget
            .note_response(remaining.min(u32::MAX as u64) as u32, reset_after)
            .await;
    }
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    header_u64(headers, "retry-after").map(Duration::from_secs)
}
