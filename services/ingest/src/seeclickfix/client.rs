use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};

use scf_common::error::{ScfError, ScfResult};
use scf_config::{get_var, get_var_opt, get_var_or, parse_var_or};

use super::models::{IssueBatch, IssueRecord, IssuesPage, RecordError};
use super::pacing::{Sleeper, TokioSleeper};
use super::query::IssueQuery;

pub const DEFAULT_BASE_URL: &str = "https://seeclickfix.com/api/v2";

#[derive(Debug, Clone)]
pub struct IssuesClientConfig {
    pub base_url: String,
    pub place_url: String,
    pub per_page: u32,
    pub details: bool,
    pub timeout_secs: u64,
    /// Pause inserted before every request after the first page.
    pub page_delay_secs: u64,
    /// Wait used for a 429 that carries no usable `Retry-After`.
    pub default_retry_after_secs: u64,
    /// Cap on consecutive 429s for one page; `None` retries forever.
    pub max_rate_limit_retries: Option<u32>,
}

impl IssuesClientConfig {
    /// Load client config from environment.
    ///
    /// `SCF_PLACE_URL` is mandatory; everything else has a default.
    pub fn from_env() -> ScfResult<Self> {
        let place_url = get_var("SCF_PLACE_URL")?.trim().to_string();
        if place_url.is_empty() {
            return Err(ScfError::Config("SCF_PLACE_URL is set but empty".into()));
        }

        let per_page: u32 = parse_var_or("SCF_PER_PAGE", 10)?;
        if per_page == 0 {
            return Err(ScfError::Config("SCF_PER_PAGE must be at least 1".into()));
        }

        let max_rate_limit_retries = match get_var_opt("SCF_MAX_RATE_LIMIT_RETRIES") {
            Some(raw) => Some(raw.trim().parse().map_err(|e| {
                ScfError::Config(format!("invalid SCF_MAX_RATE_LIMIT_RETRIES: {e}"))
            })?),
            None => None,
        };

        Ok(Self {
            base_url: get_var_or("SCF_BASE_URL", DEFAULT_BASE_URL),
            place_url,
            per_page,
            details: parse_var_or("SCF_DETAILS", true)?,
            timeout_secs: parse_var_or("SCF_TIMEOUT_SECS", 30)?,
            page_delay_secs: parse_var_or("SCF_PAGE_DELAY_SECS", 2)?,
            default_retry_after_secs: parse_var_or("SCF_DEFAULT_RETRY_AFTER_SECS", 60)?,
            max_rate_limit_retries,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IssuesClientError {
    #[error("HTTP {status} on page {page}: {body}")]
    HttpError {
        page: u32,
        status: StatusCode,
        body: String,
    },

    #[error("request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("malformed response for page {page}: {source}")]
    Decode {
        page: u32,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid issue on page {page}: {source}")]
    InvalidRecord {
        page: u32,
        #[source]
        source: RecordError,
    },

    #[error("page {page} points back to page {next_page}")]
    PaginationLoop { page: u32, next_page: u32 },

    #[error("still rate-limited on page {page} after {attempts} attempts")]
    RateLimitExhausted { page: u32, attempts: u32 },
}

/// Where the fetch loop is between requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchState {
    PageRequested { page: u32 },
    RateLimited { page: u32, wait: Duration },
    PageReceived { page: u32, next_page: Option<u32> },
    Fetched,
}

enum PageResponse {
    RateLimited { retry_after: Duration },
    Received(IssuesPage),
}

#[derive(Clone)]
pub struct IssuesClient {
    client: Client,
    config: IssuesClientConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl IssuesClient {
    pub fn new(config: IssuesClientConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            config,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    /// Replace the clock used for the rate-limit wait and the page delay.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// For testing: create a client pointing at a specific base URL (e.g., wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.to_string();
        self
    }

    pub fn config(&self) -> &IssuesClientConfig {
        &self.config
    }

    /// Fetch every issue updated at or after `updated_after` (all issues when
    /// `None`), walking pages until `next_page` runs out.
    ///
    /// A 429 waits out `Retry-After` and re-requests the same page. Any other
    /// failure aborts the whole fetch and nothing collected so far is returned.
    pub async fn fetch_issues(
        &self,
        updated_after: Option<DateTime<Utc>>,
    ) -> Result<IssueBatch, IssuesClientError> {
        let query = IssueQuery {
            place_url: self.config.place_url.clone(),
            per_page: self.config.per_page,
            details: self.config.details,
            updated_after,
        };
        let page_delay = Duration::from_secs(self.config.page_delay_secs);

        let mut records = Vec::new();
        let mut rate_limited: u32 = 0;
        let mut state = FetchState::PageRequested { page: 1 };

        loop {
            tracing::debug!(?state, "fetch state");
            state = match state {
                FetchState::PageRequested { page } => {
                    match self.request_page(&query, page).await? {
                        PageResponse::RateLimited { retry_after } => {
                            rate_limited += 1;
                            if let Some(max) = self.config.max_rate_limit_retries {
                                if rate_limited > max {
                                    return Err(IssuesClientError::RateLimitExhausted {
                                        page,
                                        attempts: rate_limited,
                                    });
                                }
                            }
                            FetchState::RateLimited {
                                page,
                                wait: retry_after,
                            }
                        }
                        PageResponse::Received(body) => {
                            rate_limited = 0;
                            let count = body.issues.len();
                            for raw in body.issues {
                                let record = IssueRecord::try_from(raw).map_err(|source| {
                                    IssuesClientError::InvalidRecord { page, source }
                                })?;
                                records.push(record);
                            }

                            let pagination = body.metadata.pagination;
                            tracing::info!(page, issues = count, ?pagination, "page received");

                            let next_page = pagination.next();
                            if let Some(next) = next_page {
                                if next <= page {
                                    return Err(IssuesClientError::PaginationLoop {
                                        page,
                                        next_page: next,
                                    });
                                }
                            }
                            FetchState::PageReceived { page, next_page }
                        }
                    }
                }
                FetchState::RateLimited { page, wait } => {
                    tracing::warn!(
                        page,
                        wait_secs = wait.as_secs(),
                        attempt = rate_limited,
                        "rate-limited, waiting Retry-After"
                    );
                    self.sleeper.sleep(wait).await;
                    FetchState::PageRequested { page }
                }
                FetchState::PageReceived {
                    next_page: Some(next),
                    ..
                } => {
                    self.sleeper.sleep(page_delay).await;
                    FetchState::PageRequested { page: next }
                }
                FetchState::PageReceived {
                    page,
                    next_page: None,
                } => {
                    tracing::info!(last_page = page, "no more pages to process");
                    FetchState::Fetched
                }
                FetchState::Fetched => break,
            };
        }

        tracing::info!(count = records.len(), "collected issues");
        Ok(IssueBatch::new(records))
    }

    async fn request_page(
        &self,
        query: &IssueQuery,
        page: u32,
    ) -> Result<PageResponse, IssuesClientError> {
        let url = format!("{}/issues", self.config.base_url.trim_end_matches('/'));
        let params = query.params(page);
        tracing::info!(page, ?params, "fetching issues page");

        let response = self.client.get(&url).query(&params).send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = retry_after(response.headers(), self.config.default_retry_after_secs);
            return Ok(PageResponse::RateLimited { retry_after });
        }

        // No retry on anything else
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IssuesClientError::HttpError { page, status, body });
        }

        let body = response.text().await?;
        let parsed = serde_json::from_str::<IssuesPage>(&body)
            .map_err(|source| IssuesClientError::Decode { page, source })?;
        Ok(PageResponse::Received(parsed))
    }
}

/// Seconds from `Retry-After`, or `default_secs` when absent or not an integer.
fn retry_after(headers: &HeaderMap, default_secs: u64) -> Duration {
    let secs = headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default_secs);
    Duration::from_secs(secs)
}
