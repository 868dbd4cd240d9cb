use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{IngestError, Result};
use crate::settings::HttpSettings;

/// Network seam used by the download stage.
#[async_trait]
pub trait HttpClientPort: Send + Sync {
    /// Perform one GET. Transport failures are `Err`; any HTTP status is `Ok`.
    async fn get(&self, url: &str) -> std::result::Result<HttpGetResult, String>;
}

#[derive(Clone, Debug)]
pub struct HttpGetResult {
    pub status: u16,
    pub bytes: Vec<u8>,
    pub retry_after: Option<Duration>,
}

impl HttpGetResult {
    /// 4xx or 5xx. Informational and unfollowed redirect statuses are not errors.
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }
}

/// `reqwest` client reused across every attempt and every source of a run.
pub struct ReqwestHttp {
    client: reqwest::Client,
}

impl ReqwestHttp {
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|e| IngestError::Settings(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClientPort for ReqwestHttp {
    async fn get(&self, url: &str) -> std::result::Result<HttpGetResult, String> {
        let resp = self.client.get(url).send().await.map_err(|e| e.to_string())?;
        let status = resp.status().as_u16();
        let retry_after = resp
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let bytes = resp.bytes().await.map_err(|e| e.to_string())?.to_vec();
        Ok(HttpGetResult { status, bytes, retry_after })
    }
}

/// Bounded retry over a fixed set of transient statuses.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub retry_statuses: Vec<u16>,
    pub backoff_factor: Duration,
    pub max_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&HttpSettings::default())
    }
}

impl From<&HttpSettings> for RetryPolicy {
    fn from(s: &HttpSettings) -> Self {
        Self {
            max_attempts: s.max_attempts.max(1),
            retry_statuses: s.retry_statuses.clone(),
            backoff_factor: Duration::from_millis(s.backoff_factor_ms),
            max_retry_after: Duration::from_secs(s.max_retry_after_secs),
        }
    }
}

impl RetryPolicy {
    pub fn is_retryable(&self, status: u16) -> bool {
        self.retry_statuses.contains(&status)
    }

    /// Delay before attempt `next_attempt` (2-based), honoring a capped `Retry-After`.
    fn delay_before(&self, next_attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(ra) = retry_after {
            return ra.min(self.max_retry_after);
        }
        let exp = next_attempt.saturating_sub(2).min(16);
        self.backoff_factor.saturating_mul(2u32.pow(exp))
    }
}

/// GET `url`, retrying transient statuses until the policy's budget is spent.
///
/// Non-retryable 4xx/5xx statuses and transport failures fail immediately.
/// Any other status below 400 returns its body.
pub async fn fetch_with_retry(
    http: &dyn HttpClientPort,
    url: &str,
    policy: &RetryPolicy,
) -> Result<Vec<u8>> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        debug!(url, attempt, "GET");
        let resp = http.get(url).await.map_err(|reason| IngestError::SourceFetch {
            url: url.to_string(),
            attempts: attempt,
            reason,
        })?;

        if !policy.is_retryable(resp.status) {
            if resp.is_error() {
                return Err(IngestError::SourceFetch {
                    url: url.to_string(),
                    attempts: attempt,
                    reason: format!("HTTP status {}", resp.status),
                });
            }
            return Ok(resp.bytes);
        }

        if attempt >= policy.max_attempts {
            return Err(IngestError::SourceFetch {
                url: url.to_string(),
                attempts: attempt,
                reason: format!("retry budget exhausted, last status {}", resp.status),
            });
        }

        let delay = policy.delay_before(attempt + 1, resp.retry_after);
        warn!(url, attempt, status = resp.status, delay_ms = delay.as_millis() as u64, "transient status, retrying");
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
