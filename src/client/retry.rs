//! Retry and polling policy layered over the transport
//!
//! Classifies every response:
//! - 2xx: success
//! - 204 on a polling request: "not ready yet", sleep the cooldown and reissue
//!   without limit
//! - 429/500/502/503/504: transient, retried up to `max_attempts` total attempts
//! - 401: terminal, reported as [`ApiError::Unauthorized`]
//! - anything else: terminal, reported as [`ApiError::Http`]
//!
//! Network failures are retried within the same attempt budget for legacy XML
//! requests only; on REST they surface immediately.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};

use super::rate_limit::Throttle;
use super::request::{ApiFamily, Request, Response};
use super::transport::Transport;
use crate::config::RetrySettings;
use crate::error::{ApiError, Error, Result};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);
pub const DEFAULT_POLL_COOLDOWN: Duration = Duration::from_secs(120);

/// Upper bound for both `Retry-After` and exponential delays
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
    exponential: bool,
    poll_cooldown: Duration,
    throttle: Arc<Throttle>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
            exponential: false,
            poll_cooldown: DEFAULT_POLL_COOLDOWN,
            throttle: Arc::new(Throttle::default()),
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self::default()
            .with_max_attempts(settings.max_attempts)
            .with_backoff(settings.backoff())
            .with_exponential_backoff(settings.exponential_backoff)
            .with_poll_cooldown(settings.poll_cooldown())
    }

    /// Total attempts for transient statuses; at least one.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_exponential_backoff(mut self, exponential: bool) -> Self {
        self.exponential = exponential;
        self
    }

    pub fn with_poll_cooldown(mut self, cooldown: Duration) -> Self {
        self.poll_cooldown = cooldown;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn poll_cooldown(&self) -> Duration {
        self.poll_cooldown
    }

    pub fn throttle(&self) -> &Throttle {
        &self.throttle
    }

    pub fn is_retryable(status: u16) -> bool {
        RETRYABLE_STATUSES.contains(&status)
    }

    /// Delay after the given failed attempt (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if !self.exponential {
            return self.backoff;
        }
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff.saturating_mul(factor).min(MAX_RETRY_DELAY)
    }

    fn retry_delay(&self, response: &Response, attempt: u32) -> Duration {
        if response.status() == 429 {
            let retry_after = response
                .header("retry-after")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            if let Some(delay) = retry_after {
                return delay.min(MAX_RETRY_DELAY);
            }
        }
        self.delay_for(attempt)
    }

    /// Send a request, retrying transient failures up to the policy's attempt limit.
    ///
    /// Transient statuses are retried for every method, POST/PUT/DELETE
    /// included, so a non-idempotent call such as an upload or an annotation
    /// may reach the server more than once. Callers that cannot tolerate a
    /// repeat should use [`send_with_attempts`](Self::send_with_attempts) with a
    /// limit of 1.
    pub async fn send_with_retry(
        &self,
        transport: &dyn Transport,
        request: &Request,
    ) -> Result<Response> {
        self.send_with_attempts(transport, request, self.max_attempts)
            .await
    }

    /// Send a request, retrying transient failures up to `max_attempts` total attempts.
    pub async fn send_with_attempts(
        &self,
        transport: &dyn Transport,
        request: &Request,
        max_attempts: u32,
    ) -> Result<Response> {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 0u32;
        let mut polls = 0u64;

        loop {
            self.throttle.wait_if_active().await;

            let response = match transport.execute(request).await {
                Ok(response) => response,
                Err(Error::Api(ApiError::Network(reason)))
                    if request.family() == ApiFamily::Xml =>
                {
                    attempt += 1;
                    if attempt >= max_attempts {
                        warn!(
                            "Giving up on {:?} after {} attempts: {}",
                            request.target(),
                            attempt,
                            reason
                        );
                        return Err(ApiError::Network(reason).into());
                    }
                    let delay = self.delay_for(attempt);
                    debug!(
                        "Retrying {:?} after network error: {} (attempt {}/{}, waiting {:?})",
                        request.target(),
                        reason,
                        attempt,
                        max_attempts,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                Err(err) => return Err(err),
            };
            let status = response.status();

            if status == 204 && request.poll_on_no_content() {
                polls += 1;
                debug!(
                    "{} not ready yet (poll {}), retrying in {:?}",
                    response.url(),
                    polls,
                    self.poll_cooldown
                );
                tokio::time::sleep(self.poll_cooldown).await;
                continue;
            }

            attempt += 1;

            if response.is_success() {
                if attempt > 1 {
                    debug!("{} succeeded after {} attempts", response.url(), attempt);
                }
                return Ok(response);
            }

            debug!(
                "API call returned HTTP status code {} for {} (conversation id {})",
                status,
                response.url(),
                response.conversation_id().unwrap_or("-")
            );

            if status == 429 {
                self.throttle.activate();
            }

            if Self::is_retryable(status) {
                if attempt < max_attempts {
                    let delay = self.retry_delay(&response, attempt);
                    debug!(
                        "Retrying request, error code {} received (attempt {}/{}, waiting {:?})",
                        status, attempt, max_attempts, delay
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                warn!(
                    "Giving up on {} after {} attempts, last status {}",
                    response.url(),
                    attempt,
                    status
                );
            }

            return Err(terminal_error(&response).into());
        }
    }
}

/// Error for a response the policy will not retry
fn terminal_error(response: &Response) -> ApiError {
    let body = response.text();
    let url = response.url().to_string();
    match response.status() {
        401 => ApiError::Unauthorized { body, url },
        status => ApiError::Http {
            status,
            body,
            url,
            conversation_id: response.conversation_id().map(str::to_string),
        },
    }
}
