//! Shared HTTP plumbing for the hosted model adapters.
//!
//! Transient failures (429, 5xx, connect and timeout errors) are retried with a capped exponential
//! backoff. Everything else surfaces on the first attempt.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;

const MAX_BACKOFF_SHIFT: u32 = 5;

/// Bounded retry schedule applied to provider requests.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Values below one behave like one.
    pub max_attempts: usize,
    /// Delay before the first retry; doubled on each subsequent retry.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Build a policy with the default 500ms base delay.
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_millis(500),
        }
    }

    /// Whether another attempt is allowed after `attempt` attempts have been made.
    pub fn allows_retry(&self, attempt: usize) -> bool {
        attempt < self.max_attempts.max(1)
    }

    /// Delay to wait before attempt number `attempt + 1`.
    pub fn backoff(&self, attempt: usize) -> Duration {
        let shift = (attempt.saturating_sub(1) as u32).min(MAX_BACKOFF_SHIFT);
        self.base_delay.saturating_mul(1 << shift)
    }

    /// Send the request produced by `build`, retrying transient failures.
    ///
    /// Returns the last response once the budget is spent, even when its status is an error, so
    /// callers report the provider's own message. Non-transient transport errors surface at once.
    pub async fn send<F>(&self, operation: &str, mut build: F) -> Result<Response, reqwest::Error>
    where
        F: FnMut() -> RequestBuilder,
    {
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            match build().send().await {
                Ok(response)
                    if is_retryable_status(response.status()) && self.allows_retry(attempt) =>
                {
                    tracing::warn!(
                        operation,
                        attempt,
                        status = %response.status(),
                        "Provider returned transient status; retrying"
                    );
                }
                Ok(response) => return Ok(response),
                Err(error) if is_retryable_error(&error) && self.allows_retry(attempt) => {
                    tracing::warn!(operation, attempt, error = %error, "Request failed; retrying");
                }
                Err(error) => return Err(error),
            }
            tokio::time::sleep(self.backoff(attempt)).await;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Status codes worth retrying.
fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Transport errors worth retrying.
fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}

/// Build a `reqwest` client with a user agent and request timeout.
pub fn build_client(user_agent: &str, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(10),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(10));
        assert_eq!(policy.backoff(2), Duration::from_millis(20));
        assert_eq!(policy.backoff(3), Duration::from_millis(40));
        assert_eq!(policy.backoff(20), Duration::from_millis(320));
    }

    #[test]
    fn retry_budget_counts_first_attempt() {
        let policy = RetryPolicy::new(2);
        assert!(policy.allows_retry(1));
        assert!(!policy.allows_retry(2));

        let single = RetryPolicy::new(0);
        assert!(!single.allows_retry(1));
    }

    #[tokio::test]
    async fn send_retries_transient_status_then_returns_last_response() {
        use httpmock::{Method::GET, MockServer};

        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/health");
                then.status(502).body("bad gateway");
            })
            .await;
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        };
        let client = Client::new();
        let url = server.url("/health");

        let response = policy
            .send("health", || client.get(&url))
            .await
            .expect("response");

        mock.assert_hits_async(3).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn send_does_not_retry_client_errors() {
        use httpmock::{Method::GET, MockServer};

        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/missing");
                then.status(404);
            })
            .await;
        let client = Client::new();
        let url = server.url("/missing");

        let response = RetryPolicy::new(3)
            .send("missing", || client.get(&url))
            .await
            .expect("response");

        mock.assert_hits_async(1).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
        assert!(!is_retryable_status(StatusCode::UNAUTHORIZED));
    }
}
