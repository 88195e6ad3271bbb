//! Navigation with bounded retry and backoff.
//!
//! The retry schedule is a plain value, kept separate from the reporting
//! side effect: callers inject a callback that observes each failed
//! attempt.

use std::time::Duration;

use tokio::time::{sleep, timeout};

use crate::session_pool::RendererSession;

/// Retry/backoff schedule for one URL's navigation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RetryPolicy {
    /// Total navigation attempts before the URL is abandoned.
    pub max_attempts: u32,
    /// Hard cap on a single navigation attempt.
    pub navigation_timeout: Duration,
    /// Pause after a successful load so late resources settle before the
    /// DOM is read.
    pub settle_delay: Duration,
    /// Pause before re-attempting a failed navigation.
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            navigation_timeout: Duration::from_secs(30),
            settle_delay: Duration::from_secs(1),
            retry_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Policy with a caller-chosen attempt budget and default delays.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }
}

/// Terminal fetch failure. Transient navigation errors never surface here;
/// they are reported through the attempt callback and retried.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

/// Navigate a session to `url`, retrying on timeout or navigation error up
/// to the policy's attempt budget with a fixed backoff between attempts.
///
/// Every failed attempt is passed to `on_failed_attempt` with the attempt
/// number and a human-readable cause. On success a settle delay is applied
/// before returning, so the caller reads a quiesced DOM.
pub async fn fetch_with_retry<S, F>(
    session: &S,
    url: &str,
    policy: &RetryPolicy,
    mut on_failed_attempt: F,
) -> Result<(), FetchError>
where
    S: RendererSession,
    F: FnMut(u32, &str),
{
    let mut attempts = 0;
    loop {
        attempts += 1;
        let cause = match timeout(policy.navigation_timeout, session.navigate(url)).await {
            Ok(Ok(())) => {
                sleep(policy.settle_delay).await;
                return Ok(());
            }
            Ok(Err(e)) => format!("{e:#}"),
            Err(_) => format!(
                "timed out after {}s while navigating to {url}",
                policy.navigation_timeout.as_secs()
            ),
        };

        on_failed_attempt(attempts, &cause);

        if attempts >= policy.max_attempts {
            return Err(FetchError::RetriesExhausted {
                attempts,
                last_error: cause,
            });
        }
        sleep(policy.retry_delay).await;
    }
}
