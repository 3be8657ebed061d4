//! Timeout and retry around a backend call
//!
//! Every attempt gets its own timeout. Retryable failures back off linearly
//! (`attempt × base_delay`) before the next attempt; 4xx responses fail
//! immediately.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::traits::{BackendError, ChatRequest, PetBackend, PetReply};

/// Retry behavior for backend calls
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay unit; retry `n` waits `n × base_delay`
    pub base_delay: Duration,
    /// Per-attempt timeout
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(1000),
            timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-indexed)
    #[must_use]
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(retry)
    }
}

/// Send `request`, retrying per `policy`
///
/// Returns the first successful reply, or the last error once retries are
/// exhausted or a non-retryable error comes back.
pub async fn send_with_retry(
    backend: &dyn PetBackend,
    request: &ChatRequest,
    policy: &RetryPolicy,
) -> Result<PetReply, BackendError> {
    let mut retries = 0;

    loop {
        let result = match tokio::time::timeout(policy.timeout, backend.send(request)).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout),
        };

        match result {
            Ok(reply) => {
                if retries > 0 {
                    tracing::info!(backend = backend.name(), retries, "Backend call succeeded after retry");
                }
                return Ok(reply);
            }
            Err(e) if e.is_retryable() && retries < policy.max_retries => {
                retries += 1;
                let delay = policy.delay_for_retry(retries);
                tracing::warn!(
                    backend = backend.name(),
                    error = %e,
                    retry = retries,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "Backend call failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                tracing::warn!(backend = backend.name(), error = %e, retries, "Backend call failed");
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use tokio::time::Instant;

    /// Plays back a fixed list of results, recording when each call happened
    struct ScriptedBackend {
        script: Mutex<VecDeque<Result<PetReply, BackendError>>>,
        calls: Mutex<Vec<Instant>>,
    }

    impl ScriptedBackend {
        fn new(script: Vec<Result<PetReply, BackendError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PetBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "Scripted"
        }

        async fn send(&self, _request: &ChatRequest) -> Result<PetReply, BackendError> {
            self.calls.lock().push(Instant::now());
            self.script
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(BackendError::Connection("script exhausted".into())))
        }
    }

    fn server_error() -> Result<PetReply, BackendError> {
        Err(BackendError::Status {
            status: 500,
            body: "boom".into(),
        })
    }

    #[test]
    fn test_linear_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_retry(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_retry(2), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_failures_then_success() {
        let backend = ScriptedBackend::new(vec![
            server_error(),
            server_error(),
            Ok(PetReply::text(["ok"])),
        ]);

        let reply = send_with_retry(&backend, &ChatRequest::new("hi"), &RetryPolicy::default())
            .await
            .unwrap();
        assert_eq!(reply.messages, vec!["ok"]);

        let calls = backend.calls.lock().clone();
        assert_eq!(calls.len(), 3);
        let first_gap = calls[1] - calls[0];
        let second_gap = calls[2] - calls[1];
        assert!(first_gap >= Duration::from_millis(1000));
        assert!(second_gap >= Duration::from_millis(2000));
        assert!(second_gap > first_gap);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let backend = ScriptedBackend::new(vec![server_error(), server_error(), server_error()]);

        let err = send_with_retry(&backend, &ChatRequest::new("hi"), &RetryPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Status { status: 500, .. }));
        assert_eq!(backend.calls.lock().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_error_is_not_retried() {
        let backend = ScriptedBackend::new(vec![Err(BackendError::Status {
            status: 400,
            body: String::new(),
        })]);

        let err = send_with_retry(&backend, &ChatRequest::new("hi"), &RetryPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Status { status: 400, .. }));
        assert_eq!(backend.calls.lock().len(), 1);
    }

    struct HangingBackend;

    #[async_trait]
    impl PetBackend for HangingBackend {
        fn name(&self) -> &str {
            "Hanging"
        }

        async fn send(&self, _request: &ChatRequest) -> Result<PetReply, BackendError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_attempt_times_out() {
        let policy = RetryPolicy {
            max_retries: 1,
            ..RetryPolicy::default()
        };
        let start = Instant::now();
        let err = send_with_retry(&HangingBackend, &ChatRequest::new("hi"), &policy)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Timeout));
        // two 10 s attempts plus one 1 s backoff
        assert!(start.elapsed() >= Duration::from_secs(21));
    }
}
