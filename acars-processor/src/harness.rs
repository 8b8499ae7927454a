//! External call harness
//!
//! Every AI and HTTP lookup goes through [`call_with_retry`]: each attempt is
//! bounded by a timeout, retriable failures back off exponentially, fatal
//! failures return immediately.
//!
//! **Backoff:** the first retry waits `initial_delay`, each later retry waits
//! twice as long as the previous one (capped at [`MAX_BACKOFF`]).

use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Upper bound on a single backoff sleep
pub const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Failure of an external call
#[derive(Debug, Error)]
pub enum CallError {
    /// Transient failure (connection refused, 5xx, unparseable model output)
    #[error("{0}")]
    Retriable(String),

    /// Failure that another attempt will not fix (4xx, bad request)
    #[error("{0}")]
    Fatal(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Box<CallError> },
}

impl CallError {
    pub fn is_retriable(&self) -> bool {
        matches!(self, CallError::Retriable(_) | CallError::Timeout(_))
    }
}

impl From<reqwest::Error> for CallError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return CallError::Retriable(format!("request timed out: {}", err));
        }
        if err.is_connect() || err.is_request() || err.is_body() || err.is_decode() {
            return CallError::Retriable(err.to_string());
        }
        if let Some(status) = err.status() {
            if status.is_server_error() || status.as_u16() == 429 {
                return CallError::Retriable(err.to_string());
            }
        }
        CallError::Fatal(err.to_string())
    }
}

/// Classify a response status: 5xx and 429 retry, other non-2xx are fatal
pub async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, CallError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = format!("HTTP {}: {}", status.as_u16(), truncate(&body, 200));
    if status.is_server_error() || status.as_u16() == 429 {
        Err(CallError::Retriable(message))
    } else {
        Err(CallError::Fatal(message))
    }
}

/// Timeout and retry settings for one call site
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Bound on each attempt
    pub timeout: Duration,
    /// Total attempts, at least 1
    pub max_attempts: u32,
    pub initial_delay: Duration,
}

impl RetryPolicy {
    /// Single attempt, no retry
    pub fn once(timeout: Duration) -> Self {
        Self {
            timeout,
            max_attempts: 1,
            initial_delay: Duration::ZERO,
        }
    }
}

/// Run `operation` under `policy`
///
/// **Algorithm:**
/// 1. Attempt the operation under `tokio::time::timeout`
/// 2. Success: return the value
/// 3. Fatal error: return it immediately
/// 4. Retriable error or timeout: if attempts remain, log WARN, sleep the
///    current backoff, double it, retry
/// 5. Out of attempts: return [`CallError::Exhausted`] with the last failure
pub async fn call_with_retry<F, Fut, T>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, CallError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CallError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut backoff = policy.initial_delay;
    let mut attempt = 0;

    loop {
        attempt += 1;

        let err = match tokio::time::timeout(policy.timeout, operation()).await {
            Ok(Ok(value)) => {
                if attempt > 1 {
                    tracing::debug!(operation = operation_name, attempt, "Call succeeded after retry");
                }
                return Ok(value);
            }
            Ok(Err(err)) if !err.is_retriable() => return Err(err),
            Ok(Err(err)) => err,
            Err(_) => CallError::Timeout(policy.timeout),
        };

        if attempt >= max_attempts {
            tracing::warn!(
                operation = operation_name,
                attempt,
                error = %err,
                "Call failed: retries exhausted"
            );
            return Err(CallError::Exhausted {
                attempts: attempt,
                last: Box::new(err),
            });
        }

        tracing::warn!(
            operation = operation_name,
            attempt,
            max_attempts,
            backoff_ms = backoff.as_millis() as u64,
            error = %err,
            "Call failed, retrying"
        );

        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}

/// Replace typographic quotes with their ASCII counterparts
pub fn sanitize_quotes(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' => '\'',
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' => '"',
            other => other,
        })
        .collect()
}

/// Parse the last JSON object embedded in free-form model output
///
/// Models often wrap their answer in prose or code fences. Starting from the
/// last `}`, each preceding `{` is tried until a slice deserializes as `T`.
/// A miss is retriable: another generation usually produces valid output.
pub fn parse_last_json_object<T: DeserializeOwned>(raw: &str) -> Result<T, CallError> {
    let text = sanitize_quotes(raw);
    let end = text
        .rfind('}')
        .ok_or_else(|| CallError::Retriable(format!("no JSON object in response: {}", truncate(raw, 200))))?;

    for (start, _) in text[..end].rmatch_indices('{') {
        if let Ok(value) = serde_json::from_str::<T>(&text[start..=end]) {
            return Ok(value);
        }
    }

    Err(CallError::Retriable(format!(
        "response did not contain the expected JSON object: {}",
        truncate(raw, 200)
    )))
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(max_chars).collect();
        cut.push_str("...");
        cut
    }
}
