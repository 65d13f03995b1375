//! Bounded tool calls.
//!
//! Every external call an agent makes goes through [`call_with_timeout`];
//! an elapsed deadline becomes `ToolError::Timeout`. [`call_with_retry`]
//! adds at most one retry, and only for transient failures.

use carebridge_core::error::ToolError;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::warn;

/// Await `fut`, failing with `ToolError::Timeout` after `limit`.
pub async fn call_with_timeout<T, Fut>(
    tool_name: &str,
    limit: Duration,
    fut: Fut,
) -> Result<T, ToolError>
where
    Fut: Future<Output = Result<T, ToolError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(tool = tool_name, timeout_ms = limit.as_millis() as u64, "Tool call timed out");
            Err(ToolError::Timeout {
                tool_name: tool_name.to_string(),
                timeout_ms: limit.as_millis() as u64,
            })
        }
    }
}

/// Like [`call_with_timeout`], retrying transient failures.
///
/// `max_retries` is clamped to 1; each attempt gets the full `limit`.
pub async fn call_with_retry<T, F, Fut>(
    tool_name: &str,
    limit: Duration,
    max_retries: u32,
    mut op: F,
) -> Result<T, ToolError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ToolError>>,
{
    let max_retries = max_retries.min(1);
    let mut attempt = 0;
    loop {
        match call_with_timeout(tool_name, limit, op()).await {
            Err(e) if e.is_transient() && attempt < max_retries => {
                attempt += 1;
                warn!(tool = tool_name, error = %e, attempt, "Retrying transient tool failure");
            }
            other => return other,
        }
    }
}

/// Milliseconds elapsed since `start`, for `ToolInvoked` events.
pub(crate) fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
