//! Deadlines around wallet calls.
//!
//! Extension calls can suspend forever (an unanswered approval prompt, a
//! crashed content script). Every session proxy runs under one of two
//! bounds: `request` for plain queries and `prompt` for calls that may
//! show UI. The clock is abstracted behind [`Timer`] so the same code runs
//! on tokio and in the browser event loop.

use std::future::Future;
use std::time::Duration;

use futures::future::{self, Either, LocalBoxFuture};
use futures::FutureExt;
use serde::{Deserialize, Serialize};

use crate::error::{CardanoError, Result};

/// Source of sleeps for deadline racing
pub trait Timer {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;
}

/// Timer backed by the tokio runtime
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

impl Timer for TokioTimer {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        tokio::time::sleep(duration).boxed_local()
    }
}

/// Timeout configuration for wallet calls, in milliseconds. `None` disables a bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeoutConfig {
    /// Non-interactive queries (balance, UTXOs, addresses, network id)
    pub request_ms: Option<u64>,
    /// Calls that may wait on the user (enable, signTx, submitTx)
    pub prompt_ms: Option<u64>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_ms: Some(30_000),
            prompt_ms: Some(300_000),
        }
    }
}

/// Whole milliseconds, rounded up so a nonzero bound never becomes zero
fn to_millis(timeout: Duration) -> u64 {
    let millis = timeout.as_nanos().div_ceil(1_000_000);
    u64::try_from(millis).unwrap_or(u64::MAX)
}

impl TimeoutConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// No deadlines at all
    pub fn unbounded() -> Self {
        Self {
            request_ms: None,
            prompt_ms: None,
        }
    }

    pub fn with_request(mut self, timeout: Duration) -> Self {
        self.request_ms = Some(to_millis(timeout));
        self
    }

    pub fn with_prompt(mut self, timeout: Duration) -> Self {
        self.prompt_ms = Some(to_millis(timeout));
        self
    }

    pub fn request(&self) -> Option<Duration> {
        self.request_ms.map(Duration::from_millis)
    }

    pub fn prompt(&self) -> Option<Duration> {
        self.prompt_ms.map(Duration::from_millis)
    }
}

/// Execute a future with a timeout
pub async fn with_timeout<T, F>(
    timer: &dyn Timer,
    duration: Option<Duration>,
    operation: &str,
    future: F,
) -> Result<T>
where
    F: Future<Output = T>,
{
    let Some(duration) = duration else {
        return Ok(future.await);
    };
    let sleep = timer.sleep(duration);
    futures::pin_mut!(future);
    match future::select(future, sleep).await {
        Either::Left((value, _)) => Ok(value),
        Either::Right(((), _)) => {
            tracing::error!(operation, ?duration, "wallet call timed out");
            Err(CardanoError::Timeout {
                operation: operation.to_string(),
                duration,
            })
        }
    }
}
