//! Fixed-delay retry for single network calls.
//!
//! Only transient failures (timeouts, connection errors) are retried. When
//! attempts run out, or a non-transient error occurs, the wrapper logs and
//! yields `None` instead of an error: callers treat "no result" as a normal,
//! silent failure mode.

use std::error::Error;
use std::fmt::Display;
use std::future::Future;
use std::io;
use std::time::Duration;

use tracing::{debug, error, warn};

use contractsync_shared::RetryConfig;

/// Classifies an error as worth retrying.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for reqwest::Error {
    fn is_transient(&self) -> bool {
        self.is_timeout() || self.is_connect() || connection_dropped(self)
    }
}

/// Whether the error chain shows the peer closing or resetting an
/// established connection.
fn connection_dropped(err: &(dyn Error + 'static)) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(e) = cause.downcast_ref::<hyper::Error>() {
            if e.is_incomplete_message() || e.is_closed() {
                return true;
            }
        }
        if let Some(e) = cause.downcast_ref::<io::Error>() {
            if matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            ) {
                return true;
            }
        }
        source = cause.source();
    }
    false
}

/// Attempt cap and fixed pause between attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Pause between attempts. No growth, no jitter.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            delay: Duration::from_secs(config.delay_secs),
        }
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds, fails non-transiently, or attempts run out.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Transient + Display,
    {
        let max_attempts = self.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match op().await {
                Ok(value) => {
                    debug!(label, attempt, max_attempts, "request succeeded");
                    return Some(value);
                }
                Err(e) if e.is_transient() => {
                    warn!(
                        label,
                        attempt,
                        max_attempts,
                        error = %e,
                        delay_ms = self.delay.as_millis() as u64,
                        "transient failure"
                    );
                    if attempt < max_attempts {
                        tokio::time::sleep(self.delay).await;
                    }
                }
                Err(e) => {
                    error!(label, attempt, error = %e, "non-transient failure, not retrying");
                    return None;
                }
            }
        }

        error!(label, max_attempts, "attempts exhausted");
        None
    }

    /// Wrap a one-argument operation so every call goes through [`RetryPolicy::run`].
    pub fn wrap<F>(&self, label: &'static str, op: F) -> Retrying<F> {
        Retrying {
            policy: self.clone(),
            label,
            op,
        }
    }
}

/// A one-argument operation with retry semantics attached.
pub struct Retrying<F> {
    policy: RetryPolicy,
    label: &'static str,
    op: F,
}

impl<F> Retrying<F> {
    /// Invoke the wrapped operation with `arg`, retrying transient failures.
    pub async fn call<A, T, E, Fut>(&self, arg: A) -> Option<T>
    where
        A: Clone,
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Transient + Display,
    {
        self.policy
            .run(self.label, || (self.op)(arg.clone()))
            .await
    }
}
