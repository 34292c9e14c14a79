//! Remote artefact retrieval.
//!
//! Provides a trait-based abstraction for downloading release archives,
//! a retry policy with bounded exponential backoff for transient failures,
//! and a cancellation token checked between chunks and between attempts.

use camino::Utf8Path;
use log::warn;
use std::io::{Read, Write};
use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Network timeout for a single artefact download.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Read buffer size; cancellation is checked once per chunk.
const CHUNK_SIZE: usize = 64 * 1024;

/// Granularity of cancellable sleeps.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Cooperative cancellation flag shared between a caller and a fetch.
///
/// # Examples
///
/// ```
/// use bindkit_pipeline::artefact::fetch::CancellationToken;
///
/// let token = CancellationToken::new();
/// let observer = token.clone();
/// token.cancel();
/// assert!(observer.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create a token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, waking early if cancelled.
    ///
    /// Returns `false` when the sleep was cut short.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
    }
}

/// Errors arising from artefact downloads.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The server answered with a non-success status.
    #[error("download failed for {url}: HTTP {code}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        code: u16,
    },

    /// The requested artefact was not found (HTTP 404).
    #[error("artefact not found: {url}")]
    NotFound {
        /// Requested URL.
        url: String,
    },

    /// The request did not complete in time.
    #[error("download timed out for {url}")]
    Timeout {
        /// Requested URL.
        url: String,
    },

    /// Connection-level failure.
    #[error("download failed for {url}: {reason}")]
    Transport {
        /// Requested URL.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
        /// Whether retrying may help.
        transient: bool,
    },

    /// The caller cancelled the download.
    #[error("download cancelled: {url}")]
    Cancelled {
        /// Requested URL.
        url: String,
    },

    /// Writing the downloaded bytes failed.
    #[error("I/O error writing download to {path}: {source}")]
    Io {
        /// Destination path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    /// Whether the failure is worth retrying: server errors, timeouts,
    /// and connection failures.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Status { code, .. } => *code >= 500,
            Self::Timeout { .. } => true,
            Self::Transport { transient, .. } => *transient,
            Self::NotFound { .. } | Self::Cancelled { .. } | Self::Io { .. } => false,
        }
    }
}

/// Trait for downloading artefact files.
///
/// Abstractions allow tests to script HTTP behaviour without network access.
#[cfg_attr(test, mockall::automock)]
pub trait ArtifactFetcher: Send + Sync {
    /// Stream `url` into a new file at `dest`, returning the byte count.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`]; callers consult
    /// [`FetchError::is_transient`] to decide whether to retry.
    fn fetch(&self, url: &str, dest: &Utf8Path, cancel: &CancellationToken)
    -> Result<u64, FetchError>;
}

/// HTTP-based fetcher using `ureq`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpFetcher;

impl ArtifactFetcher for HttpFetcher {
    fn fetch(
        &self,
        url: &str,
        dest: &Utf8Path,
        cancel: &CancellationToken,
    ) -> Result<u64, FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled {
                url: url.to_owned(),
            });
        }
        let response = http_agent()
            .get(url)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        let io_err = |source| FetchError::Io {
            path: dest.to_string(),
            source,
        };
        let mut file = std::fs::File::create(dest).map_err(io_err)?;
        let mut body = response.into_body();
        let mut reader = body.as_reader();
        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut total = 0u64;
        loop {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled {
                    url: url.to_owned(),
                });
            }
            let read = reader.read(&mut buffer).map_err(|e| FetchError::Transport {
                url: url.to_owned(),
                reason: e.to_string(),
                transient: true,
            })?;
            if read == 0 {
                break;
            }
            file.write_all(&buffer[..read]).map_err(io_err)?;
            total += read as u64;
        }
        file.sync_all().map_err(io_err)?;
        Ok(total)
    }
}

/// Shared `ureq` agent with request timeout configuration.
pub(crate) fn http_agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(DOWNLOAD_TIMEOUT))
            .build();
        ureq::Agent::new_with_config(config)
    })
}

/// Map a ureq error to a [`FetchError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> FetchError {
    let url = url.to_owned();
    match err {
        ureq::Error::StatusCode(404) => FetchError::NotFound { url },
        ureq::Error::StatusCode(code) => FetchError::Status { url, code: *code },
        ureq::Error::Timeout(_) => FetchError::Timeout { url },
        other => FetchError::Transport {
            url,
            reason: other.to_string(),
            transient: matches!(
                other,
                ureq::Error::Io(_) | ureq::Error::ConnectionFailed | ureq::Error::HostNotFound
            ),
        },
    }
}

/// Bounded exponential backoff for transient fetch failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_backoff: Duration,
    /// Upper bound for any single delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay before attempt `attempt` (1-based; attempt 1 has no delay).
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use bindkit_pipeline::artefact::fetch::RetryPolicy;
    ///
    /// let policy = RetryPolicy::default();
    /// assert_eq!(policy.delay_before(1), Duration::ZERO);
    /// assert_eq!(policy.delay_before(2), Duration::from_millis(500));
    /// assert_eq!(policy.delay_before(3), Duration::from_secs(1));
    /// assert_eq!(policy.delay_before(30), Duration::from_secs(8));
    /// ```
    #[must_use]
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(attempt - 2);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Run `op` until it succeeds, fails permanently, runs out of
    /// attempts, or `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns the last error from `op`, or [`FetchError::Cancelled`] when
    /// cancelled during a backoff.
    pub fn run<T>(
        &self,
        url: &str,
        cancel: &CancellationToken,
        mut op: impl FnMut(u32) -> Result<T, FetchError>,
    ) -> Result<T, FetchError> {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < attempts => {
                    attempt += 1;
                    let delay = self.delay_before(attempt);
                    warn!("{err}; retrying in {delay:?} (attempt {attempt} of {attempts})");
                    if !cancel.sleep(delay) {
                        return Err(FetchError::Cancelled {
                            url: url.to_owned(),
                        });
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn status(code: u16) -> FetchError {
        FetchError::Status {
            url: "https://example.test/a.zip".to_owned(),
            code,
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        }
    }

    #[test]
    fn map_ureq_error_maps_404_to_not_found() {
        let mapped = map_ureq_error("https://example.test/a.zip", &ureq::Error::StatusCode(404));
        assert!(matches!(mapped, FetchError::NotFound { .. }));
    }

    #[rstest]
    #[case::server_error(status(503), true)]
    #[case::client_error(status(403), false)]
    #[case::timeout(FetchError::Timeout { url: String::new() }, true)]
    #[case::not_found(FetchError::NotFound { url: String::new() }, false)]
    fn classifies_transient_failures(#[case] err: FetchError, #[case] transient: bool) {
        assert_eq!(err.is_transient(), transient);
    }

    #[test]
    fn retries_transient_errors_until_success() {
        let mut calls = 0;
        let result = fast_policy().run("u", &CancellationToken::new(), |_| {
            calls += 1;
            if calls < 3 { Err(status(502)) } else { Ok(calls) }
        });
        assert_eq!(result.expect("third attempt succeeds"), 3);
    }

    #[test]
    fn does_not_retry_client_errors() {
        let mut calls = 0;
        let result: Result<(), _> = fast_policy().run("u", &CancellationToken::new(), |_| {
            calls += 1;
            Err(status(401))
        });
        assert!(matches!(result, Err(FetchError::Status { code: 401, .. })));
        assert_eq!(calls, 1);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let mut calls = 0;
        let result: Result<(), _> = fast_policy().run("u", &CancellationToken::new(), |_| {
            calls += 1;
            Err(status(500))
        });
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }

    #[test]
    fn cancellation_stops_backoff() {
        let token = CancellationToken::new();
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(60),
            max_backoff: Duration::from_secs(60),
        };
        let result: Result<(), _> = policy.run("u", &token, |_| {
            token.cancel();
            Err(status(500))
        });
        assert!(matches!(result, Err(FetchError::Cancelled { .. })));
    }

    #[test]
    fn http_fetcher_honours_prior_cancellation() {
        let token = CancellationToken::new();
        token.cancel();
        let result = HttpFetcher.fetch(
            "https://example.test/a.zip",
            Utf8Path::new("unused"),
            &token,
        );
        assert!(matches!(result, Err(FetchError::Cancelled { .. })));
    }
}
