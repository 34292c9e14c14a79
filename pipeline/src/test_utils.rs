//! Shared test utilities for the pipeline crate.
#![expect(
    clippy::expect_used,
    reason = "test helpers fail loudly on broken fixtures"
)]

use crate::artefact::checksum::Checksum;
use crate::artefact::fetch::{ArtifactFetcher, CancellationToken, FetchError};
use crate::builder::{BuildError, CommandExecutor};
use crate::consumer::override_mode::OVERRIDE_ENV_VAR;
use crate::interface::abi;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::{BTreeMap, VecDeque};
use std::process::{ExitStatus, Output};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code as u32)
}

/// Creates a successful command `Output` with empty stdout and stderr.
#[must_use]
pub fn success_output() -> Output {
    Output {
        status: exit_status(0),
        stdout: Vec::new(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given stderr message.
#[must_use]
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(101),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// Bytes of a fake native library advertising `digest`.
#[must_use]
pub fn fake_binary(digest: &Checksum, payload: &[u8]) -> Vec<u8> {
    let mut bytes = b"\x7fELF".to_vec();
    bytes.extend_from_slice(payload);
    bytes.extend(abi::fingerprint(digest));
    bytes
}

/// Write a fake native library at `path`, creating parent directories.
///
/// # Panics
///
/// Panics if the file cannot be written.
pub fn write_fake_binary(path: &Utf8Path, digest: &Checksum, payload: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create binary directory");
    }
    std::fs::write(path, fake_binary(digest, payload)).expect("write fake binary");
}

/// Represents an expected command invocation for testing.
#[derive(Debug)]
pub struct ExpectedCall {
    /// The command to execute (e.g., "cargo").
    pub cmd: &'static str,
    /// The arguments to pass to the command.
    pub args: Vec<String>,
    /// The result to return when this command is invoked.
    pub result: Result<Output, BuildError>,
    /// A file the command "produces" when invoked, as a compiler would.
    pub produces: Option<(Utf8PathBuf, Vec<u8>)>,
    /// Environment the command must receive; unchecked when `None`.
    pub env: Option<Vec<(String, String)>>,
}

impl ExpectedCall {
    /// Expect `cmd args...` and answer with `result`.
    #[must_use]
    pub fn new(cmd: &'static str, args: &[&str], result: Result<Output, BuildError>) -> Self {
        Self {
            cmd,
            args: args.iter().map(|a| (*a).to_owned()).collect(),
            result,
            produces: None,
            env: None,
        }
    }

    /// Require the call to carry exactly `env`.
    #[must_use]
    pub fn with_env(mut self, env: &[(&str, &str)]) -> Self {
        self.env = Some(
            env.iter()
                .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
                .collect(),
        );
        self
    }

    /// Write `bytes` to `path` when the call is made.
    #[must_use]
    pub fn producing(mut self, path: Utf8PathBuf, bytes: Vec<u8>) -> Self {
        self.produces = Some((path, bytes));
        self
    }
}

impl ExpectedCall {
    fn env_matches(&self, env: &[(&str, &str)]) -> bool {
        self.env.as_ref().is_none_or(|wanted| {
            wanted.len() == env.len()
                && wanted
                    .iter()
                    .zip(env)
                    .all(|((wk, wv), (k, v))| wk == k && wv == v)
        })
    }
}

/// A stub implementation of `CommandExecutor` for testing.
///
/// Calls are matched by command and arguments rather than order, so the
/// stub can serve builds running in parallel.
#[derive(Debug)]
pub struct StubExecutor {
    expected: Mutex<Vec<ExpectedCall>>,
}

impl StubExecutor {
    /// Creates a new `StubExecutor` with the given expected calls.
    #[must_use]
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: Mutex::new(expected),
        }
    }

    /// Asserts that all expected command invocations have been consumed.
    ///
    /// # Panics
    ///
    /// Panics if there are remaining expected calls that were not invoked.
    pub fn assert_finished(&self) {
        let remaining = self.expected.lock().expect("stub lock");
        assert!(
            remaining.is_empty(),
            "expected no further command invocations, {} remain",
            remaining.len()
        );
    }
}

impl CommandExecutor for StubExecutor {
    fn run(&self, cmd: &str, args: &[&str], env: &[(&str, &str)]) -> Result<Output, BuildError> {
        let mut expected = self.expected.lock().expect("stub lock");
        let Some(index) = expected
            .iter()
            .position(|call| call.cmd == cmd && call.args == args && call.env_matches(env))
        else {
            return Err(BuildError::StubMismatch {
                message: format!("unexpected invocation: {cmd} {} (env: {env:?})", args.join(" ")),
            });
        };
        let call = expected.remove(index);
        if let Some((path, bytes)) = call.produces {
            write_fake_file(&path, &bytes);
        }
        call.result
    }
}

fn write_fake_file(path: &Utf8Path, bytes: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create output directory");
    }
    std::fs::write(path, bytes).expect("write produced file");
}

/// An `ArtifactFetcher` serving scripted responses from memory.
///
/// Each URL has a queue of responses consumed in order; the last
/// successful response keeps being served once the queue drains.
#[derive(Debug, Default)]
pub struct StubFetcher {
    responses: Mutex<BTreeMap<String, VecDeque<Result<Vec<u8>, FetchError>>>>,
    calls: AtomicUsize,
}

impl StubFetcher {
    /// Create a fetcher with no responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bytes` for `url`.
    #[must_use]
    pub fn serving(self, url: &str, bytes: Vec<u8>) -> Self {
        self.scripted(url, vec![Ok(bytes)])
    }

    /// Serve `responses` for `url`, one per request.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn scripted(self, url: &str, responses: Vec<Result<Vec<u8>, FetchError>>) -> Self {
        self.responses
            .lock()
            .expect("stub lock")
            .insert(url.to_owned(), responses.into());
        self
    }

    /// Number of fetches made so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ArtifactFetcher for StubFetcher {
    fn fetch(
        &self,
        url: &str,
        dest: &Utf8Path,
        cancel: &CancellationToken,
    ) -> Result<u64, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled {
                url: url.to_owned(),
            });
        }
        let mut responses = self.responses.lock().expect("stub lock");
        let queue = responses.get_mut(url);
        let next = match queue {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => match queue.front() {
                Some(Ok(bytes)) => Some(Ok(bytes.clone())),
                _ => queue.pop_front(),
            },
            None => None,
        };
        match next {
            Some(Ok(bytes)) => {
                write_fake_file(dest, &bytes);
                Ok(bytes.len() as u64)
            }
            Some(Err(err)) => Err(err),
            None => Err(FetchError::NotFound {
                url: url.to_owned(),
            }),
        }
    }
}

/// Run `f` with the local override variable set to `value` (or unset).
pub fn with_override_env<R>(value: Option<&str>, f: impl FnOnce() -> R) -> R {
    temp_env::with_var(OVERRIDE_ENV_VAR, value, f)
}
