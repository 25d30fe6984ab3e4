//! BatchProcessClient - Persistent subsetter process speaking the batch protocol
//!
//! The engine is launched once as `<engine> --batch` (optionally behind an
//! execution wrapper) and then fed one request per line:
//!
//! - request: argument tokens joined with `;`, terminated by `\n`
//! - response: one line, exactly `success` on success
//!
//! The exchange is strictly half-duplex. A reader thread forwards stdout lines
//! over a channel so a response can be awaited with a deadline. An engine that
//! died, hung or closed its pipes is dropped and lazily respawned on the next
//! submission; the request that hit the problem is reported as a failure.

use std::ffi::OsString;
use std::fmt;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::traits::SubsetEngine;

/// Response token signalling a successful subset
pub const SUCCESS_TOKEN: &str = "success";

/// Flag that switches the engine into batch mode
pub const BATCH_FLAG: &str = "--batch";

/// How long a closed-stdin engine gets to exit before it is killed
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Errors talking to the batch engine
#[derive(Debug, Error)]
pub enum BatchError {
    /// The engine process could not be started
    #[error("failed to launch `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// Writing the request or reading the response failed
    #[error("I/O error talking to the engine: {0}")]
    Io(#[from] io::Error),

    /// No response line arrived in time
    #[error("no response from the engine within {0:?}")]
    Timeout(Duration),

    /// The engine closed its output before answering
    #[error("engine closed its output stream")]
    Closed,
}

/// One subsetting invocation as command-line-style arguments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchRequest {
    args: Vec<String>,
}

impl BatchRequest {
    /// Create an empty request
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one argument
    pub fn push(&mut self, arg: impl Into<String>) {
        self.args.push(arg.into());
    }

    /// Append one argument (builder form)
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.push(arg);
        self
    }

    /// Append several arguments in order
    pub fn extend<I, S>(&mut self, args: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
    }

    /// The arguments in submission order
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Wire form: `;`-joined tokens plus the terminating newline
    pub fn to_line(&self) -> String {
        let mut line = self.args.join(";");
        line.push('\n');
        line
    }
}

impl fmt::Display for BatchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.args.join(" "))
    }
}

/// Status of one batch request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchResult {
    /// The engine answered `success`
    Success,
    /// Anything else; the reason is for diagnostics only
    Failure { reason: String },
}

impl BatchResult {
    /// Classify a raw response line
    pub fn from_response(line: &str) -> Self {
        let token = line.trim();
        if token == SUCCESS_TOKEN {
            BatchResult::Success
        } else if token.is_empty() {
            BatchResult::Failure {
                reason: "engine returned an empty response".to_string(),
            }
        } else {
            BatchResult::Failure {
                reason: format!("engine responded {token:?}"),
            }
        }
    }

    /// Returns true for [`BatchResult::Success`]
    pub fn is_success(&self) -> bool {
        matches!(self, BatchResult::Success)
    }
}

/// How to launch the engine
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// Path to the subsetter executable
    pub engine: PathBuf,
    /// Command words prefixed to the launch (e.g. an emulator for cross builds)
    pub wrapper: Vec<String>,
    /// Upper bound on the wait for one response; `None` waits forever
    pub response_timeout: Option<Duration>,
}

impl LaunchConfig {
    /// Launch `engine --batch` directly, waiting forever for responses
    pub fn new(engine: impl Into<PathBuf>) -> Self {
        Self {
            engine: engine.into(),
            wrapper: Vec::new(),
            response_timeout: None,
        }
    }

    /// Set the execution wrapper from a shell-quoted command string
    pub fn with_wrapper(mut self, wrapper: Option<String>) -> Self {
        self.wrapper = wrapper.as_deref().map(split_wrapper).unwrap_or_default();
        self
    }

    /// Set the response deadline
    pub fn with_response_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.response_timeout = timeout;
        self
    }

    fn argv(&self) -> Vec<OsString> {
        let mut argv: Vec<OsString> = self.wrapper.iter().map(OsString::from).collect();
        argv.push(self.engine.clone().into_os_string());
        argv.push(OsString::from(BATCH_FLAG));
        argv
    }

    /// Human-readable launch command
    pub fn command_line(&self) -> String {
        self.argv()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn command(&self) -> Command {
        let argv = self.argv();
        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..])
            .env("LC_ALL", "C")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        cmd
    }
}

/// Split a wrapper command into words, honoring shell quoting
///
/// Unbalanced quotes fall back to plain whitespace splitting.
fn split_wrapper(wrapper: &str) -> Vec<String> {
    shlex::split(wrapper).unwrap_or_else(|| {
        warn!(%wrapper, "cannot parse wrapper quoting; splitting on whitespace");
        wrapper.split_whitespace().map(str::to_string).collect()
    })
}

/// A live engine process and its pipes
struct BatchProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    responses: Receiver<io::Result<String>>,
}

impl BatchProcess {
    fn spawn(config: &LaunchConfig) -> Result<Self, BatchError> {
        let mut child = config
            .command()
            .spawn()
            .map_err(|source| BatchError::Spawn {
                command: config.command_line(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or(BatchError::Closed)?;
        let stdout = child.stdout.take().ok_or(BatchError::Closed)?;

        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("batch-reader".to_string())
            .spawn(move || {
                let mut reader = BufReader::new(stdout);
                loop {
                    let mut line = String::new();
                    match reader.read_line(&mut line) {
                        Ok(0) => break,
                        Ok(_) => {
                            if tx.send(Ok(line)).is_err() {
                                break;
                            }
                        }
                        Err(err) => {
                            let _ = tx.send(Err(err));
                            break;
                        }
                    }
                }
            })?;

        debug!(pid = child.id(), command = %config.command_line(), "spawned batch engine");

        Ok(Self {
            child,
            stdin: Some(stdin),
            responses: rx,
        })
    }

    fn has_exited(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                debug!(pid = self.child.id(), %status, "batch engine exited");
                true
            }
            Ok(None) => false,
            Err(err) => {
                warn!(pid = self.child.id(), error = %err, "cannot poll batch engine");
                true
            }
        }
    }

    fn exchange(
        &mut self,
        request: &BatchRequest,
        timeout: Option<Duration>,
    ) -> Result<String, BatchError> {
        let stdin = self.stdin.as_mut().ok_or(BatchError::Closed)?;
        stdin.write_all(request.to_line().as_bytes())?;
        stdin.flush()?;

        let received = match timeout {
            Some(limit) => self.responses.recv_timeout(limit).map_err(|err| match err {
                RecvTimeoutError::Timeout => BatchError::Timeout(limit),
                RecvTimeoutError::Disconnected => BatchError::Closed,
            })?,
            None => self.responses.recv().map_err(|_| BatchError::Closed)?,
        };
        Ok(received?)
    }

    fn terminate(&mut self) {
        // EOF on stdin ends a healthy engine's batch loop.
        drop(self.stdin.take());

        let deadline = Instant::now() + SHUTDOWN_GRACE;
        while Instant::now() < deadline {
            match self.child.try_wait() {
                Ok(Some(_)) => return,
                Ok(None) => thread::sleep(Duration::from_millis(10)),
                Err(_) => break,
            }
        }

        debug!(pid = self.child.id(), "killing batch engine");
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for BatchProcess {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Owner of the long-lived engine process
///
/// # Example
///
/// ```rust,ignore
/// let mut client = BatchProcessClient::start(LaunchConfig::new("hb-subset"))?;
/// let request = BatchRequest::new()
///     .arg("--font-file=Roboto.ttf")
///     .arg("--output-file=/tmp/out.ttf")
///     .arg("--unicodes=61,62");
/// assert!(client.submit(&request).is_success());
/// ```
pub struct BatchProcessClient {
    config: LaunchConfig,
    process: Option<BatchProcess>,
    spawns: usize,
}

impl BatchProcessClient {
    /// Launch the engine eagerly
    pub fn start(config: LaunchConfig) -> Result<Self, BatchError> {
        let process = BatchProcess::spawn(&config)?;
        info!(command = %config.command_line(), "batch engine started");
        Ok(Self {
            config,
            process: Some(process),
            spawns: 1,
        })
    }

    /// How many times the engine was relaunched after the first start
    pub fn restarts(&self) -> usize {
        self.spawns.saturating_sub(1)
    }

    /// Whether an engine process is currently alive
    pub fn is_running(&mut self) -> bool {
        self.process.as_mut().is_some_and(|p| !p.has_exited())
    }

    fn ensure_running(&mut self) -> Result<&mut BatchProcess, BatchError> {
        if !self.is_running() {
            if self.process.take().is_some() {
                warn!(restarts = self.spawns, "batch engine is gone; restarting");
            }
            self.process = Some(BatchProcess::spawn(&self.config)?);
            self.spawns += 1;
        }
        self.process.as_mut().ok_or(BatchError::Closed)
    }

    /// Submit one request, surfacing protocol errors
    ///
    /// After any error the engine is discarded so the next submission starts
    /// a fresh one.
    pub fn try_submit(&mut self, request: &BatchRequest) -> Result<BatchResult, BatchError> {
        let timeout = self.config.response_timeout;
        let process = self.ensure_running()?;
        match process.exchange(request, timeout) {
            Ok(line) => Ok(BatchResult::from_response(&line)),
            Err(err) => {
                self.process = None;
                Err(err)
            }
        }
    }
}

impl SubsetEngine for BatchProcessClient {
    fn program(&self) -> String {
        self.config.engine.display().to_string()
    }

    fn submit(&mut self, request: &BatchRequest) -> BatchResult {
        match self.try_submit(request) {
            Ok(result) => result,
            Err(err) => {
                warn!(error = %err, "batch request failed");
                BatchResult::Failure {
                    reason: err.to_string(),
                }
            }
        }
    }

    /// Stop the engine, closing its input first
    fn shutdown(&mut self) {
        if self.process.take().is_some() {
            info!(restarts = self.restarts(), "batch engine stopped");
        }
    }
}
