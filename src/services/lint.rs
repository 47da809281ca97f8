//! Lint pipeline: background quality checks for newly created snippets.
//!
//! DESIGN
//! ======
//! Snippet creation enqueues a [`CheckRequest`] on a bounded channel and
//! returns. A single dispatcher task drains the channel and runs each check
//! on its own task, with a semaphore capping how many run at once. The
//! verdict is written back through `SnippetStore::set_status`.
//!
//! ERROR HANDLING
//! ==============
//! Tool failures (spawn errors, non-zero exits, timeouts) become a negative
//! verdict with the failure text as the message. They never stop the
//! dispatcher. A `NotFound` from `set_status` means the snippet expired while
//! its check was in flight and is discarded.
//!
//! TRADE-OFFS
//! ==========
//! The queue lives in memory. Requests still queued when the process dies
//! are lost and those snippets stay `Unchecked` until they expire.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Semaphore, mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::config::{env_parse, env_string};
use crate::error::ErrorCode;
use crate::store::{SnippetId, SnippetStore, StoreError};

const DEFAULT_LINT_LANGUAGES: &str = "go";
const DEFAULT_LINT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_LINT_WORKERS: usize = 2;
const DEFAULT_LINT_QUEUE_CAPACITY: usize = 256;

// =============================================================================
// CONFIG
// =============================================================================

#[derive(Debug, Clone)]
pub struct LintConfig {
    /// Program and whitespace-separated arguments. `None` selects the
    /// pass-through linter.
    pub command: Option<String>,
    /// Languages the command applies to, compared case-insensitively.
    pub languages: Vec<String>,
    pub timeout: Duration,
    /// Maximum checks running at once.
    pub workers: usize,
    pub queue_capacity: usize,
}

impl LintConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let command = env_string("LINT_COMMAND");
        let languages = env_string("LINT_LANGUAGES").unwrap_or_else(|| DEFAULT_LINT_LANGUAGES.to_owned());
        Self {
            command,
            languages: parse_language_list(&languages),
            timeout: Duration::from_secs(env_parse("LINT_TIMEOUT_SECS", DEFAULT_LINT_TIMEOUT_SECS)),
            workers: env_parse("LINT_WORKERS", DEFAULT_LINT_WORKERS).max(1),
            queue_capacity: env_parse("LINT_QUEUE_CAPACITY", DEFAULT_LINT_QUEUE_CAPACITY).max(1),
        }
    }
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            command: None,
            languages: parse_language_list(DEFAULT_LINT_LANGUAGES),
            timeout: Duration::from_secs(DEFAULT_LINT_TIMEOUT_SECS),
            workers: DEFAULT_LINT_WORKERS,
            queue_capacity: DEFAULT_LINT_QUEUE_CAPACITY,
        }
    }
}

fn parse_language_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_owned)
        .collect()
}

// =============================================================================
// LINTERS
// =============================================================================

/// Work item for the pipeline. Carries the code so workers never re-read
/// the store before checking.
#[derive(Debug, Clone)]
pub struct CheckRequest {
    pub snippet_id: SnippetId,
    pub code: String,
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintVerdict {
    pub correct: bool,
    pub message: String,
}

impl LintVerdict {
    #[must_use]
    pub fn accepted(message: impl Into<String>) -> Self {
        Self { correct: true, message: message.into() }
    }

    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self { correct: false, message: message.into() }
    }
}

/// A static-analysis tool. Implementations report failures as a verdict
/// instead of an error.
#[async_trait]
pub trait Linter: Send + Sync {
    async fn check(&self, code: &str, language: Option<&str>) -> LintVerdict;
}

/// Accepts everything with an empty message.
pub struct PassthroughLinter;

#[async_trait]
impl Linter for PassthroughLinter {
    async fn check(&self, _code: &str, _language: Option<&str>) -> LintVerdict {
        LintVerdict::accepted("")
    }
}

/// Runs an external program with the snippet on stdin.
///
/// Exit 0 is a pass with stdout as the message. Any other exit is a fail
/// with stderr, or stdout when stderr is empty. Snippets in languages the
/// tool does not cover pass with an empty message.
pub struct CommandLinter {
    program: String,
    args: Vec<String>,
    languages: Vec<String>,
    timeout: Duration,
}

impl CommandLinter {
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>, languages: Vec<String>, timeout: Duration) -> Self {
        Self { program: program.into(), args, languages, timeout }
    }

    /// Split a configured command line on whitespace. `None` when empty.
    #[must_use]
    pub fn from_command_line(command: &str, languages: Vec<String>, timeout: Duration) -> Option<Self> {
        let mut words = command.split_whitespace().map(str::to_owned);
        let program = words.next()?;
        Some(Self::new(program, words.collect(), languages, timeout))
    }

    fn covers(&self, language: Option<&str>) -> bool {
        language.is_some_and(|lang| self.languages.iter().any(|l| l.eq_ignore_ascii_case(lang)))
    }

    async fn run(&self, code: &str) -> std::io::Result<std::process::Output> {
        let mut child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(code.as_bytes()).await?;
            }
            Ok::<_, std::io::Error>(())
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        match fed {
            Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => {
                debug!(program = %self.program, error = %e, "lint tool stdin write failed");
            }
            _ => {}
        }
        output
    }
}

#[async_trait]
impl Linter for CommandLinter {
    async fn check(&self, code: &str, language: Option<&str>) -> LintVerdict {
        if !self.covers(language) {
            return LintVerdict::accepted("");
        }

        match tokio::time::timeout(self.timeout, self.run(code)).await {
            Ok(Ok(output)) if output.status.success() => {
                LintVerdict::accepted(String::from_utf8_lossy(&output.stdout).trim_end())
            }
            Ok(Ok(output)) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let message = if stderr.trim().is_empty() {
                    String::from_utf8_lossy(&output.stdout).trim_end().to_owned()
                } else {
                    stderr.trim_end().to_owned()
                };
                LintVerdict::rejected(message)
            }
            Ok(Err(e)) => {
                warn!(program = %self.program, error = %e, "lint tool failed to start");
                LintVerdict::rejected(format!("lint tool failed: {e}"))
            }
            Err(_) => {
                warn!(program = %self.program, timeout_ms = self.timeout.as_millis(), "lint tool timed out");
                LintVerdict::rejected(format!("lint tool timed out after {}ms", self.timeout.as_millis()))
            }
        }
    }
}

/// Pick the linter for `config`.
#[must_use]
pub fn build_linter(config: &LintConfig) -> Arc<dyn Linter> {
    let command = config
        .command
        .as_deref()
        .and_then(|c| CommandLinter::from_command_line(c, config.languages.clone(), config.timeout));
    match command {
        Some(linter) => {
            info!(program = %linter.program, languages = ?linter.languages, "lint command configured");
            Arc::new(linter)
        }
        None => {
            info!("no lint command configured; every snippet passes");
            Arc::new(PassthroughLinter)
        }
    }
}

// =============================================================================
// QUEUE
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum LintError {
    #[error("lint queue is closed")]
    QueueClosed,
}

impl ErrorCode for LintError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::QueueClosed => "E_LINT_QUEUE_CLOSED",
        }
    }
}

/// Producer handle for the lint queue. Cheap to clone.
#[derive(Clone)]
pub struct LintQueue {
    tx: mpsc::Sender<CheckRequest>,
}

impl LintQueue {
    /// Queue a check, waiting while the queue is full.
    ///
    /// # Errors
    ///
    /// `QueueClosed` once the pool has shut down.
    pub async fn enqueue(&self, request: CheckRequest) -> Result<(), LintError> {
        self.tx.send(request).await.map_err(|_| LintError::QueueClosed)
    }
}

// =============================================================================
// POOL
// =============================================================================

/// Owns the dispatcher task. Dropping the pool without [`LintPool::shutdown`]
/// also closes the queue, but nothing waits for the drain.
pub struct LintPool {
    queue: LintQueue,
    shutdown_tx: oneshot::Sender<()>,
    dispatcher: JoinHandle<()>,
}

impl LintPool {
    #[must_use]
    pub fn spawn(config: &LintConfig, linter: Arc<dyn Linter>, store: Arc<dyn SnippetStore>) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let workers = config.workers.max(1);
        info!(workers, queue_capacity = config.queue_capacity, "lint pool started");
        let dispatcher = tokio::spawn(dispatch(rx, shutdown_rx, workers, linter, store));
        Self { queue: LintQueue { tx }, shutdown_tx, dispatcher }
    }

    #[must_use]
    pub fn queue(&self) -> LintQueue {
        self.queue.clone()
    }

    /// Close the queue, finish every queued and in-flight check, then return.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.dispatcher.await {
            error!(error = %e, "lint dispatcher panicked");
        }
        info!("lint pool drained");
    }
}

async fn dispatch(
    mut rx: mpsc::Receiver<CheckRequest>,
    mut shutdown_rx: oneshot::Receiver<()>,
    workers: usize,
    linter: Arc<dyn Linter>,
    store: Arc<dyn SnippetStore>,
) {
    let permits = Arc::new(Semaphore::new(workers));
    let mut checks = JoinSet::new();
    let mut closing = false;

    loop {
        let next = tokio::select! {
            _ = &mut shutdown_rx, if !closing => {
                closing = true;
                rx.close();
                debug!("lint queue closed; draining");
                continue;
            }
            next = rx.recv() => next,
        };
        let Some(request) = next else {
            break;
        };
        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
            break;
        };

        let linter = Arc::clone(&linter);
        let store = Arc::clone(&store);
        checks.spawn(async move {
            let _permit = permit;
            run_check(linter.as_ref(), store.as_ref(), request).await;
        });
        while let Some(done) = checks.try_join_next() {
            log_join(done);
        }
    }

    while let Some(done) = checks.join_next().await {
        log_join(done);
    }
}

fn log_join(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        error!(error = %e, "lint check task panicked");
    }
}

async fn run_check(linter: &dyn Linter, store: &dyn SnippetStore, request: CheckRequest) {
    let snippet_id = request.snippet_id;
    let verdict = linter.check(&request.code, request.language.as_deref()).await;

    match store.set_status(snippet_id, verdict.correct, &verdict.message).await {
        Ok(()) => info!(%snippet_id, correct = verdict.correct, "lint check completed"),
        Err(StoreError::NotFound) => debug!(%snippet_id, "lint result discarded; snippet expired"),
        Err(e) => error!(%snippet_id, error = %e, "failed to record lint result"),
    }
}

#[cfg(test)]
#[path = "lint_test.rs"]
mod tests;
