use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;
use crate::store::{MemorySnippetStore, NewSnippet, SnippetStatus};

const HOUR: Duration = Duration::from_secs(3600);

/// Records every call and answers with a fixed verdict after `delay`.
struct ScriptedLinter {
    verdict: LintVerdict,
    delay: Duration,
    seen: Mutex<Vec<String>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedLinter {
    fn new(verdict: LintVerdict, delay: Duration) -> Self {
        Self { verdict, delay, seen: Mutex::new(Vec::new()), running: AtomicUsize::new(0), peak: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl Linter for ScriptedLinter {
    async fn check(&self, code: &str, _language: Option<&str>) -> LintVerdict {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.seen.lock().unwrap().push(code.to_owned());
        self.running.fetch_sub(1, Ordering::SeqCst);
        self.verdict.clone()
    }
}

fn config(workers: usize, queue_capacity: usize) -> LintConfig {
    LintConfig { workers, queue_capacity, ..LintConfig::default() }
}

async fn create(store: &MemorySnippetStore, code: &str, ttl: Duration) -> CheckRequest {
    let snippet_id = store
        .create_snippet(NewSnippet { code: code.into(), language: Some("Go".into()), ttl })
        .await
        .unwrap();
    CheckRequest { snippet_id, code: code.into(), language: Some("Go".into()) }
}

fn sh(script: &str, timeout: Duration) -> CommandLinter {
    CommandLinter::new("sh", vec!["-c".into(), script.into()], vec!["go".into()], timeout)
}

// =============================================================================
// pool
// =============================================================================

#[tokio::test]
async fn queued_checks_are_recorded_on_the_snippet() {
    let store = Arc::new(MemorySnippetStore::new());
    let linter = Arc::new(ScriptedLinter::new(LintVerdict::rejected("2 clones"), Duration::ZERO));
    let pool = LintPool::spawn(&config(2, 8), linter.clone(), store.clone());

    let request = create(&store, "package main", HOUR).await;
    let id = request.snippet_id;
    pool.queue().enqueue(request).await.unwrap();
    pool.shutdown().await;

    let snippet = store.get_snippet_by_id(id).await.unwrap();
    assert_eq!(snippet.status, SnippetStatus::Checked { correct: false, message: "2 clones".into() });
    assert_eq!(linter.seen.lock().unwrap().as_slice(), ["package main"]);
}

#[tokio::test]
async fn shutdown_drains_every_queued_request() {
    let store = Arc::new(MemorySnippetStore::new());
    let linter = Arc::new(ScriptedLinter::new(LintVerdict::accepted("ok"), Duration::from_millis(5)));
    let pool = LintPool::spawn(&config(2, 64), linter.clone(), store.clone());
    let queue = pool.queue();

    let mut ids = Vec::new();
    for i in 0..20 {
        let request = create(&store, &format!("snippet {i}"), HOUR).await;
        ids.push(request.snippet_id);
        queue.enqueue(request).await.unwrap();
    }
    pool.shutdown().await;

    for id in ids {
        assert!(store.get_snippet_by_id(id).await.unwrap().status.is_checked());
    }
    assert_eq!(linter.seen.lock().unwrap().len(), 20);
}

#[tokio::test]
async fn worker_count_bounds_concurrent_checks() {
    let store = Arc::new(MemorySnippetStore::new());
    let linter = Arc::new(ScriptedLinter::new(LintVerdict::accepted(""), Duration::from_millis(20)));
    let pool = LintPool::spawn(&config(2, 64), linter.clone(), store.clone());
    let queue = pool.queue();

    for i in 0..8 {
        queue.enqueue(create(&store, &format!("s{i}"), HOUR).await).await.unwrap();
    }
    pool.shutdown().await;

    assert!(linter.peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(linter.seen.lock().unwrap().len(), 8);
}

#[tokio::test]
async fn enqueue_after_shutdown_is_queue_closed() {
    let store = Arc::new(MemorySnippetStore::new());
    let pool = LintPool::spawn(&config(1, 4), Arc::new(PassthroughLinter), store.clone());
    let queue = pool.queue();
    pool.shutdown().await;

    let request = create(&store, "late", HOUR).await;
    let id = request.snippet_id;
    assert!(matches!(queue.enqueue(request).await, Err(LintError::QueueClosed)));
    assert_eq!(store.get_snippet_by_id(id).await.unwrap().status, SnippetStatus::Unchecked);
}

#[tokio::test]
async fn expired_snippet_result_is_discarded() {
    let store = Arc::new(MemorySnippetStore::new());
    let linter = Arc::new(ScriptedLinter::new(LintVerdict::accepted(""), Duration::ZERO));
    let pool = LintPool::spawn(&config(1, 4), linter.clone(), store.clone());

    let expired = create(&store, "gone", Duration::ZERO).await;
    let live = create(&store, "here", HOUR).await;
    let live_id = live.snippet_id;
    pool.queue().enqueue(expired).await.unwrap();
    pool.queue().enqueue(live).await.unwrap();
    pool.shutdown().await;

    assert_eq!(linter.seen.lock().unwrap().len(), 2);
    assert!(store.get_snippet_by_id(live_id).await.unwrap().status.is_checked());
}

#[tokio::test]
async fn full_queue_applies_backpressure() {
    let store = Arc::new(MemorySnippetStore::new());
    let linter = Arc::new(ScriptedLinter::new(LintVerdict::accepted(""), Duration::from_millis(200)));
    let pool = LintPool::spawn(&config(1, 1), linter.clone(), store.clone());
    let queue = pool.queue();

    // One running, one parked on the semaphore in the dispatcher, one buffered.
    for i in 0..3 {
        queue.enqueue(create(&store, &format!("s{i}"), HOUR).await).await.unwrap();
    }
    let blocked = tokio::time::timeout(
        Duration::from_millis(20),
        queue.enqueue(create(&store, "overflow", HOUR).await),
    )
    .await;
    assert!(blocked.is_err(), "enqueue should wait while the queue is full");
    pool.shutdown().await;
}

// =============================================================================
// command linter
// =============================================================================

#[tokio::test]
async fn command_success_is_correct_with_stdout() {
    let verdict = sh("cat", Duration::from_secs(5)).check("package main\n", Some("Go")).await;
    assert_eq!(verdict, LintVerdict::accepted("package main"));
}

#[tokio::test]
async fn command_failure_reports_stderr() {
    let verdict = sh("echo clone found >&2; exit 1", Duration::from_secs(5))
        .check("x", Some("go"))
        .await;
    assert_eq!(verdict, LintVerdict::rejected("clone found"));
}

#[tokio::test]
async fn command_failure_falls_back_to_stdout() {
    let verdict = sh("echo lines 3-9; exit 2", Duration::from_secs(5)).check("x", Some("go")).await;
    assert_eq!(verdict, LintVerdict::rejected("lines 3-9"));
}

#[tokio::test]
async fn command_timeout_is_incorrect() {
    let verdict = sh("sleep 5", Duration::from_millis(100)).check("x", Some("go")).await;
    assert!(!verdict.correct);
    assert!(verdict.message.contains("timed out"), "{}", verdict.message);
}

#[tokio::test]
async fn missing_program_is_incorrect() {
    let linter = CommandLinter::new("/nonexistent/lint-tool", Vec::new(), vec!["go".into()], Duration::from_secs(1));
    let verdict = linter.check("x", Some("go")).await;
    assert!(!verdict.correct);
    assert!(verdict.message.starts_with("lint tool failed"), "{}", verdict.message);
}

#[tokio::test]
async fn command_ignoring_stdin_still_succeeds() {
    let big = "x".repeat(1 << 20);
    let verdict = sh("exit 0", Duration::from_secs(5)).check(&big, Some("go")).await;
    assert!(verdict.correct);
}

#[tokio::test]
async fn uncovered_language_passes_without_running() {
    let linter = sh("exit 1", Duration::from_secs(5));
    assert_eq!(linter.check("x", Some("Python")).await, LintVerdict::accepted(""));
    assert_eq!(linter.check("x", None).await, LintVerdict::accepted(""));
}

// =============================================================================
// config
// =============================================================================

#[test]
fn from_command_line_splits_program_and_args() {
    let linter = CommandLinter::from_command_line("dupl -t 15 -", vec![], Duration::from_secs(1)).unwrap();
    assert_eq!(linter.program, "dupl");
    assert_eq!(linter.args, ["-t", "15", "-"]);
    assert!(CommandLinter::from_command_line("   ", vec![], Duration::from_secs(1)).is_none());
}

#[test]
fn language_list_is_trimmed_and_skips_empties() {
    assert_eq!(parse_language_list(" go, Rust ,,"), ["go", "Rust"]);
}
