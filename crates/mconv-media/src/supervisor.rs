//! Encoder process supervision.
//!
//! [`ProcessSupervisor::run`] spawns the encoder, drains its stderr on a
//! separate task for the whole run, and races process exit against the
//! deadline. A fixed-size semaphore caps how many encoders run at once.

use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStderr, Command};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, warn, Instrument};

use crate::metrics;
use crate::progress::{ProgressParser, StderrLine};

/// How long to wait for stderr to reach EOF once the process is gone.
const DRAIN_GRACE: Duration = Duration::from_secs(2);
const TRUNCATION_MARKER: &str = "[... earlier output truncated ...]";

/// Bounded tail of encoder diagnostics.
#[derive(Debug)]
pub struct DiagnosticLog {
    lines: VecDeque<String>,
    bytes: usize,
    max_bytes: usize,
    truncated: bool,
}

impl DiagnosticLog {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            bytes: 0,
            max_bytes,
            truncated: false,
        }
    }

    /// Append a line, evicting the oldest lines once over budget.
    pub fn push(&mut self, line: &str) {
        let mut line = line.to_string();
        // Each stored line also costs one byte for its newline
        let line_budget = self.max_bytes.saturating_sub(1);
        if line.len() > line_budget {
            let mut cut = line_budget;
            while !line.is_char_boundary(cut) {
                cut -= 1;
            }
            line.truncate(cut);
            self.truncated = true;
        }

        self.bytes += line.len() + 1;
        self.lines.push_back(line);

        while self.bytes > self.max_bytes {
            match self.lines.pop_front() {
                Some(old) => {
                    self.bytes -= old.len() + 1;
                    self.truncated = true;
                }
                None => break,
            }
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn into_text(self) -> String {
        let mut text = String::with_capacity(self.bytes + TRUNCATION_MARKER.len() + 1);
        if self.truncated {
            text.push_str(TRUNCATION_MARKER);
            text.push('\n');
        }
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                text.push('\n');
            }
            text.push_str(line);
        }
        text
    }
}

/// Terminal state of one supervised run. Exactly one variant applies.
#[derive(Debug)]
pub enum ProcessOutcome {
    /// The process exited on its own. `exit_code` is `None` when it was
    /// killed by a signal.
    Exited {
        exit_code: Option<i32>,
        diagnostics: String,
    },
    /// The deadline fired first and the process was killed.
    TimedOut { diagnostics: String },
    /// The process could not be started.
    SpawnFailed { error: std::io::Error },
}

impl ProcessOutcome {
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ProcessOutcome::Exited { exit_code, .. } => *exit_code,
            _ => None,
        }
    }

    pub fn timed_out(&self) -> bool {
        matches!(self, ProcessOutcome::TimedOut { .. })
    }

    pub fn is_success(&self) -> bool {
        self.exit_code() == Some(0)
    }

    pub fn spawn_error(&self) -> Option<&std::io::Error> {
        match self {
            ProcessOutcome::SpawnFailed { error } => Some(error),
            _ => None,
        }
    }

    pub fn diagnostics(&self) -> &str {
        match self {
            ProcessOutcome::Exited { diagnostics, .. } | ProcessOutcome::TimedOut { diagnostics } => {
                diagnostics
            }
            ProcessOutcome::SpawnFailed { .. } => "",
        }
    }
}

/// Runs encoder processes under a deadline with bounded concurrency.
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    permits: Arc<Semaphore>,
    max_concurrent: usize,
    max_diagnostic_bytes: usize,
}

impl ProcessSupervisor {
    pub fn new(max_concurrent: usize, max_diagnostic_bytes: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            max_diagnostic_bytes,
        }
    }

    /// Encoder processes currently running.
    pub fn active(&self) -> usize {
        self.max_concurrent - self.permits.available_permits()
    }

    /// Run `program` with `args`, killing it if it outlives `deadline`.
    ///
    /// Waits for a free slot first; the deadline starts once the process has
    /// been spawned.
    pub async fn run(&self, program: &Path, args: &[String], deadline: Duration) -> ProcessOutcome {
        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                return ProcessOutcome::SpawnFailed {
                    error: std::io::Error::other("encoder admission gate closed"),
                }
            }
        };
        let _active = metrics::ActiveEncode::start();

        self.run_admitted(program, args, deadline).await
    }

    async fn run_admitted(&self, program: &Path, args: &[String], deadline: Duration) -> ProcessOutcome {
        debug!("Running encoder: {} {}", program.display(), args.join(" "));

        let mut child = match Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(error) => {
                warn!(program = %program.display(), "Failed to spawn encoder: {}", error);
                return ProcessOutcome::SpawnFailed { error };
            }
        };

        let started = Instant::now();
        let drain = child.stderr.take().map(|stderr| {
            tokio::spawn(drain_stderr(stderr, self.max_diagnostic_bytes).in_current_span())
        });

        match tokio::time::timeout(deadline, child.wait()).await {
            Ok(Ok(status)) => {
                debug!(
                    exit_code = ?status.code(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Encoder exited"
                );
                ProcessOutcome::Exited {
                    exit_code: status.code(),
                    diagnostics: collect_diagnostics(drain).await,
                }
            }
            Ok(Err(e)) => {
                warn!("Failed waiting for encoder, killing it: {}", e);
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill encoder: {}", e);
                }
                let mut diagnostics = collect_diagnostics(drain).await;
                if !diagnostics.is_empty() {
                    diagnostics.push('\n');
                }
                diagnostics.push_str(&format!("failed to wait for encoder: {}", e));
                ProcessOutcome::Exited {
                    exit_code: None,
                    diagnostics,
                }
            }
            Err(_) => {
                warn!(
                    deadline_secs = deadline.as_secs_f64(),
                    "Encoder exceeded deadline, killing process"
                );
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill encoder: {}", e);
                }
                ProcessOutcome::TimedOut {
                    diagnostics: collect_diagnostics(drain).await,
                }
            }
        }
    }
}

/// Read stderr to EOF, logging progress and keeping the diagnostic tail.
async fn drain_stderr(stderr: ChildStderr, max_bytes: usize) -> DiagnosticLog {
    let mut reader = BufReader::new(stderr);
    let mut parser = ProgressParser::new();
    let mut log = DiagnosticLog::new(max_bytes);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                // FFmpeg echoes file names verbatim, which need not be UTF-8
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\r', '\n']);
                match parser.feed(line) {
                    StderrLine::ProgressBlock(progress) => debug!(
                        frame = progress.frame,
                        out_time_ms = progress.out_time_ms,
                        speed = progress.speed,
                        "Encoder progress"
                    ),
                    StderrLine::Progress => {}
                    StderrLine::Diagnostic => {
                        if !line.trim().is_empty() {
                            log.push(line);
                        }
                    }
                }
            }
            Err(e) => {
                debug!("Stopped reading encoder stderr: {}", e);
                break;
            }
        }
    }

    log
}

async fn collect_diagnostics(drain: Option<JoinHandle<DiagnosticLog>>) -> String {
    let Some(mut handle) = drain else {
        return String::new();
    };

    match tokio::time::timeout(DRAIN_GRACE, &mut handle).await {
        Ok(Ok(log)) => log.into_text(),
        Ok(Err(e)) => {
            warn!("Encoder stderr reader failed: {}", e);
            String::new()
        }
        Err(_) => {
            // A grandchild still holds the pipe open
            warn!("Encoder stderr still open after exit, abandoning reader");
            handle.abort();
            String::new()
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sh(script: &str) -> (PathBuf, Vec<String>) {
        (
            PathBuf::from("/bin/sh"),
            vec!["-c".to_string(), script.to_string()],
        )
    }

    #[test]
    fn test_diagnostic_log_keeps_tail() {
        let mut log = DiagnosticLog::new(16);
        log.push("first line");
        log.push("second");
        log.push("third");
        assert!(log.is_truncated());
        let text = log.into_text();
        assert!(text.starts_with(TRUNCATION_MARKER));
        assert!(text.ends_with("second\nthird"));
        assert!(!text.contains("first"));
    }

    #[test]
    fn test_diagnostic_log_truncates_long_line() {
        let mut log = DiagnosticLog::new(8);
        log.push("ééééééééé");
        assert!(log.is_truncated());
        let text = log.into_text();
        assert!(text.lines().last().unwrap().len() <= 8);
    }

    #[test]
    fn test_diagnostic_log_untruncated() {
        let mut log = DiagnosticLog::new(1024);
        log.push("a");
        log.push("b");
        assert!(!log.is_truncated());
        assert_eq!(log.into_text(), "a\nb");
    }

    #[tokio::test]
    async fn test_exit_code_and_diagnostics() {
        let supervisor = ProcessSupervisor::new(2, 4096);
        let (program, args) = sh("echo 'frame=1' >&2; echo 'progress=end' >&2; echo 'boom' >&2; exit 3");

        let outcome = supervisor.run(&program, &args, Duration::from_secs(10)).await;

        assert_eq!(outcome.exit_code(), Some(3));
        assert!(!outcome.timed_out());
        assert!(!outcome.is_success());
        assert_eq!(outcome.diagnostics(), "boom");
    }

    #[tokio::test]
    async fn test_success() {
        let supervisor = ProcessSupervisor::new(1, 4096);
        let (program, args) = sh("exit 0");

        let outcome = supervisor.run(&program, &args, Duration::from_secs(10)).await;
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_deadline_kills_process() {
        let supervisor = ProcessSupervisor::new(1, 4096);
        let (program, args) = sh("echo started >&2; exec sleep 30");

        let start = Instant::now();
        let outcome = supervisor.run(&program, &args, Duration::from_millis(200)).await;

        assert!(outcome.timed_out());
        assert_eq!(outcome.exit_code(), None);
        assert!(start.elapsed() < Duration::from_secs(10));
        assert_eq!(supervisor.active(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_run_frees_slot() {
        let supervisor = ProcessSupervisor::new(1, 4096);
        let (program, args) = sh("exec sleep 30");

        let cancelled = tokio::time::timeout(
            Duration::from_millis(200),
            supervisor.run(&program, &args, Duration::from_secs(30)),
        )
        .await;

        assert!(cancelled.is_err());
        assert_eq!(supervisor.active(), 0);

        let (program, args) = sh("exit 0");
        let outcome = supervisor.run(&program, &args, Duration::from_secs(10)).await;
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let supervisor = ProcessSupervisor::new(1, 4096);
        let outcome = supervisor
            .run(
                Path::new("/nonexistent/encoder_xyz_12345"),
                &[],
                Duration::from_secs(1),
            )
            .await;

        assert!(!outcome.timed_out());
        assert_eq!(outcome.exit_code(), None);
        match outcome.spawn_error() {
            Some(error) => assert_eq!(error.kind(), std::io::ErrorKind::NotFound),
            None => panic!("expected spawn failure, got {:?}", outcome),
        }
    }

    #[tokio::test]
    async fn test_drains_large_stderr() {
        // Far more than a pipe buffer; an undrained pipe would block the child
        let supervisor = ProcessSupervisor::new(1, 1024);
        let (program, args) = sh("i=0; while [ $i -lt 5000 ]; do echo \"line $i of noisy output\" >&2; i=$((i+1)); done; exit 0");

        let outcome = supervisor.run(&program, &args, Duration::from_secs(30)).await;

        assert!(outcome.is_success());
        assert!(outcome.diagnostics().starts_with(TRUNCATION_MARKER));
        assert!(outcome.diagnostics().ends_with("line 4999 of noisy output"));
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let supervisor = ProcessSupervisor::new(1, 1024);
        let (program, args) = sh("sleep 0.3");

        let start = Instant::now();
        let (a, b) = tokio::join!(
            supervisor.run(&program, &args, Duration::from_secs(10)),
            supervisor.run(&program, &args, Duration::from_secs(10)),
        );

        assert!(a.is_success());
        assert!(b.is_success());
        // Second run had to wait for the only slot
        assert!(start.elapsed() >= Duration::from_millis(550));
    }
}
