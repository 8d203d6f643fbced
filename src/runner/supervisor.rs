//! Run supervision: child lifecycle, concurrent stream consumption, and
//! final outcome assembly.
//!
//! The two stream consumers run as independent tasks so a full OS pipe
//! buffer on one stream can never stall reads on the other. They feed one
//! mpsc channel; the supervisor loop on the receiving end is the single
//! writer of [`RunState`]. Classification happens only after stdout EOF,
//! stderr EOF, and the child's exit status have all been observed.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc::{self, Sender};
use tokio_util::sync::CancellationToken;

use crate::config::RunnerConfig;
use crate::diag;
use crate::display;
use crate::progress::{ConsoleSink, LogLevel, LogOptions, ProgressSink, StreamSource};
use crate::runner::{
    AgentCommand, Outcome, OutcomeClassifier, RunRequest, RunState, SpawnError,
};
use crate::stream::{decode_line, raw_line, LineFramer, StreamEvent};

/// Default buffer size for the event channel.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Default timeout for graceful process termination.
pub const DEFAULT_TERMINATE_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to keep draining the streams after a forced termination.
///
/// Orphaned grandchildren can inherit the pipes and hold them open long
/// after the agent itself is dead; without a deadline the drain would block
/// until they exit.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Read buffer size for pipe consumption.
const READ_CHUNK: usize = 8192;

/// Internal error type for run setup; never escapes [`Supervisor::run`].
#[derive(thiserror::Error, Debug)]
enum RunError {
    #[error(transparent)]
    Spawn(#[from] SpawnError),
    #[error("Process {0} pipe not available")]
    MissingPipe(&'static str),
}

/// Final result of one supervised agent run.
///
/// Constructed once at process exit and never mutated afterward.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Whether the run succeeded (exit code 0).
    pub success: bool,
    /// Session identifier captured from the stream, if any.
    pub session_id: Option<String>,
    /// Whether the run ended on an exhausted usage quota.
    pub limit_reached: bool,
    /// Count of `message` events.
    pub message_count: u64,
    /// Count of `tool_use` events.
    pub tool_use_count: u64,
    /// Exit code, if the process exited normally.
    pub exit_code: Option<i32>,
    /// Terminating signal, if any.
    pub exit_signal: Option<i32>,
    /// Full outcome classification.
    pub outcome: Outcome,
    /// Last human-readable message observed on the stream.
    pub last_message: String,
}

impl RunResult {
    fn from_run(state: &RunState, outcome: Outcome, exit_code: Option<i32>, exit_signal: Option<i32>) -> Self {
        Self {
            success: outcome.is_success(),
            session_id: state.session_id().map(String::from),
            limit_reached: outcome.is_limit_reached(),
            message_count: state.message_count(),
            tool_use_count: state.tool_use_count(),
            exit_code,
            exit_signal,
            outcome,
            last_message: state.last_message().to_string(),
        }
    }

    /// Build a failure result for a run that never produced a child process.
    fn setup_failure(message: String) -> Self {
        Self {
            success: false,
            session_id: None,
            limit_reached: false,
            message_count: 0,
            tool_use_count: 0,
            exit_code: None,
            exit_signal: None,
            outcome: Outcome::Failed {
                exit_code: None,
                signal: None,
            },
            last_message: message,
        }
    }

    /// Session id usable for a resume attempt, present when the run failed
    /// or hit a limit with a known session.
    #[must_use]
    pub fn resume_hint(&self) -> Option<&str> {
        if self.success {
            None
        } else {
            self.session_id.as_deref()
        }
    }
}

/// Supervisor owning one agent run end to end.
pub struct Supervisor {
    config: RunnerConfig,
    classifier: OutcomeClassifier,
    sink: Arc<dyn ProgressSink>,
    cancel: Option<CancellationToken>,
}

impl Supervisor {
    /// Create a supervisor from configuration, with console progress output.
    #[must_use]
    pub fn new(config: RunnerConfig) -> Self {
        let classifier = OutcomeClassifier::new()
            .with_limit_markers(config.limit_markers.clone())
            .with_context_markers(config.context_markers.clone());
        let sink = Arc::new(ConsoleSink::new(config.verbose));
        Self {
            config,
            classifier,
            sink,
            cancel: None,
        }
    }

    /// Replace the progress sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Attach a cancellation token; cancelling it terminates the child but
    /// still drains both streams before classification.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Run the agent to completion.
    ///
    /// Never returns an error: spawn and I/O failures become a
    /// generic-failure result carrying the error text as `last_message`.
    pub async fn run(&self, request: &RunRequest) -> RunResult {
        match self.try_run(request).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "Run setup failed");
                self.log_resource_snapshot();
                RunResult::setup_failure(e.to_string())
            }
        }
    }

    async fn try_run(&self, request: &RunRequest) -> Result<RunResult, RunError> {
        let mut effective = request.clone();
        if effective.program.is_none() {
            effective.program.clone_from(&self.config.agent_bin);
        }
        if effective.args.is_empty() {
            effective.args.clone_from(&self.config.base_args);
        }

        let command = AgentCommand::prepare(&effective)?;
        let mut process = command.spawn()?;
        let stdout = process
            .take_stdout()
            .ok_or(RunError::MissingPipe("stdout"))?;
        let stderr = process
            .take_stderr()
            .ok_or(RunError::MissingPipe("stderr"))?;

        let (tx, mut rx) = mpsc::channel(DEFAULT_CHANNEL_BUFFER);
        let stdout_task = tokio::spawn(consume_stream(stdout, StreamSource::Stdout, tx.clone()));
        let stderr_task = tokio::spawn(consume_stream(stderr, StreamSource::Stderr, tx));

        // Per-run token: a child of the caller's token so external
        // cancellation still propagates, but the timeout timer below can
        // never reach back and poison caller-shared state.
        let cancel = self
            .cancel
            .as_ref()
            .map_or_else(CancellationToken::new, CancellationToken::child_token);
        let timeout_timer = self.config.timeout_secs.map(|secs| {
            let deadline_cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(secs)).await;
                deadline_cancel.cancel();
            })
        });

        // Single-writer fold loop. The channel closes only after both
        // consumers flushed their framer residue and exited.
        let mut state = RunState::new();
        let mut drain_deadline: Option<tokio::time::Instant> = None;
        let mut drain_expired = false;
        loop {
            if let Some(deadline) = drain_deadline {
                // Post-termination: keep folding whatever was flushed before
                // the pipes closed, but never wait past the deadline.
                match tokio::time::timeout_at(deadline, rx.recv()).await {
                    Ok(Some((source, event))) => {
                        state.apply(&event);
                        self.emit_progress(source, &event).await;
                    }
                    Ok(None) => break,
                    Err(_) => {
                        tracing::warn!("Drain deadline reached, abandoning open pipes");
                        drain_expired = true;
                        break;
                    }
                }
            } else {
                tokio::select! {
                    biased;

                    () = cancel.cancelled() => {
                        tracing::warn!("Run cancelled, terminating agent process");
                        if let Err(e) = process.graceful_terminate(DEFAULT_TERMINATE_TIMEOUT).await {
                            tracing::warn!(error = %e, "Failed to terminate agent process");
                        }
                        drain_deadline = Some(tokio::time::Instant::now() + DRAIN_TIMEOUT);
                    }
                    received = rx.recv() => {
                        let Some((source, event)) = received else {
                            break;
                        };
                        state.apply(&event);
                        self.emit_progress(source, &event).await;
                    }
                }
            }
        }

        // The run is over; a still-pending deadline must not fire later.
        if let Some(timer) = timeout_timer {
            timer.abort();
        }

        if drain_expired {
            stdout_task.abort();
            stderr_task.abort();
        }
        let _ = stdout_task.await;
        let _ = stderr_task.await;

        let (exit_code, exit_signal) = match process.wait().await {
            Ok(status) => (status.code(), exit_signal(&status)),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to collect exit status");
                (None, None)
            }
        };

        let outcome = self
            .classifier
            .classify(exit_code, exit_signal, state.last_message());
        tracing::info!(
            ?exit_code,
            ?exit_signal,
            ?outcome,
            session_id = ?state.session_id(),
            messages = state.message_count(),
            tool_uses = state.tool_use_count(),
            "Run finished"
        );
        if !outcome.is_success() {
            self.log_resource_snapshot();
        }

        Ok(RunResult::from_run(&state, outcome, exit_code, exit_signal))
    }

    async fn emit_progress(&self, source: StreamSource, event: &StreamEvent) {
        let (verbose, level) = match (source, event) {
            (StreamSource::Stderr, _) => (false, LogLevel::Warn),
            (_, StreamEvent::Error { .. }) => (false, LogLevel::Error),
            (_, StreamEvent::Text { .. } | StreamEvent::ToolUse { .. }) => {
                (false, LogLevel::Info)
            }
            // Envelope bookkeeping and tool payloads are verbose-only.
            _ => (true, LogLevel::Info),
        };
        self.sink
            .log(
                &display::event_summary(event),
                LogOptions {
                    verbose,
                    source,
                    level,
                },
            )
            .await;
    }

    fn log_resource_snapshot(&self) {
        let snapshot = diag::resource_snapshot();
        tracing::warn!(
            memory = %snapshot.memory,
            load = %snapshot.load,
            "Resource snapshot at failure"
        );
    }
}

/// Consume one child pipe to EOF, framing bytes into lines and forwarding
/// decoded events. A read error is treated as EOF; the framer residue is
/// flushed through the same decode path before the sender drops.
async fn consume_stream<R: AsyncRead + Unpin>(
    mut reader: R,
    source: StreamSource,
    tx: Sender<(StreamSource, StreamEvent)>,
) {
    let mut framer = LineFramer::new();
    let mut buf = [0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                for line in framer.push(&buf[..n]) {
                    forward(source, &line, &tx).await;
                }
            }
            Err(e) => {
                tracing::debug!(?source, error = %e, "Read error, treating as EOF");
                break;
            }
        }
    }
    if let Some(tail) = framer.finish() {
        forward(source, &tail, &tx).await;
    }
}

async fn forward(source: StreamSource, line: &str, tx: &Sender<(StreamSource, StreamEvent)>) {
    let event = match source {
        StreamSource::Stdout => decode_line(line),
        // stderr is never JSON-decoded; it is surfaced verbatim.
        StreamSource::Stderr => {
            tracing::debug!(line = %line, "agent stderr");
            raw_line(line)
        }
    };
    if let Some(event) = event {
        // A closed receiver means the run is being torn down; dropping the
        // event here is fine because classification already happened.
        let _ = tx.send((source, event)).await;
    }
}

fn exit_signal(status: &std::process::ExitStatus) -> Option<i32> {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        status.signal()
    }
    #[cfg(not(unix))]
    {
        let _ = status;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::Receiver;

    async fn collect(
        mut rx: Receiver<(StreamSource, StreamEvent)>,
    ) -> Vec<(StreamSource, StreamEvent)> {
        let mut events = Vec::new();
        while let Some(item) = rx.recv().await {
            events.push(item);
        }
        events
    }

    #[tokio::test]
    async fn test_consume_stream_decodes_stdout_lines() {
        let input: &[u8] = b"{\"type\":\"message\"}\n{\"type\":\"tool_use\",\"name\":\"bash\"}\n";
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(consume_stream(input, StreamSource::Stdout, tx));

        let events = collect(rx).await;
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0].1, StreamEvent::Message { .. }));
        assert_eq!(events[1].1.tool_name(), Some("bash"));
    }

    #[tokio::test]
    async fn test_consume_stream_flushes_truncated_tail_as_raw() {
        let input: &[u8] = b"{\"type\":\"message\"}\n{\"type\":\"err";
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(consume_stream(input, StreamSource::Stdout, tx));

        let events = collect(rx).await;
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1].1,
            StreamEvent::Raw {
                line: "{\"type\":\"err".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_consume_stream_stderr_is_never_decoded() {
        let input: &[u8] = b"{\"type\":\"text\",\"text\":\"hi\"}\nplain diagnostics\n";
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(consume_stream(input, StreamSource::Stderr, tx));

        let events = collect(rx).await;
        assert_eq!(events.len(), 2);
        assert!(events
            .iter()
            .all(|(source, event)| *source == StreamSource::Stderr
                && matches!(event, StreamEvent::Raw { .. })));
    }

    #[test]
    fn test_resume_hint_only_on_non_success() {
        let mut state = RunState::new();
        state.apply(&StreamEvent::Text {
            text: "working".to_string(),
            session_id: Some("s-9".to_string()),
        });

        let ok = RunResult::from_run(&state, Outcome::Success, Some(0), None);
        assert_eq!(ok.resume_hint(), None);

        let limited = RunResult::from_run(&state, Outcome::RateLimited, Some(1), None);
        assert_eq!(limited.resume_hint(), Some("s-9"));
        assert!(limited.limit_reached);
    }

    #[test]
    fn test_setup_failure_carries_error_text() {
        let result = RunResult::setup_failure("Agent binary not found: claude".to_string());
        assert!(!result.success);
        assert!(!result.limit_reached);
        assert_eq!(result.exit_code, None);
        assert_eq!(result.last_message, "Agent binary not found: claude");
    }
}
