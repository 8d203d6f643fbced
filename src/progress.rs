//! Progress reporting sink.
//!
//! The session tracker's state contract is pure; human-readable progress is
//! a delegated side effect behind this trait so callers can swap the console
//! output for their own sink.

use async_trait::async_trait;

use crate::display;

/// Which child stream a progress line originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSource {
    /// The agent's structured event stream.
    Stdout,
    /// Unstructured diagnostics from the agent.
    Stderr,
}

/// Severity of a progress line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Normal progress.
    #[default]
    Info,
    /// Something worth attention but not fatal.
    Warn,
    /// A failure being reported.
    Error,
}

/// Options attached to every progress line.
#[derive(Debug, Clone, Copy)]
pub struct LogOptions {
    /// Verbose-tagged lines may be suppressed by the sink's configuration.
    pub verbose: bool,
    /// Originating stream.
    pub source: StreamSource,
    /// Severity.
    pub level: LogLevel,
}

/// Async sink for human-readable progress lines.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Emit one progress line.
    async fn log(&self, message: &str, options: LogOptions);
}

/// Console sink printing colored progress lines.
#[derive(Debug, Clone)]
pub struct ConsoleSink {
    verbose: bool,
}

impl ConsoleSink {
    /// Create a console sink; `verbose` controls whether verbose-tagged
    /// lines are printed.
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

#[async_trait]
impl ProgressSink for ConsoleSink {
    async fn log(&self, message: &str, options: LogOptions) {
        if options.verbose && !self.verbose {
            return;
        }
        display::print_progress(message, options.source, options.level);
    }
}

/// Sink that discards everything. Useful for embedding and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

#[async_trait]
impl ProgressSink for NullSink {
    async fn log(&self, _message: &str, _options: LogOptions) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Collects messages for assertions.
    pub struct RecordingSink {
        pub lines: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ProgressSink for RecordingSink {
        async fn log(&self, message: &str, _options: LogOptions) {
            self.lines.lock().unwrap().push(message.to_string());
        }
    }

    #[tokio::test]
    async fn test_recording_sink_captures_lines() {
        let sink = RecordingSink {
            lines: Mutex::new(Vec::new()),
        };
        sink.log(
            "hello",
            LogOptions {
                verbose: false,
                source: StreamSource::Stdout,
                level: LogLevel::Info,
            },
        )
        .await;
        assert_eq!(sink.lines.lock().unwrap().as_slice(), ["hello"]);
    }
}
