//! Terminal outcome classification.
//!
//! The agent reports fatal conditions as free text, not structured error
//! codes, so non-zero exits are sub-classified by substring markers over the
//! last human-visible message. This is a documented best-effort heuristic:
//! unrecognized phrasing degrades to a generic failure, never to success.

/// Phrases that indicate the agent hit a usage quota.
pub const RATE_LIMIT_MARKERS: &[&str] = &[
    "rate limit",
    "rate_limit",
    "usage limit",
    "quota exceeded",
    "too many requests",
    "overloaded_error",
];

/// Phrases that indicate the input exceeded the model context window.
pub const CONTEXT_MARKERS: &[&str] = &[
    "context_length_exceeded",
    "context window",
    "prompt is too long",
    "maximum context length",
];

/// Terminal classification of one agent run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Exit code 0.
    Success,
    /// Non-zero exit with a rate-limit marker in the last message.
    RateLimited,
    /// Non-zero exit with a context-overflow marker in the last message.
    ContextExceeded,
    /// Any other non-zero exit or signal termination.
    Failed {
        /// Exit code, if the process exited normally.
        exit_code: Option<i32>,
        /// Terminating signal, if any.
        signal: Option<i32>,
    },
}

impl Outcome {
    /// Whether this outcome counts as a successful run.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Whether the run ended because a usage quota was exhausted.
    #[must_use]
    pub fn is_limit_reached(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}

/// Classifier over exit status and the last observed message.
///
/// Extra markers from configuration extend the built-in lists.
#[derive(Debug, Clone, Default)]
pub struct OutcomeClassifier {
    extra_limit_markers: Vec<String>,
    extra_context_markers: Vec<String>,
}

impl OutcomeClassifier {
    /// Create a classifier with only the built-in markers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Extend the rate-limit marker list.
    #[must_use]
    pub fn with_limit_markers(mut self, markers: Vec<String>) -> Self {
        self.extra_limit_markers = markers;
        self
    }

    /// Extend the context-overflow marker list.
    #[must_use]
    pub fn with_context_markers(mut self, markers: Vec<String>) -> Self {
        self.extra_context_markers = markers;
        self
    }

    /// Classify a finished run. First match wins; exit code 0 is
    /// unconditionally a success even if the message mentions a limit.
    #[must_use]
    pub fn classify(
        &self,
        exit_code: Option<i32>,
        signal: Option<i32>,
        last_message: &str,
    ) -> Outcome {
        if exit_code == Some(0) {
            return Outcome::Success;
        }

        let haystack = last_message.to_lowercase();
        if self.matches_any(&haystack, RATE_LIMIT_MARKERS, &self.extra_limit_markers) {
            return Outcome::RateLimited;
        }
        if self.matches_any(&haystack, CONTEXT_MARKERS, &self.extra_context_markers) {
            return Outcome::ContextExceeded;
        }

        Outcome::Failed { exit_code, signal }
    }

    fn matches_any(&self, haystack: &str, builtin: &[&str], extra: &[String]) -> bool {
        builtin
            .iter()
            .copied()
            .chain(extra.iter().map(String::as_str))
            .any(|marker| haystack.contains(&marker.to_lowercase()))
    }
}
