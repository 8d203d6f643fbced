//! Per-run session state accumulation.

use crate::stream::StreamEvent;

/// Mutable accumulator for one agent run.
///
/// Owned by the supervisor loop, which is the single writer; consumer tasks
/// only produce events, they never touch state directly.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    session_id: Option<String>,
    message_count: u64,
    tool_use_count: u64,
    last_message: String,
}

impl RunState {
    /// Create an empty run state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one decoded event into the state.
    pub fn apply(&mut self, event: &StreamEvent) {
        if let Some(id) = event.session_id() {
            match &self.session_id {
                None => {
                    tracing::debug!(session_id = %id, "Session established");
                    self.session_id = Some(id.to_string());
                }
                Some(existing) if existing != id => {
                    // First id wins; a divergent id mid-stream is suspicious
                    // enough to surface, not enough to fail the run.
                    tracing::debug!(
                        established = %existing,
                        ignored = %id,
                        "Ignoring mismatched session id"
                    );
                }
                Some(_) => {}
            }
        }

        match event {
            StreamEvent::Text { text, .. } => {
                if !text.is_empty() {
                    self.last_message = text.clone();
                }
            }
            StreamEvent::ToolUse { .. } => {
                self.tool_use_count = self.tool_use_count.saturating_add(1);
            }
            StreamEvent::Message { .. } => {
                self.message_count = self.message_count.saturating_add(1);
            }
            StreamEvent::Error {
                message, payload, ..
            } => {
                self.last_message = message
                    .clone()
                    .unwrap_or_else(|| payload.to_string());
            }
            StreamEvent::Raw { line } => {
                self.last_message = line.clone();
            }
            StreamEvent::ToolResult { .. } => {}
        }
    }

    /// The session identifier, if one was observed.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Number of `message` events observed.
    #[must_use]
    pub fn message_count(&self) -> u64 {
        self.message_count
    }

    /// Number of `tool_use` events observed.
    #[must_use]
    pub fn tool_use_count(&self) -> u64 {
        self.tool_use_count
    }

    /// The most recent human-readable message text.
    #[must_use]
    pub fn last_message(&self) -> &str {
        &self.last_message
    }
}
