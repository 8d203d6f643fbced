//! Event types decoded from the agent's stream-json output.
//!
//! The `type` tag on each JSON line is inspected exactly once, in the
//! decoder. Everything downstream works with this closed enumeration and
//! never re-reads raw tag strings.

use serde_json::Value;

/// One decoded unit from a single line of agent output.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Assistant-visible text content.
    Text {
        /// The text body.
        text: String,
        /// Session identifier, if the line carried one.
        session_id: Option<String>,
    },
    /// A tool invocation request.
    ToolUse {
        /// Name of the tool being invoked.
        name: String,
        /// Structured tool input.
        input: Value,
        /// Session identifier, if the line carried one.
        session_id: Option<String>,
    },
    /// Result of a tool invocation.
    ToolResult {
        /// Success output, if any.
        output: Option<String>,
        /// Error text, if the tool failed.
        error: Option<String>,
        /// Session identifier, if the line carried one.
        session_id: Option<String>,
    },
    /// A message envelope (role + whatever metadata the line carried).
    Message {
        /// Message role (e.g. "assistant", "user").
        role: Option<String>,
        /// Full decoded payload for downstream inspection.
        metadata: Value,
        /// Session identifier, if the line carried one.
        session_id: Option<String>,
    },
    /// An error reported by the agent.
    Error {
        /// Error text, if present.
        message: Option<String>,
        /// Full decoded payload, used as a stringified fallback.
        payload: Value,
        /// Session identifier, if the line carried one.
        session_id: Option<String>,
    },
    /// A line that was not parseable (or not recognized) as a structured
    /// event, preserved verbatim.
    Raw {
        /// The original line text.
        line: String,
    },
}

impl StreamEvent {
    /// Returns the session ID if this event carries one.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::Text { session_id, .. }
            | Self::ToolUse { session_id, .. }
            | Self::ToolResult { session_id, .. }
            | Self::Message { session_id, .. }
            | Self::Error { session_id, .. } => session_id.as_deref(),
            Self::Raw { .. } => None,
        }
    }

    /// Returns the tool name if this is a `ToolUse` event.
    #[must_use]
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            Self::ToolUse { name, .. } => Some(name),
            _ => None,
        }
    }
}
