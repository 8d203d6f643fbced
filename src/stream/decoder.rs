//! Decoding of single output lines into [`StreamEvent`]s.
//!
//! Decoding is total: malformed input degrades to `Raw`, never to a run
//! failure. Lines matching the diagnostic noise denylist (runtime stack
//! frames and similar internals the agent's own runtime prints on crash
//! paths) are the only input that produces nothing.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::stream::StreamEvent;

/// Denylist of unstructured lines that are runtime noise, not agent output.
fn noise_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?x)
            ^\s*at\s+\S+.*\(.*\)\s*$   # stack-trace frame
            | node:internal            # Node runtime internals
            | DeprecationWarning
            | ExperimentalWarning
            ",
        )
        .unwrap_or_else(|e| unreachable!("invalid noise pattern: {e}"))
    })
}

/// Decode one line of agent output.
///
/// Returns `None` for blank lines and denylisted diagnostic noise; every
/// other line yields exactly one event.
#[must_use]
pub fn decode_line(line: &str) -> Option<StreamEvent> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => Some(decode_value(&value, line)),
        Err(e) => {
            if noise_pattern().is_match(trimmed) {
                tracing::trace!(line = %trimmed, error = %e, "Dropped diagnostic noise line");
                None
            } else {
                // The raw variant preserves the line unchanged.
                Some(StreamEvent::Raw {
                    line: line.to_string(),
                })
            }
        }
    }
}

/// Wrap one line as a `Raw` event without attempting JSON decoding.
///
/// Used for stderr, where the agent is not expected to emit structured
/// events. Blank lines and denylisted noise yield nothing.
#[must_use]
pub fn raw_line(line: &str) -> Option<StreamEvent> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    if noise_pattern().is_match(trimmed) {
        tracing::trace!(line = %trimmed, "Dropped diagnostic noise line");
        return None;
    }
    Some(StreamEvent::Raw {
        line: line.to_string(),
    })
}

/// Map a parsed JSON value to an event by its `type` tag.
///
/// Unrecognized or missing tags degrade to `Raw` so that downstream counts
/// only reflect tags the agent actually declared.
fn decode_value(value: &Value, original: &str) -> StreamEvent {
    let session_id = value
        .get("session_id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from);

    match value.get("type").and_then(Value::as_str) {
        Some("text") => StreamEvent::Text {
            text: string_field(value, "text").unwrap_or_default(),
            session_id,
        },
        Some("tool_use") => StreamEvent::ToolUse {
            name: string_field(value, "name").unwrap_or_default(),
            input: value.get("input").cloned().unwrap_or(Value::Null),
            session_id,
        },
        Some("tool_result") => StreamEvent::ToolResult {
            output: string_field(value, "output"),
            error: string_field(value, "error"),
            session_id,
        },
        Some("message") => StreamEvent::Message {
            role: string_field(value, "role"),
            metadata: value.clone(),
            session_id,
        },
        Some("error") => StreamEvent::Error {
            message: string_field(value, "message").or_else(|| string_field(value, "error")),
            payload: value.clone(),
            session_id,
        },
        other => {
            tracing::trace!(tag = ?other, "Unrecognized event type, passing through as raw");
            StreamEvent::Raw {
                line: original.to_string(),
            }
        }
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(String::from)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_text_event() {
        let event = decode_line(r#"{"type":"text","text":"working on it","session_id":"s-1"}"#)
            .expect("event");
        assert_eq!(
            event,
            StreamEvent::Text {
                text: "working on it".to_string(),
                session_id: Some("s-1".to_string()),
            }
        );
    }

    #[test]
    fn test_decode_tool_use_event() {
        let event =
            decode_line(r#"{"type":"tool_use","name":"bash","input":{"command":"ls"}}"#)
                .expect("event");
        match event {
            StreamEvent::ToolUse {
                name,
                input,
                session_id,
            } => {
                assert_eq!(name, "bash");
                assert_eq!(input, json!({"command": "ls"}));
                assert_eq!(session_id, None);
            }
            other => panic!("Expected ToolUse, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_tool_result_with_error() {
        let event =
            decode_line(r#"{"type":"tool_result","error":"command not found"}"#).expect("event");
        match event {
            StreamEvent::ToolResult { output, error, .. } => {
                assert_eq!(output, None);
                assert_eq!(error, Some("command not found".to_string()));
            }
            other => panic!("Expected ToolResult, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_message_event() {
        let event = decode_line(r#"{"type":"message","role":"assistant"}"#).expect("event");
        match event {
            StreamEvent::Message { role, .. } => {
                assert_eq!(role, Some("assistant".to_string()));
            }
            other => panic!("Expected Message, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_error_event_prefers_message_field() {
        let event = decode_line(r#"{"type":"error","message":"boom"}"#).expect("event");
        match event {
            StreamEvent::Error { message, .. } => assert_eq!(message, Some("boom".to_string())),
            other => panic!("Expected Error, got {other:?}"),
        }
    }

    #[test]
    fn test_unrecognized_type_degrades_to_raw() {
        let line = r#"{"type":"future_event","data":1}"#;
        assert_eq!(
            decode_line(line),
            Some(StreamEvent::Raw {
                line: line.to_string()
            })
        );
    }

    #[test]
    fn test_json_without_type_degrades_to_raw() {
        let line = r#"{"hello":"world"}"#;
        assert_eq!(
            decode_line(line),
            Some(StreamEvent::Raw {
                line: line.to_string()
            })
        );
    }

    #[test]
    fn test_non_json_line_becomes_raw_unchanged() {
        let line = "Error: something went sideways";
        assert_eq!(
            decode_line(line),
            Some(StreamEvent::Raw {
                line: line.to_string()
            })
        );
    }

    #[test]
    fn test_blank_line_yields_nothing() {
        assert_eq!(decode_line(""), None);
        assert_eq!(decode_line("   \t"), None);
    }

    #[test]
    fn test_stack_frame_noise_is_dropped() {
        assert_eq!(decode_line("    at Object.run (/usr/lib/agent/cli.js:10:5)"), None);
        assert_eq!(
            decode_line("(node:12345) DeprecationWarning: Buffer() is deprecated"),
            None
        );
        assert_eq!(decode_line("    at node:internal/modules/cjs/loader:1105:14"), None);
    }

    #[test]
    fn test_raw_line_never_decodes_json() {
        let event = raw_line(r#"{"type":"text","text":"hi"}"#).expect("event");
        assert!(matches!(event, StreamEvent::Raw { .. }));
    }

    #[test]
    fn test_raw_line_filters_blank_and_noise() {
        assert_eq!(raw_line("   "), None);
        assert_eq!(raw_line("    at run (/opt/agent/main.js:3:1)"), None);
        assert!(raw_line("fatal: network unreachable").is_some());
    }

    #[test]
    fn test_empty_session_id_is_treated_as_absent() {
        let event = decode_line(r#"{"type":"text","text":"hi","session_id":""}"#).expect("event");
        assert_eq!(event.session_id(), None);
    }
}
