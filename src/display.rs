//! Colored CLI display utilities for runner output.

use chrono::Utc;
use owo_colors::OwoColorize;

use crate::progress::{LogLevel, StreamSource};
use crate::stream::StreamEvent;

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Maximum length for truncated display strings.
const DEFAULT_MAX_LEN: usize = 120;

/// Truncate a string to a maximum length, adding ellipsis if truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let cut: String = s.chars().take(max_len - 3).collect();
        format!("{cut}...")
    }
}

/// Format tool input for display, truncating long values.
#[must_use]
pub fn format_tool_input(input: &serde_json::Value) -> String {
    match input {
        serde_json::Value::Object(map) => {
            let pairs: Vec<String> = map
                .iter()
                .map(|(k, v)| {
                    let value_str = match v {
                        serde_json::Value::String(s) => truncate(s, 50),
                        other => truncate(&other.to_string(), 50),
                    };
                    format!("{k}={value_str}")
                })
                .collect();
            pairs.join(", ")
        }
        other => truncate(&other.to_string(), DEFAULT_MAX_LEN),
    }
}

/// One-line human-readable summary of a decoded event.
#[must_use]
pub fn event_summary(event: &StreamEvent) -> String {
    match event {
        StreamEvent::Text { text, .. } => truncate(text, DEFAULT_MAX_LEN),
        StreamEvent::ToolUse { name, input, .. } => {
            format!("{name}({})", format_tool_input(input))
        }
        StreamEvent::ToolResult { output, error, .. } => match error {
            Some(err) => format!("tool error: {}", truncate(err, DEFAULT_MAX_LEN)),
            None => format!(
                "tool ok: {}",
                truncate(output.as_deref().unwrap_or(""), DEFAULT_MAX_LEN)
            ),
        },
        StreamEvent::Message { role, .. } => {
            format!("message from {}", role.as_deref().unwrap_or("unknown"))
        }
        StreamEvent::Error {
            message, payload, ..
        } => match message {
            Some(msg) => truncate(msg, DEFAULT_MAX_LEN),
            None => truncate(&payload.to_string(), DEFAULT_MAX_LEN),
        },
        StreamEvent::Raw { line } => truncate(line, DEFAULT_MAX_LEN),
    }
}

/// Print one progress line with stream and level coloring.
pub fn print_progress(message: &str, source: StreamSource, level: LogLevel) {
    let tag = match source {
        StreamSource::Stdout => "[AGENT]".blue().bold().to_string(),
        StreamSource::Stderr => "[STDERR]".yellow().bold().to_string(),
    };
    match level {
        LogLevel::Info => println!("{} {tag} {message}", timestamp().dimmed()),
        LogLevel::Warn => println!("{} {tag} {}", timestamp().dimmed(), message.yellow()),
        LogLevel::Error => eprintln!("{} {tag} {}", timestamp().dimmed(), message.red()),
    }
}

/// Print run start information.
pub fn print_run_start(program: &str, resume: Option<&str>) {
    match resume {
        Some(token) => println!(
            "{} {} program={}, resume={}",
            timestamp().dimmed(),
            "[RUN]".green().bold(),
            program.cyan(),
            truncate(token, 20).dimmed()
        ),
        None => println!(
            "{} {} program={}",
            timestamp().dimmed(),
            "[RUN]".green().bold(),
            program.cyan()
        ),
    }
}

/// Print run end information.
pub fn print_run_end(success: bool, exit_code: Option<i32>, last_message: &str) {
    let ts = timestamp();
    if success {
        println!("{} {} Run completed", ts.dimmed(), "[RUN]".green().bold());
    } else {
        println!(
            "{} {} Run failed (exit={exit_code:?}): {}",
            ts.dimmed(),
            "[RUN]".red().bold(),
            truncate(last_message, DEFAULT_MAX_LEN).red()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truncate_short_string_unchanged() {
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn test_truncate_long_string_gets_ellipsis() {
        let out = truncate("abcdefghij", 8);
        assert_eq!(out, "abcde...");
    }

    #[test]
    fn test_truncate_is_char_safe() {
        let out = truncate("héllo wörld désu", 10);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn test_format_tool_input_object() {
        let input = json!({"command": "ls -la", "timeout": 5});
        let out = format_tool_input(&input);
        assert!(out.contains("command=ls -la"));
        assert!(out.contains("timeout=5"));
    }

    #[test]
    fn test_event_summary_tool_use() {
        let event = StreamEvent::ToolUse {
            name: "bash".to_string(),
            input: json!({"command": "echo hi"}),
            session_id: None,
        };
        assert_eq!(event_summary(&event), "bash(command=echo hi)");
    }

    #[test]
    fn test_event_summary_error_falls_back_to_payload() {
        let event = StreamEvent::Error {
            message: None,
            payload: json!({"type": "error", "code": 7}),
            session_id: None,
        };
        assert!(event_summary(&event).contains('7'));
    }
}
