//! Claude Runner - subprocess supervision for a headless coding agent.
//!
//! Spawns the agent, parses its line-delimited JSON event stream in real
//! time, tracks session state, and classifies the terminal outcome for
//! retry/resume decisions.

pub mod config;
pub mod diag;
pub mod display;
pub mod progress;
pub mod runner;
pub mod stream;
