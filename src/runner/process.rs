//! Agent process spawning and control.
//!
//! `AgentCommand` builds the argument list for one run; `AgentProcess` wraps
//! the spawned child. Prompt payloads are delivered as files referenced by
//! argument pairs, never interpolated into a shell string, so payload
//! content cannot inject shell metacharacters and cannot hit argv length
//! limits.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tempfile::TempDir;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};

/// Default agent executable.
pub const DEFAULT_AGENT_BIN: &str = "claude";

/// Error type for process spawning operations.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The agent binary was not found.
    #[error("Agent binary not found: {0}")]
    NotFound(String),
    /// Permission denied when spawning.
    #[error("Permission denied spawning {0}")]
    PermissionDenied(String),
    /// Failed to materialize a prompt payload file.
    #[error("Failed to write payload file {path}: {source}")]
    Payload {
        /// Path that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Immutable description of one agent run.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// Agent executable; defaults to [`DEFAULT_AGENT_BIN`].
    pub program: Option<PathBuf>,
    /// Base arguments placed before the generated payload arguments.
    pub args: Vec<String>,
    /// Resume token for continuing a prior session.
    pub resume: Option<String>,
    /// Working directory for the child.
    pub cwd: Option<PathBuf>,
    /// Environment overrides layered on top of the inherited environment.
    pub env: HashMap<String, String>,
    /// Primary instruction payload.
    pub prompt: String,
    /// System instruction payload.
    pub system_prompt: String,
}

/// Builder that materializes payload files and assembles the command line.
#[derive(Debug)]
pub struct AgentCommand {
    program: PathBuf,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    env: HashMap<String, String>,
    // Owns the payload files for the lifetime of the run.
    payload_dir: TempDir,
}

impl AgentCommand {
    /// Prepare a command from a run request, writing the prompt and system
    /// prompt to files in a run-scoped temporary directory.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError::Payload` if a payload file cannot be written.
    pub fn prepare(request: &RunRequest) -> Result<Self, SpawnError> {
        let payload_dir = TempDir::new()?;
        let prompt_path = payload_dir.path().join("prompt.md");
        let system_prompt_path = payload_dir.path().join("system_prompt.md");

        write_payload(&prompt_path, &request.prompt)?;
        write_payload(&system_prompt_path, &request.system_prompt)?;

        let mut args = request.args.clone();
        args.push("--prompt-file".to_string());
        args.push(prompt_path.to_string_lossy().into_owned());
        args.push("--system-prompt-file".to_string());
        args.push(system_prompt_path.to_string_lossy().into_owned());
        if let Some(token) = &request.resume {
            args.push("--resume".to_string());
            args.push(token.clone());
        }

        Ok(Self {
            program: request
                .program
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_AGENT_BIN)),
            args,
            cwd: request.cwd.clone(),
            env: request.env.clone(),
            payload_dir,
        })
    }

    /// The full argument list that will be passed to the child.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Directory holding the materialized payload files.
    #[must_use]
    pub fn payload_dir(&self) -> &Path {
        self.payload_dir.path()
    }

    /// Spawn the agent with independent stdout/stderr pipes.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the process fails to spawn.
    pub fn spawn(self) -> Result<AgentProcess, SpawnError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(ref dir) = self.cwd {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        let child = cmd.spawn().map_err(|e| classify_io(e, &self.program))?;
        tracing::debug!(
            program = %self.program.display(),
            pid = ?child.id(),
            "Spawned agent process"
        );

        Ok(AgentProcess {
            child,
            _payload_dir: self.payload_dir,
        })
    }
}

fn write_payload(path: &Path, content: &str) -> Result<(), SpawnError> {
    std::fs::write(path, content).map_err(|source| SpawnError::Payload {
        path: path.to_path_buf(),
        source,
    })
}

fn classify_io(err: std::io::Error, program: &Path) -> SpawnError {
    let name = program.display().to_string();
    match err.kind() {
        std::io::ErrorKind::NotFound => SpawnError::NotFound(name),
        std::io::ErrorKind::PermissionDenied => SpawnError::PermissionDenied(name),
        _ => SpawnError::Io(err),
    }
}

/// A running agent process.
///
/// Keeps the payload temp directory alive until the process handle drops;
/// cleanup happens on drop and is not correctness-critical.
#[derive(Debug)]
pub struct AgentProcess {
    child: Child,
    _payload_dir: TempDir,
}

impl AgentProcess {
    /// Take ownership of the stdout handle. Only the first call returns it.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Take ownership of the stderr handle. Only the first call returns it.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Get the process ID, if still running.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait for the process to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting fails.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Forcefully kill the process.
    ///
    /// # Errors
    ///
    /// Returns an error if the kill signal cannot be sent.
    pub async fn kill(&mut self) -> std::io::Result<()> {
        self.child.kill().await
    }

    /// Attempt graceful termination with a timeout.
    ///
    /// On Unix, sends SIGTERM first, then SIGKILL after the timeout. On
    /// other platforms, falls back to immediate kill.
    ///
    /// # Errors
    ///
    /// Returns an error if termination fails.
    pub async fn graceful_terminate(&mut self, timeout: Duration) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            self.graceful_terminate_unix(timeout).await
        }

        #[cfg(not(unix))]
        {
            let _ = timeout;
            self.kill().await
        }
    }

    #[cfg(unix)]
    async fn graceful_terminate_unix(&mut self, timeout: Duration) -> std::io::Result<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = self.id() {
            let nix_pid = Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
            let _ = kill(nix_pid, Signal::SIGTERM);

            match tokio::time::timeout(timeout, self.child.wait()).await {
                Ok(Ok(_)) => Ok(()),
                Ok(Err(e)) => Err(e),
                Err(_) => self.child.kill().await,
            }
        } else {
            // Process already exited
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with_prompts() -> RunRequest {
        RunRequest {
            prompt: "fix the bug".to_string(),
            system_prompt: "you are careful".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_prepare_writes_payload_files() {
        let cmd = AgentCommand::prepare(&request_with_prompts()).expect("prepare");
        let prompt = std::fs::read_to_string(cmd.payload_dir().join("prompt.md")).unwrap();
        let system =
            std::fs::read_to_string(cmd.payload_dir().join("system_prompt.md")).unwrap();
        assert_eq!(prompt, "fix the bug");
        assert_eq!(system, "you are careful");
    }

    #[test]
    fn test_prepare_builds_file_reference_args() {
        let cmd = AgentCommand::prepare(&request_with_prompts()).expect("prepare");
        let args = cmd.args();
        assert!(args.contains(&"--prompt-file".to_string()));
        assert!(args.contains(&"--system-prompt-file".to_string()));
        assert!(!args.iter().any(|a| a.contains("fix the bug")));
    }

    #[test]
    fn test_payload_content_is_never_an_argument() {
        let mut request = request_with_prompts();
        request.prompt = "; rm -rf / #".to_string();
        let cmd = AgentCommand::prepare(&request).expect("prepare");
        assert!(!cmd.args().iter().any(|a| a.contains("rm -rf")));
        let on_disk = std::fs::read_to_string(cmd.payload_dir().join("prompt.md")).unwrap();
        assert_eq!(on_disk, "; rm -rf / #");
    }

    #[test]
    fn test_resume_token_appended_verbatim() {
        let mut request = request_with_prompts();
        request.resume = Some("sess-abc-123".to_string());
        let cmd = AgentCommand::prepare(&request).expect("prepare");
        let args = cmd.args();
        let pos = args.iter().position(|a| a == "--resume").expect("--resume");
        assert_eq!(args[pos + 1], "sess-abc-123");
    }

    #[test]
    fn test_base_args_precede_generated_args() {
        let mut request = request_with_prompts();
        request.args = vec!["--output-format".to_string(), "stream-json".to_string()];
        let cmd = AgentCommand::prepare(&request).expect("prepare");
        assert_eq!(cmd.args()[0], "--output-format");
        assert_eq!(cmd.args()[1], "stream-json");
    }

    #[tokio::test]
    async fn test_spawn_missing_binary_is_not_found() {
        let mut request = request_with_prompts();
        request.program = Some(PathBuf::from("/nonexistent/agent-binary"));
        let cmd = AgentCommand::prepare(&request).expect("prepare");
        match cmd.spawn() {
            Err(SpawnError::NotFound(name)) => assert!(name.contains("agent-binary")),
            other => panic!("Expected NotFound, got {other:?}"),
        }
    }
}
