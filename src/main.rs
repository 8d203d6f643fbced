//! Claude Runner - run a headless agent task under supervision.

use std::collections::HashMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use claude_runner::config::ConfigLoader;
use claude_runner::display;
use claude_runner::runner::{RunRequest, Supervisor};

#[derive(Parser)]
#[command(
    name = "claude-runner",
    about = "Run a headless agent task under supervision",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to a config file (default: search standard locations).
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent once and report the outcome.
    Run {
        /// The task prompt.
        prompt: String,
        /// System prompt text.
        #[arg(long, default_value = "")]
        system_prompt: String,
        /// Resume a prior session with this token.
        #[arg(long)]
        resume: Option<String>,
        /// Working directory for the agent.
        #[arg(long)]
        cwd: Option<PathBuf>,
        /// Environment overrides (KEY=VALUE, repeatable).
        #[arg(long = "env", value_parser = parse_env)]
        env: Vec<(String, String)>,
    },
}

fn parse_env(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let loader = cli
        .config
        .clone()
        .map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    let mut config = match loader.load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return std::process::ExitCode::FAILURE;
        }
    };
    if cli.verbose > 0 {
        config.verbose = true;
    }

    match cli.command {
        Commands::Run {
            prompt,
            system_prompt,
            resume,
            cwd,
            env,
        } => {
            let request = RunRequest {
                program: None,
                args: Vec::new(),
                resume: resume.clone(),
                cwd,
                env: env.into_iter().collect::<HashMap<_, _>>(),
                prompt,
                system_prompt,
            };

            let program = config
                .agent_bin
                .as_ref()
                .map_or_else(|| "claude".to_string(), |p| p.display().to_string());
            display::print_run_start(&program, resume.as_deref());

            let supervisor = Supervisor::new(config);
            let result = supervisor.run(&request).await;

            display::print_run_end(result.success, result.exit_code, &result.last_message);
            if let Some(session_id) = result.resume_hint() {
                if result.limit_reached {
                    println!("Rate limit reached. Resume later with: --resume {session_id}");
                } else {
                    println!("Run failed. Retry with: --resume {session_id}");
                }
            }

            if result.success {
                std::process::ExitCode::SUCCESS
            } else {
                std::process::ExitCode::FAILURE
            }
        }
    }
}
