mod backoff;
mod config;
mod detector;
mod process;
mod signals;
mod supervisor;

use clap::error::ErrorKind;
use clap::Parser;
use config::SupervisorConfig;
use process::ShellProcess;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use supervisor::Supervisor;
use tracing_subscriber::EnvFilter;

/// Run a command and restart it whenever a watched file changes or the
/// command exits.
#[derive(Parser, Debug)]
#[command(
    name = "relaunch",
    version,
    about,
    after_help = "Example: relaunch \"npm start\" src/main.js"
)]
pub struct Cli {
    /// Shell command to supervise (run via /bin/sh -c)
    #[arg(value_name = "COMMAND")]
    command: String,

    /// File whose modification triggers a restart
    #[arg(value_name = "PATH")]
    watch: PathBuf,

    /// Poll interval in milliseconds (default: 100)
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Grace period between SIGTERM and SIGKILL in milliseconds (default: 2000)
    #[arg(long)]
    grace_period_ms: Option<u64>,

    /// Upper bound on the retry delay after failed spawns in milliseconds (default: 5000)
    #[arg(long)]
    max_backoff_ms: Option<u64>,

    /// Extra logging (state transitions, signal delivery)
    #[arg(short, long)]
    verbose: bool,

    /// Only warnings, errors and the final summary
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    /// Defaults with CLI overrides applied.
    fn config(&self) -> SupervisorConfig {
        let mut config = SupervisorConfig::default();
        if let Some(ms) = self.poll_interval_ms {
            config.poll_interval = Duration::from_millis(ms);
            // Keep the first retry in step with the poll cadence
            config.backoff.initial_delay = config.poll_interval;
        }
        if let Some(ms) = self.grace_period_ms {
            config.grace_period = Duration::from_millis(ms);
        }
        if let Some(ms) = self.max_backoff_ms {
            config.backoff.max_delay = Duration::from_millis(ms);
        }
        config
    }

    fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level())),
        )
        .with_target(false)
        .with_thread_ids(false)
        .init();

    tracing::debug!(?cli, "parsed CLI arguments");

    let interrupt = match signals::install() {
        Ok(interrupt) => interrupt,
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            return ExitCode::from(1);
        }
    };

    let mut supervisor = match Supervisor::new(
        cli.command.clone(),
        cli.watch.clone(),
        cli.config(),
        ShellProcess::new(),
        interrupt,
    ) {
        Ok(supervisor) => supervisor,
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            return ExitCode::from(1);
        }
    };

    let restarts = supervisor.run();
    println!("Stopped. Total restarts: {restarts}");
    ExitCode::SUCCESS
}
