/// Lifecycle state machine: keeps one child running, restarts it when it exits
/// or when the watched file changes, escalating SIGTERM to SIGKILL.
use crate::backoff::spawn_retry_delay;
use crate::config::SupervisorConfig;
use crate::detector::ChangeDetector;
use crate::process::{ProcessControl, Reap};
use crate::signals::Interrupt;
use nix::sys::signal::Signal;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Errors surfaced by the supervisor and its startup.
#[derive(Debug)]
pub enum SupervisorError {
    /// The watched path could not be stat'ed at startup.
    WatchPath {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The shell for the child command could not be started.
    Spawn {
        command: String,
        source: std::io::Error,
    },
    /// A signal handler could not be registered.
    InstallHandler { signal: Signal, source: nix::Error },
    /// Timing settings that cannot be used.
    InvalidConfig { reason: String },
}

impl std::fmt::Display for SupervisorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SupervisorError::WatchPath { path, source } => {
                write!(f, "cannot watch {}: {}", path.display(), source)
            }
            SupervisorError::Spawn { command, source } => {
                write!(f, "failed to start `{}`: {}", command, source)
            }
            SupervisorError::InstallHandler { signal, source } => {
                write!(f, "failed to install {} handler: {}", signal, source)
            }
            SupervisorError::InvalidConfig { reason } => {
                write!(f, "invalid configuration: {}", reason)
            }
        }
    }
}

impl std::error::Error for SupervisorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SupervisorError::WatchPath { source, .. } => Some(source),
            SupervisorError::Spawn { source, .. } => Some(source),
            SupervisorError::InstallHandler { source, .. } => Some(source),
            SupervisorError::InvalidConfig { .. } => None,
        }
    }
}

/// Where the supervisor is in the restart cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Child alive, watching for exit or change.
    Running,
    /// SIGTERM sent; waiting for exit until `deadline`.
    ShuttingDown { deadline: Instant },
    /// SIGKILL sent; waiting for the group to die.
    ForceKilling,
    /// No child owned; spawn one as soon as backoff allows.
    Restarting,
}

pub struct Supervisor<'a, P: ProcessControl> {
    command: String,
    detector: ChangeDetector,
    config: SupervisorConfig,
    processes: P,
    interrupt: &'a Interrupt,
    state: State,
    child: Option<u32>,
    spawns: u64,
    restarts: u64,
    spawn_failures: u32,
    retry_at: Option<Instant>,
}

impl<'a, P: ProcessControl> Supervisor<'a, P> {
    /// Fails if `watched` cannot be stat'ed; no child is started in that case.
    pub fn new(
        command: impl Into<String>,
        watched: impl Into<PathBuf>,
        config: SupervisorConfig,
        processes: P,
        interrupt: &'a Interrupt,
    ) -> Result<Self, SupervisorError> {
        config.validate()?;
        let detector = ChangeDetector::new(watched)?;
        Ok(Self {
            command: command.into(),
            detector,
            config,
            processes,
            interrupt,
            state: State::Restarting,
            child: None,
            spawns: 0,
            restarts: 0,
            spawn_failures: 0,
            retry_at: None,
        })
    }

    #[allow(dead_code)]
    pub fn state(&self) -> State {
        self.state
    }

    #[allow(dead_code)]
    pub fn child(&self) -> Option<u32> {
        self.child
    }

    #[allow(dead_code)]
    pub fn restart_count(&self) -> u64 {
        self.restarts
    }

    pub fn watched(&self) -> &Path {
        self.detector.path()
    }

    /// Poll until the interrupt flag clears, then reap the child.
    ///
    /// Returns the total restart count.
    pub fn run(&mut self) -> u64 {
        tracing::info!(path = %self.watched().display(), "watching");
        tracing::info!(command = %self.command, "command");

        while self.interrupt.is_running() {
            self.tick(Instant::now());
            if self.interrupt.is_running() {
                std::thread::sleep(self.config.poll_interval);
            }
        }
        self.shutdown();
        self.restarts
    }

    /// Evaluate exactly one transition.
    pub fn tick(&mut self, now: Instant) {
        let next = match self.state {
            State::Running => self.on_running(now),
            State::ShuttingDown { deadline } => self.on_shutting_down(now, deadline),
            State::ForceKilling => self.on_force_killing(),
            State::Restarting => self.on_restarting(now),
        };
        if next != self.state {
            tracing::debug!(from = ?self.state, to = ?next, "state transition");
        }
        self.state = next;
    }

    fn on_running(&mut self, now: Instant) -> State {
        let Some(pid) = self.child else {
            return State::Restarting;
        };
        if self.child_exited(pid) {
            tracing::warn!(pid, "process died unexpectedly, restarting");
            return State::Restarting;
        }
        if self.detector.poll() {
            tracing::info!(path = %self.watched().display(), "change detected, restarting");
            self.processes.signal_group(pid, Signal::SIGTERM);
            return State::ShuttingDown {
                deadline: now + self.config.grace_period,
            };
        }
        State::Running
    }

    fn on_shutting_down(&mut self, now: Instant, deadline: Instant) -> State {
        let Some(pid) = self.child else {
            return State::Restarting;
        };
        if self.child_exited(pid) {
            return State::Restarting;
        }
        if now >= deadline {
            tracing::warn!(pid, "process did not respond to SIGTERM, sending SIGKILL");
            self.processes.signal_group(pid, Signal::SIGKILL);
            return State::ForceKilling;
        }
        State::ShuttingDown { deadline }
    }

    fn on_force_killing(&mut self) -> State {
        let Some(pid) = self.child else {
            return State::Restarting;
        };
        if self.child_exited(pid) {
            State::Restarting
        } else {
            State::ForceKilling
        }
    }

    fn on_restarting(&mut self, now: Instant) -> State {
        if let Some(pid) = self.child.take() {
            self.processes.reap(pid);
            self.interrupt.set_child(None);
        }
        if self.retry_at.is_some_and(|at| now < at) {
            return State::Restarting;
        }

        tracing::info!("starting application");
        match self.processes.spawn(&self.command) {
            Ok(pid) => {
                self.child = Some(pid);
                self.interrupt.set_child(Some(pid));
                if self.spawns > 0 {
                    self.restarts += 1;
                }
                self.spawns += 1;
                self.spawn_failures = 0;
                self.retry_at = None;
                self.detector.rebaseline();
                tracing::info!(pid, restarts = self.restarts, "started");
                State::Running
            }
            Err(e) => {
                self.spawn_failures = self.spawn_failures.saturating_add(1);
                let delay = spawn_retry_delay(&self.config.backoff, self.spawn_failures);
                self.retry_at = Some(now + delay);
                tracing::error!(
                    error = %e,
                    failures = self.spawn_failures,
                    retry_in_ms = delay.as_millis() as u64,
                    "failed to start"
                );
                State::Restarting
            }
        }
    }

    fn child_exited(&mut self, pid: u32) -> bool {
        match self.processes.try_reap(pid) {
            Reap::Exited(report) => {
                // The pid is released once reaped; the handler must not target it
                self.interrupt.set_child(None);
                tracing::info!(pid, code = ?report.code, signal = ?report.signal, "process exited");
                true
            }
            Reap::Running => false,
        }
    }

    /// Final teardown: terminate and reap any live child.
    ///
    /// SIGTERM is re-sent so a child spawned after the interrupt handler read a
    /// stale pid is not waited on forever. In `Restarting` the child has already
    /// been reaped and its pid may be reused, so it is never signalled.
    pub fn shutdown(&mut self) {
        if let Some(pid) = self.child.take() {
            tracing::info!(pid, "shutting down the process");
            if self.state != State::Restarting {
                self.processes.signal_group(pid, Signal::SIGTERM);
            }
            self.processes.reap(pid);
            self.interrupt.set_child(None);
        }
    }
}
