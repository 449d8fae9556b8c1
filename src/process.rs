/// Child process control: spawn into a fresh process group, signal the group,
/// and reap the leader.
use crate::supervisor::SupervisorError;
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Child, Command, ExitStatus};

/// How a reaped child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExitReport {
    /// Exit code (None if killed by signal).
    pub code: Option<i32>,
    /// Terminating signal number, if any.
    pub signal: Option<i32>,
}

impl From<ExitStatus> for ExitReport {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
            signal: status.signal(),
        }
    }
}

/// Outcome of a non-blocking reap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reap {
    Exited(ExitReport),
    Running,
}

/// Operations the state machine needs from the OS.
pub trait ProcessControl {
    /// Start `command` under a shell as the leader of a new process group.
    fn spawn(&mut self, command: &str) -> Result<u32, SupervisorError>;

    /// Deliver `signal` to every process in the group led by `pid`.
    fn signal_group(&mut self, pid: u32, signal: Signal);

    /// Check for termination without blocking.
    fn try_reap(&mut self, pid: u32) -> Reap;

    /// Block until the process has terminated and release its handle.
    fn reap(&mut self, pid: u32);
}

/// Runs the child through `/bin/sh -c` with inherited stdio.
#[derive(Debug, Default)]
pub struct ShellProcess {
    child: Option<Child>,
}

impl ShellProcess {
    pub fn new() -> Self {
        Self::default()
    }

    fn owned(&mut self, pid: u32) -> Option<&mut Child> {
        self.child.as_mut().filter(|c| c.id() == pid)
    }
}

impl ProcessControl for ShellProcess {
    fn spawn(&mut self, command: &str) -> Result<u32, SupervisorError> {
        let child = Command::new("/bin/sh")
            .arg("-c")
            .arg(command)
            .process_group(0) // New process group for group-wide signals
            .spawn()
            .map_err(|e| SupervisorError::Spawn {
                command: command.to_string(),
                source: e,
            })?;
        let pid = child.id();
        self.child = Some(child);
        Ok(pid)
    }

    fn signal_group(&mut self, pid: u32, signal: Signal) {
        let Ok(raw) = i32::try_from(pid) else {
            return;
        };
        if raw <= 0 {
            return;
        }
        match killpg(Pid::from_raw(raw), signal) {
            Ok(()) => tracing::debug!(pid, %signal, "signalled process group"),
            Err(Errno::ESRCH) => {
                tracing::debug!(pid, %signal, "process group already gone")
            }
            Err(e) => tracing::warn!(pid, %signal, error = %e, "failed to signal process group"),
        }
    }

    fn try_reap(&mut self, pid: u32) -> Reap {
        let Some(child) = self.owned(pid) else {
            return Reap::Exited(ExitReport::default());
        };
        match child.try_wait() {
            Ok(Some(status)) => Reap::Exited(status.into()),
            Ok(None) => Reap::Running,
            Err(e) => {
                tracing::warn!(pid, error = %e, "wait failed, treating child as exited");
                Reap::Exited(ExitReport::default())
            }
        }
    }

    fn reap(&mut self, pid: u32) {
        if self.owned(pid).is_none() {
            return;
        }
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.wait() {
                tracing::warn!(pid, error = %e, "blocking wait failed");
            }
        }
    }
}
