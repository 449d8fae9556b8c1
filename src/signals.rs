/// Signal handling for interrupt-driven shutdown.
///
/// SIGINT and SIGTERM run an async-signal-safe handler that clears the running
/// flag and sends SIGTERM to the current child's process group. The handler
/// touches only the atomics in [`Interrupt`]: no allocation, no locks, no I/O.
use nix::libc::c_int;
use nix::sys::signal::{killpg, sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::unistd::Pid;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use crate::supervisor::SupervisorError;

/// State shared between the poll loop and the signal handler.
#[derive(Debug)]
pub struct Interrupt {
    running: AtomicBool,
    /// Process-group id of the current child, 0 when there is none.
    child_pgid: AtomicI32,
}

impl Interrupt {
    pub const fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            child_pgid: AtomicI32::new(0),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Clear the running flag without touching the child.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Record the group the handler should signal. Written by the poll loop only.
    pub fn set_child(&self, pid: Option<u32>) {
        let raw = pid.and_then(|p| i32::try_from(p).ok()).unwrap_or(0);
        self.child_pgid.store(raw, Ordering::SeqCst);
    }

    pub fn child(&self) -> Option<Pid> {
        match self.child_pgid.load(Ordering::SeqCst) {
            raw if raw > 0 => Some(Pid::from_raw(raw)),
            _ => None,
        }
    }

    /// Stop the loop and ask the child group to terminate.
    ///
    /// Async-signal-safe. A stale pid is tolerated: signalling a dead group fails
    /// with ESRCH, which is ignored.
    pub fn interrupt(&self) {
        self.stop();
        if let Some(pgid) = self.child() {
            let _ = killpg(pgid, Signal::SIGTERM);
        }
    }
}

static INTERRUPT: Interrupt = Interrupt::new();

extern "C" fn handle_interrupt(_signum: c_int) {
    INTERRUPT.interrupt();
}

/// Register the handler for SIGINT and SIGTERM and return the process-wide handle.
///
/// Call once at startup. Every other signal keeps its default disposition.
pub fn install() -> Result<&'static Interrupt, SupervisorError> {
    let action = SigAction::new(
        SigHandler::Handler(handle_interrupt),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    for signal in [Signal::SIGINT, Signal::SIGTERM] {
        // SAFETY: the handler only performs atomic loads/stores and killpg(2),
        // all of which are async-signal-safe.
        unsafe { sigaction(signal, &action) }
            .map_err(|e| SupervisorError::InstallHandler { signal, source: e })?;
    }
    tracing::debug!("interrupt handlers installed for SIGINT and SIGTERM");
    Ok(&INTERRUPT)
}
