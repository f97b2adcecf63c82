//! Signal plumbing shared by the master, its workers and the controller.
//!
//! The master never runs user-level handlers: the control signals and
//! `SIGCHLD` stay blocked and are taken one at a time with `sigwait` from
//! the monitoring loop. Workers install handlers that only raise a flag,
//! the run loop acts on the flags between two units of work.

use std::sync::atomic::{AtomicBool, Ordering};

use libc::{SIGINT, SIGUSR1};
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};

use crate::error::Error;

pub const GRACEFUL_STOP: Signal = Signal::SIGINT;
pub const FORCEFUL_STOP: Signal = Signal::SIGTERM;
pub const STATUS_REQUEST: Signal = Signal::SIGUSR1;

/// What a worker receives when the master is told to stop forcefully.
pub const KILL: Signal = Signal::SIGKILL;

pub static STOP: AtomicBool = AtomicBool::new(false);
pub static STATUS: AtomicBool = AtomicBool::new(false);

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum MasterEvent {
    GracefulStop,
    ForcefulStop,
    StatusRequest,
    ChildExited,
}

impl MasterEvent {
    pub fn from_signal(signal: Signal) -> Option<Self> {
        match signal {
            GRACEFUL_STOP => Some(MasterEvent::GracefulStop),
            FORCEFUL_STOP => Some(MasterEvent::ForcefulStop),
            STATUS_REQUEST => Some(MasterEvent::StatusRequest),
            Signal::SIGCHLD => Some(MasterEvent::ChildExited),
            _ => None,
        }
    }
}

fn master_set() -> SigSet {
    let mut mask = SigSet::empty();
    mask.add(GRACEFUL_STOP);
    mask.add(FORCEFUL_STOP);
    mask.add(STATUS_REQUEST);
    mask.add(Signal::SIGCHLD);
    mask
}

extern "C" fn sigchld_handler(_: libc::c_int) {}

/// Signal source of the master's monitoring loop.
pub struct MasterSignals {
    mask: SigSet,
}

impl MasterSignals {
    /// Blocks the control signals and `SIGCHLD`. Workers forked afterwards
    /// inherit the mask and undo it in [`install_worker_handlers`].
    pub fn install() -> Result<Self, Error> {
        // A real handler, so a blocked SIGCHLD is kept pending instead of discarded.
        let chld = SigAction::new(
            SigHandler::Handler(sigchld_handler),
            SaFlags::SA_NOCLDSTOP,
            SigSet::empty(),
        );
        unsafe { signal::sigaction(Signal::SIGCHLD, &chld) }
            .map_err(|e| Error::ProcessControl("sigaction", e))?;

        let mask = master_set();
        mask.thread_block()
            .map_err(|e| Error::ProcessControl("sigprocmask", e))?;
        Ok(MasterSignals { mask })
    }

    /// Suspends until one of the master's signals is pending.
    pub fn wait(&self) -> Result<MasterEvent, Error> {
        loop {
            let signal = self
                .mask
                .wait()
                .map_err(|e| Error::ProcessControl("sigwait", e))?;
            if let Some(event) = MasterEvent::from_signal(signal) {
                return Ok(event);
            }
        }
    }
}

extern "C" fn handle_worker_signal(signal: libc::c_int) {
    match signal {
        SIGINT => STOP.store(true, Ordering::Relaxed),
        SIGUSR1 => STATUS.store(true, Ordering::Relaxed),
        _ => {}
    }
}

/// Runs in a freshly forked worker: flag handlers for graceful stop and
/// status requests, default dispositions for everything the master
/// customised, then an empty signal mask.
pub fn install_worker_handlers() -> Result<(), Error> {
    STOP.store(false, Ordering::Relaxed);
    STATUS.store(false, Ordering::Relaxed);

    let flag = SigAction::new(
        SigHandler::Handler(handle_worker_signal),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    let default = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    unsafe {
        signal::sigaction(GRACEFUL_STOP, &flag)
            .and_then(|_| signal::sigaction(STATUS_REQUEST, &flag))
            .and_then(|_| signal::sigaction(FORCEFUL_STOP, &default))
            .and_then(|_| signal::sigaction(Signal::SIGCHLD, &default))
    }
    .map_err(|e| Error::ProcessControl("sigaction", e))?;

    SigSet::empty()
        .thread_set_mask()
        .map_err(|e| Error::ProcessControl("sigprocmask", e))
}

/// Takes a worker flag, clearing it.
pub fn take(flag: &AtomicBool) -> bool {
    flag.swap(false, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_master_event_mapping() {
        assert_eq!(
            Some(MasterEvent::GracefulStop),
            MasterEvent::from_signal(Signal::SIGINT)
        );
        assert_eq!(
            Some(MasterEvent::ForcefulStop),
            MasterEvent::from_signal(Signal::SIGTERM)
        );
        assert_eq!(
            Some(MasterEvent::StatusRequest),
            MasterEvent::from_signal(Signal::SIGUSR1)
        );
        assert_eq!(
            Some(MasterEvent::ChildExited),
            MasterEvent::from_signal(Signal::SIGCHLD)
        );
        assert_eq!(None, MasterEvent::from_signal(Signal::SIGHUP));
    }

    #[test]
    fn test_take_clears_flag() {
        let flag = AtomicBool::new(true);
        assert!(take(&flag));
        assert!(!take(&flag));
    }

    #[test]
    fn test_worker_handler_sets_flags() {
        handle_worker_signal(SIGUSR1);
        assert!(take(&STATUS));
        handle_worker_signal(SIGINT);
        assert!(take(&STOP));
    }
}
