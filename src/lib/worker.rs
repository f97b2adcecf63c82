//! Worker side of the fork: the run loop a child executes until one of its
//! stop conditions fires. Nothing in here ever returns to the master's code.

use std::panic::{self, AssertUnwindSafe};
use std::process;
use std::sync::atomic::AtomicBool;
use std::thread::sleep;

use nix::unistd::{getpid, Pid};

use crate::config::GeneralConfig;
use crate::logger::{Logger, LOG};
use crate::registry::Handle;
use crate::signals::{self, STATUS, STOP};
use crate::status;

/// Exit code of a worker leaving its loop for any policy reason.
pub const WORKER_EXIT_CODE: i32 = 250;
/// Exit code of a worker whose unit of work panicked.
pub const WORKER_PANIC_CODE: i32 = 101;

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum StopReason {
    Signaled,
    MaxRunTimes,
    MaxRunSeconds,
}

#[derive(Debug)]
pub struct WorkerState {
    pub stopping: bool,
    pub run_times: u64,
    pub started: i64,
}

impl WorkerState {
    pub fn new(started: i64) -> Self {
        WorkerState {
            stopping: false,
            run_times: 0,
            started,
        }
    }

    /// Checked before every unit of work, in this order.
    pub fn stop_reason(&self, conf: &GeneralConfig, now: i64) -> Option<StopReason> {
        if self.stopping {
            Some(StopReason::Signaled)
        } else if self.run_times >= conf.max_run_times {
            Some(StopReason::MaxRunTimes)
        } else if now - self.started >= conf.max_run_seconds as i64 {
            Some(StopReason::MaxRunSeconds)
        } else {
            None
        }
    }
}

struct Worker<'a> {
    pid: Pid,
    task: &'a str,
    conf: &'a GeneralConfig,
    stop: &'a AtomicBool,
    status: &'a AtomicBool,
    state: WorkerState,
}

impl<'a> Worker<'a> {
    fn dispatch_signals(&mut self) {
        if signals::take(self.stop) {
            self.state.stopping = true;
        }
        if signals::take(self.status) {
            self.report_status();
        }
    }

    // best effort: the master may already have been asked for a new snapshot
    fn report_status(&self) {
        let line = status::compose_worker(
            self.pid,
            self.state.run_times,
            self.state.started,
            Logger::epoch_seconds(),
        );
        if let Err(e) = status::append_worker(&self.conf.statusfile, &line) {
            LOG.warn(&format!(
                "worker {} ({}): status not written: {e}",
                self.pid, self.task
            ));
        }
    }

    fn run(&mut self, handle: &mut dyn Handle) -> StopReason {
        loop {
            self.dispatch_signals();
            if let Some(reason) = self.state.stop_reason(self.conf, Logger::epoch_seconds()) {
                return reason;
            }
            handle.handle();
            self.state.run_times += 1;
            sleep(self.conf.sleep_interval());
        }
    }
}

/// Entry point of a freshly forked worker. Never returns.
pub fn run(task: &str, handle: &mut dyn Handle, conf: &GeneralConfig) -> ! {
    if let Err(e) = signals::install_worker_handlers() {
        LOG.crit(&format!("worker ({task}): {e}"));
        process::exit(WORKER_EXIT_CODE);
    }

    let mut worker = Worker {
        pid: getpid(),
        task,
        conf,
        stop: &STOP,
        status: &STATUS,
        state: WorkerState::new(Logger::epoch_seconds()),
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| worker.run(handle)));
    match outcome {
        Ok(reason) => {
            LOG.info(&format!(
                "worker {} ({task}) leaving after {} runs: {reason:?}",
                getpid(),
                worker.state.run_times
            ));
            process::exit(WORKER_EXIT_CODE)
        }
        Err(_) => {
            LOG.crit(&format!("worker {} ({task}): unit of work panicked", getpid()));
            process::exit(WORKER_PANIC_CODE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    fn conf(max_run_times: u64, max_run_seconds: u64) -> GeneralConfig {
        let mut conf = GeneralConfig::new();
        conf.max_run_times = max_run_times;
        conf.max_run_seconds = max_run_seconds;
        conf.sleep_micros = 0;
        conf
    }

    fn worker<'a>(
        conf: &'a GeneralConfig,
        stop: &'a AtomicBool,
        status: &'a AtomicBool,
    ) -> Worker<'a> {
        Worker {
            pid: getpid(),
            task: "test",
            conf,
            stop,
            status,
            state: WorkerState::new(Logger::epoch_seconds()),
        }
    }

    #[test]
    fn test_stop_after_max_run_times() {
        let conf = conf(3, 3600);
        let (stop, status) = (AtomicBool::new(false), AtomicBool::new(false));
        let mut worker = worker(&conf, &stop, &status);
        let mut calls = 0;
        let reason = worker.run(&mut || calls += 1);
        assert_eq!(StopReason::MaxRunTimes, reason);
        assert_eq!(3, calls);
        assert_eq!(3, worker.state.run_times);
    }

    #[test]
    fn test_stop_reason_order() {
        let conf = conf(3, 10);
        let mut state = WorkerState::new(100);
        assert_eq!(None, state.stop_reason(&conf, 105));
        assert_eq!(Some(StopReason::MaxRunSeconds), state.stop_reason(&conf, 110));

        state.run_times = 3;
        assert_eq!(Some(StopReason::MaxRunTimes), state.stop_reason(&conf, 105));

        state.stopping = true;
        assert_eq!(Some(StopReason::Signaled), state.stop_reason(&conf, 110));
    }

    #[test]
    fn test_stopping_finishes_current_iteration() {
        let conf = conf(100, 3600);
        let (stop, status) = (AtomicBool::new(false), AtomicBool::new(false));
        let mut worker = worker(&conf, &stop, &status);
        let mut calls = 0;
        // the stop request lands while the first unit of work is running
        let reason = worker.run(&mut || {
            calls += 1;
            if calls == 1 {
                stop.store(true, Ordering::Relaxed);
            }
        });
        assert_eq!(StopReason::Signaled, reason);
        assert_eq!(1, calls);
    }

    #[test]
    fn test_status_request_appends_one_line() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("status.txt");
        std::fs::write(&path, "").unwrap();

        let mut conf = conf(2, 3600);
        conf.statusfile = path.to_str().unwrap().to_owned();
        let (stop, status) = (AtomicBool::new(false), AtomicBool::new(true));
        let mut worker = worker(&conf, &stop, &status);
        worker.run(&mut || {});

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(1, content.lines().count());
        assert!(content.starts_with(&getpid().to_string()));
        assert!(!status.load(Ordering::Relaxed));
    }
}
