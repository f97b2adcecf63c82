mod workers;

use std::process;

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};

use crate::config::GeneralConfig;
use crate::error::Error;
use crate::logger::{Logger, LOG};
use crate::pidfile;
use crate::registry::Registry;
use crate::signals::{self, MasterEvent, MasterSignals};
use crate::status;
use crate::worker;

pub use workers::Workers;

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Status {
    Running,
    Stopping,
}

pub struct Supervisor {
    conf: GeneralConfig,
    registry: Registry,
    status: Status,
    started: i64,
    workers: Workers,
}

impl Supervisor {
    pub fn new(registry: Registry, conf: GeneralConfig) -> Self {
        Supervisor {
            conf,
            registry,
            status: Status::Running,
            started: Logger::epoch_seconds(),
            workers: Workers::new(),
        }
    }

    /// Runs the master until every worker is gone after a stop request.
    /// Only returns on a fatal startup error, before any worker exists.
    pub fn start(mut self) -> Result<(), Error> {
        // blocked before the pid is published, so no control signal hits a default handler
        let signals = MasterSignals::install()?;
        let pid = pidfile::write_pid(&self.conf.pidfile)?;
        LOG.info(&format!("master {pid} started, pidfile {}", self.conf.pidfile));

        if let Err(e) = self.fork_workers() {
            self.abort(e);
        }
        self.monitor_workers(&signals)
    }

    fn monitor_workers(&mut self, signals: &MasterSignals) -> ! {
        loop {
            match signals.wait() {
                Ok(event) => self.dispatch(event),
                Err(e) => self.abort(e),
            }

            let reaped = self.reap_workers();
            if reaped > 0 && self.status == Status::Running {
                if let Err(e) = self.fork_workers() {
                    self.abort(e);
                }
            }

            if self.status == Status::Stopping && self.workers.is_empty() {
                pidfile::remove(&self.conf.pidfile);
                LOG.info("all workers gone, master exits");
                process::exit(0);
            }
        }
    }

    fn dispatch(&mut self, event: MasterEvent) {
        match event {
            MasterEvent::GracefulStop => {
                LOG.info("graceful stop requested");
                self.status = Status::Stopping;
                self.signal_workers(signals::GRACEFUL_STOP);
            }
            MasterEvent::ForcefulStop => {
                LOG.info("forceful stop requested");
                self.status = Status::Stopping;
                self.signal_workers(signals::KILL);
            }
            MasterEvent::StatusRequest => {
                self.write_status();
                self.signal_workers(signals::STATUS_REQUEST);
            }
            MasterEvent::ChildExited => {}
        }
    }

    fn signal_workers(&self, signal: Signal) {
        for pid in self.workers.pids() {
            // ESRCH: exited but not reaped yet, the next reap removes it
            if let Err(e) = kill(pid, signal) {
                if e != Errno::ESRCH {
                    LOG.warn(&format!("can not send {signal} to worker {pid}: {e}"));
                }
            }
        }
    }

    fn write_status(&self) {
        let header = status::compose_master(
            &self.conf.name,
            nix::unistd::getpid(),
            self.started,
            Logger::epoch_seconds(),
            &self.workers.to_pid_map(),
        );
        let written = header
            .map_err(|e| e.to_string())
            .and_then(|h| status::write_master(&self.conf.statusfile, &h).map_err(|e| e.to_string()));
        if let Err(e) = written {
            LOG.warn(&format!("status not written to {}: {e}", self.conf.statusfile));
        }
    }

    /// Reaps every exited child without blocking; returns how many were ours.
    fn reap_workers(&mut self) -> usize {
        let mut reaped = 0;
        loop {
            let (pid, how) = match waitpid(None, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::Exited(pid, code)) => (pid, format!("exit code {code}")),
                Ok(WaitStatus::Signaled(pid, signal, _)) => (pid, format!("signal {signal}")),
                Ok(WaitStatus::StillAlive) | Err(Errno::ECHILD) => break,
                Ok(_) => continue,
                Err(Errno::EINTR) => continue,
                Err(e) => {
                    LOG.crit(&format!("waitpid: {e}"));
                    break;
                }
            };
            if let Some(task) = self.workers.remove(pid) {
                LOG.info(&format!("worker {pid} ({task}) exited with {how}"));
                reaped += 1;
            }
        }
        reaped
    }

    /// Forks until every task has its desired count of live workers.
    fn fork_workers(&mut self) -> Result<(), Error> {
        let Supervisor {
            conf,
            registry,
            workers,
            ..
        } = self;
        for task in registry.tasks_mut() {
            for _ in 0..workers.deficit(&task.name, task.count) {
                let pid = fork_one_worker(&task.name, task.handle.as_mut(), conf)?;
                workers.insert(&task.name, pid);
                LOG.info(&format!("worker {pid} ({}) forked", task.name));
            }
        }
        Ok(())
    }

    /// Fatal error with workers possibly alive: take them down with us.
    fn abort(&mut self, err: Error) -> ! {
        LOG.crit(&format!("master aborts: {err}"));
        self.status = Status::Stopping;
        self.signal_workers(signals::KILL);
        while !self.workers.is_empty() {
            match waitpid(None, None) {
                Ok(WaitStatus::Exited(pid, _)) | Ok(WaitStatus::Signaled(pid, _, _)) => {
                    self.workers.remove(pid);
                }
                Ok(_) | Err(Errno::EINTR) => {}
                Err(_) => break,
            }
        }
        pidfile::remove(&self.conf.pidfile);
        crate::exit_with_error(err)
    }
}

fn fork_one_worker(
    task: &str,
    handle: &mut dyn crate::registry::Handle,
    conf: &GeneralConfig,
) -> Result<Pid, Error> {
    match unsafe { fork() } {
        Ok(ForkResult::Parent { child }) => Ok(child),
        Ok(ForkResult::Child) => worker::run(task, handle, conf),
        Err(e) => Err(Error::ProcessControl("fork", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_supervisor_is_running() {
        let mut registry = Registry::new();
        registry.register("mcq", 2, || {}).unwrap();
        let supervisor = Supervisor::new(registry, GeneralConfig::new());
        assert_eq!(Status::Running, supervisor.status);
        assert!(supervisor.workers.is_empty());
    }

    #[test]
    fn test_stop_requests_are_idempotent() {
        let mut supervisor = Supervisor::new(Registry::new(), GeneralConfig::new());
        supervisor.dispatch(MasterEvent::GracefulStop);
        assert_eq!(Status::Stopping, supervisor.status);
        supervisor.dispatch(MasterEvent::GracefulStop);
        assert_eq!(Status::Stopping, supervisor.status);
        supervisor.dispatch(MasterEvent::ForcefulStop);
        assert_eq!(Status::Stopping, supervisor.status);
    }

    #[test]
    fn test_status_request_writes_header() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("status.txt");
        let mut conf = GeneralConfig::new();
        conf.statusfile = path.to_str().unwrap().to_owned();

        let mut supervisor = Supervisor::new(Registry::new(), conf);
        supervisor.dispatch(MasterEvent::StatusRequest);

        let content = std::fs::read_to_string(&path).unwrap();
        let snapshot = status::Snapshot::parse(&content).unwrap();
        assert_eq!(0, snapshot.expected());
        assert_eq!("0 workers", snapshot.header[4]);
        assert_eq!(Status::Running, supervisor.status);
    }
}
