//! Controller side: turns a command word into signals for a running master.

use std::fs;
use std::str::FromStr;
use std::thread::sleep;
use std::time::{Duration, Instant};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use crate::config::GeneralConfig;
use crate::error::Error;
use crate::pidfile;
use crate::signals;
use crate::status::Snapshot;

const LIVENESS_POLL: Duration = Duration::from_millis(100);

pub const USAGE: &str = "usage: [script] [start | stop | quit | restart | reload | status]";

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Command {
    Start,
    Stop,
    Quit,
    Restart,
    Reload,
    Status,
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "start" => Ok(Command::Start),
            "stop" => Ok(Command::Stop),
            "quit" => Ok(Command::Quit),
            "restart" => Ok(Command::Restart),
            "reload" => Ok(Command::Reload),
            "status" => Ok(Command::Status),
            other => Err(Error::UnknownCommand(other.to_owned())),
        }
    }
}

/// What the invocation does once the command has been handled.
#[derive(Debug, PartialEq)]
pub enum Next {
    /// Daemonize and become the master.
    Launch,
    /// Print and exit 0.
    Done(String),
}

pub fn dispatch(command: Command, conf: &GeneralConfig) -> Result<Next, Error> {
    match command {
        Command::Start => match pidfile::running_master(&conf.pidfile) {
            Some(pid) => Err(Error::AlreadyRunning(pid)),
            None => Ok(Next::Launch),
        },
        Command::Stop => {
            stop(conf, signals::GRACEFUL_STOP)?;
            Ok(Next::Done("graceful stop done".to_owned()))
        }
        Command::Quit => {
            stop(conf, signals::FORCEFUL_STOP)?;
            Ok(Next::Done("forceful stop done".to_owned()))
        }
        Command::Restart => {
            stop(conf, signals::FORCEFUL_STOP)?;
            println!("forceful stop done, restarting...");
            Ok(Next::Launch)
        }
        Command::Reload => {
            stop(conf, signals::GRACEFUL_STOP)?;
            println!("graceful stop done, restarting...");
            Ok(Next::Launch)
        }
        Command::Status => status(conf).map(Next::Done),
    }
}

fn master(conf: &GeneralConfig) -> Result<Pid, Error> {
    pidfile::running_master(&conf.pidfile).ok_or_else(|| Error::NotRunning(conf.pidfile.clone()))
}

fn send(pid: Pid, signal: Signal) -> Result<(), Error> {
    kill(pid, signal).map_err(|e| match e {
        nix::errno::Errno::ESRCH => Error::NotRunning(pid.to_string()),
        e => Error::ProcessControl("kill", e),
    })
}

/// Signals the master and blocks until it has gone away.
fn stop(conf: &GeneralConfig, signal: Signal) -> Result<(), Error> {
    let pid = master(conf)?;
    send(pid, signal)?;
    while pidfile::is_alive(pid) {
        sleep(LIVENESS_POLL);
    }
    Ok(())
}

/// Runs one status round trip and returns the rendered report.
pub fn status(conf: &GeneralConfig) -> Result<String, Error> {
    let pid = master(conf)?;
    // a leftover file would satisfy the line count check with stale lines
    let _ = fs::remove_file(&conf.statusfile);
    send(pid, signals::STATUS_REQUEST)?;

    let snapshot = collect(conf);
    let _ = fs::remove_file(&conf.statusfile);

    match snapshot {
        Some(snapshot) => Ok(snapshot.render()),
        None => Ok(format!(
            "master {pid} did not answer within {}s\n",
            conf.status_timeout
        )),
    }
}

/// Polls the snapshot until every worker listed by the master has reported,
/// or until `status_timeout` runs out, in which case partial results are kept.
fn collect(conf: &GeneralConfig) -> Option<Snapshot> {
    let deadline = conf.status_deadline().map(|d| Instant::now() + d);
    let mut latest = None;
    loop {
        if let Ok(content) = fs::read_to_string(&conf.statusfile) {
            if let Some(snapshot) = Snapshot::parse(&content) {
                if snapshot.lines.len() >= snapshot.expected() && snapshot.is_complete() {
                    return Some(snapshot);
                }
                latest = Some(snapshot);
            }
        }
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return latest;
            }
        }
        sleep(conf.poll_interval());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status;
    use nix::unistd::getpid;
    use tempfile::TempDir;

    fn conf(dir: &TempDir) -> GeneralConfig {
        let mut conf = GeneralConfig::new();
        conf.pidfile = dir.path().join("master.pid").to_str().unwrap().to_owned();
        conf.statusfile = dir.path().join("status.txt").to_str().unwrap().to_owned();
        conf.status_poll_millis = 10;
        conf.status_timeout = 1;
        conf
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(Command::Start, "start".parse::<Command>().unwrap());
        assert_eq!(Command::Quit, "quit".parse::<Command>().unwrap());
        assert_eq!(Command::Reload, " reload\n".parse::<Command>().unwrap());
        let err = "boom".parse::<Command>().unwrap_err();
        assert_eq!(crate::error::EXIT_UNKNOWN_COMMAND, err.exit_code());
    }

    #[test]
    fn test_start_without_master() {
        let dir = TempDir::new().unwrap();
        let conf = conf(&dir);
        assert_eq!(Next::Launch, dispatch(Command::Start, &conf).unwrap());

        // stale pid file: no such process
        fs::write(&conf.pidfile, i32::MAX.to_string()).unwrap();
        assert_eq!(Next::Launch, dispatch(Command::Start, &conf).unwrap());
    }

    #[test]
    fn test_start_with_live_master() {
        let dir = TempDir::new().unwrap();
        let conf = conf(&dir);
        pidfile::write_pid(&conf.pidfile).unwrap();
        let err = dispatch(Command::Start, &conf).unwrap_err();
        assert_eq!(crate::error::EXIT_ALREADY_RUNNING, err.exit_code());
    }

    #[test]
    fn test_stop_without_master() {
        let dir = TempDir::new().unwrap();
        let conf = conf(&dir);
        for command in [Command::Stop, Command::Quit, Command::Status, Command::Reload] {
            let err = dispatch(command, &conf).unwrap_err();
            assert_eq!(crate::error::EXIT_NOT_RUNNING, err.exit_code());
        }
    }

    #[test]
    fn test_collect_times_out_with_partial_snapshot() {
        let dir = TempDir::new().unwrap();
        let conf = conf(&dir);
        let mut map = status::PidMap::new();
        map.insert("mcq".to_owned(), vec![101, 102]);
        let header = status::compose_master("demo", getpid(), 0, 0, &map).unwrap();
        status::write_master(&conf.statusfile, &header).unwrap();
        status::append_worker(&conf.statusfile, &status::compose_worker(Pid::from_raw(101), 1, 0, 0))
            .unwrap();

        let snapshot = collect(&conf).unwrap();
        assert_eq!(1, snapshot.lines.len());
        assert!(snapshot.render().contains("(no report)"));
    }

    #[test]
    fn test_collect_complete() {
        let dir = TempDir::new().unwrap();
        let mut conf = conf(&dir);
        conf.status_timeout = 0;
        let mut map = status::PidMap::new();
        map.insert("mcq".to_owned(), vec![101]);
        let header = status::compose_master("demo", getpid(), 0, 0, &map).unwrap();
        status::write_master(&conf.statusfile, &header).unwrap();
        status::append_worker(&conf.statusfile, &status::compose_worker(Pid::from_raw(101), 1, 0, 0))
            .unwrap();

        let snapshot = collect(&conf).unwrap();
        assert!(snapshot.is_complete());
    }
}
