//! Prefork process supervisor.
//!
//! A master process keeps a fixed number of forked workers alive per named
//! task and is driven with signals by later invocations of the same program:
//! `SIGINT` stops gracefully, `SIGTERM` kills every worker, `SIGUSR1` asks
//! the master and its workers for a status snapshot.

pub mod config;
pub mod control;
pub mod daemon;
pub mod error;
pub mod logger;
pub mod pidfile;
pub mod registry;
pub mod signals;
pub mod status;
pub mod supervisor;
pub mod worker;

use config::Config;
use control::{Command, Next};
use error::Error;
use logger::LOG;
use registry::Registry;
use supervisor::Supervisor;

pub const CONF_FILE: &str = "./prefork.ini";

pub fn exit_with_error(err: Error) -> ! {
    eprintln!("{err}");
    std::process::exit(err.exit_code())
}

/// Handles `command` and, for the commands that (re)start the daemon, turns
/// the calling process into the master. Returns only for commands that
/// merely talk to a running master, or on error.
pub fn run(mut registry: Registry, conf: Config, command: &str) -> Result<String, Error> {
    let command = command.parse::<Command>()?;
    conf.general.check().map_err(Error::config)?;
    registry.apply(&conf.tasks)?;
    if registry.is_empty() {
        return Err(Error::Registry("no task registered".to_owned()));
    }

    match control::dispatch(command, &conf.general)? {
        Next::Done(message) => Ok(message),
        Next::Launch => launch(registry, conf),
    }
}

fn launch(registry: Registry, conf: Config) -> Result<String, Error> {
    let general = conf.general;
    pidfile::create_parent_dir(&general.pidfile)?;
    pidfile::create_parent_dir(&general.statusfile)?;

    println!("starting {} ({} workers)", general.name, registry.total_count());
    for task in registry.tasks() {
        println!("  task {}: {} workers", task.name, task.count);
    }
    daemon::daemonize(&general.stdfile)?;
    LOG.info(&format!("{} daemonized", general.name));

    Supervisor::new(registry, general).start()?;
    Ok(String::new())
}
