use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use nix::sys::signal::kill;
use nix::unistd::{getpid, Pid};

use crate::error::Error;

pub fn create_parent_dir(path: &str) -> Result<(), Error> {
    match Path::new(path).parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            fs::create_dir_all(dir).map_err(|e| Error::persistence(path, e))
        }
        _ => Ok(()),
    }
}

pub fn write_pid(path: &str) -> Result<Pid, Error> {
    let pid = getpid();
    fs::write(path, pid.to_string()).map_err(|e| Error::persistence(path, e))?;
    Ok(pid)
}

/// The pid stored in `path`, if any. Unreadable or garbage content counts as absent.
pub fn read_pid(path: &str) -> Option<Pid> {
    let content = fs::read_to_string(path).ok()?;
    match content.trim().parse::<i32>() {
        Ok(raw) if raw > 0 => Some(Pid::from_raw(raw)),
        _ => None,
    }
}

/// A zombie waiting for a reaper counts as dead.
pub fn is_alive(pid: Pid) -> bool {
    if kill(pid, None).is_err() {
        return false;
    }
    match fs::read_to_string(format!("/proc/{pid}/stat")) {
        // state is the first field after the parenthesised command name
        Ok(stat) => stat
            .rsplit_once(')')
            .and_then(|(_, rest)| rest.split_whitespace().next())
            .map_or(true, |state| state != "Z"),
        Err(_) => true,
    }
}

/// The pid of a live master, or `None` when the file is absent or stale.
pub fn running_master(path: &str) -> Option<Pid> {
    read_pid(path).filter(|pid| is_alive(*pid))
}

pub fn remove(path: &str) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != ErrorKind::NotFound {
            crate::logger::LOG.warn(&format!("can not remove {path}: {e}"));
        }
    }
}
