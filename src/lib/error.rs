use nix::errno::Errno;
use nix::unistd::Pid;
use std::io;

pub const EXIT_CONFIG: i32 = 250;
pub const EXIT_PERSISTENCE: i32 = 251;
pub const EXIT_PROCESS_CONTROL: i32 = 252;
pub const EXIT_ALREADY_RUNNING: i32 = 253;
pub const EXIT_NOT_RUNNING: i32 = 254;
pub const EXIT_UNKNOWN_COMMAND: i32 = 255;

#[derive(Debug)]
pub enum Error {
    Config(Box<dyn std::error::Error>),
    Registry(String),
    Persistence(String, io::Error),
    ProcessControl(&'static str, Errno),
    AlreadyRunning(Pid),
    NotRunning(String),
    UnknownCommand(String),
}

impl Error {
    pub fn config(err: impl Into<Box<dyn std::error::Error>>) -> Self {
        Error::Config(err.into())
    }

    pub fn persistence(path: &str, err: io::Error) -> Self {
        Error::Persistence(path.to_owned(), err)
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) | Error::Registry(_) => EXIT_CONFIG,
            Error::Persistence(..) => EXIT_PERSISTENCE,
            Error::ProcessControl(..) => EXIT_PROCESS_CONTROL,
            Error::AlreadyRunning(_) => EXIT_ALREADY_RUNNING,
            Error::NotRunning(_) => EXIT_NOT_RUNNING,
            Error::UnknownCommand(_) => EXIT_UNKNOWN_COMMAND,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Config(ref e) => write!(f, "{e}"),
            Error::Registry(ref s) => write!(f, "registry: {s}"),
            Error::Persistence(ref path, ref e) => write!(f, "{path}: can not write file: {e}"),
            Error::ProcessControl(ref op, ref e) => write!(f, "{op} failed: {e}"),
            Error::AlreadyRunning(ref pid) => write!(f, "master {pid}: already running."),
            Error::NotRunning(ref path) => {
                write!(f, "{path}: no running master, is the daemon started?")
            }
            Error::UnknownCommand(ref s) => write!(f, "*** Unknown command: {s}"),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let errors = [
            Error::config(String::from("bad")),
            Error::persistence("/tmp/x", io::Error::from(io::ErrorKind::PermissionDenied)),
            Error::ProcessControl("fork", Errno::EAGAIN),
            Error::AlreadyRunning(Pid::from_raw(42)),
            Error::NotRunning("/tmp/x.pid".to_owned()),
            Error::UnknownCommand("boom".to_owned()),
        ];
        let mut codes: Vec<i32> = errors.iter().map(Error::exit_code).collect();
        assert!(codes.iter().all(|c| *c != 0));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(errors.len(), codes.len());
        assert_eq!(EXIT_CONFIG, Error::Registry("dup".to_owned()).exit_code());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            "master 42: already running.",
            Error::AlreadyRunning(Pid::from_raw(42)).to_string()
        );
        assert_eq!(
            "*** Unknown command: boom",
            Error::UnknownCommand("boom".to_owned()).to_string()
        );
        assert_eq!(
            "registry: duplicated task: a",
            Error::Registry("duplicated task: a".to_owned()).to_string()
        );
    }
}
