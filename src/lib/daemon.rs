use nix::{
    errno::Errno,
    sys::stat::{umask, Mode},
    unistd::{chdir, close, dup2, fork, setsid, ForkResult},
};

use nix::fcntl::{open, OFlag};

use crate::error::Error;

fn replace_std_fd(filename: &str) -> Result<(), Errno> {
    let fd = open(
        filename,
        OFlag::O_RDWR | OFlag::O_APPEND | OFlag::O_CREAT,
        Mode::from_bits_truncate(0o644),
    )?;

    dup2(fd, 0)?;
    dup2(fd, 1)?;
    dup2(fd, 2)?;

    if fd > 2 {
        close(fd)?;
    }
    Ok(())
}

fn fork_and_exit_parent() -> Result<(), Error> {
    match unsafe { fork() } {
        Ok(ForkResult::Parent { .. }) => unsafe { libc::_exit(0) },
        Ok(ForkResult::Child) => Ok(()),
        Err(e) => Err(Error::ProcessControl("fork", e)),
    }
}

/// Detaches the calling process from its terminal and session.
///
/// Forks twice around `setsid` so the survivor is a session member but not
/// its leader, and therefore can never acquire a controlling terminal again.
/// The survivor runs in `/` with a cleared file-creation mask and its
/// standard streams pointing at `stdfile`. Must be called before any worker
/// exists and before any thread is started.
pub fn daemonize(stdfile: &str) -> Result<(), Error> {
    fork_and_exit_parent()?;
    setsid().map_err(|e| Error::ProcessControl("setsid", e))?;
    fork_and_exit_parent()?;

    umask(Mode::empty());
    chdir("/").map_err(|e| Error::ProcessControl("chdir", e))?;
    replace_std_fd(stdfile).map_err(|e| Error::ProcessControl("redirect standard streams", e))
}
