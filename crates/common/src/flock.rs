#![forbid(unsafe_code)]

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::time::{Duration, Instant};

const RETRY_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub enum FlockError {
    Io(std::io::Error),
    Timeout,
    Lock(Errno),
}

impl std::fmt::Display for FlockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlockError::Io(err) => write!(f, "cannot open lock file: {err}"),
            FlockError::Timeout => write!(f, "timed out waiting for lock"),
            FlockError::Lock(errno) => write!(f, "flock failed: {errno}"),
        }
    }
}

impl std::error::Error for FlockError {}

impl From<std::io::Error> for FlockError {
    fn from(err: std::io::Error) -> Self {
        FlockError::Io(err)
    }
}

/// Exclusive OS advisory lock bound to a filesystem path. The lock is
/// released when the guard is dropped, on every exit path.
pub struct FileLock {
    _lock: Flock<File>,
}

impl FileLock {
    /// Bounded wait: retries a non-blocking flock on a fixed cadence until
    /// the deadline passes. The lock file is created if missing and never
    /// deleted here.
    pub fn acquire_exclusive(path: impl AsRef<Path>, timeout: Duration) -> Result<Self, FlockError> {
        let deadline = Instant::now() + timeout;
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.as_ref())?;
        loop {
            match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
                Ok(lock) => return Ok(Self { _lock: lock }),
                Err((returned, Errno::EAGAIN)) => {
                    if Instant::now() >= deadline {
                        return Err(FlockError::Timeout);
                    }
                    file = returned;
                    std::thread::sleep(RETRY_INTERVAL);
                }
                Err((_, errno)) => return Err(FlockError::Lock(errno)),
            }
        }
    }
}
