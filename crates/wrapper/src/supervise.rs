#![forbid(unsafe_code)]

use ct_common::time::utc_now_epoch_seconds;
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, poll};
use nix::sys::signal::{SigSet, Signal};
use nix::sys::signalfd::{SfdFlags, SignalFd};
use std::io::Read;
use std::os::fd::{AsFd, BorrowedFd};
use std::process::{Child, ChildStderr, ChildStdout, Command, ExitStatus, Stdio};

const POLL_TICK_MS: u16 = 1000;
const CAPTURE_CHUNK_BYTES: usize = 8192;

#[derive(Debug)]
pub enum SuperviseError {
    Io(std::io::Error),
    Sys(Errno),
}

impl std::fmt::Display for SuperviseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuperviseError::Io(err) => write!(f, "{err}"),
            SuperviseError::Sys(errno) => write!(f, "{errno}"),
        }
    }
}

impl std::error::Error for SuperviseError {}

impl From<std::io::Error> for SuperviseError {
    fn from(err: std::io::Error) -> Self {
        SuperviseError::Io(err)
    }
}

impl From<Errno> for SuperviseError {
    fn from(errno: Errno) -> Self {
        SuperviseError::Sys(errno)
    }
}

/// What the supervised child ended with.
#[derive(Clone, Copy, Debug)]
pub struct JobOutcome {
    pub status_code: i64,
    pub end_time: f64,
}

trait CaptureSource: Read + Send {
    fn fd(&self) -> BorrowedFd<'_>;
}

impl CaptureSource for ChildStdout {
    fn fd(&self) -> BorrowedFd<'_> {
        self.as_fd()
    }
}

impl CaptureSource for ChildStderr {
    fn fd(&self) -> BorrowedFd<'_> {
        self.as_fd()
    }
}

struct CaptureStream {
    label: &'static str,
    source: Box<dyn CaptureSource>,
    pending: Vec<u8>,
}

impl CaptureStream {
    /// Reads one chunk after readiness; returns false at end-of-stream.
    fn drain_chunk(&mut self, job_label: &str) -> bool {
        let mut chunk = [0u8; CAPTURE_CHUNK_BYTES];
        loop {
            match self.source.read(&mut chunk) {
                Ok(0) => {
                    self.flush_pending(job_label);
                    return false;
                }
                Ok(read) => {
                    self.pending.extend_from_slice(&chunk[..read]);
                    self.log_complete_lines(job_label);
                    return true;
                }
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    eprintln!("ct_wrapper: {} capture read failed: {err}", self.label);
                    return false;
                }
            }
        }
    }

    fn log_complete_lines(&mut self, job_label: &str) {
        while let Some(newline) = self.pending.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            self.log_line(job_label, &line);
        }
    }

    fn flush_pending(&mut self, job_label: &str) {
        if self.pending.is_empty() {
            return;
        }
        let line = std::mem::take(&mut self.pending);
        self.log_line(job_label, &line);
    }

    fn log_line(&self, job_label: &str, line: &[u8]) {
        // Child output is arbitrary bytes; decode permissively, never fail.
        let text = String::from_utf8_lossy(line);
        eprintln!("[{job_label}/{}] {}", self.label, text.trim_end_matches(['\n', '\r']));
    }
}

/// Runs one child process and multiplexes its exit notification with its
/// captured output pipes in a single poll-based wait.
pub struct Supervisor {
    job_label: String,
    child: Child,
    streams: Vec<CaptureStream>,
    signal_fd: SignalFd,
}

impl Supervisor {
    /// SIGCHLD is blocked and routed to a signalfd before the child is
    /// spawned, so an exit cannot be delivered before anyone listens.
    pub fn spawn(
        job_label: &str,
        command: &[String],
        capture_stdout: bool,
        capture_stderr: bool,
    ) -> Result<Self, SuperviseError> {
        let Some((program, rest)) = command.split_first() else {
            return Err(SuperviseError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty command",
            )));
        };

        let mut mask = SigSet::empty();
        mask.add(Signal::SIGCHLD);
        mask.thread_block()?;
        let signal_fd =
            SignalFd::with_flags(&mask, SfdFlags::SFD_CLOEXEC | SfdFlags::SFD_NONBLOCK)?;

        let mut builder = Command::new(program);
        builder.args(rest);
        if capture_stdout {
            builder.stdout(Stdio::piped());
        }
        if capture_stderr {
            builder.stderr(Stdio::piped());
        }
        let mut child = builder.spawn()?;

        let mut streams = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            streams.push(CaptureStream {
                label: "stdout",
                source: Box::new(stdout),
                pending: Vec::new(),
            });
        }
        if let Some(stderr) = child.stderr.take() {
            streams.push(CaptureStream {
                label: "stderr",
                source: Box::new(stderr),
                pending: Vec::new(),
            });
        }

        Ok(Self { job_label: job_label.to_string(), child, streams, signal_fd })
    }

    /// Blocks until the child has exited and every capture pipe has hit
    /// end-of-stream. The exit status and end time are recorded at first
    /// observation; draining continues afterwards. The 1 s poll tick keeps
    /// `try_wait` running even if signal delivery is missed.
    pub fn wait(mut self) -> Result<JobOutcome, SuperviseError> {
        let mut outcome: Option<JobOutcome> = None;
        loop {
            if let Some(done) = outcome
                && self.streams.is_empty()
            {
                return Ok(done);
            }

            let mut signal_ready = false;
            let mut stream_ready = vec![false; self.streams.len()];
            {
                let watch_signal = outcome.is_none();
                let mut fds = Vec::with_capacity(self.streams.len() + 1);
                if watch_signal {
                    fds.push(PollFd::new(self.signal_fd.as_fd(), PollFlags::POLLIN));
                }
                for stream in &self.streams {
                    fds.push(PollFd::new(stream.source.fd(), PollFlags::POLLIN));
                }
                match poll(&mut fds, POLL_TICK_MS) {
                    Ok(0) => {}
                    Ok(_) => {
                        let mut next = 0;
                        if watch_signal {
                            signal_ready = revents_ready(&fds[0]);
                            next = 1;
                        }
                        for (slot, fd) in stream_ready.iter_mut().zip(&fds[next..]) {
                            *slot = revents_ready(fd);
                        }
                    }
                    Err(Errno::EINTR) => {}
                    Err(errno) => return Err(SuperviseError::Sys(errno)),
                }
            }

            if signal_ready {
                // Nonblocking fd: drain every queued notification.
                while let Ok(Some(_)) = self.signal_fd.read_signal() {}
            }

            if !self.streams.is_empty() {
                let job_label = &self.job_label;
                let mut index = 0;
                self.streams.retain_mut(|stream| {
                    let was_ready = stream_ready[index];
                    index += 1;
                    if !was_ready {
                        return true;
                    }
                    stream.drain_chunk(job_label)
                });
            }

            if outcome.is_none()
                && let Some(status) = self.child.try_wait()?
            {
                outcome = Some(JobOutcome {
                    status_code: exit_status_code(status),
                    end_time: utc_now_epoch_seconds(),
                });
            }
        }
    }
}

fn revents_ready(fd: &PollFd<'_>) -> bool {
    fd.revents().is_some_and(|flags| {
        flags.intersects(PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR)
    })
}

/// The child's own exit code, or the 128+signal convention when it was
/// terminated by a signal.
fn exit_status_code(status: ExitStatus) -> i64 {
    use std::os::unix::process::ExitStatusExt;
    match status.code() {
        Some(code) => i64::from(code),
        None => status.signal().map(|signal| 128 + i64::from(signal)).unwrap_or(1),
    }
}
