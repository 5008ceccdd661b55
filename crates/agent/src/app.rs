#![forbid(unsafe_code)]

use crate::config::AgentConfig;
use crate::methods::build_dispatcher;
use ct_common::rpc::Dispatcher;
use ct_common::wire::{read_frame, write_frame};
use ct_storage::{JobStore, StoreError};
use std::io::BufReader;
use std::net::Shutdown;
use std::os::unix::net::{UnixListener, UnixStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);
const RETENTION_TICK: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub enum AgentError {
    Io(std::io::Error),
    Store(StoreError),
}

impl std::fmt::Display for AgentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentError::Io(err) => write!(f, "agent i/o error: {err}"),
            AgentError::Store(err) => write!(f, "agent store error: {err}"),
        }
    }
}

impl std::error::Error for AgentError {}

impl From<std::io::Error> for AgentError {
    fn from(err: std::io::Error) -> Self {
        AgentError::Io(err)
    }
}

impl From<StoreError> for AgentError {
    fn from(err: StoreError) -> Self {
        AgentError::Store(err)
    }
}

/// Requests a graceful stop: the accept loop and the retention loop notice
/// the flag at their next tick; in-flight connections finish on their own.
#[derive(Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

/// The daemon: a unix socket listener serving the job-tracking RPC surface,
/// plus the periodic retention sweep.
pub struct AgentApp {
    config: AgentConfig,
    store: Arc<JobStore>,
    dispatcher: Arc<Dispatcher>,
    shutdown: Arc<AtomicBool>,
}

impl AgentApp {
    pub fn build(config: AgentConfig) -> Result<Self, AgentError> {
        let store = Arc::new(JobStore::open(&config.sqlite_database_path)?);
        let dispatcher = Arc::new(build_dispatcher(Arc::clone(&store)));
        Ok(Self { config, store, dispatcher, shutdown: Arc::new(AtomicBool::new(false)) })
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle { flag: Arc::clone(&self.shutdown) }
    }

    /// Serves until shutdown is requested, then removes the socket file.
    pub fn run(&self) -> Result<(), AgentError> {
        let socket_path = &self.config.listen_socket_path;
        if let Some(parent) = socket_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        // A previous run may have left a stale socket file behind.
        if socket_path.exists() {
            let _ = std::fs::remove_file(socket_path);
        }
        let listener = UnixListener::bind(socket_path)?;
        listener.set_nonblocking(true)?;
        eprintln!("ct_agent: listening on {}", socket_path.display());

        let sweeper = self.spawn_retention_loop();

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
            match listener.accept() {
                Ok((stream, _addr)) => {
                    let dispatcher = Arc::clone(&self.dispatcher);
                    thread::spawn(move || handle_connection(stream, dispatcher));
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(err) => {
                    eprintln!("ct_agent: accept failed: {err}");
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        let _ = std::fs::remove_file(socket_path);
        if let Some(sweeper) = sweeper {
            let _ = sweeper.join();
        }
        eprintln!("ct_agent: shut down");
        Ok(())
    }

    fn spawn_retention_loop(&self) -> Option<thread::JoinHandle<()>> {
        let policy = self.config.clean_up_policy.clone();
        if !policy.enabled {
            return None;
        }
        let store = Arc::clone(&self.store);
        let shutdown = Arc::clone(&self.shutdown);
        Some(thread::spawn(move || {
            let interval = Duration::from_secs(policy.check_interval_minutes * 60);
            let retention = policy.retention_policy();
            let mut last_sweep = Instant::now();
            while !shutdown.load(Ordering::SeqCst) {
                thread::sleep(RETENTION_TICK);
                if last_sweep.elapsed() < interval {
                    continue;
                }
                last_sweep = Instant::now();
                match store.sweep_expired_jobs(&retention) {
                    Ok(sweep) if sweep.total_deleted() > 0 => {
                        eprintln!(
                            "ct_agent: retention sweep removed {} replicated and {} unreplicated job rows",
                            sweep.replicated_deleted, sweep.unreplicated_deleted
                        );
                    }
                    Ok(_) => {}
                    // A failed sweep is retried at the next interval.
                    Err(err) => eprintln!("ct_agent: retention sweep failed: {err}"),
                }
            }
        }))
    }
}

/// Per-connection worker: read frame, dispatch, write frame, repeat until
/// the peer closes. Transport faults end this connection and nothing else.
fn handle_connection(stream: UnixStream, dispatcher: Arc<Dispatcher>) {
    let mut reader = match stream.try_clone() {
        Ok(clone) => BufReader::new(clone),
        Err(err) => {
            eprintln!("ct_agent: cannot clone connection stream: {err}");
            return;
        }
    };
    let mut writer = stream;
    loop {
        match read_frame(&mut reader) {
            Ok(Some(request)) => {
                let response = dispatcher.handle_request(&request);
                if let Err(err) = write_frame(&mut writer, &response) {
                    eprintln!("ct_agent: dropping connection on write failure: {err}");
                    break;
                }
            }
            Ok(None) => break,
            Err(err) => {
                eprintln!("ct_agent: dropping connection: {err}");
                let _ = writer.shutdown(Shutdown::Both);
                break;
            }
        }
    }
}
