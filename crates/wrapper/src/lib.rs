#![forbid(unsafe_code)]

pub mod args;
pub mod config;
pub mod reporter;
pub mod supervise;

use args::WrapperArgs;
use config::WrapperConfig;
use ct_common::flock::{FileLock, FlockError};
use ct_common::models::AgentJob;
use ct_common::time::utc_now_epoch_seconds;
use reporter::Reporter;
use supervise::Supervisor;

// Wrapper-owned failure codes. Anything else this process exits with is
// the wrapped child's own status, preserved verbatim.
pub const EXIT_USAGE: i32 = 2;
pub const EXIT_SUPERVISE_FAILURE: i32 = 70;
pub const EXIT_LOCK_TIMEOUT: i32 = 75;
pub const EXIT_SPAWN_FAILURE: i32 = 127;

/// Runs the whole wrapper pipeline and returns the process exit code.
pub fn run(args: WrapperArgs, config: WrapperConfig) -> i32 {
    if args.command.is_empty() {
        eprintln!("ct_wrapper: missing wrapped executable");
        return EXIT_USAGE;
    }

    // Held for the rest of the run; dropping it on any return releases it.
    let _lock = match args.lock_file.as_ref() {
        Some(path) => match FileLock::acquire_exclusive(path, args.lock_timeout) {
            Ok(lock) => Some(lock),
            Err(FlockError::Timeout) => {
                eprintln!("ct_wrapper: timed out waiting for lock file {}", path.display());
                return EXIT_LOCK_TIMEOUT;
            }
            Err(err) => {
                eprintln!("ct_wrapper: lock file {}: {err}", path.display());
                return EXIT_LOCK_TIMEOUT;
            }
        },
        None => None,
    };

    let job_name = args.job_name.clone().unwrap_or_else(|| args.command[0].clone());
    let job_uuid = uuid::Uuid::new_v4().to_string();
    let job = AgentJob {
        job_id: None,
        job_uuid: job_uuid.clone(),
        job_name: job_name.clone(),
        job_args: args.command.clone(),
        job_user: current_user(),
        job_host: current_host(),
        job_tags: args.tags.clone(),
        job_status_code: None,
        job_start_time: utc_now_epoch_seconds(),
        job_end_time: None,
        created_time: None,
        last_updated_time: None,
        last_updated_sequence_number: None,
    };

    let mut reporter = Reporter::connect(&config.agent_socket_path);
    reporter.report_start(&job);

    let supervisor = match Supervisor::spawn(
        &job_name,
        &args.command,
        args.capture_stdout,
        args.capture_stderr,
    ) {
        Ok(supervisor) => supervisor,
        Err(err) => {
            eprintln!("ct_wrapper: failed to start {}: {err}", args.command[0]);
            return EXIT_SPAWN_FAILURE;
        }
    };
    let outcome = match supervisor.wait() {
        Ok(outcome) => outcome,
        Err(err) => {
            eprintln!("ct_wrapper: supervision failed: {err}");
            return EXIT_SUPERVISE_FAILURE;
        }
    };

    reporter.report_completion(&job_uuid, outcome.end_time, outcome.status_code);

    outcome.status_code as i32
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

fn current_host() -> String {
    nix::unistd::gethostname()
        .map(|host| host.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "localhost".to_string())
}
