#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_LOCK_TIMEOUT_SECONDS: u64 = 120;

pub const USAGE: &str = "\
ct_wrapper - supervise a scheduled job and report it to the local agent

USAGE:
  ct_wrapper [-j NAME] [-L LOCK_FILE] [--lock-file-timeout SECS]
             [-t TAG]... [--capture-stdout] [--capture-stderr]
             [-f CONFIG_FILE] [--] EXECUTABLE [ARGS...]

OPTIONS:
  -j, --job-name NAME        Name the job is tracked under (default: the executable).
  -L, --lock-file PATH       Hold an exclusive flock on PATH while the job runs.
      --lock-file-timeout S  Give up on the lock after S seconds (default: 120).
  -t, --tag TAG              Attach a tag; repeatable.
      --capture-stdout       Capture and log the child's standard output.
      --capture-stderr       Capture and log the child's standard error.
  -f, --config-file PATH     JSON wrapper configuration file.
";

#[derive(Clone, Debug, PartialEq)]
pub struct WrapperArgs {
    pub job_name: Option<String>,
    pub lock_file: Option<PathBuf>,
    pub lock_timeout: Duration,
    pub tags: Vec<String>,
    pub capture_stdout: bool,
    pub capture_stderr: bool,
    pub config_file: Option<PathBuf>,
    pub command: Vec<String>,
}

impl Default for WrapperArgs {
    fn default() -> Self {
        Self {
            job_name: None,
            lock_file: None,
            lock_timeout: Duration::from_secs(DEFAULT_LOCK_TIMEOUT_SECONDS),
            tags: Vec::new(),
            capture_stdout: false,
            capture_stderr: false,
            config_file: None,
            command: Vec::new(),
        }
    }
}

/// Parses the wrapper command line. The first non-flag token (or anything
/// after `--`) starts the wrapped command, which is passed through
/// untouched.
pub fn parse_args<I: Iterator<Item = String>>(mut args: I) -> Result<WrapperArgs, String> {
    let mut parsed = WrapperArgs::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-j" | "--job-name" => {
                parsed.job_name = Some(required_value(&mut args, "--job-name")?);
            }
            "-L" | "--lock-file" => {
                parsed.lock_file = Some(PathBuf::from(required_value(&mut args, "--lock-file")?));
            }
            "--lock-file-timeout" => {
                let raw = required_value(&mut args, "--lock-file-timeout")?;
                let seconds: u64 = raw
                    .parse()
                    .map_err(|_| format!("invalid --lock-file-timeout value: {raw}"))?;
                parsed.lock_timeout = Duration::from_secs(seconds);
            }
            "-t" | "--tag" => {
                parsed.tags.push(required_value(&mut args, "--tag")?);
            }
            "--capture-stdout" => parsed.capture_stdout = true,
            "--capture-stderr" => parsed.capture_stderr = true,
            "-f" | "--config-file" => {
                parsed.config_file =
                    Some(PathBuf::from(required_value(&mut args, "--config-file")?));
            }
            "--" => {
                parsed.command.extend(args);
                break;
            }
            _ if !arg.starts_with('-') => {
                parsed.command.push(arg);
                parsed.command.extend(args);
                break;
            }
            _ => return Err(format!("unknown flag: {arg}")),
        }
    }
    if parsed.command.is_empty() {
        return Err("missing wrapped executable".to_string());
    }
    Ok(parsed)
}

fn required_value<I: Iterator<Item = String>>(args: &mut I, flag: &str) -> Result<String, String> {
    args.next().ok_or_else(|| format!("{flag} requires a value"))
}
