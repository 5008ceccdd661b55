#![forbid(unsafe_code)]

use ct_agent::{AgentApp, AgentConfig};
use nix::sys::signal::{SigSet, Signal};
use nix::sys::signalfd::{SfdFlags, SignalFd};
use std::path::PathBuf;

const USAGE: &str = "\
ct_agent - local daemon recording scheduled-job lifecycles

USAGE:
  ct_agent [CONFIG_FILE]

  CONFIG_FILE  JSON configuration file; built-in defaults apply when omitted.
";

fn main() {
    let mut config_file: Option<PathBuf> = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "-h" | "--help" => {
                println!("{USAGE}");
                return;
            }
            _ if config_file.is_none() => config_file = Some(PathBuf::from(arg)),
            _ => {
                eprintln!("{USAGE}");
                std::process::exit(2);
            }
        }
    }

    let config = match config_file {
        Some(path) => match AgentConfig::from_file(&path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("ct_agent: {err}");
                std::process::exit(2);
            }
        },
        None => AgentConfig::default(),
    };

    let app = match AgentApp::build(config) {
        Ok(app) => app,
        Err(err) => {
            eprintln!("ct_agent: {err}");
            std::process::exit(1);
        }
    };
    let handle = app.shutdown_handle();

    // Termination signals are blocked here, before any worker thread
    // exists, so every thread inherits the mask and delivery happens only
    // through the signalfd watcher below.
    let mut mask = SigSet::empty();
    mask.add(Signal::SIGTERM);
    mask.add(Signal::SIGINT);
    mask.add(Signal::SIGHUP);
    if let Err(err) = mask.thread_block() {
        eprintln!("ct_agent: cannot block termination signals: {err}");
        std::process::exit(1);
    }
    match SignalFd::with_flags(&mask, SfdFlags::SFD_CLOEXEC) {
        Ok(mut signal_fd) => {
            std::thread::spawn(move || {
                if let Ok(Some(_)) = signal_fd.read_signal() {
                    handle.request_shutdown();
                }
            });
        }
        Err(err) => {
            eprintln!("ct_agent: signalfd unavailable, serving without signal handling: {err}");
        }
    }

    if let Err(err) = app.run() {
        eprintln!("ct_agent: {err}");
        std::process::exit(1);
    }
}
