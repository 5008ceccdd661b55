#![forbid(unsafe_code)]

use ct_wrapper::args::{USAGE, parse_args};
use ct_wrapper::config::WrapperConfig;
use ct_wrapper::{EXIT_USAGE, run};

fn main() {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("ct_wrapper: {err}\n\n{USAGE}");
            std::process::exit(EXIT_USAGE);
        }
    };

    let config = match args.config_file.as_ref() {
        Some(path) => match WrapperConfig::from_file(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("ct_wrapper: {err}");
                std::process::exit(EXIT_USAGE);
            }
        },
        None => WrapperConfig::default(),
    };

    std::process::exit(run(args, config));
}
