// mforth console interpreter
//
// Reads lines from stdin and feeds them to the VM, reporting the
// abort reason when a line fails. Files named on the command line
// are included first; an image loaded with -l replaces bootstrap.

mod config;
mod console;

use std::io::{self, BufRead};
use std::process::ExitCode;

use config::Config;
use console::ConsoleHost;
use mforth::ForthVm;

fn main() -> ExitCode {
    let config: Config = argh::from_env();

    let mut logger = env_logger::Builder::from_default_env();
    if config.trace {
        logger.filter_level(log::LevelFilter::Trace);
    }
    logger.init();

    let mut vm = ForthVm::new(config.trace);
    let mut host = ConsoleHost::new();

    if let Some(image) = &config.load {
        if let Err(e) = host.load_image(&mut vm, image) {
            eprintln!("error loading image '{}': {e}", image.display());
            return ExitCode::FAILURE;
        }
    } else if let Err(e) = vm.bootstrap() {
        eprintln!("bootstrap failed: {e}");
        return ExitCode::FAILURE;
    }

    for file in &config.files {
        host.include(&mut vm, file);
        if host.exit {
            return ExitCode::SUCCESS;
        }
    }

    let stdin = io::stdin();
    let mut line_no = 0;
    for line in stdin.lock().lines() {
        let Ok(line) = line else {
            break;
        };
        line_no += 1;
        if host.eval_line(&mut vm, Some(("stdin", line_no)), &line) {
            println!(" ok");
        }
        if host.exit {
            break;
        }
    }
    ExitCode::SUCCESS
}
