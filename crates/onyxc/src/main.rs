//! Onyx compiler driver.
//!
//! Front door for running compiled Onyx modules:
//!
//! ```text
//! onyxc run module.wasm [--debug]
//! ```
//!
//! The compilation half of the pipeline lives in `libonyx` and is driven by
//! the parser front end; this binary wires up logging, reads the module
//! bytes and hands them to the runtime loader. The exit status is zero iff
//! the module ran without a trap.

use std::process::exit;

use libonyx_runtime::{run_wasm, RunOptions};
use log::LevelFilter;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

fn usage(program: &str) -> ! {
    eprintln!("Usage: {program} run <module.wasm> [--debug] [--verbose]");
    exit(1);
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("onyxc");

    let mut command = None;
    let mut module_path = None;
    let mut options = RunOptions::default();
    let mut level = LevelFilter::Warn;

    for arg in &args[1..] {
        match arg.as_str() {
            "--debug" => options.debug = true,
            "--verbose" => level = LevelFilter::Info,
            "run" if command.is_none() => command = Some("run"),
            other if module_path.is_none() => module_path = Some(other.to_string()),
            _ => usage(program),
        }
    }

    TermLogger::init(level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto)
        .expect("logger initialises once");

    let (Some("run"), Some(path)) = (command, module_path) else {
        usage(program);
    };

    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(error) => {
            eprintln!("Error reading {path}: {error}");
            exit(1);
        }
    };

    match run_wasm(bytes, &options) {
        Ok(()) => {}
        Err(error) => {
            log::error!("{error}");
            exit(1);
        }
    }
}
