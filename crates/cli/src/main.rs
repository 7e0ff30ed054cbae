//! neostore CLI: inspect and edit container files.
//!
//! - `neostore inspect <file>`: header, completion state, metadata groups
//!   and dataset shapes
//! - `neostore set-meta <file> KEY=VALUE... [--group G]`: edit side-table
//!   entries in place
//!
//! Log output goes to stderr and is controlled by `RUST_LOG`.

mod actions;
mod commands;
mod format;
mod parse;
mod value;

use std::process;

use tracing_subscriber::EnvFilter;

use actions::execute;
use commands::build_cli;
use format::{format_error, format_output, OutputMode};
use parse::matches_to_action;

fn main() {
    init_logging();

    let matches = build_cli().get_matches();
    let mode = if matches.get_flag("json") {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let action = match matches_to_action(&matches) {
        Ok(action) => action,
        Err(e) => {
            eprintln!("(error) {}", e);
            process::exit(2);
        }
    };

    let exit_code = match execute(action) {
        Ok(output) => {
            let formatted = format_output(&output, mode);
            if !formatted.is_empty() {
                println!("{}", formatted);
            }
            0
        }
        Err(e) => {
            eprintln!("{}", format_error(&e, mode));
            1
        }
    };
    process::exit(exit_code);
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
