//! Function for running the command line program.

use super::{build, trace::run_trace_subcommand};
use clap::ArgMatches;
use std::time::Instant;

/// Runs the `helioline` command line program.
pub fn run() {
    run_with_args(build::build().get_matches());
}

/// Runs the `helioline` command line program with the given parsed arguments.
pub fn run_with_args(arguments: ArgMatches) {
    let start_instant = Instant::now();

    if let Some(trace_arguments) = arguments.subcommand_matches("trace") {
        run_trace_subcommand(trace_arguments);
    }

    if arguments.is_present("timing") {
        println!("Elapsed time: {} s", start_instant.elapsed().as_secs_f64());
    }
}
