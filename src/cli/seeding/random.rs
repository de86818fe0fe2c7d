//! Command line interface for seeding with random points in a shell.

use crate::{cli::utils as cli_utils, exit_on_false, seeding::random::RandomShellSeeder3, tracing::ftr};
use clap::{Arg, ArgMatches, Command};

/// Creates a subcommand for using a random seeder.
pub fn create_random_seeder_subcommand() -> Command<'static> {
    Command::new("random_seeder")
        .about("Place seed points randomly in a spherical shell")
        .long_about(
            "Place seed points randomly in a spherical shell.\n\
             The points are distributed uniformly in volume between the given radii.",
        )
        .arg(
            Arg::new("min-radius")
                .long("min-radius")
                .require_equals(true)
                .value_name("VALUE")
                .help("Inner radius of the seeding shell")
                .takes_value(true)
                .default_value("1.01"),
        )
        .arg(
            Arg::new("max-radius")
                .long("max-radius")
                .require_equals(true)
                .value_name("VALUE")
                .help("Outer radius of the seeding shell")
                .takes_value(true)
                .default_value("1.5"),
        )
        .arg(
            Arg::new("n-points")
                .short('n')
                .long("n-points")
                .require_equals(true)
                .value_name("NUMBER")
                .help("Number of seed points to generate")
                .takes_value(true)
                .default_value("100"),
        )
        .arg(
            Arg::new("rng-seed")
                .long("rng-seed")
                .require_equals(true)
                .value_name("NUMBER")
                .help("Seed for the random number generator")
                .takes_value(true)
                .default_value("0"),
        )
}

/// Creates a random shell seeder based on the provided arguments.
pub fn create_random_seeder_from_arguments(arguments: &ArgMatches) -> RandomShellSeeder3 {
    let min_radius: ftr =
        cli_utils::get_positive_float_value_from_required_parseable_argument(arguments, "min-radius");
    let max_radius: ftr =
        cli_utils::get_positive_float_value_from_required_parseable_argument(arguments, "max-radius");
    let n_points: usize =
        cli_utils::get_value_from_required_parseable_argument(arguments, "n-points");
    let rng_seed: u64 = cli_utils::get_value_from_required_parseable_argument(arguments, "rng-seed");

    exit_on_false!(
        max_radius >= min_radius,
        "Error: max-radius must not be smaller than min-radius"
    );

    RandomShellSeeder3::new(min_radius, max_radius, n_points, rng_seed)
}
