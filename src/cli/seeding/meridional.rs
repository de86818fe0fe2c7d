//! Command line interface for seeding along a meridian.

use crate::{
    cli::utils as cli_utils, exit_on_false, seeding::meridional::MeridionalSeeder3, tracing::ftr,
};
use clap::{Arg, ArgMatches, Command};
use std::f64::consts::PI;

/// Creates a subcommand for using a meridional seeder.
pub fn create_meridional_seeder_subcommand() -> Command<'static> {
    Command::new("meridional_seeder")
        .about("Place seed points along a meridian at fixed radius")
        .long_about(
            "Place seed points along a meridian at fixed radius.\n\
             The colatitudes of the points are evenly spaced between the given limits.",
        )
        .arg(
            Arg::new("radius")
                .short('r')
                .long("radius")
                .require_equals(true)
                .value_name("VALUE")
                .help("Radius of the seed points")
                .takes_value(true)
                .default_value("1.01"),
        )
        .arg(
            Arg::new("longitude")
                .long("longitude")
                .require_equals(true)
                .value_name("VALUE")
                .help("Longitude of the meridian [rad]")
                .takes_value(true)
                .default_value("0.0"),
        )
        .arg(
            Arg::new("min-colatitude")
                .long("min-colatitude")
                .require_equals(true)
                .value_name("VALUE")
                .help("Colatitude of the first seed point [rad]")
                .takes_value(true)
                .default_value("0.01"),
        )
        .arg(
            Arg::new("max-colatitude")
                .long("max-colatitude")
                .require_equals(true)
                .value_name("VALUE")
                .help("Colatitude of the last seed point [rad]")
                .takes_value(true)
                .default_value("3.1315926535897933"),
        )
        .arg(
            Arg::new("n-points")
                .short('n')
                .long("n-points")
                .require_equals(true)
                .value_name("NUMBER")
                .help("Number of seed points to generate")
                .takes_value(true)
                .default_value("50"),
        )
}

/// Creates a meridional seeder based on the provided arguments.
pub fn create_meridional_seeder_from_arguments(arguments: &ArgMatches) -> MeridionalSeeder3 {
    let radius: ftr =
        cli_utils::get_positive_float_value_from_required_parseable_argument(arguments, "radius");
    let longitude: ftr =
        cli_utils::get_finite_float_value_from_required_parseable_argument(arguments, "longitude");
    let min_colatitude: ftr = cli_utils::get_finite_float_value_from_required_parseable_argument(
        arguments,
        "min-colatitude",
    );
    let max_colatitude: ftr = cli_utils::get_finite_float_value_from_required_parseable_argument(
        arguments,
        "max-colatitude",
    );
    let n_points: usize =
        cli_utils::get_value_from_required_parseable_argument(arguments, "n-points");

    exit_on_false!(
        (0.0..=PI).contains(&min_colatitude)
            && (0.0..=PI).contains(&max_colatitude)
            && min_colatitude <= max_colatitude,
        "Error: Colatitudes must satisfy 0 <= min-colatitude <= max-colatitude <= pi"
    );
    exit_on_false!(n_points > 0, "Error: n-points must be larger than zero");

    MeridionalSeeder3::new(radius, longitude, min_colatitude, max_colatitude, n_points)
}
