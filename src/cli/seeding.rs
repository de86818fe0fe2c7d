//! Command line interface for generating seed points.

pub mod manual;
pub mod meridional;
pub mod random;

use self::{
    manual::{create_manual_seeder_from_arguments, create_manual_seeder_subcommand},
    meridional::{create_meridional_seeder_from_arguments, create_meridional_seeder_subcommand},
    random::{create_random_seeder_from_arguments, create_random_seeder_subcommand},
};
use crate::{exit_with_error, geometry::Point3, seeding::Seeder3, tracing::ftr};
use clap::{ArgMatches, Command};

/// Adds one subcommand for each available seeder to the given command.
pub fn add_seeder_subcommands(command: Command<'static>) -> Command<'static> {
    command
        .subcommand_required(true)
        .subcommand(create_manual_seeder_subcommand())
        .subcommand(create_meridional_seeder_subcommand())
        .subcommand(create_random_seeder_subcommand())
}

/// Creates the seed points specified by the seeder subcommand present in the arguments.
pub fn create_seed_points_from_arguments(arguments: &ArgMatches) -> Vec<Point3<ftr>> {
    match arguments.subcommand() {
        Some(("manual_seeder", seeder_arguments)) => {
            collect_seed_points(create_manual_seeder_from_arguments(seeder_arguments))
        }
        Some(("meridional_seeder", seeder_arguments)) => {
            collect_seed_points(create_meridional_seeder_from_arguments(seeder_arguments))
        }
        Some(("random_seeder", seeder_arguments)) => {
            collect_seed_points(create_random_seeder_from_arguments(seeder_arguments))
        }
        _ => exit_with_error!("Error: No seeder specified"),
    }
}

fn collect_seed_points<Sd: Seeder3>(seeder: Sd) -> Vec<Point3<ftr>> {
    seeder.into_iter().collect()
}
