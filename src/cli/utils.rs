//! Utilities for creating the command line interface.

use crate::{
    exit_on_error, exit_on_false, exit_with_error,
    geometry::{Dim3, In3D},
    io::{OverwriteMode, Verbosity},
    num::BFloat,
};
use clap::ArgMatches;
use indicatif::ProgressStyle;
use lazy_static::lazy_static;
use std::str::FromStr;

lazy_static! {
    static ref DEFAULT_PROGRESS_STYLE: ProgressStyle =
        ProgressStyle::default_bar().template("Progress: {bar:40}  {percent}% | ETA: {eta}");
}

pub fn parse_value_string<T>(argument_name: &str, value_string: &str) -> T
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    exit_on_error!(
        value_string.parse(),
        "Error: Could not parse value for {0}: {1}",
        argument_name
    )
}

fn verify_finite_float_value<F: BFloat>(argument_name: &str, value: F) {
    exit_on_false!(value.is_finite(), "Error: {} must be finite", argument_name);
}

pub fn get_value_from_required_parseable_argument<T>(
    arguments: &ArgMatches,
    argument_name: &str,
) -> T
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    let value_string = exit_on_none_for_required(arguments, argument_name);
    parse_value_string(argument_name, value_string)
}

pub fn get_finite_float_value_from_required_parseable_argument<F>(
    arguments: &ArgMatches,
    argument_name: &str,
) -> F
where
    F: BFloat + FromStr,
    <F as FromStr>::Err: std::fmt::Display,
{
    let value: F = get_value_from_required_parseable_argument(arguments, argument_name);
    verify_finite_float_value(argument_name, value);
    value
}

/// Parses a finite float which must also be larger than zero.
pub fn get_positive_float_value_from_required_parseable_argument<F>(
    arguments: &ArgMatches,
    argument_name: &str,
) -> F
where
    F: BFloat + FromStr + std::fmt::Display,
    <F as FromStr>::Err: std::fmt::Display,
{
    let value: F = get_finite_float_value_from_required_parseable_argument(arguments, argument_name);
    exit_on_false!(
        value > F::zero(),
        "Error: {} must be larger than zero, got {}",
        argument_name,
        value
    );
    value
}

pub fn get_value_from_required_constrained_argument<T>(
    arguments: &ArgMatches,
    argument_name: &str,
    possible_value_strings: &[&str],
    possible_values: &[T],
) -> T
where
    T: Copy,
{
    let value_string = exit_on_none_for_required(arguments, argument_name);
    possible_value_strings
        .iter()
        .zip(possible_values)
        .find_map(|(possible_value_string, possible_value)| {
            if *possible_value_string == value_string {
                Some(*possible_value)
            } else {
                None
            }
        })
        .unwrap_or_else(|| {
            exit_with_error!(
                "Error: Invalid value for {}: {}",
                argument_name,
                value_string
            )
        })
}

/// Parses exactly three comma-separated values, each at least `min_value` if given.
pub fn parse_3d_values<T>(
    arguments: &ArgMatches,
    argument_name: &str,
    min_value: Option<T>,
) -> In3D<T>
where
    T: FromStr + PartialOrd + std::fmt::Display,
    <T as FromStr>::Err: std::fmt::Display,
{
    let value_strings: Vec<_> = match arguments.values_of(argument_name) {
        Some(values) => values.collect(),
        None => exit_with_error!("Error: No values for {}", argument_name),
    };

    let count = value_strings.len();
    exit_on_false!(
        count == 3,
        "Error: {} must have 3 values, got {}",
        argument_name,
        count
    );

    let values = In3D::with_each_component(|dim| {
        parse_value_string(argument_name, value_strings[dim.num()])
    });

    if let Some(min_value) = min_value {
        exit_on_false!(
            Dim3::slice().iter().all(|&dim| values[dim] >= min_value),
            "Error: All values in {} must be at least {}",
            argument_name,
            min_value
        );
    }

    values
}

pub fn overwrite_mode_from_arguments(arguments: &ArgMatches) -> OverwriteMode {
    if arguments.is_present("overwrite") {
        OverwriteMode::Always
    } else if arguments.is_present("no-overwrite") {
        OverwriteMode::Never
    } else {
        OverwriteMode::Ask
    }
}

pub fn parse_verbosity(arguments: &ArgMatches, support_progress: bool) -> Verbosity {
    if support_progress && arguments.is_present("progress") {
        Verbosity::Progress(DEFAULT_PROGRESS_STYLE.clone())
    } else if arguments.is_present("verbose") {
        Verbosity::Messages
    } else {
        Verbosity::Quiet
    }
}

fn exit_on_none_for_required<'a>(arguments: &'a ArgMatches, argument_name: &str) -> &'a str {
    match arguments.value_of(argument_name) {
        Some(value_string) => value_string,
        None => exit_with_error!("Error: No value for {}", argument_name),
    }
}
