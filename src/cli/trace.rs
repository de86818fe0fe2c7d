//! Command line interface for tracing field lines.

use super::{seeding, utils as cli_utils};
use crate::{
    exit_on_error, exit_on_false,
    field::{dipole::DipoleField, gridded::GriddedField, DynFieldSampler3},
    geometry::{Dim3, Point3},
    io::{utils as io_utils, Verbosity},
    tracing::{
        field_line::{
            set::{BatchTracerConfig, FieldLineSet3, Parallelism},
            FieldLineTracer3, FieldLineTracerConfig,
        },
        ftr,
        stepping::{
            rkf::{
                rkf23::RKF23StepperFactory3, rkf45::RKF45StepperFactory3, RKFStepperConfig,
                RKFStepperType,
            },
            StepperFactory3,
        },
        FieldLinePointSpacing,
    },
};
use clap::{Arg, ArgMatches, Command, ValueHint};
use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FieldType {
    VacuumDipole,
    PFSSDipole,
    GriddedPFSSDipole,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OutputType {
    Csv,
    #[cfg(feature = "json")]
    Json,
}

impl OutputType {
    fn from_path(file_path: &Path) -> Self {
        match file_path.extension().and_then(|extension| extension.to_str()) {
            #[cfg(feature = "json")]
            Some("json") => Self::Json,
            _ => Self::Csv,
        }
    }
}

/// Creates a subcommand for tracing field lines.
pub fn create_trace_subcommand() -> Command<'static> {
    let command = Command::new("trace")
        .about("Trace field lines through a source surface model")
        .long_about(
            "Trace field lines through a source surface model.\n\
             Each field line is traced in both directions from its seed point until it\n\
             reaches the inner boundary (r = 1) or the source surface, and is classified\n\
             as open with positive or negative polarity, or closed.",
        )
        .arg(
            Arg::new("output-file")
                .value_name("OUTPUT_FILE")
                .help(
                    "Path of the file where the field lines should be stored.\n\
                     Writes in the following format based on the file extension:\
                     \n    *.json: Writes every seed with its outcome and positions as JSON\
                     (requires the json feature)\
                     \n    *: Writes the classified field lines as rows of line_index,polarity,x,y,z",
                )
                .required(true)
                .takes_value(true)
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("overwrite")
                .long("overwrite")
                .help("Automatically overwrite any existing file")
                .conflicts_with("no-overwrite"),
        )
        .arg(
            Arg::new("no-overwrite")
                .long("no-overwrite")
                .help("Do not overwrite any existing file")
                .conflicts_with("overwrite"),
        )
        .arg(
            Arg::new("source-surface-radius")
                .long("rss")
                .require_equals(true)
                .value_name("VALUE")
                .help("Radius of the source surface, in units of the inner boundary radius")
                .takes_value(true)
                .default_value("2.5"),
        )
        .arg(
            Arg::new("relative-tolerance")
                .long("rtol")
                .require_equals(true)
                .value_name("VALUE")
                .help("Relative error tolerance for stepping")
                .takes_value(true)
                .default_value("1e-6"),
        )
        .arg(
            Arg::new("absolute-tolerance")
                .long("atol")
                .require_equals(true)
                .value_name("VALUE")
                .help("Absolute error tolerance for stepping")
                .takes_value(true)
                .default_value("1e-6"),
        )
        .arg(
            Arg::new("boundary-tolerance")
                .long("boundary-tolerance")
                .require_equals(true)
                .value_name("VALUE")
                .help("Distance from a boundary within which a field line end counts as on it")
                .takes_value(true)
                .default_value("1e-4"),
        )
        .arg(
            Arg::new("max-steps")
                .long("max-steps")
                .require_equals(true)
                .value_name("NUMBER")
                .help("Number of steps after which tracing in one direction is given up")
                .takes_value(true)
                .default_value("100000"),
        )
        .arg(
            Arg::new("field")
                .long("field")
                .require_equals(true)
                .value_name("NAME")
                .help("Field to trace")
                .takes_value(true)
                .possible_values(&["dipole", "pfss-dipole", "gridded-pfss-dipole"])
                .default_value("pfss-dipole"),
        )
        .arg(
            Arg::new("raw-field")
                .long("raw-field")
                .help("Integrate the sampled field as is instead of its unit tangent"),
        )
        .arg(
            Arg::new("grid-shape")
                .long("grid-shape")
                .require_equals(true)
                .use_value_delimiter(true)
                .require_value_delimiter(true)
                .value_name("NPHI,NS,NRHO")
                .help("Number of grid nodes in longitude, cosine of colatitude and log radius")
                .takes_value(true)
                .multiple_values(true)
                .default_values(&["36", "61", "41"]),
        )
        .arg(
            Arg::new("stepper")
                .long("stepper")
                .require_equals(true)
                .value_name("NAME")
                .help("Which stepping scheme to use for tracing")
                .takes_value(true)
                .possible_values(&["rkf23", "rkf45"])
                .default_value("rkf45"),
        )
        .arg(
            Arg::new("point-spacing")
                .long("point-spacing")
                .require_equals(true)
                .value_name("SPACING")
                .help("Spacing convention for the positions along each field line")
                .takes_value(true)
                .possible_values(&["natural", "regular"])
                .default_value("natural"),
        )
        .arg(
            Arg::new("dense-step-length")
                .long("dense-step-length")
                .require_equals(true)
                .value_name("VALUE")
                .help("Arc length between positions when using regular point spacing")
                .takes_value(true)
                .default_value("1e-2"),
        )
        .arg(
            Arg::new("threads")
                .long("threads")
                .require_equals(true)
                .value_name("NUMBER")
                .help("Number of threads to use, or 1 to trace sequentially [default: all cores]")
                .takes_value(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Print status messages related to tracing"),
        )
        .arg(
            Arg::new("progress")
                .short('p')
                .long("progress")
                .help("Show progress bar for tracing (also implies `verbose`)"),
        );

    seeding::add_seeder_subcommands(command)
}

/// Runs the actions for the `trace` subcommand using the given arguments.
pub fn run_trace_subcommand(arguments: &ArgMatches) {
    let output_file_path = exit_on_error!(
        PathBuf::from_str(arguments.value_of("output-file").unwrap_or_default()),
        "Error: Could not interpret path to output file: {}"
    );
    let overwrite_mode = cli_utils::overwrite_mode_from_arguments(arguments);
    let write_allowed = exit_on_error!(
        io_utils::check_if_write_allowed(&output_file_path, overwrite_mode),
        "Error: Could not determine whether to write output file: {}"
    );
    if !write_allowed {
        return;
    }

    let verbosity = cli_utils::parse_verbosity(arguments, true);

    let tracer_config = tracer_config_from_arguments(arguments);
    let tracer = FieldLineTracer3::new(tracer_config);
    let field = create_field_from_arguments(arguments, tracer.domain().outer_radius(), &verbosity);
    let batch_config = batch_config_from_arguments(arguments);
    let stepper_config = stepper_config_from_arguments(arguments);

    let seeds = seeding::create_seed_points_from_arguments(arguments);

    let stepper_type = cli_utils::get_value_from_required_constrained_argument(
        arguments,
        "stepper",
        &["rkf23", "rkf45"],
        &[RKFStepperType::RKF23, RKFStepperType::RKF45],
    );
    let field_lines = match stepper_type {
        RKFStepperType::RKF23 => trace_with_factory(
            seeds,
            &tracer,
            &field,
            &RKF23StepperFactory3::new(stepper_config),
            &batch_config,
            &verbosity,
        ),
        RKFStepperType::RKF45 => trace_with_factory(
            seeds,
            &tracer,
            &field,
            &RKF45StepperFactory3::new(stepper_config),
            &batch_config,
            &verbosity,
        ),
    };

    if verbosity.print_messages() {
        println!("Writing field lines to {}", output_file_path.display());
    }
    match OutputType::from_path(&output_file_path) {
        OutputType::Csv => exit_on_error!(
            field_lines.save_as_csv(&output_file_path),
            "Error: Could not save output file: {}"
        ),
        #[cfg(feature = "json")]
        OutputType::Json => exit_on_error!(
            field_lines.save_as_json(&output_file_path),
            "Error: Could not save output file: {}"
        ),
    }
}

fn trace_with_factory<StF: StepperFactory3>(
    seeds: Vec<Point3<ftr>>,
    tracer: &FieldLineTracer3,
    field: &DynFieldSampler3,
    stepper_factory: &StF,
    batch_config: &BatchTracerConfig,
    verbosity: &Verbosity,
) -> FieldLineSet3 {
    exit_on_error!(
        FieldLineSet3::trace(
            seeds,
            tracer,
            field,
            stepper_factory,
            batch_config,
            verbosity
        ),
        "Error: Could not trace field lines: {}"
    )
}

fn tracer_config_from_arguments(arguments: &ArgMatches) -> FieldLineTracerConfig {
    let source_surface_radius: ftr =
        cli_utils::get_finite_float_value_from_required_parseable_argument(
            arguments,
            "source-surface-radius",
        );
    exit_on_false!(
        source_surface_radius > 1.0,
        "Error: Source surface radius must be larger than 1, got {}",
        source_surface_radius
    );
    let boundary_tolerance = cli_utils::get_positive_float_value_from_required_parseable_argument(
        arguments,
        "boundary-tolerance",
    );
    exit_on_false!(
        2.0 * boundary_tolerance < source_surface_radius - 1.0,
        "Error: Boundary tolerance must be smaller than half the shell thickness, got {} for a source surface radius of {}",
        boundary_tolerance,
        source_surface_radius
    );
    let max_steps: usize =
        cli_utils::get_value_from_required_parseable_argument(arguments, "max-steps");
    exit_on_false!(max_steps > 0, "Error: max-steps must be larger than zero");
    let point_spacing = cli_utils::get_value_from_required_constrained_argument(
        arguments,
        "point-spacing",
        &["natural", "regular"],
        &[
            FieldLinePointSpacing::Natural,
            FieldLinePointSpacing::Regular,
        ],
    );
    FieldLineTracerConfig {
        source_surface_radius,
        boundary_tolerance,
        max_steps,
        point_spacing,
        normalize_field: !arguments.is_present("raw-field"),
        ..FieldLineTracerConfig::default()
    }
}

fn stepper_config_from_arguments(arguments: &ArgMatches) -> RKFStepperConfig {
    RKFStepperConfig {
        relative_tolerance: cli_utils::get_positive_float_value_from_required_parseable_argument(
            arguments,
            "relative-tolerance",
        ),
        absolute_tolerance: cli_utils::get_positive_float_value_from_required_parseable_argument(
            arguments,
            "absolute-tolerance",
        ),
        dense_step_length: cli_utils::get_positive_float_value_from_required_parseable_argument(
            arguments,
            "dense-step-length",
        ),
        ..RKFStepperConfig::default()
    }
}

fn batch_config_from_arguments(arguments: &ArgMatches) -> BatchTracerConfig {
    let parallelism = match arguments.value_of("threads") {
        None => Parallelism::Parallel { n_threads: None },
        Some(value_string) => {
            let n_threads: usize = cli_utils::parse_value_string("threads", value_string);
            exit_on_false!(n_threads > 0, "Error: threads must be larger than zero");
            if n_threads == 1 {
                Parallelism::Sequential
            } else {
                Parallelism::Parallel {
                    n_threads: Some(n_threads),
                }
            }
        }
    };
    BatchTracerConfig { parallelism }
}

fn create_field_from_arguments(
    arguments: &ArgMatches,
    source_surface_radius: ftr,
    verbosity: &Verbosity,
) -> DynFieldSampler3 {
    let field_type = cli_utils::get_value_from_required_constrained_argument(
        arguments,
        "field",
        &["dipole", "pfss-dipole", "gridded-pfss-dipole"],
        &[
            FieldType::VacuumDipole,
            FieldType::PFSSDipole,
            FieldType::GriddedPFSSDipole,
        ],
    );
    match field_type {
        FieldType::VacuumDipole => Box::new(DipoleField::vacuum()),
        FieldType::PFSSDipole => Box::new(DipoleField::with_source_surface(source_surface_radius)),
        FieldType::GriddedPFSSDipole => {
            let shape = cli_utils::parse_3d_values(arguments, "grid-shape", Some(1));
            exit_on_false!(
                shape[Dim3::Y] >= 2 && shape[Dim3::Z] >= 2,
                "Error: grid-shape must have at least 2 nodes in s and rho"
            );
            if verbosity.print_messages() {
                println!(
                    "Gridding dipole field on {}x{}x{} nodes",
                    shape[Dim3::X],
                    shape[Dim3::Y],
                    shape[Dim3::Z]
                );
            }
            let dipole = DipoleField::with_source_surface(source_surface_radius);
            Box::new(GriddedField::from_spherical_fn(
                source_surface_radius,
                shape,
                |r, theta, _phi| {
                    let (br, btheta) = dipole.spherical_components(r, theta);
                    (br, btheta, 0.0)
                },
            ))
        }
    }
}
