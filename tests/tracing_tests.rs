use approx::assert_abs_diff_eq;
use helioline::{
    field::{dipole::DipoleField, gridded::GriddedField, FieldQuery3, FieldSampler3, SamplerError},
    geometry::{Dim3, In3D, Point3, Vec3},
    io::Verbosity,
    seeding::{meridional::MeridionalSeeder3, random::RandomShellSeeder3, Seeder3},
    tracing::{
        field_line::{
            set::{trace_field_lines, BatchTracerConfig, FieldLineSet3, Parallelism},
            FieldLineResult, FieldLineTracer3, FieldLineTracerConfig, Polarity,
            TraceError,
        },
        ftr,
        stepping::{
            rkf::{rkf23::RKF23StepperFactory3, rkf45::RKF45StepperFactory3, RKFStepperConfig},
            StepperFactory3, StoppingCause,
        },
    },
};
use std::f64::consts::PI;

const RSS: ftr = 2.5;

fn pfss_dipole() -> DipoleField {
    DipoleField::with_source_surface(RSS)
}

fn polarities(results: &[FieldLineResult]) -> Vec<Option<Polarity>> {
    results
        .iter()
        .map(|result| result.as_ref().ok().map(|field_line| field_line.polarity()))
        .collect()
}

fn trace_set<S: FieldSampler3>(
    field: &S,
    seeds: Vec<Point3<ftr>>,
    parallelism: Parallelism,
) -> FieldLineSet3 {
    FieldLineSet3::trace(
        seeds,
        &FieldLineTracer3::new(FieldLineTracerConfig::default()),
        field,
        &RKF45StepperFactory3::new(RKFStepperConfig::default()),
        &BatchTracerConfig { parallelism },
        &Verbosity::Quiet,
    )
    .unwrap()
}

#[test]
fn polar_seed_gives_open_positive_line_ending_on_source_surface() {
    let seed = Point3::from_spherical(1.01, 0.01, PI / 2.0);
    let results = trace_field_lines(&pfss_dipole(), &[seed.clone()], RSS, 1e-6, 1e-6);
    let field_line = results[0].as_ref().unwrap();

    assert_eq!(field_line.polarity(), Polarity::OpenPositive);
    let ends = [field_line.path().backward_end(), field_line.path().forward_end()];
    let outer_end = ends
        .iter()
        .max_by(|a, b| a.radius().partial_cmp(&b.radius()).unwrap())
        .unwrap();
    assert_abs_diff_eq!(outer_end.radius(), RSS, epsilon = 1e-9);
    assert_eq!(field_line.path().seed(), &seed);
}

#[test]
fn hemispheres_and_equator_are_classified() {
    let seeds = vec![
        Point3::from_spherical(1.01, 0.3, 0.0),
        Point3::from_spherical(1.01, PI / 2.0, 1.0),
        Point3::from_spherical(1.01, PI - 0.3, 2.0),
        Point3::from_spherical(1.5, PI / 2.0, 3.0),
    ];
    let results = trace_field_lines(&pfss_dipole(), &seeds, RSS, 1e-6, 1e-6);
    assert_eq!(
        polarities(&results),
        vec![
            Some(Polarity::OpenPositive),
            Some(Polarity::Closed),
            Some(Polarity::OpenNegative),
            Some(Polarity::Closed),
        ]
    );
}

#[test]
fn closed_lines_have_both_ends_on_inner_boundary() {
    let results = trace_field_lines(
        &pfss_dipole(),
        &[Point3::from_spherical(1.3, 1.2, 0.5)],
        RSS,
        1e-8,
        1e-8,
    );
    let path = results[0].as_ref().unwrap().path();
    assert_abs_diff_eq!(path.backward_end().radius(), 1.0, epsilon = 1e-9);
    assert_abs_diff_eq!(path.forward_end().radius(), 1.0, epsilon = 1e-9);
    // Axisymmetric field lines stay in their meridional plane
    let phi = path.seed().to_spherical().phi;
    for position in path.positions() {
        assert_abs_diff_eq!(position.to_spherical().phi, phi, epsilon = 1e-6);
    }
}

#[test]
fn parallel_and_sequential_tracing_give_same_results_in_seed_order() {
    let seeds: Vec<_> = RandomShellSeeder3::new(1.01, 2.4, 64, 3).into_iter().collect();
    let field = pfss_dipole();
    let sequential = trace_set(&field, seeds.clone(), Parallelism::Sequential);
    let parallel = trace_set(&field, seeds.clone(), Parallelism::Parallel { n_threads: Some(4) });

    assert_eq!(sequential.seeds(), &seeds[..]);
    assert_eq!(parallel.seeds(), &seeds[..]);
    assert_eq!(sequential.results(), parallel.results());
    for (seed, result) in seeds.iter().zip(parallel.results()) {
        if let Ok(field_line) = result {
            assert_eq!(field_line.path().seed(), seed);
        }
    }
}

#[test]
fn tracing_is_deterministic() {
    let seeds: Vec<_> = MeridionalSeeder3::new(1.2, 0.7, 0.1, PI - 0.1, 12)
        .into_iter()
        .collect();
    let first = trace_field_lines(&pfss_dipole(), &seeds, RSS, 1e-6, 1e-6);
    let second = trace_field_lines(&pfss_dipole(), &seeds, RSS, 1e-6, 1e-6);
    assert_eq!(first, second);
}

/// The pfss dipole with every field vector pointing the opposite way.
struct ReversedDipole(DipoleField);

impl FieldSampler3 for ReversedDipole {
    fn sample(&self, position: &Point3<ftr>) -> Result<FieldQuery3, SamplerError> {
        Ok(match self.0.sample(position)? {
            FieldQuery3::Inside(field_vector) => FieldQuery3::Inside(field_vector * (-1.0)),
            FieldQuery3::Outside => FieldQuery3::Outside,
        })
    }
}

#[test]
fn reversed_field_gives_reversed_line() {
    let seeds = vec![
        Point3::from_spherical(1.1, 0.3, 0.4),
        Point3::from_spherical(1.4, 1.3, 2.0),
        Point3::from_spherical(1.05, PI - 0.5, 5.0),
    ];
    let original = trace_field_lines(&pfss_dipole(), &seeds, RSS, 1e-6, 1e-6);
    let reversed = trace_field_lines(&ReversedDipole(pfss_dipole()), &seeds, RSS, 1e-6, 1e-6);

    for (original, reversed) in original.iter().zip(&reversed) {
        let original = original.as_ref().unwrap();
        let reversed = reversed.as_ref().unwrap();
        assert_eq!(reversed.polarity().sign(), -original.polarity().sign());
        assert_eq!(original.positions().len(), reversed.positions().len());
        for (a, b) in original.positions().iter().zip(reversed.positions().iter().rev()) {
            assert_abs_diff_eq!((&a.to_vec3() - &b.to_vec3()).length(), 0.0, epsilon = 1e-12);
        }
    }
}

#[test]
fn reseeding_on_a_traced_line_reproduces_its_ends() {
    let field = pfss_dipole();
    let first = trace_field_lines(
        &field,
        &[Point3::from_spherical(1.05, 1.1, 0.0)],
        RSS,
        1e-9,
        1e-9,
    );
    let first_path = first[0].as_ref().unwrap().path();
    let midpoint = first_path.positions()[first_path.number_of_points() / 2].clone();

    let second = trace_field_lines(&field, &[midpoint], RSS, 1e-9, 1e-9);
    let second_line = second[0].as_ref().unwrap();
    assert_eq!(second_line.polarity(), Polarity::Closed);
    let second_path = second_line.path();

    for (first_end, second_end) in [
        (first_path.backward_end(), second_path.backward_end()),
        (first_path.forward_end(), second_path.forward_end()),
    ] {
        for dim in helioline::geometry::Dim3::slice() {
            assert_abs_diff_eq!(first_end[dim], second_end[dim], epsilon = 1e-5);
        }
    }
}

#[test]
fn seeds_outside_or_on_the_boundaries_are_rejected() {
    let seeds = [
        Point3::new(0.5, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.0, 0.0, RSS),
        Point3::new(0.0, 3.0, 0.0),
    ];
    let results = trace_field_lines(&pfss_dipole(), &seeds, RSS, 1e-6, 1e-6);
    for result in &results {
        assert!(matches!(result, Err(TraceError::SeedOutOfDomain { .. })));
    }
}

#[test]
fn all_positions_stay_inside_the_shell() {
    let seeds: Vec<_> = RandomShellSeeder3::new(1.01, 2.49, 40, 11).into_iter().collect();
    let results = trace_field_lines(&pfss_dipole(), &seeds, RSS, 1e-6, 1e-6);
    for field_line in results.iter().flatten() {
        for position in field_line.positions() {
            let radius = position.radius();
            assert!(
                (1.0 - 1e-9..=RSS + 1e-9).contains(&radius),
                "Position at radius {} outside shell",
                radius
            );
        }
    }
}

#[test]
fn open_lines_in_vacuum_dipole_are_cut_at_the_source_surface() {
    let results = trace_field_lines(
        &DipoleField::vacuum(),
        &[
            Point3::from_spherical(1.1, 0.2, 0.0),
            Point3::from_spherical(1.1, PI - 0.2, 0.0),
        ],
        RSS,
        1e-6,
        1e-6,
    );
    assert_eq!(
        polarities(&results),
        vec![Some(Polarity::OpenPositive), Some(Polarity::OpenNegative)]
    );
}

#[test]
fn gridded_dipole_is_traced_like_analytic_dipole() {
    let dipole = pfss_dipole();
    let gridded = GriddedField::from_spherical_fn(RSS, In3D::new(8, 121, 81), |r, theta, _| {
        let (br, btheta) = dipole.spherical_components(r, theta);
        (br, btheta, 0.0)
    });
    let seeds: Vec<_> = MeridionalSeeder3::new(1.05, 0.4, 0.2, PI - 0.2, 7)
        .into_iter()
        .collect();
    let analytic_results = trace_field_lines(&dipole, &seeds, RSS, 1e-6, 1e-6);
    let gridded_results = trace_field_lines(&gridded, &seeds, RSS, 1e-6, 1e-6);
    assert_eq!(polarities(&analytic_results), polarities(&gridded_results));
    for result in &gridded_results {
        assert!(result.is_ok());
    }
}

#[test]
fn rkf23_and_rkf45_agree_on_classification() {
    let seeds: Vec<_> = MeridionalSeeder3::new(1.1, 0.0, 0.1, PI - 0.1, 7)
        .into_iter()
        .collect();
    let field = pfss_dipole();
    let tracer = FieldLineTracer3::new(FieldLineTracerConfig::default());
    let config = BatchTracerConfig::default();
    let rkf23 = FieldLineSet3::trace(
        seeds.clone(),
        &tracer,
        &field,
        &RKF23StepperFactory3::new(RKFStepperConfig::default()),
        &config,
        &Verbosity::Quiet,
    )
    .unwrap();
    let rkf45 = FieldLineSet3::trace(
        seeds,
        &tracer,
        &field,
        &RKF45StepperFactory3::new(RKFStepperConfig::default()),
        &config,
        &Verbosity::Quiet,
    )
    .unwrap();
    assert_eq!(polarities(rkf23.results()), polarities(rkf45.results()));
}

#[test]
fn step_limit_makes_tracing_non_convergent() {
    let tracer = FieldLineTracer3::new(FieldLineTracerConfig {
        max_steps: 2,
        ..FieldLineTracerConfig::default()
    });
    let result = tracer.trace(
        &pfss_dipole(),
        RKF45StepperFactory3::new(RKFStepperConfig::default()).produce(),
        &Point3::from_spherical(1.5, 0.5, 0.0),
    );
    match result {
        Err(TraceError::NonConvergent { path, .. }) => {
            assert!(path.number_of_points() > 1);
        }
        other => panic!("Unexpected result {:?}", other),
    }
}

/// The pfss dipole, which cannot be evaluated in the southern hemisphere.
struct NorthernDipole(DipoleField);

impl FieldSampler3 for NorthernDipole {
    fn sample(&self, position: &Point3<ftr>) -> Result<FieldQuery3, SamplerError> {
        if position[Dim3::Z] < 0.0 {
            Err(SamplerError::new(position, "no data in southern hemisphere"))
        } else {
            self.0.sample(position)
        }
    }
}

#[test]
fn sampler_failure_only_affects_its_own_seed() {
    let seeds = vec![
        Point3::from_spherical(1.1, 0.3, 0.0),
        Point3::from_spherical(1.1, PI - 0.3, 0.0),
        Point3::from_spherical(1.2, 0.2, 1.0),
    ];
    let field_lines = trace_set(
        &NorthernDipole(pfss_dipole()),
        seeds,
        Parallelism::Parallel { n_threads: Some(2) },
    );
    let results = field_lines.results();

    assert_eq!(
        polarities(results),
        vec![Some(Polarity::OpenPositive), None, Some(Polarity::OpenPositive)]
    );
    match &results[1] {
        Err(err @ TraceError::SamplerFailure(_)) => {
            assert!(err.to_string().contains("no data in southern hemisphere"));
            assert!(err.path().is_none());
        }
        other => panic!("Unexpected result {:?}", other),
    }
    assert_eq!(field_lines.summary().n_sampler_failures, 1);
}

/// Field circling the z-axis, whose field lines never reach a boundary.
struct ToroidalField;

impl FieldSampler3 for ToroidalField {
    fn sample(&self, position: &Point3<ftr>) -> Result<FieldQuery3, SamplerError> {
        let coords = position.to_spherical();
        Ok(FieldQuery3::Inside(Vec3::from_spherical_components(
            0.0,
            0.0,
            1.0,
            coords.theta,
            coords.phi,
        )))
    }
}

#[test]
fn closed_loop_inside_shell_exhausts_time_span() {
    let tracer = FieldLineTracer3::new(FieldLineTracerConfig {
        max_integration_time: 100.0,
        ..FieldLineTracerConfig::default()
    });
    let seed = Point3::new(1.5, 0.0, 0.3);
    let result = tracer.trace(
        &ToroidalField,
        RKF45StepperFactory3::new(RKFStepperConfig::default()).produce(),
        &seed,
    );
    match result {
        Err(TraceError::NonConvergent {
            path,
            backward,
            forward,
        }) => {
            assert_eq!(backward, StoppingCause::TimeSpanExhausted);
            assert_eq!(forward, StoppingCause::TimeSpanExhausted);
            assert_eq!(path.seed(), &seed);
            assert!(path.number_of_points() > 2);
            for position in path.positions() {
                assert_abs_diff_eq!(position.radius(), seed.radius(), epsilon = 1e-2);
            }
        }
        other => panic!("Unexpected result {:?}", other),
    }
}

#[test]
fn raw_field_is_classified_like_normalized_field() {
    let seeds = vec![
        Point3::from_spherical(1.01, 0.3, 0.0),
        Point3::from_spherical(1.01, PI / 2.0, 1.0),
        Point3::from_spherical(1.01, PI - 0.3, 2.0),
        Point3::from_spherical(1.5, PI / 2.0, 3.0),
    ];
    let tracer = FieldLineTracer3::new(FieldLineTracerConfig {
        normalize_field: false,
        ..FieldLineTracerConfig::default()
    });
    let field_lines = FieldLineSet3::trace(
        seeds,
        &tracer,
        &pfss_dipole(),
        &RKF45StepperFactory3::new(RKFStepperConfig::default()),
        &BatchTracerConfig::default(),
        &Verbosity::Quiet,
    )
    .unwrap();
    assert_eq!(
        polarities(field_lines.results()),
        vec![
            Some(Polarity::OpenPositive),
            Some(Polarity::Closed),
            Some(Polarity::OpenNegative),
            Some(Polarity::Closed),
        ]
    );
}

#[test]
fn summary_counts_every_outcome() {
    let mut seeds: Vec<_> = MeridionalSeeder3::new(1.01, 0.0, 0.3, PI - 0.3, 3)
        .into_iter()
        .collect();
    seeds.push(Point3::new(0.0, 0.0, 0.5));
    seeds.push(Point3::new(3.0, 0.0, 0.0));
    let mut seeder = seeds.clone();
    assert_eq!(seeder.number_of_points(), 5);
    seeder.retain_points(|_| true);

    let field_lines = trace_set(&pfss_dipole(), seeder, Parallelism::Parallel { n_threads: None });
    let summary = field_lines.summary();
    assert_eq!(summary.n_open_positive, 1);
    assert_eq!(summary.n_closed, 1);
    assert_eq!(summary.n_open_negative, 1);
    assert_eq!(summary.n_seeds_out_of_domain, 2);
    assert_eq!(summary.n_non_convergent + summary.n_ambiguous, 0);

    let mut csv = Vec::new();
    field_lines.write_as_csv(&mut csv).unwrap();
    let csv = String::from_utf8(csv).unwrap();
    let line_indices: std::collections::BTreeSet<_> = csv
        .lines()
        .skip(1)
        .map(|line| line.split(',').next().unwrap().to_string())
        .collect();
    assert_eq!(
        line_indices.into_iter().collect::<Vec<_>>(),
        vec!["0", "1", "2"]
    );
}
