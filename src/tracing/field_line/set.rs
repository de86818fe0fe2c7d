//! Tracing of field lines from many independent seeds.

use super::{FieldLineResult, FieldLineTracer3, FieldLineTracerConfig, Polarity, TraceError};
use crate::{
    field::FieldSampler3,
    geometry::{Dim3, Point3},
    io::{utils::AtomicOutputFile, Verbosity},
    seeding::Seeder3,
    tracing::{
        ftr,
        stepping::{
            rkf::{rkf45::RKF45StepperFactory3, RKFStepperConfig},
            StepperFactory3,
        },
    },
};
use indicatif::{ParallelProgressIterator, ProgressIterator};
use rayon::prelude::*;
use std::{
    fmt,
    io::{self, BufWriter, Write},
    path::Path,
};
use thiserror::Error;
use Dim3::{X, Y, Z};

#[cfg(feature = "serialization")]
use serde::Serialize;

/// How the seeds of a batch are distributed over threads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Parallelism {
    /// Trace the seeds one after another on the calling thread.
    Sequential,
    /// Trace the seeds on a pool of worker threads. Without a thread count,
    /// the global pool sized to the available cores is used.
    Parallel { n_threads: Option<usize> },
}

/// Configuration parameters for batch tracing.
#[derive(Clone, Debug)]
pub struct BatchTracerConfig {
    pub parallelism: Parallelism,
}

/// Failure to set up a batch trace. Failures of individual seeds are part of
/// the result set instead.
#[derive(Debug, Error)]
pub enum BatchTracingError {
    #[error("Could not create thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Counts of the outcomes in a field line set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FieldLineSetSummary {
    pub n_open_positive: usize,
    pub n_open_negative: usize,
    pub n_closed: usize,
    pub n_seeds_out_of_domain: usize,
    pub n_non_convergent: usize,
    pub n_ambiguous: usize,
    pub n_sampler_failures: usize,
}

/// The results of tracing field lines from a set of seeds, in the order of the seeds.
#[derive(Clone, Debug)]
pub struct FieldLineSet3 {
    seeds: Vec<Point3<ftr>>,
    results: Vec<FieldLineResult>,
}

impl FieldLineSet3 {
    /// Traces a field line from every seed produced by the given seeder.
    ///
    /// # Parameters
    ///
    /// - `seeder`: Seeder to obtain start positions from.
    /// - `tracer`: Field line tracer to use for each seed.
    /// - `field`: Field to trace. It is shared between all threads.
    /// - `stepper_factory`: Factory structure to use for producing a stepper per seed.
    /// - `config`: Configuration for the batch.
    /// - `verbosity`: Whether to print status messages and progress.
    ///
    /// # Returns
    ///
    /// A `Result` which is either:
    ///
    /// - `Ok`: Contains a new `FieldLineSet3` with one result per seed, in seed order.
    /// - `Err`: Contains a `BatchTracingError` if the worker threads could not be set up.
    ///
    /// # Type parameters
    ///
    /// - `Sd`: Type of seeder.
    /// - `S`: Type of field sampler.
    /// - `StF`: Type of stepper factory.
    pub fn trace<Sd, S, StF>(
        seeder: Sd,
        tracer: &FieldLineTracer3,
        field: &S,
        stepper_factory: &StF,
        config: &BatchTracerConfig,
        verbosity: &Verbosity,
    ) -> Result<Self, BatchTracingError>
    where
        Sd: Seeder3,
        S: FieldSampler3 + ?Sized,
        StF: StepperFactory3,
    {
        config.validate();
        let seeds: Vec<_> = seeder.into_iter().collect();

        if verbosity.print_messages() {
            println!("Found {} start positions", seeds.len());
        }

        let results = match config.parallelism {
            Parallelism::Sequential => seeds
                .iter()
                .progress_with(verbosity.create_progress_bar(seeds.len()))
                .map(|seed| tracer.trace(field, stepper_factory.produce(), seed))
                .collect(),
            Parallelism::Parallel { n_threads: None } => {
                Self::trace_in_parallel(&seeds, tracer, field, stepper_factory, verbosity)
            }
            Parallelism::Parallel {
                n_threads: Some(n_threads),
            } => {
                let thread_pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(n_threads)
                    .build()?;
                thread_pool.install(|| {
                    Self::trace_in_parallel(&seeds, tracer, field, stepper_factory, verbosity)
                })
            }
        };

        let field_lines = Self { seeds, results };

        if verbosity.print_messages() {
            println!("{}", field_lines.summary());
        }

        Ok(field_lines)
    }

    fn trace_in_parallel<S, StF>(
        seeds: &[Point3<ftr>],
        tracer: &FieldLineTracer3,
        field: &S,
        stepper_factory: &StF,
        verbosity: &Verbosity,
    ) -> Vec<FieldLineResult>
    where
        S: FieldSampler3 + ?Sized,
        StF: StepperFactory3,
    {
        seeds
            .par_iter()
            .progress_with(verbosity.create_progress_bar(seeds.len()))
            .map(|seed| tracer.trace(field, stepper_factory.produce(), seed))
            .collect()
    }

    /// Returns the number of seeds in the set.
    pub fn number_of_seeds(&self) -> usize {
        self.seeds.len()
    }

    /// Returns the seeds in the order they were traced.
    pub fn seeds(&self) -> &[Point3<ftr>] {
        &self.seeds
    }

    /// Returns the result for each seed, in seed order.
    pub fn results(&self) -> &[FieldLineResult] {
        &self.results
    }

    /// Consumes the set and returns the result for each seed.
    pub fn into_results(self) -> Vec<FieldLineResult> {
        self.results
    }

    /// Counts the outcomes in the set.
    pub fn summary(&self) -> FieldLineSetSummary {
        let mut summary = FieldLineSetSummary::default();
        for result in &self.results {
            match result {
                Ok(field_line) => match field_line.polarity() {
                    Polarity::OpenPositive => summary.n_open_positive += 1,
                    Polarity::OpenNegative => summary.n_open_negative += 1,
                    Polarity::Closed => summary.n_closed += 1,
                },
                Err(TraceError::SeedOutOfDomain { .. }) => summary.n_seeds_out_of_domain += 1,
                Err(TraceError::NonConvergent { .. }) => summary.n_non_convergent += 1,
                Err(TraceError::AmbiguousPolarity { .. }) => summary.n_ambiguous += 1,
                Err(TraceError::SamplerFailure(_)) => summary.n_sampler_failures += 1,
            }
        }
        summary
    }

    /// Writes every classified field line as comma separated values, one row
    /// per position with the seed index and polarity of its line.
    pub fn write_as_csv<W: Write>(&self, writer: W) -> io::Result<()> {
        let mut writer = BufWriter::new(writer);
        writeln!(writer, "line_index,polarity,x,y,z")?;
        for (line_index, result) in self.results.iter().enumerate() {
            if let Ok(field_line) = result {
                let polarity = field_line.polarity().sign();
                for position in field_line.positions() {
                    writeln!(
                        writer,
                        "{},{},{},{},{}",
                        line_index, polarity, position[X], position[Y], position[Z]
                    )?;
                }
            }
        }
        writer.flush()
    }

    /// Saves the classified field lines as comma separated values at the given path.
    pub fn save_as_csv<P: AsRef<Path>>(&self, file_path: P) -> io::Result<()> {
        let mut output_file = AtomicOutputFile::new(file_path)?;
        self.write_as_csv(output_file.file_mut())?;
        output_file.persist()
    }

    /// Serializes the outcome for every seed into JSON format and saves it at the given path.
    #[cfg(feature = "json")]
    pub fn save_as_json<P: AsRef<Path>>(&self, file_path: P) -> io::Result<()> {
        crate::io::utils::save_data_as_json(file_path, &self.records())
    }

    #[cfg(feature = "serialization")]
    fn records(&self) -> Vec<FieldLineRecord<'_>> {
        self.seeds
            .iter()
            .zip(self.results.iter())
            .enumerate()
            .map(|(seed_index, (seed, result))| FieldLineRecord::new(seed_index, seed, result))
            .collect()
    }
}

/// Traces field lines from the given seeds in parallel, using the RKF45 stepper
/// with the given tolerances and defaults for everything else.
///
/// The results are in the same order as the seeds.
pub fn trace_field_lines<S>(
    field: &S,
    seeds: &[Point3<ftr>],
    source_surface_radius: ftr,
    relative_tolerance: ftr,
    absolute_tolerance: ftr,
) -> Vec<FieldLineResult>
where
    S: FieldSampler3 + ?Sized,
{
    let tracer = FieldLineTracer3::new(FieldLineTracerConfig {
        source_surface_radius,
        ..FieldLineTracerConfig::default()
    });
    let stepper_factory = RKF45StepperFactory3::new(RKFStepperConfig {
        relative_tolerance,
        absolute_tolerance,
        ..RKFStepperConfig::default()
    });
    FieldLineSet3::trace_in_parallel(
        seeds,
        &tracer,
        field,
        &stepper_factory,
        &Verbosity::Quiet,
    )
}

/// Serializable outcome of tracing from one seed.
#[cfg(feature = "serialization")]
#[derive(Serialize)]
struct FieldLineRecord<'a> {
    seed_index: usize,
    seed: &'a Point3<ftr>,
    outcome: &'static str,
    polarity: Option<i8>,
    message: Option<String>,
    positions: Option<&'a [Point3<ftr>]>,
}

#[cfg(feature = "serialization")]
impl<'a> FieldLineRecord<'a> {
    fn new(seed_index: usize, seed: &'a Point3<ftr>, result: &'a FieldLineResult) -> Self {
        let (outcome, polarity, message, positions) = match result {
            Ok(field_line) => (
                "traced",
                Some(field_line.polarity().sign()),
                None,
                Some(field_line.positions()),
            ),
            Err(err) => (
                match err {
                    TraceError::SeedOutOfDomain { .. } => "seed_out_of_domain",
                    TraceError::NonConvergent { .. } => "non_convergent",
                    TraceError::AmbiguousPolarity { .. } => "ambiguous_polarity",
                    TraceError::SamplerFailure(_) => "sampler_failure",
                },
                None,
                Some(err.to_string()),
                err.path().map(|path| path.positions()),
            ),
        };
        Self {
            seed_index,
            seed,
            outcome,
            polarity,
            message,
            positions,
        }
    }
}

impl BatchTracerConfig {
    pub const DEFAULT_PARALLELISM: Parallelism = Parallelism::Parallel { n_threads: None };

    fn validate(&self) {
        if let Parallelism::Parallel {
            n_threads: Some(n_threads),
        } = self.parallelism
        {
            assert!(n_threads > 0, "Number of threads must be larger than zero.");
        }
    }
}

impl Default for BatchTracerConfig {
    fn default() -> Self {
        BatchTracerConfig {
            parallelism: Self::DEFAULT_PARALLELISM,
        }
    }
}

impl fmt::Display for FieldLineSetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Traced {} open positive, {} open negative and {} closed field lines",
            self.n_open_positive, self.n_open_negative, self.n_closed
        )?;
        let n_failed = self.n_seeds_out_of_domain
            + self.n_non_convergent
            + self.n_ambiguous
            + self.n_sampler_failures;
        if n_failed > 0 {
            write!(
                f,
                "\nFailed for {} seeds ({} out of domain, {} non-convergent, {} ambiguous, {} sampler failures)",
                n_failed,
                self.n_seeds_out_of_domain,
                self.n_non_convergent,
                self.n_ambiguous,
                self.n_sampler_failures
            )?;
        }
        Ok(())
    }
}
