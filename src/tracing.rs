//! Tracing field lines of a vector field through a spherical shell.

pub mod field_line;
pub mod stepping;

use self::stepping::{Stepper3, StepperResult, SteppingSense, StoppingCause};
use crate::{
    domain::SphericalShell,
    field::{FieldSampler3, SamplerError},
    geometry::Point3,
};

/// Floating-point precision to use for tracing.
#[allow(non_camel_case_types)]
pub type ftr = f64;

/// Whether to trace a field line with regular or natural spacing between points.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldLinePointSpacing {
    /// Positions at uniform intervals of integration time.
    Regular,
    /// The positions reached by the adaptive stepper.
    Natural,
}

/// Everything a stepper needs to know to integrate one half of a field line:
/// the domain it must stay inside, the sense relative to the field, the field
/// itself and how long it may integrate.
#[derive(Debug)]
pub struct HalfTraceContext<'a, S: ?Sized> {
    domain: SphericalShell,
    sense: SteppingSense,
    field: &'a S,
    max_integration_time: ftr,
}

impl<'a, S: FieldSampler3 + ?Sized> HalfTraceContext<'a, S> {
    /// Creates a new context for tracing through the given field.
    ///
    /// # Panics
    ///
    /// If the maximum integration time is not positive.
    pub fn new(
        domain: SphericalShell,
        sense: SteppingSense,
        field: &'a S,
        max_integration_time: ftr,
    ) -> Self {
        assert!(
            max_integration_time > 0.0,
            "Maximum integration time must be larger than zero."
        );
        Self {
            domain,
            sense,
            field,
            max_integration_time,
        }
    }

    /// Returns the shell the trace is confined to.
    pub fn domain(&self) -> &SphericalShell {
        &self.domain
    }

    /// Returns the sense of tracing relative to the field direction.
    pub fn sense(&self) -> SteppingSense {
        self.sense
    }

    /// Returns the field being traced.
    pub fn field(&self) -> &'a S {
        self.field
    }

    /// Returns the integration time after which tracing is given up.
    pub fn max_integration_time(&self) -> ftr {
        self.max_integration_time
    }

    /// Returns the same context with the tracing sense reversed.
    pub fn reversed(&self) -> Self {
        Self {
            domain: self.domain,
            sense: self.sense.reversed(),
            field: self.field,
            max_integration_time: self.max_integration_time,
        }
    }
}

/// The positions traced from a seed in one direction, and why tracing stopped.
#[derive(Clone, Debug, PartialEq)]
pub struct HalfTrace {
    /// Positions in tracing order. The first position is always the seed.
    pub positions: Vec<Point3<ftr>>,
    /// Integration time at the last position.
    pub integration_time: ftr,
    /// Why the integration terminated.
    pub stopping_cause: StoppingCause,
}

impl HalfTrace {
    /// Whether the trace terminated on one of the boundaries of the shell.
    pub fn reached_boundary(&self) -> bool {
        self.stopping_cause.reached_boundary()
    }
}

/// Integrates a field line from the given seed in the sense of the context
/// until it meets a boundary or integration has to be given up.
///
/// # Parameters
///
/// - `context`: Field, domain and direction to trace with.
/// - `stepper`: Stepper to use (will be consumed).
/// - `seed`: Position where the tracing should start.
/// - `point_spacing`: Whether to record natural or regularly spaced positions.
/// - `max_steps`: Number of steps after which tracing is given up.
///
/// # Returns
///
/// A `Result` which is either:
///
/// - `Ok`: Contains the `HalfTrace`. It is produced also when tracing did not
/// reach a boundary, with the stopping cause telling why.
/// - `Err`: Contains the `SamplerError` if the field could not be evaluated.
///
/// # Type parameters
///
/// - `S`: Type of field sampler.
/// - `St`: Type of stepper.
pub fn trace_half_field_line<S, St>(
    context: &HalfTraceContext<'_, S>,
    mut stepper: St,
    seed: &Point3<ftr>,
    point_spacing: FieldLinePointSpacing,
    max_steps: usize,
) -> Result<HalfTrace, SamplerError>
where
    S: FieldSampler3 + ?Sized,
    St: Stepper3,
{
    let mut positions = Vec::new();
    let mut integration_time = 0.0;
    let mut callback = |position: &Point3<ftr>, time: ftr| {
        positions.push(position.clone());
        integration_time = time;
    };

    let mut stopping_cause = match stepper.place(context, seed, &mut callback)? {
        StepperResult::Ok(_) => None,
        StepperResult::Stopped(cause) => Some(cause),
    };

    let mut n_steps = 0;
    while stopping_cause.is_none() {
        if n_steps >= max_steps {
            stopping_cause = Some(StoppingCause::StepLimitReached);
            break;
        }
        let step_result = match point_spacing {
            FieldLinePointSpacing::Natural => stepper.step(context, &mut callback)?,
            FieldLinePointSpacing::Regular => stepper.step_dense_output(context, &mut callback)?,
        };
        if let StepperResult::Stopped(cause) = step_result {
            stopping_cause = Some(cause);
        }
        n_steps += 1;
    }

    if positions.is_empty() {
        positions.push(seed.clone());
    }

    Ok(HalfTrace {
        positions,
        integration_time,
        stopping_cause: stopping_cause.unwrap_or(StoppingCause::StepLimitReached),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::Boundary,
        field::{dipole::DipoleField, UnitTangentField},
        tracing::stepping::{
            rkf::{rkf45::RKF45Stepper3, RKFStepperConfig},
            StoppingCause,
        },
    };
    use approx::assert_abs_diff_eq;

    fn dipole_context(
        field: &UnitTangentField<DipoleField>,
        sense: SteppingSense,
    ) -> HalfTraceContext<'_, UnitTangentField<DipoleField>> {
        HalfTraceContext::new(SphericalShell::new(2.5), sense, field, 1e4)
    }

    #[test]
    fn half_trace_starts_at_seed_and_ends_on_boundary() {
        let field = UnitTangentField::new(DipoleField::with_source_surface(2.5));
        let seed = Point3::from_spherical(1.2, 0.5, 0.3);
        let trace = trace_half_field_line(
            &dipole_context(&field, SteppingSense::Same),
            RKF45Stepper3::new(RKFStepperConfig::default()),
            &seed,
            FieldLinePointSpacing::Natural,
            10_000,
        )
        .unwrap();

        assert_eq!(trace.positions[0], seed);
        assert!(trace.reached_boundary());
        let end = trace.positions.last().unwrap();
        let boundary = match trace.stopping_cause {
            StoppingCause::ReachedBoundary(boundary) => boundary,
            cause => panic!("Unexpected stopping cause {}", cause),
        };
        assert_abs_diff_eq!(
            end.radius(),
            SphericalShell::new(2.5).boundary_radius(boundary),
            epsilon = 1e-12
        );
        assert!(trace.integration_time > 0.0);
    }

    #[test]
    fn reversed_context_traces_the_other_way() {
        let field = UnitTangentField::new(DipoleField::with_source_surface(2.5));
        // Northern field points outward, so the backward trace returns to the surface
        let seed = Point3::from_spherical(1.1, 0.4, 0.0);
        let context = dipole_context(&field, SteppingSense::Same);
        let backward = trace_half_field_line(
            &context.reversed(),
            RKF45Stepper3::new(RKFStepperConfig::default()),
            &seed,
            FieldLinePointSpacing::Natural,
            10_000,
        )
        .unwrap();
        assert_eq!(
            backward.stopping_cause,
            StoppingCause::ReachedBoundary(Boundary::Inner)
        );
    }

    #[test]
    fn step_limit_gives_up_tracing() {
        let field = UnitTangentField::new(DipoleField::with_source_surface(2.5));
        let seed = Point3::from_spherical(1.01, 0.01, 0.0);
        let trace = trace_half_field_line(
            &dipole_context(&field, SteppingSense::Same),
            RKF45Stepper3::new(RKFStepperConfig::default()),
            &seed,
            FieldLinePointSpacing::Natural,
            3,
        )
        .unwrap();
        assert_eq!(trace.stopping_cause, StoppingCause::StepLimitReached);
        assert_eq!(trace.positions.len(), 4);
    }
}
