//! Field lines traced between the boundaries of a spherical shell.

pub mod set;

use super::{
    ftr,
    stepping::{Stepper3, SteppingSense, StoppingCause},
    trace_half_field_line, FieldLinePointSpacing, HalfTrace, HalfTraceContext,
};
use crate::{
    domain::{Boundary, SphericalShell},
    field::{FieldSampler3, SamplerError, UnitTangentField},
    geometry::Point3,
};
use std::{collections::VecDeque, fmt};
use thiserror::Error;

/// Relative distance below the source surface where the radial field of an open
/// field line is evaluated.
const RADIAL_PROBE_OFFSET: ftr = 1e-9;

/// Magnetic connectivity of a field line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize))]
pub enum Polarity {
    /// Connects the inner boundary to the source surface, with the field
    /// pointing inward at the source surface.
    OpenNegative = -1,
    /// Both ends are anchored at the inner boundary.
    Closed = 0,
    /// Connects the inner boundary to the source surface, with the field
    /// pointing outward at the source surface.
    OpenPositive = 1,
}

impl Polarity {
    /// Returns the polarity as -1, 0 or 1.
    pub fn sign(self) -> i8 {
        self as i8
    }

    /// Whether the field line reaches the source surface.
    pub fn is_open(self) -> bool {
        self != Self::Closed
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenNegative => write!(f, "open negative"),
            Self::Closed => write!(f, "closed"),
            Self::OpenPositive => write!(f, "open positive"),
        }
    }
}

/// Why the polarity of a field line could not be determined.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize))]
pub enum AmbiguityReason {
    /// Both ends lie on the source surface and neither touches the inner boundary.
    BothEndsOnSourceSurface,
    /// At least one end is not on a boundary within the tolerance.
    EndNotOnBoundary,
    /// The radial field at the source surface end is zero or could not be evaluated.
    UndeterminedRadialField,
}

impl fmt::Display for AmbiguityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BothEndsOnSourceSurface => write!(f, "both ends are on the source surface"),
            Self::EndNotOnBoundary => write!(f, "an end is not on a boundary"),
            Self::UndeterminedRadialField => {
                write!(f, "radial field at the source surface has no definite sign")
            }
        }
    }
}

/// The ordered positions of a traced field line, running from the backward
/// terminus through the seed to the forward terminus.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize))]
pub struct FieldLinePath {
    positions: Vec<Point3<ftr>>,
    seed_index: usize,
}

impl FieldLinePath {
    /// Stitches a backward and a forward half-trace from the same seed into one path.
    ///
    /// The backward positions are reversed and the duplicate seed position dropped,
    /// so the seed appears exactly once.
    pub fn assemble(backward: HalfTrace, forward: HalfTrace) -> Self {
        let mut positions = VecDeque::with_capacity(backward.positions.len() + forward.positions.len());
        for position in backward.positions {
            positions.push_front(position);
        }
        // Remove start position
        positions.pop_back();
        let seed_index = positions.len();
        positions.extend(forward.positions);
        Self {
            positions: Vec::from(positions),
            seed_index,
        }
    }

    /// Returns the positions making up the path.
    pub fn positions(&self) -> &[Point3<ftr>] {
        &self.positions
    }

    /// Returns the index of the seed position in the path.
    pub fn seed_index(&self) -> usize {
        self.seed_index
    }

    /// Returns the seed position.
    pub fn seed(&self) -> &Point3<ftr> {
        &self.positions[self.seed_index]
    }

    /// Returns the terminus of the backward half.
    pub fn backward_end(&self) -> &Point3<ftr> {
        &self.positions[0]
    }

    /// Returns the terminus of the forward half.
    pub fn forward_end(&self) -> &Point3<ftr> {
        &self.positions[self.positions.len() - 1]
    }

    /// Returns the number of positions in the path.
    pub fn number_of_points(&self) -> usize {
        self.positions.len()
    }
}

/// A traced field line with a determined polarity.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize))]
pub struct FieldLine {
    path: FieldLinePath,
    polarity: Polarity,
}

impl FieldLine {
    /// Returns the traced path of the field line.
    pub fn path(&self) -> &FieldLinePath {
        &self.path
    }

    /// Returns the positions along the field line, from the backward end to the forward end.
    pub fn positions(&self) -> &[Point3<ftr>] {
        self.path.positions()
    }

    /// Returns the polarity the field line was classified with.
    pub fn polarity(&self) -> Polarity {
        self.polarity
    }
}

/// Ways in which tracing a field line from a seed can fail.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum TraceError {
    /// The seed is not strictly between the inner boundary and the source surface.
    #[error("Seed point {seed} at radius {radius} is not strictly inside the domain")]
    SeedOutOfDomain { seed: Point3<ftr>, radius: ftr },
    /// At least one half of the field line did not end on a boundary.
    #[error("Field line did not reach a boundary (backward: {backward}, forward: {forward})")]
    NonConvergent {
        path: FieldLinePath,
        backward: StoppingCause,
        forward: StoppingCause,
    },
    /// The field line was traced, but its polarity could not be determined.
    #[error("Polarity of field line is ambiguous: {reason}")]
    AmbiguousPolarity {
        path: FieldLinePath,
        reason: AmbiguityReason,
    },
    /// The field sampler failed during tracing.
    #[error(transparent)]
    SamplerFailure(#[from] SamplerError),
}

impl TraceError {
    /// Returns the partial or unclassified path traced before the failure, if any.
    pub fn path(&self) -> Option<&FieldLinePath> {
        match self {
            Self::NonConvergent { path, .. } | Self::AmbiguousPolarity { path, .. } => Some(path),
            Self::SeedOutOfDomain { .. } | Self::SamplerFailure(_) => None,
        }
    }
}

/// Result of tracing a field line from one seed.
pub type FieldLineResult = Result<FieldLine, TraceError>;

/// Configuration parameters for the field line tracer.
#[derive(Clone, Debug)]
pub struct FieldLineTracerConfig {
    /// Radius of the outer boundary, in units of the inner boundary radius.
    pub source_surface_radius: ftr,
    /// How far from a boundary sphere a field line end may lie while still
    /// counting as being on it.
    pub boundary_tolerance: ftr,
    /// Integration time after which each half-trace is given up. This is the
    /// arc length when the field is normalized.
    pub max_integration_time: ftr,
    /// Number of steps after which each half-trace is given up.
    pub max_steps: usize,
    /// Form of spacing between field line points.
    pub point_spacing: FieldLinePointSpacing,
    /// Whether to integrate the unit tangent of the field rather than the
    /// field itself.
    pub normalize_field: bool,
}

/// Traces field lines in both directions from seeds and classifies them.
///
/// By default the field direction is normalized before integration, so that
/// integration time measures arc length along the field line.
#[derive(Clone, Debug)]
pub struct FieldLineTracer3 {
    config: FieldLineTracerConfig,
    domain: SphericalShell,
}

impl FieldLineTracer3 {
    /// Creates a new field line tracer.
    pub fn new(config: FieldLineTracerConfig) -> Self {
        config.validate();
        let domain = SphericalShell::new(config.source_surface_radius);
        FieldLineTracer3 { config, domain }
    }

    /// Returns the configuration of the tracer.
    pub fn config(&self) -> &FieldLineTracerConfig {
        &self.config
    }

    /// Returns the shell that field lines are traced through.
    pub fn domain(&self) -> &SphericalShell {
        &self.domain
    }

    /// Traces the field line through the given seed and classifies its polarity.
    ///
    /// # Parameters
    ///
    /// - `field`: Field to trace.
    /// - `stepper`: Stepper to use (will be consumed).
    /// - `seed`: Position where the tracing should start.
    ///
    /// # Returns
    ///
    /// A `FieldLineResult` holding either the classified `FieldLine` or
    /// the `TraceError` describing why no classified line could be produced.
    ///
    /// # Type parameters
    ///
    /// - `S`: Type of field sampler.
    /// - `St`: Type of stepper.
    pub fn trace<S, St>(&self, field: &S, stepper: St, seed: &Point3<ftr>) -> FieldLineResult
    where
        S: FieldSampler3 + ?Sized,
        St: Stepper3,
    {
        if !self.domain.strictly_contains(seed) {
            return Err(TraceError::SeedOutOfDomain {
                seed: seed.clone(),
                radius: seed.radius(),
            });
        }

        let (backward, forward) = if self.config.normalize_field {
            self.trace_halves(&UnitTangentField::new(field), stepper, seed)?
        } else {
            self.trace_halves(field, stepper, seed)?
        };

        let backward_cause = backward.stopping_cause;
        let forward_cause = forward.stopping_cause;
        let path = FieldLinePath::assemble(backward, forward);

        if !(backward_cause.reached_boundary() && forward_cause.reached_boundary()) {
            return Err(TraceError::NonConvergent {
                path,
                backward: backward_cause,
                forward: forward_cause,
            });
        }

        match classify_polarity(&path, &self.domain, self.config.boundary_tolerance, field)? {
            Ok(polarity) => Ok(FieldLine { path, polarity }),
            Err(reason) => Err(TraceError::AmbiguousPolarity { path, reason }),
        }
    }

    fn trace_halves<F, St>(
        &self,
        traced_field: &F,
        stepper: St,
        seed: &Point3<ftr>,
    ) -> Result<(HalfTrace, HalfTrace), SamplerError>
    where
        F: FieldSampler3 + ?Sized,
        St: Stepper3,
    {
        let forward_context = HalfTraceContext::new(
            self.domain,
            SteppingSense::Same,
            traced_field,
            self.config.max_integration_time,
        );
        let backward_context = forward_context.reversed();

        let backward = trace_half_field_line(
            &backward_context,
            stepper.clone(),
            seed,
            self.config.point_spacing,
            self.config.max_steps,
        )?;
        let forward = trace_half_field_line(
            &forward_context,
            stepper,
            seed,
            self.config.point_spacing,
            self.config.max_steps,
        )?;
        Ok((backward, forward))
    }
}

/// Determines the polarity of a field line path from where its ends lie and
/// the direction of the radial field at the source surface end.
///
/// # Returns
///
/// A `Result` which is either:
///
/// - `Ok`: Contains the `Polarity`, or the `AmbiguityReason` if it could not be determined.
/// - `Err`: Contains the `SamplerError` if the radial field could not be evaluated.
pub fn classify_polarity<S>(
    path: &FieldLinePath,
    domain: &SphericalShell,
    boundary_tolerance: ftr,
    field: &S,
) -> Result<Result<Polarity, AmbiguityReason>, SamplerError>
where
    S: FieldSampler3 + ?Sized,
{
    let backward_boundary =
        domain.boundary_at_radius(path.backward_end().radius(), boundary_tolerance);
    let forward_boundary =
        domain.boundary_at_radius(path.forward_end().radius(), boundary_tolerance);

    let open_end = match (backward_boundary, forward_boundary) {
        (Some(Boundary::Inner), Some(Boundary::Inner)) => return Ok(Ok(Polarity::Closed)),
        (Some(Boundary::Outer), Some(Boundary::Outer)) => {
            return Ok(Err(AmbiguityReason::BothEndsOnSourceSurface))
        }
        (Some(Boundary::Inner), Some(Boundary::Outer)) => path.forward_end(),
        (Some(Boundary::Outer), Some(Boundary::Inner)) => path.backward_end(),
        _ => return Ok(Err(AmbiguityReason::EndNotOnBoundary)),
    };

    // Probe just inside the source surface, where gridded fields are still defined
    let probe_radius = domain.outer_radius() * (1.0 - RADIAL_PROBE_OFFSET);
    let radial_component = field.sample_radial_component(&open_end.with_radius(probe_radius))?;

    Ok(match radial_component {
        Some(radial) if radial > 0.0 => Ok(Polarity::OpenPositive),
        Some(radial) if radial < 0.0 => Ok(Polarity::OpenNegative),
        _ => Err(AmbiguityReason::UndeterminedRadialField),
    })
}

impl FieldLineTracerConfig {
    pub const DEFAULT_SOURCE_SURFACE_RADIUS: ftr = 2.5;
    pub const DEFAULT_BOUNDARY_TOLERANCE: ftr = 1e-4;
    pub const DEFAULT_MAX_INTEGRATION_TIME: ftr = 1e4;
    pub const DEFAULT_MAX_STEPS: usize = 100_000;
    pub const DEFAULT_POINT_SPACING: FieldLinePointSpacing = FieldLinePointSpacing::Natural;
    pub const DEFAULT_NORMALIZE_FIELD: bool = true;

    fn validate(&self) {
        assert!(
            self.source_surface_radius > SphericalShell::INNER_RADIUS,
            "Source surface radius must be larger than {}.",
            SphericalShell::INNER_RADIUS
        );
        assert!(
            self.boundary_tolerance > 0.0,
            "Boundary tolerance must be larger than zero."
        );
        assert!(
            2.0 * self.boundary_tolerance
                < self.source_surface_radius - SphericalShell::INNER_RADIUS,
            "Boundary tolerance must be smaller than half the shell thickness."
        );
        assert!(
            self.max_integration_time > 0.0,
            "Maximum integration time must be larger than zero."
        );
        assert!(
            self.max_steps > 0,
            "Maximum number of steps must be larger than zero."
        );
    }
}

impl Default for FieldLineTracerConfig {
    fn default() -> Self {
        FieldLineTracerConfig {
            source_surface_radius: Self::DEFAULT_SOURCE_SURFACE_RADIUS,
            boundary_tolerance: Self::DEFAULT_BOUNDARY_TOLERANCE,
            max_integration_time: Self::DEFAULT_MAX_INTEGRATION_TIME,
            max_steps: Self::DEFAULT_MAX_STEPS,
            point_spacing: Self::DEFAULT_POINT_SPACING,
            normalize_field: Self::DEFAULT_NORMALIZE_FIELD,
        }
    }
}
