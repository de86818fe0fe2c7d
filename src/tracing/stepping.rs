//! Stepping along field lines of a vector field.

pub mod rkf;

use super::{ftr, HalfTraceContext};
use crate::{
    domain::Boundary,
    field::{FieldSampler3, SamplerError},
    geometry::Point3,
};
use std::fmt;

/// Stepping along the field line in the same direction as the field or opposite.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SteppingSense {
    Same,
    Opposite,
}

impl SteppingSense {
    /// Returns the sign (+1 or -1) by which the field vector is multiplied.
    pub fn sign(self) -> ftr {
        match self {
            Self::Same => 1.0,
            Self::Opposite => -1.0,
        }
    }

    /// Returns the other sense.
    pub fn reversed(self) -> Self {
        match self {
            Self::Same => Self::Opposite,
            Self::Opposite => Self::Same,
        }
    }
}

/// A stepper result which is either OK (with an an abitrary value) or stopped (with a cause).
#[derive(Clone, Debug, PartialEq)]
pub enum StepperResult<T> {
    Ok(T),
    Stopped(StoppingCause),
}

/// Reason for terminating stepping.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize))]
pub enum StoppingCause {
    /// The trajectory reached one of the boundary spheres.
    ReachedBoundary(Boundary),
    /// The integration time span was used up before a boundary was reached.
    TimeSpanExhausted,
    /// The maximum number of steps was taken before a boundary was reached.
    StepLimitReached,
    /// The field vanished.
    Null,
    /// The field direction kept reversing, indicating a sink.
    Sink,
    /// The field could not be sampled and no boundary crossing could be found.
    OutOfBounds,
    /// No step with acceptable error could be found.
    TooManyAttempts,
}

impl StoppingCause {
    /// Whether stepping terminated normally on a boundary.
    pub fn reached_boundary(&self) -> bool {
        matches!(self, Self::ReachedBoundary(_))
    }
}

impl fmt::Display for StoppingCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReachedBoundary(Boundary::Inner) => write!(f, "reached inner boundary"),
            Self::ReachedBoundary(Boundary::Outer) => write!(f, "reached source surface"),
            Self::TimeSpanExhausted => write!(f, "integration time span exhausted"),
            Self::StepLimitReached => write!(f, "step limit reached"),
            Self::Null => write!(f, "null point"),
            Self::Sink => write!(f, "sink"),
            Self::OutOfBounds => write!(f, "left the field without crossing a boundary"),
            Self::TooManyAttempts => write!(f, "too many step attempts"),
        }
    }
}

/// Closure that is called with each output position and the integration time
/// at that position.
pub type SteppingCallback<'a> = dyn FnMut(&Point3<ftr>, ftr) + 'a;

/// Result of a stepper operation, or the sampler failure encountered while performing it.
pub type SteppingOutcome<T> = Result<StepperResult<T>, SamplerError>;

/// Defines the properties of a stepping scheme.
pub trait Stepper3: Clone + Send {
    /// Places the stepper at the given position in the field.
    ///
    /// # Parameters
    ///
    /// - `context`: Field, domain and direction to step with.
    /// - `position`: Position where the stepper should be placed.
    /// - `callback`: Closure that will be called with the placed position if successful.
    ///
    /// # Returns
    ///
    /// A `SteppingOutcome<()>` which is either:
    ///
    /// - `Ok(StepperResult::Ok)`: Stepper placement succeeded.
    /// - `Ok(StepperResult::Stopped)`: Contains a `StoppingCause` indicating why placement failed.
    /// - `Err`: The field sampler failed.
    fn place<S>(
        &mut self,
        context: &HalfTraceContext<'_, S>,
        position: &Point3<ftr>,
        callback: &mut SteppingCallback,
    ) -> SteppingOutcome<()>
    where
        S: FieldSampler3 + ?Sized;

    /// Performs a step, calling the callback with the new position.
    ///
    /// When the step crosses a boundary, the callback is called with the crossing
    /// point and the result is `Stopped(ReachedBoundary(..))`.
    fn step<S>(
        &mut self,
        context: &HalfTraceContext<'_, S>,
        callback: &mut SteppingCallback,
    ) -> SteppingOutcome<()>
    where
        S: FieldSampler3 + ?Sized;

    /// Performs a step, calling the callback with positions at regular intervals
    /// of integration time rather than with the natural step position.
    fn step_dense_output<S>(
        &mut self,
        context: &HalfTraceContext<'_, S>,
        callback: &mut SteppingCallback,
    ) -> SteppingOutcome<()>
    where
        S: FieldSampler3 + ?Sized;

    /// Returns a reference to the current stepper position.
    fn position(&self) -> &Point3<ftr>;

    /// Returns the current integration time of the stepper.
    fn time(&self) -> ftr;
}

/// Defines the properties of a 3D stepper factory structure.
pub trait StepperFactory3: Sync {
    type Output: Stepper3;
    fn produce(&self) -> Self::Output;
}
