//! Stepping using Runge–Kutta–Fehlberg methods,
//! a set of RK methods with step size adaptation driven by
//! error estimation through an embedded lower-order step.

pub mod rkf23;
pub mod rkf45;

use super::{SteppingCallback, SteppingOutcome, StepperResult, StoppingCause};
use crate::{
    domain::Boundary,
    field::{FieldQuery3, FieldSampler3, SamplerError},
    geometry::{Point3, Vec3},
    tracing::{ftr, HalfTraceContext},
};

/// Type of RKF stepper.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RKFStepperType {
    RKF23,
    RKF45,
}

#[derive(Clone, Debug)]
struct RKFStepperState3 {
    /// Configuration parameters for the stepper.
    config: RKFStepperConfig,
    /// PI control parameters for the stepper.
    pi_control: PIControlParams,
    /// Current position of the stepper.
    position: Point3<ftr>,
    /// Signed field vector at the current position of the stepper.
    direction: Vec3<ftr>,
    /// Current integration time of the stepper.
    time: ftr,
    /// Step length to use in the next step.
    step_length: ftr,
    /// The estimated error of the step from the previous to the current position.
    error: ftr,
    /// How many consecutive successful steps have been in opposite directions.
    n_sudden_reversals: u32,
    /// The step size used to get from the previous to the current position.
    previous_step_length: ftr,
    /// Position of the stepper directly before the previous step was taken.
    previous_position: Point3<ftr>,
    /// Signed field vector at the previous position of the stepper.
    previous_direction: Vec3<ftr>,
    /// Intermediate step directions used during the previous step.
    intermediate_directions: Vec<Vec3<ftr>>,
    /// Displacement vector from the previous to the current position.
    previous_step_displacement: Vec3<ftr>,
    /// Integration time where the next dense output position should be computed.
    next_output_time: ftr,
}

/// Configuration parameters for RKF steppers.
#[derive(Clone, Debug)]
pub struct RKFStepperConfig {
    /// Integration time interval to use for dense (uniform) output positions.
    pub dense_step_length: ftr,
    /// Maximum number of step attempts before terminating.
    pub max_step_attempts: u32,
    /// Absolute error tolerance.
    pub absolute_tolerance: ftr,
    /// Relative error tolerance.
    pub relative_tolerance: ftr,
    /// Scaling factor for the error to reduce oscillations.
    pub safety_factor: ftr,
    /// Smallest allowed scaling of the step size in one step.
    pub min_step_scale: ftr,
    /// Largest allowed scaling of the step size in one step.
    pub max_step_scale: ftr,
    /// Start value for error.
    pub initial_error: ftr,
    /// Initial step size.
    pub initial_step_length: ftr,
    /// Step size below which a step leaving the field is completed
    /// by straight-line extrapolation to the boundary.
    pub min_step_length: ftr,
    /// Number of sudden direction reversals before the area is considered a sink.
    pub sudden_reversals_for_sink: u32,
    /// Whether to use Proportional Integral (PI) control for stabilizing the stepping.
    pub use_pi_control: bool,
}

#[derive(Clone, Debug)]
struct PIControlParams {
    k_i: ftr,
    k_p: ftr,
}

#[derive(Clone, Debug)]
enum StepError {
    Acceptable(ftr),
    TooLarge(ftr),
}

#[derive(Clone, Debug)]
struct StepAttempt3 {
    next_position: Point3<ftr>,
    next_direction: Vec3<ftr>,
    intermediate_directions: Vec<Vec3<ftr>>,
    step_displacement: Vec3<ftr>,
}

/// Where and when a step met one of the boundary spheres.
#[derive(Clone, Debug)]
struct BoundaryCrossing3 {
    boundary: Boundary,
    position: Point3<ftr>,
    time: ftr,
    /// Whether the crossing lies within the most recent accepted step,
    /// as opposed to on an extrapolated segment beyond it.
    within_step: bool,
}

trait RKFStepper3 {
    /// Maximum number of bisections used to locate a boundary crossing.
    const MAX_BISECTIONS: u32 = 64;
    /// How many times the current step size an extrapolated segment can
    /// extend before the boundary is considered unreachable.
    const EXTRAPOLATION_STEP_FACTOR: ftr = 10.0;

    fn state(&self) -> &RKFStepperState3;
    fn state_mut(&mut self) -> &mut RKFStepperState3;

    fn attempt_step<S>(&self, context: &HalfTraceContext<'_, S>) -> SteppingOutcome<StepAttempt3>
    where
        S: FieldSampler3 + ?Sized;

    fn compute_error_deltas(&self, attempt: &StepAttempt3) -> Vec3<ftr>;

    fn compute_dense_interpolation_coefs(&self) -> Vec<Vec3<ftr>>;

    /// Computes the interpolated position at the given fraction between
    /// the previous and current natural output position.
    fn interpolate_dense_position(&self, coefs: &[Vec3<ftr>], fraction: ftr) -> Point3<ftr>;

    fn reset_state(&mut self, position: &Point3<ftr>, direction: &Vec3<ftr>) {
        let state = self.state_mut();
        state.position = position.clone();
        state.direction = direction.clone();
        state.time = 0.0;
        state.step_length = state.config.initial_step_length;
        state.error = state.config.initial_error;
        state.n_sudden_reversals = 0;
        state.previous_step_length = 0.0;
        state.previous_position = position.clone();
        state.previous_direction = direction.clone();
        state.intermediate_directions = Vec::new();
        state.previous_step_displacement = Vec3::zero();
        state.next_output_time = state.config.dense_step_length;
    }

    fn place_with_callback<S>(
        &mut self,
        context: &HalfTraceContext<'_, S>,
        position: &Point3<ftr>,
        callback: &mut SteppingCallback,
    ) -> SteppingOutcome<()>
    where
        S: FieldSampler3 + ?Sized,
    {
        let place_result = self.perform_place(context, position)?;
        if let StepperResult::Ok(_) = place_result {
            callback(&self.state().position, self.state().time);
        }
        Ok(place_result)
    }

    fn step_with_callback<S>(
        &mut self,
        context: &HalfTraceContext<'_, S>,
        callback: &mut SteppingCallback,
    ) -> SteppingOutcome<()>
    where
        S: FieldSampler3 + ?Sized,
    {
        Ok(match self.perform_step(context)? {
            StepperResult::Ok(None) => {
                callback(&self.state().position, self.state().time);
                StepperResult::Ok(())
            }
            StepperResult::Ok(Some(crossing)) => self.finish_at_boundary(crossing, callback),
            StepperResult::Stopped(cause) => StepperResult::Stopped(cause),
        })
    }

    fn step_with_callback_dense_output<S>(
        &mut self,
        context: &HalfTraceContext<'_, S>,
        callback: &mut SteppingCallback,
    ) -> SteppingOutcome<()>
    where
        S: FieldSampler3 + ?Sized,
    {
        Ok(match self.perform_step(context)? {
            StepperResult::Ok(None) => {
                let end_time = self.state().time;
                self.compute_dense_output(end_time, callback);
                StepperResult::Ok(())
            }
            StepperResult::Ok(Some(crossing)) => {
                if crossing.within_step {
                    self.compute_dense_output(crossing.time, callback);
                }
                self.finish_at_boundary(crossing, callback)
            }
            StepperResult::Stopped(cause) => StepperResult::Stopped(cause),
        })
    }

    fn perform_place<S>(
        &mut self,
        context: &HalfTraceContext<'_, S>,
        position: &Point3<ftr>,
    ) -> SteppingOutcome<()>
    where
        S: FieldSampler3 + ?Sized,
    {
        match Self::compute_direction(context, position)? {
            StepperResult::Ok(direction) => self.reset_state(position, &direction),
            StepperResult::Stopped(cause) => return Ok(StepperResult::Stopped(cause)),
        };
        Ok(StepperResult::Ok(()))
    }

    /// Advances the stepper by one accepted step.
    ///
    /// Returns the boundary crossing if the step ended on or beyond a boundary.
    /// The stepper state is then left at the end of the accepted step, and must
    /// be moved to the crossing with `finish_at_boundary`.
    fn perform_step<S>(
        &mut self,
        context: &HalfTraceContext<'_, S>,
    ) -> SteppingOutcome<Option<BoundaryCrossing3>>
    where
        S: FieldSampler3 + ?Sized,
    {
        let mut attempts = 0;

        loop {
            if attempts >= self.state().config.max_step_attempts {
                return Ok(StepperResult::Stopped(StoppingCause::TooManyAttempts));
            }

            let remaining_time = context.max_integration_time() - self.state().time;
            if remaining_time < self.state().config.min_step_length {
                return Ok(StepperResult::Stopped(StoppingCause::TimeSpanExhausted));
            }
            if self.state().step_length > remaining_time {
                self.state_mut().step_length = remaining_time;
            }

            let step_attempt = match self.attempt_step(context)? {
                StepperResult::Ok(step_attempt) => step_attempt,
                StepperResult::Stopped(StoppingCause::OutOfBounds) => {
                    // Part of the step fell outside the field, so close in on the boundary
                    let state = self.state_mut();
                    if state.step_length <= state.config.min_step_length {
                        return Ok(self.extrapolate_to_boundary(context));
                    }
                    state.step_length = ftr::max(
                        state.step_length * state.config.min_step_scale,
                        state.config.min_step_length,
                    );
                    continue;
                }
                StepperResult::Stopped(cause) => return Ok(StepperResult::Stopped(cause)),
            };

            attempts += 1;

            match self.compute_error(&step_attempt) {
                StepError::Acceptable(new_error) => {
                    let mut new_step_length = self.compute_step_length_accepted(new_error);

                    // Don't increase step size if the previous attempt was rejected
                    if attempts > 1 && new_step_length > self.state().step_length {
                        new_step_length = self.state().step_length;
                    }

                    if self.check_for_sink(&step_attempt) {
                        return Ok(StepperResult::Stopped(StoppingCause::Sink));
                    }

                    self.apply_step_attempt(step_attempt);
                    self.update_step_length(new_step_length, new_error);
                    return Ok(StepperResult::Ok(self.locate_boundary_crossing(context)));
                }
                StepError::TooLarge(new_error) => {
                    let new_step_length = self.compute_step_length_rejected(new_error);
                    self.update_step_length(new_step_length, new_error);
                }
            };
        }
    }

    fn compute_direction<S>(
        context: &HalfTraceContext<'_, S>,
        position: &Point3<ftr>,
    ) -> SteppingOutcome<Vec3<ftr>>
    where
        S: FieldSampler3 + ?Sized,
    {
        match context.field().sample(position)? {
            FieldQuery3::Inside(field_vector) => {
                if !field_vector.is_finite() {
                    Err(SamplerError::new(position, "field vector is not finite"))
                } else if field_vector.is_zero() {
                    Ok(StepperResult::Stopped(StoppingCause::Null))
                } else {
                    Ok(StepperResult::Ok(field_vector * context.sense().sign()))
                }
            }
            FieldQuery3::Outside => Ok(StepperResult::Stopped(StoppingCause::OutOfBounds)),
        }
    }

    fn compute_error(&self, attempt: &StepAttempt3) -> StepError {
        let state = self.state();
        let error_deltas = self.compute_error_deltas(attempt);

        let errors = Vec3::with_each_component(|dim| {
            let scale = ftr::max(
                ftr::abs(state.position[dim]),
                ftr::abs(attempt.next_position[dim]),
            );
            error_deltas[dim]
                / (state.config.absolute_tolerance + state.config.relative_tolerance * scale)
        });

        let error = ftr::sqrt(errors.squared_length() / 3.0);

        if error <= 1.0 {
            StepError::Acceptable(error)
        } else {
            StepError::TooLarge(error)
        }
    }

    fn compute_step_length_accepted(&self, new_error: ftr) -> ftr {
        let state = self.state();
        let step_scale = if new_error < 1e-9 {
            // Use max step scale directly for very small error to avoid division by zero
            state.config.max_step_scale
        } else {
            let step_scale = state.config.safety_factor * (state.error.powf(state.pi_control.k_i))
                / (new_error.powf(state.pi_control.k_p));
            step_scale.clamp(state.config.min_step_scale, state.config.max_step_scale)
        };
        state.step_length * step_scale
    }

    fn compute_step_length_rejected(&self, new_error: ftr) -> ftr {
        let state = self.state();
        ftr::max(
            state.config.safety_factor / (new_error.powf(state.pi_control.k_p)),
            state.config.min_step_scale,
        ) * state.step_length
    }

    fn check_for_sink(&mut self, attempt: &StepAttempt3) -> bool {
        let state = self.state_mut();
        if attempt.next_direction.dot(&state.direction) < 0.0 {
            state.n_sudden_reversals += 1;
            state.n_sudden_reversals >= state.config.sudden_reversals_for_sink
        } else {
            state.n_sudden_reversals = 0;
            false
        }
    }

    fn apply_step_attempt(&mut self, attempt: StepAttempt3) {
        let state = self.state_mut();
        state.previous_position = state.position.clone();
        state.previous_direction = state.direction.clone();
        state.position = attempt.next_position;
        state.direction = attempt.next_direction;
        // Advance time with step size *prior to* calling `update_step_length`
        state.time += state.step_length;
        state.intermediate_directions = attempt.intermediate_directions;
        state.previous_step_displacement = attempt.step_displacement;
    }

    fn update_step_length(&mut self, new_step_length: ftr, new_error: ftr) {
        let state = self.state_mut();
        state.previous_step_length = state.step_length;
        state.step_length = new_step_length;
        state.error = new_error;
    }

    /// Checks whether the step just taken ended on or beyond a boundary, and if so
    /// locates the crossing on the dense output polynomial of the step.
    fn locate_boundary_crossing<S>(
        &self,
        context: &HalfTraceContext<'_, S>,
    ) -> Option<BoundaryCrossing3>
    where
        S: FieldSampler3 + ?Sized,
    {
        let state = self.state();
        let domain = context.domain();
        if domain.event_function(&state.position) < 0.0 {
            return None;
        }

        let coefs = self.compute_dense_interpolation_coefs();
        let step_distance = state.previous_step_displacement.length();
        let fraction_tolerance = if step_distance > 0.0 {
            state.config.absolute_tolerance / step_distance
        } else {
            ftr::EPSILON
        };

        // The event function is negative at fraction 0 and non-negative at fraction 1
        let mut lower_fraction: ftr = 0.0;
        let mut upper_fraction: ftr = 1.0;
        let mut n_bisections = 0;
        while upper_fraction - lower_fraction > fraction_tolerance
            && n_bisections < Self::MAX_BISECTIONS
        {
            let middle_fraction = 0.5 * (lower_fraction + upper_fraction);
            let middle_position = self.interpolate_dense_position(&coefs, middle_fraction);
            if domain.event_function(&middle_position) < 0.0 {
                lower_fraction = middle_fraction;
            } else {
                upper_fraction = middle_fraction;
            }
            n_bisections += 1;
        }

        let crossing_position = self.interpolate_dense_position(&coefs, upper_fraction);
        let boundary = domain.nearest_boundary(crossing_position.radius());
        let previous_time = state.time - state.previous_step_length;

        Some(BoundaryCrossing3 {
            boundary,
            position: crossing_position.with_radius(domain.boundary_radius(boundary)),
            time: previous_time + upper_fraction * state.previous_step_length,
            within_step: true,
        })
    }

    /// Continues from the current position along a straight line in the
    /// current direction until a boundary is met.
    fn extrapolate_to_boundary<S>(
        &self,
        context: &HalfTraceContext<'_, S>,
    ) -> StepperResult<Option<BoundaryCrossing3>>
    where
        S: FieldSampler3 + ?Sized,
    {
        let state = self.state();
        let domain = context.domain();
        let max_parameter = Self::EXTRAPOLATION_STEP_FACTOR
            * ftr::max(state.step_length, state.config.min_step_length);

        match domain.find_ray_exit(&state.position, &state.direction, max_parameter) {
            Some((parameter, boundary)) => {
                let exit_position = &state.position + &(&state.direction * parameter);
                StepperResult::Ok(Some(BoundaryCrossing3 {
                    boundary,
                    position: exit_position.with_radius(domain.boundary_radius(boundary)),
                    time: state.time + parameter,
                    within_step: false,
                }))
            }
            None => StepperResult::Stopped(StoppingCause::OutOfBounds),
        }
    }

    fn finish_at_boundary(
        &mut self,
        crossing: BoundaryCrossing3,
        callback: &mut SteppingCallback,
    ) -> StepperResult<()> {
        let state = self.state_mut();
        state.position = crossing.position;
        state.time = crossing.time;
        callback(&state.position, state.time);
        StepperResult::Stopped(StoppingCause::ReachedBoundary(crossing.boundary))
    }

    /// Emits interpolated positions at every dense output time within the
    /// previous step, up to and including `end_time`.
    fn compute_dense_output(&mut self, end_time: ftr, callback: &mut SteppingCallback) {
        let state = self.state();
        debug_assert!(state.previous_step_length > 0.0);
        let previous_time = state.time - state.previous_step_length;
        let previous_step_length = state.previous_step_length;
        let dense_step_length = state.config.dense_step_length;

        let mut next_output_time = state.next_output_time;

        if next_output_time <= end_time {
            let coefs = self.compute_dense_interpolation_coefs();
            while next_output_time <= end_time {
                let fraction = (next_output_time - previous_time) / previous_step_length;
                let output_position = self.interpolate_dense_position(&coefs, fraction);
                callback(&output_position, next_output_time);
                next_output_time += dense_step_length;
            }
        }

        self.state_mut().next_output_time = next_output_time;
    }
}

impl RKFStepperConfig {
    pub const DEFAULT_DENSE_STEP_LENGTH: ftr = 1e-2;
    pub const DEFAULT_MAX_STEP_ATTEMPTS: u32 = 16;
    pub const DEFAULT_ABSOLUTE_TOLERANCE: ftr = 1e-6;
    pub const DEFAULT_RELATIVE_TOLERANCE: ftr = 1e-6;
    pub const DEFAULT_SAFETY_FACTOR: ftr = 0.9;
    pub const DEFAULT_MIN_STEP_SCALE: ftr = 0.2;
    pub const DEFAULT_MAX_STEP_SCALE: ftr = 10.0;
    pub const DEFAULT_INITIAL_ERROR: ftr = 1e-4;
    pub const DEFAULT_INITIAL_STEP_LENGTH: ftr = 1e-4;
    pub const DEFAULT_MIN_STEP_LENGTH: ftr = 1e-8;
    pub const DEFAULT_SUDDEN_REVERSALS_FOR_SINK: u32 = 3;
    pub const DEFAULT_USE_PI_CONTROL: bool = true;

    fn validate(&self) {
        assert!(
            self.dense_step_length > 0.0,
            "Dense step size must be larger than zero."
        );
        assert!(
            self.max_step_attempts > 0,
            "Maximum number of step attempts must be larger than zero."
        );
        assert!(
            self.absolute_tolerance > 0.0,
            "Absolute error tolerance must be larger than zero."
        );
        assert!(
            self.relative_tolerance >= 0.0,
            "Relative error tolerance must be larger than or equal to zero."
        );
        assert!(
            self.safety_factor > 0.0 && self.safety_factor <= 1.0,
            "Safety factor must be in the range (0, 1]."
        );
        assert!(
            self.min_step_scale > 0.0 && self.min_step_scale < 1.0,
            "Minimum step scale must be in the range (0, 1)."
        );
        assert!(
            self.max_step_scale >= self.min_step_scale,
            "Maximum step scale must be larger than or equal to the minimum step scale."
        );
        assert!(
            self.initial_step_length > 0.0,
            "Initial step size must be larger than zero."
        );
        assert!(
            self.min_step_length > 0.0 && self.min_step_length <= self.initial_step_length,
            "Minimum step size must be larger than zero and not exceed the initial step size."
        );
        assert!(
            self.initial_error > 0.0 && self.initial_error <= 1.0,
            "Initial error must be in the range (0, 1]."
        );
        assert!(
            self.sudden_reversals_for_sink > 0,
            "Number of sudden reversals for sink must be larger than zero."
        );
    }
}

impl Default for RKFStepperConfig {
    fn default() -> Self {
        RKFStepperConfig {
            dense_step_length: Self::DEFAULT_DENSE_STEP_LENGTH,
            max_step_attempts: Self::DEFAULT_MAX_STEP_ATTEMPTS,
            absolute_tolerance: Self::DEFAULT_ABSOLUTE_TOLERANCE,
            relative_tolerance: Self::DEFAULT_RELATIVE_TOLERANCE,
            safety_factor: Self::DEFAULT_SAFETY_FACTOR,
            min_step_scale: Self::DEFAULT_MIN_STEP_SCALE,
            max_step_scale: Self::DEFAULT_MAX_STEP_SCALE,
            initial_step_length: Self::DEFAULT_INITIAL_STEP_LENGTH,
            initial_error: Self::DEFAULT_INITIAL_ERROR,
            min_step_length: Self::DEFAULT_MIN_STEP_LENGTH,
            sudden_reversals_for_sink: Self::DEFAULT_SUDDEN_REVERSALS_FOR_SINK,
            use_pi_control: Self::DEFAULT_USE_PI_CONTROL,
        }
    }
}

impl RKFStepperState3 {
    fn new(config: RKFStepperConfig, scheme_order: u8, n_intermediate_steps: usize) -> Self {
        config.validate();

        let pi_control = if config.use_pi_control {
            PIControlParams::activated(scheme_order)
        } else {
            PIControlParams::deactivated(scheme_order)
        };
        let step_length = config.initial_step_length;
        let error = config.initial_error;
        let next_output_time = config.dense_step_length;

        RKFStepperState3 {
            config,
            pi_control,
            position: Point3::origin(),
            direction: Vec3::zero(),
            time: 0.0,
            step_length,
            error,
            n_sudden_reversals: 0,
            previous_step_length: 0.0,
            previous_position: Point3::origin(),
            previous_direction: Vec3::zero(),
            intermediate_directions: Vec::with_capacity(n_intermediate_steps),
            previous_step_displacement: Vec3::zero(),
            next_output_time,
        }
    }
}

impl PIControlParams {
    fn activated(scheme_order: u8) -> Self {
        #[allow(clippy::cast_lossless)]
        let order = scheme_order as ftr;
        let k_i = 0.4 / order;
        let k_p = 1.0 / order - 0.75 * k_i;
        PIControlParams { k_i, k_p }
    }

    fn deactivated(scheme_order: u8) -> Self {
        #[allow(clippy::cast_lossless)]
        let order = scheme_order as ftr;
        let k_i = 0.0;
        let k_p = 1.0 / order;
        PIControlParams { k_i, k_p }
    }
}
