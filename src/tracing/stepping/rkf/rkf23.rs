//! Stepping using the the Bogacki–Shampine scheme,
//! a third-order Runge-Kutta method with error
//! estimation through an embedded second-order step.

use super::{
    super::{Stepper3, StepperFactory3, StepperResult, SteppingCallback, SteppingOutcome},
    RKFStepper3, RKFStepperConfig, RKFStepperState3, StepAttempt3,
};
use crate::{
    field::FieldSampler3,
    geometry::{Point3, Vec3},
    tracing::{ftr, HalfTraceContext},
};

/// A stepper using the third order Runge–Kutta–Fehlberg method.
#[derive(Clone, Debug)]
pub struct RKF23Stepper3(RKFStepperState3);

/// Factory for `RKF23Stepper3` objects.
#[derive(Clone, Debug)]
pub struct RKF23StepperFactory3 {
    config: RKFStepperConfig,
}

impl RKF23Stepper3 {
    const ORDER: u8 = 3;
    const N_INTERMEDIATE_STEPS: usize = 2;

    const A21: ftr = 1.0 / 2.0;
    const A32: ftr = 3.0 / 4.0;
    const A41: ftr = 2.0 / 9.0;
    const A42: ftr = 1.0 / 3.0;
    const A43: ftr = 4.0 / 9.0;

    const E1: ftr = -5.0 / 72.0;
    const E2: ftr = 1.0 / 12.0;
    const E3: ftr = 1.0 / 9.0;
    const E4: ftr = -1.0 / 8.0;

    /// Creates a new RKF23 stepper with the given configuration.
    pub fn new(config: RKFStepperConfig) -> Self {
        RKF23Stepper3(RKFStepperState3::new(
            config,
            Self::ORDER,
            Self::N_INTERMEDIATE_STEPS,
        ))
    }
}

impl RKFStepper3 for RKF23Stepper3 {
    fn state(&self) -> &RKFStepperState3 {
        &self.0
    }
    fn state_mut(&mut self) -> &mut RKFStepperState3 {
        &mut self.0
    }

    fn attempt_step<S>(&self, context: &HalfTraceContext<'_, S>) -> SteppingOutcome<StepAttempt3>
    where
        S: FieldSampler3 + ?Sized,
    {
        let state = self.state();

        let mut next_position =
            &state.position + &state.direction * (Self::A21 * state.step_length);

        let intermediate_direction_1 = match Self::compute_direction(context, &next_position)? {
            StepperResult::Ok(direction) => direction,
            StepperResult::Stopped(cause) => return Ok(StepperResult::Stopped(cause)),
        };

        next_position =
            &state.position + &intermediate_direction_1 * (Self::A32 * state.step_length);

        let intermediate_direction_2 = match Self::compute_direction(context, &next_position)? {
            StepperResult::Ok(direction) => direction,
            StepperResult::Stopped(cause) => return Ok(StepperResult::Stopped(cause)),
        };

        let step_displacement = (&state.direction * Self::A41
            + &intermediate_direction_1 * Self::A42
            + &intermediate_direction_2 * Self::A43)
            * state.step_length;

        next_position = &state.position + &step_displacement;

        let next_direction = match Self::compute_direction(context, &next_position)? {
            StepperResult::Ok(direction) => direction,
            StepperResult::Stopped(cause) => return Ok(StepperResult::Stopped(cause)),
        };

        Ok(StepperResult::Ok(StepAttempt3 {
            step_displacement,
            next_position,
            next_direction,
            intermediate_directions: vec![intermediate_direction_1, intermediate_direction_2],
        }))
    }

    fn compute_error_deltas(&self, attempt: &StepAttempt3) -> Vec3<ftr> {
        let state = self.state();
        (&state.direction * Self::E1
            + &attempt.intermediate_directions[0] * Self::E2
            + &attempt.intermediate_directions[1] * Self::E3
            + &attempt.next_direction * Self::E4)
            * state.step_length
    }

    fn compute_dense_interpolation_coefs(&self) -> Vec<Vec3<ftr>> {
        let state = self.state();
        let coef_vec_1 = state.previous_position.to_vec3();
        let coef_vec_2 = state.previous_step_displacement.clone();
        let coef_vec_3 = &state.previous_direction * state.previous_step_length;
        let coef_vec_4 = &state.direction * state.previous_step_length;
        vec![coef_vec_1, coef_vec_2, coef_vec_3, coef_vec_4]
    }

    fn interpolate_dense_position(&self, coefs: &[Vec3<ftr>], fraction: ftr) -> Point3<ftr> {
        let fraction_minus_one = fraction - 1.0;
        coefs[0].to_point3()
            + &coefs[1] * fraction
            + (&coefs[1] * (-(fraction + fraction_minus_one))
                + &coefs[2] * fraction_minus_one
                + &coefs[3] * fraction)
                * (fraction * fraction_minus_one)
    }
}

impl Stepper3 for RKF23Stepper3 {
    fn place<S>(
        &mut self,
        context: &HalfTraceContext<'_, S>,
        position: &Point3<ftr>,
        callback: &mut SteppingCallback,
    ) -> SteppingOutcome<()>
    where
        S: FieldSampler3 + ?Sized,
    {
        self.place_with_callback(context, position, callback)
    }

    fn step<S>(
        &mut self,
        context: &HalfTraceContext<'_, S>,
        callback: &mut SteppingCallback,
    ) -> SteppingOutcome<()>
    where
        S: FieldSampler3 + ?Sized,
    {
        self.step_with_callback(context, callback)
    }

    fn step_dense_output<S>(
        &mut self,
        context: &HalfTraceContext<'_, S>,
        callback: &mut SteppingCallback,
    ) -> SteppingOutcome<()>
    where
        S: FieldSampler3 + ?Sized,
    {
        self.step_with_callback_dense_output(context, callback)
    }

    fn position(&self) -> &Point3<ftr> {
        &self.state().position
    }

    fn time(&self) -> ftr {
        self.state().time
    }
}

impl RKF23StepperFactory3 {
    /// Creates a new factory for producing steppers with the given configuration parameters.
    pub fn new(config: RKFStepperConfig) -> Self {
        RKF23StepperFactory3 { config }
    }
}

impl StepperFactory3 for RKF23StepperFactory3 {
    type Output = RKF23Stepper3;
    fn produce(&self) -> Self::Output {
        RKF23Stepper3::new(self.config.clone())
    }
}
