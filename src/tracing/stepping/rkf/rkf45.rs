//! Stepping using the the Dormand-Prince scheme,
//! a fifth-order Runge-Kutta method with error
//! estimation through an embedded fourth-order step.

use super::super::{
    Stepper3, StepperFactory3, StepperResult, SteppingCallback, SteppingOutcome,
};
use super::{RKFStepper3, RKFStepperConfig, RKFStepperState3, StepAttempt3};
use crate::field::FieldSampler3;
use crate::geometry::{Point3, Vec3};
use crate::tracing::{ftr, HalfTraceContext};

/// A stepper using the fifth order Runge–Kutta–Fehlberg method.
#[derive(Clone, Debug)]
pub struct RKF45Stepper3(RKFStepperState3);

/// Factory for `RKF45Stepper3` objects.
#[derive(Clone, Debug)]
pub struct RKF45StepperFactory3 {
    config: RKFStepperConfig,
}

impl RKF45Stepper3 {
    const ORDER: u8 = 5;
    const N_INTERMEDIATE_STEPS: usize = 5;

    const A21: ftr = 1.0 / 5.0;
    const A31: ftr = 3.0 / 40.0;
    const A32: ftr = 9.0 / 40.0;
    const A41: ftr = 44.0 / 45.0;
    const A42: ftr = -56.0 / 15.0;
    const A43: ftr = 32.0 / 9.0;
    const A51: ftr = 19_372.0 / 6561.0;
    const A52: ftr = -25_360.0 / 2187.0;
    const A53: ftr = 64_448.0 / 6561.0;
    const A54: ftr = -212.0 / 729.0;
    const A61: ftr = 9017.0 / 3168.0;
    const A62: ftr = -355.0 / 33.0;
    const A63: ftr = 46_732.0 / 5247.0;
    const A64: ftr = 49.0 / 176.0;
    const A65: ftr = -5103.0 / 18_656.0;
    const A71: ftr = 35.0 / 384.0;
    //  const A72: ftr =       0.0         ;
    const A73: ftr = 500.0 / 1113.0;
    const A74: ftr = 125.0 / 192.0;
    const A75: ftr = -2187.0 / 6784.0;
    const A76: ftr = 11.0 / 84.0;

    const E1: ftr = 71.0 / 57_600.0;
    //  const E2: ftr =       0.0          ;
    const E3: ftr = -71.0 / 16_695.0;
    const E4: ftr = 71.0 / 1920.0;
    const E5: ftr = -17_253.0 / 339_200.0;
    const E6: ftr = 22.0 / 525.0;
    const E7: ftr = -1.0 / 40.0;

    const D1: ftr = -12_715_105_075.0 / 11_282_082_432.0;
    //  const D2: ftr =       0.0                          ;
    const D3: ftr = 87_487_479_700.0 / 32_700_410_799.0;
    const D4: ftr = -10_690_763_975.0 / 1_880_347_072.0;
    const D5: ftr = 701_980_252_875.0 / 199_316_789_632.0;
    const D6: ftr = -1_453_857_185.0 / 822_651_844.0;
    const D7: ftr = 69_997_945.0 / 29_380_423.0;

    /// Creates a new RKF45 stepper with the given configuration.
    pub fn new(config: RKFStepperConfig) -> Self {
        RKF45Stepper3(RKFStepperState3::new(
            config,
            Self::ORDER,
            Self::N_INTERMEDIATE_STEPS,
        ))
    }
}

impl RKFStepper3 for RKF45Stepper3 {
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

        next_position = &state.position
            + (&state.direction * Self::A31 + &intermediate_direction_1 * Self::A32)
                * state.step_length;

        let intermediate_direction_2 = match Self::compute_direction(context, &next_position)? {
            StepperResult::Ok(direction) => direction,
            StepperResult::Stopped(cause) => return Ok(StepperResult::Stopped(cause)),
        };

        next_position = &state.position
            + (&state.direction * Self::A41
                + &intermediate_direction_1 * Self::A42
                + &intermediate_direction_2 * Self::A43)
                * state.step_length;

        let intermediate_direction_3 = match Self::compute_direction(context, &next_position)? {
            StepperResult::Ok(direction) => direction,
            StepperResult::Stopped(cause) => return Ok(StepperResult::Stopped(cause)),
        };

        next_position = &state.position
            + (&state.direction * Self::A51
                + &intermediate_direction_1 * Self::A52
                + &intermediate_direction_2 * Self::A53
                + &intermediate_direction_3 * Self::A54)
                * state.step_length;

        let intermediate_direction_4 = match Self::compute_direction(context, &next_position)? {
            StepperResult::Ok(direction) => direction,
            StepperResult::Stopped(cause) => return Ok(StepperResult::Stopped(cause)),
        };

        next_position = &state.position
            + (&state.direction * Self::A61
                + &intermediate_direction_1 * Self::A62
                + &intermediate_direction_2 * Self::A63
                + &intermediate_direction_3 * Self::A64
                + &intermediate_direction_4 * Self::A65)
                * state.step_length;

        let intermediate_direction_5 = match Self::compute_direction(context, &next_position)? {
            StepperResult::Ok(direction) => direction,
            StepperResult::Stopped(cause) => return Ok(StepperResult::Stopped(cause)),
        };

        let step_displacement = (&state.direction * Self::A71
            + &intermediate_direction_2 * Self::A73
            + &intermediate_direction_3 * Self::A74
            + &intermediate_direction_4 * Self::A75
            + &intermediate_direction_5 * Self::A76)
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
            intermediate_directions: vec![
                intermediate_direction_1,
                intermediate_direction_2,
                intermediate_direction_3,
                intermediate_direction_4,
                intermediate_direction_5,
            ],
        }))
    }

    fn compute_error_deltas(&self, attempt: &StepAttempt3) -> Vec3<ftr> {
        let state = self.state();
        (&state.direction * Self::E1
            + &attempt.intermediate_directions[1] * Self::E3
            + &attempt.intermediate_directions[2] * Self::E4
            + &attempt.intermediate_directions[3] * Self::E5
            + &attempt.intermediate_directions[4] * Self::E6
            + &attempt.next_direction * Self::E7)
            * state.step_length
    }

    fn compute_dense_interpolation_coefs(&self) -> Vec<Vec3<ftr>> {
        let state = self.state();
        let coef_vec_1 = state.previous_position.to_vec3();
        let coef_vec_2 = state.previous_step_displacement.clone();
        let coef_vec_3 = &state.previous_direction * state.previous_step_length - &coef_vec_2;
        let coef_vec_4 = &coef_vec_2 - &state.direction * state.previous_step_length - &coef_vec_3;
        let coef_vec_5 = (&state.previous_direction * Self::D1
            + &state.intermediate_directions[1] * Self::D3
            + &state.intermediate_directions[2] * Self::D4
            + &state.intermediate_directions[3] * Self::D5
            + &state.intermediate_directions[4] * Self::D6
            + &state.direction * Self::D7)
            * state.previous_step_length;
        vec![coef_vec_1, coef_vec_2, coef_vec_3, coef_vec_4, coef_vec_5]
    }

    fn interpolate_dense_position(&self, coefs: &[Vec3<ftr>], fraction: ftr) -> Point3<ftr> {
        let one_minus_fraction = 1.0 - fraction;
        let mut position = &coefs[3] + &coefs[4] * one_minus_fraction;
        position = &coefs[2] + &position * fraction;
        position = &coefs[1] + &position * one_minus_fraction;
        (&coefs[0] + &position * fraction).to_point3()
    }
}

impl Stepper3 for RKF45Stepper3 {
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

impl RKF45StepperFactory3 {
    /// Creates a new factory for producing steppers with the given configuration parameters.
    pub fn new(config: RKFStepperConfig) -> Self {
        RKF45StepperFactory3 { config }
    }
}

impl StepperFactory3 for RKF45StepperFactory3 {
    type Output = RKF45Stepper3;
    fn produce(&self) -> Self::Output {
        RKF45Stepper3::new(self.config.clone())
    }
}
