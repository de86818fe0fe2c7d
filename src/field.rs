//! Magnetic fields that can be sampled by the field line tracer.

pub mod dipole;
pub mod gridded;

use crate::{
    geometry::{Point3, Vec3},
    tracing::ftr,
};
use std::sync::Arc;
use thiserror::Error;

/// The result of sampling a field at a position.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldQuery3 {
    /// The position is inside the valid region and this is the field vector there.
    Inside(Vec3<ftr>),
    /// The position is outside the region where the field is defined.
    Outside,
}

/// Failure of a field sampler to produce a value at a position
/// inside its valid region.
#[derive(Clone, Debug, PartialEq, Error)]
#[error("Could not sample field at {position}: {reason}")]
pub struct SamplerError {
    /// Position where sampling was attempted.
    pub position: Point3<ftr>,
    /// Description of what went wrong.
    pub reason: String,
}

impl SamplerError {
    /// Creates a new sampler error for the given position.
    pub fn new<S: Into<String>>(position: &Point3<ftr>, reason: S) -> Self {
        Self {
            position: position.clone(),
            reason: reason.into(),
        }
    }
}

/// Defines the properties of a continuous 3D vector field.
///
/// Implementations must be safe to sample from many threads at once.
pub trait FieldSampler3: Sync {
    /// Evaluates the field at the given Cartesian position.
    ///
    /// # Returns
    ///
    /// A `Result` which is either:
    ///
    /// - `Ok`: Contains a `FieldQuery3` with the field vector, or `Outside`
    /// if the position is not in the region where the field is defined.
    /// - `Err`: Contains a `SamplerError` if evaluation failed.
    fn sample(&self, position: &Point3<ftr>) -> Result<FieldQuery3, SamplerError>;

    /// Evaluates the radial component of the field at the given position,
    /// or `None` if the position is outside the field.
    fn sample_radial_component(&self, position: &Point3<ftr>) -> Result<Option<ftr>, SamplerError> {
        let radius = position.radius();
        if radius == 0.0 {
            return Ok(None);
        }
        Ok(match self.sample(position)? {
            FieldQuery3::Inside(field_vector) => {
                Some(field_vector.dot(&position.to_vec3()) / radius)
            }
            FieldQuery3::Outside => None,
        })
    }
}

impl<S: FieldSampler3 + ?Sized> FieldSampler3 for &S {
    fn sample(&self, position: &Point3<ftr>) -> Result<FieldQuery3, SamplerError> {
        (**self).sample(position)
    }
}

impl<S: FieldSampler3 + ?Sized + Send> FieldSampler3 for Box<S> {
    fn sample(&self, position: &Point3<ftr>) -> Result<FieldQuery3, SamplerError> {
        (**self).sample(position)
    }
}

impl<S: FieldSampler3 + ?Sized + Send> FieldSampler3 for Arc<S> {
    fn sample(&self, position: &Point3<ftr>) -> Result<FieldQuery3, SamplerError> {
        (**self).sample(position)
    }
}

/// Boxed field sampler for use with dynamic dispatch.
pub type DynFieldSampler3 = Box<dyn FieldSampler3 + Send>;

/// Wraps a field sampler so that it returns unit vectors along the field.
///
/// Integrating the wrapped field makes integration time equal to arc length.
/// A vanishing field vector is passed through unchanged, so that the stepper
/// can recognize the null.
#[derive(Clone, Debug)]
pub struct UnitTangentField<S> {
    field: S,
}

impl<S: FieldSampler3> UnitTangentField<S> {
    /// Creates a new unit tangent wrapper around the given field.
    pub fn new(field: S) -> Self {
        Self { field }
    }
}

impl<S: FieldSampler3> FieldSampler3 for UnitTangentField<S> {
    fn sample(&self, position: &Point3<ftr>) -> Result<FieldQuery3, SamplerError> {
        match self.field.sample(position)? {
            FieldQuery3::Inside(mut field_vector) => {
                if !field_vector.is_finite() {
                    return Err(SamplerError::new(position, "field vector is not finite"));
                }
                if !field_vector.is_zero() {
                    field_vector.normalize();
                }
                Ok(FieldQuery3::Inside(field_vector))
            }
            FieldQuery3::Outside => Ok(FieldQuery3::Outside),
        }
    }

    fn sample_radial_component(&self, position: &Point3<ftr>) -> Result<Option<ftr>, SamplerError> {
        self.field.sample_radial_component(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    struct ConstantField(Vec3<ftr>);

    impl FieldSampler3 for ConstantField {
        fn sample(&self, _position: &Point3<ftr>) -> Result<FieldQuery3, SamplerError> {
            Ok(FieldQuery3::Inside(self.0.clone()))
        }
    }

    #[test]
    fn unit_tangent_field_has_unit_length() {
        let field = UnitTangentField::new(ConstantField(Vec3::new(3.0, 0.0, 4.0)));
        match field.sample(&Point3::new(1.0, 1.0, 1.0)).unwrap() {
            FieldQuery3::Inside(direction) => {
                assert_abs_diff_eq!(direction.length(), 1.0, epsilon = 1e-12);
                assert_abs_diff_eq!(direction[crate::geometry::Dim3::X], 0.6, epsilon = 1e-12);
            }
            FieldQuery3::Outside => panic!("Constant field should be defined everywhere"),
        }
    }

    #[test]
    fn unit_tangent_field_keeps_nulls() {
        let field = UnitTangentField::new(ConstantField(Vec3::zero()));
        assert_eq!(
            field.sample(&Point3::new(1.0, 0.0, 0.0)).unwrap(),
            FieldQuery3::Inside(Vec3::zero())
        );
    }

    #[test]
    fn non_finite_field_is_a_sampler_error() {
        let field = UnitTangentField::new(ConstantField(Vec3::new(ftr::NAN, 0.0, 0.0)));
        assert!(field.sample(&Point3::new(1.0, 0.0, 0.0)).is_err());
    }

    #[test]
    fn radial_component_is_projection_on_position() {
        let field = ConstantField(Vec3::new(0.0, 2.0, 0.0));
        let radial = field
            .sample_radial_component(&Point3::new(0.0, -3.0, 0.0))
            .unwrap()
            .unwrap();
        assert_abs_diff_eq!(radial, -2.0, epsilon = 1e-12);
    }
}
