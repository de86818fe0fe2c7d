//! Analytic dipole magnetic fields.

use super::{FieldQuery3, FieldSampler3, SamplerError};
use crate::{
    geometry::{Dim3, Point3, Vec3},
    tracing::ftr,
};
use Dim3::Z;

/// An axisymmetric potential dipole field aligned with the z-axis.
///
/// The field derives from the potential `(a r + b / r^2) cos(theta)`, giving
///
/// - `Br = (2 b / r^3 - a) cos(theta)`
/// - `Btheta = (a + b / r^3) sin(theta)`
///
/// The vacuum dipole has `a = 0, b = 1`. With a source surface at `rss`, the
/// potential vanishes there (`a = -b / rss^3`) and `b` is chosen so that the
/// radial field at the unit sphere is still `2 cos(theta)`.
#[derive(Clone, Debug, PartialEq)]
pub struct DipoleField {
    uniform_coef: ftr,
    dipole_coef: ftr,
}

impl DipoleField {
    /// Creates the dipole field of a point dipole in vacuum.
    pub fn vacuum() -> Self {
        Self {
            uniform_coef: 0.0,
            dipole_coef: 1.0,
        }
    }

    /// Creates the potential field source surface solution for a dipolar
    /// boundary field, with a source surface at the given radius.
    pub fn with_source_surface(source_surface_radius: ftr) -> Self {
        assert!(
            source_surface_radius > 1.0,
            "Source surface radius must be larger than 1."
        );
        let inv_rss_cubed = source_surface_radius.powi(-3);
        let dipole_coef = 2.0 / (2.0 + inv_rss_cubed);
        Self {
            uniform_coef: -dipole_coef * inv_rss_cubed,
            dipole_coef,
        }
    }

    /// Computes the radial and colatitudinal field components at the given
    /// radius and colatitude.
    pub fn spherical_components(&self, r: ftr, theta: ftr) -> (ftr, ftr) {
        let inv_r_cubed = r.powi(-3);
        let (sin_theta, cos_theta) = theta.sin_cos();
        (
            (2.0 * self.dipole_coef * inv_r_cubed - self.uniform_coef) * cos_theta,
            (self.uniform_coef + self.dipole_coef * inv_r_cubed) * sin_theta,
        )
    }

    fn evaluate(&self, position: &Point3<ftr>) -> Vec3<ftr> {
        let r_squared = position.to_vec3().squared_length();
        let r = r_squared.sqrt();
        let inv_r_cubed = 1.0 / (r_squared * r);
        let inv_r_fifth = inv_r_cubed / r_squared;

        // b (3 z p / r^5 - z_hat / r^3) - a z_hat
        let mut field_vector =
            position.to_vec3() * (3.0 * self.dipole_coef * position[Z] * inv_r_fifth);
        field_vector[Z] = field_vector[Z] - self.dipole_coef * inv_r_cubed - self.uniform_coef;
        field_vector
    }
}

impl FieldSampler3 for DipoleField {
    fn sample(&self, position: &Point3<ftr>) -> Result<FieldQuery3, SamplerError> {
        if position.radius() == 0.0 {
            Ok(FieldQuery3::Outside)
        } else {
            Ok(FieldQuery3::Inside(self.evaluate(position)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sample_inside(field: &DipoleField, position: &Point3<ftr>) -> Vec3<ftr> {
        match field.sample(position).unwrap() {
            FieldQuery3::Inside(vector) => vector,
            FieldQuery3::Outside => panic!("Dipole should be defined away from the origin"),
        }
    }

    #[test]
    fn vacuum_dipole_matches_boundary_condition() {
        let field = DipoleField::vacuum();
        for &theta in &[0.1, 0.7, 1.5, 2.3, 3.0] {
            let position = Point3::from_spherical(1.0, theta, 0.4);
            let radial = field.sample_radial_component(&position).unwrap().unwrap();
            assert_abs_diff_eq!(radial, 2.0 * ftr::cos(theta), epsilon = 1e-12);
        }
    }

    #[test]
    fn cartesian_field_agrees_with_spherical_components() {
        let field = DipoleField::with_source_surface(2.5);
        let (r, theta, phi) = (1.7, 0.9, 2.1);
        let (radial, colatitudinal) = field.spherical_components(r, theta);
        let expected = Vec3::from_spherical_components(radial, colatitudinal, 0.0, theta, phi);
        let actual = sample_inside(&field, &Point3::from_spherical(r, theta, phi));
        for dim in Dim3::slice() {
            assert_abs_diff_eq!(actual[dim], expected[dim], epsilon = 1e-12);
        }
    }

    #[test]
    fn source_surface_field_is_radial_at_source_surface() {
        let field = DipoleField::with_source_surface(2.5);
        let (radial, colatitudinal) = field.spherical_components(2.5, 0.8);
        assert!(radial > 0.0);
        assert_abs_diff_eq!(colatitudinal, 0.0, epsilon = 1e-14);

        let (radial_at_surface, _) = field.spherical_components(1.0, 0.8);
        assert_abs_diff_eq!(radial_at_surface, 2.0 * ftr::cos(0.8), epsilon = 1e-12);
    }

    #[test]
    fn origin_is_outside_field() {
        assert_eq!(
            DipoleField::vacuum().sample(&Point3::origin()).unwrap(),
            FieldQuery3::Outside
        );
    }
}
