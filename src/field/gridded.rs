//! Magnetic fields sampled on a regular spherical grid.

use super::{FieldQuery3, FieldSampler3, SamplerError};
use crate::{
    geometry::{Dim3, In3D, Point3, Vec3},
    tracing::ftr,
};
use ndarray::Array3;
use std::f64::consts::TAU;
use Dim3::{X, Y, Z};

/// Relative distance outside a boundary sphere within which positions still
/// count as lying on it, absorbing rounding in spherical coordinate conversions.
const BOUNDARY_ROUNDING_TOLERANCE: ftr = 4.0 * ftr::EPSILON;

/// A vector field given by its spherical components at the nodes of a regular
/// grid in longitude `phi`, cosine of colatitude `s` and logarithmic radius `rho`.
///
/// The grid covers `phi` in `[0, 2π)` periodically with `nphi` nodes spaced
/// `2π / nphi` apart, `s` in `[-1, 1]` with `ns` nodes including both
/// poles, and `rho` in `[0, ln(rss)]` with `nrho` nodes including both
/// boundaries. Values between nodes are trilinearly interpolated in
/// `(phi, s, rho)`.
#[derive(Clone, Debug)]
pub struct GriddedField {
    source_surface_radius: ftr,
    shape: In3D<usize>,
    radial: Array3<ftr>,
    colatitudinal: Array3<ftr>,
    longitudinal: Array3<ftr>,
}

#[derive(Clone, Copy, Debug)]
struct InterpolationCell {
    lower: [usize; 3],
    upper: [usize; 3],
    weights: [ftr; 3],
}

impl GriddedField {
    /// Creates a new gridded field from arrays of the radial, colatitudinal and
    /// longitudinal field components, each indexed as `[phi, s, rho]`.
    ///
    /// # Panics
    ///
    /// If the arrays do not share the same shape, if the grid has fewer than one
    /// longitude or two nodes in `s` or `rho`, or if the source surface radius
    /// does not exceed 1.
    pub fn new(
        source_surface_radius: ftr,
        radial: Array3<ftr>,
        colatitudinal: Array3<ftr>,
        longitudinal: Array3<ftr>,
    ) -> Self {
        assert!(
            source_surface_radius > 1.0,
            "Source surface radius must be larger than 1."
        );
        assert_eq!(
            radial.shape(),
            colatitudinal.shape(),
            "Field component arrays must have equal shapes."
        );
        assert_eq!(
            radial.shape(),
            longitudinal.shape(),
            "Field component arrays must have equal shapes."
        );
        let dims = radial.dim();
        let shape = In3D::new(dims.0, dims.1, dims.2);
        assert!(shape[X] >= 1, "Grid must have at least one longitude.");
        assert!(
            shape[Y] >= 2 && shape[Z] >= 2,
            "Grid must have at least two nodes in s and rho."
        );
        Self {
            source_surface_radius,
            shape,
            radial,
            colatitudinal,
            longitudinal,
        }
    }

    /// Creates a new gridded field by evaluating the given function of
    /// `(r, theta, phi)` returning `(Br, Btheta, Bphi)` at every grid node.
    pub fn from_spherical_fn<C>(
        source_surface_radius: ftr,
        shape: In3D<usize>,
        evaluate_components: C,
    ) -> Self
    where
        C: Fn(ftr, ftr, ftr) -> (ftr, ftr, ftr),
    {
        let log_rss = source_surface_radius.ln();
        let dims = (shape[X], shape[Y], shape[Z]);
        let mut radial = Array3::zeros(dims);
        let mut colatitudinal = Array3::zeros(dims);
        let mut longitudinal = Array3::zeros(dims);

        for i in 0..shape[X] {
            let phi = TAU * (i as ftr) / (shape[X] as ftr);
            for j in 0..shape[Y] {
                let s = -1.0 + 2.0 * (j as ftr) / ((shape[Y] - 1) as ftr);
                let theta = s.clamp(-1.0, 1.0).acos();
                for k in 0..shape[Z] {
                    let r = (log_rss * (k as ftr) / ((shape[Z] - 1) as ftr)).exp();
                    let (br, btheta, bphi) = evaluate_components(r, theta, phi);
                    radial[[i, j, k]] = br;
                    colatitudinal[[i, j, k]] = btheta;
                    longitudinal[[i, j, k]] = bphi;
                }
            }
        }
        Self::new(source_surface_radius, radial, colatitudinal, longitudinal)
    }

    /// Returns the number of grid nodes along `phi`, `s` and `rho`.
    pub fn shape(&self) -> &In3D<usize> {
        &self.shape
    }

    /// Returns the radius of the outer boundary of the grid.
    pub fn source_surface_radius(&self) -> ftr {
        self.source_surface_radius
    }

    fn locate(&self, phi: ftr, s: ftr, rho: ftr) -> InterpolationCell {
        let n_phi = self.shape[X];
        let phi_coord = (phi / TAU).rem_euclid(1.0) * (n_phi as ftr);
        let phi_lower = (phi_coord.floor() as usize) % n_phi;
        let phi_upper = (phi_lower + 1) % n_phi;
        let phi_weight = phi_coord - phi_coord.floor();

        let (s_lower, s_weight) = Self::locate_bounded(
            (s + 1.0) * 0.5 * ((self.shape[Y] - 1) as ftr),
            self.shape[Y],
        );
        let (rho_lower, rho_weight) = Self::locate_bounded(
            rho / self.source_surface_radius.ln() * ((self.shape[Z] - 1) as ftr),
            self.shape[Z],
        );

        InterpolationCell {
            lower: [phi_lower, s_lower, rho_lower],
            upper: [phi_upper, s_lower + 1, rho_lower + 1],
            weights: [phi_weight, s_weight, rho_weight],
        }
    }

    fn locate_bounded(coord: ftr, n_nodes: usize) -> (usize, ftr) {
        let max_lower = n_nodes - 2;
        let clamped = coord.clamp(0.0, (n_nodes - 1) as ftr);
        let lower = usize::min(clamped.floor() as usize, max_lower);
        (lower, clamped - lower as ftr)
    }

    fn interpolate(values: &Array3<ftr>, cell: &InterpolationCell) -> ftr {
        let [wx, wy, wz] = cell.weights;
        let mut result = 0.0;
        for (ix, fx) in [(cell.lower[0], 1.0 - wx), (cell.upper[0], wx)] {
            for (iy, fy) in [(cell.lower[1], 1.0 - wy), (cell.upper[1], wy)] {
                for (iz, fz) in [(cell.lower[2], 1.0 - wz), (cell.upper[2], wz)] {
                    result += fx * fy * fz * values[[ix, iy, iz]];
                }
            }
        }
        result
    }
}

impl FieldSampler3 for GriddedField {
    fn sample(&self, position: &Point3<ftr>) -> Result<FieldQuery3, SamplerError> {
        let coords = position.to_spherical();
        if coords.r < 1.0 - BOUNDARY_ROUNDING_TOLERANCE
            || coords.r > self.source_surface_radius * (1.0 + BOUNDARY_ROUNDING_TOLERANCE)
        {
            return Ok(FieldQuery3::Outside);
        }
        let s = position[Z] / coords.r;
        let cell = self.locate(coords.phi, s, coords.r.ln());

        let radial = Self::interpolate(&self.radial, &cell);
        let colatitudinal = Self::interpolate(&self.colatitudinal, &cell);
        let longitudinal = Self::interpolate(&self.longitudinal, &cell);

        let field_vector = Vec3::from_spherical_components(
            radial,
            colatitudinal,
            longitudinal,
            coords.theta,
            coords.phi,
        );
        if field_vector.is_finite() {
            Ok(FieldQuery3::Inside(field_vector))
        } else {
            Err(SamplerError::new(
                position,
                "interpolated field vector is not finite",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::dipole::DipoleField;
    use approx::assert_abs_diff_eq;

    fn gridded_dipole(source_surface_radius: ftr) -> GriddedField {
        let dipole = DipoleField::with_source_surface(source_surface_radius);
        GriddedField::from_spherical_fn(
            source_surface_radius,
            In3D::new(36, 91, 41),
            |r, theta, _| {
                let (br, btheta) = dipole.spherical_components(r, theta);
                (br, btheta, 0.0)
            },
        )
    }

    #[test]
    fn gridded_field_reproduces_node_values() {
        let field = gridded_dipole(2.5);
        let dipole = DipoleField::with_source_surface(2.5);
        // s = 1/3 (node 60 of 91) at rho = 0 and phi = 0 is a grid node.
        let theta = (1.0 / 3.0 as ftr).acos();
        let position = Point3::from_spherical(1.0, theta, 0.0);
        let radial = field.sample_radial_component(&position).unwrap().unwrap();
        let (expected, _) = dipole.spherical_components(1.0, theta);
        assert_abs_diff_eq!(radial, expected, epsilon = 1e-9);
    }

    #[test]
    fn gridded_field_approximates_analytic_field() {
        let field = gridded_dipole(2.5);
        let dipole = DipoleField::with_source_surface(2.5);
        let position = Point3::from_spherical(1.63, 0.77, 1.3);
        let gridded = match field.sample(&position).unwrap() {
            FieldQuery3::Inside(vector) => vector,
            FieldQuery3::Outside => panic!("Position should be inside the grid"),
        };
        let analytic = match dipole.sample(&position).unwrap() {
            FieldQuery3::Inside(vector) => vector,
            FieldQuery3::Outside => panic!("Dipole should be defined here"),
        };
        for dim in Dim3::slice() {
            assert_abs_diff_eq!(gridded[dim], analytic[dim], epsilon = 5e-3);
        }
    }

    #[test]
    fn gridded_field_wraps_longitude() {
        let field = GriddedField::from_spherical_fn(2.0, In3D::new(8, 5, 5), |_, _, phi| {
            (1.0 + phi.sin(), 0.0, 0.0)
        });
        let just_below = Point3::from_spherical(1.5, 1.0, TAU - 1e-9);
        let just_above = Point3::from_spherical(1.5, 1.0, 1e-9);
        let below = field.sample_radial_component(&just_below).unwrap().unwrap();
        let above = field.sample_radial_component(&just_above).unwrap().unwrap();
        assert_abs_diff_eq!(below, above, epsilon = 1e-6);
    }

    #[test]
    fn positions_on_boundary_spheres_are_inside_grid() {
        let field = gridded_dipole(2.5);
        for colatitude in [0.1, 0.7, 1.3, 2.0, 2.9] {
            for &radius in &[1.0, 2.5] {
                let position = Point3::from_spherical(radius, colatitude, 0.4);
                assert!(
                    matches!(field.sample(&position).unwrap(), FieldQuery3::Inside(_)),
                    "Position at radius {:e} should be inside the grid",
                    position.radius()
                );
            }
        }
    }

    #[test]
    fn positions_outside_shell_are_outside_grid() {
        let field = gridded_dipole(2.5);
        assert_eq!(
            field.sample(&Point3::new(0.0, 0.0, 0.99)).unwrap(),
            FieldQuery3::Outside
        );
        assert_eq!(
            field.sample(&Point3::new(2.51, 0.0, 0.0)).unwrap(),
            FieldQuery3::Outside
        );
        assert!(matches!(
            field.sample(&Point3::new(0.0, 0.0, 2.5)).unwrap(),
            FieldQuery3::Inside(_)
        ));
    }
}
