//! Seeding along a meridian at fixed radius.

use super::impl_vec_backed_seeder;
use crate::{geometry::Point3, tracing::ftr};
use std::f64::consts::PI;

/// Generator for 3D seed points evenly spaced in colatitude along a meridian.
#[derive(Clone, Debug)]
pub struct MeridionalSeeder3 {
    seed_points: Vec<Point3<ftr>>,
}

impl MeridionalSeeder3 {
    /// Creates a new seeder producing points at the given radius and longitude,
    /// with colatitudes evenly spaced from `min_colatitude` to `max_colatitude`
    /// (both included).
    ///
    /// A single point is placed at `min_colatitude`.
    ///
    /// # Panics
    ///
    /// If the radius is not positive, if the colatitude range is not inside
    /// [0, π] or is reversed, or if no points are requested.
    pub fn new(
        radius: ftr,
        longitude: ftr,
        min_colatitude: ftr,
        max_colatitude: ftr,
        n_points: usize,
    ) -> Self {
        assert!(radius > 0.0, "Radius must be larger than zero.");
        assert!(
            (0.0..=PI).contains(&min_colatitude) && (0.0..=PI).contains(&max_colatitude),
            "Colatitudes must be in [0, pi]."
        );
        assert!(
            max_colatitude >= min_colatitude,
            "Maximum colatitude must not be smaller than minimum colatitude."
        );
        assert!(n_points > 0, "Number of points must be larger than zero.");

        let spacing = if n_points > 1 {
            (max_colatitude - min_colatitude) / ((n_points - 1) as ftr)
        } else {
            0.0
        };
        let seed_points = (0..n_points)
            .map(|idx| {
                let colatitude = if idx + 1 == n_points && n_points > 1 {
                    max_colatitude
                } else {
                    min_colatitude + spacing * (idx as ftr)
                };
                Point3::from_spherical(radius, colatitude, longitude)
            })
            .collect();
        Self { seed_points }
    }
}

impl_vec_backed_seeder!(MeridionalSeeder3);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seeding::Seeder3;
    use approx::assert_abs_diff_eq;

    #[test]
    fn points_span_the_colatitude_range() {
        let seeder = MeridionalSeeder3::new(1.01, 0.0, 0.1, PI - 0.1, 5);
        assert_eq!(seeder.number_of_points(), 5);
        let points: Vec<_> = seeder.into_iter().collect();
        let colatitudes: Vec<_> = points.iter().map(|p| p.to_spherical().theta).collect();
        assert_abs_diff_eq!(colatitudes[0], 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(colatitudes[2], PI / 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(colatitudes[4], PI - 0.1, epsilon = 1e-12);
        for point in &points {
            assert_abs_diff_eq!(point.radius(), 1.01, epsilon = 1e-12);
        }
    }

    #[test]
    fn single_point_is_at_minimum_colatitude() {
        let points: Vec<_> = MeridionalSeeder3::new(1.5, 0.0, 0.3, 0.6, 1)
            .into_iter()
            .collect();
        assert_eq!(points.len(), 1);
        assert_abs_diff_eq!(points[0].to_spherical().theta, 0.3, epsilon = 1e-12);
    }

    #[test]
    fn retained_points_are_filtered() {
        let mut seeder = MeridionalSeeder3::new(1.5, 0.0, 0.1, PI - 0.1, 9);
        seeder.retain_points(|point| point[crate::geometry::Dim3::Z] > 1e-9);
        assert_eq!(seeder.number_of_points(), 4);
    }

    #[test]
    #[should_panic]
    fn reversed_range_is_rejected() {
        MeridionalSeeder3::new(1.5, 0.0, 1.0, 0.5, 3);
    }
}
