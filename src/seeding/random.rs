//! Seeding with random points in a spherical shell.

use super::impl_vec_backed_seeder;
use crate::{geometry::Point3, tracing::ftr};
use rand::{
    distributions::{Distribution, Uniform},
    rngs::StdRng,
    SeedableRng,
};
use std::f64::consts::TAU;

/// Generator for 3D seed points distributed uniformly in volume between
/// two radii.
#[derive(Clone, Debug)]
pub struct RandomShellSeeder3 {
    seed_points: Vec<Point3<ftr>>,
}

impl RandomShellSeeder3 {
    /// Creates a new seeder producing the given number of random points
    /// in the shell between `min_radius` and `max_radius`.
    ///
    /// The same `rng_seed` always gives the same points.
    ///
    /// # Panics
    ///
    /// If `min_radius` is not positive or exceeds `max_radius`.
    pub fn new(min_radius: ftr, max_radius: ftr, n_points: usize, rng_seed: u64) -> Self {
        assert!(min_radius > 0.0, "Minimum radius must be larger than zero.");
        assert!(
            max_radius >= min_radius,
            "Maximum radius must not be smaller than minimum radius."
        );

        let mut rng = StdRng::seed_from_u64(rng_seed);
        let cubed_radius_distr =
            Uniform::new_inclusive(min_radius.powi(3), max_radius.powi(3));
        let cos_colatitude_distr = Uniform::new_inclusive(-1.0, 1.0);
        let longitude_distr = Uniform::new(0.0, TAU);

        let seed_points = (0..n_points)
            .map(|_| {
                let radius = ftr::cbrt(cubed_radius_distr.sample(&mut rng))
                    .clamp(min_radius, max_radius);
                let colatitude = ftr::acos(cos_colatitude_distr.sample(&mut rng));
                let longitude = longitude_distr.sample(&mut rng);
                Point3::from_spherical(radius, colatitude, longitude)
            })
            .collect();
        Self { seed_points }
    }
}

impl_vec_backed_seeder!(RandomShellSeeder3);
