//! The spherical shell in which field lines are traced.

use crate::{
    geometry::{Point3, Vec3},
    tracing::ftr,
};
use std::fmt;

/// One of the two boundary spheres of the shell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize))]
pub enum Boundary {
    /// The stellar surface at unit radius.
    Inner,
    /// The source surface.
    Outer,
}

/// A spherical shell bounded by the unit sphere and the source surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SphericalShell {
    outer_radius: ftr,
}

impl SphericalShell {
    /// Radius of the inner boundary, in the normalized length unit of the field.
    pub const INNER_RADIUS: ftr = 1.0;

    /// Creates a new shell extending from unit radius out to the given
    /// source surface radius.
    ///
    /// # Panics
    ///
    /// If the source surface radius does not exceed the inner radius.
    pub fn new(source_surface_radius: ftr) -> Self {
        assert!(
            source_surface_radius > Self::INNER_RADIUS,
            "Source surface radius must be larger than {}.",
            Self::INNER_RADIUS
        );
        Self {
            outer_radius: source_surface_radius,
        }
    }

    /// Returns the radius of the inner boundary.
    pub fn inner_radius(&self) -> ftr {
        Self::INNER_RADIUS
    }

    /// Returns the radius of the outer boundary (the source surface).
    pub fn outer_radius(&self) -> ftr {
        self.outer_radius
    }

    /// Returns the radius of the given boundary.
    pub fn boundary_radius(&self, boundary: Boundary) -> ftr {
        match boundary {
            Boundary::Inner => self.inner_radius(),
            Boundary::Outer => self.outer_radius(),
        }
    }

    /// Evaluates the termination event function `(r - 1)(r - rss)`, which is
    /// negative strictly inside the shell and zero on both boundaries.
    pub fn event_function(&self, position: &Point3<ftr>) -> ftr {
        self.event_function_for_radius(position.radius())
    }

    /// Evaluates the termination event function at the given radius.
    pub fn event_function_for_radius(&self, radius: ftr) -> ftr {
        (radius - self.inner_radius()) * (radius - self.outer_radius())
    }

    /// Whether the given position lies strictly between the two boundaries.
    pub fn strictly_contains(&self, position: &Point3<ftr>) -> bool {
        let radius = position.radius();
        radius > self.inner_radius() && radius < self.outer_radius()
    }

    /// Whether the given position lies inside the shell or on one of its boundaries.
    pub fn contains(&self, position: &Point3<ftr>) -> bool {
        let radius = position.radius();
        radius >= self.inner_radius() && radius <= self.outer_radius()
    }

    /// Determines which boundary, if any, the given radius lies on
    /// within the given absolute tolerance.
    pub fn boundary_at_radius(&self, radius: ftr, tolerance: ftr) -> Option<Boundary> {
        if (radius - self.inner_radius()).abs() <= tolerance {
            Some(Boundary::Inner)
        } else if (radius - self.outer_radius()).abs() <= tolerance {
            Some(Boundary::Outer)
        } else {
            None
        }
    }

    /// Returns the boundary whose radius is closest to the given radius.
    pub fn nearest_boundary(&self, radius: ftr) -> Boundary {
        if (radius - self.inner_radius()).abs() <= (radius - self.outer_radius()).abs() {
            Boundary::Inner
        } else {
            Boundary::Outer
        }
    }

    /// Finds where the straight ray from `position` along `velocity` first
    /// meets a boundary sphere, returning the ray parameter and the boundary.
    ///
    /// Only intersections with a parameter in `[0, max_parameter]` are considered.
    pub fn find_ray_exit(
        &self,
        position: &Point3<ftr>,
        velocity: &Vec3<ftr>,
        max_parameter: ftr,
    ) -> Option<(ftr, Boundary)> {
        let a = velocity.squared_length();
        if a == 0.0 {
            return None;
        }
        let start = position.to_vec3();
        let b = 2.0 * start.dot(velocity);
        let start_squared = start.squared_length();

        [Boundary::Inner, Boundary::Outer]
            .iter()
            .filter_map(|&boundary| {
                let radius = self.boundary_radius(boundary);
                let c = start_squared - radius * radius;
                let discriminant = b * b - 4.0 * a * c;
                if discriminant < 0.0 {
                    return None;
                }
                let sqrt_discriminant = discriminant.sqrt();
                [
                    (-b - sqrt_discriminant) / (2.0 * a),
                    (-b + sqrt_discriminant) / (2.0 * a),
                ]
                .iter()
                .copied()
                .filter(|&parameter| parameter >= 0.0 && parameter <= max_parameter)
                .fold(None, |closest: Option<ftr>, parameter| match closest {
                    Some(existing) if existing <= parameter => Some(existing),
                    _ => Some(parameter),
                })
                .map(|parameter| (parameter, boundary))
            })
            .fold(None, |closest, candidate| match closest {
                Some((existing, _)) if existing <= candidate.0 => closest,
                _ => Some(candidate),
            })
    }
}

impl fmt::Display for SphericalShell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "shell [{}, {}]",
            self.inner_radius(),
            self.outer_radius()
        )
    }
}
