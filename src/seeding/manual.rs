//! Reading seed points from an input file.

use super::impl_vec_backed_seeder;
use crate::{geometry::Point3, tracing::ftr};
use std::{
    fs,
    io::{self, BufRead},
    path::Path,
};

/// Generator for 3D seed points read from an input file.
#[derive(Clone, Debug)]
pub struct ManualSeeder3 {
    seed_points: Vec<Point3<ftr>>,
}

impl ManualSeeder3 {
    /// Creates a new seeder producing 3D seed points read from an input file.
    ///
    /// The input file is assumed to be in CSV format, with each line consisting
    /// of the three comma-separated Cartesian coordinates of a single seed point.
    /// Empty lines and lines starting with `#` are ignored.
    ///
    /// # Parameters
    ///
    /// - `input_file_path`: Path to the input file.
    ///
    /// # Returns
    ///
    /// A `Result` which is either:
    ///
    /// - `Ok`: Contains a new `ManualSeeder3`.
    /// - `Err`: Contains an error encountered while trying to open or parse the input file.
    pub fn new<P: AsRef<Path>>(input_file_path: P) -> io::Result<Self> {
        let input_file_path = input_file_path.as_ref();
        let file = fs::File::open(input_file_path).map_err(|err| {
            io::Error::new(
                err.kind(),
                format!(
                    "Could not open {}: {}",
                    input_file_path.display(),
                    err
                ),
            )
        })?;
        Self::from_reader(io::BufReader::new(file))
    }

    /// Creates a new seeder from CSV lines provided by the given reader.
    pub fn from_reader<R: BufRead>(reader: R) -> io::Result<Self> {
        let seed_points = reader
            .lines()
            .filter_map(|line_result| match line_result {
                Ok(line) => {
                    let trimmed_line = line.trim();
                    if trimmed_line.is_empty() || trimmed_line.starts_with('#') {
                        None
                    } else {
                        Some(parse_seed_point(trimmed_line))
                    }
                }
                Err(err) => Some(Err(err)),
            })
            .collect::<io::Result<Vec<_>>>()?;
        Ok(Self { seed_points })
    }
}

fn parse_seed_point(line: &str) -> io::Result<Point3<ftr>> {
    let coords = line
        .split(',')
        .map(|coord_str| {
            coord_str.trim().parse::<ftr>().map_err(|err| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "Failed parsing coordinate string {} in input file: {}",
                        coord_str, err
                    ),
                )
            })
        })
        .collect::<io::Result<Vec<ftr>>>()?;
    if coords.len() == 3 {
        Ok(Point3::with_each_component(|dim| coords[dim.num()]))
    } else {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "Expected three coordinates in input file line, found {}: {}",
                coords.len(),
                line
            ),
        ))
    }
}

impl_vec_backed_seeder!(ManualSeeder3);
