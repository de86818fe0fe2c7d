#![allow(dead_code)]

use helioline::{cli, exit_on_error, tracing::ftr};
use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};
use tempfile::TempDir;

#[macro_export]
macro_rules! path_str {
    ($path:expr) => {
        $path.to_string_lossy().as_ref()
    };
}

pub fn run<I, T>(args: I)
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let arguments = std::iter::once(OsString::from("helioline"))
        .chain(args.into_iter().map(Into::into));
    cli::run::run_with_args(cli::build::build().get_matches_from(arguments));
}

pub fn assert_file_exists<P: AsRef<Path>>(file_path: P) {
    let file_path = file_path.as_ref();
    assert!(
        file_path.exists(),
        "File {} does not exist",
        file_path.to_string_lossy()
    );
}

/// One row of a field line CSV file.
#[derive(Clone, Debug, PartialEq)]
pub struct CsvRow {
    pub line_index: usize,
    pub polarity: i8,
    pub position: [ftr; 3],
}

pub fn read_csv_rows<P: AsRef<Path>>(file_path: P) -> Vec<CsvRow> {
    let text = exit_on_error!(
        fs::read_to_string(file_path.as_ref()),
        "Error: Could not read CSV file: {}"
    );
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("line_index,polarity,x,y,z"));
    lines
        .map(|line| {
            let fields: Vec<_> = line.split(',').collect();
            assert_eq!(fields.len(), 5, "Malformed CSV row: {}", line);
            CsvRow {
                line_index: fields[0].parse().unwrap(),
                polarity: fields[1].parse().unwrap(),
                position: [
                    fields[2].parse().unwrap(),
                    fields[3].parse().unwrap(),
                    fields[4].parse().unwrap(),
                ],
            }
        })
        .collect()
}

/// Returns the polarity of each distinct line in the CSV rows, in line order.
pub fn line_polarities(rows: &[CsvRow]) -> Vec<(usize, i8)> {
    let mut polarities: Vec<(usize, i8)> = Vec::new();
    for row in rows {
        if polarities.last().map(|&(index, _)| index) != Some(row.line_index) {
            polarities.push((row.line_index, row.polarity));
        }
    }
    polarities
}

#[derive(Debug)]
pub struct Test {
    output_dir: TempDir,
}

impl Test {
    pub fn new() -> Self {
        let output_dir = exit_on_error!(
            tempfile::tempdir(),
            "Error: Could not prepare output directory for test: {}"
        );
        Self { output_dir }
    }

    pub fn output_path<S: AsRef<str>>(&self, file_name: S) -> PathBuf {
        self.output_dir.path().join(file_name.as_ref())
    }

    pub fn write_input<S: AsRef<str>>(&self, file_name: S, content: &str) -> PathBuf {
        let file_path = self.output_path(file_name);
        exit_on_error!(
            fs::write(&file_path, content),
            "Error: Could not write test input file: {}"
        );
        file_path
    }
}
