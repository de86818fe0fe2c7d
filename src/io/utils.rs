//! Utilities for input/output.

use super::OverwriteMode;
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;

#[cfg(feature = "json")]
use serde::Serialize;

/// A file that is written to a temporary location and only moved to its
/// target path when writing has completed.
#[derive(Debug)]
pub struct AtomicOutputFile {
    temp_file: NamedTempFile,
    target_path: PathBuf,
}

impl AtomicOutputFile {
    /// Creates a temporary file in the directory of the given target path.
    pub fn new<P: AsRef<Path>>(target_path: P) -> io::Result<Self> {
        let target_path = target_path.as_ref().to_path_buf();
        let directory = match target_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let temp_file = NamedTempFile::new_in(directory)?;
        Ok(Self {
            temp_file,
            target_path,
        })
    }

    /// Returns a mutable reference to the temporary file.
    pub fn file_mut(&mut self) -> &mut fs::File {
        self.temp_file.as_file_mut()
    }

    /// Flushes the temporary file and moves it to the target path,
    /// replacing any existing file there.
    pub fn persist(mut self) -> io::Result<()> {
        self.temp_file.as_file_mut().flush()?;
        self.temp_file
            .persist(&self.target_path)
            .map(|_| ())
            .map_err(|err| err.error)
    }
}

/// Serializes the given data into JSON format and saves it at the given path.
#[cfg(feature = "json")]
pub fn save_data_as_json<P: AsRef<Path>, T: Serialize>(file_path: P, data: &T) -> io::Result<()> {
    let mut output_file = AtomicOutputFile::new(file_path)?;
    write_data_as_json(output_file.file_mut(), data)?;
    output_file.persist()
}

/// Serializes the given data into JSON format and writes it to the given writer.
#[cfg(feature = "json")]
pub fn write_data_as_json<W: Write, T: Serialize>(writer: W, data: &T) -> io::Result<()> {
    let mut writer = io::BufWriter::new(writer);
    serde_json::to_writer(&mut writer, data)?;
    writer.flush()
}

/// Determines whether the file at the given path may be written, asking the
/// user if required.
pub fn check_if_write_allowed<P: AsRef<Path>>(file_path: P, mode: OverwriteMode) -> io::Result<bool> {
    let file_path = file_path.as_ref();
    if !file_path.exists() {
        return Ok(true);
    }
    Ok(match mode {
        OverwriteMode::Always => true,
        OverwriteMode::Never => {
            println!("File {} already exists, skipping", file_path.display());
            false
        }
        OverwriteMode::Ask => {
            print!("File {} already exists, overwrite? [y/N] ", file_path.display());
            io::stdout().flush()?;
            let mut answer = String::new();
            io::stdin().read_line(&mut answer)?;
            matches!(answer.trim(), "y" | "Y" | "yes")
        }
    })
}
