//! The `helioline` crate traces magnetic field lines through potential-field
//! source-surface models and classifies them as open or closed.

#[cfg(feature = "cli")]
pub mod cli;
pub mod domain;
pub mod error;
pub mod field;
pub mod geometry;
pub mod io;
pub mod num;
pub mod seeding;
pub mod tracing;
