//! Input/output.

pub mod utils;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// How much information to print while working.
#[derive(Clone, Debug)]
pub enum Verbosity {
    Quiet,
    Messages,
    Progress(ProgressStyle),
}

impl Verbosity {
    /// Whether informative messages should be printed.
    pub fn print_messages(&self) -> bool {
        !matches!(self, Self::Quiet)
    }

    /// Creates a progress bar for the given number of work items, which is
    /// hidden unless progress should be shown.
    pub fn create_progress_bar(&self, n_items: usize) -> ProgressBar {
        match self {
            Self::Progress(style) => {
                let progress_bar = ProgressBar::new(n_items as u64);
                progress_bar.set_style(style.clone());
                progress_bar.set_draw_target(ProgressDrawTarget::stderr());
                progress_bar
            }
            _ => ProgressBar::hidden(),
        }
    }
}

/// How to handle existing files when writing output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverwriteMode {
    Ask,
    Always,
    Never,
}
