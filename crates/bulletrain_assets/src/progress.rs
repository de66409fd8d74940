//! # Loading Progress
//!
//! The loader narrates what it is doing; a loading screen polls the
//! narration and a step counter that only ever goes up.

use std::fmt::{self, Write};

use parking_lot::Mutex;

/// Longest description kept, in bytes.
pub const MAX_DOING_LEN: usize = 40;

/// A snapshot of the loader's progress.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Progress {
    /// Human-readable description of the current step. Empty when idle.
    pub doing: String,
    /// Number of steps reported since the last reset.
    pub step: u64,
}

/// Shared progress narration, written by the loader and read by the UI.
#[derive(Debug, Default)]
pub struct ProgressReporter {
    state: Mutex<Progress>,
}

impl ProgressReporter {
    /// Creates an idle reporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new step.
    pub fn report(&self, doing: fmt::Arguments<'_>) {
        let mut state = self.state.lock();
        state.doing.clear();
        // Writing into a String cannot fail
        let _ = state.doing.write_fmt(doing);
        truncate_at_boundary(&mut state.doing, MAX_DOING_LEN);
        state.step += 1;
        tracing::debug!(step = state.step, "{}", state.doing);
    }

    /// Clears the description, keeping the counter.
    pub fn finish(&self) {
        self.state.lock().doing.clear();
    }

    /// Resets the counter to zero.
    pub fn reset(&self) {
        self.state.lock().step = 0;
    }

    /// Current description and step count.
    #[must_use]
    pub fn snapshot(&self) -> Progress {
        self.state.lock().clone()
    }
}

fn truncate_at_boundary(s: &mut String, max: usize) {
    if s.len() > max {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s.truncate(end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_and_snapshot() {
        let progress = ProgressReporter::new();
        progress.report(format_args!("Opening up archive {}", "a.tgz"));
        progress.report(format_args!("Reading in archive entry {}", "b.png"));

        let snap = progress.snapshot();
        assert_eq!(snap.doing, "Reading in archive entry b.png");
        assert_eq!(snap.step, 2);

        progress.finish();
        assert_eq!(progress.snapshot().doing, "");
        assert_eq!(progress.snapshot().step, 2);

        progress.reset();
        assert_eq!(progress.snapshot().step, 0);
    }

    #[test]
    fn test_description_is_bounded() {
        let progress = ProgressReporter::new();
        progress.report(format_args!("{}", "x".repeat(100)));
        assert_eq!(progress.snapshot().doing.len(), MAX_DOING_LEN);
    }
}
