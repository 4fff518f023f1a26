// ============================================================
// Layer 6 — Progress Bar
// ============================================================
// Per-batch progress for the train and valid passes, drawn on
// stderr so stdout stays clean for `script` output:
//
//   train [##########>---------] 11/30 acc=0.41

use indicatif::{ProgressBar as Bar, ProgressDrawTarget, ProgressStyle};

const TEMPLATE: &str = "{prefix} [{bar:30}] {pos}/{len} {msg}";

pub struct ProgressBar {
    bar:   Bar,
    total: u64,
}

impl ProgressBar {
    pub fn new(total: usize, name: impl Into<String>) -> Self {
        Self::with_target(total, name, ProgressDrawTarget::stderr())
    }

    /// A bar that tracks position but draws nothing.
    pub fn hidden(total: usize, name: impl Into<String>) -> Self {
        Self::with_target(total, name, ProgressDrawTarget::hidden())
    }

    fn with_target(total: usize, name: impl Into<String>, target: ProgressDrawTarget) -> Self {
        let bar = Bar::with_draw_target(Some(total as u64), target);
        if let Ok(style) = ProgressStyle::with_template(TEMPLATE) {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar.set_prefix(name.into());
        Self { bar, total: total as u64 }
    }

    /// Redraw after batch `index` (0-based) completed.
    pub fn show(&self, index: usize, suffix: &str) {
        self.bar.set_position(index as u64 + 1);
        self.bar.set_message(suffix.to_string());
    }

    /// Jump to 100% with a closing message and keep the line.
    pub fn total(&self, suffix: &str) {
        self.bar.set_position(self.total);
        self.bar.finish_with_message(suffix.to_string());
    }

    #[cfg(test)]
    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracks_batches() {
        let bar = ProgressBar::hidden(4, "valid");
        bar.show(0, "acc=0.50");
        bar.show(1, "acc=0.50");
        assert_eq!(bar.position(), 2);
        bar.total("acc=0.50 loss=1.20");
        assert_eq!(bar.position(), 4);
    }
}
