// ============================================================
// Layer 5 — Loss History and Early Stopping
// ============================================================
// One training loss and one validation loss per completed epoch.
// The history only grows. Early stopping is recomputed from the
// full validation history after every epoch:
//
//   m    = index of the lowest validation loss (first one on ties)
//   stop = m + patience < epochs
//
// i.e. more than `patience` epochs have passed since the best
// value, so with patience 4 the run ends on the fourth epoch in a
// row that fails to beat it.

/// Per-epoch training and validation losses.
#[derive(Debug, Clone, Default)]
pub struct History {
    train: Vec<f64>,
    valid: Vec<f64>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_train(&mut self, loss: f64) {
        self.train.push(loss);
    }

    pub fn push_valid(&mut self, loss: f64) {
        self.valid.push(loss);
    }

    pub fn train(&self) -> &[f64] {
        &self.train
    }

    pub fn valid(&self) -> &[f64] {
        &self.valid
    }

    /// Both sides have seen the same number of epochs.
    pub fn is_balanced(&self) -> bool {
        self.train.len() == self.valid.len()
    }

    /// Index and value of the lowest validation loss so far.
    /// Ties keep the earliest epoch.
    pub fn best_valid(&self) -> Option<(usize, f64)> {
        self.valid
            .iter()
            .copied()
            .enumerate()
            .fold(None, |best, (i, loss)| match best {
                Some((_, b)) if loss >= b => best,
                _ => Some((i, loss)),
            })
    }

    pub fn should_stop(&self, patience: usize) -> bool {
        match self.best_valid() {
            Some((best, _)) => best + patience < self.valid.len(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_until_stop(valid_losses: &[f64], patience: usize) -> Option<usize> {
        let mut history = History::new();
        for (epoch, &loss) in valid_losses.iter().enumerate() {
            history.push_train(loss);
            history.push_valid(loss);
            if history.should_stop(patience) {
                return Some(epoch);
            }
        }
        None
    }

    #[test]
    fn test_stops_after_patience_epochs_without_improvement() {
        // min at index 1; after 8 only three epochs have failed to beat it
        assert_eq!(run_until_stop(&[5.0, 4.0, 6.0, 7.0, 8.0], 4), None);
        // the fourth stale epoch ends training: 1 + 4 < 6
        assert_eq!(run_until_stop(&[5.0, 4.0, 6.0, 7.0, 8.0, 9.0], 4), Some(5));
    }

    #[test]
    fn test_zero_patience_stops_after_first_epoch() {
        assert_eq!(run_until_stop(&[3.0, 2.0], 0), Some(0));
    }

    #[test]
    fn test_keeps_going_while_improving() {
        assert_eq!(run_until_stop(&[5.0, 4.0, 6.0, 7.0, 3.9, 8.0, 9.0], 4), None);
    }

    #[test]
    fn test_ties_resolve_to_first_minimum() {
        let mut h = History::new();
        for loss in [2.0, 1.0, 1.0, 1.0] {
            h.push_valid(loss);
        }
        assert_eq!(h.best_valid(), Some((1, 1.0)));
        assert!(!h.should_stop(3));
        h.push_valid(1.0);
        assert!(h.should_stop(3));
    }

    #[test]
    fn test_empty_history_never_stops() {
        assert!(!History::new().should_stop(0));
        assert_eq!(History::new().best_valid(), None);
    }

    #[test]
    fn test_balance() {
        let mut h = History::new();
        h.push_train(1.0);
        assert!(!h.is_balanced());
        h.push_valid(1.0);
        assert!(h.is_balanced());
    }
}
