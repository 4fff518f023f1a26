/// Accuracy accumulated over many batches until explicitly reset.
///
/// The trainer resets it at the start of every training epoch and
/// every validation pass, updates it once per batch, and reads the
/// running value for progress output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamingAccuracy {
    correct: usize,
    total:   usize,
}

impl StreamingAccuracy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one batch of predictions against its labels.
    pub fn update(&mut self, predictions: &[usize], labels: &[usize]) {
        debug_assert_eq!(predictions.len(), labels.len());
        self.correct += predictions.iter().zip(labels).filter(|(p, l)| p == l).count();
        self.total   += predictions.len().min(labels.len());
    }

    /// correct / total so far, 0.0 before the first update.
    pub fn value(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn total(&self) -> usize {
        self.total
    }
}
