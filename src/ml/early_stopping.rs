//! Patience-based early stopping on the validation loss.

/// Validation loss must drop by more than this to count as progress.
pub const MIN_IMPROVEMENT: f64 = 0.001;

/// Where the training controller is after observing an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingState {
    Running,
    Improved,
    Stagnant,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience:        usize,
    best_loss:       f64,
    stagnant_epochs: usize,
}

impl EarlyStopping {
    pub fn new(patience: usize) -> Self {
        Self { patience, best_loss: f64::INFINITY, stagnant_epochs: 0 }
    }

    /// Record one epoch's validation loss.
    ///
    /// Improved iff `val_loss < best_loss - MIN_IMPROVEMENT`; a NaN
    /// loss never improves.
    pub fn observe(&mut self, val_loss: f64) -> TrainingState {
        if val_loss < self.best_loss - MIN_IMPROVEMENT {
            self.best_loss       = val_loss;
            self.stagnant_epochs = 0;
            TrainingState::Improved
        } else {
            self.stagnant_epochs += 1;
            if self.is_exhausted() {
                TrainingState::Stopped
            } else {
                TrainingState::Stagnant
            }
        }
    }

    /// True once `patience` consecutive epochs failed to improve.
    /// With `patience == 0` this holds after the very first epoch.
    pub fn is_exhausted(&self) -> bool {
        self.stagnant_epochs >= self.patience
    }

    pub fn best_loss(&self) -> f64 {
        self.best_loss
    }

    pub fn stagnant_epochs(&self) -> usize {
        self.stagnant_epochs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_finite_loss_improves() {
        let mut es = EarlyStopping::new(3);
        assert_eq!(es.observe(2.5), TrainingState::Improved);
        assert_eq!(es.best_loss(), 2.5);
    }

    #[test]
    fn test_improvement_needs_margin() {
        let mut es = EarlyStopping::new(3);
        es.observe(1.0);
        // 0.9995 is within the 0.001 margin
        assert_eq!(es.observe(0.9995), TrainingState::Stagnant);
        assert_eq!(es.best_loss(), 1.0);
        assert_eq!(es.observe(0.998), TrainingState::Improved);
        assert_eq!(es.stagnant_epochs(), 0);
    }

    #[test]
    fn test_stops_exactly_at_patience() {
        let mut es = EarlyStopping::new(3);
        es.observe(1.0);
        assert_eq!(es.observe(1.0), TrainingState::Stagnant);
        assert_eq!(es.observe(1.2), TrainingState::Stagnant);
        assert!(!es.is_exhausted());
        assert_eq!(es.observe(1.0), TrainingState::Stopped);
        assert!(es.is_exhausted());
    }

    #[test]
    fn test_improvement_resets_counter() {
        let mut es = EarlyStopping::new(2);
        es.observe(1.0);
        es.observe(1.0);
        es.observe(0.5);
        assert_eq!(es.observe(0.5), TrainingState::Stagnant);
    }

    #[test]
    fn test_nan_never_improves() {
        let mut es = EarlyStopping::new(1);
        assert_eq!(es.observe(f64::NAN), TrainingState::Stopped);
    }
}
