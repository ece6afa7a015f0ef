//! Fixed step-decay learning-rate schedule.

use serde::{Deserialize, Serialize};

/// `lr = initial * gamma^(epochs_done / step_size)`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDecay {
    initial:   f64,
    step_size: usize,
    gamma:     f64,
    steps:     usize,
}

impl StepDecay {
    /// `step_size == 0` disables decay.
    pub fn new(initial: f64, step_size: usize, gamma: f64) -> Self {
        Self { initial, step_size, gamma, steps: 0 }
    }

    pub fn current(&self) -> f64 {
        if self.step_size == 0 {
            return self.initial;
        }
        self.initial * self.gamma.powi((self.steps / self.step_size) as i32)
    }

    /// Advance by one epoch and return the new rate.
    pub fn step(&mut self) -> f64 {
        self.steps += 1;
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decays_every_step_size_epochs() {
        let mut s = StepDecay::new(1e-3, 2, 0.1);
        assert_eq!(s.current(), 1e-3);
        assert_eq!(s.step(), 1e-3);
        assert!((s.step() - 1e-4).abs() < 1e-12);
        s.step();
        assert!((s.step() - 1e-5).abs() < 1e-12);
    }

    #[test]
    fn test_zero_step_size_is_constant() {
        let mut s = StepDecay::new(0.01, 0, 0.1);
        s.step();
        s.step();
        assert_eq!(s.current(), 0.01);
    }
}
