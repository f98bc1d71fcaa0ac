// ============================================================
// Layer 5 — Warm-up Learning Rate Scheduler
// ============================================================
// The inverse-square-root schedule from "Attention Is All You
// Need", scaled by an initial learning rate:
//
//   lr(step) = init_lr · d_model^-0.5 · min(step^-0.5, step · warmup^-1.5)
//
// The rate rises linearly for `warmup_steps` steps, peaks at
// step == warmup_steps, then decays with 1/√step.
//
// Reference: Vaswani et al. (2017) §5.3

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmUpScheduler {
    pub init_lr:      f64,
    pub d_model:      usize,
    pub warmup_steps: usize,
    steps:            usize,
}

impl WarmUpScheduler {
    pub fn new(init_lr: f64, d_model: usize, warmup_steps: usize) -> Self {
        Self { init_lr, d_model, warmup_steps, steps: 0 }
    }

    /// Advance one optimisation step and return the new rate.
    pub fn step(&mut self) -> f64 {
        self.steps += 1;
        self.lr()
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Current rate; 0 before the first step.
    pub fn lr(&self) -> f64 {
        self.init_lr * self.lr_scale()
    }

    fn lr_scale(&self) -> f64 {
        if self.steps == 0 || self.d_model == 0 || self.warmup_steps == 0 {
            return 0.0;
        }
        let step   = self.steps as f64;
        let warmup = self.warmup_steps as f64;
        (self.d_model as f64).powf(-0.5) * step.powf(-0.5).min(step * warmup.powf(-1.5))
    }

    /// The next `n` rates, advancing the scheduler.
    pub fn schedule(&mut self, n: usize) -> Vec<f64> {
        (0..n).map(|_| self.step()).collect()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_before_first_step() {
        let s = WarmUpScheduler::new(0.3, 512, 100);
        assert_eq!(s.lr(), 0.0);
    }

    #[test]
    fn test_linear_warmup_then_decay() {
        let mut s = WarmUpScheduler::new(1.0, 512, 4);
        let lrs   = s.schedule(8);

        // warm-up: proportional to the step
        assert!((lrs[1] - 2.0 * lrs[0]).abs() < 1e-12);
        assert!((lrs[3] - 4.0 * lrs[0]).abs() < 1e-12);
        // peak at the warm-up boundary, decaying afterwards
        let peak = lrs.iter().cloned().fold(f64::MIN, f64::max);
        assert_eq!(peak, lrs[3]);
        assert!(lrs[7] < lrs[4]);
    }

    #[test]
    fn test_peak_value_matches_formula() {
        let mut s = WarmUpScheduler::new(0.5, 256, 16);
        let lrs   = s.schedule(16);
        let expected = 0.5 * 256f64.powf(-0.5) * 16f64.powf(-0.5);
        assert!((lrs[15] - expected).abs() < 1e-12);
        assert_eq!(s.steps(), 16);
    }
}
