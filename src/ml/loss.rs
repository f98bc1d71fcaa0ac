// ============================================================
// Layer 5 — NLL Loss Accumulator
// ============================================================
// Negative log-likelihood over log-probabilities, accumulated
// across batches for reporting.
//
//   eval_batch(log_probs [N, C], target [N])
//     loss_b = Σ_i w[t_i] · −log_probs[i, t_i]  /  Σ_i w[t_i]
//     acc   += loss_b,  batches += 1
//
//   get_loss() = acc / batches   (size_average)
//              = acc             (otherwise)
//
// A masked class (usually <PAD>) gets weight 0, so it neither
// contributes to the numerator nor to the normaliser. Masking
// requires explicit class weights.
//
// Reference: Burn Book §3 (Tensor Operations)

use anyhow::{bail, Result};
use burn::{prelude::*, tensor::ElementConversion};

pub const NLL_LOSS_NAME: &str = "Avg NLLLoss";

pub struct NllLoss<B: Backend> {
    weight:       Option<Tensor<B, 1>>,
    mask:         Option<usize>,
    size_average: bool,
    acc_loss:     f64,
    batches:      usize,
}

impl<B: Backend> NllLoss<B> {
    pub fn new(weight: Option<Tensor<B, 1>>, mask: Option<usize>, size_average: bool) -> Result<Self> {
        let weight = match (weight, mask) {
            (None, Some(_)) => bail!("a masked class needs class weights"),
            (Some(w), Some(m)) => {
                let [classes] = w.dims();
                if m >= classes {
                    bail!("masked class {m} is outside the {classes} weighted classes");
                }
                let device = w.device();
                Some(w.slice_assign([m..m + 1], Tensor::zeros([1], &device)))
            }
            (w, None) => w,
        };

        Ok(Self { weight, mask, size_average, acc_loss: 0.0, batches: 0 })
    }

    /// Unweighted, averaged over batches.
    pub fn unweighted() -> Self {
        Self { weight: None, mask: None, size_average: true, acc_loss: 0.0, batches: 0 }
    }

    pub fn name(&self) -> &'static str {
        NLL_LOSS_NAME
    }

    pub fn mask(&self) -> Option<usize> {
        self.mask
    }

    /// Weighted mean NLL of one batch, without accumulating it.
    pub fn batch_loss(&self, log_probs: Tensor<B, 2>, target: Tensor<B, 1, Int>) -> Tensor<B, 1> {
        let [n, classes] = log_probs.dims();
        let device       = log_probs.device();

        let picked = log_probs
            .gather(1, target.clone().reshape([n, 1]))
            .reshape([n])
            .neg();

        let weights = match &self.weight {
            Some(w) => w.clone().select(0, target),
            None    => Tensor::ones([n], &device),
        };
        debug_assert!(self.weight.as_ref().map_or(true, |w| w.dims() == [classes]));

        (picked * weights.clone()).sum() / weights.sum()
    }

    pub fn eval_batch(&mut self, log_probs: Tensor<B, 2>, target: Tensor<B, 1, Int>) {
        let loss: f64 = self.batch_loss(log_probs, target).into_scalar().elem::<f64>();
        self.acc_loss += loss;
        self.batches  += 1;
    }

    /// Accumulated loss; 0 before the first batch.
    pub fn get_loss(&self) -> f64 {
        if self.batches == 0 {
            return 0.0;
        }
        if self.size_average {
            self.acc_loss / self.batches as f64
        } else {
            self.acc_loss
        }
    }

    pub fn reset(&mut self) {
        self.acc_loss = 0.0;
        self.batches  = 0;
    }
}
