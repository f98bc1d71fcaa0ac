// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Training-side building blocks that consume prepared MWP
// batches. All Burn model code lives here; the data layer only
// touches Burn for the Dataset/Batcher seams.
//
// What's in this layer:
//
//   rnn_vae.rs   — RNN variational autoencoder over token ids
//                  • LSTM / BiLSTM / GRU encoder stacks
//                  • reparameterised latent with KL term
//                  • teacher-forced reconstruction NLL
//                  • top-k generation from the prior
//
//   loss.rs      — NLL accumulator with optional masked class
//
//   scheduler.rs — inverse-square-root warm-up learning rate
//
//   sampling.rs  — top-k sampling over a probability row
//
// Reference: Burn Book §3 (Building Blocks)
//            Bowman et al. (2016) Generating Sentences from a Continuous Space

/// Sequence VAE over prepared token ids
pub mod rnn_vae;

/// Negative log-likelihood accumulator
pub mod loss;

/// Warm-up learning rate schedule
pub mod scheduler;

/// Top-k token sampling
pub mod sampling;
