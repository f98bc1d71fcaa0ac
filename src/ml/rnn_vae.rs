// ============================================================
// Layer 5 — RNN Variational Autoencoder (Burn)
// ============================================================
// A sequence VAE over token ids, usable as a language-model
// style consumer of prepared problems (questions or equations).
//
// Forward pass:
//
//   ids [B, S] ──embed──▶ [B, S, E] ──encoder RNN ×L──▶ [B, S, H·dirs]
//                                          │
//                          hidden at each sequence's last valid step
//                                          ▼
//                              h [B, H·dirs] ──▶ mean, logvar [B, Z]
//                                          │
//                     z = mean + ε · exp(½ · logvar),  ε ~ N(0, I)
//                                          ▼
//                     latent_to_state(z) → decoder initial state
//                          LSTM: [h | c] halves of a 2H projection
//                          GRU:  H projection
//                                          ▼
//   dropout(embed(ids)) ──decoder RNN ×L──▶ [B, S, H] ──vocab──▶ logits [B, S, V]
//
// The cell type is chosen by config ("lstm" or "gru"); only the
// layer stacks of that type are populated, the others stay empty.
// Bidirectional encoding is supported for LSTM; the backward
// half of the final state is read at step 0.
//
// Reference: Bowman et al. (2016) Generating Sentences from a Continuous Space
//            Kingma & Welling (2014) Auto-Encoding Variational Bayes
//            Burn Book §3 (Building Blocks)

use anyhow::{bail, Result};
use burn::{
    nn::{
        BiLstm, BiLstmConfig,
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        gru::{Gru, GruConfig},
        Linear, LinearConfig,
        Lstm, LstmConfig, LstmState,
    },
    prelude::*,
    tensor::{activation::{log_softmax, softmax}, Distribution},
};
use rand::Rng;

use crate::ml::sampling::top_k_sample;

const CELL_LSTM: &str = "lstm";
const CELL_GRU:  &str = "gru";

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct RnnVaeConfig {
    pub vocab_size: usize,
    #[config(default = 128)]
    pub embedding_size: usize,
    #[config(default = 256)]
    pub hidden_size: usize,
    #[config(default = 64)]
    pub latent_size: usize,
    #[config(default = 1)]
    pub num_encoder_layers: usize,
    #[config(default = 1)]
    pub num_decoder_layers: usize,
    /// "lstm" or "gru"
    #[config(default = "String::from(\"lstm\")")]
    pub rnn_cell_type: String,
    #[config(default = false)]
    pub bidirectional: bool,
    #[config(default = 0.1)]
    pub dropout: f64,
    #[config(default = 30)]
    pub max_length: usize,
    #[config(default = 0)]
    pub pad_idx: usize,
    #[config(default = 1)]
    pub sos_idx: usize,
    #[config(default = 2)]
    pub eos_idx: usize,
    #[config(default = 5)]
    pub top_k: usize,
}

impl RnnVaeConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<RnnVae<B>> {
        let is_lstm = match self.rnn_cell_type.as_str() {
            CELL_LSTM => true,
            CELL_GRU  => false,
            other => bail!("no such rnn cell type '{other}' for RnnVae"),
        };
        if self.bidirectional && !is_lstm {
            bail!("bidirectional encoding is only available for lstm cells");
        }
        if self.num_encoder_layers == 0 || self.num_decoder_layers == 0 {
            bail!("RnnVae needs at least one encoder and one decoder layer");
        }

        let e    = self.embedding_size;
        let h    = self.hidden_size;
        let dirs = if self.bidirectional { 2 } else { 1 };

        let layer_input = |layer: usize, first: usize, rest: usize| if layer == 0 { first } else { rest };

        let mut encoder_lstm   = Vec::new();
        let mut encoder_bilstm = Vec::new();
        let mut encoder_gru    = Vec::new();
        for l in 0..self.num_encoder_layers {
            let d_in = layer_input(l, e, h * dirs);
            match (is_lstm, self.bidirectional) {
                (true, true)  => encoder_bilstm.push(BiLstmConfig::new(d_in, h, true).init(device)),
                (true, false) => encoder_lstm.push(LstmConfig::new(d_in, h, true).init(device)),
                _             => encoder_gru.push(GruConfig::new(d_in, h, true).init(device)),
            }
        }

        let mut decoder_lstm = Vec::new();
        let mut decoder_gru  = Vec::new();
        for l in 0..self.num_decoder_layers {
            let d_in = layer_input(l, e, h);
            if is_lstm {
                decoder_lstm.push(LstmConfig::new(d_in, h, true).init(device));
            } else {
                decoder_gru.push(GruConfig::new(d_in, h, true).init(device));
            }
        }

        let state_size = if is_lstm { 2 * h } else { h };

        Ok(RnnVae {
            embedder:         EmbeddingConfig::new(self.vocab_size, e).init(device),
            encoder_lstm,
            encoder_bilstm,
            encoder_gru,
            decoder_lstm,
            decoder_gru,
            hidden_to_mean:   LinearConfig::new(h * dirs, self.latent_size).init(device),
            hidden_to_logvar: LinearConfig::new(h * dirs, self.latent_size).init(device),
            latent_to_state:  LinearConfig::new(self.latent_size, state_size).init(device),
            vocab_linear:     LinearConfig::new(h, self.vocab_size).init(device),
            dropout:          DropoutConfig::new(self.dropout).init(),
            hidden_size:      h,
            latent_size:      self.latent_size,
            max_length:       self.max_length,
            pad_idx:          self.pad_idx,
            sos_idx:          self.sos_idx,
            eos_idx:          self.eos_idx,
            top_k:            self.top_k,
        })
    }
}

#[derive(Module, Debug)]
pub struct RnnVae<B: Backend> {
    pub embedder:         Embedding<B>,
    pub encoder_lstm:     Vec<Lstm<B>>,
    pub encoder_bilstm:   Vec<BiLstm<B>>,
    pub encoder_gru:      Vec<Gru<B>>,
    pub decoder_lstm:     Vec<Lstm<B>>,
    pub decoder_gru:      Vec<Gru<B>>,
    pub hidden_to_mean:   Linear<B>,
    pub hidden_to_logvar: Linear<B>,
    pub latent_to_state:  Linear<B>,
    pub vocab_linear:     Linear<B>,
    pub dropout:          Dropout,
    pub hidden_size:      usize,
    pub latent_size:      usize,
    pub max_length:       usize,
    pub pad_idx:          usize,
    pub sos_idx:          usize,
    pub eos_idx:          usize,
    pub top_k:            usize,
}

pub struct VaeOutput<B: Backend> {
    /// [batch, seq_len, vocab_size]
    pub logits: Tensor<B, 3>,
    /// [batch, latent_size]
    pub mean:   Tensor<B, 2>,
    pub logvar: Tensor<B, 2>,
}

/// Decoder recurrent state, one entry per layer.
enum DecoderState<B: Backend> {
    Lstm(Vec<LstmState<B, 2>>),
    Gru(Vec<Tensor<B, 2>>),
}

impl<B: Backend> RnnVae<B> {
    fn is_lstm(&self) -> bool {
        !self.decoder_lstm.is_empty()
    }

    fn is_bidirectional(&self) -> bool {
        !self.encoder_bilstm.is_empty()
    }

    // ─── Encoder ──────────────────────────────────────────────────────────────
    /// ids [B, S], lengths [B] → final hidden [B, H·dirs]
    fn encode(&self, ids: Tensor<B, 2, Int>, lengths: Tensor<B, 1, Int>) -> Tensor<B, 2> {
        let [batch, _] = ids.dims();
        let mut x = self.embedder.forward(ids);

        for layer in &self.encoder_bilstm {
            x = layer.forward(x, None).0;
        }
        for layer in &self.encoder_lstm {
            x = layer.forward(x, None).0;
        }
        for layer in &self.encoder_gru {
            let h0 = Tensor::zeros([batch, self.hidden_size], &x.device());
            x = Self::run_gru(layer, x, h0);
        }

        let [_, _, width] = x.dims();
        let last = lengths
            .sub_scalar(1)
            .clamp_min(0)
            .reshape([batch, 1, 1])
            .expand([batch, 1, width]);
        let at_last = x.clone().gather(1, last).reshape([batch, width]);

        if !self.is_bidirectional() {
            return at_last;
        }
        let h        = self.hidden_size;
        let forward  = at_last.slice([0..batch, 0..h]);
        let backward = x.slice([0..batch, 0..1, h..2 * h]).reshape([batch, h]);
        Tensor::cat(vec![forward, backward], 1)
    }

    fn reparameterize(&self, mean: Tensor<B, 2>, logvar: Tensor<B, 2>) -> Tensor<B, 2> {
        let eps = Tensor::random(mean.dims(), Distribution::Normal(0.0, 1.0), &mean.device());
        mean + eps * logvar.mul_scalar(0.5).exp()
    }

    // ─── Decoder ──────────────────────────────────────────────────────────────
    fn initial_state(&self, z: Tensor<B, 2>) -> DecoderState<B> {
        let [batch, _] = z.dims();
        let h     = self.hidden_size;
        let state = self.latent_to_state.forward(z);

        if self.is_lstm() {
            let hidden = state.clone().slice([0..batch, 0..h]);
            let cell   = state.slice([0..batch, h..2 * h]);
            DecoderState::Lstm(
                self.decoder_lstm
                    .iter()
                    .map(|_| LstmState::new(cell.clone(), hidden.clone()))
                    .collect(),
            )
        } else {
            DecoderState::Gru(self.decoder_gru.iter().map(|_| state.clone()).collect())
        }
    }

    /// Run the decoder stack over embedded inputs [B, S, E].
    fn decode(&self, mut x: Tensor<B, 3>, state: DecoderState<B>) -> (Tensor<B, 3>, DecoderState<B>) {
        match state {
            DecoderState::Lstm(states) => {
                let mut next = Vec::with_capacity(states.len());
                for (layer, s) in self.decoder_lstm.iter().zip(states) {
                    let (out, s) = layer.forward(x, Some(s));
                    x = out;
                    next.push(s);
                }
                (self.vocab_linear.forward(x), DecoderState::Lstm(next))
            }
            DecoderState::Gru(states) => {
                let mut next = Vec::with_capacity(states.len());
                for (layer, s) in self.decoder_gru.iter().zip(states) {
                    let out = Self::run_gru(layer, x, s);
                    let [batch, seq, h] = out.dims();
                    next.push(out.clone().slice([0..batch, seq - 1..seq, 0..h]).reshape([batch, h]));
                    x = out;
                }
                (self.vocab_linear.forward(x), DecoderState::Gru(next))
            }
        }
    }

    /// x [B, S, D], h0 [B, H] → hidden states [B, S, H].
    ///
    /// `Gru::forward` reads its state tensor per timestep instead of
    /// carrying the previous step's output, so each call covers one step
    /// with the running state shaped [B, 1, H].
    fn run_gru(layer: &Gru<B>, x: Tensor<B, 3>, h0: Tensor<B, 2>) -> Tensor<B, 3> {
        let [batch, seq, d] = x.dims();
        let [_, h]          = h0.dims();

        let mut hidden  = h0.reshape([batch, 1, h]);
        let mut outputs = Vec::with_capacity(seq);
        for t in 0..seq {
            let x_t = x.clone().slice([0..batch, t..t + 1, 0..d]);
            hidden = layer.forward(x_t, Some(hidden));
            outputs.push(hidden.clone());
        }
        Tensor::cat(outputs, 1)
    }

    // ─── Public API ───────────────────────────────────────────────────────────
    /// Encode `ids`, sample z and reconstruct `ids` teacher-forced.
    pub fn forward(&self, ids: Tensor<B, 2, Int>, lengths: Tensor<B, 1, Int>) -> VaeOutput<B> {
        let h_n    = self.encode(ids.clone(), lengths);
        let mean   = self.hidden_to_mean.forward(h_n.clone());
        let logvar = self.hidden_to_logvar.forward(h_n);
        let z      = self.reparameterize(mean.clone(), logvar.clone());

        let inputs = self.dropout.forward(self.embedder.forward(ids));
        let (logits, _) = self.decode(inputs, self.initial_state(z));

        VaeOutput { logits, mean, logvar }
    }

    /// Summed negative log-likelihood per sequence, averaged over the batch.
    ///
    /// `target` holds <SOS> w1 … wn <EOS> (+ padding); the model reads
    /// target[:, :-1] and predicts target[:, 1:]. Padding is ignored.
    pub fn nll(&self, target: Tensor<B, 2, Int>, lengths: Tensor<B, 1, Int>) -> Tensor<B, 1> {
        let [batch, seq] = target.dims();
        let device       = target.device();
        if seq < 2 {
            return Tensor::zeros([1], &device);
        }

        let input   = target.clone().slice([0..batch, 0..seq - 1]);
        let gold    = target.slice([0..batch, 1..seq]);
        let lengths = lengths.sub_scalar(1).clamp_min(1);

        let out       = self.forward(input, lengths);
        let log_probs = log_softmax(out.logits, 2);

        let picked = log_probs
            .gather(2, gold.clone().reshape([batch, seq - 1, 1]))
            .reshape([batch, seq - 1]);
        let keep = gold.not_equal_elem(self.pad_idx as i64).float();

        (picked * keep).sum().neg().div_scalar(batch as f64)
    }

    /// KL(q(z|x) ‖ N(0, I)), averaged over the batch.
    pub fn kl_divergence(mean: Tensor<B, 2>, logvar: Tensor<B, 2>) -> Tensor<B, 1> {
        let [batch, _] = mean.dims();
        let terms = logvar.clone().add_scalar(1.0) - mean.powf_scalar(2.0) - logvar.exp();
        terms.sum().mul_scalar(-0.5).div_scalar(batch as f64)
    }

    /// Sample `n` sequences from the prior with top-k decoding.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        n:         usize,
        idx2token: &[String],
        rng:       &mut R,
        device:    &B::Device,
    ) -> Vec<Vec<String>> {
        let z         = Tensor::random([n, self.latent_size], Distribution::Normal(0.0, 1.0), device);
        let mut state = self.initial_state(z);

        let mut current  = vec![self.sos_idx as i32; n];
        let mut finished = vec![false; n];
        let mut corpus   = vec![Vec::new(); n];

        for _ in 0..self.max_length {
            let input = Tensor::<B, 1, Int>::from_ints(current.as_slice(), device).reshape([n, 1]);
            let (logits, next_state) = self.decode(self.embedder.forward(input), state);
            state = next_state;

            let [_, _, vocab] = logits.dims();
            let probs: Vec<f32> = softmax(logits.reshape([n, vocab]), 1)
                .into_data()
                .convert::<f32>()
                .to_vec::<f32>()
                .unwrap_or_default();
            if probs.len() != n * vocab {
                break;
            }

            for i in 0..n {
                if finished[i] {
                    continue;
                }
                let token = top_k_sample(&probs[i * vocab..(i + 1) * vocab], self.top_k, rng);
                if token == self.eos_idx {
                    finished[i] = true;
                } else {
                    corpus[i].push(idx2token.get(token).cloned().unwrap_or_default());
                    current[i] = token as i32;
                }
            }
            if finished.iter().all(|&f| f) {
                break;
            }
        }

        corpus
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::ElementConversion;
    use rand::{rngs::StdRng, SeedableRng};

    type B = NdArray;

    fn config(cell: &str, bidirectional: bool) -> RnnVaeConfig {
        RnnVaeConfig::new(12)
            .with_embedding_size(8)
            .with_hidden_size(6)
            .with_latent_size(4)
            .with_num_encoder_layers(2)
            .with_num_decoder_layers(2)
            .with_rnn_cell_type(cell.to_string())
            .with_bidirectional(bidirectional)
            .with_dropout(0.0)
            .with_max_length(5)
    }

    fn batch() -> (Tensor<B, 2, Int>, Tensor<B, 1, Int>) {
        let device = Default::default();
        let ids = Tensor::<B, 1, Int>::from_ints([1, 5, 6, 7, 2, 1, 8, 2, 0, 0].as_slice(), &device)
            .reshape([2, 5]);
        let lengths = Tensor::<B, 1, Int>::from_ints([5, 3].as_slice(), &device);
        (ids, lengths)
    }

    #[test]
    fn test_forward_shapes_for_every_cell() {
        for (cell, bi) in [("lstm", false), ("lstm", true), ("gru", false)] {
            let model = config(cell, bi).init::<B>(&Default::default()).unwrap();
            let (ids, lengths) = batch();
            let out = model.forward(ids, lengths);
            assert_eq!(out.logits.dims(), [2, 5, 12]);
            assert_eq!(out.mean.dims(), [2, 4]);
            assert_eq!(out.logvar.dims(), [2, 4]);
        }
    }

    #[test]
    fn test_gru_decoder_matches_step_by_step_decoding() {
        let device = Default::default();
        let model  = config("gru", false).init::<B>(&device).unwrap();
        let z      = Tensor::<B, 2>::ones([1, 4], &device);
        let ids    = Tensor::<B, 1, Int>::from_ints([1, 5, 6].as_slice(), &device).reshape([1, 3]);
        let x      = model.embedder.forward(ids);

        let (full, _) = model.decode(x.clone(), model.initial_state(z.clone()));
        assert_eq!(full.dims(), [1, 3, 12]);

        let mut state = model.initial_state(z);
        for t in 0..3 {
            let (step, next) = model.decode(x.clone().slice([0..1, t..t + 1, 0..8]), state);
            state = next;

            let expected = full.clone().slice([0..1, t..t + 1, 0..12]).into_data().to_vec::<f32>().unwrap();
            let actual   = step.into_data().to_vec::<f32>().unwrap();
            for (a, e) in actual.iter().zip(&expected) {
                assert!((a - e).abs() < 1e-5, "step {t}: {a} vs {e}");
            }
        }
    }

    #[test]
    fn test_gru_encoder_reads_earlier_tokens() {
        let device = Default::default();
        let model  = config("gru", false).init::<B>(&device).unwrap();
        let ids = Tensor::<B, 1, Int>::from_ints([5, 7, 3, 7].as_slice(), &device).reshape([2, 2]);
        let lengths = Tensor::<B, 1, Int>::from_ints([2, 2].as_slice(), &device);

        // Same last token, different first token
        let h = model.encode(ids, lengths).into_data().to_vec::<f32>().unwrap();
        let (first, second) = h.split_at(h.len() / 2);
        assert!(first.iter().zip(second).any(|(a, b)| (a - b).abs() > 1e-6));
    }

    #[test]
    fn test_unknown_cell_type_is_rejected() {
        assert!(config("transformer", false).init::<B>(&Default::default()).is_err());
        assert!(config("gru", true).init::<B>(&Default::default()).is_err());
    }

    #[test]
    fn test_nll_is_positive_and_finite() {
        let model = config("lstm", false).init::<B>(&Default::default()).unwrap();
        let (ids, lengths) = batch();
        let nll: f64 = model.nll(ids, lengths).into_scalar().elem::<f64>();
        assert!(nll.is_finite());
        assert!(nll > 0.0);
    }

    #[test]
    fn test_kl_is_zero_for_standard_normal_posterior() {
        let device = Default::default();
        let mean   = Tensor::<B, 2>::zeros([3, 4], &device);
        let logvar = Tensor::<B, 2>::zeros([3, 4], &device);
        let kl: f64 = RnnVae::<B>::kl_divergence(mean, logvar).into_scalar().elem::<f64>();
        assert!(kl.abs() < 1e-6);

        let shifted = Tensor::<B, 2>::ones([3, 4], &device);
        let kl: f64 = RnnVae::<B>::kl_divergence(shifted, Tensor::zeros([3, 4], &device))
            .into_scalar()
            .elem::<f64>();
        // ½ · Σ mean² per row = ½ · 4
        assert!((kl - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_generate_respects_max_length() {
        let model = config("gru", false).init::<B>(&Default::default()).unwrap();
        let vocab: Vec<String> = (0..12).map(|i| format!("t{i}")).collect();
        let mut rng = StdRng::seed_from_u64(3);

        let corpus = model.generate(4, &vocab, &mut rng, &Default::default());
        assert_eq!(corpus.len(), 4);
        assert!(corpus.iter().all(|seq| seq.len() <= 5));
        assert!(corpus.iter().flatten().all(|t| t != "t2"));
    }
}
