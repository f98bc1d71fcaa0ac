// ============================================================
// Layer 2 — InspectUseCase
// ============================================================
// Sanity check for a prepared dataset, run on the CPU backend:
//
//   Step 1: Load artifacts             (Layer 6 - infra)
//   Step 2: Encode one split           (Layer 4 - data)
//   Step 3: Batch the first N samples  (Layer 4 - data)
//   Step 4: Decode the first sample    (Layer 4 - data)
//   Step 5: Optional untrained RNN-VAE (Layer 5 - ml)
//           forward pass over the question batch → NLL / KL
//           and a few sequences sampled from the prior
//
// Nothing is written; the report is returned to the CLI.

use anyhow::{bail, Result};
use burn::{
    backend::NdArray,
    data::dataloader::batcher::Batcher,
    prelude::*,
    tensor::ElementConversion,
};
use rand::{rngs::StdRng, SeedableRng};

use crate::data::{
    batcher::{MwpBatch, MwpBatcher},
    dataset::{MwpDataset, MwpSample},
};
use crate::domain::split::SplitKind;
use crate::infra::artifact_store::ArtifactStore;
use crate::ml::rnn_vae::{RnnVae, RnnVaeConfig};

type CpuBackend = NdArray;

#[derive(Debug, Clone)]
pub struct InspectConfig {
    pub output_dir: String,
    pub split:      SplitKind,
    pub batch_size: usize,
    /// Run an untrained RNN-VAE over the batch
    pub vae:        bool,
    pub seed:       u64,
}

impl Default for InspectConfig {
    fn default() -> Self {
        Self {
            output_dir: "prepared/math23k".to_string(),
            split:      SplitKind::Train,
            batch_size: 4,
            vae:        false,
            seed:       42,
        }
    }
}

/// Tensor shapes of one batch plus the first sample decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct InspectReport {
    pub dataset:        String,
    pub split:          SplitKind,
    pub samples:        usize,
    pub shapes:         Vec<(&'static str, Vec<usize>)>,
    pub first_id:       String,
    pub first_question: Vec<String>,
    pub first_infix:    Vec<String>,
    pub first_prefix:   Vec<String>,
    pub vae:            Option<VaeReport>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VaeReport {
    pub nll:       f64,
    pub kl:        f64,
    pub generated: Vec<Vec<String>>,
}

pub struct InspectUseCase {
    config: InspectConfig,
}

impl InspectUseCase {
    pub fn new(config: InspectConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<InspectReport> {
        let cfg = &self.config;

        // ── Step 1: Load ─────────────────────────────────────────────────────
        let (dataset, _) = ArtifactStore::new(&cfg.output_dir).load()?;

        // ── Step 2: Encode ───────────────────────────────────────────────────
        let samples = dataset.encode(cfg.split);
        if samples.is_empty() {
            bail!("the {} split of '{}' is empty", cfg.split, dataset.dataset);
        }
        let first: Vec<MwpSample> = samples.iter().take(cfg.batch_size.max(1)).cloned().collect();

        // ── Step 3: Batch ────────────────────────────────────────────────────
        let device  = Default::default();
        let batcher = MwpBatcher::<CpuBackend>::new(device);
        let batch   = batcher.batch(first.clone());
        let shapes  = batch_shapes(&batch);
        for (name, dims) in &shapes {
            tracing::info!("{:<20} {:?}", name, dims);
        }

        // ── Step 4: Decode ───────────────────────────────────────────────────
        let sample = &first[0];
        let vocab  = &dataset.vocab;
        let report_vae = if cfg.vae { Some(self.run_vae(&dataset, &first)?) } else { None };

        let report = InspectReport {
            dataset:        dataset.dataset.clone(),
            split:          cfg.split,
            samples:        samples.len(),
            shapes,
            first_id:       sample.id.clone(),
            first_question: vocab.input_words.decode(&sample.question_ids),
            first_infix:    vocab.seq_symbols.decode(&sample.seq_equation_ids),
            first_prefix:   vocab.tree_symbols.decode(&sample.tree_equation_ids),
            vae:            report_vae,
        };
        tracing::info!("First sample '{}': {}", report.first_id, report.first_question.join(" "));
        tracing::info!("  sequence target: {}", report.first_infix.join(" "));
        tracing::info!("  tree target:     {}", report.first_prefix.join(" "));

        Ok(report)
    }

    // ── Step 5: Untrained RNN-VAE over the question batch ────────────────────
    fn run_vae(&self, dataset: &MwpDataset, samples: &[MwpSample]) -> Result<VaeReport> {
        let words    = &dataset.vocab.input_words;
        let reserved = words.reserved();
        let (Some(pad), Some(sos), Some(eos)) = (reserved.pad, reserved.sos, reserved.eos) else {
            bail!("the input vocabulary has no <PAD>/<SOS>/<EOS>; cannot run the RNN-VAE");
        };

        let device: <CpuBackend as Backend>::Device = Default::default();
        let model: RnnVae<CpuBackend> = RnnVaeConfig::new(words.len())
            .with_embedding_size(32)
            .with_hidden_size(64)
            .with_latent_size(16)
            .with_dropout(0.0)
            .with_pad_idx(pad)
            .with_sos_idx(sos)
            .with_eos_idx(eos)
            .init(&device)?;

        // <SOS> question <EOS>
        let wrapped: Vec<MwpSample> = samples
            .iter()
            .map(|s| {
                let mut ids = Vec::with_capacity(s.question_ids.len() + 2);
                ids.push(sos);
                ids.extend_from_slice(&s.question_ids);
                ids.push(eos);
                MwpSample { question_ids: ids, ..s.clone() }
            })
            .collect();
        let batch = MwpBatcher::<CpuBackend>::new(device.clone()).batch(wrapped);

        let out = model.forward(batch.question.clone(), batch.question_lengths.clone());
        let kl: f64  = RnnVae::kl_divergence(out.mean, out.logvar).into_scalar().elem::<f64>();
        let nll: f64 = model.nll(batch.question, batch.question_lengths).into_scalar().elem::<f64>();

        let mut rng   = StdRng::seed_from_u64(self.config.seed);
        let generated = model.generate(2, words.tokens(), &mut rng, &device);

        tracing::info!("Untrained RNN-VAE: NLL {:.3}, KL {:.3}", nll, kl);
        for seq in &generated {
            tracing::info!("  sampled: {}", seq.join(" "));
        }

        Ok(VaeReport { nll, kl, generated })
    }
}

fn batch_shapes<B: Backend>(batch: &MwpBatch<B>) -> Vec<(&'static str, Vec<usize>)> {
    vec![
        ("question",            batch.question.dims().to_vec()),
        ("question_lengths",    batch.question_lengths.dims().to_vec()),
        ("pos",                 batch.pos.dims().to_vec()),
        ("parse_tree",          batch.parse_tree.dims().to_vec()),
        ("seq_target",          batch.seq_target.dims().to_vec()),
        ("seq_target_lengths",  batch.seq_target_lengths.dims().to_vec()),
        ("tree_target",         batch.tree_target.dims().to_vec()),
        ("tree_target_lengths", batch.tree_target_lengths.dims().to_vec()),
        ("num_pos",             batch.num_pos.dims().to_vec()),
        ("num_counts",          batch.num_counts.dims().to_vec()),
    ]
}
