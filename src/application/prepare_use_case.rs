// ============================================================
// Layer 2 — PrepareUseCase
// ============================================================
// Orchestrates dataset preparation in order:
//
//   Step 1: Validate the configuration      (fail before any I/O)
//   Step 2: Load the raw splits             (Layer 4 - data)
//   Step 3: Re-edit colliding ids           (Layer 4 - data)
//   Step 4: Number transfer per split       (Layer 4 - data)
//   Step 5: Placeholder capacity check      (Layer 3 - domain)
//   Step 6: Equation normalisation          (Layer 4 - data)
//   Step 7: Attach pos / parse tree         (Layer 6 - infra)
//   Step 8: Build the four vocabularies     (Layer 4 - data)
//   Step 9: Symbol coverage check           (Layer 4 - data)
//   Step 10: Save artifacts + tokenizer     (Layer 6 - infra)
//
// Steps 1–9 are `prepare()`, which returns the in-memory
// MwpDataset; `execute()` adds step 10.
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Rust Book §17 (Trait Objects)

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::{
    dataset::MwpDataset,
    equation::{normalize_record, IMPLICIT_ZERO},
    loader::{needs_id_reedit, reedit_ids, JsonCorpusLoader},
    transfer::{TransferOptions, TransferOutput, TransferRegistry},
    vocab::{CopyCounts, MwpVocab, VocabSettings},
};
use crate::domain::{
    error::DataError,
    record::Record,
    split::{SplitKind, Splits},
    symbols::{MaskScheme, TaskType},
    traits::{Annotator, CorpusSource},
};
use crate::infra::{
    annotation_cache::AnnotationCache,
    annotator::CommandAnnotator,
    artifact_store::ArtifactStore,
    tokenizer_store::TokenizerStore,
};

// ─── Preparation Configuration ────────────────────────────────────────────────
// Everything that determines the prepared dataset. Saved next to
// the artifacts as prepare_config.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepareConfig {
    pub dataset:           String,
    pub dataset_dir:       String,
    pub output_dir:        String,
    pub task_type:         TaskType,
    pub mask_symbol:       MaskScheme,
    /// Words (and pos tags) occurring more often than this are kept
    pub min_word_keep:     usize,
    /// Equation constants occurring at least this often are generated
    pub min_generate_keep: usize,
    pub share_vocab:       bool,
    pub symbol_for_tree:   bool,
    /// Stem of the annotation cache inside `dataset_dir`; None skips annotation
    pub parse_tree_file:   Option<String>,
    pub rebuild:           bool,
    pub language:          String,
    /// Annotator command line; `{lang}` is replaced by `language`
    pub annotator_cmd:     Option<String>,
    /// Fail (instead of warn) when a training symbol has no output index
    pub strict_symbols:    bool,
}

impl Default for PrepareConfig {
    fn default() -> Self {
        Self {
            dataset:           "math23k".to_string(),
            dataset_dir:       "dataset/math23k".to_string(),
            output_dir:        "prepared/math23k".to_string(),
            task_type:         TaskType::SingleEquation,
            mask_symbol:       MaskScheme::Num,
            min_word_keep:     1,
            min_generate_keep: 5,
            share_vocab:       false,
            symbol_for_tree:   false,
            parse_tree_file:   None,
            rebuild:           false,
            language:          "en".to_string(),
            annotator_cmd:     None,
            strict_symbols:    true,
        }
    }
}

impl PrepareConfig {
    /// Check the configuration on its own, before anything is read.
    pub fn validate(&self) -> Result<()> {
        self.validate_with(self.annotator_cmd.is_some())
    }

    /// `annotator_available` covers annotators injected by the caller.
    fn validate_with(&self, annotator_available: bool) -> Result<()> {
        if self.dataset.trim().is_empty() {
            bail!("dataset name must not be empty");
        }
        if Path::new(&self.output_dir) == Path::new(&self.dataset_dir) {
            bail!(
                "output directory '{}' is the dataset directory; prepared splits would overwrite the corpus",
                self.output_dir
            );
        }
        if let Some(cache) = self.parse_tree_path() {
            if (self.rebuild || !cache.exists()) && !annotator_available {
                bail!(
                    "annotation cache '{}' has to be built but no annotator is configured (use --annotator-cmd)",
                    cache.display()
                );
            }
        }
        Ok(())
    }

    /// `{dataset_dir}/{parse_tree_file}.json`, when annotation is enabled.
    pub fn parse_tree_path(&self) -> Option<PathBuf> {
        self.parse_tree_file
            .as_ref()
            .map(|stem| Path::new(&self.dataset_dir).join(format!("{stem}.json")))
    }
}

// ─── PrepareUseCase ───────────────────────────────────────────────────────────
pub struct PrepareUseCase {
    config:    PrepareConfig,
    registry:  TransferRegistry,
    annotator: Option<Box<dyn Annotator>>,
    source:    Option<Box<dyn CorpusSource>>,
}

impl PrepareUseCase {
    pub fn new(config: PrepareConfig) -> Self {
        Self {
            config,
            registry:  TransferRegistry::with_defaults(),
            annotator: None,
            source:    None,
        }
    }

    /// Use a custom transfer registry instead of the defaults.
    pub fn with_registry(mut self, registry: TransferRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Annotate with `annotator` instead of the configured command.
    pub fn with_annotator(mut self, annotator: Box<dyn Annotator>) -> Self {
        self.annotator = Some(annotator);
        self
    }

    /// Read raw splits from `source` instead of `dataset_dir`.
    pub fn with_source(mut self, source: Box<dyn CorpusSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn config(&self) -> &PrepareConfig {
        &self.config
    }

    /// Run the pipeline, write all artifacts and return the dataset.
    pub fn execute(&self) -> Result<MwpDataset> {
        let cfg     = &self.config;
        let dataset = self.prepare()?;

        // ── Step 10: Persist ─────────────────────────────────────────────────
        ArtifactStore::new(&cfg.output_dir).save(&dataset, cfg)?;
        TokenizerStore::new(&cfg.output_dir).save_word_level(&dataset.vocab.input_words)?;

        Ok(dataset)
    }

    /// Run steps 1–9 and return the prepared dataset without writing it.
    pub fn prepare(&self) -> Result<MwpDataset> {
        let cfg = &self.config;

        // ── Step 1: Validate ─────────────────────────────────────────────────
        cfg.validate_with(self.annotator.is_some() || cfg.annotator_cmd.is_some())?;
        tracing::info!(
            "Preparing '{}' ({}, mask {}) from '{}'",
            cfg.dataset, cfg.task_type, cfg.mask_symbol, cfg.dataset_dir
        );

        // ── Step 2: Load raw splits ──────────────────────────────────────────
        let raw = match &self.source {
            Some(source) => source.load_splits()?,
            None         => JsonCorpusLoader::new(&cfg.dataset_dir).load_splits()?,
        };

        // ── Step 3: Re-edit ids that collide across splits ───────────────────
        let raw = if needs_id_reedit(&cfg.dataset) { reedit_ids(raw) } else { raw };

        // ── Step 4: Number transfer ──────────────────────────────────────────
        let transfer = self.registry.resolve(&cfg.dataset, cfg.task_type);
        let options  = TransferOptions {
            mask:              cfg.mask_symbol,
            min_generate_keep: cfg.min_generate_keep,
            separator:         cfg.task_type.separator().map(str::to_string),
        };
        let run = |kind: SplitKind| -> Result<TransferOutput> {
            transfer(raw.get(kind), &options)
                .with_context(|| format!("Number transfer failed on the {kind} split of '{}'", cfg.dataset))
        };
        let train = run(SplitKind::Train)?;
        let valid = run(SplitKind::Valid)?;
        let test  = run(SplitKind::Test)?;

        let copy_counts = CopyCounts {
            train: train.copy_nums,
            valid: valid.copy_nums,
            test:  test.copy_nums,
        };
        let mut generate_list = train.unk_symbols.clone();
        generate_list.extend(train.generate_list.iter().filter(|s| !train.unk_symbols.contains(s)).cloned());
        tracing::info!(
            "Copy counts: train {}, valid {}, test {}; {} generate symbols",
            copy_counts.train, copy_counts.valid, copy_counts.test, generate_list.len()
        );

        // ── Step 5: Placeholder capacity ─────────────────────────────────────
        cfg.mask_symbol
            .ensure_capacity(copy_counts.cross_split_max())
            .with_context(|| format!("Dataset '{}' needs more placeholders than the mask provides", cfg.dataset))?;

        // ── Step 6: Equation normalisation ───────────────────────────────────
        let masked  = Splits::new(train.records, valid.records, test.records);
        let records = masked
            .try_map(|_, split| split.into_iter().map(normalize_record).collect::<Result<Vec<_>, DataError>>())
            .with_context(|| format!("Cannot normalise the equations of '{}'", cfg.dataset))?;

        // Unary minus becomes `0 - x`; the zero has to be generable
        let uses_zero = records.iter().any(|(_, r)| r.prefix_equation.iter().any(|t| t == IMPLICIT_ZERO));
        if uses_zero && !generate_list.iter().any(|s| s == IMPLICIT_ZERO) {
            tracing::debug!("Unary minus present; adding '{IMPLICIT_ZERO}' to the generate list");
            generate_list.push(IMPLICIT_ZERO.to_string());
        }

        // ── Step 7: Linguistic annotation ────────────────────────────────────
        let records = self.annotate(records)?;

        // ── Step 8: Vocabularies ─────────────────────────────────────────────
        let settings = VocabSettings {
            task:            cfg.task_type,
            mask:            cfg.mask_symbol,
            min_word_keep:   cfg.min_word_keep,
            share_vocab:     cfg.share_vocab,
            symbol_for_tree: cfg.symbol_for_tree,
            generate_list,
            copy_counts,
        };
        let vocab = MwpVocab::build(&records.train, &settings)
            .with_context(|| format!("Cannot build the vocabularies of '{}'", cfg.dataset))?;
        tracing::info!(
            "Vocabularies: {} words, {} pos tags, {} tree symbols (num_start1 {}), {} sequence symbols (num_start2 {})",
            vocab.input_words.len(),
            vocab.input_pos.len(),
            vocab.tree_symbols.len(),
            vocab.num_start1,
            vocab.seq_symbols.len(),
            vocab.num_start2,
        );

        // ── Step 9: Symbol coverage ──────────────────────────────────────────
        let mut misses = vocab.uncovered_symbols(&records.train);
        if !misses.is_empty() {
            if cfg.strict_symbols {
                let total = misses.len();
                return Err(anyhow::Error::new(misses.swap_remove(0))).with_context(|| {
                    format!("{total} training symbol(s) of '{}' have no output index", cfg.dataset)
                });
            }
            for miss in &misses {
                tracing::warn!("{miss}");
            }
        }

        Ok(MwpDataset::new(cfg.dataset.clone(), cfg.task_type, records, vocab))
    }

    fn annotate(&self, records: Splits<Record>) -> Result<Splits<Record>> {
        let cfg = &self.config;
        let Some(path) = cfg.parse_tree_path() else {
            tracing::info!("No parse tree file configured; records stay unannotated");
            return Ok(records);
        };

        let command: CommandAnnotator;
        let annotator: Option<&dyn Annotator> = match (&self.annotator, &cfg.annotator_cmd) {
            (Some(injected), _) => Some(injected.as_ref()),
            (None, Some(line))  => {
                command = CommandAnnotator::new(line, &cfg.language)?;
                Some(&command)
            }
            (None, None) => None,
        };

        AnnotationCache::new(path)
            .load_or_build(records, annotator, cfg.rebuild)
            .with_context(|| format!("Cannot annotate '{}'", cfg.dataset))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::write_split;
    use crate::data::transfer::single::single_transfer;
    use crate::domain::record::RawRecord;
    use crate::domain::traits::TokenTag;
    use crate::infra::artifact_store::ArtifactStore;
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Tags every token "T" and chains each token to the previous one.
    struct ChainAnnotator {
        calls: Rc<Cell<usize>>,
    }

    impl Annotator for ChainAnnotator {
        fn annotate(&self, tokens: &[String]) -> Result<Vec<TokenTag>> {
            self.calls.set(self.calls.get() + 1);
            Ok((0..tokens.len()).map(|i| TokenTag { xpos: "T".to_string(), head: i }).collect())
        }
    }

    fn chain() -> (Box<dyn Annotator>, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        (Box::new(ChainAnnotator { calls: calls.clone() }), calls)
    }

    fn config(dir: &Path, dataset: &str) -> PrepareConfig {
        PrepareConfig {
            dataset:           dataset.to_string(),
            dataset_dir:       dir.join("corpus").display().to_string(),
            output_dir:        dir.join("out").display().to_string(),
            min_generate_keep: 1,
            parse_tree_file:   Some("parse_tree".to_string()),
            ..PrepareConfig::default()
        }
    }

    fn write_corpus(dir: &Path, train: serde_json::Value, valid: serde_json::Value, test: serde_json::Value) {
        let corpus = dir.join("corpus");
        std::fs::create_dir_all(&corpus).unwrap();
        write_split(&corpus, SplitKind::Train, &train);
        write_split(&corpus, SplitKind::Valid, &valid);
        write_split(&corpus, SplitKind::Test, &test);
    }

    fn three_records(dir: &Path) {
        write_corpus(
            dir,
            json!([{"id": 1, "question": "Tom has 2 apples and 3 pears", "equation": "x=2+3"}]),
            json!([{"id": 2, "question": "Amy has 4 cats and 1 dog", "equation": "x=4-1"}]),
            json!([{"id": 3, "question": "5 kids share 10 sweets", "equation": "x=10/5"}]),
        );
    }

    fn placeholders(tokens: &[String]) -> usize {
        tokens.iter().filter(|t| t.starts_with("NUM_")).count()
    }

    #[test]
    fn test_three_record_scenario() {
        let dir = tempfile::tempdir().unwrap();
        three_records(dir.path());
        let (annotator, calls) = chain();

        let ds = PrepareUseCase::new(config(dir.path(), "math23k"))
            .with_annotator(annotator)
            .prepare()
            .unwrap();

        assert_eq!(calls.get(), 3);
        assert!(ds.vocab.seq_symbols.contains("+"));
        assert!(ds.vocab.tree_symbols.contains("+"));
        assert!(ds.generate_list().is_empty());
        assert_eq!(placeholders(ds.vocab.seq_symbols.tokens()), 2);
        assert_eq!(placeholders(ds.vocab.tree_symbols.tokens()), 2);

        let r = &ds.split(SplitKind::Train)[0];
        assert_eq!(r.prefix_equation, vec!["+", "NUM_0", "NUM_1"]);
        assert_eq!(r.pos.as_ref().map(Vec::len), Some(r.question.len()));
        assert_eq!(r.parse_tree.as_ref().map(|p| p[0]), Some(-1));
    }

    #[test]
    fn test_unary_minus_zero_is_generated() {
        let dir = tempfile::tempdir().unwrap();
        write_corpus(
            dir.path(),
            json!([{"id": 1, "question": "it was 2 below then rose 3", "equation": "x=-2+3"}]),
            json!([{"id": 2, "question": "Amy has 4 cats and 1 dog", "equation": "x=4-1"}]),
            json!([{"id": 3, "question": "5 kids share 10 sweets", "equation": "x=10/5"}]),
        );
        let cfg = PrepareConfig { parse_tree_file: None, ..config(dir.path(), "math23k") };

        let ds = PrepareUseCase::new(cfg).prepare().unwrap();

        assert_eq!(ds.split(SplitKind::Train)[0].prefix_equation, vec!["+", "-", "0", "NUM_0", "NUM_1"]);
        assert!(ds.generate_list().contains(&"0".to_string()));
        assert!(ds.vocab.tree_symbols.contains("0"));

        let sample = &ds.encode(SplitKind::Train)[0];
        let tree   = ds.vocab.tree_symbols.decode(&sample.tree_equation_ids);
        assert_eq!(tree, vec!["+", "-", "0", "NUM_0", "NUM_1"]);
        assert!(!tree.iter().any(|t| t == "<UNK>"));
    }

    #[test]
    fn test_cache_is_reused_on_second_run() {
        let dir = tempfile::tempdir().unwrap();
        three_records(dir.path());
        let cfg = config(dir.path(), "math23k");

        let (first, first_calls) = chain();
        PrepareUseCase::new(cfg.clone()).with_annotator(first).prepare().unwrap();
        assert_eq!(first_calls.get(), 3);

        let (second, second_calls) = chain();
        PrepareUseCase::new(cfg).with_annotator(second).prepare().unwrap();
        assert_eq!(second_calls.get(), 0);
    }

    #[test]
    fn test_execute_writes_loadable_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        three_records(dir.path());
        let cfg = config(dir.path(), "math23k");
        let (annotator, _) = chain();

        let ds = PrepareUseCase::new(cfg.clone()).with_annotator(annotator).execute().unwrap();

        let (loaded, saved_cfg) = ArtifactStore::new(&cfg.output_dir).load().unwrap();
        assert_eq!(loaded.vocab, ds.vocab);
        assert_eq!(saved_cfg.dataset, "math23k");
        assert!(Path::new(&cfg.output_dir).join("tokenizer.json").exists());
    }

    #[test]
    fn test_multi_equation_unknowns_lead_generate_list() {
        let dir = tempfile::tempdir().unwrap();
        write_corpus(
            dir.path(),
            json!([{"id": 1, "question": "x and y sum to 10 and differ by 2", "equation": "x+y=10;x-y=2"}]),
            json!([{"id": 1, "question": "twice x is 8", "equation": "2*x=8"}]),
            json!([]),
        );
        let mut cfg = config(dir.path(), "hmwp");
        cfg.task_type = TaskType::MultiEquation;
        let (annotator, _) = chain();

        let ds = PrepareUseCase::new(cfg).with_annotator(annotator).prepare().unwrap();

        assert_eq!(&ds.generate_list()[..2], &["x".to_string(), "y".to_string()]);
        assert!(ds.vocab.tree_symbols.contains("<BRG>"));
        assert!(ds.vocab.tree_symbols.contains("="));
        // hmwp ids are re-edited so the cache can key on them
        assert_ne!(ds.split(SplitKind::Train)[0].id, ds.split(SplitKind::Valid)[0].id);
    }

    #[test]
    fn test_missing_annotator_is_rejected_before_loading() {
        let dir = tempfile::tempdir().unwrap();
        // no corpus written: validation must fail first
        let err = PrepareUseCase::new(config(dir.path(), "math23k")).prepare().unwrap_err();
        assert!(err.to_string().contains("no annotator"));
    }

    #[test]
    fn test_output_dir_must_differ_from_dataset_dir() {
        let cfg = PrepareConfig {
            dataset_dir: "data/x".to_string(),
            output_dir:  "data/x".to_string(),
            ..PrepareConfig::default()
        };
        assert!(cfg.validate().is_err());
        assert!(PrepareConfig::default().validate().is_ok());
    }

    #[test]
    fn test_mask_capacity_surfaces_before_vocabularies() {
        let dir      = tempfile::tempdir().unwrap();
        let numbers: Vec<String> = (1..=27).map(|n| n.to_string()).collect();
        write_corpus(
            dir.path(),
            json!([{"id": 1, "question": numbers.join(" "), "equation": "x=1+2"}]),
            json!([]),
            json!([]),
        );
        let mut cfg = config(dir.path(), "math23k");
        cfg.mask_symbol     = MaskScheme::Alphabet;
        cfg.parse_tree_file = None;

        let err = PrepareUseCase::new(cfg).prepare().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DataError>(),
            Some(DataError::MaskCapacity { required: 27, available: 26, .. })
        ));
    }

    struct MemorySource(Splits<RawRecord>);

    impl CorpusSource for MemorySource {
        fn load_splits(&self) -> Result<Splits<RawRecord>> {
            Ok(self.0.clone())
        }
    }

    fn with_pi(records: &[RawRecord], options: &TransferOptions) -> Result<TransferOutput> {
        let mut out = single_transfer(records, options)?;
        out.generate_list.push("PI".to_string());
        Ok(out)
    }

    #[test]
    fn test_custom_source_and_registered_transfer() {
        let dir    = tempfile::tempdir().unwrap();
        let source = MemorySource(Splits::new(
            vec![RawRecord::new("a", "a circle of radius 2", "x=PI*2*2")],
            Vec::new(),
            Vec::new(),
        ));
        let mut registry = TransferRegistry::with_defaults();
        registry.register("circles", with_pi);

        let mut cfg = config(dir.path(), "circles");
        cfg.parse_tree_file = None;

        let ds = PrepareUseCase::new(cfg)
            .with_source(Box::new(source))
            .with_registry(registry)
            .prepare()
            .unwrap();
        assert!(ds.generate_list().contains(&"PI".to_string()));
        assert!(ds.vocab.tree_symbols.contains("PI"));
    }

    #[test]
    fn test_unknown_dataset_falls_back_to_task_default() {
        let dir = tempfile::tempdir().unwrap();
        three_records(dir.path());
        let mut cfg = config(dir.path(), "my-corpus");
        cfg.parse_tree_file = None;

        let ds = PrepareUseCase::new(cfg).prepare().unwrap();
        assert_eq!(ds.dataset, "my-corpus");
        assert!(ds.split(SplitKind::Train)[0].pos.is_none());
    }
}
