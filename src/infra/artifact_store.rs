// ============================================================
// Layer 6 — Artifact Store
// ============================================================
// Saves and restores everything `prepare` produces so training
// code (and `inspect`) can pick a dataset up without re-running
// the pipeline.
//
// Layout of the output directory:
//   prepared/math23k/
//     prepare_config.json   ← the configuration that produced it
//     vocab.json            ← four vocabularies, num_start1/2,
//                             generate list, copy counts,
//                             reserved indices
//     trainset.json         ← prepared records (all equation
//     validset.json           forms, pos, parse tree)
//     testset.json
//     tokenizer.json        ← written by TokenizerStore
//
// Why save the config?
//   The dataset name and task type are needed to rebuild the
//   MwpDataset, and the mask scheme documents what the
//   placeholder symbols in vocab.json mean.
//
// Reference: Rust Book §9 (Error Handling)

use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};

use crate::application::prepare_use_case::PrepareConfig;
use crate::data::dataset::MwpDataset;
use crate::data::vocab::MwpVocab;
use crate::domain::record::Record;
use crate::domain::split::{SplitKind, Splits};

const CONFIG_FILE: &str = "prepare_config.json";
const VOCAB_FILE:  &str = "vocab.json";

pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write config, vocabularies and the three prepared splits.
    pub fn save(&self, dataset: &MwpDataset, config: &PrepareConfig) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create output directory '{}'", self.dir.display()))?;

        self.save_config(config)?;
        self.save_vocab(&dataset.vocab)?;
        for kind in SplitKind::ALL {
            self.save_split(kind, dataset.split(kind))?;
        }

        tracing::info!("Saved prepared '{}' dataset to '{}'", dataset.dataset, self.dir.display());
        Ok(())
    }

    /// Rebuild the prepared dataset written by `save`.
    pub fn load(&self) -> Result<(MwpDataset, PrepareConfig)> {
        let config = self.load_config()?;
        let vocab  = self.load_vocab()?;
        let splits = Splits::new(
            self.load_split(SplitKind::Train)?,
            self.load_split(SplitKind::Valid)?,
            self.load_split(SplitKind::Test)?,
        );

        let dataset = MwpDataset::new(config.dataset.clone(), config.task_type, splits, vocab);
        Ok((dataset, config))
    }

    pub fn save_config(&self, config: &PrepareConfig) -> Result<()> {
        self.write_json(CONFIG_FILE, config)
    }

    pub fn load_config(&self) -> Result<PrepareConfig> {
        self.read_json(CONFIG_FILE).with_context(|| {
            format!("Has 'prepare' been run with --output-dir '{}'?", self.dir.display())
        })
    }

    pub fn save_vocab(&self, vocab: &MwpVocab) -> Result<()> {
        self.write_json(VOCAB_FILE, vocab)
    }

    pub fn load_vocab(&self) -> Result<MwpVocab> {
        self.read_json(VOCAB_FILE)
    }

    pub fn save_split(&self, kind: SplitKind, records: &[Record]) -> Result<()> {
        self.write_json(kind.file_name(), &records)
    }

    pub fn load_split(&self, kind: SplitKind) -> Result<Vec<Record>> {
        self.read_json(kind.file_name())
    }

    fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.dir.join(name);
        let file = fs::File::create(&path)
            .with_context(|| format!("Cannot create '{}'", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), value)
            .with_context(|| format!("Cannot write '{}'", path.display()))?;
        tracing::debug!("Wrote '{}'", path.display());
        Ok(())
    }

    fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let path = self.dir.join(name);
        let file = fs::File::open(&path)
            .with_context(|| format!("Cannot open '{}'", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Cannot parse '{}'", path.display()))
    }
}
