// ============================================================
// Layer 6 — Annotation Cache
// ============================================================
// Persists part-of-speech tags and dependency parents per record
// so the slow external annotator runs once per dataset, not once
// per experiment.
//
// File format (one JSON document, written whole):
//
//   [
//     {"id": "1", "xpos": ["NR", "VV", ...], "parse tree": [1, -1, ...]},
//     ...
//   ]
//
// "parse tree" holds 0-based parent indices; the root is -1.
//
// Flow:
//   load_or_build(splits, annotator, rebuild)
//     ├─ file exists && !rebuild → read
//     └─ otherwise               → build → read
//   read  → id ↦ annotation map (duplicate ids rejected)
//   attach → new records carrying pos / parse tree
//
// The cache is trusted as-is once written: nothing checks that
// it still matches the records it was built from.
//
// Reference: Rust Book §9 (Error Handling), §8 (Hash Maps)

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::error::DataError;
use crate::domain::record::{Annotation, Record};
use crate::domain::split::Splits;
use crate::domain::traits::Annotator;

/// One record's entry in the cache file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub id:   String,
    pub xpos: Vec<String>,
    #[serde(rename = "parse tree")]
    pub parse_tree: Vec<i64>,
}

pub struct AnnotationCache {
    path: PathBuf,
}

impl AnnotationCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read the cache if present, otherwise (or when `rebuild`) build it
    /// first. Returns the records with annotations attached.
    pub fn load_or_build(
        &self,
        splits:    Splits<Record>,
        annotator: Option<&dyn Annotator>,
        rebuild:   bool,
    ) -> Result<Splits<Record>> {
        if self.exists() && !rebuild {
            tracing::info!("Reading pos information from '{}'", self.path.display());
        } else {
            let Some(annotator) = annotator else {
                bail!(
                    "annotation cache '{}' must be built but no annotator is configured",
                    self.path.display()
                );
            };
            tracing::info!("Building pos information to '{}'", self.path.display());
            self.build(&splits, annotator)?;
        }

        let entries = self.read()?;
        Ok(attach(splits, &entries)?)
    }

    /// Annotate every record of every split and write the cache file.
    /// Any annotator failure aborts before anything is written.
    pub fn build(&self, splits: &Splits<Record>, annotator: &dyn Annotator) -> Result<usize> {
        let mut seen = HashSet::new();
        for (_, r) in splits.iter() {
            if !seen.insert(r.id.as_str()) {
                return Err(DataError::DuplicateRecordId { id: r.id.clone() }.into());
            }
        }

        let mut entries = Vec::with_capacity(splits.len());
        for (kind, r) in splits.iter() {
            entries.push(annotate_record(r, annotator)?);
            if entries.len() % 1000 == 0 {
                tracing::debug!("Annotated {} records ({} split)", entries.len(), kind);
            }
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create '{}'", parent.display()))?;
        }
        let file = fs::File::create(&self.path)
            .with_context(|| format!("Cannot create annotation cache '{}'", self.path.display()))?;
        serde_json::to_writer(BufWriter::new(file), &entries)
            .with_context(|| format!("Cannot write annotation cache '{}'", self.path.display()))?;

        tracing::info!("Wrote {} annotations to '{}'", entries.len(), self.path.display());
        Ok(entries.len())
    }

    /// Load the cache as an id → annotation map.
    pub fn read(&self) -> Result<HashMap<String, Annotation>> {
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read annotation cache '{}'", self.path.display()))?;
        let entries: Vec<CacheEntry> = serde_json::from_str(&text)
            .with_context(|| format!("'{}' is not a valid annotation cache", self.path.display()))?;

        let mut map = HashMap::with_capacity(entries.len());
        for entry in entries {
            if map.contains_key(&entry.id) {
                return Err(DataError::DuplicateAnnotation { id: entry.id }.into());
            }
            map.insert(entry.id, Annotation { pos: entry.xpos, parse_tree: entry.parse_tree });
        }
        Ok(map)
    }
}

fn annotate_record(record: &Record, annotator: &dyn Annotator) -> Result<CacheEntry, DataError> {
    let tags = annotator
        .annotate(&record.question)
        .map_err(|e| DataError::Annotator { id: record.id.clone(), message: format!("{e:#}") })?;

    if tags.len() != record.question.len() {
        return Err(DataError::AnnotationLength {
            id:      record.id.clone(),
            tokens:  record.question.len(),
            tags:    tags.len(),
            parents: tags.len(),
        });
    }

    let (xpos, parse_tree) = tags
        .into_iter()
        .map(|t| (t.xpos, t.head as i64 - 1))
        .unzip();

    Ok(CacheEntry { id: record.id.clone(), xpos, parse_tree })
}

/// Attach cached annotations to every record.
/// A record without an entry fails with MissingAnnotation.
pub fn attach(
    splits:  Splits<Record>,
    entries: &HashMap<String, Annotation>,
) -> Result<Splits<Record>, DataError> {
    splits.try_map(|_, records| {
        records
            .into_iter()
            .map(|r| {
                let annotation = entries
                    .get(&r.id)
                    .cloned()
                    .ok_or_else(|| DataError::MissingAnnotation { id: r.id.clone() })?;
                r.with_annotation(annotation)
            })
            .collect()
    })
}
