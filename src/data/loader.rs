// ============================================================
// Layer 4 — Corpus Loader
// ============================================================
// Loads the three splits of a math-word-problem corpus from a
// dataset directory laid out the usual way:
//
//   data/math23k/
//     trainset.json    ← JSON array of problem objects
//     validset.json
//     testset.json
//
// Corpora disagree on field names, so each record is read as a
// JSON object and the fields are picked by priority:
//
//   id        id | iIndex              (number or string)
//   question  question | segmented_text | original_text
//             | sQuestion | Body + Question
//   equation  equation | Equation | lEquations (list joined by ;)
//   answer    ans | answer | Answer | lSolutions
//
// Everything else is kept in RawRecord::extra.
//
// Reference: Rust Book §9 (Error Handling)

use std::collections::HashMap;
use std::{fs, path::{Path, PathBuf}};

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};

use crate::domain::record::RawRecord;
use crate::domain::split::{SplitKind, Splits};
use crate::domain::traits::CorpusSource;

const ID_KEYS:       [&str; 2] = ["id", "iIndex"];
const QUESTION_KEYS: [&str; 4] = ["question", "segmented_text", "original_text", "sQuestion"];
const EQUATION_KEYS: [&str; 3] = ["equation", "Equation", "lEquations"];
const ANSWER_KEYS:   [&str; 4] = ["ans", "answer", "Answer", "lSolutions"];

/// Loads trainset.json / validset.json / testset.json from a directory.
pub struct JsonCorpusLoader {
    dir: PathBuf,
}

impl JsonCorpusLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn load_split(&self, kind: SplitKind) -> Result<Vec<RawRecord>> {
        let path = self.dir.join(kind.file_name());

        if !path.exists() {
            if kind == SplitKind::Train {
                bail!("training split '{}' does not exist", path.display());
            }
            tracing::warn!("{} split '{}' does not exist, using an empty split", kind, path.display());
            return Ok(Vec::new());
        }

        let text = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        let items: Vec<Map<String, Value>> = serde_json::from_str(&text)
            .with_context(|| format!("'{}' is not a JSON array of objects", path.display()))?;

        let records = items
            .into_iter()
            .enumerate()
            .map(|(index, obj)| raw_record_from_json(kind, index, obj))
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("Invalid record in '{}'", path.display()))?;

        tracing::debug!("Loaded {} {} records from '{}'", records.len(), kind, path.display());
        Ok(records)
    }
}

impl CorpusSource for JsonCorpusLoader {
    fn load_splits(&self) -> Result<Splits<RawRecord>> {
        let splits = Splits::new(
            self.load_split(SplitKind::Train)?,
            self.load_split(SplitKind::Valid)?,
            self.load_split(SplitKind::Test)?,
        );
        tracing::info!(
            "Loaded corpus from '{}': {} train, {} valid, {} test",
            self.dir.display(),
            splits.train.len(),
            splits.valid.len(),
            splits.test.len(),
        );
        Ok(splits)
    }
}

/// Build a RawRecord from one corpus object.
pub fn raw_record_from_json(
    kind:    SplitKind,
    index:   usize,
    mut obj: Map<String, Value>,
) -> Result<RawRecord> {
    let id = match take_first(&mut obj, &ID_KEYS) {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => bail!("record {index}: unsupported id {other}"),
        None => format!("{kind}-{index}"),
    };

    let question = match take_first(&mut obj, &QUESTION_KEYS) {
        Some(v) => text_of(v),
        None => {
            // SVAMP-style: body and question stored apart
            let body = obj.remove("Body").map(text_of).unwrap_or_default();
            let ques = obj.remove("Question").map(text_of).unwrap_or_default();
            let joined = format!("{body} {ques}");
            if joined.trim().is_empty() {
                bail!("record '{id}' has no question text");
            }
            joined.trim().to_string()
        }
    };

    let equation = match take_first(&mut obj, &EQUATION_KEYS) {
        Some(Value::Array(parts)) => parts
            .into_iter()
            .map(text_of)
            .collect::<Vec<_>>()
            .join(" ; "),
        Some(v) => text_of(v),
        None => bail!("record '{id}' has no equation"),
    };

    let answer = take_first(&mut obj, &ANSWER_KEYS).unwrap_or(Value::Null);

    Ok(RawRecord { id, question, equation, answer, extra: obj })
}

fn take_first(obj: &mut Map<String, Value>, keys: &[&str]) -> Option<Value> {
    let key = keys.iter().find(|k| obj.contains_key(**k))?;
    obj.remove(*key)
}

fn text_of(v: Value) -> String {
    match v {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

// ─── Id re-edit ───────────────────────────────────────────────────────────────
/// Make ids unique across splits. Every id that occurs more than
/// once is rewritten to "{id}-{n}", n counting occurrences in
/// train → valid → test order. Ids that are already unique stay.
pub fn reedit_ids(splits: Splits<RawRecord>) -> Splits<RawRecord> {
    let mut totals: HashMap<String, usize> = HashMap::new();
    for (_, r) in splits.iter() {
        *totals.entry(r.id.clone()).or_insert(0) += 1;
    }

    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut rename = |r: RawRecord| -> RawRecord {
        if totals.get(&r.id).copied().unwrap_or(0) <= 1 {
            return r;
        }
        let n = seen.entry(r.id.clone()).or_insert(0);
        let id = format!("{}-{}", r.id, n);
        *n += 1;
        RawRecord { id, ..r }
    };

    Splits {
        train: splits.train.into_iter().map(&mut rename).collect(),
        valid: splits.valid.into_iter().map(&mut rename).collect(),
        test:  splits.test.into_iter().map(&mut rename).collect(),
    }
}

/// Datasets known to reuse ids across splits.
pub fn needs_id_reedit(dataset: &str) -> bool {
    matches!(dataset, "hmwp")
}

// Tests write corpus files under tempfile::TempDir.
#[cfg(test)]
pub(crate) fn write_split(dir: &Path, kind: SplitKind, items: &Value) {
    fs::write(dir.join(kind.file_name()), serde_json::to_string(items).unwrap()).unwrap();
}
