// ============================================================
// Layer 4 — Dataset Container
// ============================================================
// The finished product of preparation: three splits of prepared
// records plus the frozen vocabularies, and the encoding that
// turns a record into index sequences for model code.
//
//   Record ──encode──▶ MwpSample
//     question          → input_words ids     (unknown → <UNK>)
//     pos               → input_pos ids
//     infix equation    → seq_symbols ids + <EOS>
//     prefix equation   → tree_symbols ids
//     NUM* positions    → num_pos
//
// MwpSampleSet wraps encoded samples as a Burn Dataset so they
// can be fed to a DataLoader with MwpBatcher.
//
// Reference: Burn Book §4 (Dataset)

use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

use crate::data::vocab::MwpVocab;
use crate::domain::record::Record;
use crate::domain::split::{SplitKind, Splits};
use crate::domain::symbols::{TaskType, EOS_TOKEN, NUM_MARKER};

/// One encoded problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MwpSample {
    pub id:                String,
    pub question_ids:      Vec<usize>,
    pub pos_ids:           Vec<usize>,
    pub parse_tree:        Vec<i64>,
    /// Question positions holding a masked number
    pub num_pos:           Vec<usize>,
    pub seq_equation_ids:  Vec<usize>,
    pub tree_equation_ids: Vec<usize>,
}

#[derive(Debug)]
pub struct MwpDataset {
    pub dataset: String,
    pub task:    TaskType,
    pub splits:  Splits<Record>,
    pub vocab:   MwpVocab,
}

impl MwpDataset {
    pub fn new(dataset: impl Into<String>, task: TaskType, splits: Splits<Record>, vocab: MwpVocab) -> Self {
        Self { dataset: dataset.into(), task, splits, vocab }
    }

    pub fn split(&self, kind: SplitKind) -> &[Record] {
        self.splits.get(kind)
    }

    pub fn generate_list(&self) -> &[String] {
        &self.vocab.generate_list
    }

    pub fn operators(&self) -> &[String] {
        &self.vocab.operators
    }

    pub fn encode_record(&self, r: &Record) -> MwpSample {
        let v = &self.vocab;

        let mut seq_equation_ids = v.seq_symbols.encode(&r.infix_equation);
        seq_equation_ids.push(v.seq_symbols.index_or_unk(EOS_TOKEN));

        MwpSample {
            id:                r.id.clone(),
            question_ids:      v.input_words.encode(&r.question),
            pos_ids:           r.pos.as_deref().map(|p| v.input_pos.encode(p)).unwrap_or_default(),
            parse_tree:        r.parse_tree.clone().unwrap_or_default(),
            num_pos:           number_positions(&r.question),
            seq_equation_ids,
            tree_equation_ids: v.tree_symbols.encode(&r.prefix_equation),
        }
    }

    pub fn encode(&self, kind: SplitKind) -> Vec<MwpSample> {
        self.split(kind).iter().map(|r| self.encode_record(r)).collect()
    }

    pub fn sample_set(&self, kind: SplitKind) -> MwpSampleSet {
        MwpSampleSet::new(self.encode(kind))
    }
}

fn number_positions(question: &[String]) -> Vec<usize> {
    question
        .iter()
        .enumerate()
        .filter(|(_, t)| t.as_str() == NUM_MARKER || t.starts_with("NUM_"))
        .map(|(i, _)| i)
        .collect()
}

// ─── Burn Dataset ─────────────────────────────────────────────────────────────
pub struct MwpSampleSet {
    samples: Vec<MwpSample>,
}

impl MwpSampleSet {
    pub fn new(samples: Vec<MwpSample>) -> Self { Self { samples } }
}

impl Dataset<MwpSample> for MwpSampleSet {
    fn get(&self, index: usize) -> Option<MwpSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data::equation::normalize_record;
    use crate::data::vocab::{CopyCounts, VocabSettings};
    use crate::domain::record::{Annotation, MaskedRecord};
    use crate::domain::symbols::MaskScheme;
    use serde_json::Value;

    fn split(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    pub(crate) fn tiny_dataset() -> MwpDataset {
        let rec = |id: &str, q: &str, e: &str| {
            normalize_record(MaskedRecord {
                id:       id.to_string(),
                question: split(q),
                equation: split(e),
                num_list: vec!["2".to_string(), "3".to_string()],
                answer:   Value::Null,
            })
            .unwrap()
        };

        let train = rec("1", "tom has NUM apples and NUM pears", "NUM_0 + NUM_1")
            .with_annotation(Annotation {
                pos:        split("NNP VBZ CD NNS CC CD NNS"),
                parse_tree: vec![1, -1, 3, 1, 3, 6, 3],
            })
            .unwrap();
        let valid = rec("2", "NUM kids share NUM sweets", "NUM_1 / NUM_0");
        let test  = rec("3", "NUM minus NUM", "NUM_0 - NUM_1");

        let splits   = Splits::new(vec![train], vec![valid], vec![test]);
        let settings = VocabSettings {
            task:            TaskType::SingleEquation,
            mask:            MaskScheme::Num,
            min_word_keep:   0,
            share_vocab:     false,
            symbol_for_tree: false,
            generate_list:   Vec::new(),
            copy_counts:     CopyCounts { train: 2, valid: 2, test: 2 },
        };
        let vocab = MwpVocab::build(&splits.train, &settings).unwrap();
        MwpDataset::new("tiny", TaskType::SingleEquation, splits, vocab)
    }

    #[test]
    fn test_encode_training_record() {
        let ds = tiny_dataset();
        let s  = &ds.encode(SplitKind::Train)[0];

        assert_eq!(ds.vocab.input_words.decode(&s.question_ids), split("tom has NUM apples and NUM pears"));
        assert_eq!(s.num_pos, vec![2, 5]);
        assert_eq!(s.pos_ids.len(), 7);
        assert_eq!(s.parse_tree, vec![1, -1, 3, 1, 3, 6, 3]);
        assert_eq!(ds.vocab.seq_symbols.decode(&s.seq_equation_ids), split("NUM_0 + NUM_1 <EOS>"));
        assert_eq!(ds.vocab.tree_symbols.decode(&s.tree_equation_ids), split("+ NUM_0 NUM_1"));
    }

    #[test]
    fn test_unseen_words_map_to_unk() {
        let ds  = tiny_dataset();
        let s   = &ds.encode(SplitKind::Valid)[0];
        let unk = ds.vocab.reserved.input_words.unk.unwrap();
        // "kids", "share" and "sweets" never occur in training
        assert_eq!(s.question_ids.iter().filter(|&&i| i == unk).count(), 3);
        assert!(s.pos_ids.is_empty());
    }

    #[test]
    fn test_sample_set_is_a_burn_dataset() {
        let ds  = tiny_dataset();
        let set = ds.sample_set(SplitKind::Test);
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(0).map(|s| s.id), Some("3".to_string()));
        assert!(set.get(1).is_none());
    }
}
