// ============================================================
// Layer 4 — Vocabulary Builder
// ============================================================
// Builds the four vocabularies of a prepared dataset from the
// training split only:
//
//   input_words   [<PAD> <SOS> <EOS> <UNK>] + frequent words + every NUM* token
//   input_pos     [<PAD> <UNK>]             + frequent pos tags
//   seq_symbols   [<PAD> (<SOS>) <EOS>] + operators
//                   ── num_start2 ──
//                 + generate list + placeholders + identifiers + <UNK>
//   tree_symbols  operators
//                   ── num_start1 ──
//                 + generate list + placeholders + <UNK>
//
// Construction order matters: the index of every symbol depends
// on what was inserted before it, so the steps run strictly in
// sequence and every counter is first-seen ordered (never sorted
// by frequency).
//
// Copy counts differ per decoder:
//   tree decoders    → maximum over train / valid / test
//   sequence decoder → training maximum (or the cross-split
//                      maximum when symbol_for_tree is set)
//
// Reference: Rust Book §8 (Storing Keys with Associated Values in Hash Maps)

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::error::DataError;
use crate::domain::record::Record;
use crate::domain::symbols::{MaskScheme, TaskType, EOS_TOKEN, NUM_MARKER, PAD_TOKEN, SOS_TOKEN, UNK_TOKEN};

// ─── FrequencyCounter ─────────────────────────────────────────────────────────
/// Token counts that remember first-seen order.
#[derive(Debug, Clone, Default)]
pub struct FrequencyCounter {
    order:  Vec<String>,
    counts: HashMap<String, usize>,
}

impl FrequencyCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, token: &str) {
        match self.counts.get_mut(token) {
            Some(count) => *count += 1,
            None => {
                self.order.push(token.to_string());
                self.counts.insert(token.to_string(), 1);
            }
        }
    }

    pub fn extend<'a>(&mut self, tokens: impl IntoIterator<Item = &'a String>) {
        for token in tokens {
            self.add(token);
        }
    }

    pub fn count(&self, token: &str) -> usize {
        self.counts.get(token).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Tokens whose count passes `keep`, in first-seen order.
    pub fn keep(&self, keep: impl Fn(usize) -> bool) -> Vec<String> {
        self.order
            .iter()
            .filter(|t| keep(self.count(t)))
            .cloned()
            .collect()
    }
}

// ─── Vocabulary ───────────────────────────────────────────────────────────────
/// An ordered symbol table: token ↔ dense index.
///
/// Serialises as its plain token list; loading rejects duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Vocabulary {
    idx2token: Vec<String>,
    token2idx: HashMap<String, usize>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens<S: AsRef<str>>(tokens: &[S]) -> Self {
        let mut vocab = Self::new();
        for t in tokens {
            vocab.push(t.as_ref());
        }
        vocab
    }

    /// Append `token` unless present; returns its index either way.
    pub fn push(&mut self, token: &str) -> usize {
        if let Some(&i) = self.token2idx.get(token) {
            return i;
        }
        let i = self.idx2token.len();
        self.idx2token.push(token.to_string());
        self.token2idx.insert(token.to_string(), i);
        i
    }

    /// Insert a new token at `at`, shifting later tokens up by one.
    pub fn insert(&mut self, at: usize, token: &str) {
        if self.token2idx.contains_key(token) {
            return;
        }
        self.idx2token.insert(at, token.to_string());
        for (i, t) in self.idx2token.iter().enumerate().skip(at) {
            self.token2idx.insert(t.clone(), i);
        }
    }

    pub fn len(&self) -> usize {
        self.idx2token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idx2token.is_empty()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.token2idx.contains_key(token)
    }

    pub fn index(&self, token: &str) -> Option<usize> {
        self.token2idx.get(token).copied()
    }

    pub fn token(&self, index: usize) -> Option<&str> {
        self.idx2token.get(index).map(String::as_str)
    }

    pub fn tokens(&self) -> &[String] {
        &self.idx2token
    }

    /// Index of `token`, falling back to `<UNK>` (or 0 without one).
    pub fn index_or_unk(&self, token: &str) -> usize {
        self.index(token)
            .or_else(|| self.index(UNK_TOKEN))
            .unwrap_or(0)
    }

    pub fn encode(&self, tokens: &[String]) -> Vec<usize> {
        tokens.iter().map(|t| self.index_or_unk(t)).collect()
    }

    pub fn decode(&self, ids: &[usize]) -> Vec<String> {
        ids.iter()
            .map(|&i| self.token(i).unwrap_or(UNK_TOKEN).to_string())
            .collect()
    }

    pub fn reserved(&self) -> ReservedIndices {
        ReservedIndices {
            pad: self.index(PAD_TOKEN),
            sos: self.index(SOS_TOKEN),
            eos: self.index(EOS_TOKEN),
            unk: self.index(UNK_TOKEN),
        }
    }
}

impl TryFrom<Vec<String>> for Vocabulary {
    type Error = String;

    fn try_from(tokens: Vec<String>) -> Result<Self, Self::Error> {
        let mut vocab = Self::new();
        for t in &tokens {
            if vocab.contains(t) {
                return Err(format!("vocabulary lists '{t}' twice"));
            }
            vocab.push(t);
        }
        Ok(vocab)
    }
}

impl From<Vocabulary> for Vec<String> {
    fn from(v: Vocabulary) -> Self {
        v.idx2token
    }
}

/// Positions of the control symbols a vocabulary carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservedIndices {
    pub pad: Option<usize>,
    pub sos: Option<usize>,
    pub eos: Option<usize>,
    pub unk: Option<usize>,
}

// ─── Copy counts ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyCounts {
    pub train: usize,
    pub valid: usize,
    pub test:  usize,
}

impl CopyCounts {
    pub fn cross_split_max(&self) -> usize {
        self.train.max(self.valid).max(self.test)
    }

    /// Placeholders provisioned for tree decoders.
    pub fn for_tree(&self) -> usize {
        self.cross_split_max()
    }

    /// Placeholders provisioned for the sequence decoder.
    pub fn for_sequence(&self, symbol_for_tree: bool) -> usize {
        if symbol_for_tree {
            self.cross_split_max()
        } else {
            self.train
        }
    }
}

// ─── Builders ─────────────────────────────────────────────────────────────────
/// Input words: reserved symbols, then every training word seen more
/// than `min_word_keep` times or containing "NUM".
pub fn build_input_vocab(train: &[Record], min_word_keep: usize) -> Vocabulary {
    let mut counter = FrequencyCounter::new();
    for r in train {
        counter.extend(&r.question);
    }

    let mut vocab = Vocabulary::with_tokens(&[PAD_TOKEN, SOS_TOKEN, EOS_TOKEN, UNK_TOKEN]);
    for word in counter.keep(|_| true) {
        if counter.count(&word) > min_word_keep || word.contains(NUM_MARKER) {
            vocab.push(&word);
        }
    }
    vocab
}

/// Pos tags: `<PAD>`, `<UNK>`, then every tag seen more than
/// `min_word_keep` times. Unannotated records contribute nothing.
pub fn build_pos_vocab(train: &[Record], min_word_keep: usize) -> Vocabulary {
    let mut counter = FrequencyCounter::new();
    for pos in train.iter().filter_map(|r| r.pos.as_ref()) {
        counter.extend(pos);
    }

    let mut vocab = Vocabulary::with_tokens(&[PAD_TOKEN, UNK_TOKEN]);
    for tag in counter.keep(|count| count > min_word_keep) {
        vocab.push(&tag);
    }
    vocab
}

/// A decoder vocabulary with the index where numeric symbols begin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolVocab {
    pub vocab:     Vocabulary,
    pub num_start: usize,
}

/// Output symbols of sequence decoders.
pub fn build_sequence_symbols(
    train:         &[Record],
    operators:     &[String],
    generate_list: &[String],
    mask:          MaskScheme,
    copy_nums:     usize,
    share_vocab:   bool,
) -> Result<SymbolVocab, DataError> {
    let reserved: &[&str] = if share_vocab {
        &[PAD_TOKEN, EOS_TOKEN]
    } else {
        &[PAD_TOKEN, SOS_TOKEN, EOS_TOKEN]
    };
    let mut vocab = Vocabulary::with_tokens(reserved);
    for op in operators {
        vocab.push(op);
    }

    let mut num_start = vocab.len();
    for symbol in generate_list {
        vocab.push(symbol);
    }
    for placeholder in mask.placeholders(copy_nums)? {
        vocab.push(&placeholder);
    }

    for token in train.iter().flat_map(|r| r.equation.iter()) {
        if vocab.contains(token) {
            continue;
        }
        let Some(first) = token.chars().next() else { continue };
        if first.is_numeric() {
            // rare constant, left to <UNK>
            continue;
        }
        if !first.is_alphanumeric() {
            // structural symbols stay inside the operator block
            vocab.insert(num_start, token);
            num_start += 1;
        } else {
            vocab.push(token);
        }
    }

    vocab.push(UNK_TOKEN);
    Ok(SymbolVocab { vocab, num_start })
}

/// Output symbols of tree decoders.
pub fn build_tree_symbols(
    operators:     &[String],
    generate_list: &[String],
    mask:          MaskScheme,
    copy_nums:     usize,
) -> Result<SymbolVocab, DataError> {
    let mut vocab = Vocabulary::with_tokens(operators);
    let num_start = vocab.len();

    for symbol in generate_list {
        vocab.push(symbol);
    }
    for placeholder in mask.placeholders(copy_nums)? {
        vocab.push(&placeholder);
    }

    vocab.push(UNK_TOKEN);
    Ok(SymbolVocab { vocab, num_start })
}

// ─── MwpVocab ─────────────────────────────────────────────────────────────────
/// Everything vocabulary construction needs besides the records.
#[derive(Debug, Clone)]
pub struct VocabSettings {
    pub task:            TaskType,
    pub mask:            MaskScheme,
    pub min_word_keep:   usize,
    pub share_vocab:     bool,
    pub symbol_for_tree: bool,
    pub generate_list:   Vec<String>,
    pub copy_counts:     CopyCounts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservedTable {
    pub input_words:  ReservedIndices,
    pub input_pos:    ReservedIndices,
    pub tree_symbols: ReservedIndices,
    pub seq_symbols:  ReservedIndices,
}

/// The four frozen vocabularies of a prepared dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MwpVocab {
    pub input_words:    Vocabulary,
    pub input_pos:      Vocabulary,
    pub tree_symbols:   Vocabulary,
    pub seq_symbols:    Vocabulary,
    pub num_start1:     usize,
    pub num_start2:     usize,
    pub operators:      Vec<String>,
    pub generate_list:  Vec<String>,
    pub copy_counts:    CopyCounts,
    pub tree_copy_nums: usize,
    pub seq_copy_nums:  usize,
    pub reserved:       ReservedTable,
}

impl MwpVocab {
    pub fn build(train: &[Record], settings: &VocabSettings) -> Result<Self, DataError> {
        let operators      = settings.task.operators();
        let tree_copy_nums = settings.copy_counts.for_tree();
        let seq_copy_nums  = settings.copy_counts.for_sequence(settings.symbol_for_tree);

        let input_words = build_input_vocab(train, settings.min_word_keep);
        let input_pos   = build_pos_vocab(train, settings.min_word_keep);

        let seq = build_sequence_symbols(
            train,
            &operators,
            &settings.generate_list,
            settings.mask,
            seq_copy_nums,
            settings.share_vocab,
        )?;
        let tree = build_tree_symbols(&operators, &settings.generate_list, settings.mask, tree_copy_nums)?;

        tracing::debug!(
            "Vocabularies: {} words, {} pos tags, {} tree symbols, {} sequence symbols",
            input_words.len(),
            input_pos.len(),
            tree.vocab.len(),
            seq.vocab.len(),
        );

        let reserved = ReservedTable {
            input_words:  input_words.reserved(),
            input_pos:    input_pos.reserved(),
            tree_symbols: tree.vocab.reserved(),
            seq_symbols:  seq.vocab.reserved(),
        };

        Ok(Self {
            input_words,
            input_pos,
            tree_symbols:  tree.vocab,
            seq_symbols:   seq.vocab,
            num_start1:    tree.num_start,
            num_start2:    seq.num_start,
            operators,
            generate_list: settings.generate_list.clone(),
            copy_counts:   settings.copy_counts,
            tree_copy_nums,
            seq_copy_nums,
            reserved,
        })
    }

    /// Training symbols missing from an output vocabulary.
    ///
    /// The sequence vocabulary is checked against infix equations, the
    /// tree vocabulary against prefix equations. Numeric constants below
    /// the generate threshold resolve to `<UNK>` and are not reported.
    pub fn uncovered_symbols(&self, train: &[Record]) -> Vec<DataError> {
        let mut misses = Vec::new();
        for r in train {
            check_tokens(&self.seq_symbols, "sequence", &r.infix_equation, &r.id, &mut misses);
            check_tokens(&self.tree_symbols, "tree", &r.prefix_equation, &r.id, &mut misses);
        }
        misses
    }
}

fn check_tokens(
    vocab:  &Vocabulary,
    name:   &'static str,
    tokens: &[String],
    id:     &str,
    misses: &mut Vec<DataError>,
) {
    for token in tokens {
        let is_constant = token.chars().next().is_some_and(char::is_numeric);
        if !vocab.contains(token) && !is_constant {
            misses.push(DataError::UncoveredSymbol {
                vocab:  name,
                symbol: token.clone(),
                id:     id.to_string(),
            });
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::equation::normalize_record;
    use crate::domain::record::MaskedRecord;
    use serde_json::Value;

    fn record(id: &str, question: &str, equation: &str) -> Record {
        let split = |s: &str| s.split_whitespace().map(String::from).collect::<Vec<_>>();
        normalize_record(MaskedRecord {
            id:       id.to_string(),
            question: split(question),
            equation: split(equation),
            num_list: Vec::new(),
            answer:   Value::Null,
        })
        .unwrap()
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn settings(copy_counts: CopyCounts) -> VocabSettings {
        VocabSettings {
            task:            TaskType::SingleEquation,
            mask:            MaskScheme::Number,
            min_word_keep:   0,
            share_vocab:     false,
            symbol_for_tree: false,
            generate_list:   Vec::new(),
            copy_counts,
        }
    }

    #[test]
    fn test_counter_keeps_first_seen_order() {
        let mut c = FrequencyCounter::new();
        for t in ["b", "a", "b", "c", "a", "b"] {
            c.add(t);
        }
        assert_eq!(c.keep(|_| true), vec!["b", "a", "c"]);
        assert_eq!(c.keep(|n| n >= 2), vec!["b", "a"]);
        assert_eq!(c.count("z"), 0);
    }

    #[test]
    fn test_vocabulary_index_bijection() {
        let mut v = Vocabulary::with_tokens(&["<PAD>", "+", "-", "NUM_0"]);
        v.insert(3, "(");
        v.insert(4, ")");
        v.push("x");
        for i in 0..v.len() {
            assert_eq!(v.index(v.token(i).unwrap()), Some(i));
        }
        assert_eq!(v.tokens(), &strings(&["<PAD>", "+", "-", "(", ")", "NUM_0", "x"])[..]);
    }

    #[test]
    fn test_vocabulary_serde_rejects_duplicates() {
        let v = Vocabulary::with_tokens(&["<PAD>", "a"]);
        assert_eq!(serde_json::to_string(&v).unwrap(), r#"["<PAD>","a"]"#);
        assert!(serde_json::from_str::<Vocabulary>(r#"["a","a"]"#).is_err());
    }

    #[test]
    fn test_input_vocab_keeps_frequent_words_and_numbers() {
        let train = vec![
            record("1", "tom has NUM apples", "NUM_0"),
            record("2", "tom ate NUM_a pears", "NUM_0"),
        ];
        let v = build_input_vocab(&train, 1);
        // only "tom" occurs more than once; masked numbers always stay
        assert_eq!(v.tokens(), &strings(&["<PAD>", "<SOS>", "<EOS>", "<UNK>", "tom", "NUM", "NUM_a"])[..]);
        assert_eq!(v.reserved().pad, Some(0));
    }

    #[test]
    fn test_pos_vocab_has_two_reserved_symbols() {
        let mut r = record("1", "a b", "NUM_0");
        r.pos = Some(strings(&["NN", "VV"]));
        r.parse_tree = Some(vec![-1, 0]);
        let v = build_pos_vocab(&[r], 0);
        assert_eq!(v.tokens(), &strings(&["<PAD>", "<UNK>", "NN", "VV"])[..]);
    }

    #[test]
    fn test_sequence_symbols_layout() {
        let train = vec![record("1", "q", "( NUM_0 + 1 ) * x")];
        let ops   = TaskType::SingleEquation.operators();
        let gen   = strings(&["3.14"]);
        let seq   = build_sequence_symbols(&train, &ops, &gen, MaskScheme::Number, 2, false).unwrap();

        assert_eq!(
            seq.vocab.tokens(),
            &strings(&[
                "<PAD>", "<SOS>", "<EOS>", "+", "-", "*", "/", "^", "(", ")",
                "3.14", "NUM_0", "NUM_1", "x", "<UNK>",
            ])[..]
        );
        assert_eq!(seq.num_start, 10);
        assert_eq!(seq.vocab.index(UNK_TOKEN), Some(seq.vocab.len() - 1));
    }

    #[test]
    fn test_shared_vocab_drops_start_symbol() {
        let ops = TaskType::SingleEquation.operators();
        let seq = build_sequence_symbols(&[], &ops, &[], MaskScheme::Number, 1, true).unwrap();
        assert_eq!(seq.vocab.token(1), Some(EOS_TOKEN));
        assert!(!seq.vocab.contains(SOS_TOKEN));
        assert_eq!(seq.num_start, 7);
    }

    #[test]
    fn test_tree_symbols_layout() {
        let ops  = TaskType::MultiEquation.operators();
        let gen  = strings(&["x", "y", "1"]);
        let tree = build_tree_symbols(&ops, &gen, MaskScheme::Alphabet, 2).unwrap();
        assert_eq!(tree.num_start, 7);
        assert_eq!(
            &tree.vocab.tokens()[7..],
            &strings(&["x", "y", "1", "NUM_a", "NUM_b", "<UNK>"])[..]
        );
    }

    #[test]
    fn test_mask_capacity_error_names_counts() {
        let ops = TaskType::SingleEquation.operators();
        let err = build_tree_symbols(&ops, &[], MaskScheme::Alphabet, 30).unwrap_err();
        assert!(matches!(err, DataError::MaskCapacity { required: 30, available: 26, .. }));
    }

    // The asymmetry is deliberate: tree decoders get the worst case over
    // every split, the sequence decoder only what training needs.
    #[test]
    fn test_copy_count_asymmetry_between_decoders() {
        let counts = CopyCounts { train: 3, valid: 5, test: 2 };
        let train  = vec![record("1", "NUM NUM NUM", "NUM_0 + NUM_1 + NUM_2")];
        let vocab  = MwpVocab::build(&train, &settings(counts)).unwrap();

        assert_eq!(vocab.tree_copy_nums, 5);
        assert_eq!(vocab.seq_copy_nums, 3);
        assert!(vocab.tree_symbols.contains("NUM_4"));
        assert!(vocab.seq_symbols.contains("NUM_2"));
        assert!(!vocab.seq_symbols.contains("NUM_3"));

        let mut for_tree = settings(counts);
        for_tree.symbol_for_tree = true;
        let vocab = MwpVocab::build(&train, &for_tree).unwrap();
        assert_eq!(vocab.seq_copy_nums, 5);
    }

    #[test]
    fn test_build_fails_when_placeholders_do_not_fit() {
        let mut s = settings(CopyCounts { train: 5, valid: 5, test: 5 });
        s.mask = MaskScheme::Alphabet;
        s.copy_counts.valid = 40;
        let err = MwpVocab::build(&[], &s).unwrap_err();
        assert!(matches!(err, DataError::MaskCapacity { required: 40, .. }));
    }

    #[test]
    fn test_reserved_symbols_in_every_vocabulary() {
        let train = vec![record("1", "NUM plus NUM", "NUM_0 + NUM_1")];
        let vocab = MwpVocab::build(&train, &settings(CopyCounts { train: 2, valid: 2, test: 2 })).unwrap();

        assert_eq!(vocab.reserved.input_words.pad, Some(0));
        assert_eq!(vocab.reserved.input_pos.pad, Some(0));
        assert_eq!(vocab.reserved.seq_symbols.pad, Some(0));
        assert_eq!(vocab.reserved.tree_symbols.pad, None);
        assert_eq!(vocab.reserved.seq_symbols.unk, Some(vocab.seq_symbols.len() - 1));
        assert_eq!(vocab.reserved.tree_symbols.unk, Some(vocab.tree_symbols.len() - 1));
    }

    #[test]
    fn test_training_symbols_are_covered() {
        let train = vec![
            record("1", "NUM and NUM", "( NUM_0 + NUM_1 ) / 2"),
            record("2", "NUM", "NUM_0 ^ 2"),
        ];
        let mut s = settings(CopyCounts { train: 2, valid: 1, test: 1 });
        s.generate_list = strings(&["2"]);
        let vocab = MwpVocab::build(&train, &s).unwrap();
        assert!(vocab.uncovered_symbols(&train).is_empty());

        for r in &train {
            for t in &r.infix_equation {
                let i = vocab.seq_symbols.index(t).unwrap();
                assert_eq!(vocab.seq_symbols.token(i), Some(t.as_str()));
            }
        }
    }

    #[test]
    fn test_uncovered_identifier_is_reported_for_tree() {
        let train = vec![record("9", "NUM", "NUM_0 * PI")];
        let vocab = MwpVocab::build(&train, &settings(CopyCounts { train: 1, valid: 1, test: 1 })).unwrap();
        let misses = vocab.uncovered_symbols(&train);
        assert_eq!(misses.len(), 1);
        assert!(matches!(
            &misses[0],
            DataError::UncoveredSymbol { vocab: "tree", symbol, id } if symbol == "PI" && id == "9"
        ));
    }
}
