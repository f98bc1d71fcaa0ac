// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The two collaborators the pipeline talks to but does not own:
//
//   CorpusSource → where raw problems come from
//                  (JsonCorpusLoader reads trainset/validset/testset.json)
//   Annotator    → the external NLP tool that tags tokens and
//                  parses dependencies (CommandAnnotator runs a
//                  CoNLL-U producing program)
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;

use crate::domain::record::RawRecord;
use crate::domain::split::Splits;

// ─── CorpusSource ─────────────────────────────────────────────────────────────
/// Any component that can load the raw train / valid / test splits.
pub trait CorpusSource {
    fn load_splits(&self) -> Result<Splits<RawRecord>>;
}

// ─── Annotator ────────────────────────────────────────────────────────────────
/// Linguistic analysis of one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenTag {
    /// Language-specific part-of-speech tag
    pub xpos: String,
    /// 1-based index of the dependency head, 0 for the root
    pub head: usize,
}

/// Any component that can tag a pre-tokenized sentence.
///
/// Implementations must return exactly one TokenTag per input token.
/// Calls are independent of each other.
pub trait Annotator {
    fn annotate(&self, tokens: &[String]) -> Result<Vec<TokenTag>>;
}
