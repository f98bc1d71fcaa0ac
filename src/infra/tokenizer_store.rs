// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Exports the input-word vocabulary as a HuggingFace tokenizer
// so any tokenizers-based consumer maps problem text to exactly
// the ids the prepared dataset uses.
//
// The tokenizer JSON is written directly and loaded back with
// Tokenizer::from_file, which also validates it.
//
// Questions are already tokenized and joined with single spaces,
// so the pre-tokenizer is a plain WhitespaceSplit and there is
// no normalizer.

use anyhow::{Context, Result};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use tokenizers::Tokenizer;

use crate::data::vocab::Vocabulary;
use crate::domain::symbols::{EOS_TOKEN, PAD_TOKEN, SOS_TOKEN, UNK_TOKEN};

const TOKENIZER_FILE: &str = "tokenizer.json";

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Load a previously exported tokenizer.
    pub fn load(&self) -> Result<Tokenizer> {
        let path = self.dir.join(TOKENIZER_FILE);
        Tokenizer::from_file(&path)
            .map_err(|e| anyhow::anyhow!(
                "Cannot load tokenizer from '{}': {}", path.display(), e
            ))
    }

    /// Write `vocab` as a WordLevel tokenizer and load it back.
    pub fn save_word_level(&self, vocab: &Vocabulary) -> Result<Tokenizer> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        let mut table = Map::new();
        for (id, token) in vocab.tokens().iter().enumerate() {
            table.insert(token.clone(), json!(id));
        }

        // Control symbols are registered as special added tokens so
        // decoding can skip them.
        let added_tokens: Vec<Value> = [PAD_TOKEN, SOS_TOKEN, EOS_TOKEN, UNK_TOKEN]
            .iter()
            .filter_map(|t| vocab.index(t).map(|id| (id, *t)))
            .map(|(id, content)| json!({
                "id": id,
                "content": content,
                "single_word": false,
                "lstrip": false,
                "rstrip": false,
                "normalized": false,
                "special": true
            }))
            .collect();

        let tokenizer_json = json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": added_tokens,
            "normalizer": null,
            "pre_tokenizer": { "type": "WhitespaceSplit" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": table,
                "unk_token": UNK_TOKEN
            }
        });

        let path = self.dir.join(TOKENIZER_FILE);
        std::fs::write(&path, serde_json::to_string_pretty(&tokenizer_json)?)
            .with_context(|| format!("Cannot write '{}'", path.display()))?;

        tracing::info!("Exported {} input words to '{}'", vocab.len(), path.display());
        self.load()
    }
}
