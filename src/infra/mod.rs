// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Handles the concerns that touch the outside world:
//
//   annotation_cache.rs — pos tags / dependency parents per
//                         record, persisted as one JSON file
//                         and reused across runs
//
//   annotator.rs        — runs an external CoNLL-U producing
//                         command for each question
//
//   artifact_store.rs   — saves and loads prepared splits,
//                         vocabularies and the config
//
//   tokenizer_store.rs  — exports the input-word vocabulary as
//                         a HuggingFace WordLevel tokenizer
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)

/// Annotation cache build / read / attach
pub mod annotation_cache;

/// External annotator process
pub mod annotator;

/// Prepared dataset persistence
pub mod artifact_store;

/// Tokenizer export and loading
pub mod tokenizer_store;
