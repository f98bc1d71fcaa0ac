// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// This layer handles everything from raw corpus files all the
// way to tensor batches.
//
// The pipeline flows in this order:
//
//   trainset / validset / testset.json
//       │
//       ▼
//   JsonCorpusLoader  → reads the splits into RawRecords
//       │
//       ▼
//   Preprocessor      → normalises text (width, spaces, controls)
//       │
//       ▼
//   TransferRegistry  → masks numbers per dataset (MaskedRecord)
//       │
//       ▼
//   equation          → infix → postfix / prefix (Record)
//       │
//       ▼
//   (annotation cache, Layer 6)
//       │
//       ▼
//   vocab             → four vocabularies from the train split
//       │
//       ▼
//   MwpDataset        → encodes records, Burn Dataset
//       │
//       ▼
//   MwpBatcher        → stacks samples into padded tensors
//
// Each module is responsible for exactly one step.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)
//            Rust Book §13 (Iterators and Closures)

/// Loads raw corpus splits from JSON
pub mod loader;

/// Cleans and normalises raw text
pub mod preprocessor;

/// Per-dataset number transfer functions and their registry
pub mod transfer;

/// Infix → postfix / prefix conversion
pub mod equation;

/// Frequency counting and vocabulary construction
pub mod vocab;

/// Prepared dataset container; implements Burn's Dataset trait
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;
