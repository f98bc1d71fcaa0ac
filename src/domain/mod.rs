// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types that define the math-word-problem pipeline:
// what a problem record is at each stage, which symbols are
// reserved, and which errors the pipeline can raise.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O or process spawning
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Raw, masked and fully prepared problem records
pub mod record;

// Train / valid / test container
pub mod split;

// Reserved tokens, operator tables, task types, mask schemes
pub mod symbols;

// Error taxonomy of the preparation pipeline
pub mod error;

// Core abstractions (traits) that other layers implement
pub mod traits;
