// ============================================================
// Layer 3 — Problem Records
// ============================================================
// A problem moves through three record types, each built from
// the previous one rather than mutated in place:
//
//   RawRecord     → as read from the corpus (free text)
//       │  number transfer
//       ▼
//   MaskedRecord  → tokens, numbers replaced by placeholders
//       │  equation normalizer
//       ▼
//   Record        → + infix / postfix / prefix equation
//       │  annotation cache (optional)
//       ▼
//   Record        → + pos tags and dependency parents
//
// Reference: Rust Book §5 (Structs and Methods)

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::error::DataError;

/// One problem exactly as the corpus provides it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub id:       String,
    pub question: String,
    pub equation: String,
    pub answer:   Value,

    /// Dataset-specific fields the loader did not interpret
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl RawRecord {
    pub fn new(
        id:       impl Into<String>,
        question: impl Into<String>,
        equation: impl Into<String>,
    ) -> Self {
        Self {
            id:       id.into(),
            question: question.into(),
            equation: equation.into(),
            answer:   Value::Null,
            extra:    Map::new(),
        }
    }
}

/// Output of the number transfer for one problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskedRecord {
    pub id:       String,
    pub question: Vec<String>,
    pub equation: Vec<String>,
    /// Numeric literals in question order; slot `i` is placeholder `i`
    pub num_list: Vec<String>,
    pub answer:   Value,
}

/// Pos tags plus 0-based dependency parents (root = -1), one per token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub pos:        Vec<String>,
    pub parse_tree: Vec<i64>,
}

/// A fully prepared problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id:       String,
    pub question: Vec<String>,
    pub equation: Vec<String>,

    #[serde(rename = "infix equation")]
    pub infix_equation: Vec<String>,

    #[serde(rename = "postfix equation")]
    pub postfix_equation: Vec<String>,

    #[serde(rename = "prefix equation")]
    pub prefix_equation: Vec<String>,

    #[serde(rename = "num list", default)]
    pub num_list: Vec<String>,

    #[serde(default)]
    pub answer: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<Vec<String>>,

    #[serde(rename = "parse tree", default, skip_serializing_if = "Option::is_none")]
    pub parse_tree: Option<Vec<i64>>,
}

impl Record {
    /// The masked question as one space-separated string,
    /// which is what the annotator sees.
    pub fn question_text(&self) -> String {
        self.question.join(" ")
    }

    pub fn is_annotated(&self) -> bool {
        self.pos.is_some() && self.parse_tree.is_some()
    }

    /// Return a new record carrying `annotation`.
    /// Tags and parents must line up one-to-one with question tokens.
    pub fn with_annotation(self, annotation: Annotation) -> Result<Record, DataError> {
        let tokens = self.question.len();
        if annotation.pos.len() != tokens || annotation.parse_tree.len() != tokens {
            return Err(DataError::AnnotationLength {
                id:      self.id,
                tokens,
                tags:    annotation.pos.len(),
                parents: annotation.parse_tree.len(),
            });
        }
        Ok(Record {
            pos:        Some(annotation.pos),
            parse_tree: Some(annotation.parse_tree),
            ..self
        })
    }
}
