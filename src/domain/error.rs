// ============================================================
// Layer 3 — Error Taxonomy
// ============================================================
// Every failure the preparation pipeline can raise on its own.
// Application and infra code wrap these in anyhow with file and
// dataset context; callers that need to branch on the kind can
// still `downcast_ref::<DataError>()`.

use thiserror::Error;


#[derive(Error, Debug)]
pub enum DataError {
    #[error("malformed equation in record '{id}' ({equation}): {source}")]
    MalformedEquation {
        id:       String,
        equation: String,
        #[source]
        source:   EquationError,
    },

    #[error("mask scheme '{scheme}' provides {available} placeholders but {required} are required")]
    MaskCapacity {
        scheme:    String,
        required:  usize,
        available: usize,
    },

    #[error("unimplemented configuration: {0}")]
    UnimplementedConfiguration(String),

    #[error("no annotation found for record '{id}'")]
    MissingAnnotation { id: String },

    #[error("annotation cache contains id '{id}' more than once")]
    DuplicateAnnotation { id: String },

    #[error("record id '{id}' occurs more than once across splits")]
    DuplicateRecordId { id: String },

    #[error("record '{id}' has {tokens} tokens but {tags} pos tags and {parents} parent indices")]
    AnnotationLength {
        id:      String,
        tokens:  usize,
        tags:    usize,
        parents: usize,
    },

    #[error("symbol '{symbol}' of training record '{id}' has no index in the {vocab} vocabulary")]
    UncoveredSymbol {
        vocab:  &'static str,
        symbol: String,
        id:     String,
    },

    #[error("annotator failed on record '{id}': {message}")]
    Annotator { id: String, message: String },
}

/// Why an infix equation could not be converted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EquationError {
    #[error("equation is empty")]
    Empty,

    #[error("'{0}' is never closed")]
    UnbalancedOpen(String),

    #[error("'{token}' at position {position} has no matching opener")]
    UnbalancedClose { token: String, position: usize },

    #[error("'{close}' at position {position} cannot close '{open}'")]
    MismatchedBracket { open: String, close: String, position: usize },

    #[error("'{token}' at position {position} is missing an operand")]
    MissingOperand { token: String, position: usize },

    #[error("'{token}' at position {position} follows an operand without an operator")]
    UnexpectedOperand { token: String, position: usize },
}
