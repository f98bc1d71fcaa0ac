// ============================================================
// Layer 3 — Symbol Tables
// ============================================================
// Dataset-independent symbols shared by every vocabulary:
//
//   - reserved control tokens (pad / start / end / unknown)
//   - the operator list for each task type
//   - the placeholder tables numbers are masked with
//
// Both enums parse from the same strings the configuration
// files use ("single_equation", "alphabet", ...). An unknown
// value is an UnimplementedConfiguration error so preparation
// fails before any expensive work starts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::DataError;

pub const PAD_TOKEN: &str = "<PAD>";
pub const SOS_TOKEN: &str = "<SOS>";
pub const EOS_TOKEN: &str = "<EOS>";
pub const UNK_TOKEN: &str = "<UNK>";

/// Joins the equations of a multi-equation problem into one sequence.
pub const BRG_TOKEN: &str = "<BRG>";

/// Any input token containing this marker is a masked number.
pub const NUM_MARKER: &str = "NUM";

pub const SINGLE_OPERATORS: [&str; 5] = ["+", "-", "*", "/", "^"];
pub const MULTI_OPERATORS:  [&str; 7] = ["+", "-", "*", "/", "^", "=", BRG_TOKEN];

const NUMBER_TABLE_SIZE: usize = 100;

// ─── TaskType ─────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TaskType {
    SingleEquation,
    MultiEquation,
}

impl TaskType {
    /// Ordered operator list for this task type.
    pub fn operators(&self) -> Vec<String> {
        let ops: &[&str] = match self {
            TaskType::SingleEquation => &SINGLE_OPERATORS,
            TaskType::MultiEquation  => &MULTI_OPERATORS,
        };
        ops.iter().map(|s| s.to_string()).collect()
    }

    /// Separator handed to the number transfer for equation systems.
    pub fn separator(&self) -> Option<&'static str> {
        match self {
            TaskType::SingleEquation => None,
            TaskType::MultiEquation  => Some(";"),
        }
    }
}

impl FromStr for TaskType {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single_equation" | "single" => Ok(TaskType::SingleEquation),
            "multi_equation"  | "multi"  => Ok(TaskType::MultiEquation),
            other => Err(DataError::UnimplementedConfiguration(format!(
                "task type '{other}' (expected single_equation or multi_equation)"
            ))),
        }
    }
}

impl TryFrom<String> for TaskType {
    type Error = DataError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TaskType> for String {
    fn from(t: TaskType) -> Self {
        t.to_string()
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskType::SingleEquation => write!(f, "single_equation"),
            TaskType::MultiEquation  => write!(f, "multi_equation"),
        }
    }
}

// ─── MaskScheme ───────────────────────────────────────────────────────────────
/// How numbers in problem text are replaced by placeholders.
///
///   - `Num`      → every number becomes `NUM` in the question,
///                  equations use the numbered table `NUM_0..NUM_99`
///   - `Number`   → `NUM_0..NUM_99` on both sides
///   - `Alphabet` → `NUM_a..NUM_z` on both sides (26 slots)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MaskScheme {
    Num,
    Number,
    Alphabet,
}

impl MaskScheme {
    /// The ordered placeholder table equations are written with.
    pub fn table(&self) -> Vec<String> {
        match self {
            MaskScheme::Num | MaskScheme::Number => (0..NUMBER_TABLE_SIZE)
                .map(|i| format!("NUM_{i}"))
                .collect(),
            MaskScheme::Alphabet => ('a'..='z')
                .map(|c| format!("NUM_{c}"))
                .collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        match self {
            MaskScheme::Num | MaskScheme::Number => NUMBER_TABLE_SIZE,
            MaskScheme::Alphabet => 26,
        }
    }

    /// Fails with MaskCapacity when `required` slots do not fit the table.
    pub fn ensure_capacity(&self, required: usize) -> Result<(), DataError> {
        if required > self.capacity() {
            return Err(DataError::MaskCapacity {
                scheme:    self.to_string(),
                required,
                available: self.capacity(),
            });
        }
        Ok(())
    }

    /// The first `copy_nums` placeholders of the table.
    pub fn placeholders(&self, copy_nums: usize) -> Result<Vec<String>, DataError> {
        self.ensure_capacity(copy_nums)?;
        Ok(self.table().into_iter().take(copy_nums).collect())
    }

    /// Placeholder written into the equation for the `index`-th number.
    pub fn equation_symbol(&self, index: usize) -> Result<String, DataError> {
        self.ensure_capacity(index + 1)?;
        Ok(match self {
            MaskScheme::Num | MaskScheme::Number => format!("NUM_{index}"),
            MaskScheme::Alphabet => format!("NUM_{}", (b'a' + index as u8) as char),
        })
    }

    /// Placeholder written into the question for the `index`-th number.
    pub fn question_symbol(&self, index: usize) -> Result<String, DataError> {
        match self {
            MaskScheme::Num => {
                self.ensure_capacity(index + 1)?;
                Ok(NUM_MARKER.to_string())
            }
            _ => self.equation_symbol(index),
        }
    }
}

impl FromStr for MaskScheme {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NUM"      => Ok(MaskScheme::Num),
            "number"   => Ok(MaskScheme::Number),
            "alphabet" => Ok(MaskScheme::Alphabet),
            other => Err(DataError::UnimplementedConfiguration(format!(
                "the type of masking number ({other}) is not implemented"
            ))),
        }
    }
}

impl TryFrom<String> for MaskScheme {
    type Error = DataError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MaskScheme> for String {
    fn from(m: MaskScheme) -> Self {
        m.to_string()
    }
}

impl fmt::Display for MaskScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaskScheme::Num      => write!(f, "NUM"),
            MaskScheme::Number   => write!(f, "number"),
            MaskScheme::Alphabet => write!(f, "alphabet"),
        }
    }
}
