// ============================================================
// Layer 4 — Number Transfer
// ============================================================
// Replaces the numeric literals of each problem by positional
// placeholders and rewrites the equation to reference them.
//
//   question  "Tom has 3 apples and buys 5 more"
//   equation  "x=3+5"
//        │
//        ▼
//   question  [Tom, has, NUM, apples, and, buys, NUM, more]
//   equation  [NUM_0, +, NUM_1]
//   num_list  [3, 5]
//
// Numbers of the equation that do not occur in the question are
// constants the model has to generate; they are counted and the
// frequent ones form the generate list.
//
// Every corpus has its own quirks, so the transfer function is
// looked up by dataset name in a TransferRegistry. Adding a
// dataset means registering one more function.
//
// Reference: Rust Book §13 (Closures and Function Pointers)

pub mod multi;
pub mod single;

use std::collections::HashMap;

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::data::vocab::FrequencyCounter;
use crate::domain::error::DataError;
use crate::domain::record::MaskedRecord;
use crate::domain::symbols::{MaskScheme, TaskType};
use crate::domain::record::RawRecord;

static QUESTION_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d+/\d+|\d+(?:\.\d+)?%?").expect("question number pattern is valid")
});

static EQUATION_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\(\d+/\d+\)|\d+(?:\.\d+)?%?|[A-Za-z_][A-Za-z0-9_]*|<[A-Z]+>|\S")
        .expect("equation token pattern is valid")
});

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

const VALUE_TOLERANCE: f64 = 1e-6;

// ─── Interface ────────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct TransferOptions {
    pub mask:              MaskScheme,
    /// A constant joins the generate list once it occurs this often
    pub min_generate_keep: usize,
    /// Statement separator of equation systems
    pub separator:         Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TransferOutput {
    pub records:       Vec<MaskedRecord>,
    /// Frequent equation constants in first-seen order
    pub generate_list: Vec<String>,
    /// Most numbers any single record of the split needs
    pub copy_nums:     usize,
    /// Unknown variables of equation systems in first-seen order
    pub unk_symbols:   Vec<String>,
}

/// A pure transfer over one split.
pub type TransferFn = fn(&[RawRecord], &TransferOptions) -> Result<TransferOutput>;

// ─── Registry ─────────────────────────────────────────────────────────────────
pub struct TransferRegistry {
    by_dataset: HashMap<String, TransferFn>,
}

impl TransferRegistry {
    pub fn empty() -> Self {
        Self { by_dataset: HashMap::new() }
    }

    /// The corpora the toolkit ships with.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        for name in ["math23k", "ape200k", "SVAMP", "asdiv-a", "mawps"] {
            registry.register(name, single::single_transfer);
        }
        for name in ["alg514", "draw", "hmwp"] {
            registry.register(name, multi::multi_transfer);
        }
        registry
    }

    pub fn register(&mut self, dataset: impl Into<String>, transfer: TransferFn) -> &mut Self {
        self.by_dataset.insert(dataset.into(), transfer);
        self
    }

    /// The function registered for `dataset`, else the task-type default.
    pub fn resolve(&self, dataset: &str, task: TaskType) -> TransferFn {
        if let Some(f) = self.by_dataset.get(dataset) {
            return *f;
        }
        tracing::debug!("No transfer registered for '{}', using the {} default", dataset, task);
        match task {
            TaskType::SingleEquation => single::single_transfer,
            TaskType::MultiEquation  => multi::multi_transfer,
        }
    }

    pub fn datasets(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_dataset.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for TransferRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ─── Shared lexing ────────────────────────────────────────────────────────────
/// Split the question on whitespace and mask every number in it.
/// Returns the masked tokens and the numbers in question order.
pub(crate) fn mask_question(
    text: &str,
    mask: MaskScheme,
) -> Result<(Vec<String>, Vec<String>), DataError> {
    let mut tokens   = Vec::new();
    let mut num_list = Vec::new();

    for word in text.split_whitespace() {
        let mut last = 0;
        for m in QUESTION_NUMBER.find_iter(word) {
            if m.start() > last {
                tokens.push(word[last..m.start()].to_string());
            }
            tokens.push(mask.question_symbol(num_list.len())?);
            num_list.push(m.as_str().to_string());
            last = m.end();
        }
        if last < word.len() {
            tokens.push(word[last..].to_string());
        }
    }

    Ok((tokens, num_list))
}

pub(crate) fn lex_equation(text: &str) -> Vec<String> {
    EQUATION_TOKEN
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Drop a leading "x =" naming the answer of a single equation.
pub(crate) fn strip_answer_prefix(mut tokens: Vec<String>) -> Vec<String> {
    let is_prefix = tokens.len() > 2
        && IDENTIFIER.is_match(&tokens[0])
        && tokens[1] == "="
        && !tokens[2..].iter().any(|t| t == "=");
    if is_prefix {
        tokens.drain(..2);
    }
    tokens
}

pub(crate) fn is_identifier(token: &str) -> bool {
    IDENTIFIER.is_match(token)
}

fn is_number(token: &str) -> bool {
    token.chars().next().is_some_and(|c| c.is_ascii_digit())
}

/// "(1/2)" as written in some equations.
fn bracketed_fraction(token: &str) -> Option<&str> {
    token
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .filter(|inner| inner.contains('/'))
}

/// Value of "3", "2.5", "50%" or "1/4".
pub(crate) fn numeric_value(text: &str) -> Option<f64> {
    if let Some(pct) = text.strip_suffix('%') {
        return pct.parse::<f64>().ok().map(|v| v / 100.0);
    }
    if let Some((num, den)) = text.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        return (den != 0.0).then(|| num / den);
    }
    text.parse().ok()
}

/// Position of `number` in the question: same text first, then same value.
fn match_number(number: &str, num_list: &[String]) -> Option<usize> {
    if let Some(i) = num_list.iter().position(|n| n == number) {
        return Some(i);
    }
    let value = numeric_value(number)?;
    num_list.iter().position(|n| {
        numeric_value(n).is_some_and(|w| (w - value).abs() < VALUE_TOLERANCE)
    })
}

/// Replace equation numbers by the placeholder of the question number
/// they match. Unmatched numbers are constants and go into `constants`.
pub(crate) fn mask_equation(
    tokens:    &[String],
    num_list:  &[String],
    mask:      MaskScheme,
    constants: &mut FrequencyCounter,
) -> Result<Vec<String>, DataError> {
    let mut out = Vec::with_capacity(tokens.len());

    for token in tokens {
        if let Some(inner) = bracketed_fraction(token) {
            match match_number(inner, num_list) {
                Some(i) => out.push(mask.equation_symbol(i)?),
                None => {
                    let (num, den) = inner.split_once('/').unwrap_or((inner, ""));
                    out.push("(".to_string());
                    out.push(mask_number(num, num_list, mask, constants)?);
                    out.push("/".to_string());
                    out.push(mask_number(den, num_list, mask, constants)?);
                    out.push(")".to_string());
                }
            }
        } else if is_number(token) {
            out.push(mask_number(token, num_list, mask, constants)?);
        } else {
            out.push(token.clone());
        }
    }

    Ok(out)
}

fn mask_number(
    number:    &str,
    num_list:  &[String],
    mask:      MaskScheme,
    constants: &mut FrequencyCounter,
) -> Result<String, DataError> {
    match match_number(number, num_list) {
        Some(i) => mask.equation_symbol(i),
        None => {
            constants.add(number);
            Ok(number.to_string())
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_question_splits_numbers_out_of_words() {
        let (tokens, nums) = mask_question("costs 3.5yuan, 20% off", MaskScheme::Number).unwrap();
        assert_eq!(tokens, vec!["costs", "NUM_0", "yuan,", "NUM_1", "off"]);
        assert_eq!(nums, vec!["3.5", "20%"]);
    }

    #[test]
    fn test_num_scheme_question_uses_marker() {
        let (tokens, nums) = mask_question("1/2 of 8", MaskScheme::Num).unwrap();
        assert_eq!(tokens, vec!["NUM", "of", "NUM"]);
        assert_eq!(nums, vec!["1/2", "8"]);
    }

    #[test]
    fn test_lex_equation_tokens() {
        assert_eq!(
            lex_equation("x=(1/2)*3.5+ab<BRG>2%"),
            vec!["x", "=", "(1/2)", "*", "3.5", "+", "ab", "<BRG>", "2%"]
        );
    }

    #[test]
    fn test_strip_answer_prefix() {
        let tokens = lex_equation("x=5+1");
        assert_eq!(strip_answer_prefix(tokens), vec!["5", "+", "1"]);
        // an equation with a second '=' is left alone
        let system = lex_equation("x=y=2");
        assert_eq!(strip_answer_prefix(system.clone()), system);
    }

    #[test]
    fn test_numeric_value_forms() {
        assert_eq!(numeric_value("50%"), Some(0.5));
        assert_eq!(numeric_value("1/4"), Some(0.25));
        assert_eq!(numeric_value("3"), Some(3.0));
        assert_eq!(numeric_value("1/0"), None);
    }

    #[test]
    fn test_mask_equation_matches_by_text_then_value() {
        let nums = vec!["50%".to_string(), "4".to_string()];
        let mut constants = FrequencyCounter::new();
        let tokens = lex_equation("0.5*4.0+1");
        let masked = mask_equation(&tokens, &nums, MaskScheme::Number, &mut constants).unwrap();
        assert_eq!(masked, vec!["NUM_0", "*", "NUM_1", "+", "1"]);
        assert_eq!(constants.count("1"), 1);
    }

    #[test]
    fn test_unmatched_bracketed_fraction_is_expanded() {
        let nums = vec!["2".to_string()];
        let mut constants = FrequencyCounter::new();
        let tokens = lex_equation("(1/2)*8");
        let masked = mask_equation(&tokens, &nums, MaskScheme::Number, &mut constants).unwrap();
        assert_eq!(masked, vec!["(", "1", "/", "NUM_0", ")", "*", "8"]);
    }

    #[test]
    fn test_registry_resolves_defaults_and_fallbacks() {
        let registry = TransferRegistry::with_defaults();
        assert!(registry.datasets().contains(&"hmwp"));

        let records = vec![RawRecord::new("1", "a 1 b 2", "x=1;y=2")];
        let options = TransferOptions {
            mask:              MaskScheme::Number,
            min_generate_keep: 1,
            separator:         Some(";".to_string()),
        };

        // hmwp is registered as a system corpus whatever the task type says
        let hmwp = registry.resolve("hmwp", TaskType::SingleEquation)(&records, &options).unwrap();
        assert!(hmwp.records[0].equation.contains(&"<BRG>".to_string()));

        let unknown = registry.resolve("my-corpus", TaskType::MultiEquation)(&records, &options).unwrap();
        assert_eq!(unknown.unk_symbols, vec!["x", "y"]);

        let single = registry.resolve("my-corpus", TaskType::SingleEquation)(&records, &options).unwrap();
        assert!(single.unk_symbols.is_empty());
    }

    #[test]
    fn test_register_overrides_default() {
        let mut registry = TransferRegistry::empty();
        registry.register("math23k", multi::multi_transfer);
        assert_eq!(registry.datasets(), vec!["math23k"]);
    }
}
