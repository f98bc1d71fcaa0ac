// Number transfer for equation systems (alg514, draw, hmwp).
//
// The equation string holds several statements separated by ';'.
// Each statement is masked on its own and the statements are
// joined with <BRG> so one sequence carries the whole system:
//
//   "x+y=10 ; x-y=2"  →  [x, +, y, =, NUM_0, <BRG>, x, -, y, =, NUM_1]
//
// Variable names are unknowns the decoder must be able to emit;
// they are reported in unk_symbols.

use anyhow::{Context, Result};

use super::{is_identifier, lex_equation, mask_equation, mask_question};
use super::{TransferOptions, TransferOutput};
use crate::data::preprocessor::Preprocessor;
use crate::data::vocab::FrequencyCounter;
use crate::domain::record::{MaskedRecord, RawRecord};
use crate::domain::symbols::BRG_TOKEN;

const DEFAULT_SEPARATOR: &str = ";";

pub fn multi_transfer(records: &[RawRecord], options: &TransferOptions) -> Result<TransferOutput> {
    let cleaner       = Preprocessor::new();
    let separator     = options.separator.as_deref().unwrap_or(DEFAULT_SEPARATOR);
    let mut constants = FrequencyCounter::new();
    let mut unknowns  = FrequencyCounter::new();
    let mut copy_nums = 0;
    let mut masked    = Vec::with_capacity(records.len());

    for raw in records {
        let (question, num_list) = mask_question(&cleaner.clean(&raw.question), options.mask)
            .with_context(|| format!("Cannot mask the question of record '{}'", raw.id))?;

        let tokens = lex_equation(&cleaner.clean(&raw.equation));
        let mut equation = Vec::with_capacity(tokens.len());
        for statement in tokens.split(|t| t == separator || t == BRG_TOKEN) {
            if statement.is_empty() {
                continue;
            }
            if !equation.is_empty() {
                equation.push(BRG_TOKEN.to_string());
            }
            for token in statement.iter().filter(|t| is_identifier(t)) {
                unknowns.add(token);
            }
            equation.extend(
                mask_equation(statement, &num_list, options.mask, &mut constants)
                    .with_context(|| format!("Cannot mask the equation of record '{}'", raw.id))?,
            );
        }

        copy_nums = copy_nums.max(num_list.len());
        masked.push(MaskedRecord {
            id:     raw.id.clone(),
            question,
            equation,
            num_list,
            answer: raw.answer.clone(),
        });
    }

    Ok(TransferOutput {
        records:       masked,
        generate_list: constants.keep(|count| count >= options.min_generate_keep),
        copy_nums,
        unk_symbols:   unknowns.keep(|_| true),
    })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::symbols::MaskScheme;

    fn options() -> TransferOptions {
        TransferOptions {
            mask:              MaskScheme::Number,
            min_generate_keep: 1,
            separator:         Some(";".to_string()),
        }
    }

    #[test]
    fn test_system_is_joined_with_bridge() {
        let records = vec![RawRecord::new(
            "7",
            "The sum of two numbers is 10 and their difference is 2",
            "x+y=10 ; x-y=2",
        )];
        let out = multi_transfer(&records, &options()).unwrap();
        assert_eq!(
            out.records[0].equation,
            vec!["x", "+", "y", "=", "NUM_0", "<BRG>", "x", "-", "y", "=", "NUM_1"]
        );
        assert_eq!(out.unk_symbols, vec!["x", "y"]);
        assert_eq!(out.copy_nums, 2);
    }

    #[test]
    fn test_trailing_separator_adds_no_empty_statement() {
        let records = vec![RawRecord::new("1", "twice 4", "m=2*4;")];
        let out = multi_transfer(&records, &options()).unwrap();
        assert_eq!(out.records[0].equation, vec!["m", "=", "2", "*", "NUM_0"]);
        assert_eq!(out.generate_list, vec!["2"]);
    }

    #[test]
    fn test_answer_prefix_is_kept_for_systems() {
        let records = vec![RawRecord::new("1", "3 boxes", "x=3")];
        let out = multi_transfer(&records, &options()).unwrap();
        assert_eq!(out.records[0].equation, vec!["x", "=", "NUM_0"]);
    }
}
