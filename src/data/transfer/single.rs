// Number transfer for single-equation corpora (math23k, ape200k,
// SVAMP, asdiv-a, mawps).

use anyhow::{Context, Result};

use super::{lex_equation, mask_equation, mask_question, strip_answer_prefix};
use super::{TransferOptions, TransferOutput};
use crate::data::preprocessor::Preprocessor;
use crate::data::vocab::FrequencyCounter;
use crate::domain::record::{MaskedRecord, RawRecord};

pub fn single_transfer(records: &[RawRecord], options: &TransferOptions) -> Result<TransferOutput> {
    let cleaner       = Preprocessor::new();
    let mut constants = FrequencyCounter::new();
    let mut copy_nums = 0;
    let mut masked    = Vec::with_capacity(records.len());

    for raw in records {
        let (question, num_list) = mask_question(&cleaner.clean(&raw.question), options.mask)
            .with_context(|| format!("Cannot mask the question of record '{}'", raw.id))?;

        let tokens   = strip_answer_prefix(lex_equation(&cleaner.clean(&raw.equation)));
        let equation = mask_equation(&tokens, &num_list, options.mask, &mut constants)
            .with_context(|| format!("Cannot mask the equation of record '{}'", raw.id))?;

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
        unk_symbols:   Vec::new(),
    })
}
