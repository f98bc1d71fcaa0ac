// ============================================================
// Layer 4 — MWP Batcher
// ============================================================
// Implements Burn's Batcher trait to stack a Vec<MwpSample>
// into tensors.
//
// Samples have different lengths, so every sequence field is
// right-padded to the longest one in the batch (dynamic padding)
// and the true lengths travel alongside:
//
//   question_ids  [ 5  9  4  2 ]        [[5 9 4 2]
//                 [ 7  4 ]         →     [7 4 0 0]]   lengths [4 2]
//
// The pad index is 0 in the input word, pos and sequence symbol
// vocabularies. Tree targets are padded with 0 as well and must
// be read together with their lengths.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::MwpSample;

const PAD_INDEX: i32 = 0;
/// Parse-tree padding; -1 already marks the root.
pub const PARSE_TREE_PAD: i32 = -2;

// ─── MwpBatch ─────────────────────────────────────────────────────────────────
/// A batch of encoded problems; every tensor starts with batch_size.
#[derive(Debug, Clone)]
pub struct MwpBatch<B: Backend> {
    /// [batch_size, max_question_len]
    pub question:         Tensor<B, 2, Int>,
    /// [batch_size]
    pub question_lengths: Tensor<B, 1, Int>,
    /// [batch_size, max_question_len], pad where unannotated
    pub pos:              Tensor<B, 2, Int>,
    /// [batch_size, max_question_len], dependency parents:
    /// root = -1, padding = PARSE_TREE_PAD
    pub parse_tree:       Tensor<B, 2, Int>,
    /// [batch_size, max_equation_len + 1]
    pub seq_target:         Tensor<B, 2, Int>,
    pub seq_target_lengths: Tensor<B, 1, Int>,
    pub tree_target:         Tensor<B, 2, Int>,
    pub tree_target_lengths: Tensor<B, 1, Int>,
    /// [batch_size, max_numbers]
    pub num_pos:    Tensor<B, 2, Int>,
    pub num_counts: Tensor<B, 1, Int>,
}

// ─── MwpBatcher ───────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct MwpBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> MwpBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    /// Pad every row to the longest one and stack into [rows, width].
    /// Width is at least 1 so empty fields still give a valid tensor.
    fn pad_2d(&self, rows: &[Vec<i32>], pad: i32, min_width: usize) -> Tensor<B, 2, Int> {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0).max(min_width).max(1);

        let flat: Vec<i32> = rows
            .iter()
            .flat_map(|row| {
                row.iter()
                    .copied()
                    .chain(std::iter::repeat(pad))
                    .take(width)
            })
            .collect();

        Tensor::<B, 1, Int>::from_ints(flat.as_slice(), &self.device)
            .reshape([rows.len(), width])
    }

    fn lengths(&self, rows: &[Vec<i32>]) -> Tensor<B, 1, Int> {
        let lens: Vec<i32> = rows.iter().map(|r| r.len() as i32).collect();
        Tensor::<B, 1, Int>::from_ints(lens.as_slice(), &self.device)
    }
}

fn to_i32(ids: &[usize]) -> Vec<i32> {
    ids.iter().map(|&x| x as i32).collect()
}

impl<B: Backend> Batcher<MwpSample, MwpBatch<B>> for MwpBatcher<B> {
    fn batch(&self, items: Vec<MwpSample>) -> MwpBatch<B> {
        let questions: Vec<Vec<i32>> = items.iter().map(|s| to_i32(&s.question_ids)).collect();
        let pos:       Vec<Vec<i32>> = items.iter().map(|s| to_i32(&s.pos_ids)).collect();
        let parents:   Vec<Vec<i32>> = items
            .iter()
            .map(|s| s.parse_tree.iter().map(|&p| p as i32).collect())
            .collect();
        let seq:  Vec<Vec<i32>> = items.iter().map(|s| to_i32(&s.seq_equation_ids)).collect();
        let tree: Vec<Vec<i32>> = items.iter().map(|s| to_i32(&s.tree_equation_ids)).collect();
        let nums: Vec<Vec<i32>> = items.iter().map(|s| to_i32(&s.num_pos)).collect();

        let question_width = questions.iter().map(Vec::len).max().unwrap_or(0);

        MwpBatch {
            question:            self.pad_2d(&questions, PAD_INDEX, 0),
            question_lengths:    self.lengths(&questions),
            pos:                 self.pad_2d(&pos, PAD_INDEX, question_width),
            parse_tree:          self.pad_2d(&parents, PARSE_TREE_PAD, question_width),
            seq_target:          self.pad_2d(&seq, PAD_INDEX, 0),
            seq_target_lengths:  self.lengths(&seq),
            tree_target:         self.pad_2d(&tree, PAD_INDEX, 0),
            tree_target_lengths: self.lengths(&tree),
            num_pos:             self.pad_2d(&nums, PAD_INDEX, 0),
            num_counts:          self.lengths(&nums),
        }
    }
}
