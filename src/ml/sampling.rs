// Top-k sampling over one probability row.
//
// Keeps the k most likely tokens and draws one of them in
// proportion to its probability. Ties keep the lower index.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

pub fn top_k_sample<R: Rng + ?Sized>(probs: &[f32], k: usize, rng: &mut R) -> usize {
    let mut order: Vec<usize> = (0..probs.len()).collect();
    order.sort_by(|&a, &b| probs[b].total_cmp(&probs[a]).then(a.cmp(&b)));
    order.truncate(k.max(1));

    let weights: Vec<f32> = order.iter().map(|&i| probs[i].max(0.0)).collect();
    match WeightedIndex::new(&weights) {
        Ok(dist) => order[dist.sample(rng)],
        // all-zero or non-finite weights: fall back to the most likely token
        Err(_) => order.first().copied().unwrap_or(0),
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_top_one_is_greedy() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10 {
            assert_eq!(top_k_sample(&[0.1, 0.6, 0.3], 1, &mut rng), 1);
        }
    }

    #[test]
    fn test_only_top_k_tokens_are_drawn() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let i = top_k_sample(&[0.05, 0.4, 0.05, 0.5], 2, &mut rng);
            assert!(i == 1 || i == 3);
        }
    }

    #[test]
    fn test_degenerate_row_falls_back_to_first() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(top_k_sample(&[0.0, 0.0, 0.0], 2, &mut rng), 0);
    }
}
