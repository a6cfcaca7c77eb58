//! Selection helpers shared by the retrieval strategies

use std::cmp::Ordering;

fn descending(scores: &[f32]) -> impl Fn(&usize, &usize) -> Ordering + '_ {
    move |a, b| scores[*b].total_cmp(&scores[*a])
}

/// Indices of the `k` highest scores, without sorting them.
///
/// Runs a quickselect over the index array (O(n)). The order of the returned
/// indices, and which of several tied scores at the k-th position are kept,
/// is unspecified.
pub fn top_k_unordered(scores: &[f32], k: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..scores.len()).collect();
    if k == 0 {
        return Vec::new();
    }
    if k < indices.len() {
        indices.select_nth_unstable_by(k - 1, descending(scores));
        indices.truncate(k);
    }
    indices
}

/// Like [`top_k_unordered`] but restricted to `candidates`, and the result is
/// sorted by descending score.
pub fn top_k_sorted(
    scores: &[f32],
    candidates: impl IntoIterator<Item = usize>,
    k: usize,
) -> Vec<usize> {
    let mut indices: Vec<usize> = candidates.into_iter().collect();
    if k == 0 {
        return Vec::new();
    }
    if k < indices.len() {
        indices.select_nth_unstable_by(k - 1, descending(scores));
        indices.truncate(k);
    }
    indices.sort_by(descending(scores));
    indices
}

/// Percentile with linear interpolation between closest ranks.
pub fn percentile(values: &[f32], q: f32) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f32;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f32;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_top_k_unordered_selects_highest() {
        let scores = vec![0.1, 0.9, 0.3, 0.8, 0.5];
        let top: HashSet<usize> = top_k_unordered(&scores, 2).into_iter().collect();
        assert_eq!(top, HashSet::from([1, 3]));
    }

    #[test]
    fn test_top_k_larger_than_input() {
        let scores = vec![0.1, 0.9];
        assert_eq!(top_k_unordered(&scores, 50).len(), 2);
        assert!(top_k_unordered(&scores, 0).is_empty());
    }

    #[test]
    fn test_top_k_sorted_orders_candidates() {
        let scores = vec![0.1, 0.9, 0.3, 0.8, 0.5];
        assert_eq!(top_k_sorted(&scores, vec![0, 2, 3, 4], 3), vec![3, 4, 2]);
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&values, 50.0), Some(3.0));
        assert_eq!(percentile(&values, 100.0), Some(5.0));
        let p99 = percentile(&values, 99.0).unwrap();
        assert!((p99 - 4.96).abs() < 1e-5);
        assert_eq!(percentile(&[], 99.0), None);
    }
}
