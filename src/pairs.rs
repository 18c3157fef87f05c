//! Unordered profile pair sampling.

use rand::seq::index;
use rand::Rng;

/// Number of unordered pairs over `n` items.
pub fn pair_count(n: usize) -> usize {
    n.saturating_mul(n.saturating_sub(1)) / 2
}

/// Every unordered index pair `(i, j)` with `i < j`, in lexicographic order.
pub fn all_index_pairs(n: usize) -> Vec<(usize, usize)> {
    let mut pairs = Vec::with_capacity(pair_count(n));
    for i in 0..n {
        for j in (i + 1)..n {
            pairs.push((i, j));
        }
    }
    pairs
}

/// Draw `min(k, C(n,2))` distinct unordered index pairs uniformly at random.
///
/// The lower index is always on the left.
pub fn sample_index_pairs<R: Rng + ?Sized>(n: usize, k: usize, rng: &mut R) -> Vec<(usize, usize)> {
    let all = all_index_pairs(n);
    let amount = k.min(all.len());
    index::sample(rng, all.len(), amount)
        .into_iter()
        .map(|i| all[i])
        .collect()
}

/// Draw `min(k, C(n,2))` distinct unordered ID pairs without replacement.
pub fn sample_pairs<S, R>(profile_ids: &[S], k: usize, rng: &mut R) -> Vec<(String, String)>
where
    S: AsRef<str>,
    R: Rng + ?Sized,
{
    sample_index_pairs(profile_ids.len(), k, rng)
        .into_iter()
        .map(|(i, j)| {
            (
                profile_ids[i].as_ref().to_string(),
                profile_ids[j].as_ref().to_string(),
            )
        })
        .collect()
}
