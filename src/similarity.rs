//! Vector similarity helpers shared by the vector runners and clustering.

use ordered_float::OrderedFloat;

/// Compute cosine similarity between two vectors.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Find the top-k most similar vectors among candidates.
pub fn top_k_similar<T>(query: &[f32], candidates: &[(Vec<f32>, T)], k: usize) -> Vec<(f32, T)>
where
    T: Clone,
{
    let mut scored: Vec<(OrderedFloat<f32>, T)> = candidates
        .iter()
        .map(|(vec, item)| (OrderedFloat(cosine_similarity(query, vec)), item.clone()))
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0));

    scored
        .into_iter()
        .take(k)
        .map(|(score, item)| (score.0, item))
        .collect()
}

/// Mean of a set of vectors. Returns None when the set is empty or the
/// dimensions disagree.
pub fn centroid(vectors: &[&[f32]]) -> Option<Vec<f32>> {
    let first = vectors.first()?;
    let dim = first.len();
    if dim == 0 || vectors.iter().any(|v| v.len() != dim) {
        return None;
    }

    let mut sum = vec![0.0f32; dim];
    for v in vectors {
        for (acc, x) in sum.iter_mut().zip(v.iter()) {
            *acc += x;
        }
    }
    let n = vectors.len() as f32;
    for acc in sum.iter_mut() {
        *acc /= n;
    }
    Some(sum)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &c).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_top_k_orders_descending() {
        let candidates = vec![
            (vec![0.0, 1.0], "orthogonal"),
            (vec![1.0, 0.0], "aligned"),
            (vec![1.0, 1.0], "diagonal"),
        ];
        let top = top_k_similar(&[1.0, 0.0], &candidates, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].1, "aligned");
        assert_eq!(top[1].1, "diagonal");
    }

    #[test]
    fn test_centroid() {
        let a = vec![0.0, 2.0];
        let b = vec![2.0, 0.0];
        let c = centroid(&[a.as_slice(), b.as_slice()]).unwrap();
        assert_eq!(c, vec![1.0, 1.0]);

        assert!(centroid(&[]).is_none());
    }
}
