//! Cosine similarity between embedding sets.

/// Cosine similarity of two vectors, clamped to `[-1, 1]`.
///
/// Vectors of different length, empty vectors and zero vectors have no
/// direction to compare and score `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (dot, norm_a_sq, norm_b_sq) = a
        .iter()
        .zip(b.iter())
        .fold((0.0f32, 0.0f32, 0.0f32), |(dot, na, nb), (&av, &bv)| {
            (dot + av * bv, na + av * av, nb + bv * bv)
        });

    let norm_a = norm_a_sq.sqrt();
    let norm_b = norm_b_sq.sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
    }
}

/// Full pairwise similarity matrix: one row per `rows` vector, one column per `cols` vector.
pub fn similarity_matrix(rows: &[Vec<f32>], cols: &[Vec<f32>]) -> Vec<Vec<f32>> {
    rows.iter()
        .map(|row| cols.iter().map(|col| cosine_similarity(row, col)).collect())
        .collect()
}

/// Column index and score of the highest value in a row.
///
/// Ties keep the first column, so the winner is the earliest candidate in
/// the order the columns were built. Non-finite scores never win. `None`
/// for an empty row or a row without a finite score.
pub fn best_match(row: &[f32]) -> Option<(usize, f32)> {
    row.iter()
        .copied()
        .enumerate()
        .fold(None, |best, (idx, score)| match best {
            _ if !score.is_finite() => best,
            Some((_, best_score)) if score <= best_score => best,
            _ => Some((idx, score)),
        })
}
