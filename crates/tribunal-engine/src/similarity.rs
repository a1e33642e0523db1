//! Vector and sentence helpers shared by the coherence signals.

/// Cosine similarity of two vectors, or `None` when either has zero norm
/// or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let (mut dot, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return None;
    }
    Some(dot / (na.sqrt() * nb.sqrt()))
}

/// Splits text on `.` into trimmed, non-empty sentences.
pub fn split_sentences(text: &str) -> Vec<&str> {
    text.split('.').map(str::trim).filter(|s| !s.is_empty()).collect()
}

/// Mean cosine similarity of each consecutive pair; `None` for fewer than two vectors.
pub fn mean_adjacent_similarity(vectors: &[Vec<f32>]) -> Option<f64> {
    let sims: Vec<f64> = vectors
        .windows(2)
        .filter_map(|pair| cosine_similarity(&pair[0], &pair[1]))
        .collect();
    if sims.is_empty() {
        return None;
    }
    Some(sims.iter().sum::<f64>() / sims.len() as f64)
}
