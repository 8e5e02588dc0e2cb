const EPSILON: f64 = 1e-10;

/// Shannon entropy (natural log) of a probability vector.
///
/// Each probability is clipped into `[1e-10, 1]` before taking the log, so the
/// result is always finite and non-negative.
pub fn entropy(probabilities: &[f32]) -> f32 {
    let total: f64 = probabilities
        .iter()
        .map(|&p| {
            let p = (p as f64).clamp(EPSILON, 1.0);
            p * p.ln()
        })
        .sum();
    (-total).max(0.0) as f32
}

/// Entropy of the uniform distribution over `num_classes`.
pub fn max_entropy(num_classes: usize) -> f32 {
    if num_classes == 0 {
        return 0.0;
    }
    (num_classes as f64).ln() as f32
}

/// Index of the largest probability. Ties resolve to the lowest index.
pub fn argmax(probabilities: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, &p) in probabilities.iter().enumerate() {
        match best {
            Some((_, top)) if p <= top => {}
            _ => best = Some((idx, p)),
        }
    }
    best.map(|(idx, _)| idx)
}
