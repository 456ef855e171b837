/// Quantile `q` in [0,1] of unsorted values, linearly interpolated between
/// the closest ranks. Returns 0.0 for an empty slice.
pub fn quantile(xs: &[f64], q: f64) -> f64 {
    if xs.is_empty() { return 0.0; }
    let mut sorted = xs.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    quantile_sorted(&sorted, q)
}

pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() { return 0.0; }
    let rank = q.clamp(0.0, 1.0) * ((sorted.len() - 1) as f64);
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() { return 0.0; }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Standard deviation with `ddof` delta degrees of freedom (0 = population,
/// 1 = sample). Undefined spreads (n <= ddof) are reported as 0.
pub fn std_dev(xs: &[f64], ddof: usize) -> f64 {
    if xs.len() <= ddof { return 0.0; }
    let m = mean(xs);
    let ss = xs.iter().map(|x| (x - m) * (x - m)).sum::<f64>();
    (ss / (xs.len() - ddof) as f64).sqrt()
}
