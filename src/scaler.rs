use crate::record::FeatureVector;
use crate::stats;

const DIMS: usize = 5;

/// Column-wise zero-mean / unit-variance scaling fit on a single batch.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    ddof: usize,
    means: [f64; DIMS],
    stds: [f64; DIMS],
}

impl StandardScaler {
    /// Population statistics (n denominator).
    pub fn new() -> Self { Self::with_ddof(0) }

    /// Sample statistics (n - 1 denominator).
    pub fn sample() -> Self { Self::with_ddof(1) }

    fn with_ddof(ddof: usize) -> Self {
        Self { ddof, means: [0.0; DIMS], stds: [0.0; DIMS] }
    }

    pub fn fit(&mut self, rows: &[FeatureVector]) -> &mut Self {
        for c in 0..DIMS {
            let col: Vec<f64> = rows.iter().map(|r| r[c]).collect();
            self.means[c] = stats::mean(&col);
            self.stds[c] = stats::std_dev(&col, self.ddof);
        }
        self
    }

    /// A column with zero spread maps to 0 for every row.
    pub fn transform(&self, rows: &[FeatureVector]) -> Vec<FeatureVector> {
        rows.iter()
            .map(|r| {
                let mut out = [0.0; DIMS];
                for c in 0..DIMS {
                    let std = self.stds[c];
                    out[c] = if std > 0.0 && std.is_finite() { (r[c] - self.means[c]) / std } else { 0.0 };
                }
                out
            })
            .collect()
    }

    pub fn fit_transform(&mut self, rows: &[FeatureVector]) -> Vec<FeatureVector> {
        self.fit(rows);
        self.transform(rows)
    }
}

impl Default for StandardScaler {
    fn default() -> Self { Self::new() }
}
