use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesStats {
    pub n: usize,
    pub mean: f64,
    /// Sample standard deviation (n - 1 denominator).
    pub std: f64,
}

pub fn series_stats(values: &[f64]) -> SeriesStats {
    let n = values.len();
    let mean = if n > 0 {
        values.iter().sum::<f64>() / n as f64
    } else {
        0.0
    };
    let std = if n > 1 {
        (values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0)).sqrt()
    } else {
        0.0
    };
    SeriesStats { n, mean, std }
}

/// Raw versus cleaned summary for one recording.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Comparison {
    pub raw: SeriesStats,
    pub clean: SeriesStats,
}

impl Comparison {
    pub fn new(raw: &[f64], clean: &[f64]) -> Self {
        Self {
            raw: series_stats(raw),
            clean: series_stats(clean),
        }
    }
}
