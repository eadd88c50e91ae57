use crate::error::{CleanError, Result};
use crate::signal::BpmSeries;
use log::debug;
use serde::{Deserialize, Serialize};

/// Parameters for the artifact cleaning pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanerConfig {
    /// Median filter window in samples. Must be odd and no longer than the series.
    pub window: usize,
    /// Lowest physiologically plausible heart rate (BPM).
    pub min_bpm: f64,
    /// Highest physiologically plausible heart rate (BPM).
    pub max_bpm: f64,
    /// Replace non-finite or non-positive values left after clamping.
    pub interpolate: bool,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            window: 5,
            min_bpm: 40.0,
            max_bpm: 200.0,
            interpolate: true,
        }
    }
}

impl CleanerConfig {
    /// Checks the parameters that do not depend on the series being cleaned.
    pub fn validate(&self) -> Result<()> {
        if self.window == 0 {
            return Err(CleanError::InvalidConfiguration(
                "window size must be positive".into(),
            ));
        }
        if self.window % 2 == 0 {
            return Err(CleanError::InvalidConfiguration(format!(
                "window size must be odd, got {}",
                self.window
            )));
        }
        if !self.min_bpm.is_finite() || !self.max_bpm.is_finite() || self.min_bpm >= self.max_bpm
        {
            return Err(CleanError::InvalidConfiguration(format!(
                "invalid BPM range [{}, {}]",
                self.min_bpm, self.max_bpm
            )));
        }
        Ok(())
    }
}

/// Cleaned heart rate with the diagnostics of the run that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanedSeries {
    pub values: Vec<f64>,
    /// Positions where the cleaned value differs from the raw one.
    pub artifacts: usize,
    /// Replacement used for out-of-range samples: the median of the smoothed series.
    pub fill_value: f64,
}

impl CleanedSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Median smoothing, range clamping, optional interpolation, then artifact counting.
///
/// The output always has the same length as `raw`. Clamping substitutes one
/// median computed before any replacement, so the run terminates even when
/// that median is itself out of range; in that case the clamped samples keep
/// the out-of-range median.
pub fn clean_bpm(raw: &BpmSeries, cfg: &CleanerConfig) -> Result<CleanedSeries> {
    cfg.validate()?;
    if cfg.window > raw.len() {
        return Err(CleanError::InvalidConfiguration(format!(
            "window size {} exceeds series length {}",
            cfg.window,
            raw.len()
        )));
    }

    let smoothed = median_filter(&raw.bpm, cfg.window);
    let (mut values, fill_value) = clamp_to_range(&smoothed, cfg.min_bpm, cfg.max_bpm);
    let interpolated = if cfg.interpolate {
        interpolate_invalid(&mut values)?
    } else {
        0
    };
    let artifacts = count_artifacts(&raw.bpm, &values);
    debug!(
        "cleaned {} samples: fill={:.2} interpolated={} artifacts={}",
        values.len(),
        fill_value,
        interpolated,
        artifacts
    );

    Ok(CleanedSeries {
        values,
        artifacts,
        fill_value,
    })
}

/// Centred sliding median. Edges are padded by repeating the first and last
/// sample, so every output is the median of exactly `window` values.
///
/// `window` must be odd and non-zero; see [`CleanerConfig::validate`].
pub fn median_filter(data: &[f64], window: usize) -> Vec<f64> {
    if data.is_empty() || window <= 1 {
        return data.to_vec();
    }
    let n = data.len() as isize;
    let half = (window / 2) as isize;
    let mut buf = Vec::with_capacity(window);
    (0..n)
        .map(|i| {
            buf.clear();
            for offset in -half..=half {
                let idx = (i + offset).clamp(0, n - 1) as usize;
                buf.push(data[idx]);
            }
            buf.sort_by(|a, b| a.total_cmp(b));
            buf[buf.len() / 2]
        })
        .collect()
}

/// Median of the finite values, averaging the middle pair for even counts.
pub fn median(values: &[f64]) -> Option<f64> {
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    finite.sort_by(|a, b| a.total_cmp(b));
    let mid = finite.len() / 2;
    if finite.len() % 2 == 0 {
        Some((finite[mid - 1] + finite[mid]) / 2.0)
    } else {
        Some(finite[mid])
    }
}

/// Replace values outside `[min, max]` with the series median.
///
/// The median is computed once from the input before the mapping pass.
/// Returns the clamped series and the fill value (NaN when the input has no
/// finite samples).
pub fn clamp_to_range(data: &[f64], min: f64, max: f64) -> (Vec<f64>, f64) {
    let fill = median(data).unwrap_or(f64::NAN);
    let clamped = data
        .iter()
        .map(|&v| if v < min || v > max { fill } else { v })
        .collect();
    (clamped, fill)
}

fn is_valid(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

/// Linearly interpolate non-finite or non-positive samples by index between
/// the nearest valid neighbours. Edges take the nearest valid value.
///
/// Returns how many samples were replaced.
pub fn interpolate_invalid(values: &mut [f64]) -> Result<usize> {
    let anchors: Vec<usize> = (0..values.len()).filter(|&i| is_valid(values[i])).collect();
    let missing = values.len() - anchors.len();
    if missing == 0 {
        return Ok(0);
    }
    if anchors.is_empty() {
        return Err(CleanError::NoValidSamples);
    }

    for i in 0..values.len() {
        if is_valid(values[i]) {
            continue;
        }
        let next_pos = anchors.partition_point(|&a| a < i);
        let prev = next_pos.checked_sub(1).map(|p| anchors[p]);
        let next = anchors.get(next_pos).copied();
        values[i] = match (prev, next) {
            (Some(p), Some(n)) => {
                let t = (i - p) as f64 / (n - p) as f64;
                values[p] + (values[n] - values[p]) * t
            }
            (Some(p), None) => values[p],
            (None, Some(n)) => values[n],
            (None, None) => unreachable!("anchors is non-empty"),
        };
    }
    Ok(missing)
}

/// Number of indices where `cleaned` differs from `raw`.
pub fn count_artifacts(raw: &[f64], cleaned: &[f64]) -> usize {
    raw.iter().zip(cleaned).filter(|(r, c)| r != c).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::IntervalSeries;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn bpm_from_rr(rr: &[u32]) -> BpmSeries {
        BpmSeries::from_intervals(&IntervalSeries::new(rr.to_vec()).unwrap())
    }

    fn assert_close(a: f64, b: f64, tol: f64) {
        let diff = (a - b).abs();
        assert!(diff <= tol, "diff {} exceeded tol {} ({} vs {})", diff, tol, a, b);
    }

    #[test]
    fn single_spike_is_removed() {
        let raw = bpm_from_rr(&[800, 800, 800, 50, 800]);
        assert_close(raw.bpm[3], 1200.0, 1e-9);
        let cleaned = clean_bpm(&raw, &CleanerConfig::default()).unwrap();
        assert_eq!(cleaned.len(), 5);
        for v in &cleaned.values {
            assert_close(*v, 75.0, 1e-9);
        }
        assert_eq!(cleaned.artifacts, 1);
        assert_close(cleaned.fill_value, 75.0, 1e-9);
    }

    #[test]
    fn window_longer_than_series_is_rejected() {
        let raw = bpm_from_rr(&[800, 800, 800, 800, 800]);
        let cfg = CleanerConfig {
            window: 7,
            ..CleanerConfig::default()
        };
        let err = clean_bpm(&raw, &cfg).unwrap_err();
        assert!(matches!(err, CleanError::InvalidConfiguration(_)));
    }

    #[test]
    fn window_equal_to_length_is_accepted() {
        let raw = bpm_from_rr(&[800, 810, 790, 800, 805]);
        let cleaned = clean_bpm(&raw, &CleanerConfig::default()).unwrap();
        assert_eq!(cleaned.len(), 5);
    }

    #[test]
    fn even_or_zero_window_is_rejected() {
        for window in [0, 4] {
            let cfg = CleanerConfig {
                window,
                ..CleanerConfig::default()
            };
            assert!(matches!(
                cfg.validate(),
                Err(CleanError::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    fn inverted_range_is_rejected() {
        let cfg = CleanerConfig {
            min_bpm: 200.0,
            max_bpm: 40.0,
            ..CleanerConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn median_filter_replicates_edges() {
        let out = median_filter(&[1.0, 100.0, 2.0, 3.0], 3);
        assert_eq!(out, vec![1.0, 2.0, 3.0, 3.0]);
    }

    #[test]
    fn median_averages_middle_pair() {
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[f64::NAN, 5.0]), Some(5.0));
        assert_eq!(median(&[f64::NAN]), None);
    }

    #[test]
    fn out_of_range_median_is_kept() {
        // 240 ms -> 250 BPM everywhere; the fill value is itself out of range.
        let raw = bpm_from_rr(&[240, 240, 240, 240, 240]);
        let cleaned = clean_bpm(&raw, &CleanerConfig::default()).unwrap();
        assert_close(cleaned.fill_value, 250.0, 1e-9);
        for v in &cleaned.values {
            assert_close(*v, 250.0, 1e-9);
        }
        assert_eq!(cleaned.artifacts, 0);
    }

    #[test]
    fn clamp_uses_one_precomputed_median() {
        let (clamped, fill) = clamp_to_range(&[30.0, 70.0, 80.0, 90.0, 250.0], 40.0, 200.0);
        assert_close(fill, 80.0, 1e-12);
        assert_eq!(clamped, vec![80.0, 70.0, 80.0, 90.0, 80.0]);
    }

    #[test]
    fn fill_value_comes_from_smoothed_series() {
        let raw = BpmSeries {
            bpm: vec![250.0, 80.0, 250.0, 100.0, 80.0, 60.0, 60.0],
        };
        let cfg = CleanerConfig {
            window: 3,
            ..CleanerConfig::default()
        };
        let smoothed = median_filter(&raw.bpm, cfg.window);
        assert_eq!(smoothed, vec![250.0, 250.0, 100.0, 100.0, 80.0, 60.0, 60.0]);
        assert_eq!(median(&raw.bpm), Some(80.0));

        let cleaned = clean_bpm(&raw, &cfg).unwrap();
        assert_close(cleaned.fill_value, 100.0, 1e-12);
        assert_eq!(
            cleaned.values,
            vec![100.0, 100.0, 100.0, 100.0, 80.0, 60.0, 60.0]
        );
        assert_eq!(cleaned.artifacts, 3);
    }

    #[test]
    fn clamp_is_idempotent_on_clean_output() {
        let raw = bpm_from_rr(&[800, 300, 820, 1600, 790, 805, 200, 810]);
        let cleaned = clean_bpm(&raw, &CleanerConfig::default()).unwrap();
        let (again, _) = clamp_to_range(&cleaned.values, 40.0, 200.0);
        assert_eq!(again, cleaned.values);
    }

    #[test]
    fn interpolates_interior_and_edges() {
        let mut values = vec![f64::NAN, 60.0, f64::NAN, 80.0, -1.0];
        let replaced = interpolate_invalid(&mut values).unwrap();
        assert_eq!(replaced, 3);
        assert_eq!(values, vec![60.0, 60.0, 70.0, 80.0, 80.0]);
    }

    #[test]
    fn interpolation_without_anchor_fails() {
        let mut values = vec![0.0, f64::NAN, -3.0];
        assert!(matches!(
            interpolate_invalid(&mut values),
            Err(CleanError::NoValidSamples)
        ));
    }

    #[test]
    fn interpolation_skipped_when_disabled() {
        let raw = BpmSeries {
            bpm: vec![f64::NAN, f64::NAN, f64::NAN],
        };
        let cfg = CleanerConfig {
            window: 3,
            interpolate: false,
            ..CleanerConfig::default()
        };
        let cleaned = clean_bpm(&raw, &cfg).unwrap();
        assert!(cleaned.values.iter().all(|v| v.is_nan()));
        assert!(cleaned.fill_value.is_nan());
    }

    #[test]
    fn random_recordings_keep_length_and_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let cfg = CleanerConfig::default();
        for _ in 0..50 {
            let len = rng.gen_range(5..200);
            let rr: Vec<u32> = (0..len)
                .map(|_| {
                    if rng.gen_bool(0.05) {
                        rng.gen_range(50..3000)
                    } else {
                        rng.gen_range(500..1100)
                    }
                })
                .collect();
            let raw = bpm_from_rr(&rr);
            let cleaned = clean_bpm(&raw, &cfg).unwrap();
            assert_eq!(cleaned.len(), raw.len());
            assert!(cleaned.artifacts <= raw.len());
            assert_eq!(cleaned.artifacts, count_artifacts(&raw.bpm, &cleaned.values));
            if (cfg.min_bpm..=cfg.max_bpm).contains(&cleaned.fill_value) {
                assert!(cleaned
                    .values
                    .iter()
                    .all(|v| (cfg.min_bpm..=cfg.max_bpm).contains(v)));
            }
        }
    }
}
