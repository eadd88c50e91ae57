use crate::error::{CleanError, Result};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Output format for per-sample timestamps.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Inter-beat intervals in milliseconds, in acquisition order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalSeries {
    rr_ms: Vec<u32>,
}

impl IntervalSeries {
    /// Wrap raw intervals; a zero interval has no defined heart rate and is rejected.
    pub fn new(rr_ms: Vec<u32>) -> Result<Self> {
        if let Some(index) = rr_ms.iter().position(|&v| v == 0) {
            return Err(CleanError::ZeroInterval { index });
        }
        Ok(Self { rr_ms })
    }

    pub fn values(&self) -> &[u32] {
        &self.rr_ms
    }

    pub fn len(&self) -> usize {
        self.rr_ms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rr_ms.is_empty()
    }

    /// Total recording duration in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.rr_ms.iter().map(|&v| u64::from(v)).sum()
    }
}

/// Instantaneous heart rate, one value per interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BpmSeries {
    pub bpm: Vec<f64>,
}

impl BpmSeries {
    /// `bpm[i] = 60000 / rr[i]`. Positivity is guaranteed by `IntervalSeries`.
    pub fn from_intervals(rr: &IntervalSeries) -> Self {
        let bpm = rr.values().iter().map(|&v| 60_000.0 / f64::from(v)).collect();
        Self { bpm }
    }

    pub fn len(&self) -> usize {
        self.bpm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bpm.is_empty()
    }
}

/// Exercise intensity of a recording segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    Low,
    Medium,
    High,
}

impl Intensity {
    /// Level as it appears in recording file names (1..=3).
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(Intensity::Low),
            2 => Some(Intensity::Medium),
            3 => Some(Intensity::High),
            _ => None,
        }
    }

    pub fn level(self) -> u8 {
        self.code() + 1
    }

    /// Integer code written to every CSV export (0..=2).
    pub fn code(self) -> u8 {
        match self {
            Intensity::Low => 0,
            Intensity::Medium => 1,
            Intensity::High => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Intensity::Low => "Low",
            Intensity::Medium => "Medium",
            Intensity::High => "High",
        }
    }
}

impl fmt::Display for Intensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A loaded recording: intervals plus per-sample times and heart rate when
/// the source carried them.
#[derive(Debug, Clone)]
pub struct Recording {
    pub intervals: IntervalSeries,
    pub times: Option<Vec<NaiveDateTime>>,
    /// Heart rate as stored by the recording device, one value per interval.
    pub bpm: Option<Vec<f64>>,
}

impl Recording {
    pub fn from_intervals(intervals: IntervalSeries) -> Self {
        Self {
            intervals,
            times: None,
            bpm: None,
        }
    }

    /// The stored heart rate when present, otherwise `60000 / rr`.
    pub fn bpm_series(&self) -> BpmSeries {
        match &self.bpm {
            Some(bpm) => BpmSeries { bpm: bpm.clone() },
            None => BpmSeries::from_intervals(&self.intervals),
        }
    }

    /// Per-sample times, using the recorded ones when present and deriving them from `start` otherwise.
    pub fn timestamps(&self, start: NaiveDateTime) -> Vec<NaiveDateTime> {
        match &self.times {
            Some(times) => times.clone(),
            None => beat_times(start, &self.intervals),
        }
    }
}

/// Stamp each beat at `start` plus the cumulative interval sum up to and including it.
pub fn beat_times(start: NaiveDateTime, rr: &IntervalSeries) -> Vec<NaiveDateTime> {
    let mut elapsed_ms: i64 = 0;
    rr.values()
        .iter()
        .map(|&v| {
            elapsed_ms += i64::from(v);
            start + Duration::milliseconds(elapsed_ms)
        })
        .collect()
}

pub fn format_time(t: &NaiveDateTime) -> String {
    t.format(TIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn bpm_matches_interval_length() {
        let rr = IntervalSeries::new(vec![800, 1000, 600, 750]).unwrap();
        let bpm = BpmSeries::from_intervals(&rr);
        assert_eq!(bpm.len(), rr.len());
        assert!((bpm.bpm[0] - 75.0).abs() < 1e-9);
        assert!((bpm.bpm[1] - 60.0).abs() < 1e-9);
        assert!((bpm.bpm[2] - 100.0).abs() < 1e-9);
        assert!((bpm.bpm[3] - 80.0).abs() < 1e-9);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = IntervalSeries::new(vec![800, 0, 800]).unwrap_err();
        assert!(matches!(err, CleanError::ZeroInterval { index: 1 }));
    }

    #[test]
    fn intensity_codes_are_zero_based() {
        assert_eq!(Intensity::from_level(1), Some(Intensity::Low));
        assert_eq!(Intensity::from_level(3).map(Intensity::code), Some(2));
        assert_eq!(Intensity::High.level(), 3);
        assert!(Intensity::from_level(0).is_none());
        assert!(Intensity::from_level(4).is_none());
    }

    #[test]
    fn stored_bpm_takes_precedence() {
        let rr = IntervalSeries::new(vec![650, 640]).unwrap();
        let mut rec = Recording::from_intervals(rr);
        assert!((rec.bpm_series().bpm[0] - 60_000.0 / 650.0).abs() < 1e-9);
        rec.bpm = Some(vec![92.31, 93.75]);
        assert_eq!(rec.bpm_series().bpm, vec![92.31, 93.75]);
    }

    #[test]
    fn beat_times_accumulate_intervals() {
        let start = NaiveDate::from_ymd_opt(2025, 10, 16)
            .unwrap()
            .and_hms_opt(9, 20, 31)
            .unwrap();
        let rr = IntervalSeries::new(vec![800, 850, 1000]).unwrap();
        let times = beat_times(start, &rr);
        assert_eq!(format_time(&times[0]), "2025-10-16 09:20:31.800");
        assert_eq!(format_time(&times[1]), "2025-10-16 09:20:32.650");
        assert_eq!(format_time(&times[2]), "2025-10-16 09:20:33.650");
        assert_eq!(rr.duration_ms(), 2650);
    }
}
