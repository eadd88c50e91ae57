pub mod csv;
pub mod naming;
pub mod text;

use crate::error::{CleanError, Result};
use crate::signal::Recording;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How a recording file is laid out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    /// `.csv` files are read as CSV, everything else as one interval per line.
    #[default]
    Auto,
    Lines,
    Csv,
}

impl InputFormat {
    pub fn resolve(self, path: &Path) -> InputFormat {
        match self {
            InputFormat::Auto => {
                let is_csv = path
                    .extension()
                    .and_then(|s| s.to_str())
                    .map(|ext| ext.eq_ignore_ascii_case("csv"))
                    .unwrap_or(false);
                if is_csv {
                    InputFormat::Csv
                } else {
                    InputFormat::Lines
                }
            }
            other => other,
        }
    }
}

/// Load one recording. `rr_column` names the interval column for CSV input.
pub fn load(path: &Path, format: InputFormat, rr_column: &str) -> Result<Recording> {
    let recording = match format.resolve(path) {
        InputFormat::Csv => csv::read_rr_csv(path, rr_column, Some(csv::DEFAULT_TIME_COLUMN))?,
        _ => Recording::from_intervals(text::read_rr_series(path)?),
    };
    log::debug!(
        "loaded {} intervals from {}",
        recording.intervals.len(),
        path.display()
    );
    Ok(recording)
}

/// Parse one interval field. Zero and negative values are format errors since
/// they have no heart rate.
pub(crate) fn parse_interval(field: &str) -> std::result::Result<u32, String> {
    let value: i64 = field
        .parse()
        .map_err(|_| format!("not an integer interval: {}", field))?;
    if value <= 0 {
        return Err(format!("interval must be positive, got {}", value));
    }
    u32::try_from(value).map_err(|_| format!("interval out of range: {}", value))
}

/// Accepts `YYYY-MM-DD HH:MM:SS[.fff]` with a space or `T` separator.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

pub(crate) fn read_to_string(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| CleanError::Io {
        path: path.to_path_buf(),
        source,
    })
}
