use crate::error::{CleanError, Result};
use crate::io::{parse_interval, read_to_string};
use crate::signal::IntervalSeries;
use std::path::Path;

/// Parse newline-delimited RR intervals (ms), ignoring blank/comment lines.
///
/// `source` only labels errors.
pub fn parse_rr_lines(text: &str, source: &Path) -> Result<IntervalSeries> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let val = parse_interval(trimmed)
            .map_err(|reason| CleanError::format(source, idx + 1, reason))?;
        out.push(val);
    }
    if out.is_empty() {
        return Err(CleanError::format(source, 0, "no RR intervals found"));
    }
    IntervalSeries::new(out)
}

/// Read a newline-delimited RR series from disk.
pub fn read_rr_series(path: &Path) -> Result<IntervalSeries> {
    let text = read_to_string(path)?;
    parse_rr_lines(&text, path)
}
