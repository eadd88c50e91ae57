use crate::error::{CleanError, Result};
use crate::io::{parse_interval, parse_timestamp};
use crate::signal::{IntervalSeries, Recording};
use ::csv::{ReaderBuilder, StringRecord, Trim};
use std::fs::File;
use std::io::Read;
use std::path::Path;

pub const DEFAULT_RR_COLUMN: &str = "rr_interval";
pub const DEFAULT_TIME_COLUMN: &str = "time";
/// Heart rate already converted by the recording app. Used as-is when present.
pub const BPM_COLUMN: &str = "bpm";

/// Read a CSV recording with a header row.
///
/// `rr_col` is required. `time_col` is used when the header has it, in
/// which case every row must carry a parsable timestamp. A `bpm` column, when
/// present, is kept as the recording's stored heart rate.
pub fn read_rr_csv(path: &Path, rr_col: &str, time_col: Option<&str>) -> Result<Recording> {
    let file = File::open(path).map_err(|source| CleanError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_rr_csv(file, path, rr_col, time_col)
}

pub fn parse_rr_csv<R: Read>(
    reader: R,
    source: &Path,
    rr_col: &str,
    time_col: Option<&str>,
) -> Result<Recording> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(reader);
    let headers = reader
        .headers()
        .map_err(|e| CleanError::format(source, 1, format!("reading header: {}", e)))?
        .clone();

    let rr_idx = locate_column(&headers, rr_col)
        .ok_or_else(|| CleanError::format(source, 1, format!("missing column {}", rr_col)))?;
    let time_idx = time_col.and_then(|col| locate_column(&headers, col));
    let bpm_idx = locate_column(&headers, BPM_COLUMN).filter(|&idx| idx != rr_idx);

    let mut intervals = Vec::new();
    let mut times = time_idx.map(|_| Vec::new());
    let mut bpm = bpm_idx.map(|_| Vec::new());
    for result in reader.records() {
        let record = result.map_err(|e| {
            let line = e.position().map(|p| p.line() as usize).unwrap_or(0);
            CleanError::format(source, line, e.to_string())
        })?;
        let line = record.position().map(|p| p.line() as usize).unwrap_or(0);
        let field = record.get(rr_idx).unwrap_or("");
        let rr = parse_interval(field).map_err(|reason| CleanError::format(source, line, reason))?;
        intervals.push(rr);

        if let (Some(idx), Some(times)) = (time_idx, times.as_mut()) {
            let raw = record.get(idx).unwrap_or("");
            let t = parse_timestamp(raw).ok_or_else(|| {
                CleanError::format(source, line, format!("unparsable timestamp: {}", raw))
            })?;
            times.push(t);
        }

        if let (Some(idx), Some(bpm)) = (bpm_idx, bpm.as_mut()) {
            let raw = record.get(idx).unwrap_or("");
            let value: f64 = raw.parse().map_err(|_| {
                CleanError::format(source, line, format!("not a heart rate: {}", raw))
            })?;
            bpm.push(value);
        }
    }
    if intervals.is_empty() {
        return Err(CleanError::format(source, 0, "no RR intervals found"));
    }

    Ok(Recording {
        intervals: IntervalSeries::new(intervals)?,
        times,
        bpm,
    })
}

fn locate_column(headers: &StringRecord, requested: &str) -> Option<usize> {
    headers
        .iter()
        .position(|name| name.eq_ignore_ascii_case(requested))
}
