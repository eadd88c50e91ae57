//! File naming conventions for raw recordings and exported datasets.

use crate::signal::Intensity;
use chrono::NaiveDateTime;
use std::path::Path;

const SUBJECT_MARKER: &str = "_int_";
const CODED_MARKER: &str = "_activity_intensity_";

/// What a recording file name says about its contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingName {
    /// `<subject>_int_<level>.txt`, e.g. `Oskar_int_2.txt`.
    Subject { subject: String, intensity: Intensity },
    /// `<code>_activity_intensity_<level>_<suffix>.csv`.
    Coded {
        code: String,
        intensity: Intensity,
        suffix: String,
    },
}

pub fn parse_recording_name(file_name: &str) -> Option<RecordingName> {
    let path = Path::new(file_name);
    let stem = path.file_stem()?.to_str()?;
    let ext = path.extension()?.to_str()?;

    if ext.eq_ignore_ascii_case("txt") {
        let (subject, level) = stem.split_once(SUBJECT_MARKER)?;
        if subject.is_empty() || !subject.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        return Some(RecordingName::Subject {
            subject: subject.to_string(),
            intensity: parse_level(level)?,
        });
    }

    if ext.eq_ignore_ascii_case("csv") {
        let (code, rest) = stem.split_once(CODED_MARKER)?;
        let (level, suffix) = rest.split_once('_')?;
        if code.is_empty() || suffix.is_empty() {
            return None;
        }
        return Some(RecordingName::Coded {
            code: code.to_string(),
            intensity: parse_level(level)?,
            suffix: suffix.to_string(),
        });
    }

    None
}

fn parse_level(level: &str) -> Option<Intensity> {
    if level.len() != 1 {
        return None;
    }
    level.parse::<u8>().ok().and_then(Intensity::from_level)
}

/// Recording start encoded in a timestamp-named file, e.g. `2025-10-16 09-20-31.txt`.
pub fn start_from_file_name(file_name: &str) -> Option<NaiveDateTime> {
    let stem = Path::new(file_name).file_stem()?.to_str()?;
    NaiveDateTime::parse_from_str(stem, "%Y-%m-%d %H-%M-%S").ok()
}

/// `<code>_activity_intensity_<level>_<suffix>.csv`
pub fn coded_file_name(code: &str, intensity: Intensity, suffix: &str) -> String {
    format!(
        "{}{}{}_{}.csv",
        code,
        CODED_MARKER,
        intensity.level(),
        suffix
    )
}

/// `<code>_activity_intensity_<level>_cleaned_<suffix>.csv`
pub fn cleaned_file_name(code: &str, intensity: Intensity, suffix: &str) -> String {
    coded_file_name(code, intensity, &format!("cleaned_{}", suffix))
}

/// `<code>_activity_<suffix>.csv`
pub fn subject_file_name(code: &str, suffix: &str) -> String {
    format!("{}_activity_{}.csv", code, suffix)
}
