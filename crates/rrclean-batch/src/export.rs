use crate::registry::Subject;
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use csv::WriterBuilder;
use rrclean_lib::{
    io::naming::{cleaned_file_name, coded_file_name, subject_file_name},
    signal::format_time,
    BpmSeries, CleanedSeries, Intensity, IntervalSeries,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Everything the exporters know about one cleaned recording.
pub struct CleanedRecording<'a> {
    pub subject: &'a Subject,
    pub intensity: Intensity,
    pub source: &'a Path,
    pub timestamps: &'a [NaiveDateTime],
    pub intervals: &'a IntervalSeries,
    pub raw: &'a BpmSeries,
    pub cleaned: &'a CleanedSeries,
}

/// Side-effecting sink for cleaned recordings.
pub trait Exporter {
    /// Called once per successfully cleaned file. Returns the files written.
    fn export(&mut self, rec: &CleanedRecording<'_>) -> Result<Vec<PathBuf>>;

    /// Undo a successful `export` of `rec` because a later exporter failed on
    /// the same file. `written` is what `export` returned.
    fn discard(&mut self, _rec: &CleanedRecording<'_>, written: &[PathBuf]) -> Result<()> {
        remove_outputs(written)
    }

    /// Called once after every file was processed, with one result per output.
    fn finish(&mut self) -> Vec<Result<PathBuf>> {
        Vec::new()
    }
}

/// Delete files written for a recording that ended up failing.
pub fn remove_outputs(written: &[PathBuf]) -> Result<()> {
    for path in written {
        if path.exists() {
            fs::remove_file(path).with_context(|| format!("removing {}", path.display()))?;
        }
    }
    Ok(())
}

/// Writes `time, rr_interval, bpm` per recording, before any cleaning.
pub struct RawExporter {
    out_dir: PathBuf,
    suffix: String,
}

impl RawExporter {
    pub fn new(out_dir: impl Into<PathBuf>, suffix: impl Into<String>) -> Self {
        Self {
            out_dir: out_dir.into(),
            suffix: suffix.into(),
        }
    }
}

impl Exporter for RawExporter {
    fn export(&mut self, rec: &CleanedRecording<'_>) -> Result<Vec<PathBuf>> {
        let path = self
            .out_dir
            .join(coded_file_name(&rec.subject.code, rec.intensity, &self.suffix));
        let mut writer = WriterBuilder::new()
            .from_path(&path)
            .with_context(|| format!("creating {}", path.display()))?;
        writer.write_record(["time", "rr_interval", "bpm"])?;
        for ((t, rr), bpm) in rec
            .timestamps
            .iter()
            .zip(rec.intervals.values())
            .zip(&rec.raw.bpm)
        {
            writer.write_record([format_time(t), rr.to_string(), bpm.to_string()])?;
        }
        writer.flush()?;
        Ok(vec![path])
    }
}

#[derive(Debug, Clone)]
struct AggregateRow {
    time: NaiveDateTime,
    intensity: Intensity,
    bpm: f64,
}

/// Per-recording cleaned CSVs plus one aggregate CSV per subject.
pub struct CsvExporter {
    out_dir: PathBuf,
    suffix: String,
    pending: BTreeMap<String, (Subject, Vec<AggregateRow>)>,
}

impl CsvExporter {
    pub fn new(out_dir: impl Into<PathBuf>, suffix: impl Into<String>) -> Self {
        Self {
            out_dir: out_dir.into(),
            suffix: suffix.into(),
            pending: BTreeMap::new(),
        }
    }

    fn write_cleaned(&self, rec: &CleanedRecording<'_>) -> Result<PathBuf> {
        let path = self
            .out_dir
            .join(cleaned_file_name(&rec.subject.code, rec.intensity, &self.suffix));
        let mut writer = WriterBuilder::new()
            .from_path(&path)
            .with_context(|| format!("creating {}", path.display()))?;

        let mut header: Vec<&str> = vec![
            "time",
            "rr_interval",
            "bpm_raw",
            "bpm_clean",
            "intensity",
            "artifacts",
        ];
        header.extend(rec.subject.metadata_columns());
        writer.write_record(&header)?;

        let metadata: Vec<String> = rec.subject.metadata_values().collect();
        let intensity = rec.intensity.code().to_string();
        let artifacts = rec.cleaned.artifacts.to_string();
        for (i, t) in rec.timestamps.iter().enumerate() {
            let mut row = vec![
                format_time(t),
                rec.intervals.values()[i].to_string(),
                rec.raw.bpm[i].to_string(),
                rec.cleaned.values[i].to_string(),
                intensity.clone(),
                artifacts.clone(),
            ];
            row.extend(metadata.iter().cloned());
            writer.write_record(&row)?;
        }
        writer.flush()?;
        Ok(path)
    }
}

impl Exporter for CsvExporter {
    fn export(&mut self, rec: &CleanedRecording<'_>) -> Result<Vec<PathBuf>> {
        let path = self.write_cleaned(rec)?;
        let (_, rows) = self
            .pending
            .entry(rec.subject.key.clone())
            .or_insert_with(|| (rec.subject.clone(), Vec::new()));
        rows.extend(
            rec.timestamps
                .iter()
                .zip(&rec.cleaned.values)
                .map(|(t, bpm)| AggregateRow {
                    time: *t,
                    intensity: rec.intensity,
                    bpm: *bpm,
                }),
        );
        Ok(vec![path])
    }

    fn discard(&mut self, rec: &CleanedRecording<'_>, written: &[PathBuf]) -> Result<()> {
        if let Some((_, rows)) = self.pending.get_mut(&rec.subject.key) {
            let staged = rec.timestamps.len().min(rows.len());
            rows.truncate(rows.len() - staged);
            if rows.is_empty() {
                self.pending.remove(&rec.subject.key);
            }
        }
        remove_outputs(written)
    }

    fn finish(&mut self) -> Vec<Result<PathBuf>> {
        let mut results = Vec::new();
        for (_, (subject, mut rows)) in std::mem::take(&mut self.pending) {
            rows.sort_by(|a, b| (a.intensity, a.time).cmp(&(b.intensity, b.time)));
            let path = self.out_dir.join(subject_file_name(&subject.code, &self.suffix));
            let result = write_subject_rows(&path, &subject, &rows).map(|()| {
                log::info!("wrote {} ({} rows)", path.display(), rows.len());
                path
            });
            results.push(result);
        }
        results
    }
}

fn write_subject_rows(path: &Path, subject: &Subject, rows: &[AggregateRow]) -> Result<()> {
    let file = fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = WriterBuilder::new().from_writer(file);
    let mut header = vec!["time"];
    header.extend(subject.metadata_columns());
    header.extend(["intensity", "bpm"]);
    writer.write_record(&header)?;

    let metadata: Vec<String> = subject.metadata_values().collect();
    for row in rows {
        let mut record = vec![format_time(&row.time)];
        record.extend(metadata.iter().cloned());
        record.push(row.intensity.code().to_string());
        record.push(format!("{:.2}", row.bpm));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}
