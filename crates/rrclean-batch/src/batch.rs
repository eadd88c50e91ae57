use crate::discover::{discover, DiscoveredFile};
use crate::export::{CleanedRecording, Exporter};
use crate::registry::CohortRegistry;
use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use rrclean_lib::{
    clean_bpm,
    io::{self, InputFormat},
    metrics::stats::Comparison,
    CleanerConfig, Intensity,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const SUMMARY_FILE: &str = "batch_summary.json";

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub cleaner: CleanerConfig,
    pub format: InputFormat,
    pub rr_column: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FileStatus {
    Ok {
        samples: usize,
        artifacts: usize,
        fill_value: f64,
        comparison: Comparison,
        outputs: Vec<PathBuf>,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileOutcome {
    pub file: PathBuf,
    pub subject: String,
    pub intensity: Intensity,
    #[serde(flatten)]
    pub status: FileStatus,
}

impl FileOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self.status, FileStatus::Ok { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub files: Vec<FileOutcome>,
    pub skipped: Vec<PathBuf>,
    /// Files written once all recordings were processed (per-subject aggregates).
    pub outputs: Vec<PathBuf>,
    pub finish_errors: Vec<String>,
}

/// Clean every recording the registry recognises in `cfg.input_dir`.
///
/// Files are processed one at a time; a failing file is recorded in the
/// summary and the batch moves on. Only an unreadable input directory or an
/// uncreatable output directory abort the run.
pub fn run_batch(
    registry: &CohortRegistry,
    cfg: &BatchConfig,
    exporters: &mut [&mut dyn Exporter],
) -> Result<BatchSummary> {
    cfg.cleaner.validate()?;
    fs::create_dir_all(&cfg.output_dir)
        .with_context(|| format!("creating {}", cfg.output_dir.display()))?;
    let discovery = discover(&cfg.input_dir, registry)?;
    info!(
        "found {} recordings in {} ({} skipped)",
        discovery.files.len(),
        cfg.input_dir.display(),
        discovery.skipped.len()
    );

    let mut files = Vec::with_capacity(discovery.files.len());
    for file in &discovery.files {
        let status = match process_file(file, registry, cfg, exporters) {
            Ok(status) => status,
            Err(err) => {
                warn!(
                    "{} ({} intensity {}) failed: {:#}",
                    file.path.display(),
                    file.subject,
                    file.intensity,
                    err
                );
                FileStatus::Failed {
                    error: format!("{:#}", err),
                }
            }
        };
        files.push(FileOutcome {
            file: file.path.clone(),
            subject: file.subject.clone(),
            intensity: file.intensity,
            status,
        });
    }

    let mut outputs = Vec::new();
    let mut finish_errors = Vec::new();
    for exporter in exporters.iter_mut() {
        for result in exporter.finish() {
            match result {
                Ok(path) => outputs.push(path),
                Err(err) => {
                    warn!("export finalisation failed: {:#}", err);
                    finish_errors.push(format!("{:#}", err));
                }
            }
        }
    }

    let succeeded = files.iter().filter(|f| f.is_ok()).count();
    Ok(BatchSummary {
        succeeded,
        failed: files.len() - succeeded,
        files,
        skipped: discovery.skipped,
        outputs,
        finish_errors,
    })
}

fn process_file(
    file: &DiscoveredFile,
    registry: &CohortRegistry,
    cfg: &BatchConfig,
    exporters: &mut [&mut dyn Exporter],
) -> Result<FileStatus> {
    let subject = registry
        .subject(&file.subject)
        .ok_or_else(|| anyhow!("unknown subject {}", file.subject))?;
    let recording = io::load(&file.path, cfg.format, &cfg.rr_column)?;
    let raw = recording.bpm_series();
    let cleaned = clean_bpm(&raw, &cfg.cleaner)?;
    let timestamps = recording.timestamps(file.start.unwrap_or(registry.default_start));

    let rec = CleanedRecording {
        subject,
        intensity: file.intensity,
        source: &file.path,
        timestamps: &timestamps,
        intervals: &recording.intervals,
        raw: &raw,
        cleaned: &cleaned,
    };
    let outputs = export_all(&rec, exporters)?;
    info!(
        "{} intensity {}: {} samples over {:.1} s, {} artifacts",
        subject.key,
        file.intensity,
        cleaned.len(),
        recording.intervals.duration_ms() as f64 / 1000.0,
        cleaned.artifacts
    );

    Ok(FileStatus::Ok {
        samples: cleaned.len(),
        artifacts: cleaned.artifacts,
        fill_value: cleaned.fill_value,
        comparison: Comparison::new(&raw.bpm, &cleaned.values),
        outputs,
    })
}

/// Run every exporter on `rec`. If one fails, the exporters that already
/// succeeded discard their output so the failed file leaves nothing behind.
fn export_all(
    rec: &CleanedRecording<'_>,
    exporters: &mut [&mut dyn Exporter],
) -> Result<Vec<PathBuf>> {
    let mut written: Vec<Vec<PathBuf>> = Vec::with_capacity(exporters.len());
    for idx in 0..exporters.len() {
        match exporters[idx].export(rec) {
            Ok(paths) => written.push(paths),
            Err(err) => {
                for (exporter, paths) in exporters.iter_mut().zip(&written) {
                    if let Err(discard_err) = exporter.discard(rec, paths) {
                        warn!(
                            "could not discard output of {}: {:#}",
                            rec.source.display(),
                            discard_err
                        );
                    }
                }
                return Err(err);
            }
        }
    }
    Ok(written.into_iter().flatten().collect())
}

pub fn write_summary(path: &Path, summary: &BatchSummary) -> Result<()> {
    let file = fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(file, summary)?;
    Ok(())
}
