use crate::registry::CohortRegistry;
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use log::{debug, warn};
use rrclean_lib::{
    io::naming::{parse_recording_name, start_from_file_name, RecordingName},
    Intensity,
};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// A recording file matched to a subject and intensity.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    /// Registry key of the subject.
    pub subject: String,
    pub intensity: Intensity,
    pub start: Option<NaiveDateTime>,
}

#[derive(Debug, Default)]
pub struct Discovery {
    pub files: Vec<DiscoveredFile>,
    pub skipped: Vec<PathBuf>,
}

/// Match every file in `dir` against the registry, in file-name order.
///
/// Explicit `[[recordings]]` entries win over name conventions. When two files
/// map to the same subject and intensity, the first one is kept.
pub fn discover(dir: &Path, registry: &CohortRegistry) -> Result<Discovery> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut discovery = Discovery::default();
    let mut seen = HashSet::new();
    for path in paths {
        let Some(file_name) = path.file_name().and_then(|s| s.to_str()) else {
            discovery.skipped.push(path);
            continue;
        };
        match classify(file_name, registry) {
            Some((subject, intensity, start)) => {
                if !seen.insert((subject.clone(), intensity)) {
                    warn!(
                        "skipping {}: {} intensity {} already has a recording",
                        file_name, subject, intensity
                    );
                    discovery.skipped.push(path);
                    continue;
                }
                debug!("matched {} -> {} / {}", file_name, subject, intensity);
                discovery.files.push(DiscoveredFile {
                    path,
                    subject,
                    intensity,
                    start,
                });
            }
            None => {
                debug!("skipping unrecognised file {}", file_name);
                discovery.skipped.push(path);
            }
        }
    }
    Ok(discovery)
}

fn classify(
    file_name: &str,
    registry: &CohortRegistry,
) -> Option<(String, Intensity, Option<NaiveDateTime>)> {
    if let Some(mapping) = registry.recording(file_name) {
        let start = mapping.start.or_else(|| start_from_file_name(file_name));
        return Some((mapping.subject.clone(), mapping.intensity, start));
    }
    match parse_recording_name(file_name)? {
        RecordingName::Subject { subject, intensity } => {
            let found = registry.resolve_name(&subject);
            if found.is_none() {
                warn!("skipping {}: no subject named {}", file_name, subject);
            }
            Some((found?.key.clone(), intensity, None))
        }
        RecordingName::Coded {
            code,
            intensity,
            suffix,
        } => {
            if suffix != registry.suffix {
                return None;
            }
            let found = registry.resolve_code(&code);
            if found.is_none() {
                warn!("skipping {}: no subject with code {}", file_name, code);
            }
            Some((found?.key.clone(), intensity, None))
        }
    }
}
