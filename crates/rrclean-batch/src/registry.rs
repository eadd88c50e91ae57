use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDateTime;
use rrclean_lib::{io::parse_timestamp, CleanerConfig, Intensity};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default = "default_suffix")]
    suffix: String,
    #[serde(default)]
    default_start: Option<String>,
    #[serde(default)]
    cleaning: Option<CleanerConfig>,
    #[serde(default)]
    subjects: toml::Table,
    #[serde(default)]
    recordings: Vec<RecordingRow>,
}

#[derive(Debug, Deserialize)]
struct SubjectRow {
    code: String,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    metadata: toml::Table,
}

#[derive(Debug, Deserialize)]
struct RecordingRow {
    file: String,
    subject: String,
    intensity: u8,
    #[serde(default)]
    start: Option<String>,
}

fn default_suffix() -> String {
    "cleaned".into()
}

/// Static metadata value, written verbatim into every export row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetaValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::Text(s) => f.write_str(s),
            MetaValue::Integer(v) => write!(f, "{}", v),
            MetaValue::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{:.1}", v),
            MetaValue::Float(v) => write!(f, "{}", v),
            MetaValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

impl TryFrom<toml::Value> for MetaValue {
    type Error = anyhow::Error;

    fn try_from(value: toml::Value) -> Result<Self> {
        match value {
            toml::Value::String(s) => Ok(MetaValue::Text(s)),
            toml::Value::Integer(v) => Ok(MetaValue::Integer(v)),
            toml::Value::Float(v) => Ok(MetaValue::Float(v)),
            toml::Value::Boolean(v) => Ok(MetaValue::Bool(v)),
            other => Err(anyhow!("unsupported metadata value {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Subject {
    /// Registry key, e.g. `oskar`.
    pub key: String,
    /// Code used in export file names.
    pub code: String,
    pub aliases: Vec<String>,
    /// Ordered as declared in the registry.
    pub metadata: Vec<(String, MetaValue)>,
}

impl Subject {
    pub fn matches_name(&self, name: &str) -> bool {
        self.key.eq_ignore_ascii_case(name) || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    }

    pub fn metadata_columns(&self) -> impl Iterator<Item = &str> {
        self.metadata.iter().map(|(k, _)| k.as_str())
    }

    pub fn metadata_values(&self) -> impl Iterator<Item = String> + '_ {
        self.metadata.iter().map(|(_, v)| v.to_string())
    }
}

/// Explicit file-to-recording mapping for files whose names carry no subject.
#[derive(Debug, Clone)]
pub struct RecordingMapping {
    pub file: String,
    pub subject: String,
    pub intensity: Intensity,
    pub start: Option<NaiveDateTime>,
}

/// Cohort description: subjects, their metadata and how recordings map onto them.
#[derive(Debug, Clone)]
pub struct CohortRegistry {
    pub suffix: String,
    /// Start used when neither the file nor its mapping provides one.
    pub default_start: NaiveDateTime,
    pub cleaning: CleanerConfig,
    pub subjects: Vec<Subject>,
    pub recordings: Vec<RecordingMapping>,
}

impl CohortRegistry {
    pub fn subject(&self, key: &str) -> Option<&Subject> {
        self.subjects.iter().find(|s| s.key == key)
    }

    /// Match a name from a file name against keys and aliases, ignoring case.
    pub fn resolve_name(&self, name: &str) -> Option<&Subject> {
        self.subjects.iter().find(|s| s.matches_name(name))
    }

    pub fn resolve_code(&self, code: &str) -> Option<&Subject> {
        self.subjects.iter().find(|s| s.code.eq_ignore_ascii_case(code))
    }

    pub fn recording(&self, file_name: &str) -> Option<&RecordingMapping> {
        self.recordings.iter().find(|r| r.file == file_name)
    }
}

pub fn read_registry(path: &Path) -> Result<CohortRegistry> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read registry {}", path.display()))?;
    parse_registry(&contents).with_context(|| format!("parsing registry {}", path.display()))
}

pub fn parse_registry(contents: &str) -> Result<CohortRegistry> {
    let file: RegistryFile = toml::from_str(contents)?;

    let default_start = match file.default_start.as_deref() {
        Some(raw) => parse_timestamp(raw).ok_or_else(|| anyhow!("invalid default_start {}", raw))?,
        None => NaiveDateTime::default(),
    };

    let cleaning = file.cleaning.unwrap_or_default();
    cleaning.validate().context("invalid [cleaning] section")?;

    let mut subjects = Vec::with_capacity(file.subjects.len());
    for (key, value) in file.subjects {
        let row: SubjectRow = value
            .try_into()
            .with_context(|| format!("parsing subject {}", key))?;
        if row.code.trim().is_empty() {
            bail!("subject {} has an empty code", key);
        }
        let mut metadata = Vec::with_capacity(row.metadata.len());
        for (name, value) in row.metadata {
            let value = MetaValue::try_from(value)
                .with_context(|| format!("subject {} metadata {}", key, name))?;
            metadata.push((name, value));
        }
        subjects.push(Subject {
            key,
            code: row.code,
            aliases: row.aliases,
            metadata,
        });
    }

    let mut recordings = Vec::with_capacity(file.recordings.len());
    for row in file.recordings {
        if !subjects.iter().any(|s| s.key == row.subject) {
            bail!("recording {} refers to unknown subject {}", row.file, row.subject);
        }
        let intensity = Intensity::from_level(row.intensity).ok_or_else(|| {
            anyhow!(
                "recording {} has intensity {} (expected 1, 2 or 3)",
                row.file,
                row.intensity
            )
        })?;
        let start = match row.start.as_deref() {
            Some(raw) => Some(
                parse_timestamp(raw)
                    .ok_or_else(|| anyhow!("recording {} has invalid start {}", row.file, raw))?,
            ),
            None => None,
        };
        recordings.push(RecordingMapping {
            file: row.file,
            subject: row.subject,
            intensity,
            start,
        });
    }

    Ok(CohortRegistry {
        suffix: file.suffix,
        default_start,
        cleaning,
        subjects,
        recordings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
suffix = "lsdlpr25"
default_start = "2025-10-16T09:20:31"

[cleaning]
window = 7

[subjects.oskar]
code = "steinosk"
[subjects.oskar.metadata]
person_id = "001"
sex = 1
sleep_h = 0.0
exercise = "running"

[subjects.micheelle]
code = "linamic"
aliases = ["Michelle"]
[subjects.micheelle.metadata]
person_id = "002"
sleep_h = 0.5

[[recordings]]
file = "2025-10-16 09-20-31.txt"
subject = "oskar"
intensity = 2
"#;

    #[test]
    fn parses_subjects_in_declared_order() {
        let reg = parse_registry(SAMPLE).unwrap();
        assert_eq!(reg.suffix, "lsdlpr25");
        assert_eq!(reg.cleaning.window, 7);
        assert_eq!(reg.cleaning.min_bpm, 40.0);
        let keys: Vec<_> = reg.subjects.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, ["oskar", "micheelle"]);
        let oskar = reg.subject("oskar").unwrap();
        let cols: Vec<_> = oskar.metadata_columns().collect();
        assert_eq!(cols, ["person_id", "sex", "sleep_h", "exercise"]);
        let values: Vec<_> = oskar.metadata_values().collect();
        assert_eq!(values, ["001", "1", "0.0", "running"]);
    }

    #[test]
    fn resolves_aliases_and_codes() {
        let reg = parse_registry(SAMPLE).unwrap();
        assert_eq!(reg.resolve_name("MICHELLE").unwrap().key, "micheelle");
        assert_eq!(reg.resolve_name("Micheelle").unwrap().key, "micheelle");
        assert_eq!(reg.resolve_code("steinosk").unwrap().key, "oskar");
        assert!(reg.resolve_name("eros").is_none());
        let rec = reg.recording("2025-10-16 09-20-31.txt").unwrap();
        assert_eq!(rec.intensity, Intensity::Medium);
    }

    #[test]
    fn rejects_unknown_recording_subject() {
        let text = r#"
[subjects.a]
code = "aa"
[[recordings]]
file = "x.txt"
subject = "b"
intensity = 1
"#;
        let err = parse_registry(text).unwrap_err();
        assert!(err.to_string().contains("unknown subject"));
    }

    #[test]
    fn rejects_invalid_cleaning_window() {
        let text = "[cleaning]\nwindow = 4\n";
        assert!(parse_registry(text).is_err());
    }

    #[test]
    fn rejects_nested_metadata() {
        let text = r#"
[subjects.a]
code = "aa"
[subjects.a.metadata]
scores = [1, 2]
"#;
        assert!(parse_registry(text).is_err());
    }

    #[test]
    fn defaults_without_optional_sections() {
        let reg = parse_registry("[subjects.a]\ncode = \"aa\"\n").unwrap();
        assert_eq!(reg.suffix, "cleaned");
        assert_eq!(reg.cleaning, CleanerConfig::default());
        assert!(reg.recordings.is_empty());
    }

    #[test]
    fn reads_shipped_cohort() {
        let path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .parent()
            .and_then(|p| p.parent())
            .expect("workspace")
            .join("config/cohort.toml");
        let reg = read_registry(&path).unwrap();
        assert_eq!(reg.subjects.len(), 3);
        assert_eq!(reg.resolve_name("michelle").unwrap().code, "linamic");
    }
}
