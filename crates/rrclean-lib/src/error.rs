use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CleanError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("{}: line {line}: {reason}", path.display())]
    FileFormat {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    /// An interval of zero cannot be converted to a heart rate.
    #[error("interval at index {index} is zero")]
    ZeroInterval { index: usize },
    #[error("series has no valid samples to interpolate from")]
    NoValidSamples,
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CleanError {
    pub(crate) fn format(path: impl Into<PathBuf>, line: usize, reason: impl Into<String>) -> Self {
        CleanError::FileFormat {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CleanError>;
