//! Error types shared by the parsers, the genome model and the pipeline.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnnotError {
    /// A line with the wrong field count or an unparseable numeric field.
    #[error("Malformed line {line_no}: {reason}\n  -> {line}")]
    MalformedLine {
        line_no: usize,
        line: String,
        reason: String,
    },

    /// Evidence references a genome that is not part of the current run.
    #[error("Unknown genome: {0}")]
    UnknownGenome(String),

    #[error("Unknown protein {protein} in genome {genome}")]
    UnknownProtein { genome: String, protein: String },

    /// A protein was placed into a second, different cluster.
    #[error("Protein {protein} in genome {genome} is already in {existing}, cannot add to {new}")]
    DuplicateCluster {
        genome: String,
        protein: String,
        existing: String,
        new: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, AnnotError>;

impl AnnotError {
    pub(crate) fn malformed(line_no: usize, line: &str, reason: impl Into<String>) -> Self {
        AnnotError::MalformedLine {
            line_no,
            line: line.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AnnotError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Attaches a file path to bare I/O errors.
pub(crate) trait IoResultExt<T> {
    fn with_path<P: Into<PathBuf>>(self, path: P) -> Result<T>;
}

impl<T> IoResultExt<T> for std::result::Result<T, std::io::Error> {
    fn with_path<P: Into<PathBuf>>(self, path: P) -> Result<T> {
        self.map_err(|e| AnnotError::io(path, e))
    }
}
