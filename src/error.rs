use std::{io, path::PathBuf};

use thiserror::Error;

/// Fatal failures of the extraction pipeline.
///
/// Soft decode conditions (colour leaks, running off the end of a blob) are not
/// errors; they are returned as [`crate::formats::picture::DecodeAnomalies`].
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("cannot open {}: {source}", path.display())]
    ArchiveOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed {context}: {message}")]
    Format { context: String, message: String },

    #[error("cannot decompress {context}: {message}")]
    Decompress { context: String, message: String },

    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot load layout {}: {message}", path.display())]
    Layout { path: PathBuf, message: String },
}

impl ExtractError {
    pub fn format(context: impl Into<String>, message: impl Into<String>) -> Self {
        ExtractError::Format {
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn decompress(context: impl Into<String>, message: impl Into<String>) -> Self {
        ExtractError::Decompress {
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn open(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ExtractError::ArchiveOpen {
            path: path.into(),
            source,
        }
    }

    pub fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ExtractError::Write {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ExtractError>;
