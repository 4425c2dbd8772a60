use std::io;
use std::path::PathBuf;
use thiserror::Error;

use super::config::ConfigError;
use super::runner::RunnerError;
use crate::core::io::box_file::BoxFileError;
use crate::core::io::metadata::MetadataError;
use crate::core::io::mrc::MrcError;
use crate::core::segmentation::SegmentationError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Segmentation failed: {source}")]
    Segmentation {
        #[from]
        source: SegmentationError,
    },

    #[error("External program failed: {source}")]
    Runner {
        #[from]
        source: RunnerError,
    },

    #[error("Box file error on '{path}': {source}")]
    BoxFile {
        path: PathBuf,
        #[source]
        source: BoxFileError,
    },

    #[error("Failed to process metadata file '{path}': {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: MetadataError,
    },

    #[error("Failed to read volume header '{path}': {source}")]
    VolumeHeader {
        path: PathBuf,
        #[source]
        source: MrcError,
    },

    #[error("Micrographs '{first}' and '{second}' would both write to '{output}'")]
    OutputCollision {
        output: PathBuf,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Expected output '{0}' was not produced")]
    MissingOutput(PathBuf),

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Internal logic error: {0}")]
    Internal(String),
}

impl EngineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn metadata(path: impl Into<PathBuf>, source: MetadataError) -> Self {
        Self::Metadata {
            path: path.into(),
            source,
        }
    }
}
