use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum AggregatorError {
    #[error("invalid dataset code: {0}")]
    InvalidDatasetCode(String),

    #[error("dataset not found: {0}")]
    DatasetNotFound(String),

    #[error("dataset CSV not found in archive for {0}")]
    CsvNotFound(String),

    #[error("catalog has not been initialized yet")]
    CatalogMissing,

    #[error("failed to read catalog file: {0}")]
    CatalogRead(String),

    #[error("failed to write catalog file: {0}")]
    CatalogWrite(String),

    #[error("invalid upstream catalog: {0}")]
    CatalogInvalid(String),

    #[error("catalog request failed: {0}")]
    CatalogHttp(String),

    #[error("catalog endpoint returned status {status}: {message}")]
    CatalogStatus { status: u16, message: String },

    #[error("archive request failed: {0}")]
    ArchiveHttp(String),

    #[error("archive endpoint returned status {status}: {message}")]
    ArchiveStatus { status: u16, message: String },

    #[error("archive extraction failed: {0}")]
    Extract(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid bind address: {0}")]
    InvalidBindAddr(String),

    #[error("http server failed: {0}")]
    Server(String),
}
