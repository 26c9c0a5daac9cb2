//! Error types for descriptor construction, hashing, render and read.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("improper hash format: {0:?}")]
    InvalidHash(String),

    #[error("improper location code: {0:?}")]
    InvalidLocation(String),

    #[error("invalid local path {0:?}: must be relative without '.' or '..' segments")]
    InvalidPath(String),

    #[error("invalid uri {0:?}")]
    InvalidUri(String),

    #[error("invalid timestamp {0:?}")]
    InvalidTimestamp(String),

    #[error("invalid piece configuration: {0}")]
    InvalidConfiguration(String),

    #[error("file '{}' does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("path uses different extension: expected {expected:?}, got {actual:?}")]
    MismatchedPath { expected: String, actual: String },

    #[error("local path required")]
    MissingLocalPath,

    #[error("files not specified")]
    EmptyDocument,

    #[error("{0} is not an XML file")]
    NotXml(String),

    #[error("cannot resolve content type for {url} (describing {path})")]
    TypeResolution { path: String, url: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    /// True for errors raised at assignment or configuration time.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidHash(_)
                | Error::InvalidLocation(_)
                | Error::InvalidPath(_)
                | Error::InvalidUri(_)
                | Error::InvalidTimestamp(_)
                | Error::InvalidConfiguration(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
