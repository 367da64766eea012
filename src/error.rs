//! Error taxonomy shared by the catalog, archive, metadata and organizing layers.
//!
//! Nothing here is fatal for a whole run: callers catch each kind at the
//! book or archive it belongs to, log it and move on.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures talking to the catalog service.
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    /// The catalog has no acceptable subject for the keyword.
    #[error("cannot find a novel named \"{keyword}\"")]
    NotFound { keyword: String },

    /// Request never produced a response (DNS, TLS, timeout, connection reset).
    #[error("catalog request {url} failed: {reason}")]
    Transport { url: String, reason: String },

    /// The service answered with a non-success status.
    #[error("catalog request {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The body did not have the expected shape.
    #[error("malformed catalog response from {url} at `{path}`: {reason}")]
    Malformed {
        url: String,
        path: String,
        reason: String,
    },
}

impl CatalogError {
    pub fn not_found(keyword: &str) -> Self {
        Self::NotFound {
            keyword: keyword.to_string(),
        }
    }

    /// Service-side trouble that may clear up on a second attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::NotFound { .. } | Self::Malformed { .. } => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Identity resolution for one book did not complete.
#[derive(Debug, Clone, Error)]
#[error("classification of \"{keyword}\" failed: {source}")]
pub struct ClassificationFailed {
    pub keyword: String,
    #[source]
    pub source: CatalogError,
}

/// Why a book's package metadata could not be read.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("not a zip package: {0}")]
    NotAPackage(#[from] zip::result::ZipError),

    #[error("package entry {0} is missing")]
    MissingEntry(String),

    #[error("invalid XML in {entry}: {reason}")]
    Xml { entry: String, reason: String },

    #[error("container manifest has no rootfile")]
    NoRootfile,

    #[error("package document has no metadata block")]
    NoMetadataBlock,
}

/// Failures opening or unpacking one archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("{} has an unknown password", archive.display())]
    UnknownPassword { archive: PathBuf },

    #[error("{} has an unsupported archive extension", path.display())]
    UnsupportedFormat { path: PathBuf },

    /// Damage unrelated to the password; other passwords are not tried.
    #[error("{} is corrupt: {reason}", archive.display())]
    Corrupt { archive: PathBuf, reason: String },

    #[error("`{tool}` is required to extract {} but was not found on PATH", archive.display())]
    ToolMissing { tool: String, archive: PathBuf },

    #[error("{} is nested deeper than {max} archives", archive.display())]
    TooDeep { archive: PathBuf, max: usize },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Failures placing a book in the output tree.
#[derive(Debug, Error)]
pub enum OrganizeError {
    #[error("cannot create {}: {source}", dir.display())]
    CreateDir {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("copy {} -> {} failed: {source}", from.display(), to.display())]
    CopyFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}
