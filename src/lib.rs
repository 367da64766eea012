//! Sorts light-novel EPUBs into `author/series/title.epub` using a bangumi-style
//! catalog, opening zip, 7z and rar archives (with a list of well-known
//! passwords) along the way.

pub mod archive;
pub mod book;
pub mod catalog;
pub mod config;
pub mod error;
pub mod logging;
pub mod matcher;
pub mod organizer;
pub mod paths;
pub mod report;
pub mod walker;

pub use archive::{ArchiveFormat, Extractor, ScratchDir};
pub use book::{BookRecord, PackageMetadata, Resolution};
pub use catalog::{CatalogApi, CatalogClient, HttpCatalog};
pub use config::{ArchiveConfig, CatalogConfig, Config};
pub use error::{ArchiveError, CatalogError, ClassificationFailed, MetadataError, OrganizeError};
pub use organizer::{Organizer, Placement, TransferSummary};
pub use report::FailureLedger;
pub use walker::{Discovered, Discovery};
