use crate::catalog::{CatalogApi, CatalogClient, Persons, SubjectRef};
use crate::error::{ClassificationFailed, MetadataError};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};

pub const UNKNOWN: &str = "unknown";

const CONTAINER_PATH: &str = "META-INF/container.xml";
const NS_CONTAINER: &str = "urn:oasis:names:tc:opendocument:xmlns:container";
const NS_OPF: &str = "http://www.idpf.org/2007/opf";
const NS_DC: &str = "http://purl.org/dc/elements/1.1/";

const QUOTES: &[char] = &['"', '“', '”', '„', '＂'];

// Volume marker: optional 第, 1-3 digits or a Chinese numeral, optional 卷/话.
const ORDINAL: &str = r"第?(?:[0-9]{1,3}|[一二三四五六七八九十]{1,3})[卷话]?";
// "<series><ordinal>", "<series> <ordinal>" or "<series> <ordinal> <subtitle>"
static SERIES_WITH_ORDINAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^(\S+?)(?:\s?{ORDINAL}|\s+{ORDINAL}\s+.+)$")).unwrap()
});
static SERIES_BEFORE_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\S+)\s+\S").unwrap());

/// `title` and `creator` as found in the package document; `None` for an absent field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageMetadata {
    pub title: Option<String>,
    pub creator: Option<String>,
}

impl PackageMetadata {
    pub fn read(path: &Path) -> Result<Self, MetadataError> {
        let file = File::open(path).map_err(|source| MetadataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(BufReader::new(file))
    }

    /// Follows `META-INF/container.xml` to the rootfile and reads its first
    /// `dc:title` and `dc:creator`.
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self, MetadataError> {
        let mut zip = zip::ZipArchive::new(reader)?;

        let container = read_entry(&mut zip, CONTAINER_PATH)?;
        let container_doc = parse_xml(CONTAINER_PATH, &container)?;
        let rootfile = container_doc
            .descendants()
            .find(|n| n.has_tag_name((NS_CONTAINER, "rootfile")))
            .and_then(|n| n.attribute("full-path"))
            .ok_or(MetadataError::NoRootfile)?
            .to_string();

        let package = read_entry(&mut zip, &rootfile)?;
        let package_doc = parse_xml(&rootfile, &package)?;
        let root = package_doc.root_element();
        if !root.has_tag_name((NS_OPF, "package")) {
            return Err(MetadataError::NoMetadataBlock);
        }
        let metadata = root
            .children()
            .find(|n| n.has_tag_name((NS_OPF, "metadata")))
            .ok_or(MetadataError::NoMetadataBlock)?;

        let first_text = |local: &str| {
            metadata
                .descendants()
                .find(|n| n.has_tag_name((NS_DC, local)))
                .and_then(|n| n.text())
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
        };
        Ok(Self {
            title: first_text("title"),
            creator: first_text("creator"),
        })
    }
}

fn read_entry<R: Read + Seek>(
    zip: &mut zip::ZipArchive<R>,
    name: &str,
) -> Result<String, MetadataError> {
    let mut entry = match zip.by_name(name) {
        Ok(e) => e,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(MetadataError::MissingEntry(name.to_string()))
        }
        Err(e) => return Err(e.into()),
    };
    let mut text = String::new();
    entry
        .read_to_string(&mut text)
        .map_err(|e| MetadataError::Xml {
            entry: name.to_string(),
            reason: e.to_string(),
        })?;
    Ok(text)
}

fn parse_xml<'a>(entry: &str, text: &'a str) -> Result<roxmltree::Document<'a>, MetadataError> {
    let opts = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    roxmltree::Document::parse_with_options(text, opts).map_err(|e| MetadataError::Xml {
        entry: entry.to_string(),
        reason: e.to_string(),
    })
}

/// Removes quote characters; idempotent.
pub fn clean_title(title: &str) -> String {
    title.chars().filter(|c| !QUOTES.contains(c)).collect::<String>().trim().to_string()
}

/// Title with its trailing volume marker stripped, or `None` when the title
/// carries no detectable suffix.
pub fn derive_series_name(title: &str) -> Option<String> {
    let title = title.trim();
    SERIES_WITH_ORDINAL
        .captures(title)
        .or_else(|| SERIES_BEFORE_SPACE.captures(title))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Catalog identity of a book. Set in one piece or not at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub subject: SubjectRef,
    pub persons: Persons,
}

#[derive(Debug, Clone)]
pub struct BookRecord {
    pub path: PathBuf,
    title: String,
    author: String,
    clean_title: String,
    series: Option<String>,
    resolution: Option<Resolution>,
}

impl BookRecord {
    /// Reads package metadata; unreadable packages degrade to "unknown" fields.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let meta = match PackageMetadata::read(&path) {
            Ok(m) => m,
            Err(e) => {
                debug!("no usable metadata in {}: {e}", path.display());
                PackageMetadata::default()
            }
        };
        Self::from_metadata(path, meta)
    }

    pub fn from_metadata(path: PathBuf, meta: PackageMetadata) -> Self {
        let title = meta.title.unwrap_or_else(|| UNKNOWN.to_string());
        let author = meta.creator.unwrap_or_else(|| UNKNOWN.to_string());
        let clean = clean_title(&title);
        let series = derive_series_name(&clean);
        Self {
            path,
            title,
            author,
            clean_title: clean,
            series,
            resolution: None,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn clean_title(&self) -> &str {
        &self.clean_title
    }

    pub fn series_name(&self) -> Option<&str> {
        self.series.as_deref()
    }

    pub fn resolution(&self) -> Option<&Resolution> {
        self.resolution.as_ref()
    }

    pub fn keyword(&self) -> &str {
        self.series.as_deref().unwrap_or(&self.clean_title)
    }

    /// Resolves the catalog identity. On error the record keeps no partial
    /// resolution.
    pub fn resolve_identity<A: CatalogApi>(
        &mut self,
        catalog: &mut CatalogClient<A>,
    ) -> Result<&Resolution, ClassificationFailed> {
        let keyword = self.keyword().to_string();
        debug!("searching keyword \"{keyword}\"");
        let failed = |source| ClassificationFailed {
            keyword: keyword.clone(),
            source,
        };

        let mut subject = catalog.search(&keyword).map_err(failed)?;
        let mut persons = catalog.persons(subject.id).map_err(failed)?;
        if persons.authors.is_empty() {
            // Compilations and the like carry no authors; their canonical entry may.
            if let Some(corrected) = catalog.check_id(subject.id).map_err(failed)? {
                debug!("subject {} redirects to {}", subject.id, corrected.id);
                persons = catalog.persons(corrected.id).map_err(failed)?;
                subject = corrected;
            }
        }
        if persons.authors.is_empty() {
            warn!("Cannot find authors of \"{}\"", subject.name);
        }
        Ok(self.resolution.insert(Resolution { subject, persons }))
    }
}
