//! One transfer: walk a source root, classify each book and copy it into the
//! output tree. Every book and every archive is its own failure domain.

use crate::archive::Extractor;
use crate::book::BookRecord;
use crate::catalog::{CatalogApi, CatalogClient};
use crate::error::OrganizeError;
use crate::paths;
use crate::report::FailureLedger;
use crate::walker::{Discovered, Discovery};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use std::fs;
use std::io;
use std::ops::AddAssign;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferSummary {
    pub books: usize,
    pub copied: usize,
    /// Copied to a fallback path after classification failed.
    pub degraded: usize,
    pub copy_failures: usize,
    pub archives_opened: usize,
    pub archive_failures: usize,
}

impl AddAssign for TransferSummary {
    fn add_assign(&mut self, other: Self) {
        self.books += other.books;
        self.copied += other.copied;
        self.degraded += other.degraded;
        self.copy_failures += other.copy_failures;
        self.archives_opened += other.archives_opened;
        self.archive_failures += other.archive_failures;
    }
}

/// Where a single book ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub destination: PathBuf,
    pub classified: bool,
}

pub struct Organizer<A> {
    catalog: CatalogClient<A>,
    extractor: Extractor,
    output_root: PathBuf,
    ledger: FailureLedger,
    progress: ProgressBar,
}

impl<A: CatalogApi> Organizer<A> {
    pub fn new(
        catalog: CatalogClient<A>,
        extractor: Extractor,
        output_root: impl Into<PathBuf>,
        ledger: FailureLedger,
    ) -> Self {
        Self {
            catalog,
            extractor,
            output_root: output_root.into(),
            ledger,
            progress: ProgressBar::hidden(),
        }
    }

    /// Shows a spinner with the current book while transferring.
    pub fn with_progress(mut self) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} [{elapsed_precise}] {pos} {msg}") {
            pb.set_style(style);
        }
        pb.enable_steady_tick(Duration::from_millis(120));
        self.progress = pb;
        self
    }

    pub fn catalog(&self) -> &CatalogClient<A> {
        &self.catalog
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Organizes every book reachable from `source_root`. Never fails: problems
    /// are logged and counted in the summary.
    pub fn transfer(&mut self, source_root: &Path) -> TransferSummary {
        info!("Scanning {}", source_root.display());
        let mut summary = TransferSummary::default();
        let skip = [self.output_root.as_path(), self.extractor.scratch_root()];
        let discovery = match Discovery::excluding(self.extractor.clone(), source_root, &skip) {
            Ok(d) => d,
            Err(e) => {
                error!("{e}");
                self.ledger.record(source_root, "source", &e);
                return summary;
            }
        };

        for item in discovery {
            match item {
                Discovered::Book(path) => {
                    summary.books += 1;
                    self.progress.inc(1);
                    match self.organize_book(&path) {
                        Ok(placed) => {
                            summary.copied += 1;
                            if !placed.classified {
                                summary.degraded += 1;
                            }
                        }
                        Err(e) => {
                            error!("{e}");
                            self.ledger.record(&path, "copy", &e);
                            summary.copy_failures += 1;
                        }
                    }
                }
                Discovered::Extracted { archive, into } => {
                    summary.archives_opened += 1;
                    debug!("{} extracted into {}", archive.display(), into.display());
                }
                Discovered::ArchiveFailed { archive, error: e } => {
                    error!("{e}");
                    self.ledger.record(&archive, "archive", &e);
                    summary.archive_failures += 1;
                }
            }
        }
        self.progress.set_message(String::new());
        info!(
            "{}: {} books, {} copied ({} unclassified), {} copy failures, {} archives opened, {} archive failures",
            source_root.display(),
            summary.books,
            summary.copied,
            summary.degraded,
            summary.copy_failures,
            summary.archives_opened,
            summary.archive_failures
        );
        summary
    }

    /// Classifies one book and copies it to its destination. A failed
    /// classification still copies, to the fallback path.
    pub fn organize_book(&mut self, path: &Path) -> Result<Placement, OrganizeError> {
        let mut book = BookRecord::open(path);
        info!("Organize book: \"{}\"", book.title());
        self.progress.set_message(book.title().to_string());

        let classified = match book.resolve_identity(&mut self.catalog) {
            Ok(_) => true,
            Err(e) => {
                self.ledger.record(path, "classify", &e);
                false
            }
        };
        let destination = paths::destination(&book, &self.output_root);
        if !classified {
            warn!(
                "Cannot classify \"{}\". At location {}.",
                book.keyword(),
                destination.display()
            );
        }
        let destination = place(path, &destination)?;
        debug!("{} -> {}", path.display(), destination.display());
        Ok(Placement {
            destination,
            classified,
        })
    }
}

/// Copies `from` to `to`, creating parent directories, and returns where the
/// book now lives. The source is untouched. An identical file already at `to`
/// counts as placed; a different one is kept and the copy goes to `name-N.ext`.
pub fn place(from: &Path, to: &Path) -> Result<PathBuf, OrganizeError> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|source| OrganizeError::CreateDir {
            dir: parent.to_path_buf(),
            source,
        })?;
    }
    let copy_failed = |to: &Path, source| OrganizeError::CopyFailed {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    let mut candidate = to.to_path_buf();
    let mut n = 0usize;
    while candidate.exists() {
        if same_path(from, &candidate) {
            debug!("{} is already in place", from.display());
            return Ok(candidate);
        }
        if same_content(from, &candidate).map_err(|e| copy_failed(&candidate, e))? {
            debug!("{} already holds {}", candidate.display(), from.display());
            return Ok(candidate);
        }
        n += 1;
        candidate = numbered(to, n);
    }
    if n > 0 {
        warn!(
            "{} holds a different book; copying {} to {}",
            to.display(),
            from.display(),
            candidate.display()
        );
    }
    fs::copy(from, &candidate).map_err(|e| copy_failed(&candidate, e))?;
    Ok(candidate)
}

fn same_path(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(left), Ok(right)) => left == right,
        _ => a == b,
    }
}

fn same_content(a: &Path, b: &Path) -> io::Result<bool> {
    if fs::metadata(a)?.len() != fs::metadata(b)?.len() {
        return Ok(false);
    }
    Ok(fs::read(a)? == fs::read(b)?)
}

// `dir/title.epub` -> `dir/title-N.epub`
fn numbered(path: &Path, n: usize) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}-{n}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{n}"),
    };
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::fixtures::write_zip;
    use crate::book::fixtures::epub;
    use crate::catalog::fake::FakeCatalog;
    use crate::config::{ArchiveConfig, CatalogConfig};
    use crate::error::CatalogError;
    use tempfile::tempdir;

    fn organizer(api: FakeCatalog, scratch: &Path, out: &Path) -> Organizer<FakeCatalog> {
        Organizer::new(
            CatalogClient::new(api, &CatalogConfig::default()),
            Extractor::new(scratch, &ArchiveConfig::default()),
            out,
            FailureLedger::open(&out.join("failures.jsonl")).unwrap(),
        )
    }

    #[test]
    fn classified_book_lands_under_catalog_identity() {
        let src = tempdir().unwrap();
        let work = tempdir().unwrap();
        let out = work.path().join("out");
        fs::write(
            src.path().join("a.epub"),
            epub(Some("魔法科高校的劣等生 1"), Some("佐島勤")),
        )
        .unwrap();
        let api = FakeCatalog::default()
            .with_subject(42, "魔法科高校的劣等生", &[])
            .with_person(42, 7, "佐岛勤", "作者");
        let mut org = organizer(api, &work.path().join("scratch"), &out);

        let summary = org.transfer(src.path());
        assert_eq!(summary.copied, 1);
        assert_eq!(summary.degraded, 0);
        assert!(out
            .join("佐岛勤[7]/魔法科高校的劣等生[42]/魔法科高校的劣等生 1.epub")
            .is_file());
        // source is copied, not moved
        assert!(src.path().join("a.epub").is_file());
    }

    #[test]
    fn unclassified_book_still_lands_on_fallback_path() {
        let src = tempdir().unwrap();
        let work = tempdir().unwrap();
        let out = work.path().join("out");
        fs::write(
            src.path().join("b.epub"),
            epub(Some("某本书 第二卷"), Some("作者甲")),
        )
        .unwrap();
        let api = FakeCatalog::default().with_failure(CatalogError::Transport {
            url: "u".into(),
            reason: "offline".into(),
        });
        let mut org = organizer(api, &work.path().join("scratch"), &out);

        let summary = org.transfer(src.path());
        assert_eq!(summary.copied, 1);
        assert_eq!(summary.degraded, 1);
        assert!(out.join("作者甲/某本书/某本书 第二卷.epub").is_file());
        let ledger = fs::read_to_string(out.join("failures.jsonl")).unwrap();
        assert!(ledger.contains("\"classify\""));
    }

    #[test]
    fn archives_are_isolated_failures() {
        let src = tempdir().unwrap();
        let work = tempdir().unwrap();
        let out = work.path().join("out");
        let book = epub(Some("Standalone"), Some("Someone"));
        write_zip(&src.path().join("bad.zip"), &[("x.epub", book.as_slice())], Some("nope"));
        write_zip(&src.path().join("good.zip"), &[("y.epub", book.as_slice())], Some("light931"));
        let mut org = organizer(FakeCatalog::default(), &work.path().join("scratch"), &out);

        let summary = org.transfer(src.path());
        assert_eq!(summary.archive_failures, 1);
        assert_eq!(summary.archives_opened, 1);
        assert_eq!(summary.copied, 1);
        assert!(out.join("Someone/Standalone.epub").is_file());
    }

    #[test]
    fn missing_source_root_yields_empty_summary() {
        let work = tempdir().unwrap();
        let out = work.path().join("out");
        let mut org = organizer(FakeCatalog::default(), &work.path().join("scratch"), &out);
        assert_eq!(
            org.transfer(Path::new("/no/such/root")),
            TransferSummary::default()
        );
    }

    #[test]
    fn copy_failure_is_reported() {
        let work = tempdir().unwrap();
        let err = place(&work.path().join("missing.epub"), &work.path().join("o/x.epub"))
            .unwrap_err();
        assert!(matches!(err, OrganizeError::CopyFailed { .. }));
    }

    #[test]
    fn rerun_with_output_inside_source_keeps_copies() {
        let src = tempdir().unwrap();
        let work = tempdir().unwrap();
        let out = src.path().join("output");
        let book = epub(Some("Standalone"), Some("Someone"));
        fs::write(src.path().join("a.epub"), &book).unwrap();

        for _ in 0..2 {
            let mut org = organizer(FakeCatalog::default(), &work.path().join("scratch"), &out);
            let summary = org.transfer(src.path());
            assert_eq!(summary.books, 1);
            assert_eq!(summary.copied, 1);
        }
        let placed = out.join("Someone/Standalone.epub");
        assert_eq!(fs::read(&placed).unwrap(), book);
        assert!(!out.join("Someone/Standalone-1.epub").exists());
    }

    #[test]
    fn placing_a_file_onto_itself_leaves_it_intact() {
        let work = tempdir().unwrap();
        let path = work.path().join("a.epub");
        fs::write(&path, b"book").unwrap();
        assert_eq!(place(&path, &path).unwrap(), path);
        assert_eq!(fs::read(&path).unwrap(), b"book");
    }

    #[test]
    fn different_books_for_one_destination_are_all_kept() {
        let src = tempdir().unwrap();
        let work = tempdir().unwrap();
        let out = work.path().join("out");
        fs::write(src.path().join("broken1.epub"), b"first broken book").unwrap();
        fs::write(src.path().join("broken2.epub"), b"second broken book").unwrap();

        for _ in 0..2 {
            let mut org = organizer(FakeCatalog::default(), &work.path().join("scratch"), &out);
            assert_eq!(org.transfer(src.path()).copied, 2);
        }
        let dir = out.join("unknown");
        assert_eq!(fs::read(dir.join("unknown.epub")).unwrap(), b"first broken book");
        assert_eq!(fs::read(dir.join("unknown-1.epub")).unwrap(), b"second broken book");
        // the second run found both already in place
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 2);
    }
}
