use lnsort::catalog::{RelatedPerson, Subject, SubjectSummary};
use lnsort::{
    ArchiveConfig, CatalogApi, CatalogClient, CatalogConfig, CatalogError, Extractor,
    FailureLedger, Organizer,
};
use std::cell::{Cell, RefCell};
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use tempfile::tempdir;
use zip::unstable::write::FileOptionsExt;
use zip::write::SimpleFileOptions;

/// One-subject catalog that records the keywords it was asked for.
struct OneSubject {
    id: u64,
    name: &'static str,
    authors: Vec<(u64, &'static str)>,
    keywords: RefCell<Vec<String>>,
    offline: Cell<bool>,
}

impl OneSubject {
    fn new(id: u64, name: &'static str, authors: &[(u64, &'static str)]) -> Self {
        Self {
            id,
            name,
            authors: authors.to_vec(),
            keywords: RefCell::new(Vec::new()),
            offline: Cell::new(false),
        }
    }

    fn check_online(&self) -> Result<(), CatalogError> {
        if self.offline.get() {
            return Err(CatalogError::Transport {
                url: "http://catalog.invalid".into(),
                reason: "connection refused".into(),
            });
        }
        Ok(())
    }
}

impl CatalogApi for OneSubject {
    fn search_subjects(&self, keyword: &str) -> Result<Vec<SubjectSummary>, CatalogError> {
        self.check_online()?;
        self.keywords.borrow_mut().push(keyword.to_string());
        Ok(vec![SubjectSummary {
            id: self.id,
            name: self.name.to_string(),
            name_cn: None,
            tags: Vec::new(),
        }])
    }

    fn subject(&self, id: u64) -> Result<Subject, CatalogError> {
        self.check_online()?;
        Ok(Subject {
            id,
            name: self.name.to_string(),
            name_cn: None,
        })
    }

    fn subject_persons(&self, _id: u64) -> Result<Vec<RelatedPerson>, CatalogError> {
        self.check_online()?;
        Ok(self
            .authors
            .iter()
            .map(|(id, name)| RelatedPerson {
                id: *id,
                name: name.to_string(),
                relation: Some("作者".to_string()),
            })
            .collect())
    }
}

fn zip_bytes(entries: &[(&str, &[u8])], password: Option<&str>) -> Vec<u8> {
    let mut w = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in entries {
        let mut opts = SimpleFileOptions::default();
        if let Some(pw) = password {
            opts = opts.with_deprecated_encryption(pw.as_bytes());
        }
        w.start_file(*name, opts).unwrap();
        w.write_all(body).unwrap();
    }
    w.finish().unwrap().into_inner()
}

fn epub(title: &str, creator: &str) -> Vec<u8> {
    let container = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles><rootfile full-path="content.opf" media-type="application/oebps-package+xml"/></rootfiles>
</container>"#;
    let opf = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>{title}</dc:title><dc:creator>{creator}</dc:creator>
  </metadata>
</package>"#
    );
    zip_bytes(
        &[
            ("mimetype", b"application/epub+zip".as_slice()),
            ("META-INF/container.xml", container.as_bytes()),
            ("content.opf", opf.as_bytes()),
        ],
        None,
    )
}

fn organizer(api: OneSubject, work: &Path) -> Organizer<OneSubject> {
    let out = work.join("out");
    Organizer::new(
        CatalogClient::new(api, &CatalogConfig::default()),
        Extractor::new(work.join("scratch"), &ArchiveConfig::default()),
        &out,
        FailureLedger::open(&out.join("failures.jsonl")).unwrap(),
    )
}

#[test]
fn books_inside_protected_archive_are_organized() {
    let src = tempdir().unwrap();
    let work = tempdir().unwrap();
    let vol1 = epub("刀剑神域 1", "川原砾");
    let vol2 = epub("刀剑神域 2", "川原砾");
    fs::write(
        src.path().join("sao.zip"),
        zip_bytes(
            &[("sao/vol1.epub", vol1.as_slice()), ("sao/vol2.epub", vol2.as_slice())],
            Some("tsdm"),
        ),
    )
    .unwrap();

    let mut org = organizer(OneSubject::new(9, "刀剑神域", &[(11, "川原砾")]), work.path());
    let summary = org.transfer(src.path());

    assert_eq!(summary.books, 2);
    assert_eq!(summary.copied, 2);
    assert_eq!(summary.archives_opened, 1);
    let series = work.path().join("out/川原砾[11]/刀剑神域[9]");
    assert!(series.join("刀剑神域 1.epub").is_file());
    assert!(series.join("刀剑神域 2.epub").is_file());
    // both volumes share one cached search
    assert_eq!(*org.catalog().api().keywords.borrow(), vec!["刀剑神域"]);
    // scratch is cleaned once the walk is over
    assert_eq!(fs::read_dir(work.path().join("scratch")).unwrap().count(), 0);
}

#[test]
fn offline_catalog_degrades_to_local_metadata() {
    let src = tempdir().unwrap();
    let work = tempdir().unwrap();
    fs::write(src.path().join("a.epub"), epub("\"狼与香辛料\" 第三卷", "支仓冻砂")).unwrap();

    let api = OneSubject::new(1, "狼与香辛料", &[]);
    api.offline.set(true);
    let mut org = organizer(api, work.path());
    let summary = org.transfer(src.path());

    assert_eq!(summary.copied, 1);
    assert_eq!(summary.degraded, 1);
    assert!(work
        .path()
        .join("out/支仓冻砂/狼与香辛料/狼与香辛料 第三卷.epub")
        .is_file());
    let ledger = fs::read_to_string(work.path().join("out/failures.jsonl")).unwrap();
    assert_eq!(ledger.lines().count(), 1);
}

#[test]
fn unreadable_book_is_still_copied_under_unknown() {
    let src = tempdir().unwrap();
    let work = tempdir().unwrap();
    fs::write(src.path().join("broken.epub"), b"not a zip").unwrap();

    let mut org = organizer(OneSubject::new(1, "something else", &[]), work.path());
    let summary = org.transfer(src.path());

    assert_eq!(summary.copied, 1);
    assert!(work.path().join("out/unknown/unknown.epub").is_file());
}
