//! Lazy discovery of e-books under a source root, descending into archives.
//!
//! For every tree (the root, then each extracted archive) all e-books are
//! yielded first, then each archive is extracted and its tree walked the same
//! way. An archive's scratch directory lives until its sub-walk is exhausted.
//! Failures are yielded as items; the walk itself never stops on them.

use crate::archive::{ArchiveFormat, Extractor, ScratchDir};
use crate::error::ArchiveError;
use log::{debug, warn};
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::vec;
use walkdir::WalkDir;

pub const EBOOK_EXTENSION: &str = "epub";

#[derive(Debug)]
pub enum Discovered {
    Book(PathBuf),
    /// An archive opened; its contents follow.
    Extracted { archive: PathBuf, into: PathBuf },
    ArchiveFailed { archive: PathBuf, error: ArchiveError },
}

pub fn is_ebook(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|e| e.eq_ignore_ascii_case(EBOOK_EXTENSION))
}

struct Frame {
    books: vec::IntoIter<PathBuf>,
    archives: vec::IntoIter<PathBuf>,
    depth: usize,
    // dropped (and cleaned up) together with the frame
    _scratch: Option<ScratchDir>,
}

impl Frame {
    fn scan(dir: &Path, depth: usize, scratch: Option<ScratchDir>, skip: &[PathBuf]) -> Self {
        let mut books = Vec::new();
        let mut archives = Vec::new();
        let walk = WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !skip.iter().any(|s| e.path().starts_with(s)));
        for entry in walk {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("skipping unreadable entry under {}: {e}", dir.display());
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.into_path();
            if is_ebook(&path) {
                books.push(path);
            } else if ArchiveFormat::is_archive(&path) {
                archives.push(path);
            }
        }
        Self {
            books: books.into_iter(),
            archives: archives.into_iter(),
            depth,
            _scratch: scratch,
        }
    }
}

pub struct Discovery {
    extractor: Extractor,
    stack: Vec<Frame>,
}

impl Discovery {
    pub fn new(extractor: Extractor, root: &Path) -> io::Result<Self> {
        Self::excluding(extractor, root, &[])
    }

    /// Like [`Discovery::new`], but never descends into `skip` (the output
    /// tree, the scratch root) when those lie inside `root`.
    pub fn excluding(extractor: Extractor, root: &Path, skip: &[&Path]) -> io::Result<Self> {
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("source directory {} does not exist", root.display()),
            ));
        }
        let skip = nested_under(root, skip);
        for dir in &skip {
            debug!("not scanning {}", dir.display());
        }
        let stack = vec![Frame::scan(root, 0, None, &skip)];
        Ok(Self { extractor, stack })
    }
}

// Each of `dirs` that exists below `root`, spelled relative to `root` as given
// so it compares against walk entries.
fn nested_under(root: &Path, dirs: &[&Path]) -> Vec<PathBuf> {
    let Ok(canonical_root) = fs::canonicalize(root) else {
        return Vec::new();
    };
    dirs.iter()
        .filter_map(|dir| fs::canonicalize(dir).ok())
        .filter_map(|dir| {
            dir.strip_prefix(&canonical_root)
                .ok()
                .filter(|rel| !rel.as_os_str().is_empty())
                .map(|rel| root.join(rel))
        })
        .collect()
}

impl Iterator for Discovery {
    type Item = Discovered;

    fn next(&mut self) -> Option<Discovered> {
        loop {
            let frame = self.stack.last_mut()?;
            if let Some(book) = frame.books.next() {
                return Some(Discovered::Book(book));
            }
            let Some(archive) = frame.archives.next() else {
                self.stack.pop();
                continue;
            };
            let depth = frame.depth + 1;
            if depth > self.extractor.max_depth() {
                return Some(Discovered::ArchiveFailed {
                    error: ArchiveError::TooDeep {
                        archive: archive.clone(),
                        max: self.extractor.max_depth(),
                    },
                    archive,
                });
            }
            return Some(match self.extractor.extract(&archive) {
                Ok(scratch) => {
                    let into = scratch.path().to_path_buf();
                    self.stack.push(Frame::scan(&into, depth, Some(scratch), &[]));
                    Discovered::Extracted { archive, into }
                }
                Err(error) => Discovered::ArchiveFailed { archive, error },
            });
        }
    }
}
