//! Password brute force over zip, rar and 7z archives.
//!
//! Every configured password gets a fresh, empty extraction directory. The
//! first password that extracts the whole archive wins. Damage unrelated to
//! the password aborts the archive without trying the rest.

use crate::config::ArchiveConfig;
use crate::error::ArchiveError;
use log::{debug, warn};
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Stdio};

const UNAR: &str = "unar";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Rar,
    SevenZip,
}

impl ArchiveFormat {
    pub fn from_path(path: &Path) -> Result<Self, ArchiveError> {
        let ext = path
            .extension()
            .and_then(OsStr::to_str)
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("zip") => Ok(Self::Zip),
            Some("rar") => Ok(Self::Rar),
            Some("7z") => Ok(Self::SevenZip),
            _ => Err(ArchiveError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    pub fn is_archive(path: &Path) -> bool {
        Self::from_path(path).is_ok()
    }
}

/// Outcome of one failed password attempt.
#[derive(Debug)]
enum Attempt {
    /// Wrong or missing password; try the next one.
    Rejected(String),
    /// Not password related; give up on the archive.
    Fatal(ArchiveError),
}

impl From<io::Error> for Attempt {
    fn from(e: io::Error) -> Self {
        Attempt::Fatal(ArchiveError::Io(e))
    }
}

/// Extraction directory for one archive, removed on drop unless kept.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    keep: bool,
}

impl ScratchDir {
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn reset(&self) -> io::Result<()> {
        if self.path.exists() {
            fs::remove_dir_all(&self.path)?;
        }
        fs::create_dir_all(&self.path)
    }

    fn has_content(&self) -> bool {
        fs::read_dir(&self.path)
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        if let Err(e) = fs::remove_dir_all(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                debug!("cannot remove {}: {e}", self.path.display());
            }
        }
    }
}

/// Opens archives under a shared scratch root.
#[derive(Debug, Clone)]
pub struct Extractor {
    scratch_root: PathBuf,
    rar_tool: String,
    passwords: Vec<Option<String>>,
    keep_extracted: bool,
    max_depth: usize,
}

impl Extractor {
    pub fn new(scratch_root: impl Into<PathBuf>, cfg: &ArchiveConfig) -> Self {
        Self {
            scratch_root: scratch_root.into(),
            rar_tool: UNAR.to_string(),
            passwords: cfg.passwords.clone(),
            keep_extracted: cfg.keep_extracted,
            max_depth: cfg.max_depth,
        }
    }

    /// Uses `tool` (name or path) instead of `unar` for rar archives.
    pub fn with_rar_tool(mut self, tool: impl Into<String>) -> Self {
        self.rar_tool = tool.into();
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn scratch_root(&self) -> &Path {
        &self.scratch_root
    }

    /// Extracts `archive`, trying each password in order.
    pub fn extract(&self, archive: &Path) -> Result<ScratchDir, ArchiveError> {
        let format = ArchiveFormat::from_path(archive)?;
        debug!("handling {} as {format:?}", archive.display());
        if format == ArchiveFormat::Rar && which::which(&self.rar_tool).is_err() {
            return Err(ArchiveError::ToolMissing {
                tool: self.rar_tool.clone(),
                archive: archive.to_path_buf(),
            });
        }

        let scratch = self.allocate(archive)?;
        for password in &self.passwords {
            scratch.reset()?;
            match self.unpack(format, archive, scratch.path(), password.as_deref()) {
                Ok(()) if scratch.has_content() => {
                    debug!("extract dir: {}", scratch.path().display());
                    return Ok(scratch);
                }
                Ok(()) => debug!("{} extracted nothing", archive.display()),
                Err(Attempt::Rejected(reason)) => {
                    debug!(
                        "{} rejected password {:?}: {reason}",
                        archive.display(),
                        password.as_deref().unwrap_or("")
                    );
                }
                Err(Attempt::Fatal(e)) => return Err(e),
            }
        }
        Err(ArchiveError::UnknownPassword {
            archive: archive.to_path_buf(),
        })
    }

    /// Unpacks `archive` into the empty directory `dest` with one password.
    fn unpack(
        &self,
        format: ArchiveFormat,
        archive: &Path,
        dest: &Path,
        password: Option<&str>,
    ) -> Result<(), Attempt> {
        match format {
            ArchiveFormat::Zip => extract_zip(archive, dest, password),
            ArchiveFormat::Rar => extract_rar(&self.rar_tool, archive, dest, password),
            ArchiveFormat::SevenZip => extract_7z(archive, dest, password),
        }
    }

    // `<root>/<file name>`, suffixed `-N` when a sibling already took it.
    fn allocate(&self, archive: &Path) -> io::Result<ScratchDir> {
        fs::create_dir_all(&self.scratch_root)?;
        let name = archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "archive".to_string());
        let mut n = 0usize;
        loop {
            let candidate = if n == 0 {
                self.scratch_root.join(&name)
            } else {
                self.scratch_root.join(format!("{name}-{n}"))
            };
            match fs::create_dir(&candidate) {
                Ok(()) => {
                    return Ok(ScratchDir {
                        path: candidate,
                        keep: self.keep_extracted,
                    })
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => n += 1,
                Err(e) => return Err(e),
            }
        }
    }
}

/// Drops `..`, roots and prefixes so an entry cannot escape the destination.
fn sanitize_entry(path: &Path) -> Option<PathBuf> {
    let mut clean = PathBuf::new();
    for component in path.components() {
        if let Component::Normal(part) = component {
            clean.push(part);
        }
    }
    if clean.as_os_str().is_empty() {
        None
    } else {
        Some(clean)
    }
}

fn extract_zip(archive: &Path, dest: &Path, password: Option<&str>) -> Result<(), Attempt> {
    let file = File::open(archive)?;
    let mut zip = zip::ZipArchive::new(BufReader::new(file)).map_err(|e| {
        Attempt::Fatal(ArchiveError::Corrupt {
            archive: archive.to_path_buf(),
            reason: e.to_string(),
        })
    })?;

    for i in 0..zip.len() {
        let encrypted = zip
            .by_index_raw(i)
            .map(|entry| entry.encrypted())
            .map_err(|e| corrupt(archive, e))?;
        // Errors on encrypted entries are blamed on the password.
        let blame = |e: String| {
            if encrypted {
                Attempt::Rejected(e)
            } else {
                Attempt::Fatal(ArchiveError::Corrupt {
                    archive: archive.to_path_buf(),
                    reason: e,
                })
            }
        };
        let mut entry = match (encrypted, password) {
            (true, None) => return Err(Attempt::Rejected("password required".into())),
            (true, Some(pw)) => zip.by_index_decrypt(i, pw.as_bytes()),
            (false, _) => zip.by_index(i),
        }
        .map_err(|e| blame(e.to_string()))?;

        let Some(rel) = entry.enclosed_name().and_then(|p| sanitize_entry(&p)) else {
            warn!("skipping unsafe entry {} in {}", entry.name(), archive.display());
            continue;
        };
        let out = dest.join(rel);
        if entry.is_dir() {
            fs::create_dir_all(&out)?;
            continue;
        }
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut target = File::create(&out)?;
        io::copy(&mut entry, &mut target).map_err(|e| blame(e.to_string()))?;
    }
    Ok(())
}

fn corrupt(archive: &Path, e: impl ToString) -> Attempt {
    Attempt::Fatal(ArchiveError::Corrupt {
        archive: archive.to_path_buf(),
        reason: e.to_string(),
    })
}

fn extract_7z(archive: &Path, dest: &Path, password: Option<&str>) -> Result<(), Attempt> {
    let pw = password.map_or_else(sevenz_rust::Password::empty, sevenz_rust::Password::from);
    sevenz_rust::decompress_file_with_password(archive, dest, pw).map_err(|e| {
        let reason = e.to_string();
        if looks_like_password_failure(&reason) {
            Attempt::Rejected(reason)
        } else {
            corrupt(archive, reason)
        }
    })
}

fn extract_rar(
    tool: &str,
    archive: &Path,
    dest: &Path,
    password: Option<&str>,
) -> Result<(), Attempt> {
    let mut cmd = Command::new(tool);
    cmd.arg("-q")
        .arg("-f")
        .arg("-D")
        .arg("-o")
        .arg(dest)
        .stdin(Stdio::null());
    if let Some(pw) = password {
        cmd.arg("-p").arg(pw);
    }
    let out = cmd.arg(archive).output()?;
    if out.status.success() {
        return Ok(());
    }
    let reason = format!(
        "{}{}",
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    )
    .trim()
    .to_string();
    if looks_like_password_failure(&reason) {
        Err(Attempt::Rejected(reason))
    } else {
        Err(corrupt(archive, reason))
    }
}

// Wrong passwords surface as checksum or decryption failures as often as
// explicit password errors.
fn looks_like_password_failure(reason: &str) -> bool {
    let lower = reason.to_ascii_lowercase();
    ["password", "encrypt", "checksum", "crc", "decrypt"]
        .iter()
        .any(|needle| lower.contains(needle))
}
