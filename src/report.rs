use log::warn;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Append-only JSONL of per-item failures: `{path, context, error, ts}`.
pub struct FailureLedger {
    file: Option<File>,
}

impl FailureLedger {
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file: Some(file) })
    }

    /// Ledger that records nothing.
    pub fn disabled() -> Self {
        Self { file: None }
    }

    pub fn record(&mut self, path: &Path, context: &str, error: &dyn std::fmt::Display) {
        let Some(file) = self.file.as_mut() else {
            return;
        };
        let rec = serde_json::json!({
            "path": path.display().to_string(),
            "context": context,
            "error": error.to_string(),
            "ts": chrono::Utc::now().to_rfc3339(),
        });
        if let Err(e) = writeln!(file, "{rec}").and_then(|()| file.flush()) {
            warn!("cannot write failure ledger: {e}");
        }
    }
}
