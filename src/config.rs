use std::path::PathBuf;
use std::time::Duration;

// Catalog service (bangumi-compatible v0 API)
pub const DEFAULT_CATALOG_URL: &str = "https://api.bgm.tv";
pub const USER_AGENT: &str = concat!("lnsort/", env!("CARGO_PKG_VERSION"), " (light-novel-manager)");
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;
// difflib-style cutoff; candidates below it are never picked.
pub const DEFAULT_SIMILARITY_CUTOFF: f64 = 0.5;
pub const MAX_CANDIDATES: usize = 3;

// Tried in order for every archive. `None` means "no password".
pub const BUILTIN_PASSWORDS: &[Option<&str>] = &[None, Some("tsdm"), Some("sbyr"), Some("light931")];
pub const DEFAULT_MAX_DEPTH: usize = 8;

pub const WARNING_LOG: &str = "warning.log";
pub const ERROR_LOG: &str = "error.log";
pub const FAILURE_LEDGER: &str = "lnsort_failures.jsonl";

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
    /// Extra attempts for transport failures. "No match" is never retried.
    pub retries: usize,
    pub similarity_cutoff: f64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_CATALOG_URL.to_string(),
            user_agent: USER_AGENT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retries: 0,
            similarity_cutoff: DEFAULT_SIMILARITY_CUTOFF,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    pub passwords: Vec<Option<String>>,
    pub max_depth: usize,
    pub keep_extracted: bool,
}

impl ArchiveConfig {
    /// Built-in list followed by `extra`, without duplicates.
    pub fn with_extra_passwords<I>(extra: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut cfg = Self::default();
        for pw in extra {
            let pw = Some(pw);
            if !cfg.passwords.contains(&pw) {
                cfg.passwords.push(pw);
            }
        }
        cfg
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            passwords: BUILTIN_PASSWORDS
                .iter()
                .map(|p| p.map(str::to_string))
                .collect(),
            max_depth: DEFAULT_MAX_DEPTH,
            keep_extracted: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub output_root: PathBuf,
    pub scratch_root: PathBuf,
    pub catalog: CatalogConfig,
    pub archive: ArchiveConfig,
}

impl Config {
    pub fn new(output_root: impl Into<PathBuf>, scratch_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            scratch_root: scratch_root.into(),
            catalog: CatalogConfig::default(),
            archive: ArchiveConfig::default(),
        }
    }

    pub fn failure_ledger(&self) -> PathBuf {
        self.output_root.join(FAILURE_LEDGER)
    }
}
