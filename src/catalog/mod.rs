//! Catalog lookups with per-run memoization.
//!
//! [`CatalogClient`] owns both caches, so one client per run (or per test)
//! keeps lookups isolated. The transport sits behind [`CatalogApi`].

pub mod http;
pub mod types;

use crate::config::CatalogConfig;
use crate::error::CatalogError;
use crate::matcher::FuzzyMatcher;
use log::{debug, warn};
use std::collections::HashMap;
use unicode_normalization::UnicodeNormalization;

pub use http::HttpCatalog;
pub use types::{Person, Persons, RelatedPerson, Subject, SubjectRef, SubjectSummary};

/// Raw endpoints of the catalog service.
pub trait CatalogApi {
    fn search_subjects(&self, keyword: &str) -> Result<Vec<SubjectSummary>, CatalogError>;
    fn subject(&self, id: u64) -> Result<Subject, CatalogError>;
    fn subject_persons(&self, id: u64) -> Result<Vec<RelatedPerson>, CatalogError>;
}

/// Keyword -> match, `None` recording a confirmed "not found".
pub type SearchCache = HashMap<String, Option<SubjectRef>>;
/// Subject id -> bucketed persons.
pub type PersonCache = HashMap<u64, Persons>;

pub struct CatalogClient<A> {
    api: A,
    matcher: FuzzyMatcher,
    retries: usize,
    searches: SearchCache,
    persons: PersonCache,
}

impl<A: CatalogApi> CatalogClient<A> {
    pub fn new(api: A, cfg: &CatalogConfig) -> Self {
        Self {
            api,
            matcher: FuzzyMatcher::new(cfg.similarity_cutoff),
            retries: cfg.retries,
            searches: SearchCache::new(),
            persons: PersonCache::new(),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Best non-manga novel for `keyword`.
    ///
    /// Both outcomes of a completed search are memoized, so a keyword costs at
    /// most one request per run. Transport failures are not cached.
    pub fn search(&mut self, keyword: &str) -> Result<SubjectRef, CatalogError> {
        let key = normalize_keyword(keyword);
        if let Some(hit) = self.searches.get(&key) {
            debug!("search cache hit for {key:?}");
            return hit.clone().ok_or_else(|| CatalogError::not_found(&key));
        }

        // The key only folds variants together; the catalog sees the keyword as given.
        let keyword = keyword.trim();
        let api = &self.api;
        let subjects = with_retries(self.retries, || api.search_subjects(keyword))?;
        let outcome = self.pick(keyword, &subjects);
        self.searches.insert(key, outcome.clone());
        outcome.ok_or_else(|| CatalogError::not_found(keyword))
    }

    fn pick(&self, key: &str, subjects: &[SubjectSummary]) -> Option<SubjectRef> {
        // Later duplicates of a display name win, earlier positions are kept.
        let mut names: Vec<&str> = Vec::new();
        let mut ids: HashMap<&str, u64> = HashMap::new();
        for subject in subjects.iter().filter(|s| !s.is_manga()) {
            let name = subject.display_name();
            if ids.insert(name, subject.id).is_none() {
                names.push(name);
            }
        }
        let best = self.matcher.best(key, names.iter().copied())?;
        Some(SubjectRef {
            id: ids[best],
            name: best.to_string(),
        })
    }

    /// Canonical identity of `id`, or `None` when `id` already is canonical.
    pub fn check_id(&self, id: u64) -> Result<Option<SubjectRef>, CatalogError> {
        let api = &self.api;
        let subject = with_retries(self.retries, || api.subject(id))?;
        if subject.id == id {
            return Ok(None);
        }
        Ok(Some(SubjectRef {
            id: subject.id,
            name: subject.display_name().to_string(),
        }))
    }

    pub fn persons(&mut self, id: u64) -> Result<Persons, CatalogError> {
        if let Some(hit) = self.persons.get(&id) {
            debug!("person cache hit for subject {id}");
            return Ok(hit.clone());
        }
        let api = &self.api;
        let relations = with_retries(self.retries, || api.subject_persons(id))?;
        let persons = Persons::from_relations(relations);
        self.persons.insert(id, persons.clone());
        Ok(persons)
    }
}

fn with_retries<T, F>(retries: usize, mut call: F) -> Result<T, CatalogError>
where
    F: FnMut() -> Result<T, CatalogError>,
{
    let mut attempt = 0;
    loop {
        match call() {
            Err(e) if e.is_retryable() && attempt < retries => {
                attempt += 1;
                warn!("{e}; retrying ({attempt}/{retries})");
            }
            other => return other,
        }
    }
}

/// Cache key form of a keyword: NFKC, trimmed, single spaces.
pub fn normalize_keyword(keyword: &str) -> String {
    keyword
        .nfkc()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
