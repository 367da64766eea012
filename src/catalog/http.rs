use super::types::{RelatedPerson, SearchRequest, SearchResponse, Subject, SubjectSummary};
use super::CatalogApi;
use crate::config::CatalogConfig;
use crate::error::CatalogError;
use log::debug;
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

/// Blocking client for the catalog's v0 JSON API.
pub struct HttpCatalog {
    client: Client,
    base_url: String,
}

impl HttpCatalog {
    pub fn new(cfg: &CatalogConfig) -> reqwest::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(cfg.timeout)
            .user_agent(cfg.user_agent.clone())
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl CatalogApi for HttpCatalog {
    fn search_subjects(&self, keyword: &str) -> Result<Vec<SubjectSummary>, CatalogError> {
        let url = self.url("/v0/search/subjects");
        debug!("POST {url} keyword={keyword:?}");
        let resp = self
            .client
            .post(&url)
            .json(&SearchRequest::novels(keyword))
            .send()
            .map_err(|e| transport(&url, e))?;
        let found: SearchResponse = decode(&url, resp, keyword)?;
        Ok(found.data)
    }

    fn subject(&self, id: u64) -> Result<Subject, CatalogError> {
        let url = self.url(&format!("/v0/subjects/{id}"));
        debug!("GET {url}");
        let resp = self.client.get(&url).send().map_err(|e| transport(&url, e))?;
        decode(&url, resp, &id.to_string())
    }

    fn subject_persons(&self, id: u64) -> Result<Vec<RelatedPerson>, CatalogError> {
        let url = self.url(&format!("/v0/subjects/{id}/persons"));
        debug!("GET {url}");
        let resp = self.client.get(&url).send().map_err(|e| transport(&url, e))?;
        decode(&url, resp, &id.to_string())
    }
}

fn transport(url: &str, err: reqwest::Error) -> CatalogError {
    CatalogError::Transport {
        url: url.to_string(),
        reason: err.to_string(),
    }
}

// 404 is the catalog's "no such subject"; every other failure status is a service error.
fn decode<T: DeserializeOwned>(
    url: &str,
    resp: Response,
    lookup: &str,
) -> Result<T, CatalogError> {
    let status = resp.status();
    if status == StatusCode::NOT_FOUND {
        return Err(CatalogError::not_found(lookup));
    }
    if !status.is_success() {
        return Err(CatalogError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    let body = resp.text().map_err(|e| transport(url, e))?;
    parse_body(url, &body)
}

pub(crate) fn parse_body<T: DeserializeOwned>(url: &str, body: &str) -> Result<T, CatalogError> {
    let de = &mut serde_json::Deserializer::from_str(body);
    serde_path_to_error::deserialize(de).map_err(|e| CatalogError::Malformed {
        url: url.to_string(),
        path: e.path().to_string(),
        reason: e.inner().to_string(),
    })
}
