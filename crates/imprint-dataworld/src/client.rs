//! data.world HTTP API.
//!
//! [`DatasetApi`] is the seam the engine publishes through; [`DataWorldClient`]
//! implements it over `reqwest`. Both calls are create-or-replace, so a
//! re-delivered publish overwrites what an earlier attempt uploaded. Dataset
//! ids are keyed by the full logical path of the published entry.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{StatusCode, Url};
use serde::Serialize;
use sha2::{Digest, Sha256};

use imprint_core::{Error, Redacted, Result, path};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const PATH_DIGEST_LEN: usize = 10;

/// Dataset visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Visibility {
    /// Publicly discoverable.
    #[default]
    Open,
    /// Visible to the owner only.
    Private,
}

/// A dataset to create or replace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    /// Account that owns the dataset.
    pub owner: String,
    /// URL-safe dataset id.
    pub id: String,
    /// Human readable title.
    pub title: String,
    /// Visibility of the dataset.
    pub visibility: Visibility,
}

impl Dataset {
    /// An open dataset owned by `owner` for the catalog entry at
    /// `logical_path`.
    ///
    /// The title is the last path component. The id is the slugged title
    /// followed by a digest of the full path, so entries that share a name in
    /// different collections map to different datasets while a re-delivered
    /// publish of the same path maps to the same one.
    ///
    /// ```rust
    /// use imprint_dataworld::client::Dataset;
    ///
    /// let a = Dataset::for_path("alice", "/tempZone/home/alice/a/report.csv");
    /// let b = Dataset::for_path("alice", "/tempZone/home/alice/b/report.csv");
    /// assert_eq!(a.title, "report.csv");
    /// assert!(a.id.starts_with("report-csv-"));
    /// assert_ne!(a.id, b.id);
    /// ```
    #[must_use]
    pub fn for_path(owner: impl Into<String>, logical_path: &str) -> Self {
        let title = path::object_name(logical_path).to_string();
        Self {
            owner: owner.into(),
            id: format!("{}-{}", slug(&title), path_digest(logical_path)),
            title,
            visibility: Visibility::Open,
        }
    }
}

/// Leading hex characters of the SHA256 of the normalized logical path.
fn path_digest(logical_path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path::normalize(logical_path).as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(PATH_DIGEST_LEN);
    digest
}

#[derive(Debug, Serialize)]
struct DatasetRequest<'a> {
    title: &'a str,
    visibility: Visibility,
}

/// Derives a dataset id: lowercase ASCII alphanumerics separated by single
/// dashes.
///
/// ```rust
/// use imprint_dataworld::client::slug;
///
/// assert_eq!(slug("Survey Results_2024.csv"), "survey-results-2024-csv");
/// ```
#[must_use]
pub fn slug(title: &str) -> String {
    let mut id = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            id.push(c.to_ascii_lowercase());
        } else if !id.is_empty() && !id.ends_with('-') {
            id.push('-');
        }
    }
    while id.ends_with('-') {
        id.pop();
    }
    if id.is_empty() {
        id.push_str("dataset");
    }
    id
}

/// Remote dataset operations.
#[async_trait]
pub trait DatasetApi: Send + Sync {
    /// Creates `dataset`, replacing an existing one with the same id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Publisher`] if the request fails.
    async fn create_dataset(&self, token: &Redacted<String>, dataset: &Dataset) -> Result<()>;

    /// Uploads `body` as `file_name` into `dataset`, overwriting any file of
    /// that name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Publisher`] if the request fails.
    async fn upload_file(
        &self,
        token: &Redacted<String>,
        dataset: &Dataset,
        file_name: &str,
        body: Bytes,
    ) -> Result<()>;
}

/// `reqwest` client for the data.world API.
#[derive(Debug, Clone)]
pub struct DataWorldClient {
    base_url: String,
    client: reqwest::Client,
}

impl DataWorldClient {
    /// Creates a client targeting `base_url` (e.g. `https://api.data.world/v0`).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    fn url<'s>(&self, segments: impl IntoIterator<Item = &'s str>) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            Error::configuration(format!("invalid data.world host [{}]: {e}", self.base_url))
        })?;
        url.path_segments_mut()
            .map_err(|()| {
                Error::configuration(format!("data.world host [{}] cannot be a base", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn check(response: reqwest::Response, action: &str) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.bytes().await.unwrap_or_default();
        let message = serde_json::from_slice::<serde_json::Value>(&body)
            .ok()
            .and_then(|value| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| String::from_utf8_lossy(&body).to_string());

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Error::publisher(format!("{action} was not authorized ({status}): {message}"))
            }
            _ => Error::publisher(format!("{action} failed ({status}): {message}")),
        })
    }
}

#[async_trait]
impl DatasetApi for DataWorldClient {
    async fn create_dataset(&self, token: &Redacted<String>, dataset: &Dataset) -> Result<()> {
        let url = self.url(["datasets", dataset.owner.as_str(), dataset.id.as_str()])?;
        let response = self
            .client
            .put(url)
            .bearer_auth(token.expose())
            .json(&DatasetRequest {
                title: &dataset.title,
                visibility: dataset.visibility,
            })
            .send()
            .await
            .map_err(|e| Error::publisher_with_source("dataset request failed", e))?;

        Self::check(response, "dataset creation").await
    }

    async fn upload_file(
        &self,
        token: &Redacted<String>,
        dataset: &Dataset,
        file_name: &str,
        body: Bytes,
    ) -> Result<()> {
        let url = self.url([
            "uploads",
            dataset.owner.as_str(),
            dataset.id.as_str(),
            "files",
            file_name,
        ])?;
        let response = self
            .client
            .put(url)
            .bearer_auth(token.expose())
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .await
            .map_err(|e| Error::publisher_with_source("upload request failed", e))?;

        Self::check(response, "file upload").await
    }
}
