//! Object-storage upload of staged exports
//!
//! Talks plain HTTP to an S3-compatible endpoint: `PUT` to write an object,
//! `HEAD` to verify it landed. Uploads are strictly post-staging; a unit
//! whose file sits in the local layout is complete even when its upload
//! fails.

use crate::config::StorageConfig;
use crate::error::{Error, Result};
use crate::types::WorkUnit;
use reqwest::header::CONTENT_TYPE;
use std::path::Path;
use tracing::{debug, info};

/// Content type for `.xlsx` spreadsheets
pub const SPREADSHEET_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Uploads staged exports to an S3-compatible HTTP endpoint
pub struct StorageUploader {
    client: reqwest::Client,
    endpoint: String,
    bucket: String,
    prefix: String,
    auth_token: Option<String>,
}

impl StorageUploader {
    /// Build an uploader; fails only when the HTTP client cannot be built
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            bucket: config.bucket.clone(),
            prefix: config.prefix.trim_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
        })
    }

    /// Object key for a unit's export: `prefix/year/region/subregion.xlsx`
    pub fn key_for(&self, unit: &WorkUnit) -> String {
        let tail = format!("{}/{}/{}.xlsx", unit.year, unit.region, unit.subregion);
        if self.prefix.is_empty() {
            tail
        } else {
            format!("{}/{}", self.prefix, tail)
        }
    }

    /// Store the file at `local` under `key`
    pub async fn put(&self, local: &Path, key: &str) -> Result<()> {
        let body = tokio::fs::read(local).await?;
        let bytes = body.len();

        let mut request = self
            .client
            .put(self.object_url(key))
            .header(CONTENT_TYPE, SPREADSHEET_CONTENT_TYPE)
            .body(body);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Upload {
                key: key.to_string(),
                status: status.as_u16(),
            });
        }
        info!(key, bytes, "export uploaded");
        Ok(())
    }

    /// Probe whether `key` exists in the bucket
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let mut request = self.client.head(self.object_url(key));
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        debug!(key, status, "existence probe");
        match status {
            200 => Ok(true),
            404 => Ok(false),
            status => Err(Error::Upload {
                key: key.to_string(),
                status,
            }),
        }
    }

    /// Full object URL with every key segment percent-encoded
    ///
    /// Region labels carry spaces and parentheses; encoding per segment keeps
    /// the `/` separators meaningful.
    fn object_url(&self, key: &str) -> String {
        let encoded: Vec<String> = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/{}/{}", self.endpoint, self.bucket, encoded.join("/"))
    }
}
