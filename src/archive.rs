use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use camino::Utf8PathBuf;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use zip::ZipArchive;

use crate::error::AggregatorError;

#[async_trait]
pub trait ArchiveClient: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AggregatorError>;
}

#[derive(Clone)]
pub struct HttpArchiveClient {
    client: Client,
}

impl HttpArchiveClient {
    pub fn new() -> Result<Self, AggregatorError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("faostat-aggregator/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| AggregatorError::ArchiveHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| AggregatorError::ArchiveHttp(err.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ArchiveClient for HttpArchiveClient {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AggregatorError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| AggregatorError::ArchiveHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "archive request failed".to_string());
            return Err(AggregatorError::ArchiveStatus { status, message });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|err| AggregatorError::ArchiveHttp(err.to_string()))?;
        Ok(bytes.to_vec())
    }
}

pub fn store_archive(bytes: &[u8], destination: &Path) -> Result<(), AggregatorError> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|err| AggregatorError::Filesystem(err.to_string()))?;
    }
    fs::write(destination, bytes).map_err(|err| AggregatorError::Filesystem(err.to_string()))
}

/// Extracts only the entries whose path satisfies `predicate`, returning the
/// materialized paths relative to `target_dir`.
pub fn extract_zip_filtered(
    zip_path: &Path,
    target_dir: &Path,
    predicate: impl Fn(&str) -> bool,
) -> Result<Vec<Utf8PathBuf>, AggregatorError> {
    let file = fs::File::open(zip_path).map_err(|err| {
        AggregatorError::Extract(format!("open zip {}: {err}", zip_path.display()))
    })?;
    let mut archive =
        ZipArchive::new(file).map_err(|err| AggregatorError::Extract(err.to_string()))?;

    let mut materialized = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| AggregatorError::Extract(err.to_string()))?;
        if entry.is_dir() {
            continue;
        }
        let Some(relative) = entry.enclosed_name() else {
            return Err(AggregatorError::Extract(
                "zip entry path traversal detected".to_string(),
            ));
        };
        let relative = Utf8PathBuf::from_path_buf(relative)
            .map_err(|_| AggregatorError::Extract("non-utf8 zip entry name".to_string()))?;
        if !predicate(relative.as_str()) {
            continue;
        }

        let entry_path = target_dir.join(relative.as_std_path());
        if let Some(parent) = entry_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| AggregatorError::Filesystem(err.to_string()))?;
        }
        let mut outfile = fs::File::create(&entry_path)
            .map_err(|err| AggregatorError::Filesystem(err.to_string()))?;
        io::copy(&mut entry, &mut outfile)
            .map_err(|err| AggregatorError::Extract(err.to_string()))?;
        materialized.push(relative);
    }
    Ok(materialized)
}
