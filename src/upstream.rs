use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::domain::Catalog;
use crate::error::AggregatorError;

pub const DEFAULT_CATALOG_URL: &str = "https://bulks-faostat.fao.org/production/datasets_E.json";

#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn fetch_catalog(&self) -> Result<Catalog, AggregatorError>;
}

#[derive(Clone)]
pub struct FaoCatalogClient {
    client: Client,
    url: String,
}

impl FaoCatalogClient {
    pub fn new(url: impl Into<String>) -> Result<Self, AggregatorError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("faostat-aggregator/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| AggregatorError::CatalogHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| AggregatorError::CatalogHttp(err.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl CatalogClient for FaoCatalogClient {
    async fn fetch_catalog(&self) -> Result<Catalog, AggregatorError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|err| AggregatorError::CatalogHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "catalog request failed".to_string());
            return Err(AggregatorError::CatalogStatus { status, message });
        }
        response
            .json::<Catalog>()
            .await
            .map_err(|err| AggregatorError::CatalogInvalid(err.to_string()))
    }
}
