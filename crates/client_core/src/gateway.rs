use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::{CollectionPage, Entity, EntityId, FilterSet},
    error::CatalogError,
    protocol::{CharactersResponse, RemoteErrorBody},
};
use tracing::debug;

#[async_trait]
pub trait CatalogGateway: Send + Sync {
    async fn fetch_collection(
        &self,
        page: u32,
        filters: &FilterSet,
    ) -> Result<CollectionPage, CatalogError>;
    async fn fetch_entity(&self, id: EntityId) -> Result<Entity, CatalogError>;
}

pub struct HttpCatalogGateway {
    http: Client,
    base_url: String,
}

impl HttpCatalogGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Query pairs for a collection request. Absent filters are omitted entirely.
pub fn collection_query(page: u32, filters: &FilterSet) -> Vec<(&'static str, String)> {
    let mut query = vec![("page", page.to_string())];
    query.extend(
        filters
            .active()
            .map(|(key, value)| (key.as_str(), value.to_string())),
    );
    query
}

#[async_trait]
impl CatalogGateway for HttpCatalogGateway {
    async fn fetch_collection(
        &self,
        page: u32,
        filters: &FilterSet,
    ) -> Result<CollectionPage, CatalogError> {
        debug!(page, "gateway: fetching collection");
        let response = self
            .http
            .get(format!("{}/character", self.base_url))
            .query(&collection_query(page, filters))
            .send()
            .await
            .map_err(map_send_error)?;
        let body: CharactersResponse = decode(response, "characters").await?;
        Ok(body.into())
    }

    async fn fetch_entity(&self, id: EntityId) -> Result<Entity, CatalogError> {
        debug!(entity_id = id.0, "gateway: fetching entity");
        let response = self
            .http
            .get(format!("{}/character/{}", self.base_url, id.0))
            .send()
            .await
            .map_err(map_send_error)?;
        decode(response, "character").await
    }
}

async fn decode<T: DeserializeOwned>(response: Response, what: &str) -> Result<T, CatalogError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        let detail = remote_error_detail(response).await;
        return Err(CatalogError::not_found(
            detail.unwrap_or_else(|| format!("no matching {what}")),
        ));
    }
    if !status.is_success() {
        let detail = remote_error_detail(response).await;
        let reason = status.canonical_reason().unwrap_or("unexpected status");
        let message = match detail {
            Some(detail) => format!("failed to fetch {what}: {reason}: {detail}"),
            None => format!("failed to fetch {what}: {reason}"),
        };
        return Err(CatalogError::transport(Some(status.as_u16()), message));
    }
    response.json::<T>().await.map_err(|e| {
        CatalogError::transport(
            Some(status.as_u16()),
            format!("invalid {what} payload from server: {e}"),
        )
    })
}

async fn remote_error_detail(response: Response) -> Option<String> {
    let raw = response.text().await.ok()?;
    serde_json::from_str::<RemoteErrorBody>(&raw)
        .ok()
        .map(|body| body.error)
}

fn map_send_error(err: reqwest::Error) -> CatalogError {
    CatalogError::transport(err.status().map(|s| s.as_u16()), err.to_string())
}

#[cfg(test)]
#[path = "tests/gateway_tests.rs"]
mod tests;
