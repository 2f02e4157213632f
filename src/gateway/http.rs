use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::ApiConfig;
use crate::engine::{normalize_groups, OfferGroup, QueryDescriptor};
use crate::gateway::StockApi;
use crate::models::{
    AggregateStats, ErrorBody, HealthStatus, Offer, OfferGroupPayload, ProductHistory, ProductId,
    ScanAccepted, ScanStatus, Site,
};
use crate::utils::error::{AppError, Result};

/// [`StockApi`] over the backend's JSON HTTP endpoints.
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: Url,
}

impl HttpGateway {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .build()?;
        Self::with_client(client, &config.base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Result<Self> {
        // Joining relative paths onto "http://host/prefix" would drop
        // "prefix" without the trailing slash.
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| AppError::Validation(format!("Invalid base URL {}: {}", base_url, e)))?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| AppError::Validation(format!("Invalid endpoint {}: {}", path, e)))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&'static str, String)],
    ) -> Result<T> {
        let url = self.endpoint(path)?;
        tracing::debug!("GET {}", url);

        let response = self.client.get(url).query(query).send().await?;
        let response = ensure_success(path, response).await?;
        Ok(response.json::<T>().await?)
    }
}

/// Turns a non-success status into a transport error carrying the server's
/// message when it sent one.
async fn ensure_success(path: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = read_error_body(response).await;
    let detail = body.and_then(|b| b.error).unwrap_or_default();
    tracing::warn!("{} returned {}: {}", path, status, detail);
    Err(AppError::Transport(format!("{} returned {} {}", path, status, detail).trim_end().to_string()))
}

async fn read_error_body(response: Response) -> Option<ErrorBody> {
    let bytes = response.bytes().await.ok()?;
    serde_json::from_slice::<ErrorBody>(&bytes).ok()
}

#[async_trait]
impl StockApi for HttpGateway {
    async fn list_offers(&self, query: &QueryDescriptor) -> Result<Vec<Offer>> {
        self.get_json("api/products", &query.to_pairs()).await
    }

    async fn list_offer_groups(&self, query: &QueryDescriptor) -> Result<Vec<OfferGroup>> {
        let payloads: Vec<OfferGroupPayload> = self
            .get_json("api/products/grouped", &query.for_groups().to_pairs())
            .await?;
        Ok(normalize_groups(payloads))
    }

    async fn get_stats(&self) -> Result<AggregateStats> {
        self.get_json("api/stats", &[]).await
    }

    async fn list_sites(&self) -> Result<Vec<Site>> {
        self.get_json("api/sites", &[]).await
    }

    async fn list_sets(&self) -> Result<Vec<String>> {
        self.get_json("api/sets", &[]).await
    }

    async fn trigger_scan(&self) -> Result<ScanAccepted> {
        let url = self.endpoint("api/scan")?;
        tracing::debug!("POST {}", url);

        let response = self.client.post(url).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if status.is_success() {
            if bytes.iter().all(u8::is_ascii_whitespace) {
                return Ok(ScanAccepted::default());
            }
            return serde_json::from_slice(&bytes)
                .map_err(|e| AppError::Transport(format!("Invalid scan response: {}", e)));
        }

        // A JSON error document means the server refused; anything else
        // (proxy pages, empty bodies) is a transport problem.
        match serde_json::from_slice::<ErrorBody>(&bytes) {
            Ok(body) => Err(AppError::Rejected {
                reason: body.error.unwrap_or_default(),
            }),
            Err(_) => Err(AppError::Transport(format!("api/scan returned {}", status))),
        }
    }

    async fn get_scan_status(&self) -> Result<ScanStatus> {
        self.get_json("api/scan/status", &[]).await
    }

    async fn get_history(&self, product_id: ProductId) -> Result<ProductHistory> {
        let path = format!("api/products/{}/history", product_id);
        let url = self.endpoint(&path)?;
        tracing::debug!("GET {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<ProductHistory>().await?);
        }

        let message = read_error_body(response).await.and_then(|b| b.error);
        tracing::warn!("{} returned {}: {}", path, status, message.as_deref().unwrap_or_default());
        match message {
            _ if status == StatusCode::NOT_FOUND => Err(AppError::NotFound {
                resource: format!("product {}", product_id),
                message,
            }),
            Some(message) if !message.trim().is_empty() => Err(AppError::Server {
                status: status.as_u16(),
                message,
            }),
            _ => Err(AppError::Transport(format!("{} returned {}", path, status))),
        }
    }

    async fn health(&self) -> Result<HealthStatus> {
        self.get_json("api/health", &[]).await
    }
}
