pub mod http;

use async_trait::async_trait;

use crate::engine::{OfferGroup, QueryDescriptor};
use crate::models::{
    AggregateStats, HealthStatus, Offer, ProductHistory, ProductId, ScanAccepted, ScanStatus, Site,
};
use crate::utils::error::Result;

pub use http::HttpGateway;

/// Calls against the stock monitor backend.
///
/// Implementations hold no state between calls and never retry. Network and
/// decoding failures surface as `AppError::Transport`; explicit refusals as
/// `Rejected`, unknown products as `NotFound`, and other history failures
/// that carry a server message as `Server`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StockApi: Send + Sync {
    async fn list_offers(&self, query: &QueryDescriptor) -> Result<Vec<Offer>>;

    /// Groups come back already normalized by the aggregation engine.
    async fn list_offer_groups(&self, query: &QueryDescriptor) -> Result<Vec<OfferGroup>>;

    async fn get_stats(&self) -> Result<AggregateStats>;

    async fn list_sites(&self) -> Result<Vec<Site>>;

    async fn list_sets(&self) -> Result<Vec<String>>;

    async fn trigger_scan(&self) -> Result<ScanAccepted>;

    async fn get_scan_status(&self) -> Result<ScanStatus>;

    async fn get_history(&self, product_id: ProductId) -> Result<ProductHistory>;

    async fn health(&self) -> Result<HealthStatus>;
}
