// Integration tests for the OP stock client
// These tests drive the controller against a scripted backend and the HTTP
// gateway against a mock server.

pub mod gateway_tests;

use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use op_stock_client::app::{App, AppSettings, AppState, UserAction};
use op_stock_client::engine::{group_offers, OfferGroup, QueryDescriptor};
use op_stock_client::gateway::StockApi;
use op_stock_client::models::{
    AggregateStats, HealthStatus, Offer, PriceHistoryPoint, ProductHistory, ProductId,
    ProductSummary, ScanAccepted, ScanStatus, Site,
};
use op_stock_client::ui::{Notification, NotificationLevel, Theme, View};
use op_stock_client::{AppError, Result};
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One scripted answer of the scan status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Running,
    Finished,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerReply {
    Accept,
    Reject(String),
    Fail,
}

#[derive(Debug, Clone, Default)]
pub struct CallCounts {
    pub offers: usize,
    pub groups: usize,
    pub stats: usize,
    pub sites: usize,
    pub sets: usize,
    pub trigger: usize,
    pub status: usize,
    pub history: usize,
    pub queries: Vec<QueryDescriptor>,
}

/// In-memory backend. Status answers are consumed in order; once the script
/// runs out every answer is `idle_step`.
pub struct FakeApi {
    counts: Mutex<CallCounts>,
    statuses: Mutex<VecDeque<Step>>,
    idle_step: Step,
    trigger: TriggerReply,
    offers: Vec<Offer>,
    offer_delays: Mutex<VecDeque<Duration>>,
    fail_offers_from: Option<usize>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            counts: Mutex::new(CallCounts::default()),
            statuses: Mutex::new(VecDeque::new()),
            idle_step: Step::Finished,
            trigger: TriggerReply::Accept,
            offers: catalogue(),
            offer_delays: Mutex::new(VecDeque::new()),
            fail_offers_from: None,
        }
    }

    pub fn with_statuses(self, steps: &[Step]) -> Self {
        *self.statuses.lock().unwrap() = steps.iter().copied().collect();
        self
    }

    pub fn with_idle_step(mut self, step: Step) -> Self {
        self.idle_step = step;
        self
    }

    pub fn with_trigger(mut self, reply: TriggerReply) -> Self {
        self.trigger = reply;
        self
    }

    pub fn with_offer_delays(self, delays: &[Duration]) -> Self {
        *self.offer_delays.lock().unwrap() = delays.iter().copied().collect();
        self
    }

    /// Offer listings fail from the `n`-th call on (0-based).
    pub fn failing_offers_from(mut self, n: usize) -> Self {
        self.fail_offers_from = Some(n);
        self
    }

    pub fn counts(&self) -> CallCounts {
        self.counts.lock().unwrap().clone()
    }

    fn matching_offers(&self, query: &QueryDescriptor) -> Vec<Offer> {
        self.offers
            .iter()
            .filter(|offer| match &query.set {
                Some(set) => offer.set_code.as_deref() == Some(set.as_str()),
                None => true,
            })
            .filter(|offer| match &query.search {
                Some(text) => offer.name.to_lowercase().contains(&text.to_lowercase()),
                None => true,
            })
            .cloned()
            .collect()
    }
}

#[async_trait]
impl StockApi for FakeApi {
    async fn list_offers(&self, query: &QueryDescriptor) -> Result<Vec<Offer>> {
        let (call, delay) = {
            let mut counts = self.counts.lock().unwrap();
            counts.offers += 1;
            counts.queries.push(query.clone());
            (counts.offers - 1, self.offer_delays.lock().unwrap().pop_front())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_offers_from.is_some_and(|n| call >= n) {
            return Err(AppError::Transport("api/products returned 500".to_string()));
        }
        Ok(self.matching_offers(query))
    }

    async fn list_offer_groups(&self, query: &QueryDescriptor) -> Result<Vec<OfferGroup>> {
        {
            let mut counts = self.counts.lock().unwrap();
            counts.groups += 1;
            counts.queries.push(query.clone());
        }
        Ok(group_offers(self.matching_offers(query)))
    }

    async fn get_stats(&self) -> Result<AggregateStats> {
        self.counts.lock().unwrap().stats += 1;
        Ok(AggregateStats {
            total_products: self.offers.len() as u64,
            ..AggregateStats::default()
        })
    }

    async fn list_sites(&self) -> Result<Vec<Site>> {
        self.counts.lock().unwrap().sites += 1;
        Ok(vec![Site {
            slug: "cardmarket".to_string(),
            name: "Cardmarket".to_string(),
        }])
    }

    async fn list_sets(&self) -> Result<Vec<String>> {
        self.counts.lock().unwrap().sets += 1;
        Ok(vec!["OP-01".to_string(), "OP-02".to_string()])
    }

    async fn trigger_scan(&self) -> Result<ScanAccepted> {
        self.counts.lock().unwrap().trigger += 1;
        match &self.trigger {
            TriggerReply::Accept => Ok(ScanAccepted {
                message: Some("Scan started".to_string()),
            }),
            TriggerReply::Reject(reason) => Err(AppError::Rejected {
                reason: reason.clone(),
            }),
            TriggerReply::Fail => Err(AppError::Transport("connection refused".to_string())),
        }
    }

    async fn get_scan_status(&self) -> Result<ScanStatus> {
        self.counts.lock().unwrap().status += 1;
        let step = self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.idle_step);
        match step {
            Step::Running => Ok(ScanStatus::running()),
            Step::Finished => Ok(ScanStatus::finished()),
            Step::Fail => Err(AppError::Transport("api/scan/status returned 502".to_string())),
        }
    }

    async fn get_history(&self, product_id: ProductId) -> Result<ProductHistory> {
        self.counts.lock().unwrap().history += 1;
        let Some(offer) = self.offers.iter().find(|o| o.id == product_id) else {
            return Err(AppError::NotFound {
                resource: format!("product {}", product_id),
                message: Some("Product not found".to_string()),
            });
        };
        Ok(ProductHistory {
            product: ProductSummary {
                name: offer.name.clone(),
                set_code: offer.set_code.clone(),
                site_name: Some(offer.site_name.clone()),
            },
            history: vec![PriceHistoryPoint {
                checked_at: None,
                price: offer.price,
                in_stock: offer.in_stock,
            }],
        })
    }

    async fn health(&self) -> Result<HealthStatus> {
        Ok(HealthStatus {
            status: "ok".to_string(),
            version: None,
        })
    }
}

pub fn offer(id: ProductId, name: &str, set: &str, site: &str, price: Option<&str>, in_stock: bool) -> Offer {
    Offer {
        id,
        name: name.to_string(),
        set_code: Some(set.to_string()),
        site_slug: site.to_lowercase(),
        site_name: site.to_string(),
        url: format!("https://{}.example/{}", site.to_lowercase(), id),
        image_url: None,
        price: price.map(|p| Decimal::from_str(p).unwrap()),
        in_stock,
        checked_at: None,
    }
}

/// Two products of OP-01 (one listed twice) and one of OP-02.
pub fn catalogue() -> Vec<Offer> {
    vec![
        offer(1, "Romance Dawn Booster", "OP-01", "Cardmarket", Some("4.50"), true),
        offer(2, "Romance Dawn Booster", "OP-01", "Ultrajeux", Some("4.20"), true),
        offer(3, "Romance Dawn Display", "OP-01", "Cardmarket", None, false),
        offer(4, "Paramount War Booster", "OP-02", "Ultrajeux", Some("5.10"), true),
    ]
}

/// Records everything the controller asks it to show.
#[derive(Default)]
pub struct RecordingView {
    pub groups: Vec<Vec<OfferGroup>>,
    pub stats: Vec<AggregateStats>,
    pub sites: Vec<Vec<Site>>,
    pub sets: Vec<Vec<String>>,
    pub histories: Vec<ProductHistory>,
    pub scan_enabled: Vec<bool>,
    pub notifications: Vec<Notification>,
    pub themes: Vec<Theme>,
}

impl RecordingView {
    pub fn messages(&self, level: NotificationLevel) -> Vec<&str> {
        self.notifications
            .iter()
            .filter(|n| n.level == level)
            .map(|n| n.message.as_str())
            .collect()
    }
}

impl View for RecordingView {
    fn render_groups(&mut self, groups: &[OfferGroup]) {
        self.groups.push(groups.to_vec());
    }

    fn render_stats(&mut self, stats: &AggregateStats) {
        self.stats.push(stats.clone());
    }

    fn render_sites(&mut self, sites: &[Site]) {
        self.sites.push(sites.to_vec());
    }

    fn render_sets(&mut self, sets: &[String]) {
        self.sets.push(sets.to_vec());
    }

    fn render_history(&mut self, history: &ProductHistory) {
        self.histories.push(history.clone());
    }

    fn set_scan_enabled(&mut self, enabled: bool) {
        self.scan_enabled.push(enabled);
    }

    fn notify(&mut self, notification: &Notification) {
        self.notifications.push(notification.clone());
    }

    fn apply_theme(&mut self, theme: Theme) {
        self.themes.push(theme);
    }
}

pub fn test_settings() -> AppSettings {
    AppSettings {
        poll_interval: Duration::from_secs(3),
        max_poll_duration: None,
        debounce: Duration::from_millis(400),
        grouped: false,
        exit_after_scan: false,
    }
}

pub fn new_app(api: &Arc<FakeApi>, settings: AppSettings) -> App<RecordingView> {
    App::new(api.clone(), RecordingView::default(), settings)
}

/// A controller running on its own task.
pub struct Session {
    tx: mpsc::Sender<UserAction>,
    handle: JoinHandle<(AppState, RecordingView)>,
}

impl Session {
    pub fn launch(app: App<RecordingView>) -> Self {
        let (tx, rx) = mpsc::channel(32);
        let handle = tokio::spawn(app.run(rx));
        Self { tx, handle }
    }

    pub async fn send(&self, action: UserAction) {
        self.tx.send(action).await.expect("controller stopped early");
    }

    pub async fn quit(self) -> (AppState, RecordingView) {
        // The controller may already have left on its own.
        let _ = self.tx.send(UserAction::Quit).await;
        self.handle.await.expect("controller panicked")
    }

    /// Waits for the controller to stop by itself.
    pub async fn finish(self) -> (AppState, RecordingView) {
        self.handle.await.expect("controller panicked")
    }
}

pub async fn advance(duration: Duration) {
    tokio::time::sleep(duration).await;
}
