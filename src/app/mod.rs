//! The controller: single owner of the client state.
//!
//! Network calls and timers run as separate tokio tasks that only post
//! [`AppEvent`]s back over a channel. The controller consumes user actions and
//! events one at a time, so every handler runs to completion against state
//! nobody else can touch.

pub mod commands;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::config::AppConfig;
use crate::engine::{
    group_offers, Debouncer, FilterState, OfferGroup, PollTimer, QueryDescriptor, ScanEffect,
    ScanMachine, ScanState,
};
use crate::gateway::StockApi;
use crate::models::{AggregateStats, ProductHistory, ProductId, ScanAccepted, ScanStatus, Site};
use crate::ui::{Notification, Theme, ThemeStore, View};
use crate::utils::error::Result;

pub const HISTORY_ERROR_MESSAGE: &str = "Failed to load price history";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criterion {
    Site,
    Set,
    Stock,
    Sort,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    SetCriterion(Criterion, String),
    /// A keystroke in the search box; debounced.
    SearchInput(String),
    ClearFilters,
    TriggerScan,
    ShowHistory(ProductId),
    ToggleTheme,
    Refresh,
    Quit,
}

#[derive(Debug, Clone)]
pub struct AppSettings {
    pub poll_interval: Duration,
    pub max_poll_duration: Option<Duration>,
    pub debounce: Duration,
    pub grouped: bool,
    /// Leave the event loop once a triggered scan has settled and every
    /// outstanding load has landed.
    pub exit_after_scan: bool,
}

impl AppSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            max_poll_duration: config.max_poll_duration(),
            debounce: config.debounce(),
            grouped: config.ui.grouped,
            exit_after_scan: false,
        }
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Everything currently displayed. Collections are replaced wholesale.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub filter: FilterState,
    pub groups: Vec<OfferGroup>,
    pub stats: Option<AggregateStats>,
    pub sites: Vec<Site>,
    pub sets: Vec<String>,
    pub history: Option<ProductHistory>,
    pub theme: Theme,
    pub scan_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum LoadKind {
    Offers,
    Stats,
    Sites,
    Sets,
    History,
}

enum AppEvent {
    Offers { seq: u64, result: Result<Vec<OfferGroup>> },
    Stats { seq: u64, result: Result<AggregateStats> },
    Sites { seq: u64, result: Result<Vec<Site>> },
    Sets { seq: u64, result: Result<Vec<String>> },
    History { seq: u64, result: Result<ProductHistory> },
    InitialStatus(Result<ScanStatus>),
    TriggerFinished(Result<ScanAccepted>),
    PollTick { generation: u64, result: Result<ScanStatus> },
    SearchSettled,
}

/// Sequence numbers per kind of load. Only the latest issued load of a kind
/// may be applied; older ones finishing late are dropped.
#[derive(Default)]
struct LoadTracker {
    issued: HashMap<LoadKind, u64>,
    in_flight: usize,
}

impl LoadTracker {
    fn issue(&mut self, kind: LoadKind) -> u64 {
        let seq = self.issued.entry(kind).or_default();
        *seq += 1;
        self.in_flight += 1;
        *seq
    }

    fn settle(&mut self, kind: LoadKind, seq: u64) -> bool {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.issued.get(&kind) == Some(&seq)
    }
}

pub struct App<V: View> {
    api: Arc<dyn StockApi>,
    view: V,
    settings: AppSettings,
    state: AppState,
    scan: ScanMachine,
    poll_timer: PollTimer,
    poll_generation: u64,
    debouncer: Debouncer,
    theme_store: Option<ThemeStore>,
    loads: LoadTracker,
    events_tx: mpsc::UnboundedSender<AppEvent>,
    events_rx: mpsc::UnboundedReceiver<AppEvent>,
    scan_attempted: bool,
    torn_down: bool,
}

impl<V: View> App<V> {
    pub fn new(api: Arc<dyn StockApi>, view: V, settings: AppSettings) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            api,
            view,
            scan: ScanMachine::new(settings.max_poll_duration),
            debouncer: Debouncer::new(settings.debounce),
            settings,
            state: AppState::default(),
            poll_timer: PollTimer::new(),
            poll_generation: 0,
            theme_store: None,
            loads: LoadTracker::default(),
            events_tx,
            events_rx,
            scan_attempted: false,
            torn_down: false,
        }
    }

    /// Reads the persisted theme once; toggles are written back.
    pub fn with_theme_store(mut self, store: ThemeStore) -> Self {
        self.state.theme = store.load();
        self.theme_store = Some(store);
        self
    }

    pub fn with_filter(mut self, filter: FilterState) -> Self {
        self.state.filter = filter;
        self
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn scan_state(&self) -> ScanState {
        self.scan.state()
    }

    /// Runs until `Quit`, until the action channel closes, or (with
    /// `exit_after_scan`) until the triggered scan has settled. Returns the
    /// final state and the view.
    pub async fn run(mut self, mut actions: mpsc::Receiver<UserAction>) -> (AppState, V) {
        self.start();
        loop {
            tokio::select! {
                action = actions.recv() => match action {
                    Some(UserAction::Quit) | None => break,
                    Some(action) => self.handle_action(action),
                },
                Some(event) = self.events_rx.recv() => self.handle_event(event),
            }
            if self.finished() {
                break;
            }
        }
        self.teardown();
        (self.state, self.view)
    }

    fn start(&mut self) {
        tracing::info!("Client starting");
        self.view.apply_theme(self.state.theme);
        self.set_scan_enabled(true);

        self.load_sites();
        self.load_sets();
        self.load_stats();
        self.load_offers();
        self.spawn_call(
            |api| async move { api.get_scan_status().await },
            AppEvent::InitialStatus,
        );
    }

    fn finished(&self) -> bool {
        self.settings.exit_after_scan
            && self.scan_attempted
            && self.scan.can_trigger()
            && self.loads.in_flight == 0
    }

    fn handle_action(&mut self, action: UserAction) {
        tracing::debug!("User action: {:?}", action);
        match action {
            UserAction::SetCriterion(criterion, value) => {
                let filter = &mut self.state.filter;
                let slot = match criterion {
                    Criterion::Site => &mut filter.site,
                    Criterion::Set => &mut filter.set,
                    Criterion::Stock => &mut filter.stock,
                    Criterion::Sort => &mut filter.sort,
                };
                *slot = value;
                self.debouncer.cancel();
                self.load_offers();
            }
            UserAction::SearchInput(text) => {
                self.state.filter.search = text;
                let tx = self.events_tx.clone();
                self.debouncer.schedule(async move {
                    let _ = tx.send(AppEvent::SearchSettled);
                });
            }
            UserAction::ClearFilters => {
                self.state.filter = FilterState::default();
                self.debouncer.cancel();
                self.load_offers();
            }
            UserAction::TriggerScan => {
                // A request dropped because a scan is already in progress
                // still waits for that scan when exiting after a scan.
                self.scan_attempted = true;
                let effects = self.scan.request_trigger();
                self.apply_effects(effects);
            }
            UserAction::ShowHistory(product_id) => {
                let seq = self.loads.issue(LoadKind::History);
                self.spawn_call(
                    move |api| async move { api.get_history(product_id).await },
                    move |result| AppEvent::History { seq, result },
                );
            }
            UserAction::ToggleTheme => self.toggle_theme(),
            UserAction::Refresh => {
                self.load_offers();
                self.load_stats();
            }
            UserAction::Quit => {}
        }
    }

    fn handle_event(&mut self, event: AppEvent) {
        if self.torn_down {
            return;
        }
        let now = Instant::now();
        match event {
            AppEvent::Offers { seq, result } => {
                if let Some(groups) = self.accept(LoadKind::Offers, seq, result) {
                    self.state.groups = groups;
                    self.view.render_groups(&self.state.groups);
                }
            }
            AppEvent::Stats { seq, result } => {
                if let Some(stats) = self.accept(LoadKind::Stats, seq, result) {
                    self.view.render_stats(&stats);
                    self.state.stats = Some(stats);
                }
            }
            AppEvent::Sites { seq, result } => {
                if let Some(sites) = self.accept(LoadKind::Sites, seq, result) {
                    self.state.sites = sites;
                    self.view.render_sites(&self.state.sites);
                }
            }
            AppEvent::Sets { seq, result } => {
                if let Some(sets) = self.accept(LoadKind::Sets, seq, result) {
                    self.state.sets = sets;
                    self.view.render_sets(&self.state.sets);
                }
            }
            AppEvent::History { seq, result } => {
                if !self.loads.settle(LoadKind::History, seq) {
                    return;
                }
                match result {
                    Ok(history) => {
                        self.view.render_history(&history);
                        self.state.history = Some(history);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load price history: {}", e);
                        let message = e.user_message(HISTORY_ERROR_MESSAGE);
                        self.view.notify(&Notification::error(message));
                    }
                }
            }
            AppEvent::InitialStatus(result) => {
                let effects = self.scan.on_initial_status(result, now);
                self.apply_effects(effects);
            }
            AppEvent::TriggerFinished(result) => {
                let effects = self.scan.on_trigger_result(result, now);
                self.apply_effects(effects);
            }
            AppEvent::PollTick { generation, result } => {
                if generation != self.poll_generation {
                    return;
                }
                let effects = self.scan.on_poll_result(result, now);
                self.apply_effects(effects);
            }
            AppEvent::SearchSettled => self.load_offers(),
        }
    }

    /// Unwraps a load result if it is the latest of its kind. Failures are
    /// logged and leave the previous view in place.
    fn accept<T>(&mut self, kind: LoadKind, seq: u64, result: Result<T>) -> Option<T> {
        if !self.loads.settle(kind, seq) {
            tracing::debug!("Discarding stale {:?} result #{}", kind, seq);
            return None;
        }
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Failed to load {:?}, keeping previous view: {}", kind, e);
                None
            }
        }
    }

    fn apply_effects(&mut self, effects: Vec<ScanEffect>) {
        for effect in effects {
            match effect {
                ScanEffect::IssueTrigger => self.spawn_call(
                    |api| async move { api.trigger_scan().await },
                    AppEvent::TriggerFinished,
                ),
                ScanEffect::StartPolling => self.start_polling(),
                ScanEffect::StopPolling => self.poll_timer.stop(),
                ScanEffect::SetTriggerEnabled(enabled) => self.set_scan_enabled(enabled),
                ScanEffect::Notify(notice) => self.view.notify(&Notification::from(&notice)),
                ScanEffect::RefreshDependents => {
                    self.load_offers();
                    self.load_stats();
                    self.load_sets();
                    self.scan.settle();
                }
            }
        }
    }

    fn start_polling(&mut self) {
        self.poll_generation += 1;
        let generation = self.poll_generation;
        let api = Arc::clone(&self.api);
        let tx = self.events_tx.clone();
        self.poll_timer.start(self.settings.poll_interval, move || {
            let api = Arc::clone(&api);
            let tx = tx.clone();
            async move {
                let result = api.get_scan_status().await;
                tx.send(AppEvent::PollTick { generation, result }).is_ok()
            }
        });
    }

    fn load_offers(&mut self) {
        let seq = self.loads.issue(LoadKind::Offers);
        let query = QueryDescriptor::from_filter(&self.state.filter);
        let grouped = self.settings.grouped;
        self.spawn_call(
            move |api| async move {
                if grouped {
                    api.list_offer_groups(&query).await
                } else {
                    api.list_offers(&query).await.map(group_offers)
                }
            },
            move |result| AppEvent::Offers { seq, result },
        );
    }

    fn load_stats(&mut self) {
        let seq = self.loads.issue(LoadKind::Stats);
        self.spawn_call(
            |api| async move { api.get_stats().await },
            move |result| AppEvent::Stats { seq, result },
        );
    }

    fn load_sites(&mut self) {
        let seq = self.loads.issue(LoadKind::Sites);
        self.spawn_call(
            |api| async move { api.list_sites().await },
            move |result| AppEvent::Sites { seq, result },
        );
    }

    fn load_sets(&mut self) {
        let seq = self.loads.issue(LoadKind::Sets);
        self.spawn_call(
            |api| async move { api.list_sets().await },
            move |result| AppEvent::Sets { seq, result },
        );
    }

    fn spawn_call<T, F, Fut, W>(&self, call: F, wrap: W)
    where
        T: Send + 'static,
        F: FnOnce(Arc<dyn StockApi>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        W: FnOnce(Result<T>) -> AppEvent + Send + 'static,
    {
        let api = Arc::clone(&self.api);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = call(api).await;
            // After teardown the receiver is gone and late results are dropped.
            let _ = tx.send(wrap(result));
        });
    }

    fn set_scan_enabled(&mut self, enabled: bool) {
        self.state.scan_enabled = enabled;
        self.view.set_scan_enabled(enabled);
    }

    fn toggle_theme(&mut self) {
        let theme = self.state.theme.toggled();
        self.state.theme = theme;
        if let Some(store) = &self.theme_store {
            if let Err(e) = store.save(theme) {
                tracing::warn!("Could not persist theme preference: {}", e);
            }
        }
        self.view.apply_theme(theme);
    }

    fn teardown(&mut self) {
        self.torn_down = true;
        self.apply_teardown_effects();
        self.poll_timer.stop();
        self.debouncer.cancel();
        self.events_rx.close();
        tracing::info!("Client stopped");
    }

    fn apply_teardown_effects(&mut self) {
        for effect in self.scan.teardown() {
            if effect == ScanEffect::StopPolling {
                self.poll_timer.stop();
            }
        }
    }
}
