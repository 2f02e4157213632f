pub mod format;
pub mod terminal;
pub mod theme;

use crate::engine::{OfferGroup, ScanNotice};
use crate::models::{AggregateStats, ProductHistory, Site};

pub use terminal::TerminalView;
pub use theme::{Theme, ThemeStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Transient message for the user (a toast in the browser client).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Error, message)
    }
}

impl From<&ScanNotice> for Notification {
    fn from(notice: &ScanNotice) -> Self {
        match notice {
            ScanNotice::Started => Notification::new(NotificationLevel::Info, "Scan started..."),
            ScanNotice::Finished => Notification::new(NotificationLevel::Success, "Scan finished!"),
            ScanNotice::TriggerFailed(message) => Notification::error(message.clone()),
            ScanNotice::TimedOut => Notification::new(
                NotificationLevel::Warning,
                "Scan is taking too long, stopped waiting for it",
            ),
        }
    }
}

/// Rendering surface driven by the controller. Every method receives the
/// full replacement data; nothing is patched incrementally.
pub trait View: Send {
    fn render_groups(&mut self, groups: &[OfferGroup]);
    fn render_stats(&mut self, stats: &AggregateStats);
    fn render_sites(&mut self, sites: &[Site]);
    fn render_sets(&mut self, sets: &[String]);
    fn render_history(&mut self, history: &ProductHistory);
    fn set_scan_enabled(&mut self, enabled: bool);
    fn notify(&mut self, notification: &Notification);
    fn apply_theme(&mut self, theme: Theme);
}
