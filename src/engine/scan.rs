//! Lifecycle of a user-triggered scan.
//!
//! [`ScanMachine`] holds no timers and performs no I/O. Each input returns the
//! [`ScanEffect`]s the owner must carry out (issue the trigger call, start or
//! stop the poll timer, notify, refresh), which keeps every transition
//! testable without a runtime.

use std::time::Duration;

use tokio::time::Instant;

use crate::models::{ScanAccepted, ScanStatus};
use crate::utils::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Triggering,
    Polling,
    /// Completion observed; collapses to `Idle` once the dependent refresh
    /// has been issued.
    Cooldown,
    /// Polling exceeded the configured maximum duration.
    TimedOut,
}

/// What happens to a failed status poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollFailurePolicy {
    /// Keep polling; the next tick asks again. The server stays the source of
    /// truth, so a dropped poll loses nothing.
    #[default]
    IgnoreAndRetry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanNotice {
    Started,
    Finished,
    TriggerFailed(String),
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEffect {
    IssueTrigger,
    StartPolling,
    StopPolling,
    SetTriggerEnabled(bool),
    Notify(ScanNotice),
    /// Reload offers, stats and the sets facet, exactly once per completion.
    RefreshDependents,
}

pub const TRIGGER_FAILED_MESSAGE: &str = "Scan request failed";
pub const CONNECTION_ERROR_MESSAGE: &str = "Connection error";

pub struct ScanMachine {
    state: ScanState,
    poll_started: Option<Instant>,
    max_poll_duration: Option<Duration>,
    failure_policy: PollFailurePolicy,
    ignored_poll_failures: u64,
    completed_scans: u64,
}

impl ScanMachine {
    pub fn new(max_poll_duration: Option<Duration>) -> Self {
        Self {
            state: ScanState::Idle,
            poll_started: None,
            max_poll_duration,
            failure_policy: PollFailurePolicy::default(),
            ignored_poll_failures: 0,
            completed_scans: 0,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Whether the trigger affordance is enabled.
    pub fn can_trigger(&self) -> bool {
        matches!(self.state, ScanState::Idle | ScanState::TimedOut)
    }

    pub fn failure_policy(&self) -> PollFailurePolicy {
        self.failure_policy
    }

    pub fn ignored_poll_failures(&self) -> u64 {
        self.ignored_poll_failures
    }

    pub fn completed_scans(&self) -> u64 {
        self.completed_scans
    }

    /// One-off status probe at startup. A scan already running (another
    /// client, a previous session) is picked up and polled to completion.
    pub fn on_initial_status(&mut self, status: Result<ScanStatus>, now: Instant) -> Vec<ScanEffect> {
        if self.state != ScanState::Idle {
            return Vec::new();
        }
        match status {
            Ok(status) if status.running => {
                tracing::info!("Scan already running on the server, resuming polling");
                self.enter_polling(now)
            }
            Ok(_) => Vec::new(),
            Err(e) => {
                tracing::debug!("Initial scan status unavailable: {}", e);
                Vec::new()
            }
        }
    }

    pub fn request_trigger(&mut self) -> Vec<ScanEffect> {
        if !self.can_trigger() {
            tracing::debug!("Scan trigger ignored while {:?}", self.state);
            return Vec::new();
        }
        self.state = ScanState::Triggering;
        vec![ScanEffect::SetTriggerEnabled(false), ScanEffect::IssueTrigger]
    }

    pub fn on_trigger_result(&mut self, result: Result<ScanAccepted>, now: Instant) -> Vec<ScanEffect> {
        if self.state != ScanState::Triggering {
            return Vec::new();
        }
        match result {
            Ok(_) => {
                tracing::info!("Scan accepted by the server");
                let mut effects = vec![ScanEffect::Notify(ScanNotice::Started)];
                effects.extend(self.enter_polling(now));
                effects
            }
            Err(e) => {
                tracing::warn!("Scan trigger failed: {}", e);
                self.state = ScanState::Idle;
                let fallback = if e.is_transport() {
                    CONNECTION_ERROR_MESSAGE
                } else {
                    TRIGGER_FAILED_MESSAGE
                };
                vec![
                    ScanEffect::Notify(ScanNotice::TriggerFailed(e.user_message(fallback))),
                    ScanEffect::SetTriggerEnabled(true),
                ]
            }
        }
    }

    pub fn on_poll_result(&mut self, status: Result<ScanStatus>, now: Instant) -> Vec<ScanEffect> {
        if self.state != ScanState::Polling {
            return Vec::new();
        }
        match status {
            Ok(status) if !status.running => {
                self.state = ScanState::Cooldown;
                self.poll_started = None;
                self.completed_scans += 1;
                tracing::info!("Scan finished");
                vec![
                    ScanEffect::StopPolling,
                    ScanEffect::SetTriggerEnabled(true),
                    ScanEffect::Notify(ScanNotice::Finished),
                    ScanEffect::RefreshDependents,
                ]
            }
            Ok(_) => self.check_deadline(now),
            Err(e) => match self.failure_policy {
                PollFailurePolicy::IgnoreAndRetry => {
                    self.ignored_poll_failures += 1;
                    tracing::debug!("Ignoring failed scan poll, retrying next tick: {}", e);
                    self.check_deadline(now)
                }
            },
        }
    }

    /// Called once the dependent refresh has been issued.
    pub fn settle(&mut self) {
        if self.state == ScanState::Cooldown {
            self.state = ScanState::Idle;
        }
    }

    pub fn teardown(&mut self) -> Vec<ScanEffect> {
        let effects = if self.state == ScanState::Polling {
            vec![ScanEffect::StopPolling]
        } else {
            Vec::new()
        };
        self.state = ScanState::Idle;
        self.poll_started = None;
        effects
    }

    fn enter_polling(&mut self, now: Instant) -> Vec<ScanEffect> {
        self.state = ScanState::Polling;
        self.poll_started = Some(now);
        vec![ScanEffect::SetTriggerEnabled(false), ScanEffect::StartPolling]
    }

    fn check_deadline(&mut self, now: Instant) -> Vec<ScanEffect> {
        let (Some(limit), Some(started)) = (self.max_poll_duration, self.poll_started) else {
            return Vec::new();
        };
        if now.saturating_duration_since(started) < limit {
            return Vec::new();
        }
        tracing::warn!("Scan still running after {:?}, giving up on polling", limit);
        self.state = ScanState::TimedOut;
        self.poll_started = None;
        vec![
            ScanEffect::StopPolling,
            ScanEffect::SetTriggerEnabled(true),
            ScanEffect::Notify(ScanNotice::TimedOut),
        ]
    }
}
