//! Poll engine
//!
//! Turns a fetched snapshot of pull requests into notifications and
//! watermark updates, one cycle at a time.

pub mod baseline;
pub mod orchestrator;
pub mod permissions;

pub use orchestrator::PollEngine;
pub use permissions::Permissions;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::ActivityKind;
use crate::error::PulseError;

/// Per-category notification toggles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    pub notify_comments: bool,
    pub notify_reviews: bool,
}

impl NotificationPreferences {
    pub fn all() -> Self {
        Self {
            notify_comments: true,
            notify_reviews: true,
        }
    }

    pub fn enabled(&self, kind: ActivityKind) -> bool {
        match kind {
            ActivityKind::Comment => self.notify_comments,
            ActivityKind::Review => self.notify_reviews,
        }
    }
}

/// Inputs of one poll cycle besides the snapshot itself.
#[derive(Debug, Clone)]
pub struct CycleContext {
    pub permissions: Permissions,
    pub preferences: NotificationPreferences,
    /// Login of the token owner, for dropping self-authored activity.
    pub current_user: Option<String>,
    /// Wall-clock time used to seed empty categories.
    pub now: DateTime<Utc>,
}

impl CycleContext {
    pub fn new(preferences: NotificationPreferences) -> Self {
        Self {
            permissions: Permissions::default(),
            preferences,
            current_user: None,
            now: Utc::now(),
        }
    }

    pub fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_current_user(mut self, login: Option<String>) -> Self {
        self.current_user = login;
        self
    }

    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }
}

/// A failure confined to one pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleError {
    pub pr_key: String,
    pub error: PulseError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleResult {
    /// Intents the notifier accepted. Behind a queue this counts hand-offs;
    /// later de-duplication or delivery failures are only logged.
    pub notifications_sent: usize,
    pub pull_requests_processed: usize,
    /// This cycle seeded watermarks instead of notifying.
    pub baseline_established: bool,
    pub cancelled: bool,
    pub errors: Vec<CycleError>,
}
