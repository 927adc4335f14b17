//! Notification delivery
//!
//! The engine only decides what to say; a [`Notifier`] gets it in front of
//! the user. Implementations treat a repeated intent id as already shown.

pub mod command;
pub mod dedup;
pub mod log;
pub mod queue;

pub use command::CommandNotifier;
pub use dedup::DedupNotifier;
pub use log::LogNotifier;
pub use queue::QueuedNotifier;

pub use crate::activity::NotificationIntent;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{AppConfig, NotifierKind};
use crate::database::Database;
use crate::error::PulseError;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, intent: &NotificationIntent) -> Result<(), PulseError>;
}

/// Configured notifier, de-duplicated against the delivery ledger and
/// drained by a background task.
pub fn from_config(config: &AppConfig, database: Database) -> Result<QueuedNotifier, PulseError> {
    let sink: Arc<dyn Notifier> = match config.notifier {
        NotifierKind::Log => Arc::new(LogNotifier),
        NotifierKind::Command => Arc::new(CommandNotifier::new(config.notify_command.clone())?),
    };
    let deduplicated = DedupNotifier::new(sink, database);
    Ok(QueuedNotifier::spawn(Arc::new(deduplicated)))
}
