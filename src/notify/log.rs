use async_trait::async_trait;
use tracing::info;

use super::{NotificationIntent, Notifier};
use crate::error::PulseError;

/// Writes notifications to the log. Useful headless and as a fallback.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, intent: &NotificationIntent) -> Result<(), PulseError> {
        info!(id = %intent.id, "{}: {}", intent.title, intent.body);
        Ok(())
    }
}
