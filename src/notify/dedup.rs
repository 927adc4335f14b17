use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use super::{NotificationIntent, Notifier};
use crate::database::models::to_micros;
use crate::database::queries::Queries;
use crate::database::Database;
use crate::error::PulseError;

/// Drops intents whose id was already delivered, across restarts.
///
/// The id is recorded only after the inner notifier succeeds, so a crash in
/// between can still show an intent twice.
pub struct DedupNotifier {
    inner: Arc<dyn Notifier>,
    database: Database,
}

impl DedupNotifier {
    pub fn new(inner: Arc<dyn Notifier>, database: Database) -> Self {
        Self { inner, database }
    }
}

/// Drop ledger entries older than `cutoff`. Only ids whose watermark has
/// long moved past them should be old enough to go.
pub async fn prune_ledger(database: &Database, cutoff: DateTime<Utc>) -> Result<u64, PulseError> {
    let removed = Queries::prune_deliveries(database.pool(), to_micros(cutoff)).await?;
    if removed > 0 {
        info!("Pruned {} delivered notification records", removed);
    }
    Ok(removed)
}

#[async_trait]
impl Notifier for DedupNotifier {
    async fn deliver(&self, intent: &NotificationIntent) -> Result<(), PulseError> {
        if Queries::is_delivered(self.database.pool(), &intent.id).await? {
            debug!("Notification {} already delivered, skipping", intent.id);
            return Ok(());
        }

        self.inner.deliver(intent).await?;
        Queries::record_delivery(self.database.pool(), &intent.id, to_micros(Utc::now())).await?;
        Ok(())
    }
}
