use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::{Watermark, WatermarkStore};
use crate::activity::{ActivityKind, WatermarkKey};
use crate::database::models::{to_micros, WatermarkRow};
use crate::database::queries::Queries;
use crate::database::schema::{BASELINE_ESTABLISHED_KEY, CREDENTIAL_FINGERPRINT_KEY};
use crate::database::Database;
use crate::error::PulseError;

fn apply_row(watermark: &mut Watermark, row: &WatermarkRow) -> Result<(), PulseError> {
    match ActivityKind::from_str(&row.category) {
        Some(kind) => watermark.set(kind, row.seen_at()?),
        None => warn!("Ignoring watermark with unknown category {:?} for {}", row.category, row.pr_key),
    }
    Ok(())
}

#[async_trait]
impl WatermarkStore for Database {
    async fn watermark(&self, key: &WatermarkKey) -> Result<Watermark, PulseError> {
        let rows = Queries::get_watermark_rows(self.pool(), key.as_str()).await?;
        let mut watermark = Watermark::default();
        for row in &rows {
            apply_row(&mut watermark, row)?;
        }
        Ok(watermark)
    }

    async fn advance(
        &self,
        key: &WatermarkKey,
        kind: ActivityKind,
        at: DateTime<Utc>,
    ) -> Result<bool, PulseError> {
        let advanced = Queries::advance_watermark(
            self.pool(),
            key.as_str(),
            kind.as_str(),
            to_micros(at),
            to_micros(Utc::now()),
        )
        .await?;

        if !advanced {
            debug!("Kept {} watermark for {}: {} is not newer", kind.as_str(), key, at);
        }
        Ok(advanced)
    }

    async fn watermarks(&self) -> Result<Vec<(WatermarkKey, Watermark)>, PulseError> {
        let rows = Queries::list_watermark_rows(self.pool()).await?;
        let mut grouped: BTreeMap<String, Watermark> = BTreeMap::new();
        for row in &rows {
            apply_row(grouped.entry(row.pr_key.clone()).or_default(), row)?;
        }
        Ok(grouped
            .into_iter()
            .map(|(key, watermark)| (WatermarkKey::from_stored(key), watermark))
            .collect())
    }

    async fn prune_watermarks(&self, cutoff: DateTime<Utc>) -> Result<u64, PulseError> {
        Ok(Queries::prune_watermarks(self.pool(), to_micros(cutoff)).await?)
    }

    async fn baseline_established(&self) -> Result<bool, PulseError> {
        let value = Queries::get_state(self.pool(), BASELINE_ESTABLISHED_KEY).await?;
        Ok(value.as_deref() == Some("true"))
    }

    async fn set_baseline_established(&self, established: bool) -> Result<(), PulseError> {
        let value = if established { "true" } else { "false" };
        Queries::set_state(self.pool(), BASELINE_ESTABLISHED_KEY, value).await?;
        Ok(())
    }

    async fn credential_fingerprint(&self) -> Result<Option<String>, PulseError> {
        Ok(Queries::get_state(self.pool(), CREDENTIAL_FINGERPRINT_KEY).await?)
    }

    async fn set_credential_fingerprint(&self, fingerprint: Option<&str>) -> Result<(), PulseError> {
        match fingerprint {
            Some(value) => Queries::set_state(self.pool(), CREDENTIAL_FINGERPRINT_KEY, value).await?,
            None => Queries::delete_state(self.pool(), CREDENTIAL_FINGERPRINT_KEY).await?,
        }
        Ok(())
    }
}
