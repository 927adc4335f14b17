//! First-run policy: seed watermarks from whatever is already there instead
//! of announcing it.

use chrono::{DateTime, Utc};

use super::CycleContext;
use crate::activity::{latest, Activity, ActivityKind, WatermarkKey};
use crate::error::PulseError;
use crate::github::types::PullRequestSnapshot;
use crate::watermark::WatermarkStore;

/// Newest item's timestamp, or `now` for an empty category.
pub fn seed_target<T: Activity>(items: &[T], now: DateTime<Utc>) -> DateTime<Utc> {
    latest(items).map(|item| item.created_at()).unwrap_or(now)
}

/// Seed every readable category of one pull request. Safe to repeat: the
/// store ignores timestamps that are not newer than what it holds.
pub async fn seed_pull_request(
    store: &dyn WatermarkStore,
    key: &WatermarkKey,
    pr: &PullRequestSnapshot,
    ctx: &CycleContext,
) -> Result<(), PulseError> {
    for kind in ActivityKind::ALL {
        if !ctx.permissions.can_read(kind) {
            continue;
        }
        let target = match kind {
            ActivityKind::Comment => seed_target(&pr.recent_comments, ctx.now),
            ActivityKind::Review => seed_target(&pr.recent_reviews, ctx.now),
        };
        store.advance(key, kind, target).await?;
    }
    Ok(())
}
