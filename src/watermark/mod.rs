//! Watermark Store
//!
//! Remembers, per pull request, the newest comment and review the user has
//! already been shown, plus the process-wide baseline flag.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryWatermarkStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::{ActivityKind, WatermarkKey};
use crate::error::PulseError;

/// Last-seen timestamps for one pull request. `None` means the category was
/// never established, which is not the same as any timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark {
    pub last_seen_comment_at: Option<DateTime<Utc>>,
    pub last_seen_review_at: Option<DateTime<Utc>>,
}

impl Watermark {
    pub fn get(&self, kind: ActivityKind) -> Option<DateTime<Utc>> {
        match kind {
            ActivityKind::Comment => self.last_seen_comment_at,
            ActivityKind::Review => self.last_seen_review_at,
        }
    }

    pub fn set(&mut self, kind: ActivityKind, at: DateTime<Utc>) {
        match kind {
            ActivityKind::Comment => self.last_seen_comment_at = Some(at),
            ActivityKind::Review => self.last_seen_review_at = Some(at),
        }
    }
}

/// Durable state behind the poll engine.
///
/// `advance` is monotonic: a timestamp older than or equal to the stored one
/// is ignored and reported as `Ok(false)`. Every field is written on its own,
/// so an interrupted pass leaves each field consistent.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    async fn watermark(&self, key: &WatermarkKey) -> Result<Watermark, PulseError>;

    async fn advance(
        &self,
        key: &WatermarkKey,
        kind: ActivityKind,
        at: DateTime<Utc>,
    ) -> Result<bool, PulseError>;

    async fn has_watermark(&self, key: &WatermarkKey, kind: ActivityKind) -> Result<bool, PulseError> {
        Ok(self.watermark(key).await?.get(kind).is_some())
    }

    /// All stored watermarks, ordered by key.
    async fn watermarks(&self) -> Result<Vec<(WatermarkKey, Watermark)>, PulseError>;

    /// Delete watermarks not advanced since `cutoff`; returns rows removed.
    async fn prune_watermarks(&self, cutoff: DateTime<Utc>) -> Result<u64, PulseError>;

    async fn baseline_established(&self) -> Result<bool, PulseError>;

    async fn set_baseline_established(&self, established: bool) -> Result<(), PulseError>;

    async fn credential_fingerprint(&self) -> Result<Option<String>, PulseError>;

    async fn set_credential_fingerprint(&self, fingerprint: Option<&str>) -> Result<(), PulseError>;
}
