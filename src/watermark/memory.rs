use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{Watermark, WatermarkStore};
use crate::activity::{ActivityKind, WatermarkKey};
use crate::error::PulseError;

#[derive(Debug, Default)]
struct State {
    watermarks: BTreeMap<WatermarkKey, (Watermark, DateTime<Utc>)>,
    baseline_established: bool,
    credential_fingerprint: Option<String>,
}

/// Process-local store for tests and throwaway runs.
#[derive(Debug, Default)]
pub struct MemoryWatermarkStore {
    state: Mutex<State>,
}

impl MemoryWatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, State>, PulseError> {
        self.state
            .lock()
            .map_err(|_| PulseError::StorageError("watermark store lock poisoned".to_string()))
    }
}

#[async_trait]
impl WatermarkStore for MemoryWatermarkStore {
    async fn watermark(&self, key: &WatermarkKey) -> Result<Watermark, PulseError> {
        Ok(self
            .lock()?
            .watermarks
            .get(key)
            .map(|(watermark, _)| *watermark)
            .unwrap_or_default())
    }

    async fn advance(
        &self,
        key: &WatermarkKey,
        kind: ActivityKind,
        at: DateTime<Utc>,
    ) -> Result<bool, PulseError> {
        let mut state = self.lock()?;
        let (watermark, updated_at) = state
            .watermarks
            .entry(key.clone())
            .or_insert_with(|| (Watermark::default(), Utc::now()));

        match watermark.get(kind) {
            Some(stored) if at <= stored => Ok(false),
            _ => {
                watermark.set(kind, at);
                *updated_at = Utc::now();
                Ok(true)
            }
        }
    }

    async fn watermarks(&self) -> Result<Vec<(WatermarkKey, Watermark)>, PulseError> {
        Ok(self
            .lock()?
            .watermarks
            .iter()
            .map(|(key, (watermark, _))| (key.clone(), *watermark))
            .collect())
    }

    async fn prune_watermarks(&self, cutoff: DateTime<Utc>) -> Result<u64, PulseError> {
        let mut state = self.lock()?;
        let before = state.watermarks.len();
        state.watermarks.retain(|_, (_, updated_at)| *updated_at >= cutoff);
        Ok((before - state.watermarks.len()) as u64)
    }

    async fn baseline_established(&self) -> Result<bool, PulseError> {
        Ok(self.lock()?.baseline_established)
    }

    async fn set_baseline_established(&self, established: bool) -> Result<(), PulseError> {
        self.lock()?.baseline_established = established;
        Ok(())
    }

    async fn credential_fingerprint(&self) -> Result<Option<String>, PulseError> {
        Ok(self.lock()?.credential_fingerprint.clone())
    }

    async fn set_credential_fingerprint(&self, fingerprint: Option<&str>) -> Result<(), PulseError> {
        self.lock()?.credential_fingerprint = fingerprint.map(str::to_string);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_missing_fields_are_absent() {
        let store = MemoryWatermarkStore::new();
        let key = WatermarkKey::new("org/repo", 1);
        assert_eq!(store.watermark(&key).await.unwrap(), Watermark::default());
        assert!(!store.has_watermark(&key, ActivityKind::Comment).await.unwrap());
    }

    #[tokio::test]
    async fn test_advance_is_monotonic() {
        let store = MemoryWatermarkStore::new();
        let key = WatermarkKey::new("org/repo", 1);
        let t0 = Utc::now();

        assert!(store.advance(&key, ActivityKind::Comment, t0).await.unwrap());
        assert!(!store.advance(&key, ActivityKind::Comment, t0 - Duration::seconds(5)).await.unwrap());
        assert!(!store.advance(&key, ActivityKind::Comment, t0).await.unwrap());
        assert_eq!(store.watermark(&key).await.unwrap().last_seen_comment_at, Some(t0));

        // Categories are independent.
        assert!(!store.has_watermark(&key, ActivityKind::Review).await.unwrap());
    }

    #[tokio::test]
    async fn test_prune_removes_stale_entries() {
        let store = MemoryWatermarkStore::new();
        let key = WatermarkKey::new("org/repo", 1);
        store.advance(&key, ActivityKind::Review, Utc::now()).await.unwrap();

        let removed = store.prune_watermarks(Utc::now() + Duration::seconds(1)).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.watermarks().await.unwrap().is_empty());
    }
}
