use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PulseError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct WatermarkRow {
    pub pr_key: String,
    pub category: String,
    pub seen_at: i64,
    pub updated_at: i64,
}

impl WatermarkRow {
    pub fn seen_at(&self) -> Result<DateTime<Utc>, PulseError> {
        from_micros(self.seen_at)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct CredentialRow {
    pub name: String,
    pub token: String,
    pub saved_at: i64,
}

pub fn to_micros(at: DateTime<Utc>) -> i64 {
    at.timestamp_micros()
}

pub fn from_micros(micros: i64) -> Result<DateTime<Utc>, PulseError> {
    DateTime::<Utc>::from_timestamp_micros(micros)
        .ok_or_else(|| PulseError::StorageError(format!("Stored timestamp out of range: {}", micros)))
}
