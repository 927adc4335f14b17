//! Token storage
//!
//! Saving or deleting the token resets the notification baseline: a new
//! credential may see a different set of pull requests.

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::database::models::to_micros;
use crate::database::queries::Queries;
use crate::database::Database;
use crate::error::PulseError;
use crate::watermark::WatermarkStore;

const GITHUB_CREDENTIAL: &str = "github";

/// Stable, non-reversible identifier for a token.
pub fn fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.trim().as_bytes());
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

pub struct CredentialStore {
    database: Database,
}

impl CredentialStore {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub async fn save_token(&self, token: &str) -> Result<(), PulseError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(PulseError::CredentialError("Refusing to save an empty token".to_string()));
        }

        Queries::save_credential(self.database.pool(), GITHUB_CREDENTIAL, token, to_micros(Utc::now())).await?;
        self.database.set_baseline_established(false).await?;
        info!("Saved GitHub token; notification baseline reset");
        Ok(())
    }

    pub async fn token(&self) -> Result<Option<String>, PulseError> {
        let row = Queries::get_credential(self.database.pool(), GITHUB_CREDENTIAL).await?;
        Ok(row.map(|row| row.token))
    }

    pub async fn has_token(&self) -> Result<bool, PulseError> {
        Ok(self.token().await?.map_or(false, |token| !token.is_empty()))
    }

    /// Returns whether a token was stored.
    pub async fn delete_token(&self) -> Result<bool, PulseError> {
        let deleted = Queries::delete_credential(self.database.pool(), GITHUB_CREDENTIAL).await?;
        self.database.set_baseline_established(false).await?;
        info!("Deleted GitHub token; notification baseline reset");
        Ok(deleted)
    }
}
