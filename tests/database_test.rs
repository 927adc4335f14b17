use chrono::{Duration, Utc};

use pr_pulse::activity::{ActivityKind, WatermarkKey};
use pr_pulse::credentials::CredentialStore;
use pr_pulse::database::queries::Queries;
use pr_pulse::database::Database;
use pr_pulse::watermark::WatermarkStore;

mod common;
use common::*;

#[tokio::test]
async fn test_database_creation_and_migration() {
    let db = setup_test_db().await;

    // Migrating twice is a no-op.
    db.run_migrations().await.unwrap();
    assert!(!db.pool().is_closed());
    assert!(!db.baseline_established().await.unwrap());
    assert!(db.watermarks().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_watermarks_are_listed_per_pull_request() {
    let db = setup_test_db().await;
    let first = WatermarkKey::new("org/a", 1);
    let second = WatermarkKey::new("org/b", 2);

    db.advance(&second, ActivityKind::Review, at(2)).await.unwrap();
    db.advance(&first, ActivityKind::Comment, at(1)).await.unwrap();
    db.advance(&first, ActivityKind::Review, at(3)).await.unwrap();

    let all = db.watermarks().await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].0, first);
    assert_eq!(all[0].1.last_seen_comment_at, Some(at(1)));
    assert_eq!(all[0].1.last_seen_review_at, Some(at(3)));
    assert_eq!(all[1].0, second);
    assert_eq!(all[1].1.last_seen_review_at, Some(at(2)));
}

#[tokio::test]
async fn test_prune_removes_only_stale_rows() {
    let db = setup_test_db().await;
    let key = WatermarkKey::new("org/repo", 4);
    db.advance(&key, ActivityKind::Comment, at(1)).await.unwrap();

    // Rows are stamped with the time they were written, not the activity time.
    assert_eq!(db.prune_watermarks(Utc::now() - Duration::days(1)).await.unwrap(), 0);
    assert_eq!(db.prune_watermarks(Utc::now() + Duration::seconds(1)).await.unwrap(), 1);
    assert!(db.watermarks().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("pulse.db").display());
    let key = WatermarkKey::new("org/repo", 5);

    {
        let db = Database::open(&url).await.unwrap();
        db.set_baseline_established(true).await.unwrap();
        db.set_credential_fingerprint(Some("sha256:abc")).await.unwrap();
        db.advance(&key, ActivityKind::Review, at(42)).await.unwrap();
        db.pool().close().await;
    }

    let db = Database::open(&url).await.unwrap();
    assert!(db.baseline_established().await.unwrap());
    assert_eq!(db.credential_fingerprint().await.unwrap().as_deref(), Some("sha256:abc"));
    assert_eq!(db.watermark(&key).await.unwrap().last_seen_review_at, Some(at(42)));
}

#[tokio::test]
async fn test_fingerprint_can_be_cleared() {
    let db = setup_test_db().await;
    db.set_credential_fingerprint(Some("sha256:abc")).await.unwrap();
    db.set_credential_fingerprint(None).await.unwrap();
    assert_eq!(db.credential_fingerprint().await.unwrap(), None);
}

#[tokio::test]
async fn test_delivery_ledger_records_once() {
    let db = setup_test_db().await;
    let id = "comment-org:repo-1-99";
    let now = Utc::now().timestamp_micros();

    assert!(!Queries::is_delivered(db.pool(), id).await.unwrap());
    assert!(Queries::record_delivery(db.pool(), id, now).await.unwrap());
    assert!(!Queries::record_delivery(db.pool(), id, now).await.unwrap());
    assert!(Queries::is_delivered(db.pool(), id).await.unwrap());
}

#[tokio::test]
async fn test_replacing_stored_token_resets_baseline() {
    let db = setup_test_db().await;
    let store = CredentialStore::new(db.clone());

    store.save_token("ghp_first").await.unwrap();
    db.set_baseline_established(true).await.unwrap();
    store.save_token("ghp_second").await.unwrap();

    assert_eq!(store.token().await.unwrap().as_deref(), Some("ghp_second"));
    assert!(!db.baseline_established().await.unwrap());
    assert!(store.delete_token().await.unwrap());
    assert!(!store.delete_token().await.unwrap());
}
