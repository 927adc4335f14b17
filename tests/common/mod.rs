#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::{Arc, Mutex};

use pr_pulse::database::Database;
use pr_pulse::engine::{CycleContext, NotificationPreferences, PollEngine};
use pr_pulse::github::types::{Comment, PullRequestSnapshot, Review};
use pr_pulse::notify::{NotificationIntent, Notifier};
use pr_pulse::watermark::WatermarkStore;
use pr_pulse::PulseError;

/// Setup an in-memory SQLite database for testing
pub async fn setup_test_db() -> Database {
    Database::open("sqlite::memory:")
        .await
        .expect("Failed to create test database")
}

/// Notifier that remembers everything it was asked to show
#[derive(Default)]
pub struct RecordingNotifier {
    delivered: Mutex<Vec<NotificationIntent>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn intents(&self) -> Vec<NotificationIntent> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn bodies(&self) -> Vec<String> {
        self.intents().into_iter().map(|intent| intent.body).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, intent: &NotificationIntent) -> Result<(), PulseError> {
        if self.fail {
            return Err(PulseError::delivery(&intent.id, "notification center unavailable"));
        }
        self.delivered.lock().unwrap().push(intent.clone());
        Ok(())
    }
}

/// Engine over a fresh in-memory database
pub async fn setup_engine() -> (Database, Arc<RecordingNotifier>, PollEngine) {
    let database = setup_test_db().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let engine = PollEngine::new(Arc::new(database.clone()), notifier.clone());
    (database, notifier, engine)
}

/// Engine whose store already has a baseline
pub async fn setup_established_engine() -> (Database, Arc<RecordingNotifier>, PollEngine) {
    let (database, notifier, engine) = setup_engine().await;
    database.set_baseline_established(true).await.unwrap();
    (database, notifier, engine)
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 14, 15, 0, 0).unwrap()
}

pub fn at(offset_secs: i64) -> DateTime<Utc> {
    t0() + Duration::seconds(offset_secs)
}

pub fn comment(id: &str, author: &str, offset_secs: i64, text: &str) -> Comment {
    Comment {
        id: id.to_string(),
        author: author.to_string(),
        created_at: at(offset_secs),
        preview: text.to_string(),
    }
}

pub fn review(id: &str, author: &str, offset_secs: i64, label: &str) -> Review {
    Review {
        id: id.to_string(),
        author: author.to_string(),
        created_at: at(offset_secs),
        label: label.to_string(),
    }
}

pub fn pull_request(repo: &str, number: u64) -> PullRequestSnapshot {
    let mut pr = PullRequestSnapshot::new(repo, number);
    pr.title = format!("Change #{}", number);
    pr.html_url = format!("https://github.com/{}/pull/{}", repo, number);
    pr
}

/// Context for a cycle run by user `me`, one hour after `t0`
pub fn cycle_context() -> CycleContext {
    CycleContext::new(NotificationPreferences::all())
        .with_current_user(Some("me".to_string()))
        .at(at(3600))
}
