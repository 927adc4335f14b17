//! Poll Cycle Orchestrator
//!
//! Drives one pass over a snapshot: baseline on the first cycle, otherwise
//! classify, notify and advance watermarks for every pull request.
//!
//! # Concurrency
//!
//! Only one cycle runs per engine. [`PollEngine::run_poll_cycle`] rejects a
//! second caller with [`PulseError::CycleInProgress`];
//! [`PollEngine::run_superseding_cycle`] cancels the running cycle and waits
//! for it instead. Pull requests inside a cycle are processed concurrently;
//! each one only touches its own watermark key.

use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::baseline;
use super::{CycleContext, CycleError, CycleResult, NotificationPreferences};
use crate::activity::{classify, compose, next_watermark, ActivityKind, Describe, WatermarkKey};
use crate::credentials;
use crate::error::PulseError;
use crate::github::client::SnapshotSource;
use crate::github::types::PullRequestSnapshot;
use crate::notify::Notifier;
use crate::watermark::{Watermark, WatermarkStore};

const DEFAULT_MAX_CONCURRENCY: usize = 4;

#[derive(Debug, Default)]
struct PullRequestOutcome {
    processed: bool,
    cancelled: bool,
    notifications_sent: usize,
    errors: Vec<CycleError>,
}

impl PullRequestOutcome {
    fn cancelled() -> Self {
        Self {
            cancelled: true,
            ..Self::default()
        }
    }

    fn failed(key: &WatermarkKey, error: PulseError) -> Self {
        Self {
            errors: vec![CycleError {
                pr_key: key.to_string(),
                error,
            }],
            ..Self::default()
        }
    }
}

pub struct PollEngine {
    store: Arc<dyn WatermarkStore>,
    notifier: Arc<dyn Notifier>,
    max_concurrency: usize,
    cycle_lock: tokio::sync::Mutex<()>,
    in_flight: Mutex<Option<CancellationToken>>,
}

impl PollEngine {
    pub fn new(store: Arc<dyn WatermarkStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            cycle_lock: tokio::sync::Mutex::new(()),
            in_flight: Mutex::new(None),
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Run one cycle over `snapshot`. Fails with `CycleInProgress` if
    /// another cycle holds the engine.
    pub async fn run_poll_cycle(
        &self,
        snapshot: &[PullRequestSnapshot],
        ctx: &CycleContext,
    ) -> Result<CycleResult, PulseError> {
        let _guard = self
            .cycle_lock
            .try_lock()
            .map_err(|_| PulseError::CycleInProgress)?;
        self.run_tracked(snapshot, ctx).await
    }

    /// Cancel whatever cycle is running, wait for it to stop, then run.
    pub async fn run_superseding_cycle(
        &self,
        snapshot: &[PullRequestSnapshot],
        ctx: &CycleContext,
    ) -> Result<CycleResult, PulseError> {
        if self.cancel_in_flight() {
            info!("Superseding in-flight poll cycle");
        }
        let _guard = self.cycle_lock.lock().await;
        self.run_tracked(snapshot, ctx).await
    }

    /// Fetch from `source` and run a cycle on the result. A failed or
    /// cancelled fetch leaves all stored state untouched.
    pub async fn poll_once(
        &self,
        source: &dyn SnapshotSource,
        preferences: NotificationPreferences,
    ) -> Result<CycleResult, PulseError> {
        let _guard = self
            .cycle_lock
            .try_lock()
            .map_err(|_| PulseError::CycleInProgress)?;

        let token = CancellationToken::new();
        self.set_in_flight(Some(token.clone()));
        let result = self.fetch_and_run(source, preferences, &token).await;
        self.set_in_flight(None);
        result
    }

    async fn fetch_and_run(
        &self,
        source: &dyn SnapshotSource,
        preferences: NotificationPreferences,
        token: &CancellationToken,
    ) -> Result<CycleResult, PulseError> {
        let fetch = async {
            let fetched = source.fetch_snapshot().await?;
            let current_user = match fetched.viewer_login.clone() {
                Some(login) => Some(login),
                None => source.current_user_login().await.unwrap_or_else(|e| {
                    warn!("Could not resolve current user, self-authored activity will notify: {}", e);
                    None
                }),
            };
            Ok::<_, PulseError>((fetched, current_user))
        };

        let (fetched, current_user) = tokio::select! {
            fetched = fetch => fetched?,
            _ = token.cancelled() => {
                warn!("Poll cycle cancelled while fetching");
                return Ok(CycleResult {
                    cancelled: true,
                    ..CycleResult::default()
                });
            }
        };

        let ctx = CycleContext::new(preferences)
            .with_permissions(fetched.permissions)
            .with_current_user(current_user);
        self.run_cycle(&fetched.pull_requests, &ctx, token).await
    }

    /// Cancel the running cycle, if any. Returns whether one was running.
    pub fn cancel_in_flight(&self) -> bool {
        match self.in_flight.lock() {
            Ok(in_flight) => match in_flight.as_ref() {
                Some(token) => {
                    token.cancel();
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    fn set_in_flight(&self, token: Option<CancellationToken>) {
        if let Ok(mut in_flight) = self.in_flight.lock() {
            *in_flight = token;
        }
    }

    async fn run_tracked(
        &self,
        snapshot: &[PullRequestSnapshot],
        ctx: &CycleContext,
    ) -> Result<CycleResult, PulseError> {
        let token = CancellationToken::new();
        self.set_in_flight(Some(token.clone()));
        let result = self.run_cycle(snapshot, ctx, &token).await;
        self.set_in_flight(None);
        result
    }

    async fn run_cycle(
        &self,
        snapshot: &[PullRequestSnapshot],
        ctx: &CycleContext,
        token: &CancellationToken,
    ) -> Result<CycleResult, PulseError> {
        let pull_requests = unique_pull_requests(snapshot);
        let baseline = !self.store.baseline_established().await?;

        if baseline {
            info!(
                "Establishing notification baseline for {} pull requests",
                pull_requests.len()
            );
        } else {
            debug!("Processing {} pull requests", pull_requests.len());
        }

        let outcomes: Vec<PullRequestOutcome> = stream::iter(pull_requests.iter())
            .map(|(key, pr)| async move {
                if token.is_cancelled() {
                    return PullRequestOutcome::cancelled();
                }
                if baseline {
                    self.baseline_pull_request(key, pr, ctx).await
                } else {
                    self.process_pull_request(key, pr, ctx, token).await
                }
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        let mut result = CycleResult {
            baseline_established: baseline,
            ..CycleResult::default()
        };
        for outcome in outcomes {
            result.notifications_sent += outcome.notifications_sent;
            if outcome.processed {
                result.pull_requests_processed += 1;
            }
            result.cancelled |= outcome.cancelled;
            result.errors.extend(outcome.errors);
        }
        result.cancelled |= token.is_cancelled();

        if result.cancelled {
            warn!(
                "Poll cycle cancelled after {} of {} pull requests",
                result.pull_requests_processed,
                pull_requests.len()
            );
            return Ok(result);
        }

        if baseline {
            self.store.set_baseline_established(true).await?;
            info!("Notification baseline established");
        }

        for failure in &result.errors {
            warn!("{}: {}", failure.pr_key, failure.error);
        }
        info!(
            "Poll cycle finished: {} pull requests, {} notifications, {} errors",
            result.pull_requests_processed,
            result.notifications_sent,
            result.errors.len()
        );
        Ok(result)
    }

    async fn baseline_pull_request(
        &self,
        key: &WatermarkKey,
        pr: &PullRequestSnapshot,
        ctx: &CycleContext,
    ) -> PullRequestOutcome {
        match baseline::seed_pull_request(self.store.as_ref(), key, pr, ctx).await {
            Ok(()) => PullRequestOutcome {
                processed: true,
                ..PullRequestOutcome::default()
            },
            Err(e) => PullRequestOutcome::failed(key, e),
        }
    }

    async fn process_pull_request(
        &self,
        key: &WatermarkKey,
        pr: &PullRequestSnapshot,
        ctx: &CycleContext,
        token: &CancellationToken,
    ) -> PullRequestOutcome {
        let watermark = match self.store.watermark(key).await {
            Ok(watermark) => watermark,
            Err(e) => return PullRequestOutcome::failed(key, e),
        };

        let mut outcome = PullRequestOutcome::default();
        for kind in ActivityKind::ALL {
            if !ctx.permissions.can_read(kind) {
                debug!("Skipping {} activity for {}: not readable with this token", kind.as_str(), key);
                continue;
            }

            let step = match kind {
                ActivityKind::Comment => {
                    self.process_category(key, pr, &pr.recent_comments, &watermark, ctx, token)
                        .await
                }
                ActivityKind::Review => {
                    self.process_category(key, pr, &pr.recent_reviews, &watermark, ctx, token)
                        .await
                }
            };

            match step {
                Ok((sent, delivery_error)) => {
                    outcome.notifications_sent += sent;
                    if let Some(error) = delivery_error {
                        outcome.errors.push(CycleError {
                            pr_key: key.to_string(),
                            error,
                        });
                    }
                }
                Err(PulseError::Cancelled) => {
                    outcome.cancelled = true;
                    return outcome;
                }
                Err(error) => {
                    // Storage failures end this pull request's pass only.
                    outcome.errors.push(CycleError {
                        pr_key: key.to_string(),
                        error,
                    });
                    return outcome;
                }
            }
        }

        outcome.processed = true;
        outcome
    }

    /// Classify, notify and advance one category. Returns the number of
    /// notifications handed to the notifier and any delivery failure;
    /// `Err` is reserved for storage failures and cancellation.
    async fn process_category<T: Describe>(
        &self,
        key: &WatermarkKey,
        pr: &PullRequestSnapshot,
        items: &[T],
        watermark: &Watermark,
        ctx: &CycleContext,
        token: &CancellationToken,
    ) -> Result<(usize, Option<PulseError>), PulseError> {
        let kind = T::KIND;
        let stored = watermark.get(kind);
        let mut sent = 0;
        let mut delivery_error = None;

        if let Some(classified) = classify(items, stored, ctx.current_user.as_deref()) {
            if !classified.is_empty() && !ctx.preferences.enabled(kind) {
                debug!(
                    "{} new {} items on {} not announced: notifications disabled",
                    classified.len(),
                    kind.as_str(),
                    key
                );
            } else if let Some(intent) = compose(pr, key, &classified) {
                match self.notifier.deliver(&intent).await {
                    Ok(()) => {
                        info!("Notified {}: {}", intent.title, intent.body);
                        sent = 1;
                    }
                    Err(e) => {
                        warn!("Failed to deliver notification {}: {}", intent.id, e);
                        delivery_error = Some(e);
                    }
                }
            }
        }

        if let Some(target) = next_watermark(items, stored, ctx.now) {
            if token.is_cancelled() {
                return Err(PulseError::Cancelled);
            }
            self.store.advance(key, kind, target).await?;
        }

        Ok((sent, delivery_error))
    }

    /// Forget that a baseline was established; the next cycle re-seeds.
    pub async fn reset_baseline(&self) -> Result<(), PulseError> {
        self.store.set_baseline_established(false).await?;
        info!("Notification baseline reset");
        Ok(())
    }

    /// Record the credential in use. If it differs from the last one seen
    /// the baseline is reset and `true` is returned.
    pub async fn sync_credential(&self, token: Option<&str>) -> Result<bool, PulseError> {
        let current = token.map(credentials::fingerprint);
        let stored = self.store.credential_fingerprint().await?;
        if current == stored {
            return Ok(false);
        }

        self.store.set_baseline_established(false).await?;
        self.store.set_credential_fingerprint(current.as_deref()).await?;
        info!("Credential changed; notification baseline will be re-established");
        Ok(true)
    }

    pub async fn baseline_established(&self) -> Result<bool, PulseError> {
        self.store.baseline_established().await
    }

    pub async fn watermark(&self, key: &WatermarkKey) -> Result<Watermark, PulseError> {
        self.store.watermark(key).await
    }

    pub async fn watermarks(&self) -> Result<Vec<(WatermarkKey, Watermark)>, PulseError> {
        self.store.watermarks().await
    }

    /// Drop watermarks not advanced in `max_age`, e.g. for merged PRs.
    pub async fn prune_stale(&self, max_age: Duration, now: DateTime<Utc>) -> Result<u64, PulseError> {
        let removed = self.store.prune_watermarks(now - max_age).await?;
        if removed > 0 {
            info!("Pruned {} stale watermarks", removed);
        }
        Ok(removed)
    }
}

/// Key every pull request, keeping the first of any duplicates.
fn unique_pull_requests(snapshot: &[PullRequestSnapshot]) -> Vec<(WatermarkKey, &PullRequestSnapshot)> {
    let mut seen = HashSet::new();
    snapshot
        .iter()
        .filter_map(|pr| {
            let key = WatermarkKey::for_pull_request(pr);
            if seen.insert(key.clone()) {
                Some((key, pr))
            } else {
                debug!("Ignoring duplicate pull request {} in snapshot", key);
                None
            }
        })
        .collect()
}
