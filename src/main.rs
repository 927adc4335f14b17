//! PR Pulse
//!
//! Polls GitHub for activity on the user's open pull requests and raises a
//! notification for new comments and reviews.

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pr_pulse::config::AppConfig;
use pr_pulse::credentials::CredentialStore;
use pr_pulse::database::Database;
use pr_pulse::engine::{CycleResult, PollEngine};
use pr_pulse::github::GitHubClient;
use pr_pulse::notify::{self, NotificationIntent, Notifier, QueuedNotifier};

#[derive(Parser)]
#[command(name = "pr-pulse")]
#[command(about = "Notifications for activity on your open GitHub pull requests")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./pr-pulse.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single poll cycle and exit
    Poll,

    /// Poll on an interval until interrupted
    Watch,

    /// Show baseline state and stored watermarks
    Status {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage the stored GitHub token
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },

    /// Forget the baseline so the next cycle re-seeds silently
    ResetBaseline,

    /// Delete watermarks and delivery records that have not moved in a while
    Prune {
        /// Age in days (defaults to prune_after_days from the config)
        #[arg(long)]
        days: Option<i64>,
    },

    /// Send a test notification through the configured notifier
    TestNotification,
}

#[derive(Subcommand)]
enum TokenAction {
    /// Store a token
    Set {
        token: String,
    },
    /// Remove the stored token
    Delete,
    /// Show whether a token is configured
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pr_pulse=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let database = Database::open(&config.database_url)
        .await
        .context("Failed to open database")?;

    match cli.command {
        Commands::Poll => {
            let (engine, client, notifier) = prepare(&config, &database).await?;
            let result = engine.poll_once(&client, config.preferences()).await;
            notifier.shutdown().await;
            report(&result?);
        }
        Commands::Watch => {
            let (engine, client, notifier) = prepare(&config, &database).await?;
            watch(&engine, &client, &config).await;
            let delivered = notifier.shutdown().await;
            info!("Stopped; {} notifications delivered this session", delivered);
        }
        Commands::Status { json } => status(&config, &database, json).await?,
        Commands::Token { action } => token(&database, &config, action).await?,
        Commands::ResetBaseline => {
            let engine = PollEngine::new(Arc::new(database.clone()), Arc::new(notify::LogNotifier));
            engine.reset_baseline().await?;
            println!("Baseline reset; the next poll will not notify about existing activity.");
        }
        Commands::Prune { days } => {
            let days = days.unwrap_or(config.prune_after_days);
            if days <= 0 {
                return Err(anyhow!("--days must be positive"));
            }
            let engine = PollEngine::new(Arc::new(database.clone()), Arc::new(notify::LogNotifier));
            let now = chrono::Utc::now();
            let max_age = chrono::Duration::days(days);
            let removed = engine.prune_stale(max_age, now).await?;
            let forgotten = notify::dedup::prune_ledger(&database, now - max_age).await?;
            println!(
                "Removed {} watermarks and {} delivery records older than {} days",
                removed, forgotten, days
            );
        }
        Commands::TestNotification => {
            let notifier = notify::from_config(&config, database.clone())?;
            let intent = NotificationIntent {
                id: format!("debug-test-{}", uuid::Uuid::new_v4()),
                title: "PR Pulse Test Notification".to_string(),
                body: "This is a test notification.".to_string(),
            };
            notifier.deliver(&intent).await?;
            if notifier.shutdown().await == 0 {
                return Err(anyhow!("Test notification was not delivered, see log for details"));
            }
            println!("Test notification sent");
        }
    }

    Ok(())
}

/// Resolve the token, reconcile it with the stored fingerprint and build
/// everything a poll needs.
async fn prepare(
    config: &AppConfig,
    database: &Database,
) -> anyhow::Result<(PollEngine, GitHubClient, Arc<QueuedNotifier>)> {
    let token = match config.configured_token() {
        Some(token) => token.to_string(),
        None => CredentialStore::new(database.clone())
            .token()
            .await?
            .ok_or_else(|| anyhow!("No GitHub token configured; run `pr-pulse token set <TOKEN>`"))?,
    };

    let client = GitHubClient::new(
        &config.github_api_url,
        &token,
        Duration::from_secs(config.request_timeout_secs),
    )?;

    let notifier = Arc::new(notify::from_config(config, database.clone())?);
    let engine = PollEngine::new(Arc::new(database.clone()), notifier.clone())
        .with_max_concurrency(config.max_concurrency);

    if engine.sync_credential(Some(&token)).await? {
        info!("New credential detected");
    }

    Ok((engine, client, notifier))
}

async fn watch(engine: &PollEngine, client: &GitHubClient, config: &AppConfig) {
    let mut interval = tokio::time::interval(Duration::from_secs(config.poll_interval_secs));
    info!("Polling every {}s", config.poll_interval_secs);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => break,
        }

        let cycle = engine.poll_once(client, config.preferences());
        tokio::pin!(cycle);
        let mut interrupted = false;
        let result = tokio::select! {
            result = &mut cycle => result,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, cancelling poll cycle");
                interrupted = true;
                engine.cancel_in_flight();
                cycle.await
            }
        };

        match result {
            Ok(result) => report(&result),
            Err(e) if e.is_transient() => warn!("Poll failed, will retry: {}", e),
            Err(e) => error!("Poll failed: {}", e),
        }
        if interrupted {
            break;
        }
    }
}

fn report(result: &CycleResult) {
    if result.baseline_established {
        info!(
            "Baseline established for {} pull requests",
            result.pull_requests_processed
        );
    }
    for failure in &result.errors {
        warn!("{}: {}", failure.pr_key, failure.error);
    }
}

async fn status(config: &AppConfig, database: &Database, json: bool) -> anyhow::Result<()> {
    let engine = PollEngine::new(Arc::new(database.clone()), Arc::new(notify::LogNotifier));
    let baseline = engine.baseline_established().await?;
    let watermarks = engine.watermarks().await?;
    let has_token = config.configured_token().is_some()
        || CredentialStore::new(database.clone()).has_token().await?;

    if json {
        let entries: Vec<serde_json::Value> = watermarks
            .iter()
            .map(|(key, watermark)| {
                serde_json::json!({
                    "key": key.as_str(),
                    "last_seen_comment_at": watermark.last_seen_comment_at,
                    "last_seen_review_at": watermark.last_seen_review_at,
                })
            })
            .collect();
        let status = serde_json::json!({
            "baseline_established": baseline,
            "has_token": has_token,
            "notify_comments": config.notify_comments,
            "notify_reviews": config.notify_reviews,
            "watermarks": entries,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Baseline established: {}", baseline);
    println!("Token configured:     {}", has_token);
    println!(
        "Notify on comments:   {}\nNotify on reviews:    {}",
        config.notify_comments, config.notify_reviews
    );
    println!("Tracked pull requests: {}", watermarks.len());
    for (key, watermark) in &watermarks {
        let show = |at: Option<chrono::DateTime<chrono::Utc>>| {
            at.map(|at| at.to_rfc3339()).unwrap_or_else(|| "-".to_string())
        };
        println!(
            "  {}  comments: {}  reviews: {}",
            key,
            show(watermark.last_seen_comment_at),
            show(watermark.last_seen_review_at)
        );
    }
    Ok(())
}

async fn token(database: &Database, config: &AppConfig, action: TokenAction) -> anyhow::Result<()> {
    let store = CredentialStore::new(database.clone());
    match action {
        TokenAction::Set { token } => {
            store.save_token(&token).await?;
            println!("Token saved");
        }
        TokenAction::Delete => {
            if store.delete_token().await? {
                println!("Token deleted");
            } else {
                println!("No stored token");
            }
        }
        TokenAction::Show => {
            if config.configured_token().is_some() {
                println!("Token provided by configuration");
            } else if store.has_token().await? {
                println!("Token stored in database");
            } else {
                println!("No token configured");
            }
        }
    }
    Ok(())
}
