use sqlx::SqlitePool;

use crate::database::models::*;

pub struct Queries;

impl Queries {
    pub async fn get_watermark_rows(
        pool: &SqlitePool,
        pr_key: &str,
    ) -> Result<Vec<WatermarkRow>, sqlx::Error> {
        sqlx::query_as::<_, WatermarkRow>(
            r#"
            SELECT pr_key, category, seen_at, updated_at
            FROM watermarks
            WHERE pr_key = ?
            "#,
        )
        .bind(pr_key)
        .fetch_all(pool)
        .await
    }

    pub async fn list_watermark_rows(pool: &SqlitePool) -> Result<Vec<WatermarkRow>, sqlx::Error> {
        sqlx::query_as::<_, WatermarkRow>(
            r#"
            SELECT pr_key, category, seen_at, updated_at
            FROM watermarks
            ORDER BY pr_key, category
            "#,
        )
        .fetch_all(pool)
        .await
    }

    /// Insert or move a watermark forward in one statement. Returns `false`
    /// when the stored value is already at or past `seen_at`.
    pub async fn advance_watermark(
        pool: &SqlitePool,
        pr_key: &str,
        category: &str,
        seen_at: i64,
        now: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO watermarks (pr_key, category, seen_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (pr_key, category) DO UPDATE SET
                seen_at = excluded.seen_at,
                updated_at = excluded.updated_at
            WHERE excluded.seen_at > watermarks.seen_at
            "#,
        )
        .bind(pr_key)
        .bind(category)
        .bind(seen_at)
        .bind(now)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn prune_watermarks(pool: &SqlitePool, cutoff: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM watermarks WHERE updated_at < ?")
            .bind(cutoff)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn get_state(pool: &SqlitePool, key: &str) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM engine_state WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(|(value,)| value))
    }

    pub async fn set_state(pool: &SqlitePool, key: &str, value: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO engine_state (key, value) VALUES (?, ?)
            ON CONFLICT (key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn delete_state(pool: &SqlitePool, key: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM engine_state WHERE key = ?")
            .bind(key)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn is_delivered(pool: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM delivered_notifications WHERE id = ?")
            .bind(id)
            .fetch_one(pool)
            .await?;
        Ok(count > 0)
    }

    /// Returns `false` if the id was already recorded.
    pub async fn record_delivery(pool: &SqlitePool, id: &str, at: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("INSERT OR IGNORE INTO delivered_notifications (id, delivered_at) VALUES (?, ?)")
            .bind(id)
            .bind(at)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Forget deliveries recorded before `cutoff`; returns rows removed.
    pub async fn prune_deliveries(pool: &SqlitePool, cutoff: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM delivered_notifications WHERE delivered_at < ?")
            .bind(cutoff)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn save_credential(
        pool: &SqlitePool,
        name: &str,
        token: &str,
        saved_at: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO credentials (name, token, saved_at) VALUES (?, ?, ?)
            ON CONFLICT (name) DO UPDATE SET
                token = excluded.token,
                saved_at = excluded.saved_at
            "#,
        )
        .bind(name)
        .bind(token)
        .bind(saved_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn get_credential(pool: &SqlitePool, name: &str) -> Result<Option<CredentialRow>, sqlx::Error> {
        sqlx::query_as::<_, CredentialRow>("SELECT name, token, saved_at FROM credentials WHERE name = ?")
            .bind(name)
            .fetch_optional(pool)
            .await
    }

    pub async fn delete_credential(pool: &SqlitePool, name: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM credentials WHERE name = ?")
            .bind(name)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
